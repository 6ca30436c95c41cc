use serde::Deserialize;
use serde::Serialize;

use super::state::ErrorMap;
use super::state::FormStatus;
use super::value::Value;

/// Which baseline a reset restores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResetTarget {
    Initial,
    Submitted,
    Blank,
}

impl ResetTarget {
    pub fn label(self) -> &'static str {
        match self {
            Self::Initial => "initial",
            Self::Submitted => "submitted",
            Self::Blank => "blank",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum CommandKind {
    Init {
        value: Value,
    },
    UpdateForm {
        value: Value,
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        noclone: bool,
    },
    UpdateField {
        property: String,
        value: Value,
    },
    /// Without a value this is a request the controller resolves into an
    /// UpdateForm; with one it is applied directly.
    Reset {
        policy: ResetTarget,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<Value>,
    },
    UpdateStatus {
        status: FormStatus,
    },
    UpdateErrors {
        #[serde(default)]
        errors: Option<ErrorMap>,
    },
    UpdateDirty {
        dirty: bool,
    },
    Submitted,
    FormDestroyed,
}

impl CommandKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Init { .. } => "Init",
            Self::UpdateForm { .. } => "UpdateForm",
            Self::UpdateField { .. } => "UpdateField",
            Self::Reset { .. } => "Reset",
            Self::UpdateStatus { .. } => "UpdateStatus",
            Self::UpdateErrors { .. } => "UpdateErrors",
            Self::UpdateDirty { .. } => "UpdateDirty",
            Self::Submitted => "Submitted",
            Self::FormDestroyed => "FormDestroyed",
        }
    }

    /// Commands that write the model.
    pub fn is_modifier(&self) -> bool {
        match self {
            Self::Init { .. } | Self::UpdateForm { .. } | Self::UpdateField { .. } => true,
            Self::Reset { value, .. } => value.is_some(),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub slice: String,
    #[serde(flatten)]
    pub kind: CommandKind,
    /// Set on replays out of a deferred queue. Diagnostics only.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub deferred: bool,
}

impl Command {
    pub fn new(slice: impl Into<String>, kind: CommandKind) -> Self {
        Self {
            slice: slice.into(),
            kind,
            deferred: false,
        }
    }

    pub fn init(slice: impl Into<String>, value: Value) -> Self {
        Self::new(slice, CommandKind::Init { value })
    }

    pub fn update_form(slice: impl Into<String>, value: Value) -> Self {
        Self::new(
            slice,
            CommandKind::UpdateForm {
                value,
                noclone: false,
            },
        )
    }

    pub fn update_field(
        slice: impl Into<String>,
        property: impl Into<String>,
        value: Value,
    ) -> Self {
        Self::new(
            slice,
            CommandKind::UpdateField {
                property: property.into(),
                value,
            },
        )
    }

    pub fn reset(slice: impl Into<String>, policy: ResetTarget) -> Self {
        Self::new(
            slice,
            CommandKind::Reset {
                policy,
                value: None,
            },
        )
    }

    pub fn reset_to(slice: impl Into<String>, policy: ResetTarget, value: Value) -> Self {
        Self::new(
            slice,
            CommandKind::Reset {
                policy,
                value: Some(value),
            },
        )
    }

    pub fn update_status(slice: impl Into<String>, status: FormStatus) -> Self {
        Self::new(slice, CommandKind::UpdateStatus { status })
    }

    pub fn update_errors(slice: impl Into<String>, errors: Option<ErrorMap>) -> Self {
        Self::new(slice, CommandKind::UpdateErrors { errors })
    }

    pub fn update_dirty(slice: impl Into<String>, dirty: bool) -> Self {
        Self::new(slice, CommandKind::UpdateDirty { dirty })
    }

    pub fn submitted(slice: impl Into<String>) -> Self {
        Self::new(slice, CommandKind::Submitted)
    }

    pub fn form_destroyed(slice: impl Into<String>) -> Self {
        Self::new(slice, CommandKind::FormDestroyed)
    }

    /// A copy marked as coming out of a deferred queue.
    pub fn replay(&self) -> Self {
        Self {
            deferred: true,
            ..self.clone()
        }
    }

    pub fn is_initializer(&self) -> bool {
        matches!(self.kind, CommandKind::Init { .. })
    }

    pub fn kind_name(&self) -> &'static str {
        self.kind.name()
    }
}
