use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

use super::commands::ResetTarget;
use super::error::SyncError;

/// Which UI event publishes edits to the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateTrigger {
    #[default]
    Change,
    Blur,
    Submit,
}

impl UpdateTrigger {
    pub fn label(self) -> &'static str {
        match self {
            Self::Change => "change",
            Self::Blur => "blur",
            Self::Submit => "submit",
        }
    }
}

/// What a controller restores when it detaches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResetPolicy {
    #[default]
    None,
    Initial,
    Submitted,
    Blank,
}

impl ResetPolicy {
    pub fn target(self) -> Option<ResetTarget> {
        match self {
            Self::None => None,
            Self::Initial => Some(ResetTarget::Initial),
            Self::Submitted => Some(ResetTarget::Submitted),
            Self::Blank => Some(ResetTarget::Blank),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct SyncConfig {
    pub slice: String,
    pub debounce_ms: u64,
    pub update_on: UpdateTrigger,
    pub enable_queue: bool,
    pub reset_policy: ResetPolicy,
    /// Emit an Init on attach from whatever the UI and store already hold.
    pub auto_init: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            slice: String::new(),
            debounce_ms: 0,
            update_on: UpdateTrigger::Change,
            enable_queue: false,
            reset_policy: ResetPolicy::None,
            auto_init: false,
        }
    }
}

impl SyncConfig {
    pub fn for_slice(slice: impl Into<String>) -> Self {
        Self {
            slice: slice.into(),
            ..Self::default()
        }
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn validate(&self) -> Result<(), SyncError> {
        if self.slice.trim().is_empty() {
            return Err(SyncError::MissingSlice);
        }
        Ok(())
    }
}

/// Per-instance settings; anything left out falls back to the defaults it
/// is merged over.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct SyncOverrides {
    pub slice: Option<String>,
    pub debounce_ms: Option<u64>,
    pub update_on: Option<UpdateTrigger>,
    pub enable_queue: Option<bool>,
    pub reset_policy: Option<ResetPolicy>,
    pub auto_init: Option<bool>,
}

impl SyncOverrides {
    /// Layers these settings over `defaults`.
    pub fn merge_over(&self, defaults: &SyncConfig) -> SyncConfig {
        SyncConfig {
            slice: self.slice.clone().unwrap_or_else(|| defaults.slice.clone()),
            debounce_ms: self.debounce_ms.unwrap_or(defaults.debounce_ms),
            update_on: self.update_on.unwrap_or(defaults.update_on),
            enable_queue: self.enable_queue.unwrap_or(defaults.enable_queue),
            reset_policy: self.reset_policy.unwrap_or(defaults.reset_policy),
            auto_init: self.auto_init.unwrap_or(defaults.auto_init),
        }
    }
}
