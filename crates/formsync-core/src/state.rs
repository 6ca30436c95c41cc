use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

use super::path;
use super::value::Value;

pub type ErrorMap = BTreeMap<String, String>;

pub const MODEL_KEY: &str = "model";
pub const STATUS_KEY: &str = "status";
pub const ERRORS_KEY: &str = "errors";
pub const DIRTY_KEY: &str = "dirty";
pub const SUBMITTED_KEY: &str = "submitted";
pub const INITIALIZED_KEY: &str = "initialized";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FormStatus {
    Valid,
    Invalid,
    Pending,
    Disabled,
}

impl FormStatus {
    pub fn label(self) -> &'static str {
        match self {
            Self::Valid => "VALID",
            Self::Invalid => "INVALID",
            Self::Pending => "PENDING",
            Self::Disabled => "DISABLED",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "VALID" => Some(Self::Valid),
            "INVALID" => Some(Self::Invalid),
            "PENDING" => Some(Self::Pending),
            "DISABLED" => Some(Self::Disabled),
            _ => None,
        }
    }
}

/// The record a form owns inside the global tree.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SliceState {
    pub model: Value,
    pub status: Option<FormStatus>,
    pub errors: Option<ErrorMap>,
    pub dirty: bool,
    pub submitted: bool,
    /// Set once an Init has been applied.
    pub initialized: bool,
}

impl SliceState {
    pub fn with_model(model: Value) -> Self {
        Self {
            model,
            ..Self::default()
        }
    }

    /// Reads the slice stored at `slice`, if any.
    pub fn read(tree: &Value, slice: &str) -> Option<Self> {
        path::get(tree, slice).map(Self::from_value)
    }

    /// Lenient view over a stored record; absent or malformed attributes
    /// fall back to their defaults.
    pub fn from_value(value: &Value) -> Self {
        let Some(entries) = value.as_record() else {
            return Self::default();
        };
        let flag = |key: &str| entries.get(key).and_then(Value::as_bool).unwrap_or(false);
        Self {
            model: entries
                .get(MODEL_KEY)
                .cloned()
                .unwrap_or_else(Value::empty_record),
            status: entries
                .get(STATUS_KEY)
                .and_then(Value::as_str)
                .and_then(FormStatus::parse),
            errors: entries.get(ERRORS_KEY).and_then(errors_from_value),
            dirty: flag(DIRTY_KEY),
            submitted: flag(SUBMITTED_KEY),
            initialized: flag(INITIALIZED_KEY),
        }
    }

    pub fn to_value(&self) -> Value {
        let mut entries: Vec<(&str, Value)> = vec![(MODEL_KEY, self.model.clone())];
        if let Some(status) = self.status {
            entries.push((STATUS_KEY, Value::from(status.label())));
        }
        if let Some(errors) = &self.errors {
            entries.push((ERRORS_KEY, errors_to_value(errors)));
        }
        entries.push((DIRTY_KEY, Value::from(self.dirty)));
        entries.push((SUBMITTED_KEY, Value::from(self.submitted)));
        entries.push((INITIALIZED_KEY, Value::from(self.initialized)));
        Value::record(entries)
    }
}

pub fn errors_to_value(errors: &ErrorMap) -> Value {
    Value::record(
        errors
            .iter()
            .map(|(code, message)| (code.clone(), Value::from(message.as_str()))),
    )
}

fn errors_from_value(value: &Value) -> Option<ErrorMap> {
    let entries = value.as_record()?;
    Some(
        entries
            .iter()
            .map(|(code, message)| {
                let message = message
                    .as_str()
                    .map(str::to_string)
                    .unwrap_or_else(|| message.to_string());
                (code.clone(), message)
            })
            .collect(),
    )
}
