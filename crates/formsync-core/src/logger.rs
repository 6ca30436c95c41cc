use regex::Regex;
use serde::Deserialize;
use serde::Serialize;
use tracing::debug;

use super::diff::diff;
use super::diff::Difference;
use super::path;
use super::reducer::Applied;
use super::state::MODEL_KEY;
use super::value::Value;

/// Sees every command the store applies, after the fact.
pub trait StoreObserver {
    fn observe(&mut self, applied: &Applied);
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct LoggerSettings {
    pub show_all: bool,
    pub show_regular: bool,
    pub show_deferred: bool,
    /// Log any command whose slice model actually changed.
    pub show_only_modifiers: bool,
    /// Regex over the command kind name.
    pub show_match: Option<String>,
}

impl Default for LoggerSettings {
    fn default() -> Self {
        Self {
            show_all: false,
            show_regular: false,
            show_deferred: false,
            show_only_modifiers: true,
            show_match: None,
        }
    }
}

/// Traces the model difference each applied command caused.
#[derive(Debug, Clone)]
pub struct DiffLogger {
    settings: LoggerSettings,
    matcher: Option<Regex>,
}

impl DiffLogger {
    pub fn new(settings: LoggerSettings) -> Result<Self, regex::Error> {
        let matcher = settings.show_match.as_deref().map(Regex::new).transpose()?;
        Ok(Self { settings, matcher })
    }

    pub fn settings(&self) -> &LoggerSettings {
        &self.settings
    }

    pub fn should_log(&self, applied: &Applied) -> bool {
        let command = &applied.command;
        if self.settings.show_all {
            return true;
        }
        if let Some(matcher) = &self.matcher {
            if matcher.is_match(command.kind_name()) {
                return true;
            }
        }
        if self.settings.show_regular && !command.deferred {
            return true;
        }
        if self.settings.show_deferred && command.deferred {
            return true;
        }
        self.settings.show_only_modifiers && !Self::difference(applied).is_empty()
    }

    /// Difference of the command's slice model, or of the whole tree for
    /// slice-less commands.
    pub fn difference(applied: &Applied) -> Difference {
        let slice = &applied.command.slice;
        if slice.is_empty() {
            return diff(&applied.before, &applied.after);
        }
        let model = path::join(slice, MODEL_KEY);
        let empty = Value::empty_record();
        let before = path::get(&applied.before, &model).unwrap_or(&empty);
        let after = path::get(&applied.after, &model).unwrap_or(&empty);
        diff(before, after)
    }
}

impl Default for DiffLogger {
    fn default() -> Self {
        Self {
            settings: LoggerSettings::default(),
            matcher: None,
        }
    }
}

impl StoreObserver for DiffLogger {
    fn observe(&mut self, applied: &Applied) {
        if !self.should_log(applied) {
            return;
        }
        let command = &applied.command;
        let difference = Self::difference(applied);
        let json = |part: &Option<Value>| {
            part.as_ref()
                .map(|value| value.to_string())
                .unwrap_or_default()
        };
        debug!(
            slice = %command.slice,
            kind = command.kind_name(),
            deferred = command.deferred,
            added = %json(&difference.added),
            removed = %json(&difference.removed),
            changed = %json(&difference.changed),
            "state difference"
        );
    }
}
