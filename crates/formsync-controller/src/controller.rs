use std::collections::BTreeSet;
use std::collections::VecDeque;
use std::time::Instant;

use formsync_core::equal;
use formsync_core::path;
use formsync_core::Command;
use formsync_core::CommandKind;
use formsync_core::FormStatus;
use formsync_core::ResetTarget;
use formsync_core::SyncConfig;
use formsync_core::SyncError;
use formsync_core::UpdateTrigger;
use formsync_core::Value;
use tracing::debug;
use tracing::trace;

use crate::field_tree::FieldEvent;
use crate::field_tree::FieldTree;
use crate::field_tree::PatchOptions;
use crate::field_tree::ValidationOutcome;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Unattached,
    AwaitingInitialization,
    Initialized,
    Detached,
}

impl ControllerState {
    pub fn label(self) -> &'static str {
        match self {
            Self::Unattached => "unattached",
            Self::AwaitingInitialization => "awaiting_initialization",
            Self::Initialized => "initialized",
            Self::Detached => "detached",
        }
    }
}

pub struct ControllerBuilder {
    config: SyncConfig,
    field_tree: Option<Box<dyn FieldTree>>,
}

impl ControllerBuilder {
    pub fn new(config: SyncConfig) -> Self {
        Self {
            config,
            field_tree: None,
        }
    }

    pub fn field_tree(mut self, tree: impl FieldTree + 'static) -> Self {
        self.field_tree = Some(Box::new(tree));
        self
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Validates the binding and returns the controller together with the
    /// commands its attachment produces. `store_model` is the slice model
    /// the store already holds, if any.
    pub fn attach(
        self,
        store_model: Option<&Value>,
    ) -> Result<(Controller, Vec<Command>), SyncError> {
        self.config.validate()?;
        let field_tree = self.field_tree.ok_or_else(|| SyncError::MissingFieldTree {
            slice: self.config.slice.clone(),
        })?;

        let mut controller = Controller {
            config: self.config,
            field_tree,
            state: ControllerState::Unattached,
            initial_state: None,
            submitted_state: None,
            dirty: false,
            last_validation: None,
            pending: VecDeque::new(),
            edits: 0,
            last_event: None,
            deferred_reset: None,
        };
        let commands = controller.attach(store_model);
        Ok((controller, commands))
    }
}

/// Keeps one field tree and one store slice in agreement.
pub struct Controller {
    config: SyncConfig,
    field_tree: Box<dyn FieldTree>,
    state: ControllerState,
    initial_state: Option<Value>,
    submitted_state: Option<Value>,
    /// Dirtiness as last published to (or seen from) the store.
    dirty: bool,
    last_validation: Option<ValidationOutcome>,
    pending: VecDeque<FieldEvent>,
    edits: u64,
    last_event: Option<Instant>,
    deferred_reset: Option<ResetTarget>,
}

impl Controller {
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn slice(&self) -> &str {
        &self.config.slice
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn initial_state(&self) -> Option<&Value> {
        self.initial_state.as_ref()
    }

    pub fn submitted_state(&self) -> Option<&Value> {
        self.submitted_state.as_ref()
    }

    pub fn edit_count(&self) -> u64 {
        self.edits
    }

    pub fn pending_events(&self) -> usize {
        self.pending.len()
    }

    fn attach(&mut self, store_model: Option<&Value>) -> Vec<Command> {
        self.state = ControllerState::AwaitingInitialization;
        debug!(
            slice = %self.config.slice,
            update_on = self.config.update_on.label(),
            queue = self.config.enable_queue,
            "controller attached"
        );
        if !self.config.auto_init {
            return Vec::new();
        }
        let ui = self.field_tree.current_value();
        let value = match store_model {
            Some(model) if !model.is_empty_container() => path::intersection(model, &ui),
            _ => ui,
        };
        vec![Command::init(self.config.slice.clone(), value)]
    }

    /// Reacts to a command the store has applied.
    pub fn on_command(&mut self, command: &Command) -> Vec<Command> {
        if self.state == ControllerState::Detached || command.slice != self.config.slice {
            return Vec::new();
        }
        match &command.kind {
            CommandKind::Init { value } if self.state == ControllerState::Initialized => {
                self.reinitialize(value)
            }
            CommandKind::Init { value }
            | CommandKind::UpdateForm { value, .. }
            | CommandKind::Reset {
                value: Some(value), ..
            } => self.receive_model(value),
            CommandKind::UpdateField { property, value } => self.receive_field(property, value),
            CommandKind::Reset {
                policy,
                value: None,
            } => self.resolve_reset(*policy),
            CommandKind::UpdateDirty { dirty } => {
                self.dirty = *dirty;
                Vec::new()
            }
            CommandKind::UpdateStatus { .. }
            | CommandKind::UpdateErrors { .. }
            | CommandKind::Submitted
            | CommandKind::FormDestroyed => Vec::new(),
        }
    }

    fn receive_model(&mut self, value: &Value) -> Vec<Command> {
        if self.state != ControllerState::Initialized {
            return self.initialize(value);
        }
        if equal(&self.field_tree.current_value(), value) {
            trace!(slice = %self.config.slice, "ui already holds the store model");
            return Vec::new();
        }
        self.patch(value);
        let mut out = self.refresh_dirty();
        out.extend(self.sync_validation());
        out
    }

    fn initialize(&mut self, value: &Value) -> Vec<Command> {
        self.patch(value);
        self.initial_state = Some(self.field_tree.current_value());
        self.state = ControllerState::Initialized;
        self.field_tree.mark_pristine();
        self.dirty = false;
        debug!(slice = %self.config.slice, "controller initialized");

        let mut out = vec![Command::update_dirty(self.config.slice.clone(), false)];
        out.extend(self.sync_validation());
        if let Some(target) = self.deferred_reset.take() {
            out.extend(self.resolve_reset(target));
        }
        out
    }

    /// A later Init patches the UI but keeps the first baseline. The store
    /// has just cleared its dirty flag, so dirtiness is published afresh.
    fn reinitialize(&mut self, value: &Value) -> Vec<Command> {
        if !equal(&self.field_tree.current_value(), value) {
            self.patch(value);
        }
        self.dirty = false;
        let mut out = self.refresh_dirty();
        out.extend(self.sync_validation());
        out
    }

    fn receive_field(&mut self, property: &str, value: &Value) -> Vec<Command> {
        let current = self.field_tree.current_value();
        if path::get(&current, property).is_some_and(|existing| equal(existing, value)) {
            return Vec::new();
        }
        self.patch(&path::set(&current, property, value.clone()));
        let mut out = self.refresh_dirty();
        out.extend(self.sync_validation());
        out
    }

    fn resolve_reset(&mut self, target: ResetTarget) -> Vec<Command> {
        if self.state != ControllerState::Initialized {
            self.deferred_reset = Some(target);
            return Vec::new();
        }
        let slice = self.config.slice.clone();
        match target {
            ResetTarget::Initial | ResetTarget::Submitted => {
                vec![Command::update_form(slice, self.baseline(target))]
            }
            ResetTarget::Blank => {
                let value = self.patching(|tree| tree.reset());
                let mut out = vec![Command::update_form(slice, value)];
                out.extend(self.refresh_dirty());
                out.extend(self.sync_validation());
                out
            }
        }
    }

    fn baseline(&self, target: ResetTarget) -> Value {
        let baseline = match target {
            ResetTarget::Initial => self.initial_state.as_ref(),
            ResetTarget::Submitted => self
                .submitted_state
                .as_ref()
                .or(self.initial_state.as_ref()),
            ResetTarget::Blank => None,
        };
        baseline.cloned().unwrap_or_else(Value::empty_record)
    }

    /// Runs a store-side write against the field tree and swallows the
    /// notifications it raises. Events the user raised before the write are
    /// kept.
    fn patching<R>(&mut self, write: impl FnOnce(&mut dyn FieldTree) -> R) -> R {
        self.stash_events();
        let result = write(self.field_tree.as_mut());
        let echoes = self.field_tree.take_events();
        if !echoes.is_empty() {
            trace!(slice = %self.config.slice, echoes = echoes.len(), "dropped patch echoes");
        }
        result
    }

    fn patch(&mut self, value: &Value) {
        self.patching(|tree| tree.patch(value, PatchOptions::silent()));
    }

    fn refresh_dirty(&mut self) -> Vec<Command> {
        if self.state != ControllerState::Initialized {
            return Vec::new();
        }
        let current = self.field_tree.current_value();
        let dirty = self
            .submitted_state
            .as_ref()
            .or(self.initial_state.as_ref())
            .is_some_and(|baseline| !equal(&current, baseline));

        if dirty != self.field_tree.is_dirty() {
            if dirty {
                self.field_tree.mark_dirty();
            } else {
                self.field_tree.mark_pristine();
            }
        }
        if dirty == self.dirty {
            return Vec::new();
        }
        self.dirty = dirty;
        vec![Command::update_dirty(self.config.slice.clone(), dirty)]
    }

    fn sync_validation(&mut self) -> Vec<Command> {
        if self.state != ControllerState::Initialized {
            return Vec::new();
        }
        let outcome = self.field_tree.validation_outcome();
        if outcome.status == FormStatus::Pending || self.last_validation.as_ref() == Some(&outcome) {
            return Vec::new();
        }
        let slice = self.config.slice.clone();
        let out = vec![
            Command::update_status(slice.clone(), outcome.status),
            Command::update_errors(slice, outcome.errors.clone()),
        ];
        self.last_validation = Some(outcome);
        out
    }

    fn stash_events(&mut self) -> usize {
        let events = self.field_tree.take_events();
        let fresh = events.len();
        for event in events {
            if matches!(event, FieldEvent::ValueChanged { .. }) {
                self.edits += 1;
            }
            self.pending.push_back(event);
        }
        fresh
    }

    /// Pulls UI events and publishes them once the debounce window closes.
    pub fn poll(&mut self, now: Instant) -> Vec<Command> {
        if self.state == ControllerState::Detached {
            return Vec::new();
        }
        let fresh = self.stash_events();
        if fresh > 0 || (self.last_event.is_none() && !self.pending.is_empty()) {
            self.last_event = Some(now);
        }
        if self.state != ControllerState::Initialized || self.pending.is_empty() {
            return Vec::new();
        }

        let submitting = self
            .pending
            .iter()
            .any(|event| matches!(event, FieldEvent::Submitted));
        let settled = self
            .last_event
            .map_or(true, |last| now.saturating_duration_since(last) >= self.config.debounce());
        if !submitting && !settled {
            return Vec::new();
        }
        self.flush()
    }

    fn flush(&mut self) -> Vec<Command> {
        let events: Vec<FieldEvent> = self.pending.drain(..).collect();
        self.last_event = None;

        let mut changed = BTreeSet::new();
        let mut blurred = BTreeSet::new();
        let mut submit = false;
        for event in &events {
            match event {
                FieldEvent::ValueChanged { path, .. } => {
                    changed.insert(path.clone());
                }
                FieldEvent::Blurred { path } => {
                    blurred.insert(path.clone());
                }
                FieldEvent::Submitted => submit = true,
            }
        }
        trace!(
            slice = %self.config.slice,
            events = events.len(),
            edits = self.edits,
            "flushing ui events"
        );

        if submit {
            if self.field_tree.validation_outcome().status != FormStatus::Invalid {
                return self.flush_submit();
            }
            debug!(slice = %self.config.slice, "submit ignored while the form is invalid");
            let publish = match self.config.update_on {
                UpdateTrigger::Submit => BTreeSet::new(),
                UpdateTrigger::Change | UpdateTrigger::Blur => changed,
            };
            return self.settle(&publish);
        }

        let publish = match self.config.update_on {
            UpdateTrigger::Change => changed,
            UpdateTrigger::Blur if blurred.is_empty() => {
                self.pending.extend(
                    events
                        .into_iter()
                        .filter(|event| matches!(event, FieldEvent::ValueChanged { .. })),
                );
                return self.refresh_dirty();
            }
            UpdateTrigger::Blur => changed,
            UpdateTrigger::Submit => BTreeSet::new(),
        };
        self.settle(&publish)
    }

    /// Publishes `paths`, then whatever dirtiness and validation changed.
    fn settle(&mut self, paths: &BTreeSet<String>) -> Vec<Command> {
        let mut out = self.publish(paths);
        out.extend(self.refresh_dirty());
        out.extend(self.sync_validation());
        out
    }

    fn publish(&self, paths: &BTreeSet<String>) -> Vec<Command> {
        let slice = self.config.slice.clone();
        let current = self.field_tree.current_value();
        let single = match paths.iter().next() {
            None => return Vec::new(),
            Some(path) if paths.len() == 1 && !path.is_empty() => Some(path),
            Some(_) => None,
        };
        match single {
            Some(path) => {
                let value = path::get(&current, path)
                    .cloned()
                    .unwrap_or_else(Value::null);
                vec![Command::update_field(slice, path.clone(), value)]
            }
            None => vec![Command::update_form(slice, current)],
        }
    }

    fn flush_submit(&mut self) -> Vec<Command> {
        self.field_tree.mark_pristine();
        let value = self.field_tree.current_value();
        self.submitted_state = Some(value.clone());

        let slice = self.config.slice.clone();
        let mut out = vec![
            Command::update_form(slice.clone(), value),
            Command::submitted(slice.clone()),
        ];
        if self.dirty {
            self.dirty = false;
            out.push(Command::update_dirty(slice, false));
        }
        out.extend(self.sync_validation());
        out
    }

    /// Leaves the slice. Pending UI events are dropped.
    pub fn detach(&mut self) -> Vec<Command> {
        if self.state == ControllerState::Detached {
            return Vec::new();
        }
        let slice = self.config.slice.clone();
        let mut out = Vec::new();
        if let Some(target) = self.config.reset_policy.target() {
            let value = match target {
                ResetTarget::Blank => Value::empty_record(),
                target => self.baseline(target),
            };
            out.push(Command::reset_to(slice.clone(), target, value));
        }
        if !self.config.enable_queue {
            out.push(Command::form_destroyed(slice));
        }
        self.pending.clear();
        self.last_event = None;
        self.state = ControllerState::Detached;
        debug!(slice = %self.config.slice, "controller detached");
        out
    }
}

#[cfg(test)]
mod tests;
