use tracing::debug;
use tracing::trace;
use tracing::warn;

use super::commands::Command;
use super::commands::CommandKind;
use super::path;
use super::queue::QueueRegistry;
use super::state::SliceState;
use super::value::Value;

/// The host application's own reducer, run before every slice transition.
pub trait BaseReducer {
    fn reduce(&mut self, tree: &Value, command: &Command) -> Value;
}

impl<F> BaseReducer for F
where
    F: FnMut(&Value, &Command) -> Value,
{
    fn reduce(&mut self, tree: &Value, command: &Command) -> Value {
        self(tree, command)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Passthrough;

impl BaseReducer for Passthrough {
    fn reduce(&mut self, tree: &Value, _command: &Command) -> Value {
        tree.clone()
    }
}

/// One command as it was applied, with the whole tree on either side.
#[derive(Debug, Clone, PartialEq)]
pub struct Applied {
    pub command: Command,
    pub before: Value,
    pub after: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Reduction {
    pub state: Value,
    /// Commands that reached the tree, in application order. Empty when the
    /// command was buffered.
    pub applied: Vec<Applied>,
}

pub struct SliceReducer {
    base: Box<dyn BaseReducer>,
    initial: Value,
}

impl SliceReducer {
    pub fn new(initial: Value) -> Self {
        Self::with_base(initial, Passthrough)
    }

    pub fn with_base(initial: Value, base: impl BaseReducer + 'static) -> Self {
        Self {
            base: Box::new(base),
            initial,
        }
    }

    pub fn initial_state(&self) -> &Value {
        &self.initial
    }

    pub fn reduce(
        &mut self,
        tree: &Value,
        command: Command,
        queues: &mut QueueRegistry,
    ) -> Reduction {
        let mut applied = Vec::new();

        if command.slice.is_empty() {
            let state = self.base.reduce(tree, &command);
            applied.push(Applied {
                command,
                before: tree.clone(),
                after: state.clone(),
            });
            return Reduction { state, applied };
        }

        let gating = !command.deferred && queues.is_gating(&command.slice);
        let Some(queue) = queues.get_mut(&command.slice).filter(|_| gating) else {
            let state = self.apply(tree, command, &mut applied);
            return Reduction { state, applied };
        };

        if !command.is_initializer() {
            trace!(
                slice = %command.slice,
                kind = command.kind_name(),
                queued = queue.len() + 1,
                "deferring command until slice is initialized"
            );
            queue.enqueue(command.replay());
            return Reduction {
                state: tree.clone(),
                applied,
            };
        }

        if let Some(superseded) = queue.promote(command.replay()) {
            warn!(
                slice = %superseded.slice,
                "initializer superseded by a later one before it was applied"
            );
        }
        let mut state = tree.clone();
        while let Some(next) = queue.dequeue() {
            state = self.apply(&state, next, &mut applied);
        }
        Reduction { state, applied }
    }

    fn apply(&mut self, tree: &Value, command: Command, applied: &mut Vec<Applied>) -> Value {
        let based = self.base.reduce(tree, &command);
        let current = SliceState::read(&based, &command.slice).unwrap_or_else(|| {
            SliceState::read(&self.initial, &command.slice).unwrap_or_default()
        });

        let state = match transition(current, &command) {
            Some(next) => path::set(&based, &command.slice, next.to_value()),
            None => based,
        };
        debug!(
            slice = %command.slice,
            kind = command.kind_name(),
            deferred = command.deferred,
            "applied command"
        );
        applied.push(Applied {
            command,
            before: tree.clone(),
            after: state.clone(),
        });
        state
    }
}

/// The slice's next state, or `None` when the command leaves it untouched.
pub fn transition(mut slice: SliceState, command: &Command) -> Option<SliceState> {
    match &command.kind {
        CommandKind::Init { value } => {
            slice.model = value.deep_clone();
            slice.dirty = false;
            slice.initialized = true;
        }
        CommandKind::UpdateForm { value, noclone } => {
            warn_uninitialized(&slice, command);
            slice.model = if *noclone {
                value.clone()
            } else {
                value.deep_clone()
            };
        }
        CommandKind::UpdateField { property, value } => {
            warn_uninitialized(&slice, command);
            slice.model = path::set(&slice.model, property, value.clone());
        }
        CommandKind::Reset {
            value: Some(value), ..
        } => {
            slice.model = value.deep_clone();
            slice.dirty = false;
        }
        CommandKind::Reset { value: None, .. } | CommandKind::FormDestroyed => return None,
        CommandKind::UpdateStatus { status } => slice.status = Some(*status),
        CommandKind::UpdateErrors { errors } => slice.errors = errors.clone(),
        CommandKind::UpdateDirty { dirty } => slice.dirty = *dirty,
        CommandKind::Submitted => slice.submitted = true,
    }
    Some(slice)
}

fn warn_uninitialized(slice: &SliceState, command: &Command) {
    if !slice.initialized {
        warn!(
            slice = %command.slice,
            kind = command.kind_name(),
            "slice written before it was initialized"
        );
    }
}

#[cfg(test)]
mod tests;
