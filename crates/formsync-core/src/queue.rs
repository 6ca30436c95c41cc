use std::collections::BTreeMap;
use std::collections::VecDeque;

use super::commands::Command;
use super::error::SyncError;

/// Commands held back until their slice is initialized.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeferredQueue {
    commands: VecDeque<Command>,
    initialized: bool,
}

impl DeferredQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&mut self, command: Command) {
        self.commands.push_back(command);
    }

    /// Puts an initializer at the front and opens the queue.
    ///
    /// An initializer already at the head is superseded and handed back.
    pub fn promote(&mut self, command: Command) -> Option<Command> {
        let superseded = match self.commands.front() {
            Some(head) if head.is_initializer() => self.commands.pop_front(),
            _ => None,
        };
        self.commands.push_front(command);
        self.initialized = true;
        superseded
    }

    pub fn dequeue(&mut self) -> Option<Command> {
        self.commands.pop_front()
    }

    pub fn peek(&self) -> Option<&Command> {
        self.commands.front()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn into_commands(self) -> Vec<Command> {
        self.commands.into()
    }
}

/// Per-slice deferred queues, owned by whoever owns the reducer.
#[derive(Debug, Clone, Default)]
pub struct QueueRegistry {
    queues: BTreeMap<String, DeferredQueue>,
}

impl QueueRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&mut self, slice: &str) -> Result<(), SyncError> {
        if self.queues.contains_key(slice) {
            return Err(SyncError::SliceAlreadyAttached {
                slice: slice.to_string(),
            });
        }
        self.queues.insert(slice.to_string(), DeferredQueue::new());
        Ok(())
    }

    pub fn get(&self, slice: &str) -> Option<&DeferredQueue> {
        self.queues.get(slice)
    }

    pub fn get_mut(&mut self, slice: &str) -> Option<&mut DeferredQueue> {
        self.queues.get_mut(slice)
    }

    /// True while commands for `slice` must be buffered.
    pub fn is_gating(&self, slice: &str) -> bool {
        self.queues
            .get(slice)
            .is_some_and(|queue| !queue.is_initialized())
    }

    /// Drops the queue for `slice`, returning whatever it still buffered.
    pub fn release(&mut self, slice: &str) -> Vec<Command> {
        self.queues
            .remove(slice)
            .map(DeferredQueue::into_commands)
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.queues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queues.is_empty()
    }
}
