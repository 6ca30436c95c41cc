use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use formsync_core::path;
use formsync_core::ErrorMap;
use formsync_core::FormStatus;
use formsync_core::Value;

/// A notification raised by the UI side of a form.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldEvent {
    ValueChanged { path: String, value: Value },
    Blurred { path: String },
    Submitted,
}

impl FieldEvent {
    pub fn label(&self) -> &'static str {
        match self {
            Self::ValueChanged { .. } => "value_changed",
            Self::Blurred { .. } => "blurred",
            Self::Submitted => "submitted",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PatchOptions {
    /// Suppress the value-change notification a patch would raise.
    pub silent: bool,
}

impl PatchOptions {
    pub fn silent() -> Self {
        Self { silent: true }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationOutcome {
    pub status: FormStatus,
    pub errors: Option<ErrorMap>,
}

impl Default for ValidationOutcome {
    fn default() -> Self {
        Self {
            status: FormStatus::Valid,
            errors: None,
        }
    }
}

/// The UI binding a controller keeps in step with its store slice.
pub trait FieldTree {
    fn current_value(&self) -> Value;

    /// Merges `value` into the tree: records merge key by key, anything
    /// else replaces what was there.
    fn patch(&mut self, value: &Value, options: PatchOptions);

    /// Drains the notifications raised since the last call.
    fn take_events(&mut self) -> Vec<FieldEvent>;

    fn validation_outcome(&self) -> ValidationOutcome;

    fn is_dirty(&self) -> bool;

    fn mark_pristine(&mut self);

    fn mark_dirty(&mut self);

    /// Puts every control back to its default and returns the result.
    fn reset(&mut self) -> Value;
}

#[derive(Debug, Default)]
struct FieldTreeState {
    value: Value,
    defaults: Value,
    events: Vec<FieldEvent>,
    validation: ValidationOutcome,
    dirty: bool,
    patches: usize,
}

/// In-memory field tree.
///
/// Clones share one tree, so a test or a script runner can keep a handle
/// while the controller owns another.
#[derive(Debug, Clone, Default)]
pub struct MemoryFieldTree {
    inner: Rc<RefCell<FieldTreeState>>,
}

impl MemoryFieldTree {
    pub fn new(value: Value) -> Self {
        Self::with_defaults(value.clone(), value)
    }

    pub fn with_defaults(value: Value, defaults: Value) -> Self {
        Self {
            inner: Rc::new(RefCell::new(FieldTreeState {
                value,
                defaults,
                ..FieldTreeState::default()
            })),
        }
    }

    /// A user typing `value` into the control at `path`.
    pub fn edit(&self, path: &str, value: Value) {
        let mut inner = self.inner.borrow_mut();
        inner.value = path::set(&inner.value, path, value.clone());
        inner.dirty = true;
        inner.events.push(FieldEvent::ValueChanged {
            path: path.to_string(),
            value,
        });
    }

    pub fn blur(&self, path: &str) {
        self.inner.borrow_mut().events.push(FieldEvent::Blurred {
            path: path.to_string(),
        });
    }

    pub fn submit(&self) {
        self.inner.borrow_mut().events.push(FieldEvent::Submitted);
    }

    pub fn set_validation(&self, status: FormStatus, errors: Option<ErrorMap>) {
        self.inner.borrow_mut().validation = ValidationOutcome { status, errors };
    }

    pub fn value(&self) -> Value {
        self.inner.borrow().value.clone()
    }

    pub fn dirty(&self) -> bool {
        self.inner.borrow().dirty
    }

    /// Number of patches applied from the store side.
    pub fn patch_count(&self) -> usize {
        self.inner.borrow().patches
    }

    pub fn pending_events(&self) -> usize {
        self.inner.borrow().events.len()
    }
}

impl FieldTree for MemoryFieldTree {
    fn current_value(&self) -> Value {
        self.value()
    }

    fn patch(&mut self, value: &Value, options: PatchOptions) {
        let mut inner = self.inner.borrow_mut();
        let merged = merge(&inner.value, value);
        inner.value = merged.clone();
        inner.patches += 1;
        if !options.silent {
            inner.events.push(FieldEvent::ValueChanged {
                path: String::new(),
                value: merged,
            });
        }
    }

    fn take_events(&mut self) -> Vec<FieldEvent> {
        std::mem::take(&mut self.inner.borrow_mut().events)
    }

    fn validation_outcome(&self) -> ValidationOutcome {
        self.inner.borrow().validation.clone()
    }

    fn is_dirty(&self) -> bool {
        self.dirty()
    }

    fn mark_pristine(&mut self) {
        self.inner.borrow_mut().dirty = false;
    }

    fn mark_dirty(&mut self) {
        self.inner.borrow_mut().dirty = true;
    }

    fn reset(&mut self) -> Value {
        let mut inner = self.inner.borrow_mut();
        inner.value = inner.defaults.clone();
        inner.dirty = false;
        inner.value.clone()
    }
}

fn merge(current: &Value, patch: &Value) -> Value {
    match (current, patch) {
        (Value::Record(current), Value::Record(patch)) => {
            let mut entries = (**current).clone();
            for (key, value) in patch.iter() {
                let next = match entries.get(key) {
                    Some(existing) => merge(existing, value),
                    None => value.clone(),
                };
                entries.insert(key.clone(), next);
            }
            Value::Record(Arc::new(entries))
        }
        _ => patch.clone(),
    }
}
