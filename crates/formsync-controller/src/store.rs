use std::collections::BTreeMap;
use std::collections::VecDeque;
use std::fmt;
use std::time::Instant;

use formsync_core::Applied;
use formsync_core::Command;
use formsync_core::QueueRegistry;
use formsync_core::SliceReducer;
use formsync_core::SliceState;
use formsync_core::StoreObserver;
use formsync_core::SyncError;
use formsync_core::Value;
use tracing::debug;
use tracing::warn;

use crate::controller::Controller;
use crate::controller::ControllerBuilder;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ControllerId(pub u64);

impl fmt::Display for ControllerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Single-threaded owner of the global tree and everything attached to it.
pub struct Store {
    tree: Value,
    reducer: SliceReducer,
    queues: QueueRegistry,
    controllers: BTreeMap<ControllerId, Controller>,
    observers: Vec<Box<dyn StoreObserver>>,
    next_id: u64,
}

impl Store {
    pub fn new(initial: Value) -> Self {
        Self::with_reducer(SliceReducer::new(initial))
    }

    pub fn with_reducer(reducer: SliceReducer) -> Self {
        Self {
            tree: reducer.initial_state().clone(),
            reducer,
            queues: QueueRegistry::new(),
            controllers: BTreeMap::new(),
            observers: Vec::new(),
            next_id: 1,
        }
    }

    pub fn state(&self) -> &Value {
        &self.tree
    }

    pub fn slice(&self, slice: &str) -> Option<SliceState> {
        SliceState::read(&self.tree, slice)
    }

    pub fn controller(&self, id: ControllerId) -> Option<&Controller> {
        self.controllers.get(&id)
    }

    pub fn queues(&self) -> &QueueRegistry {
        &self.queues
    }

    pub fn add_observer(&mut self, observer: Box<dyn StoreObserver>) {
        self.observers.push(observer);
    }

    pub fn attach(&mut self, builder: ControllerBuilder) -> Result<ControllerId, SyncError> {
        builder.config().validate()?;
        let slice = builder.config().slice.clone();
        if self.controllers.values().any(|controller| controller.slice() == slice) {
            return Err(SyncError::SliceAlreadyAttached { slice });
        }

        let store_model = self.slice(&slice).map(|state| state.model);
        let (controller, commands) = builder.attach(store_model.as_ref())?;
        if controller.config().enable_queue {
            self.queues.open(&slice)?;
        }

        let id = ControllerId(self.next_id);
        self.next_id += 1;
        self.controllers.insert(id, controller);
        debug!(controller = %id, slice = %slice, "attached controller");

        for command in commands {
            self.dispatch(command);
        }
        Ok(id)
    }

    /// Runs `command` and every follow-up it triggers, first in first out.
    pub fn dispatch(&mut self, command: Command) -> Vec<Applied> {
        let mut fifo = VecDeque::from([command]);
        let mut applied = Vec::new();
        while let Some(command) = fifo.pop_front() {
            let reduction = self.reducer.reduce(&self.tree, command, &mut self.queues);
            self.tree = reduction.state;
            for step in reduction.applied {
                for observer in self.observers.iter_mut() {
                    observer.observe(&step);
                }
                for controller in self.controllers.values_mut() {
                    fifo.extend(controller.on_command(&step.command));
                }
                applied.push(step);
            }
        }
        applied
    }

    pub fn poll(&mut self, now: Instant) -> Vec<Applied> {
        let commands: Vec<Command> = self
            .controllers
            .values_mut()
            .flat_map(|controller| controller.poll(now))
            .collect();
        let mut applied = Vec::new();
        for command in commands {
            applied.extend(self.dispatch(command));
        }
        applied
    }

    pub fn detach(&mut self, id: ControllerId) -> Result<Vec<Applied>, SyncError> {
        let controller = self
            .controllers
            .get_mut(&id)
            .ok_or(SyncError::UnknownController(id.0))?;
        let commands = controller.detach();
        let slice = controller.slice().to_string();
        let queued = controller.config().enable_queue;

        let mut applied = Vec::new();
        for command in commands {
            applied.extend(self.dispatch(command));
        }
        if queued {
            let leftovers = self.queues.release(&slice);
            if !leftovers.is_empty() {
                warn!(
                    slice = %slice,
                    count = leftovers.len(),
                    "slice detached before initialization; replaying buffered commands"
                );
            }
            for command in leftovers {
                applied.extend(self.dispatch(command));
            }
            applied.extend(self.dispatch(Command::form_destroyed(slice.clone()).replay()));
        }

        self.controllers.remove(&id);
        debug!(controller = %id, slice = %slice, "detached controller");
        Ok(applied)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use formsync_core::ResetPolicy;
    use formsync_core::ResetTarget;
    use formsync_core::SyncConfig;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::field_tree::MemoryFieldTree;

    fn value(json: serde_json::Value) -> Value {
        Value::from_json(&json)
    }

    fn hero_store() -> Store {
        Store::new(value(json!({
            "hero": { "model": { "firstName": "", "aliases": [] } }
        })))
    }

    fn hero(store: &Store) -> SliceState {
        store.slice("hero").expect("hero slice")
    }

    fn bind(store: &mut Store, config: SyncConfig, ui: serde_json::Value) -> (ControllerId, MemoryFieldTree) {
        let tree = MemoryFieldTree::new(value(ui));
        let id = store
            .attach(ControllerBuilder::new(config).field_tree(tree.clone()))
            .expect("attach");
        (id, tree)
    }

    struct Recorder(Rc<RefCell<Vec<String>>>);

    impl StoreObserver for Recorder {
        fn observe(&mut self, applied: &Applied) {
            self.0.borrow_mut().push(applied.command.kind_name().to_string());
        }
    }

    #[test]
    fn hero_scenario_round_trips_through_init_edit_and_reset() {
        let mut store = hero_store();
        let (_, ui) = bind(&mut store, SyncConfig::for_slice("hero"), json!({ "firstName": "" }));

        store.dispatch(Command::init("hero", value(json!({ "firstName": "Nancy" }))));
        assert_eq!(hero(&store).model, value(json!({ "firstName": "Nancy" })));
        assert!(!hero(&store).dirty);
        assert_eq!(ui.value(), value(json!({ "firstName": "Nancy" })));

        store.dispatch(Command::update_field("hero", "firstName", Value::from("Nancy N.")));
        assert!(hero(&store).dirty);
        assert_eq!(ui.value(), value(json!({ "firstName": "Nancy N." })));

        store.dispatch(Command::reset("hero", ResetTarget::Initial));
        assert_eq!(hero(&store).model, value(json!({ "firstName": "Nancy" })));
        assert!(!hero(&store).dirty);
        assert_eq!(ui.value(), value(json!({ "firstName": "Nancy" })));
    }

    #[test]
    fn queued_slice_applies_initializer_before_earlier_edits() {
        let mut store = hero_store();
        let config = SyncConfig {
            enable_queue: true,
            ..SyncConfig::for_slice("hero")
        };
        let (_, ui) = bind(&mut store, config, json!({ "firstName": "" }));
        let edit = |name: &str| Command::update_field("hero", "firstName", Value::from(name));

        let mut applied = Vec::new();
        applied.extend(store.dispatch(edit("Edit1")));
        applied.extend(store.dispatch(edit("Edit2")));
        applied.extend(store.dispatch(Command::init("hero", value(json!({ "firstName": "Init" })))));
        applied.extend(store.dispatch(edit("Edit3")));

        let writes: Vec<String> = applied
            .iter()
            .filter(|step| step.command.kind.is_modifier())
            .map(|step| format!("{}:{}", step.command.kind_name(), step.command.deferred))
            .collect();
        assert_eq!(
            writes,
            vec!["Init:true", "UpdateField:true", "UpdateField:true", "UpdateField:false"]
        );
        assert_eq!(hero(&store).model, value(json!({ "firstName": "Edit3" })));
        assert_eq!(ui.value(), value(json!({ "firstName": "Edit3" })));
        assert!(hero(&store).dirty);
    }

    #[test]
    fn ui_edits_reach_the_store_on_poll() {
        let mut store = hero_store();
        let (_, ui) = bind(&mut store, SyncConfig::for_slice("hero"), json!({ "firstName": "" }));
        store.dispatch(Command::init("hero", value(json!({ "firstName": "Nancy" }))));

        ui.edit("firstName", Value::from("Nan"));
        let applied = store.poll(Instant::now());

        assert_eq!(applied[0].command, Command::update_field("hero", "firstName", Value::from("Nan")));
        assert_eq!(hero(&store).model, value(json!({ "firstName": "Nan" })));
        assert!(hero(&store).dirty);

        ui.submit();
        store.poll(Instant::now());
        assert!(hero(&store).submitted);
        assert!(!hero(&store).dirty);
        assert_eq!(hero(&store).status, Some(formsync_core::FormStatus::Valid));
    }

    #[test]
    fn second_controller_on_a_slice_is_rejected() {
        let mut store = hero_store();
        bind(&mut store, SyncConfig::for_slice("hero"), json!({}));

        let err = store
            .attach(
                ControllerBuilder::new(SyncConfig::for_slice("hero"))
                    .field_tree(MemoryFieldTree::default()),
            )
            .expect_err("duplicate slice");
        assert_eq!(
            err,
            SyncError::SliceAlreadyAttached {
                slice: "hero".to_string()
            }
        );
    }

    #[test]
    fn detach_with_initial_policy_restores_first_baseline() {
        let mut store = hero_store();
        let config = SyncConfig {
            reset_policy: ResetPolicy::Initial,
            ..SyncConfig::for_slice("hero")
        };
        let (id, _) = bind(&mut store, config, json!({ "firstName": "" }));
        store.dispatch(Command::init("hero", value(json!({ "firstName": "Nancy" }))));
        store.dispatch(Command::update_field("hero", "firstName", Value::from("Other")));

        let applied = store.detach(id).expect("detach");

        let kinds: Vec<&str> = applied.iter().map(|step| step.command.kind_name()).collect();
        assert_eq!(kinds, vec!["Reset", "FormDestroyed"]);
        assert_eq!(hero(&store).model, value(json!({ "firstName": "Nancy" })));
        assert!(store.controller(id).is_none());
        assert_eq!(store.detach(id), Err(SyncError::UnknownController(id.0)));
    }

    #[test]
    fn detach_of_an_uninitialized_queue_replays_leftovers_then_destroys() {
        let mut store = hero_store();
        let config = SyncConfig {
            enable_queue: true,
            reset_policy: ResetPolicy::Blank,
            ..SyncConfig::for_slice("hero")
        };
        let (id, _) = bind(&mut store, config, json!({ "firstName": "" }));
        store.dispatch(Command::update_field("hero", "firstName", Value::from("Early")));
        assert_eq!(store.queues().get("hero").map(|queue| queue.len()), Some(1));

        let applied = store.detach(id).expect("detach");

        let kinds: Vec<&str> = applied.iter().map(|step| step.command.kind_name()).collect();
        assert_eq!(kinds, vec!["UpdateField", "Reset", "FormDestroyed"]);
        assert!(applied.iter().all(|step| step.command.deferred));
        assert_eq!(hero(&store).model, Value::empty_record());
        assert!(store.queues().get("hero").is_none());
    }

    #[test]
    fn observers_see_every_applied_command_in_order() {
        let mut store = hero_store();
        let seen = Rc::new(RefCell::new(Vec::new()));
        store.add_observer(Box::new(Recorder(Rc::clone(&seen))));
        bind(&mut store, SyncConfig::for_slice("hero"), json!({ "firstName": "" }));

        store.dispatch(Command::init("hero", value(json!({ "firstName": "Nancy" }))));

        assert_eq!(
            *seen.borrow(),
            vec!["Init", "UpdateDirty", "UpdateStatus", "UpdateErrors"]
        );
    }

    #[test]
    fn auto_init_hydrates_a_late_mounted_form() {
        let mut store = Store::new(value(json!({
            "hero": { "model": { "firstName": "Nancy", "power": "flight" } }
        })));
        let config = SyncConfig {
            auto_init: true,
            ..SyncConfig::for_slice("hero")
        };

        let (id, ui) = bind(&mut store, config, json!({ "firstName": "" }));

        assert_eq!(ui.value(), value(json!({ "firstName": "Nancy" })));
        assert_eq!(hero(&store).model, value(json!({ "firstName": "Nancy" })));
        assert!(hero(&store).initialized);
        assert!(store.controller(id).is_some());
    }
}
