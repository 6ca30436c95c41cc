use std::time::Duration;
use std::time::Instant;

use formsync_core::ErrorMap;
use formsync_core::ResetPolicy;
use pretty_assertions::assert_eq;
use serde_json::json;

use super::*;
use crate::field_tree::MemoryFieldTree;

const SLICE: &str = "hero";

fn value(json: serde_json::Value) -> Value {
    Value::from_json(&json)
}

fn attach(config: SyncConfig, ui: Value) -> (Controller, MemoryFieldTree) {
    let tree = MemoryFieldTree::new(ui);
    let (controller, commands) = ControllerBuilder::new(config)
        .field_tree(tree.clone())
        .attach(None)
        .expect("attach");
    assert!(commands.is_empty());
    (controller, tree)
}

fn initialized(config: SyncConfig, model: serde_json::Value) -> (Controller, MemoryFieldTree) {
    let (mut controller, tree) = attach(config, Value::empty_record());
    controller.on_command(&Command::init(SLICE, value(model)));
    (controller, tree)
}

fn validation_commands() -> Vec<Command> {
    vec![
        Command::update_status(SLICE, FormStatus::Valid),
        Command::update_errors(SLICE, None),
    ]
}

#[test]
fn first_init_patches_ui_and_publishes_pristine() {
    let (mut controller, tree) = attach(SyncConfig::for_slice(SLICE), value(json!({ "a": 0 })));
    assert_eq!(controller.state(), ControllerState::AwaitingInitialization);

    let out = controller.on_command(&Command::init(SLICE, value(json!({ "a": 1 }))));

    let mut expected = vec![Command::update_dirty(SLICE, false)];
    expected.extend(validation_commands());
    assert_eq!(out, expected);
    assert_eq!(controller.state(), ControllerState::Initialized);
    assert_eq!(tree.value(), value(json!({ "a": 1 })));
    assert_eq!(controller.initial_state(), Some(&value(json!({ "a": 1 }))));
    assert_eq!(tree.pending_events(), 0);
}

#[test]
fn ui_edit_publishes_field_and_submit_captures_baseline() {
    let (mut controller, tree) = initialized(SyncConfig::for_slice(SLICE), json!({ "a": 1 }));
    let now = Instant::now();

    tree.edit("a", Value::from(2));
    let out = controller.poll(now);

    assert_eq!(
        out,
        vec![
            Command::update_field(SLICE, "a", Value::from(2)),
            Command::update_dirty(SLICE, true),
        ]
    );
    assert!(tree.dirty());

    tree.submit();
    let out = controller.poll(now);

    assert_eq!(
        out,
        vec![
            Command::update_form(SLICE, value(json!({ "a": 2 }))),
            Command::submitted(SLICE),
            Command::update_dirty(SLICE, false),
        ]
    );
    assert!(!tree.dirty());
    assert_eq!(
        controller
            .submitted_state()
            .and_then(|state| path::get(state, "a")),
        Some(&Value::from(2))
    );
}

#[test]
fn store_echo_of_ui_value_is_not_patched_back() {
    let (mut controller, tree) = initialized(SyncConfig::for_slice(SLICE), json!({ "a": 1 }));
    tree.edit("a", Value::from(2));
    controller.poll(Instant::now());
    let patches = tree.patch_count();

    assert!(controller
        .on_command(&Command::update_field(SLICE, "a", Value::from(2)))
        .is_empty());
    assert!(controller
        .on_command(&Command::update_form(SLICE, value(json!({ "a": 2 }))))
        .is_empty());
    assert_eq!(tree.patch_count(), patches);
}

#[test]
fn store_field_update_patches_ui_and_recomputes_dirty() {
    let (mut controller, tree) = initialized(SyncConfig::for_slice(SLICE), json!({ "a": 1 }));

    let out = controller.on_command(&Command::update_field(SLICE, "a", Value::from(3)));

    assert_eq!(out, vec![Command::update_dirty(SLICE, true)]);
    assert_eq!(tree.value(), value(json!({ "a": 3 })));
    assert!(tree.dirty());
    assert_eq!(tree.pending_events(), 0);
    assert_eq!(controller.edit_count(), 0);
}

#[test]
fn commands_for_other_slices_are_ignored() {
    let (mut controller, tree) = initialized(SyncConfig::for_slice(SLICE), json!({ "a": 1 }));
    let out = controller.on_command(&Command::update_field("villain", "a", Value::from(3)));
    assert!(out.is_empty());
    assert_eq!(tree.value(), value(json!({ "a": 1 })));
}

#[test]
fn edits_wait_for_the_debounce_window() {
    let config = SyncConfig {
        debounce_ms: 300,
        ..SyncConfig::for_slice(SLICE)
    };
    let (mut controller, tree) = initialized(config, json!({ "a": 1 }));
    let start = Instant::now();

    tree.edit("a", Value::from(2));
    assert!(controller.poll(start).is_empty());
    tree.edit("a", Value::from(3));
    assert!(controller.poll(start + Duration::from_millis(200)).is_empty());
    assert!(controller.poll(start + Duration::from_millis(400)).is_empty());

    let out = controller.poll(start + Duration::from_millis(500));
    assert_eq!(out[0], Command::update_field(SLICE, "a", Value::from(3)));
    assert_eq!(controller.edit_count(), 2);
}

#[test]
fn several_touched_paths_publish_the_whole_form() {
    let (mut controller, tree) =
        initialized(SyncConfig::for_slice(SLICE), json!({ "a": 1, "b": 1 }));

    tree.edit("a", Value::from(2));
    tree.edit("b", Value::from(2));
    let out = controller.poll(Instant::now());

    assert_eq!(out[0], Command::update_form(SLICE, value(json!({ "a": 2, "b": 2 }))));
}

#[test]
fn events_before_initialization_stay_pending() {
    let (mut controller, tree) = attach(SyncConfig::for_slice(SLICE), value(json!({ "a": 0 })));
    let now = Instant::now();

    tree.edit("b", Value::from("typed early"));
    assert!(controller.poll(now).is_empty());
    assert_eq!(controller.pending_events(), 1);

    controller.on_command(&Command::init(SLICE, value(json!({ "a": 1 }))));
    let out = controller.poll(now);

    assert_eq!(
        out,
        vec![Command::update_field(SLICE, "b", Value::from("typed early"))]
    );
    assert_eq!(tree.value(), value(json!({ "a": 1, "b": "typed early" })));
}

#[test]
fn blur_trigger_holds_edits_until_blur() {
    let config = SyncConfig {
        update_on: UpdateTrigger::Blur,
        ..SyncConfig::for_slice(SLICE)
    };
    let (mut controller, tree) = initialized(config, json!({ "a": 1 }));
    let now = Instant::now();

    tree.edit("a", Value::from(2));
    assert_eq!(controller.poll(now), vec![Command::update_dirty(SLICE, true)]);
    assert!(controller.poll(now).is_empty());

    tree.blur("a");
    assert_eq!(
        controller.poll(now),
        vec![Command::update_field(SLICE, "a", Value::from(2))]
    );
}

#[test]
fn submit_trigger_only_tracks_dirtiness_for_edits() {
    let config = SyncConfig {
        update_on: UpdateTrigger::Submit,
        ..SyncConfig::for_slice(SLICE)
    };
    let (mut controller, tree) = initialized(config, json!({ "a": 1 }));

    tree.edit("a", Value::from(2));
    assert_eq!(
        controller.poll(Instant::now()),
        vec![Command::update_dirty(SLICE, true)]
    );
}

#[test]
fn submit_is_ignored_while_invalid() {
    let (mut controller, tree) = initialized(SyncConfig::for_slice(SLICE), json!({ "a": 1 }));
    let errors = ErrorMap::from([("required".to_string(), "a is required".to_string())]);
    tree.set_validation(FormStatus::Invalid, Some(errors.clone()));

    tree.submit();
    let out = controller.poll(Instant::now());

    assert_eq!(
        out,
        vec![
            Command::update_status(SLICE, FormStatus::Invalid),
            Command::update_errors(SLICE, Some(errors)),
        ]
    );
    assert_eq!(controller.submitted_state(), None);
}

#[test]
fn rejected_submit_still_publishes_edits_from_the_same_window() {
    let (mut controller, tree) = initialized(SyncConfig::for_slice(SLICE), json!({ "a": 1 }));
    tree.set_validation(FormStatus::Invalid, None);

    tree.edit("a", Value::from(2));
    tree.submit();
    let out = controller.poll(Instant::now());

    assert_eq!(
        out,
        vec![
            Command::update_field(SLICE, "a", Value::from(2)),
            Command::update_dirty(SLICE, true),
            Command::update_status(SLICE, FormStatus::Invalid),
            Command::update_errors(SLICE, None),
        ]
    );
    assert_eq!(controller.pending_events(), 0);
    assert_eq!(controller.submitted_state(), None);
    assert!(tree.dirty());
}

#[test]
fn rejected_submit_under_submit_trigger_only_refreshes_dirty() {
    let config = SyncConfig {
        update_on: UpdateTrigger::Submit,
        ..SyncConfig::for_slice(SLICE)
    };
    let (mut controller, tree) = initialized(config, json!({ "a": 1 }));
    tree.set_validation(FormStatus::Invalid, None);

    tree.edit("a", Value::from(2));
    tree.submit();
    let out = controller.poll(Instant::now());

    assert_eq!(
        out,
        vec![
            Command::update_dirty(SLICE, true),
            Command::update_status(SLICE, FormStatus::Invalid),
            Command::update_errors(SLICE, None),
        ]
    );
}

#[test]
fn pending_validation_is_never_published() {
    let (mut controller, tree) = initialized(SyncConfig::for_slice(SLICE), json!({ "a": 1 }));
    tree.set_validation(FormStatus::Pending, None);

    tree.edit("a", Value::from(2));
    let out = controller.poll(Instant::now());

    assert_eq!(
        out,
        vec![
            Command::update_field(SLICE, "a", Value::from(2)),
            Command::update_dirty(SLICE, true),
        ]
    );
}

#[test]
fn reset_requests_resolve_to_baselines() {
    let (mut controller, tree) = initialized(SyncConfig::for_slice(SLICE), json!({ "a": 1 }));
    tree.edit("a", Value::from(2));
    controller.poll(Instant::now());

    let out = controller.on_command(&Command::reset(SLICE, ResetTarget::Initial));
    assert_eq!(out, vec![Command::update_form(SLICE, value(json!({ "a": 1 })))]);

    let out = controller.on_command(&Command::reset(SLICE, ResetTarget::Submitted));
    assert_eq!(out, vec![Command::update_form(SLICE, value(json!({ "a": 1 })))]);
}

#[test]
fn blank_reset_restores_field_defaults() {
    let (mut controller, tree) = attach(SyncConfig::for_slice(SLICE), value(json!({ "a": null })));
    controller.on_command(&Command::init(SLICE, value(json!({ "a": 1 }))));

    let out = controller.on_command(&Command::reset(SLICE, ResetTarget::Blank));

    assert_eq!(
        out,
        vec![
            Command::update_form(SLICE, value(json!({ "a": null }))),
            Command::update_dirty(SLICE, true),
        ]
    );
    assert_eq!(tree.value(), value(json!({ "a": null })));
}

#[test]
fn reset_before_initialization_runs_after_it() {
    let (mut controller, _tree) = attach(SyncConfig::for_slice(SLICE), Value::empty_record());
    assert!(controller
        .on_command(&Command::reset(SLICE, ResetTarget::Initial))
        .is_empty());

    let out = controller.on_command(&Command::init(SLICE, value(json!({ "a": 1 }))));
    assert_eq!(
        out.last(),
        Some(&Command::update_form(SLICE, value(json!({ "a": 1 }))))
    );
}

#[test]
fn later_init_keeps_the_first_baseline() {
    let config = SyncConfig {
        reset_policy: ResetPolicy::Initial,
        ..SyncConfig::for_slice(SLICE)
    };
    let (mut controller, tree) = initialized(config, json!({ "a": 1 }));

    let out = controller.on_command(&Command::init(SLICE, value(json!({ "a": 7 }))));

    assert_eq!(out, vec![Command::update_dirty(SLICE, true)]);
    assert_eq!(tree.value(), value(json!({ "a": 7 })));
    assert_eq!(
        controller.detach(),
        vec![
            Command::reset_to(SLICE, ResetTarget::Initial, value(json!({ "a": 1 }))),
            Command::form_destroyed(SLICE),
        ]
    );
}

#[test]
fn later_init_matching_the_baseline_stays_quiet() {
    let (mut controller, tree) = initialized(SyncConfig::for_slice(SLICE), json!({ "a": 1 }));

    let out = controller.on_command(&Command::init(SLICE, value(json!({ "a": 1 }))));

    assert_eq!(out, Vec::new());
    assert!(!tree.dirty());
}

#[test]
fn detach_blank_carries_an_empty_model() {
    let config = SyncConfig {
        reset_policy: ResetPolicy::Blank,
        enable_queue: true,
        ..SyncConfig::for_slice(SLICE)
    };
    let (mut controller, tree) = initialized(config, json!({ "a": 1 }));

    let out = controller.detach();

    assert_eq!(
        out,
        vec![Command::reset_to(SLICE, ResetTarget::Blank, Value::empty_record())]
    );
    assert_eq!(controller.state(), ControllerState::Detached);

    tree.edit("a", Value::from(9));
    assert!(controller.poll(Instant::now()).is_empty());
    assert!(controller
        .on_command(&Command::init(SLICE, value(json!({ "a": 2 }))))
        .is_empty());
    assert!(controller.detach().is_empty());
}

#[test]
fn attach_rejects_incomplete_bindings() {
    let missing_slice = ControllerBuilder::new(SyncConfig::default())
        .field_tree(MemoryFieldTree::default())
        .attach(None);
    assert!(matches!(missing_slice, Err(SyncError::MissingSlice)));

    let missing_tree = ControllerBuilder::new(SyncConfig::for_slice(SLICE)).attach(None);
    assert!(matches!(
        missing_tree,
        Err(SyncError::MissingFieldTree { slice }) if slice == SLICE
    ));
}

#[test]
fn auto_init_hydrates_from_the_overlap_with_the_store() {
    let config = SyncConfig {
        auto_init: true,
        ..SyncConfig::for_slice(SLICE)
    };
    let ui = value(json!({ "firstName": "", "lastName": "" }));
    let store = value(json!({ "firstName": "Nancy", "power": "flight" }));

    let (_, hydrated) = ControllerBuilder::new(config.clone())
        .field_tree(MemoryFieldTree::new(ui.clone()))
        .attach(Some(&store))
        .expect("attach");
    assert_eq!(
        hydrated,
        vec![Command::init(SLICE, value(json!({ "firstName": "Nancy" })))]
    );

    let (_, fresh) = ControllerBuilder::new(config)
        .field_tree(MemoryFieldTree::new(ui.clone()))
        .attach(None)
        .expect("attach");
    assert_eq!(fresh, vec![Command::init(SLICE, ui)]);
}
