use serde_json::json;

pub(super) use super::transition;
pub(super) use super::Applied;
pub(super) use super::Reduction;
pub(super) use super::SliceReducer;
pub(super) use crate::commands::Command;
pub(super) use crate::commands::ResetTarget;
pub(super) use crate::path;
pub(super) use crate::queue::QueueRegistry;
pub(super) use crate::state::ErrorMap;
pub(super) use crate::state::FormStatus;
pub(super) use crate::state::SliceState;
pub(super) use crate::value::Value;


const HERO: &str = "hero";

fn value(json: serde_json::Value) -> Value {
    Value::from_json(&json)
}

fn hero_tree() -> Value {
    value(json!({
        "hero": { "model": { "firstName": "", "aliases": [] } },
        "other": { "untouched": true }
    }))
}

fn slice(tree: &Value) -> SliceState {
    SliceState::read(tree, HERO).expect("hero slice")
}

fn model(tree: &Value) -> Value {
    slice(tree).model
}

/// Runs `commands` through one reducer and registry, threading the tree.
fn run(
    reducer: &mut SliceReducer,
    queues: &mut QueueRegistry,
    tree: Value,
    commands: impl IntoIterator<Item = Command>,
) -> (Value, Vec<Applied>) {
    let mut state = tree;
    let mut applied = Vec::new();
    for command in commands {
        let Reduction {
            state: next,
            applied: step,
        } = reducer.reduce(&state, command, queues);
        state = next;
        applied.extend(step);
    }
    (state, applied)
}

fn kinds(applied: &[Applied]) -> Vec<&'static str> {
    applied
        .iter()
        .map(|applied| applied.command.kind_name())
        .collect()
}
