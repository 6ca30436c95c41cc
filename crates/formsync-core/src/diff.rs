use std::collections::BTreeMap;

use serde::Serialize;

use super::path;
use super::value::Value;

/// Structural equality over the closed value model.
pub fn equal(left: &Value, right: &Value) -> bool {
    if left.same(right) {
        return true;
    }
    match (left, right) {
        (Value::Scalar(a), Value::Scalar(b)) => a == b,
        (Value::Boxed(_) | Value::Temporal(_), Value::Boxed(_) | Value::Temporal(_)) => {
            left.primitive() == right.primitive()
        }
        (Value::Map(a), Value::Map(b)) => {
            a.len() == b.len()
                && a.iter().all(|(key, value)| {
                    b.iter()
                        .any(|(other_key, other)| equal(key, other_key) && equal(value, other))
                })
        }
        (Value::Set(a), Value::Set(b)) => {
            a.len() == b.len() && a.iter().all(|item| b.iter().any(|other| equal(item, other)))
        }
        (Value::Sequence(a), Value::Sequence(b)) => {
            a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| equal(x, y))
        }
        (Value::Record(a), Value::Record(b)) => {
            a.len() == b.len()
                && a.iter()
                    .all(|(key, value)| b.get(key).map_or(false, |other| equal(value, other)))
        }
        _ => false,
    }
}

/// Dotted paths of every leaf below `value`, in key order.
pub fn leaf_paths(value: &Value) -> Vec<String> {
    flatten(value).into_keys().collect()
}

fn flatten(value: &Value) -> BTreeMap<String, &Value> {
    let mut out = BTreeMap::new();
    if !value.is_leaf() {
        flatten_into(value, "", &mut out);
    }
    out
}

fn flatten_into<'a>(value: &'a Value, prefix: &str, out: &mut BTreeMap<String, &'a Value>) {
    match value {
        Value::Record(entries) => {
            for (key, child) in entries.iter() {
                visit(prefix, key, child, out);
            }
        }
        Value::Map(entries) => {
            for (key, child) in entries.iter() {
                if let Some(segment) = key.key_segment() {
                    visit(prefix, &segment, child, out);
                }
            }
        }
        _ => {}
    }
}

fn visit<'a>(prefix: &str, segment: &str, child: &'a Value, out: &mut BTreeMap<String, &'a Value>) {
    let path = path::join(prefix, segment);
    if child.is_leaf() {
        out.insert(path, child);
    } else {
        flatten_into(child, &path, out);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Difference {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub added: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub removed: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub changed: Option<Value>,
}

impl Difference {
    pub fn is_empty(&self) -> bool {
        self.added.is_none() && self.removed.is_none() && self.changed.is_none()
    }
}

fn sparse<'a>(entries: impl IntoIterator<Item = (&'a String, &'a Value)>) -> Option<Value> {
    let mut tree: Option<Value> = None;
    for (path, value) in entries {
        let base = tree.take().unwrap_or_else(Value::empty_record);
        tree = Some(path::set(&base, path, value.clone()));
    }
    tree
}

/// Leaf-level difference between two trees.
///
/// `changed` carries the values from `after`. Each side is a sparse tree
/// holding only the affected paths, or `None` when nothing of that kind
/// happened.
pub fn diff(before: &Value, after: &Value) -> Difference {
    let before = flatten(before);
    let after = flatten(after);

    let changed = before.iter().filter_map(|(path, previous)| {
        after
            .get_key_value(path)
            .filter(|(_, current)| !equal(previous, current))
    });
    let removed = before.iter().filter(|(path, _)| !after.contains_key(*path));
    let added = after.iter().filter(|(path, _)| !before.contains_key(*path));

    Difference {
        added: sparse(added.map(|(path, value)| (path, *value))),
        removed: sparse(removed.map(|(path, value)| (path, *value))),
        changed: sparse(changed.map(|(path, value)| (path, *value))),
    }
}
