use std::collections::BTreeMap;
use std::sync::Arc;

use super::value::Value;

pub const SEPARATOR: char = '.';

pub fn join(prefix: &str, segment: &str) -> String {
    if prefix.is_empty() {
        segment.to_string()
    } else {
        format!("{prefix}{SEPARATOR}{segment}")
    }
}

fn child<'a>(node: &'a Value, segment: &str) -> Option<&'a Value> {
    match node {
        Value::Record(entries) => entries.get(segment),
        Value::Sequence(items) => segment
            .parse::<usize>()
            .ok()
            .and_then(|index| items.get(index)),
        Value::Map(entries) => entries
            .iter()
            .find(|(key, _)| key.key_segment().as_deref() == Some(segment))
            .map(|(_, value)| value),
        _ => None,
    }
}

/// Walks `path` from `tree`. An empty path addresses the tree itself.
pub fn get<'a>(tree: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return Some(tree);
    }
    path.split(SEPARATOR)
        .try_fold(tree, |node, segment| child(node, segment))
}

/// Returns a copy of `tree` with `value` stored at `path`.
///
/// Every container on the way down is shallow-copied; everything off the
/// path is shared with `tree`. Missing intermediates become a sequence when
/// the next segment is `0` and a record otherwise. An index past the end of
/// a sequence turns it into a record keyed by index.
pub fn set(tree: &Value, path: &str, value: Value) -> Value {
    if path.is_empty() {
        return value;
    }
    let segments: Vec<&str> = path.split(SEPARATOR).collect();
    set_segments(tree, &segments, value)
}

fn set_segments(node: &Value, segments: &[&str], value: Value) -> Value {
    let Some((head, rest)) = segments.split_first() else {
        return value;
    };
    let next = match rest.first() {
        None => value,
        Some(next_segment) => {
            let existing = child(node, head).filter(|existing| existing.is_container());
            match existing {
                Some(existing) => set_segments(existing, rest, value),
                None => {
                    let fresh = if *next_segment == "0" {
                        Value::empty_sequence()
                    } else {
                        Value::empty_record()
                    };
                    set_segments(&fresh, rest, value)
                }
            }
        }
    };
    with_child(node, head, next)
}

fn with_child(node: &Value, segment: &str, next: Value) -> Value {
    match node {
        Value::Record(entries) => {
            let mut entries = (**entries).clone();
            entries.insert(segment.to_string(), next);
            Value::Record(Arc::new(entries))
        }
        Value::Sequence(items) => match segment.parse::<usize>() {
            Ok(index) if index <= items.len() => {
                let mut items = (**items).clone();
                if index == items.len() {
                    items.push(next);
                } else {
                    items[index] = next;
                }
                Value::Sequence(Arc::new(items))
            }
            // Past the end the sequence becomes a record keyed by index.
            _ => {
                let mut entries: BTreeMap<String, Value> = items
                    .iter()
                    .enumerate()
                    .map(|(index, item)| (index.to_string(), item.clone()))
                    .collect();
                entries.insert(segment.to_string(), next);
                Value::Record(Arc::new(entries))
            }
        },
        Value::Map(entries) => {
            let mut entries = (**entries).clone();
            match entries
                .iter_mut()
                .find(|(key, _)| key.key_segment().as_deref() == Some(segment))
            {
                Some(entry) => entry.1 = next,
                None => entries.push((Value::from(segment), next)),
            }
            Value::Map(Arc::new(entries))
        }
        _ => Value::record([(segment, next)]),
    }
}

/// Top-level entries of `left` whose keys also exist in `right`.
pub fn intersection(left: &Value, right: &Value) -> Value {
    let (Some(left), Some(right)) = (left.as_record(), right.as_record()) else {
        return Value::empty_record();
    };
    Value::record(
        left.iter()
            .filter(|(key, _)| right.contains_key(*key))
            .map(|(key, value)| (key.clone(), value.clone())),
    )
}
