//! Closed value model for form models and store trees.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use chrono::DateTime;
use chrono::SecondsFormat;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

pub const TEMPORAL_TAG: &str = "$date";
pub const BOXED_TAG: &str = "$boxed";
pub const SET_TAG: &str = "$set";
pub const MAP_TAG: &str = "$map";

#[derive(Debug, Clone)]
pub enum Scalar {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(Arc<str>),
}

impl Scalar {
    fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(value) => Some(*value as f64),
            Self::Float(value) => Some(*value),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Text(_) => "text",
        }
    }

    fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Null => serde_json::Value::Null,
            Self::Bool(value) => serde_json::Value::Bool(*value),
            Self::Int(value) => serde_json::Value::from(*value),
            Self::Float(value) => serde_json::Number::from_f64(*value)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Self::Text(value) => serde_json::Value::String(value.to_string()),
        }
    }

    fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Null => Some(Self::Null),
            serde_json::Value::Bool(value) => Some(Self::Bool(*value)),
            serde_json::Value::Number(number) => Some(match number.as_i64() {
                Some(value) => Self::Int(value),
                None => Self::Float(number.as_f64().unwrap_or(f64::NAN)),
            }),
            serde_json::Value::String(value) => Some(Self::Text(Arc::from(value.as_str()))),
            _ => None,
        }
    }
}

// Numbers compare by magnitude, so `Int(1) == Float(1.0)`.
impl PartialEq for Scalar {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Text(a), Self::Text(b)) => a == b,
            (a, b) => match (a.as_f64(), b.as_f64()) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            },
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(value) => write!(f, "{value}"),
            Self::Int(value) => write!(f, "{value}"),
            Self::Float(value) => write!(f, "{value}"),
            Self::Text(value) => f.write_str(value),
        }
    }
}

/// A node of a form model or of the global store tree.
///
/// Containers keep their children behind `Arc`, so `clone` is shallow and
/// untouched subtrees can be shared between successive trees. Use
/// [`Value::same`] to observe that sharing and [`Value::deep_clone`] to break it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "serde_json::Value", into = "serde_json::Value")]
pub enum Value {
    Scalar(Scalar),
    /// A primitive wrapped in an object; compared through its primitive.
    Boxed(Scalar),
    Temporal(DateTime<Utc>),
    Sequence(Arc<Vec<Value>>),
    Record(Arc<BTreeMap<String, Value>>),
    /// Associative collection with arbitrary keys, in insertion order.
    Map(Arc<Vec<(Value, Value)>>),
    Set(Arc<Vec<Value>>),
}

impl Value {
    pub fn null() -> Self {
        Self::Scalar(Scalar::Null)
    }

    pub fn empty_record() -> Self {
        Self::Record(Arc::new(BTreeMap::new()))
    }

    pub fn empty_sequence() -> Self {
        Self::Sequence(Arc::new(Vec::new()))
    }

    pub fn record<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Self::Record(Arc::new(
            entries
                .into_iter()
                .map(|(key, value)| (key.into(), value))
                .collect(),
        ))
    }

    pub fn sequence<I>(items: I) -> Self
    where
        I: IntoIterator<Item = Value>,
    {
        Self::Sequence(Arc::new(items.into_iter().collect()))
    }

    pub fn map<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (Value, Value)>,
    {
        Self::Map(Arc::new(entries.into_iter().collect()))
    }

    pub fn set<I>(items: I) -> Self
    where
        I: IntoIterator<Item = Value>,
    {
        let mut members: Vec<Value> = Vec::new();
        for item in items {
            if !members.iter().any(|member| crate::diff::equal(member, &item)) {
                members.push(item);
            }
        }
        Self::Set(Arc::new(members))
    }

    pub fn boxed(scalar: Scalar) -> Self {
        Self::Boxed(scalar)
    }

    pub fn temporal(at: DateTime<Utc>) -> Self {
        Self::Temporal(at)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Scalar(_) => "scalar",
            Self::Boxed(_) => "boxed",
            Self::Temporal(_) => "temporal",
            Self::Sequence(_) => "sequence",
            Self::Record(_) => "record",
            Self::Map(_) => "map",
            Self::Set(_) => "set",
        }
    }

    pub fn is_container(&self) -> bool {
        matches!(
            self,
            Self::Sequence(_) | Self::Record(_) | Self::Map(_) | Self::Set(_)
        )
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Scalar(Scalar::Null))
    }

    pub fn is_empty_container(&self) -> bool {
        match self {
            Self::Sequence(items) | Self::Set(items) => items.is_empty(),
            Self::Record(entries) => entries.is_empty(),
            Self::Map(entries) => entries.is_empty(),
            _ => false,
        }
    }

    /// Leaves stop the diff engine's descent: everything except non-empty
    /// records and maps.
    pub fn is_leaf(&self) -> bool {
        match self {
            Self::Record(entries) => entries.is_empty(),
            Self::Map(entries) => entries.is_empty(),
            _ => true,
        }
    }

    /// The primitive behind a boxed scalar or a temporal (epoch millis).
    pub fn primitive(&self) -> Option<Scalar> {
        match self {
            Self::Boxed(scalar) => Some(scalar.clone()),
            Self::Temporal(at) => Some(Scalar::Int(at.timestamp_millis())),
            _ => None,
        }
    }

    /// Identity check: same allocation for containers, equal primitives for
    /// scalars. Boxed values and temporals are never identical to anything.
    pub fn same(&self, other: &Value) -> bool {
        match (self, other) {
            (Self::Scalar(a), Self::Scalar(b)) => a == b,
            (Self::Sequence(a), Self::Sequence(b)) | (Self::Set(a), Self::Set(b)) => {
                Arc::ptr_eq(a, b)
            }
            (Self::Record(a), Self::Record(b)) => Arc::ptr_eq(a, b),
            (Self::Map(a), Self::Map(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    pub fn deep_clone(&self) -> Value {
        match self {
            Self::Scalar(Scalar::Text(text)) => Self::Scalar(Scalar::Text(Arc::from(&**text))),
            Self::Scalar(scalar) => Self::Scalar(scalar.clone()),
            Self::Boxed(Scalar::Text(text)) => Self::Boxed(Scalar::Text(Arc::from(&**text))),
            Self::Boxed(scalar) => Self::Boxed(scalar.clone()),
            Self::Temporal(at) => Self::Temporal(*at),
            Self::Sequence(items) => {
                Self::Sequence(Arc::new(items.iter().map(Value::deep_clone).collect()))
            }
            Self::Set(items) => Self::Set(Arc::new(items.iter().map(Value::deep_clone).collect())),
            Self::Record(entries) => Self::Record(Arc::new(
                entries
                    .iter()
                    .map(|(key, value)| (key.clone(), value.deep_clone()))
                    .collect(),
            )),
            Self::Map(entries) => Self::Map(Arc::new(
                entries
                    .iter()
                    .map(|(key, value)| (key.deep_clone(), value.deep_clone()))
                    .collect(),
            )),
        }
    }

    pub fn as_record(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Self::Record(entries) => Some(entries),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&[Value]> {
        match self {
            Self::Sequence(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Scalar(Scalar::Text(text)) => Some(text),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Scalar(Scalar::Bool(value)) => Some(*value),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Scalar(Scalar::Int(value)) => Some(*value),
            _ => None,
        }
    }

    /// Path segment used for a map key; only scalar keys are addressable.
    pub fn key_segment(&self) -> Option<String> {
        match self {
            Self::Scalar(scalar) => Some(scalar.to_string()),
            _ => None,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Scalar(scalar) => scalar.to_json(),
            Self::Boxed(scalar) => tagged(BOXED_TAG, scalar.to_json()),
            Self::Temporal(at) => tagged(
                TEMPORAL_TAG,
                serde_json::Value::String(at.to_rfc3339_opts(SecondsFormat::Millis, true)),
            ),
            Self::Sequence(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Self::Set(items) => tagged(
                SET_TAG,
                serde_json::Value::Array(items.iter().map(Value::to_json).collect()),
            ),
            Self::Record(entries) => serde_json::Value::Object(
                entries
                    .iter()
                    .map(|(key, value)| (key.clone(), value.to_json()))
                    .collect(),
            ),
            Self::Map(entries) => tagged(
                MAP_TAG,
                serde_json::Value::Array(
                    entries
                        .iter()
                        .map(|(key, value)| {
                            serde_json::Value::Array(vec![key.to_json(), value.to_json()])
                        })
                        .collect(),
                ),
            ),
        }
    }

    pub fn from_json(value: &serde_json::Value) -> Value {
        if let Some(scalar) = Scalar::from_json(value) {
            return Self::Scalar(scalar);
        }
        match value {
            serde_json::Value::Array(items) => {
                Self::Sequence(Arc::new(items.iter().map(Value::from_json).collect()))
            }
            serde_json::Value::Object(entries) => {
                if let Some(tagged) = from_tagged(entries) {
                    return tagged;
                }
                Self::Record(Arc::new(
                    entries
                        .iter()
                        .map(|(key, value)| (key.clone(), Value::from_json(value)))
                        .collect(),
                ))
            }
            _ => Self::null(),
        }
    }
}

fn tagged(tag: &str, inner: serde_json::Value) -> serde_json::Value {
    let mut object = serde_json::Map::new();
    object.insert(tag.to_string(), inner);
    serde_json::Value::Object(object)
}

fn from_tagged(entries: &serde_json::Map<String, serde_json::Value>) -> Option<Value> {
    if entries.len() != 1 {
        return None;
    }
    let (tag, inner) = entries.iter().next()?;
    match (tag.as_str(), inner) {
        (TEMPORAL_TAG, serde_json::Value::String(raw)) => DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|at| Value::Temporal(at.with_timezone(&Utc))),
        (BOXED_TAG, inner) => Scalar::from_json(inner).map(Value::Boxed),
        (SET_TAG, serde_json::Value::Array(items)) => {
            Some(Value::set(items.iter().map(Value::from_json)))
        }
        (MAP_TAG, serde_json::Value::Array(pairs)) => {
            let mut entries = Vec::with_capacity(pairs.len());
            for pair in pairs {
                let serde_json::Value::Array(pair) = pair else {
                    return None;
                };
                let [key, value] = pair.as_slice() else {
                    return None;
                };
                entries.push((Value::from_json(key), Value::from_json(value)));
            }
            Some(Value::Map(Arc::new(entries)))
        }
        _ => None,
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        crate::diff::equal(self, other)
    }
}

impl Default for Value {
    fn default() -> Self {
        Self::empty_record()
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        Value::from_json(&value)
    }
}

impl From<Value> for serde_json::Value {
    fn from(value: Value) -> Self {
        value.to_json()
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Scalar(Scalar::Bool(value))
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Scalar(Scalar::Int(value))
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Scalar(Scalar::Int(i64::from(value)))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Scalar(Scalar::Float(value))
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Scalar(Scalar::Text(Arc::from(value)))
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Scalar(Scalar::Text(Arc::from(value)))
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Temporal(value)
    }
}
