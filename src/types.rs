use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Schema-less property bag of an entity, ordered by key.
pub type Properties = BTreeMap<String, Value>;

/// A wrapper around `uuid::Uuid` used as the entity primary key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityId(pub Uuid);

impl EntityId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Smallest id; sorts before every real entity sharing a timestamp.
    #[must_use]
    pub const fn min() -> Self {
        Self(Uuid::nil())
    }

    /// Largest id; sorts after every real entity sharing a timestamp.
    #[must_use]
    pub const fn max() -> Self {
        Self(Uuid::max())
    }

    /// # Errors
    /// Returns `NotFound` when the string is not a UUID, since no entity can carry it.
    pub fn parse(s: &str) -> Result<Self, crate::errors::DbError> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|_| crate::errors::DbError::NotFound(s.to_string()))
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Position of an entity inside its collection: creation time, then id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SortKey {
    pub created: i64,
    pub id: EntityId,
}

impl SortKey {
    #[must_use]
    pub const fn new(created: i64, id: EntityId) -> Self {
        Self { created, id }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Direction {
    Asc,
    #[default]
    Desc,
}

impl Direction {
    pub(crate) const fn as_byte(self) -> u8 {
        match self {
            Self::Asc => 0,
            Self::Desc => 1,
        }
    }

    pub(crate) const fn from_byte(b: u8) -> Option<Self> {
        match b {
            0 => Some(Self::Asc),
            1 => Some(Self::Desc),
            _ => None,
        }
    }
}

/// Dynamic property value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// Numeric view used by comparisons; `None` for non-numbers.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Int(_) | Self::Float(_) => "number",
            Self::String(_) => "string",
            Self::List(_) => "list",
            Self::Map(_) => "map",
        }
    }

    #[must_use]
    pub fn from_json(v: serde_json::Value) -> Self {
        use serde_json::Value as J;
        match v {
            J::Null => Self::Null,
            J::Bool(b) => Self::Bool(b),
            J::Number(n) => n
                .as_i64()
                .map_or_else(|| Self::Float(n.as_f64().unwrap_or(f64::NAN)), Self::Int),
            J::String(s) => Self::String(s),
            J::Array(items) => Self::List(items.into_iter().map(Self::from_json).collect()),
            J::Object(obj) => {
                Self::Map(obj.into_iter().map(|(k, v)| (k, Self::from_json(v))).collect())
            }
        }
    }

    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as J;
        match self {
            Self::Null => J::Null,
            Self::Bool(b) => J::Bool(*b),
            Self::Int(i) => J::from(*i),
            Self::Float(f) => serde_json::Number::from_f64(*f).map_or(J::Null, J::Number),
            Self::String(s) => J::String(s.clone()),
            Self::List(items) => J::Array(items.iter().map(Self::to_json).collect()),
            Self::Map(m) => J::Object(m.iter().map(|(k, v)| (k.clone(), v.to_json())).collect()),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(v: BTreeMap<String, Value>) -> Self {
        Self::Map(v)
    }
}

/// Convert a JSON object into a property map.
///
/// # Errors
/// Returns `InvalidArgument` when the JSON value is not an object.
pub fn properties_from_json(v: serde_json::Value) -> Result<Properties, crate::errors::DbError> {
    match Value::from_json(v) {
        Value::Map(m) => Ok(m),
        other => Err(crate::errors::DbError::InvalidArgument(format!(
            "entity properties must be an object, got {}",
            other.type_name()
        ))),
    }
}

/// Build a property map from literal pairs.
#[macro_export]
macro_rules! props {
    () => { $crate::types::Properties::new() };
    ($($k:expr => $v:expr),+ $(,)?) => {{
        let mut __m = $crate::types::Properties::new();
        $( __m.insert(String::from($k), $crate::types::Value::from($v)); )+
        __m
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sort_key_orders_by_created_then_id() {
        let a = SortKey::new(5, EntityId::max());
        let b = SortKey::new(6, EntityId::min());
        assert!(a < b);
        let c = SortKey::new(5, EntityId::min());
        assert!(c < a);
    }

    #[test]
    fn json_conversion_keeps_nested_maps_and_integers() {
        let j = serde_json::json!({"actor": {"displayName": "Erin"}, "ordinal": 3, "score": 1.5});
        let p = properties_from_json(j.clone()).unwrap();
        assert_eq!(p.get("ordinal"), Some(&Value::Int(3)));
        assert_eq!(p.get("score"), Some(&Value::Float(1.5)));
        assert!(matches!(p.get("actor"), Some(Value::Map(_))));
        assert_eq!(Value::Map(p).to_json(), j);
    }

    #[test]
    fn non_object_properties_are_rejected() {
        let err = properties_from_json(serde_json::json!([1, 2])).unwrap_err();
        assert!(matches!(err, crate::errors::DbError::InvalidArgument(_)));
    }

    #[test]
    fn direction_byte_round_trip() {
        for d in [Direction::Asc, Direction::Desc] {
            assert_eq!(Direction::from_byte(d.as_byte()), Some(d));
        }
        assert_eq!(Direction::from_byte(9), None);
    }
}
