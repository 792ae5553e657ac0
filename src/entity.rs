use crate::types::{EntityId, Properties, SortKey, Value};
use serde::{Deserialize, Serialize};

/// Field names resolved from entity metadata rather than from `properties`.
pub const FIELD_CREATED: &str = "created";
pub const FIELD_UUID: &str = "uuid";
pub const FIELD_TYPE: &str = "type";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Entity {
    pub id: EntityId,
    pub entity_type: String,
    /// Millisecond creation timestamp, unique across the store.
    pub created: i64,
    pub properties: Properties,
}

impl Entity {
    #[must_use]
    pub const fn sort_key(&self) -> SortKey {
        SortKey::new(self.created, self.id)
    }

    /// Resolve a possibly dotted field path.
    ///
    /// `created`, `uuid` and `type` come from metadata; everything else walks
    /// nested maps inside `properties`.
    #[must_use]
    pub fn field(&self, path: &str) -> Option<Value> {
        match path {
            FIELD_CREATED => return Some(Value::Int(self.created)),
            FIELD_UUID => return Some(Value::String(self.id.to_string())),
            FIELD_TYPE => return Some(Value::String(self.entity_type.clone())),
            _ => {}
        }
        self.property(path).cloned()
    }

    /// Borrowing lookup into `properties` only.
    #[must_use]
    pub fn property(&self, path: &str) -> Option<&Value> {
        if path.is_empty() || path.len() > MAX_PATH_LEN {
            return None;
        }
        let mut segs = path.split('.');
        let mut cur = self.properties.get(segs.next()?)?;
        for (depth, seg) in segs.enumerate() {
            if depth + 1 >= MAX_PATH_DEPTH {
                return None;
            }
            match cur {
                Value::Map(m) => cur = m.get(seg)?,
                _ => return None,
            }
        }
        Some(cur)
    }

    /// JSON view with properties flattened next to the metadata fields.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        let mut obj = serde_json::Map::new();
        for (k, v) in &self.properties {
            obj.insert(k.clone(), v.to_json());
        }
        obj.insert(FIELD_UUID.into(), serde_json::Value::String(self.id.to_string()));
        obj.insert(FIELD_TYPE.into(), serde_json::Value::String(self.entity_type.clone()));
        obj.insert(FIELD_CREATED.into(), serde_json::Value::from(self.created));
        serde_json::Value::Object(obj)
    }
}

const MAX_PATH_LEN: usize = 1024;
const MAX_PATH_DEPTH: usize = 32;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::props;

    fn sample() -> Entity {
        let actor = props! { "displayName" => "Erin" };
        Entity {
            id: EntityId::new(),
            entity_type: "activities".into(),
            created: 42,
            properties: props! { "verb" => "go", "ordinal" => 7, "actor" => actor },
        }
    }

    #[test]
    fn metadata_fields_shadow_properties() {
        let mut e = sample();
        e.properties.insert("created".into(), Value::Int(-1));
        assert_eq!(e.field("created"), Some(Value::Int(42)));
        assert_eq!(e.field("type"), Some(Value::String("activities".into())));
    }

    #[test]
    fn dotted_paths_walk_nested_maps() {
        let e = sample();
        assert_eq!(e.field("actor.displayName"), Some(Value::String("Erin".into())));
        assert_eq!(e.field("verb.length"), None);
        assert_eq!(e.field("missing"), None);
        assert_eq!(e.field(""), None);
    }

    #[test]
    fn json_view_flattens_properties() {
        let e = sample();
        let j = e.to_json();
        assert_eq!(j["verb"], "go");
        assert_eq!(j["created"], 42);
        assert_eq!(j["actor"]["displayName"], "Erin");
        assert_eq!(j["uuid"], e.id.to_string());
    }
}
