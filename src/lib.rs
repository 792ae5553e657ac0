//! appgrid: multi-tenant entity store with a small query language and
//! cursor-based pagination.
//!
//! Entities are schemaless property bags tagged with an entity type, ordered
//! by a strictly increasing `created` timestamp. Queries filter one type with
//! a predicate and return bounded pages plus an opaque cursor for the next one.

pub mod config;
pub mod entity;
pub mod errors;
pub mod logger;
pub mod query;
pub mod store;
pub mod types;

use crate::entity::Entity;
use crate::errors::DbError;
use crate::query::{Page, QueryEngine};
use crate::types::{EntityId, properties_from_json};
use std::sync::Arc;
use uuid::Uuid;

/// A tenant's view of a shared engine.
///
/// Collections are stored under the type `{app_id}/{collection}`, so two
/// applications never see each other's entities and a cursor minted for one
/// application is rejected by every other.
#[derive(Clone)]
pub struct Application {
    id: Uuid,
    engine: Arc<QueryEngine>,
}

impl Application {
    #[must_use]
    pub const fn new(id: Uuid, engine: Arc<QueryEngine>) -> Self {
        Self { id, engine }
    }

    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    #[must_use]
    pub fn engine(&self) -> &Arc<QueryEngine> {
        &self.engine
    }

    /// Fully qualified entity type for one of this application's collections.
    ///
    /// # Errors
    /// `InvalidArgument` for an empty name or one containing `/`.
    pub fn entity_type(&self, collection: &str) -> Result<String, DbError> {
        if collection.is_empty() || collection.contains('/') {
            return Err(DbError::InvalidArgument(format!("invalid collection name '{collection}'")));
        }
        Ok(format!("{}/{collection}", self.id))
    }

    /// Create an entity from a JSON object.
    ///
    /// # Errors
    /// `InvalidArgument` when `body` is not an object, otherwise store errors.
    pub fn create(&self, collection: &str, body: serde_json::Value) -> Result<Arc<Entity>, DbError> {
        let ty = self.entity_type(collection)?;
        self.engine.create(&ty, properties_from_json(body)?)
    }

    /// # Errors
    /// `NotFound` when the entity is unknown or belongs to another application.
    pub fn get(&self, id: &EntityId) -> Result<Arc<Entity>, DbError> {
        let entity = self.engine.get(id)?;
        let prefix = format!("{}/", self.id);
        if entity.entity_type.starts_with(&prefix) {
            Ok(entity)
        } else {
            Err(DbError::NotFound(id.to_string()))
        }
    }

    /// # Errors
    /// As [`QueryEngine::query`].
    pub fn query(
        &self,
        collection: &str,
        ql: &str,
        limit: Option<i64>,
        cursor: Option<&str>,
    ) -> Result<Page, DbError> {
        let ty = self.entity_type(collection)?;
        self.engine.query(&ty, ql, limit, cursor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::CursorCodec;
    use crate::store::MemoryStore;
    use serde_json::json;

    fn shared_engine() -> Arc<QueryEngine> {
        Arc::new(QueryEngine::new(Arc::new(MemoryStore::new()), CursorCodec::new("shared")))
    }

    #[test]
    fn applications_are_isolated() {
        let engine = shared_engine();
        let a = Application::new(Uuid::new_v4(), engine.clone());
        let b = Application::new(Uuid::new_v4(), engine);
        let mine = a.create("activities", json!({"verb": "go"})).unwrap();
        b.create("activities", json!({"verb": "go"})).unwrap();

        let page = a.query("activities", "verb = 'go'", None, None).unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page.entities[0].id, mine.id);
        assert!(matches!(b.get(&mine.id), Err(DbError::NotFound(_))));
        assert_eq!(a.get(&mine.id).unwrap().id, mine.id);
    }

    #[test]
    fn cursor_from_other_application_is_foreign() {
        let engine = shared_engine();
        let a = Application::new(Uuid::new_v4(), engine.clone());
        let b = Application::new(Uuid::new_v4(), engine);
        for i in 0..3 {
            a.create("users", json!({"n": i})).unwrap();
            b.create("users", json!({"n": i})).unwrap();
        }
        let token = a.query("users", "select *", Some(1), None).unwrap().cursor.unwrap();
        let err = b.query("users", "select *", Some(1), Some(&token)).unwrap_err();
        assert!(matches!(err, DbError::InvalidCursor(_)));
    }

    #[test]
    fn rejects_bad_input() {
        let app = Application::new(Uuid::new_v4(), shared_engine());
        assert!(matches!(app.create("", json!({})), Err(DbError::InvalidArgument(_))));
        assert!(matches!(app.create("a/b", json!({})), Err(DbError::InvalidArgument(_))));
        assert!(app.create("things", json!([1, 2])).is_err());
    }
}
