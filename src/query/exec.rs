use crate::config::EngineConfig;
use crate::entity::Entity;
use crate::errors::DbError;
use crate::store::{EntityStore, MemoryStore};
use crate::types::{EntityId, Properties};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::cursor::{Cursor, CursorCodec, query_scope};
use super::eval::evaluate;
use super::parse::parse_ql;
use super::plan::{ScanPlan, plan};
use super::telemetry;
use super::types::{Page, QueryRequest};

/// Runs paged queries against an entity store.
///
/// The engine holds no per-query state: everything needed to continue a
/// pagination travels in the cursor token.
pub struct QueryEngine {
    store: Arc<dyn EntityStore>,
    codec: CursorCodec,
    config: EngineConfig,
}

impl QueryEngine {
    #[must_use]
    pub fn new(store: Arc<dyn EntityStore>, codec: CursorCodec) -> Self {
        Self::with_config(store, codec, EngineConfig::default())
    }

    #[must_use]
    pub fn with_config(store: Arc<dyn EntityStore>, codec: CursorCodec, config: EngineConfig) -> Self {
        Self { store, codec, config }
    }

    /// Build the store and cursor codec described by `config`.
    ///
    /// # Errors
    /// `Config` for an invalid config, or any error from replaying the entity log.
    pub fn from_config(config: EngineConfig) -> Result<Self, DbError> {
        config.validate()?;
        let store = match config.log_path() {
            Some(path) => {
                if let Some(dir) = path.parent() {
                    std::fs::create_dir_all(dir)?;
                }
                MemoryStore::open(&path, config.sync_writes)?
            }
            None => MemoryStore::new(),
        }
        .with_scan_batch(config.scan_batch_size);
        let codec = match &config.cursor_secret {
            Some(secret) => CursorCodec::new(secret),
            None => {
                log::warn!("no cursor_secret configured; cursors will not survive a restart");
                CursorCodec::random()
            }
        }
        .with_ttl_secs(config.cursor_ttl_secs);
        telemetry::set_slow_query_ms(config.slow_query_ms);
        Ok(Self::with_config(Arc::new(store), codec, config))
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn EntityStore> {
        &self.store
    }

    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// # Errors
    /// Propagates store errors.
    pub fn create(&self, entity_type: &str, properties: Properties) -> Result<Arc<Entity>, DbError> {
        let entity = self.store.put(entity_type, properties)?;
        telemetry::record_entity_created();
        Ok(entity)
    }

    /// # Errors
    /// `NotFound` when the id is unknown.
    pub fn get(&self, id: &EntityId) -> Result<Arc<Entity>, DbError> {
        self.store.get(id)
    }

    /// Parse `ql` and fetch one page.
    ///
    /// # Errors
    /// `SyntaxError` for bad query text, otherwise as [`QueryEngine::execute`].
    pub fn query(
        &self,
        entity_type: &str,
        ql: &str,
        limit: Option<i64>,
        cursor: Option<&str>,
    ) -> Result<Page, DbError> {
        let mut req = QueryRequest::new(parse_ql(ql)?);
        req.limit = limit;
        req.cursor = cursor.map(str::to_string);
        self.execute(entity_type, &req)
    }

    /// Fetch the page after `page`, or `None` when `page` was the last one.
    ///
    /// # Errors
    /// As [`QueryEngine::execute`].
    pub fn next_page(
        &self,
        entity_type: &str,
        req: &QueryRequest,
        page: &Page,
    ) -> Result<Option<Page>, DbError> {
        let Some(cursor) = &page.cursor else {
            return Ok(None);
        };
        let next = QueryRequest { cursor: Some(cursor.clone()), ..req.clone() };
        self.execute(entity_type, &next).map(Some)
    }

    /// Fetch one page of entities of `entity_type` matching the request.
    ///
    /// # Errors
    /// - `InvalidArgument` for a non-positive limit.
    /// - `InvalidCursor` for a token that is malformed, tampered, expired, or
    ///   minted by a different query.
    /// - `StoreUnavailable` if the store fails before the page is complete.
    /// - `Timeout` when the configured query timeout elapses.
    pub fn execute(&self, entity_type: &str, req: &QueryRequest) -> Result<Page, DbError> {
        let started = Instant::now();
        let limit = self.resolve_limit(req.limit)?;
        let predicate_text = req.predicate.to_string();
        let scope = query_scope(entity_type, &predicate_text);

        let start_after = match req.cursor.as_deref() {
            Some(token) => Some(self.resume_key(token, req, scope)?.sort_key),
            None => None,
        };

        let plan = plan(&req.predicate);
        let range = plan.scan_range(req.direction, start_after);
        log::debug!("query on {entity_type}: {plan:?} resume={start_after:?}");

        let deadline = self.config.query_timeout_ms.map(|ms| started + Duration::from_millis(ms));
        let scan = self.store.scan_by_type(entity_type, range).inspect_err(|_| {
            telemetry::record_store_failure();
        })?;

        let mut matched: Vec<Arc<Entity>> = Vec::with_capacity(limit.saturating_add(1).min(1024));
        let mut scanned = 0usize;
        let mut mismatches = 0u64;
        for item in scan {
            if let Some(dl) = deadline
                && Instant::now() > dl
            {
                telemetry::record_timeout();
                let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
                log::warn!("query on {entity_type} timed out after {elapsed_ms} ms");
                return Err(DbError::Timeout { elapsed_ms });
            }
            let entity = item.inspect_err(|e| {
                telemetry::record_store_failure();
                log::error!("scan of {entity_type} aborted: {e}");
            })?;
            scanned += 1;
            match evaluate(&req.predicate, &entity) {
                Ok(true) => {
                    matched.push(entity);
                    if matched.len() > limit {
                        break;
                    }
                }
                Ok(false) => {}
                Err(e) if e.is_per_entity() => {
                    mismatches += 1;
                    log::debug!("excluding {} from {entity_type}: {e}", entity.id);
                }
                Err(e) => return Err(e),
            }
        }
        telemetry::record_type_mismatches(mismatches);

        let has_more = matched.len() > limit;
        matched.truncate(limit);
        let cursor = match (has_more, matched.last()) {
            (true, Some(last)) => {
                let token = self.codec.encode(&Cursor {
                    sort_key: last.sort_key(),
                    direction: req.direction,
                    scope,
                    issued_at: chrono::Utc::now().timestamp_millis(),
                })?;
                telemetry::record_cursor_issued();
                Some(token)
            }
            _ => None,
        };

        telemetry::record_query(&telemetry::QueryRecord {
            entity_type,
            predicate: &predicate_text,
            plan: plan_label(&plan),
            limit,
            returned: matched.len(),
            scanned,
            resumed: start_after.is_some(),
            has_more,
            duration_ms: started.elapsed().as_millis(),
        });
        Ok(Page { entities: matched, cursor })
    }

    fn resolve_limit(&self, requested: Option<i64>) -> Result<usize, DbError> {
        let Some(requested) = requested else {
            return Ok(self.config.default_limit);
        };
        if requested <= 0 {
            return Err(DbError::InvalidArgument(format!("limit must be positive, got {requested}")));
        }
        let limit = usize::try_from(requested).unwrap_or(usize::MAX);
        if limit > self.config.max_limit {
            log::warn!("limit {limit} clamped to {}", self.config.max_limit);
            return Ok(self.config.max_limit);
        }
        Ok(limit)
    }

    fn resume_key(&self, token: &str, req: &QueryRequest, scope: u32) -> Result<Cursor, DbError> {
        let checked = self.codec.decode(token).and_then(|c| {
            if c.direction != req.direction {
                Err(DbError::InvalidCursor("cursor was issued for the opposite order".into()))
            } else if c.scope != scope {
                Err(DbError::InvalidCursor("cursor was issued for a different query".into()))
            } else {
                Ok(c)
            }
        });
        checked.inspect_err(|e| {
            telemetry::record_invalid_cursor();
            log::warn!("rejected cursor: {e}");
        })
    }
}

const fn plan_label(plan: &ScanPlan) -> &'static str {
    match plan {
        ScanPlan::IndexedScan { .. } => "indexed_scan",
        ScanPlan::FilteredFullScan => "filtered_full_scan",
    }
}
