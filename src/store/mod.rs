//! Entity storage: append-only, keyed by `(created, id)` per entity type.

mod clock;
mod memory;
mod scan;
pub mod wal;

pub use clock::CreationClock;
pub use memory::{DEFAULT_SCAN_BATCH, MemoryStore};
pub use scan::ScanIter;

use crate::entity::Entity;
use crate::errors::DbError;
use crate::types::{Direction, EntityId, Properties, SortKey};
use std::ops::Bound;
use std::sync::Arc;

/// Lazy, fallible sequence of entities produced by a scan.
pub type EntityScan<'a> = Box<dyn Iterator<Item = Result<Arc<Entity>, DbError>> + Send + 'a>;

pub trait EntityStore: Send + Sync {
    /// Store a new entity; it is visible to every later scan once this returns.
    ///
    /// # Errors
    /// `StoreUnavailable` when the store is closed or the log write fails.
    fn put(&self, entity_type: &str, properties: Properties) -> Result<Arc<Entity>, DbError>;

    /// # Errors
    /// `NotFound` when no entity has this id.
    fn get(&self, id: &EntityId) -> Result<Arc<Entity>, DbError>;

    /// # Errors
    /// `StoreUnavailable` when the store is closed. Items may also fail mid-scan.
    fn scan_by_type(&self, entity_type: &str, range: ScanRange) -> Result<EntityScan<'_>, DbError>;

    /// # Errors
    /// `StoreUnavailable` when the store is closed.
    fn count(&self, entity_type: &str) -> Result<usize, DbError>;

    fn close(&self) {}
}

/// Inclusive/exclusive limits on the `created` timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreatedBounds {
    pub lower: Bound<i64>,
    pub upper: Bound<i64>,
}

impl Default for CreatedBounds {
    fn default() -> Self {
        Self::UNBOUNDED
    }
}

impl CreatedBounds {
    pub const UNBOUNDED: Self = Self { lower: Bound::Unbounded, upper: Bound::Unbounded };

    #[must_use]
    pub fn intersect(self, other: Self) -> Self {
        Self {
            lower: tighter_lower(self.lower, other.lower),
            upper: tighter_upper(self.upper, other.upper),
        }
    }

    /// True when no timestamp can satisfy both ends.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        range_is_empty(self.lower, self.upper)
    }

    #[must_use]
    pub fn contains(&self, created: i64) -> bool {
        let above = match self.lower {
            Bound::Included(l) => created >= l,
            Bound::Excluded(l) => created > l,
            Bound::Unbounded => true,
        };
        let below = match self.upper {
            Bound::Included(u) => created <= u,
            Bound::Excluded(u) => created < u,
            Bound::Unbounded => true,
        };
        above && below
    }
}

/// What a scan should visit and in which order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScanRange {
    pub direction: Direction,
    /// Resume strictly after this key in scan order.
    pub start_after: Option<SortKey>,
    pub created: CreatedBounds,
}

impl ScanRange {
    #[must_use]
    pub fn full(direction: Direction) -> Self {
        Self { direction, ..Self::default() }
    }

    /// Translate into key bounds for an ordered map of `SortKey`s.
    #[must_use]
    pub fn key_bounds(&self) -> (Bound<SortKey>, Bound<SortKey>) {
        let mut lower = match self.created.lower {
            Bound::Included(t) => Bound::Included(SortKey::new(t, EntityId::min())),
            Bound::Excluded(t) => Bound::Excluded(SortKey::new(t, EntityId::max())),
            Bound::Unbounded => Bound::Unbounded,
        };
        let mut upper = match self.created.upper {
            Bound::Included(t) => Bound::Included(SortKey::new(t, EntityId::max())),
            Bound::Excluded(t) => Bound::Excluded(SortKey::new(t, EntityId::min())),
            Bound::Unbounded => Bound::Unbounded,
        };
        if let Some(key) = self.start_after {
            match self.direction {
                Direction::Desc => upper = tighter_upper(upper, Bound::Excluded(key)),
                Direction::Asc => lower = tighter_lower(lower, Bound::Excluded(key)),
            }
        }
        (lower, upper)
    }
}

fn tighter_lower<T: Ord + Copy>(a: Bound<T>, b: Bound<T>) -> Bound<T> {
    match (a, b) {
        (Bound::Unbounded, x) | (x, Bound::Unbounded) => x,
        (Bound::Included(x), Bound::Included(y)) => Bound::Included(x.max(y)),
        (Bound::Excluded(x), Bound::Excluded(y)) => Bound::Excluded(x.max(y)),
        (Bound::Included(i), Bound::Excluded(e)) | (Bound::Excluded(e), Bound::Included(i)) => {
            if i > e { Bound::Included(i) } else { Bound::Excluded(e) }
        }
    }
}

fn tighter_upper<T: Ord + Copy>(a: Bound<T>, b: Bound<T>) -> Bound<T> {
    match (a, b) {
        (Bound::Unbounded, x) | (x, Bound::Unbounded) => x,
        (Bound::Included(x), Bound::Included(y)) => Bound::Included(x.min(y)),
        (Bound::Excluded(x), Bound::Excluded(y)) => Bound::Excluded(x.min(y)),
        (Bound::Included(i), Bound::Excluded(e)) | (Bound::Excluded(e), Bound::Included(i)) => {
            if i < e { Bound::Included(i) } else { Bound::Excluded(e) }
        }
    }
}

/// `BTreeMap::range` panics on inverted ranges, so callers check this first.
pub(crate) fn range_is_empty<T: Ord>(lower: Bound<T>, upper: Bound<T>) -> bool {
    match (lower, upper) {
        (Bound::Unbounded, _) | (_, Bound::Unbounded) => false,
        (Bound::Included(l), Bound::Included(u)) => l > u,
        (Bound::Included(l) | Bound::Excluded(l), Bound::Included(u) | Bound::Excluded(u)) => {
            l >= u
        }
    }
}
