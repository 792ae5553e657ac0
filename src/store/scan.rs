use crate::entity::Entity;
use crate::errors::DbError;
use crate::types::{Direction, SortKey};
use parking_lot::RwLock;
use std::collections::{BTreeMap, VecDeque};
use std::ops::Bound;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use super::{ScanRange, range_is_empty};

pub(crate) type TypeEntries = BTreeMap<SortKey, Arc<Entity>>;

/// Batched, resumable scan over one entity type.
///
/// Each refill takes the read lock just long enough to copy out up to
/// `batch_size` handles, then narrows its own bounds past the last key it saw.
pub struct ScanIter {
    entries: Option<Arc<RwLock<TypeEntries>>>,
    lower: Bound<SortKey>,
    upper: Bound<SortKey>,
    direction: Direction,
    batch_size: usize,
    buffer: VecDeque<Arc<Entity>>,
    open: Arc<AtomicBool>,
    done: bool,
}

impl ScanIter {
    pub(crate) fn new(
        entries: Option<Arc<RwLock<TypeEntries>>>,
        range: ScanRange,
        batch_size: usize,
        open: Arc<AtomicBool>,
    ) -> Self {
        let (lower, upper) = range.key_bounds();
        Self {
            entries,
            lower,
            upper,
            direction: range.direction,
            batch_size: batch_size.max(1),
            buffer: VecDeque::new(),
            open,
            done: false,
        }
    }

    fn refill(&mut self) {
        let Some(entries) = self.entries.as_ref() else {
            self.done = true;
            return;
        };
        if range_is_empty(self.lower, self.upper) {
            self.done = true;
            return;
        }
        {
            let map = entries.read();
            let range = map.range((self.lower, self.upper));
            match self.direction {
                Direction::Asc => {
                    self.buffer.extend(range.take(self.batch_size).map(|(_, e)| e.clone()));
                }
                Direction::Desc => {
                    self.buffer.extend(range.rev().take(self.batch_size).map(|(_, e)| e.clone()));
                }
            }
        }
        if self.buffer.len() < self.batch_size {
            self.done = true;
        }
        if let Some(last) = self.buffer.back() {
            let key = last.sort_key();
            match self.direction {
                Direction::Asc => self.lower = Bound::Excluded(key),
                Direction::Desc => self.upper = Bound::Excluded(key),
            }
        }
    }
}

impl Iterator for ScanIter {
    type Item = Result<Arc<Entity>, DbError>;

    fn next(&mut self) -> Option<Self::Item> {
        if !self.open.load(Ordering::Acquire) {
            if self.done && self.buffer.is_empty() {
                return None;
            }
            self.done = true;
            self.buffer.clear();
            return Some(Err(DbError::StoreUnavailable("store closed during scan".into())));
        }
        if self.buffer.is_empty() && !self.done {
            self.refill();
        }
        self.buffer.pop_front().map(Ok)
    }
}
