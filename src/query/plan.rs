use crate::entity::FIELD_CREATED;
use crate::store::{CreatedBounds, ScanRange};
use crate::types::{Direction, SortKey};
use std::ops::Bound;

use super::types::{CmpOp, Literal, Predicate};

/// How the executor walks a collection.
///
/// Both variants re-check the full predicate for each candidate; the indexed
/// variant only narrows which candidates the store hands out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanPlan {
    IndexedScan { field: &'static str, bounds: CreatedBounds },
    FilteredFullScan,
}

impl ScanPlan {
    #[must_use]
    pub fn scan_range(&self, direction: Direction, start_after: Option<SortKey>) -> ScanRange {
        let created = match self {
            Self::IndexedScan { bounds, .. } => *bounds,
            Self::FilteredFullScan => CreatedBounds::UNBOUNDED,
        };
        ScanRange { direction, start_after, created }
    }

    #[must_use]
    pub const fn is_indexed(&self) -> bool {
        matches!(self, Self::IndexedScan { .. })
    }
}

/// Pick a scan strategy for a predicate.
///
/// Pure conjunctions with integer comparisons on `created` become an indexed
/// scan bounded by the intersection of those comparisons. Anything containing
/// `or` falls back to a filtered full scan.
#[must_use]
pub fn plan(predicate: &Predicate) -> ScanPlan {
    if predicate.contains_or() {
        return ScanPlan::FilteredFullScan;
    }
    let mut bounds = CreatedBounds::UNBOUNDED;
    let mut found = false;
    collect_created_bounds(predicate, &mut bounds, &mut found);
    if found {
        ScanPlan::IndexedScan { field: FIELD_CREATED, bounds }
    } else {
        ScanPlan::FilteredFullScan
    }
}

fn collect_created_bounds(p: &Predicate, acc: &mut CreatedBounds, found: &mut bool) {
    match p {
        Predicate::And(a, b) => {
            collect_created_bounds(a, acc, found);
            collect_created_bounds(b, acc, found);
        }
        Predicate::Cmp { field, op, value: Literal::Int(t) } if field == FIELD_CREATED => {
            let t = *t;
            let term = match op {
                CmpOp::Eq => CreatedBounds { lower: Bound::Included(t), upper: Bound::Included(t) },
                CmpOp::Gt => CreatedBounds { lower: Bound::Excluded(t), upper: Bound::Unbounded },
                CmpOp::Gte => CreatedBounds { lower: Bound::Included(t), upper: Bound::Unbounded },
                CmpOp::Lt => CreatedBounds { lower: Bound::Unbounded, upper: Bound::Excluded(t) },
                CmpOp::Lte => CreatedBounds { lower: Bound::Unbounded, upper: Bound::Included(t) },
            };
            *acc = acc.intersect(term);
            *found = true;
        }
        Predicate::All | Predicate::Cmp { .. } | Predicate::Or(..) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::parse_predicate;

    fn plan_of(ql: &str) -> ScanPlan {
        plan(&parse_predicate(ql).unwrap())
    }

    #[test]
    fn created_range_uses_index() {
        assert_eq!(
            plan_of("select * where created >= 100"),
            ScanPlan::IndexedScan {
                field: "created",
                bounds: CreatedBounds { lower: Bound::Included(100), upper: Bound::Unbounded },
            }
        );
    }

    #[test]
    fn conjunction_intersects_bounds_and_keeps_other_terms_as_filter() {
        let p = plan_of("created > 100 and verb = 'go' and created <= 200");
        assert_eq!(
            p,
            ScanPlan::IndexedScan {
                field: "created",
                bounds: CreatedBounds { lower: Bound::Excluded(100), upper: Bound::Included(200) },
            }
        );
    }

    #[test]
    fn disjunction_forces_full_scan() {
        assert_eq!(plan_of("created >= 100 or verb = 'stop'"), ScanPlan::FilteredFullScan);
        assert_eq!(plan_of("verb = 'a' and (created > 1 or created < 0)"), ScanPlan::FilteredFullScan);
    }

    #[test]
    fn non_created_predicates_full_scan() {
        assert_eq!(plan_of("verb = 'stop'"), ScanPlan::FilteredFullScan);
        assert_eq!(plan_of("select *"), ScanPlan::FilteredFullScan);
        assert_eq!(plan_of("created = 'yesterday'"), ScanPlan::FilteredFullScan);
    }

    #[test]
    fn scan_range_carries_bounds_and_resume_key() {
        let p = plan_of("created < 50");
        let key = SortKey::new(40, crate::types::EntityId::new());
        let r = p.scan_range(Direction::Desc, Some(key));
        assert_eq!(r.created.upper, Bound::Excluded(50));
        assert_eq!(r.start_after, Some(key));
        assert!(p.is_indexed());
    }
}
