use appgrid::errors::DbError;
use appgrid::props;
use appgrid::query::{CursorCodec, QueryEngine, QueryRequest, parse_ql};
use appgrid::store::MemoryStore;
use appgrid::entity::Entity;
use std::collections::HashSet;
use std::sync::Arc;

fn engine() -> QueryEngine {
    QueryEngine::new(Arc::new(MemoryStore::new().with_scan_batch(64)), CursorCodec::new("paging"))
}

/// Follow cursors to the end, returning every page.
fn all_pages(e: &QueryEngine, ty: &str, ql: &str, limit: i64) -> Vec<Vec<Arc<Entity>>> {
    let mut pages = Vec::new();
    let mut cursor: Option<String> = None;
    loop {
        let page = e.query(ty, ql, Some(limit), cursor.as_deref()).unwrap();
        cursor = page.cursor.clone();
        pages.push(page.entities);
        if cursor.is_none() {
            return pages;
        }
    }
}

#[test]
fn fifteen_hundred_entities_in_pages_of_two() {
    let e = engine();
    let first = e.create("counters", props! { "ordinal" => 0 }).unwrap();
    for i in 1..1500 {
        e.create("counters", props! { "ordinal" => i }).unwrap();
    }
    let ql = format!("select * where created >= {}", first.created);
    let pages = all_pages(&e, "counters", &ql, 2);
    assert_eq!(pages.len(), 750);
    assert!(pages.iter().all(|p| p.len() == 2));

    let ids: Vec<_> = pages.iter().flatten().map(|x| x.id).collect();
    assert_eq!(ids.iter().collect::<HashSet<_>>().len(), 1500);
    let created: Vec<i64> = pages.iter().flatten().map(|x| x.created).collect();
    assert!(created.windows(2).all(|w| w[0] > w[1]));
    assert_eq!(*created.last().unwrap(), first.created);
}

fn seed_activities(e: &QueryEngine) -> Vec<Arc<Entity>> {
    (0..23)
        .map(|i| {
            let verb = if i % 5 == 2 { "stop" } else { "go" };
            e.create("activities", props! { "verb" => verb, "ordinal" => i }).unwrap()
        })
        .collect()
}

#[test]
fn equality_filter_finds_the_five_stops() {
    let e = engine();
    seed_activities(&e);
    let page = e.query("activities", "select * where verb = 'stop'", None, None).unwrap();
    assert_eq!(page.len(), 5);
    assert!(page.is_terminal());
    assert!(page.entities.iter().all(|x| x.property("verb").is_some()));
}

#[test]
fn disjunction_returns_union_without_duplicates() {
    let e = engine();
    let seeded = seed_activities(&e);
    let pivot = seeded[15].created;
    let ql = format!("select * where created >= {pivot} or verb = 'stop'");
    let page = e.query("activities", &ql, Some(1000), None).unwrap();
    assert!(page.is_terminal());

    let expected: HashSet<_> = seeded
        .iter()
        .filter(|x| x.created >= pivot || x.properties["verb"] == "stop".into())
        .map(|x| x.id)
        .collect();
    let got: Vec<_> = page.entities.iter().map(|x| x.id).collect();
    assert_eq!(got.len(), expected.len());
    assert_eq!(got.iter().copied().collect::<HashSet<_>>(), expected);
    let created: Vec<i64> = page.entities.iter().map(|x| x.created).collect();
    assert!(created.windows(2).all(|w| w[0] > w[1]));
}

#[test]
fn pages_partition_the_matches() {
    let e = engine();
    for i in 0..47 {
        e.create("items", props! { "n" => i, "even" => i % 2 == 0 }).unwrap();
    }
    for limit in [1, 3, 7, 24, 100] {
        let pages = all_pages(&e, "items", "even = true", limit);
        let expected_pages = 24usize.div_ceil(usize::try_from(limit).unwrap()).max(1);
        assert_eq!(pages.len(), expected_pages, "limit {limit}");
        let ids: Vec<_> = pages.iter().flatten().map(|x| x.id).collect();
        assert_eq!(ids.len(), 24);
        assert_eq!(ids.iter().collect::<HashSet<_>>().len(), 24);
    }
}

#[test]
fn reissuing_a_cursor_is_idempotent() {
    let e = engine();
    seed_activities(&e);
    let first = e.query("activities", "select *", Some(4), None).unwrap();
    let token = first.cursor.unwrap();
    let a = e.query("activities", "select *", Some(4), Some(&token)).unwrap();
    let b = e.query("activities", "select *", Some(4), Some(&token)).unwrap();
    let ids = |p: &appgrid::query::Page| p.entities.iter().map(|x| x.id).collect::<Vec<_>>();
    assert_eq!(ids(&a), ids(&b));
    assert_eq!(a.cursor.is_some(), b.cursor.is_some());
}

#[test]
fn empty_result_is_terminal() {
    let e = engine();
    seed_activities(&e);
    let page = e.query("activities", "verb = 'fly'", Some(5), None).unwrap();
    assert!(page.is_empty());
    assert!(page.cursor.is_none());
}

#[test]
fn invalid_limits_and_cursors() {
    let e = engine();
    seed_activities(&e);
    assert!(matches!(e.query("activities", "select *", Some(0), None), Err(DbError::InvalidArgument(_))));
    assert!(matches!(e.query("activities", "select *", Some(-3), None), Err(DbError::InvalidArgument(_))));

    let foreign = QueryEngine::new(Arc::new(MemoryStore::new()), CursorCodec::new("someone-else"));
    for i in 0..3 {
        foreign.create("activities", props! { "i" => i }).unwrap();
    }
    let token = foreign.query("activities", "select *", Some(1), None).unwrap().cursor.unwrap();
    assert!(matches!(
        e.query("activities", "select *", Some(1), Some(&token)),
        Err(DbError::InvalidCursor(_))
    ));
    assert!(matches!(
        e.query("activities", "select *", Some(1), Some("not-a-cursor")),
        Err(DbError::InvalidCursor(_))
    ));
}

#[test]
fn syntax_errors_fail_before_scanning() {
    let e = engine();
    for bad in ["select * where", "verb = ", "verb ~ 'x'", "(verb = 'a'", "verb = 'unterminated"] {
        assert!(matches!(e.query("activities", bad, None, None), Err(DbError::SyntaxError { .. })), "{bad}");
    }
}

#[test]
fn inserts_during_pagination_do_not_disturb_later_pages() {
    let e = engine();
    for i in 0..30 {
        e.create("feed", props! { "n" => i }).unwrap();
    }
    let req = QueryRequest::new(parse_ql("select *").unwrap()).with_limit(7);
    let mut page = e.execute("feed", &req).unwrap();
    let mut seen: Vec<_> = page.entities.iter().map(|x| x.id).collect();
    let mut inserted = HashSet::new();
    while let Some(next) = e.next_page("feed", &req, &page).unwrap() {
        // new entities sort ahead of the cursor in descending order
        inserted.insert(e.create("feed", props! { "late" => true }).unwrap().id);
        seen.extend(next.entities.iter().map(|x| x.id));
        page = next;
    }
    assert_eq!(seen.len(), 30);
    assert_eq!(seen.iter().collect::<HashSet<_>>().len(), 30);
    assert!(seen.iter().all(|id| !inserted.contains(id)));
}

#[test]
fn concurrent_writers_and_paginating_reader() {
    let e = Arc::new(engine());
    for i in 0..200 {
        e.create("stream", props! { "n" => i, "origin" => "seed" }).unwrap();
    }
    let writers: Vec<_> = (0..4)
        .map(|w| {
            let e = e.clone();
            std::thread::spawn(move || {
                for i in 0..100 {
                    e.create("stream", props! { "n" => i, "origin" => format!("w{w}") }).unwrap();
                }
            })
        })
        .collect();
    let pages = all_pages(&e, "stream", "origin = 'seed'", 9);
    for w in writers {
        w.join().unwrap();
    }
    let ids: Vec<_> = pages.iter().flatten().map(|x| x.id).collect();
    assert_eq!(ids.len(), 200);
    assert_eq!(ids.iter().collect::<HashSet<_>>().len(), 200);
    let created: Vec<i64> = pages.iter().flatten().map(|x| x.created).collect();
    assert!(created.windows(2).all(|w| w[0] > w[1]));
}
