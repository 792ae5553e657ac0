use appgrid::errors::DbError;
use appgrid::props;
use appgrid::store::wal::EntityLog;
use appgrid::store::{CreatedBounds, EntityStore, MemoryStore, ScanRange};
use appgrid::types::{Direction, EntityId, SortKey};
use std::io::Write;
use std::ops::Bound;
use tempfile::tempdir;

fn created(store: &MemoryStore, ty: &str, range: ScanRange) -> Vec<i64> {
    store.scan_by_type(ty, range).unwrap().map(|r| r.unwrap().created).collect()
}

#[test]
fn put_assigns_strictly_increasing_timestamps_across_types() {
    let store = MemoryStore::new();
    let mut last = i64::MIN;
    for i in 0..100 {
        let ty = if i % 2 == 0 { "a" } else { "b" };
        let e = store.put(ty, props! { "i" => i }).unwrap();
        assert!(e.created > last);
        last = e.created;
    }
    assert_eq!(store.count("a").unwrap(), 50);
    assert_eq!(store.count("missing").unwrap(), 0);
}

#[test]
fn scans_honour_direction_bounds_and_resume_key() {
    let store = MemoryStore::new().with_scan_batch(3);
    let all: Vec<_> = (0..10).map(|i| store.put("t", props! { "i" => i }).unwrap()).collect();

    let desc = created(&store, "t", ScanRange::full(Direction::Desc));
    assert_eq!(desc, all.iter().rev().map(|e| e.created).collect::<Vec<_>>());

    let bounded = ScanRange {
        direction: Direction::Asc,
        start_after: None,
        created: CreatedBounds { lower: Bound::Included(all[2].created), upper: Bound::Excluded(all[6].created) },
    };
    assert_eq!(created(&store, "t", bounded), all[2..6].iter().map(|e| e.created).collect::<Vec<_>>());

    let resumed = ScanRange { start_after: Some(all[4].sort_key()), ..ScanRange::full(Direction::Desc) };
    assert_eq!(created(&store, "t", resumed), all[..4].iter().rev().map(|e| e.created).collect::<Vec<_>>());
}

#[test]
fn resume_key_that_no_longer_exists_still_resumes() {
    let store = MemoryStore::new();
    let all: Vec<_> = (0..5).map(|i| store.put("t", props! { "i" => i }).unwrap()).collect();
    // a key between two stored entities
    let ghost = SortKey::new(all[2].created, EntityId::max());
    let range = ScanRange { start_after: Some(ghost), ..ScanRange::full(Direction::Desc) };
    assert_eq!(created(&store, "t", range), vec![all[2].created, all[1].created, all[0].created]);
}

#[test]
fn inverted_bounds_scan_nothing() {
    let store = MemoryStore::new();
    store.put("t", props! { "i" => 1 }).unwrap();
    let range = ScanRange {
        created: CreatedBounds { lower: Bound::Excluded(100), upper: Bound::Excluded(50) },
        ..ScanRange::full(Direction::Desc)
    };
    assert!(created(&store, "t", range).is_empty());
}

#[test]
fn get_and_not_found() {
    let store = MemoryStore::new();
    let e = store.put("t", props! { "name" => "x" }).unwrap();
    assert_eq!(store.get(&e.id).unwrap().properties, e.properties);
    assert!(matches!(store.get(&EntityId::new()), Err(DbError::NotFound(_))));
}

#[test]
fn closing_mid_scan_surfaces_unavailable() {
    let store = MemoryStore::new().with_scan_batch(2);
    for i in 0..6 {
        store.put("t", props! { "i" => i }).unwrap();
    }
    let mut scan = store.scan_by_type("t", ScanRange::full(Direction::Desc)).unwrap();
    assert!(scan.next().unwrap().is_ok());
    store.close();
    let rest: Vec<_> = scan.collect();
    assert!(rest.iter().any(|r| matches!(r, Err(DbError::StoreUnavailable(_)))));
    assert!(matches!(store.put("t", props! {}), Err(DbError::StoreUnavailable(_))));
}

#[test]
fn log_backed_store_survives_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("entities.log");
    let (first, last) = {
        let store = MemoryStore::open(&path, true).unwrap();
        let first = store.put("t", props! { "i" => 0, "nested" => props! { "k" => "v" } }).unwrap();
        let mut last = first.clone();
        for i in 1..20 {
            last = store.put("t", props! { "i" => i }).unwrap();
        }
        (first, last)
    };
    let store = MemoryStore::open(&path, false).unwrap();
    assert_eq!(store.count("t").unwrap(), 20);
    assert_eq!(*store.get(&first.id).unwrap(), *first);
    let next = store.put("t", props! {}).unwrap();
    assert!(next.created > last.created);
}

#[test]
fn torn_tail_is_dropped_on_replay() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("entities.log");
    {
        let store = MemoryStore::open(&path, false).unwrap();
        for i in 0..3 {
            store.put("t", props! { "i" => i }).unwrap();
        }
    }
    let mut f = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
    f.write_all(&[42, 0, 0, 0, 1, 2]).unwrap();
    drop(f);
    let (_log, entities) = EntityLog::open(&path, false).unwrap();
    assert_eq!(entities.len(), 3);
}

#[test]
fn corrupt_frame_is_reported() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("entities.log");
    {
        let store = MemoryStore::open(&path, false).unwrap();
        for i in 0..3 {
            store.put("t", props! { "i" => i }).unwrap();
        }
    }
    let mut bytes = std::fs::read(&path).unwrap();
    // flip a payload byte of the first frame
    bytes[10] ^= 0xff;
    std::fs::write(&path, bytes).unwrap();
    assert!(matches!(MemoryStore::open(&path, false), Err(DbError::Wal(_))));
}

#[test]
fn corrupt_length_field_keeps_the_log_intact() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("entities.log");
    {
        let store = MemoryStore::open(&path, false).unwrap();
        for i in 0..5 {
            store.put("t", props! { "i" => i }).unwrap();
        }
    }
    let mut bytes = std::fs::read(&path).unwrap();
    let size = bytes.len() as u64;
    // high byte of the first frame's length
    bytes[3] = 0x7f;
    std::fs::write(&path, &bytes).unwrap();
    assert!(matches!(EntityLog::open(&path, false), Err(DbError::Wal(_))));
    assert_eq!(std::fs::metadata(&path).unwrap().len(), size);
}
