// Run with: cargo run --release --bin benchmark_paging
// Results saved to benchmarks/results/benchmark_paging_{datetime}.csv

use std::fs::{File, create_dir_all};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use appgrid::props;
use appgrid::query::{CursorCodec, QueryEngine};
use appgrid::store::MemoryStore;

const ENTITIES: usize = 50_000;
const PAGE_SIZES: [i64; 4] = [10, 100, 500, 1000];

struct Run {
    backend: &'static str,
    query: &'static str,
    limit: i64,
    pages: usize,
    rows: usize,
    total_ns: u128,
}

fn paginate(engine: &QueryEngine, ql: &str, limit: i64) -> (usize, usize, u128) {
    let start = Instant::now();
    let mut pages = 0usize;
    let mut rows = 0usize;
    let mut cursor: Option<String> = None;
    loop {
        let page = engine.query("bench", ql, Some(limit), cursor.as_deref()).unwrap();
        pages += 1;
        rows += page.len();
        cursor = page.cursor;
        if cursor.is_none() {
            break;
        }
    }
    (pages, rows, start.elapsed().as_nanos())
}

fn seed(engine: &QueryEngine) -> (i64, u128) {
    let start = Instant::now();
    let mut first = 0;
    for i in 0..ENTITIES {
        let verb = if i % 7 == 0 { "stop" } else { "go" };
        let e = engine
            .create("bench", props! { "i" => i64::try_from(i).unwrap(), "verb" => verb, "payload" => format!("x{i}") })
            .unwrap();
        if i == ENTITIES / 2 {
            first = e.created;
        }
    }
    (first, start.elapsed().as_nanos())
}

fn bench(backend: &'static str, engine: &QueryEngine, runs: &mut Vec<Run>) {
    let (midpoint, insert_ns) = seed(engine);
    println!("{backend}: inserted {ENTITIES} entities in {} ms", insert_ns / 1_000_000);
    let indexed = format!("select * where created >= {midpoint}");
    let queries: [(&'static str, String); 3] = [
        ("indexed_half", indexed),
        ("filtered_stop", "select * where verb = 'stop'".to_string()),
        ("all", "select *".to_string()),
    ];
    for (name, ql) in &queries {
        for limit in PAGE_SIZES {
            let (pages, rows, total_ns) = paginate(engine, ql, limit);
            println!("{backend} {name} limit={limit}: {pages} pages, {rows} rows, {} ms", total_ns / 1_000_000);
            runs.push(Run { backend, query: *name, limit, pages, rows, total_ns });
        }
    }
}

fn main() {
    let mut runs = Vec::new();

    let memory = QueryEngine::new(Arc::new(MemoryStore::new()), CursorCodec::new("bench"));
    bench("memory", &memory, &mut runs);

    let dir = std::env::temp_dir().join(format!("appgrid_bench_{}", uuid::Uuid::new_v4()));
    create_dir_all(&dir).unwrap();
    {
        let store = MemoryStore::open(&dir.join("entities.log"), false).unwrap();
        let logged = QueryEngine::new(Arc::new(store), CursorCodec::new("bench"));
        bench("logged", &logged, &mut runs);
    }

    let mut root = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    root.push("benchmarks/results");
    create_dir_all(&root).unwrap();
    let datetime = chrono::Utc::now().format("%Y%m%d_%H%M%S");
    let mut f = File::create(root.join(format!("benchmark_paging_{datetime}.csv"))).unwrap();
    writeln!(f, "backend,query,limit,pages,rows,total_ns,ns_per_page").unwrap();
    for r in &runs {
        let per_page = r.total_ns / r.pages.max(1) as u128;
        writeln!(f, "{},{},{},{},{},{},{per_page}", r.backend, r.query, r.limit, r.pages, r.rows, r.total_ns).unwrap();
    }

    let _ = std::fs::remove_dir_all(&dir);
}
