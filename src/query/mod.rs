// Telemetry is a submodule of query
pub mod telemetry;

// Submodules for separation of concerns
mod cursor;
mod eval;
mod exec;
mod parse;
mod plan;
mod types;

pub use cursor::{CURSOR_VERSION, Cursor, CursorCodec, query_scope};
pub use eval::evaluate;
pub use exec::QueryEngine;
pub use parse::{parse_predicate, parse_ql};
pub use plan::{ScanPlan, plan};
pub use types::{
    CmpOp, DEFAULT_LIMIT, Literal, MAX_LIMIT, Page, Predicate, QueryRequest, Statement,
};
