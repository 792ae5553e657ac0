use crate::entity::Entity;
use crate::types::{Direction, Value};
use std::fmt;
use std::sync::Arc;

// Safety limits to prevent resource abuse
pub(crate) const MAX_QL_LEN: usize = 8 * 1024;
pub(crate) const MAX_CLAUSES: usize = 128;
pub(crate) const MAX_NESTING: usize = 32;
pub const DEFAULT_LIMIT: usize = 10;
pub const MAX_LIMIT: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl CmpOp {
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::Lt => "<",
            Self::Lte => "<=",
        }
    }

    #[must_use]
    pub const fn is_range(self) -> bool {
        !matches!(self, Self::Eq)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
}

impl Literal {
    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            Self::Int(i) => Value::Int(*i),
            Self::Float(f) => Value::Float(*f),
            Self::Str(s) => Value::String(s.clone()),
            Self::Bool(b) => Value::Bool(*b),
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x:?}"),
            Self::Str(s) => write!(f, "'{}'", s.replace('\'', "''")),
            Self::Bool(b) => write!(f, "{b}"),
        }
    }
}

/// Parsed filter expression.
///
/// `and`/`or` nodes are binary and built by folding clauses left to right.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// `select *` with no `where` clause.
    All,
    Cmp { field: String, op: CmpOp, value: Literal },
    And(Box<Predicate>, Box<Predicate>),
    Or(Box<Predicate>, Box<Predicate>),
}

impl Predicate {
    #[must_use]
    pub fn cmp(field: impl Into<String>, op: CmpOp, value: Literal) -> Self {
        Self::Cmp { field: field.into(), op, value }
    }

    #[must_use]
    pub fn and(self, rhs: Self) -> Self {
        Self::And(Box::new(self), Box::new(rhs))
    }

    #[must_use]
    pub fn or(self, rhs: Self) -> Self {
        Self::Or(Box::new(self), Box::new(rhs))
    }

    #[must_use]
    pub fn contains_or(&self) -> bool {
        match self {
            Self::All | Self::Cmp { .. } => false,
            Self::Or(..) => true,
            Self::And(a, b) => a.contains_or() || b.contains_or(),
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => write!(f, "*"),
            Self::Cmp { field, op, value } => write!(f, "{field} {} {value}", op.symbol()),
            Self::And(a, b) => write!(f, "({a} and {b})"),
            Self::Or(a, b) => write!(f, "({a} or {b})"),
        }
    }
}

/// A parsed query statement.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub predicate: Predicate,
    pub direction: Direction,
}

/// One page request against a collection.
#[derive(Debug, Clone)]
pub struct QueryRequest {
    pub predicate: Predicate,
    pub direction: Direction,
    /// `None` falls back to the configured default page size.
    pub limit: Option<i64>,
    pub cursor: Option<String>,
}

impl QueryRequest {
    #[must_use]
    pub fn new(statement: Statement) -> Self {
        Self { predicate: statement.predicate, direction: statement.direction, limit: None, cursor: None }
    }

    #[must_use]
    pub const fn with_limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    #[must_use]
    pub fn with_cursor(mut self, cursor: impl Into<String>) -> Self {
        self.cursor = Some(cursor.into());
        self
    }
}

/// A bounded slice of query results plus the token for the next slice.
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub entities: Vec<Arc<Entity>>,
    pub cursor: Option<String>,
}

impl Page {
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        self.cursor.is_none()
    }

    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        let mut obj = serde_json::Map::new();
        obj.insert(
            "entities".into(),
            serde_json::Value::Array(self.entities.iter().map(|e| e.to_json()).collect()),
        );
        obj.insert("count".into(), serde_json::Value::from(self.entities.len()));
        if let Some(c) = &self.cursor {
            obj.insert("cursor".into(), serde_json::Value::String(c.clone()));
        }
        serde_json::Value::Object(obj)
    }
}
