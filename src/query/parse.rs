use crate::errors::DbError;
use crate::types::Direction;

use super::types::{CmpOp, Literal, MAX_CLAUSES, MAX_NESTING, MAX_QL_LEN, Predicate, Statement};

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Ident(String),
    Num(Literal),
    Str(String),
    Op(CmpOp),
    Star,
    LParen,
    RParen,
}

#[derive(Debug, Clone)]
struct Token {
    tok: Tok,
    offset: usize,
}

fn lex(input: &str) -> Result<Vec<Token>, DbError> {
    let bytes = input.as_bytes();
    let mut out = Vec::new();
    let mut i = 0usize;
    while i < bytes.len() {
        let c = bytes[i];
        let start = i;
        match c {
            b' ' | b'\t' | b'\r' | b'\n' => {
                i += 1;
                continue;
            }
            b'*' => {
                i += 1;
                out.push(Token { tok: Tok::Star, offset: start });
            }
            b'(' => {
                i += 1;
                out.push(Token { tok: Tok::LParen, offset: start });
            }
            b')' => {
                i += 1;
                out.push(Token { tok: Tok::RParen, offset: start });
            }
            b'\'' => {
                let (s, next) = lex_string(input, start)?;
                i = next;
                out.push(Token { tok: Tok::Str(s), offset: start });
            }
            b'=' | b'<' | b'>' | b'!' => {
                while i < bytes.len() && matches!(bytes[i], b'=' | b'<' | b'>' | b'!') {
                    i += 1;
                }
                let op = match &input[start..i] {
                    "=" => CmpOp::Eq,
                    ">" => CmpOp::Gt,
                    ">=" => CmpOp::Gte,
                    "<" => CmpOp::Lt,
                    "<=" => CmpOp::Lte,
                    other => {
                        return Err(DbError::syntax(start, format!("unknown operator '{other}'")));
                    }
                };
                out.push(Token { tok: Tok::Op(op), offset: start });
            }
            b'-' | b'0'..=b'9' => {
                let (lit, next) = lex_number(input, start)?;
                i = next;
                out.push(Token { tok: Tok::Num(lit), offset: start });
            }
            c if c.is_ascii_alphabetic() || c == b'_' => {
                while i < bytes.len()
                    && (bytes[i].is_ascii_alphanumeric() || matches!(bytes[i], b'_' | b'.'))
                {
                    i += 1;
                }
                out.push(Token { tok: Tok::Ident(input[start..i].to_string()), offset: start });
            }
            _ => {
                let ch = input[start..].chars().next().unwrap_or('?');
                return Err(DbError::syntax(start, format!("unexpected character '{ch}'")));
            }
        }
    }
    Ok(out)
}

/// Single-quoted string; `''` inside the quotes is an escaped quote.
fn lex_string(input: &str, start: usize) -> Result<(String, usize), DbError> {
    let mut out = String::new();
    let mut chars = input[start + 1..].char_indices().peekable();
    while let Some((off, ch)) = chars.next() {
        if ch == '\'' {
            if let Some(&(_, '\'')) = chars.peek() {
                chars.next();
                out.push('\'');
                continue;
            }
            return Ok((out, start + 1 + off + 1));
        }
        out.push(ch);
    }
    Err(DbError::syntax(start, "unbalanced quote in string literal"))
}

fn lex_number(input: &str, start: usize) -> Result<(Literal, usize), DbError> {
    let bytes = input.as_bytes();
    let mut i = start;
    if bytes[i] == b'-' {
        i += 1;
    }
    let digits_from = i;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    if i == digits_from {
        return Err(DbError::syntax(start, "expected digits after '-'"));
    }
    let mut is_float = false;
    if i < bytes.len() && bytes[i] == b'.' {
        is_float = true;
        i += 1;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
    }
    if i < bytes.len() && matches!(bytes[i], b'e' | b'E') {
        is_float = true;
        i += 1;
        if i < bytes.len() && matches!(bytes[i], b'+' | b'-') {
            i += 1;
        }
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
    }
    if i < bytes.len() && (bytes[i].is_ascii_alphabetic() || bytes[i] == b'_') {
        return Err(DbError::syntax(start, "malformed number"));
    }
    let text = &input[start..i];
    let lit = if is_float {
        text.parse::<f64>().map(Literal::Float)
            .map_err(|_| DbError::syntax(start, format!("malformed number '{text}'")))?
    } else {
        match text.parse::<i64>() {
            Ok(n) => Literal::Int(n),
            Err(_) => text
                .parse::<f64>()
                .map(Literal::Float)
                .map_err(|_| DbError::syntax(start, format!("malformed number '{text}'")))?,
        }
    };
    Ok((lit, i))
}

struct Parser {
    toks: Vec<Token>,
    pos: usize,
    end: usize,
    clauses: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.toks.get(self.pos)
    }

    fn offset(&self) -> usize {
        self.peek().map_or(self.end, |t| t.offset)
    }

    fn bump(&mut self) -> Option<Token> {
        let t = self.toks.get(self.pos).cloned();
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    fn at_keyword(&self, kw: &str) -> bool {
        matches!(self.peek(), Some(Token { tok: Tok::Ident(s), .. }) if s.eq_ignore_ascii_case(kw))
    }

    fn eat_keyword(&mut self, kw: &str) -> bool {
        if self.at_keyword(kw) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_keyword(&mut self, kw: &str) -> Result<(), DbError> {
        if self.eat_keyword(kw) {
            Ok(())
        } else {
            Err(DbError::syntax(self.offset(), format!("expected '{kw}'")))
        }
    }

    fn statement(&mut self) -> Result<Statement, DbError> {
        let predicate = if self.eat_keyword("select") {
            match self.bump() {
                Some(Token { tok: Tok::Star, .. }) => {}
                Some(t) => return Err(DbError::syntax(t.offset, "only 'select *' is supported")),
                None => return Err(DbError::syntax(self.end, "expected '*' after select")),
            }
            if self.eat_keyword("where") {
                self.expr(0)?
            } else {
                Predicate::All
            }
        } else if self.eat_keyword("where") {
            self.expr(0)?
        } else if self.peek().is_none() || self.at_keyword("order") {
            Predicate::All
        } else {
            self.expr(0)?
        };

        let mut direction = Direction::Desc;
        if self.eat_keyword("order") {
            self.expect_keyword("by")?;
            match self.bump() {
                Some(Token { tok: Tok::Ident(f), .. })
                    if f.eq_ignore_ascii_case(crate::entity::FIELD_CREATED) => {}
                Some(t) => {
                    return Err(DbError::syntax(t.offset, "only 'created' can be used in order by"));
                }
                None => return Err(DbError::syntax(self.end, "expected sort field")),
            }
            if self.eat_keyword("asc") {
                direction = Direction::Asc;
            } else {
                self.eat_keyword("desc");
            }
        }

        match self.peek() {
            None => Ok(Statement { predicate, direction }),
            Some(Token { tok: Tok::Ident(word), offset }) => Err(DbError::syntax(
                *offset,
                format!("unknown boolean connective '{word}'"),
            )),
            Some(Token { tok: Tok::RParen, offset }) => {
                Err(DbError::syntax(*offset, "unbalanced ')'"))
            }
            Some(t) => Err(DbError::syntax(t.offset, "unexpected token after expression")),
        }
    }

    fn expr(&mut self, depth: usize) -> Result<Predicate, DbError> {
        if depth > MAX_NESTING {
            return Err(DbError::syntax(self.offset(), "expression nested too deeply"));
        }
        let mut acc = self.term(depth)?;
        loop {
            if self.eat_keyword("and") {
                let rhs = self.term(depth)?;
                acc = acc.and(rhs);
            } else if self.eat_keyword("or") {
                let rhs = self.term(depth)?;
                acc = acc.or(rhs);
            } else {
                return Ok(acc);
            }
        }
    }

    fn term(&mut self, depth: usize) -> Result<Predicate, DbError> {
        if matches!(self.peek(), Some(Token { tok: Tok::LParen, .. })) {
            let open = self.offset();
            self.pos += 1;
            let inner = self.expr(depth + 1)?;
            return match self.bump() {
                Some(Token { tok: Tok::RParen, .. }) => Ok(inner),
                _ => Err(DbError::syntax(open, "unbalanced '('")),
            };
        }
        self.clause()
    }

    fn clause(&mut self) -> Result<Predicate, DbError> {
        self.clauses += 1;
        if self.clauses > MAX_CLAUSES {
            return Err(DbError::syntax(self.offset(), "too many clauses"));
        }
        let field = match self.bump() {
            Some(Token { tok: Tok::Ident(f), offset }) => {
                if ["and", "or", "where", "select", "order"].iter().any(|k| f.eq_ignore_ascii_case(k)) {
                    return Err(DbError::syntax(offset, format!("expected field name, found '{f}'")));
                }
                f
            }
            Some(t) => return Err(DbError::syntax(t.offset, "expected field name")),
            None => return Err(DbError::syntax(self.end, "expected clause")),
        };
        let op = match self.bump() {
            Some(Token { tok: Tok::Op(op), .. }) => op,
            Some(t) => {
                return Err(DbError::syntax(t.offset, format!("expected operator after '{field}'")));
            }
            None => return Err(DbError::syntax(self.end, "expected operator")),
        };
        let value = match self.bump() {
            Some(Token { tok: Tok::Num(n), .. }) => n,
            Some(Token { tok: Tok::Str(s), .. }) => Literal::Str(s),
            Some(Token { tok: Tok::Ident(w), .. }) if w.eq_ignore_ascii_case("true") => {
                Literal::Bool(true)
            }
            Some(Token { tok: Tok::Ident(w), .. }) if w.eq_ignore_ascii_case("false") => {
                Literal::Bool(false)
            }
            Some(t) => return Err(DbError::syntax(t.offset, "expected literal")),
            None => return Err(DbError::syntax(self.end, "expected literal")),
        };
        Ok(Predicate::Cmp { field, op, value })
    }
}

/// Parse a full query statement (`select * where ... order by created desc`).
///
/// # Errors
/// Returns `SyntaxError` on malformed input.
pub fn parse_ql(ql: &str) -> Result<Statement, DbError> {
    if ql.len() > MAX_QL_LEN {
        return Err(DbError::syntax(MAX_QL_LEN, "query too long"));
    }
    let toks = lex(ql)?;
    let mut p = Parser { toks, pos: 0, end: ql.len(), clauses: 0 };
    p.statement()
}

/// Parse and keep only the filter part of a statement.
///
/// # Errors
/// Returns `SyntaxError` on malformed input.
pub fn parse_predicate(expression: &str) -> Result<Predicate, DbError> {
    parse_ql(expression).map(|s| s.predicate)
}
