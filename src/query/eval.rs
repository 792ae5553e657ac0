use crate::entity::Entity;
use crate::errors::DbError;
use crate::types::Value;
use std::cmp::Ordering;

use super::types::{CmpOp, Literal, Predicate};

/// Evaluate a predicate against one entity.
///
/// Missing fields make a comparison false. A range comparison on operands that
/// are not both numeric fails with `TypeMismatch`; callers exclude that entity.
///
/// # Errors
/// Returns `TypeMismatch` as described above.
pub fn evaluate(predicate: &Predicate, entity: &Entity) -> Result<bool, DbError> {
    match predicate {
        Predicate::All => Ok(true),
        Predicate::And(a, b) => Ok(evaluate(a, entity)? && evaluate(b, entity)?),
        Predicate::Or(a, b) => {
            let left = evaluate(a, entity)?;
            let right = evaluate(b, entity)?;
            Ok(left || right)
        }
        Predicate::Cmp { field, op, value } => match entity.field(field) {
            None | Some(Value::Null) => Ok(false),
            Some(v) => compare(field, &v, *op, value),
        },
    }
}

fn compare(field: &str, v: &Value, op: CmpOp, lit: &Literal) -> Result<bool, DbError> {
    if !op.is_range() {
        return Ok(equals(v, lit));
    }
    let Some(ord) = numeric_cmp(v, lit) else {
        return Err(DbError::TypeMismatch {
            field: field.to_string(),
            message: format!(
                "cannot apply '{}' to {} and {}",
                op.symbol(),
                v.type_name(),
                lit.to_value().type_name()
            ),
        });
    };
    Ok(match ord {
        // NaN on either side never satisfies a range
        None => false,
        Some(o) => match op {
            CmpOp::Gt => o == Ordering::Greater,
            CmpOp::Gte => o != Ordering::Less,
            CmpOp::Lt => o == Ordering::Less,
            CmpOp::Lte => o != Ordering::Greater,
            CmpOp::Eq => o == Ordering::Equal,
        },
    })
}

fn equals(v: &Value, lit: &Literal) -> bool {
    match (v, lit) {
        (Value::String(a), Literal::Str(b)) => a == b,
        (Value::Bool(a), Literal::Bool(b)) => a == b,
        _ => matches!(numeric_cmp(v, lit), Some(Some(Ordering::Equal))),
    }
}

/// Outer `None`: not both numbers. Inner `None`: unordered (NaN).
#[allow(clippy::cast_precision_loss)]
fn numeric_cmp(v: &Value, lit: &Literal) -> Option<Option<Ordering>> {
    match (v, lit) {
        (Value::Int(a), Literal::Int(b)) => Some(Some(a.cmp(b))),
        (Value::Int(a), Literal::Float(b)) => Some((*a as f64).partial_cmp(b)),
        (Value::Float(a), Literal::Int(b)) => Some(a.partial_cmp(&(*b as f64))),
        (Value::Float(a), Literal::Float(b)) => Some(a.partial_cmp(b)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::props;
    use crate::query::parse_predicate;
    use crate::types::EntityId;

    fn activity(verb: &str, ordinal: i64) -> Entity {
        Entity {
            id: EntityId::new(),
            entity_type: "activities".into(),
            created: 1_000 + ordinal,
            properties: props! {
                "verb" => verb,
                "ordinal" => ordinal,
                "ratio" => 0.5,
                "actor" => props! { "displayName" => "Erin" },
            },
        }
    }

    fn eval(ql: &str, e: &Entity) -> Result<bool, DbError> {
        evaluate(&parse_predicate(ql).unwrap(), e)
    }

    #[test]
    fn equality_on_strings_and_numbers() {
        let e = activity("stop", 3);
        assert!(eval("verb = 'stop'", &e).unwrap());
        assert!(!eval("verb = 'go'", &e).unwrap());
        assert!(eval("ordinal = 3", &e).unwrap());
        assert!(eval("ordinal = 3.0", &e).unwrap());
        assert!(eval("ratio = 0.5", &e).unwrap());
        assert!(eval("actor.displayName = 'Erin'", &e).unwrap());
    }

    #[test]
    fn equality_across_types_is_false_not_error() {
        let e = activity("stop", 3);
        assert!(!eval("verb = 3", &e).unwrap());
        assert!(!eval("ordinal = '3'", &e).unwrap());
    }

    #[test]
    fn range_on_created_and_numbers() {
        let e = activity("go", 5);
        assert!(eval("created >= 1005", &e).unwrap());
        assert!(!eval("created > 1005", &e).unwrap());
        assert!(eval("created <= 1005", &e).unwrap());
        assert!(eval("ordinal < 5.5", &e).unwrap());
    }

    #[test]
    fn missing_field_is_false() {
        let e = activity("go", 1);
        assert!(!eval("nope = 1", &e).unwrap());
        assert!(!eval("nope >= 1", &e).unwrap());
    }

    #[test]
    fn range_on_string_is_type_mismatch() {
        let e = activity("go", 1);
        let err = eval("verb > 3", &e).unwrap_err();
        assert!(matches!(err, DbError::TypeMismatch { ref field, .. } if field == "verb"));
        assert!(eval("ordinal >= 'a'", &e).is_err());
    }

    #[test]
    fn and_short_circuits_or_does_not() {
        let e = activity("go", 1);
        // left side false: the mismatching right side is never looked at
        assert!(!eval("verb = 'stop' and verb > 1", &e).unwrap());
        assert!(eval("verb = 'go' or verb > 1", &e).is_err());
        assert!(eval("verb = 'stop' or ordinal = 1", &e).unwrap());
    }
}
