//! Evaluator for compiled expression trees.

use std::cmp::Ordering;

use super::ast::{Expr, OperatorKind};
use crate::error::EvalError;
use crate::predicate::Target;
use crate::value::Value;

/// Evaluate `expr` against one instance.
pub fn evaluate<T>(expr: &Expr, target: &T) -> Result<Value, EvalError>
where
    T: Target + ?Sized,
{
    match expr {
        Expr::Literal(value) => Ok(value.clone()),

        Expr::Field(field) => target.read(field, None),

        // A dynamic member is asked for the requested kind directly so the
        // instance can apply its own null and conversion rules.
        Expr::Convert { operand, to } => match operand.as_ref() {
            Expr::Field(field) => target.read(field, Some(*to)),
            other => Ok(evaluate(other, target)?.convert(*to)?),
        },

        Expr::Unary { operand, .. } => Ok(Value::Bool(!truth(evaluate(operand, target)?)?)),

        Expr::Binary { op, left, right } => match op {
            OperatorKind::And => {
                if !truth(evaluate(left, target)?)? {
                    return Ok(Value::Bool(false));
                }
                Ok(Value::Bool(truth(evaluate(right, target)?)?))
            }
            OperatorKind::Or => {
                if truth(evaluate(left, target)?)? {
                    return Ok(Value::Bool(true));
                }
                Ok(Value::Bool(truth(evaluate(right, target)?)?))
            }
            comparison => {
                let left = evaluate(left, target)?;
                let right = evaluate(right, target)?;
                Ok(Value::Bool(compare(*comparison, left, right)?))
            }
        },
    }
}

pub fn truth(value: Value) -> Result<bool, EvalError> {
    match value {
        Value::Bool(b) => Ok(b),
        other => Err(EvalError::NotBoolean {
            found: other.kind(),
        }),
    }
}

/// Compare two evaluated operands. Kinds that only became known at run time
/// are reconciled by converting the left side to the right side's kind.
fn compare(op: OperatorKind, left: Value, right: Value) -> Result<bool, EvalError> {
    if left.is_null() || right.is_null() {
        let both = left.is_null() && right.is_null();
        return Ok(match op {
            OperatorKind::Equal => both,
            OperatorKind::NotEqual => !both,
            _ => false,
        });
    }

    let left = match (left.kind(), right.kind()) {
        (Some(l), Some(r)) if l != r => left.convert(r)?,
        _ => left,
    };

    let ordering = left.compare(&right);
    Ok(match op {
        OperatorKind::Equal => ordering == Some(Ordering::Equal),
        OperatorKind::NotEqual => ordering != Some(Ordering::Equal),
        OperatorKind::GreaterThan => ordering == Some(Ordering::Greater),
        OperatorKind::GreaterOrEqual => {
            matches!(ordering, Some(Ordering::Greater | Ordering::Equal))
        }
        OperatorKind::LessThan => ordering == Some(Ordering::Less),
        OperatorKind::LessOrEqual => matches!(ordering, Some(Ordering::Less | Ordering::Equal)),
        OperatorKind::Not | OperatorKind::And | OperatorKind::Or => false,
    })
}
