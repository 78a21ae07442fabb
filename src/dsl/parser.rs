//! Single-pass expression compiler.
//!
//! There is no precedence climbing. Each nesting level keeps a `current`
//! expression and a stack of pending operators; every scanned operand is folded
//! in immediately by [`Compiler::combine`]:
//!
//! - with nothing built and nothing pending, the operand becomes `current`;
//! - otherwise each pending operator, most recently pushed first, builds
//!   `current <op> operand` (or `<op> operand` if `current` is still empty),
//!   reusing the same operand for every operator drained in that call.
//!
//! `[A] == 1 && [B] == 2` therefore reads as `(([A] == 1) && [B]) == 2`;
//! groups are how filters spell anything else.

use super::ast::{Expr, FieldRef, OperatorKind};
use super::lexer::{Grammar, Scanner, is_operator_symbol};
use crate::error::CompileError;
use crate::shape::Shape;
use crate::value::ValueKind;

pub const MAX_DEPTH: usize = 256;

pub(crate) struct Compiler<'s, 'f> {
    scanner: Scanner<'s>,
    shape: &'f Shape<'f>,
    grammar: Grammar,
    depth: usize,
}

impl<'s, 'f> Compiler<'s, 'f> {
    pub fn new(source: &'s str, shape: &'f Shape<'f>, grammar: Grammar) -> Self {
        Compiler {
            scanner: Scanner::new(source),
            shape,
            grammar,
            depth: 0,
        }
    }

    /// Compile the whole input. `Ok(None)` for empty or whitespace-only text.
    pub fn compile(mut self) -> Result<Option<Expr>, CompileError> {
        let expr = self.parse()?;
        if !self.scanner.is_at_end() {
            tracing::warn!(
                position = self.scanner.position(),
                ignored = self.scanner.remaining(),
                "Filter: ignoring input after unmatched ')'"
            );
        }
        Ok(expr)
    }

    /// One nesting level. Returns on end of input or on an unmatched `)`, which
    /// is left for the caller's scan loop to step over.
    fn parse(&mut self) -> Result<Option<Expr>, CompileError> {
        let mut pending: Vec<OperatorKind> = Vec::new();
        let mut current: Option<Expr> = None;

        while let Some(byte) = self.scanner.current() {
            match byte {
                b if b.is_ascii_whitespace() => {}
                b if is_operator_symbol(b) => {
                    pending.push(self.scanner.read_operator(self.grammar)?);
                }
                b'(' => {
                    let group = self.parse_group()?;
                    current = self.combine(current, &mut pending, group)?;
                }
                b')' => break,
                b'[' => {
                    let name = self.scanner.read_name();
                    let field = self.bind_field(name)?;
                    current = self.combine(current, &mut pending, field)?;
                }
                b'\'' => {
                    let literal = Expr::Literal(self.scanner.read_string());
                    current = self.combine(current, &mut pending, literal)?;
                }
                b'#' => {
                    let literal = Expr::Literal(self.scanner.read_date()?);
                    current = self.combine(current, &mut pending, literal)?;
                }
                b if b.is_ascii_digit() => {
                    let literal = Expr::Literal(self.scanner.read_number()?);
                    current = self.combine(current, &mut pending, literal)?;
                }
                _ => {}
            }
            self.scanner.advance();
        }

        Ok(current)
    }

    fn parse_group(&mut self) -> Result<Expr, CompileError> {
        if self.depth >= MAX_DEPTH {
            return Err(CompileError::NestingTooDeep { depth: MAX_DEPTH });
        }
        self.depth += 1;
        self.scanner.advance();
        let group = self.parse();
        self.depth -= 1;
        group?.ok_or(CompileError::EmptyExpression)
    }

    /// Resolve `[name]` against the target shape.
    fn bind_field(&self, name: &str) -> Result<Expr, CompileError> {
        let field = match self.shape {
            Shape::Static(fields) => {
                let index = fields
                    .iter()
                    .position(|field| field.name == name)
                    .ok_or_else(|| CompileError::UnknownField {
                        name: name.to_string(),
                    })?;
                FieldRef::Static {
                    name: name.to_string(),
                    index,
                    kind: fields[index].kind,
                }
            }
            Shape::Dynamic => FieldRef::Dynamic {
                name: name.to_string(),
            },
        };
        Ok(Expr::Field(field))
    }

    fn combine(
        &self,
        current: Option<Expr>,
        pending: &mut Vec<OperatorKind>,
        operand: Expr,
    ) -> Result<Option<Expr>, CompileError> {
        if current.is_none() && pending.is_empty() {
            return Ok(Some(operand));
        }
        if pending.is_empty() {
            tracing::debug!(%operand, "Filter: operand with no pending operator dropped");
            return Ok(current);
        }

        let mut current = current;
        while let Some(op) = pending.pop() {
            let node = match current.take() {
                Some(left) => binary(op, left, operand.clone())?,
                None => unary(op, operand.clone())?,
            };
            tracing::trace!(%node, "Filter: combined");
            current = Some(node);
        }
        Ok(current)
    }
}

fn binary(op: OperatorKind, left: Expr, right: Expr) -> Result<Expr, CompileError> {
    let left = match op {
        OperatorKind::Not => return Err(CompileError::MisplacedOperator { op }),
        OperatorKind::And | OperatorKind::Or => {
            require_boolean(op, &left)?;
            require_boolean(op, &right)?;
            left
        }
        _ => coerce(op, left, right.kind())?,
    };

    Ok(Expr::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    })
}

fn unary(op: OperatorKind, operand: Expr) -> Result<Expr, CompileError> {
    if op != OperatorKind::Not {
        return Err(CompileError::MisplacedOperator { op });
    }
    require_boolean(op, &operand)?;
    Ok(Expr::Unary {
        op,
        operand: Box::new(operand),
    })
}

/// Statically typed operands of connectives must be boolean; dynamic ones are
/// checked when the predicate runs.
fn require_boolean(op: OperatorKind, operand: &Expr) -> Result<(), CompileError> {
    match operand.kind() {
        Some(kind) if kind != ValueKind::Bool => Err(CompileError::TypeMismatch {
            from: kind,
            to: ValueKind::Bool,
            op,
        }),
        _ => Ok(()),
    }
}

/// Convert the left operand of a comparison to the right operand's kind.
fn coerce(op: OperatorKind, left: Expr, target: Option<ValueKind>) -> Result<Expr, CompileError> {
    let Some(to) = target else {
        return Ok(left);
    };
    match left.kind() {
        Some(from) if from == to => Ok(left),
        Some(from) if !from.can_convert_to(to) => {
            Err(CompileError::TypeMismatch { from, to, op })
        }
        _ => Ok(Expr::Convert {
            operand: Box::new(left),
            to,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::FieldDef;
    use crate::value::Value;

    const FIELDS: &[FieldDef] = &[
        FieldDef::new("Name", ValueKind::String),
        FieldDef::new("Number", ValueKind::Int32),
        FieldDef::new("Date", ValueKind::DateTime),
        FieldDef::new("Active", ValueKind::Bool),
    ];

    fn compile_static(source: &str) -> Result<Option<Expr>, CompileError> {
        let shape = Shape::Static(FIELDS);
        Compiler::new(source, &shape, Grammar::Compatible).compile()
    }

    fn compile_dynamic(source: &str) -> Result<Option<Expr>, CompileError> {
        let shape = Shape::Dynamic;
        Compiler::new(source, &shape, Grammar::Compatible).compile()
    }

    fn field(name: &str, index: usize, kind: ValueKind) -> Box<Expr> {
        Box::new(Expr::Field(FieldRef::Static {
            name: name.into(),
            index,
            kind,
        }))
    }

    #[test]
    fn test_simple_comparison() {
        let expr = compile_static("[Number] > 2").unwrap().unwrap();
        assert_eq!(
            expr,
            Expr::Binary {
                op: OperatorKind::GreaterThan,
                left: field("Number", 1, ValueKind::Int32),
                right: Box::new(Expr::Literal(Value::Int32(2))),
            }
        );
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(compile_static("").unwrap(), None);
        assert_eq!(compile_static("  \t\n ").unwrap(), None);
    }

    #[test]
    fn test_unknown_field_fails_at_compile_time() {
        assert_eq!(
            compile_static("[Missing] == 1"),
            Err(CompileError::UnknownField {
                name: "Missing".into()
            })
        );
    }

    #[test]
    fn test_groups_combine_with_connective() {
        let expr = compile_static("([Name] == 'a') || ([Name] == 'b')")
            .unwrap()
            .unwrap();
        assert_eq!(expr.to_string(), "(([Name] == 'a') || ([Name] == 'b'))");
    }

    #[test]
    fn test_number_before_close_paren() {
        let expr = compile_static("([Number] > 2) && ([Number] <= 5)")
            .unwrap()
            .unwrap();
        assert_eq!(expr.to_string(), "(([Number] > 2) && ([Number] <= 5))");
    }

    #[test]
    fn test_chain_without_groups_is_eager() {
        // reads as (([Number] == 1) && [Number]) == 2
        let err = compile_static("[Number] == 1 && [Number] == 2").unwrap_err();
        assert_eq!(
            err,
            CompileError::TypeMismatch {
                from: ValueKind::Int32,
                to: ValueKind::Bool,
                op: OperatorKind::And,
            }
        );
    }

    #[test]
    fn test_stacked_operators_share_one_operand() {
        // `>` then `!` pending before `[Active]`: `!` is applied first and has a
        // left operand, which is not a valid use of `!`.
        assert_eq!(
            compile_static("[Active] > ![Active]"),
            Err(CompileError::MisplacedOperator {
                op: OperatorKind::Not
            })
        );

        // Two comparisons pending before one operand both fold it in.
        let expr = compile_dynamic("[A] == != [B]").unwrap().unwrap();
        assert_eq!(expr.to_string(), "(([A] != [B]) == [B])");
    }

    #[test]
    fn test_leading_not() {
        let expr = compile_static("!([Number] > 2)").unwrap().unwrap();
        assert_eq!(expr.to_string(), "!([Number] > 2)");

        let expr = compile_static("![Active]").unwrap().unwrap();
        assert_eq!(
            expr,
            Expr::Unary {
                op: OperatorKind::Not,
                operand: field("Active", 3, ValueKind::Bool),
            }
        );
    }

    #[test]
    fn test_leading_binary_operator_is_misplaced() {
        assert_eq!(
            compile_static("== 2"),
            Err(CompileError::MisplacedOperator {
                op: OperatorKind::Equal
            })
        );
    }

    #[test]
    fn test_left_converted_to_right_kind() {
        let expr = compile_static("[Number] == '3'").unwrap().unwrap();
        assert_eq!(
            expr,
            Expr::Binary {
                op: OperatorKind::Equal,
                left: Box::new(Expr::Convert {
                    operand: field("Number", 1, ValueKind::Int32),
                    to: ValueKind::String,
                }),
                right: Box::new(Expr::Literal(Value::String("3".into()))),
            }
        );
    }

    #[test]
    fn test_impossible_conversion_is_type_mismatch() {
        assert_eq!(
            compile_static("[Date] > 2"),
            Err(CompileError::TypeMismatch {
                from: ValueKind::DateTime,
                to: ValueKind::Int32,
                op: OperatorKind::GreaterThan,
            })
        );
    }

    #[test]
    fn test_dynamic_field_conversion_is_deferred() {
        let expr = compile_dynamic("[Number] > 2").unwrap().unwrap();
        assert_eq!(
            expr,
            Expr::Binary {
                op: OperatorKind::GreaterThan,
                left: Box::new(Expr::Convert {
                    operand: Box::new(Expr::Field(FieldRef::Dynamic {
                        name: "Number".into()
                    })),
                    to: ValueKind::Int32,
                }),
                right: Box::new(Expr::Literal(Value::Int32(2))),
            }
        );
    }

    #[test]
    fn test_unmatched_close_paren_stops_scan() {
        let expr = compile_static("[Number] > 2) || garbage ==").unwrap().unwrap();
        assert_eq!(expr.to_string(), "([Number] > 2)");
    }

    #[test]
    fn test_operand_without_operator_is_dropped() {
        let expr = compile_static("[Number] > 2 7").unwrap().unwrap();
        assert_eq!(expr.to_string(), "([Number] > 2)");
    }

    #[test]
    fn test_empty_group_fails() {
        assert_eq!(compile_static("()"), Err(CompileError::EmptyExpression));
    }

    #[test]
    fn test_nesting_limit() {
        let deep = format!("{}[Active]{}", "(".repeat(300), ")".repeat(300));
        assert_eq!(
            compile_static(&deep),
            Err(CompileError::NestingTooDeep { depth: MAX_DEPTH })
        );

        let fine = format!("{}[Active]{}", "(".repeat(20), ")".repeat(20));
        assert!(compile_static(&fine).unwrap().is_some());
    }

    #[test]
    fn test_unrecognized_characters_are_ignored() {
        let expr = compile_static("[Number] ~> 2").unwrap().unwrap();
        assert_eq!(expr.to_string(), "([Number] > 2)");
    }
}
