//! Expression tree for compiled filters.

use std::fmt;

use crate::value::{Value, ValueKind};

/// Operator kinds recognized by the operator reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperatorKind {
    Not,            // !
    NotEqual,       // !=
    Equal,          // ==
    GreaterThan,    // >
    GreaterOrEqual, // >=
    LessThan,       // < (strict grammar only)
    LessOrEqual,    // <=, and < in the compatible grammar
    And,            // &&
    Or,             // ||
}

impl OperatorKind {
    /// `&&` and `||` take boolean operands and never convert them.
    pub fn is_connective(self) -> bool {
        matches!(self, OperatorKind::And | OperatorKind::Or)
    }

    pub fn is_comparison(self) -> bool {
        !self.is_connective() && self != OperatorKind::Not
    }
}

impl fmt::Display for OperatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            OperatorKind::Not => "!",
            OperatorKind::NotEqual => "!=",
            OperatorKind::Equal => "==",
            OperatorKind::GreaterThan => ">",
            OperatorKind::GreaterOrEqual => ">=",
            OperatorKind::LessThan => "<",
            OperatorKind::LessOrEqual => "<=",
            OperatorKind::And => "&&",
            OperatorKind::Or => "||",
        };
        f.write_str(symbol)
    }
}

/// Literal token kinds, used in error reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiteralKind {
    Number,
    String,
    Date,
}

impl fmt::Display for LiteralKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LiteralKind::Number => write!(f, "number"),
            LiteralKind::String => write!(f, "string"),
            LiteralKind::Date => write!(f, "date"),
        }
    }
}

/// A bound `[Field]` reference.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldRef {
    /// Declared field of a static shape, resolved at compile time.
    Static {
        name: String,
        index: usize,
        kind: ValueKind,
    },
    /// Member looked up by name on each instance when the predicate runs.
    Dynamic { name: String },
}

impl FieldRef {
    pub fn name(&self) -> &str {
        match self {
            FieldRef::Static { name, .. } | FieldRef::Dynamic { name } => name,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Field(FieldRef),
    /// Left operand converted to the right operand's kind.
    Convert { operand: Box<Expr>, to: ValueKind },
    Binary {
        op: OperatorKind,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Unary { op: OperatorKind, operand: Box<Expr> },
}

impl Expr {
    /// Static kind of the node; `None` when it depends on a dynamic member.
    pub fn kind(&self) -> Option<ValueKind> {
        match self {
            Expr::Literal(value) => value.kind(),
            Expr::Field(FieldRef::Static { kind, .. }) => Some(*kind),
            Expr::Field(FieldRef::Dynamic { .. }) => None,
            Expr::Convert { to, .. } => Some(*to),
            Expr::Binary { .. } | Expr::Unary { .. } => Some(ValueKind::Bool),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Literal(Value::String(s)) => write!(f, "'{}'", s),
            Expr::Literal(value @ Value::DateTime(_)) => write!(f, "#{}#", value),
            Expr::Literal(value) => write!(f, "{}", value),
            Expr::Field(field) => write!(f, "[{}]", field.name()),
            Expr::Convert { operand, to } => write!(f, "{}({})", to, operand),
            Expr::Binary { op, left, right } => write!(f, "({} {} {})", left, op, right),
            Expr::Unary { op, operand } => write!(f, "{}{}", op, operand),
        }
    }
}
