//! Error types for compiling and evaluating filters and reading rows.

use thiserror::Error;

use crate::dsl::{LiteralKind, OperatorKind};
use crate::value::ValueKind;

/// Failure while turning filter text into a predicate.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompileError {
    #[error("Unrecognized operator '{symbol}' at position {position}")]
    UnrecognizedOperator { symbol: String, position: usize },

    #[error("Malformed {kind} literal '{text}' at position {position}")]
    MalformedLiteral {
        kind: LiteralKind,
        text: String,
        position: usize,
    },

    #[error("Unknown field '{name}'")]
    UnknownField { name: String },

    #[error("Type mismatch: cannot use {from} as {to} with operator '{op}'")]
    TypeMismatch {
        from: ValueKind,
        to: ValueKind,
        op: OperatorKind,
    },

    #[error("Operator '{op}' has no valid operand arrangement here")]
    MisplacedOperator { op: OperatorKind },

    #[error("Filter must evaluate to a boolean, found {found}")]
    NotBoolean { found: ValueKind },

    #[error("Filter expression is empty")]
    EmptyExpression,

    #[error("Groups nested deeper than {depth} levels")]
    NestingTooDeep { depth: usize },
}

/// Failure of a single predicate invocation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    #[error("Member '{name}' could not be resolved on this instance")]
    UnresolvedMember { name: String },

    #[error("Expected a boolean operand, found {}", kind_label(.found))]
    NotBoolean { found: Option<ValueKind> },

    #[error(transparent)]
    Conversion(#[from] ConvertError),
}

fn kind_label(kind: &Option<ValueKind>) -> String {
    kind.map_or_else(|| "null".to_string(), |k| k.to_string())
}

/// Failure of [`Value::convert`](crate::value::Value::convert).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConvertError {
    #[error("Conversion from {from} to {to} is not supported")]
    Unsupported { from: ValueKind, to: ValueKind },

    #[error("'{text}' is not a valid {to}")]
    Invalid { text: String, to: ValueKind },

    #[error("Value {text} is out of range for {to}")]
    Overflow { text: String, to: ValueKind },
}

/// Failure reading from a row cursor.
#[derive(Error, Debug)]
pub enum CursorError {
    #[error("Cursor is not positioned on a row")]
    NoCurrentRow,

    #[error("Ordinal {ordinal} is out of range ({count} fields)")]
    OrdinalOutOfRange { ordinal: usize, count: usize },

    #[error("Unknown column '{0}'")]
    UnknownColumn(String),

    #[error("Field {ordinal} holds {found}, not {expected}")]
    InvalidCast {
        ordinal: usize,
        expected: ValueKind,
        found: String,
    },

    #[error("Row {row} has {found} values, expected {expected}")]
    RowWidth {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("Column '{column}' has unsupported type {data_type}")]
    UnsupportedType { column: String, data_type: String },

    #[error("JSON error on line {line}: {source}")]
    Json {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("Line {line} is not a JSON object")]
    NotAnObject { line: usize },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Arrow(#[from] arrow_schema::ArrowError),

    #[error(transparent)]
    Parquet(#[from] parquet::errors::ParquetError),
}

/// Any failure raised by this crate.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Eval(#[from] EvalError),

    #[error(transparent)]
    Convert(#[from] ConvertError),

    #[error(transparent)]
    Cursor(#[from] CursorError),
}
