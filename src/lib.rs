//! Filter expressions over typed records and row cursors.
//!
//! A filter such as `([Name] == 'Name0') || ([Number] > 2)` is compiled once
//! against a target shape into a [`Predicate`], then evaluated against any
//! number of elements. Row cursors ([`cursor::RowCursor`]) are adapted into
//! sequences of [`cursor::RowRecord`]s so the same filters apply to tabular
//! input.

pub mod cursor;
pub mod dsl;
pub mod error;
pub mod predicate;
pub mod shape;
pub mod value;

pub use error::{CompileError, ConvertError, CursorError, Error, EvalError};
pub use predicate::{
    CompiledFilter, FilterExt, Predicate, PredicateBuilder, Subject, Target, TryWhere, Where,
    compile, compile_with, filter_sequence,
};
pub use shape::{Dynamic, FieldDef, FieldValue, Record, Shape};
pub use value::{Value, ValueKind};
