//! Filter grammar compiler.
//!
//! Syntax:
//!   [Field]                 - field reference
//!   'text'                  - string literal (no escapes)
//!   #03-14-2024#            - date literal
//!   42                      - 32-bit integer literal
//!   == != > >= < <=         - comparison (`<` reads as `<=` unless strict)
//!   && ||                   - boolean connectives
//!   !                       - NOT
//!   (expr)                  - grouping
//!
//! Operators are folded eagerly as operands are scanned, without precedence;
//! see [`parser`].

mod ast;
mod eval;
mod lexer;
pub mod parser;

pub use ast::*;
pub use eval::{evaluate, truth};
pub use lexer::{Grammar, is_operator_symbol};

pub(crate) use parser::Compiler;
