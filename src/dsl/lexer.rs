//! Token readers for the filter grammar.
//!
//! Tokens are recognized inline by the compiler rather than in a separate pass.
//! Every reader starts with the cursor on the first character of its token and
//! leaves it on the last one; the compiler's scan loop then steps past it.

use serde::Deserialize;
use std::str::FromStr;
use winnow::prelude::*;
use winnow::token::take_while;

use super::ast::{LiteralKind, OperatorKind};
use crate::error::CompileError;
use crate::value::{Value, parse_datetime};

// Result type shared by the token parsers.
type PResult<T> = Result<T, winnow::error::ErrMode<winnow::error::ContextError>>;

const OPERATOR_SYMBOLS: &[u8] = b"!=><&|";

/// Operator table variant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Grammar {
    /// Bare `<` reads as `<=`.
    #[default]
    Compatible,
    /// Bare `<` is a strict less-than.
    Strict,
}

impl Grammar {
    /// Exact-match lookup of a scanned operator run.
    pub fn operator(self, symbol: &str) -> Option<OperatorKind> {
        Some(match symbol {
            "!" => OperatorKind::Not,
            "!=" => OperatorKind::NotEqual,
            "==" => OperatorKind::Equal,
            ">" => OperatorKind::GreaterThan,
            ">=" => OperatorKind::GreaterOrEqual,
            "<" => match self {
                Grammar::Compatible => OperatorKind::LessOrEqual,
                Grammar::Strict => OperatorKind::LessThan,
            },
            "<=" => OperatorKind::LessOrEqual,
            "&&" => OperatorKind::And,
            "||" => OperatorKind::Or,
            _ => return None,
        })
    }
}

impl FromStr for Grammar {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "compatible" => Ok(Grammar::Compatible),
            "strict" => Ok(Grammar::Strict),
            _ => Err(format!("invalid grammar: {value}")),
        }
    }
}

pub fn is_operator_symbol(byte: u8) -> bool {
    OPERATOR_SYMBOLS.contains(&byte)
}

fn run_of<'s>(input: &mut &'s str, accept: impl Fn(char) -> bool) -> PResult<&'s str> {
    take_while(0.., accept).parse_next(input)
}

/// Shared scan position over the filter text.
pub(crate) struct Scanner<'s> {
    source: &'s str,
    index: usize,
}

impl<'s> Scanner<'s> {
    pub fn new(source: &'s str) -> Self {
        Scanner { source, index: 0 }
    }

    pub fn position(&self) -> usize {
        self.index
    }

    pub fn current(&self) -> Option<u8> {
        self.source.as_bytes().get(self.index).copied()
    }

    pub fn advance(&mut self) {
        self.index += 1;
    }

    pub fn is_at_end(&self) -> bool {
        self.index >= self.source.len()
    }

    pub fn remaining(&self) -> &'s str {
        self.source.get(self.index..).unwrap_or("")
    }

    /// Consume the maximal run accepted by `accept`, leaving the cursor on the
    /// first character after it.
    fn read_while(&mut self, accept: impl Fn(char) -> bool) -> &'s str {
        let mut rest = self.remaining();
        let run = run_of(&mut rest, accept).unwrap_or("");
        self.index += run.len();
        run
    }

    /// Cursor on the opening delimiter; stops on the closing one (or at the end).
    fn read_delimited(&mut self, close: char) -> &'s str {
        self.advance();
        self.read_while(|c| c != close)
    }

    pub fn read_operator(&mut self, grammar: Grammar) -> Result<OperatorKind, CompileError> {
        let position = self.index;
        let run = self.read_while(|c| c.is_ascii() && is_operator_symbol(c as u8));
        // back onto the last symbol of the run
        self.index -= 1;
        grammar
            .operator(run)
            .ok_or_else(|| CompileError::UnrecognizedOperator {
                symbol: run.to_string(),
                position,
            })
    }

    pub fn read_number(&mut self) -> Result<Value, CompileError> {
        let position = self.index;
        let digits = self.read_while(|c| c.is_ascii_digit());
        self.index -= 1;
        digits
            .parse::<i32>()
            .map(Value::Int32)
            .map_err(|_| CompileError::MalformedLiteral {
                kind: LiteralKind::Number,
                text: digits.to_string(),
                position,
            })
    }

    /// No escapes: a string literal cannot contain a quote.
    pub fn read_string(&mut self) -> Value {
        Value::String(self.read_delimited('\'').to_string())
    }

    pub fn read_date(&mut self) -> Result<Value, CompileError> {
        let position = self.index;
        let text = self.read_delimited('#');
        parse_datetime(text)
            .map(Value::DateTime)
            .ok_or_else(|| CompileError::MalformedLiteral {
                kind: LiteralKind::Date,
                text: text.to_string(),
                position,
            })
    }

    pub fn read_name(&mut self) -> &'s str {
        self.read_delimited(']')
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn operator_run_backs_up_onto_last_symbol() {
        let mut scanner = Scanner::new(">= 3");
        let op = scanner.read_operator(Grammar::Compatible).unwrap();
        assert_eq!(op, OperatorKind::GreaterOrEqual);
        assert_eq!(scanner.position(), 1);
    }

    #[test]
    fn operator_table_is_exact_match() {
        let mut scanner = Scanner::new("=<");
        assert_eq!(
            scanner.read_operator(Grammar::Compatible),
            Err(CompileError::UnrecognizedOperator {
                symbol: "=<".into(),
                position: 0
            })
        );

        let mut scanner = Scanner::new("!==");
        assert!(scanner.read_operator(Grammar::Compatible).is_err());
    }

    #[test]
    fn bare_less_than_depends_on_grammar() {
        assert_eq!(
            Grammar::Compatible.operator("<"),
            Some(OperatorKind::LessOrEqual)
        );
        assert_eq!(Grammar::Strict.operator("<"), Some(OperatorKind::LessThan));
        assert_eq!(Grammar::Strict.operator("<="), Some(OperatorKind::LessOrEqual));
        assert_eq!(Grammar::Compatible.operator("="), None);
        assert_eq!("STRICT".parse::<Grammar>(), Ok(Grammar::Strict));
    }

    #[test]
    fn number_stops_on_last_digit() {
        let mut scanner = Scanner::new("42)");
        assert_eq!(scanner.read_number().unwrap(), Value::Int32(42));
        assert_eq!(scanner.position(), 1);
    }

    #[test]
    fn number_overflow_is_malformed() {
        let mut scanner = Scanner::new("2147483648");
        assert!(matches!(
            scanner.read_number(),
            Err(CompileError::MalformedLiteral {
                kind: LiteralKind::Number,
                ..
            })
        ));
    }

    #[test]
    fn string_reads_to_closing_quote() {
        let mut scanner = Scanner::new("'Name0' rest");
        assert_eq!(scanner.read_string(), Value::String("Name0".into()));
        assert_eq!(scanner.current(), Some(b'\''));

        let mut scanner = Scanner::new("''");
        assert_eq!(scanner.read_string(), Value::String(String::new()));
    }

    #[test]
    fn unterminated_string_reads_to_end() {
        let mut scanner = Scanner::new("'open");
        assert_eq!(scanner.read_string(), Value::String("open".into()));
        assert!(scanner.is_at_end());
    }

    #[test]
    fn date_literal_is_parsed() {
        let mut scanner = Scanner::new("#03-14-2024#");
        assert_eq!(
            scanner.read_date().unwrap(),
            Value::DateTime(datetime!(2024-03-14 0:00))
        );
        assert_eq!(scanner.position(), 11);

        let mut scanner = Scanner::new("#someday#");
        assert!(scanner.read_date().is_err());
    }

    #[test]
    fn name_excludes_brackets() {
        let mut scanner = Scanner::new("[Order Date]");
        assert_eq!(scanner.read_name(), "Order Date");
        assert_eq!(scanner.current(), Some(b']'));
    }
}
