//! Turning filter text into predicates and applying them to sequences.

use std::fmt;
use std::marker::PhantomData;

use crate::dsl::{Compiler, Expr, FieldRef, Grammar, evaluate, truth};
use crate::error::{CompileError, Error, EvalError};
use crate::shape::{Dynamic, Record, Shape};
use crate::value::{Value, ValueKind};

/// An element type a predicate can be compiled for.
///
/// Implemented for every [`Record`] (static shape) and for `dyn Dynamic`
/// (dynamic shape).
pub trait Target {
    fn shape() -> Shape<'static>;

    /// Read a bound field, converted to `requested` when given.
    fn read(&self, field: &FieldRef, requested: Option<ValueKind>) -> Result<Value, EvalError>;
}

impl<R: Record> Target for R {
    fn shape() -> Shape<'static> {
        Shape::Static(R::FIELDS)
    }

    fn read(&self, field: &FieldRef, requested: Option<ValueKind>) -> Result<Value, EvalError> {
        let index = match field {
            FieldRef::Static { index, .. } => *index,
            FieldRef::Dynamic { name } => R::FIELDS
                .iter()
                .position(|def| def.name == name.as_str())
                .ok_or_else(|| EvalError::UnresolvedMember { name: name.clone() })?,
        };
        let value = self.field(index);
        match requested {
            Some(kind) => Ok(value.convert(kind)?),
            None => Ok(value),
        }
    }
}

impl<'a> Target for dyn Dynamic + 'a {
    fn shape() -> Shape<'static> {
        Shape::Dynamic
    }

    fn read(&self, field: &FieldRef, requested: Option<ValueKind>) -> Result<Value, EvalError> {
        let name = field.name();
        match requested {
            Some(kind) => self.resolve_as(name, kind),
            None => self
                .resolve(name)
                .ok_or_else(|| EvalError::UnresolvedMember {
                    name: name.to_string(),
                }),
        }
    }
}

/// A compiled filter, not yet tied to an element type.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledFilter {
    expr: Expr,
    source: String,
}

impl CompiledFilter {
    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn evaluate<T: Target + ?Sized>(&self, instance: &T) -> Result<bool, EvalError> {
        truth(evaluate(&self.expr, instance)?)
    }
}

/// Compile `source` against `shape` with the compatible grammar.
pub fn compile(source: &str, shape: &Shape<'_>) -> Result<CompiledFilter, CompileError> {
    compile_with(source, shape, Grammar::default())
}

pub fn compile_with(
    source: &str,
    shape: &Shape<'_>,
    grammar: Grammar,
) -> Result<CompiledFilter, CompileError> {
    let expr = Compiler::new(source, shape, grammar)
        .compile()?
        .ok_or(CompileError::EmptyExpression)?;

    if let Some(found) = expr.kind()
        && found != ValueKind::Bool
    {
        return Err(CompileError::NotBoolean { found });
    }

    tracing::debug!(source, compiled = %expr, "Filter: compiled");
    Ok(CompiledFilter {
        expr,
        source: source.to_string(),
    })
}

/// Builds [`Predicate`]s for elements of type `T`.
pub struct PredicateBuilder<T: ?Sized> {
    grammar: Grammar,
    _target: PhantomData<fn(&T)>,
}

impl<T: Target + ?Sized> PredicateBuilder<T> {
    pub fn new() -> Self {
        PredicateBuilder {
            grammar: Grammar::default(),
            _target: PhantomData,
        }
    }

    pub fn grammar(mut self, grammar: Grammar) -> Self {
        self.grammar = grammar;
        self
    }

    pub fn build(&self, source: &str) -> Result<Predicate<T>, CompileError> {
        let filter = compile_with(source, &T::shape(), self.grammar)?;
        Ok(Predicate {
            filter,
            _target: PhantomData,
        })
    }
}

impl<T: Target + ?Sized> Default for PredicateBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// A compiled filter for elements of type `T`.
///
/// Immutable once built: it can be shared across threads and evaluated any
/// number of times.
pub struct Predicate<T: ?Sized> {
    filter: CompiledFilter,
    _target: PhantomData<fn(&T)>,
}

impl<T: Target + ?Sized> Predicate<T> {
    pub fn test(&self, instance: &T) -> Result<bool, EvalError> {
        self.filter.evaluate(instance)
    }

    pub fn filter(&self) -> &CompiledFilter {
        &self.filter
    }
}

impl<T: ?Sized> Clone for Predicate<T> {
    fn clone(&self) -> Self {
        Predicate {
            filter: self.filter.clone(),
            _target: PhantomData,
        }
    }
}

impl<T: ?Sized> fmt::Debug for Predicate<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Predicate")
            .field("source", &self.filter.source)
            .field("expr", &self.filter.expr.to_string())
            .finish()
    }
}

/// Sequence items a `Predicate<T>` can be applied to.
pub trait Subject<T: ?Sized> {
    fn subject(&self) -> &T;
}

impl<R: Record> Subject<R> for R {
    fn subject(&self) -> &R {
        self
    }
}

impl<R: Record> Subject<R> for &R {
    fn subject(&self) -> &R {
        self
    }
}

impl<'a, D: Dynamic + 'a> Subject<dyn Dynamic + 'a> for D {
    fn subject(&self) -> &(dyn Dynamic + 'a) {
        self
    }
}

/// Iterator adapter keeping the elements a predicate accepts.
pub struct Where<I, T: ?Sized> {
    inner: I,
    predicate: Predicate<T>,
}

impl<I, T> Iterator for Where<I, T>
where
    I: Iterator,
    I::Item: Subject<T>,
    T: Target + ?Sized,
{
    type Item = Result<I::Item, EvalError>;

    fn next(&mut self) -> Option<Self::Item> {
        for item in self.inner.by_ref() {
            match self.predicate.test(item.subject()) {
                Ok(true) => return Some(Ok(item)),
                Ok(false) => continue,
                Err(err) => return Some(Err(err)),
            }
        }
        None
    }
}

/// [`Where`] over fallible items; upstream errors pass through.
pub struct TryWhere<I, T: ?Sized> {
    inner: I,
    predicate: Predicate<T>,
}

impl<I, T, S, E> Iterator for TryWhere<I, T>
where
    I: Iterator<Item = Result<S, E>>,
    S: Subject<T>,
    E: Into<Error>,
    T: Target + ?Sized,
{
    type Item = Result<S, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        for item in self.inner.by_ref() {
            let item = match item {
                Ok(item) => item,
                Err(err) => return Some(Err(err.into())),
            };
            match self.predicate.test(item.subject()) {
                Ok(true) => return Some(Ok(item)),
                Ok(false) => continue,
                Err(err) => return Some(Err(err.into())),
            }
        }
        None
    }
}

pub trait FilterExt: Iterator + Sized {
    /// Keep the items matching `clause`, compiled for `T`.
    fn filter_where<T>(self, clause: &str) -> Result<Where<Self, T>, CompileError>
    where
        T: Target + ?Sized,
        Self::Item: Subject<T>,
    {
        Ok(self.filter_with(PredicateBuilder::new().build(clause)?))
    }

    fn filter_with<T>(self, predicate: Predicate<T>) -> Where<Self, T>
    where
        T: Target + ?Sized,
        Self::Item: Subject<T>,
    {
        Where {
            inner: self,
            predicate,
        }
    }

    /// Like [`FilterExt::filter_where`] for iterators of `Result`s.
    fn try_filter_where<T, S, E>(self, clause: &str) -> Result<TryWhere<Self, T>, CompileError>
    where
        Self: Iterator<Item = Result<S, E>>,
        S: Subject<T>,
        E: Into<Error>,
        T: Target + ?Sized,
    {
        Ok(self.try_filter_with(PredicateBuilder::new().build(clause)?))
    }

    fn try_filter_with<T, S, E>(self, predicate: Predicate<T>) -> TryWhere<Self, T>
    where
        Self: Iterator<Item = Result<S, E>>,
        S: Subject<T>,
        E: Into<Error>,
        T: Target + ?Sized,
    {
        TryWhere {
            inner: self,
            predicate,
        }
    }
}

impl<I: Iterator> FilterExt for I {}

/// Filter `sequence` by `clause`.
pub fn filter_sequence<I, T>(sequence: I, clause: &str) -> Result<Where<I::IntoIter, T>, CompileError>
where
    I: IntoIterator,
    I::Item: Subject<T>,
    T: Target + ?Sized,
{
    sequence.into_iter().filter_where(clause)
}
