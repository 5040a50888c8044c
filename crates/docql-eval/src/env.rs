//! Binding environments.
//!
//! An environment is a stack of scopes; resolution is lexical (innermost
//! scope first, then outward). A `@name` reference forces the innermost
//! scope only, even when an outer scope binds the same name.

use docql_types::DocValue;

use crate::value::ExprValue;

/// An ordered set of name → value bindings. Insertion order is preserved
/// so `SELECT *` output is stable.
#[derive(Default, Clone)]
pub struct Bindings(Vec<(String, ExprValue)>);

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a binding. A later binding of the same name shadows the
    /// earlier one. A value without a `Named` facet picks up the binding
    /// name as its name (a value that already has one, such as an
    /// `UNPIVOT` element, keeps it).
    pub fn bind(&mut self, name: impl Into<String>, value: ExprValue) {
        let name = name.into();
        let value = if value.name().is_some() {
            value
        } else {
            let symbol = DocValue::Symbol(name.clone());
            value.named(symbol)
        };
        self.0.push((name, value));
    }

    pub fn get(&self, name: &str) -> Option<&ExprValue> {
        self.0
            .iter()
            .rev()
            .find(|(bound, _)| bound == name)
            .map(|(_, value)| value)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Drop bindings beyond `len` (used to backtrack a row in flight).
    pub fn truncate(&mut self, len: usize) {
        self.0.truncate(len);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ExprValue)> {
        self.0.iter().map(|(name, value)| (name.as_str(), value))
    }
}

/// A scope chain over borrowed binding frames.
pub struct Env<'a> {
    parent: Option<&'a Env<'a>>,
    scope: &'a Bindings,
}

impl<'a> Env<'a> {
    /// The root environment over the embedder's global bindings.
    pub fn root(scope: &'a Bindings) -> Self {
        Self {
            parent: None,
            scope,
        }
    }

    /// Push a scope on top of this environment.
    pub fn nested(&'a self, scope: &'a Bindings) -> Self {
        Self {
            parent: Some(self),
            scope,
        }
    }

    /// Lexical resolution: innermost scope first.
    pub fn lookup(&self, name: &str) -> Option<&ExprValue> {
        match self.scope.get(name) {
            Some(value) => Some(value),
            None => self.parent.and_then(|p| p.lookup(name)),
        }
    }

    /// `@name` resolution: the innermost scope only.
    pub fn lookup_local(&self, name: &str) -> Option<&ExprValue> {
        self.scope.get(name)
    }

    /// The innermost scope, for `SELECT *`.
    pub fn local_scope(&self) -> &Bindings {
        self.scope
    }
}
