//! Error taxonomy shared by every layer of the query engine.
//!
//! The variants mirror the error kinds a client sees as the first token of an
//! error reply: `ParseError`, `InvalidQuery`, `UnknownProperty`, `UnknownLabel`,
//! `UnknownRelType`, `TypeMismatch`, `IndexError`, `DivByZero`, `Internal`.

use std::sync::{Mutex, MutexGuard};
use thiserror::Error;
use tracing::error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, GraphError>;

/// Errors produced while parsing, planning, or executing a query.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GraphError {
    /// The Cypher text is syntactically invalid.
    #[error("ParseError: {0}")]
    ParseError(String),
    /// Syntactically valid but semantically rejected (undeclared alias,
    /// whitelist violation, compile-time type error, inverted variable-length
    /// bound, ...).
    #[error("InvalidQuery: {0}")]
    InvalidQuery(String),
    /// Reference to a property key that does not exist in the schema.
    #[error("UnknownProperty: {0}")]
    UnknownProperty(String),
    /// Reference to a label that does not exist in the schema.
    #[error("UnknownLabel: {0}")]
    UnknownLabel(String),
    /// Reference to a relationship type that does not exist in the schema.
    #[error("UnknownRelType: {0}")]
    UnknownRelType(String),
    /// A runtime coercion failed (incomparable types, arithmetic on a
    /// non-numeric value, ...).
    #[error("TypeMismatch: {0}")]
    TypeMismatch(String),
    /// An index build or index query failed.
    #[error("IndexError: {0}")]
    IndexError(String),
    /// Division (or modulo) by zero.
    #[error("DivByZero: division by zero")]
    DivByZero,
    /// An internal invariant was violated; this is always a programmer error.
    #[error("Internal: {0}")]
    Internal(String),
}

impl GraphError {
    /// The stable wire-format tag clients match on (see external interfaces).
    pub fn tag(&self) -> &'static str {
        match self {
            GraphError::ParseError(_) => "ParseError",
            GraphError::InvalidQuery(_) => "InvalidQuery",
            GraphError::UnknownProperty(_) => "UnknownProperty",
            GraphError::UnknownLabel(_) => "UnknownLabel",
            GraphError::UnknownRelType(_) => "UnknownRelType",
            GraphError::TypeMismatch(_) => "TypeMismatch",
            GraphError::IndexError(_) => "IndexError",
            GraphError::DivByZero => "DivByZero",
            GraphError::Internal(_) => "Internal",
        }
    }
}

/// Locks the given mutex, turning lock poisoning into a fatal [`GraphError::Internal`].
pub fn acquire_lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>> {
    mutex.lock().map_err(|_| {
        error!("engine lock poisoned - fatal error");
        GraphError::Internal("engine lock poisoned".into())
    })
}
