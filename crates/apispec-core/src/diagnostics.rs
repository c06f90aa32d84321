use serde::{Deserialize, Serialize};

use crate::Position;

/// The three error strata from the design doc collapse, for anything short
/// of a fatal abort, into a single diagnostic shape: a kind tag, an optional
/// source position, and a human-readable message. Fatal errors use
/// [`crate::Error`] instead and never reach this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiagnosticKind {
    /// A package failed to type-check or its files were unreadable; the
    /// package was skipped and the rest of the run continued.
    PackageSkipped,
    /// A call-site's callee could not be statically resolved.
    OpaqueCallSite,
    /// A tracker node's resolved callee has no known handler semantics.
    UnknownHandler,
    /// A decoded request body's type could not be determined.
    UnknownRequestType,
    /// A response encoder's status code could not be constant-folded.
    UnknownStatusCode,
    /// A pattern matched but a required capture (method, path, handler, ...)
    /// was missing.
    MissingCapture,
    /// A per-tree resource budget was exhausted and the branch was pruned.
    BudgetExhausted,
    /// Two route registrations collided on `(method, effective-path)`.
    DuplicateRoute,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub position: Option<Position>,
    pub message: String,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, position: Option<Position>, message: impl Into<String>) -> Self {
        Self {
            kind,
            position,
            message: message.into(),
        }
    }
}

/// Shared, append-only collection point for soft diagnostics produced while
/// extracting, tracking, or matching. Mirrors the schema map's
/// insert-if-absent discipline: every writer appends under a short critical
/// section, no reader ever blocks a writer out for long.
#[derive(Debug, Default)]
pub struct Diagnostics {
    inner: parking_lot::Mutex<Vec<Diagnostic>>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, diagnostic: Diagnostic) {
        self.inner.lock().push(diagnostic);
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.inner.into_inner()
    }

    pub fn snapshot(&self) -> Vec<Diagnostic> {
        self.inner.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
