//! Diagnostic reporting for the preprocessor
//!
//! Diagnostics are collected into an ordered list and returned alongside the
//! expanded output; they are never used as control flow, so a file that
//! produced errors can still yield (possibly incomplete) output.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Classification of a preprocessing diagnostic.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiagnosticKind {
    /// Hard errors: incompatible redefinition, bad token paste, argument
    /// count mismatch, `#error` directives.
    #[error("error")]
    Error,
    /// `#warning` directives and suspicious but recoverable constructs.
    #[error("warning")]
    Warning,
    /// An `#include` that resolved nowhere on the search paths.
    #[error("missing header")]
    MissingHeader,
    /// The include nesting depth cap was exceeded.
    #[error("include nested too deeply")]
    IncludeNestedTooDeeply,
    /// Malformed directives, unbalanced conditionals, bad literals.
    #[error("syntax error")]
    SyntaxError,
    /// Whitespace between a line-continuation backslash and the newline.
    #[error("portability")]
    PortabilityBackslash,
    /// A byte the tokenizer does not recognize.
    #[error("unhandled char")]
    UnhandledChar,
}

impl DiagnosticKind {
    /// Whether this kind counts towards the error total.
    pub fn is_error(self) -> bool {
        matches!(
            self,
            DiagnosticKind::Error
                | DiagnosticKind::MissingHeader
                | DiagnosticKind::IncludeNestedTooDeeply
                | DiagnosticKind::SyntaxError
        )
    }
}

/// A single diagnostic, tagged with the file and physical line that
/// produced it.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[error("{}:{line}: {kind}: {message}", file.display())]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub file: PathBuf,
    pub line: u32,
    pub message: String,
}

/// Collector for diagnostics emitted during one preprocessing run.
#[derive(Debug, Default)]
pub struct DiagnosticSink {
    diagnostics: Vec<Diagnostic>,
    error_count: usize,
    warning_count: usize,
}

impl DiagnosticSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a diagnostic.
    pub fn report(
        &mut self,
        kind: DiagnosticKind,
        file: impl Into<PathBuf>,
        line: u32,
        message: impl Into<String>,
    ) {
        self.push(Diagnostic {
            kind,
            file: file.into(),
            line,
            message: message.into(),
        });
    }

    /// Append an already-built diagnostic.
    pub fn push(&mut self, diagnostic: Diagnostic) {
        if diagnostic.kind.is_error() {
            self.error_count += 1;
        } else {
            self.warning_count += 1;
        }
        self.diagnostics.push(diagnostic);
    }

    /// Check if any errors have been reported.
    pub fn has_errors(&self) -> bool {
        self.error_count > 0
    }

    /// Get the number of errors.
    pub fn error_count(&self) -> usize {
        self.error_count
    }

    /// Get the number of warnings.
    pub fn warning_count(&self) -> usize {
        self.warning_count
    }

    /// Get all diagnostics, in emission order.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Consume the sink, yielding the collected diagnostics.
    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }

    /// Create a summary string.
    pub fn summary(&self) -> String {
        match (self.error_count, self.warning_count) {
            (0, 0) => "no errors or warnings".to_string(),
            (0, w) => format!("{} warning{}", w, if w == 1 { "" } else { "s" }),
            (e, 0) => format!("{} error{}", e, if e == 1 { "" } else { "s" }),
            (e, w) => format!(
                "{} error{} and {} warning{}",
                e,
                if e == 1 { "" } else { "s" },
                w,
                if w == 1 { "" } else { "s" }
            ),
        }
    }
}
