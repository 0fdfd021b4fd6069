//! Fuzzy C Preprocessor - Common Types
//!
//! This crate contains the diagnostic types shared between the
//! preprocessing core and the batch driver.

pub mod diag;

pub use diag::{Diagnostic, DiagnosticKind, DiagnosticSink};
