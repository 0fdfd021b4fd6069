//! Macro table: definition, redefinition checks, lookup
//!
//! Built-in macros (`__LINE__`, `__FILE__`, ...) are not stored here; they
//! are computed at expansion time by the expander.

use crate::lexer::{FileId, Token, TokenKind};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use thiserror::Error;

/// A macro definition. The replacement body is stored with whitespace
/// tokens stripped; spacing is reintroduced by the output stringifier.
#[derive(Debug, Clone)]
pub struct MacroDefinition {
    pub name: String,
    /// `None` for object-like macros, `Some` (possibly empty) for
    /// function-like macros.
    pub params: Option<Vec<String>>,
    pub is_variadic: bool,
    pub body: Vec<Token>,
    pub file: FileId,
    pub line: u32,
}

impl MacroDefinition {
    pub fn is_function_like(&self) -> bool {
        self.params.is_some()
    }

    /// Two definitions are compatible when parameter lists and replacement
    /// tokens are textually identical modulo whitespace.
    fn same_definition(&self, other: &MacroDefinition) -> bool {
        if self.params != other.params || self.is_variadic != other.is_variadic {
            return false;
        }
        let texts = |body: &[Token]| -> Vec<String> {
            body.iter()
                .filter(|t| t.kind != TokenKind::Whitespace)
                .map(|t| t.text.clone())
                .collect()
        };
        texts(&self.body) == texts(&other.body)
    }
}

/// An incompatible `#define` of an already-defined name.
#[derive(Debug, Clone, Error)]
#[error("macro '{name}' redefined incompatibly (previous definition at line {prev_line})")]
pub struct RedefinitionError {
    pub name: String,
    pub prev_line: u32,
}

#[derive(Debug, Default)]
pub struct MacroTable {
    macros: HashMap<String, MacroDefinition>,
}

impl MacroTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a definition. An identical redefinition is a no-op; an
    /// incompatible one is rejected and the previous definition stays.
    pub fn define(&mut self, def: MacroDefinition) -> Result<(), RedefinitionError> {
        if let Some(prev) = self.macros.get(&def.name) {
            if prev.same_definition(&def) {
                return Ok(());
            }
            return Err(RedefinitionError {
                name: def.name.clone(),
                prev_line: prev.line,
            });
        }
        self.macros.insert(def.name.clone(), def);
        Ok(())
    }

    /// Remove a definition if present; no-op otherwise.
    pub fn undefine(&mut self, name: &str) {
        self.macros.remove(name);
    }

    pub fn lookup(&self, name: &str) -> Option<&MacroDefinition> {
        self.macros.get(name)
    }

    /// Used by `#ifdef` and `defined()`. Built-ins always count as defined.
    pub fn is_defined(&self, name: &str) -> bool {
        is_builtin(name) || self.macros.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.macros.len()
    }

    pub fn is_empty(&self) -> bool {
        self.macros.is_empty()
    }
}

/// Names expanded by the expander itself rather than from the table.
pub const BUILTIN_MACROS: &[&str] = &[
    "__LINE__",
    "__FILE__",
    "__DATE__",
    "__TIME__",
    "__STDC__",
    "__COUNTER__",
];

pub fn is_builtin(name: &str) -> bool {
    BUILTIN_MACROS.contains(&name)
}

/// `__DATE__`/`__TIME__` are captured once per process, so every file in a
/// batch sees the same timestamp ("Mmm dd yyyy" / "hh:mm:ss").
pub static BUILTIN_DATE: Lazy<String> =
    Lazy::new(|| chrono::Local::now().format("%b %e %Y").to_string());
pub static BUILTIN_TIME: Lazy<String> =
    Lazy::new(|| chrono::Local::now().format("%H:%M:%S").to_string());
