//! Include resolution
//!
//! The core never touches the filesystem itself: a `FileLoader`
//! collaborator supplies file content, so the resolver can run against the
//! real filesystem, an overlay, or an in-memory tree in tests.

use crate::lexer::Token;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

/// Supplies file content to the preprocessor.
pub trait FileLoader {
    fn exists(&self, path: &Path) -> bool;
    fn load(&self, path: &Path) -> io::Result<String>;
}

/// An in-memory file tree. The test fixture of choice, and useful for
/// callers preprocessing sources that never existed on disk.
#[derive(Debug, Default)]
pub struct MemoryFileLoader {
    files: HashMap<PathBuf, String>,
}

impl MemoryFileLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<PathBuf>, content: impl Into<String>) {
        self.files.insert(path.into(), content.into());
    }
}

impl FileLoader for MemoryFileLoader {
    fn exists(&self, path: &Path) -> bool {
        self.files.contains_key(path)
    }

    fn load(&self, path: &Path) -> io::Result<String> {
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, path.display().to_string()))
    }
}

/// What to do when the same resolved path is included again.
///
/// `ReparseAlways` re-tokenizes every inclusion and is always correct.
/// `CacheByPath` reuses the token sequence of the first inclusion. Directives
/// still re-execute either way, so include guards keep working, but lexer
/// diagnostics in a cached file surface only on its first inclusion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IncludePolicy {
    #[default]
    ReparseAlways,
    CacheByPath,
}

/// Maximum include depth (standard is usually 200-1024).
pub const MAX_INCLUDE_DEPTH: usize = 200;

pub struct IncludeResolver {
    include_paths: Vec<PathBuf>,
    /// Directories of force-included files, searched for quote-form
    /// includes after the including file's own directory.
    quote_fallbacks: Vec<PathBuf>,
    policy: IncludePolicy,
    cache: HashMap<PathBuf, Vec<Token>>,
}

impl IncludeResolver {
    pub fn new(
        include_paths: Vec<PathBuf>,
        quote_fallbacks: Vec<PathBuf>,
        policy: IncludePolicy,
    ) -> Self {
        Self {
            include_paths,
            quote_fallbacks,
            policy,
            cache: HashMap::new(),
        }
    }

    /// Resolve a directive's file spec against the search paths, in listed
    /// order. Quote-form includes try the including file's directory first;
    /// angle-form includes use only the configured include paths.
    pub fn resolve(
        &self,
        loader: &dyn FileLoader,
        spec: &str,
        is_angle: bool,
        current_dir: Option<&Path>,
    ) -> Option<PathBuf> {
        if !is_angle {
            if let Some(dir) = current_dir {
                let candidate = dir.join(spec);
                if loader.exists(&candidate) {
                    return Some(candidate);
                }
            }
            for dir in &self.quote_fallbacks {
                let candidate = dir.join(spec);
                if loader.exists(&candidate) {
                    return Some(candidate);
                }
            }
        }
        for dir in &self.include_paths {
            let candidate = dir.join(spec);
            if loader.exists(&candidate) {
                return Some(candidate);
            }
        }
        let as_given = Path::new(spec);
        if as_given.is_absolute() && loader.exists(as_given) {
            return Some(as_given.to_path_buf());
        }
        None
    }

    /// Cached token sequence for a resolved path, if the policy allows.
    pub fn cached(&self, path: &Path) -> Option<&[Token]> {
        if self.policy == IncludePolicy::CacheByPath {
            self.cache.get(path).map(Vec::as_slice)
        } else {
            None
        }
    }

    pub fn store(&mut self, path: PathBuf, tokens: Vec<Token>) {
        if self.policy == IncludePolicy::CacheByPath {
            self.cache.insert(path, tokens);
        }
    }
}
