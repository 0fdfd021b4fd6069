//! Standards-track C preprocessor core
//!
//! Drives tokenization, directive handling, conditional compilation, macro
//! expansion and include resolution over one top-level file, returning the
//! expanded text together with every diagnostic collected on the way. All
//! state is owned by the run, so independent files can be preprocessed
//! concurrently with identically seeded tables.

pub mod cond;
pub mod expand;
pub mod include;
pub mod lexer;
pub mod macros;
pub mod output;
pub mod tests;

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use log::debug;

use cond::ConditionalFrame;
use expand::Expander;
use include::{FileLoader, IncludePolicy, IncludeResolver, MAX_INCLUDE_DEPTH};
use lexer::{FileId, Token, TokenKind};
use macros::{MacroDefinition, MacroTable};

pub use fzpp_common::{Diagnostic, DiagnosticKind, DiagnosticSink};
pub use include::MemoryFileLoader;

/// Per-run registry of files seen, mapping interned paths to [`FileId`]s.
#[derive(Debug, Default)]
pub struct FileRegistry {
    paths: Vec<PathBuf>,
}

impl FileRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(&mut self, path: &Path) -> FileId {
        if let Some(i) = self.paths.iter().position(|p| p == path) {
            return FileId(i as u32);
        }
        self.paths.push(path.to_path_buf());
        FileId((self.paths.len() - 1) as u32)
    }

    pub fn path(&self, id: FileId) -> &Path {
        &self.paths[id.0 as usize]
    }
}

/// Active `#line` remappings, per file. Only `__LINE__`/`__FILE__` and
/// re-emitted markers observe these; diagnostics keep physical positions.
#[derive(Debug, Default)]
pub struct LineOverrides {
    map: HashMap<FileId, (i64, Option<String>)>,
}

impl LineOverrides {
    /// Record that the line after `directive_line` is to be reported as
    /// `logical_line`, optionally under a different file name.
    pub fn set(&mut self, file: FileId, directive_line: u32, logical_line: u32, name: Option<String>) {
        let delta = logical_line as i64 - (directive_line as i64 + 1);
        self.map.insert(file, (delta, name));
    }

    pub fn line(&self, tok: &Token) -> u32 {
        match self.map.get(&tok.file) {
            Some((delta, _)) => (tok.line as i64 + delta).max(0) as u32,
            None => tok.line,
        }
    }

    pub fn file_name(&self, tok: &Token, files: &FileRegistry) -> String {
        match self.map.get(&tok.file) {
            Some((_, Some(name))) => name.clone(),
            _ => files.path(tok.file).display().to_string(),
        }
    }
}

/// Result of preprocessing one top-level file.
#[derive(Debug)]
pub struct PreprocessOutput {
    pub text: String,
    pub diagnostics: Vec<Diagnostic>,
}

/// Configuration for preprocessing runs. One `Preprocessor` can serve many
/// files; each call to [`Preprocessor::preprocess`] starts from a freshly
/// seeded macro table.
#[derive(Debug, Default)]
pub struct Preprocessor {
    include_paths: Vec<PathBuf>,
    force_includes: Vec<PathBuf>,
    defines: Vec<(String, Option<String>)>,
    undefines: Vec<String>,
    policy: IncludePolicy,
    keep_comments: bool,
    line_markers: bool,
}

impl Preprocessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an angle-include search directory.
    pub fn add_include_dir(&mut self, dir: PathBuf) {
        self.include_paths.push(dir);
    }

    /// Add a file to be processed before the main file's content.
    pub fn add_force_include(&mut self, file: PathBuf) {
        self.force_includes.push(file);
    }

    /// Predefine a macro; `None` defines it to `1`.
    pub fn define(&mut self, name: String, value: Option<String>) {
        self.defines.push((name, value));
    }

    /// Force-undefine a macro. Applied after the command-line defines;
    /// later `#define`s of the name in the source are ignored.
    pub fn undefine(&mut self, name: String) {
        self.undefines.push(name);
    }

    /// Keep comments in the output instead of eliding them.
    pub fn set_keep_comments(&mut self, keep: bool) {
        self.keep_comments = keep;
    }

    /// Emit `#line` markers at include boundaries and large elisions, and
    /// pass `#line` directives through.
    pub fn set_line_markers(&mut self, keep: bool) {
        self.line_markers = keep;
    }

    /// Select the include caching policy.
    pub fn set_include_policy(&mut self, policy: IncludePolicy) {
        self.policy = policy;
    }

    /// Preprocess one top-level file. The core performs no filesystem
    /// access of its own; `loader` supplies the content of included files.
    pub fn preprocess(&self, source: &str, origin: &Path, loader: &dyn FileLoader) -> PreprocessOutput {
        let quote_fallbacks = self
            .force_includes
            .iter()
            .filter_map(|f| f.parent().map(Path::to_path_buf))
            .collect();
        let mut run = Run {
            opts: self,
            loader,
            files: FileRegistry::new(),
            table: MacroTable::new(),
            frames: Vec::new(),
            sink: DiagnosticSink::new(),
            resolver: IncludeResolver::new(self.include_paths.clone(), quote_fallbacks, self.policy),
            overrides: LineOverrides::default(),
            pragma_once: HashSet::new(),
            suppressed: self.undefines.iter().cloned().collect(),
            counter: 0,
        };

        run.seed_command_line();

        let mut out = Vec::new();
        for forced in &self.force_includes {
            run.process_forced_include(forced, &mut out);
        }

        let origin_id = run.files.intern(origin);
        run.process_source(source, origin_id, 0, &mut out);

        let text = output::stringify(&out, &run.files, self.line_markers);
        debug!(
            "preprocessed {}: {} macros defined, {}",
            origin.display(),
            run.table.len(),
            run.sink.summary()
        );
        PreprocessOutput {
            text,
            diagnostics: run.sink.into_diagnostics(),
        }
    }
}

const COMMAND_LINE: &str = "<command line>";

/// All mutable state of one preprocessing run.
struct Run<'a> {
    opts: &'a Preprocessor,
    loader: &'a dyn FileLoader,
    files: FileRegistry,
    table: MacroTable,
    frames: Vec<ConditionalFrame>,
    sink: DiagnosticSink,
    resolver: IncludeResolver,
    overrides: LineOverrides,
    pragma_once: HashSet<PathBuf>,
    /// Names force-undefined on the command line; `#define`s of these are
    /// silently dropped.
    suppressed: HashSet<String>,
    counter: u64,
}

impl Run<'_> {
    fn active(&self) -> bool {
        self.frames.iter().all(|f| f.active)
    }

    /// Seed the macro table from command-line defines and undefines.
    fn seed_command_line(&mut self) {
        let pseudo = self.files.intern(Path::new(COMMAND_LINE));
        for (name, value) in &self.opts.defines {
            if !is_valid_macro_name(name) {
                self.sink.report(
                    DiagnosticKind::Error,
                    COMMAND_LINE,
                    1,
                    format!("invalid macro name '{}' in -D option", name),
                );
                continue;
            }
            let body_src = value.as_deref().unwrap_or("1");
            let mut scratch = DiagnosticSink::new();
            let mut body =
                lexer::tokenize(body_src, pseudo, Path::new(COMMAND_LINE), false, &mut scratch);
            body.retain(|t| !t.is_blank() && t.kind != TokenKind::Eof);
            let def = MacroDefinition {
                name: name.clone(),
                params: None,
                is_variadic: false,
                body,
                file: pseudo,
                line: 1,
            };
            if let Err(e) = self.table.define(def) {
                self.sink
                    .report(DiagnosticKind::Error, COMMAND_LINE, 1, e.to_string());
            }
        }
        for name in &self.opts.undefines {
            self.table.undefine(name);
        }
    }

    fn process_forced_include(&mut self, path: &Path, out: &mut Vec<Token>) {
        match self.loader.load(path) {
            Ok(content) => {
                let id = self.files.intern(path);
                debug!("force-including {}", path.display());
                self.process_source(&content, id, 1, out);
            }
            Err(e) => {
                self.sink.report(
                    DiagnosticKind::MissingHeader,
                    path,
                    0,
                    format!("failed to read forced include: {}", e),
                );
            }
        }
    }

    /// Tokenize one file and process it. Lexer diagnostics for lines that
    /// turn out to sit in inactive conditional branches are dropped.
    fn process_source(&mut self, source: &str, id: FileId, depth: usize, out: &mut Vec<Token>) {
        let mut lex_sink = DiagnosticSink::new();
        let path = self.files.path(id).to_path_buf();
        let tokens = lexer::tokenize(source, id, &path, self.opts.keep_comments, &mut lex_sink);
        if self.opts.policy == IncludePolicy::CacheByPath && self.resolver.cached(&path).is_none() {
            self.resolver.store(path, tokens.clone());
        }
        self.process_tokens(tokens, lex_sink.into_diagnostics(), id, depth, out);
    }

    fn process_tokens(
        &mut self,
        tokens: Vec<Token>,
        lex_diags: Vec<Diagnostic>,
        id: FileId,
        depth: usize,
        out: &mut Vec<Token>,
    ) {
        let frame_floor = self.frames.len();
        let mut inactive_lines: HashSet<u32> = HashSet::new();
        let mut pending: Vec<Token> = Vec::new();

        let mut i = 0;
        while i < tokens.len() {
            let mut j = i;
            while j < tokens.len() && !matches!(tokens[j].kind, TokenKind::Newline | TokenKind::Eof)
            {
                j += 1;
            }
            let line_toks = &tokens[i..j];
            let newline = tokens
                .get(j)
                .filter(|t| t.kind == TokenKind::Newline)
                .cloned();

            if !self.active() {
                for t in line_toks {
                    inactive_lines.insert(t.line);
                }
            }

            let first = line_toks.iter().find(|t| !t.is_blank());
            if matches!(first, Some(t) if t.is_punct("#")) {
                self.flush_pending(&mut pending, out);
                self.handle_directive(line_toks, id, depth, out);
                if let Some(nl) = newline {
                    out.push(nl);
                }
            } else if self.active() {
                pending.extend_from_slice(line_toks);
                if let Some(nl) = newline {
                    pending.push(nl);
                }
            } else if let Some(nl) = newline {
                out.push(nl);
            }
            i = j + 1;
        }
        self.flush_pending(&mut pending, out);

        // Conditionals must balance within the file that opened them.
        while self.frames.len() > frame_floor {
            let frame = self.frames.pop().expect("len checked");
            self.sink.report(
                DiagnosticKind::SyntaxError,
                self.files.path(id),
                frame.line,
                "unterminated #if: missing #endif",
            );
        }

        for d in lex_diags {
            if !inactive_lines.contains(&d.line) {
                self.sink.push(d);
            }
        }
    }

    fn flush_pending(&mut self, pending: &mut Vec<Token>, out: &mut Vec<Token>) {
        if pending.is_empty() {
            return;
        }
        let input = std::mem::take(pending);
        let expanded = Expander::new(
            &self.table,
            &self.files,
            &self.overrides,
            &mut self.sink,
            &mut self.counter,
        )
        .expand(input);
        out.extend(expanded);
    }

    fn handle_directive(&mut self, line: &[Token], id: FileId, depth: usize, out: &mut Vec<Token>) {
        let significant: Vec<usize> = line
            .iter()
            .enumerate()
            .filter(|(_, t)| !t.is_blank())
            .map(|(i, _)| i)
            .collect();
        // significant[0] is the '#'.
        let name_tok = match significant.get(1).map(|&i| &line[i]) {
            Some(t) => t,
            None => return, // null directive
        };
        if name_tok.kind != TokenKind::Identifier {
            if self.active() {
                self.sink.report(
                    DiagnosticKind::SyntaxError,
                    self.files.path(id),
                    name_tok.line,
                    format!("invalid preprocessing directive '#{}'", name_tok.text),
                );
            }
            return;
        }
        let rest = &line[significant[1] + 1..];
        let line_no = name_tok.line;

        match name_tok.text.as_str() {
            "if" => {
                let parent = self.active();
                let cond = parent && self.eval_condition(rest, id, line_no);
                self.frames.push(ConditionalFrame::open(parent, cond, line_no));
            }
            "ifdef" | "ifndef" => {
                let negated = name_tok.text == "ifndef";
                let parent = self.active();
                let cond = match rest.iter().find(|t| !t.is_blank()) {
                    Some(t) if t.kind == TokenKind::Identifier => {
                        self.table.is_defined(&t.text) != negated
                    }
                    _ => {
                        if parent {
                            self.sink.report(
                                DiagnosticKind::SyntaxError,
                                self.files.path(id),
                                line_no,
                                format!("expected identifier after #{}", name_tok.text),
                            );
                        }
                        negated
                    }
                };
                let cond = parent && cond;
                self.frames.push(ConditionalFrame::open(parent, cond, line_no));
            }
            "elif" => self.handle_elif(rest, id, line_no),
            "else" => self.handle_else(id, line_no),
            "endif" => {
                if self.frames.pop().is_none() {
                    self.sink.report(
                        DiagnosticKind::SyntaxError,
                        self.files.path(id),
                        line_no,
                        "#endif without matching #if",
                    );
                }
            }
            _ if !self.active() => {}
            "include" => self.handle_include(rest, id, depth, line_no, out),
            "define" => self.handle_define(rest, id, line_no),
            "undef" => self.handle_undef(rest, id, line_no),
            "error" => {
                let msg = directive_text(rest);
                self.sink.report(
                    DiagnosticKind::Error,
                    self.files.path(id),
                    line_no,
                    format!("#error {}", msg),
                );
            }
            "warning" => {
                let msg = directive_text(rest);
                self.sink.report(
                    DiagnosticKind::Warning,
                    self.files.path(id),
                    line_no,
                    format!("#warning {}", msg),
                );
            }
            "pragma" => {
                if matches!(rest.iter().find(|t| !t.is_blank()), Some(t) if t.is_identifier("once"))
                {
                    let path = self.files.path(id).to_path_buf();
                    self.pragma_once.insert(path);
                }
                // Other pragmas are elided; downstream consumers of
                // preprocessed text do not need them.
            }
            "line" => self.handle_line(line, rest, id, line_no, out),
            other => {
                self.sink.report(
                    DiagnosticKind::SyntaxError,
                    self.files.path(id),
                    line_no,
                    format!("unknown preprocessing directive '#{}'", other),
                );
            }
        }
    }

    fn handle_elif(&mut self, rest: &[Token], id: FileId, line_no: u32) {
        let (parent_active, taken, seen_else) = match self.frames.last() {
            Some(f) => (f.parent_active, f.taken, f.seen_else),
            None => {
                self.sink.report(
                    DiagnosticKind::SyntaxError,
                    self.files.path(id),
                    line_no,
                    "#elif without matching #if",
                );
                return;
            }
        };
        if seen_else {
            self.sink.report(
                DiagnosticKind::SyntaxError,
                self.files.path(id),
                line_no,
                "#elif after #else",
            );
            return;
        }
        let cond = parent_active && !taken && self.eval_condition(rest, id, line_no);
        let frame = self.frames.last_mut().expect("checked above");
        frame.active = cond;
        if cond {
            frame.taken = true;
        }
    }

    fn handle_else(&mut self, id: FileId, line_no: u32) {
        match self.frames.last_mut() {
            None => {
                self.sink.report(
                    DiagnosticKind::SyntaxError,
                    self.files.path(id),
                    line_no,
                    "#else without matching #if",
                );
            }
            Some(f) if f.seen_else => {
                let line = f.line;
                self.sink.report(
                    DiagnosticKind::SyntaxError,
                    self.files.path(id),
                    line_no,
                    format!("multiple #else for #if at line {}", line),
                );
            }
            Some(f) => {
                f.active = f.parent_active && !f.taken;
                f.taken = true;
                f.seen_else = true;
            }
        }
    }

    /// Evaluate a controlling expression: `defined` resolution, macro
    /// expansion, then integer constant evaluation. Errors degrade to an
    /// inactive branch.
    fn eval_condition(&mut self, rest: &[Token], id: FileId, line_no: u32) -> bool {
        let replaced = match cond::replace_defined(rest, &self.table) {
            Ok(toks) => toks,
            Err(msg) => {
                self.sink
                    .report(DiagnosticKind::SyntaxError, self.files.path(id), line_no, msg);
                return false;
            }
        };
        let expanded = Expander::new(
            &self.table,
            &self.files,
            &self.overrides,
            &mut self.sink,
            &mut self.counter,
        )
        .expand(replaced);
        match cond::evaluate(&expanded) {
            Ok(v) => v != 0,
            Err(msg) => {
                self.sink
                    .report(DiagnosticKind::SyntaxError, self.files.path(id), line_no, msg);
                false
            }
        }
    }

    fn handle_define(&mut self, rest: &[Token], id: FileId, line_no: u32) {
        let name_idx = match rest.iter().position(|t| !t.is_blank()) {
            Some(i) if rest[i].kind == TokenKind::Identifier => i,
            _ => {
                self.sink.report(
                    DiagnosticKind::SyntaxError,
                    self.files.path(id),
                    line_no,
                    "expected macro name after #define",
                );
                return;
            }
        };
        let name = rest[name_idx].text.clone();
        if macros::is_builtin(&name) {
            self.sink.report(
                DiagnosticKind::Warning,
                self.files.path(id),
                line_no,
                format!("ignoring #define of builtin macro '{}'", name),
            );
            return;
        }
        if self.suppressed.contains(&name) {
            debug!("suppressing #define of force-undefined macro '{}'", name);
            return;
        }

        // A '(' directly after the name (no whitespace) opens a parameter
        // list; with whitespace it is part of the body.
        let after = &rest[name_idx + 1..];
        let (params, is_variadic, body_toks) =
            if matches!(after.first(), Some(t) if t.is_punct("(")) {
                match parse_macro_params(&after[1..]) {
                    Ok((params, is_variadic, consumed)) => {
                        (Some(params), is_variadic, &after[1 + consumed..])
                    }
                    Err(msg) => {
                        self.sink.report(
                            DiagnosticKind::SyntaxError,
                            self.files.path(id),
                            line_no,
                            msg,
                        );
                        return;
                    }
                }
            } else {
                (None, false, after)
            };

        let body: Vec<Token> = body_toks.iter().filter(|t| !t.is_blank()).cloned().collect();
        if body.first().map_or(false, |t| t.is_punct("##"))
            || body.last().map_or(false, |t| t.is_punct("##"))
        {
            self.sink.report(
                DiagnosticKind::SyntaxError,
                self.files.path(id),
                line_no,
                "'##' cannot appear at either end of a macro expansion",
            );
            return;
        }

        let def = MacroDefinition {
            name: name.clone(),
            params,
            is_variadic,
            body,
            file: id,
            line: line_no,
        };
        match self.table.define(def) {
            Ok(()) => debug!("defined macro '{}'", name),
            Err(e) => {
                self.sink
                    .report(DiagnosticKind::Error, self.files.path(id), line_no, e.to_string());
            }
        }
    }

    fn handle_undef(&mut self, rest: &[Token], id: FileId, line_no: u32) {
        match rest.iter().find(|t| !t.is_blank()) {
            Some(t) if t.kind == TokenKind::Identifier => {
                if macros::is_builtin(&t.text) {
                    self.sink.report(
                        DiagnosticKind::Warning,
                        self.files.path(id),
                        line_no,
                        format!("ignoring #undef of builtin macro '{}'", t.text),
                    );
                } else {
                    self.table.undefine(&t.text);
                }
            }
            _ => {
                self.sink.report(
                    DiagnosticKind::SyntaxError,
                    self.files.path(id),
                    line_no,
                    "expected macro name after #undef",
                );
            }
        }
    }

    fn handle_include(
        &mut self,
        rest: &[Token],
        id: FileId,
        depth: usize,
        line_no: u32,
        out: &mut Vec<Token>,
    ) {
        let spec = match parse_include_spec(rest) {
            Some(spec) => Some(spec),
            None => {
                // Allow a macro-expanded form: `#include HEADER`.
                let expanded = Expander::new(
                    &self.table,
                    &self.files,
                    &self.overrides,
                    &mut self.sink,
                    &mut self.counter,
                )
                .expand(rest.to_vec());
                parse_include_spec(&expanded)
            }
        };
        let (spec, is_angle) = match spec {
            Some(s) => s,
            None => {
                self.sink.report(
                    DiagnosticKind::SyntaxError,
                    self.files.path(id),
                    line_no,
                    "invalid #include directive",
                );
                return;
            }
        };

        if depth + 1 > MAX_INCLUDE_DEPTH {
            self.sink.report(
                DiagnosticKind::IncludeNestedTooDeeply,
                self.files.path(id),
                line_no,
                format!("maximum include depth ({}) exceeded", MAX_INCLUDE_DEPTH),
            );
            return;
        }

        let current_dir = self.files.path(id).parent().map(Path::to_path_buf);
        let resolved =
            match self
                .resolver
                .resolve(self.loader, &spec, is_angle, current_dir.as_deref())
            {
                Some(p) => p,
                None => {
                    let shown = if is_angle {
                        format!("<{}>", spec)
                    } else {
                        format!("\"{}\"", spec)
                    };
                    self.sink.report(
                        DiagnosticKind::MissingHeader,
                        self.files.path(id),
                        line_no,
                        format!("header not found: {}", shown),
                    );
                    return;
                }
            };

        if self.pragma_once.contains(&resolved) {
            return;
        }
        debug!("including {} (depth {})", resolved.display(), depth + 1);

        let inc_id = self.files.intern(&resolved);
        if let Some(cached) = self.resolver.cached(&resolved) {
            let tokens = cached.to_vec();
            self.process_tokens(tokens, Vec::new(), inc_id, depth + 1, out);
            return;
        }
        match self.loader.load(&resolved) {
            Ok(content) => self.process_source(&content, inc_id, depth + 1, out),
            Err(e) => {
                self.sink.report(
                    DiagnosticKind::MissingHeader,
                    self.files.path(id),
                    line_no,
                    format!("failed to read '{}': {}", resolved.display(), e),
                );
            }
        }
    }

    fn handle_line(
        &mut self,
        line: &[Token],
        rest: &[Token],
        id: FileId,
        line_no: u32,
        out: &mut Vec<Token>,
    ) {
        let mut it = rest.iter().filter(|t| !t.is_blank());
        let number = match it.next() {
            Some(t) if t.kind == TokenKind::Number => match t.text.parse::<u32>() {
                Ok(n) => n,
                Err(_) => {
                    self.sink.report(
                        DiagnosticKind::SyntaxError,
                        self.files.path(id),
                        line_no,
                        format!("invalid line number '{}' in #line", t.text),
                    );
                    return;
                }
            },
            _ => {
                self.sink.report(
                    DiagnosticKind::SyntaxError,
                    self.files.path(id),
                    line_no,
                    "expected line number after #line",
                );
                return;
            }
        };
        let name = match it.next() {
            Some(t) if t.kind == TokenKind::String && t.text.len() >= 2 => {
                Some(t.text[1..t.text.len() - 1].to_string())
            }
            Some(t) => {
                self.sink.report(
                    DiagnosticKind::SyntaxError,
                    self.files.path(id),
                    line_no,
                    format!("expected file name string in #line, got '{}'", t.text),
                );
                return;
            }
            None => None,
        };
        self.overrides.set(id, line_no, number, name);
        if self.opts.line_markers {
            out.extend(line.iter().cloned());
        }
    }
}

fn is_valid_macro_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Parse a macro parameter list after the opening paren. Returns the
/// parameter names, the variadic flag and the number of tokens consumed
/// including the closing paren.
fn parse_macro_params(toks: &[Token]) -> Result<(Vec<String>, bool, usize), String> {
    let mut params = Vec::new();
    let mut is_variadic = false;
    let mut expect_name = true;
    let mut i = 0;
    while i < toks.len() {
        let t = &toks[i];
        i += 1;
        if t.is_blank() {
            continue;
        }
        if t.is_punct(")") {
            if expect_name && !params.is_empty() {
                return Err("expected parameter name before ')' in macro definition".into());
            }
            return Ok((params, is_variadic, i));
        }
        if is_variadic {
            return Err("expected ')' after '...' in macro parameters".into());
        }
        if expect_name {
            if t.is_punct("...") {
                is_variadic = true;
            } else if t.kind == TokenKind::Identifier {
                params.push(t.text.clone());
            } else {
                return Err(format!("expected parameter name, got '{}'", t.text));
            }
            expect_name = false;
        } else if t.is_punct(",") {
            expect_name = true;
        } else {
            return Err(format!("expected ',' or ')' in macro parameters, got '{}'", t.text));
        }
    }
    Err("missing ')' in macro parameter list".into())
}

/// Extract the file spec from `#include` operand tokens: either a string
/// literal or an angle-bracketed sequence.
fn parse_include_spec(rest: &[Token]) -> Option<(String, bool)> {
    let mut it = rest.iter().filter(|t| !t.is_blank());
    let first = it.next()?;
    if first.kind == TokenKind::String && first.text.len() >= 2 {
        return Some((first.text[1..first.text.len() - 1].to_string(), false));
    }
    if first.is_punct("<") {
        let mut spec = String::new();
        for t in it {
            if t.is_punct(">") {
                return Some((spec, true));
            }
            spec.push_str(&t.text);
        }
        return None;
    }
    None
}

fn directive_text(rest: &[Token]) -> String {
    rest.iter()
        .filter(|t| !t.is_blank())
        .map(|t| t.text.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}
