//! Output stringification with line fidelity
//!
//! Reassembles the final token sequence into text. Content elided by the
//! preprocessor (directive lines, skipped branches) left its newlines in
//! the stream, so line numbers within one file are preserved as blank
//! lines; across include boundaries a `#line` marker is emitted instead
//! when markers are enabled.

use crate::lexer::{FileId, Token, TokenKind};
use crate::FileRegistry;

/// Line gaps up to this many lines are padded with blank lines; larger
/// jumps use a `#line` marker when markers are enabled.
const MAX_BLANK_PAD: u32 = 8;

pub fn stringify(tokens: &[Token], files: &FileRegistry, line_markers: bool) -> String {
    Stringifier::new(files, line_markers).run(tokens)
}

struct Stringifier<'a> {
    files: &'a FileRegistry,
    line_markers: bool,
    out: String,
    cur_file: Option<FileId>,
    cur_line: u32,
    col: u32,
    /// Original columns only remain meaningful until an expansion changes
    /// the length of the current output line.
    col_valid: bool,
    prev: Option<(TokenKind, String)>,
}

impl<'a> Stringifier<'a> {
    fn new(files: &'a FileRegistry, line_markers: bool) -> Self {
        Self {
            files,
            line_markers,
            out: String::new(),
            cur_file: None,
            cur_line: 1,
            col: 1,
            col_valid: true,
            prev: None,
        }
    }

    fn run(mut self, tokens: &[Token]) -> String {
        for tok in tokens {
            match tok.kind {
                TokenKind::Eof => {}
                TokenKind::Newline => {
                    self.out.push('\n');
                    self.cur_line += 1;
                    self.col = 1;
                    self.col_valid = true;
                    self.prev = None;
                }
                TokenKind::Whitespace => {
                    self.out.push_str(&tok.text);
                    self.col += tok.text.chars().count() as u32;
                    self.prev = None;
                }
                _ => self.emit(tok),
            }
        }
        self.out
    }

    fn emit(&mut self, tok: &Token) {
        self.sync_position(tok);

        if !tok.from_expansion && self.col_valid {
            // Restore the original column spacing.
            for _ in self.col..tok.col {
                self.out.push(' ');
                self.col += 1;
            }
        } else if let Some((prev_kind, prev_text)) = &self.prev {
            if needs_space(*prev_kind, prev_text, tok) {
                self.out.push(' ');
                self.col += 1;
            }
        }

        self.out.push_str(&tok.text);
        let newlines = tok.text.matches('\n').count() as u32;
        if newlines > 0 {
            // Only kept comments can span lines here.
            self.cur_line += newlines;
            let tail = tok.text.rsplit('\n').next().unwrap_or("");
            self.col = tail.chars().count() as u32 + 1;
        } else {
            self.col += tok.text.chars().count() as u32;
        }
        if tok.from_expansion {
            self.col_valid = false;
        }
        self.prev = Some((tok.kind, tok.text.clone()));
    }

    /// Bring the output position to the token's file/line, via blank lines
    /// or a `#line` marker.
    fn sync_position(&mut self, tok: &Token) {
        let file_changed = self.cur_file.is_some() && self.cur_file != Some(tok.file);
        if file_changed {
            self.break_line();
            if self.line_markers {
                self.push_marker(tok);
            }
            self.cur_file = Some(tok.file);
            self.cur_line = tok.line;
            return;
        }
        if self.cur_file.is_none() {
            self.cur_file = Some(tok.file);
        }
        if tok.from_expansion {
            return;
        }
        if tok.line > self.cur_line {
            let gap = tok.line - self.cur_line;
            if gap <= MAX_BLANK_PAD || !self.line_markers {
                for _ in 0..gap {
                    self.out.push('\n');
                }
                self.col = 1;
                self.col_valid = true;
                self.prev = None;
            } else {
                self.break_line();
                self.push_marker(tok);
            }
            self.cur_line = tok.line;
        } else if tok.line < self.cur_line && self.line_markers {
            // Content jumped backwards: returning from an include of the
            // same file, or a cached re-inclusion.
            self.break_line();
            self.push_marker(tok);
            self.cur_line = tok.line;
        }
    }

    fn break_line(&mut self) {
        if !self.out.is_empty() && !self.out.ends_with('\n') {
            self.out.push('\n');
        }
        self.col = 1;
        self.col_valid = true;
        self.prev = None;
    }

    fn push_marker(&mut self, tok: &Token) {
        let path = self.files.path(tok.file).display().to_string();
        let mut escaped = String::with_capacity(path.len());
        for c in path.chars() {
            if c == '"' || c == '\\' {
                escaped.push('\\');
            }
            escaped.push(c);
        }
        self.out.push_str(&format!("#line {} \"{}\"\n", tok.line, escaped));
    }
}

/// Whether omitting a space between two emitted tokens would let them lex
/// back as something different.
fn needs_space(prev_kind: TokenKind, prev_text: &str, next: &Token) -> bool {
    let merges_idents = matches!(prev_kind, TokenKind::Identifier | TokenKind::Number)
        && matches!(next.kind, TokenKind::Identifier | TokenKind::Number);
    if merges_idents {
        return true;
    }
    if prev_kind == TokenKind::Number && next.is_punct(".") {
        return true;
    }
    // '.' then a digit would re-lex as one pp-number (".5").
    if prev_kind == TokenKind::Punct && prev_text == "." && next.kind == TokenKind::Number {
        return true;
    }
    // An exponent boundary: "1e" then "+" would re-lex as "1e+".
    if prev_kind == TokenKind::Number
        && matches!(prev_text.chars().last(), Some('e' | 'E' | 'p' | 'P'))
        && (next.is_punct("+") || next.is_punct("-"))
    {
        return true;
    }
    if prev_kind == TokenKind::Punct && next.kind == TokenKind::Punct {
        let pair: String = prev_text
            .chars()
            .last()
            .into_iter()
            .chain(next.text.chars().next())
            .collect();
        const MERGING: &[&str] = &[
            "<<", ">>", "<=", ">=", "==", "!=", "&&", "||", "->", "++", "--", "+=", "-=", "*=",
            "/=", "%=", "&=", "|=", "^=", "##", "//", "/*", "..", "<:",
        ];
        return MERGING.contains(&pair.as_str());
    }
    false
}
