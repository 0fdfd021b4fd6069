//! Tokenizer for preprocessing tokens
//!
//! Converts raw source text into a flat sequence of preprocessing tokens.
//! Comments are elided here (unless the caller asks to keep them), line
//! continuations are spliced, and unrecognized bytes are reported and
//! skipped so tokenization always runs to completion.

use fzpp_common::{DiagnosticKind, DiagnosticSink};
use std::collections::HashSet;
use std::path::Path;

/// Index into the per-run file registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Identifier,
    Number,
    String,
    Char,
    Punct,
    Whitespace,
    Newline,
    Comment,
    Eof,
}

/// One preprocessing token. Immutable once produced.
///
/// `hideset` carries the names of macros already expanded on this token's
/// ancestry; an identifier never re-expands a macro in its own hideset.
#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub file: FileId,
    pub line: u32,
    pub col: u32,
    pub from_expansion: bool,
    pub hideset: HashSet<String>,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>, file: FileId, line: u32, col: u32) -> Self {
        Self {
            kind,
            text: text.into(),
            file,
            line,
            col,
            from_expansion: false,
            hideset: HashSet::new(),
        }
    }

    pub fn is_punct(&self, s: &str) -> bool {
        self.kind == TokenKind::Punct && self.text == s
    }

    pub fn is_identifier(&self, s: &str) -> bool {
        self.kind == TokenKind::Identifier && self.text == s
    }

    /// Whitespace, newline or comment.
    pub fn is_blank(&self) -> bool {
        matches!(
            self.kind,
            TokenKind::Whitespace | TokenKind::Newline | TokenKind::Comment
        )
    }
}

const PUNCT3: &[&str] = &["<<=", ">>=", "..."];
const PUNCT2: &[&str] = &[
    "<<", ">>", "<=", ">=", "==", "!=", "&&", "||", "->", "++", "--", "+=", "-=", "*=", "/=",
    "%=", "&=", "|=", "^=", "##",
];
const PUNCT1: &str = "+-*/%&|^~!?:;,.()[]{}<>=#";

pub struct Lexer<'a> {
    input: Vec<char>,
    pos: usize,
    line: u32,
    col: u32,
    file: FileId,
    file_path: &'a Path,
    keep_comments: bool,
    sink: &'a mut DiagnosticSink,
}

impl<'a> Lexer<'a> {
    pub fn new(
        input: &str,
        file: FileId,
        file_path: &'a Path,
        keep_comments: bool,
        sink: &'a mut DiagnosticSink,
    ) -> Self {
        Self {
            input: input.chars().collect(),
            pos: 0,
            line: 1,
            col: 1,
            file,
            file_path,
            keep_comments,
            sink,
        }
    }

    pub fn tokenize(mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        while !self.is_at_end() {
            self.scan_token(&mut tokens);
        }
        tokens.push(Token::new(TokenKind::Eof, "", self.file, self.line, self.col));
        tokens
    }

    fn scan_token(&mut self, out: &mut Vec<Token>) {
        self.skip_splices();
        if self.is_at_end() {
            return;
        }
        let line = self.line;
        let col = self.col;
        let ch = self.peek(0);

        match ch {
            '\n' => {
                self.advance();
                out.push(Token::new(TokenKind::Newline, "\n", self.file, line, col));
            }
            ' ' | '\t' | '\r' | '\x0b' | '\x0c' => {
                let mut text = String::new();
                while !self.is_at_end() && matches!(self.peek(0), ' ' | '\t' | '\r' | '\x0b' | '\x0c') {
                    text.push(self.advance());
                }
                out.push(Token::new(TokenKind::Whitespace, text, self.file, line, col));
            }
            '/' if self.peek(1) == '/' => self.scan_line_comment(out, line, col),
            '/' if self.peek(1) == '*' => self.scan_block_comment(out, line, col),
            '"' => out.push(self.scan_string_literal(line, col)),
            '\'' => out.push(self.scan_char_literal(line, col)),
            c if c.is_ascii_digit() || (c == '.' && self.peek(1).is_ascii_digit()) => {
                out.push(self.scan_number(line, col));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut text = String::new();
                while !self.is_at_end() {
                    let c = self.peek(0);
                    if c.is_ascii_alphanumeric() || c == '_' {
                        text.push(self.advance());
                    } else {
                        break;
                    }
                }
                out.push(Token::new(TokenKind::Identifier, text, self.file, line, col));
            }
            _ => {
                if let Some(p) = self.scan_punct() {
                    out.push(Token::new(TokenKind::Punct, p, self.file, line, col));
                } else {
                    self.advance();
                    self.sink.report(
                        DiagnosticKind::UnhandledChar,
                        self.file_path,
                        line,
                        format!("unhandled character (character code={})", ch as u32),
                    );
                }
            }
        }
    }

    fn scan_line_comment(&mut self, out: &mut Vec<Token>, line: u32, col: u32) {
        let mut text = String::new();
        while !self.is_at_end() && self.peek(0) != '\n' {
            text.push(self.advance());
        }
        if self.keep_comments {
            out.push(Token::new(TokenKind::Comment, text, self.file, line, col));
        }
        // The terminating newline is scanned as its own token.
    }

    fn scan_block_comment(&mut self, out: &mut Vec<Token>, line: u32, col: u32) {
        let mut text = String::new();
        text.push(self.advance()); // '/'
        text.push(self.advance()); // '*'
        let mut newlines = 0u32;
        let mut closed = false;
        while !self.is_at_end() {
            if self.peek(0) == '*' && self.peek(1) == '/' {
                text.push(self.advance());
                text.push(self.advance());
                closed = true;
                break;
            }
            let c = self.advance();
            if c == '\n' {
                newlines += 1;
            }
            text.push(c);
        }
        if !closed {
            self.sink.report(
                DiagnosticKind::SyntaxError,
                self.file_path,
                line,
                "unterminated /* comment",
            );
        }
        if self.keep_comments {
            out.push(Token::new(TokenKind::Comment, text, self.file, line, col));
        } else if newlines == 0 {
            out.push(Token::new(TokenKind::Whitespace, " ", self.file, line, col));
        } else {
            // A comment spanning lines collapses to its newlines so the
            // line numbers of everything after it stay correct.
            for i in 0..newlines {
                out.push(Token::new(TokenKind::Newline, "\n", self.file, line + i, 1));
            }
        }
    }

    fn scan_string_literal(&mut self, line: u32, col: u32) -> Token {
        let mut text = String::new();
        text.push(self.advance()); // opening quote
        let mut closed = false;
        while !self.is_at_end() && self.peek(0) != '\n' {
            let c = self.advance();
            text.push(c);
            if c == '\\' && !self.is_at_end() && self.peek(0) != '\n' {
                text.push(self.advance());
            } else if c == '"' {
                closed = true;
                break;
            }
        }
        if !closed {
            self.sink.report(
                DiagnosticKind::SyntaxError,
                self.file_path,
                line,
                "missing terminating \" character",
            );
        }
        Token::new(TokenKind::String, text, self.file, line, col)
    }

    fn scan_char_literal(&mut self, line: u32, col: u32) -> Token {
        let mut text = String::new();
        text.push(self.advance()); // opening quote
        let mut closed = false;
        while !self.is_at_end() && self.peek(0) != '\n' {
            let c = self.advance();
            text.push(c);
            if c == '\\' && !self.is_at_end() && self.peek(0) != '\n' {
                text.push(self.advance());
            } else if c == '\'' {
                closed = true;
                break;
            }
        }
        if !closed {
            self.sink.report(
                DiagnosticKind::SyntaxError,
                self.file_path,
                line,
                "missing terminating ' character",
            );
        }
        Token::new(TokenKind::Char, text, self.file, line, col)
    }

    /// Preprocessing numbers: a superset of C numeric literals. Only enough
    /// structure to avoid mis-splitting, not full grammar validation.
    fn scan_number(&mut self, line: u32, col: u32) -> Token {
        let mut text = String::new();
        text.push(self.advance());
        while !self.is_at_end() {
            let c = self.peek(0);
            if c.is_ascii_alphanumeric() || c == '_' || c == '.' {
                text.push(self.advance());
            } else if (c == '+' || c == '-')
                && matches!(text.chars().last(), Some('e' | 'E' | 'p' | 'P'))
            {
                text.push(self.advance());
            } else {
                break;
            }
        }
        Token::new(TokenKind::Number, text, self.file, line, col)
    }

    fn scan_punct(&mut self) -> Option<String> {
        let three: String = (0..3).map(|i| self.peek(i)).collect();
        if PUNCT3.contains(&three.as_str()) {
            for _ in 0..3 {
                self.advance();
            }
            return Some(three);
        }
        let two: String = (0..2).map(|i| self.peek(i)).collect();
        if PUNCT2.contains(&two.as_str()) {
            for _ in 0..2 {
                self.advance();
            }
            return Some(two);
        }
        let one = self.peek(0);
        if PUNCT1.contains(one) {
            self.advance();
            return Some(one.to_string());
        }
        None
    }

    /// Length in chars of a line splice (backslash, optional trailing
    /// whitespace, newline) starting at `at`, if there is one.
    fn splice_at(&self, at: usize) -> Option<(usize, bool)> {
        if self.input.get(at) != Some(&'\\') {
            return None;
        }
        let mut j = at + 1;
        let mut saw_ws = false;
        while matches!(self.input.get(j), Some(' ' | '\t' | '\r')) {
            saw_ws = true;
            j += 1;
        }
        if self.input.get(j) == Some(&'\n') {
            Some((j + 1 - at, saw_ws))
        } else {
            None
        }
    }

    fn skip_splices(&mut self) {
        while let Some((len, saw_ws)) = self.splice_at(self.pos) {
            if saw_ws {
                self.sink.report(
                    DiagnosticKind::PortabilityBackslash,
                    self.file_path,
                    self.line,
                    "whitespace between backslash and newline in line continuation",
                );
            }
            self.pos += len;
            self.line += 1;
            self.col = 1;
        }
    }

    /// Peek `n` significant chars ahead, looking through line splices.
    fn peek(&self, n: usize) -> char {
        let mut i = self.pos;
        let mut seen = 0;
        loop {
            if let Some((len, _)) = self.splice_at(i) {
                i += len;
                continue;
            }
            match self.input.get(i) {
                None => return '\0',
                Some(&c) => {
                    if seen == n {
                        return c;
                    }
                    seen += 1;
                    i += 1;
                }
            }
        }
    }

    fn advance(&mut self) -> char {
        self.skip_splices();
        let ch = self.input[self.pos];
        self.pos += 1;
        if ch == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        ch
    }

    fn is_at_end(&self) -> bool {
        let mut i = self.pos;
        while let Some((len, _)) = self.splice_at(i) {
            i += len;
        }
        i >= self.input.len()
    }
}

/// Tokenize one file's content.
pub fn tokenize(
    input: &str,
    file: FileId,
    file_path: &Path,
    keep_comments: bool,
    sink: &mut DiagnosticSink,
) -> Vec<Token> {
    Lexer::new(input, file, file_path, keep_comments, sink).tokenize()
}
