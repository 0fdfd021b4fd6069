//! Macro expansion with rescanning
//!
//! Scans a token stream left to right, splicing in replacement lists and
//! rescanning the result. Recursion on self-referential macros is prevented
//! by per-token hidesets: every token produced by an expansion of macro M
//! carries M in its hideset and is never expanded by M again, while staying
//! eligible for every other macro.

use crate::lexer::{self, Token, TokenKind};
use crate::macros::{self, MacroDefinition, MacroTable};
use crate::{FileRegistry, LineOverrides};
use fzpp_common::{DiagnosticKind, DiagnosticSink};
use std::collections::VecDeque;

pub struct Expander<'a> {
    table: &'a MacroTable,
    files: &'a FileRegistry,
    overrides: &'a LineOverrides,
    sink: &'a mut DiagnosticSink,
    counter: &'a mut u64,
}

impl<'a> Expander<'a> {
    pub fn new(
        table: &'a MacroTable,
        files: &'a FileRegistry,
        overrides: &'a LineOverrides,
        sink: &'a mut DiagnosticSink,
        counter: &'a mut u64,
    ) -> Self {
        Self {
            table,
            files,
            overrides,
            sink,
            counter,
        }
    }

    /// Fully macro-expand a token sequence.
    pub fn expand(&mut self, input: Vec<Token>) -> Vec<Token> {
        let mut stream: VecDeque<Token> = input.into();
        let mut out = Vec::new();

        while let Some(tok) = stream.pop_front() {
            if tok.kind != TokenKind::Identifier {
                out.push(tok);
                continue;
            }
            if macros::is_builtin(&tok.text) {
                let t = self.expand_builtin(&tok);
                out.push(t);
                continue;
            }
            if tok.hideset.contains(&tok.text) {
                // Painted blue during an expansion of itself.
                out.push(tok);
                continue;
            }
            let def = match self.table.lookup(&tok.text) {
                Some(def) => def,
                None => {
                    out.push(tok);
                    continue;
                }
            };

            if !def.is_function_like() {
                let replaced = self.substitute(def, &[], &tok);
                for t in replaced.into_iter().rev() {
                    stream.push_front(t);
                }
                continue;
            }

            // A function-like macro name is only an invocation when the next
            // non-blank token is '('.
            let mut skipped = Vec::new();
            while matches!(stream.front(), Some(t) if t.is_blank()) {
                skipped.push(stream.pop_front().expect("front checked"));
            }
            if !matches!(stream.front(), Some(t) if t.is_punct("(")) {
                out.push(tok);
                out.extend(skipped);
                continue;
            }

            match collect_arguments(&mut stream) {
                Err(raw) => {
                    self.sink.report(
                        DiagnosticKind::SyntaxError,
                        self.files.path(tok.file),
                        tok.line,
                        format!("unterminated argument list invoking macro '{}'", tok.text),
                    );
                    out.push(tok);
                    out.extend(skipped);
                    out.extend(raw);
                }
                Ok((args, raw)) => {
                    let args = match normalize_arity(def, args) {
                        Ok(args) => args,
                        Err(got) => {
                            self.sink.report(
                                DiagnosticKind::Error,
                                self.files.path(tok.file),
                                tok.line,
                                format!(
                                    "macro '{}' expects {} argument{}, got {}",
                                    tok.text,
                                    def.params.as_ref().map_or(0, Vec::len),
                                    if def.params.as_ref().map_or(0, Vec::len) == 1 { "" } else { "s" },
                                    got
                                ),
                            );
                            // Leave the invocation unexpanded.
                            out.push(tok);
                            out.extend(skipped);
                            out.extend(raw);
                            continue;
                        }
                    };
                    let replaced = self.substitute(def, &args, &tok);
                    for t in replaced.into_iter().rev() {
                        stream.push_front(t);
                    }
                }
            }
        }
        out
    }

    /// Substitute parameters into a replacement list, applying `#` and `##`,
    /// then tag every produced token with the invocation's position and an
    /// extended hideset.
    fn substitute(&mut self, def: &MacroDefinition, args: &[Vec<Token>], inv: &Token) -> Vec<Token> {
        let named: Vec<String> = def.params.clone().unwrap_or_default();
        let param_index = |t: &Token| -> Option<usize> {
            if t.kind != TokenKind::Identifier {
                return None;
            }
            if def.is_variadic && t.text == "__VA_ARGS__" {
                return Some(named.len());
            }
            named.iter().position(|p| *p == t.text)
        };

        // Raw argument token lists, one per parameter; the variadic tail is
        // rejoined with comma tokens as the last entry.
        let mut raw_args: Vec<Vec<Token>> = Vec::new();
        for i in 0..named.len() {
            raw_args.push(args.get(i).cloned().unwrap_or_default());
        }
        if def.is_variadic {
            let mut va = Vec::new();
            for (n, arg) in args.iter().enumerate().skip(named.len()) {
                if n > named.len() {
                    va.push(Token::new(TokenKind::Punct, ",", inv.file, inv.line, inv.col));
                }
                va.extend(arg.iter().cloned());
            }
            raw_args.push(va);
        }
        let stripped: Vec<Vec<Token>> = raw_args
            .iter()
            .map(|a| a.iter().filter(|t| !t.is_blank()).cloned().collect())
            .collect();
        let mut expanded: Vec<Option<Vec<Token>>> = vec![None; raw_args.len()];

        let body = &def.body;
        let mut out: Vec<Token> = Vec::new();
        let mut i = 0;
        while i < body.len() {
            let t = &body[i];

            // Stringize: '#' immediately before a parameter name.
            if t.is_punct("#") && def.is_function_like() {
                if let Some(idx) = body.get(i + 1).and_then(|n| param_index(n)) {
                    out.push(stringize(&raw_args[idx], inv));
                    i += 2;
                    continue;
                }
            }

            // Token paste: groups joined by '##' use raw, unexpanded
            // arguments.
            if body.get(i + 1).map_or(false, |n| n.is_punct("##")) {
                let mut group: Vec<Token> = match param_index(t) {
                    Some(idx) => stripped[idx].clone(),
                    None => vec![t.clone()],
                };
                i += 1;
                while i < body.len() && body[i].is_punct("##") {
                    i += 1;
                    let rhs_tok = match body.get(i) {
                        Some(t) => t,
                        None => break,
                    };
                    let rhs: Vec<Token> = match param_index(rhs_tok) {
                        Some(idx) => stripped[idx].clone(),
                        None => vec![rhs_tok.clone()],
                    };
                    group = self.paste(group, rhs, inv);
                    i += 1;
                }
                out.extend(group);
                continue;
            }

            // Ordinary parameter: substitute the fully expanded argument.
            if let Some(idx) = param_index(t) {
                if expanded[idx].is_none() {
                    expanded[idx] = Some(self.expand(stripped[idx].clone()));
                }
                out.extend(expanded[idx].as_ref().expect("just filled").iter().cloned());
                i += 1;
                continue;
            }

            out.push(t.clone());
            i += 1;
        }

        // Paint the result: invocation position, expansion flag, and the
        // macro's own name added to each token's hideset.
        for t in &mut out {
            t.file = inv.file;
            t.line = inv.line;
            t.from_expansion = true;
            t.hideset.extend(inv.hideset.iter().cloned());
            t.hideset.insert(def.name.clone());
        }
        out
    }

    /// Concatenate the last token of `lhs` with the first of `rhs`,
    /// re-lexing the result. An empty side acts as a placemarker.
    fn paste(&mut self, mut lhs: Vec<Token>, mut rhs: Vec<Token>, inv: &Token) -> Vec<Token> {
        if lhs.is_empty() {
            return rhs;
        }
        if rhs.is_empty() {
            return lhs;
        }
        let left = lhs.pop().expect("non-empty");
        let right = rhs.remove(0);
        let joined = format!("{}{}", left.text, right.text);

        let mut scratch = DiagnosticSink::new();
        let mut relexed = lexer::tokenize(
            &joined,
            inv.file,
            self.files.path(inv.file),
            false,
            &mut scratch,
        );
        relexed.retain(|t| t.kind != TokenKind::Eof);

        if relexed.len() == 1 && !scratch.has_errors() {
            let mut pasted = relexed.remove(0);
            pasted.line = inv.line;
            pasted.col = inv.col;
            pasted.hideset = left.hideset.clone();
            pasted.hideset.extend(right.hideset.iter().cloned());
            lhs.push(pasted);
        } else {
            self.sink.report(
                DiagnosticKind::Error,
                self.files.path(inv.file),
                inv.line,
                format!(
                    "pasting \"{}\" and \"{}\" does not give a valid preprocessing token",
                    left.text, right.text
                ),
            );
            lhs.push(left);
            lhs.push(right);
        }
        lhs.extend(rhs);
        lhs
    }

    fn expand_builtin(&mut self, tok: &Token) -> Token {
        let (kind, text) = match tok.text.as_str() {
            "__LINE__" => (TokenKind::Number, self.overrides.line(tok).to_string()),
            "__FILE__" => (
                TokenKind::String,
                quote_string(&self.overrides.file_name(tok, self.files)),
            ),
            "__DATE__" => (TokenKind::String, quote_string(&macros::BUILTIN_DATE)),
            "__TIME__" => (TokenKind::String, quote_string(&macros::BUILTIN_TIME)),
            "__STDC__" => (TokenKind::Number, "1".to_string()),
            "__COUNTER__" => {
                let n = *self.counter;
                *self.counter += 1;
                (TokenKind::Number, n.to_string())
            }
            other => unreachable!("not a builtin macro: {other}"),
        };
        let mut t = Token::new(kind, text, tok.file, tok.line, tok.col);
        t.from_expansion = true;
        t.hideset = tok.hideset.clone();
        t
    }
}

/// Collect comma-separated argument lists following an already-seen `(`.
/// On success returns the split arguments plus the raw consumed tokens; on
/// an unterminated list, gives the consumed tokens back.
fn collect_arguments(
    stream: &mut VecDeque<Token>,
) -> Result<(Vec<Vec<Token>>, Vec<Token>), Vec<Token>> {
    let open = stream.pop_front().expect("caller checked '('");
    let mut raw = vec![open];
    let mut args: Vec<Vec<Token>> = vec![Vec::new()];
    let mut depth = 0usize;

    while let Some(t) = stream.pop_front() {
        if t.kind == TokenKind::Eof {
            stream.push_front(t);
            break;
        }
        raw.push(t.clone());
        if t.is_punct("(") {
            depth += 1;
            args.last_mut().expect("non-empty").push(t);
        } else if t.is_punct(")") {
            if depth == 0 {
                return Ok((args, raw));
            }
            depth -= 1;
            args.last_mut().expect("non-empty").push(t);
        } else if t.is_punct(",") && depth == 0 {
            args.push(Vec::new());
        } else {
            args.last_mut().expect("non-empty").push(t);
        }
    }
    Err(raw)
}

/// Check the collected argument count against the declared parameters.
/// Returns the (possibly normalized) arguments, or the offending count.
fn normalize_arity(def: &MacroDefinition, mut args: Vec<Vec<Token>>) -> Result<Vec<Vec<Token>>, usize> {
    let named = def.params.as_ref().map_or(0, Vec::len);
    let only_blank = args.len() == 1 && args[0].iter().all(Token::is_blank);

    if def.is_variadic {
        if args.len() >= named {
            return Ok(args);
        }
        if only_blank && named <= 1 {
            return Ok(args);
        }
        return Err(args.len());
    }
    if named == 0 && only_blank {
        args.clear();
        return Ok(args);
    }
    if args.len() == named {
        Ok(args)
    } else {
        Err(if only_blank { 1 } else { args.len() })
    }
}

/// Convert raw (unexpanded) argument tokens into a string literal token.
/// Interior whitespace collapses to single spaces; quotes and backslashes
/// inside string/char literals are escaped.
fn stringize(raw: &[Token], inv: &Token) -> Token {
    let mut s = String::new();
    let mut pending_space = false;
    for t in raw {
        if t.is_blank() {
            pending_space = !s.is_empty();
            continue;
        }
        if pending_space {
            s.push(' ');
            pending_space = false;
        }
        if matches!(t.kind, TokenKind::String | TokenKind::Char) {
            for c in t.text.chars() {
                if c == '"' || c == '\\' {
                    s.push('\\');
                }
                s.push(c);
            }
        } else {
            s.push_str(&t.text);
        }
    }
    let mut tok = Token::new(TokenKind::String, format!("\"{}\"", s), inv.file, inv.line, inv.col);
    tok.from_expansion = true;
    tok
}

fn quote_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}
