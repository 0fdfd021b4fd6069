//! Conditional-compilation state and `#if` expression evaluation
//!
//! Controlling expressions are evaluated as signed 64-bit integer constant
//! expressions after `defined` resolution and macro expansion. Identifiers
//! that survive expansion evaluate as 0, per standard preprocessor rules;
//! floating constants and division by zero are constant-expression errors.

use crate::lexer::{Token, TokenKind};
use crate::macros::MacroTable;

/// One nested `#if`/`#endif` region.
#[derive(Debug, Clone)]
pub struct ConditionalFrame {
    /// Whether the currently selected branch emits output.
    pub active: bool,
    /// Whether the enclosing region was active when this frame opened.
    pub parent_active: bool,
    /// Whether any branch of this chain has been taken yet.
    pub taken: bool,
    pub seen_else: bool,
    /// Line of the opening directive, for unterminated-frame reporting.
    pub line: u32,
}

impl ConditionalFrame {
    pub fn open(parent_active: bool, condition: bool, line: u32) -> Self {
        Self {
            active: parent_active && condition,
            parent_active,
            taken: parent_active && condition,
            seen_else: false,
            line,
        }
    }
}

/// Replace `defined X` / `defined(X)` with `1` or `0` before the rest of
/// the expression is macro-expanded, so `X` itself is never expanded.
/// Blank tokens are dropped in the result.
pub fn replace_defined(tokens: &[Token], table: &MacroTable) -> Result<Vec<Token>, String> {
    let toks: Vec<&Token> = tokens.iter().filter(|t| !t.is_blank()).collect();
    let mut out = Vec::new();
    let mut i = 0;
    while i < toks.len() {
        let t = toks[i];
        if !t.is_identifier("defined") {
            out.push(t.clone());
            i += 1;
            continue;
        }
        i += 1;
        let parenthesized = matches!(toks.get(i), Some(t) if t.is_punct("("));
        if parenthesized {
            i += 1;
        }
        let name = match toks.get(i) {
            Some(t) if t.kind == TokenKind::Identifier => &t.text,
            _ => return Err("operator 'defined' requires an identifier".into()),
        };
        let value = if table.is_defined(name) { "1" } else { "0" };
        let mut num = Token::new(TokenKind::Number, value, t.file, t.line, t.col);
        num.from_expansion = true;
        out.push(num);
        i += 1;
        if parenthesized {
            match toks.get(i) {
                Some(t) if t.is_punct(")") => i += 1,
                _ => return Err("missing ')' after 'defined'".into()),
            }
        }
    }
    Ok(out)
}

/// Evaluate a fully macro-expanded controlling expression.
pub fn evaluate(tokens: &[Token]) -> Result<i64, String> {
    let toks: Vec<&Token> = tokens.iter().filter(|t| !t.is_blank()).collect();
    if toks.is_empty() {
        return Err("empty controlling expression".into());
    }
    let mut parser = ExprParser { toks, pos: 0 };
    let expr = parser.parse_conditional()?;
    if parser.pos != parser.toks.len() {
        return Err(format!(
            "unexpected token '{}' in controlling expression",
            parser.toks[parser.pos].text
        ));
    }
    eval(&expr)
}

enum Expr {
    Num(i64),
    Unary(&'static str, Box<Expr>),
    Binary(&'static str, Box<Expr>, Box<Expr>),
    Cond(Box<Expr>, Box<Expr>, Box<Expr>),
}

/// Binary operators from lowest to highest precedence. `&&`/`||` keep
/// short-circuit semantics in `eval`.
const PRECEDENCE: &[&[&str]] = &[
    &["||"],
    &["&&"],
    &["|"],
    &["^"],
    &["&"],
    &["==", "!="],
    &["<", ">", "<=", ">="],
    &["<<", ">>"],
    &["+", "-"],
    &["*", "/", "%"],
];

struct ExprParser<'a> {
    toks: Vec<&'a Token>,
    pos: usize,
}

impl ExprParser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.toks.get(self.pos).copied()
    }

    fn eat_punct(&mut self, p: &str) -> bool {
        if matches!(self.peek(), Some(t) if t.is_punct(p)) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn parse_conditional(&mut self) -> Result<Expr, String> {
        let cond = self.parse_binary(0)?;
        if !self.eat_punct("?") {
            return Ok(cond);
        }
        let then = self.parse_conditional()?;
        if !self.eat_punct(":") {
            return Err("expected ':' in conditional expression".into());
        }
        let other = self.parse_conditional()?;
        Ok(Expr::Cond(Box::new(cond), Box::new(then), Box::new(other)))
    }

    fn parse_binary(&mut self, level: usize) -> Result<Expr, String> {
        if level >= PRECEDENCE.len() {
            return self.parse_unary();
        }
        let mut lhs = self.parse_binary(level + 1)?;
        loop {
            let op = match self.peek() {
                Some(t) if t.kind == TokenKind::Punct => {
                    match PRECEDENCE[level].iter().find(|op| t.text == **op) {
                        Some(op) => *op,
                        None => break,
                    }
                }
                _ => break,
            };
            self.pos += 1;
            let rhs = self.parse_binary(level + 1)?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr, String> {
        for op in ["!", "~", "-", "+"] {
            if self.eat_punct(op) {
                let operand = self.parse_unary()?;
                return Ok(Expr::Unary(op, Box::new(operand)));
            }
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr, String> {
        let tok = match self.peek() {
            Some(t) => t,
            None => return Err("unexpected end of controlling expression".into()),
        };
        if tok.is_punct("(") {
            self.pos += 1;
            let inner = self.parse_conditional()?;
            if !self.eat_punct(")") {
                return Err("missing ')' in controlling expression".into());
            }
            return Ok(inner);
        }
        match tok.kind {
            TokenKind::Number => {
                let value = parse_int(&tok.text)?;
                self.pos += 1;
                Ok(Expr::Num(value))
            }
            TokenKind::Char => {
                let value = char_value(&tok.text)?;
                self.pos += 1;
                Ok(Expr::Num(value))
            }
            // An identifier surviving macro expansion evaluates as 0.
            TokenKind::Identifier => {
                self.pos += 1;
                Ok(Expr::Num(0))
            }
            TokenKind::String => Err("string literal in controlling expression".into()),
            _ => Err(format!(
                "unexpected token '{}' in controlling expression",
                tok.text
            )),
        }
    }
}

fn eval(expr: &Expr) -> Result<i64, String> {
    Ok(match expr {
        Expr::Num(n) => *n,
        Expr::Unary(op, e) => {
            let v = eval(e)?;
            match *op {
                "!" => (v == 0) as i64,
                "~" => !v,
                "-" => v.wrapping_neg(),
                "+" => v,
                _ => unreachable!(),
            }
        }
        Expr::Binary(op, l, r) => {
            // Short-circuit forms first: the skipped side is not evaluated,
            // so e.g. `0 && 1/0` is not a division error.
            match *op {
                "||" => {
                    return Ok(if eval(l)? != 0 {
                        1
                    } else {
                        (eval(r)? != 0) as i64
                    })
                }
                "&&" => {
                    return Ok(if eval(l)? == 0 {
                        0
                    } else {
                        (eval(r)? != 0) as i64
                    })
                }
                _ => {}
            }
            let a = eval(l)?;
            let b = eval(r)?;
            match *op {
                "|" => a | b,
                "^" => a ^ b,
                "&" => a & b,
                "==" => (a == b) as i64,
                "!=" => (a != b) as i64,
                "<" => (a < b) as i64,
                ">" => (a > b) as i64,
                "<=" => (a <= b) as i64,
                ">=" => (a >= b) as i64,
                "<<" => a.wrapping_shl((b & 63) as u32),
                ">>" => a.wrapping_shr((b & 63) as u32),
                "+" => a.wrapping_add(b),
                "-" => a.wrapping_sub(b),
                "*" => a.wrapping_mul(b),
                "/" => {
                    if b == 0 {
                        return Err("division by zero in controlling expression".into());
                    }
                    a.wrapping_div(b)
                }
                "%" => {
                    if b == 0 {
                        return Err("remainder by zero in controlling expression".into());
                    }
                    a.wrapping_rem(b)
                }
                _ => unreachable!(),
            }
        }
        Expr::Cond(c, t, f) => {
            if eval(c)? != 0 {
                eval(t)?
            } else {
                eval(f)?
            }
        }
    })
}

/// Parse a preprocessing number as a signed integer constant. Suffixes are
/// ignored; anything floating is a constant-expression error.
fn parse_int(text: &str) -> Result<i64, String> {
    let body = text.trim_end_matches(|c| matches!(c, 'u' | 'U' | 'l' | 'L'));
    let invalid = || format!("invalid integer constant '{}'", text);
    let float = || format!("floating constant '{}' in controlling expression", text);

    if body.contains('.') {
        return Err(float());
    }
    let (digits, radix) = if let Some(hex) = body.strip_prefix("0x").or_else(|| body.strip_prefix("0X")) {
        (hex, 16)
    } else if let Some(bin) = body.strip_prefix("0b").or_else(|| body.strip_prefix("0B")) {
        (bin, 2)
    } else if body.len() > 1 && body.starts_with('0') {
        (&body[1..], 8)
    } else {
        if body.contains(['e', 'E']) {
            return Err(float());
        }
        (body, 10)
    };
    if digits.is_empty() {
        return Err(invalid());
    }
    u64::from_str_radix(digits, radix)
        .map(|v| v as i64)
        .map_err(|_| invalid())
}

/// Value of a character constant; multi-character constants take the first
/// character, which is enough for preprocessing arithmetic.
fn char_value(text: &str) -> Result<i64, String> {
    let inner = text
        .strip_prefix('\'')
        .and_then(|s| s.strip_suffix('\''))
        .ok_or_else(|| format!("malformed character constant {}", text))?;
    let mut chars = inner.chars();
    let first = chars
        .next()
        .ok_or_else(|| "empty character constant".to_string())?;
    if first != '\\' {
        return Ok(first as i64);
    }
    let esc = chars
        .next()
        .ok_or_else(|| "malformed escape in character constant".to_string())?;
    Ok(match esc {
        'n' => b'\n' as i64,
        't' => b'\t' as i64,
        'r' => b'\r' as i64,
        '0'..='7' => {
            let mut v = esc as i64 - '0' as i64;
            for c in chars.take(2) {
                match c.to_digit(8) {
                    Some(d) => v = v * 8 + d as i64,
                    None => break,
                }
            }
            v
        }
        'x' => {
            let mut v = 0i64;
            for c in chars {
                match c.to_digit(16) {
                    Some(d) => v = v * 16 + d as i64,
                    None => break,
                }
            }
            v
        }
        'a' => 7,
        'b' => 8,
        'f' => 12,
        'v' => 11,
        '\\' => b'\\' as i64,
        '\'' => b'\'' as i64,
        '"' => b'"' as i64,
        '?' => b'?' as i64,
        other => other as i64,
    })
}
