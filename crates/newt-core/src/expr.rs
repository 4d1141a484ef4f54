//! Gating expressions over syscfg settings.
//!
//! Dependencies, API declarations, and syscfg overrides may be gated by a
//! predicate over other settings. All three surfaces share this AST and
//! evaluator; nothing re-parses at use time.
//!
//! Grammar (usual precedence, `||` lowest):
//!
//! ```text
//! expr  := or
//! or    := and ("||" and)*
//! and   := unary ("&&" unary)*
//! unary := "!" unary | "(" expr ")" | atom
//! atom  := IDENT (CMPOP literal)?
//! ```
//!
//! A bare identifier is truthy when the setting's value is neither empty
//! nor `0`. An undefined setting evaluates as `0`.

use crate::error::{Error, Result};
use std::fmt;

/// Something that can answer "what is setting X's value right now".
///
/// The syscfg resolver implements this; the evaluator never sees the
/// setting table directly.
pub trait SettingLookup {
    /// Current value of a setting, or `None` if undefined.
    fn setting_value(&self, name: &str) -> Option<&str>;
}

/// Comparison operator inside an atom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CmpOp {
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
}

impl fmt::Display for CmpOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
        };
        write!(f, "{s}")
    }
}

/// A literal on the right-hand side of a comparison.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Literal {
    /// Integer literal.
    Int(i64),
    /// Quoted or bare string literal.
    Str(String),
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(n) => write!(f, "{n}"),
            Self::Str(s) => write!(f, "\"{s}\""),
        }
    }
}

/// A parsed gating expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Expr {
    /// Truthiness test of a single setting.
    Defined(String),
    /// Comparison of a setting against a literal.
    Cmp {
        /// Setting name.
        setting: String,
        /// Comparison operator.
        op: CmpOp,
        /// Right-hand side.
        value: Literal,
    },
    /// Logical negation.
    Not(Box<Expr>),
    /// Conjunction; empty means `true`.
    All(Vec<Expr>),
    /// Disjunction.
    Any(Vec<Expr>),
}

impl Expr {
    /// Parse an expression string.
    pub fn parse(s: &str) -> Result<Self> {
        let tokens = tokenize(s)?;
        let mut parser = Parser {
            input: s,
            tokens,
            pos: 0,
        };
        let expr = parser.parse_or()?;
        if parser.pos != parser.tokens.len() {
            return Err(Error::bad_expr(s, "trailing tokens"));
        }
        Ok(expr)
    }

    /// Evaluate under the given setting values.
    ///
    /// Undefined settings evaluate as `0`, so gating on a setting that no
    /// included package defines is false rather than an error; the syscfg
    /// resolver reports undefined references separately.
    pub fn eval(&self, lookup: &dyn SettingLookup) -> bool {
        match self {
            Self::Defined(name) => truthy(lookup.setting_value(name).unwrap_or("0")),
            Self::Cmp { setting, op, value } => {
                let actual = lookup.setting_value(setting).unwrap_or("0");
                compare(actual, *op, value)
            }
            Self::Not(inner) => !inner.eval(lookup),
            Self::All(terms) => terms.iter().all(|t| t.eval(lookup)),
            Self::Any(terms) => terms.iter().any(|t| t.eval(lookup)),
        }
    }

    /// Every setting name the expression mentions, in source order.
    #[must_use]
    pub fn settings(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_settings(&mut out);
        out
    }

    fn collect_settings<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Self::Defined(name) => out.push(name),
            Self::Cmp { setting, .. } => out.push(setting),
            Self::Not(inner) => inner.collect_settings(out),
            Self::All(terms) | Self::Any(terms) => {
                for t in terms {
                    t.collect_settings(out);
                }
            }
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Defined(name) => write!(f, "{name}"),
            Self::Cmp { setting, op, value } => write!(f, "{setting} {op} {value}"),
            Self::Not(inner) => write!(f, "!({inner})"),
            Self::All(terms) => {
                let rendered: Vec<String> = terms.iter().map(|t| format!("({t})")).collect();
                write!(f, "{}", rendered.join(" && "))
            }
            Self::Any(terms) => {
                let rendered: Vec<String> = terms.iter().map(|t| format!("({t})")).collect();
                write!(f, "{}", rendered.join(" || "))
            }
        }
    }
}

/// A setting value is truthy unless empty or `0`.
fn truthy(value: &str) -> bool {
    !value.is_empty() && value != "0"
}

fn compare(actual: &str, op: CmpOp, rhs: &Literal) -> bool {
    match rhs {
        Literal::Int(n) => {
            // Numeric comparison when the value parses; a non-numeric
            // value only ever equals nothing.
            match actual.trim().parse::<i64>() {
                Ok(a) => match op {
                    CmpOp::Eq => a == *n,
                    CmpOp::Ne => a != *n,
                    CmpOp::Lt => a < *n,
                    CmpOp::Le => a <= *n,
                    CmpOp::Gt => a > *n,
                    CmpOp::Ge => a >= *n,
                },
                Err(_) => matches!(op, CmpOp::Ne),
            }
        }
        Literal::Str(s) => match op {
            CmpOp::Eq => actual == s,
            CmpOp::Ne => actual != s,
            CmpOp::Lt => actual < s.as_str(),
            CmpOp::Le => actual <= s.as_str(),
            CmpOp::Gt => actual > s.as_str(),
            CmpOp::Ge => actual >= s.as_str(),
        },
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Int(i64),
    Str(String),
    Cmp(CmpOp),
    Not,
    AndAnd,
    OrOr,
    LParen,
    RParen,
}

fn tokenize(s: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = s.char_indices().peekable();

    while let Some(&(i, c)) = chars.peek() {
        match c {
            ' ' | '\t' | '\n' | '\r' => {
                chars.next();
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            '&' => {
                chars.next();
                match chars.next() {
                    Some((_, '&')) => tokens.push(Token::AndAnd),
                    _ => return Err(Error::bad_expr(s, "single '&'")),
                }
            }
            '|' => {
                chars.next();
                match chars.next() {
                    Some((_, '|')) => tokens.push(Token::OrOr),
                    _ => return Err(Error::bad_expr(s, "single '|'")),
                }
            }
            '!' => {
                chars.next();
                if matches!(chars.peek(), Some((_, '='))) {
                    chars.next();
                    tokens.push(Token::Cmp(CmpOp::Ne));
                } else {
                    tokens.push(Token::Not);
                }
            }
            '=' => {
                chars.next();
                match chars.next() {
                    Some((_, '=')) => tokens.push(Token::Cmp(CmpOp::Eq)),
                    _ => return Err(Error::bad_expr(s, "single '='")),
                }
            }
            '<' => {
                chars.next();
                if matches!(chars.peek(), Some((_, '='))) {
                    chars.next();
                    tokens.push(Token::Cmp(CmpOp::Le));
                } else {
                    tokens.push(Token::Cmp(CmpOp::Lt));
                }
            }
            '>' => {
                chars.next();
                if matches!(chars.peek(), Some((_, '='))) {
                    chars.next();
                    tokens.push(Token::Cmp(CmpOp::Ge));
                } else {
                    tokens.push(Token::Cmp(CmpOp::Gt));
                }
            }
            '"' | '\'' => {
                let quote = c;
                chars.next();
                let mut lit = String::new();
                loop {
                    match chars.next() {
                        Some((_, ch)) if ch == quote => break,
                        Some((_, ch)) => lit.push(ch),
                        None => return Err(Error::bad_expr(s, "unterminated string")),
                    }
                }
                tokens.push(Token::Str(lit));
            }
            _ if c.is_ascii_digit() || c == '-' => {
                let start = i;
                chars.next();
                while matches!(chars.peek(), Some((_, ch)) if ch.is_ascii_digit()) {
                    chars.next();
                }
                let end = chars.peek().map_or(s.len(), |&(j, _)| j);
                let text = &s[start..end];
                let n = text
                    .parse::<i64>()
                    .map_err(|_| Error::bad_expr(s, format!("bad integer \"{text}\"")))?;
                tokens.push(Token::Int(n));
            }
            _ if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                chars.next();
                while matches!(chars.peek(), Some((_, ch))
                    if ch.is_ascii_alphanumeric() || *ch == '_')
                {
                    chars.next();
                }
                let end = chars.peek().map_or(s.len(), |&(j, _)| j);
                tokens.push(Token::Ident(s[start..end].to_string()));
            }
            _ => return Err(Error::bad_expr(s, format!("unexpected character '{c}'"))),
        }
    }

    Ok(tokens)
}

struct Parser<'a> {
    input: &'a str,
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).cloned();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn parse_or(&mut self) -> Result<Expr> {
        let first = self.parse_and()?;
        let mut terms = vec![first];
        while matches!(self.peek(), Some(Token::OrOr)) {
            self.next();
            terms.push(self.parse_and()?);
        }
        Ok(if terms.len() == 1 {
            terms.pop().unwrap()
        } else {
            Expr::Any(terms)
        })
    }

    fn parse_and(&mut self) -> Result<Expr> {
        let first = self.parse_unary()?;
        let mut terms = vec![first];
        while matches!(self.peek(), Some(Token::AndAnd)) {
            self.next();
            terms.push(self.parse_unary()?);
        }
        Ok(if terms.len() == 1 {
            terms.pop().unwrap()
        } else {
            Expr::All(terms)
        })
    }

    fn parse_unary(&mut self) -> Result<Expr> {
        match self.peek() {
            Some(Token::Not) => {
                self.next();
                Ok(Expr::Not(Box::new(self.parse_unary()?)))
            }
            Some(Token::LParen) => {
                self.next();
                let inner = self.parse_or()?;
                match self.next() {
                    Some(Token::RParen) => Ok(inner),
                    _ => Err(Error::bad_expr(self.input, "missing ')'")),
                }
            }
            _ => self.parse_atom(),
        }
    }

    fn parse_atom(&mut self) -> Result<Expr> {
        let setting = match self.next() {
            Some(Token::Ident(name)) => name,
            other => {
                return Err(Error::bad_expr(
                    self.input,
                    format!("expected setting name, got {other:?}"),
                ));
            }
        };

        let Some(Token::Cmp(op)) = self.peek() else {
            return Ok(Expr::Defined(setting));
        };
        let op = *op;
        self.next();

        let value = match self.next() {
            Some(Token::Int(n)) => Literal::Int(n),
            Some(Token::Str(s)) => Literal::Str(s),
            Some(Token::Ident(s)) => Literal::Str(s),
            other => {
                return Err(Error::bad_expr(
                    self.input,
                    format!("expected literal, got {other:?}"),
                ));
            }
        };

        Ok(Expr::Cmp { setting, op, value })
    }
}
