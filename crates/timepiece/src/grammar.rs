//! Lexer and recursive-descent parser for the time-spec DSL.
//!
//! ```text
//! time_spec     := grouped_funcs?
//! grouped_funcs := first (joiner grouped_funcs)?
//! first         := "(" grouped_funcs ")" | func
//! func          := name "(" [key ":" value ("," key ":" value)*] ")"
//! value         := func | number | string
//! joiner        := "&" | "|"
//! ```
//!
//! Joins are right-recursive, so `a & b | c` groups as `a & (b | c)`.
//! Whitespace is removed before lexing; offsets in errors refer to the
//! text with whitespace removed.

use std::fmt;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message} at offset {offset}")]
pub struct ParseError {
    pub offset: usize,
    pub message: String,
}

// ── AST ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Joiner {
    And,
    Or,
}

impl Joiner {
    pub fn as_str(self) -> &'static str {
        match self {
            Joiner::And => "AND",
            Joiner::Or => "OR",
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Joiner::And => "&",
            Joiner::Or => "|",
        }
    }
}

impl fmt::Display for Joiner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A function call: `name(key:value, ...)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FuncCall {
    pub name: String,
    pub args: Vec<(String, ArgValue)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgValue {
    /// Digits only, kept as written.
    Number(String),
    Str(String),
    Func(FuncCall),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Func(FuncCall),
    Join {
        joiner: Joiner,
        left: Box<Node>,
        right: Box<Node>,
    },
}

// ── Lexer ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    /// A run of `[.a-zA-Z0-9;_-]`: names, keys and literal values.
    Word(String),
    LParen,
    RParen,
    Colon,
    Comma,
    Amp,
    Pipe,
    Eof,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Word(w) => write!(f, "'{w}'"),
            Token::LParen => f.write_str("'('"),
            Token::RParen => f.write_str("')'"),
            Token::Colon => f.write_str("':'"),
            Token::Comma => f.write_str("','"),
            Token::Amp => f.write_str("'&'"),
            Token::Pipe => f.write_str("'|'"),
            Token::Eof => f.write_str("end of input"),
        }
    }
}

#[derive(Debug, Clone)]
struct Spanned {
    token: Token,
    offset: usize,
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '.' | ';' | '_' | '-')
}

fn is_identifier(word: &str) -> bool {
    let mut chars = word.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Remove spaces, tabs and newlines.
pub fn strip_whitespace(text: &str) -> String {
    text.chars().filter(|c| !c.is_whitespace()).collect()
}

fn lex(src: &str) -> Result<Vec<Spanned>, ParseError> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = src.chars().collect();
    let mut pos = 0usize;

    while pos < chars.len() {
        let c = chars[pos];
        let single = match c {
            '(' => Some(Token::LParen),
            ')' => Some(Token::RParen),
            ':' => Some(Token::Colon),
            ',' => Some(Token::Comma),
            '&' => Some(Token::Amp),
            '|' => Some(Token::Pipe),
            _ => None,
        };
        if let Some(token) = single {
            tokens.push(Spanned { token, offset: pos });
            pos += 1;
            continue;
        }

        if is_word_char(c) {
            let start = pos;
            while pos < chars.len() && is_word_char(chars[pos]) {
                pos += 1;
            }
            tokens.push(Spanned {
                token: Token::Word(chars[start..pos].iter().collect()),
                offset: start,
            });
            continue;
        }

        return Err(ParseError {
            offset: pos,
            message: format!("unexpected character '{c}'"),
        });
    }

    tokens.push(Spanned {
        token: Token::Eof,
        offset: chars.len(),
    });
    Ok(tokens)
}

// ── Parser ──────────────────────────────────────────────────────────────────

/// How deep groups, nested calls and joiner chains may go.
pub const MAX_DEPTH: usize = 256;

struct Parser<'a> {
    tokens: &'a [Spanned],
    pos: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn new(tokens: &'a [Spanned]) -> Self {
        Parser {
            tokens,
            pos: 0,
            depth: 0,
        }
    }

    /// Run `f` one nesting level down, failing once [`MAX_DEPTH`] is reached.
    fn nested<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, ParseError>,
    ) -> Result<T, ParseError> {
        if self.depth >= MAX_DEPTH {
            return Err(self.err("nesting too deep"));
        }
        self.depth += 1;
        let out = f(self);
        self.depth -= 1;
        out
    }

    fn cur(&self) -> &Spanned {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek(&self) -> &Token {
        &self.cur().token
    }

    fn advance(&mut self) {
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
    }

    fn err(&self, msg: impl Into<String>) -> ParseError {
        ParseError {
            offset: self.cur().offset,
            message: msg.into(),
        }
    }

    fn expect(&mut self, token: Token) -> Result<(), ParseError> {
        if *self.peek() == token {
            self.advance();
            Ok(())
        } else {
            Err(self.err(format!("expected {token}, got {}", self.peek())))
        }
    }

    fn take_word(&mut self) -> Result<String, ParseError> {
        if let Token::Word(w) = self.peek().clone() {
            self.advance();
            Ok(w)
        } else {
            Err(self.err(format!("expected a name or value, got {}", self.peek())))
        }
    }

    fn take_identifier(&mut self, what: &str) -> Result<String, ParseError> {
        let offset = self.cur().offset;
        let word = self.take_word()?;
        if is_identifier(&word) {
            Ok(word)
        } else {
            Err(ParseError {
                offset,
                message: format!("invalid {what} '{word}'"),
            })
        }
    }

    fn parse_time_spec(&mut self) -> Result<Option<Node>, ParseError> {
        if *self.peek() == Token::Eof {
            return Ok(None);
        }
        let node = self.parse_grouped_funcs()?;
        if *self.peek() != Token::Eof {
            return Err(self.err(format!("unexpected {} after specification", self.peek())));
        }
        Ok(Some(node))
    }

    fn parse_grouped_funcs(&mut self) -> Result<Node, ParseError> {
        let left = if *self.peek() == Token::LParen {
            self.advance();
            let inner = self.nested(Self::parse_grouped_funcs)?;
            self.expect(Token::RParen)?;
            inner
        } else {
            Node::Func(self.parse_func()?)
        };

        let joiner = match self.peek() {
            Token::Amp => Joiner::And,
            Token::Pipe => Joiner::Or,
            _ => return Ok(left),
        };
        self.advance();
        let right = self.nested(Self::parse_grouped_funcs)?;
        Ok(Node::Join {
            joiner,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    fn parse_func(&mut self) -> Result<FuncCall, ParseError> {
        let name = self.take_identifier("function name")?;
        self.parse_call(name)
    }

    fn parse_call(&mut self, name: String) -> Result<FuncCall, ParseError> {
        self.expect(Token::LParen)?;
        let mut args = Vec::new();
        if *self.peek() == Token::RParen {
            self.advance();
            return Ok(FuncCall { name, args });
        }

        loop {
            let key = self.take_identifier("key")?;
            self.expect(Token::Colon)?;
            let value = self.parse_value()?;
            args.push((key, value));

            match self.peek() {
                Token::Comma => self.advance(),
                Token::RParen => {
                    self.advance();
                    return Ok(FuncCall { name, args });
                }
                other => return Err(self.err(format!("expected ',' or ')', got {other}"))),
            }
        }
    }

    fn parse_value(&mut self) -> Result<ArgValue, ParseError> {
        let offset = self.cur().offset;
        let word = self.take_word()?;
        if *self.peek() == Token::LParen {
            if !is_identifier(&word) {
                return Err(ParseError {
                    offset,
                    message: format!("invalid function name '{word}'"),
                });
            }
            let call = self.nested(|p| p.parse_call(word))?;
            return Ok(ArgValue::Func(call));
        }
        if word.chars().all(|c| c.is_ascii_digit()) {
            Ok(ArgValue::Number(word))
        } else {
            Ok(ArgValue::Str(word))
        }
    }
}

/// Parse `text` into an AST. Returns `Ok(None)` for input with no
/// function call at all.
///
/// # Errors
///
/// Returns a [`ParseError`] with the offending offset for unknown
/// characters, unbalanced parentheses, missing keys or trailing input.
pub fn parse(text: &str) -> Result<Option<Node>, ParseError> {
    let stripped = strip_whitespace(text);
    let tokens = lex(&stripped)?;
    Parser::new(&tokens).parse_time_spec()
}
