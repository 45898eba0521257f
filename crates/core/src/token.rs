//! Pull-style JSON tokenizer
//!
//! [`JsonTokenReader`] reads one JSON value from a byte stream and hands it
//! out token by token. Nesting is tracked with an explicit container stack,
//! so document depth is bounded by memory only. Strings are unescaped with
//! `serde_json`; number literals are kept exactly as written.

use crate::error::{Error, Result};
use std::io::{BufRead, BufReader, Read};

/// One lexical unit of a JSON document
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// `{`
    StartObject,
    /// `}`
    EndObject,
    /// `[`
    StartArray,
    /// `]`
    EndArray,
    /// Object member name
    FieldName(String),
    /// String value (unescaped)
    String(String),
    /// Number literal, verbatim
    Number(String),
    /// `true` / `false`
    Bool(bool),
    /// `null`
    Null,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Container {
    Object,
    Array,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// A value is required
    Value,
    /// Just after `{`
    ObjectKeyOrEnd,
    /// After `,` in an object
    ObjectKey,
    /// Just after `[`
    ArrayValueOrEnd,
    /// After a complete value inside a container
    AfterValue,
    /// The top-level value is complete
    Done,
}

/// Streaming JSON tokenizer over any [`Read`]
pub struct JsonTokenReader<R: Read> {
    reader: BufReader<R>,
    offset: u64,
    stack: Vec<Container>,
    state: State,
    scratch: Vec<u8>,
}

impl<R: Read> JsonTokenReader<R> {
    /// Wrap a byte stream
    pub fn new(reader: R) -> Self {
        JsonTokenReader {
            reader: BufReader::new(reader),
            offset: 0,
            stack: Vec::new(),
            state: State::Value,
            scratch: Vec::new(),
        }
    }

    /// Bytes consumed so far
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Current container nesting
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Next token, or `None` once the top-level value is complete
    pub fn next_token(&mut self) -> Result<Option<Token>> {
        loop {
            match self.state {
                State::Done => return Ok(None),
                State::Value => {
                    let b = self.peek_significant()?;
                    return self.read_value(b).map(Some);
                }
                State::ObjectKeyOrEnd => {
                    if self.peek_significant()? == b'}' {
                        self.consume(1);
                        return self.close(Container::Object).map(Some);
                    }
                    return self.read_field_name().map(Some);
                }
                State::ObjectKey => return self.read_field_name().map(Some),
                State::ArrayValueOrEnd => {
                    let b = self.peek_significant()?;
                    if b == b']' {
                        self.consume(1);
                        return self.close(Container::Array).map(Some);
                    }
                    return self.read_value(b).map(Some);
                }
                State::AfterValue => {
                    let b = self.peek_significant()?;
                    let top = self.stack.last().copied();
                    match (top, b) {
                        (Some(Container::Object), b',') => {
                            self.consume(1);
                            self.state = State::ObjectKey;
                        }
                        (Some(Container::Array), b',') => {
                            self.consume(1);
                            self.state = State::Value;
                        }
                        (Some(Container::Object), b'}') => {
                            self.consume(1);
                            return self.close(Container::Object).map(Some);
                        }
                        (Some(Container::Array), b']') => {
                            self.consume(1);
                            return self.close(Container::Array).map(Some);
                        }
                        _ => return Err(self.unexpected(b)),
                    }
                }
            }
        }
    }

    /// Skip the rest of the current value
    ///
    /// Must be called right after the value's first token was read.
    pub fn skip_value(&mut self, first: &Token) -> Result<()> {
        if !matches!(first, Token::StartObject | Token::StartArray) {
            return Ok(());
        }
        let target = self.stack.len() - 1;
        while self.stack.len() > target {
            if self.next_token()?.is_none() {
                break;
            }
        }
        Ok(())
    }

    /// Require that only whitespace follows the value
    pub fn finish(mut self) -> Result<()> {
        if self.state != State::Done {
            return Err(Error::parse(self.offset, "incomplete JSON document"));
        }
        self.skip_whitespace()?;
        match self.peek()? {
            None => Ok(()),
            Some(_) => Err(Error::parse(self.offset, "trailing data after JSON value")),
        }
    }

    fn read_value(&mut self, b: u8) -> Result<Token> {
        match b {
            b'{' => {
                self.consume(1);
                self.stack.push(Container::Object);
                self.state = State::ObjectKeyOrEnd;
                Ok(Token::StartObject)
            }
            b'[' => {
                self.consume(1);
                self.stack.push(Container::Array);
                self.state = State::ArrayValueOrEnd;
                Ok(Token::StartArray)
            }
            b'"' => {
                let s = self.read_string()?;
                self.value_done();
                Ok(Token::String(s))
            }
            b't' => {
                self.expect_literal(b"true")?;
                self.value_done();
                Ok(Token::Bool(true))
            }
            b'f' => {
                self.expect_literal(b"false")?;
                self.value_done();
                Ok(Token::Bool(false))
            }
            b'n' => {
                self.expect_literal(b"null")?;
                self.value_done();
                Ok(Token::Null)
            }
            b'-' | b'0'..=b'9' => {
                let literal = self.read_number()?;
                self.value_done();
                Ok(Token::Number(literal))
            }
            other => Err(self.unexpected(other)),
        }
    }

    fn read_field_name(&mut self) -> Result<Token> {
        let b = self.peek_significant()?;
        if b != b'"' {
            return Err(self.unexpected(b));
        }
        let name = self.read_string()?;
        let colon = self.peek_significant()?;
        if colon != b':' {
            return Err(self.unexpected(colon));
        }
        self.consume(1);
        self.state = State::Value;
        Ok(Token::FieldName(name))
    }

    fn close(&mut self, expected: Container) -> Result<Token> {
        match self.stack.pop() {
            Some(c) if c == expected => {
                self.value_done();
                Ok(match expected {
                    Container::Object => Token::EndObject,
                    Container::Array => Token::EndArray,
                })
            }
            _ => Err(Error::parse(self.offset, "mismatched closing bracket")),
        }
    }

    fn value_done(&mut self) {
        self.state = if self.stack.is_empty() {
            State::Done
        } else {
            State::AfterValue
        };
    }

    /// Read a quoted string, starting at the opening quote
    fn read_string(&mut self) -> Result<String> {
        let start = self.offset;
        self.scratch.clear();
        let mut escaped = false;
        let mut has_escape = false;
        let quote = self.next_byte()?;
        self.scratch.push(quote);
        loop {
            let b = self.next_byte()?;
            self.scratch.push(b);
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
                has_escape = true;
            } else if b == b'"' {
                break;
            } else if b < 0x20 {
                return Err(Error::parse(
                    self.offset - 1,
                    "control character in string",
                ));
            }
        }
        if has_escape {
            serde_json::from_slice::<String>(&self.scratch)
                .map_err(|e| Error::parse(start, format!("invalid string: {}", e)))
        } else {
            let body = &self.scratch[1..self.scratch.len() - 1];
            std::str::from_utf8(body)
                .map(str::to_string)
                .map_err(|_| Error::parse(start, "string is not valid UTF-8"))
        }
    }

    fn read_number(&mut self) -> Result<String> {
        let start = self.offset;
        self.scratch.clear();
        while let Some(b) = self.peek()? {
            if !matches!(b, b'0'..=b'9' | b'-' | b'+' | b'.' | b'e' | b'E') {
                break;
            }
            self.scratch.push(b);
            self.consume(1);
        }
        if !is_number_literal(&self.scratch) {
            return Err(Error::parse(
                start,
                format!(
                    "invalid number '{}'",
                    String::from_utf8_lossy(&self.scratch)
                ),
            ));
        }
        // only ASCII bytes were accepted above
        Ok(self.scratch.iter().map(|&b| b as char).collect())
    }

    fn expect_literal(&mut self, literal: &[u8]) -> Result<()> {
        for &expected in literal {
            let b = self.next_byte()?;
            if b != expected {
                return Err(Error::parse(
                    self.offset - 1,
                    format!(
                        "invalid literal, expected '{}'",
                        String::from_utf8_lossy(literal)
                    ),
                ));
            }
        }
        Ok(())
    }

    fn peek(&mut self) -> Result<Option<u8>> {
        let buf = self.reader.fill_buf()?;
        Ok(buf.first().copied())
    }

    fn consume(&mut self, n: usize) {
        self.reader.consume(n);
        self.offset += n as u64;
    }

    fn next_byte(&mut self) -> Result<u8> {
        match self.peek()? {
            Some(b) => {
                self.consume(1);
                Ok(b)
            }
            None => Err(Error::parse(self.offset, "unexpected end of input")),
        }
    }

    fn skip_whitespace(&mut self) -> Result<()> {
        while let Some(b) = self.peek()? {
            if !matches!(b, b' ' | b'\t' | b'\n' | b'\r') {
                break;
            }
            self.consume(1);
        }
        Ok(())
    }

    /// Next non-whitespace byte, without consuming it
    fn peek_significant(&mut self) -> Result<u8> {
        self.skip_whitespace()?;
        self.peek()?
            .ok_or_else(|| Error::parse(self.offset, "unexpected end of input"))
    }

    fn unexpected(&self, b: u8) -> Error {
        Error::parse(
            self.offset,
            format!("unexpected character '{}'", b.escape_ascii()),
        )
    }
}

/// `-? (0 | [1-9][0-9]*) (. [0-9]+)? ([eE] [+-]? [0-9]+)?`
fn is_number_literal(s: &[u8]) -> bool {
    let digits = |i: &mut usize| {
        let start = *i;
        while s.get(*i).map_or(false, u8::is_ascii_digit) {
            *i += 1;
        }
        *i > start
    };
    let mut i = 0;
    if s.first() == Some(&b'-') {
        i += 1;
    }
    match s.get(i) {
        Some(b'0') => i += 1,
        Some(b'1'..=b'9') => {
            digits(&mut i);
        }
        _ => return false,
    }
    if s.get(i) == Some(&b'.') {
        i += 1;
        if !digits(&mut i) {
            return false;
        }
    }
    if matches!(s.get(i), Some(b'e') | Some(b'E')) {
        i += 1;
        if matches!(s.get(i), Some(b'+') | Some(b'-')) {
            i += 1;
        }
        if !digits(&mut i) {
            return false;
        }
    }
    i == s.len()
}
