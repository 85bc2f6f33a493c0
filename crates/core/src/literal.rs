//! Tolerant literal parser for the loosely-quoted object/array literals the
//! publishing platform emits. Accepts unquoted identifier keys, single-quoted
//! strings, trailing commas and JS comments. Strict JSON is always tried
//! first by callers; this grammar is the fallback and never executes code.

use serde_json::{Map, Number, Value};

use crate::error::{FlipError, Result};

pub fn parse_loose(input: &str) -> Result<Value> {
    let mut cursor = Cursor {
        bytes: input.as_bytes(),
        pos: 0,
    };
    cursor.skip_trivia();
    let value = cursor.parse_value()?;
    cursor.skip_trivia();
    if cursor.pos != cursor.bytes.len() {
        return Err(cursor.fail("trailing characters after literal"));
    }
    Ok(value)
}

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let byte = self.peek()?;
        self.pos += 1;
        Some(byte)
    }

    fn fail(&self, message: &str) -> FlipError {
        FlipError::Literal(format!("{message} at byte {}", self.pos))
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                Some(b) if b.is_ascii_whitespace() => {
                    self.pos += 1;
                }
                Some(b'/') if self.bytes.get(self.pos + 1) == Some(&b'/') => {
                    while let Some(b) = self.peek() {
                        self.pos += 1;
                        if b == b'\n' {
                            break;
                        }
                    }
                }
                Some(b'/') if self.bytes.get(self.pos + 1) == Some(&b'*') => {
                    self.pos += 2;
                    while self.pos < self.bytes.len() {
                        if self.bytes[self.pos] == b'*'
                            && self.bytes.get(self.pos + 1) == Some(&b'/')
                        {
                            self.pos += 2;
                            break;
                        }
                        self.pos += 1;
                    }
                }
                _ => break,
            }
        }
    }

    fn parse_value(&mut self) -> Result<Value> {
        self.skip_trivia();
        match self.peek() {
            Some(b'{') => self.parse_object(),
            Some(b'[') => self.parse_array(),
            Some(quote @ (b'"' | b'\'')) => Ok(Value::String(self.parse_string(quote)?)),
            Some(_) => self.parse_word_or_number(),
            None => Err(self.fail("unexpected end of input")),
        }
    }

    fn parse_object(&mut self) -> Result<Value> {
        self.bump();
        let mut map = Map::new();
        loop {
            self.skip_trivia();
            match self.peek() {
                Some(b'}') => {
                    self.bump();
                    return Ok(Value::Object(map));
                }
                Some(_) => {}
                None => return Err(self.fail("unterminated object")),
            }
            let key = self.parse_key()?;
            self.skip_trivia();
            if self.bump() != Some(b':') {
                return Err(self.fail("expected `:` after object key"));
            }
            let value = self.parse_value()?;
            map.insert(key, value);
            self.skip_trivia();
            match self.peek() {
                Some(b',') => {
                    self.bump();
                }
                Some(b'}') => {}
                _ => return Err(self.fail("expected `,` or `}` in object")),
            }
        }
    }

    fn parse_array(&mut self) -> Result<Value> {
        self.bump();
        let mut items = Vec::new();
        loop {
            self.skip_trivia();
            match self.peek() {
                Some(b']') => {
                    self.bump();
                    return Ok(Value::Array(items));
                }
                Some(_) => {}
                None => return Err(self.fail("unterminated array")),
            }
            items.push(self.parse_value()?);
            self.skip_trivia();
            match self.peek() {
                Some(b',') => {
                    self.bump();
                }
                Some(b']') => {}
                _ => return Err(self.fail("expected `,` or `]` in array")),
            }
        }
    }

    fn parse_key(&mut self) -> Result<String> {
        match self.peek() {
            Some(quote @ (b'"' | b'\'')) => self.parse_string(quote),
            Some(b) if is_ident_start(b) => {
                let start = self.pos;
                while self.peek().is_some_and(is_ident_byte) {
                    self.pos += 1;
                }
                Ok(String::from_utf8_lossy(&self.bytes[start..self.pos]).into_owned())
            }
            _ => Err(self.fail("expected object key")),
        }
    }

    fn parse_string(&mut self, quote: u8) -> Result<String> {
        self.bump();
        let mut out: Vec<u8> = Vec::new();
        loop {
            let byte = self.bump().ok_or_else(|| self.fail("unterminated string"))?;
            if byte == quote {
                break;
            }
            if byte != b'\\' {
                out.push(byte);
                continue;
            }
            let escape = self.bump().ok_or_else(|| self.fail("unterminated escape"))?;
            match escape {
                b'n' => out.push(b'\n'),
                b't' => out.push(b'\t'),
                b'r' => out.push(b'\r'),
                b'b' => out.push(0x08),
                b'f' => out.push(0x0c),
                b'u' => {
                    let ch = self.parse_unicode_escape()?;
                    let mut buf = [0u8; 4];
                    out.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
                }
                // `\'`, `\"`, `\\`, `\/` and any unknown escape keep the
                // escaped character itself, as a sloppy evaluator would.
                other => out.push(other),
            }
        }
        String::from_utf8(out).map_err(|_| self.fail("string is not valid UTF-8"))
    }

    fn parse_unicode_escape(&mut self) -> Result<char> {
        let first = self.parse_hex4()?;
        // Combine surrogate pairs; anything unpaired degrades to U+FFFD.
        if (0xD800..0xDC00).contains(&first) {
            if self.bytes.get(self.pos) == Some(&b'\\')
                && self.bytes.get(self.pos + 1) == Some(&b'u')
            {
                self.pos += 2;
                let second = self.parse_hex4()?;
                if (0xDC00..0xE000).contains(&second) {
                    let combined =
                        0x10000 + ((first - 0xD800) << 10) + (second - 0xDC00);
                    return Ok(char::from_u32(combined).unwrap_or('\u{FFFD}'));
                }
                return Ok('\u{FFFD}');
            }
            return Ok('\u{FFFD}');
        }
        Ok(char::from_u32(first).unwrap_or('\u{FFFD}'))
    }

    fn parse_hex4(&mut self) -> Result<u32> {
        let mut code = 0u32;
        for _ in 0..4 {
            let byte = self.bump().ok_or_else(|| self.fail("truncated \\u escape"))?;
            let digit = (byte as char)
                .to_digit(16)
                .ok_or_else(|| self.fail("invalid \\u escape"))?;
            code = code * 16 + digit;
        }
        Ok(code)
    }

    fn parse_word_or_number(&mut self) -> Result<Value> {
        let start = self.pos;
        while self.peek().is_some_and(is_word_byte) {
            self.pos += 1;
        }
        if self.pos == start {
            return Err(self.fail("unexpected character"));
        }
        let word = std::str::from_utf8(&self.bytes[start..self.pos])
            .map_err(|_| self.fail("invalid token"))?;
        match word {
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            "null" | "undefined" => Ok(Value::Null),
            _ => {
                if let Ok(int) = word.parse::<i64>() {
                    return Ok(Value::Number(int.into()));
                }
                if let Ok(float) = word.parse::<f64>() {
                    if let Some(number) = Number::from_f64(float) {
                        return Ok(Value::Number(number));
                    }
                }
                Err(FlipError::Literal(format!(
                    "unexpected token `{word}` at byte {start}"
                )))
            }
        }
    }
}

fn is_ident_start(byte: u8) -> bool {
    byte.is_ascii_alphabetic() || byte == b'_' || byte == b'$'
}

fn is_ident_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'_' || byte == b'$'
}

fn is_word_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || matches!(byte, b'_' | b'$' | b'+' | b'-' | b'.')
}
