//! Snippet tokenizer.
//!
//! Produces Python-style logical lines: `Newline` ends a statement, and
//! `Indent` / `Dedent` bracket nested blocks. Line breaks inside brackets or
//! after a trailing backslash do not end the statement.

use super::SnippetError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Name(String),
    Int(i64),
    Punct(&'static str),
    Newline,
    Indent,
    Dedent,
    Eof,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lexeme {
    pub token: Token,
    pub line: usize,
}

/// Longest spellings first so that `**=` wins over `**` and `*`.
const PUNCTUATION: &[&str] = &[
    "**=", "//=", "<<=", ">>=", "**", "//", "<<", ">>", "<=", ">=", "==", "!=", "+=", "-=", "*=",
    "/=", "%=", "&=", "|=", "^=", "+", "-", "*", "/", "%", "&", "|", "^", "~", "<", ">", "=", "(",
    ")", "[", "]", ",", ":", ".",
];

const TAB_WIDTH: usize = 8;

pub fn tokenize<S: AsRef<str>>(lines: &[S], first_line: usize) -> Result<Vec<Lexeme>, SnippetError> {
    let mut lexer = Lexer {
        out: Vec::new(),
        indents: vec![0],
        depth: 0,
        continued: false,
        line: first_line,
    };

    for (idx, text) in lines.iter().enumerate() {
        lexer.line = first_line + idx;
        lexer.lex_line(text.as_ref())?;
    }
    lexer.finish()
}

struct Lexer {
    out: Vec<Lexeme>,
    indents: Vec<usize>,
    /// Open bracket nesting.
    depth: usize,
    /// The previous line ended with a backslash.
    continued: bool,
    line: usize,
}

impl Lexer {
    fn push(&mut self, token: Token) {
        self.out.push(Lexeme {
            token,
            line: self.line,
        });
    }

    fn syntax(&self, message: impl Into<String>) -> SnippetError {
        SnippetError::Syntax {
            line: self.line,
            message: message.into(),
        }
    }

    fn lex_line(&mut self, text: &str) -> Result<(), SnippetError> {
        let joined = self.depth > 0 || self.continued;
        self.continued = false;

        let body = text.trim_start();
        if !joined {
            if body.is_empty() || body.starts_with('#') {
                return Ok(());
            }
            let column = indentation(&text[..text.len() - body.len()]);
            self.indent_to(column)?;
        }

        let bytes = body.as_bytes();
        let mut pos = 0;
        while pos < bytes.len() {
            let ch = bytes[pos];
            match ch {
                b' ' | b'\t' | b'\r' => pos += 1,
                b'#' => break,
                b'\\' => {
                    if body[pos + 1..].trim().is_empty() {
                        self.continued = true;
                        break;
                    }
                    return Err(self.syntax("unexpected character after line continuation"));
                }
                b'0'..=b'9' => pos = self.lex_number(body, pos)?,
                b'\'' | b'"' => {
                    return Err(SnippetError::Unsupported {
                        line: self.line,
                        what: "string literal".to_string(),
                    });
                }
                _ if ch == b'_' || ch.is_ascii_alphabetic() => {
                    let end = body[pos..]
                        .find(|c: char| !(c == '_' || c.is_ascii_alphanumeric()))
                        .map_or(body.len(), |n| pos + n);
                    self.push(Token::Name(body[pos..end].to_string()));
                    pos = end;
                }
                _ => pos = self.lex_punct(body, pos)?,
            }
        }

        if self.depth == 0 && !self.continued {
            self.push(Token::Newline);
        }
        Ok(())
    }

    fn indent_to(&mut self, column: usize) -> Result<(), SnippetError> {
        let current = self.indents.last().copied().unwrap_or(0);
        if column > current {
            self.indents.push(column);
            self.push(Token::Indent);
            return Ok(());
        }
        while self.indents.last().copied().unwrap_or(0) > column {
            self.indents.pop();
            self.push(Token::Dedent);
        }
        if self.indents.last().copied().unwrap_or(0) != column {
            return Err(self.syntax("unindent does not match any outer indentation level"));
        }
        Ok(())
    }

    fn lex_number(&mut self, body: &str, start: usize) -> Result<usize, SnippetError> {
        let end = body[start..]
            .find(|c: char| !(c == '_' || c.is_ascii_alphanumeric()))
            .map_or(body.len(), |n| start + n);
        let literal = &body[start..end];

        if body[end..].starts_with('.') {
            return Err(SnippetError::Unsupported {
                line: self.line,
                what: "floating-point literal".to_string(),
            });
        }

        let digits = literal.replace('_', "");
        let (radix, digits) = match digits.get(..2) {
            Some("0x") | Some("0X") => (16, &digits[2..]),
            Some("0o") | Some("0O") => (8, &digits[2..]),
            Some("0b") | Some("0B") => (2, &digits[2..]),
            _ => (10, digits.as_str()),
        };

        if digits.is_empty() || literal.ends_with('_') || literal.contains("__") {
            return Err(self.syntax(format!("invalid number literal `{literal}`")));
        }
        // `007` is not octal; only all-zero decimals may start with `0`.
        if radix == 10 && digits.starts_with('0') && digits.bytes().any(|b| b != b'0') {
            return Err(self.syntax(format!(
                "leading zeros in decimal literal `{literal}`; use `0o` for octal"
            )));
        }
        let value = i64::from_str_radix(digits, radix).map_err(|e| {
            self.syntax(format!("invalid number literal `{literal}`: {e}"))
        })?;

        self.push(Token::Int(value));
        Ok(end)
    }

    fn lex_punct(&mut self, body: &str, start: usize) -> Result<usize, SnippetError> {
        let rest = &body[start..];
        let Some(punct) = PUNCTUATION.iter().copied().find(|p| rest.starts_with(p)) else {
            let ch = rest.chars().next().unwrap_or('?');
            return Err(self.syntax(format!("unexpected character `{ch}`")));
        };

        match punct {
            "(" | "[" => self.depth += 1,
            ")" | "]" => {
                if self.depth == 0 {
                    return Err(self.syntax(format!("unmatched `{punct}`")));
                }
                self.depth -= 1;
            }
            _ => {}
        }

        self.push(Token::Punct(punct));
        Ok(start + punct.len())
    }

    fn finish(mut self) -> Result<Vec<Lexeme>, SnippetError> {
        if self.depth > 0 {
            return Err(self.syntax("bracket is never closed"));
        }
        if self.continued {
            return Err(self.syntax("line continuation at end of snippet"));
        }
        while self.indents.len() > 1 {
            self.indents.pop();
            self.push(Token::Dedent);
        }
        self.push(Token::Eof);
        log::trace!("{} tokens", self.out.len());
        Ok(self.out)
    }
}

/// Width of leading whitespace, with tabs advancing to the next tab stop.
fn indentation(prefix: &str) -> usize {
    prefix.chars().fold(0, |col, c| match c {
        '\t' => (col / TAB_WIDTH + 1) * TAB_WIDTH,
        _ => col + 1,
    })
}
