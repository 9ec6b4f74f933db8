use crate::ast::Registry;
use crate::error::{ExpressionError, Result};
use log::trace;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum LexemeKind {
    /// Numeric literal such as `3`, `0.25`, `.5` or `1e-2`.
    Number,
    /// Word-like label, registered or not.
    Identifier,
    /// Registered label made of symbol characters, such as `+` or `**`.
    Symbol,
    OpenParen,
    CloseParen,
    Comma,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Lexeme<'a> {
    pub kind: LexemeKind,
    pub text: &'a str,
    /// Byte offset of the lexeme in the input.
    pub offset: usize,
}

/// Splits input text into lexemes on demand.
///
/// Registered labels are matched longest first, so `asinh` is never read as
/// `asin` followed by `h`. The tokenizer stops for good after the first error.
pub struct Tokenizer<'a> {
    input: &'a str,
    offset: usize,
    labels: &'a [String],
    failed: bool,
}

impl<'a> Tokenizer<'a> {
    pub fn new<T>(input: &'a str, registry: &'a Registry<T>) -> Self {
        Self {
            input,
            offset: 0,
            labels: registry.labels(),
            failed: false,
        }
    }

    fn skip_whitespace(&mut self) {
        let rest = &self.input[self.offset..];
        let trimmed = rest.trim_start();
        self.offset += rest.len() - trimmed.len();
    }

    fn emit(&mut self, kind: LexemeKind, len: usize) -> Lexeme<'a> {
        let lexeme = Lexeme {
            kind,
            text: &self.input[self.offset..self.offset + len],
            offset: self.offset,
        };
        self.offset += len;
        trace!("Lexeme {:?} `{}` at {}", lexeme.kind, lexeme.text, lexeme.offset);
        lexeme
    }

    fn next_lexeme(&mut self) -> Option<Result<Lexeme<'a>>> {
        self.skip_whitespace();
        let rest = &self.input[self.offset..];
        let first = rest.chars().next()?;

        let lexeme = match first {
            '(' => self.emit(LexemeKind::OpenParen, 1),
            ')' => self.emit(LexemeKind::CloseParen, 1),
            ',' => self.emit(LexemeKind::Comma, 1),
            _ if starts_number(rest) => self.emit(LexemeKind::Number, number_len(rest)),
            _ => {
                let labels = self.labels;
                if let Some(label) = labels.iter().find(|label| rest.starts_with(label.as_str())) {
                    let kind = if is_identifier_start(first) {
                        LexemeKind::Identifier
                    } else {
                        LexemeKind::Symbol
                    };
                    let len = label.len();
                    self.emit(kind, len)
                } else if is_identifier_start(first) {
                    self.emit(LexemeKind::Identifier, identifier_len(rest))
                } else {
                    return Some(Err(ExpressionError::Lex {
                        offset: self.offset,
                        message: format!("unexpected character `{}`", first),
                    }));
                }
            }
        };
        Some(Ok(lexeme))
    }
}

impl<'a> Iterator for Tokenizer<'a> {
    type Item = Result<Lexeme<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let item = self.next_lexeme();
        if matches!(item, Some(Err(_))) {
            self.failed = true;
        }
        item
    }
}

fn is_identifier_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn identifier_len(text: &str) -> usize {
    text.char_indices()
        .find(|&(_, c)| !(c.is_alphanumeric() || c == '_'))
        .map_or(text.len(), |(index, _)| index)
}

fn digits_len(text: &str) -> usize {
    text.bytes().take_while(u8::is_ascii_digit).count()
}

fn starts_number(text: &str) -> bool {
    let bytes = text.as_bytes();
    match bytes.first() {
        Some(b) if b.is_ascii_digit() => true,
        Some(b'.') => bytes.get(1).is_some_and(u8::is_ascii_digit),
        _ => false,
    }
}

/// Length of the numeric literal at the start of `text`: digits, an optional
/// fraction and an optional exponent. The exponent is only taken when digits
/// follow the `e`, so `2e` stays a number followed by whatever `e` denotes.
fn number_len(text: &str) -> usize {
    let bytes = text.as_bytes();
    let mut len = digits_len(text);
    if bytes.get(len) == Some(&b'.') {
        len += 1 + digits_len(&text[len + 1..]);
    }
    if matches!(bytes.get(len), Some(b'e' | b'E')) {
        let mut exponent = len + 1;
        if matches!(bytes.get(exponent), Some(b'+' | b'-')) {
            exponent += 1;
        }
        let digits = digits_len(&text[exponent..]);
        if digits > 0 {
            len = exponent + digits;
        }
    }
    len
}
