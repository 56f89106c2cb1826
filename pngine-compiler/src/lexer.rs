//! Tokenizer for the PNGine DSL (§4.I).
//!
//! A single iterative scan over the source bytes, with an appended sentinel
//! byte so lookahead never needs a bounds check. No function in this module
//! recurses; nested structure is the parser's problem, not the lexer's.

use crate::error::LexError;
use crate::token::{Span, Token, TokenKind};

const SENTINEL: u8 = 0;

pub struct Lexer<'a> {
    source: &'a str,
    bytes: Vec<u8>,
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        let mut bytes = Vec::with_capacity(source.len() + 1);
        bytes.extend_from_slice(source.as_bytes());
        bytes.push(SENTINEL);
        Self { source, bytes, pos: 0 }
    }

    fn current(&self) -> u8 {
        self.bytes[self.pos]
    }

    fn at_sentinel(&self) -> bool {
        self.pos + 1 == self.bytes.len() && self.current() == SENTINEL
    }

    fn advance(&mut self) -> u8 {
        let byte = self.current();
        if !self.at_sentinel() {
            self.pos += 1;
        }
        byte
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.current() {
                b' ' | b'\t' | b'\r' | b'\n' => {
                    self.pos += 1;
                }
                b'/' if self.peek_next() == Some(b'/') => {
                    while !self.at_sentinel() && self.current() != b'\n' {
                        self.pos += 1;
                    }
                }
                _ => break,
            }
        }
    }

    fn peek_next(&self) -> Option<u8> {
        self.bytes.get(self.pos + 1).copied()
    }

    fn is_ident_start(b: u8) -> bool {
        b.is_ascii_alphabetic() || b == b'_'
    }

    fn is_ident_continue(b: u8) -> bool {
        b.is_ascii_alphanumeric() || b == b'_'
    }

    /// Scans every token up front; the parser consumes them from a slice.
    pub fn tokenize(source: &'a str) -> Result<Vec<Token>, LexError> {
        let mut lexer = Lexer::new(source);
        let mut tokens = Vec::new();
        loop {
            let token = lexer.next_token()?;
            let is_eof = token.kind == TokenKind::Eof;
            tokens.push(token);
            if is_eof {
                break;
            }
        }
        Ok(tokens)
    }

    fn next_token(&mut self) -> Result<Token, LexError> {
        self.skip_trivia();
        let start = self.pos as u32;

        if self.at_sentinel() {
            return Ok(Token {
                kind: TokenKind::Eof,
                span: Span::new(start, start),
            });
        }

        let byte = self.current();
        let kind = match byte {
            b'#' => {
                self.advance();
                TokenKind::Hash
            }
            b'{' => {
                self.advance();
                TokenKind::LBrace
            }
            b'}' => {
                self.advance();
                TokenKind::RBrace
            }
            b'[' => {
                self.advance();
                TokenKind::LBracket
            }
            b']' => {
                self.advance();
                TokenKind::RBracket
            }
            b'=' => {
                self.advance();
                TokenKind::Equals
            }
            b'$' => {
                self.advance();
                TokenKind::Dollar
            }
            b'.' => {
                self.advance();
                TokenKind::Dot
            }
            b',' => {
                self.advance();
                TokenKind::Comma
            }
            b'"' => return self.scan_string(start),
            b'-' | b'0'..=b'9' => return self.scan_number(start),
            _ if Self::is_ident_start(byte) => return self.scan_identifier(start),
            other => {
                return Err(LexError {
                    span: Span::new(start, start + 1),
                    message: format!("unexpected byte 0x{other:02x}"),
                })
            }
        };

        Ok(Token {
            kind,
            span: Span::new(start, self.pos as u32),
        })
    }

    fn scan_identifier(&mut self, start: u32) -> Result<Token, LexError> {
        while !self.at_sentinel() && Self::is_ident_continue(self.current()) {
            self.pos += 1;
        }
        Ok(Token {
            kind: TokenKind::Identifier,
            span: Span::new(start, self.pos as u32),
        })
    }

    fn scan_number(&mut self, start: u32) -> Result<Token, LexError> {
        if self.current() == b'-' {
            self.pos += 1;
        }
        while !self.at_sentinel() && self.current().is_ascii_digit() {
            self.pos += 1;
        }
        if !self.at_sentinel() && self.current() == b'.' && self.peek_next().is_some_and(|b| b.is_ascii_digit()) {
            self.pos += 1;
            while !self.at_sentinel() && self.current().is_ascii_digit() {
                self.pos += 1;
            }
        }
        Ok(Token {
            kind: TokenKind::Number,
            span: Span::new(start, self.pos as u32),
        })
    }

    fn scan_string(&mut self, start: u32) -> Result<Token, LexError> {
        self.pos += 1; // opening quote
        loop {
            if self.at_sentinel() {
                return Err(LexError {
                    span: Span::new(start, self.pos as u32),
                    message: "unterminated string literal".to_string(),
                });
            }
            match self.current() {
                b'"' => {
                    self.pos += 1;
                    break;
                }
                b'\\' => {
                    self.pos += 1;
                    if self.at_sentinel() {
                        return Err(LexError {
                            span: Span::new(start, self.pos as u32),
                            message: "unterminated escape sequence".to_string(),
                        });
                    }
                    self.pos += 1;
                }
                _ => self.pos += 1,
            }
        }
        Ok(Token {
            kind: TokenKind::String,
            span: Span::new(start, self.pos as u32),
        })
    }

    pub fn text(&self, span: Span) -> &'a str {
        &self.source[span.start as usize..span.end as usize]
    }
}

/// Resolves a token's span against the original source text; used once
/// tokens have already been collected into a `Vec` and the `Lexer` itself
/// has gone out of scope.
pub fn token_text<'a>(source: &'a str, span: Span) -> &'a str {
    &source[span.start as usize..span.end as usize]
}

/// Unescapes a `"..."` string token's contents (quotes stripped, `\\`/`\"`/
/// `\n` handled).
pub fn unescape_string(raw: &str) -> String {
    let inner = &raw[1..raw.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some('"') => out.push('"'),
                Some('\\') => out.push('\\'),
                Some(other) => out.push(other),
                None => {}
            }
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        Lexer::tokenize(src).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn tokenizes_a_minimal_form() {
        let src = r#"#buffer b { size = 16 usage = [UNIFORM] }"#;
        use TokenKind::*;
        assert_eq!(
            kinds(src),
            vec![
                Hash, Identifier, Identifier, LBrace, Identifier, Equals, Number, Identifier,
                Equals, LBracket, Identifier, RBracket, RBrace, Eof,
            ]
        );
    }

    #[test]
    fn tokenizes_reference_and_string() {
        let src = r#"shader = $shaderModule.tri source = "fn main() {}""#;
        use TokenKind::*;
        assert_eq!(
            kinds(src),
            vec![
                Identifier, Equals, Dollar, Identifier, Dot, Identifier, Identifier, Equals,
                String, Eof,
            ]
        );
    }

    #[test]
    fn line_comments_are_skipped() {
        let src = "// a comment\n#frame main {}";
        use TokenKind::*;
        assert_eq!(kinds(src), vec![Hash, Identifier, Identifier, LBrace, RBrace, Eof]);
    }

    #[test]
    fn unterminated_string_reports_a_span() {
        let err = Lexer::tokenize(r#"#wgsl x { source = "fn a( }"#).unwrap_err();
        assert!(err.span.end as usize <= r#"#wgsl x { source = "fn a( }"#.len());
    }

    #[test]
    fn unexpected_byte_is_an_error() {
        let err = Lexer::tokenize("#buffer b { size ~ 1 }").unwrap_err();
        assert_eq!(err.span.start, 17);
    }

    #[test]
    fn negative_and_fractional_numbers() {
        let src = "-3 2.5";
        assert_eq!(kinds(src), vec![TokenKind::Number, TokenKind::Number, TokenKind::Eof]);
    }
}
