//! Tokenizer with a resettable cursor.
//!
//! The whole input is tokenized up front, so a [`Position`] is just an index into the token
//! vector. Parsers capture a position before a speculative parse and hand it back to
//! [`Tokenizer::reset_position`] to backtrack.
//!
//! # Examples
//!
//! ```
//! use exprc_lexer::{SymbolTable, Tokenizer, TokenKind};
//!
//! let symbols: SymbolTable = ["+", ">", ">="].into_iter().collect();
//! let mut tokens = Tokenizer::new("a >= 10L", &symbols).unwrap();
//! assert_eq!(tokens.read_token().unwrap().text, "a");
//! assert_eq!(tokens.read_token().unwrap().text, ">=");
//! let number = tokens.read_token().unwrap();
//! assert_eq!(number.kind, TokenKind::Number);
//! assert_eq!(number.text, "10L");
//! assert!(tokens.is_at_end());
//! ```

use nom::branch::alt;
use nom::bytes::complete::{escaped_transform, tag};
use nom::character::complete::{char, digit1, none_of, one_of, satisfy};
use nom::combinator::{opt, recognize, value};
use nom::multi::many0_count;
use nom::sequence::{delimited, pair, preceded};
use nom::{IResult, Parser};

use crate::error::{LexError, ScanError};
use crate::symbols::SymbolTable;
use crate::token::{Token, TokenKind};

type ScanResult<'a, T> = IResult<&'a str, T, ScanError<&'a str>>;

/// Opaque cursor into a token stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Position(usize);

/// A token stream over a single source text.
#[derive(Debug, Clone)]
pub struct Tokenizer {
    tokens: Vec<Token>,
    cursor: usize,
    source_len: usize,
}

impl Tokenizer {
    /// Tokenize `source`, matching operators by longest match over `symbols`.
    pub fn new(source: &str, symbols: &SymbolTable) -> Result<Self, LexError> {
        let mut tokens = Vec::new();
        let mut rest = source;

        loop {
            rest = rest.trim_start();
            let Some(first) = rest.chars().next() else {
                break;
            };
            let offset = source.len() - rest.len();

            if first.is_ascii_digit() {
                let (after, text) = number(rest).map_err(|_| LexError::InvalidNumber {
                    text: leading_word(rest).to_string(),
                    offset,
                })?;
                // `10abc` is neither a number nor an identifier.
                if after.chars().next().is_some_and(is_ident_continue) {
                    return Err(LexError::InvalidNumber {
                        text: leading_word(rest).to_string(),
                        offset,
                    });
                }
                tokens.push(Token::new(TokenKind::Number, text, offset));
                rest = after;
            } else if first == '"' {
                let (after, text) =
                    string_literal(rest).map_err(|_| LexError::UnterminatedString { offset })?;
                tokens.push(Token::new(TokenKind::String, text, offset));
                rest = after;
            } else if first == '\'' {
                let (after, ch) =
                    char_literal(rest).map_err(|_| LexError::UnterminatedChar { offset })?;
                tokens.push(Token::new(TokenKind::Char, ch.to_string(), offset));
                rest = after;
            } else if is_ident_start(first) {
                let (after, text) =
                    identifier(rest).map_err(|_| LexError::UnexpectedCharacter {
                        found: first,
                        offset,
                    })?;
                tokens.push(Token::new(TokenKind::Identifier, text, offset));
                rest = after;
            } else if let Some(len) = symbols.longest_match(rest) {
                tokens.push(Token::new(TokenKind::Symbol, &rest[..len], offset));
                rest = &rest[len..];
            } else {
                return Err(LexError::UnexpectedCharacter {
                    found: first,
                    offset,
                });
            }
        }

        log::trace!("tokenized {} tokens from {:?}", tokens.len(), source);
        Ok(Self {
            tokens,
            cursor: 0,
            source_len: source.len(),
        })
    }

    /// Advance and return the next token, or `None` at end of input.
    pub fn read_token(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.cursor).cloned();
        if token.is_some() {
            self.cursor += 1;
        }
        token
    }

    /// Look at the next token without advancing.
    pub fn peek_token(&self) -> Option<&Token> {
        self.tokens.get(self.cursor)
    }

    /// Look `n` tokens ahead without advancing. `peek_nth(0)` is [`Tokenizer::peek_token`].
    pub fn peek_nth(&self, n: usize) -> Option<&Token> {
        self.tokens.get(self.cursor + n)
    }

    /// Returns whether the next token is the given symbol or keyword.
    pub fn next_is(&self, text: &str) -> bool {
        self.peek_token().is_some_and(|token| token.is(text))
    }

    /// Consume `expected` if it is the next token.
    ///
    /// When the token is missing, returns `Ok(false)` or, if `throw_if_missing` is set, a
    /// [`LexError::MissingSymbol`] describing what was found instead.
    pub fn read_symbol(&mut self, expected: &str, throw_if_missing: bool) -> Result<bool, LexError> {
        if self.next_is(expected) {
            self.cursor += 1;
            return Ok(true);
        }
        if !throw_if_missing {
            return Ok(false);
        }
        let found = match self.peek_token() {
            Some(token) => format!("'{token}'"),
            None => "end of input".to_string(),
        };
        Err(LexError::MissingSymbol {
            expected: expected.to_string(),
            found,
            offset: self.offset(),
        })
    }

    /// Current cursor, to be restored later with [`Tokenizer::reset_position`].
    pub fn position(&self) -> Position {
        Position(self.cursor)
    }

    /// Restore a cursor captured with [`Tokenizer::position`].
    pub fn reset_position(&mut self, position: Position) {
        self.cursor = position.0.min(self.tokens.len());
    }

    /// Source offset of the next token, or the source length at end of input.
    pub fn offset(&self) -> usize {
        self.peek_token()
            .map(|token| token.offset)
            .unwrap_or(self.source_len)
    }

    pub fn is_at_end(&self) -> bool {
        self.cursor >= self.tokens.len()
    }

    /// Split the next symbol token after `prefix` when it is longer than `prefix`.
    ///
    /// Longest-match tokenization turns the `>>` closing `List<List<int>>` into one token. The
    /// generic-argument reader calls this to peel a single `>` off the front. Returns whether the
    /// next token now equals `prefix`.
    pub fn split_symbol(&mut self, prefix: &str) -> bool {
        let Some(token) = self.tokens.get(self.cursor) else {
            return false;
        };
        if token.kind != TokenKind::Symbol || !token.text.starts_with(prefix) {
            return false;
        }
        if token.text.len() == prefix.len() {
            return true;
        }
        let offset = token.offset;
        let remainder = token.text[prefix.len()..].to_string();
        self.tokens[self.cursor] = Token::new(TokenKind::Symbol, prefix, offset);
        self.tokens.insert(
            self.cursor + 1,
            Token::new(TokenKind::Symbol, remainder, offset + prefix.len()),
        );
        true
    }

    /// All tokens of the source, regardless of the cursor.
    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }
}

fn identifier(input: &str) -> ScanResult<'_, &str> {
    recognize(pair(
        satisfy(is_ident_start),
        many0_count(satisfy(is_ident_continue)),
    ))
    .parse(input)
}

/// Digits, an optional fraction, an optional exponent and an optional type suffix.
///
/// A dot only belongs to the number when a digit follows it, so `1.ToString()` leaves
/// `.ToString()` for the parser.
fn number(input: &str) -> ScanResult<'_, &str> {
    recognize((
        digit1,
        opt((char('.'), digit1)),
        opt((one_of("eE"), opt(one_of("+-")), digit1)),
        opt(one_of("lLfFdDmM")),
    ))
    .parse(input)
}

fn string_literal(input: &str) -> ScanResult<'_, String> {
    delimited(char('"'), string_body, char('"')).parse(input)
}

fn string_body(input: &str) -> ScanResult<'_, String> {
    if input.starts_with('"') {
        return Ok((input, String::new()));
    }
    escaped_transform(
        none_of("\\\""),
        '\\',
        alt((
            value("\\", tag("\\")),
            value("\"", tag("\"")),
            value("'", tag("'")),
            value("\n", tag("n")),
            value("\r", tag("r")),
            value("\t", tag("t")),
            value("\0", tag("0")),
        )),
    )
    .parse(input)
}

fn char_literal(input: &str) -> ScanResult<'_, char> {
    delimited(
        char('\''),
        alt((
            preceded(
                char('\\'),
                alt((
                    value('\\', char('\\')),
                    value('\'', char('\'')),
                    value('"', char('"')),
                    value('\n', char('n')),
                    value('\r', char('r')),
                    value('\t', char('t')),
                    value('\0', char('0')),
                )),
            ),
            none_of("\\'"),
        )),
        char('\''),
    )
    .parse(input)
}

fn leading_word(input: &str) -> &str {
    let end = input
        .char_indices()
        .find(|(_, ch)| !(is_ident_continue(*ch) || *ch == '.'))
        .map(|(idx, _)| idx)
        .unwrap_or(input.len());
    &input[..end]
}

pub(crate) fn is_ident_start(ch: char) -> bool {
    ch == '_' || ch.is_ascii_alphabetic()
}

pub(crate) fn is_ident_continue(ch: char) -> bool {
    ch == '_' || ch.is_ascii_alphanumeric()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn symbols() -> SymbolTable {
        ["(", ")", ".", "?.", "?", ">", ">>", ">=", "=", "==", "=>", "+"]
            .into_iter()
            .collect()
    }

    fn texts(source: &str) -> Vec<String> {
        Tokenizer::new(source, &symbols())
            .expect("tokenize")
            .tokens()
            .iter()
            .map(|token| token.text.clone())
            .collect()
    }

    #[test]
    fn method_call_on_integer_keeps_dot_separate() {
        assert_eq!(texts("1.ToString()"), vec!["1", ".", "ToString", "(", ")"]);
        assert_eq!(texts("1.5e3"), vec!["1.5e3"]);
    }

    #[test]
    fn null_conditional_is_one_symbol() {
        assert_eq!(texts("a?.b ? c"), vec!["a", "?.", "b", "?", "c"]);
    }

    #[test]
    fn string_and_char_literals_are_decoded() {
        let tokens = Tokenizer::new(r#""a\"b\n" 'x' '\t' """#, &symbols()).expect("tokenize");
        let kinds: Vec<_> = tokens.tokens().iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::String,
                TokenKind::Char,
                TokenKind::Char,
                TokenKind::String
            ]
        );
        assert_eq!(tokens.tokens()[0].text, "a\"b\n");
        assert_eq!(tokens.tokens()[1].text, "x");
        assert_eq!(tokens.tokens()[2].text, "\t");
        assert_eq!(tokens.tokens()[3].text, "");
    }

    #[test]
    fn reports_offsets_of_errors() {
        let err = Tokenizer::new("a + #", &symbols()).unwrap_err();
        assert_eq!(
            err,
            LexError::UnexpectedCharacter {
                found: '#',
                offset: 4
            }
        );
        let err = Tokenizer::new("\"open", &symbols()).unwrap_err();
        assert_eq!(err, LexError::UnterminatedString { offset: 0 });
        let err = Tokenizer::new("12ab", &symbols()).unwrap_err();
        assert!(matches!(err, LexError::InvalidNumber { offset: 0, .. }));
    }

    #[test]
    fn reset_position_backtracks() {
        let mut tokens = Tokenizer::new("(x) => x", &symbols()).expect("tokenize");
        let start = tokens.position();
        assert!(tokens.read_symbol("(", true).unwrap());
        assert_eq!(tokens.read_token().unwrap().text, "x");
        tokens.reset_position(start);
        assert_eq!(tokens.peek_token().unwrap().text, "(");
    }

    #[test]
    fn read_symbol_reports_missing_symbol() {
        let mut tokens = Tokenizer::new("x", &symbols()).expect("tokenize");
        assert!(!tokens.read_symbol(")", false).unwrap());
        let err = tokens.read_symbol(")", true).unwrap_err();
        assert!(matches!(err, LexError::MissingSymbol { offset: 0, .. }));
    }

    #[test]
    fn split_symbol_peels_closing_angle() {
        let mut tokens = Tokenizer::new("a>>b", &symbols()).expect("tokenize");
        tokens.read_token();
        assert!(tokens.split_symbol(">"));
        assert_eq!(tokens.read_token().unwrap().text, ">");
        assert_eq!(tokens.read_token().unwrap().text, ">");
        assert_eq!(tokens.read_token().unwrap().text, "b");
        assert_eq!(tokens.offset(), 4);
    }
}
