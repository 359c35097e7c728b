mod literal;

use crate::ast::Span;
use nom::{
    IResult,
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    character::complete::{alpha1, alphanumeric1, char},
    combinator::{map, recognize, value},
    multi::many0,
    sequence::{pair, preceded},
};

use literal::{parse_byte_string, parse_char_string, parse_float, parse_integer};

/// Characters that make up operator identifiers such as `<`, `==` or `+`.
const OPERATOR_CHARS: &str = "+-*/<>=!%&^~?@$";

/// Token with source location information
#[derive(Debug, Clone, PartialEq)]
pub struct LocatedToken {
    pub token: Token,
    pub span: Span,
    /// Whether whitespace (or a comment, or the start of input) came right
    /// before this token. `f(x)` calls `f`, while `f (x)` is two terms.
    pub spaced: bool,
}

impl LocatedToken {
    pub fn new(token: Token, span: Span, spaced: bool) -> Self {
        LocatedToken { token, span, spaced }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Identifiers and literals
    Identifier(String),
    Integer(i64),
    Float(f64),
    CharString(String),
    ByteString(Vec<u8>),

    // Punctuation
    Equals,      // = definition
    ColonEquals, // := mutation
    ColonColon,  // :: keyword argument marker
    Colon,
    Dot,
    Comma,
    Semicolon,
    Newline,
    Pipe,

    // Delimiters
    LeftParen,
    RightParen,
    LeftBracket,
    RightBracket,
    LeftBrace,
    RightBrace,

    // Comments (to be skipped)
    Comment(String),
}

fn parse_comment(input: &str) -> IResult<&str, Token> {
    map(preceded(char('#'), take_while(|c: char| c != '\n')), |s: &str| {
        Token::Comment(s.to_string())
    })(input)
}

fn parse_word(input: &str) -> IResult<&str, Token> {
    map(
        recognize(pair(alt((alpha1, tag("_"))), many0(alt((alphanumeric1, tag("_")))))),
        |s: &str| Token::Identifier(s.to_string()),
    )(input)
}

/// A run of operator characters is an identifier, except a lone `=`.
fn parse_operator(input: &str) -> IResult<&str, Token> {
    map(take_while1(|c: char| OPERATOR_CHARS.contains(c)), |s: &str| {
        if s == "=" { Token::Equals } else { Token::Identifier(s.to_string()) }
    })(input)
}

fn parse_punctuation(input: &str) -> IResult<&str, Token> {
    alt((
        value(Token::ColonEquals, tag(":=")),
        value(Token::ColonColon, tag("::")),
        value(Token::Colon, char(':')),
        value(Token::Dot, char('.')),
        value(Token::Comma, char(',')),
        value(Token::Semicolon, char(';')),
        value(Token::Pipe, char('|')),
        value(Token::LeftParen, char('(')),
        value(Token::RightParen, char(')')),
        value(Token::LeftBracket, char('[')),
        value(Token::RightBracket, char(']')),
        value(Token::LeftBrace, char('{')),
        value(Token::RightBrace, char('}')),
    ))(input)
}

fn parse_token(input: &str) -> IResult<&str, Token> {
    alt((
        parse_comment,
        parse_byte_string, // must come before words so `b"..."` is not `b`
        parse_char_string,
        parse_float,
        parse_integer,
        parse_word,
        parse_punctuation,
        parse_operator,
    ))(input)
}

fn is_blank(c: char) -> bool {
    c == ' ' || c == '\t' || c == '\r'
}

pub fn tokenize(input: &str) -> Result<Vec<LocatedToken>, String> {
    let mut remaining = input;
    let mut tokens = Vec::new();
    let mut had_whitespace = true; // Start of input counts as having whitespace

    // Build line offset table once for O(log n) span calculations
    let line_offsets = LineOffsets::new(input);

    while !remaining.is_empty() {
        let blank_len = remaining.len() - remaining.trim_start_matches(is_blank).len();
        if blank_len > 0 {
            remaining = &remaining[blank_len..];
            had_whitespace = true;
            continue;
        }

        if let Some(rest) = remaining.strip_prefix('\n') {
            let span = calculate_span(input, &line_offsets, remaining, rest);
            tokens.push(LocatedToken::new(Token::Newline, span, had_whitespace));
            remaining = rest;
            had_whitespace = true;
            continue;
        }

        match parse_token(remaining) {
            Ok((rest, token)) => {
                if matches!(token, Token::Comment(_)) {
                    remaining = rest;
                    had_whitespace = true; // Comments act like whitespace
                    continue;
                }

                let span = calculate_span(input, &line_offsets, remaining, rest);
                tokens.push(LocatedToken::new(token, span, had_whitespace));
                remaining = rest;
                had_whitespace = false;
            }
            Err(_) => {
                let offset = input.len() - remaining.len();
                let (line, col) = line_offsets.offset_to_line_col(offset);
                let snippet: String = remaining.chars().take(10).collect();
                return Err(format!("Tokenization error at {}:{} near {:?}", line, col, snippet));
            }
        }
    }

    Ok(tokens)
}

/// Precomputed line offset table for efficient offset-to-line-column conversion.
struct LineOffsets {
    /// Byte offsets where each line starts. line_starts[0] = 0 (line 1 starts at offset 0).
    line_starts: Vec<usize>,
}

impl LineOffsets {
    fn new(input: &str) -> Self {
        let mut line_starts = vec![0];
        for (i, ch) in input.char_indices() {
            if ch == '\n' {
                line_starts.push(i + 1);
            }
        }
        LineOffsets { line_starts }
    }

    /// Convert byte offset to (line, column), both 1-indexed.
    fn offset_to_line_col(&self, offset: usize) -> (usize, usize) {
        let line_idx = match self.line_starts.binary_search(&offset) {
            Ok(idx) => idx,
            Err(idx) => idx - 1,
        };
        (line_idx + 1, offset - self.line_starts[line_idx] + 1)
    }
}

fn calculate_span(original: &str, line_offsets: &LineOffsets, before: &str, after: &str) -> Span {
    let start_offset = original.len() - before.len();
    let end_offset = original.len() - after.len();
    let (start_line, start_col) = line_offsets.offset_to_line_col(start_offset);
    let (end_line, end_col) = line_offsets.offset_to_line_col(end_offset);
    Span::new(start_line, start_col, end_line, end_col)
}
