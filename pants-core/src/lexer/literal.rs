//! Literal parsing for the lexer
//!
//! - Integers: decimal digits, must fit in an `i64`
//! - Floats: `digits.digits`; a dot not followed by a digit is punctuation
//! - Strings: `"..."` and byte strings `b"..."` with `\n \t \r \0 \\ \" \xNN` escapes

use nom::{
    IResult,
    character::complete::{char, digit1},
    combinator::{map_res, recognize},
    error::{Error, ErrorKind},
    sequence::{delimited, preceded, tuple},
};

use super::Token;

pub fn parse_integer(input: &str) -> IResult<&str, Token> {
    map_res(digit1, |s: &str| s.parse::<i64>().map(Token::Integer))(input)
}

pub fn parse_float(input: &str) -> IResult<&str, Token> {
    map_res(recognize(tuple((digit1, char('.'), digit1))), |s: &str| {
        s.parse::<f64>().map(Token::Float)
    })(input)
}

pub fn parse_char_string(input: &str) -> IResult<&str, Token> {
    map_res(delimited(char('"'), string_body, char('"')), |bytes| {
        String::from_utf8(bytes).map(Token::CharString)
    })(input)
}

pub fn parse_byte_string(input: &str) -> IResult<&str, Token> {
    let (rest, bytes) = preceded(char('b'), delimited(char('"'), string_body, char('"')))(input)?;
    Ok((rest, Token::ByteString(bytes)))
}

fn fail(input: &str, kind: ErrorKind) -> nom::Err<Error<&str>> {
    nom::Err::Error(Error::new(input, kind))
}

/// Everything up to (not including) the closing quote, with escapes decoded.
fn string_body(input: &str) -> IResult<&str, Vec<u8>> {
    let mut out = Vec::new();
    let mut chars = input.char_indices();
    while let Some((i, c)) = chars.next() {
        match c {
            '"' => return Ok((&input[i..], out)),
            '\\' => {
                let (_, escape) = chars.next().ok_or_else(|| fail(input, ErrorKind::Escaped))?;
                match escape {
                    'n' => out.push(b'\n'),
                    't' => out.push(b'\t'),
                    'r' => out.push(b'\r'),
                    '0' => out.push(0),
                    '\\' => out.push(b'\\'),
                    '"' => out.push(b'"'),
                    'x' => {
                        let hi = chars.next().and_then(|(_, d)| d.to_digit(16));
                        let lo = chars.next().and_then(|(_, d)| d.to_digit(16));
                        match (hi, lo) {
                            (Some(hi), Some(lo)) => out.push((hi * 16 + lo) as u8),
                            _ => return Err(fail(input, ErrorKind::HexDigit)),
                        }
                    }
                    _ => return Err(fail(input, ErrorKind::Escaped)),
                }
            }
            c => {
                let mut buf = [0; 4];
                out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            }
        }
    }
    // unterminated
    Err(fail(input, ErrorKind::Char))
}
