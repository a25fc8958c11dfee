//! Wire protocol for cellstore
//!
//! Requests are RESP arrays of bulk strings, or inline text lines such as
//! `SET key value\r\n` for hand-typed sessions. Responses are RESP2 frames.
//! Both directions are parsed with nom's streaming combinators, so a frame
//! split across reads reports "incomplete" instead of failing, and several
//! pipelined frames can sit in one buffer.

use crate::error::{CellStoreError, Result};
use nom::{
    branch::alt,
    bytes::streaming::{tag, take, take_until},
    character::streaming::{char, crlf, digit1, not_line_ending},
    combinator::{map, map_res, opt, recognize},
    error::{Error, ErrorKind},
    multi::count,
    sequence::{delimited, pair, preceded, terminated},
    IResult,
};
use std::fmt;
use std::str;

/// Largest accepted bulk string
pub const MAX_BULK_LEN: usize = 512 * 1024 * 1024;
/// Largest accepted number of elements in one array frame
pub const MAX_ARRAY_LEN: usize = 1024 * 1024;
/// Longest inline command line accepted without a newline
pub const MAX_INLINE_LEN: usize = 64 * 1024;

/// Response types from the server
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    Ok,
    Simple(String),
    Bulk(Vec<u8>),
    Integer(i64),
    Array(Vec<Response>),
    /// Field/value pairs; sent as a flat array
    Map(Vec<(Vec<u8>, Vec<u8>)>),
    Null,
    Error(String),
}

impl Response {
    /// Serialize response to bytes for network transmission
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.write_to(&mut out);
        out
    }

    /// Append the RESP encoding of this response to `out`
    pub fn write_to(&self, out: &mut Vec<u8>) {
        match self {
            Response::Ok => out.extend_from_slice(b"+OK\r\n"),
            Response::Simple(s) => write_line(out, b'+', s),
            Response::Error(e) => write_line(out, b'-', e),
            Response::Integer(n) => out.extend_from_slice(format!(":{}\r\n", n).as_bytes()),
            Response::Bulk(data) => write_bulk(out, data),
            Response::Null => out.extend_from_slice(b"$-1\r\n"),
            Response::Array(items) => {
                out.extend_from_slice(format!("*{}\r\n", items.len()).as_bytes());
                for item in items {
                    item.write_to(out);
                }
            }
            Response::Map(pairs) => {
                out.extend_from_slice(format!("*{}\r\n", pairs.len() * 2).as_bytes());
                for (field, value) in pairs {
                    write_bulk(out, field);
                    write_bulk(out, value);
                }
            }
        }
    }

    /// Bulk array from a list of byte strings
    pub fn bulk_array(items: Vec<Vec<u8>>) -> Response {
        Response::Array(items.into_iter().map(Response::Bulk).collect())
    }

    /// Bulk for `Some`, null for `None`
    pub fn bulk_or_null(value: Option<Vec<u8>>) -> Response {
        value.map_or(Response::Null, Response::Bulk)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Response::Error(_))
    }
}

impl From<&CellStoreError> for Response {
    fn from(err: &CellStoreError) -> Self {
        Response::Error(err.to_string())
    }
}

impl From<CellStoreError> for Response {
    fn from(err: CellStoreError) -> Self {
        Response::from(&err)
    }
}

/// Human-readable rendering used by the CLI
impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Response::Ok => write!(f, "OK"),
            Response::Simple(s) => write!(f, "{}", s),
            Response::Error(e) => write!(f, "(error) {}", e),
            Response::Integer(n) => write!(f, "(integer) {}", n),
            Response::Bulk(data) => write!(f, "\"{}\"", String::from_utf8_lossy(data)),
            Response::Null => write!(f, "(nil)"),
            Response::Array(items) if items.is_empty() => write!(f, "(empty array)"),
            Response::Array(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        writeln!(f)?;
                    }
                    write!(f, "{}) {}", i + 1, item)?;
                }
                Ok(())
            }
            Response::Map(pairs) if pairs.is_empty() => write!(f, "(empty array)"),
            Response::Map(pairs) => {
                for (i, (field, value)) in pairs.iter().enumerate() {
                    if i > 0 {
                        writeln!(f)?;
                    }
                    write!(
                        f,
                        "{}) \"{}\"\n{}) \"{}\"",
                        i * 2 + 1,
                        String::from_utf8_lossy(field),
                        i * 2 + 2,
                        String::from_utf8_lossy(value)
                    )?;
                }
                Ok(())
            }
        }
    }
}

fn write_line(out: &mut Vec<u8>, marker: u8, text: &str) {
    out.push(marker);
    out.extend(text.bytes().map(|c| if c == b'\r' || c == b'\n' { b' ' } else { c }));
    out.extend_from_slice(b"\r\n");
}

fn write_bulk(out: &mut Vec<u8>, data: &[u8]) {
    out.extend_from_slice(format!("${}\r\n", data.len()).as_bytes());
    out.extend_from_slice(data);
    out.extend_from_slice(b"\r\n");
}

/// Encode a command as a RESP array of bulk strings
pub fn encode_request<A: AsRef<[u8]>>(args: &[A]) -> Vec<u8> {
    let mut out = format!("*{}\r\n", args.len()).into_bytes();
    for arg in args {
        write_bulk(&mut out, arg.as_ref());
    }
    out
}

/// Parse one request from the front of `input`.
///
/// Returns the argument list and the number of bytes it occupied, or
/// `None` when more input is needed. An empty argument list means a blank
/// line or `*0` frame that should be skipped.
pub fn parse_request(input: &[u8]) -> Result<Option<(Vec<Vec<u8>>, usize)>> {
    let Some(&first) = input.first() else {
        return Ok(None);
    };
    let parsed = if first == b'*' {
        array_request(input)
    } else {
        inline_request(input)
    };

    match parsed {
        Ok((rest, args)) => Ok(Some((args, input.len() - rest.len()))),
        Err(nom::Err::Incomplete(_)) if first != b'*' && input.len() > MAX_INLINE_LEN => Err(
            CellStoreError::Protocol("too big inline request".to_string()),
        ),
        Err(nom::Err::Incomplete(_)) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Parse one response from the front of `input`; `None` if incomplete
pub fn parse_response(input: &[u8]) -> Result<Option<(Response, usize)>> {
    match response(input) {
        Ok((rest, resp)) => Ok(Some((resp, input.len() - rest.len()))),
        Err(nom::Err::Incomplete(_)) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn too_large(input: &[u8]) -> nom::Err<Error<&[u8]>> {
    nom::Err::Failure(Error::new(input, ErrorKind::TooLarge))
}

/// Unsigned decimal length
fn length(input: &[u8]) -> IResult<&[u8], usize> {
    map_res(digit1, |digits: &[u8]| {
        str::from_utf8(digits)
            .map_err(|_| ())
            .and_then(|s| s.parse::<usize>().map_err(|_| ()))
    })(input)
}

/// Signed decimal integer
fn signed(input: &[u8]) -> IResult<&[u8], i64> {
    map_res(recognize(pair(opt(char('-')), digit1)), |digits: &[u8]| {
        str::from_utf8(digits)
            .map_err(|_| ())
            .and_then(|s| s.parse::<i64>().map_err(|_| ()))
    })(input)
}

/// `$<len>\r\n<bytes>\r\n`
fn bulk_arg(input: &[u8]) -> IResult<&[u8], Vec<u8>> {
    let (input, len) = delimited(tag("$"), length, crlf)(input)?;
    if len > MAX_BULK_LEN {
        return Err(too_large(input));
    }
    map(terminated(take(len), crlf), <[u8]>::to_vec)(input)
}

/// `*<n>\r\n` followed by `n` bulk strings
fn array_request(input: &[u8]) -> IResult<&[u8], Vec<Vec<u8>>> {
    let (input, n) = delimited(tag("*"), length, crlf)(input)?;
    if n > MAX_ARRAY_LEN {
        return Err(too_large(input));
    }
    count(bulk_arg, n)(input)
}

/// Whitespace separated words terminated by `\n` (optionally `\r\n`)
fn inline_request(input: &[u8]) -> IResult<&[u8], Vec<Vec<u8>>> {
    map(terminated(take_until("\n"), tag("\n")), |line: &[u8]| {
        line.split(|c| c.is_ascii_whitespace())
            .filter(|word| !word.is_empty())
            .map(<[u8]>::to_vec)
            .collect()
    })(input)
}

fn text_line(input: &[u8]) -> IResult<&[u8], String> {
    map(terminated(not_line_ending, crlf), |line: &[u8]| {
        String::from_utf8_lossy(line).into_owned()
    })(input)
}

fn simple_response(input: &[u8]) -> IResult<&[u8], Response> {
    map(preceded(tag("+"), text_line), |line| {
        if line == "OK" {
            Response::Ok
        } else {
            Response::Simple(line)
        }
    })(input)
}

fn error_response(input: &[u8]) -> IResult<&[u8], Response> {
    map(preceded(tag("-"), text_line), Response::Error)(input)
}

fn integer_response(input: &[u8]) -> IResult<&[u8], Response> {
    map(delimited(tag(":"), signed, crlf), Response::Integer)(input)
}

fn bulk_response(input: &[u8]) -> IResult<&[u8], Response> {
    let (input, len) = delimited(tag("$"), signed, crlf)(input)?;
    match usize::try_from(len) {
        Err(_) if len == -1 => Ok((input, Response::Null)),
        Err(_) => Err(nom::Err::Failure(Error::new(input, ErrorKind::Digit))),
        Ok(len) if len > MAX_BULK_LEN => Err(too_large(input)),
        Ok(len) => map(terminated(take(len), crlf), |data: &[u8]| {
            Response::Bulk(data.to_vec())
        })(input),
    }
}

fn array_response(input: &[u8]) -> IResult<&[u8], Response> {
    let (input, n) = delimited(tag("*"), signed, crlf)(input)?;
    match usize::try_from(n) {
        Err(_) if n == -1 => Ok((input, Response::Null)),
        Err(_) => Err(nom::Err::Failure(Error::new(input, ErrorKind::Digit))),
        Ok(n) if n > MAX_ARRAY_LEN => Err(too_large(input)),
        Ok(n) => map(count(response, n), Response::Array)(input),
    }
}

fn response(input: &[u8]) -> IResult<&[u8], Response> {
    alt((
        simple_response,
        error_response,
        integer_response,
        bulk_response,
        array_response,
    ))(input)
}
