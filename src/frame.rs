// https://redis.io/docs/reference/protocol-spec

use std::fmt;

use bytes::{Buf, Bytes};
use std::io::Cursor;
use thiserror::Error as ThisError;

static CRLF: &[u8; 2] = b"\r\n";

/// Largest bulk argument a client may send.
pub const MAX_BULK_LEN: i64 = 1024 * 1024 * 1024;

#[derive(Debug, ThisError, PartialEq)]
pub enum Error {
    #[error("not enough data is available to parse an entire frame")]
    Incomplete,
    /// The request is malformed. The bytes read so far belong to the broken request and are
    /// discarded, the connection itself stays usable.
    #[error("Protocol error: {0}")]
    Protocol(String),
}

#[derive(Clone, Debug, PartialEq)]
pub enum Frame {
    Simple(String),
    Error(String),
    Integer(i64),
    Bulk(Bytes),
    /// `$-1`, the null bulk string.
    Null,
    /// `*-1`, the null array.
    NullArray,
    Array(Vec<Frame>),
}

impl Frame {
    pub fn ok() -> Frame {
        Frame::Simple("OK".to_string())
    }

    pub fn boolean(value: bool) -> Frame {
        Frame::Integer(value as i64)
    }

    pub fn bulk_or_null(value: Option<Bytes>) -> Frame {
        value.map_or(Frame::Null, Frame::Bulk)
    }

    pub fn double(value: f64) -> Frame {
        Frame::Bulk(Bytes::from(format_double(value)))
    }

    pub fn bulk_array<I>(values: I) -> Frame
    where
        I: IntoIterator<Item = Bytes>,
    {
        Frame::Array(values.into_iter().map(Frame::Bulk).collect())
    }

    /// Parses one client request.
    ///
    /// Requests come in two shapes, told apart by the first byte of the line:
    ///
    /// * `*<n>\r\n` followed by `n` bulk strings (`$<len>\r\n<bytes>\r\n`).
    /// * An inline line, `<cmd> <arg> <arg>\r\n`, split on runs of spaces.
    ///
    /// Both are returned as a `Frame::Array` of `Frame::Bulk`. An empty array means there is
    /// no command to run. When the buffer holds only part of a request `Error::Incomplete` is
    /// returned and the caller must retry from the same starting position once more bytes
    /// arrive.
    pub fn parse_request(src: &mut Cursor<&[u8]>) -> Result<Frame, Error> {
        let line = get_line(src)?;

        if line.first() != Some(&b'*') {
            return Ok(parse_inline(line));
        }

        let count = parse_decimal(&line[1..])
            .ok_or_else(|| Error::Protocol("invalid multibulk length".to_string()))?;

        if count <= 0 {
            return Ok(Frame::Array(vec![]));
        }

        let mut parts = Vec::with_capacity(count.min(1024) as usize);
        for index in 0..count {
            let header = get_line(src)?;
            let length = match header.strip_prefix(b"$") {
                Some(length) => parse_bulk_length(length),
                None => {
                    skip_elements(src, count - index - 1)?;
                    return Err(Error::Protocol("multi bulk protocol error".to_string()));
                }
            };

            let Some(length) = length else {
                skip_elements(src, count - index - 1)?;
                return Err(Error::Protocol("invalid bulk write count".to_string()));
            };

            let data = get_exact(src, length as usize)?;
            // The bulk payload is always followed by CRLF.
            get_exact(src, CRLF.len())?;

            parts.push(Frame::Bulk(Bytes::copy_from_slice(data)));
        }

        Ok(Frame::Array(parts))
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        self.write_to(&mut bytes);
        bytes
    }

    fn write_to(&self, bytes: &mut Vec<u8>) {
        match self {
            Frame::Simple(s) => {
                bytes.push(b'+');
                bytes.extend_from_slice(s.as_bytes());
                bytes.extend_from_slice(CRLF);
            }
            Frame::Error(s) => {
                bytes.push(b'-');
                bytes.extend_from_slice(s.as_bytes());
                bytes.extend_from_slice(CRLF);
            }
            Frame::Integer(i) => {
                bytes.push(b':');
                bytes.extend_from_slice(i.to_string().as_bytes());
                bytes.extend_from_slice(CRLF);
            }
            Frame::Bulk(data) => {
                bytes.push(b'$');
                bytes.extend_from_slice(data.len().to_string().as_bytes());
                bytes.extend_from_slice(CRLF);
                bytes.extend_from_slice(data);
                bytes.extend_from_slice(CRLF);
            }
            Frame::Null => bytes.extend_from_slice(b"$-1\r\n"),
            Frame::NullArray => bytes.extend_from_slice(b"*-1\r\n"),
            Frame::Array(arr) => {
                bytes.push(b'*');
                bytes.extend_from_slice(arr.len().to_string().as_bytes());
                bytes.extend_from_slice(CRLF);
                for frame in arr {
                    frame.write_to(bytes);
                }
            }
        }
    }
}

impl From<Frame> for Vec<u8> {
    fn from(frame: Frame) -> Self {
        frame.serialize()
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Frame::Simple(s) => write!(f, "+{}", s),
            Frame::Error(s) => write!(f, "-{}", s),
            Frame::Integer(i) => write!(f, ":{}", i),
            Frame::Bulk(bytes) => write!(f, "${}", String::from_utf8_lossy(bytes)),
            Frame::Null => write!(f, "$-1"),
            Frame::NullArray => write!(f, "*-1"),
            Frame::Array(arr) => {
                write!(f, "*{}", arr.len())?;
                for frame in arr {
                    write!(f, " {}", frame)?;
                }
                Ok(())
            }
        }
    }
}

/// Renders a score the way it travels over the wire: rounded to 16 significant digits, with
/// no trailing zeros.
pub fn format_double(value: f64) -> String {
    if !value.is_finite() {
        return if value.is_nan() {
            "nan".to_string()
        } else if value > 0.0 {
            "inf".to_string()
        } else {
            "-inf".to_string()
        };
    }

    // `{:e}` with 15 fractional digits yields exactly 16 significant ones. Parsing it back
    // and printing with `Display` drops the noise digits binary floats carry.
    let rounded: f64 = format!("{:.15e}", value).parse().unwrap_or(value);
    if rounded == 0.0 {
        return "0".to_string();
    }
    format!("{}", rounded)
}

fn parse_inline(line: &[u8]) -> Frame {
    let parts = line
        .split(|b| *b == b' ')
        .filter(|part| !part.is_empty())
        .map(|part| Frame::Bulk(Bytes::copy_from_slice(part)))
        .collect();

    Frame::Array(parts)
}

fn parse_decimal(bytes: &[u8]) -> Option<i64> {
    std::str::from_utf8(bytes).ok()?.trim().parse::<i64>().ok()
}

fn parse_bulk_length(bytes: &[u8]) -> Option<i64> {
    parse_decimal(bytes).filter(|len| (0..=MAX_BULK_LEN).contains(len))
}

/// Steps over the `n` elements still declared by a request that turned out to be malformed,
/// so they are not read back as requests of their own. A well formed bulk header takes its
/// payload along, any other line counts as a whole element.
fn skip_elements(src: &mut Cursor<&[u8]>, n: i64) -> Result<(), Error> {
    for _ in 0..n {
        let header = get_line(src)?;
        if let Some(length) = header.strip_prefix(b"$").and_then(parse_bulk_length) {
            get_exact(src, length as usize + CRLF.len())?;
        }
    }

    Ok(())
}

/// Reads up to the next CRLF, leaving the cursor right after it.
fn get_line<'a>(src: &mut Cursor<&'a [u8]>) -> Result<&'a [u8], Error> {
    let start = src.position() as usize;
    let buf: &'a [u8] = *src.get_ref();

    let end = buf[start..]
        .windows(2)
        .position(|window| window == CRLF)
        .map(|index| start + index)
        .ok_or(Error::Incomplete)?;

    src.set_position((end + CRLF.len()) as u64);

    Ok(&buf[start..end])
}

fn get_exact<'a>(src: &mut Cursor<&'a [u8]>, n: usize) -> Result<&'a [u8], Error> {
    if src.remaining() < n {
        return Err(Error::Incomplete);
    }

    let start = src.position() as usize;
    let buf: &'a [u8] = *src.get_ref();
    src.advance(n);

    Ok(&buf[start..start + n])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bulk(s: &str) -> Frame {
        Frame::Bulk(Bytes::from(s.to_string()))
    }

    fn parse(data: &[u8]) -> (Result<Frame, Error>, u64) {
        let mut cursor = Cursor::new(data);
        let frame = Frame::parse_request(&mut cursor);
        (frame, cursor.position())
    }

    #[test]
    fn parse_inline_command() {
        let (frame, position) = parse(b"SET foo bar\r\n");

        assert_eq!(
            frame,
            Ok(Frame::Array(vec![bulk("SET"), bulk("foo"), bulk("bar")]))
        );
        assert_eq!(position, 13);
    }

    #[test]
    fn parse_inline_command_collapses_spaces() {
        let (frame, _) = parse(b"  GET   foo \r\n");

        assert_eq!(frame, Ok(Frame::Array(vec![bulk("GET"), bulk("foo")])));
    }

    #[test]
    fn parse_inline_empty_line() {
        let (frame, _) = parse(b"\r\n");

        assert_eq!(frame, Ok(Frame::Array(vec![])));
    }

    #[test]
    fn parse_array_command() {
        let (frame, _) = parse(b"*2\r\n$5\r\nhello\r\n$5\r\nworld\r\n");

        assert_eq!(frame, Ok(Frame::Array(vec![bulk("hello"), bulk("world")])));
    }

    #[test]
    fn parse_array_binary_payload() {
        let (frame, _) = parse(b"*1\r\n$4\r\na\r\nb\r\n");

        assert_eq!(frame, Ok(Frame::Array(vec![bulk("a\r\nb")])));
    }

    #[test]
    fn parse_array_empty_bulk() {
        let (frame, _) = parse(b"*1\r\n$0\r\n\r\n");

        assert_eq!(frame, Ok(Frame::Array(vec![bulk("")])));
    }

    #[test]
    fn parse_array_non_positive_count_is_no_command() {
        assert_eq!(parse(b"*0\r\n").0, Ok(Frame::Array(vec![])));
        assert_eq!(parse(b"*-1\r\n").0, Ok(Frame::Array(vec![])));
    }

    #[test]
    fn parse_incomplete_frames() {
        let data = b"*3\r\n$3\r\nSET\r\n$5\r\nmykey\r\n$7\r\nmyvalue\r\n";

        for cut in 0..data.len() {
            let (frame, _) = parse(&data[..cut]);
            assert_eq!(frame, Err(Error::Incomplete), "cut at {}", cut);
        }

        assert!(parse(data).0.is_ok());
    }

    #[test]
    fn parse_missing_bulk_prefix() {
        let (frame, position) = parse(b"*1\r\n:5\r\nhello\r\n");

        assert_eq!(
            frame,
            Err(Error::Protocol("multi bulk protocol error".to_string()))
        );
        // Only the offending header is consumed.
        assert_eq!(position, 8);
    }

    #[test]
    fn parse_invalid_bulk_length() {
        let (frame, _) = parse(b"*1\r\n$-5\r\n");
        assert_eq!(
            frame,
            Err(Error::Protocol("invalid bulk write count".to_string()))
        );

        let (frame, _) = parse(b"*1\r\n$2000000000\r\n");
        assert_eq!(
            frame,
            Err(Error::Protocol("invalid bulk write count".to_string()))
        );

        let (frame, _) = parse(b"*1\r\n$abc\r\n");
        assert_eq!(
            frame,
            Err(Error::Protocol("invalid bulk write count".to_string()))
        );
    }

    #[test]
    fn parse_malformed_element_skips_rest_of_request() {
        let data = b"*3\r\n$3\r\nDEL\r\n:8\r\n$8\r\nFLUSHALL\r\nPING\r\n";
        let (frame, position) = parse(data);

        assert_eq!(
            frame,
            Err(Error::Protocol("multi bulk protocol error".to_string()))
        );
        // Only the trailing PING is left for the next request.
        assert_eq!(position as usize, data.len() - b"PING\r\n".len());

        let data = b"*3\r\n$x\r\n+OK\r\n$3\r\nDEL\r\n";
        let (frame, position) = parse(data);

        assert_eq!(
            frame,
            Err(Error::Protocol("invalid bulk write count".to_string()))
        );
        assert_eq!(position as usize, data.len());
    }

    #[test]
    fn parse_malformed_element_waits_for_rest_of_request() {
        let (frame, _) = parse(b"*3\r\n$3\r\nDEL\r\n:8\r\n$8\r\nFLUSH");

        assert_eq!(frame, Err(Error::Incomplete));
    }

    #[test]
    fn parse_invalid_multibulk_length() {
        let (frame, _) = parse(b"*x\r\n");

        assert_eq!(
            frame,
            Err(Error::Protocol("invalid multibulk length".to_string()))
        );
    }

    #[test]
    fn serialize_replies() {
        assert_eq!(Frame::ok().serialize(), b"+OK\r\n");
        assert_eq!(
            Frame::Error("ERR unknown command".to_string()).serialize(),
            b"-ERR unknown command\r\n"
        );
        assert_eq!(Frame::Integer(-42).serialize(), b":-42\r\n");
        assert_eq!(bulk("foobar").serialize(), b"$6\r\nfoobar\r\n");
        assert_eq!(Frame::Null.serialize(), b"$-1\r\n");
        assert_eq!(Frame::NullArray.serialize(), b"*-1\r\n");
    }

    #[test]
    fn serialize_nested_array() {
        let frame = Frame::Array(vec![
            bulk("a"),
            Frame::Integer(1),
            Frame::Null,
            Frame::Array(vec![]),
        ]);

        assert_eq!(frame.serialize(), b"*4\r\n$1\r\na\r\n:1\r\n$-1\r\n*0\r\n");
    }

    #[test]
    fn double_formatting() {
        assert_eq!(format_double(6.0), "6");
        assert_eq!(format_double(-2.5), "-2.5");
        assert_eq!(format_double(0.1), "0.1");
        assert_eq!(format_double(0.1 + 0.2), "0.3");
        assert_eq!(format_double(1.0 / 3.0), "0.3333333333333333");
        assert_eq!(format_double(-0.0), "0");
        assert_eq!(format_double(f64::INFINITY), "inf");
        assert_eq!(format_double(f64::NEG_INFINITY), "-inf");
    }
}
