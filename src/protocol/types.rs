//! RESP (Redis Serialization Protocol) Frames
//!
//! Every hash command travels as a RESP array of bulk strings, and every
//! reply comes back as one of the frame types below. The same type is used
//! on both sides of a transport: the client builds commands and decodes
//! replies, the store decodes commands and builds replies.
//!
//! ## Protocol Format
//!
//! Each RESP type starts with a type prefix byte:
//! - `+` Simple String
//! - `-` Error
//! - `:` Integer
//! - `$` Bulk String
//! - `*` Array
//!
//! All types are terminated with CRLF (`\r\n`).
//!
//! ## Examples
//!
//! Command: `*3\r\n$4\r\nHGET\r\n$1\r\nh\r\n$1\r\na\r\n`
//! Scan reply: `*2\r\n$2\r\n17\r\n*2\r\n$1\r\na\r\n$1\r\n1\r\n`
//! Null Bulk String: `$-1\r\n`

use bytes::Bytes;
use std::fmt;

/// The CRLF terminator used in RESP protocol
pub const CRLF: &[u8] = b"\r\n";

/// RESP protocol type prefixes
pub mod prefix {
    pub const SIMPLE_STRING: u8 = b'+';
    pub const ERROR: u8 = b'-';
    pub const INTEGER: u8 = b':';
    pub const BULK_STRING: u8 = b'$';
    pub const ARRAY: u8 = b'*';
}

/// A single RESP frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RespValue {
    /// Non-binary-safe status line, e.g. `+OK`.
    SimpleString(String),

    /// Error reply. The first word is the error class (`ERR`, `WRONGTYPE`,
    /// `MOVED`, ...).
    Error(String),

    /// 64-bit signed integer.
    Integer(i64),

    /// Binary-safe string.
    BulkString(Bytes),

    /// Null bulk string (`$-1`) or null array (`*-1`).
    Null,

    /// Array of frames, possibly nested.
    Array(Vec<RespValue>),
}

impl RespValue {
    pub fn simple_string(s: impl Into<String>) -> Self {
        RespValue::SimpleString(s.into())
    }

    pub fn error(s: impl Into<String>) -> Self {
        RespValue::Error(s.into())
    }

    pub fn integer(n: i64) -> Self {
        RespValue::Integer(n)
    }

    pub fn bulk_string(data: impl Into<Bytes>) -> Self {
        RespValue::BulkString(data.into())
    }

    pub fn null() -> Self {
        RespValue::Null
    }

    pub fn array(values: Vec<RespValue>) -> Self {
        RespValue::Array(values)
    }

    /// `+OK`
    pub fn ok() -> Self {
        Self::simple_string("OK")
    }

    /// Builds a command frame: an array of bulk strings starting with the
    /// command name.
    ///
    /// ```
    /// use flashhash::protocol::RespValue;
    ///
    /// let cmd = RespValue::command("HLEN", [&b"user:1"[..]]);
    /// assert_eq!(cmd.serialize(), b"*2\r\n$4\r\nHLEN\r\n$6\r\nuser:1\r\n");
    /// ```
    pub fn command<I, A>(name: &'static str, args: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: AsRef<[u8]>,
    {
        let mut frames = vec![RespValue::BulkString(Bytes::from_static(name.as_bytes()))];
        frames.extend(
            args.into_iter()
                .map(|a| RespValue::BulkString(Bytes::copy_from_slice(a.as_ref()))),
        );
        RespValue::Array(frames)
    }

    /// Flattens `(field, value)` pairs into the alternating array layout used
    /// by HGETALL, HSCAN and HRANDFIELD ... WITHVALUES.
    pub fn flat_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (Bytes, Bytes)>,
    {
        let mut frames = Vec::new();
        for (field, value) in pairs {
            frames.push(RespValue::BulkString(field));
            frames.push(RespValue::BulkString(value));
        }
        RespValue::Array(frames)
    }

    /// Serializes the frame to its wire representation.
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.serialize_into(&mut buf);
        buf
    }

    /// Serializes the frame into an existing buffer.
    pub fn serialize_into(&self, buf: &mut Vec<u8>) {
        match self {
            RespValue::SimpleString(s) => {
                buf.push(prefix::SIMPLE_STRING);
                buf.extend_from_slice(s.as_bytes());
                buf.extend_from_slice(CRLF);
            }
            RespValue::Error(s) => {
                buf.push(prefix::ERROR);
                buf.extend_from_slice(s.as_bytes());
                buf.extend_from_slice(CRLF);
            }
            RespValue::Integer(n) => {
                buf.push(prefix::INTEGER);
                buf.extend_from_slice(n.to_string().as_bytes());
                buf.extend_from_slice(CRLF);
            }
            RespValue::BulkString(data) => {
                buf.push(prefix::BULK_STRING);
                buf.extend_from_slice(data.len().to_string().as_bytes());
                buf.extend_from_slice(CRLF);
                buf.extend_from_slice(data);
                buf.extend_from_slice(CRLF);
            }
            RespValue::Null => {
                buf.push(prefix::BULK_STRING);
                buf.extend_from_slice(b"-1");
                buf.extend_from_slice(CRLF);
            }
            RespValue::Array(values) => {
                buf.push(prefix::ARRAY);
                buf.extend_from_slice(values.len().to_string().as_bytes());
                buf.extend_from_slice(CRLF);
                for value in values {
                    value.serialize_into(buf);
                }
            }
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, RespValue::Null)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, RespValue::Error(_))
    }

    /// Borrows the payload of a bulk or simple string.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            RespValue::BulkString(b) => Some(b),
            RespValue::SimpleString(s) => Some(s.as_bytes()),
            _ => None,
        }
    }

    /// Takes the payload of a bulk or simple string.
    pub fn into_bytes(self) -> Option<Bytes> {
        match self {
            RespValue::BulkString(b) => Some(b),
            RespValue::SimpleString(s) => Some(Bytes::from(s)),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            RespValue::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// Short type name used in protocol error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            RespValue::SimpleString(_) => "simple string",
            RespValue::Error(_) => "error",
            RespValue::Integer(_) => "integer",
            RespValue::BulkString(_) => "bulk string",
            RespValue::Null => "null",
            RespValue::Array(_) => "array",
        }
    }
}

impl fmt::Display for RespValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RespValue::SimpleString(s) => write!(f, "\"{}\"", s),
            RespValue::Error(s) => write!(f, "(error) {}", s),
            RespValue::Integer(n) => write!(f, "(integer) {}", n),
            RespValue::BulkString(data) => match std::str::from_utf8(data) {
                Ok(s) => write!(f, "\"{}\"", s),
                Err(_) => write!(f, "(binary data, {} bytes)", data.len()),
            },
            RespValue::Null => write!(f, "(nil)"),
            RespValue::Array(values) if values.is_empty() => write!(f, "(empty array)"),
            RespValue::Array(values) => {
                writeln!(f)?;
                for (i, v) in values.iter().enumerate() {
                    writeln!(f, "{}) {}", i + 1, v)?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_frame() {
        let cmd = RespValue::command("HGET", [&b"h"[..], &b"a"[..]]);
        assert_eq!(cmd.serialize(), b"*3\r\n$4\r\nHGET\r\n$1\r\nh\r\n$1\r\na\r\n");
    }

    #[test]
    fn test_command_without_args() {
        let cmd = RespValue::command("PING", Vec::<Bytes>::new());
        assert_eq!(cmd.serialize(), b"*1\r\n$4\r\nPING\r\n");
    }

    #[test]
    fn test_flat_pairs() {
        let value = RespValue::flat_pairs(vec![(Bytes::from("a"), Bytes::from("1"))]);
        assert_eq!(value.serialize(), b"*2\r\n$1\r\na\r\n$1\r\n1\r\n");
    }

    #[test]
    fn test_error_serialize() {
        let value = RespValue::error("ERR hash value is not an integer");
        assert_eq!(value.serialize(), b"-ERR hash value is not an integer\r\n");
    }

    #[test]
    fn test_null_serialize() {
        assert_eq!(RespValue::null().serialize(), b"$-1\r\n");
    }

    #[test]
    fn test_scan_reply_serialize() {
        let value = RespValue::array(vec![
            RespValue::bulk_string(Bytes::from("17")),
            RespValue::flat_pairs(vec![(Bytes::from("a"), Bytes::from("1"))]),
        ]);
        assert_eq!(
            value.serialize(),
            b"*2\r\n$2\r\n17\r\n*2\r\n$1\r\na\r\n$1\r\n1\r\n"
        );
    }

    #[test]
    fn test_accessors() {
        assert_eq!(RespValue::ok().as_bytes(), Some(&b"OK"[..]));
        assert_eq!(RespValue::integer(3).as_integer(), Some(3));
        assert_eq!(RespValue::null().into_bytes(), None);
        assert_eq!(RespValue::Null.kind(), "null");
    }
}
