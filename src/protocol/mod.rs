//! RESP Protocol Implementation
//!
//! Hash commands and their replies are exchanged as RESP2 frames. The
//! client encodes each command as an array of bulk strings and decodes the
//! reply frame; the in-process store does the reverse.
//!
//! ## Modules
//!
//! - `types`: the `RespValue` frame and its serialization
//! - `parser`: incremental parser for incoming frames
//!
//! ## Example
//!
//! ```
//! use flashhash::protocol::{decode_frame, RespValue};
//!
//! let cmd = RespValue::command("HGET", [&b"user:1"[..], &b"name"[..]]);
//! let wire = cmd.serialize();
//! assert_eq!(decode_frame(&wire).unwrap(), cmd);
//! ```

pub mod parser;
pub mod types;

pub use parser::{decode_frame, parse_message, ParseError, ParseResult, RespParser};
pub use types::RespValue;
