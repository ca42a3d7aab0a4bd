//! Error Taxonomy
//!
//! Two error types meet at the adapter boundary:
//!
//! - [`StoreFailure`] is what a store client raises: I/O errors, timeouts,
//!   raw error replies, redirect exhaustion, malformed replies. It is
//!   specific to the client and its transport.
//! - [`HashError`] is the only error callers of the hash adapter and the
//!   scan cursor ever see. It is either an [`HashError::InvalidArgument`]
//!   raised before any store call, or a [`HashError::StoreAccess`] produced
//!   by [`classify`] from a `StoreFailure`.
//!
//! ```text
//!   HashStoreClient ──StoreFailure──> ErrorTranslator ──HashError──> caller
//!                                       (classify)
//! ```
//!
//! Absent keys and fields are never errors; they surface as `None`, `0` or
//! empty collections.

use crate::protocol::ParseError;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Result type for hash adapter and scan cursor operations.
pub type HashResult<T> = Result<T, HashError>;

/// Result type for raw store client calls.
pub type StoreResult<T> = Result<T, StoreFailure>;

/// A raw failure raised by a store client.
#[derive(Debug, Error)]
pub enum StoreFailure {
    /// The connection to the node failed or was lost.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// No reply arrived within the configured deadline.
    #[error("no reply within {0:?}")]
    Timeout(Duration),

    /// The store answered with an error reply (`-ERR ...`, `-MOVED ...`).
    #[error("{0}")]
    ErrorReply(String),

    /// The client followed redirects until it gave up.
    #[error("too many cluster redirections (last: {last})")]
    TooManyRedirects { attempts: u32, last: String },

    /// The reply bytes were not valid RESP.
    #[error("malformed reply: {0}")]
    Protocol(#[from] ParseError),

    /// The reply was valid RESP but not the shape the command produces.
    #[error("unexpected reply to {command}: {detail}")]
    UnexpectedReply { command: &'static str, detail: String },
}

impl StoreFailure {
    pub fn unexpected(command: &'static str, detail: impl Into<String>) -> Self {
        StoreFailure::UnexpectedReply {
            command,
            detail: detail.into(),
        }
    }
}

/// Classification of a store access failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessFailureKind {
    /// Connection refused, reset or otherwise lost.
    Connection,
    /// The store did not answer in time.
    Timeout,
    /// Cluster redirection could not be resolved (MOVED/ASK/TRYAGAIN/CLUSTERDOWN).
    Redirect,
    /// A stored value cannot be read as the number an increment requires.
    TypeMismatch,
    /// The key holds a value of another data type.
    WrongType,
    /// Any other error reply from the store.
    ServerReply,
    /// The reply could not be decoded.
    Protocol,
}

impl fmt::Display for AccessFailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AccessFailureKind::Connection => "connection failure",
            AccessFailureKind::Timeout => "timeout",
            AccessFailureKind::Redirect => "cluster redirect failure",
            AccessFailureKind::TypeMismatch => "type mismatch",
            AccessFailureKind::WrongType => "wrong type",
            AccessFailureKind::ServerReply => "server error",
            AccessFailureKind::Protocol => "protocol error",
        };
        f.write_str(name)
    }
}

/// The normalized error returned by every hash operation.
#[derive(Debug, Error)]
pub enum HashError {
    /// A caller-supplied argument violates the operation's contract. Raised
    /// before any store call.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// The store could not be accessed or rejected the command.
    #[error("{kind}: {message}")]
    StoreAccess {
        kind: AccessFailureKind,
        message: String,
        #[source]
        source: StoreFailure,
    },
}

impl HashError {
    /// Returns the failure kind for store access errors.
    pub fn kind(&self) -> Option<AccessFailureKind> {
        match self {
            HashError::InvalidArgument(_) => None,
            HashError::StoreAccess { kind, .. } => Some(*kind),
        }
    }

    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, HashError::InvalidArgument(_))
    }

    pub fn is_store_access(&self) -> bool {
        matches!(self, HashError::StoreAccess { .. })
    }

    /// True when an increment hit a value that is not a number.
    pub fn is_type_mismatch(&self) -> bool {
        self.kind() == Some(AccessFailureKind::TypeMismatch)
    }
}

/// Maps a raw store failure onto the normalized taxonomy.
///
/// This is the single classification point for every adapter call and every
/// scan page fetch.
pub fn classify(failure: StoreFailure) -> HashError {
    let kind = match &failure {
        StoreFailure::Io(_) => AccessFailureKind::Connection,
        StoreFailure::Timeout(_) => AccessFailureKind::Timeout,
        StoreFailure::TooManyRedirects { .. } => AccessFailureKind::Redirect,
        StoreFailure::ErrorReply(reply) => classify_reply(reply),
        StoreFailure::Protocol(_) | StoreFailure::UnexpectedReply { .. } => {
            AccessFailureKind::Protocol
        }
    };

    HashError::StoreAccess {
        kind,
        message: failure.to_string(),
        source: failure,
    }
}

fn classify_reply(reply: &str) -> AccessFailureKind {
    let class = reply.split_whitespace().next().unwrap_or_default();
    match class {
        "MOVED" | "ASK" | "TRYAGAIN" | "CLUSTERDOWN" => AccessFailureKind::Redirect,
        "WRONGTYPE" => AccessFailureKind::WrongType,
        _ if is_number_parse_reply(reply) => AccessFailureKind::TypeMismatch,
        _ => AccessFailureKind::ServerReply,
    }
}

/// Replies about a stored field value that does not parse as a number.
fn is_number_parse_reply(reply: &str) -> bool {
    let reply = reply.to_ascii_lowercase();
    reply.contains("hash value is not an integer") || reply.contains("hash value is not a float")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;
    use std::io;

    fn kind_of(failure: StoreFailure) -> AccessFailureKind {
        classify(failure).kind().unwrap()
    }

    #[test]
    fn test_transport_failures() {
        let refused = io::Error::new(io::ErrorKind::ConnectionRefused, "refused");
        assert_eq!(kind_of(StoreFailure::Io(refused)), AccessFailureKind::Connection);
        assert_eq!(
            kind_of(StoreFailure::Timeout(Duration::from_millis(200))),
            AccessFailureKind::Timeout
        );
        assert_eq!(
            kind_of(StoreFailure::TooManyRedirects {
                attempts: 5,
                last: "MOVED 3999 127.0.0.1:7001".to_string()
            }),
            AccessFailureKind::Redirect
        );
    }

    #[test]
    fn test_error_replies() {
        let cases = [
            ("MOVED 3999 127.0.0.1:7001", AccessFailureKind::Redirect),
            ("ASK 3999 127.0.0.1:7001", AccessFailureKind::Redirect),
            ("CLUSTERDOWN Hash slot not served", AccessFailureKind::Redirect),
            (
                "WRONGTYPE Operation against a key holding the wrong kind of value",
                AccessFailureKind::WrongType,
            ),
            ("ERR hash value is not an integer", AccessFailureKind::TypeMismatch),
            ("ERR hash value is not a float", AccessFailureKind::TypeMismatch),
            ("ERR value is not a valid float", AccessFailureKind::ServerReply),
            (
                "ERR value is not an integer or out of range",
                AccessFailureKind::ServerReply,
            ),
            ("ERR value is out of range", AccessFailureKind::ServerReply),
            (
                "CROSSSLOT Keys in request don't hash to the same slot",
                AccessFailureKind::ServerReply,
            ),
            ("LOADING Redis is loading the dataset", AccessFailureKind::ServerReply),
            ("ERR unknown command 'HFOO'", AccessFailureKind::ServerReply),
            ("", AccessFailureKind::ServerReply),
        ];

        for (reply, expected) in cases {
            assert_eq!(
                kind_of(StoreFailure::ErrorReply(reply.to_string())),
                expected,
                "reply {reply:?}"
            );
        }
    }

    #[test]
    fn test_decode_failures() {
        assert_eq!(
            kind_of(StoreFailure::Protocol(ParseError::UnknownPrefix(b'@'))),
            AccessFailureKind::Protocol
        );
        assert_eq!(
            kind_of(StoreFailure::unexpected("HLEN", "bulk string")),
            AccessFailureKind::Protocol
        );
    }

    #[test]
    fn test_cause_is_preserved() {
        let err = classify(StoreFailure::ErrorReply(
            "ERR hash value is not an integer".to_string(),
        ));
        assert!(err.is_type_mismatch());
        assert!(err.is_store_access());
        assert_eq!(
            err.to_string(),
            "type mismatch: ERR hash value is not an integer"
        );

        let source = err.source().unwrap();
        assert!(source.downcast_ref::<StoreFailure>().is_some());
    }

    #[test]
    fn test_invalid_argument() {
        let err = HashError::InvalidArgument("Delta must be finite");
        assert!(err.is_invalid_argument());
        assert_eq!(err.kind(), None);
        assert!(err.source().is_none());
    }
}
