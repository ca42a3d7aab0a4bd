//! # FlashHash - Cluster Hash Commands with a Resumable Scan Cursor
//!
//! FlashHash is the client-side surface for the hash data type of a
//! clustered, Redis-compatible store. It covers the full hash command family,
//! a lazy HSCAN cursor that walks arbitrarily large hashes one page at a
//! time, and a single error taxonomy for every failure the store or the
//! transport can produce.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                            ClusterConnection                            │
//! │                                                                         │
//! │  ┌─────────────────────┐        ┌──────────────────┐                    │
//! │  │ ClusterHashCommands │───────>│ HashStoreClient  │──> Transport       │
//! │  └──────────┬──────────┘        │   (RespClient)   │   (MemoryCluster)  │
//! │             │ hscan             └────────┬─────────┘                    │
//! │             ▼                            │ StoreFailure                 │
//! │  ┌─────────────────────┐                 ▼                              │
//! │  │   HashScanCursor    │        ┌──────────────────┐                    │
//! │  │  (one page at once) │───────>│ ErrorTranslator  │──> HashError       │
//! │  └─────────────────────┘        │    (classify)    │                    │
//! │                                 └──────────────────┘                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```
//! use flashhash::{MemoryCluster, ScanOptions};
//!
//! let cluster = MemoryCluster::new();
//! let connection = cluster.connect();
//! let hash = connection.hash_commands();
//!
//! hash.hset(b"user:1", b"name", b"Ariz").unwrap();
//! hash.hset(b"user:1", b"lang", b"rust").unwrap();
//!
//! let mut cursor = hash.hscan(b"user:1", &ScanOptions::new().count(1)).unwrap();
//! let mut fields = 0;
//! while let Some((_field, _value)) = cursor.next_entry().unwrap() {
//!     fields += 1;
//! }
//! assert_eq!(fields, 2);
//! ```
//!
//! ## Module Overview
//!
//! - [`hash`]: the command adapter, the scan cursor and scan options
//! - [`error`]: `HashError`, `StoreFailure` and the `classify` function
//! - [`connection`]: the connection that owns the client and the translator
//! - [`client`]: the store client seam and its RESP implementation
//! - [`protocol`]: RESP frames and parser
//! - [`storage`]: the sharded in-memory store each node runs
//! - [`commands`]: the store-side command dispatcher
//! - [`cluster`]: several nodes in one process behind a `Transport`
//!
//! ## Design Highlights
//!
//! ### Bounded Scans
//!
//! A scan cursor holds at most one page of entries. Pages are fetched only
//! when the previous one is drained, so memory use does not grow with the
//! size of the hash.
//!
//! ### Unsigned Cursors
//!
//! Cursor tokens are carried as `u64` and rendered as unsigned decimal text.
//! The in-memory store deliberately hands out tokens above `i64::MAX`.
//!
//! ### One Error Vocabulary
//!
//! Every failure from every command and every page fetch goes through the
//! connection's translator and surfaces as a [`HashError`].

pub mod client;
pub mod cluster;
pub mod commands;
pub mod connection;
pub mod error;
pub mod hash;
pub mod protocol;
pub mod storage;

// Re-export commonly used types for convenience
pub use client::{HashStoreClient, RespClient, Transport};
pub use cluster::{ClusterConfig, MemoryCluster};
pub use connection::{ClusterConnection, DefaultTranslator, ErrorTranslator};
pub use error::{classify, AccessFailureKind, HashError, HashResult, StoreFailure, StoreResult};
pub use hash::{
    ClusterHashCommands, CursorId, CursorState, HashScanCursor, ScanIteration, ScanOptions,
    ScanParams,
};
pub use protocol::{ParseError, RespParser, RespValue};
pub use storage::HashStore;

/// Version of FlashHash
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
