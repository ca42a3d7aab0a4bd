//! Storage Module
//!
//! The in-memory store each cluster node owns: a sharded map of string and
//! hash values with HSCAN-style paging over hashes.
//!
//! ## Example
//!
//! ```
//! use flashhash::storage::HashStore;
//! use bytes::Bytes;
//!
//! let store = HashStore::new();
//! let key = Bytes::from("user:1");
//!
//! store.hset(&key, vec![(Bytes::from("name"), Bytes::from("Ariz"))]).unwrap();
//! assert_eq!(store.hlen(&key).unwrap(), 1);
//!
//! // A single page covering the whole hash ends with cursor 0
//! let page = store.hscan(&key, 0, None, 10).unwrap();
//! assert_eq!(page.cursor, 0);
//! assert_eq!(page.entries.len(), 1);
//! ```

pub mod engine;

pub use engine::{
    glob_match, HashStore, ScanPage, StoreError, StoreOpResult, StoreStats, Value,
    DEFAULT_SCAN_COUNT, DEFAULT_SHARDS, MAX_RANDOM_REPEATS,
};
