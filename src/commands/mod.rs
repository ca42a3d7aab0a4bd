//! Command Handler Module
//!
//! The store side of the RESP conversation: a [`NodeHandler`] receives a
//! parsed command frame, runs it against the node's
//! [`HashStore`](crate::storage::HashStore) and returns the reply frame.
//!
//! ```text
//!  command frame
//!       │
//!       ▼
//! ┌─────────────────┐
//! │  NodeHandler    │  dispatch, argument checks
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │   HashStore     │  (storage module)
//! └─────────────────┘
//! ```

pub mod handler;

pub use handler::NodeHandler;
