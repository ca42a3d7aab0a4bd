//! Hash Commands
//!
//! The client-side surface for the hash data type:
//!
//! - [`commands`] - one adapter method per hash command
//! - [`cursor`] - the resumable HSCAN cursor
//! - [`options`] - scan options and their wire parameters

pub mod commands;
pub mod cursor;
pub mod options;

pub use commands::ClusterHashCommands;
pub use cursor::{CursorId, CursorState, HashScanCursor, ScanIteration};
pub use options::{ScanOptions, ScanParams};
