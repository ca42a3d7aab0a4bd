//! Resumable HSCAN Cursor
//!
//! [`HashScanCursor`] presents every field of one hash as a lazy sequence of
//! `(field, value)` entries while the store hands them out one page at a
//! time. Only the current page is held in memory.
//!
//! ## State Machine
//!
//! ```text
//!   Ready(cursor = 0)
//!        │ pull
//!        ▼
//!   fetch page ──error──> Failed
//!        │
//!        ▼
//!   HasBatch(entries, next cursor) ──pull──> yield buffered entry
//!        │ batch drained
//!        ├── next cursor != 0 ──> fetch page
//!        └── next cursor == 0 ──> Exhausted
//! ```
//!
//! A page may be empty while its next cursor is non-zero (the store did its
//! COUNT worth of work and the MATCH filter dropped everything); the cursor
//! simply fetches again. `Exhausted` and `Failed` are terminal: further pulls
//! return `Ok(None)` without touching the store.
//!
//! ## Cursor Tokens
//!
//! The store sends cursors as decimal text of an unsigned 64-bit integer.
//! [`CursorId`] parses and renders that text losslessly over the whole `u64`
//! range; tokens above `i64::MAX` are common on large hashes.

use crate::client::HashStoreClient;
use crate::connection::ErrorTranslator;
use crate::error::{HashResult, StoreFailure};
use crate::hash::options::ScanParams;
use crate::protocol::ParseError;
use bytes::Bytes;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

/// An opaque HSCAN cursor token. `0` starts a scan and, when returned by the
/// store, ends it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct CursorId(u64);

impl CursorId {
    /// The token that starts every scan.
    pub const INITIAL: CursorId = CursorId(0);

    pub const fn new(raw: u64) -> Self {
        CursorId(raw)
    }

    /// Reinterprets a token held in a signed 64-bit slot.
    pub const fn from_signed(raw: i64) -> Self {
        CursorId(raw as u64)
    }

    pub const fn get(self) -> u64 {
        self.0
    }

    /// The same bits as a signed 64-bit integer, for signed storage.
    pub const fn as_signed(self) -> i64 {
        self.0 as i64
    }

    /// True for `0`: the start token, and the end-of-scan marker.
    pub const fn is_terminal(self) -> bool {
        self.0 == 0
    }

    /// Unsigned decimal text, as sent to the store.
    pub fn to_wire(self) -> Bytes {
        Bytes::from(self.0.to_string())
    }

    /// Parses the unsigned decimal text the store sends back.
    pub fn parse(text: &[u8]) -> Result<Self, ParseError> {
        std::str::from_utf8(text)
            .map_err(|e| ParseError::InvalidUtf8(e.to_string()))?
            .parse()
    }
}

impl FromStr for CursorId {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // u64::from_str accepts a leading '+', the store never sends one
        if !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ParseError::InvalidInteger(format!("cursor {:?}", s)));
        }
        s.parse::<u64>()
            .map(CursorId)
            .map_err(|e| ParseError::InvalidInteger(format!("cursor {:?}: {}", s, e)))
    }
}

impl fmt::Display for CursorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for CursorId {
    fn from(raw: u64) -> Self {
        CursorId(raw)
    }
}

/// One decoded HSCAN page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanIteration {
    pub cursor: CursorId,
    pub entries: Vec<(Bytes, Bytes)>,
}

impl ScanIteration {
    /// Decodes a raw page; a malformed cursor is a protocol failure.
    pub fn from_raw(cursor: &[u8], entries: Vec<(Bytes, Bytes)>) -> Result<Self, StoreFailure> {
        Ok(ScanIteration {
            cursor: CursorId::parse(cursor)?,
            entries,
        })
    }

    /// True when the store signalled the end of the scan with this page.
    pub fn is_final(&self) -> bool {
        self.cursor.is_terminal()
    }
}

/// Observable state of a [`HashScanCursor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorState {
    /// Created, nothing fetched yet.
    Ready,
    /// A page has been fetched; entries may still be buffered.
    HasBatch,
    /// The store returned cursor 0 and every entry has been yielded.
    Exhausted,
    /// A fetch failed. The error was returned once.
    Failed,
}

/// Lazy iterator over all entries of one hash.
///
/// Created by [`ClusterHashCommands::hscan`](crate::hash::ClusterHashCommands::hscan).
/// Pull entries with [`next_entry`](Self::next_entry) or use it as an
/// [`Iterator`] of `HashResult<(Bytes, Bytes)>`.
pub struct HashScanCursor<'c, C: ?Sized> {
    client: &'c C,
    translator: Arc<dyn ErrorTranslator>,
    key: Bytes,
    params: ScanParams,
    batch: std::vec::IntoIter<(Bytes, Bytes)>,
    next_cursor: CursorId,
    state: CursorState,
    position: u64,
    fetches: u64,
}

impl<'c, C: HashStoreClient + ?Sized> HashScanCursor<'c, C> {
    pub(crate) fn new(
        client: &'c C,
        translator: Arc<dyn ErrorTranslator>,
        key: Bytes,
        params: ScanParams,
    ) -> Self {
        Self {
            client,
            translator,
            key,
            params,
            batch: Vec::new().into_iter(),
            next_cursor: CursorId::INITIAL,
            state: CursorState::Ready,
            position: 0,
            fetches: 0,
        }
    }

    /// Pulls the next entry, fetching a new page only when the buffered one
    /// is drained. Returns `Ok(None)` once the scan is over.
    pub fn next_entry(&mut self) -> HashResult<Option<(Bytes, Bytes)>> {
        loop {
            match self.state {
                CursorState::Exhausted | CursorState::Failed => return Ok(None),
                CursorState::HasBatch => {
                    if let Some(entry) = self.batch.next() {
                        self.position += 1;
                        return Ok(Some(entry));
                    }
                    if self.next_cursor.is_terminal() {
                        self.state = CursorState::Exhausted;
                        debug!(
                            key = %String::from_utf8_lossy(&self.key),
                            entries = self.position,
                            fetches = self.fetches,
                            "hash scan exhausted"
                        );
                        return Ok(None);
                    }
                }
                CursorState::Ready => {}
            }

            self.fetch()?;
        }
    }

    /// Issues one HSCAN for the current cursor and buffers the page.
    fn fetch(&mut self) -> HashResult<()> {
        let cursor = self.next_cursor.to_wire();
        self.fetches += 1;

        let page = self
            .client
            .hscan(&self.key, &cursor, &self.params)
            .and_then(|(next, entries)| ScanIteration::from_raw(&next, entries));

        match page {
            Ok(page) => {
                debug!(
                    key = %String::from_utf8_lossy(&self.key),
                    cursor = %self.next_cursor,
                    next = %page.cursor,
                    entries = page.entries.len(),
                    last = page.is_final(),
                    "fetched hash scan page"
                );
                self.next_cursor = page.cursor;
                self.batch = page.entries.into_iter();
                self.state = CursorState::HasBatch;
                Ok(())
            }
            Err(failure) => {
                self.state = CursorState::Failed;
                self.batch = Vec::new().into_iter();
                Err(self.translator.translate(failure))
            }
        }
    }
}

impl<C: ?Sized> HashScanCursor<'_, C> {
    pub fn key(&self) -> &Bytes {
        &self.key
    }

    pub fn state(&self) -> CursorState {
        self.state
    }

    /// The next cursor received from the store (`0` before the first fetch).
    pub fn cursor_id(&self) -> CursorId {
        self.next_cursor
    }

    /// Number of entries yielded so far.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Number of HSCAN requests issued so far.
    pub fn fetch_count(&self) -> u64 {
        self.fetches
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self.state, CursorState::Exhausted | CursorState::Failed)
    }
}

impl<C: HashStoreClient + ?Sized> Iterator for HashScanCursor<'_, C> {
    type Item = HashResult<(Bytes, Bytes)>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_entry().transpose()
    }
}

impl<C: ?Sized> fmt::Debug for HashScanCursor<'_, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HashScanCursor")
            .field("key", &self.key)
            .field("state", &self.state)
            .field("cursor", &self.next_cursor)
            .field("position", &self.position)
            .field("fetches", &self.fetches)
            .finish()
    }
}
