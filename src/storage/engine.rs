//! Thread-Safe Hash Store
//!
//! The store behind each cluster node. It keeps two kinds of values, plain
//! strings and hashes, in a sharded map so different keys can be read and
//! written concurrently.
//!
//! ## Design Decisions
//!
//! 1. **Sharded Locks**: one `RwLock` per shard instead of one big lock.
//! 2. **Ordered Hashes**: hash values are `IndexMap`s. HSCAN cursors are
//!    positions in that order, and deletes use `shift_remove` so remaining
//!    fields keep their relative order.
//! 3. **No Empty Hashes**: removing the last field removes the key.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        HashStore                            │
//! │  ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐            │
//! │  │ Shard 0 │ │ Shard 1 │ │ Shard 2 │ │ Shard N │            │
//! │  │ RwLock  │ │ RwLock  │ │ RwLock  │ │ RwLock  │            │
//! │  │ HashMap │ │ HashMap │ │ HashMap │ │ HashMap │            │
//! │  └─────────┘ └─────────┘ └─────────┘ └─────────┘            │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Scan Cursors
//!
//! A non-zero cursor is the next position with the high bit set. Every
//! cursor handed out mid-scan is therefore above `i64::MAX`, and clients have
//! to treat cursors as unsigned to resume correctly.

use bytes::Bytes;
use indexmap::IndexMap;
use rand::rngs::SmallRng;
use rand::seq::IteratorRandom;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, RwLock};
use thiserror::Error;

/// Default number of shards per store.
pub const DEFAULT_SHARDS: usize = 16;

/// Fields examined per HSCAN call when the client sends no COUNT.
pub const DEFAULT_SCAN_COUNT: usize = 10;

/// Largest sample HRANDFIELD builds for a negative count.
pub const MAX_RANDOM_REPEATS: u64 = 1 << 20;

const CURSOR_FLAG: u64 = 1 << 63;

/// A stored value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Str(Bytes),
    Hash(IndexMap<Bytes, Bytes>),
}

/// Errors the store replies with. The messages are the error reply text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("WRONGTYPE Operation against a key holding the wrong kind of value")]
    WrongType,

    #[error("ERR hash value is not an integer")]
    NotAnInteger,

    #[error("ERR hash value is not a float")]
    NotAFloat,

    #[error("ERR increment or decrement would overflow")]
    Overflow,

    #[error("ERR increment would produce NaN or Infinity")]
    NotFinite,

    #[error("ERR invalid cursor")]
    InvalidCursor,

    #[error("ERR value is out of range")]
    OutOfRange,
}

pub type StoreOpResult<T> = Result<T, StoreError>;

/// One HSCAN page as produced by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanPage {
    pub cursor: u64,
    pub entries: Vec<(Bytes, Bytes)>,
}

type ShardMap = HashMap<Bytes, Value>;

#[derive(Debug)]
struct Shard {
    data: RwLock<ShardMap>,
}

/// Sharded in-memory store for strings and hashes.
///
/// # Example
///
/// ```
/// use flashhash::storage::HashStore;
/// use bytes::Bytes;
///
/// let store = HashStore::new();
/// store.hset(&Bytes::from("user:1"), vec![(Bytes::from("name"), Bytes::from("Ariz"))]).unwrap();
///
/// let name = store.hget(&Bytes::from("user:1"), b"name").unwrap();
/// assert_eq!(name, Some(Bytes::from("Ariz")));
/// ```
pub struct HashStore {
    shards: Vec<Shard>,
    rng: Mutex<SmallRng>,

    /// Statistics: read operations
    read_count: AtomicU64,

    /// Statistics: write operations
    write_count: AtomicU64,
}

impl std::fmt::Debug for HashStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HashStore")
            .field("shards", &self.shards.len())
            .field("read_count", &self.read_count.load(Ordering::Relaxed))
            .field("write_count", &self.write_count.load(Ordering::Relaxed))
            .finish()
    }
}

impl Default for HashStore {
    fn default() -> Self {
        Self::new()
    }
}

impl HashStore {
    pub fn new() -> Self {
        Self::with_shards(DEFAULT_SHARDS)
    }

    /// Creates a store with `shards` shards (at least one).
    pub fn with_shards(shards: usize) -> Self {
        Self::build(shards, SmallRng::from_entropy())
    }

    /// Creates a store whose random sampling is reproducible.
    pub fn with_seed(shards: usize, seed: u64) -> Self {
        Self::build(shards, SmallRng::seed_from_u64(seed))
    }

    fn build(shards: usize, rng: SmallRng) -> Self {
        let shards = (0..shards.max(1))
            .map(|_| Shard {
                data: RwLock::new(HashMap::new()),
            })
            .collect();

        Self {
            shards,
            rng: Mutex::new(rng),
            read_count: AtomicU64::new(0),
            write_count: AtomicU64::new(0),
        }
    }

    #[inline]
    fn shard_index(&self, key: &[u8]) -> usize {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() as usize) % self.shards.len()
    }

    #[inline]
    fn shard(&self, key: &[u8]) -> &Shard {
        &self.shards[self.shard_index(key)]
    }

    /// Runs `f` against the hash at `key` under a read lock. `f` receives
    /// `None` when the key does not exist.
    fn read_hash<T>(
        &self,
        key: &[u8],
        f: impl FnOnce(Option<&IndexMap<Bytes, Bytes>>) -> T,
    ) -> StoreOpResult<T> {
        self.read_count.fetch_add(1, Ordering::Relaxed);
        let data = self.shard(key).data.read().unwrap();
        match data.get(key) {
            None => Ok(f(None)),
            Some(Value::Hash(hash)) => Ok(f(Some(hash))),
            Some(Value::Str(_)) => Err(StoreError::WrongType),
        }
    }

    /// Runs `f` against the hash at `key` under a write lock, creating it if
    /// missing. A hash left empty by `f` is removed.
    fn write_hash<T>(
        &self,
        key: &Bytes,
        f: impl FnOnce(&mut IndexMap<Bytes, Bytes>) -> StoreOpResult<T>,
    ) -> StoreOpResult<T> {
        self.write_count.fetch_add(1, Ordering::Relaxed);
        let mut data = self.shard(key).data.write().unwrap();

        let value = data
            .entry(key.clone())
            .or_insert_with(|| Value::Hash(IndexMap::new()));
        let Value::Hash(hash) = value else {
            return Err(StoreError::WrongType);
        };

        let result = f(hash);
        if hash.is_empty() {
            data.remove(key);
        }
        result
    }

    // ========================================================================
    // STRING OPERATIONS
    // ========================================================================

    /// Sets a string value, replacing whatever the key held.
    pub fn set(&self, key: Bytes, value: Bytes) {
        self.write_count.fetch_add(1, Ordering::Relaxed);
        let mut data = self.shard(&key).data.write().unwrap();
        data.insert(key, Value::Str(value));
    }

    // ========================================================================
    // HASH OPERATIONS
    // ========================================================================

    /// Sets fields. Returns the number of fields that were new.
    pub fn hset(&self, key: &Bytes, entries: Vec<(Bytes, Bytes)>) -> StoreOpResult<u64> {
        self.write_hash(key, |hash| {
            let mut added = 0;
            for (field, value) in entries {
                if hash.insert(field, value).is_none() {
                    added += 1;
                }
            }
            Ok(added)
        })
    }

    /// Sets a field only if it is absent. Returns whether it was set.
    pub fn hsetnx(&self, key: &Bytes, field: Bytes, value: Bytes) -> StoreOpResult<bool> {
        self.write_hash(key, |hash| {
            if hash.contains_key(&field) {
                return Ok(false);
            }
            hash.insert(field, value);
            Ok(true)
        })
    }

    pub fn hget(&self, key: &[u8], field: &[u8]) -> StoreOpResult<Option<Bytes>> {
        self.read_hash(key, |hash| hash.and_then(|h| h.get(field).cloned()))
    }

    pub fn hmget(&self, key: &[u8], fields: &[Bytes]) -> StoreOpResult<Vec<Option<Bytes>>> {
        self.read_hash(key, |hash| {
            fields
                .iter()
                .map(|field| hash.and_then(|h| h.get(field).cloned()))
                .collect()
        })
    }

    /// Adds `delta` to an integer field. A missing field starts at 0.
    pub fn hincrby(&self, key: &Bytes, field: Bytes, delta: i64) -> StoreOpResult<i64> {
        self.write_hash(key, |hash| {
            let current = match hash.get(&field) {
                Some(raw) => std::str::from_utf8(raw)
                    .ok()
                    .and_then(|s| s.parse::<i64>().ok())
                    .ok_or(StoreError::NotAnInteger)?,
                None => 0,
            };
            let updated = current.checked_add(delta).ok_or(StoreError::Overflow)?;
            hash.insert(field, Bytes::from(updated.to_string()));
            Ok(updated)
        })
    }

    /// Adds `delta` to a float field. A missing field starts at 0.
    pub fn hincrbyfloat(&self, key: &Bytes, field: Bytes, delta: f64) -> StoreOpResult<f64> {
        self.write_hash(key, |hash| {
            let current = match hash.get(&field) {
                Some(raw) => parse_float(raw).ok_or(StoreError::NotAFloat)?,
                None => 0.0,
            };
            let updated = current + delta;
            if !updated.is_finite() {
                return Err(StoreError::NotFinite);
            }
            hash.insert(field, Bytes::from(updated.to_string()));
            Ok(updated)
        })
    }

    /// One random field, or `None` when the key does not exist.
    pub fn hrandfield(&self, key: &[u8]) -> StoreOpResult<Option<Bytes>> {
        let mut rng = self.rng.lock().unwrap();
        self.read_hash(key, |hash| {
            hash.and_then(|h| h.keys().choose(&mut *rng).cloned())
        })
    }

    /// Random entries. A positive `count` returns up to `count` distinct
    /// entries; a negative one returns exactly `-count`, repeats allowed, and
    /// is rejected beyond [`MAX_RANDOM_REPEATS`].
    pub fn hrandfield_count(&self, key: &[u8], count: i64) -> StoreOpResult<Vec<(Bytes, Bytes)>> {
        if count < 0 && count.unsigned_abs() > MAX_RANDOM_REPEATS {
            return Err(StoreError::OutOfRange);
        }
        let mut rng = self.rng.lock().unwrap();
        self.read_hash(key, |hash| {
            let Some(hash) = hash else {
                return Vec::new();
            };
            let pick = |(f, v): (&Bytes, &Bytes)| (f.clone(), v.clone());

            if count >= 0 {
                let count = count as usize;
                if count >= hash.len() {
                    return hash.iter().map(pick).collect();
                }
                hash.iter()
                    .choose_multiple(&mut *rng, count)
                    .into_iter()
                    .map(pick)
                    .collect()
            } else {
                (0..count.unsigned_abs())
                    .filter_map(|_| hash.get_index(rng.gen_range(0..hash.len())))
                    .map(pick)
                    .collect()
            }
        })
    }

    pub fn hexists(&self, key: &[u8], field: &[u8]) -> StoreOpResult<bool> {
        self.read_hash(key, |hash| hash.is_some_and(|h| h.contains_key(field)))
    }

    /// Removes fields. Returns how many existed; the key goes away with its
    /// last field.
    pub fn hdel(&self, key: &Bytes, fields: &[Bytes]) -> StoreOpResult<u64> {
        self.write_hash(key, |hash| {
            Ok(fields
                .iter()
                .filter(|field| hash.shift_remove(*field).is_some())
                .count() as u64)
        })
    }

    pub fn hlen(&self, key: &[u8]) -> StoreOpResult<u64> {
        self.read_hash(key, |hash| hash.map_or(0, |h| h.len() as u64))
    }

    pub fn hkeys(&self, key: &[u8]) -> StoreOpResult<Vec<Bytes>> {
        self.read_hash(key, |hash| hash.map_or_else(Vec::new, |h| h.keys().cloned().collect()))
    }

    pub fn hvals(&self, key: &[u8]) -> StoreOpResult<Vec<Bytes>> {
        self.read_hash(key, |hash| {
            hash.map_or_else(Vec::new, |h| h.values().cloned().collect())
        })
    }

    pub fn hgetall(&self, key: &[u8]) -> StoreOpResult<Vec<(Bytes, Bytes)>> {
        self.read_hash(key, |hash| {
            hash.map_or_else(Vec::new, |h| {
                h.iter().map(|(f, v)| (f.clone(), v.clone())).collect()
            })
        })
    }

    /// Byte length of a field's value, 0 when absent.
    pub fn hstrlen(&self, key: &[u8], field: &[u8]) -> StoreOpResult<u64> {
        self.read_hash(key, |hash| {
            hash.and_then(|h| h.get(field)).map_or(0, |v| v.len() as u64)
        })
    }

    /// One HSCAN step.
    ///
    /// Examines `count` fields starting at `cursor`, then keeps those
    /// matching `pattern`. The page may therefore be empty while the returned
    /// cursor is still non-zero.
    pub fn hscan(
        &self,
        key: &[u8],
        cursor: u64,
        pattern: Option<&[u8]>,
        count: usize,
    ) -> StoreOpResult<ScanPage> {
        let start = match cursor {
            0 => 0,
            c if c & CURSOR_FLAG != 0 => (c & !CURSOR_FLAG) as usize,
            _ => return Err(StoreError::InvalidCursor),
        };
        let count = count.max(1);

        self.read_hash(key, |hash| {
            let Some(hash) = hash else {
                return ScanPage {
                    cursor: 0,
                    entries: Vec::new(),
                };
            };

            let end = start.saturating_add(count).min(hash.len());
            let entries = (start..end)
                .filter_map(|index| hash.get_index(index))
                .filter(|(field, _)| pattern.map_or(true, |p| glob_match(p, field)))
                .map(|(f, v)| (f.clone(), v.clone()))
                .collect();

            let cursor = if end >= hash.len() {
                0
            } else {
                end as u64 | CURSOR_FLAG
            };
            ScanPage { cursor, entries }
        })
    }

    // ========================================================================
    // ADMIN
    // ========================================================================

    /// Number of keys across all shards.
    pub fn len(&self) -> u64 {
        self.shards
            .iter()
            .map(|shard| shard.data.read().unwrap().len() as u64)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            keys: self.len(),
            read_ops: self.read_count.load(Ordering::Relaxed),
            write_ops: self.write_count.load(Ordering::Relaxed),
        }
    }
}

/// Store statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// Number of keys currently stored
    pub keys: u64,
    /// Total read operations
    pub read_ops: u64,
    /// Total write operations
    pub write_ops: u64,
}

fn parse_float(raw: &[u8]) -> Option<f64> {
    let value = std::str::from_utf8(raw).ok()?.trim().parse::<f64>().ok()?;
    value.is_finite().then_some(value)
}

/// Glob-style matching for HSCAN MATCH: `*`, `?`, `[abc]`, `[^a-z]` and `\`
/// escapes.
pub fn glob_match(pattern: &[u8], text: &[u8]) -> bool {
    let Some((&first, rest)) = pattern.split_first() else {
        return text.is_empty();
    };

    match first {
        b'*' => (0..=text.len()).any(|skip| glob_match(rest, &text[skip..])),
        b'?' => !text.is_empty() && glob_match(rest, &text[1..]),
        b'[' => {
            let Some((&ch, text_rest)) = text.split_first() else {
                return false;
            };
            match match_class(rest, ch) {
                Some((matched, after)) => matched && glob_match(after, text_rest),
                None => false,
            }
        }
        b'\\' if !rest.is_empty() => {
            text.first() == Some(&rest[0]) && glob_match(&rest[1..], &text[1..])
        }
        literal => text.first() == Some(&literal) && glob_match(rest, &text[1..]),
    }
}

/// Matches `ch` against a character class body (the part after `[`).
/// Returns the result and the pattern after the closing `]`, or `None` when
/// the class is unterminated.
fn match_class(class: &[u8], ch: u8) -> Option<(bool, &[u8])> {
    let (negate, mut class) = match class.split_first() {
        Some((b'^', rest)) => (true, rest),
        _ => (false, class),
    };

    let mut matched = false;
    loop {
        match class {
            [] => return None,
            [b']', rest @ ..] => return Some((matched != negate, rest)),
            [b'\\', escaped, rest @ ..] => {
                matched |= *escaped == ch;
                class = rest;
            }
            [lo, b'-', hi, rest @ ..] if *hi != b']' => {
                let (lo, hi) = if lo <= hi { (*lo, *hi) } else { (*hi, *lo) };
                matched |= (lo..=hi).contains(&ch);
                class = rest;
            }
            [c, rest @ ..] => {
                matched |= *c == ch;
                class = rest;
            }
        }
    }
}
