//! Store Client Seam
//!
//! The hash adapter never talks to the network itself. It calls a
//! [`HashStoreClient`], which exposes one method per hash command and
//! reports failures as raw [`StoreFailure`]s. Routing a key to the node that
//! owns it, retries and redirects all happen behind this trait.
//!
//! ```text
//! ┌─────────────────────┐   ┌──────────────────┐   ┌─────────────────┐
//! │ ClusterHashCommands │──>│ HashStoreClient  │──>│   Transport     │
//! │  HashScanCursor     │   │   (RespClient)   │   │ (MemoryCluster) │
//! └─────────────────────┘   └──────────────────┘   └─────────────────┘
//! ```
//!
//! [`RespClient`] implements the trait for any [`Transport`] that can carry
//! one RESP command frame to a node and return its reply frame.
//!
//! [`StoreFailure`]: crate::error::StoreFailure

pub mod resp;

use crate::error::StoreResult;
use crate::hash::options::ScanParams;
use bytes::Bytes;
use std::sync::Arc;

pub use resp::{RespClient, Transport};

/// One raw HSCAN page: the next cursor exactly as the store sent it, plus the
/// entries of this page.
pub type RawScanPage = (Bytes, Vec<(Bytes, Bytes)>);

/// Client-side view of the hash command family of a clustered store.
///
/// Results are the store's raw replies: integer replies stay `i64`, nil
/// replies are `None`, scan cursors are decimal text.
pub trait HashStoreClient {
    /// HSET key field value - number of fields added (0 or 1).
    fn hset(&self, key: &[u8], field: &[u8], value: &[u8]) -> StoreResult<i64>;

    /// HSETNX key field value - 1 when set, 0 when the field existed.
    fn hsetnx(&self, key: &[u8], field: &[u8], value: &[u8]) -> StoreResult<i64>;

    fn hget(&self, key: &[u8], field: &[u8]) -> StoreResult<Option<Bytes>>;

    /// HMGET key field [field ...] - one slot per requested field.
    fn hmget(&self, key: &[u8], fields: &[Bytes]) -> StoreResult<Vec<Option<Bytes>>>;

    fn hmset(&self, key: &[u8], entries: &[(Bytes, Bytes)]) -> StoreResult<()>;

    fn hincrby(&self, key: &[u8], field: &[u8], delta: i64) -> StoreResult<i64>;

    fn hincrbyfloat(&self, key: &[u8], field: &[u8], delta: f64) -> StoreResult<f64>;

    /// HRANDFIELD key - nil when the key is missing.
    fn hrandfield(&self, key: &[u8]) -> StoreResult<Option<Bytes>>;

    /// HRANDFIELD key count
    fn hrandfield_count(&self, key: &[u8], count: i64) -> StoreResult<Vec<Bytes>>;

    /// HRANDFIELD key count WITHVALUES
    fn hrandfield_with_values(&self, key: &[u8], count: i64)
        -> StoreResult<Vec<(Bytes, Bytes)>>;

    fn hexists(&self, key: &[u8], field: &[u8]) -> StoreResult<bool>;

    /// HDEL key field [field ...] - number of fields removed.
    fn hdel(&self, key: &[u8], fields: &[Bytes]) -> StoreResult<i64>;

    fn hlen(&self, key: &[u8]) -> StoreResult<i64>;

    fn hkeys(&self, key: &[u8]) -> StoreResult<Vec<Bytes>>;

    fn hvals(&self, key: &[u8]) -> StoreResult<Vec<Bytes>>;

    fn hgetall(&self, key: &[u8]) -> StoreResult<Vec<(Bytes, Bytes)>>;

    /// HSCAN key cursor [MATCH pattern] [COUNT n]
    fn hscan(&self, key: &[u8], cursor: &[u8], params: &ScanParams) -> StoreResult<RawScanPage>;

    fn hstrlen(&self, key: &[u8], field: &[u8]) -> StoreResult<i64>;
}

macro_rules! forward_client {
    ($($ty:ty),*) => {$(
        impl<C: HashStoreClient + ?Sized> HashStoreClient for $ty {
            fn hset(&self, key: &[u8], field: &[u8], value: &[u8]) -> StoreResult<i64> {
                (**self).hset(key, field, value)
            }
            fn hsetnx(&self, key: &[u8], field: &[u8], value: &[u8]) -> StoreResult<i64> {
                (**self).hsetnx(key, field, value)
            }
            fn hget(&self, key: &[u8], field: &[u8]) -> StoreResult<Option<Bytes>> {
                (**self).hget(key, field)
            }
            fn hmget(&self, key: &[u8], fields: &[Bytes]) -> StoreResult<Vec<Option<Bytes>>> {
                (**self).hmget(key, fields)
            }
            fn hmset(&self, key: &[u8], entries: &[(Bytes, Bytes)]) -> StoreResult<()> {
                (**self).hmset(key, entries)
            }
            fn hincrby(&self, key: &[u8], field: &[u8], delta: i64) -> StoreResult<i64> {
                (**self).hincrby(key, field, delta)
            }
            fn hincrbyfloat(&self, key: &[u8], field: &[u8], delta: f64) -> StoreResult<f64> {
                (**self).hincrbyfloat(key, field, delta)
            }
            fn hrandfield(&self, key: &[u8]) -> StoreResult<Option<Bytes>> {
                (**self).hrandfield(key)
            }
            fn hrandfield_count(&self, key: &[u8], count: i64) -> StoreResult<Vec<Bytes>> {
                (**self).hrandfield_count(key, count)
            }
            fn hrandfield_with_values(
                &self,
                key: &[u8],
                count: i64,
            ) -> StoreResult<Vec<(Bytes, Bytes)>> {
                (**self).hrandfield_with_values(key, count)
            }
            fn hexists(&self, key: &[u8], field: &[u8]) -> StoreResult<bool> {
                (**self).hexists(key, field)
            }
            fn hdel(&self, key: &[u8], fields: &[Bytes]) -> StoreResult<i64> {
                (**self).hdel(key, fields)
            }
            fn hlen(&self, key: &[u8]) -> StoreResult<i64> {
                (**self).hlen(key)
            }
            fn hkeys(&self, key: &[u8]) -> StoreResult<Vec<Bytes>> {
                (**self).hkeys(key)
            }
            fn hvals(&self, key: &[u8]) -> StoreResult<Vec<Bytes>> {
                (**self).hvals(key)
            }
            fn hgetall(&self, key: &[u8]) -> StoreResult<Vec<(Bytes, Bytes)>> {
                (**self).hgetall(key)
            }
            fn hscan(
                &self,
                key: &[u8],
                cursor: &[u8],
                params: &ScanParams,
            ) -> StoreResult<RawScanPage> {
                (**self).hscan(key, cursor, params)
            }
            fn hstrlen(&self, key: &[u8], field: &[u8]) -> StoreResult<i64> {
                (**self).hstrlen(key, field)
            }
        }
    )*};
}

forward_client!(&C, Box<C>, Arc<C>);
