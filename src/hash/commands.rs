//! Hash Command Adapter
//!
//! [`ClusterHashCommands`] exposes one method per hash command. Each method
//! checks the arguments the type system cannot, makes exactly one call on the
//! connection's [`HashStoreClient`], routes any failure through the
//! connection's translator and converts the raw reply into a semantic type:
//!
//! | Command        | Result                        |
//! |----------------|-------------------------------|
//! | `hset`         | `true` when the field is new  |
//! | `hsetnx`       | `true` when the field was set |
//! | `hget`         | `Option<Bytes>`               |
//! | `hmget`        | one `Option<Bytes>` per field |
//! | `hdel`         | number of fields removed      |
//! | `hkeys`        | `HashSet<Bytes>`              |
//! | `hgetall`      | `HashMap<Bytes, Bytes>`       |
//! | `hscan`        | a lazy [`HashScanCursor`]     |
//!
//! Calls with an empty field list or an empty mapping are answered locally.

use crate::client::HashStoreClient;
use crate::connection::ClusterConnection;
use crate::error::{HashError, HashResult, StoreFailure, StoreResult};
use crate::hash::cursor::HashScanCursor;
use crate::hash::options::ScanOptions;
use bytes::Bytes;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace};

/// Hash command adapter over a [`ClusterConnection`].
///
/// The adapter holds nothing but a reference to its connection, so it is
/// `Copy` and may be created freely.
pub struct ClusterHashCommands<'c, C> {
    connection: &'c ClusterConnection<C>,
}

impl<C> Clone for ClusterHashCommands<'_, C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<C> Copy for ClusterHashCommands<'_, C> {}

impl<C> fmt::Debug for ClusterHashCommands<'_, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClusterHashCommands").finish_non_exhaustive()
    }
}

impl<'c, C: HashStoreClient> ClusterHashCommands<'c, C> {
    pub fn new(connection: &'c ClusterConnection<C>) -> Self {
        Self { connection }
    }

    /// Runs one store call and translates its failure.
    fn call<T>(
        &self,
        command: &'static str,
        key: &[u8],
        op: impl FnOnce(&C) -> StoreResult<T>,
    ) -> HashResult<T> {
        trace!(command, key = %String::from_utf8_lossy(key), "hash command");
        op(self.connection.client()).map_err(|failure| self.connection.translate(failure))
    }

    /// Sets `field` to `value`. Returns `true` if the field is new and
    /// `false` if an existing value was overwritten.
    pub fn hset(&self, key: &[u8], field: &[u8], value: &[u8]) -> HashResult<bool> {
        self.call("HSET", key, |c| c.hset(key, field, value))
            .map(|added| added > 0)
    }

    /// Sets `field` only if it does not exist yet. Returns whether it was set.
    pub fn hsetnx(&self, key: &[u8], field: &[u8], value: &[u8]) -> HashResult<bool> {
        self.call("HSETNX", key, |c| c.hsetnx(key, field, value))
            .map(|set| set == 1)
    }

    pub fn hget(&self, key: &[u8], field: &[u8]) -> HashResult<Option<Bytes>> {
        self.call("HGET", key, |c| c.hget(key, field))
    }

    /// Values of `fields`, positionally aligned with the request.
    pub fn hmget(&self, key: &[u8], fields: &[Bytes]) -> HashResult<Vec<Option<Bytes>>> {
        if fields.is_empty() {
            debug!(command = "HMGET", "empty field list, no request sent");
            return Ok(Vec::new());
        }
        self.call("HMGET", key, |c| c.hmget(key, fields))
    }

    pub fn hmset(&self, key: &[u8], entries: &HashMap<Bytes, Bytes>) -> HashResult<()> {
        if entries.is_empty() {
            debug!(command = "HMSET", "empty mapping, no request sent");
            return Ok(());
        }
        let entries: Vec<(Bytes, Bytes)> = entries
            .iter()
            .map(|(field, value)| (field.clone(), value.clone()))
            .collect();
        self.call("HMSET", key, |c| c.hmset(key, &entries))
    }

    /// Adds `delta` to the integer stored at `field` and returns the result.
    /// A missing field counts as 0.
    pub fn hincrby(&self, key: &[u8], field: &[u8], delta: i64) -> HashResult<i64> {
        self.call("HINCRBY", key, |c| c.hincrby(key, field, delta))
    }

    /// Adds `delta` to the float stored at `field` and returns the result.
    pub fn hincrbyfloat(&self, key: &[u8], field: &[u8], delta: f64) -> HashResult<f64> {
        if !delta.is_finite() {
            return Err(HashError::InvalidArgument("Delta must be a finite number"));
        }
        self.call("HINCRBYFLOAT", key, |c| c.hincrbyfloat(key, field, delta))
    }

    /// A random field, or `None` when the hash does not exist.
    pub fn hrandfield(&self, key: &[u8]) -> HashResult<Option<Bytes>> {
        self.call("HRANDFIELD", key, |c| c.hrandfield(key))
    }

    /// A random entry, or `None` when the hash does not exist.
    pub fn hrandfield_with_value(&self, key: &[u8]) -> HashResult<Option<(Bytes, Bytes)>> {
        self.call("HRANDFIELD", key, |c| c.hrandfield_with_values(key, 1))
            .map(|entries| entries.into_iter().next())
    }

    /// Up to `count` distinct random fields. A negative `count` asks the store
    /// for exactly `-count` fields, possibly repeated.
    pub fn hrandfields(&self, key: &[u8], count: i64) -> HashResult<Vec<Bytes>> {
        self.call("HRANDFIELD", key, |c| c.hrandfield_count(key, count))
    }

    /// Like [`hrandfields`](Self::hrandfields), with values.
    pub fn hrandfields_with_values(
        &self,
        key: &[u8],
        count: i64,
    ) -> HashResult<Vec<(Bytes, Bytes)>> {
        self.call("HRANDFIELD", key, |c| c.hrandfield_with_values(key, count))
    }

    pub fn hexists(&self, key: &[u8], field: &[u8]) -> HashResult<bool> {
        self.call("HEXISTS", key, |c| c.hexists(key, field))
    }

    /// Removes `fields` and returns how many of them existed.
    pub fn hdel(&self, key: &[u8], fields: &[Bytes]) -> HashResult<u64> {
        if fields.is_empty() {
            debug!(command = "HDEL", "empty field list, no request sent");
            return Ok(0);
        }
        self.call("HDEL", key, |c| c.hdel(key, fields).and_then(|n| count("HDEL", n)))
    }

    /// Number of fields; 0 when the hash does not exist.
    pub fn hlen(&self, key: &[u8]) -> HashResult<u64> {
        self.call("HLEN", key, |c| c.hlen(key).and_then(|n| count("HLEN", n)))
    }

    pub fn hkeys(&self, key: &[u8]) -> HashResult<HashSet<Bytes>> {
        self.call("HKEYS", key, |c| c.hkeys(key))
            .map(|fields| fields.into_iter().collect())
    }

    pub fn hvals(&self, key: &[u8]) -> HashResult<Vec<Bytes>> {
        self.call("HVALS", key, |c| c.hvals(key))
    }

    /// Every entry of the hash, loaded at once. Use [`hscan`](Self::hscan)
    /// for large hashes.
    pub fn hgetall(&self, key: &[u8]) -> HashResult<HashMap<Bytes, Bytes>> {
        self.call("HGETALL", key, |c| c.hgetall(key))
            .map(|entries| entries.into_iter().collect())
    }

    /// Starts a lazy scan over every entry of the hash.
    ///
    /// No request is made until the first entry is pulled.
    pub fn hscan(&self, key: &[u8], options: &ScanOptions) -> HashResult<HashScanCursor<'c, C>> {
        options.validate()?;
        trace!(command = "HSCAN", key = %String::from_utf8_lossy(key), "hash scan created");
        Ok(HashScanCursor::new(
            self.connection.client(),
            Arc::clone(self.connection.translator()),
            Bytes::copy_from_slice(key),
            options.to_params(),
        ))
    }

    /// Length in bytes of the value at `field`; 0 when it does not exist.
    pub fn hstrlen(&self, key: &[u8], field: &[u8]) -> HashResult<u64> {
        self.call("HSTRLEN", key, |c| {
            c.hstrlen(key, field).and_then(|n| count("HSTRLEN", n))
        })
    }
}

fn count(command: &'static str, n: i64) -> StoreResult<u64> {
    u64::try_from(n).map_err(|_| StoreFailure::unexpected(command, format!("negative count {}", n)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{RespClient, Transport};
    use crate::cluster::{ClusterConfig, MemoryCluster};
    use crate::error::AccessFailureKind;
    use crate::protocol::RespValue;
    use crate::storage::glob_match;
    use proptest::prelude::*;

    fn b(s: &str) -> Bytes {
        Bytes::copy_from_slice(s.as_bytes())
    }

    #[test]
    fn test_set_then_get() {
        let cluster = MemoryCluster::new();
        let connection = cluster.connect();
        let hash = connection.hash_commands();

        assert!(hash.hset(b"user:1", b"name", b"Ariz").unwrap());
        assert_eq!(hash.hget(b"user:1", b"name").unwrap(), Some(b("Ariz")));

        assert!(!hash.hset(b"user:1", b"name", b"Bob").unwrap());
        assert_eq!(hash.hget(b"user:1", b"name").unwrap(), Some(b("Bob")));

        assert_eq!(hash.hget(b"user:1", b"missing").unwrap(), None);
        assert_eq!(hash.hget(b"user:2", b"name").unwrap(), None);
    }

    #[test]
    fn test_setnx_keeps_existing() {
        let cluster = MemoryCluster::new();
        let connection = cluster.connect();
        let hash = connection.hash_commands();

        assert!(hash.hsetnx(b"h", b"f", b"first").unwrap());
        assert!(!hash.hsetnx(b"h", b"f", b"second").unwrap());
        assert_eq!(hash.hget(b"h", b"f").unwrap(), Some(b("first")));
    }

    #[test]
    fn test_len_and_delete() {
        let cluster = MemoryCluster::new();
        let connection = cluster.connect();
        let hash = connection.hash_commands();

        hash.hset(b"h", b"a", b"1").unwrap();
        hash.hset(b"h", b"b", b"2").unwrap();

        assert_eq!(hash.hlen(b"h").unwrap(), 2);
        assert_eq!(hash.hdel(b"h", &[b("a")]).unwrap(), 1);
        assert_eq!(hash.hget(b"h", b"a").unwrap(), None);
        assert_eq!(hash.hlen(b"h").unwrap(), 1);

        assert_eq!(hash.hdel(b"h", &[b("b"), b("nope")]).unwrap(), 1);
        assert_eq!(hash.hlen(b"h").unwrap(), 0);
        assert!(!hash.hexists(b"h", b"b").unwrap());
    }

    #[test]
    fn test_multi_get_and_set() {
        let cluster = MemoryCluster::new();
        let connection = cluster.connect();
        let hash = connection.hash_commands();

        let entries: HashMap<Bytes, Bytes> =
            [(b("a"), b("1")), (b("b"), b("2"))].into_iter().collect();
        hash.hmset(b"h", &entries).unwrap();

        let values = hash.hmget(b"h", &[b("b"), b("x"), b("a")]).unwrap();
        assert_eq!(values, vec![Some(b("2")), None, Some(b("1"))]);

        assert_eq!(hash.hgetall(b"h").unwrap(), entries);
        assert_eq!(
            hash.hkeys(b"h").unwrap(),
            [b("a"), b("b")].into_iter().collect::<HashSet<_>>()
        );
        let mut values = hash.hvals(b"h").unwrap();
        values.sort();
        assert_eq!(values, vec![b("1"), b("2")]);
    }

    #[test]
    fn test_empty_collections_send_nothing() {
        let cluster = MemoryCluster::new();
        let connection = cluster.connect();
        let hash = connection.hash_commands();

        assert!(hash.hmget(b"h", &[]).unwrap().is_empty());
        hash.hmset(b"h", &HashMap::new()).unwrap();
        assert_eq!(hash.hdel(b"h", &[]).unwrap(), 0);

        assert_eq!(cluster.requests(), 0);
    }

    #[test]
    fn test_increments() {
        let cluster = MemoryCluster::new();
        let connection = cluster.connect();
        let hash = connection.hash_commands();

        assert_eq!(hash.hincrby(b"h", b"n", 5).unwrap(), 5);
        assert_eq!(hash.hincrby(b"h", b"n", -7).unwrap(), -2);
        assert_eq!(hash.hincrbyfloat(b"h", b"f", 1.5).unwrap(), 1.5);
        assert_eq!(hash.hincrbyfloat(b"h", b"f", 0.25).unwrap(), 1.75);
    }

    #[test]
    fn test_increment_type_mismatch() {
        let cluster = MemoryCluster::new();
        let connection = cluster.connect();
        let hash = connection.hash_commands();

        hash.hset(b"h", b"name", b"Ariz").unwrap();

        let err = hash.hincrby(b"h", b"name", 1).unwrap_err();
        assert!(err.is_type_mismatch());

        let err = hash.hincrbyfloat(b"h", b"name", 1.0).unwrap_err();
        assert!(err.is_type_mismatch());

        assert_eq!(hash.hget(b"h", b"name").unwrap(), Some(b("Ariz")));
    }

    #[test]
    fn test_non_finite_delta_rejected_locally() {
        let cluster = MemoryCluster::new();
        let connection = cluster.connect();
        let hash = connection.hash_commands();

        for delta in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let err = hash.hincrbyfloat(b"h", b"f", delta).unwrap_err();
            assert!(err.is_invalid_argument());
        }
        assert_eq!(cluster.requests(), 0);
    }

    #[test]
    fn test_wrong_type() {
        let cluster = MemoryCluster::new();
        cluster
            .request(b"s", RespValue::command("SET", [&b"s"[..], &b"plain"[..]]))
            .unwrap();

        let connection = cluster.connect();
        let err = connection.hash_commands().hget(b"s", b"f").unwrap_err();
        assert_eq!(err.kind(), Some(AccessFailureKind::WrongType));
    }

    #[test]
    fn test_unreachable_cluster() {
        let cluster = MemoryCluster::new();
        let connection = cluster.connect();
        cluster.set_unreachable(true);

        let err = connection.hash_commands().hlen(b"h").unwrap_err();
        assert_eq!(err.kind(), Some(AccessFailureKind::Connection));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_random_fields() {
        let cluster = MemoryCluster::new();
        let connection = cluster.connect();
        let hash = connection.hash_commands();

        assert_eq!(hash.hrandfield(b"h").unwrap(), None);
        assert_eq!(hash.hrandfield_with_value(b"h").unwrap(), None);
        assert!(hash.hrandfields(b"h", 3).unwrap().is_empty());

        for (field, value) in [("a", "1"), ("b", "2"), ("c", "3")] {
            hash.hset(b"h", field.as_bytes(), value.as_bytes()).unwrap();
        }
        let all = hash.hgetall(b"h").unwrap();

        let field = hash.hrandfield(b"h").unwrap().unwrap();
        assert!(all.contains_key(&field));

        let (field, value) = hash.hrandfield_with_value(b"h").unwrap().unwrap();
        assert_eq!(all.get(&field), Some(&value));

        let distinct = hash.hrandfields(b"h", 10).unwrap();
        assert_eq!(distinct.len(), 3);
        assert_eq!(distinct.iter().collect::<HashSet<_>>().len(), 3);

        let repeated = hash.hrandfields(b"h", -10).unwrap();
        assert_eq!(repeated.len(), 10);

        let entries = hash.hrandfields_with_values(b"h", -4).unwrap();
        assert_eq!(entries.len(), 4);
        assert!(entries.iter().all(|(f, v)| all.get(f) == Some(v)));

        let err = hash.hrandfields_with_values(b"h", i64::MIN).unwrap_err();
        assert_eq!(err.kind(), Some(AccessFailureKind::ServerReply));
    }

    #[test]
    fn test_strlen() {
        let cluster = MemoryCluster::new();
        let connection = cluster.connect();
        let hash = connection.hash_commands();

        hash.hset(b"h", b"f", b"hello").unwrap();
        assert_eq!(hash.hstrlen(b"h", b"f").unwrap(), 5);
        assert_eq!(hash.hstrlen(b"h", b"g").unwrap(), 0);
        assert_eq!(hash.hstrlen(b"nope", b"f").unwrap(), 0);
    }

    #[test]
    fn test_scan_matches_getall() {
        let cluster = MemoryCluster::with_config(ClusterConfig {
            nodes: 3,
            shards_per_node: 4,
        });
        let connection = cluster.connect();
        let hash = connection.hash_commands();

        let entries: HashMap<Bytes, Bytes> = (0..1000)
            .map(|i| (b(&format!("field:{}", i)), b(&format!("value:{}", i))))
            .collect();
        hash.hmset(b"big", &entries).unwrap();

        let mut cursor = hash.hscan(b"big", &ScanOptions::new().count(100)).unwrap();
        let mut seen = HashMap::new();
        while let Some((field, value)) = cursor.next_entry().unwrap() {
            assert!(seen.insert(field, value).is_none(), "duplicate field");
        }

        assert!(cursor.fetch_count() >= 10);
        assert_eq!(cursor.position(), 1000);
        assert_eq!(seen.len(), 1000);
        assert_eq!(seen, hash.hgetall(b"big").unwrap());
    }

    fn binary() -> impl Strategy<Value = Vec<u8>> {
        prop_oneof![
            prop::collection::vec(any::<u8>(), 0..24),
            Just(b"\r\n$3\r\n\xfe".to_vec()),
            Just(b"k\r\n\xff\x00".to_vec()),
            Just(Vec::new()),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn test_binary_set_get_round_trip(
            key in binary(),
            field in binary(),
            value in binary(),
            other in binary(),
        ) {
            let cluster = MemoryCluster::new();
            let connection = cluster.connect();
            let hash = connection.hash_commands();

            prop_assert!(hash.hset(&key, &field, &value).unwrap());
            prop_assert_eq!(hash.hget(&key, &field).unwrap(), Some(Bytes::from(value.clone())));

            prop_assert!(!hash.hsetnx(&key, &field, &other).unwrap());
            prop_assert_eq!(hash.hget(&key, &field).unwrap(), Some(Bytes::from(value.clone())));
            prop_assert_eq!(hash.hstrlen(&key, &field).unwrap(), value.len() as u64);

            let scanned: Vec<_> = hash
                .hscan(&key, &ScanOptions::new().count(1))
                .unwrap()
                .collect::<HashResult<_>>()
                .unwrap();
            prop_assert_eq!(scanned, vec![(Bytes::from(field), Bytes::from(value))]);
        }

        #[test]
        fn test_scan_returns_every_entry_once(
            size in 1usize..300,
            count in prop::option::of(1u64..64),
            pattern in prop::option::of(prop::sample::select(vec![
                "f*", "f1*", "*7", "f?", "f[0-4]*", "nomatch*",
            ])),
            values in prop::collection::vec(binary(), 300),
        ) {
            let cluster = MemoryCluster::new();
            let connection = cluster.connect();
            let hash = connection.hash_commands();

            let entries: HashMap<Bytes, Bytes> = (0..size)
                .map(|i| (b(&format!("f{}", i)), Bytes::from(values[i].clone())))
                .collect();
            hash.hmset(b"h", &entries).unwrap();

            let mut options = ScanOptions::new();
            if let Some(count) = count {
                options = options.count(count);
            }
            if let Some(pattern) = pattern {
                options = options.pattern(pattern);
            }

            let mut seen = HashMap::new();
            for entry in hash.hscan(b"h", &options).unwrap() {
                let (field, value) = entry.unwrap();
                prop_assert!(seen.insert(field, value).is_none(), "duplicate field");
            }

            let expected: HashMap<Bytes, Bytes> = hash
                .hgetall(b"h")
                .unwrap()
                .into_iter()
                .filter(|(field, _)| pattern.map_or(true, |p| glob_match(p.as_bytes(), field)))
                .collect();
            prop_assert_eq!(seen, expected);
        }
    }

    #[test]
    fn test_scan_with_pattern() {
        let cluster = MemoryCluster::new();
        let connection = cluster.connect();
        let hash = connection.hash_commands();

        for i in 0..50 {
            let field = if i % 5 == 0 {
                format!("keep:{}", i)
            } else {
                format!("drop:{}", i)
            };
            hash.hset(b"h", field.as_bytes(), b"v").unwrap();
        }

        let options = ScanOptions::new().pattern("keep:*").count(7);
        let fields: HashSet<Bytes> = hash
            .hscan(b"h", &options)
            .unwrap()
            .map(|entry| entry.unwrap().0)
            .collect();

        assert_eq!(fields.len(), 10);
        assert!(fields.iter().all(|f| f.starts_with(b"keep:")));
    }

    #[test]
    fn test_scan_missing_key() {
        let cluster = MemoryCluster::new();
        let connection = cluster.connect();

        let mut cursor = connection
            .hash_commands()
            .hscan(b"nothing", &ScanOptions::none())
            .unwrap();
        assert_eq!(cursor.next_entry().unwrap(), None);
        assert!(cursor.is_exhausted());
    }

    #[test]
    fn test_scan_zero_count_rejected() {
        let cluster = MemoryCluster::new();
        let connection = cluster.connect();

        let err = connection
            .hash_commands()
            .hscan(b"h", &ScanOptions::new().count(0))
            .unwrap_err();
        assert!(err.is_invalid_argument());
        assert_eq!(cluster.requests(), 0);
    }

    #[test]
    fn test_works_over_shared_client() {
        let cluster = Arc::new(MemoryCluster::new());
        let connection = ClusterConnection::new(Arc::new(RespClient::new(Arc::clone(&cluster))));
        let hash = connection.hash_commands();

        hash.hset(b"h", b"f", b"v").unwrap();
        assert_eq!(hash.hlen(b"h").unwrap(), 1);
        assert_eq!(cluster.requests(), 2);
    }
}
