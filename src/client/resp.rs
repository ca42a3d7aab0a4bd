//! RESP Hash Client
//!
//! Encodes each hash command as a RESP array, hands it to a [`Transport`]
//! together with the routing key, and decodes the reply frame into the raw
//! result types of [`HashStoreClient`]. Error replies become
//! [`StoreFailure::ErrorReply`]; replies of the wrong shape become
//! [`StoreFailure::UnexpectedReply`].

use crate::client::{HashStoreClient, RawScanPage};
use crate::error::{StoreFailure, StoreResult};
use crate::hash::options::ScanParams;
use crate::protocol::RespValue;
use bytes::Bytes;
use std::sync::Arc;

/// Carries one command frame to the node owning `key` and returns the reply.
pub trait Transport {
    fn request(&self, key: &[u8], command: RespValue) -> StoreResult<RespValue>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn request(&self, key: &[u8], command: RespValue) -> StoreResult<RespValue> {
        (**self).request(key, command)
    }
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn request(&self, key: &[u8], command: RespValue) -> StoreResult<RespValue> {
        (**self).request(key, command)
    }
}

/// A [`HashStoreClient`] speaking RESP over a [`Transport`].
#[derive(Debug, Clone)]
pub struct RespClient<T> {
    transport: T,
}

impl<T: Transport> RespClient<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Sends `name key args...` and turns error replies into failures.
    fn call(&self, name: &'static str, key: &[u8], args: &[&[u8]]) -> StoreResult<RespValue> {
        let command = RespValue::command(name, std::iter::once(key).chain(args.iter().copied()));
        match self.transport.request(key, command)? {
            RespValue::Error(message) => Err(StoreFailure::ErrorReply(message)),
            reply => Ok(reply),
        }
    }
}

fn expect_integer(command: &'static str, reply: RespValue) -> StoreResult<i64> {
    reply.as_integer().ok_or_else(|| {
        StoreFailure::unexpected(command, format!("expected integer, got {}", reply.kind()))
    })
}

fn expect_optional_bulk(command: &'static str, reply: RespValue) -> StoreResult<Option<Bytes>> {
    match reply {
        RespValue::Null => Ok(None),
        RespValue::BulkString(data) => Ok(Some(data)),
        other => Err(StoreFailure::unexpected(
            command,
            format!("expected bulk string, got {}", other.kind()),
        )),
    }
}

fn expect_array(command: &'static str, reply: RespValue) -> StoreResult<Vec<RespValue>> {
    match reply {
        RespValue::Array(items) => Ok(items),
        // A missing key may be answered with a null array.
        RespValue::Null => Ok(Vec::new()),
        other => Err(StoreFailure::unexpected(
            command,
            format!("expected array, got {}", other.kind()),
        )),
    }
}

fn expect_bulks(command: &'static str, reply: RespValue) -> StoreResult<Vec<Bytes>> {
    expect_array(command, reply)?
        .into_iter()
        .map(|item| {
            item.into_bytes()
                .ok_or_else(|| StoreFailure::unexpected(command, "array element is not a string"))
        })
        .collect()
}

/// Decodes a flat `[field, value, field, value, ...]` array.
fn expect_pairs(command: &'static str, reply: RespValue) -> StoreResult<Vec<(Bytes, Bytes)>> {
    let items = expect_bulks(command, reply)?;
    if items.len() % 2 != 0 {
        return Err(StoreFailure::unexpected(
            command,
            format!("odd number of elements ({}) in field/value array", items.len()),
        ));
    }

    let mut pairs = Vec::with_capacity(items.len() / 2);
    let mut items = items.into_iter();
    while let (Some(field), Some(value)) = (items.next(), items.next()) {
        pairs.push((field, value));
    }
    Ok(pairs)
}

fn parse_float(command: &'static str, text: &[u8]) -> StoreResult<f64> {
    std::str::from_utf8(text)
        .ok()
        .and_then(|s| s.parse::<f64>().ok())
        .ok_or_else(|| {
            let text = String::from_utf8_lossy(text);
            StoreFailure::unexpected(command, format!("{:?} is not a float", text))
        })
}

impl<T: Transport> HashStoreClient for RespClient<T> {
    fn hset(&self, key: &[u8], field: &[u8], value: &[u8]) -> StoreResult<i64> {
        expect_integer("HSET", self.call("HSET", key, &[field, value])?)
    }

    fn hsetnx(&self, key: &[u8], field: &[u8], value: &[u8]) -> StoreResult<i64> {
        expect_integer("HSETNX", self.call("HSETNX", key, &[field, value])?)
    }

    fn hget(&self, key: &[u8], field: &[u8]) -> StoreResult<Option<Bytes>> {
        expect_optional_bulk("HGET", self.call("HGET", key, &[field])?)
    }

    fn hmget(&self, key: &[u8], fields: &[Bytes]) -> StoreResult<Vec<Option<Bytes>>> {
        let args: Vec<&[u8]> = fields.iter().map(|f| f.as_ref()).collect();
        let values = expect_array("HMGET", self.call("HMGET", key, &args)?)?
            .into_iter()
            .map(|item| expect_optional_bulk("HMGET", item))
            .collect::<StoreResult<Vec<_>>>()?;

        if values.len() != fields.len() {
            return Err(StoreFailure::unexpected(
                "HMGET",
                format!("{} values for {} fields", values.len(), fields.len()),
            ));
        }
        Ok(values)
    }

    fn hmset(&self, key: &[u8], entries: &[(Bytes, Bytes)]) -> StoreResult<()> {
        let mut args: Vec<&[u8]> = Vec::with_capacity(entries.len() * 2);
        for (field, value) in entries {
            args.push(field);
            args.push(value);
        }
        match self.call("HMSET", key, &args)? {
            RespValue::SimpleString(status) if status == "OK" => Ok(()),
            other => Err(StoreFailure::unexpected("HMSET", format!("expected OK, got {}", other))),
        }
    }

    fn hincrby(&self, key: &[u8], field: &[u8], delta: i64) -> StoreResult<i64> {
        let delta = delta.to_string();
        expect_integer("HINCRBY", self.call("HINCRBY", key, &[field, delta.as_bytes()])?)
    }

    fn hincrbyfloat(&self, key: &[u8], field: &[u8], delta: f64) -> StoreResult<f64> {
        let delta = delta.to_string();
        let reply = self.call("HINCRBYFLOAT", key, &[field, delta.as_bytes()])?;
        match expect_optional_bulk("HINCRBYFLOAT", reply)? {
            Some(text) => parse_float("HINCRBYFLOAT", &text),
            None => Err(StoreFailure::unexpected("HINCRBYFLOAT", "nil reply")),
        }
    }

    fn hrandfield(&self, key: &[u8]) -> StoreResult<Option<Bytes>> {
        expect_optional_bulk("HRANDFIELD", self.call("HRANDFIELD", key, &[])?)
    }

    fn hrandfield_count(&self, key: &[u8], count: i64) -> StoreResult<Vec<Bytes>> {
        let count = count.to_string();
        expect_bulks("HRANDFIELD", self.call("HRANDFIELD", key, &[count.as_bytes()])?)
    }

    fn hrandfield_with_values(&self, key: &[u8], count: i64) -> StoreResult<Vec<(Bytes, Bytes)>> {
        let count = count.to_string();
        let reply = self.call("HRANDFIELD", key, &[count.as_bytes(), b"WITHVALUES"])?;
        expect_pairs("HRANDFIELD", reply)
    }

    fn hexists(&self, key: &[u8], field: &[u8]) -> StoreResult<bool> {
        Ok(expect_integer("HEXISTS", self.call("HEXISTS", key, &[field])?)? == 1)
    }

    fn hdel(&self, key: &[u8], fields: &[Bytes]) -> StoreResult<i64> {
        let args: Vec<&[u8]> = fields.iter().map(|f| f.as_ref()).collect();
        expect_integer("HDEL", self.call("HDEL", key, &args)?)
    }

    fn hlen(&self, key: &[u8]) -> StoreResult<i64> {
        expect_integer("HLEN", self.call("HLEN", key, &[])?)
    }

    fn hkeys(&self, key: &[u8]) -> StoreResult<Vec<Bytes>> {
        expect_bulks("HKEYS", self.call("HKEYS", key, &[])?)
    }

    fn hvals(&self, key: &[u8]) -> StoreResult<Vec<Bytes>> {
        expect_bulks("HVALS", self.call("HVALS", key, &[])?)
    }

    fn hgetall(&self, key: &[u8]) -> StoreResult<Vec<(Bytes, Bytes)>> {
        expect_pairs("HGETALL", self.call("HGETALL", key, &[])?)
    }

    fn hscan(&self, key: &[u8], cursor: &[u8], params: &ScanParams) -> StoreResult<RawScanPage> {
        let extra = params.to_args();
        let mut args: Vec<&[u8]> = Vec::with_capacity(1 + extra.len());
        args.push(cursor);
        args.extend(extra.iter().map(|a| a.as_ref()));

        let mut parts = expect_array("HSCAN", self.call("HSCAN", key, &args)?)?.into_iter();
        let (Some(next), Some(entries), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(StoreFailure::unexpected("HSCAN", "expected [cursor, entries]"));
        };

        let next = next
            .into_bytes()
            .ok_or_else(|| StoreFailure::unexpected("HSCAN", "cursor is not a string"))?;
        Ok((next, expect_pairs("HSCAN", entries)?))
    }

    fn hstrlen(&self, key: &[u8], field: &[u8]) -> StoreResult<i64> {
        expect_integer("HSTRLEN", self.call("HSTRLEN", key, &[field])?)
    }
}
