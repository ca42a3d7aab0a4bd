//! Node Command Handler
//!
//! Executes RESP command frames against one node's [`HashStore`] and builds
//! the reply frame. This is the server half of the in-process cluster; the
//! client half is [`RespClient`](crate::client::RespClient).
//!
//! ## Supported Commands
//!
//! ### Hash Commands
//! - `HSET key field value [field value ...]` - Set fields, reply with the number added
//! - `HSETNX key field value` - Set a field if absent
//! - `HGET key field` / `HMGET key field [field ...]`
//! - `HMSET key field value [field value ...]` - Set fields, reply `OK`
//! - `HINCRBY key field increment` / `HINCRBYFLOAT key field increment`
//! - `HRANDFIELD key [count [WITHVALUES]]`
//! - `HEXISTS key field` / `HDEL key field [field ...]` / `HLEN key`
//! - `HKEYS key` / `HVALS key` / `HGETALL key` / `HSTRLEN key field`
//! - `HSCAN key cursor [MATCH pattern] [COUNT count]`
//!
//! ### Other Commands
//! - `SET key value` - Store a plain string, which hash commands reject

use crate::protocol::RespValue;
use crate::storage::{HashStore, StoreError, StoreOpResult, DEFAULT_SCAN_COUNT};
use bytes::Bytes;
use std::sync::Arc;

/// Executes commands against one node's store.
#[derive(Debug, Clone)]
pub struct NodeHandler {
    storage: Arc<HashStore>,
}

fn wrong_args(cmd: &str) -> RespValue {
    RespValue::error(format!("ERR wrong number of arguments for '{}' command", cmd))
}

/// Turns a store result into a reply; store errors become error replies.
fn reply<T>(result: StoreOpResult<T>, ok: impl FnOnce(T) -> RespValue) -> RespValue {
    match result {
        Ok(value) => ok(value),
        Err(err) => store_error(err),
    }
}

fn store_error(err: StoreError) -> RespValue {
    RespValue::error(err.to_string())
}

fn bulk_array(items: Vec<Bytes>) -> RespValue {
    RespValue::array(items.into_iter().map(RespValue::bulk_string).collect())
}

fn count_reply(n: u64) -> RespValue {
    RespValue::integer(n as i64)
}

impl NodeHandler {
    pub fn new(storage: Arc<HashStore>) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &Arc<HashStore> {
        &self.storage
    }

    /// Executes a command frame and returns the reply frame.
    pub fn execute(&self, command: RespValue) -> RespValue {
        let args = match command {
            RespValue::Array(args) => args,
            _ => return RespValue::error("ERR invalid command format"),
        };

        let Some(name) = args.first().and_then(RespValue::as_bytes) else {
            return RespValue::error("ERR empty command");
        };
        let cmd_name = String::from_utf8_lossy(name).to_uppercase();

        self.dispatch(&cmd_name, &args[1..])
    }

    fn dispatch(&self, cmd: &str, args: &[RespValue]) -> RespValue {
        match cmd {
            // Hash commands
            "HSET" => self.cmd_hset(args),
            "HSETNX" => self.cmd_hsetnx(args),
            "HGET" => self.cmd_hget(args),
            "HMGET" => self.cmd_hmget(args),
            "HMSET" => self.cmd_hmset(args),
            "HINCRBY" => self.cmd_hincrby(args),
            "HINCRBYFLOAT" => self.cmd_hincrbyfloat(args),
            "HRANDFIELD" => self.cmd_hrandfield(args),
            "HEXISTS" => self.cmd_hexists(args),
            "HDEL" => self.cmd_hdel(args),
            "HLEN" => self.cmd_hlen(args),
            "HKEYS" => self.cmd_hkeys(args),
            "HVALS" => self.cmd_hvals(args),
            "HGETALL" => self.cmd_hgetall(args),
            "HSTRLEN" => self.cmd_hstrlen(args),
            "HSCAN" => self.cmd_hscan(args),

            "SET" => self.cmd_set(args),

            _ => RespValue::error(format!("ERR unknown command '{}'", cmd)),
        }
    }

    // ========================================================================
    // Helper functions
    // ========================================================================

    fn get_bytes(&self, value: &RespValue) -> Option<Bytes> {
        match value {
            RespValue::BulkString(b) => Some(b.clone()),
            RespValue::SimpleString(s) => Some(Bytes::from(s.clone())),
            _ => None,
        }
    }

    fn get_integer(&self, value: &RespValue) -> Option<i64> {
        match value {
            RespValue::Integer(n) => Some(*n),
            other => std::str::from_utf8(other.as_bytes()?).ok()?.parse().ok(),
        }
    }

    fn get_float(&self, value: &RespValue) -> Option<f64> {
        let parsed: f64 = std::str::from_utf8(value.as_bytes()?).ok()?.parse().ok()?;
        parsed.is_finite().then_some(parsed)
    }

    /// Collects every argument as bytes, or `None` if any is not a string.
    fn all_bytes(&self, args: &[RespValue]) -> Option<Vec<Bytes>> {
        args.iter().map(|arg| self.get_bytes(arg)).collect()
    }

    /// Parses `field value [field value ...]`.
    fn field_value_pairs(&self, args: &[RespValue]) -> Option<Vec<(Bytes, Bytes)>> {
        if args.is_empty() || args.len() % 2 != 0 {
            return None;
        }
        args.chunks_exact(2)
            .map(|pair| Some((self.get_bytes(&pair[0])?, self.get_bytes(&pair[1])?)))
            .collect()
    }

    fn key_and_field(&self, cmd: &str, args: &[RespValue]) -> Result<(Bytes, Bytes), RespValue> {
        if args.len() != 2 {
            return Err(wrong_args(cmd));
        }
        match (self.get_bytes(&args[0]), self.get_bytes(&args[1])) {
            (Some(key), Some(field)) => Ok((key, field)),
            _ => Err(RespValue::error("ERR invalid key or field")),
        }
    }

    fn single_key(&self, cmd: &str, args: &[RespValue]) -> Result<Bytes, RespValue> {
        if args.len() != 1 {
            return Err(wrong_args(cmd));
        }
        self.get_bytes(&args[0])
            .ok_or_else(|| RespValue::error("ERR invalid key"))
    }

    // ========================================================================
    // Hash commands
    // ========================================================================

    fn cmd_hset(&self, args: &[RespValue]) -> RespValue {
        self.set_fields("HSET", args, count_reply)
    }

    fn cmd_hmset(&self, args: &[RespValue]) -> RespValue {
        self.set_fields("HMSET", args, |_| RespValue::ok())
    }

    fn set_fields(
        &self,
        cmd: &str,
        args: &[RespValue],
        ok: impl FnOnce(u64) -> RespValue,
    ) -> RespValue {
        if args.len() < 3 {
            return wrong_args(cmd);
        }
        let Some(key) = self.get_bytes(&args[0]) else {
            return RespValue::error("ERR invalid key");
        };
        let Some(entries) = self.field_value_pairs(&args[1..]) else {
            return wrong_args(cmd);
        };
        reply(self.storage.hset(&key, entries), ok)
    }

    fn cmd_hsetnx(&self, args: &[RespValue]) -> RespValue {
        if args.len() != 3 {
            return wrong_args("HSETNX");
        }
        let (Some(key), Some(field), Some(value)) = (
            self.get_bytes(&args[0]),
            self.get_bytes(&args[1]),
            self.get_bytes(&args[2]),
        ) else {
            return RespValue::error("ERR invalid argument");
        };
        reply(self.storage.hsetnx(&key, field, value), |set| {
            RespValue::integer(i64::from(set))
        })
    }

    fn cmd_hget(&self, args: &[RespValue]) -> RespValue {
        let (key, field) = match self.key_and_field("HGET", args) {
            Ok(parts) => parts,
            Err(e) => return e,
        };
        reply(self.storage.hget(&key, &field), |value| match value {
            Some(v) => RespValue::bulk_string(v),
            None => RespValue::null(),
        })
    }

    fn cmd_hmget(&self, args: &[RespValue]) -> RespValue {
        if args.len() < 2 {
            return wrong_args("HMGET");
        }
        let Some(mut parts) = self.all_bytes(args) else {
            return RespValue::error("ERR invalid argument");
        };
        let fields = parts.split_off(1);
        reply(self.storage.hmget(&parts[0], &fields), |values| {
            RespValue::array(
                values
                    .into_iter()
                    .map(|v| v.map_or_else(RespValue::null, RespValue::bulk_string))
                    .collect(),
            )
        })
    }

    fn cmd_hincrby(&self, args: &[RespValue]) -> RespValue {
        if args.len() != 3 {
            return wrong_args("HINCRBY");
        }
        let (Some(key), Some(field)) = (self.get_bytes(&args[0]), self.get_bytes(&args[1])) else {
            return RespValue::error("ERR invalid key or field");
        };
        let Some(delta) = self.get_integer(&args[2]) else {
            return RespValue::error("ERR value is not an integer or out of range");
        };
        reply(self.storage.hincrby(&key, field, delta), RespValue::integer)
    }

    fn cmd_hincrbyfloat(&self, args: &[RespValue]) -> RespValue {
        if args.len() != 3 {
            return wrong_args("HINCRBYFLOAT");
        }
        let (Some(key), Some(field)) = (self.get_bytes(&args[0]), self.get_bytes(&args[1])) else {
            return RespValue::error("ERR invalid key or field");
        };
        let Some(delta) = self.get_float(&args[2]) else {
            return RespValue::error("ERR value is not a valid float");
        };
        reply(self.storage.hincrbyfloat(&key, field, delta), |value| {
            RespValue::bulk_string(value.to_string())
        })
    }

    fn cmd_hrandfield(&self, args: &[RespValue]) -> RespValue {
        if args.is_empty() || args.len() > 3 {
            return wrong_args("HRANDFIELD");
        }
        let Some(key) = self.get_bytes(&args[0]) else {
            return RespValue::error("ERR invalid key");
        };

        let Some(count_arg) = args.get(1) else {
            return reply(self.storage.hrandfield(&key), |field| match field {
                Some(f) => RespValue::bulk_string(f),
                None => RespValue::null(),
            });
        };
        let Some(count) = self.get_integer(count_arg) else {
            return RespValue::error("ERR value is not an integer or out of range");
        };

        let with_values = match args.get(2).and_then(RespValue::as_bytes) {
            None if args.len() == 2 => false,
            Some(opt) if opt.eq_ignore_ascii_case(b"WITHVALUES") => true,
            _ => return RespValue::error("ERR syntax error"),
        };

        reply(self.storage.hrandfield_count(&key, count), |entries| {
            if with_values {
                RespValue::flat_pairs(entries)
            } else {
                bulk_array(entries.into_iter().map(|(field, _)| field).collect())
            }
        })
    }

    fn cmd_hexists(&self, args: &[RespValue]) -> RespValue {
        let (key, field) = match self.key_and_field("HEXISTS", args) {
            Ok(parts) => parts,
            Err(e) => return e,
        };
        reply(self.storage.hexists(&key, &field), |exists| {
            RespValue::integer(i64::from(exists))
        })
    }

    fn cmd_hdel(&self, args: &[RespValue]) -> RespValue {
        if args.len() < 2 {
            return wrong_args("HDEL");
        }
        let Some(mut parts) = self.all_bytes(args) else {
            return RespValue::error("ERR invalid argument");
        };
        let fields = parts.split_off(1);
        reply(self.storage.hdel(&parts[0], &fields), count_reply)
    }

    fn cmd_hlen(&self, args: &[RespValue]) -> RespValue {
        match self.single_key("HLEN", args) {
            Ok(key) => reply(self.storage.hlen(&key), count_reply),
            Err(e) => e,
        }
    }

    fn cmd_hkeys(&self, args: &[RespValue]) -> RespValue {
        match self.single_key("HKEYS", args) {
            Ok(key) => reply(self.storage.hkeys(&key), bulk_array),
            Err(e) => e,
        }
    }

    fn cmd_hvals(&self, args: &[RespValue]) -> RespValue {
        match self.single_key("HVALS", args) {
            Ok(key) => reply(self.storage.hvals(&key), bulk_array),
            Err(e) => e,
        }
    }

    fn cmd_hgetall(&self, args: &[RespValue]) -> RespValue {
        match self.single_key("HGETALL", args) {
            Ok(key) => reply(self.storage.hgetall(&key), RespValue::flat_pairs),
            Err(e) => e,
        }
    }

    fn cmd_hstrlen(&self, args: &[RespValue]) -> RespValue {
        let (key, field) = match self.key_and_field("HSTRLEN", args) {
            Ok(parts) => parts,
            Err(e) => return e,
        };
        reply(self.storage.hstrlen(&key, &field), count_reply)
    }

    fn cmd_hscan(&self, args: &[RespValue]) -> RespValue {
        if args.len() < 2 {
            return wrong_args("HSCAN");
        }
        let Some(key) = self.get_bytes(&args[0]) else {
            return RespValue::error("ERR invalid key");
        };
        let cursor = match args[1].as_bytes().map(std::str::from_utf8) {
            Some(Ok(text)) if text.bytes().all(|b| b.is_ascii_digit()) => {
                match text.parse::<u64>() {
                    Ok(c) => c,
                    Err(_) => return store_error(StoreError::InvalidCursor),
                }
            }
            _ => return store_error(StoreError::InvalidCursor),
        };

        let mut pattern: Option<Bytes> = None;
        let mut count = DEFAULT_SCAN_COUNT;

        let mut i = 2;
        while i < args.len() {
            let Some(opt) = args[i].as_bytes() else {
                return RespValue::error("ERR syntax error");
            };
            let Some(value) = args.get(i + 1) else {
                return RespValue::error("ERR syntax error");
            };

            if opt.eq_ignore_ascii_case(b"MATCH") {
                pattern = self.get_bytes(value);
            } else if opt.eq_ignore_ascii_case(b"COUNT") {
                count = match self.get_integer(value) {
                    Some(n) if n >= 1 => n as usize,
                    Some(_) => return RespValue::error("ERR syntax error"),
                    None => {
                        return RespValue::error("ERR value is not an integer or out of range")
                    }
                };
            } else {
                return RespValue::error("ERR syntax error");
            }
            i += 2;
        }

        reply(
            self.storage.hscan(&key, cursor, pattern.as_deref(), count),
            |page| {
                RespValue::array(vec![
                    RespValue::bulk_string(page.cursor.to_string()),
                    RespValue::flat_pairs(page.entries),
                ])
            },
        )
    }

    // ========================================================================
    // Strings
    // ========================================================================

    fn cmd_set(&self, args: &[RespValue]) -> RespValue {
        if args.len() != 2 {
            return wrong_args("SET");
        }
        let (Some(key), Some(value)) = (self.get_bytes(&args[0]), self.get_bytes(&args[1])) else {
            return RespValue::error("ERR invalid key or value");
        };
        self.storage.set(key, value);
        RespValue::ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_handler() -> NodeHandler {
        NodeHandler::new(Arc::new(HashStore::with_seed(4, 42)))
    }

    fn make_command(args: &[&str]) -> RespValue {
        RespValue::Array(
            args.iter()
                .map(|s| RespValue::bulk_string(Bytes::from(s.to_string())))
                .collect(),
        )
    }

    fn items(reply: RespValue) -> Vec<RespValue> {
        match reply {
            RespValue::Array(items) => items,
            other => panic!("expected array reply, got {:?}", other),
        }
    }

    fn bulk(s: &str) -> RespValue {
        RespValue::bulk_string(Bytes::from(s.to_string()))
    }

    #[test]
    fn test_hset_hget() {
        let handler = create_handler();

        let response = handler.execute(make_command(&["HSET", "h", "a", "1", "b", "2"]));
        assert_eq!(response, RespValue::integer(2));

        let response = handler.execute(make_command(&["HSET", "h", "a", "3"]));
        assert_eq!(response, RespValue::integer(0));

        assert_eq!(handler.execute(make_command(&["HGET", "h", "a"])), bulk("3"));
        assert_eq!(handler.execute(make_command(&["HGET", "h", "z"])), RespValue::null());
    }

    #[test]
    fn test_arity_errors() {
        let handler = create_handler();

        let response = handler.execute(make_command(&["HSET", "h", "a"]));
        assert_eq!(
            response,
            RespValue::error("ERR wrong number of arguments for 'HSET' command")
        );

        let response = handler.execute(make_command(&["HMSET", "h", "a", "1", "b"]));
        assert!(response.is_error());

        let response = handler.execute(make_command(&["HDEL", "h"]));
        assert!(response.is_error());

        let response = handler.execute(make_command(&["HMGET", "h"]));
        assert!(response.is_error());
    }

    #[test]
    fn test_hmset_hmget() {
        let handler = create_handler();

        let response = handler.execute(make_command(&["HMSET", "h", "a", "1", "b", "2"]));
        assert_eq!(response, RespValue::ok());

        let response = handler.execute(make_command(&["HMGET", "h", "b", "x", "a"]));
        assert_eq!(
            response,
            RespValue::array(vec![bulk("2"), RespValue::null(), bulk("1")])
        );
    }

    #[test]
    fn test_hsetnx_hexists() {
        let handler = create_handler();

        assert_eq!(
            handler.execute(make_command(&["HSETNX", "h", "f", "1"])),
            RespValue::integer(1)
        );
        assert_eq!(
            handler.execute(make_command(&["HSETNX", "h", "f", "2"])),
            RespValue::integer(0)
        );
        assert_eq!(
            handler.execute(make_command(&["HEXISTS", "h", "f"])),
            RespValue::integer(1)
        );
        assert_eq!(
            handler.execute(make_command(&["HEXISTS", "h", "g"])),
            RespValue::integer(0)
        );
    }

    #[test]
    fn test_increments() {
        let handler = create_handler();

        assert_eq!(
            handler.execute(make_command(&["HINCRBY", "h", "n", "5"])),
            RespValue::integer(5)
        );
        assert_eq!(
            handler.execute(make_command(&["HINCRBYFLOAT", "h", "n", "0.5"])),
            bulk("5.5")
        );

        let response = handler.execute(make_command(&["HINCRBY", "h", "n", "1"]));
        assert_eq!(response, RespValue::error("ERR hash value is not an integer"));

        let response = handler.execute(make_command(&["HINCRBY", "h", "n", "abc"]));
        assert_eq!(
            response,
            RespValue::error("ERR value is not an integer or out of range")
        );

        let response = handler.execute(make_command(&["HINCRBYFLOAT", "h", "n", "nan"]));
        assert_eq!(response, RespValue::error("ERR value is not a valid float"));

        handler.execute(make_command(&["HSET", "h", "s", "text"]));
        let response = handler.execute(make_command(&["HINCRBYFLOAT", "h", "s", "1"]));
        assert_eq!(response, RespValue::error("ERR hash value is not a float"));
    }

    #[test]
    fn test_hdel_hlen_scenario() {
        let handler = create_handler();

        handler.execute(make_command(&["HSET", "h", "a", "1", "b", "2"]));
        assert_eq!(handler.execute(make_command(&["HLEN", "h"])), RespValue::integer(2));
        assert_eq!(
            handler.execute(make_command(&["HDEL", "h", "a"])),
            RespValue::integer(1)
        );
        assert_eq!(handler.execute(make_command(&["HGET", "h", "a"])), RespValue::null());
        assert_eq!(handler.execute(make_command(&["HLEN", "h"])), RespValue::integer(1));
    }

    #[test]
    fn test_enumeration() {
        let handler = create_handler();
        handler.execute(make_command(&["HSET", "h", "a", "1", "b", "22"]));

        assert_eq!(
            handler.execute(make_command(&["HKEYS", "h"])),
            RespValue::array(vec![bulk("a"), bulk("b")])
        );
        assert_eq!(
            handler.execute(make_command(&["HVALS", "h"])),
            RespValue::array(vec![bulk("1"), bulk("22")])
        );
        assert_eq!(
            handler.execute(make_command(&["HGETALL", "h"])),
            RespValue::array(vec![bulk("a"), bulk("1"), bulk("b"), bulk("22")])
        );
        assert_eq!(
            handler.execute(make_command(&["HSTRLEN", "h", "b"])),
            RespValue::integer(2)
        );
        assert_eq!(
            handler.execute(make_command(&["HGETALL", "nope"])),
            RespValue::array(vec![])
        );
    }

    #[test]
    fn test_hrandfield_shapes() {
        let handler = create_handler();

        assert_eq!(
            handler.execute(make_command(&["HRANDFIELD", "h"])),
            RespValue::null()
        );
        assert_eq!(
            handler.execute(make_command(&["HRANDFIELD", "h", "2"])),
            RespValue::array(vec![])
        );

        handler.execute(make_command(&["HSET", "h", "a", "1", "b", "2"]));

        let one = handler.execute(make_command(&["HRANDFIELD", "h"]));
        assert!(one == bulk("a") || one == bulk("b"));

        let with_values = items(handler.execute(make_command(&[
            "HRANDFIELD", "h", "-3", "WITHVALUES",
        ])));
        assert_eq!(with_values.len(), 6);

        let response = handler.execute(make_command(&["HRANDFIELD", "h", "1", "BOGUS"]));
        assert_eq!(response, RespValue::error("ERR syntax error"));

        let response = handler.execute(make_command(&[
            "HRANDFIELD",
            "h",
            "-9223372036854775808",
        ]));
        assert_eq!(response, RespValue::error("ERR value is out of range"));
    }

    #[test]
    fn test_hscan_pages() {
        let handler = create_handler();
        handler.execute(make_command(&["HSET", "h", "a", "1", "b", "2", "c", "3"]));

        let page = items(handler.execute(make_command(&["HSCAN", "h", "0", "COUNT", "2"])));
        assert_eq!(page.len(), 2);
        let cursor = page[0].as_bytes().unwrap().to_vec();
        assert_eq!(cursor, b"9223372036854775810".to_vec());
        assert_eq!(page[1], RespValue::array(vec![bulk("a"), bulk("1"), bulk("b"), bulk("2")]));

        let cursor = String::from_utf8(cursor).unwrap();
        let page = items(handler.execute(make_command(&[
            "HSCAN",
            "h",
            cursor.as_str(),
            "MATCH",
            "c*",
            "COUNT",
            "2",
        ])));
        assert_eq!(page[0], bulk("0"));
        assert_eq!(page[1], RespValue::array(vec![bulk("c"), bulk("3")]));
    }

    #[test]
    fn test_hscan_bad_arguments() {
        let handler = create_handler();

        let response = handler.execute(make_command(&["HSCAN", "h", "-1"]));
        assert_eq!(response, RespValue::error("ERR invalid cursor"));

        let response = handler.execute(make_command(&["HSCAN", "h", "0", "COUNT", "0"]));
        assert_eq!(response, RespValue::error("ERR syntax error"));

        let response = handler.execute(make_command(&["HSCAN", "h", "0", "LIMIT", "5"]));
        assert_eq!(response, RespValue::error("ERR syntax error"));

        let response = handler.execute(make_command(&["HSCAN", "h", "0", "MATCH"]));
        assert_eq!(response, RespValue::error("ERR syntax error"));
    }

    #[test]
    fn test_wrong_type_reply() {
        let handler = create_handler();

        assert_eq!(handler.execute(make_command(&["SET", "s", "v"])), RespValue::ok());

        let response = handler.execute(make_command(&["HGET", "s", "f"]));
        assert_eq!(
            response,
            RespValue::error("WRONGTYPE Operation against a key holding the wrong kind of value")
        );
    }

    #[test]
    fn test_unknown_command() {
        let handler = create_handler();

        let response = handler.execute(make_command(&["HFOO", "h"]));
        assert_eq!(response, RespValue::error("ERR unknown command 'HFOO'"));

        let response = handler.execute(RespValue::integer(1));
        assert!(response.is_error());
    }
}
