//! Command definitions and dispatch
//!
//! A request's argument list is turned into a typed [`Command`] up front, so
//! arity and argument errors surface before the keyspace is touched. The
//! parsed command then runs against a `Keyspace` under the caller's lock and
//! yields exactly one [`Response`].

use crate::error::{CellStoreError, Result};
use crate::parse::Parse;
use crate::protocol::Response;
use crate::store::{Key, Keyspace};
use crate::types::list::InsertPosition;
use crate::types::{hash, list, set, string};

/// Commands supported by the cellstore protocol
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    // keyspace
    Ping(Option<Vec<u8>>),
    Exists(Vec<Key>),
    Type(Key),
    Del(Vec<Key>),
    Expire { key: Key, seconds: i64 },
    PExpire { key: Key, millis: i64 },
    Persist(Key),
    Ttl(Key),
    PTtl(Key),
    DbSize,
    FlushDb,

    // strings
    Append { key: Key, value: Vec<u8> },
    Set { key: Key, value: Vec<u8>, expire_ms: Option<i64> },
    SetNx { key: Key, value: Vec<u8> },
    StrLen(Key),
    MSet(Vec<(Key, Vec<u8>)>),
    MSetNx(Vec<(Key, Vec<u8>)>),
    Get(Key),
    GetRange { key: Key, start: i64, end: i64 },
    MGet(Vec<Key>),
    Incr(Key),
    IncrBy { key: Key, delta: i64 },
    IncrByFloat { key: Key, delta: f64 },
    Decr(Key),
    DecrBy { key: Key, delta: i64 },

    // lists
    RPush { key: Key, values: Vec<Vec<u8>> },
    LPush { key: Key, values: Vec<Vec<u8>> },
    RPushX { key: Key, values: Vec<Vec<u8>> },
    LRange { key: Key, start: i64, stop: i64 },
    LIndex { key: Key, index: i64 },
    LInsert { key: Key, position: InsertPosition, pivot: Vec<u8>, value: Vec<u8> },
    LLen(Key),
    LPop(Key),
    RPop(Key),
    LSet { key: Key, index: i64, value: Vec<u8> },
    LTrim { key: Key, start: i64, stop: i64 },
    RPopLPush { source: Key, destination: Key },

    // sets
    SAdd { key: Key, members: Vec<Vec<u8>> },
    SMembers(Key),
    SIsMember { key: Key, member: Vec<u8> },
    SCard(Key),
    SRem { key: Key, members: Vec<Vec<u8>> },
    SUnion(Vec<Key>),
    SInter(Vec<Key>),

    // hashes
    HSet { key: Key, pairs: Vec<(Vec<u8>, Vec<u8>)> },
    HSetNx { key: Key, field: Vec<u8>, value: Vec<u8> },
    HMSet { key: Key, pairs: Vec<(Vec<u8>, Vec<u8>)> },
    HGet { key: Key, field: Vec<u8> },
    HGetAll(Key),
    HExists { key: Key, field: Vec<u8> },
    HKeys(Key),
    HLen(Key),
    HVals(Key),
    HDel { key: Key, fields: Vec<Vec<u8>> },
}

impl Command {
    /// Build a command from a request's arguments (name first)
    pub fn from_args(args: Vec<Vec<u8>>) -> Result<Command> {
        let mut args = args.into_iter();
        let name = args
            .next()
            .ok_or_else(|| CellStoreError::Protocol("empty command".to_string()))?;
        let name = String::from_utf8_lossy(&name).to_ascii_lowercase();
        let mut p = Parse::new(&name, args.collect());

        let command = match name.as_str() {
            "ping" => Command::Ping(p.next_optional()),
            "exists" => Command::Exists(p.rest(1)?),
            "type" => Command::Type(p.next_bytes()?),
            "del" => Command::Del(p.rest(1)?),
            "expire" => Command::Expire {
                key: p.next_bytes()?,
                seconds: p.next_int()?,
            },
            "pexpire" => Command::PExpire {
                key: p.next_bytes()?,
                millis: p.next_int()?,
            },
            "persist" => Command::Persist(p.next_bytes()?),
            "ttl" => Command::Ttl(p.next_bytes()?),
            "pttl" => Command::PTtl(p.next_bytes()?),
            "dbsize" => Command::DbSize,
            "flushdb" => Command::FlushDb,

            "append" => Command::Append {
                key: p.next_bytes()?,
                value: p.next_bytes()?,
            },
            "set" => parse_set(&mut p)?,
            "setnx" => Command::SetNx {
                key: p.next_bytes()?,
                value: p.next_bytes()?,
            },
            "strlen" => Command::StrLen(p.next_bytes()?),
            "mset" => Command::MSet(p.pairs()?),
            "msetnx" => Command::MSetNx(p.pairs()?),
            "get" => Command::Get(p.next_bytes()?),
            "getrange" => Command::GetRange {
                key: p.next_bytes()?,
                start: p.next_int()?,
                end: p.next_int()?,
            },
            "mget" => Command::MGet(p.rest(1)?),
            "incr" => Command::Incr(p.next_bytes()?),
            "incrby" => Command::IncrBy {
                key: p.next_bytes()?,
                delta: p.next_int()?,
            },
            "incrbyfloat" => Command::IncrByFloat {
                key: p.next_bytes()?,
                delta: p.next_float()?,
            },
            "decr" => Command::Decr(p.next_bytes()?),
            "decrby" => Command::DecrBy {
                key: p.next_bytes()?,
                delta: p.next_int()?,
            },

            "rpush" => Command::RPush {
                key: p.next_bytes()?,
                values: p.rest(1)?,
            },
            "lpush" => Command::LPush {
                key: p.next_bytes()?,
                values: p.rest(1)?,
            },
            "rpushx" => Command::RPushX {
                key: p.next_bytes()?,
                values: p.rest(1)?,
            },
            "lrange" => Command::LRange {
                key: p.next_bytes()?,
                start: p.next_int()?,
                stop: p.next_int()?,
            },
            "lindex" => Command::LIndex {
                key: p.next_bytes()?,
                index: p.next_int()?,
            },
            "linsert" => Command::LInsert {
                key: p.next_bytes()?,
                position: p.next_string()?.parse()?,
                pivot: p.next_bytes()?,
                value: p.next_bytes()?,
            },
            "llen" => Command::LLen(p.next_bytes()?),
            "lpop" => Command::LPop(p.next_bytes()?),
            "rpop" => Command::RPop(p.next_bytes()?),
            "lset" => Command::LSet {
                key: p.next_bytes()?,
                index: p.next_int()?,
                value: p.next_bytes()?,
            },
            "ltrim" => Command::LTrim {
                key: p.next_bytes()?,
                start: p.next_int()?,
                stop: p.next_int()?,
            },
            "rpoplpush" => Command::RPopLPush {
                source: p.next_bytes()?,
                destination: p.next_bytes()?,
            },

            "sadd" => Command::SAdd {
                key: p.next_bytes()?,
                members: p.rest(1)?,
            },
            "smembers" => Command::SMembers(p.next_bytes()?),
            "sismember" => Command::SIsMember {
                key: p.next_bytes()?,
                member: p.next_bytes()?,
            },
            "scard" => Command::SCard(p.next_bytes()?),
            "srem" => Command::SRem {
                key: p.next_bytes()?,
                members: p.rest(1)?,
            },
            "sunion" => Command::SUnion(p.rest(1)?),
            "sinter" => Command::SInter(p.rest(1)?),

            "hset" => Command::HSet {
                key: p.next_bytes()?,
                pairs: p.pairs()?,
            },
            "hsetnx" => Command::HSetNx {
                key: p.next_bytes()?,
                field: p.next_bytes()?,
                value: p.next_bytes()?,
            },
            "hmset" => Command::HMSet {
                key: p.next_bytes()?,
                pairs: p.pairs()?,
            },
            "hget" => Command::HGet {
                key: p.next_bytes()?,
                field: p.next_bytes()?,
            },
            "hgetall" => Command::HGetAll(p.next_bytes()?),
            "hexists" => Command::HExists {
                key: p.next_bytes()?,
                field: p.next_bytes()?,
            },
            "hkeys" => Command::HKeys(p.next_bytes()?),
            "hlen" => Command::HLen(p.next_bytes()?),
            "hvals" => Command::HVals(p.next_bytes()?),
            "hdel" => Command::HDel {
                key: p.next_bytes()?,
                fields: p.rest(1)?,
            },

            _ => return Err(CellStoreError::UnknownCommand(name)),
        };

        p.finish()?;
        Ok(command)
    }

    /// Lowercase command name, for logging
    pub fn name(&self) -> &'static str {
        match self {
            Command::Ping(_) => "ping",
            Command::Exists(_) => "exists",
            Command::Type(_) => "type",
            Command::Del(_) => "del",
            Command::Expire { .. } => "expire",
            Command::PExpire { .. } => "pexpire",
            Command::Persist(_) => "persist",
            Command::Ttl(_) => "ttl",
            Command::PTtl(_) => "pttl",
            Command::DbSize => "dbsize",
            Command::FlushDb => "flushdb",
            Command::Append { .. } => "append",
            Command::Set { .. } => "set",
            Command::SetNx { .. } => "setnx",
            Command::StrLen(_) => "strlen",
            Command::MSet(_) => "mset",
            Command::MSetNx(_) => "msetnx",
            Command::Get(_) => "get",
            Command::GetRange { .. } => "getrange",
            Command::MGet(_) => "mget",
            Command::Incr(_) => "incr",
            Command::IncrBy { .. } => "incrby",
            Command::IncrByFloat { .. } => "incrbyfloat",
            Command::Decr(_) => "decr",
            Command::DecrBy { .. } => "decrby",
            Command::RPush { .. } => "rpush",
            Command::LPush { .. } => "lpush",
            Command::RPushX { .. } => "rpushx",
            Command::LRange { .. } => "lrange",
            Command::LIndex { .. } => "lindex",
            Command::LInsert { .. } => "linsert",
            Command::LLen(_) => "llen",
            Command::LPop(_) => "lpop",
            Command::RPop(_) => "rpop",
            Command::LSet { .. } => "lset",
            Command::LTrim { .. } => "ltrim",
            Command::RPopLPush { .. } => "rpoplpush",
            Command::SAdd { .. } => "sadd",
            Command::SMembers(_) => "smembers",
            Command::SIsMember { .. } => "sismember",
            Command::SCard(_) => "scard",
            Command::SRem { .. } => "srem",
            Command::SUnion(_) => "sunion",
            Command::SInter(_) => "sinter",
            Command::HSet { .. } => "hset",
            Command::HSetNx { .. } => "hsetnx",
            Command::HMSet { .. } => "hmset",
            Command::HGet { .. } => "hget",
            Command::HGetAll(_) => "hgetall",
            Command::HExists { .. } => "hexists",
            Command::HKeys(_) => "hkeys",
            Command::HLen(_) => "hlen",
            Command::HVals(_) => "hvals",
            Command::HDel { .. } => "hdel",
        }
    }

    /// Run the command. Failures become error responses; the keyspace is
    /// left as it was before the command.
    pub fn execute(self, ks: &mut Keyspace) -> Response {
        self.apply(ks).unwrap_or_else(Response::from)
    }

    fn apply(self, ks: &mut Keyspace) -> Result<Response> {
        let response = match self {
            Command::Ping(None) => Response::Simple("PONG".to_string()),
            Command::Ping(Some(msg)) => Response::Bulk(msg),
            Command::Exists(keys) => count(keys.iter().filter(|key| ks.exists(key)).count()),
            Command::Type(key) => Response::Simple(
                ks.type_of(&key).map_or("none", |kind| kind.as_str()).to_string(),
            ),
            Command::Del(keys) => count(string::del(ks, &keys)),
            Command::Expire { key, seconds } => flag(string::expire(ks, &key, seconds)),
            Command::PExpire { key, millis } => flag(string::pexpire(ks, &key, millis)),
            Command::Persist(key) => flag(string::persist(ks, &key)),
            Command::Ttl(key) => Response::Integer(string::ttl(ks, &key)),
            Command::PTtl(key) => Response::Integer(string::pttl(ks, &key)),
            Command::DbSize => count(ks.len()),
            Command::FlushDb => {
                ks.clear();
                Response::Ok
            }

            Command::Append { key, value } => count(string::append(ks, &key, &value)?),
            Command::Set { key, value, expire_ms } => {
                string::set(ks, &key, value);
                if let Some(millis) = expire_ms {
                    string::pexpire(ks, &key, millis);
                }
                Response::Ok
            }
            Command::SetNx { key, value } => flag(string::setnx(ks, &key, value)),
            Command::StrLen(key) => count(string::strlen(ks, &key)?),
            Command::MSet(pairs) => {
                string::mset(ks, pairs);
                Response::Ok
            }
            Command::MSetNx(pairs) => flag(string::msetnx(ks, pairs)),
            Command::Get(key) => Response::bulk_or_null(string::get(ks, &key)),
            Command::GetRange { key, start, end } => {
                Response::Bulk(string::getrange(ks, &key, start, end)?)
            }
            Command::MGet(keys) => Response::Array(
                string::mget(ks, &keys)
                    .into_iter()
                    .map(Response::bulk_or_null)
                    .collect(),
            ),
            Command::Incr(key) => Response::Integer(string::incr(ks, &key)?),
            Command::IncrBy { key, delta } => Response::Integer(string::incr_by(ks, &key, delta)?),
            Command::IncrByFloat { key, delta } => {
                let value = string::incr_by_float(ks, &key, delta)?;
                Response::Bulk(string::format_float(value).into_bytes())
            }
            Command::Decr(key) => Response::Integer(string::decr(ks, &key)?),
            Command::DecrBy { key, delta } => Response::Integer(string::decr_by(ks, &key, delta)?),

            Command::RPush { key, values } => count(list::rpush(ks, &key, values)?),
            Command::LPush { key, values } => count(list::lpush(ks, &key, values)?),
            Command::RPushX { key, values } => count(list::rpushx(ks, &key, values)?),
            Command::LRange { key, start, stop } => {
                Response::bulk_array(list::lrange(ks, &key, start, stop)?)
            }
            Command::LIndex { key, index } => Response::bulk_or_null(list::lindex(ks, &key, index)?),
            Command::LInsert {
                key,
                position,
                pivot,
                value,
            } => Response::Integer(list::linsert(ks, &key, position, &pivot, value)?),
            Command::LLen(key) => count(list::llen(ks, &key)?),
            Command::LPop(key) => Response::bulk_or_null(list::lpop(ks, &key)?),
            Command::RPop(key) => Response::bulk_or_null(list::rpop(ks, &key)?),
            Command::LSet { key, index, value } => {
                list::lset(ks, &key, index, value)?;
                Response::Ok
            }
            Command::LTrim { key, start, stop } => {
                list::ltrim(ks, &key, start, stop)?;
                Response::Ok
            }
            Command::RPopLPush {
                source,
                destination,
            } => Response::bulk_or_null(list::rpoplpush(ks, &source, &destination)?),

            Command::SAdd { key, members } => count(set::sadd(ks, &key, members)?),
            Command::SMembers(key) => Response::bulk_array(set::smembers(ks, &key)?),
            Command::SIsMember { key, member } => flag(set::sismember(ks, &key, &member)?),
            Command::SCard(key) => count(set::scard(ks, &key)?),
            Command::SRem { key, members } => count(set::srem(ks, &key, &members)?),
            Command::SUnion(keys) => Response::bulk_array(set::sunion(ks, &keys)?),
            Command::SInter(keys) => Response::bulk_array(set::sinter(ks, &keys)?),

            Command::HSet { key, pairs } => count(hash::hset(ks, &key, pairs)?),
            Command::HSetNx { key, field, value } => flag(hash::hsetnx(ks, &key, field, value)?),
            Command::HMSet { key, pairs } => {
                hash::hmset(ks, &key, pairs)?;
                Response::Ok
            }
            Command::HGet { key, field } => Response::bulk_or_null(hash::hget(ks, &key, &field)?),
            Command::HGetAll(key) => Response::Map(hash::hgetall(ks, &key)?),
            Command::HExists { key, field } => flag(hash::hexists(ks, &key, &field)?),
            Command::HKeys(key) => Response::bulk_array(hash::hkeys(ks, &key)?),
            Command::HLen(key) => count(hash::hlen(ks, &key)?),
            Command::HVals(key) => Response::bulk_array(hash::hvals(ks, &key)?),
            Command::HDel { key, fields } => count(hash::hdel(ks, &key, &fields)?),
        };
        Ok(response)
    }
}

/// `SET key value [EX seconds | PX milliseconds]`
fn parse_set(p: &mut Parse) -> Result<Command> {
    let key = p.next_bytes()?;
    let value = p.next_bytes()?;
    let mut expire_ms = None;

    while p.remaining() > 0 {
        if expire_ms.is_some() {
            return Err(CellStoreError::Syntax);
        }
        let option = p.next_string()?.to_ascii_uppercase();
        let amount = match option.as_str() {
            "EX" => p.next_int()?.checked_mul(1000),
            "PX" => Some(p.next_int()?),
            _ => return Err(CellStoreError::Syntax),
        };
        match amount {
            Some(ms) if ms > 0 => expire_ms = Some(ms),
            _ => return Err(CellStoreError::InvalidExpire("set".to_string())),
        }
    }

    Ok(Command::Set {
        key,
        value,
        expire_ms,
    })
}

fn count(n: usize) -> Response {
    Response::Integer(i64::try_from(n).unwrap_or(i64::MAX))
}

fn flag(b: bool) -> Response {
    Response::Integer(i64::from(b))
}
