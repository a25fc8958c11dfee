//! Client library for connecting to a cellstore server
//!
//! `call` sends any command as raw arguments and returns the decoded reply.
//! The typed methods wrap `call` and turn error replies into
//! `CellStoreError::Server`.

use crate::error::{CellStoreError, Result};
use crate::protocol::{encode_request, parse_response, Response};
use bytes::{Buf, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufWriter};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpStream, ToSocketAddrs};

/// Client for connecting to a cellstore server
pub struct Client {
    reader: OwnedReadHalf,
    writer: BufWriter<OwnedWriteHalf>,
    buffer: BytesMut,
}

type Pairs = Vec<(Vec<u8>, Vec<u8>)>;

impl Client {
    /// Connect to a cellstore server
    pub async fn connect(addr: impl ToSocketAddrs) -> Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        let (reader, writer) = stream.into_split();

        Ok(Self {
            reader,
            writer: BufWriter::new(writer),
            buffer: BytesMut::with_capacity(4096),
        })
    }

    /// Send one command and wait for its reply. Error replies are returned
    /// as `Response::Error`, not as `Err`.
    pub async fn call<A: AsRef<[u8]>>(&mut self, args: &[A]) -> Result<Response> {
        self.writer.write_all(&encode_request(args)).await?;
        self.writer.flush().await?;
        self.read_response().await
    }

    /// Send several commands in one write, then collect their replies in order
    pub async fn pipeline<A: AsRef<[u8]>>(&mut self, commands: &[Vec<A>]) -> Result<Vec<Response>> {
        for args in commands {
            self.writer.write_all(&encode_request(args)).await?;
        }
        self.writer.flush().await?;

        let mut responses = Vec::with_capacity(commands.len());
        for _ in commands {
            responses.push(self.read_response().await?);
        }
        Ok(responses)
    }

    async fn read_response(&mut self) -> Result<Response> {
        loop {
            if let Some((response, used)) = parse_response(&self.buffer)? {
                self.buffer.advance(used);
                return Ok(response);
            }
            if self.reader.read_buf(&mut self.buffer).await? == 0 {
                return Err(CellStoreError::Client(
                    "connection closed by server".to_string(),
                ));
            }
        }
    }

    /// `call`, with error replies turned into `Err`
    async fn request(&mut self, args: &[&[u8]]) -> Result<Response> {
        match self.call(args).await? {
            Response::Error(e) => Err(CellStoreError::Server(e)),
            response => Ok(response),
        }
    }

    async fn request_ok(&mut self, args: &[&[u8]]) -> Result<()> {
        match self.request(args).await? {
            Response::Ok => Ok(()),
            other => Err(unexpected(args, other)),
        }
    }

    async fn request_int(&mut self, args: &[&[u8]]) -> Result<i64> {
        match self.request(args).await? {
            Response::Integer(n) => Ok(n),
            other => Err(unexpected(args, other)),
        }
    }

    async fn request_flag(&mut self, args: &[&[u8]]) -> Result<bool> {
        Ok(self.request_int(args).await? == 1)
    }

    async fn request_bulk(&mut self, args: &[&[u8]]) -> Result<Option<Vec<u8>>> {
        match self.request(args).await? {
            Response::Bulk(data) => Ok(Some(data)),
            Response::Null => Ok(None),
            other => Err(unexpected(args, other)),
        }
    }

    async fn request_array(&mut self, args: &[&[u8]]) -> Result<Vec<Option<Vec<u8>>>> {
        match self.request(args).await? {
            Response::Array(items) => items
                .into_iter()
                .map(|item| match item {
                    Response::Bulk(data) => Ok(Some(data)),
                    Response::Null => Ok(None),
                    other => Err(unexpected(args, other)),
                })
                .collect(),
            other => Err(unexpected(args, other)),
        }
    }

    async fn request_list(&mut self, args: &[&[u8]]) -> Result<Vec<Vec<u8>>> {
        self.request_array(args)
            .await?
            .into_iter()
            .map(|item| item.ok_or_else(|| unexpected(args, Response::Null)))
            .collect()
    }

    // keyspace

    pub async fn ping(&mut self) -> Result<String> {
        match self.request(&[b"PING"]).await? {
            Response::Simple(s) => Ok(s),
            other => Err(unexpected(&[b"PING"], other)),
        }
    }

    pub async fn exists<K: AsRef<[u8]>>(&mut self, keys: &[K]) -> Result<i64> {
        self.request_int(&with_name(b"EXISTS", keys)).await
    }

    /// Type name of the value at `key`, `"none"` if absent
    pub async fn key_type(&mut self, key: impl AsRef<[u8]>) -> Result<String> {
        let args: [&[u8]; 2] = [b"TYPE", key.as_ref()];
        match self.request(&args).await? {
            Response::Simple(s) => Ok(s),
            other => Err(unexpected(&args, other)),
        }
    }

    pub async fn del<K: AsRef<[u8]>>(&mut self, keys: &[K]) -> Result<i64> {
        self.request_int(&with_name(b"DEL", keys)).await
    }

    pub async fn expire(&mut self, key: impl AsRef<[u8]>, seconds: i64) -> Result<bool> {
        let seconds = seconds.to_string();
        self.request_flag(&[b"EXPIRE", key.as_ref(), seconds.as_bytes()])
            .await
    }

    pub async fn pexpire(&mut self, key: impl AsRef<[u8]>, millis: i64) -> Result<bool> {
        let millis = millis.to_string();
        self.request_flag(&[b"PEXPIRE", key.as_ref(), millis.as_bytes()])
            .await
    }

    pub async fn persist(&mut self, key: impl AsRef<[u8]>) -> Result<bool> {
        self.request_flag(&[b"PERSIST", key.as_ref()]).await
    }

    pub async fn ttl(&mut self, key: impl AsRef<[u8]>) -> Result<i64> {
        self.request_int(&[b"TTL", key.as_ref()]).await
    }

    pub async fn pttl(&mut self, key: impl AsRef<[u8]>) -> Result<i64> {
        self.request_int(&[b"PTTL", key.as_ref()]).await
    }

    pub async fn dbsize(&mut self) -> Result<i64> {
        self.request_int(&[b"DBSIZE"]).await
    }

    pub async fn flushdb(&mut self) -> Result<()> {
        self.request_ok(&[b"FLUSHDB"]).await
    }

    // strings

    pub async fn append(&mut self, key: impl AsRef<[u8]>, value: impl AsRef<[u8]>) -> Result<i64> {
        self.request_int(&[b"APPEND", key.as_ref(), value.as_ref()])
            .await
    }

    pub async fn set(&mut self, key: impl AsRef<[u8]>, value: impl AsRef<[u8]>) -> Result<()> {
        self.request_ok(&[b"SET", key.as_ref(), value.as_ref()])
            .await
    }

    /// SET with a time to live in milliseconds
    pub async fn set_px(
        &mut self,
        key: impl AsRef<[u8]>,
        value: impl AsRef<[u8]>,
        millis: i64,
    ) -> Result<()> {
        let millis = millis.to_string();
        self.request_ok(&[b"SET", key.as_ref(), value.as_ref(), b"PX", millis.as_bytes()])
            .await
    }

    pub async fn setnx(&mut self, key: impl AsRef<[u8]>, value: impl AsRef<[u8]>) -> Result<bool> {
        self.request_flag(&[b"SETNX", key.as_ref(), value.as_ref()])
            .await
    }

    pub async fn strlen(&mut self, key: impl AsRef<[u8]>) -> Result<i64> {
        self.request_int(&[b"STRLEN", key.as_ref()]).await
    }

    pub async fn mset<K: AsRef<[u8]>, V: AsRef<[u8]>>(&mut self, pairs: &[(K, V)]) -> Result<()> {
        self.request_ok(&with_pairs(b"MSET", None, pairs)).await
    }

    pub async fn msetnx<K: AsRef<[u8]>, V: AsRef<[u8]>>(&mut self, pairs: &[(K, V)]) -> Result<bool> {
        self.request_flag(&with_pairs(b"MSETNX", None, pairs)).await
    }

    pub async fn get(&mut self, key: impl AsRef<[u8]>) -> Result<Option<Vec<u8>>> {
        self.request_bulk(&[b"GET", key.as_ref()]).await
    }

    pub async fn getrange(&mut self, key: impl AsRef<[u8]>, start: i64, end: i64) -> Result<Vec<u8>> {
        let (start, end) = (start.to_string(), end.to_string());
        let args: [&[u8]; 4] = [b"GETRANGE", key.as_ref(), start.as_bytes(), end.as_bytes()];
        self.request_bulk(&args)
            .await?
            .ok_or_else(|| unexpected(&args, Response::Null))
    }

    pub async fn mget<K: AsRef<[u8]>>(&mut self, keys: &[K]) -> Result<Vec<Option<Vec<u8>>>> {
        self.request_array(&with_name(b"MGET", keys)).await
    }

    pub async fn incr(&mut self, key: impl AsRef<[u8]>) -> Result<i64> {
        self.request_int(&[b"INCR", key.as_ref()]).await
    }

    pub async fn incr_by(&mut self, key: impl AsRef<[u8]>, delta: i64) -> Result<i64> {
        let delta = delta.to_string();
        self.request_int(&[b"INCRBY", key.as_ref(), delta.as_bytes()])
            .await
    }

    pub async fn incr_by_float(&mut self, key: impl AsRef<[u8]>, delta: f64) -> Result<f64> {
        let delta = delta.to_string();
        let args: [&[u8]; 3] = [b"INCRBYFLOAT", key.as_ref(), delta.as_bytes()];
        let reply = self.request_bulk(&args).await?;
        reply
            .as_deref()
            .and_then(|raw| std::str::from_utf8(raw).ok())
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| unexpected(&args, Response::bulk_or_null(reply.clone())))
    }

    pub async fn decr(&mut self, key: impl AsRef<[u8]>) -> Result<i64> {
        self.request_int(&[b"DECR", key.as_ref()]).await
    }

    pub async fn decr_by(&mut self, key: impl AsRef<[u8]>, delta: i64) -> Result<i64> {
        let delta = delta.to_string();
        self.request_int(&[b"DECRBY", key.as_ref(), delta.as_bytes()])
            .await
    }

    // lists

    pub async fn rpush<V: AsRef<[u8]>>(&mut self, key: impl AsRef<[u8]>, values: &[V]) -> Result<i64> {
        self.request_int(&with_key(b"RPUSH", key.as_ref(), values)).await
    }

    pub async fn lpush<V: AsRef<[u8]>>(&mut self, key: impl AsRef<[u8]>, values: &[V]) -> Result<i64> {
        self.request_int(&with_key(b"LPUSH", key.as_ref(), values)).await
    }

    pub async fn rpushx<V: AsRef<[u8]>>(&mut self, key: impl AsRef<[u8]>, values: &[V]) -> Result<i64> {
        self.request_int(&with_key(b"RPUSHX", key.as_ref(), values)).await
    }

    pub async fn lrange(&mut self, key: impl AsRef<[u8]>, start: i64, stop: i64) -> Result<Vec<Vec<u8>>> {
        let (start, stop) = (start.to_string(), stop.to_string());
        self.request_list(&[b"LRANGE", key.as_ref(), start.as_bytes(), stop.as_bytes()])
            .await
    }

    pub async fn lindex(&mut self, key: impl AsRef<[u8]>, index: i64) -> Result<Option<Vec<u8>>> {
        let index = index.to_string();
        self.request_bulk(&[b"LINDEX", key.as_ref(), index.as_bytes()])
            .await
    }

    /// LINSERT; `before` picks BEFORE over AFTER
    pub async fn linsert(
        &mut self,
        key: impl AsRef<[u8]>,
        before: bool,
        pivot: impl AsRef<[u8]>,
        value: impl AsRef<[u8]>,
    ) -> Result<i64> {
        let position: &[u8] = if before { b"BEFORE" } else { b"AFTER" };
        self.request_int(&[b"LINSERT", key.as_ref(), position, pivot.as_ref(), value.as_ref()])
            .await
    }

    pub async fn llen(&mut self, key: impl AsRef<[u8]>) -> Result<i64> {
        self.request_int(&[b"LLEN", key.as_ref()]).await
    }

    pub async fn lpop(&mut self, key: impl AsRef<[u8]>) -> Result<Option<Vec<u8>>> {
        self.request_bulk(&[b"LPOP", key.as_ref()]).await
    }

    pub async fn rpop(&mut self, key: impl AsRef<[u8]>) -> Result<Option<Vec<u8>>> {
        self.request_bulk(&[b"RPOP", key.as_ref()]).await
    }

    pub async fn lset(&mut self, key: impl AsRef<[u8]>, index: i64, value: impl AsRef<[u8]>) -> Result<()> {
        let index = index.to_string();
        self.request_ok(&[b"LSET", key.as_ref(), index.as_bytes(), value.as_ref()])
            .await
    }

    pub async fn ltrim(&mut self, key: impl AsRef<[u8]>, start: i64, stop: i64) -> Result<()> {
        let (start, stop) = (start.to_string(), stop.to_string());
        self.request_ok(&[b"LTRIM", key.as_ref(), start.as_bytes(), stop.as_bytes()])
            .await
    }

    pub async fn rpoplpush(
        &mut self,
        source: impl AsRef<[u8]>,
        destination: impl AsRef<[u8]>,
    ) -> Result<Option<Vec<u8>>> {
        self.request_bulk(&[b"RPOPLPUSH", source.as_ref(), destination.as_ref()])
            .await
    }

    // sets

    pub async fn sadd<M: AsRef<[u8]>>(&mut self, key: impl AsRef<[u8]>, members: &[M]) -> Result<i64> {
        self.request_int(&with_key(b"SADD", key.as_ref(), members)).await
    }

    pub async fn smembers(&mut self, key: impl AsRef<[u8]>) -> Result<Vec<Vec<u8>>> {
        self.request_list(&[b"SMEMBERS", key.as_ref()]).await
    }

    pub async fn sismember(&mut self, key: impl AsRef<[u8]>, member: impl AsRef<[u8]>) -> Result<bool> {
        self.request_flag(&[b"SISMEMBER", key.as_ref(), member.as_ref()])
            .await
    }

    pub async fn scard(&mut self, key: impl AsRef<[u8]>) -> Result<i64> {
        self.request_int(&[b"SCARD", key.as_ref()]).await
    }

    pub async fn srem<M: AsRef<[u8]>>(&mut self, key: impl AsRef<[u8]>, members: &[M]) -> Result<i64> {
        self.request_int(&with_key(b"SREM", key.as_ref(), members)).await
    }

    pub async fn sunion<K: AsRef<[u8]>>(&mut self, keys: &[K]) -> Result<Vec<Vec<u8>>> {
        self.request_list(&with_name(b"SUNION", keys)).await
    }

    pub async fn sinter<K: AsRef<[u8]>>(&mut self, keys: &[K]) -> Result<Vec<Vec<u8>>> {
        self.request_list(&with_name(b"SINTER", keys)).await
    }

    // hashes

    pub async fn hset<F: AsRef<[u8]>, V: AsRef<[u8]>>(
        &mut self,
        key: impl AsRef<[u8]>,
        pairs: &[(F, V)],
    ) -> Result<i64> {
        self.request_int(&with_pairs(b"HSET", Some(key.as_ref()), pairs))
            .await
    }

    pub async fn hsetnx(
        &mut self,
        key: impl AsRef<[u8]>,
        field: impl AsRef<[u8]>,
        value: impl AsRef<[u8]>,
    ) -> Result<bool> {
        self.request_flag(&[b"HSETNX", key.as_ref(), field.as_ref(), value.as_ref()])
            .await
    }

    pub async fn hmset<F: AsRef<[u8]>, V: AsRef<[u8]>>(
        &mut self,
        key: impl AsRef<[u8]>,
        pairs: &[(F, V)],
    ) -> Result<()> {
        self.request_ok(&with_pairs(b"HMSET", Some(key.as_ref()), pairs))
            .await
    }

    pub async fn hget(&mut self, key: impl AsRef<[u8]>, field: impl AsRef<[u8]>) -> Result<Option<Vec<u8>>> {
        self.request_bulk(&[b"HGET", key.as_ref(), field.as_ref()])
            .await
    }

    /// HGETALL as field/value pairs, in the server's order
    pub async fn hgetall(&mut self, key: impl AsRef<[u8]>) -> Result<Pairs> {
        let flat = self.request_list(&[b"HGETALL", key.as_ref()]).await?;
        if flat.len() % 2 != 0 {
            return Err(CellStoreError::Protocol(
                "HGETALL reply has an odd number of elements".to_string(),
            ));
        }
        let mut items = flat.into_iter();
        let mut pairs = Vec::new();
        while let (Some(field), Some(value)) = (items.next(), items.next()) {
            pairs.push((field, value));
        }
        Ok(pairs)
    }

    pub async fn hexists(&mut self, key: impl AsRef<[u8]>, field: impl AsRef<[u8]>) -> Result<bool> {
        self.request_flag(&[b"HEXISTS", key.as_ref(), field.as_ref()])
            .await
    }

    pub async fn hkeys(&mut self, key: impl AsRef<[u8]>) -> Result<Vec<Vec<u8>>> {
        self.request_list(&[b"HKEYS", key.as_ref()]).await
    }

    pub async fn hlen(&mut self, key: impl AsRef<[u8]>) -> Result<i64> {
        self.request_int(&[b"HLEN", key.as_ref()]).await
    }

    pub async fn hvals(&mut self, key: impl AsRef<[u8]>) -> Result<Vec<Vec<u8>>> {
        self.request_list(&[b"HVALS", key.as_ref()]).await
    }

    pub async fn hdel<F: AsRef<[u8]>>(&mut self, key: impl AsRef<[u8]>, fields: &[F]) -> Result<i64> {
        self.request_int(&with_key(b"HDEL", key.as_ref(), fields)).await
    }

    /// Close the connection
    pub async fn close(mut self) -> Result<()> {
        self.writer.shutdown().await?;
        Ok(())
    }
}

fn with_name<'a, K: AsRef<[u8]>>(name: &'a [u8], rest: &'a [K]) -> Vec<&'a [u8]> {
    let mut args = Vec::with_capacity(rest.len() + 1);
    args.push(name);
    args.extend(rest.iter().map(AsRef::as_ref));
    args
}

fn with_key<'a, V: AsRef<[u8]>>(name: &'a [u8], key: &'a [u8], rest: &'a [V]) -> Vec<&'a [u8]> {
    let mut args = Vec::with_capacity(rest.len() + 2);
    args.push(name);
    args.push(key);
    args.extend(rest.iter().map(AsRef::as_ref));
    args
}

fn with_pairs<'a, F: AsRef<[u8]>, V: AsRef<[u8]>>(
    name: &'a [u8],
    key: Option<&'a [u8]>,
    pairs: &'a [(F, V)],
) -> Vec<&'a [u8]> {
    let mut args = Vec::with_capacity(pairs.len() * 2 + 2);
    args.push(name);
    args.extend(key);
    for (field, value) in pairs {
        args.push(field.as_ref());
        args.push(value.as_ref());
    }
    args
}

fn unexpected(args: &[&[u8]], response: Response) -> CellStoreError {
    let name = args
        .first()
        .map(|name| String::from_utf8_lossy(name).into_owned())
        .unwrap_or_default();
    CellStoreError::Protocol(format!("unexpected response for {}: {}", name, response))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_argument_builders() {
        assert_eq!(
            with_name(b"DEL", &["a", "b"]),
            vec![b"DEL".as_slice(), b"a", b"b"]
        );
        assert_eq!(
            with_key(b"RPUSH", b"l", &["x"]),
            vec![b"RPUSH".as_slice(), b"l", b"x"]
        );
        assert_eq!(
            with_pairs(b"HSET", Some(b"h".as_slice()), &[("f", "v")]),
            vec![b"HSET".as_slice(), b"h", b"f", b"v"]
        );
        assert_eq!(
            with_pairs(b"MSET", None, &[("a", "1"), ("b", "2")]),
            vec![b"MSET".as_slice(), b"a", b"1", b"b", b"2"]
        );
    }

    #[test]
    fn test_unexpected_names_the_command() {
        let err = unexpected(&[b"GET", b"k"], Response::Integer(3));
        assert_eq!(
            err.to_string(),
            "ERR Protocol error: unexpected response for GET: (integer) 3"
        );
    }
}
