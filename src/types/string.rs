//! String commands, plus the key-level DEL / EXPIRE / TTL family
//!
//! Counters store their result back as decimal text, so `INCR` on a fresh
//! key followed by `GET` returns `"1"`. Counter updates modify the value in
//! place and keep the key's TTL; plain writes (`SET`, `MSET`) reset it.

use super::clamp_range;
use crate::error::{CellStoreError, Result};
use crate::parse::{parse_float, parse_int};
use crate::store::{Key, Keyspace, Value};
use tokio::time::{Duration, Instant};

/// Shortest text that reads back as `value`. Very large and very small
/// magnitudes switch to exponent form, e.g. `1e300`.
pub fn format_float(value: f64) -> String {
    let magnitude = value.abs();
    if magnitude != 0.0 && !(1e-5..1e17).contains(&magnitude) {
        format!("{:e}", value)
    } else {
        format!("{}", value)
    }
}

/// APPEND: returns the length of the string after the append
pub fn append(ks: &mut Keyspace, key: &[u8], value: &[u8]) -> Result<usize> {
    let s = ks.string_entry(key)?;
    s.extend_from_slice(value);
    Ok(s.len())
}

/// SET: unconditional overwrite, clears any TTL
pub fn set(ks: &mut Keyspace, key: &[u8], value: Vec<u8>) {
    ks.set(key.to_vec(), Value::String(value));
}

/// SETNX: returns true if the key was created
pub fn setnx(ks: &mut Keyspace, key: &[u8], value: Vec<u8>) -> bool {
    if ks.exists(key) {
        return false;
    }
    set(ks, key, value);
    true
}

pub fn strlen(ks: &mut Keyspace, key: &[u8]) -> Result<usize> {
    Ok(ks.get_string(key)?.map_or(0, Vec::len))
}

/// MSET: every pair is written inside the same keyspace borrow
pub fn mset(ks: &mut Keyspace, pairs: Vec<(Key, Vec<u8>)>) {
    for (key, value) in pairs {
        ks.set(key, Value::String(value));
    }
}

/// MSETNX: writes all pairs only if none of the keys exist
pub fn msetnx(ks: &mut Keyspace, pairs: Vec<(Key, Vec<u8>)>) -> bool {
    if pairs.iter().any(|(key, _)| ks.exists(key)) {
        return false;
    }
    mset(ks, pairs);
    true
}

/// GET: `None` when the key is absent or holds a non-string value
pub fn get(ks: &mut Keyspace, key: &[u8]) -> Option<Vec<u8>> {
    match ks.get(key) {
        Some(Value::String(s)) => Some(s.clone()),
        _ => None,
    }
}

pub fn getrange(ks: &mut Keyspace, key: &[u8], start: i64, end: i64) -> Result<Vec<u8>> {
    let Some(s) = ks.get_string(key)? else {
        return Ok(Vec::new());
    };
    Ok(clamp_range(s.len(), start, end)
        .map(|range| s[range].to_vec())
        .unwrap_or_default())
}

pub fn mget(ks: &mut Keyspace, keys: &[Key]) -> Vec<Option<Vec<u8>>> {
    keys.iter().map(|key| get(ks, key)).collect()
}

/// INCRBY / DECRBY core. Absent keys count as 0.
pub fn incr_by(ks: &mut Keyspace, key: &[u8], delta: i64) -> Result<i64> {
    let current = match ks.get_string(key)? {
        Some(raw) => parse_int(raw)?,
        None => 0,
    };
    let next = current.checked_add(delta).ok_or(CellStoreError::Overflow)?;
    ks.set_keep_ttl(key.to_vec(), Value::String(next.to_string().into_bytes()));
    Ok(next)
}

pub fn incr(ks: &mut Keyspace, key: &[u8]) -> Result<i64> {
    incr_by(ks, key, 1)
}

pub fn decr(ks: &mut Keyspace, key: &[u8]) -> Result<i64> {
    incr_by(ks, key, -1)
}

pub fn decr_by(ks: &mut Keyspace, key: &[u8], delta: i64) -> Result<i64> {
    let delta = delta.checked_neg().ok_or(CellStoreError::Overflow)?;
    incr_by(ks, key, delta)
}

pub fn incr_by_float(ks: &mut Keyspace, key: &[u8], delta: f64) -> Result<f64> {
    let current = match ks.get_string(key)? {
        Some(raw) => parse_float(raw)?,
        None => 0.0,
    };
    let next = current + delta;
    if !next.is_finite() {
        return Err(CellStoreError::NonFinite);
    }
    ks.set_keep_ttl(key.to_vec(), Value::String(format_float(next).into_bytes()));
    Ok(next)
}

/// DEL over several keys, returning how many existed
pub fn del(ks: &mut Keyspace, keys: &[Key]) -> usize {
    keys.iter().filter(|key| ks.delete(key)).count()
}

/// EXPIRE: a non-positive timeout deletes the key right away
pub fn expire(ks: &mut Keyspace, key: &[u8], seconds: i64) -> bool {
    pexpire(ks, key, seconds.saturating_mul(1000))
}

pub fn pexpire(ks: &mut Keyspace, key: &[u8], millis: i64) -> bool {
    if millis <= 0 {
        return ks.delete(key);
    }
    let millis = u64::try_from(millis).unwrap_or(u64::MAX);
    let when = Instant::now()
        .checked_add(Duration::from_millis(millis))
        .unwrap_or_else(far_future);
    ks.set_expiry(key, when)
}

/// PERSIST: returns true if a TTL was removed
pub fn persist(ks: &mut Keyspace, key: &[u8]) -> bool {
    ks.clear_expiry(key)
}

pub fn ttl(ks: &mut Keyspace, key: &[u8]) -> i64 {
    ks.ttl_seconds(key)
}

pub fn pttl(ks: &mut Keyspace, key: &[u8]) -> i64 {
    ks.ttl_millis(key)
}

fn far_future() -> Instant {
    Instant::now() + Duration::from_secs(86400 * 365 * 30)
}
