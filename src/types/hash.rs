//! Hash commands

use crate::error::Result;
use crate::store::Keyspace;
use std::collections::HashMap;

/// HSET: returns how many of the fields were newly created
pub fn hset(ks: &mut Keyspace, key: &[u8], pairs: Vec<(Vec<u8>, Vec<u8>)>) -> Result<usize> {
    if pairs.is_empty() {
        ks.get_hash(key)?;
        return Ok(0);
    }
    let hash = ks.hash_entry(key)?;
    let mut created = 0;
    for (field, value) in pairs {
        if hash.insert(field, value).is_none() {
            created += 1;
        }
    }
    Ok(created)
}

/// HSETNX: returns true if the field was created
pub fn hsetnx(ks: &mut Keyspace, key: &[u8], field: Vec<u8>, value: Vec<u8>) -> Result<bool> {
    if let Some(hash) = ks.get_hash(key)? {
        if hash.contains_key(&field) {
            return Ok(false);
        }
    }
    ks.hash_entry(key)?.insert(field, value);
    Ok(true)
}

pub fn hmset(ks: &mut Keyspace, key: &[u8], pairs: Vec<(Vec<u8>, Vec<u8>)>) -> Result<()> {
    if pairs.is_empty() {
        ks.get_hash(key)?;
        return Ok(());
    }
    ks.hash_entry(key)?.extend(pairs);
    Ok(())
}

pub fn hget(ks: &mut Keyspace, key: &[u8], field: &[u8]) -> Result<Option<Vec<u8>>> {
    Ok(ks.get_hash(key)?.and_then(|hash| hash.get(field).cloned()))
}

pub fn hgetall(ks: &mut Keyspace, key: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
    Ok(ks
        .get_hash(key)?
        .map(|hash| hash.iter().map(|(f, v)| (f.clone(), v.clone())).collect())
        .unwrap_or_default())
}

pub fn hexists(ks: &mut Keyspace, key: &[u8], field: &[u8]) -> Result<bool> {
    Ok(ks.get_hash(key)?.is_some_and(|hash| hash.contains_key(field)))
}

pub fn hkeys(ks: &mut Keyspace, key: &[u8]) -> Result<Vec<Vec<u8>>> {
    Ok(ks
        .get_hash(key)?
        .map(|hash| hash.keys().cloned().collect())
        .unwrap_or_default())
}

pub fn hlen(ks: &mut Keyspace, key: &[u8]) -> Result<usize> {
    Ok(ks.get_hash(key)?.map_or(0, HashMap::len))
}

/// HVALS: values in the same order `hkeys` lists the fields
pub fn hvals(ks: &mut Keyspace, key: &[u8]) -> Result<Vec<Vec<u8>>> {
    Ok(ks
        .get_hash(key)?
        .map(|hash| hash.values().cloned().collect())
        .unwrap_or_default())
}

/// HDEL: returns how many fields were removed; an emptied hash is deleted
pub fn hdel(ks: &mut Keyspace, key: &[u8], fields: &[Vec<u8>]) -> Result<usize> {
    let removed = match ks.get_hash_mut(key)? {
        Some(hash) => fields
            .iter()
            .filter(|f| hash.remove(f.as_slice()).is_some())
            .count(),
        None => 0,
    };
    ks.remove_if_empty(key);
    Ok(removed)
}
