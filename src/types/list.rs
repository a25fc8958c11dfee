//! List commands
//!
//! Lists are `VecDeque`s so both ends push and pop in O(1). A list that
//! loses its last element is removed from the keyspace.

use super::{clamp_range, resolve_index};
use crate::error::{CellStoreError, Result};
use crate::store::Keyspace;
use std::str::FromStr;

/// Where `LINSERT` places the new element relative to the pivot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertPosition {
    Before,
    After,
}

impl FromStr for InsertPosition {
    type Err = CellStoreError;

    fn from_str(s: &str) -> Result<Self> {
        if s.eq_ignore_ascii_case("before") {
            Ok(InsertPosition::Before)
        } else if s.eq_ignore_ascii_case("after") {
            Ok(InsertPosition::After)
        } else {
            Err(CellStoreError::Syntax)
        }
    }
}

/// RPUSH: appends each value in order, returns the new length
pub fn rpush(ks: &mut Keyspace, key: &[u8], values: Vec<Vec<u8>>) -> Result<usize> {
    if values.is_empty() {
        return llen(ks, key);
    }
    let list = ks.list_entry(key)?;
    list.extend(values);
    Ok(list.len())
}

/// LPUSH: prepends each value in order, so the last one ends up first
pub fn lpush(ks: &mut Keyspace, key: &[u8], values: Vec<Vec<u8>>) -> Result<usize> {
    if values.is_empty() {
        return llen(ks, key);
    }
    let list = ks.list_entry(key)?;
    for value in values {
        list.push_front(value);
    }
    Ok(list.len())
}

/// RPUSHX: like RPUSH but never creates the key
pub fn rpushx(ks: &mut Keyspace, key: &[u8], values: Vec<Vec<u8>>) -> Result<usize> {
    match ks.get_list_mut(key)? {
        Some(list) => {
            list.extend(values);
            Ok(list.len())
        }
        None => Ok(0),
    }
}

pub fn lrange(ks: &mut Keyspace, key: &[u8], start: i64, stop: i64) -> Result<Vec<Vec<u8>>> {
    let Some(list) = ks.get_list(key)? else {
        return Ok(Vec::new());
    };
    Ok(clamp_range(list.len(), start, stop)
        .map(|range| list.range(range).cloned().collect())
        .unwrap_or_default())
}

pub fn lindex(ks: &mut Keyspace, key: &[u8], index: i64) -> Result<Option<Vec<u8>>> {
    let Some(list) = ks.get_list(key)? else {
        return Ok(None);
    };
    Ok(resolve_index(list.len(), index).map(|i| list[i].clone()))
}

/// LINSERT: new length, -1 if the pivot is missing, 0 if the key is absent
pub fn linsert(
    ks: &mut Keyspace,
    key: &[u8],
    position: InsertPosition,
    pivot: &[u8],
    value: Vec<u8>,
) -> Result<i64> {
    let Some(list) = ks.get_list_mut(key)? else {
        return Ok(0);
    };
    let Some(at) = list.iter().position(|elem| elem.as_slice() == pivot) else {
        return Ok(-1);
    };
    let at = match position {
        InsertPosition::Before => at,
        InsertPosition::After => at + 1,
    };
    list.insert(at, value);
    Ok(list.len() as i64)
}

pub fn llen(ks: &mut Keyspace, key: &[u8]) -> Result<usize> {
    Ok(ks.get_list(key)?.map_or(0, |list| list.len()))
}

pub fn lpop(ks: &mut Keyspace, key: &[u8]) -> Result<Option<Vec<u8>>> {
    let popped = ks.get_list_mut(key)?.and_then(|list| list.pop_front());
    ks.remove_if_empty(key);
    Ok(popped)
}

pub fn rpop(ks: &mut Keyspace, key: &[u8]) -> Result<Option<Vec<u8>>> {
    let popped = ks.get_list_mut(key)?.and_then(|list| list.pop_back());
    ks.remove_if_empty(key);
    Ok(popped)
}

/// LSET: an absent key counts as an out-of-range index
pub fn lset(ks: &mut Keyspace, key: &[u8], index: i64, value: Vec<u8>) -> Result<()> {
    let list = ks.get_list_mut(key)?.ok_or(CellStoreError::OutOfRange)?;
    let i = resolve_index(list.len(), index).ok_or(CellStoreError::OutOfRange)?;
    list[i] = value;
    Ok(())
}

/// LTRIM: keeps only the `[start, stop]` window
pub fn ltrim(ks: &mut Keyspace, key: &[u8], start: i64, stop: i64) -> Result<()> {
    let Some(list) = ks.get_list_mut(key)? else {
        return Ok(());
    };
    match clamp_range(list.len(), start, stop) {
        Some(range) => {
            list.truncate(range.end() + 1);
            list.drain(..*range.start());
        }
        None => list.clear(),
    }
    ks.remove_if_empty(key);
    Ok(())
}

/// RPOPLPUSH: moves the tail of `source` to the head of `destination`.
///
/// Both keys are type-checked before anything moves. When source and
/// destination are the same key the list is rotated in place.
pub fn rpoplpush(ks: &mut Keyspace, source: &[u8], destination: &[u8]) -> Result<Option<Vec<u8>>> {
    if source == destination {
        let Some(list) = ks.get_list_mut(source)? else {
            return Ok(None);
        };
        list.rotate_right(1);
        return Ok(list.front().cloned());
    }

    if ks.get_list(source)?.is_none() {
        return Ok(None);
    }
    ks.get_list(destination)?;

    let Some(value) = rpop(ks, source)? else {
        return Ok(None);
    };
    ks.list_entry(destination)?.push_front(value.clone());
    Ok(Some(value))
}
