//! Set commands
//!
//! `SADD` and `SREM` apply per member and report how many members actually
//! changed; a set emptied by `SREM` is removed from the keyspace.

use crate::error::Result;
use crate::store::{Key, Keyspace};
use std::collections::HashSet;

pub fn sadd(ks: &mut Keyspace, key: &[u8], members: Vec<Vec<u8>>) -> Result<usize> {
    if members.is_empty() {
        ks.get_set(key)?;
        return Ok(0);
    }
    let set = ks.set_entry(key)?;
    let before = set.len();
    set.extend(members);
    Ok(set.len() - before)
}

pub fn smembers(ks: &mut Keyspace, key: &[u8]) -> Result<Vec<Vec<u8>>> {
    Ok(ks
        .get_set(key)?
        .map(|set| set.iter().cloned().collect())
        .unwrap_or_default())
}

pub fn sismember(ks: &mut Keyspace, key: &[u8], member: &[u8]) -> Result<bool> {
    Ok(ks.get_set(key)?.is_some_and(|set| set.contains(member)))
}

pub fn scard(ks: &mut Keyspace, key: &[u8]) -> Result<usize> {
    Ok(ks.get_set(key)?.map_or(0, HashSet::len))
}

pub fn srem(ks: &mut Keyspace, key: &[u8], members: &[Vec<u8>]) -> Result<usize> {
    let removed = match ks.get_set_mut(key)? {
        Some(set) => members.iter().filter(|m| set.remove(m.as_slice())).count(),
        None => 0,
    };
    ks.remove_if_empty(key);
    Ok(removed)
}

/// SUNION: missing keys contribute nothing
pub fn sunion(ks: &mut Keyspace, keys: &[Key]) -> Result<Vec<Vec<u8>>> {
    let mut union: HashSet<Vec<u8>> = HashSet::new();
    for key in keys {
        if let Some(set) = ks.get_set(key)? {
            union.extend(set.iter().cloned());
        }
    }
    Ok(union.into_iter().collect())
}

/// SINTER: a missing key, or no keys at all, yields the empty set.
///
/// Every key is type-checked even when an earlier one is missing.
pub fn sinter(ks: &mut Keyspace, keys: &[Key]) -> Result<Vec<Vec<u8>>> {
    let mut sets = Vec::with_capacity(keys.len());
    let mut missing = keys.is_empty();
    for key in keys {
        match ks.get_set(key)? {
            Some(set) if !missing => sets.push(set.clone()),
            Some(_) => {}
            None => missing = true,
        }
    }
    if missing {
        return Ok(Vec::new());
    }

    sets.sort_by_key(HashSet::len);
    let Some((smallest, rest)) = sets.split_first() else {
        return Ok(Vec::new());
    };
    Ok(smallest
        .iter()
        .filter(|member| rest.iter().all(|set| set.contains(*member)))
        .cloned()
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CellStoreError;
    use crate::types::string;

    fn b(s: &str) -> Vec<u8> {
        s.as_bytes().to_vec()
    }

    fn items(values: &[&str]) -> Vec<Vec<u8>> {
        values.iter().map(|v| b(v)).collect()
    }

    fn sorted(mut v: Vec<Vec<u8>>) -> Vec<Vec<u8>> {
        v.sort();
        v
    }

    #[test]
    fn test_sadd_counts_new_members() {
        let mut ks = Keyspace::new();
        assert_eq!(sadd(&mut ks, b"s", items(&["x"])).unwrap(), 1);
        assert_eq!(sadd(&mut ks, b"s", items(&["x"])).unwrap(), 0);
        assert_eq!(sadd(&mut ks, b"s", items(&["y", "z", "y"])).unwrap(), 2);
        assert_eq!(scard(&mut ks, b"s").unwrap(), 3);
        assert_eq!(sorted(smembers(&mut ks, b"s").unwrap()), items(&["x", "y", "z"]));
    }

    #[test]
    fn test_sadd_nothing_creates_no_key() {
        let mut ks = Keyspace::new();
        assert_eq!(sadd(&mut ks, b"s", Vec::new()).unwrap(), 0);
        assert!(!ks.exists(b"s"));

        string::set(&mut ks, b"str", b("x"));
        assert!(matches!(
            sadd(&mut ks, b"str", Vec::new()),
            Err(CellStoreError::TypeMismatch)
        ));
    }

    #[test]
    fn test_sismember() {
        let mut ks = Keyspace::new();
        sadd(&mut ks, b"s", items(&["x"])).unwrap();
        assert!(sismember(&mut ks, b"s", b"x").unwrap());
        assert!(!sismember(&mut ks, b"s", b"y").unwrap());
        assert!(!sismember(&mut ks, b"missing", b"x").unwrap());
    }

    #[test]
    fn test_srem_deletes_empty_set() {
        let mut ks = Keyspace::new();
        sadd(&mut ks, b"s", items(&["x", "y"])).unwrap();
        assert_eq!(srem(&mut ks, b"s", &items(&["x", "nope"])).unwrap(), 1);
        assert!(ks.exists(b"s"));
        assert_eq!(srem(&mut ks, b"s", &items(&["y"])).unwrap(), 1);
        assert!(!ks.exists(b"s"));
        assert_eq!(srem(&mut ks, b"s", &items(&["y"])).unwrap(), 0);
    }

    #[test]
    fn test_union_and_intersection() {
        let mut ks = Keyspace::new();
        sadd(&mut ks, b"a", items(&["x", "y"])).unwrap();
        sadd(&mut ks, b"b", items(&["y", "z"])).unwrap();

        let keys = items(&["a", "b"]);
        assert_eq!(sorted(sunion(&mut ks, &keys).unwrap()), items(&["x", "y", "z"]));
        assert_eq!(sinter(&mut ks, &keys).unwrap(), items(&["y"]));
    }

    #[test]
    fn test_missing_keys() {
        let mut ks = Keyspace::new();
        sadd(&mut ks, b"a", items(&["x"])).unwrap();

        assert_eq!(sunion(&mut ks, &items(&["a", "nope"])).unwrap(), items(&["x"]));
        assert!(sinter(&mut ks, &items(&["a", "nope"])).unwrap().is_empty());
        assert!(sinter(&mut ks, &[]).unwrap().is_empty());
        assert!(smembers(&mut ks, b"nope").unwrap().is_empty());
    }

    #[test]
    fn test_wrong_type_in_any_position() {
        let mut ks = Keyspace::new();
        sadd(&mut ks, b"a", items(&["x"])).unwrap();
        string::set(&mut ks, b"str", b("v"));

        assert!(matches!(
            sunion(&mut ks, &items(&["a", "str"])),
            Err(CellStoreError::TypeMismatch)
        ));
        assert!(matches!(
            sinter(&mut ks, &items(&["nope", "str"])),
            Err(CellStoreError::TypeMismatch)
        ));
        assert!(matches!(
            sadd(&mut ks, b"str", items(&["x"])),
            Err(CellStoreError::TypeMismatch)
        ));
    }
}
