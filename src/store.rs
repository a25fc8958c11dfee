//! The value store: typed cells addressed by byte-string keys
//!
//! `Keyspace` owns every value together with the expiry bookkeeping that
//! guards it. Every lookup goes through the expiry check first, so a key
//! whose deadline has passed is removed before the access proceeds and looks
//! exactly like a key that never existed. The type engines in
//! [`crate::types`] extend `Keyspace` with the per-type commands.

use crate::error::{CellStoreError, Result};
use crate::expire::ExpiryManager;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::fmt;
use tokio::time::Instant;

/// Keys are opaque byte strings, ordered by byte value
pub type Key = Vec<u8>;

/// A typed value cell. The variant is fixed for the lifetime of the key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Value {
    String(Vec<u8>),
    List(VecDeque<Vec<u8>>),
    Set(HashSet<Vec<u8>>),
    Hash(#[serde(with = "field_pairs")] HashMap<Vec<u8>, Vec<u8>>),
}

/// Hash fields are byte strings, which JSON cannot use as object keys, so
/// hashes serialize as a list of `[field, value]` pairs.
mod field_pairs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::collections::HashMap;

    pub fn serialize<S: Serializer>(
        hash: &HashMap<Vec<u8>, Vec<u8>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let pairs: Vec<(&Vec<u8>, &Vec<u8>)> = hash.iter().collect();
        pairs.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<HashMap<Vec<u8>, Vec<u8>>, D::Error> {
        let pairs = Vec::<(Vec<u8>, Vec<u8>)>::deserialize(deserializer)?;
        Ok(pairs.into_iter().collect())
    }
}

/// Discriminant of a [`Value`], as reported by `TYPE`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    String,
    List,
    Set,
    Hash,
}

impl ValueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueKind::String => "string",
            ValueKind::List => "list",
            ValueKind::Set => "set",
            ValueKind::Hash => "hash",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::String(_) => ValueKind::String,
            Value::List(_) => ValueKind::List,
            Value::Set(_) => ValueKind::Set,
            Value::Hash(_) => ValueKind::Hash,
        }
    }

    /// Containers with no elements must not exist in the keyspace
    pub(crate) fn is_empty_container(&self) -> bool {
        match self {
            Value::String(_) => false,
            Value::List(l) => l.is_empty(),
            Value::Set(s) => s.is_empty(),
            Value::Hash(h) => h.is_empty(),
        }
    }
}

/// In-memory keyspace: key -> value cell, plus expiration deadlines
#[derive(Debug, Default)]
pub struct Keyspace {
    entries: BTreeMap<Key, Value>,
    expiry: ExpiryManager,
}

impl Keyspace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove `key` if its deadline has passed. Returns true if it was removed.
    fn expire_if_due(&mut self, key: &[u8], now: Instant) -> bool {
        if self.expiry.is_expired(key, now) {
            self.entries.remove(key);
            self.expiry.clear_expiry(key);
            true
        } else {
            false
        }
    }

    /// Look up a live value
    pub fn get(&mut self, key: &[u8]) -> Option<&Value> {
        self.expire_if_due(key, Instant::now());
        self.entries.get(key)
    }

    /// Look up a live value for in-place modification (TTL is kept)
    pub fn get_mut(&mut self, key: &[u8]) -> Option<&mut Value> {
        self.expire_if_due(key, Instant::now());
        self.entries.get_mut(key)
    }

    /// Store `value` under `key`, replacing any previous cell and its TTL
    pub fn set(&mut self, key: Key, value: Value) {
        self.expiry.clear_expiry(&key);
        self.entries.insert(key, value);
    }

    /// Store `value` under `key`, carrying over a live TTL if there is one
    pub fn set_keep_ttl(&mut self, key: Key, value: Value) {
        self.expire_if_due(&key, Instant::now());
        self.entries.insert(key, value);
    }

    /// Remove `key` and its deadline. Returns true if a live key was removed.
    pub fn delete(&mut self, key: &[u8]) -> bool {
        if self.expire_if_due(key, Instant::now()) {
            return false;
        }
        self.expiry.clear_expiry(key);
        self.entries.remove(key).is_some()
    }

    pub fn exists(&mut self, key: &[u8]) -> bool {
        self.get(key).is_some()
    }

    pub fn type_of(&mut self, key: &[u8]) -> Option<ValueKind> {
        self.get(key).map(Value::kind)
    }

    /// Attach an absolute deadline to a live key. Returns false if the key is absent.
    pub fn set_expiry(&mut self, key: &[u8], when: Instant) -> bool {
        if !self.exists(key) {
            return false;
        }
        self.expiry.set_expiry(key, when);
        true
    }

    /// Make a live key persistent. Returns true if a deadline was removed.
    pub fn clear_expiry(&mut self, key: &[u8]) -> bool {
        self.exists(key) && self.expiry.clear_expiry(key).is_some()
    }

    /// Remaining time to live in seconds: -2 if absent, -1 if no deadline
    pub fn ttl_seconds(&mut self, key: &[u8]) -> i64 {
        match self.ttl_millis(key) {
            ms if ms < 0 => ms,
            ms => (ms + 500) / 1000,
        }
    }

    /// Remaining time to live in milliseconds: -2 if absent, -1 if no deadline
    pub fn ttl_millis(&mut self, key: &[u8]) -> i64 {
        let now = Instant::now();
        self.expire_if_due(key, now);
        if !self.entries.contains_key(key) {
            return -2;
        }
        match self.expiry.remaining(key, now) {
            Some(left) => i64::try_from(left.as_millis()).unwrap_or(i64::MAX),
            None => -1,
        }
    }

    pub fn deadline(&self, key: &[u8]) -> Option<Instant> {
        self.expiry.deadline(key)
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.expiry.next_deadline()
    }

    /// Active expiration: drop every key due at `now`. Returns how many went.
    pub fn purge_expired(&mut self, now: Instant) -> usize {
        let expired = self.expiry.drain_expired(now);
        for key in &expired {
            self.entries.remove(key);
        }
        expired.len()
    }

    /// Number of live keys
    pub fn len(&mut self) -> usize {
        self.purge_expired(Instant::now());
        self.entries.len()
    }

    pub fn is_empty(&mut self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.expiry.clear();
    }

    /// All entries in key order, with their deadline if any. Expired entries
    /// that have not been reclaimed yet are included; callers filter on the
    /// deadline.
    pub fn iter(&self) -> impl Iterator<Item = (&Key, &Value, Option<Instant>)> {
        self.entries
            .iter()
            .map(move |(key, value)| (key, value, self.expiry.deadline(key)))
    }

    /// Drop `key` if it holds an empty container
    pub(crate) fn remove_if_empty(&mut self, key: &[u8]) {
        if self.entries.get(key).is_some_and(Value::is_empty_container) {
            self.entries.remove(key);
            self.expiry.clear_expiry(key);
        }
    }

    /// Live entry for `key`, creating it with `init` if absent
    pub(crate) fn entry_or_insert_with(
        &mut self,
        key: &[u8],
        init: impl FnOnce() -> Value,
    ) -> &mut Value {
        self.expire_if_due(key, Instant::now());
        self.entries.entry(key.to_vec()).or_insert_with(init)
    }
}

/// Typed accessors shared by the type engines
macro_rules! typed_access {
    ($get:ident, $entry:ident, $variant:ident, $ty:ty $(, mut $get_mut:ident)?) => {
        impl Keyspace {
            pub(crate) fn $get(&mut self, key: &[u8]) -> Result<Option<&$ty>> {
                match self.get(key) {
                    None => Ok(None),
                    Some(Value::$variant(v)) => Ok(Some(v)),
                    Some(_) => Err(CellStoreError::TypeMismatch),
                }
            }

            $(
            pub(crate) fn $get_mut(&mut self, key: &[u8]) -> Result<Option<&mut $ty>> {
                match self.get_mut(key) {
                    None => Ok(None),
                    Some(Value::$variant(v)) => Ok(Some(v)),
                    Some(_) => Err(CellStoreError::TypeMismatch),
                }
            }
            )?

            pub(crate) fn $entry(&mut self, key: &[u8]) -> Result<&mut $ty> {
                match self.entry_or_insert_with(key, || Value::$variant(<$ty>::default())) {
                    Value::$variant(v) => Ok(v),
                    _ => Err(CellStoreError::TypeMismatch),
                }
            }
        }
    };
}

// Strings are only modified through `string_entry`, so they get no `_mut` getter.
typed_access!(get_string, string_entry, String, Vec<u8>);
typed_access!(get_list, list_entry, List, VecDeque<Vec<u8>>, mut get_list_mut);
typed_access!(get_set, set_entry, Set, HashSet<Vec<u8>>, mut get_set_mut);
typed_access!(get_hash, hash_entry, Hash, HashMap<Vec<u8>, Vec<u8>>, mut get_hash_mut);

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Duration;

    fn string(s: &str) -> Value {
        Value::String(s.as_bytes().to_vec())
    }

    #[test]
    fn test_keyspace_basic_operations() {
        let mut ks = Keyspace::new();

        ks.set(b"key1".to_vec(), string("value1"));
        assert_eq!(ks.get(b"key1"), Some(&string("value1")));

        assert!(ks.exists(b"key1"));
        assert!(!ks.exists(b"nonexistent"));

        assert!(ks.delete(b"key1"));
        assert!(!ks.delete(b"key1"));
        assert_eq!(ks.get(b"key1"), None);
    }

    #[test]
    fn test_type_of_reports_cell_kind() {
        let mut ks = Keyspace::new();
        ks.set(b"s".to_vec(), string("x"));
        ks.set(b"l".to_vec(), Value::List(VecDeque::from(vec![b"a".to_vec()])));

        assert_eq!(ks.type_of(b"s"), Some(ValueKind::String));
        assert_eq!(ks.type_of(b"l"), Some(ValueKind::List));
        assert_eq!(ks.type_of(b"none"), None);
    }

    #[test]
    fn test_past_deadline_behaves_as_absent() {
        let mut ks = Keyspace::new();
        ks.set(b"k".to_vec(), string("v"));
        assert!(ks.set_expiry(b"k", Instant::now() - Duration::from_millis(1)));

        assert_eq!(ks.get(b"k"), None);
        assert!(!ks.exists(b"k"));
        assert_eq!(ks.ttl_seconds(b"k"), -2);
        assert_eq!(ks.deadline(b"k"), None);
    }

    #[test]
    fn test_set_clears_previous_ttl() {
        let mut ks = Keyspace::new();
        ks.set(b"k".to_vec(), string("v"));
        ks.set_expiry(b"k", Instant::now() + Duration::from_secs(100));
        assert!(ks.ttl_seconds(b"k") > 0);

        ks.set(b"k".to_vec(), string("w"));
        assert_eq!(ks.ttl_seconds(b"k"), -1);
    }

    #[test]
    fn test_set_keep_ttl_preserves_deadline() {
        let mut ks = Keyspace::new();
        ks.set(b"k".to_vec(), string("v"));
        let when = Instant::now() + Duration::from_secs(100);
        ks.set_expiry(b"k", when);

        ks.set_keep_ttl(b"k".to_vec(), string("w"));
        assert_eq!(ks.deadline(b"k"), Some(when));
        assert_eq!(ks.get(b"k"), Some(&string("w")));
    }

    #[test]
    fn test_ttl_sentinels() {
        let mut ks = Keyspace::new();
        assert_eq!(ks.ttl_seconds(b"absent"), -2);
        assert_eq!(ks.ttl_millis(b"absent"), -2);

        ks.set(b"k".to_vec(), string("v"));
        assert_eq!(ks.ttl_seconds(b"k"), -1);

        ks.set_expiry(b"k", Instant::now() + Duration::from_secs(5));
        let ttl = ks.ttl_seconds(b"k");
        assert!((0..=5).contains(&ttl));
    }

    #[test]
    fn test_set_expiry_on_absent_key_is_noop() {
        let mut ks = Keyspace::new();
        assert!(!ks.set_expiry(b"nope", Instant::now() + Duration::from_secs(5)));
        assert_eq!(ks.next_deadline(), None);
    }

    #[test]
    fn test_clear_expiry_reports_whether_deadline_existed() {
        let mut ks = Keyspace::new();
        ks.set(b"k".to_vec(), string("v"));
        assert!(!ks.clear_expiry(b"k"));
        ks.set_expiry(b"k", Instant::now() + Duration::from_secs(5));
        assert!(ks.clear_expiry(b"k"));
        assert_eq!(ks.ttl_seconds(b"k"), -1);
    }

    #[test]
    fn test_purge_expired_removes_only_due_keys() {
        let mut ks = Keyspace::new();
        let now = Instant::now();
        ks.set(b"a".to_vec(), string("1"));
        ks.set(b"b".to_vec(), string("2"));
        ks.set(b"c".to_vec(), string("3"));
        ks.set_expiry(b"a", now + Duration::from_secs(1));
        ks.set_expiry(b"b", now + Duration::from_secs(60));

        assert_eq!(ks.purge_expired(now + Duration::from_secs(2)), 1);
        assert!(ks.exists(b"b"));
        assert!(ks.exists(b"c"));
        assert_eq!(ks.len(), 2);
    }

    #[test]
    fn test_typed_access_rejects_wrong_type() {
        let mut ks = Keyspace::new();
        ks.set(b"s".to_vec(), string("x"));

        assert!(matches!(ks.get_list(b"s"), Err(CellStoreError::TypeMismatch)));
        assert!(matches!(ks.hash_entry(b"s"), Err(CellStoreError::TypeMismatch)));
        assert!(matches!(ks.get_string(b"s"), Ok(Some(_))));
        assert!(matches!(ks.get_set(b"missing"), Ok(None)));
        assert!(matches!(ks.get_hash_mut(b"s"), Err(CellStoreError::TypeMismatch)));
        assert!(matches!(ks.get_set_mut(b"missing"), Ok(None)));
    }

    #[test]
    fn test_mutable_access_edits_in_place() {
        let mut ks = Keyspace::new();
        ks.list_entry(b"l").unwrap().push_back(b"a".to_vec());
        if let Ok(Some(list)) = ks.get_list_mut(b"l") {
            list.push_back(b"b".to_vec());
        }
        assert_eq!(ks.get_list(b"l").unwrap().map(|l| l.len()), Some(2));

        ks.string_entry(b"s").unwrap().extend_from_slice(b"xy");
        assert_eq!(ks.get(b"s"), Some(&string("xy")));
    }

    #[test]
    fn test_iteration_is_ordered_by_key_bytes() {
        let mut ks = Keyspace::new();
        ks.set(b"b".to_vec(), string("2"));
        ks.set(b"a".to_vec(), string("1"));
        ks.set(b"c".to_vec(), string("3"));

        let keys: Vec<&Key> = ks.iter().map(|(k, _, _)| k).collect();
        assert_eq!(keys, vec![&b"a".to_vec(), &b"b".to_vec(), &b"c".to_vec()]);
    }
}
