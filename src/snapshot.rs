//! Point-in-time copies of the keyspace
//!
//! A [`Snapshot`] is a plain serde value holding every live entry and its
//! remaining TTL. Deadlines are stored relative to the capture time so a
//! snapshot restored later gives each key the time it had left. Where a
//! snapshot goes is up to the [`SnapshotSink`] the server is given; the
//! keyspace itself never touches disk.

use crate::error::Result;
use crate::store::{Key, Keyspace, Value};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::time::{Duration, Instant};

/// One key, its value and the time it had left when captured
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    pub key: Key,
    pub value: Value,
    pub ttl_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Wall-clock capture time in milliseconds since the Unix epoch
    pub taken_at_ms: u64,
    pub entries: Vec<SnapshotEntry>,
}

impl Snapshot {
    /// Copy every live entry out of `ks`, in key order
    pub fn capture(ks: &Keyspace) -> Snapshot {
        let now = Instant::now();
        let entries = ks
            .iter()
            .filter(|(_, _, deadline)| deadline.map_or(true, |when| when > now))
            .map(|(key, value, deadline)| SnapshotEntry {
                key: key.clone(),
                value: value.clone(),
                ttl_ms: deadline.map(|when| {
                    u64::try_from(when.duration_since(now).as_millis()).unwrap_or(u64::MAX)
                }),
            })
            .collect();

        Snapshot {
            taken_at_ms: unix_millis(),
            entries,
        }
    }

    /// Load every entry into `ks`, replacing keys that already exist.
    /// Returns how many entries were loaded.
    pub fn restore_into(self, ks: &mut Keyspace) -> usize {
        let now = Instant::now();
        let mut loaded = 0;
        for entry in self.entries {
            if entry.ttl_ms == Some(0) || entry.value.is_empty_container() {
                continue;
            }
            let key = entry.key;
            ks.set(key.clone(), entry.value);
            if let Some(ms) = entry.ttl_ms {
                ks.set_expiry(&key, now + Duration::from_millis(ms));
            }
            loaded += 1;
        }
        loaded
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Snapshot> {
        Ok(serde_json::from_str(json)?)
    }
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

/// Receives the keyspace snapshot taken when the server shuts down
pub trait SnapshotSink: Send + Sync {
    fn accept(&self, snapshot: Snapshot) -> Result<()>;
}

/// Keeps every snapshot it is handed, newest last
#[derive(Debug, Default)]
pub struct MemorySink {
    snapshots: Mutex<Vec<Snapshot>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn latest(&self) -> Option<Snapshot> {
        self.snapshots
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .last()
            .cloned()
    }
}

impl SnapshotSink for MemorySink {
    fn accept(&self, snapshot: Snapshot) -> Result<()> {
        self.snapshots
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(snapshot);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{HashMap, VecDeque};

    fn b(s: &str) -> Vec<u8> {
        s.as_bytes().to_vec()
    }

    fn sample() -> Keyspace {
        let mut ks = Keyspace::new();
        ks.set(b("s"), Value::String(b("hello")));
        ks.set(b("l"), Value::List(VecDeque::from(vec![b("a"), b("b")])));
        ks.set(b("h"), Value::Hash(HashMap::from([(b("f"), b("v"))])));
        ks.set_expiry(b"s", Instant::now() + Duration::from_secs(60));
        ks
    }

    #[tokio::test(start_paused = true)]
    async fn test_capture_skips_expired_entries() {
        let mut ks = sample();
        ks.set(b("gone"), Value::String(b("x")));
        ks.set_expiry(b"gone", Instant::now() + Duration::from_millis(10));
        tokio::time::advance(Duration::from_millis(20)).await;

        let snapshot = Snapshot::capture(&ks);
        let keys: Vec<_> = snapshot.entries.iter().map(|e| e.key.clone()).collect();
        assert_eq!(keys, vec![b("h"), b("l"), b("s")]);
        assert_eq!(snapshot.entries[2].ttl_ms, Some(59_980));
    }

    #[tokio::test(start_paused = true)]
    async fn test_restore_carries_remaining_ttl() {
        let snapshot = Snapshot::capture(&sample());

        let mut restored = Keyspace::new();
        assert_eq!(snapshot.restore_into(&mut restored), 3);
        assert_eq!(restored.get(b"s"), Some(&Value::String(b("hello"))));
        assert_eq!(restored.ttl_millis(b"s"), 60_000);
        assert_eq!(restored.ttl_millis(b"l"), -1);
    }

    #[test]
    fn test_restore_skips_empty_containers() {
        let snapshot = Snapshot {
            taken_at_ms: 0,
            entries: vec![
                SnapshotEntry {
                    key: b("empty"),
                    value: Value::List(VecDeque::new()),
                    ttl_ms: None,
                },
                SnapshotEntry {
                    key: b("s"),
                    value: Value::String(Vec::new()),
                    ttl_ms: None,
                },
            ],
        };

        let mut ks = Keyspace::new();
        assert_eq!(snapshot.restore_into(&mut ks), 1);
        assert!(!ks.exists(b"empty"));
        assert!(ks.exists(b"s"));
    }

    #[test]
    fn test_json_round_trip_keeps_hashes() {
        let snapshot = Snapshot::capture(&sample());
        let json = snapshot.to_json().unwrap();
        assert_eq!(Snapshot::from_json(&json).unwrap(), snapshot);
    }

    #[test]
    fn test_memory_sink_keeps_latest() {
        let sink = MemorySink::new();
        assert!(sink.latest().is_none());
        sink.accept(Snapshot::capture(&Keyspace::new())).unwrap();
        sink.accept(Snapshot::capture(&sample())).unwrap();
        assert_eq!(sink.latest().map(|s| s.len()), Some(3));
    }

    #[test]
    fn test_bad_json_is_a_serialization_error() {
        assert!(matches!(
            Snapshot::from_json("{not json"),
            Err(crate::error::CellStoreError::Serialization(_))
        ));
    }
}
