//! Per-key expiration bookkeeping
//!
//! Deadlines are absolute `Instant`s. They are kept twice: by key for the
//! lazy check every access performs, and ordered by deadline so the
//! background sweeper can find the next key due without scanning.

use crate::store::Key;
use std::collections::{BTreeSet, HashMap};
use tokio::time::{Duration, Instant};

/// Tracks absolute expiration deadlines for keys
#[derive(Debug, Default)]
pub struct ExpiryManager {
    deadlines: HashMap<Key, Instant>,
    queue: BTreeSet<(Instant, Key)>,
}

impl ExpiryManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set (or replace) the deadline of `key`
    pub fn set_expiry(&mut self, key: &[u8], when: Instant) {
        if let Some(prev) = self.deadlines.insert(key.to_vec(), when) {
            self.queue.remove(&(prev, key.to_vec()));
        }
        self.queue.insert((when, key.to_vec()));
    }

    /// Drop the deadline of `key`, returning it if there was one
    pub fn clear_expiry(&mut self, key: &[u8]) -> Option<Instant> {
        let prev = self.deadlines.remove(key)?;
        self.queue.remove(&(prev, key.to_vec()));
        Some(prev)
    }

    pub fn deadline(&self, key: &[u8]) -> Option<Instant> {
        self.deadlines.get(key).copied()
    }

    /// True when `key` has a deadline that is not in the future
    pub fn is_expired(&self, key: &[u8], now: Instant) -> bool {
        self.deadlines.get(key).is_some_and(|when| *when <= now)
    }

    /// Time left before `key` expires, `None` if it has no deadline
    pub fn remaining(&self, key: &[u8], now: Instant) -> Option<Duration> {
        self.deadlines
            .get(key)
            .map(|when| when.saturating_duration_since(now))
    }

    /// Earliest deadline currently tracked
    pub fn next_deadline(&self) -> Option<Instant> {
        self.queue.iter().next().map(|(when, _)| *when)
    }

    /// Remove and return every key whose deadline is `<= now`, earliest first
    pub fn drain_expired(&mut self, now: Instant) -> Vec<Key> {
        let mut expired = Vec::new();
        while let Some((when, _)) = self.queue.first() {
            if *when > now {
                break;
            }
            if let Some((_, key)) = self.queue.pop_first() {
                self.deadlines.remove(&key);
                expired.push(key);
            }
        }
        expired
    }

    pub fn len(&self) -> usize {
        self.deadlines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deadlines.is_empty()
    }

    pub fn clear(&mut self) {
        self.deadlines.clear();
        self.queue.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_clear_expiry() {
        let mut expiry = ExpiryManager::new();
        let now = Instant::now();
        expiry.set_expiry(b"k", now + Duration::from_secs(10));

        assert_eq!(expiry.deadline(b"k"), Some(now + Duration::from_secs(10)));
        assert!(!expiry.is_expired(b"k", now));
        assert!(expiry.is_expired(b"k", now + Duration::from_secs(10)));

        assert!(expiry.clear_expiry(b"k").is_some());
        assert!(expiry.clear_expiry(b"k").is_none());
        assert!(expiry.is_empty());
        assert_eq!(expiry.next_deadline(), None);
    }

    #[test]
    fn test_replacing_a_deadline_reorders_queue() {
        let mut expiry = ExpiryManager::new();
        let now = Instant::now();
        expiry.set_expiry(b"a", now + Duration::from_secs(5));
        expiry.set_expiry(b"b", now + Duration::from_secs(8));
        expiry.set_expiry(b"a", now + Duration::from_secs(20));

        assert_eq!(expiry.len(), 2);
        assert_eq!(expiry.next_deadline(), Some(now + Duration::from_secs(8)));
    }

    #[test]
    fn test_drain_expired_only_takes_due_keys() {
        let mut expiry = ExpiryManager::new();
        let now = Instant::now();
        expiry.set_expiry(b"late", now + Duration::from_secs(30));
        expiry.set_expiry(b"first", now + Duration::from_secs(1));
        expiry.set_expiry(b"second", now + Duration::from_secs(2));

        let drained = expiry.drain_expired(now + Duration::from_secs(2));
        assert_eq!(drained, vec![b"first".to_vec(), b"second".to_vec()]);
        assert_eq!(expiry.len(), 1);
        assert_eq!(expiry.deadline(b"late"), Some(now + Duration::from_secs(30)));
    }

    #[test]
    fn test_remaining_saturates_at_zero() {
        let mut expiry = ExpiryManager::new();
        let now = Instant::now();
        expiry.set_expiry(b"k", now + Duration::from_millis(1500));

        assert_eq!(expiry.remaining(b"k", now), Some(Duration::from_millis(1500)));
        assert_eq!(
            expiry.remaining(b"k", now + Duration::from_secs(3)),
            Some(Duration::ZERO)
        );
        assert_eq!(expiry.remaining(b"missing", now), None);
    }
}
