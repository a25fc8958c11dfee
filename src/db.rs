//! Shared handle to the keyspace
//!
//! `Db` is cloned into every connection task. Cloning is shallow: all clones
//! share one `Keyspace` behind a `std::sync::Mutex`. The lock is held for
//! exactly one command and never across an `.await`, which is what makes each
//! command atomic with respect to every other connection.
//!
//! Expired keys are reclaimed two ways. Every access checks the key's
//! deadline first, and an optional background task sleeps until the earliest
//! deadline and purges whatever is due.

use crate::command::Command;
use crate::protocol::Response;
use crate::snapshot::Snapshot;
use crate::store::Keyspace;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct Db {
    shared: Arc<Shared>,
}

#[derive(Debug)]
struct Shared {
    state: Mutex<State>,

    /// Wakes the expiry task when the earliest deadline moves or on shutdown
    background_task: Notify,
}

#[derive(Debug)]
struct State {
    keyspace: Keyspace,
    shutdown: bool,
}

impl Db {
    pub fn new() -> Db {
        Db::from_keyspace(Keyspace::new())
    }

    pub fn from_keyspace(keyspace: Keyspace) -> Db {
        Db {
            shared: Arc::new(Shared {
                state: Mutex::new(State {
                    keyspace,
                    shutdown: false,
                }),
                background_task: Notify::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // A panic while holding the lock cannot leave the keyspace half
        // written: commands validate before they mutate.
        self.shared
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Run `f` with exclusive access to the keyspace
    pub fn with<R>(&self, f: impl FnOnce(&mut Keyspace) -> R) -> R {
        let mut state = self.lock();
        let before = state.keyspace.next_deadline();
        let result = f(&mut state.keyspace);
        let after = state.keyspace.next_deadline();
        drop(state);

        let moved_earlier = match (before, after) {
            (_, None) => false,
            (None, Some(_)) => true,
            (Some(b), Some(a)) => a < b,
        };
        if moved_earlier {
            self.shared.background_task.notify_one();
        }
        result
    }

    /// Execute one command atomically
    pub fn execute(&self, command: Command) -> Response {
        self.with(|ks| command.execute(ks))
    }

    /// Start the active expiry task. It runs until [`Db::shutdown`].
    pub fn spawn_expiry_sweeper(&self) -> JoinHandle<()> {
        tokio::spawn(purge_expired_tasks(self.shared.clone()))
    }

    /// Stop the expiry task
    pub fn shutdown(&self) {
        self.lock().shutdown = true;
        self.shared.background_task.notify_one();
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot::capture(&self.lock().keyspace)
    }

    /// Load a snapshot on top of the current contents. Returns the number of
    /// keys loaded.
    pub fn restore(&self, snapshot: Snapshot) -> usize {
        self.with(|ks| snapshot.restore_into(ks))
    }
}

impl Default for Db {
    fn default() -> Self {
        Db::new()
    }
}

impl Shared {
    /// Purge every due key. Returns the next deadline, or `None` when the
    /// task should wait for a notification instead.
    fn purge_expired_keys(&self) -> Option<Instant> {
        let mut state = self
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if state.shutdown {
            return None;
        }
        let purged = state.keyspace.purge_expired(Instant::now());
        if purged > 0 {
            debug!(purged, "expired keys reclaimed");
        }
        state.keyspace.next_deadline()
    }

    fn is_shutdown(&self) -> bool {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .shutdown
    }
}

async fn purge_expired_tasks(shared: Arc<Shared>) {
    while !shared.is_shutdown() {
        if let Some(when) = shared.purge_expired_keys() {
            tokio::select! {
                _ = time::sleep_until(when) => {}
                _ = shared.background_task.notified() => {}
            }
        } else {
            shared.background_task.notified().await;
        }
    }
    debug!("expiry task shut down");
}
