//! Server-side sessions with idle-timeout eviction.
//!
//! Every operation on a session id runs under the shard lock that owns that id,
//! so reads, writes and the expiry sweep on the same id are linearizable. An
//! access that finds an expired session removes it and reports a miss, so a
//! session past its timeout is never served even if the sweep has not run yet.
//!
//! Mutating a session that does not exist is a silent no-op: `set_item` and
//! `remove_item` report it through their return value and never fail.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

#[derive(Debug)]
struct Session {
    items: HashMap<String, String>,
    last_access: Instant,
}

impl Session {
    fn new(now: Instant) -> Self {
        Self {
            items: HashMap::new(),
            last_access: now,
        }
    }

    fn is_expired(&self, now: Instant, timeout: Duration) -> bool {
        now.saturating_duration_since(self.last_access) > timeout
    }
}

#[derive(Debug)]
pub struct SessionStore {
    sessions: DashMap<String, Session>,
    timeout_ms: AtomicU64,
}

impl SessionStore {
    pub fn new(timeout: Duration) -> Self {
        Self {
            sessions: DashMap::new(),
            timeout_ms: AtomicU64::new(timeout.as_millis() as u64),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms.load(Ordering::Relaxed))
    }

    pub fn set_timeout(&self, timeout: Duration) {
        self.timeout_ms
            .store(timeout.as_millis() as u64, Ordering::Relaxed);
    }

    /// Installs an empty session and returns its fresh id.
    pub fn create(&self) -> String {
        let id = ulid::Ulid::new().to_string();
        self.sessions
            .insert(id.clone(), Session::new(Instant::now()));
        debug!(session_id = %id, "Session created");
        id
    }

    /// Whether `id` names a live session. Refreshes it on success.
    pub fn load(&self, id: &str) -> bool {
        self.with_live(id, |_| ()).is_some()
    }

    pub fn get_item(&self, id: &str, key: &str) -> Option<String> {
        self.with_live(id, |session| session.items.get(key).cloned())
            .flatten()
    }

    /// Stores `value` under `key`. Returns `false` when the session is missing.
    pub fn set_item(&self, id: &str, key: &str, value: &str) -> bool {
        self.with_live(id, |session| {
            session.items.insert(key.to_string(), value.to_string());
        })
        .is_some()
    }

    /// Removes `key` and returns its previous value. An emptied session stays alive.
    pub fn remove_item(&self, id: &str, key: &str) -> Option<String> {
        self.with_live(id, |session| session.items.remove(key))
            .flatten()
    }

    /// Deletes every session idle for longer than the timeout.
    pub fn sweep(&self) -> usize {
        self.sweep_at(Instant::now())
    }

    fn sweep_at(&self, now: Instant) -> usize {
        let timeout = self.timeout();
        let mut removed = 0;
        self.sessions.retain(|_, session| {
            let keep = !session.is_expired(now, timeout);
            if !keep {
                removed += 1;
            }
            keep
        });
        removed
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Starts a task on the current tokio runtime that sweeps every `interval`.
    ///
    /// The task holds only a weak reference and exits once the store is
    /// dropped. Dropping the returned handle aborts it.
    pub fn start_sweeper(self: &Arc<Self>, interval: Duration) -> std::io::Result<SessionSweeper> {
        let runtime = Handle::try_current()
            .map_err(|e| std::io::Error::other(format!("session sweeper needs a tokio runtime: {e}")))?;
        let task = runtime.spawn(sweep_loop(Arc::downgrade(self), interval));

        info!(interval_ms = interval.as_millis() as u64, "Session sweeper started");
        Ok(SessionSweeper { task })
    }

    fn with_live<R>(&self, id: &str, f: impl FnOnce(&mut Session) -> R) -> Option<R> {
        let now = Instant::now();
        let timeout = self.timeout();

        match self.sessions.entry(id.to_string()) {
            Entry::Occupied(mut entry) => {
                if entry.get().is_expired(now, timeout) {
                    entry.remove();
                    debug!(session_id = %id, "Session expired on access");
                    return None;
                }
                let session = entry.get_mut();
                session.last_access = now;
                Some(f(session))
            }
            Entry::Vacant(_) => None,
        }
    }
}

async fn sweep_loop(store: Weak<SessionStore>, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    ticker.tick().await;

    loop {
        ticker.tick().await;
        let Some(store) = store.upgrade() else {
            break;
        };
        let removed = store.sweep();
        if removed > 0 {
            debug!(removed, remaining = store.len(), "Expired sessions swept");
        }
    }
}

/// Handle to the sweeper task. Dropping it stops the task.
#[derive(Debug)]
pub struct SessionSweeper {
    task: JoinHandle<()>,
}

impl Drop for SessionSweeper {
    fn drop(&mut self) {
        self.task.abort();
    }
}
