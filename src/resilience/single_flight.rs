//! Request coalescing: at most one in-flight upstream call per key.
//!
//! The first caller for a key becomes the leader and does the work; callers
//! arriving while it runs become followers and receive the leader's outcome.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use tokio::sync::watch;

struct Flight<T> {
    generation: u64,
    rx: watch::Receiver<Option<T>>,
}

pub struct SingleFlight<T> {
    inflight: Mutex<HashMap<String, Flight<T>>>,
    next_generation: AtomicU64,
}

pub enum Join<'a, T: Clone> {
    Leader(FlightGuard<'a, T>),
    Follower(Follower<T>),
}

impl<T: Clone> SingleFlight<T> {
    pub fn new() -> Self {
        Self {
            inflight: Mutex::new(HashMap::new()),
            next_generation: AtomicU64::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Flight<T>>> {
        // The map holds no invariant a panicking holder could break.
        self.inflight.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn join(&self, key: &str) -> Join<'_, T> {
        let mut inflight = self.lock();
        if let Some(flight) = inflight.get(key) {
            return Join::Follower(Follower {
                rx: flight.rx.clone(),
            });
        }
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = watch::channel(None);
        inflight.insert(key.to_string(), Flight { generation, rx });
        Join::Leader(FlightGuard {
            owner: self,
            key: key.to_string(),
            generation,
            tx,
        })
    }

    /// Number of keys with a call in flight.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Clone> Default for SingleFlight<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Held by the leader. Dropping it without [`FlightGuard::complete`] releases
/// the key and wakes followers with nothing, so one of them can take over.
pub struct FlightGuard<'a, T: Clone> {
    owner: &'a SingleFlight<T>,
    key: String,
    generation: u64,
    tx: watch::Sender<Option<T>>,
}

impl<T: Clone> FlightGuard<'_, T> {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn complete(self, value: T) {
        // No receivers left is fine; the value simply goes nowhere.
        let _ = self.tx.send(Some(value));
    }
}

impl<T: Clone> Drop for FlightGuard<'_, T> {
    fn drop(&mut self) {
        let mut inflight = self.owner.lock();
        if inflight
            .get(&self.key)
            .is_some_and(|f| f.generation == self.generation)
        {
            inflight.remove(&self.key);
        }
    }
}

pub struct Follower<T> {
    rx: watch::Receiver<Option<T>>,
}

impl<T: Clone> Follower<T> {
    /// Wait for the leader. `None` means the leader went away without an outcome.
    pub async fn wait(mut self) -> Option<T> {
        loop {
            if let Some(value) = self.rx.borrow_and_update().clone() {
                return Some(value);
            }
            if self.rx.changed().await.is_err() {
                return self.rx.borrow().clone();
            }
        }
    }
}
