//! # Instance Lock Registry
//!
//! Serializes deploy-triggering operations per instance ID (and, in a separate
//! registry, binding operations per binding ID). Check-and-insert happens
//! under one mutex acquisition; release happens when the guard drops, so every
//! exit path of a broker verb frees the lock.
//!
//! A second caller never waits: acquisition fails immediately with
//! [`LockError::AlreadyHeld`].

use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LockError {
    #[error("Broker is already processing a request for {kind} {id}")]
    AlreadyHeld { kind: &'static str, id: String },
}

#[derive(Debug)]
pub struct InstanceLockRegistry {
    kind: &'static str,
    held: Mutex<HashSet<String>>,
}

impl InstanceLockRegistry {
    /// `kind` names what the IDs identify ("instance", "binding") in error messages
    pub fn new(kind: &'static str) -> Arc<Self> {
        Arc::new(Self {
            kind,
            held: Mutex::new(HashSet::new()),
        })
    }

    pub fn try_acquire(self: &Arc<Self>, id: &str) -> Result<InstanceLockGuard, LockError> {
        let inserted = self.held.lock().insert(id.to_string());
        if !inserted {
            debug!(kind = self.kind, id = %id, "lock already held");
            return Err(LockError::AlreadyHeld {
                kind: self.kind,
                id: id.to_string(),
            });
        }

        debug!(kind = self.kind, id = %id, "lock acquired");
        Ok(InstanceLockGuard {
            registry: Arc::clone(self),
            id: id.to_string(),
        })
    }

    pub fn is_held(&self, id: &str) -> bool {
        self.held.lock().contains(id)
    }

    pub fn held_count(&self) -> usize {
        self.held.lock().len()
    }

    fn release(&self, id: &str) {
        self.held.lock().remove(id);
        debug!(kind = self.kind, id = %id, "lock released");
    }
}

/// Holds one ID until dropped
#[derive(Debug)]
pub struct InstanceLockGuard {
    registry: Arc<InstanceLockRegistry>,
    id: String,
}

impl InstanceLockGuard {
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl Drop for InstanceLockGuard {
    fn drop(&mut self) {
        self.registry.release(&self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_acquire_fails_until_release() {
        let registry = InstanceLockRegistry::new("instance");

        let guard = registry.try_acquire("i1").unwrap();
        assert!(registry.is_held("i1"));

        let err = registry.try_acquire("i1").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Broker is already processing a request for instance i1"
        );

        drop(guard);
        assert!(!registry.is_held("i1"));
        assert!(registry.try_acquire("i1").is_ok());
    }

    #[test]
    fn test_distinct_ids_do_not_contend() {
        let registry = InstanceLockRegistry::new("instance");
        let _a = registry.try_acquire("a").unwrap();
        let _b = registry.try_acquire("b").unwrap();
        assert_eq!(registry.held_count(), 2);
    }

    #[test]
    fn test_exactly_one_winner_across_threads() {
        let registry = InstanceLockRegistry::new("instance");
        let barrier = Arc::new(std::sync::Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    barrier.wait();
                    registry.try_acquire("contended").map(std::mem::forget).is_ok()
                })
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
    }
}
