//! Per-shop import lock.
//!
//! Acquisition never waits: a second import for the same shop gets `None`
//! immediately. The returned guard releases the lock when dropped, so every
//! exit path of an import (success, validation failure, store error, panic
//! unwinding) frees the shop.

use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Scoped ownership of a shop's import lock.
pub struct ImportLockGuard {
    shop_id: i64,
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl ImportLockGuard {
    /// Wraps a release action to run on drop.
    pub fn new(shop_id: i64, release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            shop_id,
            release: Some(Box::new(release)),
        }
    }

    /// Shop this guard locks.
    #[must_use]
    pub const fn shop_id(&self) -> i64 {
        self.shop_id
    }
}

impl fmt::Debug for ImportLockGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImportLockGuard")
            .field("shop_id", &self.shop_id)
            .finish_non_exhaustive()
    }
}

impl Drop for ImportLockGuard {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

/// Hands out per-shop import locks.
pub trait ImportLockProvider: Send + Sync {
    /// Takes the lock for `shop_id`, or returns `None` if it is held.
    fn try_acquire(&self, shop_id: i64) -> Option<ImportLockGuard>;
}

/// Process-local lock table.
#[derive(Debug, Default, Clone)]
pub struct InMemoryImportLocks {
    held: Arc<Mutex<HashSet<i64>>>,
}

impl InMemoryImportLocks {
    /// Whether `shop_id` is currently locked.
    #[must_use]
    pub fn is_locked(&self, shop_id: i64) -> bool {
        self.held
            .lock()
            .map(|held| held.contains(&shop_id))
            .unwrap_or(false)
    }
}

impl ImportLockProvider for InMemoryImportLocks {
    fn try_acquire(&self, shop_id: i64) -> Option<ImportLockGuard> {
        let mut held = self
            .held
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if !held.insert(shop_id) {
            return None;
        }
        debug!(shop_id, "Import lock acquired");

        let table = Arc::clone(&self.held);
        Some(ImportLockGuard::new(shop_id, move || {
            let mut held = table
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            held.remove(&shop_id);
            debug!(shop_id, "Import lock released");
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_acquire_fails_fast() {
        let locks = InMemoryImportLocks::default();
        let guard = locks.try_acquire(1);
        assert!(guard.is_some());
        assert!(locks.try_acquire(1).is_none());

        // Other shops are independent
        assert!(locks.try_acquire(2).is_some());
    }

    #[test]
    fn test_drop_releases() {
        let locks = InMemoryImportLocks::default();
        {
            let _guard = locks.try_acquire(7);
            assert!(locks.is_locked(7));
        }
        assert!(!locks.is_locked(7));
        assert!(locks.try_acquire(7).is_some());
    }
}
