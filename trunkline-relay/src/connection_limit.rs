//! Connection Limiting
//!
//! Caps concurrent WebSocket connections. Each accepted connection
//! holds a guard; the slot frees itself when the guard drops, however
//! the connection ends.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Clone)]
pub struct ConnectionLimiter {
    active: Arc<AtomicUsize>,
    max_connections: usize,
}

/// RAII slot held for the lifetime of one connection.
pub struct ConnectionGuard {
    active: Arc<AtomicUsize>,
}

impl ConnectionLimiter {
    pub fn new(max_connections: usize) -> Self {
        ConnectionLimiter {
            active: Arc::new(AtomicUsize::new(0)),
            max_connections,
        }
    }

    /// Claims a slot, or returns `None` at capacity.
    pub fn try_acquire(&self) -> Option<ConnectionGuard> {
        let claimed = self
            .active
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
                if current < self.max_connections {
                    Some(current + 1)
                } else {
                    None
                }
            });

        match claimed {
            Ok(_) => Some(ConnectionGuard {
                active: self.active.clone(),
            }),
            Err(_) => None,
        }
    }

    pub fn active_count(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_up_to_limit() {
        let limiter = ConnectionLimiter::new(2);

        let a = limiter.try_acquire();
        let b = limiter.try_acquire();
        assert!(a.is_some());
        assert!(b.is_some());
        assert_eq!(limiter.active_count(), 2);

        assert!(limiter.try_acquire().is_none());
    }

    #[test]
    fn test_drop_releases_slot() {
        let limiter = ConnectionLimiter::new(1);

        let guard = limiter.try_acquire();
        assert!(guard.is_some());
        assert!(limiter.try_acquire().is_none());

        drop(guard);
        assert_eq!(limiter.active_count(), 0);
        assert!(limiter.try_acquire().is_some());
    }

    #[test]
    fn test_clones_share_the_count() {
        let limiter = ConnectionLimiter::new(3);
        let clone = limiter.clone();

        let _guard = limiter.try_acquire().unwrap();
        assert_eq!(clone.active_count(), 1);
    }
}
