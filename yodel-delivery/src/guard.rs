use std::time::{Duration, Instant};

use dashmap::{DashMap, mapref::entry::Entry};

/// Keeps a second SMS from going to a number while one is already queued or
/// in flight.
///
/// Locks are released when the SMS is sent or given up on. The TTL only
/// matters when neither happens, e.g. after a crash.
#[derive(Debug)]
pub struct SmsGuard {
    locks: DashMap<String, Instant>,
    ttl: Duration,
}

impl SmsGuard {
    pub fn new(ttl: Duration) -> Self {
        Self {
            locks: DashMap::new(),
            ttl,
        }
    }

    /// Take the lock for `phone`, returning `false` if someone holds it
    pub fn try_acquire(&self, phone: &str) -> bool {
        let now = Instant::now();

        match self.locks.entry(phone.to_string()) {
            Entry::Occupied(mut held) => {
                if *held.get() > now {
                    false
                } else {
                    held.insert(now + self.ttl);
                    true
                }
            }
            Entry::Vacant(free) => {
                free.insert(now + self.ttl);
                true
            }
        }
    }

    pub fn release(&self, phone: &str) {
        self.locks.remove(phone);
    }

    pub fn is_locked(&self, phone: &str) -> bool {
        self.locks
            .get(phone)
            .is_some_and(|expires| *expires > Instant::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_acquire_is_refused() {
        let guard = SmsGuard::new(Duration::from_secs(3600));

        assert!(guard.try_acquire("+15550001111"));
        assert!(!guard.try_acquire("+15550001111"));
        assert!(guard.try_acquire("+15550002222"));

        guard.release("+15550001111");
        assert!(!guard.is_locked("+15550001111"));
        assert!(guard.try_acquire("+15550001111"));
    }

    #[test]
    fn test_expired_lock_can_be_taken() {
        let guard = SmsGuard::new(Duration::ZERO);

        assert!(guard.try_acquire("+15550001111"));
        assert!(!guard.is_locked("+15550001111"));
        assert!(guard.try_acquire("+15550001111"));
    }
}
