use dashmap::DashMap;
use ulid::Ulid;

use crate::model::Ms;

/// Sliding-window budget for sensitive operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitPolicy {
    pub window_ms: Ms,
    pub max_attempts: usize,
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        // 5 attempts per 15 minutes
        Self { window_ms: 15 * 60_000, max_attempts: 5 }
    }
}

/// Injected rate limiter keyed by (user, operation). Each key holds the
/// timestamps of attempts inside the current window; anything older is
/// pruned on the next check, so memory stays bounded by max_attempts per key.
pub struct SlidingWindowLimiter {
    policy: RateLimitPolicy,
    attempts: DashMap<(Ulid, &'static str), Vec<Ms>>,
}

impl SlidingWindowLimiter {
    pub fn new(policy: RateLimitPolicy) -> Self {
        Self { policy, attempts: DashMap::new() }
    }

    /// Record an attempt. `Err(retry_after_ms)` if the caller has exhausted
    /// the window's budget for this operation.
    pub fn check(&self, user_id: Ulid, operation: &'static str, now: Ms) -> Result<(), Ms> {
        let mut entry = self.attempts.entry((user_id, operation)).or_default();
        entry.retain(|&t| now - t < self.policy.window_ms);
        if entry.len() >= self.policy.max_attempts {
            let oldest = entry.first().copied().unwrap_or(now);
            return Err((oldest + self.policy.window_ms - now).max(0));
        }
        entry.push(now);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(window_ms: Ms, max_attempts: usize) -> SlidingWindowLimiter {
        SlidingWindowLimiter::new(RateLimitPolicy { window_ms, max_attempts })
    }

    #[test]
    fn allows_up_to_max_attempts() {
        let l = limiter(1000, 3);
        let u = Ulid::new();
        assert!(l.check(u, "create_booking", 0).is_ok());
        assert!(l.check(u, "create_booking", 1).is_ok());
        assert!(l.check(u, "create_booking", 2).is_ok());
        assert!(l.check(u, "create_booking", 3).is_err());
    }

    #[test]
    fn window_slides() {
        let l = limiter(1000, 2);
        let u = Ulid::new();
        l.check(u, "create_booking", 0).unwrap();
        l.check(u, "create_booking", 100).unwrap();
        assert!(l.check(u, "create_booking", 200).is_err());
        // First attempt leaves the window at t=1000
        assert!(l.check(u, "create_booking", 1000).is_ok());
    }

    #[test]
    fn retry_after_counts_down() {
        let l = limiter(1000, 1);
        let u = Ulid::new();
        l.check(u, "cancel_booking", 0).unwrap();
        assert_eq!(l.check(u, "cancel_booking", 400).unwrap_err(), 600);
    }

    #[test]
    fn keys_are_per_user_and_operation() {
        let l = limiter(1000, 1);
        let alice = Ulid::new();
        let bob = Ulid::new();
        l.check(alice, "create_booking", 0).unwrap();
        // Different user, same op
        assert!(l.check(bob, "create_booking", 0).is_ok());
        // Same user, different op
        assert!(l.check(alice, "cancel_booking", 0).is_ok());
        // Same user, same op
        assert!(l.check(alice, "create_booking", 0).is_err());
    }
}
