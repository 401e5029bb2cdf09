use dashmap::DashMap;
use std::time::{Duration, Instant};

use crate::config::RateLimitConfig;

/// Independently configured class of endpoint, each with its own window,
/// ceiling, and composite-key rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tier {
    /// All API traffic, keyed by client IP.
    General,
    /// Authentication attempts, keyed by IP + attempted email. Successful
    /// attempts are forgiven so well-behaved repeat logins are not penalized.
    Auth,
    /// Contact-form submissions, keyed by IP + submitted email.
    Contact,
    /// Upload operations, keyed by IP + account id.
    Upload,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::General => "general",
            Tier::Auth => "auth",
            Tier::Contact => "contact",
            Tier::Upload => "upload",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TierLimit {
    pub max_requests: u32,
    pub window: Duration,
}

#[derive(Debug)]
struct Bucket {
    count: u32,
    window_start: Instant,
}

/// Fixed-window request counters for all tiers, in one owned store.
///
/// Mutations go through the map's entry API, so the read-compare-increment
/// sequence for a key happens under that key's shard lock; two concurrent
/// requests with the same key cannot interleave mid-update.
pub struct FixedWindowLimiter {
    general: TierLimit,
    auth: TierLimit,
    contact: TierLimit,
    upload: TierLimit,
    buckets: DashMap<(Tier, String), Bucket>,
}

impl FixedWindowLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self::with_limits(
            TierLimit {
                max_requests: config.general_max_requests,
                window: Duration::from_secs(config.general_window_seconds),
            },
            TierLimit {
                max_requests: config.auth_max_requests,
                window: Duration::from_secs(config.auth_window_seconds),
            },
            TierLimit {
                max_requests: config.contact_max_requests,
                window: Duration::from_secs(config.contact_window_seconds),
            },
            TierLimit {
                max_requests: config.upload_max_requests,
                window: Duration::from_secs(config.upload_window_seconds),
            },
        )
    }

    pub fn with_limits(
        general: TierLimit,
        auth: TierLimit,
        contact: TierLimit,
        upload: TierLimit,
    ) -> Self {
        Self {
            general,
            auth,
            contact,
            upload,
            buckets: DashMap::new(),
        }
    }

    fn limit(&self, tier: Tier) -> TierLimit {
        match tier {
            Tier::General => self.general,
            Tier::Auth => self.auth,
            Tier::Contact => self.contact,
            Tier::Upload => self.upload,
        }
    }

    /// Record one request against `key` and decide whether it may proceed.
    /// On denial, returns the time remaining until the window resets.
    pub fn check(&self, tier: Tier, key: &str) -> Result<(), Duration> {
        let limit = self.limit(tier);
        let now = Instant::now();
        let mut bucket = self
            .buckets
            .entry((tier, key.to_string()))
            .or_insert_with(|| Bucket {
                count: 0,
                window_start: now,
            });

        if now.duration_since(bucket.window_start) >= limit.window {
            bucket.count = 1;
            bucket.window_start = now;
            return Ok(());
        }

        bucket.count = bucket.count.saturating_add(1);
        if bucket.count > limit.max_requests {
            Err(limit.window - now.duration_since(bucket.window_start))
        } else {
            Ok(())
        }
    }

    pub fn allow(&self, tier: Tier, key: &str) -> bool {
        self.check(tier, key).is_ok()
    }

    /// Un-count one request in the key's current window. Called after a 2xx
    /// outcome on the auth tier so successful logins never consume quota.
    pub fn forgive(&self, tier: Tier, key: &str) {
        if let Some(mut bucket) = self.buckets.get_mut(&(tier, key.to_string())) {
            let limit = self.limit(tier);
            if bucket.window_start.elapsed() < limit.window && bucket.count > 0 {
                bucket.count -= 1;
            }
        }
    }

    /// Drop buckets whose window has elapsed. Absence of a bucket is
    /// equivalent to "never requested", so this only reclaims memory.
    pub fn evict_expired(&self) {
        self.buckets
            .retain(|(tier, _), bucket| bucket.window_start.elapsed() < self.limit(*tier).window);
    }

    #[cfg(test)]
    fn bucket_count(&self) -> usize {
        self.buckets.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(auth: TierLimit) -> FixedWindowLimiter {
        let wide = TierLimit {
            max_requests: 1000,
            window: Duration::from_secs(60),
        };
        FixedWindowLimiter::with_limits(wide, auth, wide, wide)
    }

    #[test]
    fn tier_labels_are_stable() {
        // Log and metric labels; renaming one breaks dashboards.
        assert_eq!(Tier::General.as_str(), "general");
        assert_eq!(Tier::Auth.as_str(), "auth");
        assert_eq!(Tier::Contact.as_str(), "contact");
        assert_eq!(Tier::Upload.as_str(), "upload");
    }

    #[test]
    fn allows_up_to_max_then_denies() {
        let limiter = limiter(TierLimit {
            max_requests: 10,
            window: Duration::from_secs(900),
        });
        for attempt in 1..=10 {
            assert!(
                limiter.allow(Tier::Auth, "1.2.3.4:stu@org.edu"),
                "attempt {attempt} should pass"
            );
        }
        assert!(!limiter.allow(Tier::Auth, "1.2.3.4:stu@org.edu"));
        // A different composite key is an independent bucket.
        assert!(limiter.allow(Tier::Auth, "5.6.7.8:stu@org.edu"));
    }

    #[test]
    fn window_elapse_resets_count() {
        let limiter = limiter(TierLimit {
            max_requests: 2,
            window: Duration::from_millis(40),
        });
        assert!(limiter.allow(Tier::Auth, "k"));
        assert!(limiter.allow(Tier::Auth, "k"));
        assert!(!limiter.allow(Tier::Auth, "k"));

        std::thread::sleep(Duration::from_millis(50));
        assert!(limiter.allow(Tier::Auth, "k"));
        assert!(limiter.allow(Tier::Auth, "k"));
        assert!(!limiter.allow(Tier::Auth, "k"));
    }

    #[test]
    fn forgive_returns_quota_within_window() {
        let limiter = limiter(TierLimit {
            max_requests: 1,
            window: Duration::from_secs(60),
        });
        assert!(limiter.allow(Tier::Auth, "k"));
        limiter.forgive(Tier::Auth, "k");
        assert!(limiter.allow(Tier::Auth, "k"));
        assert!(!limiter.allow(Tier::Auth, "k"));
    }

    #[test]
    fn denial_reports_time_until_reset() {
        let limiter = limiter(TierLimit {
            max_requests: 1,
            window: Duration::from_secs(60),
        });
        assert!(limiter.check(Tier::Auth, "k").is_ok());
        let retry_after = limiter.check(Tier::Auth, "k").unwrap_err();
        assert!(retry_after <= Duration::from_secs(60));
        assert!(retry_after > Duration::from_secs(58));
    }

    #[test]
    fn eviction_drops_only_elapsed_buckets() {
        let limiter = FixedWindowLimiter::with_limits(
            TierLimit {
                max_requests: 5,
                window: Duration::from_secs(60),
            },
            TierLimit {
                max_requests: 5,
                window: Duration::from_millis(10),
            },
            TierLimit {
                max_requests: 5,
                window: Duration::from_secs(60),
            },
            TierLimit {
                max_requests: 5,
                window: Duration::from_secs(60),
            },
        );
        limiter.allow(Tier::General, "a");
        limiter.allow(Tier::Auth, "b");
        std::thread::sleep(Duration::from_millis(20));
        limiter.evict_expired();
        assert_eq!(limiter.bucket_count(), 1);
        // The evicted key starts over as "never requested".
        assert!(limiter.allow(Tier::Auth, "b"));
    }

    #[test]
    fn concurrent_checks_never_overshoot() {
        use std::sync::Arc;

        let limiter = Arc::new(limiter(TierLimit {
            max_requests: 50,
            window: Duration::from_secs(60),
        }));
        let mut handles = Vec::new();
        for _ in 0..4 {
            let limiter = Arc::clone(&limiter);
            handles.push(std::thread::spawn(move || {
                (0..25).filter(|_| limiter.allow(Tier::Auth, "shared")).count()
            }));
        }
        let allowed: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(allowed, 50);
    }
}
