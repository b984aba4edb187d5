//! Brute-force login throttling keyed by client address fingerprint.

use std::cell::Cell;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::cache::ExpiringCache;

/// Default lockout window: 15 minutes.
pub const DEFAULT_LOCKOUT_MINUTES: i64 = 15;

/// Throttle policy.
#[derive(Debug, Clone, Copy)]
pub struct LoginThrottleConfig {
    /// How long a window lasts, measured from its first attempt.
    pub lockout: Duration,
    /// Failures inside one window before the fingerprint is blocked.
    pub max_failures: u32,
}

impl Default for LoginThrottleConfig {
    fn default() -> Self {
        Self {
            lockout: Duration::minutes(DEFAULT_LOCKOUT_MINUTES),
            max_failures: 1,
        }
    }
}

/// Attempts seen for one fingerprint inside the current window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginAttemptRecord {
    pub window_start: DateTime<Utc>,
    pub failures: u32,
    /// Admitted attempts whose outcome is not known yet.
    pub in_flight: u32,
}

/// Hash a client address so raw addresses never become cache keys.
pub fn fingerprint(addr: &str) -> String {
    format!("{:x}", Sha256::digest(addr.as_bytes()))
}

/// Tracks recent login failures per fingerprint.
///
/// The first attempt opens a window of `lockout`; later attempts only count
/// against it and never move its start. A success drops the record outright.
///
/// [`begin_attempt`](Self::begin_attempt) admits at most `max_failures`
/// unresolved attempts per window, so concurrent requests cannot all pass the
/// check before the first failure is recorded.
#[derive(Debug)]
pub struct LoginAttemptThrottle {
    attempts: ExpiringCache<String, LoginAttemptRecord>,
    max_failures: u32,
}

impl LoginAttemptThrottle {
    pub fn new(config: LoginThrottleConfig) -> Self {
        Self {
            attempts: ExpiringCache::new(config.lockout),
            max_failures: config.max_failures.max(1),
        }
    }

    /// Admit a login attempt for `fingerprint` unless failures plus pending
    /// attempts already reach the limit. Check and reservation are one atomic
    /// step. An admitted attempt must end in [`login_failed`](Self::login_failed),
    /// [`login_succeeded`](Self::login_succeeded) or
    /// [`attempt_abandoned`](Self::attempt_abandoned).
    pub fn begin_attempt(&self, fingerprint: &str) -> bool {
        self.begin_attempt_at(fingerprint, Utc::now())
    }

    fn begin_attempt_at(&self, fingerprint: &str, now: DateTime<Utc>) -> bool {
        let admitted = Cell::new(true);
        self.attempts.upsert_at(
            fingerprint.to_string(),
            now,
            || LoginAttemptRecord {
                window_start: now,
                failures: 0,
                in_flight: 1,
            },
            |record| {
                if record.failures.saturating_add(record.in_flight) >= self.max_failures {
                    admitted.set(false);
                } else {
                    record.in_flight += 1;
                }
            },
        );
        admitted.get()
    }

    /// [`begin_attempt`](Self::begin_attempt) wrapped in a guard that
    /// abandons the attempt if it is dropped unsettled.
    pub fn try_begin(&self, fingerprint: &str) -> Option<LoginAttempt<'_>> {
        self.begin_attempt(fingerprint).then(|| LoginAttempt {
            throttle: self,
            fingerprint: fingerprint.to_string(),
            settled: false,
        })
    }

    /// Record a failed login for `fingerprint`, settling one pending attempt.
    pub fn login_failed(&self, fingerprint: &str) {
        self.login_failed_at(fingerprint, Utc::now());
    }

    fn login_failed_at(&self, fingerprint: &str, now: DateTime<Utc>) {
        let record = self.attempts.upsert_at(
            fingerprint.to_string(),
            now,
            || LoginAttemptRecord {
                window_start: now,
                failures: 1,
                in_flight: 0,
            },
            |record| {
                record.failures = record.failures.saturating_add(1);
                record.in_flight = record.in_flight.saturating_sub(1);
            },
        );
        debug!(fingerprint, failures = record.failures, "login failure recorded");
        if record.failures == self.max_failures {
            info!(
                fingerprint,
                until = %(record.window_start + self.attempts.ttl()),
                "login attempts blocked"
            );
        }
    }

    /// Release a pending attempt whose outcome was neither success nor failure.
    pub fn attempt_abandoned(&self, fingerprint: &str) {
        self.attempts.update(&fingerprint.to_string(), |record| {
            record.in_flight = record.in_flight.saturating_sub(1);
        });
    }

    /// Forget every failure recorded for `fingerprint`.
    pub fn login_succeeded(&self, fingerprint: &str) {
        if self.attempts.remove(&fingerprint.to_string()).is_some() {
            debug!(fingerprint, "login failures cleared");
        }
    }

    /// True iff `fingerprint` reached the failure limit inside a live window.
    pub fn is_blocked(&self, fingerprint: &str) -> bool {
        self.is_blocked_at(fingerprint, Utc::now())
    }

    fn is_blocked_at(&self, fingerprint: &str, now: DateTime<Utc>) -> bool {
        self.record_at(fingerprint, now)
            .is_some_and(|record| record.failures >= self.max_failures)
    }

    /// Current record for `fingerprint`, if its window is still open.
    pub fn record(&self, fingerprint: &str) -> Option<LoginAttemptRecord> {
        self.record_at(fingerprint, Utc::now())
    }

    fn record_at(&self, fingerprint: &str, now: DateTime<Utc>) -> Option<LoginAttemptRecord> {
        self.attempts.get_at(&fingerprint.to_string(), now)
    }

    /// Evict closed windows. Returns how many records were dropped.
    pub fn purge_expired(&self) -> usize {
        self.attempts.purge_expired()
    }

    /// Spawn a periodic sweeper so closed windows don't accumulate.
    pub fn spawn_purge_task(
        self: &Arc<Self>,
        every: std::time::Duration,
    ) -> tokio::task::JoinHandle<()> {
        let throttle = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            loop {
                interval.tick().await;
                let purged = throttle.purge_expired();
                if purged > 0 {
                    debug!(purged, "purged expired login attempt records");
                }
            }
        })
    }
}

/// An admitted login attempt. Dropping it without settling releases it.
#[must_use]
#[derive(Debug)]
pub struct LoginAttempt<'a> {
    throttle: &'a LoginAttemptThrottle,
    fingerprint: String,
    settled: bool,
}

impl LoginAttempt<'_> {
    pub fn failed(mut self) {
        self.settled = true;
        self.throttle.login_failed(&self.fingerprint);
    }

    pub fn succeeded(mut self) {
        self.settled = true;
        self.throttle.login_succeeded(&self.fingerprint);
    }
}

impl Drop for LoginAttempt<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.throttle.attempt_abandoned(&self.fingerprint);
        }
    }
}
