//! Rolling-window attempt gate.
//!
//! Caps a user to `max_attempts` timed-test attempts per rolling `window` and
//! reports exactly when the next slot opens. The gate is stateless: every
//! decision is computed from the attempt history the caller (or an
//! [`AttemptStore`]) supplies.
//!
//! Two concurrent sessions of the same user can both pass `check` before
//! either records its attempt. Nothing here reserves a slot.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigurationError, StorageError};
use crate::traits::AttemptStore;

/// Default number of timed attempts allowed per window.
pub const DEFAULT_MAX_ATTEMPTS: usize = 5;

/// Default window length in hours.
pub const DEFAULT_WINDOW_HOURS: i64 = 24;

/// Gate settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateConfig {
    max_attempts: usize,
    window: Duration,
}

impl GateConfig {
    pub fn new(max_attempts: usize, window: Duration) -> Result<Self, ConfigurationError> {
        if max_attempts == 0 {
            return Err(ConfigurationError::InvalidSetting {
                name: "max_attempts",
                message: "must be at least 1".into(),
            });
        }
        if window <= Duration::zero() {
            return Err(ConfigurationError::InvalidSetting {
                name: "window",
                message: "must be positive".into(),
            });
        }
        Ok(Self {
            max_attempts,
            window,
        })
    }

    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    pub fn window(&self) -> Duration {
        self.window
    }
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            window: Duration::hours(DEFAULT_WINDOW_HOURS),
        }
    }
}

/// Whether a user may start a timed test right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessDecision {
    pub blocked: bool,
    /// Present exactly when `blocked` is true.
    pub unlocks_at: Option<DateTime<Utc>>,
    pub attempts_used: usize,
    pub attempts_remaining: usize,
}

impl AccessDecision {
    fn open(attempts_used: usize, attempts_remaining: usize) -> Self {
        Self {
            blocked: false,
            unlocks_at: None,
            attempts_used,
            attempts_remaining,
        }
    }

    fn blocked_until(unlocks_at: DateTime<Utc>, attempts_used: usize) -> Self {
        Self {
            blocked: true,
            unlocks_at: Some(unlocks_at),
            attempts_used,
            attempts_remaining: 0,
        }
    }

    /// Time left until the gate opens, or `None` when not blocked.
    pub fn wait_from(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.unlocks_at.map(|t| t - now)
    }
}

/// Result of an async gate check.
#[derive(Debug)]
pub enum GateOutcome {
    /// The history was fetched and a decision computed.
    Decided(AccessDecision),
    /// The history could not be fetched. `fallback` is the fail-open decision;
    /// callers are expected to log or alert on `error`.
    StorageFailed {
        error: StorageError,
        fallback: AccessDecision,
    },
}

impl GateOutcome {
    /// The decision to act on, failing open on storage errors.
    pub fn decision(&self) -> &AccessDecision {
        match self {
            GateOutcome::Decided(decision) => decision,
            GateOutcome::StorageFailed { fallback, .. } => fallback,
        }
    }

    pub fn storage_error(&self) -> Option<&StorageError> {
        match self {
            GateOutcome::Decided(_) => None,
            GateOutcome::StorageFailed { error, .. } => Some(error),
        }
    }
}

/// The rolling-window attempt gate.
#[derive(Debug, Clone, Copy, Default)]
pub struct AttemptGate {
    config: GateConfig,
}

impl AttemptGate {
    pub fn new(config: GateConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    /// Decide from a newest-first list of attempt timestamps.
    ///
    /// Only the first `max_attempts` entries are considered. The list must be
    /// in non-increasing order; it is not re-sorted.
    pub fn decide(&self, recent: &[DateTime<Utc>], now: DateTime<Utc>) -> AccessDecision {
        debug_assert!(
            recent.windows(2).all(|w| w[0] >= w[1]),
            "attempt timestamps must be ordered newest first"
        );

        let max = self.config.max_attempts;
        let considered = &recent[..recent.len().min(max)];

        if considered.len() < max {
            return AccessDecision::open(considered.len(), max - considered.len());
        }

        let oldest = considered[max - 1];
        // A window reaching past the representable range never expires.
        let unlocks_at = oldest
            .checked_add_signed(self.config.window)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        if now >= unlocks_at {
            // One slot aged out; callers re-query after each attempt.
            AccessDecision::open(max, 1)
        } else {
            AccessDecision::blocked_until(unlocks_at, max)
        }
    }

    /// Fetch the user's recent attempts and decide, failing open on storage errors.
    pub async fn check(
        &self,
        store: &dyn AttemptStore,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> GateOutcome {
        match store
            .fetch_recent_attempts(user_id, self.config.max_attempts)
            .await
        {
            Ok(recent) => GateOutcome::Decided(self.decide(&recent, now)),
            Err(error) => GateOutcome::StorageFailed {
                error,
                fallback: AccessDecision::open(0, self.config.max_attempts),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AttemptRecord;
    use async_trait::async_trait;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap()
    }

    /// Newest-first timestamps `now - h` for each offset in hours.
    fn hours_ago(offsets: &[i64]) -> Vec<DateTime<Utc>> {
        let mut ts: Vec<_> = offsets.iter().map(|h| now() - Duration::hours(*h)).collect();
        ts.sort_by(|a, b| b.cmp(a));
        ts
    }

    #[test]
    fn oldest_aged_out_frees_one_slot() {
        let gate = AttemptGate::default();
        let recent = hours_ago(&[25, 20, 15, 10, 5]);
        let d = gate.decide(&recent, now());
        assert!(!d.blocked);
        assert_eq!(d.unlocks_at, None);
        assert_eq!(d.attempts_used, 5);
        assert_eq!(d.attempts_remaining, 1);
    }

    #[test]
    fn full_window_blocks_until_oldest_expires() {
        let gate = AttemptGate::default();
        let recent = hours_ago(&[23, 20, 15, 10, 5]);
        let d = gate.decide(&recent, now());
        assert!(d.blocked);
        assert_eq!(d.unlocks_at, Some(now() - Duration::hours(23) + Duration::hours(24)));
        assert_eq!(d.attempts_used, 5);
        assert_eq!(d.attempts_remaining, 0);
        assert_eq!(d.wait_from(now()), Some(Duration::hours(1)));
    }

    #[test]
    fn unlock_boundary_is_inclusive() {
        let gate = AttemptGate::default();
        let recent = hours_ago(&[24, 20, 15, 10, 5]);
        let d = gate.decide(&recent, now());
        assert!(!d.blocked);
        assert_eq!(d.attempts_remaining, 1);

        let just_before = now() - Duration::seconds(1);
        assert!(gate.decide(&recent, just_before).blocked);
    }

    #[test]
    fn under_threshold_is_never_blocked() {
        let gate = AttemptGate::default();
        for count in 0..5 {
            // All attempts just now: still allowed.
            let recent = vec![now(); count];
            let d = gate.decide(&recent, now());
            assert!(!d.blocked, "blocked with {count} attempts");
            assert_eq!(d.attempts_used, count);
            assert_eq!(d.attempts_remaining, 5 - count);
        }
    }

    #[test]
    fn only_first_max_attempts_are_considered() {
        let gate = AttemptGate::default();
        // Six entries; the sixth (oldest) must be ignored.
        let recent = hours_ago(&[100, 23, 20, 15, 10, 5]);
        let d = gate.decide(&recent, now());
        assert!(d.blocked);
        assert_eq!(d.unlocks_at, Some(now() + Duration::hours(1)));
    }

    #[test]
    fn decisions_are_monotone_in_time() {
        let gate = AttemptGate::default();
        let recent = hours_ago(&[23, 22, 3, 2, 1]);
        let mut was_open = false;
        for minutes in (0..=180).step_by(15) {
            let t = now() + Duration::minutes(minutes);
            let open = !gate.decide(&recent, t).blocked;
            assert!(!was_open || open, "gate closed again at +{minutes}min");
            was_open |= open;
        }
        assert!(was_open);
    }

    #[test]
    fn custom_limits() {
        let config = GateConfig::new(2, Duration::hours(1)).unwrap();
        let gate = AttemptGate::new(config);
        let recent = vec![now() - Duration::minutes(10), now() - Duration::minutes(50)];
        let d = gate.decide(&recent, now());
        assert!(d.blocked);
        assert_eq!(d.unlocks_at, Some(now() + Duration::minutes(10)));
    }

    #[test]
    fn huge_window_blocks_without_overflow() {
        let window = Duration::try_hours(10_000_000_000).unwrap();
        let gate = AttemptGate::new(GateConfig::new(1, window).unwrap());
        let d = gate.decide(&[now()], now());
        assert!(d.blocked);
        assert_eq!(d.unlocks_at, Some(DateTime::<Utc>::MAX_UTC));
        assert_eq!(d.attempts_remaining, 0);
    }

    #[test]
    fn invalid_config_is_rejected() {
        assert!(GateConfig::new(0, Duration::hours(24)).is_err());
        assert!(GateConfig::new(5, Duration::zero()).is_err());
    }

    struct FixedStore(Vec<DateTime<Utc>>);

    #[async_trait]
    impl AttemptStore for FixedStore {
        async fn fetch_recent_attempts(
            &self,
            _user_id: &str,
            limit: usize,
        ) -> Result<Vec<DateTime<Utc>>, StorageError> {
            Ok(self.0.iter().copied().take(limit).collect())
        }

        async fn record_attempt(&self, _record: &AttemptRecord) -> Result<(), StorageError> {
            Ok(())
        }
    }

    struct BrokenStore;

    #[async_trait]
    impl AttemptStore for BrokenStore {
        async fn fetch_recent_attempts(
            &self,
            _user_id: &str,
            _limit: usize,
        ) -> Result<Vec<DateTime<Utc>>, StorageError> {
            Err(StorageError::Unavailable("connection refused".into()))
        }

        async fn record_attempt(&self, _record: &AttemptRecord) -> Result<(), StorageError> {
            Err(StorageError::Unavailable("connection refused".into()))
        }
    }

    #[tokio::test]
    async fn check_uses_store_history() {
        let gate = AttemptGate::default();
        let store = FixedStore(hours_ago(&[23, 20, 15, 10, 5]));
        let outcome = gate.check(&store, "u1", now()).await;
        assert!(matches!(outcome, GateOutcome::Decided(_)));
        assert!(outcome.decision().blocked);
        assert!(outcome.storage_error().is_none());
    }

    #[tokio::test]
    async fn storage_failure_fails_open_and_surfaces_error() {
        let gate = AttemptGate::default();
        let outcome = gate.check(&BrokenStore, "u1", now()).await;
        let decision = outcome.decision();
        assert!(!decision.blocked);
        assert_eq!(decision.attempts_used, 0);
        assert_eq!(decision.attempts_remaining, 5);
        assert!(outcome
            .storage_error()
            .is_some_and(|e| e.to_string().contains("connection refused")));
    }
}
