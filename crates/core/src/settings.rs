//! Runtime settings for the sync core.

use log::warn;
use std::time::Duration;

use crate::sync::DEFAULT_GRACE_WINDOW_MS;

/// Partition shared by both partners.
pub const DEFAULT_PARTITION: &str = "nuestra_pareja";
pub const DEFAULT_RESYNC_DELAY_MS: u64 = 1_000;
pub const DEFAULT_STARTUP_DELAY_MS: u64 = 1_000;

const PARTITION_ENV: &str = "DUOFOLIO_PARTITION";
const GRACE_WINDOW_ENV: &str = "DUOFOLIO_GRACE_WINDOW_MS";
const RESYNC_DELAY_ENV: &str = "DUOFOLIO_RESYNC_DELAY_MS";
const STARTUP_DELAY_ENV: &str = "DUOFOLIO_STARTUP_DELAY_MS";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSettings {
    pub partition: String,
    /// Age below which an unknown `added` document is taken as our own echo.
    pub grace_window: Duration,
    /// Delay between detecting a remote-origin change and the resync signal.
    pub resync_delay: Duration,
    /// Delay before the first remote connection attempt.
    pub startup_delay: Duration,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            partition: DEFAULT_PARTITION.to_string(),
            grace_window: Duration::from_millis(DEFAULT_GRACE_WINDOW_MS as u64),
            resync_delay: Duration::from_millis(DEFAULT_RESYNC_DELAY_MS),
            startup_delay: Duration::from_millis(DEFAULT_STARTUP_DELAY_MS),
        }
    }
}

impl SyncSettings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from an arbitrary key lookup; unset or invalid values
    /// keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let partition = lookup(PARTITION_ENV)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or(defaults.partition);

        Self {
            partition,
            grace_window: millis_or(&lookup, GRACE_WINDOW_ENV, defaults.grace_window),
            resync_delay: millis_or(&lookup, RESYNC_DELAY_ENV, defaults.resync_delay),
            startup_delay: millis_or(&lookup, STARTUP_DELAY_ENV, defaults.startup_delay),
        }
    }

    pub fn grace_window_delta(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.grace_window)
            .unwrap_or_else(|_| chrono::Duration::milliseconds(DEFAULT_GRACE_WINDOW_MS))
    }

    /// Grace window widened by the feed's delivery lag, so an own-write echo
    /// that waited a full poll interval still counts as fresh.
    pub fn grace_window_for(&self, delivery_lag: Duration) -> chrono::Duration {
        let lag = chrono::Duration::from_std(delivery_lag)
            .unwrap_or_else(|_| chrono::Duration::zero());
        self.grace_window_delta() + lag
    }
}

/// Parse a millisecond duration setting, warning on garbage.
pub fn millis_or(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: Duration,
) -> Duration {
    match lookup(key) {
        None => default,
        Some(raw) => match raw.trim().parse::<u64>() {
            Ok(ms) => Duration::from_millis(ms),
            Err(_) => {
                warn!(
                    "[Settings] Invalid value '{}' for {}, using {}ms",
                    raw,
                    key,
                    default.as_millis()
                );
                default
            }
        },
    }
}
