//! Prefetch cache sizing and lifetime configuration.

use pd_core::BrowserError;
use pd_core::BrowserResult;
use std::time::Duration;

/// Environment variable standing in for the "max loaders" feature parameter.
pub const MAX_LOADERS_ENV: &str = "PIXELDUST_PREFETCH_MAX_LOADERS";

pub const DEFAULT_MAX_SIZE: usize = 10;
pub const MAX_PREFETCH_CACHE_SIZE: usize = 100;

/// Lifetime given to every entry at insertion.
pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(5 * 60);

/// Entries due within this window of a timer fire are expired together.
pub const DEFAULT_EXPIRY_SLACK: Duration = Duration::from_secs(1);

/// Upper bound on `max_age`; keeps `Instant + max_age` far from overflow.
pub const MAX_PREFETCH_MAX_AGE: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefetchCacheConfig {
    pub max_size: usize,
    pub max_age: Duration,
    pub expiry_slack: Duration,
}

impl Default for PrefetchCacheConfig {
    fn default() -> Self {
        Self {
            max_size: DEFAULT_MAX_SIZE,
            max_age: DEFAULT_MAX_AGE,
            expiry_slack: DEFAULT_EXPIRY_SLACK,
        }
    }
}

impl PrefetchCacheConfig {
    /// Reads the capacity override from the process environment.
    pub fn from_env() -> BrowserResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> BrowserResult<Self> {
        let config = Self::default();
        let Some(raw) = lookup(MAX_LOADERS_ENV) else {
            return Ok(config);
        };

        let requested = raw.trim().parse::<i64>().map_err(|error| {
            BrowserError::new(
                "net.prefetch.config_invalid",
                format!("`{MAX_LOADERS_ENV}` must be an integer, got `{raw}`: {error}"),
            )
        })?;

        Ok(config.with_max_size(requested))
    }

    /// Clamps `requested` into `1..=MAX_PREFETCH_CACHE_SIZE`.
    pub fn with_max_size(mut self, requested: i64) -> Self {
        let clamped = requested.clamp(1, MAX_PREFETCH_CACHE_SIZE as i64);
        if clamped != requested {
            log::warn!("prefetch cache size {requested} out of range, using {clamped}");
        }
        self.max_size = usize::try_from(clamped).unwrap_or(1);
        self
    }

    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }

    pub fn with_expiry_slack(mut self, expiry_slack: Duration) -> Self {
        self.expiry_slack = expiry_slack;
        self
    }

    pub fn validate(&self) -> BrowserResult<()> {
        if self.max_size == 0 {
            return Err(BrowserError::new(
                "net.prefetch.max_size_invalid",
                "prefetch cache max_size must be at least 1",
            ));
        }

        if self.max_age.is_zero() {
            return Err(BrowserError::new(
                "net.prefetch.max_age_invalid",
                "prefetch cache max_age must be greater than zero",
            ));
        }

        if self.max_age > MAX_PREFETCH_MAX_AGE {
            return Err(BrowserError::new(
                "net.prefetch.max_age_invalid",
                format!(
                    "prefetch cache max_age {:?} exceeds {:?}",
                    self.max_age, MAX_PREFETCH_MAX_AGE
                ),
            ));
        }

        if self.expiry_slack > self.max_age {
            return Err(BrowserError::new(
                "net.prefetch.expiry_slack_invalid",
                format!(
                    "prefetch cache expiry_slack {:?} exceeds max_age {:?}",
                    self.expiry_slack, self.max_age
                ),
            ));
        }

        Ok(())
    }
}
