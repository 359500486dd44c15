//! Choker configuration.
//!
//! A [`ChokerConfig`] is validated once when a [`Choker`](crate::Choker) is
//! built; the scheduler itself never re-checks it.
//!
//! # Examples
//!
//! ```
//! use rchoke::{ChokerConfig, Strategy};
//! use std::time::Duration;
//!
//! let config = ChokerConfig::default()
//!     .with_upload_slots(8)
//!     .with_max_upload_rate(500_000)
//!     .with_min_time_between_reviews(Duration::from_secs(20))
//!     .with_strategy(Strategy::Ratio);
//!
//! assert!(config.validate().is_ok());
//! ```

use std::time::Duration;

use thiserror::Error;

use crate::constants::{
    CHOKING_INTERVAL, DEFAULT_UPLOAD_SLOTS, MIN_TIME_BETWEEN_REVIEWS,
    PERCENT_OF_MAX_RATE_TO_SKIP_REVIEW,
};

/// Errors raised while validating a [`ChokerConfig`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The review skip threshold is a percentage of the maximum rate.
    #[error("percent of max rate to skip review must be at most 100, got {0}")]
    InvalidSkipPercent(u8),

    /// The periodic driver cannot run with a zero period.
    #[error("tick interval must be non-zero")]
    ZeroTickInterval,
}

/// How a full review decides who gets upload slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Strategy {
    /// Bucketed tit-for-tat with hysteresis and an optimistic slot.
    #[default]
    TitForTat,
    /// Greedy ranking by received/sent ratio under an upload budget.
    /// Falls back to [`Strategy::TitForTat`] while seeding.
    Ratio,
}

/// Per-torrent choker settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ChokerConfig {
    /// Number of peers we upload to at once.
    pub upload_slots: usize,
    /// Maximum upload rate in bytes/sec. 0 means unlimited.
    pub max_upload_rate: u64,
    /// Maximum download rate in bytes/sec. 0 means unlimited.
    pub max_download_rate: u64,
    /// Minimum time between full reviews. Zero disables time-triggered reviews.
    pub min_time_between_reviews: Duration,
    /// Skip reviews while running at or above this percentage of the max rate.
    pub percent_of_max_rate_to_skip_review: u8,
    /// Review strategy.
    pub strategy: Strategy,
    /// Period of the background tick driver.
    pub tick_interval: Duration,
    /// Seed for the optimistic unchoke RNG. `None` seeds from the OS.
    pub rng_seed: Option<u64>,
}

impl Default for ChokerConfig {
    fn default() -> Self {
        Self {
            upload_slots: DEFAULT_UPLOAD_SLOTS,
            max_upload_rate: 0,
            max_download_rate: 0,
            min_time_between_reviews: MIN_TIME_BETWEEN_REVIEWS,
            percent_of_max_rate_to_skip_review: PERCENT_OF_MAX_RATE_TO_SKIP_REVIEW,
            strategy: Strategy::TitForTat,
            tick_interval: CHOKING_INTERVAL,
            rng_seed: None,
        }
    }
}

impl ChokerConfig {
    pub fn with_upload_slots(mut self, slots: usize) -> Self {
        self.upload_slots = slots;
        self
    }

    pub fn with_max_upload_rate(mut self, bytes_per_sec: u64) -> Self {
        self.max_upload_rate = bytes_per_sec;
        self
    }

    pub fn with_max_download_rate(mut self, bytes_per_sec: u64) -> Self {
        self.max_download_rate = bytes_per_sec;
        self
    }

    pub fn with_min_time_between_reviews(mut self, interval: Duration) -> Self {
        self.min_time_between_reviews = interval;
        self
    }

    pub fn with_skip_percent(mut self, percent: u8) -> Self {
        self.percent_of_max_rate_to_skip_review = percent;
        self
    }

    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.rng_seed = Some(seed);
        self
    }

    /// Returns true if time-triggered reviews are enabled.
    pub fn reviews_enabled(&self) -> bool {
        !self.min_time_between_reviews.is_zero()
    }

    /// Checks the settings that the types alone cannot rule out.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.percent_of_max_rate_to_skip_review > 100 {
            return Err(ConfigError::InvalidSkipPercent(
                self.percent_of_max_rate_to_skip_review,
            ));
        }
        if self.tick_interval.is_zero() {
            return Err(ConfigError::ZeroTickInterval);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = ChokerConfig::default();
        assert_eq!(config.upload_slots, DEFAULT_UPLOAD_SLOTS);
        assert_eq!(config.min_time_between_reviews, Duration::from_secs(30));
        assert_eq!(config.percent_of_max_rate_to_skip_review, 90);
        assert_eq!(config.strategy, Strategy::TitForTat);
        assert!(config.reviews_enabled());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_skip_percent_above_100() {
        let config = ChokerConfig::default().with_skip_percent(101);
        assert_eq!(config.validate(), Err(ConfigError::InvalidSkipPercent(101)));
    }

    #[test]
    fn test_rejects_zero_tick_interval() {
        let config = ChokerConfig::default().with_tick_interval(Duration::ZERO);
        assert_eq!(config.validate(), Err(ConfigError::ZeroTickInterval));
    }

    #[test]
    fn test_zero_review_interval_disables_reviews() {
        let config = ChokerConfig::default().with_min_time_between_reviews(Duration::ZERO);
        assert!(!config.reviews_enabled());
        assert!(config.validate().is_ok());
    }
}
