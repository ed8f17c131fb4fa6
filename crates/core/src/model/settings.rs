use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SettingsError {
    #[error("recommendation limit must be > 0")]
    InvalidRecommendationLimit,

    #[error("run delay must be at most {max} ms, got {provided}")]
    InvalidRunDelay { provided: u64, max: u64 },

    #[error("persist retry limit must be > 0")]
    InvalidPersistRetryLimit,
}

/// Tunables of the lesson engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSettings {
    recommendation_limit: usize,
    run_delay_ms: u64,
    persist_retry_limit: u32,
}

impl EngineSettings {
    pub const MAX_RUN_DELAY_MS: u64 = 10_000;

    /// # Errors
    ///
    /// Returns `SettingsError` if a limit is zero or the delay is too long.
    pub fn new(
        recommendation_limit: usize,
        run_delay_ms: u64,
        persist_retry_limit: u32,
    ) -> Result<Self, SettingsError> {
        if recommendation_limit == 0 {
            return Err(SettingsError::InvalidRecommendationLimit);
        }
        if run_delay_ms > Self::MAX_RUN_DELAY_MS {
            return Err(SettingsError::InvalidRunDelay {
                provided: run_delay_ms,
                max: Self::MAX_RUN_DELAY_MS,
            });
        }
        if persist_retry_limit == 0 {
            return Err(SettingsError::InvalidPersistRetryLimit);
        }
        Ok(Self {
            recommendation_limit,
            run_delay_ms,
            persist_retry_limit,
        })
    }

    /// Maximum number of recommended lessons.
    #[must_use]
    pub fn recommendation_limit(&self) -> usize {
        self.recommendation_limit
    }

    #[must_use]
    pub fn run_delay_ms(&self) -> u64 {
        self.run_delay_ms
    }

    /// Artificial pause before a run or check reports its result.
    #[must_use]
    pub fn run_delay(&self) -> Duration {
        Duration::from_millis(self.run_delay_ms)
    }

    /// Write attempts per progress key before a failed write is dropped.
    #[must_use]
    pub fn persist_retry_limit(&self) -> u32 {
        self.persist_retry_limit
    }

    /// Same settings with a different run delay.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError::InvalidRunDelay` if the delay is too long.
    pub fn with_run_delay_ms(self, run_delay_ms: u64) -> Result<Self, SettingsError> {
        Self::new(self.recommendation_limit, run_delay_ms, self.persist_retry_limit)
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            recommendation_limit: 3,
            run_delay_ms: 1_000,
            persist_retry_limit: 3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let settings = EngineSettings::default();
        assert_eq!(settings.recommendation_limit(), 3);
        assert_eq!(settings.run_delay(), Duration::from_secs(1));
        assert_eq!(settings.persist_retry_limit(), 3);
    }

    #[test]
    fn rejects_invalid_values() {
        assert_eq!(
            EngineSettings::new(0, 10, 1).unwrap_err(),
            SettingsError::InvalidRecommendationLimit
        );
        assert_eq!(
            EngineSettings::new(3, 20_000, 1).unwrap_err(),
            SettingsError::InvalidRunDelay {
                provided: 20_000,
                max: EngineSettings::MAX_RUN_DELAY_MS
            }
        );
        assert_eq!(
            EngineSettings::new(3, 10, 0).unwrap_err(),
            SettingsError::InvalidPersistRetryLimit
        );
    }

    #[test]
    fn zero_delay_is_allowed() {
        let settings = EngineSettings::default().with_run_delay_ms(0).unwrap();
        assert_eq!(settings.run_delay(), Duration::ZERO);
    }
}
