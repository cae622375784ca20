use crate::errors::ConfigError;
use crate::utils::logging::RejectReason;

use super::codec::EnvelopeHeader;

/// Longest accepted rolling or absolute duration (100 years)
pub const MAX_DURATION: i64 = 100 * 365 * 24 * 60 * 60;

/// Session lifetime rules
///
/// `rolling_duration` bounds idle time since the last save (`uat`),
/// `absolute_duration` bounds total lifetime since creation (`iat`).
/// Durations are in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpiryPolicy {
    pub rolling: bool,
    pub rolling_duration: i64,
    pub absolute_duration: Option<i64>,
}

impl Default for ExpiryPolicy {
    fn default() -> Self {
        Self {
            rolling: true,
            rolling_duration: 24 * 60 * 60,
            absolute_duration: Some(7 * 24 * 60 * 60),
        }
    }
}

impl ExpiryPolicy {
    /// Check that the policy can produce an expiry
    ///
    /// # Errors
    ///
    /// Returns an error if rolling is enabled without a positive rolling
    /// duration, if rolling is disabled without an absolute duration, or if
    /// the absolute duration is not positive. Durations above
    /// [`MAX_DURATION`] are rejected.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rolling && self.rolling_duration <= 0 {
            return Err(ConfigError::InvalidPolicy(
                "rolling_duration must be positive when rolling is enabled".to_string(),
            ));
        }
        if self.rolling_duration > MAX_DURATION
            || self.absolute_duration.is_some_and(|d| d > MAX_DURATION)
        {
            return Err(ConfigError::InvalidPolicy(format!(
                "durations must not exceed {MAX_DURATION} seconds"
            )));
        }
        match self.absolute_duration {
            None if !self.rolling => Err(ConfigError::InvalidPolicy(
                "absolute_duration is required when rolling is disabled".to_string(),
            )),
            Some(duration) if duration <= 0 => Err(ConfigError::InvalidPolicy(
                "absolute_duration must be positive".to_string(),
            )),
            _ => Ok(()),
        }
    }

    /// Rolling duration in force, if rolling is enabled
    #[must_use]
    pub fn effective_rolling_duration(&self) -> Option<i64> {
        self.rolling.then_some(self.rolling_duration)
    }

    /// Expiry for a session issued at `iat` and last saved at `uat`
    #[must_use]
    pub fn calculate_exp(&self, iat: i64, uat: i64) -> i64 {
        match self.absolute_duration {
            None => uat.saturating_add(self.rolling_duration),
            Some(absolute) if !self.rolling => iat.saturating_add(absolute),
            Some(absolute) => uat
                .saturating_add(self.rolling_duration)
                .min(iat.saturating_add(absolute)),
        }
    }

    /// Check a decrypted envelope against its recorded expiry and the
    /// current policy, in that order
    ///
    /// # Errors
    ///
    /// Returns the first rule the envelope violates.
    pub fn check(&self, header: &EnvelopeHeader, now: i64) -> Result<(), RejectReason> {
        if header.exp <= now {
            return Err(RejectReason::ExpiredAtIssue);
        }
        if let Some(rolling) = self.effective_rolling_duration() {
            if header.uat.saturating_add(rolling) <= now {
                return Err(RejectReason::ExpiredByRolling);
            }
        }
        if let Some(absolute) = self.absolute_duration {
            if header.iat.saturating_add(absolute) <= now {
                return Err(RejectReason::ExpiredByAbsolute);
            }
        }
        Ok(())
    }
}
