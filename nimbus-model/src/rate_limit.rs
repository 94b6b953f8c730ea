use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// Ceiling used when no rate is configured. High enough that the limiter
/// never engages in practice.
pub const UNBOUNDED_RATE: u32 = 999_999;

/// Fixed-window rate rule applied to outbound provider calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitRule {
    /// Name of the rule for identification in logs.
    pub name: String,
    /// Maximum number of operations allowed per window.
    pub limit: u32,
    /// Length of one window.
    pub window: Duration,
}

impl Default for RateLimitRule {
    fn default() -> Self {
        Self {
            name: "provider-api".to_string(),
            limit: UNBOUNDED_RATE,
            window: Duration::from_secs(1),
        }
    }
}

impl RateLimitRule {
    /// `limit` operations per second, or the unbounded default when `None`.
    pub fn per_second(limit: Option<u32>) -> Self {
        Self {
            limit: limit.unwrap_or(UNBOUNDED_RATE),
            ..Default::default()
        }
    }

    pub fn is_unbounded(&self) -> bool {
        self.limit >= UNBOUNDED_RATE
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        if self.limit == 0 {
            return Err(ModelError::InvalidRateLimit(format!(
                "rule '{}' allows zero operations",
                self.name
            )));
        }
        if self.window.is_zero() {
            return Err(ModelError::InvalidRateLimit(format!(
                "rule '{}' has an empty window",
                self.name
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_effectively_unbounded() {
        let rule = RateLimitRule::default();
        assert!(rule.is_unbounded());
        assert_eq!(rule.window, Duration::from_secs(1));
        assert!(rule.validate().is_ok());
    }

    #[test]
    fn zero_limit_is_invalid() {
        let rule = RateLimitRule::per_second(Some(0));
        assert!(rule.validate().is_err());
    }
}
