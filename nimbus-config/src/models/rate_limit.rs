use std::time::Duration;

use anyhow::{Context, anyhow};
use nimbus_model::{RateLimitRule, rate_limit::UNBOUNDED_RATE};
use serde::{Deserialize, Serialize};

fn default_window() -> String {
    "1s".to_string()
}

/// Outbound call cap as written in settings files. `window` accepts
/// human-readable durations such as `"1s"` or `"500ms"`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitSettings {
    /// Operations per window. Unset means effectively unbounded.
    pub max_rate: Option<u32>,
    #[serde(default = "default_window")]
    pub window: String,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            max_rate: None,
            window: default_window(),
        }
    }
}

impl RateLimitSettings {
    pub fn window(&self) -> anyhow::Result<Duration> {
        humantime::parse_duration(self.window.trim()).with_context(|| {
            format!("invalid rate limit window '{}'", self.window)
        })
    }

    pub fn to_rule(&self) -> anyhow::Result<RateLimitRule> {
        let rule = RateLimitRule {
            limit: self.max_rate.unwrap_or(UNBOUNDED_RATE),
            window: self.window()?,
            ..RateLimitRule::default()
        };
        rule.validate().map_err(|err| anyhow!(err))?;
        Ok(rule)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_produce_the_unbounded_rule() {
        let rule = RateLimitSettings::default().to_rule().unwrap();
        assert!(rule.is_unbounded());
        assert_eq!(rule.window, Duration::from_secs(1));
    }

    #[test]
    fn human_readable_windows_are_accepted() {
        let settings = RateLimitSettings {
            max_rate: Some(20),
            window: "500ms".into(),
        };
        let rule = settings.to_rule().unwrap();
        assert_eq!(rule.limit, 20);
        assert_eq!(rule.window, Duration::from_millis(500));
    }

    #[test]
    fn zero_rate_and_bad_windows_are_rejected() {
        let zero = RateLimitSettings {
            max_rate: Some(0),
            ..Default::default()
        };
        assert!(zero.to_rule().is_err());

        let garbled = RateLimitSettings {
            max_rate: Some(5),
            window: "every now and then".into(),
        };
        assert!(garbled.to_rule().is_err());
    }
}
