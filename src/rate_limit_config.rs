use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_REQUEST_LIMIT: usize = 100;
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

/// Admission ceiling for inbound requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitSettings {
    /// Maximum number of requests admitted within one window
    pub limit: usize,
    /// Length of the sliding window
    #[serde(with = "humantime_serde")]
    pub window: Duration,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            limit: DEFAULT_REQUEST_LIMIT,
            window: DEFAULT_WINDOW,
        }
    }
}

impl RateLimitSettings {
    pub fn new(limit: usize, window: Duration) -> Self {
        Self { limit, window }
    }

    /// Validate settings
    pub fn validate(&self) -> Result<(), String> {
        if self.limit == 0 {
            return Err("Request limit must be greater than 0".to_string());
        }
        if self.window.is_zero() {
            return Err("Window size must be greater than 0".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = RateLimitSettings::default();
        assert_eq!(settings.limit, 100);
        assert_eq!(settings.window, Duration::from_secs(60));
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_zero_values_rejected() {
        assert!(RateLimitSettings::new(0, Duration::from_secs(60)).validate().is_err());
        assert!(RateLimitSettings::new(10, Duration::ZERO).validate().is_err());
    }

    #[test]
    fn test_humantime_window() {
        let settings: RateLimitSettings =
            serde_json::from_str(r#"{"limit": 5, "window": "2m"}"#).unwrap();
        assert_eq!(settings.limit, 5);
        assert_eq!(settings.window, Duration::from_secs(120));
    }
}
