//! Engine configuration.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Default stop-by-count threshold.
pub const DEFAULT_STOP_AT: usize = 1;

/// Default number of leading candidates summed for the mass check.
pub const DEFAULT_TOP_K: usize = 1;

/// Default probability-mass threshold.
pub const DEFAULT_TAU: f64 = 0.85;

/// Per-session engine configuration.
///
/// Deserializes with defaults for every missing field, so hosts can load it
/// from a partial JSON document.
///
/// # Examples
///
/// ```
/// use waterline::EngineConfig;
///
/// let config = EngineConfig::new("BATHROOM").with_top_k(2).with_tau(0.9);
/// assert!(config.validate().is_ok());
/// assert_eq!(config.stop_at, 1);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Room type the session is scoped to. Empty admits every rule.
    pub room: String,

    /// Stop once this many candidates or fewer survive.
    pub stop_at: usize,

    /// How many leading candidates the mass check sums. `0` disables it.
    pub top_k: usize,

    /// Mass threshold in [0.0, 1.0]. `0.0` disables the mass check.
    pub tau: f64,

    /// Carrier discriminator; enables policy must-asks when set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub carrier_group: Option<u32>,

    /// Province discriminator; refines the carrier's must-ask lookup.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub province: Option<u32>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            room: String::new(),
            stop_at: DEFAULT_STOP_AT,
            top_k: DEFAULT_TOP_K,
            tau: DEFAULT_TAU,
            carrier_group: None,
            province: None,
        }
    }
}

impl EngineConfig {
    /// Creates a configuration for a room with default thresholds.
    #[must_use]
    pub fn new(room: impl Into<String>) -> Self {
        Self {
            room: room.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_stop_at(mut self, stop_at: usize) -> Self {
        self.stop_at = stop_at;
        self
    }

    #[must_use]
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    #[must_use]
    pub fn with_tau(mut self, tau: f64) -> Self {
        self.tau = tau;
        self
    }

    #[must_use]
    pub fn with_carrier_group(mut self, carrier_group: u32) -> Self {
        self.carrier_group = Some(carrier_group);
        self
    }

    #[must_use]
    pub fn with_province(mut self, province: u32) -> Self {
        self.province = Some(province);
        self
    }

    /// Returns true if the mass stop condition is enabled.
    #[must_use]
    pub fn mass_check_enabled(&self) -> bool {
        self.top_k > 0 && self.tau > 0.0
    }

    /// Validates thresholds.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::OutOfRange` if `tau` is NaN or outside [0.0, 1.0].
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.tau.is_nan() || !(0.0..=1.0).contains(&self.tau) {
            return Err(ValidationError::OutOfRange {
                field: "tau",
                value: self.tau,
                min: 0.0,
                max: 1.0,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::new("KITCHEN");
        assert_eq!(config.room, "KITCHEN");
        assert_eq!(config.stop_at, DEFAULT_STOP_AT);
        assert_eq!(config.top_k, DEFAULT_TOP_K);
        assert!((config.tau - DEFAULT_TAU).abs() < f64::EPSILON);
        assert!(config.carrier_group.is_none());
        assert!(config.mass_check_enabled());
    }

    #[test]
    fn test_validate_tau_range() {
        assert!(EngineConfig::new("X").with_tau(0.0).validate().is_ok());
        assert!(EngineConfig::new("X").with_tau(1.0).validate().is_ok());
        assert!(EngineConfig::new("X").with_tau(1.2).validate().is_err());
        assert!(EngineConfig::new("X").with_tau(-0.1).validate().is_err());
        assert!(EngineConfig::new("X").with_tau(f64::NAN).validate().is_err());
    }

    #[test]
    fn test_mass_check_disabled() {
        assert!(!EngineConfig::new("X").with_top_k(0).mass_check_enabled());
        assert!(!EngineConfig::new("X").with_tau(0.0).mass_check_enabled());
    }

    #[test]
    fn test_partial_document_uses_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"room": "BASEMENT", "carrier_group": 3}"#).unwrap();
        assert_eq!(config.room, "BASEMENT");
        assert_eq!(config.carrier_group, Some(3));
        assert_eq!(config.stop_at, DEFAULT_STOP_AT);
        assert!((config.tau - DEFAULT_TAU).abs() < f64::EPSILON);
    }
}
