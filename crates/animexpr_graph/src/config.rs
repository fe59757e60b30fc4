// SPDX-License-Identifier: MIT OR Apache-2.0
//! Runtime configuration.

use crate::error::Result;
use animexpr_motion::{DEFAULT_DECELERATION, DEFAULT_FRAME_INTERVAL_MS};
use serde::{Deserialize, Serialize};

/// Settings shared by every graph instance of a runtime
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Record a trace for newly created instances
    pub trace_enabled: bool,
    /// Frame interval used to expand eased timing tables
    pub frame_interval_ms: f64,
    /// Deceleration for decay runs that do not set one
    pub default_deceleration: f64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            trace_enabled: false,
            frame_interval_ms: DEFAULT_FRAME_INTERVAL_MS,
            default_deceleration: DEFAULT_DECELERATION,
        }
    }
}

impl RuntimeConfig {
    /// Parse from RON; missing fields take their defaults
    pub fn from_ron(text: &str) -> Result<Self> {
        Ok(ron::from_str(text)?)
    }

    /// Serialize to pretty RON
    pub fn to_ron(&self) -> Result<String> {
        Ok(ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_ron_uses_defaults() {
        let config = RuntimeConfig::from_ron("(trace_enabled: true)").unwrap();
        assert!(config.trace_enabled);
        assert_eq!(config.default_deceleration, DEFAULT_DECELERATION);
    }

    #[test]
    fn test_ron_round_trip() {
        let config = RuntimeConfig {
            frame_interval_ms: 8.0,
            ..RuntimeConfig::default()
        };
        let text = config.to_ron().unwrap();
        assert_eq!(RuntimeConfig::from_ron(&text).unwrap(), config);
    }
}
