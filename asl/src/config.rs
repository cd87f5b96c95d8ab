//! Run configuration
//!
//! Settings for one program execution. The driver builds one per run; tools
//! embedding the interpreter may also load it from TOML.

use crate::instrumentation::{Instrumentation, NoTrace, TraceSet};
use serde::{Deserialize, Serialize};

/// How strictly the static environment checks a program before it runs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strictness {
    /// No checks
    Silence,
    /// Report findings as warnings and run anyway
    Warn,
    /// Findings are fatal
    #[default]
    TypeCheck,
}

/// Run configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    pub strictness: Strictness,
    /// Loop iterations before the unrolling diagnostic fires; 0 means unbounded
    pub unroll: u32,
    /// Record identifier reads and writes
    pub instrument: bool,
}

impl RunConfig {
    pub fn new(strictness: Strictness, instrument: bool) -> Self {
        RunConfig {
            strictness,
            unroll: 0,
            instrument,
        }
    }

    /// Parse a configuration from TOML; missing keys take their defaults
    pub fn from_toml_str(source: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(source)
    }

    /// Fresh, empty instrumentation buffer matching `instrument`
    pub fn instrumentation_buffer(&self) -> Box<dyn Instrumentation> {
        let mut buffer: Box<dyn Instrumentation> = if self.instrument {
            Box::new(TraceSet::new())
        } else {
            Box::new(NoTrace)
        };
        buffer.reset();
        buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RunConfig::default();
        assert_eq!(config.strictness, Strictness::TypeCheck);
        assert_eq!(config.unroll, 0);
        assert!(!config.instrument);
    }

    #[test]
    fn test_from_toml() {
        let config = RunConfig::from_toml_str("strictness = \"warn\"\ninstrument = true\n").unwrap();
        assert_eq!(config.strictness, Strictness::Warn);
        assert!(config.instrument);
        assert_eq!(config.unroll, 0);
    }

    #[test]
    fn test_from_toml_rejects_unknown_keys() {
        assert!(RunConfig::from_toml_str("verbose = true").is_err());
    }

    #[test]
    fn test_buffer_choice() {
        let on = RunConfig::new(Strictness::Silence, true);
        let off = RunConfig::new(Strictness::Silence, false);
        assert!(on.instrumentation_buffer().contents().is_empty());
        assert!(off.instrumentation_buffer().contents().is_empty());
    }
}
