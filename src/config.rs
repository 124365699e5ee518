use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::ConfigError;

pub const DEFAULT_BASE_ADDRESS: u16 = 0x0600;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClockProfile {
    Unthrottled,
    Micro,       // 100 kHz
    Small,       // 500 kHz
    Standard,    // 1 MHz
    Performance, // 5 MHz
    Turbo,       // 10 MHz
    Custom(u64),
}

impl ClockProfile {
    /// Target cycles per second, or `None` to run flat out.
    pub fn hz(&self) -> Option<u64> {
        match self {
            ClockProfile::Unthrottled => None,
            ClockProfile::Micro => Some(100_000),
            ClockProfile::Small => Some(500_000),
            ClockProfile::Standard => Some(1_000_000),
            ClockProfile::Performance => Some(5_000_000),
            ClockProfile::Turbo => Some(10_000_000),
            ClockProfile::Custom(hz) => Some(*hz),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            ClockProfile::Custom(0) => Err(ConfigError::InvalidClock("0 Hz".to_string())),
            _ => Ok(()),
        }
    }
}

impl Default for ClockProfile {
    fn default() -> Self {
        ClockProfile::Unthrottled
    }
}

impl fmt::Display for ClockProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClockProfile::Unthrottled => f.write_str("unthrottled"),
            ClockProfile::Micro => f.write_str("micro"),
            ClockProfile::Small => f.write_str("small"),
            ClockProfile::Standard => f.write_str("standard"),
            ClockProfile::Performance => f.write_str("performance"),
            ClockProfile::Turbo => f.write_str("turbo"),
            ClockProfile::Custom(hz) => write!(f, "{}", hz),
        }
    }
}

/// Accepts a profile name or a frequency in Hz.
impl FromStr for ClockProfile {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let profile = match s.trim().to_ascii_lowercase().as_str() {
            "unthrottled" | "off" | "none" => ClockProfile::Unthrottled,
            "micro" => ClockProfile::Micro,
            "small" => ClockProfile::Small,
            "standard" => ClockProfile::Standard,
            "performance" => ClockProfile::Performance,
            "turbo" => ClockProfile::Turbo,
            other => other
                .parse::<u64>()
                .map(ClockProfile::Custom)
                .map_err(|_| ConfigError::InvalidClock(s.to_string()))?,
        };
        profile.validate()?;
        Ok(profile)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssemblerConfig {
    pub executable: PathBuf,
    pub args: Vec<String>,
}

impl Default for AssemblerConfig {
    fn default() -> Self {
        AssemblerConfig {
            executable: PathBuf::from("64tass"),
            args: vec!["--mw65c02".to_string(), "--nostart".to_string()],
        }
    }
}

/// Settings for one `run`: file values first, CLI flags override.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub base_address: u16,
    pub clock: ClockProfile,
    pub max_steps: Option<u64>,
    pub single_step: bool,
    pub log_level: String,
    pub record_metrics: bool,
    pub assembler: AssemblerConfig,
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            base_address: DEFAULT_BASE_ADDRESS,
            clock: ClockProfile::default(),
            max_steps: None,
            single_step: false,
            log_level: "info".to_string(),
            record_metrics: false,
            assembler: AssemblerConfig::default(),
        }
    }
}

impl RunConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: RunConfig = serde_json::from_str(text)?;
        config.clock.validate()?;
        Ok(config)
    }
}

/// Parses `0x0600`, `$0600` or `1536`.
pub fn parse_address(text: &str) -> Result<u16, String> {
    let text = text.trim();
    let (digits, radix) = if let Some(hex) = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .or_else(|| text.strip_prefix('$'))
    {
        (hex, 16)
    } else {
        (text, 10)
    };
    u16::from_str_radix(digits, radix).map_err(|e| format!("invalid address `{}`: {}", text, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_rates() {
        assert_eq!(ClockProfile::Unthrottled.hz(), None);
        assert_eq!(ClockProfile::Micro.hz(), Some(100_000));
        assert_eq!(ClockProfile::Standard.hz(), Some(1_000_000));
        assert_eq!(ClockProfile::Turbo.hz(), Some(10_000_000));
        assert_eq!(ClockProfile::Custom(2_000_000).hz(), Some(2_000_000));
    }

    #[test]
    fn test_profile_from_str() {
        assert_eq!("standard".parse::<ClockProfile>().unwrap(), ClockProfile::Standard);
        assert_eq!("Turbo".parse::<ClockProfile>().unwrap(), ClockProfile::Turbo);
        assert_eq!("off".parse::<ClockProfile>().unwrap(), ClockProfile::Unthrottled);
        assert_eq!("1790000".parse::<ClockProfile>().unwrap(), ClockProfile::Custom(1_790_000));
        assert!(matches!("0".parse::<ClockProfile>(), Err(ConfigError::InvalidClock(_))));
        assert!(matches!("warp".parse::<ClockProfile>(), Err(ConfigError::InvalidClock(_))));
    }

    #[test]
    fn test_defaults_fill_missing_fields() {
        let config = RunConfig::from_json(r#"{"clock": "Small", "max_steps": 1000}"#).unwrap();
        assert_eq!(config.clock, ClockProfile::Small);
        assert_eq!(config.max_steps, Some(1000));
        assert_eq!(config.base_address, 0x0600);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.assembler.executable, PathBuf::from("64tass"));
    }

    #[test]
    fn test_custom_zero_clock_rejected() {
        let err = RunConfig::from_json(r#"{"clock": {"Custom": 0}}"#).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidClock(_)));
    }

    #[test]
    fn test_parse_address() {
        assert_eq!(parse_address("0x0600"), Ok(0x0600));
        assert_eq!(parse_address("$C000"), Ok(0xC000));
        assert_eq!(parse_address("1536"), Ok(1536));
        assert!(parse_address("0x10000").is_err());
    }
}
