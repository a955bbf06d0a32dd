//! Named option selectors.
//!
//! Every selector parses from the host's string name and rejects names it
//! does not know instead of falling back to a default.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Engine log verbosity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    #[default]
    Error,
}

impl LogLevel {
    pub fn name(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

impl FromStr for LogLevel {
    type Err = ConfigError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name {
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warning" => Ok(Self::Warning),
            "error" => Ok(Self::Error),
            _ => Err(unknown("log level", name)),
        }
    }
}

/// How content is scaled into a slot or preview.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AspectMode {
    Fit,
    Fill,
    #[default]
    None,
}

impl AspectMode {
    pub fn name(self) -> &'static str {
        match self {
            Self::Fit => "fit",
            Self::Fill => "fill",
            Self::None => "none",
        }
    }
}

impl FromStr for AspectMode {
    type Err = ConfigError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name {
            "fit" => Ok(Self::Fit),
            "fill" => Ok(Self::Fill),
            "none" => Ok(Self::None),
            _ => Err(unknown("aspect mode", name)),
        }
    }
}

/// Audio encoder quality tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AudioQuality {
    Minimum,
    Low,
    #[default]
    Medium,
    High,
    Maximum,
}

impl AudioQuality {
    pub fn name(self) -> &'static str {
        match self {
            Self::Minimum => "minimum",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Maximum => "maximum",
        }
    }
}

impl FromStr for AudioQuality {
    type Err = ConfigError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name {
            "minimum" => Ok(Self::Minimum),
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "maximum" => Ok(Self::Maximum),
            _ => Err(unknown("audio quality", name)),
        }
    }
}

/// How aggressively automatic bitrate climbs after congestion clears.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AutoBitrateProfile {
    #[default]
    Conservative,
    FastIncrease,
}

impl AutoBitrateProfile {
    pub fn name(self) -> &'static str {
        match self {
            Self::Conservative => "conservative",
            Self::FastIncrease => "fastIncrease",
        }
    }
}

impl FromStr for AutoBitrateProfile {
    type Err = ConfigError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name {
            "conservative" => Ok(Self::Conservative),
            "fastIncrease" => Ok(Self::FastIncrease),
            _ => Err(unknown("automatic bitrate profile", name)),
        }
    }
}

/// Process-wide audio routing behaviour.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AudioSessionStrategy {
    RecordOnly,
    #[default]
    PlayAndRecord,
    PlayAndRecordDefaultToSpeaker,
    NoAction,
}

impl AudioSessionStrategy {
    pub fn name(self) -> &'static str {
        match self {
            Self::RecordOnly => "recordOnly",
            Self::PlayAndRecord => "playAndRecord",
            Self::PlayAndRecordDefaultToSpeaker => "playAndRecordDefaultToSpeaker",
            Self::NoAction => "noAction",
        }
    }
}

impl FromStr for AudioSessionStrategy {
    type Err = ConfigError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name {
            "recordOnly" => Ok(Self::RecordOnly),
            "playAndRecord" => Ok(Self::PlayAndRecord),
            "playAndRecordDefaultToSpeaker" => Ok(Self::PlayAndRecordDefaultToSpeaker),
            "noAction" => Ok(Self::NoAction),
            _ => Err(unknown("audio session strategy", name)),
        }
    }
}

macro_rules! display_by_name {
    ($($ty:ty),*) => {
        $(
            impl fmt::Display for $ty {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str(self.name())
                }
            }
        )*
    };
}

display_by_name!(
    LogLevel,
    AspectMode,
    AudioQuality,
    AutoBitrateProfile,
    AudioSessionStrategy
);

fn unknown(selector: &'static str, value: &str) -> ConfigError {
    ConfigError::UnknownValue {
        selector,
        value: value.to_string(),
    }
}
