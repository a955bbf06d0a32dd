//! Named configuration presets.

use std::str::FromStr;

use crate::error::ConfigError;
use crate::session::{AudioConfig, SessionConfig, VideoConfig};

/// Predefined session configurations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigurationPreset {
    /// 720x1280 portrait, up to 8.5 Mbps.
    StandardPortrait,

    /// 1280x720 landscape, up to 8.5 Mbps.
    StandardLandscape,

    /// 480x852 portrait for constrained uplinks.
    BasicPortrait,

    /// 852x480 landscape for constrained uplinks.
    BasicLandscape,
}

impl ConfigurationPreset {
    /// All presets.
    pub const ALL: [ConfigurationPreset; 4] = [
        Self::StandardPortrait,
        Self::StandardLandscape,
        Self::BasicPortrait,
        Self::BasicLandscape,
    ];

    /// Host-facing preset name.
    pub fn name(self) -> &'static str {
        match self {
            Self::StandardPortrait => "standardPortrait",
            Self::StandardLandscape => "standardLandscape",
            Self::BasicPortrait => "basicPortrait",
            Self::BasicLandscape => "basicLandscape",
        }
    }

    /// Build the configuration this preset describes.
    pub fn config(self) -> SessionConfig {
        let (width, height) = match self {
            Self::StandardPortrait => (720, 1280),
            Self::StandardLandscape => (1280, 720),
            Self::BasicPortrait => (480, 852),
            Self::BasicLandscape => (852, 480),
        };

        let video = match self {
            Self::StandardPortrait | Self::StandardLandscape => VideoConfig {
                width,
                height,
                initial_bitrate: 2_100_000,
                min_bitrate: 300_000,
                max_bitrate: 8_500_000,
                ..Default::default()
            },
            Self::BasicPortrait | Self::BasicLandscape => VideoConfig {
                width,
                height,
                initial_bitrate: 1_500_000,
                min_bitrate: 300_000,
                max_bitrate: 1_500_000,
                ..Default::default()
            },
        };

        SessionConfig {
            video,
            audio: AudioConfig::default(),
            ..Default::default()
        }
    }
}

impl FromStr for ConfigurationPreset {
    type Err = ConfigError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|preset| preset.name() == name)
            .ok_or_else(|| ConfigError::UnknownValue {
                selector: "configuration preset",
                value: name.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_preset_is_valid_and_sized() {
        for preset in ConfigurationPreset::ALL {
            let config = preset.config();
            assert!(config.validate().is_ok(), "{} invalid", preset.name());
            assert!(config.video.width > 0 && config.video.height > 0);
            assert!(config.audio.bitrate > 0 && config.audio.channels > 0);
        }
    }

    #[test]
    fn test_preset_names_parse() {
        for preset in ConfigurationPreset::ALL {
            assert_eq!(preset.name().parse::<ConfigurationPreset>(), Ok(preset));
        }
    }

    #[test]
    fn test_unknown_preset_is_rejected() {
        assert!(matches!(
            "ultraPortrait".parse::<ConfigurationPreset>(),
            Err(ConfigError::UnknownValue {
                selector: "configuration preset",
                ..
            })
        ));
    }

    #[test]
    fn test_portrait_and_landscape_are_transposed() {
        let portrait = ConfigurationPreset::StandardPortrait.config();
        let landscape = ConfigurationPreset::StandardLandscape.config();

        assert_eq!(portrait.video.width, landscape.video.height);
        assert_eq!(portrait.video.height, landscape.video.width);
    }
}
