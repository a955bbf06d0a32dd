//! Session configuration types.

use broadcast_ipc::{Point, Size};

use crate::error::ConfigError;
use crate::selectors::{AspectMode, AudioQuality, AutoBitrateProfile, LogLevel};
use crate::ConfigResult;

/// Accepted video dimension range in pixels.
pub const VIDEO_DIMENSION_RANGE: (u32, u32) = (160, 1920);

/// Accepted video bitrate range in bits per second.
pub const VIDEO_BITRATE_RANGE: (u32, u32) = (100_000, 8_500_000);

/// Accepted target framerate range.
pub const FRAMERATE_RANGE: (u32, u32) = (10, 60);

/// Accepted keyframe interval range in seconds.
pub const KEYFRAME_INTERVAL_RANGE: (u32, u32) = (1, 5);

/// Accepted audio bitrate range in bits per second.
pub const AUDIO_BITRATE_RANGE: (u32, u32) = (64_000, 160_000);

/// Accepted audio channel counts.
pub const AUDIO_CHANNEL_RANGE: (u32, u32) = (1, 2);

/// Name of the built-in camera slot.
pub const CAMERA_SLOT_NAME: &str = "camera";

/// Z-index of the camera slot.
pub const CAMERA_Z_INDEX: i32 = 1;

/// Z-index of overlay slots; always above the camera.
pub const OVERLAY_Z_INDEX: i32 = 2;

/// Video encoding configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoConfig {
    /// Width in pixels.
    pub width: u32,

    /// Height in pixels.
    pub height: u32,

    /// Initial bitrate in bits per second.
    pub initial_bitrate: u32,

    /// Target frames per second.
    pub target_framerate: u32,

    /// Keyframe interval in seconds.
    pub keyframe_interval: u32,

    pub use_b_frames: bool,

    pub use_auto_bitrate: bool,

    /// Lower bound for automatic bitrate in bits per second.
    pub min_bitrate: u32,

    /// Upper bound for automatic bitrate in bits per second.
    pub max_bitrate: u32,

    pub auto_bitrate_profile: AutoBitrateProfile,
}

impl VideoConfig {
    /// Frame size as a pair.
    pub fn size(&self) -> Size {
        Size {
            width: self.width,
            height: self.height,
        }
    }
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            initial_bitrate: 2_100_000,
            target_framerate: 30,
            keyframe_interval: 2,
            use_b_frames: true,
            use_auto_bitrate: true,
            min_bitrate: 300_000,
            max_bitrate: 6_000_000,
            auto_bitrate_profile: AutoBitrateProfile::Conservative,
        }
    }
}

/// Audio encoding configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioConfig {
    /// Bitrate in bits per second.
    pub bitrate: u32,

    /// Number of channels.
    pub channels: u32,

    pub quality: AudioQuality,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            bitrate: 96_000,
            channels: 2,
            quality: AudioQuality::Medium,
        }
    }
}

/// Kind of media input a slot prefers or a device provides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputKind {
    Camera,
    Microphone,
    UserImage,
    UserAudio,
    Unknown,
}

/// A named compositing region in the outgoing mix.
#[derive(Debug, Clone, PartialEq)]
pub struct SlotDescriptor {
    /// Unique slot name.
    pub name: String,

    pub preferred_video_input: InputKind,

    pub preferred_audio_input: InputKind,

    pub aspect: AspectMode,

    /// Paint order; higher paints later, on top.
    pub z_index: i32,

    /// Size in pixels; `None` fills the canvas.
    pub size: Option<Size>,

    pub position: Point,
}

impl SlotDescriptor {
    /// The built-in camera slot: camera video plus microphone audio.
    pub fn camera() -> Self {
        Self {
            name: CAMERA_SLOT_NAME.to_string(),
            preferred_video_input: InputKind::Camera,
            preferred_audio_input: InputKind::Microphone,
            aspect: AspectMode::Fill,
            z_index: CAMERA_Z_INDEX,
            size: None,
            position: Point::default(),
        }
    }

    /// A static image overlay slot.
    pub fn overlay(name: impl Into<String>, size: Size, position: Point) -> Self {
        Self {
            name: name.into(),
            preferred_video_input: InputKind::UserImage,
            preferred_audio_input: InputKind::Unknown,
            aspect: AspectMode::Fit,
            z_index: OVERLAY_Z_INDEX,
            size: Some(size),
            position,
        }
    }
}

/// Complete configuration handed to the engine when a session is created.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SessionConfig {
    pub video: VideoConfig,

    pub audio: AudioConfig,

    pub log_level: LogLevel,

    /// Whether the mixer composites with an alpha channel.
    pub enable_transparency: bool,

    /// Slots present when the session starts.
    pub mixer_slots: Vec<SlotDescriptor>,
}

impl SessionConfig {
    /// Check every numeric field against the ranges the engine accepts.
    pub fn validate(&self) -> ConfigResult<()> {
        let video = &self.video;

        check_range("width", video.width, VIDEO_DIMENSION_RANGE)?;
        check_range("height", video.height, VIDEO_DIMENSION_RANGE)?;
        check_range("bitrate", video.initial_bitrate, VIDEO_BITRATE_RANGE)?;
        check_range("minBitrate", video.min_bitrate, VIDEO_BITRATE_RANGE)?;
        check_range("maxBitrate", video.max_bitrate, VIDEO_BITRATE_RANGE)?;
        check_range("targetFrameRate", video.target_framerate, FRAMERATE_RANGE)?;
        check_range(
            "keyframeInterval",
            video.keyframe_interval,
            KEYFRAME_INTERVAL_RANGE,
        )?;

        if video.min_bitrate > video.initial_bitrate || video.initial_bitrate > video.max_bitrate {
            return Err(ConfigError::BitrateOrder {
                min: video.min_bitrate,
                initial: video.initial_bitrate,
                max: video.max_bitrate,
            });
        }

        check_range("audio bitrate", self.audio.bitrate, AUDIO_BITRATE_RANGE)?;
        check_range("channels", self.audio.channels, AUDIO_CHANNEL_RANGE)?;

        Ok(())
    }

    /// Look up a configured slot by name.
    pub fn slot(&self, name: &str) -> Option<&SlotDescriptor> {
        self.mixer_slots.iter().find(|slot| slot.name == name)
    }
}

fn check_range(field: &'static str, value: u32, (min, max): (u32, u32)) -> ConfigResult<()> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field,
            value,
            min,
            max,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(SessionConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_small_frame() {
        let mut config = SessionConfig::default();
        config.video.width = 100;

        assert!(matches!(
            config.validate(),
            Err(ConfigError::OutOfRange { field: "width", .. })
        ));
    }

    #[test]
    fn test_validate_rejects_inverted_bitrates() {
        let mut config = SessionConfig::default();
        config.video.min_bitrate = 5_000_000;
        config.video.initial_bitrate = 2_000_000;

        assert!(matches!(
            config.validate(),
            Err(ConfigError::BitrateOrder { .. })
        ));
    }

    #[test]
    fn test_overlay_slot_paints_above_camera() {
        let camera = SlotDescriptor::camera();
        let overlay = SlotDescriptor::overlay(
            "logo",
            Size {
                width: 64,
                height: 64,
            },
            Point::default(),
        );

        assert_eq!(camera.name, CAMERA_SLOT_NAME);
        assert_eq!(camera.preferred_video_input, InputKind::Camera);
        assert_eq!(camera.preferred_audio_input, InputKind::Microphone);
        assert!(overlay.z_index > camera.z_index);
        assert_eq!(overlay.aspect, AspectMode::Fit);
        assert_eq!(overlay.preferred_video_input, InputKind::UserImage);
    }
}
