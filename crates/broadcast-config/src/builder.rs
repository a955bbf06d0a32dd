//! Merging presets and host overrides into a validated configuration.

use tracing::debug;

use broadcast_ipc::{AudioOptions, VideoOptions};

use crate::error::ConfigError;
use crate::preset::ConfigurationPreset;
use crate::selectors::{AudioQuality, AudioSessionStrategy, AutoBitrateProfile, LogLevel};
use crate::session::{AudioConfig, SessionConfig, VideoConfig};
use crate::ConfigResult;

/// Collects a preset, custom overrides and the log level, and builds a
/// [`SessionConfig`] from them.
///
/// Every setter validates the combination it would produce, so a bad value
/// fails the call that supplied it rather than a later `build`.
#[derive(Debug, Clone, Default)]
pub struct ConfigurationBuilder {
    preset: Option<ConfigurationPreset>,
    video: Option<VideoOptions>,
    audio: Option<AudioOptions>,
    log_level: Option<LogLevel>,
}

impl ConfigurationBuilder {
    /// Create a builder over the library default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Select a preset by its host-facing name.
    pub fn set_preset_name(&mut self, name: &str) -> ConfigResult<()> {
        let preset = name.parse()?;
        self.try_update(|builder| builder.preset = Some(preset))
    }

    /// Select a preset.
    pub fn set_preset(&mut self, preset: ConfigurationPreset) -> ConfigResult<()> {
        self.try_update(|builder| builder.preset = Some(preset))
    }

    /// Replace the custom video overrides.
    pub fn set_video_options(&mut self, options: VideoOptions) -> ConfigResult<()> {
        self.try_update(|builder| builder.video = Some(options))
    }

    /// Replace the custom audio overrides.
    pub fn set_audio_options(&mut self, options: AudioOptions) -> ConfigResult<()> {
        self.try_update(|builder| builder.audio = Some(options))
    }

    /// Set the configuration-level log level.
    pub fn set_log_level(&mut self, level: LogLevel) {
        self.log_level = Some(level);
    }

    pub fn preset(&self) -> Option<ConfigurationPreset> {
        self.preset
    }

    /// The process-wide audio session strategy requested by the audio
    /// overrides, if any.
    pub fn audio_session_strategy(&self) -> ConfigResult<Option<AudioSessionStrategy>> {
        self.audio
            .as_ref()
            .and_then(|audio| audio.audio_session_strategy.as_deref())
            .map(str::parse::<AudioSessionStrategy>)
            .transpose()
    }

    /// Build the configuration: preset (or library default), then video
    /// overrides, then audio overrides, then the log level.
    pub fn build(&self) -> ConfigResult<SessionConfig> {
        let mut config = self
            .preset
            .map(ConfigurationPreset::config)
            .unwrap_or_default();

        if let Some(ref video) = self.video {
            merge_video(&mut config.video, video)?;
        }

        if let Some(ref audio) = self.audio {
            merge_audio(&mut config.audio, audio)?;
        }

        if let Some(level) = self.log_level {
            config.log_level = level;
        }

        config.validate()?;

        debug!(
            preset = self.preset.map(ConfigurationPreset::name),
            width = config.video.width,
            height = config.video.height,
            bitrate = config.video.initial_bitrate,
            "Built session configuration"
        );

        Ok(config)
    }

    fn try_update(&mut self, update: impl FnOnce(&mut Self)) -> ConfigResult<()> {
        let mut candidate = self.clone();
        update(&mut candidate);
        candidate.build()?;
        candidate.audio_session_strategy()?;
        *self = candidate;
        Ok(())
    }
}

/// Apply the present video keys over `video`.
fn merge_video(video: &mut VideoConfig, options: &VideoOptions) -> ConfigResult<()> {
    match (options.width, options.height) {
        (Some(width), Some(height)) => {
            video.width = width;
            video.height = height;
        }
        (None, None) => {}
        _ => return Err(ConfigError::IncompleteSize),
    }

    if let Some(bitrate) = options.bitrate {
        video.initial_bitrate = bitrate;
    }
    if let Some(framerate) = options.target_frame_rate {
        video.target_framerate = framerate;
    }
    if let Some(interval) = options.keyframe_interval {
        video.keyframe_interval = interval;
    }
    if let Some(b_frames) = options.is_b_frames {
        video.use_b_frames = b_frames;
    }
    if let Some(auto_bitrate) = options.is_auto_bitrate {
        video.use_auto_bitrate = auto_bitrate;
    }
    if let Some(max) = options.max_bitrate {
        video.max_bitrate = max;
    }
    if let Some(min) = options.min_bitrate {
        video.min_bitrate = min;
    }
    if let Some(ref profile) = options.auto_bitrate_profile {
        video.auto_bitrate_profile = profile.parse::<AutoBitrateProfile>()?;
    }

    Ok(())
}

/// Apply the present audio keys over `audio`.
///
/// The session strategy is not part of the session configuration; see
/// [`ConfigurationBuilder::audio_session_strategy`].
fn merge_audio(audio: &mut AudioConfig, options: &AudioOptions) -> ConfigResult<()> {
    if let Some(bitrate) = options.bitrate {
        audio.bitrate = bitrate;
    }
    if let Some(channels) = options.channels {
        audio.channels = channels;
    }
    if let Some(ref quality) = options.quality {
        audio.quality = quality.parse::<AudioQuality>()?;
    }

    Ok(())
}
