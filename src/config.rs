//! Session configuration.
//!
//! The media parameters mirror what the mobile clients hardcode; they
//! are lifted into explicit config structs so policy (minimum roster
//! size, call length) stays tunable per deployment.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Game-flow policy knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameConfig {
    /// Minimum roster size before "start game" becomes available.
    pub min_players: usize,
    /// Length of the live call phase. `None` disables the countdown and
    /// leaves the transition to an explicit intent.
    #[serde(default, with = "humantime_serde::option")]
    pub call_duration: Option<Duration>,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            min_players: 3,
            call_duration: Some(Duration::from_secs(120)),
        }
    }
}

/// Audio capture/playback parameters negotiated with the engine's frame
/// observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioConfig {
    pub sample_rate: u32,
    pub channels: u16,
    /// Observer callback granularity in milliseconds.
    pub buffer_ms: u32,
}

impl AudioConfig {
    /// Samples delivered per observer callback, per channel.
    pub fn samples_per_call(&self) -> usize {
        (self.sample_rate as usize * self.buffer_ms as usize) / 1000
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        // 24kHz mono, 50ms buffers.
        Self {
            sample_rate: 24_000,
            channels: 1,
            buffer_ms: 50,
        }
    }
}

/// Fixed encoder profile applied when video is enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoConfig {
    pub width: u32,
    pub height: u32,
    pub frame_rate: u32,
    pub bitrate_kbps: u32,
    pub adaptive_orientation: bool,
    pub auto_mirror: bool,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            frame_rate: 15,
            bitrate_kbps: 800,
            adaptive_orientation: true,
            auto_mirror: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_audio_is_24khz_mono_50ms() {
        let cfg = AudioConfig::default();
        assert_eq!(cfg.sample_rate, 24_000);
        assert_eq!(cfg.channels, 1);
        assert_eq!(cfg.buffer_ms, 50);
        assert_eq!(cfg.samples_per_call(), 1200);
    }

    #[test]
    fn default_game_requires_three_players() {
        assert_eq!(GameConfig::default().min_players, 3);
    }
}
