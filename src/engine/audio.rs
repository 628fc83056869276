use std::sync::Arc;

use tracing::info;

use crate::config::AudioConfig;
use crate::errors::EngineError;

use super::RtcEngine;

/// One buffer of raw PCM as the engine's frame observer delivers it.
#[derive(Debug, Clone)]
pub struct AudioFrame {
    pub samples: Vec<i16>,
    pub sample_rate: u32,
    pub channels: u16,
}

/// External collaborator receiving raw local and remote frames.
///
/// Return `true` to keep the engine's default processing for the frame;
/// what the collaborator does with the samples is not this crate's
/// concern.
pub trait AudioFrameSink: Send + Sync {
    fn on_local_frame(&self, frame: &AudioFrame) -> bool;
    fn on_remote_frame(&self, uid: u32, frame: &AudioFrame) -> bool;
}

/// Audio capability: owns the audio slice of the engine's configuration.
#[derive(Clone)]
pub struct AudioControl {
    engine: Arc<dyn RtcEngine>,
    config: AudioConfig,
}

impl AudioControl {
    pub(crate) fn new(engine: Arc<dyn RtcEngine>, config: AudioConfig) -> Self {
        Self { engine, config }
    }

    /// Enable the audio subsystem and, when a sink is present, install
    /// the frame observer with the negotiated parameters for both
    /// capture and playback directions.
    pub(crate) fn setup(&self, sink: Option<Arc<dyn AudioFrameSink>>) -> Result<(), EngineError> {
        self.engine.enable_audio()?;
        if let Some(sink) = sink {
            self.engine.register_audio_observer(self.config, sink)?;
            info!(
                "Audio frame observer installed ({}Hz, {}ch, {}ms buffers)",
                self.config.sample_rate, self.config.channels, self.config.buffer_ms
            );
        }
        Ok(())
    }

    /// Stop publishing the local audio stream.
    pub fn mute(&self) -> Result<(), EngineError> {
        self.engine.mute_local_audio(true)
    }

    /// Resume publishing the local audio stream.
    pub fn unmute(&self) -> Result<(), EngineError> {
        self.engine.mute_local_audio(false)
    }

    pub fn config(&self) -> AudioConfig {
        self.config
    }

    pub(crate) fn teardown(&self) {
        if let Err(e) = self.engine.disable_audio() {
            tracing::debug!("Audio teardown: {}", e);
        }
    }
}
