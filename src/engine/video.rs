use std::sync::Arc;

use tracing::info;

use crate::config::VideoConfig;
use crate::errors::EngineError;

use super::{RenderSurface, RtcEngine};

/// Numeric id the engine reserves for the local preview surface.
pub const LOCAL_SURFACE_UID: u32 = 0;

/// Video capability: encoder profile, camera toggle, render surfaces.
#[derive(Clone)]
pub struct VideoControl {
    engine: Arc<dyn RtcEngine>,
    config: VideoConfig,
}

impl VideoControl {
    pub(crate) fn new(engine: Arc<dyn RtcEngine>, config: VideoConfig) -> Self {
        Self { engine, config }
    }

    /// Enable video and fix the encoder configuration.
    pub(crate) fn setup(&self) -> Result<(), EngineError> {
        self.engine.enable_video()?;
        self.engine.set_video_encoder(self.config)?;
        info!(
            "Video encoder fixed at {}x{}@{} ({}kbps)",
            self.config.width, self.config.height, self.config.frame_rate, self.config.bitrate_kbps
        );
        Ok(())
    }

    pub fn enable_camera(&self) -> Result<(), EngineError> {
        self.engine.enable_local_video(true)
    }

    pub fn disable_camera(&self) -> Result<(), EngineError> {
        self.engine.enable_local_video(false)
    }

    /// Allocate a fresh surface for the local preview.
    pub fn local_surface(&self) -> Result<RenderSurface, EngineError> {
        self.engine.create_surface(LOCAL_SURFACE_UID)
    }

    /// Allocate a fresh surface for a remote participant's stream.
    pub fn remote_surface(&self, uid: u32) -> Result<RenderSurface, EngineError> {
        self.engine.create_surface(uid)
    }

    pub fn config(&self) -> VideoConfig {
        self.config
    }

    pub(crate) fn teardown(&self) {
        let _ = self.engine.enable_local_video(false);
        if let Err(e) = self.engine.disable_video() {
            tracing::debug!("Video teardown: {}", e);
        }
    }
}
