use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::config::{AudioConfig, VideoConfig};
use crate::errors::{BuildError, EngineError, JoinError};
use crate::token::TokenProvider;

use super::audio::{AudioControl, AudioFrameSink};
use super::channel::ChannelControl;
use super::coordinator::{run_event_fanout, CapabilityRegistry, EngineEvent};
use super::video::VideoControl;
use super::{ClientRole, EngineFactory, RtcEngine};

/// The engine is a process-wide singleton resource. One live session at
/// a time; a prior session must be fully torn down first.
static ENGINE_LIVE: AtomicBool = AtomicBool::new(false);

/// Everything a session needs, stated once up front: the application
/// identity and the set of requested capabilities. Channel is always
/// built; audio and video only when configured.
#[derive(Clone)]
pub struct SessionConfig {
    pub app_id: String,
    pub audio: Option<AudioConfig>,
    pub video: Option<VideoConfig>,
    /// Collaborator receiving raw audio frames when audio is requested.
    pub audio_sink: Option<Arc<dyn AudioFrameSink>>,
}

impl SessionConfig {
    /// No optional capabilities requested.
    pub fn new(app_id: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            audio: None,
            video: None,
            audio_sink: None,
        }
    }

    /// Audio and video with default parameters.
    pub fn full(app_id: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            audio: Some(AudioConfig::default()),
            video: Some(VideoConfig::default()),
            audio_sink: None,
        }
    }
}

/// A live engine session: the engine handle plus the capability
/// components that were requested at build time.
pub struct EngineSession {
    engine: Arc<dyn RtcEngine>,
    pub channel: ChannelControl,
    pub audio: Option<AudioControl>,
    pub video: Option<VideoControl>,
    fanout: JoinHandle<()>,
    _guard: SingletonGuard,
}

impl EngineSession {
    /// Exactly-once, fallible construction. On failure nothing is
    /// returned and the singleton slot is released; callers must treat
    /// failure as "real-time features unavailable" and degrade.
    pub fn connect(
        config: SessionConfig,
        tokens: Arc<dyn TokenProvider>,
        factory: &dyn EngineFactory,
        event_tx: mpsc::Sender<EngineEvent>,
    ) -> Result<Self, BuildError> {
        if ENGINE_LIVE
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(BuildError::EngineAlreadyRunning);
        }
        let guard = SingletonGuard;

        let engine = factory.create(&config.app_id)?;
        match Self::assemble(engine.clone(), &config, tokens, event_tx) {
            Ok((channel, audio, video, fanout)) => {
                info!(
                    "Engine session built (audio: {}, video: {})",
                    audio.is_some(),
                    video.is_some()
                );
                Ok(Self {
                    engine,
                    channel,
                    audio,
                    video,
                    fanout,
                    _guard: guard,
                })
            }
            Err(e) => {
                engine.destroy();
                Err(e.into())
            }
        }
    }

    /// Build and set up only the requested capability components.
    #[allow(clippy::type_complexity)]
    fn assemble(
        engine: Arc<dyn RtcEngine>,
        config: &SessionConfig,
        tokens: Arc<dyn TokenProvider>,
        event_tx: mpsc::Sender<EngineEvent>,
    ) -> Result<
        (
            ChannelControl,
            Option<AudioControl>,
            Option<VideoControl>,
            JoinHandle<()>,
        ),
        EngineError,
    > {
        let channel = ChannelControl::new(engine.clone(), tokens);
        channel.setup()?;

        let audio = config
            .audio
            .map(|cfg| AudioControl::new(engine.clone(), cfg));
        if let Some(audio) = &audio {
            audio.setup(config.audio_sink.clone())?;
        }

        let video = config
            .video
            .map(|cfg| VideoControl::new(engine.clone(), cfg));
        if let Some(video) = &video {
            video.setup()?;
        }

        let raw_rx = engine
            .take_event_stream()
            .ok_or_else(|| EngineError::Rejected("engine event stream already taken".into()))?;
        let registry = CapabilityRegistry {
            channel: Some(channel.sink()),
        };
        let fanout = tokio::spawn(run_event_fanout(raw_rx, registry, event_tx));

        Ok((channel, audio, video, fanout))
    }

    /// Convenience forwarding to the channel capability.
    pub async fn join_channel(
        &self,
        name: &str,
        uid: u32,
        role: ClientRole,
    ) -> Result<(), JoinError> {
        self.channel.join_channel(name, uid, role).await
    }

    /// Convenience forwarding to the channel capability.
    pub fn leave_channel(&self) -> Result<(), EngineError> {
        self.channel.leave_channel()
    }

    /// Tear the session down in reverse build order: video, audio,
    /// channel, then the engine instance itself. Releases the
    /// process-wide singleton slot.
    pub fn teardown(self) {
        if let Some(video) = &self.video {
            video.teardown();
        }
        if let Some(audio) = &self.audio {
            audio.teardown();
        }
        if let Err(e) = self.channel.leave_channel() {
            debug!("Leave during teardown: {}", e);
        }
        self.engine.destroy();
        self.fanout.abort();
        info!("Engine session torn down");
    }
}

/// Releases the singleton slot when the session goes away, including on
/// a failed build.
struct SingletonGuard;

impl Drop for SingletonGuard {
    fn drop(&mut self) {
        ENGINE_LIVE.store(false, Ordering::Release);
    }
}
