//! Real-time engine facade.
//!
//! The underlying engine is an opaque capability provider: a process-wide
//! singleton that joins named channels, publishes/receives audio and
//! video, and reports lifecycle through an event stream. Everything the
//! session core needs from it is the [`RtcEngine`] trait below; the
//! media pipeline behind it is not this crate's concern.

pub mod audio;
pub mod channel;
pub mod coordinator;
pub mod facade;
pub mod loopback;
pub mod video;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::config::{AudioConfig, VideoConfig};
use crate::errors::EngineError;

/// Error codes the engine reports through [`RawEngineEvent::Error`].
pub mod codes {
    pub const ERR_INVALID_ARGUMENT: i32 = 2;
    pub const ERR_NOT_INITIALIZED: i32 = 7;
    pub const ERR_JOIN_TIMEOUT: i32 = 10;
    pub const ERR_INVALID_APP_ID: i32 = 101;
    pub const ERR_TOKEN_EXPIRED: i32 = 109;
}

/// Role taken when joining a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientRole {
    /// Publishes microphone (and camera when enabled).
    Broadcaster,
    /// Receive-only.
    Audience,
}

/// Channel profile, configured once per engine instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelProfile {
    Communication,
    LiveBroadcasting,
}

/// Why a remote user went offline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OfflineReason {
    Quit,
    Dropped,
}

/// Raw lifecycle events as the engine reports them.
#[derive(Debug, Clone, PartialEq)]
pub enum RawEngineEvent {
    JoinChannelSuccess { channel: String, uid: u32 },
    UserJoined { uid: u32 },
    UserOffline { uid: u32, reason: OfflineReason },
    LeaveChannel,
    Error { code: i32 },
}

/// A renderable surface bound to a numeric user id (0 = local preview).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderSurface {
    pub uid: u32,
    pub surface_id: u64,
}

/// The engine API surface the session core consumes.
///
/// Calls are synchronous and fallible; lifecycle confirmations (joined,
/// left, peers coming and going, runtime errors) arrive asynchronously
/// through the raw event stream.
pub trait RtcEngine: Send + Sync {
    fn set_channel_profile(&self, profile: ChannelProfile) -> Result<(), EngineError>;

    fn enable_audio(&self) -> Result<(), EngineError>;

    /// Install the audio frame observer with negotiated parameters for
    /// both capture and playback directions.
    fn register_audio_observer(
        &self,
        config: AudioConfig,
        sink: Arc<dyn audio::AudioFrameSink>,
    ) -> Result<(), EngineError>;

    fn disable_audio(&self) -> Result<(), EngineError>;

    fn mute_local_audio(&self, muted: bool) -> Result<(), EngineError>;

    fn enable_video(&self) -> Result<(), EngineError>;

    fn disable_video(&self) -> Result<(), EngineError>;

    fn set_video_encoder(&self, config: VideoConfig) -> Result<(), EngineError>;

    fn enable_local_video(&self, enabled: bool) -> Result<(), EngineError>;

    fn join_channel(
        &self,
        token: Option<&str>,
        name: &str,
        uid: u32,
        role: ClientRole,
    ) -> Result<(), EngineError>;

    /// Returns immediately; the engine confirms with a `LeaveChannel`
    /// event rather than a synchronous result.
    fn leave_channel(&self) -> Result<(), EngineError>;

    /// Allocate a fresh renderable surface for the given uid.
    fn create_surface(&self, uid: u32) -> Result<RenderSurface, EngineError>;

    /// Hand over the raw event stream. Yields `Some` exactly once: the
    /// engine supports a single registered listener, and the fan-out
    /// coordinator is it.
    fn take_event_stream(&self) -> Option<mpsc::UnboundedReceiver<RawEngineEvent>>;

    /// Destroy the singleton engine instance. Called last in teardown.
    fn destroy(&self);
}

/// Constructs the engine. Exactly one engine instance may exist per
/// process; the facade enforces that, the factory just builds.
pub trait EngineFactory: Send + Sync {
    fn create(&self, app_id: &str) -> Result<Arc<dyn RtcEngine>, EngineError>;
}
