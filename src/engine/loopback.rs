//! In-process engine used by the demo binary and the test suite.
//!
//! Joins succeed immediately and are confirmed through the same raw
//! event stream a real engine would use; tests can inject peer arrivals
//! and error codes. No media flows anywhere.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tracing::debug;

use crate::config::{AudioConfig, VideoConfig};
use crate::errors::EngineError;

use super::audio::AudioFrameSink;
use super::{
    ChannelProfile, ClientRole, EngineFactory, OfflineReason, RawEngineEvent, RenderSurface,
    RtcEngine,
};

pub struct LoopbackEngine {
    events: Mutex<Option<mpsc::UnboundedSender<RawEngineEvent>>>,
    stream: Mutex<Option<mpsc::UnboundedReceiver<RawEngineEvent>>>,
    joined: Mutex<Option<(String, u32)>>,
    muted: AtomicBool,
    destroyed: AtomicBool,
    next_surface: AtomicU64,
}

impl LoopbackEngine {
    fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            events: Mutex::new(Some(tx)),
            stream: Mutex::new(Some(rx)),
            joined: Mutex::new(None),
            muted: AtomicBool::new(false),
            destroyed: AtomicBool::new(false),
            next_surface: AtomicU64::new(1),
        }
    }

    fn emit(&self, event: RawEngineEvent) {
        if let Some(tx) = self.events.lock().unwrap().as_ref() {
            let _ = tx.send(event);
        }
    }

    fn check_alive(&self) -> Result<(), EngineError> {
        if self.destroyed.load(Ordering::Relaxed) {
            return Err(EngineError::NotInitialized);
        }
        Ok(())
    }

    /// Channel and uid of the current join, if any.
    pub fn joined(&self) -> Option<(String, u32)> {
        self.joined.lock().unwrap().clone()
    }

    pub fn is_muted(&self) -> bool {
        self.muted.load(Ordering::Relaxed)
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Relaxed)
    }

    /// Simulate a remote participant arriving.
    pub fn push_peer_joined(&self, uid: u32) {
        self.emit(RawEngineEvent::UserJoined { uid });
    }

    /// Simulate a remote participant going offline.
    pub fn push_peer_left(&self, uid: u32, reason: OfflineReason) {
        self.emit(RawEngineEvent::UserOffline { uid, reason });
    }

    /// Simulate a runtime error code.
    pub fn push_error(&self, code: i32) {
        self.emit(RawEngineEvent::Error { code });
    }
}

impl RtcEngine for LoopbackEngine {
    fn set_channel_profile(&self, _profile: ChannelProfile) -> Result<(), EngineError> {
        self.check_alive()
    }

    fn enable_audio(&self) -> Result<(), EngineError> {
        self.check_alive()
    }

    fn register_audio_observer(
        &self,
        _config: AudioConfig,
        _sink: Arc<dyn AudioFrameSink>,
    ) -> Result<(), EngineError> {
        self.check_alive()
    }

    fn disable_audio(&self) -> Result<(), EngineError> {
        self.check_alive()
    }

    fn mute_local_audio(&self, muted: bool) -> Result<(), EngineError> {
        self.check_alive()?;
        self.muted.store(muted, Ordering::Relaxed);
        Ok(())
    }

    fn enable_video(&self) -> Result<(), EngineError> {
        self.check_alive()
    }

    fn disable_video(&self) -> Result<(), EngineError> {
        self.check_alive()
    }

    fn set_video_encoder(&self, _config: VideoConfig) -> Result<(), EngineError> {
        self.check_alive()
    }

    fn enable_local_video(&self, _enabled: bool) -> Result<(), EngineError> {
        self.check_alive()
    }

    fn join_channel(
        &self,
        _token: Option<&str>,
        name: &str,
        uid: u32,
        _role: ClientRole,
    ) -> Result<(), EngineError> {
        self.check_alive()?;
        *self.joined.lock().unwrap() = Some((name.to_string(), uid));
        self.emit(RawEngineEvent::JoinChannelSuccess {
            channel: name.to_string(),
            uid,
        });
        Ok(())
    }

    fn leave_channel(&self) -> Result<(), EngineError> {
        self.check_alive()?;
        if self.joined.lock().unwrap().take().is_some() {
            self.emit(RawEngineEvent::LeaveChannel);
        }
        Ok(())
    }

    fn create_surface(&self, uid: u32) -> Result<RenderSurface, EngineError> {
        self.check_alive()?;
        Ok(RenderSurface {
            uid,
            surface_id: self.next_surface.fetch_add(1, Ordering::Relaxed),
        })
    }

    fn take_event_stream(&self) -> Option<mpsc::UnboundedReceiver<RawEngineEvent>> {
        self.stream.lock().unwrap().take()
    }

    fn destroy(&self) {
        self.destroyed.store(true, Ordering::Relaxed);
        // Closing the sender ends the fan-out loop.
        self.events.lock().unwrap().take();
        debug!("Loopback engine destroyed");
    }
}

/// Factory producing loopback engines. Keeps a handle to the last
/// engine built so tests can drive it.
#[derive(Default)]
pub struct LoopbackFactory {
    last: Mutex<Option<Arc<LoopbackEngine>>>,
}

impl LoopbackFactory {
    pub fn engine(&self) -> Option<Arc<LoopbackEngine>> {
        self.last.lock().unwrap().clone()
    }
}

impl EngineFactory for LoopbackFactory {
    fn create(&self, _app_id: &str) -> Result<Arc<dyn RtcEngine>, EngineError> {
        let engine = Arc::new(LoopbackEngine::new());
        *self.last.lock().unwrap() = Some(engine.clone());
        Ok(engine)
    }
}

/// Factory that always fails, for exercising the degraded path.
pub struct FailingFactory;

impl EngineFactory for FailingFactory {
    fn create(&self, _app_id: &str) -> Result<Arc<dyn RtcEngine>, EngineError> {
        Err(EngineError::LoadFailed("engine unavailable".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_is_confirmed_through_the_event_stream() {
        let engine = LoopbackEngine::new();
        let mut rx = engine.take_event_stream().unwrap();
        engine
            .join_channel(None, "ABCD", 42, ClientRole::Broadcaster)
            .unwrap();
        assert_eq!(
            rx.try_recv().unwrap(),
            RawEngineEvent::JoinChannelSuccess {
                channel: "ABCD".into(),
                uid: 42
            }
        );
    }

    #[test]
    fn event_stream_is_taken_once() {
        let engine = LoopbackEngine::new();
        assert!(engine.take_event_stream().is_some());
        assert!(engine.take_event_stream().is_none());
    }

    #[test]
    fn calls_after_destroy_are_rejected() {
        let engine = LoopbackEngine::new();
        engine.destroy();
        assert!(matches!(
            engine.enable_audio(),
            Err(EngineError::NotInitialized)
        ));
    }

    #[test]
    fn surfaces_are_fresh_per_allocation() {
        let engine = LoopbackEngine::new();
        let a = engine.create_surface(0).unwrap();
        let b = engine.create_surface(0).unwrap();
        assert_ne!(a.surface_id, b.surface_id);
    }
}
