//! Event fan-out coordinator.
//!
//! The engine supports a single registered listener. This task is it:
//! it drains the raw event stream, translates each event into its
//! semantic form, dispatches connectivity changes to the interested
//! capability handle, and forwards everything into the session's inbox.
//! The registry of capability handles is rebuilt per session and never
//! outlives it, so no weak references are needed.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::errors::EngineFault;

use super::{OfflineReason, RawEngineEvent};

/// Semantic engine-origin events, as the session orchestrator sees them.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    ChannelJoined { uid: u32 },
    PeerJoined { uid: u32 },
    PeerLeft { uid: u32, reason: OfflineReason },
    ChannelLeft,
    Fault(EngineFault),
}

/// Interface the channel capability exposes to the coordinator.
pub(crate) trait ChannelSink: Send + Sync {
    fn channel_joined(&self, uid: u32);
    fn channel_left(&self);
}

/// Capability handles interested in engine events. One per session.
#[derive(Default)]
pub(crate) struct CapabilityRegistry {
    pub channel: Option<Arc<dyn ChannelSink>>,
}

/// Drain the raw stream until the engine closes it.
pub(crate) async fn run_event_fanout(
    mut raw_rx: mpsc::UnboundedReceiver<RawEngineEvent>,
    registry: CapabilityRegistry,
    event_tx: mpsc::Sender<EngineEvent>,
) {
    while let Some(raw) = raw_rx.recv().await {
        let event = translate(&registry, raw);
        if event_tx.send(event).await.is_err() {
            // Session inbox gone; nothing left to fan out to.
            break;
        }
    }
    debug!("Engine event stream closed, fan-out exiting");
}

/// Direct, synchronous translation of one raw event.
fn translate(registry: &CapabilityRegistry, raw: RawEngineEvent) -> EngineEvent {
    match raw {
        RawEngineEvent::JoinChannelSuccess { channel, uid } => {
            info!("Joined channel {} as uid {}", channel, uid);
            if let Some(sink) = &registry.channel {
                sink.channel_joined(uid);
            }
            EngineEvent::ChannelJoined { uid }
        }
        RawEngineEvent::UserJoined { uid } => EngineEvent::PeerJoined { uid },
        RawEngineEvent::UserOffline { uid, reason } => EngineEvent::PeerLeft { uid, reason },
        RawEngineEvent::LeaveChannel => {
            info!("Left channel");
            if let Some(sink) = &registry.channel {
                sink.channel_left();
            }
            EngineEvent::ChannelLeft
        }
        RawEngineEvent::Error { code } => {
            let fault = EngineFault::classify(code);
            warn!("Engine error {}: {}", code, fault);
            EngineEvent::Fault(fault)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::codes;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[derive(Default)]
    struct FlagSink(AtomicBool);

    impl ChannelSink for FlagSink {
        fn channel_joined(&self, _uid: u32) {
            self.0.store(true, Ordering::Relaxed);
        }
        fn channel_left(&self) {
            self.0.store(false, Ordering::Relaxed);
        }
    }

    #[tokio::test]
    async fn translates_and_dispatches_connectivity() {
        let (raw_tx, raw_rx) = mpsc::unbounded_channel();
        let (event_tx, mut event_rx) = mpsc::channel(16);
        let sink = Arc::new(FlagSink::default());
        let registry = CapabilityRegistry {
            channel: Some(sink.clone()),
        };

        raw_tx
            .send(RawEngineEvent::JoinChannelSuccess {
                channel: "ABCD".into(),
                uid: 42,
            })
            .unwrap();
        raw_tx.send(RawEngineEvent::UserJoined { uid: 7 }).unwrap();
        raw_tx.send(RawEngineEvent::LeaveChannel).unwrap();
        drop(raw_tx);

        run_event_fanout(raw_rx, registry, event_tx).await;

        assert_eq!(event_rx.recv().await, Some(EngineEvent::ChannelJoined { uid: 42 }));
        assert_eq!(event_rx.recv().await, Some(EngineEvent::PeerJoined { uid: 7 }));
        assert_eq!(event_rx.recv().await, Some(EngineEvent::ChannelLeft));
        assert_eq!(event_rx.recv().await, None);
        assert!(!sink.0.load(Ordering::Relaxed));
    }

    #[tokio::test]
    async fn classifies_error_codes_into_faults() {
        let (raw_tx, raw_rx) = mpsc::unbounded_channel();
        let (event_tx, mut event_rx) = mpsc::channel(16);

        raw_tx
            .send(RawEngineEvent::Error {
                code: codes::ERR_TOKEN_EXPIRED,
            })
            .unwrap();
        raw_tx.send(RawEngineEvent::Error { code: 424242 }).unwrap();
        drop(raw_tx);

        run_event_fanout(raw_rx, CapabilityRegistry::default(), event_tx).await;

        assert_eq!(
            event_rx.recv().await,
            Some(EngineEvent::Fault(EngineFault::ExpiredCredential))
        );
        assert_eq!(
            event_rx.recv().await,
            Some(EngineEvent::Fault(EngineFault::Unknown(424242)))
        );
    }
}
