use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{info, warn};

use crate::errors::{EngineError, JoinError};
use crate::token::{TokenProvider, TokenRequest};

use super::coordinator::ChannelSink;
use super::{ChannelProfile, ClientRole, RtcEngine};

/// Channel capability: profile setup, token-backed join, leave.
#[derive(Clone)]
pub struct ChannelControl {
    engine: Arc<dyn RtcEngine>,
    tokens: Arc<dyn TokenProvider>,
    connected: Arc<ChannelStatus>,
}

impl ChannelControl {
    pub(crate) fn new(engine: Arc<dyn RtcEngine>, tokens: Arc<dyn TokenProvider>) -> Self {
        Self {
            engine,
            tokens,
            connected: Arc::new(ChannelStatus::default()),
        }
    }

    /// Configure the channel profile. Called once at session build.
    pub(crate) fn setup(&self) -> Result<(), EngineError> {
        self.engine.set_channel_profile(ChannelProfile::Communication)
    }

    /// Fetch a transient authorization token, then issue the engine join
    /// with microphone publishing enabled.
    ///
    /// A provider answering "no token required" is legitimate, and a
    /// soft token failure downgrades to a tokenless join. Only a hard
    /// rejection aborts the attempt.
    pub async fn join_channel(
        &self,
        name: &str,
        uid: u32,
        role: ClientRole,
    ) -> Result<(), JoinError> {
        let token = match self
            .tokens
            .fetch_token(TokenRequest::new(name, uid, role))
            .await
        {
            Ok(token) => token,
            Err(e) if e.is_hard() => return Err(JoinError::Token(e)),
            Err(e) => {
                warn!("Token fetch failed, joining without one: {}", e);
                None
            }
        };

        self.engine.join_channel(token.as_deref(), name, uid, role)?;
        self.engine.mute_local_audio(false)?;
        info!("Join issued for channel {} as uid {}", name, uid);
        Ok(())
    }

    /// Issue the engine leave call. Confirmation arrives asynchronously
    /// as a left-channel event through the fan-out path.
    pub fn leave_channel(&self) -> Result<(), EngineError> {
        self.engine.leave_channel()
    }

    /// Whether the engine has confirmed the join.
    pub fn is_connected(&self) -> bool {
        self.connected.0.load(Ordering::Relaxed)
    }

    /// Handle the fan-out coordinator uses to report connectivity.
    pub(crate) fn sink(&self) -> Arc<dyn ChannelSink> {
        self.connected.clone()
    }
}

/// Shared connectivity flag, scoped to one session.
#[derive(Default)]
pub(crate) struct ChannelStatus(AtomicBool);

impl ChannelSink for ChannelStatus {
    fn channel_joined(&self, _uid: u32) {
        self.0.store(true, Ordering::Relaxed);
    }

    fn channel_left(&self) {
        self.0.store(false, Ordering::Relaxed);
    }
}
