//! Error types for the session core.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::engine::codes;

/// Errors returned by engine API calls.
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    /// The native engine library could not be loaded.
    #[error("engine library load failed: {0}")]
    LoadFailed(String),

    /// The application identity was rejected at construction.
    #[error("invalid application identity")]
    InvalidAppId,

    /// A call was issued before the engine was initialized.
    #[error("engine not initialized")]
    NotInitialized,

    /// The engine rejected a call.
    #[error("engine call rejected: {0}")]
    Rejected(String),
}

/// Why an engine session could not be built.
#[derive(Debug, Error)]
pub enum BuildError {
    /// The engine is a process-wide singleton; a prior session must be
    /// fully torn down before a new one is built.
    #[error("an engine session is already live; tear it down first")]
    EngineAlreadyRunning,

    /// Engine construction failed. No partial session is returned.
    #[error("engine construction failed: {0}")]
    Construction(#[from] EngineError),
}

/// Token-provider failures.
#[derive(Debug, Clone, Error)]
pub enum TokenError {
    /// Soft failure: the join proceeds without a token.
    #[error("token service unavailable: {0}")]
    Unavailable(String),

    /// Hard failure: the join must not proceed.
    #[error("token request rejected: {0}")]
    Rejected(String),
}

impl TokenError {
    pub fn is_hard(&self) -> bool {
        matches!(self, TokenError::Rejected(_))
    }
}

/// Why a channel join attempt failed.
#[derive(Debug, Error)]
pub enum JoinError {
    #[error(transparent)]
    Token(TokenError),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Classification of engine runtime error codes.
///
/// Every code the engine reports maps into this taxonomy, recognized or
/// not. Classification is advisory: only faults that make the call
/// unusable are fatal, and the session layer decides what to tear down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", content = "code", rename_all = "snake_case")]
pub enum EngineFault {
    #[error("invalid application identity")]
    InvalidAppId,
    #[error("channel join timed out")]
    JoinTimeout,
    #[error("authorization token expired")]
    ExpiredCredential,
    #[error("invalid argument")]
    InvalidArgument,
    #[error("engine not initialized")]
    NotInitialized,
    #[error("unrecognized engine error code {0}")]
    Unknown(i32),
}

impl EngineFault {
    /// Map a raw engine error code into the taxonomy.
    pub fn classify(code: i32) -> Self {
        match code {
            codes::ERR_INVALID_ARGUMENT => EngineFault::InvalidArgument,
            codes::ERR_NOT_INITIALIZED => EngineFault::NotInitialized,
            codes::ERR_JOIN_TIMEOUT => EngineFault::JoinTimeout,
            codes::ERR_INVALID_APP_ID => EngineFault::InvalidAppId,
            codes::ERR_TOKEN_EXPIRED => EngineFault::ExpiredCredential,
            other => EngineFault::Unknown(other),
        }
    }

    /// Whether this fault makes the call session unusable.
    pub fn is_fatal(&self) -> bool {
        matches!(self, EngineFault::InvalidAppId | EngineFault::JoinTimeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_known_codes() {
        assert_eq!(
            EngineFault::classify(codes::ERR_INVALID_APP_ID),
            EngineFault::InvalidAppId
        );
        assert_eq!(
            EngineFault::classify(codes::ERR_JOIN_TIMEOUT),
            EngineFault::JoinTimeout
        );
        assert_eq!(
            EngineFault::classify(codes::ERR_TOKEN_EXPIRED),
            EngineFault::ExpiredCredential
        );
        assert_eq!(
            EngineFault::classify(codes::ERR_INVALID_ARGUMENT),
            EngineFault::InvalidArgument
        );
        assert_eq!(
            EngineFault::classify(codes::ERR_NOT_INITIALIZED),
            EngineFault::NotInitialized
        );
    }

    #[test]
    fn unrecognized_codes_still_classify() {
        assert_eq!(EngineFault::classify(-9999), EngineFault::Unknown(-9999));
        assert!(!EngineFault::classify(-9999).is_fatal());
    }

    #[test]
    fn only_app_id_and_join_timeout_are_fatal() {
        assert!(EngineFault::InvalidAppId.is_fatal());
        assert!(EngineFault::JoinTimeout.is_fatal());
        assert!(!EngineFault::ExpiredCredential.is_fatal());
        assert!(!EngineFault::InvalidArgument.is_fatal());
        assert!(!EngineFault::NotInitialized.is_fatal());
    }
}
