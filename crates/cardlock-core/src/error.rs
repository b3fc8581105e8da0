//! Terminal session failures.
//!
//! Every variant ends the session. None of them is retried: the modem only
//! tolerates a handful of bad unlock attempts before hard-locking itself.

use serde::Serialize;
use thiserror::Error;

use crate::model::{LockState, SerialEndpoint};
use crate::serial::TransportError;

/// Coarse failure class, for callers that only need to know what went wrong
/// in broad terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Line open/read/write failure.
    Io,
    /// Expected token absent or unparsable.
    Protocol,
    /// IMEI checksum failure.
    Validation,
    /// Status unobtainable or unexpected; refusing to act.
    UnsafeState,
    /// The modem is already hard locked.
    HardLock,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no active port among {candidates} candidate(s)")]
    NoActivePort { candidates: usize },

    #[error("serial transaction on {endpoint} failed: {source}")]
    Io {
        endpoint: SerialEndpoint,
        #[source]
        source: TransportError,
    },

    #[error("IMEI not found in modem response")]
    ImeiNotFound,

    #[error("IMEI checksum invalid: {imei}")]
    InvalidChecksum { imei: String },

    #[error("could not obtain SIM lock status; further operations would be dangerous")]
    StatusUnobtainable,

    #[error("modem is hard locked; it cannot be unlocked with a code")]
    HardLocked,

    #[error("unlocking unsuccessful: modem now reports {state}")]
    UnlockRejected { state: LockState },
}

impl SessionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SessionError::NoActivePort { .. } | SessionError::Io { .. } => ErrorKind::Io,
            SessionError::ImeiNotFound => ErrorKind::Protocol,
            SessionError::InvalidChecksum { .. } => ErrorKind::Validation,
            SessionError::StatusUnobtainable => ErrorKind::UnsafeState,
            SessionError::HardLocked => ErrorKind::HardLock,
            SessionError::UnlockRejected { state } => match state {
                LockState::Unknown => ErrorKind::UnsafeState,
                LockState::HardLocked => ErrorKind::HardLock,
                _ => ErrorKind::Protocol,
            },
        }
    }

    pub(crate) fn io(endpoint: &SerialEndpoint, source: TransportError) -> Self {
        SessionError::Io {
            endpoint: endpoint.clone(),
            source,
        }
    }
}
