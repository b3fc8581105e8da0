//! Progress events emitted by the session controller.
//!
//! The core never formats console output. It hands structured events to an
//! [`EventSink`]; the CLI decides whether to render them as text or JSON.

use serde::Serialize;
use tracing::{info, warn};

use crate::code::UnlockCode;
use crate::error::ErrorKind;
use crate::model::{LockStatus, SerialEndpoint};

/// Which status query a snapshot came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusCheck {
    /// Before any code is sent.
    Initial,
    /// After the unlock code was sent.
    Verification,
}

/// How a session ended, in serializable form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    Success,
    AlreadyUnlocked,
    Aborted,
    Failure,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    ProbingPort {
        endpoint: SerialEndpoint,
    },
    PortSilent {
        endpoint: SerialEndpoint,
    },
    EndpointUnavailable {
        endpoint: SerialEndpoint,
        error: String,
    },
    PortFound {
        endpoint: SerialEndpoint,
    },
    ImeiFound {
        imei: String,
    },
    ChecksumChecked {
        imei: String,
        valid: bool,
    },
    StatusSnapshot {
        check: StatusCheck,
        status: LockStatus,
    },
    CodeComputed {
        code: UnlockCode,
    },
    UnlockCodeSent {
        endpoint: SerialEndpoint,
    },
    Finished {
        outcome: OutcomeKind,
        #[serde(skip_serializing_if = "Option::is_none")]
        error_kind: Option<ErrorKind>,
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
}

/// Receiver for [`SessionEvent`]s.
pub trait EventSink {
    fn emit(&mut self, event: &SessionEvent);
}

impl<S: EventSink + ?Sized> EventSink for &mut S {
    fn emit(&mut self, event: &SessionEvent) {
        (**self).emit(event);
    }
}

impl<S: EventSink + ?Sized> EventSink for Box<S> {
    fn emit(&mut self, event: &SessionEvent) {
        (**self).emit(event);
    }
}

/// Collects events in order. Handy in tests and for post-run summaries.
impl EventSink for Vec<SessionEvent> {
    fn emit(&mut self, event: &SessionEvent) {
        self.push(event.clone());
    }
}

/// Logs every event through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&mut self, event: &SessionEvent) {
        match event {
            SessionEvent::ProbingPort { endpoint } => info!(%endpoint, "testing port"),
            SessionEvent::PortSilent { endpoint } => info!(%endpoint, "no activity"),
            SessionEvent::EndpointUnavailable { endpoint, error } => {
                warn!(%endpoint, %error, "port unavailable")
            }
            SessionEvent::PortFound { endpoint } => info!(%endpoint, "activity detected"),
            SessionEvent::ImeiFound { imei } => info!(%imei, "found probable IMEI"),
            SessionEvent::ChecksumChecked { imei, valid } => {
                info!(%imei, valid, "IMEI checksum checked")
            }
            SessionEvent::StatusSnapshot { check, status } => info!(
                ?check,
                state = %status.state,
                remaining = status.remaining_attempts,
                carrier = status.carrier_code,
                "lock status"
            ),
            SessionEvent::CodeComputed { code } => info!(%code, "unlock code computed"),
            SessionEvent::UnlockCodeSent { endpoint } => info!(%endpoint, "unlock code sent"),
            SessionEvent::Finished {
                outcome,
                error_kind,
                reason,
            } => match outcome {
                OutcomeKind::Failure => warn!(?error_kind, reason = ?reason, "session failed"),
                _ => info!(?outcome, "session finished"),
            },
        }
    }
}

/// Fan one event out to two sinks.
pub struct Tee<A, B>(pub A, pub B);

impl<A: EventSink, B: EventSink> EventSink for Tee<A, B> {
    fn emit(&mut self, event: &SessionEvent) {
        self.0.emit(event);
        self.1.emit(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::LockState;

    #[test]
    fn events_serialize_tagged() {
        let ev = SessionEvent::StatusSnapshot {
            check: StatusCheck::Initial,
            status: LockStatus {
                state: LockState::LockedUnlockable,
                remaining_attempts: 8,
                carrier_code: 0,
            },
        };
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["event"], "status_snapshot");
        assert_eq!(json["check"], "initial");
        assert_eq!(json["status"]["state"], "locked_unlockable");
        assert_eq!(json["status"]["remaining_attempts"], 8);
    }

    #[test]
    fn finished_omits_empty_reason() {
        let ev = SessionEvent::Finished {
            outcome: OutcomeKind::AlreadyUnlocked,
            error_kind: None,
            reason: None,
        };
        let json = serde_json::to_string(&ev).unwrap();
        assert_eq!(json, r#"{"event":"finished","outcome":"already_unlocked"}"#);
    }

    #[test]
    fn tee_feeds_both_sinks() {
        let mut a: Vec<SessionEvent> = Vec::new();
        let mut b: Vec<SessionEvent> = Vec::new();
        let mut tee = Tee(&mut a, &mut b);
        tee.emit(&SessionEvent::ImeiFound {
            imei: "490154203237518".into(),
        });
        assert_eq!(a.len(), 1);
        assert_eq!(a, b);
    }
}
