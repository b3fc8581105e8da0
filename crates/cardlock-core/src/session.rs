//! # Unlock Session Controller
//!
//! Drives one unlock attempt through an explicit state machine:
//!
//! ```text
//! Start ─► PortFound ─► ImeiObtained ─► ImeiValidated ─► StatusChecked
//!                                                            │ locked (unlockable)
//!                                                            ▼
//!               PostCheck ◄── CodeSent ◄── Confirmed ◄── CodeComputed
//! ```
//!
//! Each transition returns `Ok(next)` or a terminal [`SessionError`]. There
//! are no retries anywhere: a wrong `AT^CARDLOCK` costs one of a small number
//! of attempts, and running out hard-locks the modem for good.
//!
//! The controller owns its [`Transport`], the [`Operator`] that answers the
//! confirmation prompt, and the [`EventSink`] that receives progress.

use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info};

use crate::at::AtCommand;
use crate::code::UnlockCode;
use crate::config::UnlockConfig;
use crate::error::SessionError;
use crate::events::{EventSink, OutcomeKind, SessionEvent, StatusCheck};
use crate::imei::{Imei, digits_of, is_valid_checksum};
use crate::model::{LockState, LockStatus, SerialEndpoint};
use crate::parse::{parse_imei, parse_lock_status};
use crate::serial::Transport;

// ── Outcome ─────────────────────────────────────────────────────────

/// Final result of [`Controller::run`].
#[derive(Debug)]
pub enum Outcome {
    /// The code was accepted and the modem now reports unlocked.
    Success,
    /// Nothing to do: the modem was unlocked before we started.
    AlreadyUnlocked,
    /// The operator declined to send the code.
    Aborted,
    Failure(SessionError),
}

impl Outcome {
    pub fn kind(&self) -> OutcomeKind {
        match self {
            Outcome::Success => OutcomeKind::Success,
            Outcome::AlreadyUnlocked => OutcomeKind::AlreadyUnlocked,
            Outcome::Aborted => OutcomeKind::Aborted,
            Outcome::Failure(_) => OutcomeKind::Failure,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Outcome::Failure(_))
    }

    fn finished_event(&self) -> SessionEvent {
        let (error_kind, reason) = match self {
            Outcome::Failure(err) => (Some(err.kind()), Some(err.to_string())),
            _ => (None, None),
        };
        SessionEvent::Finished {
            outcome: self.kind(),
            error_kind,
            reason,
        }
    }
}

// ── Session snapshot ────────────────────────────────────────────────

/// The run-state binding one endpoint to one IMEI and one status snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    pub endpoint: SerialEndpoint,
    pub imei: Imei,
    pub status: LockStatus,
}

// ── Operator ────────────────────────────────────────────────────────

/// What the operator is asked to approve before the code goes out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnlockPrompt {
    pub endpoint: SerialEndpoint,
    pub imei: Imei,
    pub code: UnlockCode,
    /// Attempts left before a hard lock. Show this prominently.
    pub remaining_attempts: u8,
}

/// Answers the confirmation prompt. `false` aborts the session cleanly.
pub trait Operator {
    fn confirm_unlock(&mut self, prompt: &UnlockPrompt) -> bool;
}

impl<F> Operator for F
where
    F: FnMut(&UnlockPrompt) -> bool,
{
    fn confirm_unlock(&mut self, prompt: &UnlockPrompt) -> bool {
        self(prompt)
    }
}

// ── State machine ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Start,
    PortFound {
        endpoint: SerialEndpoint,
    },
    ImeiObtained {
        endpoint: SerialEndpoint,
        imei: String,
    },
    ImeiValidated {
        endpoint: SerialEndpoint,
        imei: Imei,
    },
    StatusChecked(Session),
    CodeComputed {
        session: Session,
        code: UnlockCode,
    },
    Confirmed {
        session: Session,
        code: UnlockCode,
    },
    CodeSent {
        session: Session,
    },
}

enum Transition {
    Next(SessionState),
    Finish(Outcome),
}

pub struct Controller<T, O, S> {
    config: UnlockConfig,
    transport: T,
    operator: O,
    events: S,
}

impl<T, O, S> Controller<T, O, S>
where
    T: Transport,
    O: Operator,
    S: EventSink,
{
    pub fn new(config: UnlockConfig, transport: T, operator: O, events: S) -> Self {
        Self {
            config,
            transport,
            operator,
            events,
        }
    }

    pub fn config(&self) -> &UnlockConfig {
        &self.config
    }

    /// Give back the collaborators, e.g. to inspect a recording sink.
    pub fn into_parts(self) -> (T, O, S) {
        (self.transport, self.operator, self.events)
    }

    /// Run a full unlock attempt against the configured candidates.
    pub fn run(&mut self) -> Outcome {
        let mut state = SessionState::Start;
        let outcome = loop {
            match self.advance(state) {
                Ok(Transition::Next(next)) => {
                    debug!(state = ?next, "session transition");
                    state = next;
                }
                Ok(Transition::Finish(outcome)) => break outcome,
                Err(err) => break Outcome::Failure(err),
            }
        };
        self.events.emit(&outcome.finished_event());
        outcome
    }

    /// Read-only pass: find the port, read and validate the IMEI, read the
    /// lock status. Never computes or sends a code and does not judge the
    /// status it returns.
    pub fn interrogate(&mut self) -> Result<Session, SessionError> {
        let endpoint = self.find_port()?;
        let imei = self.obtain_imei(&endpoint)?;
        let imei = self.validate_imei(&imei)?;
        let status = self.query_status(&endpoint, StatusCheck::Initial)?;
        Ok(Session {
            endpoint,
            imei,
            status,
        })
    }

    fn advance(&mut self, state: SessionState) -> Result<Transition, SessionError> {
        let next = match state {
            SessionState::Start => SessionState::PortFound {
                endpoint: self.find_port()?,
            },
            SessionState::PortFound { endpoint } => {
                let imei = self.obtain_imei(&endpoint)?;
                SessionState::ImeiObtained { endpoint, imei }
            }
            SessionState::ImeiObtained { endpoint, imei } => SessionState::ImeiValidated {
                imei: self.validate_imei(&imei)?,
                endpoint,
            },
            SessionState::ImeiValidated { endpoint, imei } => {
                let status = self.query_status(&endpoint, StatusCheck::Initial)?;
                SessionState::StatusChecked(Session {
                    endpoint,
                    imei,
                    status,
                })
            }
            SessionState::StatusChecked(session) => match session.status.state {
                LockState::Unknown => return Err(SessionError::StatusUnobtainable),
                LockState::HardLocked => return Err(SessionError::HardLocked),
                LockState::Unlocked => return Ok(Transition::Finish(Outcome::AlreadyUnlocked)),
                LockState::LockedUnlockable => {
                    info!(
                        remaining = session.status.remaining_attempts,
                        "SIM should be unlockable"
                    );
                    let code = UnlockCode::derive(&session.imei);
                    self.events.emit(&SessionEvent::CodeComputed { code });
                    SessionState::CodeComputed { session, code }
                }
            },
            SessionState::CodeComputed { session, code } => {
                let prompt = UnlockPrompt {
                    endpoint: session.endpoint.clone(),
                    imei: session.imei.clone(),
                    code,
                    remaining_attempts: session.status.remaining_attempts,
                };
                if !self.operator.confirm_unlock(&prompt) {
                    info!("operator declined; no code sent");
                    return Ok(Transition::Finish(Outcome::Aborted));
                }
                SessionState::Confirmed { session, code }
            }
            SessionState::Confirmed { session, code } => {
                self.send_code(&session.endpoint, code)?;
                SessionState::CodeSent { session }
            }
            SessionState::CodeSent { session } => {
                return self.verify(&session.endpoint).map(Transition::Finish);
            }
        };
        Ok(Transition::Next(next))
    }

    // ── Steps ───────────────────────────────────────────────────────

    /// Probe candidates in order; the first that shows activity wins.
    ///
    /// An endpoint that cannot be opened is abandoned and discovery moves on.
    fn find_port(&mut self) -> Result<SerialEndpoint, SessionError> {
        let candidates = self.config.candidates.clone();
        for endpoint in candidates {
            self.events.emit(&SessionEvent::ProbingPort {
                endpoint: endpoint.clone(),
            });
            let activity = self.transport.transact(
                &endpoint,
                None,
                self.config.probe_timeout,
                self.config.probe_read_budget,
            );
            match activity {
                Ok(bytes) if bytes.is_empty() => {
                    self.events.emit(&SessionEvent::PortSilent { endpoint });
                }
                Ok(_) => {
                    self.events.emit(&SessionEvent::PortFound {
                        endpoint: endpoint.clone(),
                    });
                    return Ok(endpoint);
                }
                Err(err) => {
                    self.events.emit(&SessionEvent::EndpointUnavailable {
                        endpoint,
                        error: err.to_string(),
                    });
                }
            }
        }
        Err(SessionError::NoActivePort {
            candidates: self.config.candidates.len(),
        })
    }

    fn obtain_imei(&mut self, endpoint: &SerialEndpoint) -> Result<String, SessionError> {
        let response = self.command(endpoint, AtCommand::QueryImei)?;
        let imei = parse_imei(&response).ok_or(SessionError::ImeiNotFound)?;
        self.events
            .emit(&SessionEvent::ImeiFound { imei: imei.clone() });
        Ok(imei)
    }

    fn validate_imei(&mut self, imei: &str) -> Result<Imei, SessionError> {
        let valid = digits_of(imei)
            .map(|digits| is_valid_checksum(&digits))
            .unwrap_or(false);
        self.events.emit(&SessionEvent::ChecksumChecked {
            imei: imei.to_string(),
            valid,
        });
        Imei::parse(imei).map_err(|_| SessionError::InvalidChecksum {
            imei: imei.to_string(),
        })
    }

    fn query_status(
        &mut self,
        endpoint: &SerialEndpoint,
        check: StatusCheck,
    ) -> Result<LockStatus, SessionError> {
        let response = self.command(endpoint, AtCommand::QueryCardLock)?;
        let status = parse_lock_status(&response);
        self.events
            .emit(&SessionEvent::StatusSnapshot { check, status });
        Ok(status)
    }

    fn send_code(&mut self, endpoint: &SerialEndpoint, code: UnlockCode) -> Result<(), SessionError> {
        let response = self.command(endpoint, AtCommand::ApplyUnlockCode(code))?;
        debug!(bytes = response.len(), "unlock command answered");
        self.events.emit(&SessionEvent::UnlockCodeSent {
            endpoint: endpoint.clone(),
        });
        Ok(())
    }

    fn verify(&mut self, endpoint: &SerialEndpoint) -> Result<Outcome, SessionError> {
        wait(self.config.verify_delay);
        let status = self.query_status(endpoint, StatusCheck::Verification)?;
        match status.state {
            LockState::Unlocked => Ok(Outcome::Success),
            LockState::Unknown => Err(SessionError::StatusUnobtainable),
            state => Err(SessionError::UnlockRejected { state }),
        }
    }

    fn command(
        &mut self,
        endpoint: &SerialEndpoint,
        command: AtCommand,
    ) -> Result<Vec<u8>, SessionError> {
        self.transport
            .transact(
                endpoint,
                Some(command.to_bytes().as_slice()),
                self.config.settle,
                self.config.read_budget,
            )
            .map_err(|err| SessionError::io(endpoint, err))
    }
}

fn wait(delay: Duration) {
    if !delay.is_zero() {
        std::thread::sleep(delay);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finished_event_carries_failure_reason() {
        let outcome = Outcome::Failure(SessionError::StatusUnobtainable);
        match outcome.finished_event() {
            SessionEvent::Finished {
                outcome,
                error_kind,
                reason,
            } => {
                assert_eq!(outcome, OutcomeKind::Failure);
                assert_eq!(error_kind, Some(crate::error::ErrorKind::UnsafeState));
                assert!(reason.unwrap().contains("dangerous"));
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn abort_is_not_a_failure() {
        assert!(!Outcome::Aborted.is_failure());
        assert_eq!(Outcome::Aborted.kind(), OutcomeKind::Aborted);
        assert_eq!(
            Outcome::AlreadyUnlocked.finished_event(),
            SessionEvent::Finished {
                outcome: OutcomeKind::AlreadyUnlocked,
                error_kind: None,
                reason: None,
            }
        );
    }
}
