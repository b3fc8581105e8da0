//! Console rendering: JSON event lines and human-readable summaries.

use std::io::{self, Write};

use cardlock_core::error::ErrorKind;
use cardlock_core::events::{EventSink, SessionEvent};
use cardlock_core::{LockState, Outcome, Session};

/// Writes each event as one JSON object per line.
pub struct JsonSink<W> {
    out: W,
}

impl JsonSink<io::Stdout> {
    pub fn stdout() -> Self {
        Self { out: io::stdout() }
    }
}

impl<W: Write> JsonSink<W> {
    #[cfg(test)]
    fn new(out: W) -> Self {
        Self { out }
    }

    fn write_line(&mut self, event: &SessionEvent) -> io::Result<()> {
        serde_json::to_writer(&mut self.out, event)?;
        self.out.write_all(b"\n")?;
        self.out.flush()
    }
}

impl<W: Write> EventSink for JsonSink<W> {
    fn emit(&mut self, event: &SessionEvent) {
        if let Err(e) = self.write_line(event) {
            tracing::warn!(error = %e, "failed to write JSON event");
        }
    }
}

/// Final line for a completed unlock run.
pub fn outcome(outcome: &Outcome) {
    println!("{}", outcome_line(outcome));
}

fn outcome_line(outcome: &Outcome) -> String {
    match outcome {
        Outcome::Success => "Modem unlocked successfully.".to_string(),
        Outcome::AlreadyUnlocked => "The modem is already unlocked for this SIM.".to_string(),
        Outcome::Aborted => "Aborted. No unlock code was sent.".to_string(),
        Outcome::Failure(err) => match err.kind() {
            ErrorKind::HardLock => format!("{err}. This program cannot help you."),
            _ => format!("Failed: {err}"),
        },
    }
}

/// Print a status snapshot from `cardlock status`.
pub fn session(session: &Session, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string(session)?);
        return Ok(());
    }
    println!("Port:      {}", session.endpoint);
    println!("IMEI:      {}", session.imei);
    println!("Lock:      {}", session.status.state);
    if session.status.state == LockState::LockedUnlockable {
        println!("Remaining: {}", session.status.remaining_attempts);
    }
    println!("Carrier:   {}", session.status.carrier_code);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cardlock_core::SessionError;

    #[test]
    fn json_sink_writes_one_line_per_event() {
        let mut sink = JsonSink::new(Vec::new());
        sink.emit(&SessionEvent::ImeiFound {
            imei: "490154203237518".into(),
        });
        sink.emit(&SessionEvent::ChecksumChecked {
            imei: "490154203237518".into(),
            valid: true,
        });

        let text = String::from_utf8(sink.out).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(
            lines[0],
            r#"{"event":"imei_found","imei":"490154203237518"}"#
        );
        assert!(lines[1].contains(r#""valid":true"#));
    }

    #[test]
    fn hard_lock_summary_says_cannot_help() {
        let line = outcome_line(&Outcome::Failure(SessionError::HardLocked));
        assert!(line.contains("cannot help"));
        let line = outcome_line(&Outcome::Aborted);
        assert!(line.contains("No unlock code was sent"));
    }
}
