//! Data model shared by the parsers, the executor and the controller.

use std::fmt;

use serde::{Deserialize, Serialize};

// ── Serial Endpoint ─────────────────────────────────────────────────

/// A candidate serial device, e.g. `/dev/ttyUSB2` or `COM4`.
///
/// Endpoints are enumerated outside the core and tried in the order given.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SerialEndpoint(String);

impl SerialEndpoint {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn path(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SerialEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SerialEndpoint {
    fn from(path: &str) -> Self {
        Self::new(path)
    }
}

impl From<String> for SerialEndpoint {
    fn from(path: String) -> Self {
        Self(path)
    }
}

// ── Lock State ──────────────────────────────────────────────────────

/// SIM lock state as reported in the first field of `^CARDLOCK:`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockState {
    /// Status could not be obtained. Nothing may be sent in this state.
    #[default]
    Unknown = 0,
    /// Locked to a carrier, but an unlock code will be accepted.
    LockedUnlockable = 1,
    /// Already unlocked for the inserted SIM.
    Unlocked = 2,
    /// Attempt budget exhausted. Terminal.
    HardLocked = 3,
}

impl LockState {
    /// Map the modem's numeric state. Codes outside `0..=3` read as `Unknown`.
    pub fn from_code(code: u8) -> Self {
        match code {
            1 => LockState::LockedUnlockable,
            2 => LockState::Unlocked,
            3 => LockState::HardLocked,
            _ => LockState::Unknown,
        }
    }

    pub fn code(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for LockState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockState::Unknown => write!(f, "unknown"),
            LockState::LockedUnlockable => write!(f, "locked (unlockable)"),
            LockState::Unlocked => write!(f, "unlocked"),
            LockState::HardLocked => write!(f, "hard locked"),
        }
    }
}

// ── Lock Status ─────────────────────────────────────────────────────

/// One `^CARDLOCK:` snapshot.
///
/// The default value (`Unknown`, 0, 0) doubles as "unobtainable".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockStatus {
    pub state: LockState,
    /// Unlock attempts left before the modem hard-locks itself.
    pub remaining_attempts: u8,
    /// Opaque carrier field. Diagnostic only, never a control input.
    pub carrier_code: u32,
}

impl LockStatus {
    /// The status used when the modem's reply could not be parsed.
    pub fn unobtainable() -> Self {
        Self::default()
    }

    pub fn is_terminal(&self) -> bool {
        self.state == LockState::HardLocked
    }
}

impl fmt::Display for LockStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} attempts remaining, carrier {})",
            self.state, self.remaining_attempts, self.carrier_code
        )
    }
}
