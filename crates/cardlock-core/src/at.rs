//! AT commands spoken to the modem's control port.
//!
//! Commands are rendered without a line terminator; the serial executor
//! appends `\r\n` when it writes them.

use std::fmt;

use crate::code::UnlockCode;

/// Line terminator appended to every command on the wire.
pub const TERMINATOR: &[u8] = b"\r\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AtCommand {
    /// `AT+CGSN`: product serial number (the IMEI).
    QueryImei,
    /// `AT^CARDLOCK?`: SIM lock state and remaining attempts.
    QueryCardLock,
    /// `AT^CARDLOCK="<code>"`: submit an unlock code. Consumes an attempt.
    ApplyUnlockCode(UnlockCode),
}

impl AtCommand {
    pub fn to_bytes(&self) -> Vec<u8> {
        self.to_string().into_bytes()
    }

    /// Whether sending this command can change the lock state.
    pub fn is_destructive(&self) -> bool {
        matches!(self, AtCommand::ApplyUnlockCode(_))
    }
}

impl fmt::Display for AtCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AtCommand::QueryImei => f.write_str("AT+CGSN"),
            AtCommand::QueryCardLock => f.write_str("AT^CARDLOCK?"),
            AtCommand::ApplyUnlockCode(code) => write!(f, "AT^CARDLOCK=\"{code}\""),
        }
    }
}
