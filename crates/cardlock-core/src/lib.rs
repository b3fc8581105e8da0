//! Modem dialogue engine for removing the SIM lock on Huawei USB modems.
//!
//! This crate contains:
//! - **IMEI validation**: Luhn check digit over the 15-digit identifier
//! - **Unlock code derivation**: the vendor's salted-MD5 fold into a 26-bit code
//! - **AT commands**: `AT+CGSN`, `AT^CARDLOCK?`, `AT^CARDLOCK="<code>"`
//! - **Response parsers**: IMEI and `CARDLOCK:` status extraction from noisy buffers
//! - **Serial executor**: one scoped open/write/settle/read/close transaction per call
//! - **Session controller**: the gated state machine that drives the unlock
//!
//! Console prompts, output formatting and exit codes live in `cardlock-cli`.

pub mod at;
pub mod code;
pub mod config;
pub mod error;
pub mod events;
pub mod imei;
pub mod model;
pub mod parse;
pub mod serial;
pub mod session;

pub use code::{UnlockCode, derive_unlock_code};
pub use config::UnlockConfig;
pub use error::{ErrorKind, SessionError};
pub use events::{EventSink, SessionEvent};
pub use imei::{Imei, is_valid_checksum};
pub use model::{LockState, LockStatus, SerialEndpoint};
pub use serial::{SerialPortTransport, Transport, TransportError};
pub use session::{Controller, Operator, Outcome, Session, UnlockPrompt};
