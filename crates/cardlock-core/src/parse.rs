//! Response parsers for the two reply grammars the session relies on.
//!
//! Modem replies arrive as whatever bytes were sitting in the buffer after
//! the settle interval: echoed commands, unsolicited `^RSSI`/`^BOOT` lines,
//! half-written tokens and the occasional non-UTF-8 byte. Both parsers scan
//! raw bytes and take the first match only.

use std::sync::LazyLock;

use regex::bytes::{Captures, Regex};

use crate::model::{LockState, LockStatus};

/// An isolated 15-digit token framed by CRLF on both sides.
static IMEI_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\r\n([0-9]{15})\r\n").expect("invalid IMEI regex"));

/// `CARDLOCK: <state>,<remaining>,<carrier>\r`
static CARDLOCK_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"CARDLOCK: ([0-9]),([0-9]{1,2}),([0-9]+)\r").expect("invalid CARDLOCK regex")
});

/// Extract the IMEI from an `AT+CGSN` reply. `None` when absent.
pub fn parse_imei(response: &[u8]) -> Option<String> {
    let caps = IMEI_PATTERN.captures(response)?;
    let digits = caps.get(1)?.as_bytes();
    // [0-9] only matches ASCII, so this cannot fail.
    std::str::from_utf8(digits).ok().map(str::to_owned)
}

/// Extract the lock status from an `AT^CARDLOCK?` reply.
///
/// Anything that does not match yields [`LockStatus::unobtainable`], never
/// an error: the controller treats that as "unsafe to continue".
pub fn parse_lock_status(response: &[u8]) -> LockStatus {
    try_parse_lock_status(response).unwrap_or_default()
}

fn try_parse_lock_status(response: &[u8]) -> Option<LockStatus> {
    let caps = CARDLOCK_PATTERN.captures(response)?;
    let state: u8 = field(&caps, 1)?.parse().ok()?;
    let remaining_attempts: u8 = field(&caps, 2)?.parse().ok()?;
    let carrier_code: u32 = field(&caps, 3)?.parse().ok()?;

    Some(LockStatus {
        state: LockState::from_code(state),
        remaining_attempts,
        carrier_code,
    })
}

fn field<'h>(caps: &Captures<'h>, index: usize) -> Option<&'h str> {
    std::str::from_utf8(caps.get(index)?.as_bytes()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn imei_bare() {
        assert_eq!(
            parse_imei(b"\r\n123456789012345\r\n").as_deref(),
            Some("123456789012345")
        );
    }

    #[test]
    fn imei_with_echo_and_ok() {
        let reply = b"AT+CGSN\r\r\n490154203237518\r\n\r\nOK\r\n";
        assert_eq!(parse_imei(reply).as_deref(), Some("490154203237518"));
    }

    #[test]
    fn imei_amid_unsolicited_noise() {
        let reply = b"\r\n^RSSI:17\r\n\xff\xfe\r\n356938035643809\r\n\r\n^BOOT:1,0,0\r\n";
        assert_eq!(parse_imei(reply).as_deref(), Some("356938035643809"));
    }

    #[test]
    fn imei_first_match_wins() {
        let reply = b"\r\n111111111111111\r\n\r\n222222222222222\r\n";
        assert_eq!(parse_imei(reply).as_deref(), Some("111111111111111"));
    }

    #[test]
    fn imei_not_found() {
        assert_eq!(parse_imei(b""), None);
        assert_eq!(parse_imei(b"\r\nERROR\r\n"), None);
        // 14 and 16 digit runs are not IMEIs.
        assert_eq!(parse_imei(b"\r\n12345678901234\r\n"), None);
        assert_eq!(parse_imei(b"\r\n1234567890123456\r\n"), None);
        // Truncated before the closing CRLF.
        assert_eq!(parse_imei(b"\r\n123456789012345\r"), None);
        // Missing the leading CRLF.
        assert_eq!(parse_imei(b"123456789012345\r\n"), None);
    }

    #[test]
    fn status_basic() {
        let status = parse_lock_status(b"\r\n^CARDLOCK: 1,8,0\r\n\r\nOK\r\n");
        assert_eq!(
            status,
            LockStatus {
                state: LockState::LockedUnlockable,
                remaining_attempts: 8,
                carrier_code: 0,
            }
        );
    }

    #[test]
    fn status_two_digit_remaining_and_long_carrier() {
        let status = parse_lock_status(b"CARDLOCK: 1,10,23410\r");
        assert_eq!(status.state, LockState::LockedUnlockable);
        assert_eq!(status.remaining_attempts, 10);
        assert_eq!(status.carrier_code, 23410);
    }

    #[test]
    fn status_unlocked_and_hard_locked() {
        assert_eq!(
            parse_lock_status(b"CARDLOCK: 2,10,0\r").state,
            LockState::Unlocked
        );
        assert_eq!(
            parse_lock_status(b"CARDLOCK: 3,0,0\r").state,
            LockState::HardLocked
        );
    }

    #[test]
    fn status_first_match_wins() {
        let status = parse_lock_status(b"CARDLOCK: 1,5,0\r\nCARDLOCK: 2,10,0\r\n");
        assert_eq!(status.state, LockState::LockedUnlockable);
        assert_eq!(status.remaining_attempts, 5);
    }

    #[test]
    fn status_malformed_is_unobtainable() {
        for reply in [
            &b""[..],
            b"\r\nERROR\r\n",
            b"CARDLOCK: 1,8,0",
            b"CARDLOCK: x,8,0\r",
            b"CARDLOCK: 1,100,0\r",
            b"CARDLOCK: 1,8,\r",
            b"CARDLOCK:1,8,0\r",
        ] {
            assert_eq!(
                parse_lock_status(reply),
                LockStatus::unobtainable(),
                "{:?}",
                String::from_utf8_lossy(reply)
            );
        }
    }

    #[test]
    fn status_carrier_overflow_is_unobtainable() {
        let status = parse_lock_status(b"CARDLOCK: 1,8,99999999999\r");
        assert_eq!(status, LockStatus::unobtainable());
    }
}
