//! IMEI handling: digit extraction and the Luhn check digit.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Number of digits in an IMEI (14 body digits + 1 check digit).
pub const IMEI_LEN: usize = 15;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImeiError {
    #[error("IMEI must be {IMEI_LEN} digits, got {0}")]
    Length(usize),
    #[error("IMEI contains non-digit character {0:?}")]
    NonDigit(char),
    #[error("IMEI checksum invalid: {0}")]
    Checksum(String),
}

/// Luhn check over `digits`, least significant digit last.
///
/// Every second digit counted from the right is doubled, with 9 subtracted
/// when the product exceeds 9. Valid iff the total is a multiple of 10.
///
/// # Panics
///
/// If any element is greater than 9. Digits only ever come from a
/// `[0-9]`-constrained extraction, so that is a caller bug.
pub fn is_valid_checksum(digits: &[u8]) -> bool {
    luhn_sum(digits, false) % 10 == 0
}

/// Check digit that completes a 14-digit IMEI body.
pub fn luhn_check_digit(body: &[u8]) -> u8 {
    // The check digit sits in the undoubled position, so the body is
    // summed as if it were already shifted one place left.
    let sum = luhn_sum(body, true);
    ((10 - sum % 10) % 10) as u8
}

fn luhn_sum(digits: &[u8], start_doubled: bool) -> u32 {
    let mut sum = 0u32;
    let mut alt = start_doubled;
    for &d in digits.iter().rev() {
        assert!(d <= 9, "checksum digit out of range: {d}");
        let mut d = u32::from(d);
        if alt {
            d *= 2;
        }
        if d > 9 {
            d -= 9;
        }
        sum += d;
        alt = !alt;
    }
    sum
}

/// A 15-digit IMEI whose check digit has been verified.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Imei(String);

impl Imei {
    /// Validate shape and checksum.
    pub fn parse(s: &str) -> Result<Self, ImeiError> {
        let digits = digits_of(s)?;
        if !is_valid_checksum(&digits) {
            return Err(ImeiError::Checksum(s.to_string()));
        }
        Ok(Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn digits(&self) -> [u8; IMEI_LEN] {
        let mut out = [0u8; IMEI_LEN];
        for (slot, b) in out.iter_mut().zip(self.0.bytes()) {
            *slot = b - b'0';
        }
        out
    }
}

impl fmt::Display for Imei {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Split a candidate IMEI into digit values without checking the checksum.
pub fn digits_of(s: &str) -> Result<[u8; IMEI_LEN], ImeiError> {
    let count = s.chars().count();
    if count != IMEI_LEN {
        return Err(ImeiError::Length(count));
    }
    let mut out = [0u8; IMEI_LEN];
    for (slot, c) in out.iter_mut().zip(s.chars()) {
        let d = c.to_digit(10).ok_or(ImeiError::NonDigit(c))?;
        *slot = d as u8;
    }
    Ok(out)
}
