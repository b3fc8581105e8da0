//! # Unlock Code Derivation
//!
//! Reproduces the vendor's undocumented `AT^CARDLOCK` code scheme:
//!
//! 1. `md5(lowercase(imei) ++ "5e8dd316726b0335")`
//! 2. Fold the 16-byte digest into 32 bits: byte lane `i` of the result is
//!    `d[i] ^ d[4+i] ^ d[8+i] ^ d[12+i]`, most significant lane first.
//! 3. Keep the low 25 bits and force bit 25 on.
//!
//! MD5 is used only because the firmware uses it. Every constant here must
//! stay bit-for-bit identical or the modem burns an attempt on a wrong code.

use std::fmt;

use md5::{Digest, Md5};
use serde::Serialize;

use crate::imei::Imei;

/// Salt appended to the IMEI before hashing.
pub const UNLOCK_SALT: &str = "5e8dd316726b0335";

const CODE_MASK: u32 = 0x1FF_FFFF;
const CODE_FLAG: u32 = 0x200_0000;

/// Smallest code the derivation can produce.
pub const MIN_CODE: u32 = CODE_FLAG;
/// Largest code the derivation can produce.
pub const MAX_CODE: u32 = CODE_FLAG | CODE_MASK;

/// Derive the unlock code for a 15-digit IMEI string.
///
/// Pure: no I/O, and the same input always yields the same code. The caller
/// is responsible for having validated the IMEI first.
pub fn derive_unlock_code(imei: &str) -> u32 {
    let mut hasher = Md5::new();
    hasher.update(imei.to_lowercase().as_bytes());
    hasher.update(UNLOCK_SALT.as_bytes());
    let digest = hasher.finalize();

    let mut code = 0u32;
    for i in 0..4 {
        let lane = digest[i] ^ digest[4 + i] ^ digest[8 + i] ^ digest[12 + i];
        code += u32::from(lane) << ((3 - i) * 8);
    }

    (code & CODE_MASK) | CODE_FLAG
}

/// A derived unlock code. Recomputed on every run, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct UnlockCode(u32);

impl UnlockCode {
    /// Derive from an IMEI that has already passed its checksum.
    pub fn derive(imei: &Imei) -> Self {
        Self(derive_unlock_code(imei.as_str()))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl fmt::Display for UnlockCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
