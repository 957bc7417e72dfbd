//! Certificate serial numbers.

use rand::TryRngCore;
use rand::rngs::OsRng;
use x509_cert::serial_number::SerialNumber;

use crate::error::{KeyweaverError, Result};

/// Number of random bytes in a serial, giving values uniform in `[0, 2^128)`.
pub const SERIAL_NUMBER_BYTES: usize = 16;

/// Draws a fresh serial number from the operating system's RNG.
///
/// The bytes are a big-endian unsigned integer; the DER encoder adds a
/// leading zero when the top bit is set so the value stays non-negative.
/// A failing RNG is reported as [`KeyweaverError::EntropyFailure`] and is
/// never retried.
pub fn generate_serial_number() -> Result<SerialNumber> {
    let mut bytes = [0u8; SERIAL_NUMBER_BYTES];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| KeyweaverError::EntropyFailure(e.to_string()))?;

    SerialNumber::new(&bytes).map_err(|e| KeyweaverError::EncodingFailure(e.to_string()))
}

/// Formats a serial number as lowercase hex, as shown in logs and reports.
pub fn serial_to_hex(serial: &SerialNumber) -> String {
    serial
        .as_bytes()
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect()
}
