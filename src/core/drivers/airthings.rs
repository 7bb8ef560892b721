//! Airthings Wave "current values" payload.
//!
//! | bytes  | field                  | scale   |
//! |--------|------------------------|---------|
//! | 1      | humidity               | / 2     |
//! | 4..6   | radon, short term      | 1       |
//! | 6..8   | radon, long term       | 1       |
//! | 8..10  | temperature            | / 100   |
//! | 10..12 | pressure (hPa)         | / 50    |
//!
//! Multi-byte fields are little-endian u16.
//!
//! Humidity is halved in floating point, so an odd raw byte keeps its half
//! percent (`91` decodes to `45.5`, not `45`). Only radon values are published,
//! so this never reaches the broker.

use super::DriverError;
use crate::core::snapshot::AirQualitySnapshot;

pub const PAYLOAD_LEN: usize = 12;

fn le_u16(bytes: &[u8], at: usize) -> f32 {
    f32::from(u16::from_le_bytes([bytes[at], bytes[at + 1]]))
}

pub fn decode(bytes: &[u8]) -> Result<AirQualitySnapshot, DriverError> {
    if bytes.len() < PAYLOAD_LEN {
        return Err(DriverError::ShortPayload {
            expected: PAYLOAD_LEN,
            actual: bytes.len(),
        });
    }

    Ok(AirQualitySnapshot {
        humidity: f32::from(bytes[1]) / 2.0,
        radon_short: le_u16(bytes, 4),
        radon_long: le_u16(bytes, 6),
        temperature: le_u16(bytes, 8) / 100.0,
        pressure: le_u16(bytes, 10) / 50.0,
    })
}
