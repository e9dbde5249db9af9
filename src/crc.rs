//! Modbus CRC-16
//!
//! Polynomial 0xA001 (reflected 0x8005), seed 0xFFFF. The checksum travels
//! little-endian, low byte first, right after the frame data.

use ::crc::{Crc, CRC_16_MODBUS};

use crate::constants::CRC_LEN;

/// CRC calculator for RTU frames
const CRC_MODBUS: Crc<u16> = Crc::<u16>::new(&CRC_16_MODBUS);

/// Compute the Modbus CRC over `data`
#[inline]
pub fn crc16(data: &[u8]) -> u16 {
    CRC_MODBUS.checksum(data)
}

/// CRC bytes in wire order
#[inline]
pub fn crc_bytes(data: &[u8]) -> [u8; CRC_LEN] {
    crc16(data).to_le_bytes()
}

/// Read the trailing CRC of a frame, `None` if the frame is too short to hold one
#[inline]
pub fn trailing_crc(frame: &[u8]) -> Option<u16> {
    let split = frame.len().checked_sub(CRC_LEN)?;
    Some(u16::from_le_bytes([frame[split], frame[split + 1]]))
}

/// Check that the last two bytes of `frame` are the CRC of everything before them
pub fn verify_crc(frame: &[u8]) -> bool {
    match trailing_crc(frame) {
        Some(received) => crc16(&frame[..frame.len() - CRC_LEN]) == received,
        None => false,
    }
}

/// Append the CRC of `frame` in wire order
pub fn append_crc(frame: &mut Vec<u8>) {
    let crc = crc_bytes(frame);
    frame.extend_from_slice(&crc);
}
