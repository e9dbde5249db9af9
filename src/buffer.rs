//! Fixed-capacity request and response buffers
//!
//! Both buffers live inline in the engine on a `heapless::Vec` sized for the
//! largest RTU ADU, with a runtime capacity that may be configured lower.
//! Every indexed access is bounds checked; nothing here panics on bad offsets.

use heapless::Vec;

use crate::constants::*;
use crate::crc::crc_bytes;
use crate::error::ModbusResult;
use crate::transport::Transport;

/// Incoming frame being accumulated from the transport
#[derive(Debug, Clone)]
pub struct RequestBuffer {
    data: Vec<u8, MAX_ADU_SIZE>,
    capacity: usize,
    reading: bool,
}

impl RequestBuffer {
    /// Create an empty buffer holding at most `capacity` bytes
    pub fn new(capacity: usize) -> Self {
        Self {
            data: Vec::new(),
            capacity: capacity.clamp(MIN_FRAME_SIZE, MAX_ADU_SIZE),
            reading: false,
        }
    }

    /// Clear the buffer and start accumulating a new frame
    pub fn start(&mut self) {
        self.data.clear();
        self.reading = true;
    }

    /// Stop accumulating, keeping what has been buffered
    pub fn stop(&mut self) {
        self.reading = false;
    }

    #[inline]
    pub fn is_reading(&self) -> bool {
        self.reading
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Free space left before the buffer is full
    #[inline]
    pub fn remaining(&self) -> usize {
        self.capacity.saturating_sub(self.data.len())
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.remaining() == 0
    }

    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Read up to `max` bytes from the transport into the free space
    ///
    /// Returns the number of bytes actually read.
    pub fn fill_from<T: Transport + ?Sized>(
        &mut self,
        transport: &mut T,
        max: usize,
    ) -> ModbusResult<usize> {
        let start = self.data.len();
        let count = max.min(self.remaining());
        if count == 0 {
            return Ok(0);
        }

        // `count` never exceeds the free space, so the resize cannot fail
        if self.data.resize(start + count, 0).is_err() {
            return Ok(0);
        }
        let read = transport.read_into(&mut self.data[start..start + count]);
        let read = match read {
            Ok(read) => read.min(count),
            Err(e) => {
                self.data.truncate(start);
                return Err(e);
            }
        };
        self.data.truncate(start + read);
        Ok(read)
    }

    /// Append bytes directly, returning how many fit
    pub fn extend_from_slice(&mut self, bytes: &[u8]) -> usize {
        let count = bytes.len().min(self.remaining());
        // `count` never exceeds the free space
        let _ = self.data.extend_from_slice(&bytes[..count]);
        count
    }

    /// Shorten the logical frame length
    pub fn truncate(&mut self, len: usize) {
        self.data.truncate(len);
    }

    /// Byte at `index`
    #[inline]
    pub fn byte(&self, index: usize) -> Option<u8> {
        self.data.get(index).copied()
    }

    /// Big-endian word starting at `index`
    #[inline]
    pub fn read_u16(&self, index: usize) -> Option<u16> {
        let hi = self.byte(index)?;
        let lo = self.byte(index + 1)?;
        Some(u16::from_be_bytes([hi, lo]))
    }

    /// Unit address, once at least one byte has arrived
    #[inline]
    pub fn address(&self) -> Option<u8> {
        self.byte(ADDRESS_INDEX)
    }

    /// Raw function code, once at least two bytes have arrived
    #[inline]
    pub fn function_code(&self) -> Option<u8> {
        self.byte(FUNCTION_CODE_INDEX)
    }

    /// True when a frame of at least the minimum size is buffered and no longer growing
    #[inline]
    pub fn is_complete(&self) -> bool {
        !self.reading && self.data.len() >= MIN_FRAME_SIZE
    }

    /// End of the data region, excluding the trailing CRC
    #[inline]
    pub fn payload_end(&self) -> usize {
        self.data.len().saturating_sub(CRC_LEN)
    }
}

/// Outgoing frame and its transmission progress
///
/// The length always includes the two CRC bytes; the CRC itself is written
/// by [`ResponseBuffer::seal`] right before the first byte goes out.
#[derive(Debug, Clone)]
pub struct ResponseBuffer {
    data: Vec<u8, MAX_ADU_SIZE>,
    capacity: usize,
    cursor: usize,
    writing: bool,
    sealed: bool,
}

impl ResponseBuffer {
    /// Create an empty buffer holding at most `capacity` bytes
    pub fn new(capacity: usize) -> Self {
        Self {
            data: Vec::new(),
            capacity: capacity.clamp(MIN_FRAME_SIZE, MAX_ADU_SIZE),
            cursor: 0,
            writing: false,
            sealed: false,
        }
    }

    /// Start a fresh response echoing the request's address and function code
    pub fn begin(&mut self, address: u8, function_code: u8) {
        self.reset();
        // MIN_FRAME_SIZE always fits
        let _ = self.data.resize(MIN_FRAME_SIZE, 0);
        self.data[ADDRESS_INDEX] = address;
        self.data[FUNCTION_CODE_INDEX] = function_code;
    }

    /// Grow the response by `count` zeroed data bytes, placed before the CRC slot
    ///
    /// Returns `false` if the response would exceed the buffer capacity.
    pub fn reserve(&mut self, count: usize) -> bool {
        let len = self.data.len() + count;
        if len > self.capacity {
            return false;
        }
        self.data.resize(len, 0).is_ok()
    }

    /// Turn the response into an exception frame carrying `code`
    pub fn set_exception(&mut self, code: u8) {
        self.cursor = 0;
        self.sealed = false;
        self.data.truncate(MIN_FRAME_SIZE);
        // MIN_FRAME_SIZE + 1 always fits
        let _ = self.data.resize(MIN_FRAME_SIZE + 1, 0);
        self.data[FUNCTION_CODE_INDEX] |= EXCEPTION_FLAG;
        self.data[DATA_INDEX] = code;
    }

    /// Write the CRC into the last two bytes
    pub fn seal(&mut self) {
        let end = self.payload_end();
        let crc = crc_bytes(&self.data[..end]);
        self.data[end..].copy_from_slice(&crc);
        self.sealed = true;
    }

    /// Clear all transmit state
    pub fn reset(&mut self) {
        self.data.clear();
        self.cursor = 0;
        self.writing = false;
        self.sealed = false;
    }

    /// Byte at `index`, CRC slot included
    #[inline]
    pub fn byte(&self, index: usize) -> Option<u8> {
        self.data.get(index).copied()
    }

    /// Overwrite the byte at `index` if it lies in the data region
    pub fn set_byte(&mut self, index: usize, value: u8) -> bool {
        if index >= self.payload_end() {
            return false;
        }
        self.data[index] = value;
        true
    }

    /// Set or clear one bit of the byte at `index` if it lies in the data region
    pub fn set_bit(&mut self, index: usize, bit: u8, state: bool) -> bool {
        if index >= self.payload_end() || bit > 7 {
            return false;
        }
        if state {
            self.data[index] |= 1 << bit;
        } else {
            self.data[index] &= !(1 << bit);
        }
        true
    }

    /// Write a big-endian word at `index` if both bytes lie in the data region
    pub fn set_u16(&mut self, index: usize, value: u16) -> bool {
        if index + 2 > self.payload_end() {
            return false;
        }
        self.data[index..index + 2].copy_from_slice(&value.to_be_bytes());
        true
    }

    /// Copy `bytes` to `index` if they fit in the data region
    pub fn copy_from(&mut self, index: usize, bytes: &[u8]) -> bool {
        if index + bytes.len() > self.payload_end() {
            return false;
        }
        self.data[index..index + bytes.len()].copy_from_slice(bytes);
        true
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// End of the data region, excluding the CRC slot
    #[inline]
    pub fn payload_end(&self) -> usize {
        self.data.len().saturating_sub(CRC_LEN)
    }

    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Bytes not yet handed to the transport
    #[inline]
    pub fn pending(&self) -> &[u8] {
        &self.data[self.cursor.min(self.data.len())..]
    }

    /// Mark `count` more bytes as sent
    #[inline]
    pub fn advance(&mut self, count: usize) {
        self.cursor = (self.cursor + count).min(self.data.len());
    }

    #[inline]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    #[inline]
    pub fn is_writing(&self) -> bool {
        self.writing
    }

    #[inline]
    pub fn set_writing(&mut self, writing: bool) {
        self.writing = writing;
    }

    /// True once the CRC has been appended for the current response
    #[inline]
    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    /// True when every byte has been handed to the transport
    #[inline]
    pub fn is_sent(&self) -> bool {
        self.cursor >= self.data.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crc::verify_crc;
    use crate::testing::MemoryTransport;

    #[test]
    fn test_request_buffer_basic_operations() {
        let mut buffer = RequestBuffer::new(MAX_ADU_SIZE);
        assert!(buffer.is_empty());
        assert!(!buffer.is_reading());

        buffer.start();
        assert_eq!(buffer.extend_from_slice(&[0x11, 0x03, 0x00, 0x6B]), 4);
        assert_eq!(buffer.address(), Some(0x11));
        assert_eq!(buffer.function_code(), Some(0x03));
        assert_eq!(buffer.read_u16(2), Some(0x006B));
        assert_eq!(buffer.read_u16(3), None);

        // Still reading, so not complete
        assert!(!buffer.is_complete());
        buffer.stop();
        assert!(buffer.is_complete());
    }

    #[test]
    fn test_request_buffer_capacity() {
        let mut buffer = RequestBuffer::new(8);
        buffer.start();
        assert_eq!(buffer.extend_from_slice(&[0u8; 12]), 8);
        assert!(buffer.is_full());
        assert_eq!(buffer.remaining(), 0);

        // Capacity is clamped to the protocol limits
        assert_eq!(RequestBuffer::new(1).capacity(), MIN_FRAME_SIZE);
        assert_eq!(RequestBuffer::new(4096).capacity(), MAX_ADU_SIZE);
    }

    #[test]
    fn test_request_buffer_fill_from_transport() {
        let mut wire = MemoryTransport::new();
        wire.push_rx(&[1, 2, 3, 4, 5, 6]);

        let mut buffer = RequestBuffer::new(5);
        buffer.start();
        assert_eq!(buffer.fill_from(&mut wire, 3).unwrap(), 3);
        assert_eq!(buffer.fill_from(&mut wire, 10).unwrap(), 2);
        assert_eq!(buffer.fill_from(&mut wire, 10).unwrap(), 0);
        assert_eq!(buffer.as_slice(), &[1, 2, 3, 4, 5]);
        assert_eq!(wire.rx_len(), 1);
    }

    #[test]
    fn test_start_clears_previous_frame() {
        let mut buffer = RequestBuffer::new(MAX_ADU_SIZE);
        buffer.start();
        buffer.extend_from_slice(&[1, 2, 3, 4, 5]);
        buffer.stop();
        buffer.start();
        assert!(buffer.is_empty());
        assert!(buffer.is_reading());
    }

    #[test]
    fn test_response_reserve_and_seal() {
        let mut response = ResponseBuffer::new(MAX_ADU_SIZE);
        response.begin(0x11, 0x03);
        assert_eq!(response.len(), MIN_FRAME_SIZE);

        assert!(response.reserve(5));
        assert!(response.set_byte(2, 4));
        assert!(response.set_u16(3, 0x1234));
        assert!(response.set_u16(5, 0x5678));
        // Would overlap the CRC slot
        assert!(!response.set_u16(6, 0xFFFF));
        assert!(!response.set_byte(7, 0xFF));

        response.seal();
        assert!(response.is_sealed());
        assert_eq!(&response.as_slice()[..7], &[0x11, 0x03, 0x04, 0x12, 0x34, 0x56, 0x78]);
        assert!(verify_crc(response.as_slice()));
    }

    #[test]
    fn test_response_reserve_respects_capacity() {
        let mut response = ResponseBuffer::new(10);
        response.begin(0x01, 0x03);
        assert!(response.reserve(6));
        assert!(!response.reserve(1));
        assert_eq!(response.len(), 10);
    }

    #[test]
    fn test_response_exception() {
        let mut response = ResponseBuffer::new(MAX_ADU_SIZE);
        response.begin(0x0A, 0x03);
        response.reserve(9);
        response.set_exception(0x02);
        response.seal();

        assert_eq!(response.len(), 5);
        assert_eq!(&response.as_slice()[..3], &[0x0A, 0x83, 0x02]);
        assert!(verify_crc(response.as_slice()));
    }

    #[test]
    fn test_response_bits() {
        let mut response = ResponseBuffer::new(MAX_ADU_SIZE);
        response.begin(0x01, 0x01);
        response.reserve(2);
        assert!(response.set_bit(3, 0, true));
        assert!(response.set_bit(3, 7, true));
        assert!(response.set_bit(3, 0, false));
        assert!(!response.set_bit(3, 8, true));
        assert!(!response.set_bit(4, 0, true));
        assert_eq!(response.byte(3), Some(0x80));
    }

    #[test]
    fn test_response_cursor() {
        let mut response = ResponseBuffer::new(MAX_ADU_SIZE);
        response.begin(0x01, 0x07);
        response.reserve(1);
        assert_eq!(response.pending().len(), 5);

        response.advance(3);
        assert_eq!(response.pending().len(), 2);
        assert!(!response.is_sent());

        response.advance(10);
        assert!(response.is_sent());
        assert_eq!(response.cursor(), 5);

        response.reset();
        assert!(response.is_empty());
        assert_eq!(response.cursor(), 0);
    }
}
