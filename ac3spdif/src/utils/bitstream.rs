//! Bit cursor over a queue of timestamped packets.
//!
//! [`BitCursor`] is the boundary the frame synchronizer reads through.
//! Packet timestamps are not pushed into the reader through a callback:
//! the cursor records the timestamp of a packet once the first byte of that
//! packet is consumed, and the reader polls it with
//! [`BitCursor::take_timestamp`].
//!
//! Packets may carry a fixed-size header in front of their payload, such as
//! the 3-byte header of DVD private stream AC-3 packets. The cursor strips it
//! before the payload joins the byte stream.

use std::collections::VecDeque;

use log::trace;

use crate::utils::clock::Mtime;
use crate::utils::errors::InputError;
use crate::utils::fifo::{InputState, PacketFifo};

/// Widest value [`BitCursor::read_bits`] returns.
pub const MAX_READ_BITS: u32 = 32;

/// Widest value [`BitCursor::peek_bits`] returns.
pub const MAX_PEEK_BITS: u32 = 64;

/// Pull-based access to the compressed input.
///
/// Every extraction call may block until enough input is available, and
/// returns an [`InputError`] once the input is stopped, failed or exhausted.
pub trait BitCursor {
    /// Reads and consumes `n` bits (`n <= 32`), MSB first.
    fn read_bits(&mut self, n: u32) -> Result<u32, InputError>;

    /// Returns the next `n` bits (`n <= 64`) without consuming them.
    fn peek_bits(&mut self, n: u32) -> Result<u64, InputError>;

    fn skip_bits(&mut self, n: u32) -> Result<(), InputError>;

    /// Fills `dest` with the next `dest.len()` bytes.
    fn read_bytes(&mut self, dest: &mut [u8]) -> Result<(), InputError>;

    /// Timestamp of the most recently entered packet, cleared on read.
    fn take_timestamp(&mut self) -> Option<Mtime>;

    fn state(&self) -> InputState;
}

#[derive(Debug)]
pub struct PacketCursor {
    fifo: PacketFifo,
    bytes: VecDeque<u8>,
    /// Absolute index of `bytes[0]`.
    base: u64,
    /// Absolute index one past the last fetched byte.
    fetched: u64,
    /// Consumed bits since the start of the stream.
    position: u64,
    /// Start offsets of timestamped packets not yet entered.
    boundaries: VecDeque<(u64, Mtime)>,
    pending: Option<Mtime>,
    packet_header_len: usize,
}

impl PacketCursor {
    pub fn new(fifo: PacketFifo) -> Self {
        Self {
            fifo,
            bytes: VecDeque::with_capacity(8 * 1024),
            base: 0,
            fetched: 0,
            position: 0,
            boundaries: VecDeque::new(),
            pending: None,
            packet_header_len: 0,
        }
    }

    /// Skips the first `len` bytes of every packet.
    pub fn with_packet_header_len(mut self, len: usize) -> Self {
        self.packet_header_len = len;
        self
    }

    pub fn fifo(&self) -> &PacketFifo {
        &self.fifo
    }

    /// Bits consumed so far.
    pub fn position(&self) -> u64 {
        self.position
    }

    #[inline(always)]
    fn bit_offset(&self) -> u32 {
        (self.position - (self.base << 3)) as u32
    }

    #[inline(always)]
    fn available(&self) -> u64 {
        ((self.bytes.len() as u64) << 3) - self.bit_offset() as u64
    }

    fn fill(&mut self, bits: u64) -> Result<(), InputError> {
        while self.available() < bits {
            let packet = self.fifo.pop()?;
            let Some(payload) = packet.data.get(self.packet_header_len..) else {
                trace!(
                    "Dropping {}-byte packet shorter than its header",
                    packet.data.len()
                );
                continue;
            };
            if payload.is_empty() {
                continue;
            }

            if let Some(pts) = packet.pts {
                self.boundaries.push_back((self.fetched, pts));
            }
            self.fetched += payload.len() as u64;
            self.bytes.extend(payload);
        }

        Ok(())
    }

    fn consume(&mut self, bits: u64) {
        self.position += bits;

        let done = ((self.position >> 3) - self.base) as usize;
        self.bytes.drain(..done);
        self.base += done as u64;

        while let Some(&(start, pts)) = self.boundaries.front() {
            if self.position <= start << 3 {
                break;
            }
            self.pending = Some(pts);
            self.boundaries.pop_front();
        }
    }

    fn peek_unchecked(&self, n: u32) -> u64 {
        if n == 0 {
            return 0;
        }

        let offset = self.bit_offset();
        let span = (offset + n).div_ceil(8) as usize;
        let window = self
            .bytes
            .iter()
            .take(span)
            .fold(0u128, |acc, &byte| (acc << 8) | byte as u128);

        let shift = span as u32 * 8 - offset - n;
        ((window >> shift) & ((1u128 << n) - 1)) as u64
    }
}

impl BitCursor for PacketCursor {
    fn read_bits(&mut self, n: u32) -> Result<u32, InputError> {
        if n > MAX_READ_BITS {
            return Err(InputError::TooManyBits {
                requested: n,
                max: MAX_READ_BITS,
            });
        }

        self.fill(n as u64)?;
        let value = self.peek_unchecked(n) as u32;
        self.consume(n as u64);

        Ok(value)
    }

    fn peek_bits(&mut self, n: u32) -> Result<u64, InputError> {
        if n > MAX_PEEK_BITS {
            return Err(InputError::TooManyBits {
                requested: n,
                max: MAX_PEEK_BITS,
            });
        }

        self.fill(n as u64)?;
        Ok(self.peek_unchecked(n))
    }

    fn skip_bits(&mut self, n: u32) -> Result<(), InputError> {
        self.fill(n as u64)?;
        self.consume(n as u64);

        Ok(())
    }

    fn read_bytes(&mut self, dest: &mut [u8]) -> Result<(), InputError> {
        if self.bit_offset() != 0 {
            for byte in dest.iter_mut() {
                *byte = self.read_bits(8)? as u8;
            }
            return Ok(());
        }

        let bits = (dest.len() as u64) << 3;
        self.fill(bits)?;
        for (d, s) in dest.iter_mut().zip(self.bytes.iter()) {
            *d = *s;
        }
        self.consume(bits);

        Ok(())
    }

    fn take_timestamp(&mut self) -> Option<Mtime> {
        self.pending.take()
    }

    fn state(&self) -> InputState {
        self.fifo.state()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::fifo::Packet;

    fn cursor_with(packets: Vec<Packet>) -> PacketCursor {
        let fifo = PacketFifo::new(packets.len().max(1));
        for packet in packets {
            fifo.push(packet).unwrap();
        }
        fifo.end_of_stream();
        PacketCursor::new(fifo)
    }

    #[test]
    fn bits_span_packet_boundaries() -> Result<(), InputError> {
        let mut cursor = cursor_with(vec![
            Packet::new(vec![0xAB], None),
            Packet::new(vec![0xCD, 0xEF], None),
        ]);

        assert_eq!(cursor.read_bits(4)?, 0xA);
        assert_eq!(cursor.peek_bits(12)?, 0xBCD);
        assert_eq!(cursor.read_bits(8)?, 0xBC);
        assert_eq!(cursor.position(), 12);

        let mut rest = [0u8; 1];
        cursor.read_bytes(&mut rest)?;
        assert_eq!(rest, [0xDE]);

        cursor.skip_bits(4)?;
        assert_eq!(cursor.read_bits(1), Err(InputError::EndOfStream));
        Ok(())
    }

    #[test]
    fn peek_wide_window() -> Result<(), InputError> {
        let mut cursor = cursor_with(vec![Packet::new(
            vec![0x0B, 0x77, 0x12, 0x34, 0x56, 0x78, 0x9A, 0xBC, 0xDE],
            None,
        )]);

        cursor.skip_bits(8)?;
        assert_eq!(cursor.peek_bits(48)?, 0x7712_3456_789A);
        cursor.skip_bits(3)?;
        assert_eq!(
            cursor.peek_bits(56)?,
            (0b10111 << 51) | (0x1234_5678_9ABC << 3) | 0b110
        );
        assert_eq!(cursor.peek_bits(64), Err(InputError::EndOfStream));
        assert_eq!(
            cursor.peek_bits(65),
            Err(InputError::TooManyBits {
                requested: 65,
                max: MAX_PEEK_BITS
            })
        );
        Ok(())
    }

    #[test]
    fn timestamp_surfaces_when_packet_is_entered() -> Result<(), InputError> {
        let mut cursor = cursor_with(vec![
            Packet::new(vec![1, 2], Some(100)),
            Packet::new(vec![3, 4], Some(200)),
        ]);

        // Peeking into the second packet does not enter it.
        assert_eq!(cursor.peek_bits(24)?, 0x010203);
        assert_eq!(cursor.take_timestamp(), None);

        cursor.read_bits(8)?;
        assert_eq!(cursor.take_timestamp(), Some(100));
        assert_eq!(cursor.take_timestamp(), None);

        cursor.read_bits(8)?;
        assert_eq!(cursor.take_timestamp(), None);

        cursor.read_bits(1)?;
        assert_eq!(cursor.take_timestamp(), Some(200));
        Ok(())
    }

    #[test]
    fn unaligned_read_bytes() -> Result<(), InputError> {
        let mut cursor = cursor_with(vec![Packet::new(vec![0x0F, 0xF0, 0x0F], None)]);

        cursor.skip_bits(4)?;
        let mut out = [0u8; 2];
        cursor.read_bytes(&mut out)?;
        assert_eq!(out, [0xFF, 0x00]);
        assert_eq!(cursor.read_bits(4)?, 0xF);
        Ok(())
    }

    #[test]
    fn strips_packet_headers() -> Result<(), InputError> {
        let fifo = PacketFifo::new(4);
        fifo.push(Packet::new(vec![0x80, 0x01, 0x00, 0xAA, 0xBB], Some(10)))?;
        fifo.push(Packet::new(vec![0x80, 0x01], Some(20)))?;
        fifo.push(Packet::new(vec![0x80, 0x01, 0x00, 0xCC], Some(30)))?;
        fifo.end_of_stream();
        let mut cursor = PacketCursor::new(fifo).with_packet_header_len(3);

        assert_eq!(cursor.read_bits(16)?, 0xAABB);
        assert_eq!(cursor.take_timestamp(), Some(10));
        assert_eq!(cursor.read_bits(8)?, 0xCC);
        assert_eq!(cursor.take_timestamp(), Some(30));
        assert_eq!(cursor.read_bits(1), Err(InputError::EndOfStream));
        Ok(())
    }

    #[test]
    fn stop_interrupts_reads() {
        let fifo = PacketFifo::new(1);
        let mut cursor = PacketCursor::new(fifo.clone());
        fifo.stop();

        assert_eq!(cursor.read_bits(8), Err(InputError::Stopped));
        assert_eq!(cursor.state(), InputState::Stopped);
    }
}
