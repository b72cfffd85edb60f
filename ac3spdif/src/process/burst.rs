//! IEC 61937 burst encoding for AC-3.
//!
//! ## Burst Layout
//!
//! One burst occupies the S/PDIF period of one syncframe: 1536 stereo
//! 16-bit samples, 6144 bytes. It starts with four 16-bit preamble words,
//! followed by the syncframe and zero padding:
//!
//! | word | value                    |
//! |------|--------------------------|
//! | `Pa` | `0xF872`                 |
//! | `Pb` | `0x4E1F`                 |
//! | `Pc` | `bsmod << 8 \| 0x01`     |
//! | `Pd` | payload length in bits   |

use crate::structs::syncinfo::{MAX_FRAME_SIZE, StreamDescriptor};

/// Bytes in one burst period.
pub const SPDIF_FRAME_SIZE: usize = 6144;

/// Bytes taken by `Pa` to `Pd`.
pub const BURST_HEADER_SIZE: usize = 8;

// Every valid syncframe fits behind the preamble.
const _: () = assert!(MAX_FRAME_SIZE <= SPDIF_FRAME_SIZE - BURST_HEADER_SIZE);

pub const PREAMBLE_PA: u16 = 0xF872;
pub const PREAMBLE_PB: u16 = 0x4E1F;

/// IEC 61937 data type of AC-3 bursts.
pub const DATA_TYPE_AC3: u16 = 0x01;

/// Byte order of the 16-bit words in a burst.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum WordOrder {
    /// Words as transmitted; the payload matches the syncframe byte for byte.
    #[default]
    Big,
    /// Every word byte-swapped, as little-endian S16 devices expect.
    Little,
}

#[derive(Debug, Clone, Copy)]
pub struct BurstEncoder {
    word_order: WordOrder,
    slot_size: usize,
}

impl Default for BurstEncoder {
    fn default() -> Self {
        Self::new(WordOrder::Big, SPDIF_FRAME_SIZE)
    }
}

impl BurstEncoder {
    pub fn new(word_order: WordOrder, slot_size: usize) -> Self {
        Self {
            word_order,
            slot_size,
        }
    }

    pub fn word_order(&self) -> WordOrder {
        self.word_order
    }

    pub fn slot_size(&self) -> usize {
        self.slot_size
    }

    /// Writes one burst for `frame` into `slot`.
    ///
    /// # Panics
    ///
    /// When `slot` is not exactly the slot size, or the frame does not fit
    /// behind the preamble.
    pub fn encode(&self, descriptor: &StreamDescriptor, frame: &[u8], slot: &mut [u8]) {
        let frame_size = descriptor.frame_size;

        assert_eq!(slot.len(), self.slot_size, "burst slot size mismatch");
        assert!(
            BURST_HEADER_SIZE + frame_size <= self.slot_size,
            "{frame_size} byte frame does not fit a {} byte burst",
            self.slot_size
        );
        assert!(frame.len() >= frame_size, "frame shorter than its descriptor");

        let pc = ((descriptor.bsmod as u16) << 8) | DATA_TYPE_AC3;
        let pd = (frame_size * 8) as u16;

        for (i, word) in [PREAMBLE_PA, PREAMBLE_PB, pc, pd].into_iter().enumerate() {
            slot[i * 2..i * 2 + 2].copy_from_slice(&word.to_be_bytes());
        }

        let payload_end = BURST_HEADER_SIZE + frame_size;
        slot[BURST_HEADER_SIZE..payload_end].copy_from_slice(&frame[..frame_size]);
        slot[payload_end..].fill(0);

        if self.word_order == WordOrder::Little {
            for word in slot.chunks_exact_mut(2) {
                word.swap(0, 1);
            }
        }
    }
}
