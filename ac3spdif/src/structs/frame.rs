//! Borrowed view over one complete AC-3 syncframe.

use anyhow::{Result, ensure};

use crate::structs::syncinfo::{HEADER_LEN, StreamDescriptor};
use crate::utils::crc::{CRC_AC3_ALG, Crc16};

static CRC16: Crc16 = Crc16::new(&CRC_AC3_ALG);

/// Outcome of checking both CRC words of a syncframe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrcStatus {
    pub crc1_ok: bool,
    pub crc2_ok: bool,
}

impl CrcStatus {
    pub fn is_ok(&self) -> bool {
        self.crc1_ok && self.crc2_ok
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Ac3Frame<'a> {
    pub descriptor: StreamDescriptor,
    pub data: &'a [u8],
}

impl<'a> Ac3Frame<'a> {
    /// Wraps `data`, which must hold at least the declared frame size.
    pub fn new(data: &'a [u8]) -> Result<Self> {
        let descriptor = StreamDescriptor::from_header(data)?;

        ensure!(
            data.len() >= descriptor.frame_size,
            "Frame truncated: {} < {} bytes",
            data.len(),
            descriptor.frame_size
        );

        Ok(Self {
            descriptor,
            data: &data[..descriptor.frame_size],
        })
    }

    /// End of the region protected by `crc1`, the first 5/8 of the frame.
    pub fn crc1_end(&self) -> usize {
        let words = self.descriptor.frame_size >> 1;
        ((words >> 2) + (words >> 4)) << 1
    }

    /// `crc1` covers `[2, 5/8)` including itself, `crc2` covers the rest of
    /// the frame and sits in the last two bytes.
    pub fn check_crc(&self) -> CrcStatus {
        let split = self.crc1_end().max(HEADER_LEN);

        CrcStatus {
            crc1_ok: CRC16.checksum(&self.data[2..split]) == 0,
            crc2_ok: CRC16.checksum(&self.data[split..]) == 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::test_support::ac3_frame;

    #[test]
    fn valid_frames_pass_both_crcs() -> Result<()> {
        for (fscod, frmsizecod) in [(0, 0), (0, 28), (1, 9), (2, 37)] {
            let data = ac3_frame(fscod, frmsizecod, 1, 2, false, 7);
            let frame = Ac3Frame::new(&data)?;
            assert_eq!(frame.data.len(), data.len());
            assert!(frame.check_crc().is_ok(), "fscod {fscod} frmsizecod {frmsizecod}");
        }
        Ok(())
    }

    #[test]
    fn corruption_is_localized() -> Result<()> {
        let mut data = ac3_frame(0, 28, 0, 7, true, 5);
        let split = Ac3Frame::new(&data)?.crc1_end();

        data[split - 1] ^= 0x10;
        let status = Ac3Frame::new(&data)?.check_crc();
        assert_eq!(
            status,
            CrcStatus {
                crc1_ok: false,
                crc2_ok: true
            }
        );

        data[split - 1] ^= 0x10;
        data[split + 10] ^= 0x01;
        let status = Ac3Frame::new(&data)?.check_crc();
        assert_eq!(
            status,
            CrcStatus {
                crc1_ok: true,
                crc2_ok: false
            }
        );
        Ok(())
    }

    #[test]
    fn truncated_frame_is_rejected() {
        let data = ac3_frame(0, 4, 0, 1, false, 9);
        assert!(Ac3Frame::new(&data[..data.len() - 1]).is_err());
    }
}
