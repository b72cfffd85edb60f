//! AC-3 syncframe header structures.
//!
//! ## Syncframe Layout
//!
//! Every AC-3 syncframe starts with `syncinfo()`:
//!
//! | field        | bits | meaning                                 |
//! |--------------|------|-----------------------------------------|
//! | `syncword`   | 16   | always `0x0B77`                         |
//! | `crc1`       | 16   | CRC over the first 5/8 of the frame     |
//! | `fscod`      | 2    | sample rate code                        |
//! | `frmsizecod` | 6    | frame size / bitrate code               |
//!
//! followed by `bsi()`, of which only the leading fields up to `lfeon` are
//! read here. All of them fit in the first seven bytes of the frame.
//!
//! ## Frame Sizes
//!
//! A syncframe always carries 1536 samples per channel, so its size is
//! fixed by the bitrate and the sample rate. At 44.1 kHz odd `frmsizecod`
//! values add one padding word.

use std::fmt::{Display, Formatter};

use anyhow::{Result, bail, ensure};
use log::trace;

use crate::utils::bitstream_io::BsIoSliceReader;
use crate::utils::clock::{MTIME_PER_SECOND, Mtime};
use crate::utils::errors::HeaderError;

/// AC-3 sync word, `0x0B 0x77` in stream order.
pub const SYNC_WORD: u16 = 0x0B77;

/// Bytes needed to parse [`StreamDescriptor::from_header`].
pub const HEADER_LEN: usize = 7;

/// Samples per channel in one syncframe.
pub const SAMPLES_PER_FRAME: u32 = 1536;

/// The only sample rate IEC 61937 AC-3 bursts are defined for here.
pub const NOMINAL_SAMPLE_RATE: u32 = 48000;

/// Largest syncframe: 640 kbps at 32 kHz.
pub const MAX_FRAME_SIZE: usize = 3840;

/// Highest `bsid` still decodable as AC-3; E-AC-3 uses 16.
pub const MAX_BSID: u8 = 10;

/// Nominal bitrates in kbps, indexed by `frmsizecod >> 1`.
pub const BITRATES_KBPS: [u16; 19] = [
    32, 40, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320, 384, 448, 512, 576, 640,
];

/// `syncinfo()` without the sync word.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncInfo {
    pub crc1: u16,
    pub fscod: u8,
    pub frmsizecod: u8,
}

impl SyncInfo {
    pub fn read(reader: &mut BsIoSliceReader) -> Result<Self> {
        let si = Self {
            crc1: reader.get_n(16)?,
            fscod: reader.get_n(2)?,
            frmsizecod: reader.get_n(6)?,
        };

        si.sample_rate()?;
        si.frame_size()?;

        Ok(si)
    }

    pub fn sample_rate(&self) -> Result<u32> {
        match self.fscod {
            0 => Ok(48000),
            1 => Ok(44100),
            2 => Ok(32000),
            _ => bail!(HeaderError::ReservedSampleRate),
        }
    }

    pub fn bitrate_kbps(&self) -> Result<u16> {
        match BITRATES_KBPS.get((self.frmsizecod >> 1) as usize) {
            Some(&kbps) if self.frmsizecod <= 37 => Ok(kbps),
            _ => bail!(HeaderError::InvalidFrameSizeCode(self.frmsizecod)),
        }
    }

    /// Syncframe size in bytes.
    pub fn frame_size(&self) -> Result<usize> {
        let kbps = self.bitrate_kbps()? as usize;
        let words = match self.fscod {
            0 => kbps * 2,
            1 => kbps * 320 / 147 + (self.frmsizecod & 1) as usize,
            2 => kbps * 3,
            _ => bail!(HeaderError::ReservedSampleRate),
        };

        Ok(words * 2)
    }
}

/// Leading fields of `bsi()`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Bsi {
    pub bsid: u8,
    pub bsmod: u8,
    pub acmod: u8,
    pub cmixlev: Option<u8>,
    pub surmixlev: Option<u8>,
    pub dsurmod: Option<u8>,
    pub lfeon: bool,
}

impl Bsi {
    pub fn read(reader: &mut BsIoSliceReader) -> Result<Self> {
        let mut bsi = Self {
            bsid: reader.get_n(5)?,
            bsmod: reader.get_n(3)?,
            acmod: reader.get_n(3)?,
            ..Default::default()
        };

        if bsi.bsid > MAX_BSID {
            bail!(HeaderError::UnsupportedBsid(bsi.bsid));
        }

        // Three front channels
        if bsi.acmod & 1 != 0 && bsi.acmod != 1 {
            bsi.cmixlev = Some(reader.get_n(2)?);
        }
        // Surround channels present
        if bsi.acmod & 4 != 0 {
            bsi.surmixlev = Some(reader.get_n(2)?);
        }
        if bsi.acmod == 2 {
            bsi.dsurmod = Some(reader.get_n(2)?);
        }
        bsi.lfeon = reader.get()?;

        Ok(bsi)
    }

    /// Full-bandwidth channels coded by `acmod`.
    pub fn full_bandwidth_channels(&self) -> usize {
        match self.acmod {
            0 => 2, // 1+1 dual mono
            1 => 1,
            2 => 2,
            3 | 4 => 3,
            5 | 6 => 4,
            _ => 5,
        }
    }

    pub fn layout_str(&self) -> &'static str {
        match self.acmod {
            0 => "1+1",
            1 => "1/0",
            2 => "2/0",
            3 => "3/0",
            4 => "2/1",
            5 => "3/1",
            6 => "2/2",
            _ => "3/2",
        }
    }
}

/// Stream parameters derived from one syncframe header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamDescriptor {
    pub sample_rate: u32,
    /// Syncframe size in bytes, sync word included.
    pub frame_size: usize,
    pub frmsizecod: u8,
    pub bitrate_kbps: u16,
    pub bsid: u8,
    pub bsmod: u8,
    pub acmod: u8,
    pub lfeon: bool,
}

impl StreamDescriptor {
    /// Parses the first [`HEADER_LEN`] bytes of a syncframe.
    pub fn from_header(header: &[u8]) -> Result<Self> {
        ensure!(
            header.len() >= HEADER_LEN,
            "Insufficient data for parsing syncinfo: {} < {HEADER_LEN} bytes",
            header.len()
        );

        let reader = &mut BsIoSliceReader::from_slice(header);

        let syncword: u16 = reader.get_n(16)?;
        if syncword != SYNC_WORD {
            bail!(HeaderError::InvalidSyncWord(syncword));
        }

        let si = SyncInfo::read(reader)?;
        let bsi = Bsi::read(reader)?;

        let descriptor = Self {
            sample_rate: si.sample_rate()?,
            frame_size: si.frame_size()?,
            frmsizecod: si.frmsizecod,
            bitrate_kbps: si.bitrate_kbps()?,
            bsid: bsi.bsid,
            bsmod: bsi.bsmod,
            acmod: bsi.acmod,
            lfeon: bsi.lfeon,
        };

        trace!("AC-3 syncinfo: {descriptor}, crc1 {:#06X}", si.crc1);

        Ok(descriptor)
    }

    /// Playback duration of one syncframe, in microseconds.
    pub fn frame_duration(&self) -> Mtime {
        frame_duration(self.sample_rate)
    }

    pub fn channels(&self) -> usize {
        self.bsi().full_bandwidth_channels() + self.lfeon as usize
    }

    fn bsi(&self) -> Bsi {
        Bsi {
            bsid: self.bsid,
            bsmod: self.bsmod,
            acmod: self.acmod,
            lfeon: self.lfeon,
            ..Default::default()
        }
    }
}

impl Display for StreamDescriptor {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} Hz, {} kbps, {} bytes/frame, {}{} ({} ch), bsid {}, bsmod {}",
            self.sample_rate,
            self.bitrate_kbps,
            self.frame_size,
            self.bsi().layout_str(),
            if self.lfeon { "+LFE" } else { "" },
            self.channels(),
            self.bsid,
            self.bsmod
        )
    }
}

/// Playback duration of one syncframe at `sample_rate`, in microseconds.
pub fn frame_duration(sample_rate: u32) -> Mtime {
    MTIME_PER_SECOND * SAMPLES_PER_FRAME as Mtime / sample_rate.max(1) as Mtime
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::test_support::ac3_frame;

    #[test]
    fn frame_sizes_follow_coding_table() -> Result<()> {
        let cases = [
            // (fscod, frmsizecod, bytes)
            (0, 0, 128),
            (1, 0, 138),
            (1, 1, 140),
            (2, 0, 192),
            (0, 28, 1536),
            (1, 29, 1672),
            (0, 37, 2560),
            (1, 36, 2786),
            (1, 37, 2788),
            (2, 37, 3840),
        ];

        for (fscod, frmsizecod, bytes) in cases {
            let si = SyncInfo {
                crc1: 0,
                fscod,
                frmsizecod,
            };
            assert_eq!(si.frame_size()?, bytes, "fscod {fscod} frmsizecod {frmsizecod}");
        }

        let largest = (0..3)
            .flat_map(|fscod| {
                (0..38).map(move |frmsizecod| SyncInfo {
                    crc1: 0,
                    fscod,
                    frmsizecod,
                })
            })
            .map(|si| si.frame_size())
            .collect::<Result<Vec<_>>>()?
            .into_iter()
            .max();
        assert_eq!(largest, Some(MAX_FRAME_SIZE));
        Ok(())
    }

    #[test]
    fn parse_header() -> Result<()> {
        let frame = ac3_frame(0, 28, 0, 7, true, 1);
        let descriptor = StreamDescriptor::from_header(&frame)?;

        assert_eq!(descriptor.sample_rate, 48000);
        assert_eq!(descriptor.frame_size, 1536);
        assert_eq!(descriptor.bitrate_kbps, 384);
        assert_eq!(descriptor.acmod, 7);
        assert!(descriptor.lfeon);
        assert_eq!(descriptor.channels(), 6);
        assert_eq!(descriptor.frame_duration(), 32_000);
        assert_eq!(
            descriptor.to_string(),
            "48000 Hz, 384 kbps, 1536 bytes/frame, 3/2+LFE (6 ch), bsid 8, bsmod 0"
        );
        Ok(())
    }

    #[test]
    fn lfeon_position_depends_on_acmod() -> Result<()> {
        for acmod in 0..8 {
            for lfeon in [false, true] {
                let frame = ac3_frame(0, 10, 0, acmod, lfeon, 2);
                let descriptor = StreamDescriptor::from_header(&frame)?;
                assert_eq!(descriptor.acmod, acmod);
                assert_eq!(descriptor.lfeon, lfeon, "acmod {acmod}");
            }
        }
        Ok(())
    }

    #[test]
    fn reject_invalid_headers() {
        let mut frame = ac3_frame(0, 8, 0, 2, false, 3);

        frame[4] = 0xC0 | 8;
        assert!(StreamDescriptor::from_header(&frame).is_err());

        frame[4] = 38;
        assert!(StreamDescriptor::from_header(&frame).is_err());

        frame[4] = 8;
        frame[5] = 16 << 3;
        let err = StreamDescriptor::from_header(&frame).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<HeaderError>(),
            Some(HeaderError::UnsupportedBsid(16))
        ));

        frame[0] = 0x0C;
        assert!(StreamDescriptor::from_header(&frame).is_err());
        assert!(StreamDescriptor::from_header(&frame[..6]).is_err());
    }

    #[test]
    fn durations_per_rate() {
        assert_eq!(frame_duration(48000), 32_000);
        assert_eq!(frame_duration(44100), 34_829);
        assert_eq!(frame_duration(32000), 48_000);
    }
}
