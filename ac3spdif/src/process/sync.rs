use log::{trace, warn};

use crate::process::burst::SPDIF_FRAME_SIZE;
use crate::structs::syncinfo::{HEADER_LEN, StreamDescriptor};
use crate::utils::bitstream::BitCursor;
use crate::utils::clock::Mtime;
use crate::utils::errors::SyncError;

const SYNC_BYTE_0: u8 = 0x0B;
const SYNC_BYTE_1: u8 = 0x77;

/// Bits peeked after the first sync byte: the second sync byte and the rest
/// of the header.
const HEADER_PEEK_BITS: u32 = (HEADER_LEN as u32 - 1) * 8;

/// Result of one successful synchronization.
///
/// The frame bytes stay in the synchronizer and are lent out through
/// [`FrameSynchronizer::frame`] until the next call to
/// [`FrameSynchronizer::next_frame`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncedFrame {
    pub descriptor: StreamDescriptor,
    /// Timestamp of the packet boundary that preceded this frame, if any.
    pub timestamp: Option<Mtime>,
}

/// Locates AC-3 syncframes in a bit cursor and copies them into an owned
/// raw frame buffer.
///
/// Scanning is byte-wise. Every `0x0B` takes the cursor's pending packet
/// timestamp as the candidate for the frame about to start; the candidate
/// survives false sync words and is handed out with the next valid frame.
/// A sync word whose header fails validation is skipped by one byte only,
/// so the peeked header bytes are scanned again.
///
/// # Example
///
/// ```rust,no_run
/// use ac3spdif::process::sync::FrameSynchronizer;
/// use ac3spdif::utils::bitstream::PacketCursor;
/// use ac3spdif::utils::fifo::{Packet, PacketFifo};
///
/// let fifo = PacketFifo::default();
/// fifo.push(Packet::new(std::fs::read("stream.ac3")?, Some(0)))?;
/// fifo.end_of_stream();
///
/// let mut cursor = PacketCursor::new(fifo);
/// let mut synchronizer = FrameSynchronizer::default();
///
/// while let Ok(synced) = synchronizer.next_frame(&mut cursor) {
///     println!("{} ({} bytes)", synced.descriptor, synchronizer.frame().len());
/// }
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Default)]
pub struct FrameSynchronizer {
    buffer: Option<Box<[u8]>>,
    descriptor: Option<StreamDescriptor>,
    candidate: Option<Mtime>,
    frames: u64,
    false_syncs: u64,
    bytes_skipped: u64,
}

impl FrameSynchronizer {
    /// Scans for the next valid syncframe and reads it completely.
    ///
    /// Blocks on the cursor while input is pending. Fails with
    /// [`SyncError::SyncNotFound`] when the input ends, stops or fails
    /// before a valid header, and with [`SyncError::TruncatedFrame`] when it
    /// does so inside the frame body.
    pub fn next_frame<C: BitCursor + ?Sized>(
        &mut self,
        cursor: &mut C,
    ) -> Result<SyncedFrame, SyncError> {
        self.descriptor = None;

        let descriptor = loop {
            let byte = cursor.read_bits(8).map_err(SyncError::SyncNotFound)? as u8;
            if byte != SYNC_BYTE_0 {
                self.bytes_skipped += 1;
                continue;
            }

            if let Some(timestamp) = cursor.take_timestamp() {
                self.candidate = Some(timestamp);
            }

            let peeked = cursor
                .peek_bits(HEADER_PEEK_BITS)
                .map_err(SyncError::SyncNotFound)?;
            if (peeked >> (HEADER_PEEK_BITS - 8)) as u8 != SYNC_BYTE_1 {
                self.bytes_skipped += 1;
                continue;
            }

            let mut header = [0u8; HEADER_LEN];
            header[0] = SYNC_BYTE_0;
            header[1..].copy_from_slice(&peeked.to_be_bytes()[2..]);

            match StreamDescriptor::from_header(&header) {
                Ok(descriptor) => break descriptor,
                Err(e) => {
                    warn!("False sync word: {e}");
                    self.false_syncs += 1;
                    self.bytes_skipped += 1;
                }
            }
        };

        let buffer = self
            .buffer
            .get_or_insert_with(|| vec![0u8; SPDIF_FRAME_SIZE].into_boxed_slice());
        buffer[0] = SYNC_BYTE_0;
        buffer[1] = SYNC_BYTE_1;

        cursor.skip_bits(8).map_err(SyncError::TruncatedFrame)?;
        cursor
            .read_bytes(&mut buffer[2..descriptor.frame_size])
            .map_err(SyncError::TruncatedFrame)?;

        self.frames += 1;
        self.descriptor = Some(descriptor);

        let timestamp = self.candidate.take();
        trace!(
            "Frame {}: {} bytes, timestamp {timestamp:?}",
            self.frames, descriptor.frame_size
        );

        Ok(SyncedFrame {
            descriptor,
            timestamp,
        })
    }

    /// Bytes of the most recent frame, empty when no frame is held.
    pub fn frame(&self) -> &[u8] {
        match (&self.buffer, &self.descriptor) {
            (Some(buffer), Some(descriptor)) => &buffer[..descriptor.frame_size],
            _ => &[],
        }
    }

    pub fn descriptor(&self) -> Option<&StreamDescriptor> {
        self.descriptor.as_ref()
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn false_syncs(&self) -> u64 {
        self.false_syncs
    }

    pub fn bytes_skipped(&self) -> u64 {
        self.bytes_skipped
    }

    /// Frees the raw frame buffer. The next frame allocates it again.
    pub fn release(&mut self) {
        self.buffer = None;
        self.descriptor = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::test_support::{ac3_frame, ac3_stream, ended_fifo, packetize};
    use crate::utils::bitstream::PacketCursor;
    use crate::utils::errors::InputError;
    use crate::utils::fifo::Packet;

    fn cursor_over(data: &[u8], packet_size: usize, pts: &[(usize, Mtime)]) -> PacketCursor {
        PacketCursor::new(ended_fifo(packetize(data, packet_size, pts)))
    }

    #[test]
    fn frame_sizes_cover_consumed_bytes() {
        let stream = ac3_stream(5);
        let mut cursor = cursor_over(&stream, 100, &[]);
        let mut synchronizer = FrameSynchronizer::default();

        let mut total = 0;
        for i in 0..5 {
            let synced = synchronizer.next_frame(&mut cursor).unwrap();
            assert_eq!(synced.descriptor.frame_size, 1536);
            assert_eq!(synced.descriptor.sample_rate, 48000);
            assert_eq!(synchronizer.frame(), &stream[i * 1536..(i + 1) * 1536]);
            total += synced.descriptor.frame_size as u64;
            assert_eq!(cursor.position(), total * 8);
        }

        assert_eq!(
            synchronizer.next_frame(&mut cursor),
            Err(SyncError::SyncNotFound(InputError::EndOfStream))
        );
        assert_eq!(synchronizer.frames(), 5);
        assert_eq!(synchronizer.bytes_skipped(), 0);
    }

    #[test]
    fn recovers_after_corruption() {
        let frame = ac3_frame(0, 8, 2, 2, false, 11);
        let mut data = vec![0x55, 0x0B, 0x12, 0x0B, 0x77, 0x00, 0x00, 0xC0, 0x40, 0x00];
        data.extend_from_slice(&frame);

        let mut cursor = cursor_over(&data, 64, &[]);
        let mut synchronizer = FrameSynchronizer::default();

        let synced = synchronizer.next_frame(&mut cursor).unwrap();
        assert_eq!(synced.descriptor.frame_size, frame.len());
        assert_eq!(synced.descriptor.bsmod, 2);
        assert_eq!(synchronizer.frame(), &frame[..]);
        assert_eq!(synchronizer.false_syncs(), 1);
        assert_eq!(synchronizer.bytes_skipped(), 10);
    }

    #[test]
    fn rescans_peeked_header_bytes() {
        let frame = ac3_frame(0, 10, 0, 1, false, 4);
        // The bogus header window covers the real sync word.
        let mut data = vec![0x0B, 0x77, 0xFF];
        data.extend_from_slice(&frame);

        let mut cursor = cursor_over(&data, data.len(), &[]);
        let mut synchronizer = FrameSynchronizer::default();

        let synced = synchronizer.next_frame(&mut cursor).unwrap();
        assert_eq!(synced.descriptor.frame_size, frame.len());
        assert_eq!(synchronizer.frame(), &frame[..]);
        assert_eq!(synchronizer.false_syncs(), 1);
        assert_eq!(synchronizer.bytes_skipped(), 3);
    }

    #[test]
    fn rederives_descriptor_on_rate_change() {
        let first = ac3_frame(1, 9, 0, 2, false, 1);
        let second = ac3_frame(2, 4, 0, 2, false, 2);
        let third = ac3_frame(0, 0, 0, 2, false, 3);
        let data = [first.clone(), second.clone(), third.clone()].concat();

        let mut cursor = cursor_over(&data, 333, &[]);
        let mut synchronizer = FrameSynchronizer::default();

        for (rate, frame) in [(44100, first), (32000, second), (48000, third)] {
            let synced = synchronizer.next_frame(&mut cursor).unwrap();
            assert_eq!(synced.descriptor.sample_rate, rate);
            assert_eq!(synchronizer.frame(), &frame[..]);
        }
    }

    #[test]
    fn timestamps_follow_packet_boundaries() {
        let stream = ac3_stream(3);

        // Aligned packets: each stamped packet starts its own frame.
        let mut cursor = cursor_over(&stream, 1536, &[(0, 1_000), (2, 70_000)]);
        let mut synchronizer = FrameSynchronizer::default();
        let stamps = (0..3)
            .map(|_| synchronizer.next_frame(&mut cursor).unwrap().timestamp)
            .collect::<Vec<_>>();
        assert_eq!(stamps, vec![Some(1_000), None, Some(70_000)]);

        // A packet starting inside frame 0 stamps frame 1.
        let mut cursor = cursor_over(&stream, 1000, &[(1, 5_000)]);
        let mut synchronizer = FrameSynchronizer::default();
        let stamps = (0..3)
            .map(|_| synchronizer.next_frame(&mut cursor).unwrap().timestamp)
            .collect::<Vec<_>>();
        assert_eq!(stamps, vec![None, Some(5_000), None]);
    }

    #[test]
    fn candidate_survives_false_sync() {
        let frame = ac3_frame(0, 2, 0, 2, false, 8);
        let fifo = ended_fifo(vec![
            Packet::new(vec![0x0B, 0x00], Some(42)),
            Packet::new(frame, None),
        ]);
        let mut cursor = PacketCursor::new(fifo);
        let mut synchronizer = FrameSynchronizer::default();

        assert_eq!(
            synchronizer.next_frame(&mut cursor).unwrap().timestamp,
            Some(42)
        );
    }

    #[test]
    fn packet_headers_do_not_leak_into_frames() {
        let stream = ac3_stream(3);
        let packets = packetize(&stream, 768, &[(0, 1_000), (2, 2_000), (4, 3_000)])
            .into_iter()
            .map(|packet| {
                let mut data = vec![0x80, 0x01, 0x00];
                data.extend_from_slice(&packet.data);
                Packet::new(data, packet.pts)
            })
            .collect::<Vec<_>>();
        let mut cursor = PacketCursor::new(ended_fifo(packets)).with_packet_header_len(3);
        let mut synchronizer = FrameSynchronizer::default();

        let mut stamps = Vec::new();
        for i in 0..3 {
            let synced = synchronizer.next_frame(&mut cursor).unwrap();
            assert_eq!(synchronizer.frame(), &stream[i * 1536..(i + 1) * 1536]);
            stamps.push(synced.timestamp);
        }

        // Every frame is split over two packets; the stamped ones start frames.
        assert_eq!(stamps, vec![Some(1_000), Some(2_000), Some(3_000)]);
        assert_eq!(synchronizer.bytes_skipped(), 0);
    }

    #[test]
    fn truncated_frame_reports_input_error() {
        let frame = ac3_frame(0, 6, 0, 2, false, 6);
        let mut cursor = cursor_over(&frame[..frame.len() / 2], 50, &[]);
        let mut synchronizer = FrameSynchronizer::default();

        let err = synchronizer.next_frame(&mut cursor).unwrap_err();
        assert_eq!(err, SyncError::TruncatedFrame(InputError::EndOfStream));
        assert!(synchronizer.frame().is_empty());

        synchronizer.release();
        assert!(synchronizer.descriptor().is_none());
    }
}
