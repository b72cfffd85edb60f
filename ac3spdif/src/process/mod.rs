/// Frame synchronization over a bit cursor.
///
/// Provides the [`FrameSynchronizer`](sync::FrameSynchronizer) that scans for
/// AC-3 sync words and returns complete [`SyncedFrame`](sync::SyncedFrame)s.
pub mod sync;

/// Output timestamp reconstruction.
///
/// Provides the [`TimingReconciler`](timing::TimingReconciler) that merges
/// recovered packet timestamps with nominal frame durations.
pub mod timing;

/// IEC 61937 burst encoding.
///
/// Provides the [`BurstEncoder`](burst::BurstEncoder) that wraps one raw
/// syncframe into a fixed-size S/PDIF burst.
pub mod burst;

/// Pass-through session lifecycle.
///
/// Provides the [`Session`](session::Session) driving setup, streaming and
/// teardown against an [`OutputDevice`](crate::output::OutputDevice).
pub mod session;

#[cfg(test)]
pub(crate) mod test_support {
    //! Synthetic AC-3 syncframes with valid headers and CRC words.

    use crate::structs::syncinfo::{BITRATES_KBPS, HEADER_LEN};
    use crate::utils::crc::{CRC_AC3_ALG, Crc16};
    use crate::utils::fifo::{Packet, PacketFifo};

    const CRC16: Crc16 = Crc16::new(&CRC_AC3_ALG);

    /// Product of two polynomials modulo the CRC generator.
    fn mulmod(a: u16, b: u16) -> u16 {
        let mut r = 0u16;
        for i in (0..16).rev() {
            let carry = r & 0x8000 != 0;
            r <<= 1;
            if carry {
                r ^= 0x8005;
            }
            if (a >> i) & 1 != 0 {
                r ^= b;
            }
        }
        r
    }

    fn frame_size(fscod: u8, frmsizecod: u8) -> usize {
        let kbps = BITRATES_KBPS[(frmsizecod >> 1) as usize] as usize;
        let words = match fscod {
            0 => kbps * 2,
            1 => kbps * 320 / 147 + (frmsizecod & 1) as usize,
            _ => kbps * 3,
        };
        words * 2
    }

    /// Leading CRC word that gives `region` a zero remainder.
    fn solve_leading_crc(region: &[u8]) -> u16 {
        let mut probe = vec![0u8; region.len()];
        probe[1] = 1;
        let shift = CRC16.checksum(&probe);

        let mut rest = region.to_vec();
        rest[0] = 0;
        rest[1] = 0;
        let target = CRC16.checksum(&rest);

        (0..=u16::MAX)
            .find(|&c| mulmod(c, shift) == target)
            .unwrap_or_default()
    }

    /// Builds one syncframe with `bsid` 8. No byte past the header is `0x0B`.
    pub fn ac3_frame(
        fscod: u8,
        frmsizecod: u8,
        bsmod: u8,
        acmod: u8,
        lfeon: bool,
        seed: u32,
    ) -> Vec<u8> {
        let size = frame_size(fscod, frmsizecod);
        let mut frame = vec![0u8; size];

        frame[0] = 0x0B;
        frame[1] = 0x77;
        frame[4] = (fscod << 6) | frmsizecod;
        frame[5] = (8 << 3) | bsmod;

        let mut bits = 3u32;
        let mut acc = acmod as u32;
        if acmod & 1 != 0 && acmod != 1 {
            acc <<= 2;
            bits += 2;
        }
        if acmod & 4 != 0 {
            acc <<= 2;
            bits += 2;
        }
        if acmod == 2 {
            acc <<= 2;
            bits += 2;
        }
        acc = (acc << 1) | lfeon as u32;
        bits += 1;
        frame[6] = (acc << (8 - bits)) as u8;

        let mut state = seed.wrapping_mul(2_654_435_761).wrapping_add(1);
        for byte in frame[HEADER_LEN..size - 2].iter_mut() {
            state = state.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            *byte = (state >> 16) as u8;
            if *byte == 0x0B {
                *byte = 0x0C;
            }
        }

        let words = size >> 1;
        let split = ((words >> 2) + (words >> 4)) << 1;

        loop {
            let crc1 = solve_leading_crc(&frame[2..split]);
            frame[2..4].copy_from_slice(&crc1.to_be_bytes());
            let crc2 = CRC16.checksum(&frame[split..size - 2]);
            frame[size - 2..].copy_from_slice(&crc2.to_be_bytes());

            let crc1_clean = !frame[2..4].contains(&0x0B);
            let crc2_clean = !frame[size - 2..].contains(&0x0B);
            if crc1_clean && crc2_clean {
                return frame;
            }
            let tweak = if crc1_clean { split } else { HEADER_LEN };
            frame[tweak] = match frame[tweak].wrapping_add(1) {
                0x0B => 0x0C,
                byte => byte,
            };
        }
    }

    /// `count` 48 kHz, 384 kbps 5.1 frames back to back.
    pub fn ac3_stream(count: usize) -> Vec<u8> {
        (0..count)
            .flat_map(|i| ac3_frame(0, 28, 0, 7, true, i as u32))
            .collect()
    }

    /// Splits `data` into packets of `packet_size` bytes, stamping the ones
    /// listed in `pts` by packet index.
    pub fn packetize(data: &[u8], packet_size: usize, pts: &[(usize, i64)]) -> Vec<Packet> {
        data.chunks(packet_size)
            .enumerate()
            .map(|(i, chunk)| {
                let stamp = pts.iter().find(|(index, _)| *index == i).map(|&(_, t)| t);
                Packet::new(chunk.to_vec(), stamp)
            })
            .collect()
    }

    /// FIFO already holding `packets` and marked as ended.
    pub fn ended_fifo(packets: Vec<Packet>) -> PacketFifo {
        let fifo = PacketFifo::new(packets.len().max(1));
        for packet in packets {
            fifo.push(packet).unwrap();
        }
        fifo.end_of_stream();
        fifo
    }
}
