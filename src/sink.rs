//! Output device writing bursts to a file or stdout in real time.
//!
//! Creating the ring spawns a playback thread that takes each burst from the
//! ring, waits until its presentation date and writes it out. Destroying the
//! ring lets the thread play what is left and joins it.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use ac3spdif::output::{OutputDevice, OutputFormat};
use ac3spdif::utils::clock::{Clock, Mtime};
use ac3spdif::utils::errors::DeviceError;
use ac3spdif::utils::ring::{self, RingConsumer, RingProducer};
use anyhow::{Result, anyhow};
use indicatif::ProgressBar;

use crate::timestamp::mtime_str;

/// Bursts written this late count as underruns.
const UNDERRUN_TOLERANCE: Mtime = 5_000;

pub fn open_output(path: Option<&Path>) -> Result<Box<dyn Write + Send>> {
    let output: Box<dyn Write + Send> = match path {
        Some(path) if path.to_string_lossy() == "-" => Box::new(io::stdout()),
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(io::sink()),
    };
    Ok(output)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PlaybackStats {
    pub bursts: u64,
    pub bytes: u64,
    pub underruns: u64,
    pub last_date: Option<Mtime>,
}

pub struct FileSinkDevice {
    output: Option<Box<dyn Write + Send>>,
    format: OutputFormat,
    clock: Arc<dyn Clock>,
    free_run: bool,
    pb: Option<ProgressBar>,
    playback: Option<thread::JoinHandle<Result<PlaybackStats>>>,
    result: Option<Result<PlaybackStats>>,
}

impl FileSinkDevice {
    pub fn new(
        output: Box<dyn Write + Send>,
        clock: Arc<dyn Clock>,
        free_run: bool,
        pb: Option<ProgressBar>,
    ) -> Self {
        Self {
            output: Some(output),
            format: OutputFormat::Pcm,
            clock,
            free_run,
            pb,
            playback: None,
            result: None,
        }
    }

    /// Outcome of the playback thread, once the ring was destroyed.
    pub fn take_playback_result(&mut self) -> Option<Result<PlaybackStats>> {
        self.result.take()
    }
}

struct Playback {
    consumer: RingConsumer,
    output: Box<dyn Write + Send>,
    clock: Arc<dyn Clock>,
    free_run: bool,
    pb: Option<ProgressBar>,
}

impl Playback {
    fn run(mut self) -> Result<PlaybackStats> {
        let mut burst = vec![0u8; self.consumer.slot_size()];
        let mut stats = PlaybackStats::default();

        while let Some(date) = self.consumer.recv(&mut burst) {
            if !self.free_run {
                let wait = date - self.clock.now();
                if wait > 0 {
                    thread::sleep(Duration::from_micros(wait as u64));
                } else if wait < -UNDERRUN_TOLERANCE {
                    stats.underruns += 1;
                    log::debug!("Burst dated {} played {} us late", mtime_str(date), -wait);
                }
            }

            if let Err(e) = self.output.write_all(&burst) {
                // Unblocks the producer if it waits for space.
                self.consumer.shutdown();
                return Err(e.into());
            }

            stats.bursts += 1;
            stats.bytes += burst.len() as u64;
            stats.last_date = Some(date);

            if let Some(pb) = &self.pb {
                pb.inc(1);
                pb.set_message(format!("playing {}", mtime_str(date)));
            }
        }

        self.output.flush()?;
        Ok(stats)
    }
}

impl OutputDevice for FileSinkDevice {
    fn negotiate_format(&mut self, format: OutputFormat) -> Result<OutputFormat, DeviceError> {
        let previous = self.format;
        self.format = format;
        log::debug!("Sink format {previous} -> {format}");
        Ok(previous)
    }

    fn create_ring(
        &mut self,
        capacity: usize,
        slot_size: usize,
        sample_rate: u32,
    ) -> Result<RingProducer, DeviceError> {
        if self.playback.is_some() {
            return Err(DeviceError::RingBusy);
        }
        let (producer, consumer) = ring::channel(capacity, slot_size, sample_rate)?;
        let output = self
            .output
            .take()
            .ok_or_else(|| DeviceError::Io("output already consumed".to_string()))?;
        log::debug!("Ring of {capacity} x {slot_size} byte slots at {sample_rate} Hz");

        let playback = Playback {
            consumer,
            output,
            clock: self.clock.clone(),
            free_run: self.free_run,
            pb: self.pb.clone(),
        };
        self.playback = Some(
            thread::Builder::new()
                .name("playback".to_string())
                .spawn(move || playback.run())
                .map_err(|e| DeviceError::Io(e.to_string()))?,
        );

        Ok(producer)
    }

    fn destroy_ring(&mut self, ring: RingProducer) {
        ring.shutdown();

        if let Some(handle) = self.playback.take() {
            let result = handle
                .join()
                .unwrap_or_else(|_| Err(anyhow!("Playback thread panicked")));
            match &result {
                Ok(stats) => log::debug!(
                    "Playback done: {} bursts, {} bytes, {} underruns, last dated {}",
                    stats.bursts,
                    stats.bytes,
                    stats.underruns,
                    stats.last_date.map_or_else(|| "-".to_string(), mtime_str)
                ),
                Err(e) => log::error!("Playback failed: {e}"),
            }
            self.result = Some(result);
        }
    }

    fn restore_format(&mut self, format: OutputFormat) {
        log::debug!("Sink format restored to {format}");
        self.format = format;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ac3spdif::utils::clock::ManualClock;
    use std::sync::Mutex;

    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn plays_published_bursts_in_order() {
        let buffer = SharedBuffer::default();
        let mut device = FileSinkDevice::new(
            Box::new(buffer.clone()),
            Arc::new(ManualClock::new(1_000)),
            false,
            None,
        );

        assert_eq!(device.negotiate_format(OutputFormat::Spdif), Ok(OutputFormat::Pcm));
        let mut ring = device.create_ring(4, 4, 48000).unwrap();
        assert!(matches!(
            device.create_ring(4, 4, 48000),
            Err(DeviceError::RingBusy)
        ));

        for (i, date) in [0, 500, 900].into_iter().enumerate() {
            ring.write_slot(date, |slot| slot.fill(i as u8 + 1));
            ring.advance();
        }
        device.destroy_ring(ring);

        let stats = device.take_playback_result().unwrap().unwrap();
        assert_eq!(stats.bursts, 3);
        assert_eq!(stats.last_date, Some(900));
        assert_eq!(
            *buffer.0.lock().unwrap(),
            vec![1, 1, 1, 1, 2, 2, 2, 2, 3, 3, 3, 3]
        );
    }

    #[test]
    fn rejected_geometry_keeps_output() {
        let buffer = SharedBuffer::default();
        let mut device = FileSinkDevice::new(
            Box::new(buffer.clone()),
            Arc::new(ManualClock::new(0)),
            true,
            None,
        );

        assert!(matches!(
            device.create_ring(12, 4, 48000),
            Err(DeviceError::InvalidRingCapacity(12))
        ));

        let mut ring = device.create_ring(4, 4, 48000).unwrap();
        ring.write_slot(10, |slot| slot.fill(7));
        ring.advance();
        device.destroy_ring(ring);

        let stats = device.take_playback_result().unwrap().unwrap();
        assert_eq!(stats.bursts, 1);
        assert_eq!(*buffer.0.lock().unwrap(), vec![7, 7, 7, 7]);
    }
}
