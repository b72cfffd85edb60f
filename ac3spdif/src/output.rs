//! Output device boundary.
//!
//! The session switches the device to the pass-through format, asks it for a
//! burst ring and hands the ring back at teardown. [`MemoryDevice`] keeps
//! everything in memory and either plays its ring into a channel or exposes
//! the consumer side for inspection.

use std::fmt::{Display, Formatter};
use std::sync::mpsc::Sender;
use std::thread::{self, JoinHandle};

use log::{debug, warn};

use crate::utils::errors::DeviceError;
use crate::utils::ring::{self, BurstSlot, RingConsumer, RingProducer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputFormat {
    /// Linear PCM, the usual device default.
    Pcm,
    /// IEC 61937 compressed pass-through.
    Spdif,
}

impl Display for OutputFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Pcm => write!(f, "pcm"),
            OutputFormat::Spdif => write!(f, "spdif"),
        }
    }
}

pub trait OutputDevice {
    /// Switches to `format` and returns the format that was active before.
    fn negotiate_format(&mut self, format: OutputFormat) -> Result<OutputFormat, DeviceError>;

    /// Allocates a ring of `capacity` slots of `slot_size` bytes played at
    /// `sample_rate`, returning its producer side.
    fn create_ring(
        &mut self,
        capacity: usize,
        slot_size: usize,
        sample_rate: u32,
    ) -> Result<RingProducer, DeviceError>;

    /// Releases a ring obtained from [`create_ring`](Self::create_ring).
    fn destroy_ring(&mut self, ring: RingProducer);

    fn restore_format(&mut self, format: OutputFormat);
}

/// Device that keeps its ring in memory.
///
/// With a sink (see [`with_sink`](Self::with_sink)) every ring is drained by
/// a playback thread forwarding each burst into the channel, and
/// [`destroy_ring`](OutputDevice::destroy_ring) joins that thread once the
/// ring is empty.
///
/// Without a sink nothing drains the ring while the session runs. The
/// consumer side waits in [`take_consumer`](Self::take_consumer), so a
/// session publishing more than `capacity - 1` bursts waits for a free slot
/// until its input is stopped or fails.
#[derive(Debug)]
pub struct MemoryDevice {
    supported: Vec<OutputFormat>,
    format: OutputFormat,
    sink: Option<Sender<BurstSlot>>,
    playback: Option<JoinHandle<u64>>,
    consumer: Option<RingConsumer>,
    ring_attached: bool,
    rings_created: usize,
    restored: Vec<OutputFormat>,
}

impl Default for MemoryDevice {
    fn default() -> Self {
        Self::new(&[OutputFormat::Pcm, OutputFormat::Spdif])
    }
}

impl MemoryDevice {
    /// Device starting in PCM mode that accepts only `supported`.
    pub fn new(supported: &[OutputFormat]) -> Self {
        Self {
            supported: supported.to_vec(),
            format: OutputFormat::Pcm,
            sink: None,
            playback: None,
            consumer: None,
            ring_attached: false,
            rings_created: 0,
            restored: Vec::new(),
        }
    }

    /// Plays every ring into `sink` from a dedicated thread.
    pub fn with_sink(mut self, sink: Sender<BurstSlot>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Consumer side of the most recent ring, once. Always `None` with a sink.
    pub fn take_consumer(&mut self) -> Option<RingConsumer> {
        self.consumer.take()
    }

    pub fn ring_attached(&self) -> bool {
        self.ring_attached
    }

    pub fn rings_created(&self) -> usize {
        self.rings_created
    }

    /// Formats passed to [`OutputDevice::restore_format`], in call order.
    pub fn restored(&self) -> &[OutputFormat] {
        &self.restored
    }
}

impl OutputDevice for MemoryDevice {
    fn negotiate_format(&mut self, format: OutputFormat) -> Result<OutputFormat, DeviceError> {
        if !self.supported.contains(&format) {
            return Err(DeviceError::UnsupportedFormat(format));
        }

        let previous = self.format;
        self.format = format;
        debug!("Output format {previous} -> {format}");

        Ok(previous)
    }

    fn create_ring(
        &mut self,
        capacity: usize,
        slot_size: usize,
        sample_rate: u32,
    ) -> Result<RingProducer, DeviceError> {
        if self.ring_attached {
            return Err(DeviceError::RingBusy);
        }

        let (producer, consumer) = ring::channel(capacity, slot_size, sample_rate)?;
        match &self.sink {
            Some(sink) => self.playback = Some(spawn_playback(consumer, sink.clone())?),
            None => self.consumer = Some(consumer),
        }
        self.ring_attached = true;
        self.rings_created += 1;

        Ok(producer)
    }

    fn destroy_ring(&mut self, ring: RingProducer) {
        ring.shutdown();
        if let Some(playback) = self.playback.take() {
            match playback.join() {
                Ok(bursts) => debug!("Memory playback finished after {bursts} bursts"),
                Err(_) => warn!("Memory playback thread panicked"),
            }
        }
        self.ring_attached = false;
    }

    fn restore_format(&mut self, format: OutputFormat) {
        self.format = format;
        self.restored.push(format);
    }
}

fn spawn_playback(
    mut consumer: RingConsumer,
    sink: Sender<BurstSlot>,
) -> Result<JoinHandle<u64>, DeviceError> {
    thread::Builder::new()
        .name("memory-playback".into())
        .spawn(move || {
            let mut payload = vec![0u8; consumer.slot_size()];
            let mut bursts = 0;

            while let Some(timestamp) = consumer.recv(&mut payload) {
                bursts += 1;
                let slot = BurstSlot {
                    payload: payload.clone().into_boxed_slice(),
                    timestamp,
                };
                if sink.send(slot).is_err() {
                    // Nobody listens anymore; release the producer.
                    consumer.shutdown();
                    break;
                }
            }

            bursts
        })
        .map_err(|e| DeviceError::Io(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn negotiation_reports_previous_format() {
        let mut device = MemoryDevice::default();
        assert_eq!(device.negotiate_format(OutputFormat::Spdif), Ok(OutputFormat::Pcm));
        assert_eq!(device.format(), OutputFormat::Spdif);

        device.restore_format(OutputFormat::Pcm);
        assert_eq!(device.format(), OutputFormat::Pcm);
        assert_eq!(device.restored(), &[OutputFormat::Pcm]);
    }

    #[test]
    fn unsupported_format_is_rejected() {
        let mut device = MemoryDevice::new(&[OutputFormat::Pcm]);
        assert_eq!(
            device.negotiate_format(OutputFormat::Spdif),
            Err(DeviceError::UnsupportedFormat(OutputFormat::Spdif))
        );
        assert_eq!(device.format(), OutputFormat::Pcm);
    }

    #[test]
    fn one_ring_at_a_time() {
        let mut device = MemoryDevice::default();
        let ring = device.create_ring(4, 8, 48000).unwrap();
        assert_eq!(device.create_ring(4, 8, 48000).err(), Some(DeviceError::RingBusy));

        let consumer = device.take_consumer().unwrap();
        device.destroy_ring(ring);
        assert!(consumer.is_closed());
        assert!(!device.ring_attached());
        assert_eq!(device.rings_created(), 1);
    }

    #[test]
    fn sink_receives_bursts_until_shutdown() {
        let (tx, rx) = mpsc::channel();
        let mut device = MemoryDevice::default().with_sink(tx);

        let mut ring = device.create_ring(4, 2, 48000).unwrap();
        assert!(device.take_consumer().is_none());

        for timestamp in [10, 20] {
            ring.write_slot(timestamp, |slot| slot.fill(timestamp as u8));
            ring.advance();
        }
        device.destroy_ring(ring);

        let bursts = rx.try_iter().collect::<Vec<_>>();
        assert_eq!(bursts.len(), 2);
        assert_eq!(bursts[1].timestamp, 20);
        assert_eq!(&bursts[1].payload[..], &[20, 20]);
        assert!(!device.ring_attached());
    }
}
