//! Pass-through session: setup, streaming loop and teardown.
//!
//! A session owns the synchronizer, the timing state and the producer side
//! of the output ring. It runs once:
//!
//! 1. switch the device to the pass-through format,
//! 2. find the first syncframe and check its sample rate,
//! 3. create the burst ring,
//! 4. date, encode and publish every frame until the input stops, ends or
//!    fails,
//! 5. tear everything down and restore the previous device format.
//!
//! Teardown also runs after a failed setup, for whatever was acquired.

use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::Duration;

use log::{Level, debug, error, info, warn};

use crate::log_or_err;
use crate::output::{OutputDevice, OutputFormat};
use crate::process::burst::{BurstEncoder, SPDIF_FRAME_SIZE, WordOrder};
use crate::process::sync::{FrameSynchronizer, SyncedFrame};
use crate::process::timing::TimingReconciler;
use crate::structs::syncinfo::NOMINAL_SAMPLE_RATE;
use crate::utils::bitstream::BitCursor;
use crate::utils::clock::{Clock, Mtime};
use crate::utils::errors::{InputError, SessionError};
use crate::utils::fifo::InputState;
use crate::utils::ring::{RingProducer, Space};

/// How long the producer waits on a full ring before polling the input
/// state again.
const FULL_RING_POLL: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// Format requested from the device.
    pub format: OutputFormat,
    /// Ring slots, a power of two.
    pub ring_capacity: usize,
    pub word_order: WordOrder,
    /// Diagnostics at or above this severity abort the session setup.
    pub fail_level: Level,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Spdif,
            ring_capacity: 64,
            word_order: WordOrder::Big,
            fail_level: Level::Error,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Negotiating,
    Synchronized,
    Streaming,
    Erroring,
    Terminating,
    Done,
}

/// How a session that got past setup ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    /// Stopped by the host, or the input ended.
    Stopped,
    /// Upstream signalled an error.
    Error,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionReport {
    pub frames_synced: u64,
    pub frames_published: u64,
    pub frames_late: u64,
    pub false_syncs: u64,
    pub bytes_skipped: u64,
    pub discontinuities: u64,
}

impl Display for SessionReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} frames synced, {} published, {} late, {} false syncs, {} bytes skipped, {} timestamp discontinuities",
            self.frames_synced,
            self.frames_published,
            self.frames_late,
            self.false_syncs,
            self.bytes_skipped,
            self.discontinuities
        )
    }
}

pub struct Session<C: BitCursor, D: OutputDevice> {
    config: SessionConfig,
    cursor: C,
    device: D,
    clock: Arc<dyn Clock>,
    state: SessionState,
    synchronizer: FrameSynchronizer,
    timing: TimingReconciler,
    encoder: BurstEncoder,
    ring: Option<RingProducer>,
    previous_format: Option<OutputFormat>,
    report: SessionReport,
}

impl<C: BitCursor, D: OutputDevice> Session<C, D> {
    pub fn new(config: SessionConfig, cursor: C, device: D, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            cursor,
            device,
            clock,
            state: SessionState::Uninitialized,
            synchronizer: FrameSynchronizer::default(),
            timing: TimingReconciler::default(),
            encoder: BurstEncoder::new(config.word_order, SPDIF_FRAME_SIZE),
            ring: None,
            previous_format: None,
            report: SessionReport::default(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn report(&self) -> &SessionReport {
        &self.report
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    pub fn cursor(&self) -> &C {
        &self.cursor
    }

    /// Runs the session to completion.
    ///
    /// `Err` means setup failed; the device is left in its previous format.
    /// Once streaming started the result is always `Ok`.
    ///
    /// Publishing waits while the ring is full, so the device has to drain
    /// its ring or close it. If it does neither, `run` returns only once the
    /// input is stopped or fails.
    pub fn run(&mut self) -> Result<ExitStatus, SessionError> {
        if self.state != SessionState::Uninitialized {
            return Err(SessionError::AlreadyStarted);
        }

        let result = match self.setup() {
            Ok(first) => Ok(self.stream(first)),
            Err(e) => {
                error!("Session setup failed: {e}");
                Err(e)
            }
        };

        self.teardown();
        result
    }

    fn setup(&mut self) -> Result<SyncedFrame, SessionError> {
        self.state = SessionState::Negotiating;
        let previous = self
            .device
            .negotiate_format(self.config.format)
            .map_err(SessionError::Negotiation)?;
        self.previous_format = Some(previous);
        debug!("Output switched to {}, was {previous}", self.config.format);

        let first = self
            .synchronizer
            .next_frame(&mut self.cursor)
            .map_err(SessionError::InitialSync)?;
        self.state = SessionState::Synchronized;
        info!("AC-3 stream: {}", first.descriptor);

        let sample_rate = first.descriptor.sample_rate;
        if sample_rate != NOMINAL_SAMPLE_RATE {
            log_or_err!(
                self.config,
                Level::Warn,
                SessionError::OffNominalSampleRate(sample_rate)
            );
        }
        self.timing.set_sample_rate(sample_rate);

        let ring = self
            .device
            .create_ring(self.config.ring_capacity, SPDIF_FRAME_SIZE, sample_rate)
            .map_err(SessionError::Ring)?;
        self.ring = Some(ring);

        Ok(first)
    }

    fn stream(&mut self, first: SyncedFrame) -> ExitStatus {
        self.state = SessionState::Streaming;
        let mut synced = first;

        loop {
            if let Some(status) = self.input_status() {
                return self.finish(status);
            }

            let descriptor = synced.descriptor;
            self.timing.set_sample_rate(descriptor.sample_rate);
            let date = self.timing.next_output_timestamp(synced.timestamp);

            if date > self.clock.now() {
                if let Err(status) = self.wait_for_slot() {
                    return self.finish(status);
                }
                self.publish(date);
            } else {
                self.report.frames_late += 1;
                debug!("Dropping late frame dated {date} us");
            }

            synced = match self.synchronizer.next_frame(&mut self.cursor) {
                Ok(next) => next,
                Err(e) => {
                    let status = match e.input_error() {
                        InputError::Upstream => {
                            error!("{e}");
                            ExitStatus::Error
                        }
                        _ => {
                            debug!("{e}");
                            ExitStatus::Stopped
                        }
                    };
                    return self.finish(status);
                }
            };

            if synced.descriptor.sample_rate != descriptor.sample_rate {
                warn!(
                    "Sample rate changed from {} Hz to {} Hz",
                    descriptor.sample_rate, synced.descriptor.sample_rate
                );
            }
        }
    }

    fn input_status(&self) -> Option<ExitStatus> {
        match self.cursor.state() {
            InputState::Stopped => Some(ExitStatus::Stopped),
            InputState::Failed => Some(ExitStatus::Error),
            InputState::Running | InputState::EndOfStream => None,
        }
    }

    fn finish(&mut self, status: ExitStatus) -> ExitStatus {
        if status == ExitStatus::Error {
            self.state = SessionState::Erroring;
        }
        status
    }

    /// Waits until the consumer has released a slot.
    fn wait_for_slot(&self) -> Result<(), ExitStatus> {
        let Some(ring) = &self.ring else {
            return Err(ExitStatus::Stopped);
        };

        loop {
            match ring.wait_for_space(FULL_RING_POLL) {
                Space::Free => return Ok(()),
                Space::Closed => {
                    warn!("Output ring closed by the consumer");
                    return Err(ExitStatus::Stopped);
                }
                Space::Full => {
                    if let Some(status) = self.input_status() {
                        return Err(status);
                    }
                }
            }
        }
    }

    fn publish(&mut self, date: Mtime) {
        let Some(ring) = self.ring.as_mut() else {
            return;
        };
        let Some(descriptor) = self.synchronizer.descriptor() else {
            return;
        };

        let frame = self.synchronizer.frame();
        let encoder = &self.encoder;
        ring.write_slot(date, |slot| encoder.encode(descriptor, frame, slot));
        let index = ring.advance();

        self.report.frames_published += 1;
        debug!("Published burst dated {date} us, write index {index}");
    }

    fn teardown(&mut self) {
        self.state = SessionState::Terminating;

        if let Some(ring) = self.ring.take() {
            ring.shutdown();
            self.device.destroy_ring(ring);
        }
        if let Some(previous) = self.previous_format.take() {
            self.device.restore_format(previous);
        }
        self.synchronizer.release();

        self.report.frames_synced = self.synchronizer.frames();
        self.report.false_syncs = self.synchronizer.false_syncs();
        self.report.bytes_skipped = self.synchronizer.bytes_skipped();
        self.report.discontinuities = self.timing.discontinuities();
        info!("Session finished: {}", self.report);

        self.state = SessionState::Done;
    }
}
