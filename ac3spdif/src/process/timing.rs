//! Output timestamp reconstruction for a stream of syncframes.
//!
//! Recovered packet timestamps only exist at packet granularity. Frames
//! without one are dated by adding the nominal frame duration to the
//! previous output timestamp.

use log::warn;

use crate::structs::syncinfo::{NOMINAL_SAMPLE_RATE, frame_duration};
use crate::utils::clock::Mtime;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimingReconciler {
    sample_rate: u32,
    frame_duration: Mtime,
    current: Mtime,
    discontinuities: u64,
}

impl Default for TimingReconciler {
    fn default() -> Self {
        Self::new(NOMINAL_SAMPLE_RATE)
    }
}

impl TimingReconciler {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            frame_duration: frame_duration(sample_rate),
            current: 0,
            discontinuities: 0,
        }
    }

    /// Rederives the nominal frame duration. The running timestamp is kept.
    pub fn set_sample_rate(&mut self, sample_rate: u32) {
        if sample_rate != self.sample_rate {
            self.sample_rate = sample_rate;
            self.frame_duration = frame_duration(sample_rate);
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn frame_duration(&self) -> Mtime {
        self.frame_duration
    }

    /// Last output timestamp handed out, 0 before the first frame.
    pub fn current(&self) -> Mtime {
        self.current
    }

    pub fn discontinuities(&self) -> u64 {
        self.discontinuities
    }

    /// Dates the next frame.
    ///
    /// A recovered timestamp is used verbatim; a jump of more than one frame
    /// duration away from the interpolated date is logged first.
    pub fn next_output_timestamp(&mut self, recovered: Option<Mtime>) -> Mtime {
        self.current = match recovered {
            Some(recovered) => {
                let delta = recovered - self.current - self.frame_duration;
                if delta.abs() > self.frame_duration {
                    self.discontinuities += 1;
                    warn!(
                        "Timestamp discontinuity: {recovered} us, expected {} us ({delta:+} us)",
                        self.current + self.frame_duration
                    );
                }
                recovered
            }
            None => self.current + self.frame_duration,
        };

        self.current
    }
}
