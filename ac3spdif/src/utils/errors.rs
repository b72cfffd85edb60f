use crate::output::OutputFormat;

#[macro_export]
macro_rules! log_or_err {
    ($state:expr, $level:expr, $err:expr $(,)?) => {{
        if $level <= $state.fail_level {
            return Err($err);
        } else {
            match $level {
                ::log::Level::Error => ::log::error!("{}", $err),
                ::log::Level::Warn => ::log::warn!("{}", $err),
                ::log::Level::Info => ::log::info!("{}", $err),
                ::log::Level::Debug => ::log::debug!("{}", $err),
                ::log::Level::Trace => ::log::trace!("{}", $err),
            }
        }
    }};
}

/// Reasons a bit cursor stops delivering data.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputError {
    #[error("Input stopped by the host")]
    Stopped,

    #[error("End of input stream")]
    EndOfStream,

    #[error("Upstream signalled an error")]
    Upstream,

    #[error("Cannot access {requested} bits at once, at most {max} are supported")]
    TooManyBits { requested: u32, max: u32 },
}

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncError {
    #[error("Sync word not found: {0}")]
    SyncNotFound(InputError),

    #[error("Frame truncated after sync word: {0}")]
    TruncatedFrame(InputError),
}

impl SyncError {
    /// The input condition that ended the scan.
    pub fn input_error(&self) -> InputError {
        match self {
            SyncError::SyncNotFound(e) | SyncError::TruncatedFrame(e) => *e,
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum HeaderError {
    #[error("Invalid syncword, Read {0:#06X}, expected 0x0B77")]
    InvalidSyncWord(u16),

    #[error("Reserved fscod value 3")]
    ReservedSampleRate,

    #[error("frmsizecod must be <= 37. Read {0}")]
    InvalidFrameSizeCode(u8),

    #[error("bsid {0} is not decodable as AC-3 (must be <= 10)")]
    UnsupportedBsid(u8),
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    #[error("Output format {0} is not supported by the device")]
    UnsupportedFormat(OutputFormat),

    #[error("Ring capacity must be a power of two >= 2, got {0}")]
    InvalidRingCapacity(usize),

    #[error("Slot size must be a non-zero multiple of 2 bytes, got {0}")]
    InvalidSlotSize(usize),

    #[error("A ring is already attached to the device")]
    RingBusy,

    #[error("Device I/O failed: {0}")]
    Io(String),
}

#[derive(thiserror::Error, Debug)]
pub enum SessionError {
    #[error("Session was already started")]
    AlreadyStarted,

    #[error("Output format negotiation failed: {0}")]
    Negotiation(DeviceError),

    #[error("Initial synchronization failed: {0}")]
    InitialSync(SyncError),

    #[error("Could not create the output ring: {0}")]
    Ring(DeviceError),

    #[error("Stream sample rate is {0} Hz, only 48000 Hz is tested, expect weird things")]
    OffNominalSampleRate(u32),
}
