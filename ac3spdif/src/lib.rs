#![doc = include_str!("../README.md")]
//!
//! ## Technical Overview
//!
//! ### Syncframes
//!
//! An AC-3 stream is a sequence of syncframes, each starting with the sync
//! word `0x0B77` and carrying 1536 samples per channel. The frame size
//! follows from the `fscod` and `frmsizecod` header fields.
//!
//! ### Bursts
//!
//! Over S/PDIF every syncframe travels in a burst that lasts as long as
//! 1536 stereo PCM samples: a four-word preamble, the syncframe and zero
//! padding.
//!
//! ## Quick Start
//!
//! 1. Feed packets into a [`utils::fifo::PacketFifo`]
//! 2. Wrap it in a [`utils::bitstream::PacketCursor`]
//! 3. Run a [`process::session::Session`] against an [`output::OutputDevice`]
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::sync::mpsc;
//!
//! use ac3spdif::output::MemoryDevice;
//! use ac3spdif::process::session::{Session, SessionConfig};
//! use ac3spdif::utils::bitstream::PacketCursor;
//! use ac3spdif::utils::clock::MonotonicClock;
//! use ac3spdif::utils::fifo::{Packet, PacketFifo};
//!
//! let fifo = PacketFifo::default();
//! fifo.push(Packet::new(std::fs::read("stream.ac3")?, Some(100_000)))?;
//! fifo.end_of_stream();
//!
//! // A playback thread drains the ring into the channel.
//! let (tx, rx) = mpsc::channel();
//!
//! let mut session = Session::new(
//!     SessionConfig::default(),
//!     PacketCursor::new(fifo),
//!     MemoryDevice::default().with_sink(tx),
//!     Arc::new(MonotonicClock::default()),
//! );
//!
//! let status = session.run()?;
//! println!("{status:?}: {}", session.report());
//!
//! for burst in rx.try_iter() {
//!     println!("burst dated {} us", burst.timestamp);
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

/// Output device boundary and an in-memory device.
pub mod output;

/// Processing stages of a pass-through session.
///
/// 1. **Synchronization** ([`process::sync`]): Finds syncframes in the input.
///
/// 2. **Timing** ([`process::timing`]): Dates every frame.
///
/// 3. **Burst Encoding** ([`process::burst`]): Wraps frames into IEC 61937
///    bursts.
///
/// 4. **Session** ([`process::session`]): Drives the stages and the output ring.
pub mod process;

/// Data structures representing AC-3 format components.
///
/// - **Sync Info** ([`structs::syncinfo`]): Header fields and stream descriptor
/// - **Frames** ([`structs::frame`]): Complete syncframes and CRC checks
pub mod structs;

/// Utility functions and supporting infrastructure.
///
/// - **Bit Cursor** ([`utils::bitstream`]): Bit extraction over queued packets
/// - **Bitstream I/O** ([`utils::bitstream_io`]): Header field reading
/// - **Clocks** ([`utils::clock`]): Microsecond time sources
/// - **CRC Validation** ([`utils::crc`]): Error detection
/// - **Error Handling** ([`utils::errors`]): Error types
/// - **Packet Queue** ([`utils::fifo`]): Blocking input FIFO
/// - **Output Ring** ([`utils::ring`]): Burst handoff to the playback thread
pub mod utils;
