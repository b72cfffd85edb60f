//! Utility functions and supporting infrastructure.
//!
//! Provides the input packet queue and its bit cursor, header bit reading,
//! CRC validation, clocks, error types and the output burst ring.

pub mod bitstream;
pub mod bitstream_io;
pub mod clock;
pub mod crc;
pub mod errors;
pub mod fifo;
pub mod ring;
