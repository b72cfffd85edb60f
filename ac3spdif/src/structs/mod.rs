//! Data structures representing AC-3 bitstream components.
//!
//! Contains the syncframe header fields needed to size and describe a frame,
//! and a borrowed view over one complete syncframe for integrity checks.

pub mod frame;
pub mod syncinfo;
