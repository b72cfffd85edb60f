//! Session settings from an optional YAML file and the command line.
//!
//! ```yaml
//! ring-capacity: 32
//! word-order: little
//! preroll-ms: 250
//! packet-size: 2048
//! packet-header-len: 3
//! strict: true
//! ```

use std::fs;
use std::path::Path;

use ac3spdif::process::session::SessionConfig;
use ac3spdif::utils::clock::Mtime;
use anyhow::{Context, Result, ensure};
use log::Level;
use serde::Deserialize;

use crate::cli::command::{Cli, RunArgs, WordOrderArg};

pub const DEFAULT_PREROLL_MS: u64 = 200;
pub const DEFAULT_PACKET_SIZE: usize = 4096;

#[derive(Debug, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileConfig {
    pub ring_capacity: Option<usize>,
    pub word_order: Option<WordOrderArg>,
    pub preroll_ms: Option<u64>,
    pub packet_size: Option<usize>,
    pub packet_header_len: Option<usize>,
    pub strict: Option<bool>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Cannot read config file {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml_ng::from_str(text)?)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunConfig {
    pub session: SessionConfig,
    /// Added to the current time to date the first packet.
    pub preroll: Mtime,
    pub packet_size: usize,
    /// Bytes stripped from the start of every input packet.
    pub packet_header_len: usize,
}

impl RunConfig {
    pub fn resolve(args: &RunArgs, cli: &Cli) -> Result<Self> {
        let file = match &args.config {
            Some(path) => FileConfig::load(path)?,
            None => FileConfig::default(),
        };

        Self::merge(file, args, cli.strict)
    }

    /// Command line values win over file values, which win over defaults.
    pub fn merge(file: FileConfig, args: &RunArgs, strict: bool) -> Result<Self> {
        let mut session = SessionConfig::default();

        if let Some(capacity) = args.ring_capacity.or(file.ring_capacity) {
            session.ring_capacity = capacity;
        }
        if let Some(order) = args.word_order.or(file.word_order) {
            session.word_order = order.into();
        }
        if strict || file.strict.unwrap_or(false) {
            session.fail_level = Level::Warn;
        }

        ensure!(
            session.ring_capacity >= 2 && session.ring_capacity.is_power_of_two(),
            "Ring capacity must be a power of two >= 2, got {}",
            session.ring_capacity
        );

        let packet_size = args
            .packet_size
            .or(file.packet_size)
            .unwrap_or(DEFAULT_PACKET_SIZE);
        ensure!(packet_size > 0, "Packet size must be positive");

        let packet_header_len = args
            .packet_header_len
            .or(file.packet_header_len)
            .unwrap_or(0);
        ensure!(
            packet_header_len < packet_size,
            "Packet header length {packet_header_len} leaves no payload in {packet_size}-byte packets"
        );

        let preroll_ms = args.preroll_ms.or(file.preroll_ms).unwrap_or(DEFAULT_PREROLL_MS);

        Ok(Self {
            session,
            preroll: preroll_ms as Mtime * 1000,
            packet_size,
            packet_header_len,
        })
    }
}
