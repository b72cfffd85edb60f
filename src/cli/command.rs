use std::path::PathBuf;

use ac3spdif::process::burst::WordOrder;
use clap::{Args, Parser as ClapParser, Subcommand, ValueEnum};
use serde::Deserialize;

#[derive(Debug, ClapParser)]
#[command(
    name         = env!("CARGO_PKG_NAME"),
    version      = env!("CARGO_PKG_VERSION"),
    long_version = concat!(
        env!("CARGO_PKG_VERSION"),
        " (ac3spdif ", env!("AC3SPDIF_VERSION"),
        ", built ", env!("BUILD_TIMESTAMP"), ")"
    ),
    about        = "Real-time AC-3 pass-through to external decoders over S/PDIF",
    long_about   = None,
)]
pub struct Cli {
    /// Set the log level
    #[arg(long, global = true, value_enum, default_value_t = LogLevel::Info)]
    pub loglevel: LogLevel,

    /// Treat warnings as fatal errors (fail on first warning).
    #[arg(long, global = true)]
    pub strict: bool,

    /// Log output format.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Plain)]
    pub log_format: LogFormat,

    /// Show progress bars during operations.
    #[arg(long, global = true)]
    pub progress: bool,

    /// Choose an operation to perform.
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Stream an AC-3 elementary stream as IEC 61937 bursts in real time.
    Run(RunArgs),

    /// Print stream information
    Info(InfoArgs),
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Input AC-3 elementary stream (use "-" for stdin).
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Where bursts are written (use "-" for stdout). Discarded if omitted.
    #[arg(long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// YAML session configuration. Command line options take precedence.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Number of burst slots in the output ring (power of two).
    #[arg(long, value_name = "N")]
    pub ring_capacity: Option<usize>,

    /// Byte order of the 16-bit burst words.
    #[arg(long, value_enum)]
    pub word_order: Option<WordOrderArg>,

    /// Delay between reading the first packet and playing its first frame.
    #[arg(long, value_name = "MS")]
    pub preroll_ms: Option<u64>,

    /// Size of the packets the input is split into.
    #[arg(long, value_name = "BYTES")]
    pub packet_size: Option<usize>,

    /// Bytes to strip from the start of every packet (3 for DVD private
    /// stream AC-3 payloads).
    #[arg(long, value_name = "BYTES")]
    pub packet_header_len: Option<usize>,

    /// Write bursts as soon as they are published instead of at their
    /// presentation time.
    #[arg(long)]
    pub free_run: bool,
}

#[derive(Debug, Args)]
pub struct InfoArgs {
    /// Input AC-3 elementary stream.
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LogLevel {
    /// Disable logging output.
    Off,
    /// No output except errors.
    Error,
    /// Show warnings and errors.
    Warn,
    /// Show info, warnings and errors (default).
    Info,
    /// Show debug, info, warnings and errors.
    Debug,
    /// Show all log messages including trace.
    Trace,
}

impl LogLevel {
    /// Convert LogLevel to log::LevelFilter
    pub fn to_level_filter(self) -> log::LevelFilter {
        match self {
            LogLevel::Off => log::LevelFilter::Off,
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LogFormat {
    /// Colorized human-readable text.
    Plain,
    /// Structured JSON per log record.
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WordOrderArg {
    /// Big-endian words, the payload matches the AC-3 frame.
    Big,
    /// Little-endian words, for S16LE sound devices.
    Little,
}

impl From<WordOrderArg> for WordOrder {
    fn from(arg: WordOrderArg) -> Self {
        match arg {
            WordOrderArg::Big => WordOrder::Big,
            WordOrderArg::Little => WordOrder::Little,
        }
    }
}
