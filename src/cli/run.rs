use std::process::ExitCode;
use std::sync::Arc;

use ac3spdif::process::session::{ExitStatus, Session};
use ac3spdif::utils::bitstream::PacketCursor;
use ac3spdif::utils::clock::{Clock, MonotonicClock};
use ac3spdif::utils::fifo::PacketFifo;
use anyhow::{Result, anyhow};
use indicatif::MultiProgress;

use super::command::{Cli, RunArgs};
use super::progress::create_progress_bar;
use crate::config::RunConfig;
use crate::input::{FeederConfig, spawn_feeder};
use crate::sink::{FileSinkDevice, open_output};
use crate::timestamp::mtime_str;

pub fn cmd_run(args: &RunArgs, cli: &Cli, multi: Option<&MultiProgress>) -> Result<ExitCode> {
    let config = RunConfig::resolve(args, cli)?;

    log::info!(
        "Passing through AC-3 stream: {} (strict mode: {}, ring: {} slots, word order: {:?})",
        args.input.display(),
        config.session.fail_level == log::Level::Warn,
        config.session.ring_capacity,
        config.session.word_order
    );

    if let Some(ref path) = args.output {
        log::info!("Output path specified: {}", path.display());
    }

    let pb = if let Some(multi) = multi {
        Some(create_progress_bar(multi, "waiting for first frame")?)
    } else {
        None
    };

    let output = open_output(args.output.as_deref())?;
    let clock: Arc<dyn Clock> = Arc::new(MonotonicClock::default());
    let fifo = PacketFifo::default();

    let first_pts = clock.now() + config.preroll;
    log::debug!("First packet dated {}", mtime_str(first_pts));

    let feeder = spawn_feeder(FeederConfig {
        input_path: args.input.clone(),
        packet_size: config.packet_size,
        first_pts: Some(first_pts),
        fifo: fifo.clone(),
    });

    let device = FileSinkDevice::new(output, clock.clone(), args.free_run, pb.clone());
    let cursor = PacketCursor::new(fifo.clone()).with_packet_header_len(config.packet_header_len);
    let mut session = Session::new(config.session, cursor, device, clock);

    let result = session.run();

    // Releases the feeder when the session ended before the input did.
    fifo.stop();
    let fed = feeder
        .join()
        .map_err(|_| anyhow!("Input thread panicked"))?;
    let playback = session.device_mut().take_playback_result();

    if let Some(pb) = &pb {
        let message = match &result {
            Ok(ExitStatus::Stopped) => "done",
            Ok(ExitStatus::Error) => "input failed",
            Err(_) => "setup failed",
        };
        pb.finish_with_message(message);
    }

    let status = result?;
    let bytes_fed = fed?;
    let stats = playback.transpose()?.unwrap_or_default();

    let report = session.report();
    log::info!(
        "Read {bytes_fed} bytes, published {} of {} frames, wrote {} bursts ({} bytes, {} underruns)",
        report.frames_published,
        report.frames_synced,
        stats.bursts,
        stats.bytes,
        stats.underruns
    );

    Ok(match status {
        ExitStatus::Stopped => ExitCode::SUCCESS,
        ExitStatus::Error => ExitCode::FAILURE,
    })
}
