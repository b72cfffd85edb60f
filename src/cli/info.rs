use ac3spdif::log_or_err;
use ac3spdif::process::sync::FrameSynchronizer;
use ac3spdif::structs::frame::Ac3Frame;
use ac3spdif::structs::syncinfo::StreamDescriptor;
use ac3spdif::utils::bitstream::PacketCursor;
use ac3spdif::utils::errors::InputError;
use ac3spdif::utils::fifo::PacketFifo;
use anyhow::{Result, anyhow};
use indicatif::MultiProgress;
use log::Level;

use super::command::{Cli, InfoArgs};
use super::progress::create_progress_bar;
use crate::input::{FeederConfig, spawn_feeder};
use crate::timestamp::time_str;

struct AnalysisState {
    fail_level: Level,
}

#[derive(Default)]
struct AnalysisResult {
    first: Option<StreamDescriptor>,
    frames: u64,
    frame_bytes: u64,
    duration_secs: f64,
    descriptor_changes: u64,
    crc1_failures: u64,
    crc2_failures: u64,
    false_syncs: u64,
    bytes_skipped: u64,
}

pub fn cmd_info(args: &InfoArgs, cli: &Cli, multi: Option<&MultiProgress>) -> Result<()> {
    log::info!("Analyzing AC-3 stream: {}", args.input.display());

    let result = analyze_stream(args, cli, multi)?;

    match result.first {
        Some(ref descriptor) => print_summary(descriptor, &result),
        None => {
            println!("No AC-3 sync word found in the file.");
            println!("This doesn't appear to be a valid AC-3 stream.");
        }
    }

    Ok(())
}

fn analyze_stream(
    args: &InfoArgs,
    cli: &Cli,
    multi: Option<&MultiProgress>,
) -> Result<AnalysisResult> {
    let state = AnalysisState {
        fail_level: if cli.strict { Level::Warn } else { Level::Error },
    };

    let pb = if let Some(multi) = multi {
        Some(create_progress_bar(multi, "scanning")?)
    } else {
        None
    };

    let fifo = PacketFifo::default();
    let feeder = spawn_feeder(FeederConfig {
        input_path: args.input.clone(),
        packet_size: 64 * 1024,
        first_pts: None,
        fifo: fifo.clone(),
    });

    let mut cursor = PacketCursor::new(fifo.clone());
    let mut synchronizer = FrameSynchronizer::default();
    let mut result = AnalysisResult::default();

    let scan = scan_frames(&mut cursor, &mut synchronizer, &state, &mut result);

    fifo.stop();
    feeder
        .join()
        .map_err(|_| anyhow!("Input thread panicked"))??;
    scan?;

    result.false_syncs = synchronizer.false_syncs();
    result.bytes_skipped = synchronizer.bytes_skipped();

    if let Some(pb) = pb {
        pb.finish_with_message(format!("{} frames", result.frames));
    }

    Ok(result)
}

fn scan_frames(
    cursor: &mut PacketCursor,
    synchronizer: &mut FrameSynchronizer,
    state: &AnalysisState,
    result: &mut AnalysisResult,
) -> Result<()> {
    loop {
        let synced = match synchronizer.next_frame(cursor) {
            Ok(synced) => synced,
            Err(e) if e.input_error() == InputError::EndOfStream => {
                log::debug!("{e}");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };
        let descriptor = synced.descriptor;

        match result.first {
            None => {
                log::info!("AC-3 stream: {descriptor}");
                result.first = Some(descriptor);
            }
            Some(first) if first != descriptor => {
                result.descriptor_changes += 1;
                log_or_err!(
                    state,
                    Level::Warn,
                    anyhow!(
                        "Stream parameters changed at frame {}: {descriptor}",
                        result.frames
                    )
                );
            }
            Some(_) => {}
        }

        let crc = Ac3Frame::new(synchronizer.frame())?.check_crc();
        if !crc.crc1_ok {
            result.crc1_failures += 1;
        }
        if !crc.crc2_ok {
            result.crc2_failures += 1;
        }
        if !crc.is_ok() {
            log_or_err!(
                state,
                Level::Warn,
                anyhow!(
                    "CRC mismatch in frame {} (crc1 {}, crc2 {})",
                    result.frames,
                    if crc.crc1_ok { "ok" } else { "bad" },
                    if crc.crc2_ok { "ok" } else { "bad" }
                )
            );
        }

        result.frames += 1;
        result.frame_bytes += descriptor.frame_size as u64;
        result.duration_secs += descriptor.frame_duration() as f64 / 1_000_000.0;
    }
}

fn print_summary(descriptor: &StreamDescriptor, result: &AnalysisResult) {
    println!("Stream Information");
    println!("  Sample rate               {} Hz", descriptor.sample_rate);
    println!("  Bitrate                   {} kbps", descriptor.bitrate_kbps);
    println!("  Frame size                {} bytes", descriptor.frame_size);
    println!("  Channels                  {}", descriptor.channels());
    println!("  bsid / bsmod              {} / {}", descriptor.bsid, descriptor.bsmod);
    println!();

    println!("Analysis Summary");
    println!("  Frames processed          {}", result.frames);

    let size_mb = result.frame_bytes as f64 / 1_000_000.0;
    println!(
        "  Size                      {size_mb:.2} MB ({} bytes)",
        result.frame_bytes
    );
    println!("  Duration                  {}", time_str(result.duration_secs));

    if result.duration_secs > 0.0 {
        let avg_data_rate_kbps = (result.frame_bytes as f64 * 8.0) / (result.duration_secs * 1000.0);
        println!("  Average data rate         {avg_data_rate_kbps:.1} kbps");
    }

    println!("  Parameter changes         {}", result.descriptor_changes);
    println!("  False sync words          {}", result.false_syncs);
    println!("  Bytes skipped             {}", result.bytes_skipped);
    println!("  CRC1 / CRC2 failures      {} / {}", result.crc1_failures, result.crc2_failures);
    println!();
}
