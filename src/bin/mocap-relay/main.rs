//! Command line entry point for both halves of the relay.

use clap::Parser;
use mocap_relay::{
    accumulator::FrameAccumulator,
    args::{
        CommandTask::{Recv, Send},
        RelayArgs,
    },
    capture::{Capture, SessionEnd},
    config::{ReceiverConfig, RelayConfig, SenderConfig},
    error::RelayError,
    frame::FrameEncoder,
    gui::{fold_until_stop, FoldError},
    interrupt, persist,
    receiver::{spawn_receiver, FrameReceiver},
    sender::{FrameSender, StreamOptions},
    source::CsvSource,
};

use log::{error, info, warn};
use std::{
    io::{stdout, IsTerminal},
    path::Path,
    process::ExitCode,
};

const INTERRUPTED_EXIT: u8 = 130;

// Example:
// cargo run -- recv --port 7000 --out capture.csv
// cargo run -- send recording.csv --port 7000 --delay 0.01 --loop
// cargo run -- recv --config relay.ron --skip-leading 15 --headless

fn main() -> ExitCode {
    env_logger::init();
    let args = RelayArgs::parse();

    match run(args) {
        Ok(code) => code,
        Err(e) => {
            error!("{}", e);
            eprintln!("mocap-relay: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Runs one subcommand to completion. A session ended by a signal still
/// cleans up, then reports the interruption like a shell would.
fn run(args: RelayArgs) -> Result<ExitCode, RelayError> {
    let config = match &args.config {
        Some(path) => RelayConfig::from_path(path)?,
        None => RelayConfig::default(),
    };
    interrupt::install().map_err(RelayError::Signal)?;

    match args.command {
        Send(cmd) => run_send(&cmd.file, cmd.apply(config.send)),
        Recv(cmd) => run_recv(cmd.apply(config.recv)),
    }
}

fn run_send(file: &Path, config: SenderConfig) -> Result<ExitCode, RelayError> {
    let source = CsvSource::from_path(file, config.delimiter)?;
    let options = StreamOptions {
        cadence: config.cadence()?,
        looping: config.looping,
    };

    let encoder = FrameEncoder::new(config.format, config.pad_leading);
    let sender = FrameSender::connect(config.destination()?, encoder)?;
    let summary = sender.stream(&source, &options, interrupt::interrupted)?;
    sender.close();

    info!(
        "Sent {} frames over {} passes, skipped {} rows, dropped {}",
        summary.sent, summary.passes, summary.skipped, summary.dropped
    );
    if summary.interrupted {
        info!("Stream interrupted");
        return Ok(ExitCode::from(INTERRUPTED_EXIT));
    }
    Ok(ExitCode::SUCCESS)
}

fn run_recv(config: ReceiverConfig) -> Result<ExitCode, RelayError> {
    let receiver = FrameReceiver::bind(config.bind_addr()?, config.datagram_limit()?, config.format)?;
    let handle = spawn_receiver(receiver)?;
    let capture = Capture::new(
        handle,
        FrameAccumulator::with_skip_leading(config.skip_leading),
        config.max_frames,
    );

    let (capture, monitor_error) = if config.headless || !stdout().is_terminal() {
        (capture.run_until(interrupt::interrupted), None)
    } else {
        match fold_until_stop(
            "Receiving frames...",
            capture,
            |c: Capture| c.step_unless(interrupt::interrupted),
            |c: &Capture| c.status_line(),
        ) {
            Ok(capture) => (capture, None),
            Err(FoldError {
                error,
                state: Some(capture),
            }) => (capture, Some(error)),
            Err(FoldError { error, state: None }) => return Err(error.into()),
        }
    };

    // Whatever stopped the session, keep what was received
    let (acc, summary) = capture.finish();
    println!("{}", summary.shape);

    match &config.out {
        Some(path) => persist::write_to_path(&acc, path, config.delimiter)?,
        None if !acc.is_empty() => warn!("No --out given, {} frames discarded", acc.len()),
        None => {}
    }

    if let Some(error) = monitor_error {
        return Err(error.into());
    }
    match summary.ended {
        SessionEnd::Interrupted => Ok(ExitCode::from(INTERRUPTED_EXIT)),
        _ => Ok(ExitCode::SUCCESS),
    }
}
