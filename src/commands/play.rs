//! Playback of the files named on the command line

use std::process::ExitCode;

use super::{EXIT_FAILURE, EXIT_INTERRUPTED};
use crate::audio::midi::device::{DeviceSelector, MidiBackend};
use crate::config::PlaybackConfig;
use crate::session::{CancelOutcome, FileOutcome, PlaybackSession};

/// Resolve the device, prepare a session and play every file.
///
/// Ctrl-C stops playback and runs the regular shutdown. While teardown runs it
/// is ignored; when nothing is open it exits immediately.
pub fn play_files(backend: &dyn MidiBackend, config: &PlaybackConfig) -> ExitCode {
    let port = match &config.device {
        Some(device) => match DeviceSelector::new(backend).resolve(device) {
            Ok(port) => Some(port),
            Err(e) => {
                eprintln!("{}", e);
                return ExitCode::from(EXIT_FAILURE);
            }
        },
        None => None,
    };

    let session = PlaybackSession::new(config.reset);
    let handle = session.handle();
    if let Err(e) = ctrlc::set_handler(move || match handle.cancel() {
        CancelOutcome::Inactive => std::process::exit(i32::from(EXIT_INTERRUPTED)),
        CancelOutcome::Stopping | CancelOutcome::TearingDown => {}
    }) {
        log::warn!("Failed to install Ctrl-C handler: {}", e);
    }

    if let Err(e) = session.prepare(backend, port.as_ref(), config.sound_bank.as_deref()) {
        eprintln!("{}", e);
        return ExitCode::from(EXIT_FAILURE);
    }

    let count = config.files.len();
    println!("Playing {} file{}...", count, if count > 1 { "s" } else { "" });

    let report = session.play_all_with(&config.files, |path| {
        println!("Playing {}...", path.display());
    });
    for failed in report.failures() {
        if let FileOutcome::Failed(e) = &failed.outcome {
            eprintln!("{}", e);
        }
    }
    log::info!("Played {} of {} files", report.played(), count);

    session.shutdown();

    if report.interrupted {
        ExitCode::from(EXIT_INTERRUPTED)
    } else {
        ExitCode::SUCCESS
    }
}
