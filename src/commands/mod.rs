//! Command-line front end

pub mod list;
pub mod logging;
pub mod play;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Parser};

use crate::audio::midi::backend::SystemBackend;
use crate::audio::midi::reset::ResetProtocol;
use crate::config::{DeviceRef, PlaybackConfig, SynthConfig};
use crate::error::Result;

/// Argument or device failure
pub const EXIT_FAILURE: u8 = 1;
/// Playback stopped by Ctrl-C
pub const EXIT_INTERRUPTED: u8 = 130;

#[derive(Parser, Debug, Default)]
#[command(name = "playsmf", version, about = "Play Standard MIDI Files on a MIDI device or the built-in synthesizer")]
pub struct Args {
    /// MIDI files to play, in order
    pub files: Vec<PathBuf>,

    /// List MIDI devices
    #[arg(short = 'l', long)]
    pub list: bool,

    /// When supplied with -l, list all MIDI devices
    #[arg(short = 'a', long)]
    pub all: bool,

    /// When supplied with -l, print the list as JSON
    #[arg(long, requires = "list")]
    pub json: bool,

    /// Output port (index shown with -l)
    #[arg(short = 'p', long = "port", value_name = "INDEX", conflicts_with = "port_name")]
    pub port: Option<usize>,

    /// Output device name (name shown with -l)
    #[arg(short = 'P', long = "port-name", value_name = "NAME")]
    pub port_name: Option<String>,

    /// SoundFont (path to .sf2 file)
    #[arg(short = 's', long = "soundfont", value_name = "FILE")]
    pub soundfont: Option<PathBuf>,

    /// Reset method: one of (gm gs sc88 xg mu100 doc mt32 fb01)
    #[arg(short = 'r', long = "reset", value_name = "NAME")]
    pub reset: Option<String>,

    /// Audio output used by the built-in synthesizer
    #[arg(long, value_name = "DEVICE")]
    pub audio_device: Option<String>,

    /// More log output (-v info, -vv debug, -vvv trace)
    #[arg(short = 'v', long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Append log output to FILE instead of stderr
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,
}

impl Args {
    /// Validate the arguments into a playback configuration
    pub fn playback_config(&self) -> Result<PlaybackConfig> {
        let device = match (&self.port, &self.port_name) {
            (Some(index), _) => Some(DeviceRef::Index(*index)),
            (None, Some(name)) => Some(DeviceRef::Name(name.clone())),
            (None, None) => None,
        };

        let reset = match &self.reset {
            Some(name) => ResetProtocol::from_name(name)?,
            None => ResetProtocol::default(),
        };

        let synth = SynthConfig {
            audio_device: self.audio_device.clone(),
            ..SynthConfig::from_env()
        };

        Ok(PlaybackConfig {
            device,
            reset,
            sound_bank: self.soundfont.clone(),
            files: self.files.clone(),
            synth,
        })
    }
}

/// Run one invocation and map the result to a process exit code
pub fn run(args: Args) -> ExitCode {
    let config = match args.playback_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::from(EXIT_FAILURE);
        }
    };
    log::debug!("Configuration: {:?}", config);

    let backend = SystemBackend::new(config.synth.clone());

    if args.list {
        if let Err(e) = list::print_devices(&backend, args.all, args.json) {
            eprintln!("{}", e);
            return ExitCode::from(EXIT_FAILURE);
        }
        if config.files.is_empty() {
            return ExitCode::SUCCESS;
        }
    }

    if config.files.is_empty() {
        eprintln!("No MIDI files given. Use --help for usage.");
        return ExitCode::from(EXIT_FAILURE);
    }

    play::play_files(&backend, &config)
}
