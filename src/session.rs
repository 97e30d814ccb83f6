//! Playback session: prepare once, play files in order, shut down once
//!
//! ```text
//! Idle --prepare--> Preparing --> Prepared --play_file--> Playing(path) --done--> Prepared
//!   \                  |             |                       |
//!    `------------- shutdown -------'-----------------------'--> Closing --> Closed
//! ```
//!
//! A [`SessionHandle`] can be moved to another thread (an interrupt handler)
//! to cancel playback or run the shutdown while the controlling thread is
//! blocked in [`PlaybackSession::play_file`].

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::audio::midi::device::{MidiBackend, PortDescriptor};
use crate::audio::midi::output::OutputChannel;
use crate::audio::midi::player::{PlayOutcome, SequencePlayer};
use crate::audio::midi::reset::ResetProtocol;
use crate::cancel::CancelToken;
use crate::error::{PlaybackError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    /// A device may already be open
    Preparing,
    Prepared,
    Playing(PathBuf),
    /// Teardown in progress
    Closing,
    Closed,
}

/// What an interrupt did to the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    /// Playback was stopped; the controlling thread runs the shutdown
    Stopping,
    /// Teardown is already running and will finish on its own
    TearingDown,
    /// Nothing is open, so there is nothing to stop
    Inactive,
}

/// Result of one input file
#[derive(Debug)]
pub enum FileOutcome {
    /// Played to the end
    Played,
    /// Cancelled before or during playback
    Interrupted,
    /// Could not be read or decoded; the batch moves on
    Failed(PlaybackError),
}

#[derive(Debug)]
pub struct FileReport {
    pub path: PathBuf,
    pub outcome: FileOutcome,
}

/// Per-file outcomes of a batch
#[derive(Debug, Default)]
pub struct SessionReport {
    pub files: Vec<FileReport>,
    pub interrupted: bool,
}

impl SessionReport {
    pub fn played(&self) -> usize {
        self.files
            .iter()
            .filter(|f| matches!(f.outcome, FileOutcome::Played))
            .count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &FileReport> {
        self.files
            .iter()
            .filter(|f| matches!(f.outcome, FileOutcome::Failed(_)))
    }
}

struct SessionShared {
    state: Mutex<SessionState>,
    channel: Mutex<Option<Arc<OutputChannel>>>,
    player: SequencePlayer,
    cancel: CancelToken,
}

impl SessionShared {
    fn cancel(&self) -> CancelOutcome {
        let state = self.state.lock();
        match *state {
            SessionState::Idle | SessionState::Closed => CancelOutcome::Inactive,
            SessionState::Closing => {
                log::debug!("Interrupt ignored while closing");
                CancelOutcome::TearingDown
            }
            SessionState::Preparing | SessionState::Prepared | SessionState::Playing(_) => {
                log::info!("Playback interrupted");
                self.cancel.cancel();
                self.player.stop();
                CancelOutcome::Stopping
            }
        }
    }

    fn shutdown(&self) {
        {
            let mut state = self.state.lock();
            if matches!(*state, SessionState::Closing | SessionState::Closed) {
                return;
            }
            *state = SessionState::Closing;
            self.cancel.cancel();
            self.player.stop();
        }

        let channel = self.channel.lock().take();
        match channel {
            Some(channel) => {
                if let Err(e) = channel.silence_all() {
                    log::warn!("Failed to silence channels: {}", e);
                }
                channel.close(Some(&self.player));
            }
            None => self.player.close(),
        }
        *self.state.lock() = SessionState::Closed;
        log::debug!("Session closed");
    }
}

/// Cloneable control surface for another thread
#[derive(Clone)]
pub struct SessionHandle {
    shared: Arc<SessionShared>,
}

impl SessionHandle {
    /// Stop playback so the controlling thread can shut down.
    ///
    /// Does nothing while idle, closing or closed.
    pub fn cancel(&self) -> CancelOutcome {
        self.shared.cancel()
    }

    /// Silence, reset and release everything. Idempotent.
    pub fn shutdown(&self) {
        self.shared.shutdown();
    }

    pub fn state(&self) -> SessionState {
        self.shared.state.lock().clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.shared.cancel.is_cancelled()
    }
}

/// One output channel and one sequencer for the lifetime of an invocation
pub struct PlaybackSession {
    shared: Arc<SessionShared>,
    protocol: ResetProtocol,
}

impl PlaybackSession {
    pub fn new(protocol: ResetProtocol) -> Self {
        Self {
            shared: Arc::new(SessionShared {
                state: Mutex::new(SessionState::Idle),
                channel: Mutex::new(None),
                player: SequencePlayer::new(),
                cancel: CancelToken::new(),
            }),
            protocol,
        }
    }

    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    pub fn state(&self) -> SessionState {
        self.shared.state.lock().clone()
    }

    pub fn player(&self) -> &SequencePlayer {
        &self.shared.player
    }

    /// Descriptor of the open device, once prepared
    pub fn device(&self) -> Option<PortDescriptor> {
        self.shared
            .channel
            .lock()
            .as_ref()
            .map(|channel| channel.descriptor().clone())
    }

    /// Open the device (built-in synthesizer when `device` is `None`), load
    /// the sound bank and bind the sequencer.
    ///
    /// A sound bank failure is logged and playback continues with the
    /// device's own instruments. Any other failure shuts the session down.
    pub fn prepare(
        &self,
        backend: &dyn MidiBackend,
        device: Option<&PortDescriptor>,
        sound_bank: Option<&Path>,
    ) -> Result<()> {
        {
            let mut state = self.shared.state.lock();
            if *state != SessionState::Idle {
                return Err(PlaybackError::device_unavailable(format!(
                    "session cannot be prepared while {:?}",
                    *state
                )));
            }
            *state = SessionState::Preparing;
        }

        let result = self.open_and_bind(backend, device, sound_bank);
        if result.is_err() {
            self.shutdown();
        }
        result
    }

    fn open_and_bind(
        &self,
        backend: &dyn MidiBackend,
        device: Option<&PortDescriptor>,
        sound_bank: Option<&Path>,
    ) -> Result<()> {
        let channel = Arc::new(OutputChannel::open(backend, device, self.protocol)?);
        // Stored before anything else can fail so shutdown releases it
        *self.shared.channel.lock() = Some(Arc::clone(&channel));

        if let Some(path) = sound_bank {
            match channel.load_sound_bank(path) {
                Ok(Some(_)) => {}
                Ok(None) => log::info!(
                    "{} is not a software synthesizer; sound bank {:?} ignored",
                    channel.descriptor().display_name(),
                    path
                ),
                Err(e) => log::warn!("{}; continuing with default instruments", e),
            }
        }

        self.shared.player.bind(&channel)?;

        let mut state = self.shared.state.lock();
        if *state == SessionState::Preparing {
            *state = SessionState::Prepared;
        }
        Ok(())
    }

    /// Reset the device, silence leftovers, decode `path` and play it to the end
    pub fn play_file(&self, path: &Path) -> FileOutcome {
        let shared = &self.shared;
        if shared.cancel.is_cancelled() {
            return FileOutcome::Interrupted;
        }

        let Some(channel) = shared.channel.lock().clone() else {
            return FileOutcome::Failed(PlaybackError::send("session is not prepared"));
        };

        match channel.send_reset(self.protocol, Some(&shared.cancel)) {
            Ok(true) => {}
            Ok(false) => return FileOutcome::Interrupted,
            Err(e) => log::warn!("Reset before {:?} failed: {}", path, e),
        }
        if let Err(e) = channel.silence_all() {
            log::warn!("Failed to silence channels: {}", e);
        }

        let sequence = match shared.player.load(path) {
            Ok(sequence) => sequence,
            Err(e) => {
                log::error!("{}", e);
                return FileOutcome::Failed(e);
            }
        };
        log::info!(
            "Playing {:?}{} ({:.1}s, {} events)",
            path,
            sequence
                .title
                .as_deref()
                .map(|t| format!(" \"{t}\""))
                .unwrap_or_default(),
            sequence.duration.as_secs_f64(),
            sequence.len()
        );

        // Start under the state lock so a concurrent cancel either sees
        // Playing and stops transport, or has already raised the token
        {
            let mut state = shared.state.lock();
            if *state != SessionState::Prepared || shared.cancel.is_cancelled() {
                return FileOutcome::Interrupted;
            }
            *state = SessionState::Playing(path.to_path_buf());
            shared.player.start(sequence);
        }

        let outcome = shared.player.wait();

        let mut state = shared.state.lock();
        if matches!(*state, SessionState::Playing(_)) {
            *state = SessionState::Prepared;
        }
        drop(state);

        match outcome {
            PlayOutcome::Completed if !shared.cancel.is_cancelled() => FileOutcome::Played,
            _ => FileOutcome::Interrupted,
        }
    }

    /// Play every file in order; stops early only when cancelled
    pub fn play_all<P: AsRef<Path>>(&self, files: &[P]) -> SessionReport {
        self.play_all_with(files, |_| {})
    }

    /// [`play_all`](Self::play_all), calling `on_start` before each file
    pub fn play_all_with<P, F>(&self, files: &[P], mut on_start: F) -> SessionReport
    where
        P: AsRef<Path>,
        F: FnMut(&Path),
    {
        let mut report = SessionReport::default();
        for path in files {
            let path = path.as_ref();
            on_start(path);
            let outcome = self.play_file(path);
            let interrupted = matches!(outcome, FileOutcome::Interrupted);
            report.files.push(FileReport {
                path: path.to_path_buf(),
                outcome,
            });
            if interrupted {
                report.interrupted = true;
                break;
            }
        }
        report
    }

    /// Silence all channels, send the final reset and release everything.
    /// Safe to call more than once and after a failed `prepare`.
    pub fn shutdown(&self) {
        self.shared.shutdown();
    }
}

impl Drop for PlaybackSession {
    fn drop(&mut self) {
        self.shared.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::midi::events::MidiEvent;
    use crate::audio::midi::mock::MockBackend;

    #[test]
    fn cancel_is_a_no_op_when_idle_or_closed() {
        let session = PlaybackSession::new(ResetProtocol::Gm);
        let handle = session.handle();

        assert_eq!(handle.cancel(), CancelOutcome::Inactive);
        assert!(!handle.is_cancelled());
        assert_eq!(session.state(), SessionState::Idle);

        session.shutdown();
        assert_eq!(handle.cancel(), CancelOutcome::Inactive);
        assert_eq!(handle.state(), SessionState::Closed);
    }

    #[test]
    fn prepare_binds_the_sequencer() {
        let backend = MockBackend::new();
        let session = PlaybackSession::new(ResetProtocol::Gm);

        session
            .prepare(&backend, None, Some(Path::new("gm.sf2")))
            .unwrap();
        assert_eq!(session.state(), SessionState::Prepared);
        assert_eq!(session.player().transmitter_count(), 1);
        assert_eq!(session.device().map(|d| d.name), Some("Synth".to_string()));
    }

    #[test]
    fn sound_bank_failure_does_not_abort_prepare() {
        let backend = MockBackend::new();
        let session = PlaybackSession::new(ResetProtocol::Gm);

        session
            .prepare(&backend, None, Some(Path::new("missing.sf2")))
            .unwrap();
        assert_eq!(session.state(), SessionState::Prepared);
    }

    #[test]
    fn shutdown_after_failed_prepare_is_safe_twice() {
        let backend = MockBackend::new().busy();
        let session = PlaybackSession::new(ResetProtocol::Gm);

        let err = session.prepare(&backend, None, None).unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(session.state(), SessionState::Closed);

        session.shutdown();
        session.shutdown();
        assert_eq!(session.state(), SessionState::Closed);
        assert!(backend.journal().events().is_empty());
    }

    #[test]
    fn shutdown_silences_then_resets_once() {
        let backend = MockBackend::new();
        let session = PlaybackSession::new(ResetProtocol::Gs);
        session.prepare(&backend, None, None).unwrap();

        session.shutdown();
        session.handle().shutdown();

        let journal = backend.journal();
        let events = journal.events();
        assert_eq!(events.len(), 32 + 2);
        assert_eq!(events[0], MidiEvent::all_notes_off(0));
        assert_eq!(events[32], MidiEvent::sysex(ResetProtocol::Gs.frames()[0]));
        assert_eq!(events[33], MidiEvent::sysex(ResetProtocol::Gs.frames()[1]));
        assert_eq!(journal.devices_closed(), 1);
        assert_eq!(session.player().transmitter_count(), 0);
    }

    #[test]
    fn missing_file_is_reported_and_skipped() {
        let backend = MockBackend::new();
        let session = PlaybackSession::new(ResetProtocol::Gm);
        session.prepare(&backend, None, None).unwrap();

        let report = session.play_all(&["/nonexistent/playsmf/a.mid", "/nonexistent/playsmf/b.mid"]);
        assert_eq!(report.files.len(), 2);
        assert_eq!(report.failures().count(), 2);
        assert!(!report.interrupted);
        assert_eq!(session.state(), SessionState::Prepared);
    }

    #[test]
    fn play_after_cancel_is_interrupted() {
        let backend = MockBackend::new();
        let session = PlaybackSession::new(ResetProtocol::Gm);
        session.prepare(&backend, None, None).unwrap();

        assert_eq!(session.handle().cancel(), CancelOutcome::Stopping);
        let report = session.play_all(&["/nonexistent/playsmf/a.mid", "/nonexistent/playsmf/b.mid"]);
        assert!(report.interrupted);
        assert_eq!(report.files.len(), 1);
        assert!(backend.journal().events().is_empty());
    }

    #[test]
    fn play_all_with_announces_each_file_before_playing_it() {
        let backend = MockBackend::new();
        let session = PlaybackSession::new(ResetProtocol::Gm);
        session.prepare(&backend, None, None).unwrap();

        let mut announced = Vec::new();
        let report = session.play_all_with(&["/nonexistent/playsmf/a.mid", "/nonexistent/playsmf/b.mid"], |path| {
            announced.push(path.to_path_buf())
        });
        assert_eq!(
            announced,
            vec![PathBuf::from("/nonexistent/playsmf/a.mid"), PathBuf::from("/nonexistent/playsmf/b.mid")]
        );
        assert_eq!(report.failures().count(), 2);
    }

    #[test]
    fn interrupt_during_teardown_lets_it_finish() {
        let backend = MockBackend::new();
        let session = Arc::new(PlaybackSession::new(ResetProtocol::Xg));
        session.prepare(&backend, None, None).unwrap();
        let handle = session.handle();

        let closer = {
            let session = Arc::clone(&session);
            std::thread::spawn(move || session.shutdown())
        };
        // Three paced XG frames keep teardown busy for 150ms
        std::thread::sleep(std::time::Duration::from_millis(40));
        assert_eq!(handle.state(), SessionState::Closing);
        assert_eq!(handle.cancel(), CancelOutcome::TearingDown);
        closer.join().unwrap();

        let journal = backend.journal();
        assert_eq!(journal.events().len(), 32 + 3);
        assert_eq!(journal.devices_closed(), 1);
        assert_eq!(handle.state(), SessionState::Closed);
        assert_eq!(handle.cancel(), CancelOutcome::Inactive);
    }

    #[test]
    fn interrupt_while_loading_sound_bank_stops_before_playback() {
        let session = Arc::new(PlaybackSession::new(ResetProtocol::Gm));
        let handle = session.handle();

        let preparing = {
            let session = Arc::clone(&session);
            let backend = MockBackend::new();
            std::thread::spawn(move || {
                let result = session.prepare(&backend, None, Some(Path::new("slow.sf2")));
                (result.is_ok(), backend.journal())
            })
        };
        std::thread::sleep(std::time::Duration::from_millis(50));
        assert_eq!(handle.state(), SessionState::Preparing);
        assert_eq!(handle.cancel(), CancelOutcome::Stopping);

        let (prepared, journal) = preparing.join().unwrap();
        assert!(prepared);
        assert!(matches!(
            session.play_file(Path::new("/nonexistent/playsmf/a.mid")),
            FileOutcome::Interrupted
        ));

        assert!(journal.events().is_empty());

        session.shutdown();
        assert_eq!(journal.devices_opened(), 1);
        assert_eq!(journal.devices_closed(), 1);
    }
}
