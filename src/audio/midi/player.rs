//! Sequence playback bound to one output channel

use std::path::Path;

use super::file::{load_sequence, Sequence};
use super::output::OutputChannel;
use super::sequencer::Sequencer;
use crate::error::Result;

/// How a blocking playback call ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayOutcome {
    /// The sequence played to its end
    Completed,
    /// Transport was stopped before the end
    Stopped,
}

/// Owns a sequencer and drives one sequence at a time to completion
///
/// All methods take `&self` so an interrupt handler can call [`stop`](Self::stop)
/// while another thread is blocked in [`play`](Self::play).
pub struct SequencePlayer {
    sequencer: Sequencer,
}

impl SequencePlayer {
    pub fn new() -> Self {
        Self {
            sequencer: Sequencer::new(),
        }
    }

    /// Make `channel`'s receiver the only destination of the sequencer
    pub fn bind(&self, channel: &OutputChannel) -> Result<()> {
        let detached = self.sequencer.detach_all();
        if detached > 0 {
            log::debug!("SequencePlayer: detached {} existing transmitter(s)", detached);
        }
        self.sequencer.attach(channel.receiver()?);
        log::info!("Sequencer bound to {}", channel.descriptor().display_name());
        Ok(())
    }

    /// Read and decode a MIDI file
    pub fn load(&self, path: &Path) -> Result<Sequence> {
        load_sequence(path)
    }

    /// Install `sequence` and start transport without waiting
    pub fn start(&self, sequence: Sequence) {
        self.sequencer.set_sequence(sequence);
        self.sequencer.start();
    }

    /// Block until transport stops, then stop it explicitly
    pub fn wait(&self) -> PlayOutcome {
        let completed = self.sequencer.wait();
        self.sequencer.stop();
        if completed {
            PlayOutcome::Completed
        } else {
            PlayOutcome::Stopped
        }
    }

    /// Play `sequence` and block until it ends or is stopped
    pub fn play(&self, sequence: Sequence) -> PlayOutcome {
        self.start(sequence);
        self.wait()
    }

    pub fn is_running(&self) -> bool {
        self.sequencer.is_running()
    }

    /// Stop transport; a blocked [`play`](Self::play) returns [`PlayOutcome::Stopped`]
    pub fn stop(&self) {
        self.sequencer.stop();
    }

    /// Release the sequencer and its transmitters
    pub fn close(&self) {
        self.sequencer.close();
    }

    pub fn transmitter_count(&self) -> usize {
        self.sequencer.transmitter_count()
    }
}

impl Default for SequencePlayer {
    fn default() -> Self {
        Self::new()
    }
}
