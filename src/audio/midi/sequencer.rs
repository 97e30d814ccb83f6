//! Real-time sequencer
//!
//! A worker thread walks a [`Sequence`] and hands each event to every attached
//! transmitter when its timestamp comes due. Transport state lives behind a
//! mutex + condvar so another thread can stop playback or wait for it to end.

use std::sync::Arc;
use std::thread;
use std::time::Instant;

use parking_lot::{Condvar, Mutex};

use super::device::SharedReceiver;
use super::events::MidiEvent;
use super::file::Sequence;

#[derive(Default)]
struct Transport {
    /// Worker is walking the sequence
    running: bool,
    /// Set by `stop`, cleared by `start`
    stop_requested: bool,
    /// Last run reached the end of the sequence
    completed: bool,
}

struct SequencerShared {
    transport: Mutex<Transport>,
    /// Signalled on stop requests and when the worker exits
    signal: Condvar,
    transmitters: Mutex<Vec<SharedReceiver>>,
}

impl SequencerShared {
    fn transmit(&self, event: &MidiEvent) {
        for receiver in self.transmitters.lock().iter() {
            if let Err(e) = receiver.lock().send(event) {
                log::warn!("Sequencer: dropped {:?}: {}", event, e);
            }
        }
    }
}

/// Plays one sequence at a time to its attached receivers
pub struct Sequencer {
    shared: Arc<SequencerShared>,
    sequence: Mutex<Option<Arc<Sequence>>>,
    worker: Mutex<Option<thread::JoinHandle<()>>>,
}

impl Sequencer {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(SequencerShared {
                transport: Mutex::new(Transport::default()),
                signal: Condvar::new(),
                transmitters: Mutex::new(Vec::new()),
            }),
            sequence: Mutex::new(None),
            worker: Mutex::new(None),
        }
    }

    /// Route output to `receiver` in addition to any existing transmitters
    pub fn attach(&self, receiver: SharedReceiver) {
        self.shared.transmitters.lock().push(receiver);
    }

    /// Disconnect every transmitter. Returns how many were attached.
    pub fn detach_all(&self) -> usize {
        let mut transmitters = self.shared.transmitters.lock();
        let count = transmitters.len();
        transmitters.clear();
        count
    }

    pub fn transmitter_count(&self) -> usize {
        self.shared.transmitters.lock().len()
    }

    /// Install the sequence played by the next `start`
    pub fn set_sequence(&self, sequence: Sequence) {
        *self.sequence.lock() = Some(Arc::new(sequence));
    }

    /// Start transport from the beginning of the installed sequence
    pub fn start(&self) {
        let Some(sequence) = self.sequence.lock().clone() else {
            log::warn!("Sequencer: start() without a sequence");
            return;
        };

        // A previous run must be fully stopped before its state is reused
        self.stop();

        {
            let mut transport = self.shared.transport.lock();
            transport.running = true;
            transport.stop_requested = false;
            transport.completed = false;
        }

        let shared = Arc::clone(&self.shared);
        let handle = thread::Builder::new()
            .name("playsmf-sequencer".into())
            .spawn(move || sequencer_thread(shared, sequence));

        match handle {
            Ok(handle) => *self.worker.lock() = Some(handle),
            Err(e) => {
                log::error!("Sequencer: failed to spawn worker: {}", e);
                let mut transport = self.shared.transport.lock();
                transport.running = false;
                self.shared.signal.notify_all();
            }
        }
    }

    /// Stop transport and wait for the worker to exit. Safe from any thread.
    pub fn stop(&self) {
        {
            let mut transport = self.shared.transport.lock();
            if transport.running {
                transport.stop_requested = true;
            }
        }
        self.shared.signal.notify_all();

        if let Some(handle) = self.worker.lock().take() {
            if handle.join().is_err() {
                log::error!("Sequencer: worker panicked");
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.shared.transport.lock().running
    }

    /// Block until transport is not running.
    ///
    /// Returns `true` if the last run reached the end of its sequence.
    pub fn wait(&self) -> bool {
        let mut transport = self.shared.transport.lock();
        while transport.running {
            self.shared.signal.wait(&mut transport);
        }
        transport.completed
    }

    /// Stop, drop the sequence and disconnect all transmitters
    pub fn close(&self) {
        self.stop();
        self.sequence.lock().take();
        let detached = self.detach_all();
        log::debug!("Sequencer closed ({} transmitter(s) detached)", detached);
    }
}

impl Default for Sequencer {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Sequencer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Worker: sleep until each event is due, then transmit it
fn sequencer_thread(shared: Arc<SequencerShared>, sequence: Arc<Sequence>) {
    let started = Instant::now();
    let mut stopped = false;

    // The end-of-track time bounds playback even when no events remain
    let deadlines = sequence
        .events
        .iter()
        .map(|timed| (timed.at, Some(&timed.event)))
        .chain(std::iter::once((sequence.duration, None)));

    for (at, event) in deadlines {
        let due = started + at;
        {
            let mut transport = shared.transport.lock();
            while !transport.stop_requested && Instant::now() < due {
                shared.signal.wait_until(&mut transport, due);
            }
            if transport.stop_requested {
                stopped = true;
                break;
            }
        }
        if let Some(event) = event {
            shared.transmit(event);
        }
    }

    let mut transport = shared.transport.lock();
    transport.running = false;
    transport.completed = !stopped;
    drop(transport);
    shared.signal.notify_all();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::midi::device::MidiReceiver;
    use crate::audio::midi::file::TimedEvent;
    use crate::error::Result;
    use std::time::Duration;

    type Log = Arc<Mutex<Vec<(Instant, MidiEvent)>>>;

    struct Recorder(Log);

    impl MidiReceiver for Recorder {
        fn send(&mut self, event: &MidiEvent) -> Result<()> {
            self.0.lock().push((Instant::now(), event.clone()));
            Ok(())
        }
    }

    fn recorder() -> (SharedReceiver, Log) {
        let log: Log = Arc::default();
        let receiver: SharedReceiver = Arc::new(Mutex::new(Box::new(Recorder(log.clone()))));
        (receiver, log)
    }

    fn sequence(events: &[(u64, u8)], duration_ms: u64) -> Sequence {
        Sequence {
            path: None,
            title: None,
            format: 0,
            track_count: 1,
            bpm: 120.0,
            events: events
                .iter()
                .map(|&(ms, note)| TimedEvent {
                    at: Duration::from_millis(ms),
                    event: MidiEvent::NoteOn {
                        note,
                        velocity: 100,
                        channel: 0,
                    },
                })
                .collect(),
            duration: Duration::from_millis(duration_ms),
        }
    }

    #[test]
    fn plays_events_in_order_and_on_time() {
        let sequencer = Sequencer::new();
        let (receiver, log) = recorder();
        sequencer.attach(receiver);
        sequencer.set_sequence(sequence(&[(0, 60), (30, 62), (60, 64)], 80));

        let started = Instant::now();
        sequencer.start();
        assert!(sequencer.wait());
        assert!(started.elapsed() >= Duration::from_millis(80));
        assert!(!sequencer.is_running());

        let log = log.lock();
        let notes: Vec<u8> = log
            .iter()
            .map(|(_, event)| match event {
                MidiEvent::NoteOn { note, .. } => *note,
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(notes, vec![60, 62, 64]);
        assert!(log[2].0.duration_since(started) >= Duration::from_millis(60));
    }

    #[test]
    fn stop_from_another_thread_ends_playback_early() {
        let sequencer = Arc::new(Sequencer::new());
        let (receiver, log) = recorder();
        sequencer.attach(receiver);
        sequencer.set_sequence(sequence(&[(0, 60), (10_000, 62)], 10_000));
        sequencer.start();

        let remote = Arc::clone(&sequencer);
        let stopper = thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            remote.stop();
        });

        let started = Instant::now();
        assert!(!sequencer.wait());
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(log.lock().len(), 1);
        stopper.join().unwrap();
    }

    #[test]
    fn every_transmitter_receives_events_until_detached() {
        let sequencer = Sequencer::new();
        let (first, first_log) = recorder();
        let (second, second_log) = recorder();
        sequencer.attach(first);
        sequencer.attach(second);
        sequencer.set_sequence(sequence(&[(0, 60)], 0));

        sequencer.start();
        sequencer.wait();
        assert_eq!(first_log.lock().len(), 1);
        assert_eq!(second_log.lock().len(), 1);

        assert_eq!(sequencer.detach_all(), 2);
        sequencer.start();
        sequencer.wait();
        assert_eq!(first_log.lock().len(), 1);
    }

    #[test]
    fn start_without_sequence_is_a_no_op() {
        let sequencer = Sequencer::new();
        sequencer.start();
        assert!(!sequencer.is_running());
    }
}
