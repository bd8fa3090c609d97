//! MIDI output voice bank on midir
//!
//! Each palette voice gets its own channel with its General MIDI program.
//! Notes are turned into timestamped note-on/note-off messages and handed to
//! a dispatch thread that owns the connection and sends each message when
//! its time arrives.

use anyhow::{anyhow, Result};
use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender};
use midir::{MidiOutput, MidiOutputConnection};
use pixelsong_core::playback::{MonotonicClock, VoiceBank, VoiceError};
use pixelsong_core::types::{NoteOptions, Palette, PitchName, VoiceSpec};
use std::cmp::Ordering as CmpOrdering;
use std::collections::{BinaryHeap, HashMap};
use std::sync::Mutex;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Channel 10 is reserved for General MIDI drums
const DRUM_CHANNEL: u8 = 9;

/// MIDI channel for the voice at `index` in the palette, skipping the drum channel
pub fn channel_for_index(index: usize) -> u8 {
    let channel = (index % 15) as u8;
    if channel >= DRUM_CHANNEL {
        channel + 1
    } else {
        channel
    }
}

pub fn velocity_for_gain(gain: f32) -> u8 {
    (gain.clamp(0.0, 1.0) * 127.0).round() as u8
}

pub fn note_on(channel: u8, note: u8, velocity: u8) -> [u8; 3] {
    [0x90 | (channel & 0x0F), note & 0x7F, velocity & 0x7F]
}

pub fn note_off(channel: u8, note: u8) -> [u8; 3] {
    [0x80 | (channel & 0x0F), note & 0x7F, 0]
}

pub fn program_change(channel: u8, program: u8) -> [u8; 2] {
    [0xC0 | (channel & 0x0F), program & 0x7F]
}

/// Control change 123 on every channel
pub fn all_notes_off() -> impl Iterator<Item = [u8; 3]> {
    (0..16u8).map(|ch| [0xB0 | ch, 123, 0])
}

/// A message waiting for its send time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimedMessage {
    pub at: Instant,
    seq: u64,
    pub bytes: [u8; 3],
}

impl PartialOrd for TimedMessage {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for TimedMessage {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        // Reversed: earliest message on top
        other.at.cmp(&self.at).then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Time-ordered outgoing messages
#[derive(Debug, Default)]
pub struct MessageQueue {
    heap: BinaryHeap<TimedMessage>,
    next_seq: u64,
}

impl MessageQueue {
    pub fn push(&mut self, at: Instant, bytes: [u8; 3]) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(TimedMessage { at, seq, bytes });
    }

    /// When the earliest message is due
    pub fn next_due(&self) -> Option<Instant> {
        self.heap.peek().map(|m| m.at)
    }

    /// Remove and return every message due at or before `now`, in order
    pub fn pop_due(&mut self, now: Instant) -> Vec<[u8; 3]> {
        let mut due = Vec::new();
        while self.heap.peek().is_some_and(|m| m.at <= now) {
            if let Some(message) = self.heap.pop() {
                due.push(message.bytes);
            }
        }
        due
    }

    pub fn clear(&mut self) {
        self.heap.clear();
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

/// Note-ons still waiting for their note-off, per (channel, key).
///
/// A legato note outlasts its column, so a repeated pitch is struck again
/// before the earlier note-off arrives. That stale note-off must not cut the
/// new note short; only the last outstanding one goes out.
#[derive(Debug, Default)]
pub struct SoundingNotes {
    counts: HashMap<(u8, u8), u32>,
}

impl SoundingNotes {
    /// Whether `bytes` should be sent, updating the counts on the way
    pub fn admit(&mut self, bytes: &[u8; 3]) -> bool {
        let channel = bytes[0] & 0x0F;
        let key = (channel, bytes[1]);
        match bytes[0] & 0xF0 {
            0x90 if bytes[2] > 0 => {
                *self.counts.entry(key).or_insert(0) += 1;
                true
            }
            0x80 | 0x90 => match self.counts.get_mut(&key) {
                Some(count) if *count > 1 => {
                    *count -= 1;
                    false
                }
                Some(_) => {
                    self.counts.remove(&key);
                    true
                }
                // Already silenced by all-notes-off
                None => false,
            },
            _ => true,
        }
    }

    pub fn clear(&mut self) {
        self.counts.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

enum DispatchCommand {
    Schedule(Vec<(Instant, [u8; 3])>),
    AllNotesOff,
    Shutdown,
}

/// List MIDI output port names.
///
/// Creating a client can fail transiently on some systems, so this retries
/// a few times before giving up.
pub fn list_ports() -> Result<Vec<String>> {
    let mut last_err = None;
    for attempt in 0..3 {
        if attempt > 0 {
            thread::sleep(Duration::from_millis(100));
        }
        match MidiOutput::new("pixelsong") {
            Ok(midi_out) => {
                return Ok(midi_out
                    .ports()
                    .iter()
                    .filter_map(|p| midi_out.port_name(p).ok())
                    .collect());
            }
            Err(e) => last_err = Some(e),
        }
    }
    Err(anyhow!(
        "MIDI initialization failed after 3 attempts: {:?}",
        last_err
    ))
}

/// Voice bank that plays through an external MIDI synth
pub struct MidiVoiceBank {
    palette: Palette,
    clock: MonotonicClock,
    port_name: String,
    commands: Sender<DispatchCommand>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl MidiVoiceBank {
    /// Connect to the first output port whose name contains `port_filter`
    /// (the first port at all when `None`). Returns the bank and the clock
    /// its note times are measured against.
    pub fn connect(palette: Palette, port_filter: Option<&str>) -> Result<(Self, MonotonicClock)> {
        let port_name = find_port(port_filter)?;
        let programs: Vec<u8> = palette.iter().map(|v| v.sound.gm_program).collect();

        // The connection is opened on the dispatch thread and never leaves it
        let (tx, rx) = unbounded();
        let (ready_tx, ready_rx) = bounded(1);
        let thread_port = port_name.clone();
        let thread = thread::Builder::new()
            .name("pixelsong-midi".into())
            .spawn(move || match open_connection(&thread_port, &programs) {
                Ok(connection) => {
                    let _ = ready_tx.send(Ok(()));
                    run_dispatch(connection, rx);
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e.to_string()));
                }
            })?;

        ready_rx
            .recv()
            .map_err(|_| anyhow!("MIDI thread exited during setup"))?
            .map_err(|e| anyhow!(e))?;
        info!(port = %port_name, voices = palette.len(), "MIDI voice bank connected");

        let clock = MonotonicClock::new();
        let bank = Self {
            palette,
            clock: clock.clone(),
            port_name,
            commands: tx,
            thread: Mutex::new(Some(thread)),
        };
        Ok((bank, clock))
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }
}

impl VoiceBank for MidiVoiceBank {
    fn voices(&self) -> &Palette {
        &self.palette
    }

    fn play_note(
        &self,
        voice: &VoiceSpec,
        note: PitchName,
        at: f64,
        options: NoteOptions,
    ) -> Result<(), VoiceError> {
        let index = self
            .palette
            .index_of(voice.id)
            .ok_or_else(|| VoiceError::NotLoaded(voice.name.clone()))?;
        let channel = channel_for_index(index);
        let key = note.midi_number();
        let start = self.clock.instant_at(at);
        let end = self.clock.instant_at(at + options.duration);

        self.commands
            .send(DispatchCommand::Schedule(vec![
                (start, note_on(channel, key, velocity_for_gain(options.gain))),
                (end, note_off(channel, key)),
            ]))
            .map_err(|_| VoiceError::Closed)
    }

    fn stop_all(&self) {
        let _ = self.commands.send(DispatchCommand::AllNotesOff);
    }
}

impl Drop for MidiVoiceBank {
    fn drop(&mut self) {
        let _ = self.commands.send(DispatchCommand::Shutdown);
        if let Ok(mut thread) = self.thread.lock() {
            if let Some(handle) = thread.take() {
                let _ = handle.join();
            }
        }
    }
}

fn find_port(port_filter: Option<&str>) -> Result<String> {
    let names = list_ports()?;
    let found = match port_filter {
        Some(filter) => names.into_iter().find(|name| name.contains(filter)),
        None => names.into_iter().next(),
    };
    found.ok_or_else(|| match port_filter {
        Some(filter) => anyhow!("MIDI port '{}' not found", filter),
        None => anyhow!("No MIDI output ports available"),
    })
}

/// Connect to the port named exactly `port_name` and load one program per channel
fn open_connection(port_name: &str, programs: &[u8]) -> Result<MidiOutputConnection> {
    let midi_out = MidiOutput::new("pixelsong")?;
    let ports = midi_out.ports();
    let port = ports
        .iter()
        .find(|p| midi_out.port_name(p).map(|n| n == port_name).unwrap_or(false))
        .ok_or_else(|| anyhow!("MIDI port '{}' disappeared", port_name))?;
    let mut connection = midi_out
        .connect(port, "pixelsong-out")
        .map_err(|e| anyhow!("Failed to connect to '{}': {}", port_name, e))?;

    for (index, &program) in programs.iter().enumerate() {
        connection.send(&program_change(channel_for_index(index), program))?;
    }
    Ok(connection)
}

fn send(connection: &mut MidiOutputConnection, bytes: &[u8]) {
    if let Err(e) = connection.send(bytes) {
        warn!("MIDI send failed: {}", e);
    }
}

fn run_dispatch(mut connection: MidiOutputConnection, commands: Receiver<DispatchCommand>) {
    let mut queue = MessageQueue::default();
    let mut sounding = SoundingNotes::default();

    loop {
        let command = match queue.next_due() {
            Some(due) => {
                let wait = due.saturating_duration_since(Instant::now());
                match commands.recv_timeout(wait) {
                    Ok(command) => Some(command),
                    Err(RecvTimeoutError::Timeout) => None,
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            None => match commands.recv() {
                Ok(command) => Some(command),
                Err(_) => break,
            },
        };

        match command {
            Some(DispatchCommand::Schedule(messages)) => {
                for (at, bytes) in messages {
                    queue.push(at, bytes);
                }
            }
            Some(DispatchCommand::AllNotesOff) => {
                queue.clear();
                sounding.clear();
                for message in all_notes_off() {
                    send(&mut connection, &message);
                }
            }
            Some(DispatchCommand::Shutdown) => break,
            None => {}
        }

        for message in queue.pop_due(Instant::now()) {
            if sounding.admit(&message) {
                send(&mut connection, &message);
            }
        }
    }

    for message in all_notes_off() {
        send(&mut connection, &message);
    }
    connection.close();
    debug!("MIDI dispatch stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channels_skip_drums() {
        let channels: Vec<u8> = (0..10).map(channel_for_index).collect();
        assert_eq!(channels, vec![0, 1, 2, 3, 4, 5, 6, 7, 8, 10]);
        assert!((0..64).map(channel_for_index).all(|c| c != DRUM_CHANNEL && c < 16));
    }

    #[test]
    fn test_message_bytes() {
        assert_eq!(note_on(2, 71, 108), [0x92, 71, 108]);
        assert_eq!(note_off(2, 71), [0x82, 71, 0]);
        assert_eq!(program_change(3, 32), [0xC3, 32]);
        assert_eq!(all_notes_off().count(), 16);
        assert_eq!(all_notes_off().last(), Some([0xBF, 123, 0]));
    }

    #[test]
    fn test_velocity_for_gain() {
        assert_eq!(velocity_for_gain(0.85), 108);
        assert_eq!(velocity_for_gain(1.0), 127);
        assert_eq!(velocity_for_gain(2.0), 127);
        assert_eq!(velocity_for_gain(0.0), 0);
    }

    #[test]
    fn test_standard_palette_programs() {
        let palette = Palette::standard();
        let programs: Vec<u8> = palette.iter().map(|v| v.sound.gm_program).collect();
        assert_eq!(programs, vec![56, 4, 11, 32, 16, 115, 65, 0]);
        let b5: PitchName = "B5".parse().unwrap();
        assert_eq!(b5.midi_number(), 83);
    }

    #[test]
    fn test_queue_releases_due_messages_in_order() {
        let base = Instant::now();
        let mut queue = MessageQueue::default();
        queue.push(base + Duration::from_millis(30), note_off(0, 60));
        queue.push(base + Duration::from_millis(10), note_on(0, 60, 100));
        queue.push(base + Duration::from_millis(10), note_on(1, 64, 100));

        assert_eq!(queue.next_due(), Some(base + Duration::from_millis(10)));
        assert!(queue.pop_due(base).is_empty());

        let due = queue.pop_due(base + Duration::from_millis(20));
        assert_eq!(due, vec![note_on(0, 60, 100), note_on(1, 64, 100)]);
        assert_eq!(queue.len(), 1);

        queue.clear();
        assert!(queue.is_empty());
    }

    #[test]
    fn test_repeated_legato_pitch_is_not_cut_short() {
        // 120 BPM legato: each note lasts 0.55 s, the next column starts at 0.5 s
        let base = Instant::now();
        let at = |secs: f64| base + Duration::from_secs_f64(secs);
        let mut queue = MessageQueue::default();
        let mut sounding = SoundingNotes::default();
        queue.push(at(0.05), note_on(0, 83, 108));
        queue.push(at(0.60), note_off(0, 83));
        queue.push(at(0.55), note_on(0, 83, 108));
        queue.push(at(1.10), note_off(0, 83));

        let sent: Vec<[u8; 3]> = queue
            .pop_due(at(2.0))
            .into_iter()
            .filter(|m| sounding.admit(m))
            .collect();
        assert_eq!(
            sent,
            vec![note_on(0, 83, 108), note_on(0, 83, 108), note_off(0, 83)]
        );
        assert!(sounding.is_empty());
    }

    #[test]
    fn test_sounding_notes_per_channel_and_key() {
        let mut sounding = SoundingNotes::default();
        assert!(sounding.admit(&note_on(0, 60, 100)));
        assert!(sounding.admit(&note_on(1, 60, 100)));
        assert!(sounding.admit(&note_off(0, 60)));
        assert!(sounding.admit(&note_off(1, 60)));

        // Note-offs after all-notes-off have nothing left to silence
        assert!(sounding.admit(&note_on(2, 64, 100)));
        sounding.clear();
        assert!(!sounding.admit(&note_off(2, 64)));
        assert!(sounding.admit(&[0xB0, 123, 0]));
    }

    #[test]
    fn test_list_ports() {
        // Port availability depends on the machine; only check it does not panic
        let _ = list_ports();
    }
}
