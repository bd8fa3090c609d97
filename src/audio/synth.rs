//! Software synthesizer voice bank on cpal
//!
//! Notes are queued by absolute start frame and mixed in the output
//! callback. The clock handed to the scheduler counts frames the stream has
//! rendered, so "time" is exactly what has reached the device.
//!
//! cpal streams must stay on the thread that built them, so a dedicated
//! output thread owns the stream and is driven through a control channel.

use super::adsr::AdsrParams;
use super::oscillator::{Tone, Waveform};
use super::percussion::WoodblockHit;
use anyhow::{anyhow, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, SampleFormat, SizedSample, Stream, StreamConfig};
use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use pixelsong_core::playback::{AudioClock, ClockError, VoiceBank, VoiceError};
use pixelsong_core::types::{Articulation, NoteOptions, Palette, PitchName, VoiceSpec};
use std::cmp::Ordering as CmpOrdering;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info};

/// Level applied to the mix before it reaches the device
const MASTER_GAIN: f32 = 0.25;

/// Waveform used for a voice, chosen by its General MIDI program family
pub fn waveform_for(voice: &VoiceSpec) -> Waveform {
    match voice.sound.gm_program {
        // pianos
        0..=7 => Waveform::Triangle,
        // chromatic percussion
        8..=15 => Waveform::Sine,
        // organs
        16..=23 => Waveform::Square,
        // basses
        32..=39 => Waveform::Triangle,
        // brass and reeds
        56..=71 => Waveform::Saw,
        _ => Waveform::Sine,
    }
}

/// A note that is rendering or waiting to render
#[derive(Debug, Clone)]
pub enum Sounding {
    Tone(Tone),
    Hit(WoodblockHit),
}

impl Sounding {
    pub fn for_note(voice: &VoiceSpec, note: PitchName, options: NoteOptions, sample_rate: f32) -> Self {
        let frequency = note.frequency();
        match voice.articulation {
            Articulation::Percussive => Sounding::Hit(WoodblockHit::new(
                frequency,
                sample_rate,
                options.gain,
                options.duration as f32,
            )),
            articulation => Sounding::Tone(Tone::new(
                frequency,
                sample_rate,
                waveform_for(voice),
                AdsrParams::for_articulation(articulation),
                options.gain,
                (options.duration * sample_rate as f64).round() as u64,
            )),
        }
    }

    fn next_sample(&mut self) -> f32 {
        match self {
            Sounding::Tone(tone) => tone.next_sample(),
            Sounding::Hit(hit) => hit.next_sample(),
        }
    }

    fn is_finished(&self) -> bool {
        match self {
            Sounding::Tone(tone) => tone.is_finished(),
            Sounding::Hit(hit) => hit.is_finished(),
        }
    }

    fn release(&mut self) {
        match self {
            Sounding::Tone(tone) => tone.release(),
            Sounding::Hit(hit) => hit.release(),
        }
    }
}

#[derive(Debug)]
struct PendingNote {
    start_frame: u64,
    seq: u64,
    sound: Sounding,
}

impl PartialEq for PendingNote {
    fn eq(&self, other: &Self) -> bool {
        self.start_frame == other.start_frame && self.seq == other.seq
    }
}

impl Eq for PendingNote {}

impl PartialOrd for PendingNote {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for PendingNote {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        // Reversed so BinaryHeap pops the earliest note first
        other
            .start_frame
            .cmp(&self.start_frame)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Mixer state shared between the voice bank and the output callback
#[derive(Debug, Default)]
pub struct SynthState {
    pending: BinaryHeap<PendingNote>,
    active: Vec<Sounding>,
    next_seq: u64,
}

impl SynthState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `sound` to begin at `start_frame`
    pub fn queue(&mut self, start_frame: u64, sound: Sounding) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.pending.push(PendingNote {
            start_frame,
            seq,
            sound,
        });
    }

    /// Start frame of the earliest queued note
    pub fn next_start(&self) -> Option<u64> {
        self.pending.peek().map(|n| n.start_frame)
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn active_len(&self) -> usize {
        self.active.len()
    }

    /// Mix mono frames starting at absolute frame `first_frame` into `out`
    pub fn render(&mut self, first_frame: u64, out: &mut [f32]) {
        for (i, slot) in out.iter_mut().enumerate() {
            let frame = first_frame + i as u64;
            while self.pending.peek().is_some_and(|n| n.start_frame <= frame) {
                if let Some(note) = self.pending.pop() {
                    self.active.push(note.sound);
                }
            }
            let mix: f32 = self.active.iter_mut().map(Sounding::next_sample).sum();
            *slot = (mix * MASTER_GAIN).clamp(-1.0, 1.0);
        }
        self.active.retain(|s| !s.is_finished());
    }

    /// Drop queued notes and release everything sounding
    pub fn silence(&mut self) {
        self.pending.clear();
        for sound in &mut self.active {
            sound.release();
        }
    }
}

enum StreamControl {
    Play(Sender<Result<(), String>>),
    Close,
}

/// Frames-rendered clock for the synth's output stream
#[derive(Clone)]
pub struct StreamClock {
    frames: Arc<AtomicU64>,
    sample_rate: f64,
    control: Sender<StreamControl>,
}

impl AudioClock for StreamClock {
    fn now(&self) -> f64 {
        self.frames.load(Ordering::Acquire) as f64 / self.sample_rate
    }

    fn resume(&mut self) -> Result<(), ClockError> {
        let (reply_tx, reply_rx) = bounded(1);
        let closed = || ClockError::Unavailable("audio output thread has exited".into());
        self.control
            .send(StreamControl::Play(reply_tx))
            .map_err(|_| closed())?;
        reply_rx
            .recv()
            .map_err(|_| closed())?
            .map_err(ClockError::Unavailable)
    }
}

/// Voice bank that renders every palette voice in software
pub struct SynthVoiceBank {
    palette: Palette,
    state: Arc<Mutex<SynthState>>,
    sample_rate: f32,
    control: Sender<StreamControl>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl SynthVoiceBank {
    /// Open the default output device. Returns the bank and its clock.
    pub fn open(palette: Palette) -> Result<(Arc<Self>, StreamClock)> {
        let state = Arc::new(Mutex::new(SynthState::new()));
        let frames = Arc::new(AtomicU64::new(0));
        let (control_tx, control_rx) = unbounded();
        let (ready_tx, ready_rx) = bounded(1);

        let thread_state = state.clone();
        let thread_frames = frames.clone();
        let thread = thread::Builder::new()
            .name("pixelsong-audio".into())
            .spawn(move || run_output(thread_state, thread_frames, control_rx, ready_tx))?;

        let sample_rate = ready_rx
            .recv()
            .map_err(|_| anyhow!("Audio output thread exited during setup"))?
            .map_err(|e| anyhow!(e))?;
        info!(sample_rate, voices = palette.len(), "Synth voice bank ready");

        let clock = StreamClock {
            frames,
            sample_rate: sample_rate as f64,
            control: control_tx.clone(),
        };
        let bank = Arc::new(Self {
            palette,
            state,
            sample_rate,
            control: control_tx,
            thread: Mutex::new(Some(thread)),
        });
        Ok((bank, clock))
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }
}

impl VoiceBank for SynthVoiceBank {
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
        if self.palette.get(voice.id).is_none() {
            return Err(VoiceError::NotLoaded(voice.name.clone()));
        }
        let start_frame = (at * self.sample_rate as f64).round().max(0.0) as u64;
        let sound = Sounding::for_note(voice, note, options, self.sample_rate);
        let mut state = self.state.lock().map_err(|_| VoiceError::Closed)?;
        state.queue(start_frame, sound);
        Ok(())
    }

    fn stop_all(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.silence();
        }
    }
}

impl Drop for SynthVoiceBank {
    fn drop(&mut self) {
        let _ = self.control.send(StreamControl::Close);
        if let Ok(mut thread) = self.thread.lock() {
            if let Some(handle) = thread.take() {
                let _ = handle.join();
            }
        }
    }
}

fn run_output(
    state: Arc<Mutex<SynthState>>,
    frames: Arc<AtomicU64>,
    control: Receiver<StreamControl>,
    ready: Sender<Result<f32, String>>,
) {
    let stream = match build_output(state, frames) {
        Ok((stream, sample_rate)) => {
            let _ = ready.send(Ok(sample_rate));
            stream
        }
        Err(e) => {
            let _ = ready.send(Err(e.to_string()));
            return;
        }
    };

    for command in control {
        match command {
            StreamControl::Play(reply) => {
                let _ = reply.send(stream.play().map_err(|e| e.to_string()));
            }
            StreamControl::Close => break,
        }
    }
    debug!("Audio output closed");
}

fn build_output(state: Arc<Mutex<SynthState>>, frames: Arc<AtomicU64>) -> Result<(Stream, f32)> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| anyhow!("No output device available"))?;
    let config = device.default_output_config()?;

    let sample_format = config.sample_format();
    let config: StreamConfig = config.into();
    let sample_rate = config.sample_rate.0 as f32;

    let stream = match sample_format {
        SampleFormat::F32 => build_stream::<f32>(&device, &config, state, frames)?,
        SampleFormat::I16 => build_stream::<i16>(&device, &config, state, frames)?,
        SampleFormat::U16 => build_stream::<u16>(&device, &config, state, frames)?,
        _ => return Err(anyhow!("Unsupported sample format: {:?}", sample_format)),
    };
    Ok((stream, sample_rate))
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    state: Arc<Mutex<SynthState>>,
    frames: Arc<AtomicU64>,
) -> Result<Stream>
where
    T: SizedSample + FromSample<f32> + Send + 'static,
{
    let channels = config.channels as usize;
    let mut mono: Vec<f32> = Vec::new();

    let stream = device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                let frame_count = data.len() / channels;
                mono.resize(frame_count, 0.0);
                let first = frames.load(Ordering::Acquire);
                match state.lock() {
                    Ok(mut synth) => synth.render(first, &mut mono),
                    Err(_) => mono.fill(0.0),
                }
                for (frame, &value) in data.chunks_mut(channels).zip(mono.iter()) {
                    let sample = T::from_sample(value);
                    frame.fill(sample);
                }
                frames.fetch_add(frame_count as u64, Ordering::Release);
            },
            |err| error!("Audio output stream error: {}", err),
            None,
        )
        .map_err(|e| anyhow!("Failed to build output stream: {}", e))?;

    Ok(stream)
}
