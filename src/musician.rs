//! `Musician`: the single object the host embeds. Owns every pool (control
//! side) and the realtime mix graph (audio side), connected by the SPSC
//! queue and slice pool defined in [`crate::message`] and [`crate::slice`].
//!
//! The crate does not literally split `Musician` into two `Send`-but-not-
//! `Sync` halves; instead it follows the reference engine's own contract
//! (§5): the control-thread mutators and `Musician::process` never take a
//! lock, and the only state either side touches concurrently is the queue
//! and the slice pool, both already lock-free. A host that genuinely drives
//! `process` from a separate realtime thread is responsible for not calling
//! control-side mutators concurrently with it, exactly as it would be with
//! the reference engine's C API.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::control::{ControlId, EngineControlId, NoteControlId};
use crate::engine::{EngineProcessor, InstrumentContribution};
use crate::error::{Error, Result};
use crate::handles::{InstrumentHandle, InstrumentTag, PerformerHandle, PerformerTag, Pool, TaskHandle};
use crate::instrument::controller::NoteEventCallback;
use crate::instrument::Instrument;
use crate::message::{Message, NoteOnParams, TimestampedQueue, DEFAULT_CAPACITY};
use crate::performer::{Performer, TaskCallback};
use crate::slice::{Slice, SlicePool};
use crate::time;

/// Arena capacities, queue/pool sizes, and the sample rate. `Musician::new`
/// builds a `MusicianConfig` with sane defaults, so callers who just need a
/// sample rate never have to touch this type.
#[derive(Debug, Clone, Copy)]
pub struct MusicianConfig {
    pub sample_rate: i32,
    pub max_instruments: usize,
    pub max_performers: usize,
    pub max_tasks_per_performer: usize,
    pub message_queue_capacity: usize,
    pub slice_pool_capacity: usize,
}

impl MusicianConfig {
    pub fn new(sample_rate: i32) -> Self {
        Self::default_with_sample_rate(sample_rate)
    }

    fn default_with_sample_rate(sample_rate: i32) -> Self {
        Self {
            sample_rate,
            max_instruments: 64,
            max_performers: 16,
            max_tasks_per_performer: 64,
            message_queue_capacity: DEFAULT_CAPACITY,
            slice_pool_capacity: 4096,
        }
    }

    pub fn with_max_instruments(mut self, n: usize) -> Self {
        self.max_instruments = n;
        self
    }

    pub fn with_max_performers(mut self, n: usize) -> Self {
        self.max_performers = n;
        self
    }

    pub fn with_max_tasks_per_performer(mut self, n: usize) -> Self {
        self.max_tasks_per_performer = n;
        self
    }

    pub fn with_message_queue_capacity(mut self, n: usize) -> Self {
        self.message_queue_capacity = n;
        self
    }

    pub fn with_slice_pool_capacity(mut self, n: usize) -> Self {
        self.slice_pool_capacity = n;
        self
    }
}

impl Default for MusicianConfig {
    fn default() -> Self {
        Self::default_with_sample_rate(48_000)
    }
}

pub struct Musician {
    config: MusicianConfig,
    sample_rate: f32,
    tempo_bits: AtomicU64,
    timestamp_bits: AtomicU64,
    instruments: Pool<Instrument, InstrumentTag>,
    performers: Pool<Performer, PerformerTag>,
    queue: TimestampedQueue,
    slice_pool: SlicePool,
    engine: EngineProcessor,
    contribution_scratch: Vec<InstrumentContribution>,
    instrument_seed: u64,
    /// Each instrument's currently bound slice chain, so a later
    /// `set_sample_data` call knows what to retire automatically.
    sample_bindings: HashMap<InstrumentHandle, crate::slice::SliceHandle>,
}

impl Musician {
    /// `sample_rate` must be positive; arena/queue/pool sizes take the
    /// documented [`MusicianConfig`] defaults.
    pub fn new(sample_rate: i32) -> Result<Self> {
        Self::with_config(MusicianConfig::new(sample_rate))
    }

    pub fn with_config(config: MusicianConfig) -> Result<Self> {
        if config.sample_rate <= 0 {
            return Err(Error::InvalidArgument("sample_rate must be positive"));
        }
        Ok(Self {
            config,
            sample_rate: config.sample_rate as f32,
            tempo_bits: AtomicU64::new(0f64.to_bits()),
            timestamp_bits: AtomicU64::new(0f64.to_bits()),
            instruments: Pool::with_capacity(config.max_instruments),
            performers: Pool::with_capacity(config.max_performers),
            queue: TimestampedQueue::new(config.message_queue_capacity),
            slice_pool: SlicePool::new(config.slice_pool_capacity),
            engine: EngineProcessor::new(config.sample_rate as f32),
            contribution_scratch: Vec::with_capacity(config.max_instruments),
            instrument_seed: 0,
            sample_bindings: HashMap::new(),
        })
    }

    pub fn sample_rate(&self) -> i32 {
        self.config.sample_rate
    }

    // ---- Transport -----------------------------------------------------

    pub fn tempo(&self) -> f64 {
        f64::from_bits(self.tempo_bits.load(Ordering::Acquire))
    }

    pub fn timestamp(&self) -> f64 {
        f64::from_bits(self.timestamp_bits.load(Ordering::Acquire))
    }

    /// Clamps `bpm` to `>= 0` and enqueues a `TempoChange` for the audio side.
    pub fn set_tempo(&mut self, bpm: f64) {
        let clamped = bpm.max(0.0);
        self.tempo_bits.store(clamped.to_bits(), Ordering::Release);
        let frame = self.current_frame();
        self.queue.add(frame, Message::TempoChange(clamped as f32));
        tracing::debug!(tempo = clamped, "set_tempo");
    }

    pub fn beats_from_seconds(&self, seconds: f64) -> f64 {
        time::beats_from_seconds(self.tempo(), seconds)
    }

    pub fn seconds_from_beats(&self, beats: f64) -> f64 {
        time::seconds_from_beats(self.tempo(), beats)
    }

    fn current_frame(&self) -> i64 {
        time::frames_from_seconds(self.config.sample_rate, self.timestamp())
    }

    /// Advances `timestamp` toward `target_seconds`, splitting the advance at
    /// every performer's next task boundary so no task is ever skipped, and
    /// driving every instrument's arpeggiator over the same sub-steps (§4.11).
    pub fn update(&mut self, target_seconds: f64) {
        let _span = tracing::debug_span!("musician_update", target_seconds).entered();
        self.slice_pool.reclaim();

        let mut timestamp = self.timestamp();
        if target_seconds <= timestamp {
            return;
        }

        loop {
            let tempo = self.tempo();
            if timestamp >= target_seconds {
                break;
            }
            if tempo > 0.0 {
                let beats_remaining = time::beats_from_seconds(tempo, target_seconds - timestamp);
                let mut step_beats = beats_remaining;
                for (_, performer) in self.performers.iter() {
                    if let Some((distance, _priority)) = performer.duration_to_next_task() {
                        if distance < step_beats {
                            step_beats = distance;
                        }
                    }
                }
                step_beats = step_beats.max(0.0);

                for (_, performer) in self.performers.iter_mut() {
                    performer.update(step_beats);
                }
                timestamp += time::seconds_from_beats(tempo, step_beats);
                self.timestamp_bits.store(timestamp.to_bits(), Ordering::Release);

                for (_, performer) in self.performers.iter_mut() {
                    performer.process_all_tasks_at_position(i32::MAX);
                }
                let frame = time::frames_from_seconds(self.config.sample_rate, timestamp);
                for (handle, instrument) in self.instruments.iter_mut() {
                    instrument.controller.update_arp(handle, step_beats, frame, &self.queue);
                }

                if step_beats <= 0.0 && beats_remaining > 0.0 {
                    // No performer has a task strictly ahead; nothing more to
                    // split on, so finish the remaining distance in one step.
                    let remaining = beats_remaining;
                    for (_, performer) in self.performers.iter_mut() {
                        performer.update(remaining);
                    }
                    timestamp += time::seconds_from_beats(tempo, remaining);
                    self.timestamp_bits.store(timestamp.to_bits(), Ordering::Release);
                    for (_, performer) in self.performers.iter_mut() {
                        performer.process_all_tasks_at_position(i32::MAX);
                    }
                }
            } else {
                timestamp = target_seconds;
                self.timestamp_bits.store(timestamp.to_bits(), Ordering::Release);
            }
        }
    }

    // ---- Instruments -----------------------------------------------------

    pub fn add_instrument(&mut self) -> Result<InstrumentHandle> {
        if self.instruments.len() >= self.config.max_instruments {
            return Err(Error::CapacityExceeded("instrument arena full"));
        }
        self.instrument_seed = self.instrument_seed.wrapping_add(1);
        let instrument = Instrument::new(self.sample_rate, self.instrument_seed);
        let handle = self.instruments.insert(instrument);
        self.contribution_scratch.push(InstrumentContribution::default());
        tracing::debug!(?handle, "add_instrument");
        Ok(handle)
    }

    pub fn remove_instrument(&mut self, handle: InstrumentHandle) -> Result<()> {
        self.instruments.remove(handle).ok_or(Error::InvalidHandle)?;
        self.contribution_scratch.pop();
        if let Some(binding) = self.sample_bindings.remove(&handle) {
            let frame = self.current_frame();
            self.slice_pool.release_at(binding, frame);
        }
        Ok(())
    }

    fn instrument(&self, handle: InstrumentHandle) -> Result<&Instrument> {
        self.instruments.get(handle).ok_or(Error::InvalidHandle)
    }

    fn instrument_mut(&mut self, handle: InstrumentHandle) -> Result<&mut Instrument> {
        self.instruments.get_mut(handle).ok_or(Error::InvalidHandle)
    }

    pub fn set_control(&mut self, handle: InstrumentHandle, id: ControlId, value: f32) -> Result<f32> {
        let frame = self.current_frame();
        let queue = &self.queue;
        let instrument = self.instrument_mut(handle)?;
        Ok(instrument.controller.set_control(handle, id, value, frame, queue))
    }

    pub fn get_control(&self, handle: InstrumentHandle, id: ControlId) -> Result<f32> {
        Ok(self.instrument(handle)?.controller.get_control(id))
    }

    pub fn set_note_control(&mut self, handle: InstrumentHandle, pitch: f32, id: NoteControlId, value: f32) -> Result<()> {
        let frame = self.current_frame();
        let queue = &self.queue;
        let instrument = self.instrument_mut(handle)?;
        instrument.controller.set_note_control(handle, pitch, id, value, frame, queue);
        Ok(())
    }

    pub fn set_note_on(&mut self, handle: InstrumentHandle, pitch: f32) -> Result<()> {
        let (gain, _, _) = NoteControlId::Gain.default_range();
        let (pitch_shift, _, _) = NoteControlId::PitchShift.default_range();
        let frame = self.current_frame();
        let queue = &self.queue;
        let instrument = self.instrument_mut(handle)?;
        instrument.controller.set_note_on(handle, pitch, NoteOnParams { gain, pitch_shift }, frame, queue)
    }

    pub fn set_note_on_with_params(&mut self, handle: InstrumentHandle, pitch: f32, gain: f32, pitch_shift: f32) -> Result<()> {
        let frame = self.current_frame();
        let queue = &self.queue;
        let instrument = self.instrument_mut(handle)?;
        instrument.controller.set_note_on(handle, pitch, NoteOnParams { gain, pitch_shift }, frame, queue)
    }

    pub fn set_note_off(&mut self, handle: InstrumentHandle, pitch: f32) -> Result<()> {
        let frame = self.current_frame();
        let queue = &self.queue;
        let instrument = self.instrument_mut(handle)?;
        instrument.controller.set_note_off(handle, pitch, frame, queue)
    }

    pub fn set_all_notes_off(&mut self, handle: InstrumentHandle) -> Result<()> {
        let frame = self.current_frame();
        let queue = &self.queue;
        let instrument = self.instrument_mut(handle)?;
        instrument.controller.set_all_notes_off(handle, frame, queue);
        Ok(())
    }

    pub fn is_note_on(&self, handle: InstrumentHandle, pitch: f32) -> Result<bool> {
        Ok(self.instrument(handle)?.controller.is_note_on(pitch))
    }

    pub fn set_note_on_event(&mut self, handle: InstrumentHandle, callback: Option<NoteEventCallback>, user_data: *mut ()) -> Result<()> {
        self.instrument_mut(handle)?.controller.set_note_on_event(callback, user_data);
        Ok(())
    }

    pub fn set_note_off_event(&mut self, handle: InstrumentHandle, callback: Option<NoteEventCallback>, user_data: *mut ()) -> Result<()> {
        self.instrument_mut(handle)?.controller.set_note_off_event(callback, user_data);
        Ok(())
    }

    /// Binds a fresh slice chain for `handle`. Whatever chain was previously
    /// bound (if any) is automatically retired, released only once the audio
    /// thread advances past the frame this bind becomes visible at (§4.3) —
    /// callers never need to track the old [`crate::slice::SliceHandle`]
    /// themselves.
    pub fn set_sample_data(&mut self, handle: InstrumentHandle, slices: Vec<Slice>) -> Result<()> {
        self.instrument(handle)?; // validates the handle before mutating pool state
        let new_handle = if slices.is_empty() { None } else { Some(self.slice_pool.acquire(slices).ok_or(Error::CapacityExceeded("slice pool exhausted"))?) };
        let frame = self.current_frame();
        if !self.queue.add(frame, Message::SampleDataBind(handle, new_handle)) {
            return Err(Error::CapacityExceeded("message queue full"));
        }
        let previous = match new_handle {
            Some(new_handle) => self.sample_bindings.insert(handle, new_handle),
            None => self.sample_bindings.remove(&handle),
        };
        if let Some(previous) = previous {
            self.slice_pool.release_at(previous, frame);
        }
        Ok(())
    }

    // ---- Engine (mix bus) ------------------------------------------------

    pub fn set_engine_control(&mut self, id: EngineControlId, value: f32) -> f32 {
        let frame = self.current_frame();
        let stored = self.engine.set_control(id, value);
        self.queue.add(frame, Message::EngineControl(id, stored));
        stored
    }

    pub fn get_engine_control(&self, id: EngineControlId) -> f32 {
        self.engine.get_control(id)
    }

    // ---- Performers --------------------------------------------------------

    pub fn add_performer(&mut self) -> Result<PerformerHandle> {
        if self.performers.len() >= self.config.max_performers {
            return Err(Error::CapacityExceeded("performer arena full"));
        }
        Ok(self.performers.insert(Performer::with_task_capacity(self.config.max_tasks_per_performer)))
    }

    pub fn remove_performer(&mut self, handle: PerformerHandle) -> Result<()> {
        self.performers.remove(handle).ok_or(Error::InvalidHandle)?;
        Ok(())
    }

    fn performer(&self, handle: PerformerHandle) -> Result<&Performer> {
        self.performers.get(handle).ok_or(Error::InvalidHandle)
    }

    fn performer_mut(&mut self, handle: PerformerHandle) -> Result<&mut Performer> {
        self.performers.get_mut(handle).ok_or(Error::InvalidHandle)
    }

    pub fn performer_start(&mut self, handle: PerformerHandle) -> Result<()> {
        self.performer_mut(handle)?.start();
        Ok(())
    }

    pub fn performer_stop(&mut self, handle: PerformerHandle) -> Result<()> {
        self.performer_mut(handle)?.stop();
        Ok(())
    }

    pub fn performer_is_playing(&self, handle: PerformerHandle) -> Result<bool> {
        Ok(self.performer(handle)?.is_playing())
    }

    pub fn performer_position(&self, handle: PerformerHandle) -> Result<f64> {
        Ok(self.performer(handle)?.position())
    }

    pub fn performer_set_position(&mut self, handle: PerformerHandle, position: f64) -> Result<()> {
        self.performer_mut(handle)?.set_position(position);
        Ok(())
    }

    pub fn performer_set_looping(&mut self, handle: PerformerHandle, looping: bool) -> Result<()> {
        self.performer_mut(handle)?.set_looping(looping);
        Ok(())
    }

    pub fn performer_set_loop_begin(&mut self, handle: PerformerHandle, loop_begin: f64) -> Result<()> {
        self.performer_mut(handle)?.set_loop_begin(loop_begin);
        Ok(())
    }

    pub fn performer_set_loop_length(&mut self, handle: PerformerHandle, loop_length: f64) -> Result<()> {
        if loop_length <= 0.0 {
            return Err(Error::InvalidArgument("loop_length must be positive"));
        }
        self.performer_mut(handle)?.set_loop_length(loop_length);
        Ok(())
    }

    pub fn add_task(&mut self, handle: PerformerHandle, position: f64, priority: i32, callback: TaskCallback, user_data: *mut ()) -> Result<TaskHandle> {
        Ok(self.performer_mut(handle)?.add_task(position, priority, callback, user_data))
    }

    pub fn schedule_one_off_task(&mut self, handle: PerformerHandle, position: f64, priority: i32, callback: TaskCallback, user_data: *mut ()) -> Result<TaskHandle> {
        Ok(self.performer_mut(handle)?.schedule_one_off_task(position, priority, callback, user_data))
    }

    pub fn remove_task(&mut self, handle: PerformerHandle, task: TaskHandle) -> Result<()> {
        self.performer_mut(handle)?.remove_task(task);
        Ok(())
    }

    pub fn set_task_position(&mut self, handle: PerformerHandle, task: TaskHandle, position: f64) -> Result<()> {
        self.performer_mut(handle)?.set_task_position(task, position);
        Ok(())
    }

    pub fn set_task_priority(&mut self, handle: PerformerHandle, task: TaskHandle, priority: i32) -> Result<()> {
        self.performer_mut(handle)?.set_task_priority(task, priority);
        Ok(())
    }

    // ---- Audio thread entry point -----------------------------------------

    /// Renders `frame_count` frames of the fully mixed stereo (or downmixed
    /// mono) output starting at `timestamp` seconds into `output`
    /// (interleaved). Never allocates, locks, or blocks.
    ///
    /// On an invalid argument, zero-fills `output` and returns `false` rather
    /// than propagating an error, since the realtime path must not use the
    /// control side's `Result`-returning error surface (§7).
    pub fn process(&mut self, output: &mut [f32], channel_count: usize, frame_count: usize, timestamp: f64) -> bool {
        if channel_count == 0 || channel_count > 2 || frame_count == 0 || output.len() < frame_count * channel_count {
            output.iter_mut().for_each(|s| *s = 0.0);
            return false;
        }

        let start_frame = time::frames_from_seconds(self.config.sample_rate, timestamp);
        let end_frame = start_frame + frame_count as i64;
        let mut cursor = start_frame;
        let mut frames_written = 0usize;

        loop {
            match self.queue.peek_next(end_frame) {
                Some((frame, message)) => {
                    let boundary = frame.clamp(cursor, end_frame);
                    let span = (boundary - cursor) as usize;
                    frames_written += self.render_segment(output, channel_count, frames_written, span);
                    cursor = boundary;
                    self.apply_message(message);
                    self.queue.pop();
                }
                None => {
                    let span = (end_frame - cursor) as usize;
                    frames_written += self.render_segment(output, channel_count, frames_written, span);
                    break;
                }
            }
        }

        self.slice_pool.publish_safe_frame(end_frame);
        true
    }

    fn render_segment(&mut self, output: &mut [f32], channel_count: usize, frame_offset: usize, frame_span: usize) -> usize {
        for i in 0..frame_span {
            self.contribution_scratch.clear();
            for (_, instrument) in self.instruments.iter_mut() {
                let (voice_output, delay_send, sidechain_send) = instrument.processor.next_frame();
                self.contribution_scratch.push(InstrumentContribution { output: voice_output, delay_send, sidechain_send });
            }
            let stereo = self.engine.mix_frame(&self.contribution_scratch);
            let base = (frame_offset + i) * channel_count;
            if channel_count == 2 {
                output[base] = stereo[0];
                output[base + 1] = stereo[1];
            } else {
                output[base] = 0.5 * (stereo[0] + stereo[1]);
            }
        }
        frame_span
    }

    fn apply_message(&mut self, message: Message) {
        match message {
            Message::Control(handle, id, value) => {
                if let Some(instrument) = self.instruments.get_mut(handle) {
                    instrument.processor.set_control(id, value);
                }
            }
            Message::NoteControl(handle, pitch, id, value) => {
                if let Some(instrument) = self.instruments.get_mut(handle) {
                    instrument.processor.set_note_control(pitch, id, value);
                }
            }
            Message::NoteOff(handle, pitch) => {
                if let Some(instrument) = self.instruments.get_mut(handle) {
                    instrument.processor.note_off(pitch);
                }
            }
            Message::NoteOn(handle, pitch, params) => {
                let slice_pool = &self.slice_pool;
                if let Some(instrument) = self.instruments.get_mut(handle) {
                    instrument.processor.note_on(pitch, params, slice_pool);
                }
            }
            Message::SampleDataBind(handle, slice_handle) => {
                if let Some(instrument) = self.instruments.get_mut(handle) {
                    instrument.processor.set_sample_data(slice_handle);
                }
            }
            Message::EngineControl(id, value) => {
                self.engine.set_control(id, value);
            }
            Message::TempoChange(_) => {
                // informational only: no audio-side DSP reads tempo directly.
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

    #[test]
    fn invalid_sample_rate_rejected() {
        assert_eq!(Musician::new(0).unwrap_err(), Error::InvalidArgument("sample_rate must be positive"));
        assert_eq!(Musician::new(-1).unwrap_err(), Error::InvalidArgument("sample_rate must be positive"));
    }

    #[test]
    fn stale_instrument_handle_fails_after_removal() {
        let mut musician = Musician::new(48_000).unwrap();
        let handle = musician.add_instrument().unwrap();
        musician.remove_instrument(handle).unwrap();
        assert_eq!(musician.get_control(handle, ControlId::Gain).unwrap_err(), Error::InvalidHandle);
    }

    #[test]
    fn set_control_clamps_and_is_readable() {
        let mut musician = Musician::new(48_000).unwrap();
        let handle = musician.add_instrument().unwrap();
        musician.set_control(handle, ControlId::Gain, 100.0).unwrap();
        assert_eq!(musician.get_control(handle, ControlId::Gain).unwrap(), 4.0);
    }

    static ONE_OFF_FIRED: AtomicUsize = AtomicUsize::new(0);
    fn bump_one_off(_user_data: *mut ()) {
        ONE_OFF_FIRED.fetch_add(1, AtomicOrdering::SeqCst);
    }

    #[test]
    fn scenario_one_off_task_fires_exactly_once() {
        ONE_OFF_FIRED.store(0, AtomicOrdering::SeqCst);
        let mut musician = Musician::new(48_000).unwrap();
        musician.set_tempo(60.0);
        let performer = musician.add_performer().unwrap();
        musician.schedule_one_off_task(performer, 1.0, 0, bump_one_off, std::ptr::null_mut()).unwrap();

        musician.update(0.5);
        assert_eq!(ONE_OFF_FIRED.load(AtomicOrdering::SeqCst), 0);

        musician.update(1.5);
        assert_eq!(ONE_OFF_FIRED.load(AtomicOrdering::SeqCst), 1);
        assert_eq!(musician.performer_position(performer).unwrap(), 1.5);
    }

    static RECURRING_FIRED: AtomicUsize = AtomicUsize::new(0);
    fn bump_recurring(_user_data: *mut ()) {
        RECURRING_FIRED.fetch_add(1, AtomicOrdering::SeqCst);
    }

    #[test]
    fn scenario_recurring_task_fires_once_per_loop() {
        RECURRING_FIRED.store(0, AtomicOrdering::SeqCst);
        let mut musician = Musician::new(48_000).unwrap();
        musician.set_tempo(120.0);
        let performer = musician.add_performer().unwrap();
        musician.performer_set_looping(performer, true).unwrap();
        musician.performer_set_loop_begin(performer, 0.0).unwrap();
        musician.performer_set_loop_length(performer, 1.0).unwrap();
        musician.add_task(performer, 0.25, 0, bump_recurring, std::ptr::null_mut()).unwrap();

        musician.update(4.0);
        assert_eq!(RECURRING_FIRED.load(AtomicOrdering::SeqCst), 8);
    }

    #[test]
    fn zero_tempo_advances_timestamp_without_firing_tasks() {
        static FIRED: AtomicUsize = AtomicUsize::new(0);
        fn bump(_user_data: *mut ()) {
            FIRED.fetch_add(1, AtomicOrdering::SeqCst);
        }
        FIRED.store(0, AtomicOrdering::SeqCst);

        let mut musician = Musician::new(48_000).unwrap();
        let performer = musician.add_performer().unwrap();
        musician.add_task(performer, 1.0, 0, bump, std::ptr::null_mut()).unwrap();

        musician.update(10.0);
        assert_eq!(musician.timestamp(), 10.0);
        assert_eq!(FIRED.load(AtomicOrdering::SeqCst), 0);
    }

    #[test]
    fn process_rejects_undersized_buffer() {
        let mut musician = Musician::new(48_000).unwrap();
        let mut output = vec![1.0f32; 8];
        let ok = musician.process(&mut output, 2, 4, 0.0);
        assert!(ok);

        let mut tiny = vec![1.0f32; 2];
        let ok = musician.process(&mut tiny, 2, 4, 0.0);
        assert!(!ok);
        assert!(tiny.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn note_on_then_process_produces_nonzero_output() {
        let mut musician = Musician::new(4_000).unwrap();
        let handle = musician.add_instrument().unwrap();
        musician.set_control(handle, ControlId::Attack, 0.0).unwrap();
        musician.set_control(handle, ControlId::Decay, 0.0).unwrap();
        musician.set_control(handle, ControlId::Sustain, 1.0).unwrap();
        musician.set_note_on(handle, 69.0).unwrap(); // A4, matches the oscillator's base frequency

        let mut output = vec![0.0f32; 2 * 256];
        let ok = musician.process(&mut output, 2, 256, 0.0);
        assert!(ok);
        assert!(output.iter().any(|&s| s != 0.0), "expected audible output after note-on");
    }

    #[test]
    fn rebinding_sample_data_retires_the_old_chain_automatically() {
        // A single-slot pool makes the old chain's retention observable: a
        // second bind only fits once the first chain has actually been freed.
        let config = MusicianConfig::new(48_000).with_slice_pool_capacity(1);
        let mut musician = Musician::with_config(config).unwrap();
        let handle = musician.add_instrument().unwrap();
        let slice = Slice { samples: std::sync::Arc::from(vec![0.0f32; 4]), sample_rate: 48_000, root_pitch: 69.0 };

        musician.set_sample_data(handle, vec![slice.clone()]).unwrap();

        // The old chain hasn't been reclaimed yet, so the pool is still full.
        assert_eq!(
            musician.set_sample_data(handle, vec![slice.clone()]).unwrap_err(),
            Error::CapacityExceeded("slice pool exhausted")
        );

        musician.slice_pool.publish_safe_frame(1);
        musician.slice_pool.reclaim();
        musician.set_sample_data(handle, vec![slice]).unwrap();
    }
}
