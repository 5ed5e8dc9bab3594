//! Control-side instrument state: the symbolic note table and arpeggiator.
//!
//! Everything here runs on the control thread and may allocate; it talks to
//! the audio side only by enqueuing [`Message`]s.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::control::{Control, ControlId, NoteControlId};
use crate::error::{Error, Result};
use crate::handles::InstrumentHandle;
use crate::message::{Message, NoteOnParams, TimestampedQueue};

// Every method below takes the caller's own `InstrumentHandle` rather than
// storing one, so a controller can be constructed before its owning pool
// slot exists (the pool only hands out a handle once the value is inserted).

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArpMode {
    Up,
    Down,
    Random,
}

impl ArpMode {
    pub fn from_control(v: f32) -> Self {
        match v.round() as i32 {
            1 => ArpMode::Down,
            2 => ArpMode::Random,
            _ => ArpMode::Up,
        }
    }
}

/// Plain function-pointer + user-data callback, matching the source's ABI:
/// no closures cross the control-thread boundary.
pub type NoteEventCallback = fn(pitch: f32, user_data: *mut ());

#[derive(Default)]
struct EventCallback {
    callback: Option<NoteEventCallback>,
    user_data: *mut (),
}

impl EventCallback {
    fn fire(&self, pitch: f32) {
        if let Some(cb) = self.callback {
            cb(pitch, self.user_data);
        }
    }
}

pub struct InstrumentController {
    controls: [Control; ControlId::COUNT],
    /// Held notes in insertion order (arpeggiator traversal order); a real
    /// implementation would thread a doubly linked list through the note
    /// table for O(1) removal, but on the control thread — allocation and
    /// the occasional O(n) scan are both acceptable — a plain `Vec` is enough.
    held_notes: Vec<f32>,
    note_on_event: EventCallback,
    note_off_event: EventCallback,

    arp_gate_ratio_control: usize,
    arp_phase: f64,
    arp_step_index: usize,
    current_arp_pitch: Option<f32>,
    is_gate_open: bool,
    arp_rng: SmallRng,
}

fn default_controls() -> [Control; ControlId::COUNT] {
    let mut controls = [Control::new(0.0, 0.0, 0.0); ControlId::COUNT];
    for id in ControlId::ALL {
        let (default, min, max) = id.default_range();
        controls[id.index()] = Control::new(default, min, max);
    }
    controls
}

impl InstrumentController {
    pub fn new(seed: u64) -> Self {
        Self {
            controls: default_controls(),
            held_notes: Vec::new(),
            note_on_event: EventCallback::default(),
            note_off_event: EventCallback::default(),
            arp_gate_ratio_control: ControlId::ArpGateRatio.index(),
            arp_phase: 0.0,
            arp_step_index: 0,
            current_arp_pitch: None,
            is_gate_open: false,
            arp_rng: SmallRng::seed_from_u64(seed),
        }
    }

    fn arp_on(&self) -> bool {
        self.controls[ControlId::ArpRate.index()].value() > 0.0
    }

    fn arp_mode(&self) -> ArpMode {
        ArpMode::from_control(self.controls[ControlId::ArpMode.index()].value())
    }

    pub fn set_note_on_event(&mut self, callback: Option<NoteEventCallback>, user_data: *mut ()) {
        self.note_on_event = EventCallback { callback, user_data };
    }

    pub fn set_note_off_event(&mut self, callback: Option<NoteEventCallback>, user_data: *mut ()) {
        self.note_off_event = EventCallback { callback, user_data };
    }

    pub fn set_control(&mut self, handle: InstrumentHandle, id: ControlId, value: f32, frame: i64, queue: &TimestampedQueue) -> f32 {
        let stored = self.controls[id.index()].set(value);
        queue.add(frame, Message::Control(handle, id, stored));
        stored
    }

    pub fn get_control(&self, id: ControlId) -> f32 {
        self.controls[id.index()].value()
    }

    pub fn set_note_control(&self, handle: InstrumentHandle, pitch: f32, id: NoteControlId, value: f32, frame: i64, queue: &TimestampedQueue) {
        let (_, min, max) = id.default_range();
        let clamped = value.clamp(min, max);
        queue.add(frame, Message::NoteControl(handle, pitch, id, clamped));
    }

    pub fn is_note_on(&self, pitch: f32) -> bool {
        self.held_notes.iter().any(|&p| p == pitch)
    }

    pub fn set_note_on(&mut self, handle: InstrumentHandle, pitch: f32, params: NoteOnParams, frame: i64, queue: &TimestampedQueue) -> Result<()> {
        if self.held_notes.iter().any(|&p| p == pitch) && !self.arp_on() {
            return Ok(()); // already on; no-op per the single-note-per-pitch invariant
        }
        if !self.held_notes.iter().any(|&p| p == pitch) {
            let insert_at = self.held_notes.partition_point(|&p| p < pitch);
            self.held_notes.insert(insert_at, pitch);
        }
        if !self.arp_on() {
            self.note_on_event.fire(pitch);
            if !queue.add(frame, Message::NoteOn(handle, pitch, params)) {
                return Err(Error::CapacityExceeded("message queue full"));
            }
        }
        Ok(())
    }

    pub fn set_note_off(&mut self, handle: InstrumentHandle, pitch: f32, frame: i64, queue: &TimestampedQueue) -> Result<()> {
        let was_held = self.held_notes.iter().any(|&p| p == pitch);
        if !was_held {
            return Ok(());
        }
        if self.arp_on() && self.current_arp_pitch == Some(pitch) {
            if !queue.add(frame, Message::NoteOff(handle, pitch)) {
                return Err(Error::CapacityExceeded("message queue full"));
            }
            self.held_notes.retain(|&p| p != pitch);
            self.advance_arp_step();
        } else {
            self.held_notes.retain(|&p| p != pitch);
            if !self.arp_on() {
                self.note_off_event.fire(pitch);
                if !queue.add(frame, Message::NoteOff(handle, pitch)) {
                    return Err(Error::CapacityExceeded("message queue full"));
                }
            }
        }
        Ok(())
    }

    pub fn set_all_notes_off(&mut self, handle: InstrumentHandle, frame: i64, queue: &TimestampedQueue) {
        let held = std::mem::take(&mut self.held_notes);
        for pitch in held {
            self.note_off_event.fire(pitch);
            queue.add(frame, Message::NoteOff(handle, pitch));
        }
        self.current_arp_pitch = None;
        self.is_gate_open = false;
    }

    fn advance_arp_step(&mut self) {
        self.arp_step_index = self.arp_step_index.wrapping_add(1);
    }

    fn next_arp_pitch(&mut self) -> Option<f32> {
        if self.held_notes.is_empty() {
            return None;
        }
        match self.arp_mode() {
            ArpMode::Up => {
                let i = self.arp_step_index % self.held_notes.len();
                Some(self.held_notes[i])
            }
            ArpMode::Down => {
                let n = self.held_notes.len();
                let i = n - 1 - (self.arp_step_index % n);
                Some(self.held_notes[i])
            }
            ArpMode::Random => {
                let i = self.arp_rng.gen_range(0..self.held_notes.len());
                Some(self.held_notes[i])
            }
        }
    }

    /// Advances the arpeggiator by `duration_beats` and emits note on/off
    /// messages at step/gate boundaries. Called once per engine-update
    /// sub-step (§4.11), after any task dispatch for that step.
    pub fn update_arp(&mut self, handle: InstrumentHandle, duration_beats: f64, frame: i64, queue: &TimestampedQueue) {
        if !self.arp_on() {
            return;
        }
        let rate = self.controls[ControlId::ArpRate.index()].value() as f64;
        let gate_ratio = self.controls[self.arp_gate_ratio_control].value() as f64;

        self.arp_phase += duration_beats * rate;
        while self.arp_phase >= 1.0 {
            self.arp_phase -= 1.0;
            if self.is_gate_open {
                if let Some(pitch) = self.current_arp_pitch.take() {
                    queue.add(frame, Message::NoteOff(handle, pitch));
                    self.note_off_event.fire(pitch);
                }
                self.is_gate_open = false;
            }
            self.advance_arp_step();
            if let Some(pitch) = self.next_arp_pitch() {
                self.current_arp_pitch = Some(pitch);
                self.is_gate_open = true;
                self.note_on_event.fire(pitch);
                queue.add(frame, Message::NoteOn(handle, pitch, NoteOnParams { gain: 1.0, pitch_shift: 0.0 }));
            }
        }

        let gate_open_fraction = gate_ratio.clamp(0.0, 1.0);
        if self.is_gate_open && self.arp_phase >= gate_open_fraction && gate_open_fraction < 1.0 {
            if let Some(pitch) = self.current_arp_pitch.take() {
                queue.add(frame, Message::NoteOff(handle, pitch));
                self.note_off_event.fire(pitch);
            }
            self.is_gate_open = false;
        }
    }
}
