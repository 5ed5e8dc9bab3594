//! Lock-free, bounded, timestamped SPSC queue carrying events from the
//! control thread to the audio thread.
//!
//! One producer, one consumer, power-of-two capacity. `add` never blocks and
//! reports overflow by returning `false`; `peek_next`/`pop` give the consumer
//! a look-then-advance pair instead of a single destructive read, since the
//! audio side needs to know a message's frame stamp before deciding whether
//! to render more samples first.

use crossbeam_utils::CachePadded;
use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::control::{ControlId, EngineControlId, NoteControlId};
use crate::handles::InstrumentHandle;
use crate::slice::SliceHandle;

/// Minimum queue capacity recommended for typical update rates.
pub const DEFAULT_CAPACITY: usize = 4096;

/// A single control→audio event, stamped with the audio frame it applies at.
#[derive(Debug, Clone, Copy)]
pub enum Message {
    Control(InstrumentHandle, ControlId, f32),
    NoteControl(InstrumentHandle, f32, NoteControlId, f32),
    NoteOff(InstrumentHandle, f32),
    NoteOn(InstrumentHandle, f32, NoteOnParams),
    SampleDataBind(InstrumentHandle, Option<SliceHandle>),
    EngineControl(EngineControlId, f32),
    TempoChange(f32),
}

#[derive(Debug, Clone, Copy)]
pub struct NoteOnParams {
    pub gain: f32,
    pub pitch_shift: f32,
}

#[derive(Clone, Copy)]
struct Entry {
    frame: i64,
    message: Message,
}

/// Bounded single-producer/single-consumer ring of `(frame, Message)`.
///
/// The producer and consumer indices are each cache-line padded so the two
/// threads touching them concurrently never false-share.
pub struct TimestampedQueue {
    buffer: Box<[UnsafeCell<Option<Entry>>]>,
    capacity: usize,
    mask: usize,
    head: CachePadded<AtomicUsize>,
    tail: CachePadded<AtomicUsize>,
    dropped: CachePadded<AtomicUsize>,
}

// SAFETY: `buffer` cells are only written by the single producer at `tail`
// and only read by the single consumer at `head`; the atomics establish the
// happens-before edges that make that disjoint access safe across threads.
unsafe impl Sync for TimestampedQueue {}
unsafe impl Send for TimestampedQueue {}

impl TimestampedQueue {
    /// `capacity` is rounded up to the next power of two (minimum 2).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(2).next_power_of_two();
        let buffer = (0..capacity).map(|_| UnsafeCell::new(None)).collect::<Vec<_>>().into_boxed_slice();
        Self {
            buffer,
            capacity,
            mask: capacity - 1,
            head: CachePadded::new(AtomicUsize::new(0)),
            tail: CachePadded::new(AtomicUsize::new(0)),
            dropped: CachePadded::new(AtomicUsize::new(0)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of messages dropped due to overflow since construction.
    pub fn dropped_count(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Producer-only. Enqueues `message` stamped at `frame`; returns `false`
    /// (and bumps the dropped counter) if the queue is full. Never blocks.
    pub fn add(&self, frame: i64, message: Message) -> bool {
        let tail = self.tail.load(Ordering::Relaxed);
        let head = self.head.load(Ordering::Acquire);
        if tail.wrapping_sub(head) >= self.capacity {
            let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
            tracing::warn!(frame, dropped, "control->audio queue full, dropping message");
            return false;
        }
        let slot = tail & self.mask;
        // SAFETY: only the producer writes this slot, and it has observed
        // (via `head`'s Acquire load) that the consumer is done reading it.
        unsafe {
            *self.buffer[slot].get() = Some(Entry { frame, message });
        }
        self.tail.store(tail.wrapping_add(1), Ordering::Release);
        true
    }

    /// Consumer-only. Returns the next entry's `(frame, Message)` without
    /// removing it, iff its frame is strictly less than `end_frame`.
    pub fn peek_next(&self, end_frame: i64) -> Option<(i64, Message)> {
        let head = self.head.load(Ordering::Relaxed);
        let tail = self.tail.load(Ordering::Acquire);
        if head == tail {
            return None;
        }
        let slot = head & self.mask;
        // SAFETY: the consumer is the only reader/remover of this slot, and
        // the Acquire load of `tail` synchronizes with the producer's Release
        // store, so the entry write above is visible here.
        let entry = unsafe { (*self.buffer[slot].get())? };
        if entry.frame < end_frame {
            Some((entry.frame, entry.message))
        } else {
            None
        }
    }

    /// Consumer-only. Advances past the entry last returned by `peek_next`.
    pub fn pop(&self) {
        let head = self.head.load(Ordering::Relaxed);
        let slot = head & self.mask;
        // SAFETY: consumer-exclusive slot; clearing it lets a later producer
        // write reuse it once `head` advances past it.
        unsafe {
            *self.buffer[slot].get() = None;
        }
        self.head.store(head.wrapping_add(1), Ordering::Release);
    }

    pub fn is_empty(&self) -> bool {
        self.head.load(Ordering::Relaxed) == self.tail.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.tail.load(Ordering::Relaxed).wrapping_sub(self.head.load(Ordering::Relaxed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn ctrl_msg(v: f32) -> Message {
        Message::TempoChange(v)
    }

    #[test]
    fn fifo_single_threaded() {
        let q = TimestampedQueue::new(4);
        assert!(q.add(0, ctrl_msg(1.0)));
        assert!(q.add(1, ctrl_msg(2.0)));
        let (f, _) = q.peek_next(100).unwrap();
        assert_eq!(f, 0);
        q.pop();
        let (f, _) = q.peek_next(100).unwrap();
        assert_eq!(f, 1);
        q.pop();
        assert!(q.peek_next(100).is_none());
    }

    #[test]
    fn peek_respects_end_frame() {
        let q = TimestampedQueue::new(4);
        q.add(10, ctrl_msg(1.0));
        assert!(q.peek_next(10).is_none());
        assert!(q.peek_next(11).is_some());
    }

    #[test]
    fn overflow_drops_advisory() {
        let q = TimestampedQueue::new(2);
        assert!(q.add(0, ctrl_msg(0.0)));
        assert!(q.add(1, ctrl_msg(1.0)));
        assert!(!q.add(2, ctrl_msg(2.0)));
        assert_eq!(q.dropped_count(), 1);
    }

    #[test]
    fn spsc_stress_preserves_order_and_count() {
        let q = Arc::new(TimestampedQueue::new(1024));
        const N: i64 = 200_000;
        let producer = {
            let q = Arc::clone(&q);
            thread::spawn(move || {
                let mut frame = 0i64;
                while frame < N {
                    if q.add(frame, ctrl_msg(frame as f32)) {
                        frame += 1;
                    }
                }
            })
        };
        let consumer = {
            let q = Arc::clone(&q);
            thread::spawn(move || {
                let mut expected = 0i64;
                while expected < N {
                    if let Some((frame, _)) = q.peek_next(i64::MAX) {
                        assert_eq!(frame, expected, "FIFO order violated");
                        q.pop();
                        expected += 1;
                    }
                }
                expected
            })
        };
        producer.join().unwrap();
        assert_eq!(consumer.join().unwrap(), N);
    }
}
