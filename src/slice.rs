//! Sample data: immutable PCM slices keyed by root pitch, stored in a pool
//! with deferred release so the audio thread never reads freed memory across
//! a `set_sample_data` swap.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

/// A view over mono PCM samples tagged with the pitch it was recorded at.
#[derive(Debug, Clone)]
pub struct Slice {
    pub samples: Arc<[f32]>,
    pub sample_rate: i32,
    pub root_pitch: f32,
}

impl Slice {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Linearly interpolated read at a fractional sample offset; 0 past the end.
    pub fn sample_at(&self, offset: f64) -> f32 {
        if offset < 0.0 || self.samples.is_empty() {
            return 0.0;
        }
        let i0 = offset.floor() as usize;
        if i0 + 1 >= self.samples.len() {
            return if i0 < self.samples.len() { self.samples[i0] } else { 0.0 };
        }
        let frac = (offset - i0 as f64) as f32;
        let a = self.samples[i0];
        let b = self.samples[i0 + 1];
        a + (b - a) * frac
    }
}

/// Opaque handle to the first slot of a bound slice chain within a [`SlicePool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SliceHandle(u32);

struct Slot {
    slice: Option<Slice>,
    next: Option<u32>,
}

/// Fixed-capacity pool of slice records, chained per `SampleData`, with a
/// free-list on the control side and a retirement queue gated by the audio
/// thread's published `safe_frame`.
///
/// Slot storage is only ever mutated by the control thread; the audio thread
/// only reads slots it was handed through a `SampleDataBind` message, and the
/// control thread never recycles a slot until `retire_frame < safe_frame`, so
/// the two threads' accesses never overlap in time even though they overlap
/// in address space.
pub struct SlicePool {
    slots: Box<[UnsafeCell<Slot>]>,
    free_list: Vec<u32>,
    retirement: Vec<(u32, i64)>,
    safe_frame: AtomicI64,
}

// SAFETY: see struct doc comment; cross-thread access is time-disjoint by construction.
unsafe impl Sync for SlicePool {}
unsafe impl Send for SlicePool {}

impl SlicePool {
    pub fn new(capacity: usize) -> Self {
        let slots = (0..capacity)
            .map(|_| UnsafeCell::new(Slot { slice: None, next: None }))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self {
            slots,
            free_list: (0..capacity as u32).rev().collect(),
            retirement: Vec::new(),
            safe_frame: AtomicI64::new(0),
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Control-side only. Binds `slices` into a fresh chain, returning a
    /// handle to the first slot, or `None` if the pool is exhausted.
    pub fn acquire(&mut self, slices: Vec<Slice>) -> Option<SliceHandle> {
        if slices.is_empty() || slices.len() > self.free_list.len() {
            return None;
        }
        let mut indices = Vec::with_capacity(slices.len());
        for _ in 0..slices.len() {
            indices.push(self.free_list.pop().expect("checked above"));
        }
        for (i, slice) in slices.into_iter().enumerate() {
            let idx = indices[i] as usize;
            let next = indices.get(i + 1).copied();
            // SAFETY: slot just came off the free-list; the audio thread
            // cannot have a handle to it yet.
            unsafe {
                *self.slots[idx].get() = Slot { slice: Some(slice), next };
            }
        }
        Some(SliceHandle(indices[0]))
    }

    /// Control-side only. Queues the chain starting at `first` for release
    /// once the audio thread has advanced past `frame`.
    pub fn release_at(&mut self, first: SliceHandle, frame: i64) {
        self.retirement.push((first.0, frame));
    }

    /// Control-side only. Returns slots whose retirement frame is behind the
    /// audio thread's published `safe_frame` to the free-list.
    pub fn reclaim(&mut self) {
        let safe_frame = self.safe_frame.load(Ordering::Acquire);
        let mut i = 0;
        while i < self.retirement.len() {
            let (first, retire_frame) = self.retirement[i];
            if retire_frame < safe_frame {
                self.retirement.swap_remove(i);
                self.free_chain(first);
            } else {
                i += 1;
            }
        }
    }

    fn free_chain(&mut self, first: u32) {
        let mut cur = Some(first);
        while let Some(idx) = cur {
            // SAFETY: reachable only after `reclaim` confirmed the audio
            // thread is past this chain's retirement frame.
            let slot = unsafe { &mut *self.slots[idx as usize].get() };
            cur = slot.next.take();
            slot.slice = None;
            self.free_list.push(idx);
        }
    }

    /// Audio-side only. Publishes how far the audio thread has advanced, so
    /// the control thread may reclaim slots retired before this frame.
    pub fn publish_safe_frame(&self, frame: i64) {
        self.safe_frame.store(frame, Ordering::Release);
    }

    fn get(&self, idx: u32) -> Option<&Slice> {
        // SAFETY: caller holds a `SliceHandle` bound while the chain is live;
        // the control thread defers recycling until the audio side has moved on.
        let slot = unsafe { &*self.slots[idx as usize].get() };
        slot.slice.as_ref()
    }

    /// Audio-side. Walks the chain from `handle`, selecting the slice whose
    /// `root_pitch` is nearest `played_pitch` (ties favor the upper neighbor).
    /// If several candidates share that nearest `root_pitch`, one is chosen
    /// uniformly with `rng`, via reservoir sampling over the chain so the
    /// audio thread never allocates a candidate buffer.
    pub fn select_slice(&self, handle: SliceHandle, played_pitch: f32, rng: &mut SmallRng) -> Option<&Slice> {
        let mut best_distance = f32::INFINITY;
        let mut best_root = f32::NAN;
        let mut best_idx: Option<u32> = None;
        let mut tie_count: u32 = 0;
        let mut cur = Some(handle.0);
        while let Some(idx) = cur {
            let slot = unsafe { &*self.slots[idx as usize].get() };
            if let Some(slice) = &slot.slice {
                let distance = (slice.root_pitch - played_pitch).abs();
                let better = distance < best_distance || (distance == best_distance && slice.root_pitch > best_root);
                if better {
                    best_distance = distance;
                    best_root = slice.root_pitch;
                    best_idx = Some(idx);
                    tie_count = 1;
                } else if distance == best_distance && slice.root_pitch == best_root {
                    tie_count += 1;
                    if rng.gen_range(0..tie_count) == 0 {
                        best_idx = Some(idx);
                    }
                }
            }
            cur = slot.next;
        }
        best_idx.and_then(|idx| self.get(idx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slice(root_pitch: f32) -> Slice {
        Slice { samples: Arc::from(vec![0.0f32; 4]), sample_rate: 48_000, root_pitch }
    }

    #[test]
    fn nearest_root_with_upper_tiebreak() {
        let mut pool = SlicePool::new(16);
        let handle = pool.acquire(vec![slice(5.0), slice(15.0), slice(35.0)]).unwrap();
        let mut rng = SmallRng::seed_from_u64(1);
        assert_eq!(pool.select_slice(handle, 20.0, &mut rng).unwrap().root_pitch, 15.0);
        assert_eq!(pool.select_slice(handle, 25.0, &mut rng).unwrap().root_pitch, 35.0);
    }

    #[test]
    fn deferred_release_waits_for_safe_frame() {
        let mut pool = SlicePool::new(4);
        let handle = pool.acquire(vec![slice(0.0)]).unwrap();
        pool.release_at(handle, 100);
        pool.reclaim();
        assert_eq!(pool.free_list.len(), 3, "must not reclaim before safe_frame catches up");
        pool.publish_safe_frame(101);
        pool.reclaim();
        assert_eq!(pool.free_list.len(), 4);
    }
}
