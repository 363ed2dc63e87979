// src/queue.rs
//! Single-producer / multi-consumer seqlock broadcast ring.
//!
//! The producer writes monotonically and never blocks; each consumer owns an
//! independent read index and detects in-progress or torn slots from the
//! per-slot sequence counter. A slot's sequence is odd while a write is in
//! flight and even once committed, and only ever grows: the committed value
//! for lap `r` of a slot is `2 * (r + 1)`, so a consumer can also tell when
//! the producer has lapped it and overwritten the slot it was about to read.
//!
//! Consumers that fall more than one capacity behind lose data by design;
//! the upstream is a replayable file, so lossy consumers skip forward rather
//! than stall the producer.

use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::ptr;
use std::sync::atomic::{fence, AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

/// One broadcast slot, cache-line aligned so neighbouring slots do not share
/// a line with each other or with the ring header.
#[repr(align(64))]
struct Slot<T> {
    seq: AtomicU32,
    data: UnsafeCell<MaybeUninit<T>>,
}

/// Fixed-capacity broadcast ring over `Copy` values.
#[repr(align(64))]
pub struct SpmcRing<T> {
    slots: Box<[Slot<T>]>,
    mask: u64,
    write_idx: AtomicU64,
    producer_claimed: AtomicBool,
}

// Safety: slots are written only through the unique `Producer` handle and
// read through the seqlock protocol, which copies the value out before
// validating the sequence. `T: Copy` guarantees the racy byte copy of a torn
// read is discarded without running any destructor.
unsafe impl<T: Copy + Send> Send for SpmcRing<T> {}
unsafe impl<T: Copy + Send> Sync for SpmcRing<T> {}

/// Outcome of a single non-blocking read attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome<T> {
    /// The slot was committed and copied out cleanly.
    Ready(T),
    /// Not yet written for this lap, or a write is in flight. Retry later
    /// with the same read index.
    NotReady,
    /// The producer rewrote the slot while we were copying. Retry later with
    /// the same read index.
    Torn,
    /// The producer has lapped this consumer; the message at the current
    /// read index is gone. The consumer decides whether to skip forward.
    Lapped,
}

impl<T: Copy + Send> SpmcRing<T> {
    /// `capacity` must be a power of two.
    pub fn new(capacity: usize) -> Arc<Self> {
        assert!(capacity.is_power_of_two(), "ring capacity must be a power of two");
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || Slot {
            seq: AtomicU32::new(0),
            data: UnsafeCell::new(MaybeUninit::uninit()),
        });
        Arc::new(Self {
            slots: slots.into_boxed_slice(),
            mask: (capacity - 1) as u64,
            write_idx: AtomicU64::new(0),
            producer_claimed: AtomicBool::new(false),
        })
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Total messages published so far.
    #[inline]
    pub fn write_index(&self) -> u64 {
        self.write_idx.load(Ordering::Acquire)
    }

    #[inline]
    fn committed_seq(lap: u64) -> u32 {
        ((lap + 1) * 2) as u32
    }
}

/// The unique write handle. Writes are wait-free.
pub struct Producer<T> {
    ring: Arc<SpmcRing<T>>,
    write_idx: u64,
}

impl<T: Copy + Send> Producer<T> {
    /// Claim the ring's unique producer handle. Panics on a second claim:
    /// the sequence protocol is only sound with a single writer.
    pub fn claim(ring: &Arc<SpmcRing<T>>) -> Self {
        let was = ring.producer_claimed.swap(true, Ordering::AcqRel);
        assert!(!was, "ring already has a producer");
        Self { ring: Arc::clone(ring), write_idx: ring.write_index() }
    }

    pub fn push(&mut self, value: T) {
        let slot = &self.ring.slots[(self.write_idx & self.ring.mask) as usize];
        let lap = self.write_idx >> self.ring.mask.count_ones();

        // Mark the write in progress, then make sure the payload stores
        // cannot be reordered ahead of the odd sequence.
        slot.seq.store(SpmcRing::<T>::committed_seq(lap) - 1, Ordering::Release);
        fence(Ordering::Release);
        unsafe {
            ptr::write_volatile((*slot.data.get()).as_mut_ptr(), value);
        }
        slot.seq.store(SpmcRing::<T>::committed_seq(lap), Ordering::Release);

        self.write_idx += 1;
        self.ring.write_idx.store(self.write_idx, Ordering::Release);
    }

    #[inline]
    pub fn written(&self) -> u64 {
        self.write_idx
    }
}

/// A per-consumer read cursor. Each consumer owns its index; consumers never
/// coordinate with each other or with the producer.
pub struct Consumer<T> {
    ring: Arc<SpmcRing<T>>,
    read_idx: u64,
}

impl<T: Copy + Send> Consumer<T> {
    /// Attach a new consumer at the beginning of the stream. Consumers are
    /// independent; attaching never affects the producer or other readers.
    pub fn attach(ring: &Arc<SpmcRing<T>>) -> Self {
        Self { ring: Arc::clone(ring), read_idx: 0 }
    }

    /// Attempt to read the message at the current index. Advances the index
    /// only on `Ready`.
    pub fn try_next(&mut self) -> ReadOutcome<T> {
        let slot = &self.ring.slots[(self.read_idx & self.ring.mask) as usize];
        let lap = self.read_idx >> self.ring.mask.count_ones();
        let expected = SpmcRing::<T>::committed_seq(lap);

        let seq0 = slot.seq.load(Ordering::Acquire);
        if seq0 & 1 == 1 || seq0 < expected {
            return ReadOutcome::NotReady;
        }
        if seq0 > expected {
            return ReadOutcome::Lapped;
        }

        let value = unsafe { ptr::read_volatile((*slot.data.get()).as_ptr()) };
        fence(Ordering::Acquire);

        let seq1 = slot.seq.load(Ordering::Acquire);
        if seq1 != seq0 {
            return ReadOutcome::Torn;
        }

        self.read_idx += 1;
        ReadOutcome::Ready(value)
    }

    /// Messages published but not yet read by this consumer.
    #[inline]
    pub fn lag(&self) -> u64 {
        self.ring.write_index().saturating_sub(self.read_idx)
    }

    #[inline]
    pub fn read_index(&self) -> u64 {
        self.read_idx
    }

    /// Jump past a lapped region to the oldest message still retained. Lossy.
    pub fn skip_to_latest(&mut self) -> u64 {
        let write = self.ring.write_index();
        let oldest = write.saturating_sub(self.ring.capacity() as u64);
        let skipped = oldest.saturating_sub(self.read_idx);
        self.read_idx = self.read_idx.max(oldest);
        skipped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_thread_fifo() {
        let ring = SpmcRing::<u64>::new(8);
        let mut tx = Producer::claim(&ring);
        let mut rx = Consumer::attach(&ring);

        assert_eq!(rx.try_next(), ReadOutcome::NotReady);
        for v in 0..5u64 {
            tx.push(v);
        }
        for v in 0..5u64 {
            assert_eq!(rx.try_next(), ReadOutcome::Ready(v));
        }
        assert_eq!(rx.try_next(), ReadOutcome::NotReady);
        assert_eq!(rx.read_index(), 5);
    }

    #[test]
    fn lap_detection_and_skip() {
        let ring = SpmcRing::<u64>::new(4);
        let mut tx = Producer::claim(&ring);
        let mut rx = Consumer::attach(&ring);

        // Two full laps: the consumer's first slot now holds lap-1 data.
        for v in 0..8u64 {
            tx.push(v);
        }
        assert_eq!(rx.try_next(), ReadOutcome::Lapped);
        let skipped = rx.skip_to_latest();
        assert_eq!(skipped, 4);
        assert_eq!(rx.try_next(), ReadOutcome::Ready(4));
    }

    #[test]
    #[should_panic(expected = "already has a producer")]
    fn second_producer_claim_panics() {
        let ring = SpmcRing::<u64>::new(4);
        let _tx = Producer::claim(&ring);
        let _tx2 = Producer::claim(&ring);
    }

    #[test]
    fn independent_consumers_see_the_same_stream() {
        let ring = SpmcRing::<u32>::new(16);
        let mut tx = Producer::claim(&ring);
        let mut a = Consumer::attach(&ring);
        let mut b = Consumer::attach(&ring);

        for v in 0..10u32 {
            tx.push(v);
        }
        for v in 0..10u32 {
            assert_eq!(a.try_next(), ReadOutcome::Ready(v));
        }
        // b lagged the whole time but lost nothing: capacity exceeds volume.
        for v in 0..10u32 {
            assert_eq!(b.try_next(), ReadOutcome::Ready(v));
        }
    }
}
