// tests/queue_spmc.rs
use itchcast::queue::{Consumer, Producer, ReadOutcome, SpmcRing};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const FNV_PRIME: u64 = 0x0100_0000_01b3;

/// One cache line of payload with a checksum over every byte, so a torn copy
/// cannot masquerade as a successful read.
#[derive(Clone, Copy, Debug)]
struct TestMsg {
    seq: u64,
    check: u64,
    pad: [u8; 48],
}

impl TestMsg {
    fn new(seq: u64) -> Self {
        let mut pad = [0u8; 48];
        for (i, b) in pad.iter_mut().enumerate() {
            *b = (seq as u8).wrapping_add(i as u8);
        }
        Self { seq, check: Self::checksum(seq, &pad), pad }
    }

    fn checksum(seq: u64, pad: &[u8; 48]) -> u64 {
        let mut h = seq ^ 0xcbf2_9ce4_8422_2325;
        for &b in pad {
            h = h.wrapping_mul(FNV_PRIME) ^ u64::from(b);
        }
        h
    }

    fn verify(&self) {
        assert_eq!(self.check, Self::checksum(self.seq, &self.pad), "torn payload escaped");
    }
}

/// A consumer that keeps up observes the producer's exact write sequence:
/// no gaps, no duplicates, no reordering.
#[test]
fn keeping_up_consumer_sees_every_message_in_order() {
    const K: usize = 1024;
    const TOTAL: u64 = 10_000;

    let ring = SpmcRing::<TestMsg>::new(K);
    let consumed = Arc::new(AtomicU64::new(0));

    let producer = {
        let ring = Arc::clone(&ring);
        let consumed = Arc::clone(&consumed);
        thread::spawn(move || {
            let mut tx = Producer::claim(&ring);
            for seq in 0..TOTAL {
                // Stay well inside one lap of the slowest consumer.
                while tx.written().saturating_sub(consumed.load(Ordering::Acquire))
                    > (K / 2) as u64
                {
                    thread::yield_now();
                }
                tx.push(TestMsg::new(seq));
            }
        })
    };

    let mut rx = Consumer::attach(&ring);
    let mut expected = 0u64;
    while expected < TOTAL {
        match rx.try_next() {
            ReadOutcome::Ready(msg) => {
                msg.verify();
                assert_eq!(msg.seq, expected);
                expected += 1;
                consumed.store(expected, Ordering::Release);
            }
            ReadOutcome::NotReady | ReadOutcome::Torn => std::hint::spin_loop(),
            ReadOutcome::Lapped => panic!("throttled producer must not lap the consumer"),
        }
    }

    producer.join().unwrap();
    assert_eq!(rx.read_index(), TOTAL);
}

/// A slow consumer against a full-speed producer: successful reads form a
/// strictly increasing subsequence of the writes, every payload passes its
/// checksum, and the read index never moves backwards.
#[test]
fn slow_consumer_loses_data_but_never_reads_garbage() {
    const K: usize = 1024;
    const TOTAL: u64 = 10_000;

    let ring = SpmcRing::<TestMsg>::new(K);
    let done = Arc::new(AtomicBool::new(false));

    let producer = {
        let ring = Arc::clone(&ring);
        let done = Arc::clone(&done);
        thread::spawn(move || {
            let mut tx = Producer::claim(&ring);
            for seq in 0..TOTAL {
                tx.push(TestMsg::new(seq));
            }
            done.store(true, Ordering::Release);
        })
    };

    let mut rx = Consumer::attach(&ring);
    let mut seen: Vec<u64> = Vec::new();
    let mut reads_since_sleep = 0u32;
    loop {
        let before = rx.read_index();
        match rx.try_next() {
            ReadOutcome::Ready(msg) => {
                msg.verify();
                if let Some(&last) = seen.last() {
                    assert!(msg.seq > last, "reads must be a subsequence of the writes");
                }
                seen.push(msg.seq);
                reads_since_sleep += 1;
                if reads_since_sleep % 64 == 0 {
                    // Fall behind on purpose.
                    thread::sleep(Duration::from_micros(200));
                }
            }
            ReadOutcome::Lapped => {
                // Lossy by design; jump to the oldest retained message.
                rx.skip_to_latest();
            }
            ReadOutcome::Torn => std::hint::spin_loop(),
            ReadOutcome::NotReady => {
                if done.load(Ordering::Acquire) && rx.lag() == 0 {
                    break;
                }
                std::hint::spin_loop();
            }
        }
        assert!(rx.read_index() >= before, "read index went backwards");
    }

    producer.join().unwrap();
    assert!(!seen.is_empty());
    assert!(seen.len() as u64 <= TOTAL);
    assert_eq!(*seen.last().unwrap(), TOTAL - 1, "a draining consumer ends at the tail");
}

/// Several consumers at different speeds never interfere with each other or
/// with the producer.
#[test]
fn broadcast_reaches_independent_consumers() {
    const K: usize = 256;
    const TOTAL: u64 = 4_096;

    let ring = SpmcRing::<TestMsg>::new(K);
    let done = Arc::new(AtomicBool::new(false));

    let mut consumers = Vec::new();
    for lazy in [false, true] {
        let ring = Arc::clone(&ring);
        let done = Arc::clone(&done);
        consumers.push(thread::spawn(move || {
            let mut rx = Consumer::attach(&ring);
            let mut last: Option<u64> = None;
            let mut count = 0u64;
            loop {
                match rx.try_next() {
                    ReadOutcome::Ready(msg) => {
                        msg.verify();
                        if let Some(l) = last {
                            assert!(msg.seq > l);
                        }
                        last = Some(msg.seq);
                        count += 1;
                        if lazy && count % 128 == 0 {
                            thread::sleep(Duration::from_micros(100));
                        }
                    }
                    ReadOutcome::Lapped => {
                        rx.skip_to_latest();
                    }
                    ReadOutcome::Torn | ReadOutcome::NotReady => {
                        if done.load(Ordering::Acquire) && rx.lag() == 0 {
                            break;
                        }
                        std::hint::spin_loop();
                    }
                }
            }
            count
        }));
    }

    {
        let mut tx = Producer::claim(&ring);
        for seq in 0..TOTAL {
            tx.push(TestMsg::new(seq));
        }
        done.store(true, Ordering::Release);
    }

    for handle in consumers {
        let count = handle.join().unwrap();
        assert!(count > 0 && count <= TOTAL);
    }
}
