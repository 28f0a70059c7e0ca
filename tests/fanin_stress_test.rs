//! Fan-In Stress Test - Banyak realtime producer, satu dispatch consumer
//!
//! Setiap producer memegang buffer-nya sendiri dan mengirim event
//! ber-timestamp. Consumer me-refresh snapshot sekali per scan lalu
//! menguras registry dengan view beku.
//!
//! Usage:
//!   cargo test --release --test fanin_stress_test -- --nocapture

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use kurir::{BufferId, BufferRegistry, Error, Overflow, Stamped, View};

/// Payload event: (sumber, nomor urut per sumber)
type Event = Stamped<(BufferId, u64)>;

/// Statistics collector
struct StressStats {
    produced: AtomicU64,
    dropped: AtomicU64,
    finished: AtomicUsize,
}

impl StressStats {
    fn new() -> Self {
        Self {
            produced: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            finished: AtomicUsize::new(0),
        }
    }

    fn print_report(&self, consumed: u64, scans: u64, duration: Duration) {
        let produced = self.produced.load(Ordering::Relaxed);
        let dropped = self.dropped.load(Ordering::Relaxed);

        println!("\n📊 FAN-IN STRESS RESULTS");
        println!("========================");
        println!("  Duration:      {:.2}ms", duration.as_secs_f64() * 1000.0);
        println!("  Produced:      {}", produced);
        println!("  Dropped:       {}", dropped);
        println!("  Consumed:      {}", consumed);
        println!("  Scans:         {}", scans);
    }
}

/// Hasil sisi consumer
#[derive(Default)]
struct Drained {
    consumed: u64,
    scans: u64,
    // Nomor urut terakhir per sumber
    last_seq: Vec<Option<u64>>,
}

/// Producer thread per buffer, consumer di thread pemanggil.
///
/// `retry` = true mensimulasikan producer non-realtime yang menunggu
/// saat buffer penuh; false = realtime, overflow langsung dihitung sebagai drop.
fn run_fanin(sources: BufferId, capacity: usize, events: u64, retry: bool) -> (StressStats, Drained) {
    let mut registry: BufferRegistry<Event> = BufferRegistry::new();
    for id in 0..sources {
        registry.create_buffer(id, capacity).unwrap();
    }

    let stats = StressStats::new();
    let mut drained = Drained {
        last_seq: vec![None; sources as usize],
        ..Default::default()
    };

    let (producers, mut rx) = registry.split_producers();
    let producer_count = producers.len();

    thread::scope(|s| {
        for mut tx in producers {
            let stats = &stats;
            s.spawn(move || {
                let id = tx.id();
                for seq in 0..events {
                    let mut event = Stamped::new(seq * 16 + id as u64, (id, seq));
                    loop {
                        match tx.put(event) {
                            Ok(()) => {
                                stats.produced.fetch_add(1, Ordering::Relaxed);
                                break;
                            }
                            Err(Overflow(back)) if retry => {
                                event = back;
                                std::hint::spin_loop();
                            }
                            Err(_) => {
                                stats.dropped.fetch_add(1, Ordering::Relaxed);
                                break;
                            }
                        }
                    }
                }
                stats.finished.fetch_add(1, Ordering::Release);
            });
        }

        loop {
            let done = stats.finished.load(Ordering::Acquire) == producer_count;
            if rx.size(View::Live) == 0 {
                if done {
                    break;
                }
                thread::yield_now();
                continue;
            }

            drained.scans += 1;
            let mut last_time = 0;
            loop {
                match rx.get(View::Snapshot) {
                    Ok(event) => {
                        // Dalam satu scan snapshot, urutan gabungan tidak turun
                        assert!(event.time >= last_time, "merge order broken within scan");
                        last_time = event.time;

                        // FIFO per sumber: nomor urut selalu naik
                        let (source, seq) = event.payload;
                        let last = &mut drained.last_seq[source as usize];
                        if let Some(prev) = *last {
                            assert!(seq > prev, "source {} reordered: {} after {}", source, seq, prev);
                        }
                        *last = Some(seq);
                        drained.consumed += 1;
                    }
                    Err(Error::Empty) => break,
                    Err(e) => panic!("unexpected error: {}", e),
                }
            }
        }
    });

    (stats, drained)
}

#[test]
fn test_fanin_no_loss_with_backpressure() {
    println!("\n🧪 FAN-IN STRESS - 4 sources, retry on overflow");
    println!("================================================\n");

    const SOURCES: BufferId = 4;
    const EVENTS: u64 = 50_000;

    let start = Instant::now();
    let (stats, drained) = run_fanin(SOURCES, 64, EVENTS, true);
    stats.print_report(drained.consumed, drained.scans, start.elapsed());

    assert_eq!(stats.dropped.load(Ordering::Relaxed), 0);
    assert_eq!(drained.consumed, SOURCES as u64 * EVENTS);
    for last in &drained.last_seq {
        assert_eq!(*last, Some(EVENTS - 1));
    }
}

#[test]
fn test_realtime_overflow_accounting() {
    println!("\n🧪 FAN-IN STRESS - 8 sources, realtime drop on overflow");
    println!("=======================================================\n");

    const SOURCES: BufferId = 8;
    const EVENTS: u64 = 20_000;

    let start = Instant::now();
    let (stats, drained) = run_fanin(SOURCES, 16, EVENTS, false);
    stats.print_report(drained.consumed, drained.scans, start.elapsed());

    let produced = stats.produced.load(Ordering::Relaxed);
    let dropped = stats.dropped.load(Ordering::Relaxed);
    assert_eq!(produced + dropped, SOURCES as u64 * EVENTS);
    assert_eq!(drained.consumed, produced);
}

#[test]
fn test_peek_matches_get_during_production() {
    const SOURCES: BufferId = 3;
    const EVENTS: u64 = 10_000;

    let mut registry: BufferRegistry<Event> = BufferRegistry::new();
    for id in 0..SOURCES {
        registry.create_buffer(id, 32).unwrap();
    }

    let finished = AtomicUsize::new(0);
    let (producers, mut rx) = registry.split_producers();
    let mut consumed = 0u64;

    thread::scope(|s| {
        for mut tx in producers {
            let finished = &finished;
            s.spawn(move || {
                let id = tx.id();
                for seq in 0..EVENTS {
                    let mut event = Stamped::new(seq * 4 + id as u64, (id, seq));
                    while let Err(Overflow(back)) = tx.put(event) {
                        event = back;
                        thread::yield_now();
                    }
                }
                finished.fetch_add(1, Ordering::Release);
            });
        }

        loop {
            let done = finished.load(Ordering::Acquire) == SOURCES as usize;
            let pending = rx.size(View::Live);
            if pending == 0 {
                if done {
                    break;
                }
                thread::yield_now();
                continue;
            }

            // Prediksi seluruh scan dulu, lalu pastikan get mengikutinya
            let predicted: Vec<(BufferId, u64)> = (0..pending)
                .map(|n| rx.peek(View::Snapshot, n).unwrap().payload)
                .collect();
            assert_eq!(rx.size(View::Snapshot), pending);

            for expected in predicted {
                assert_eq!(rx.get(View::Snapshot).unwrap().payload, expected);
                consumed += 1;
            }
            assert!(rx.is_empty(View::Snapshot));
        }
    });

    assert_eq!(consumed, SOURCES as u64 * EVENTS);
}

#[test]
fn test_buffer_reuse_after_quiesce() {
    let mut registry: BufferRegistry<u64> = BufferRegistry::new();
    registry.create_buffer(1, 4).unwrap();
    registry.create_buffer(2, 4).unwrap();

    {
        let (mut tx, _rx) = registry.split();
        for i in 0..4 {
            tx.put(1, i).unwrap();
        }
    }

    // Semua handle sudah di-drop: administrasi aman
    registry.delete_buffer(1).unwrap();
    registry.set_capacity(2, 8).unwrap();
    registry.create_buffer(1, 2).unwrap();

    let (mut tx, mut rx) = registry.split();
    tx.put(2, 7).unwrap();
    tx.put(1, 3).unwrap();
    assert_eq!(rx.get(View::Live), Ok(3));
    assert_eq!(rx.get(View::Live), Ok(7));
    assert_eq!(rx.get(View::Live), Err(Error::Empty));
}
