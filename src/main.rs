//! Kurir - Fan-In Demo dan Benchmark
//!
//! Simulasi beberapa realtime producer (misal audio/MIDI callback) yang
//! mengirim event ber-timestamp ke satu consumer (UI/dispatch thread).
//!
//! Usage:
//!   cargo run --release -- [OPTIONS]
//!   RUST_LOG=debug cargo run --release -- --sources 8

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use tracing::{debug, info};

use kurir::{BufferId, BufferRegistry, RegistryConfig, RingBuffer, Stamped, View};

/// Demo configuration
struct DemoConfig {
    sources: usize,
    capacity: usize,
    events: u64,
    verbose: bool,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            sources: 4,
            capacity: 1024,
            events: 100_000,
            verbose: false,
        }
    }
}

/// Statistik producer, dibaca consumer di akhir
struct FanInStats {
    produced: AtomicU64,
    dropped: AtomicU64,
    finished: AtomicUsize,
}

impl FanInStats {
    fn new() -> Self {
        Self {
            produced: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            finished: AtomicUsize::new(0),
        }
    }
}

fn main() -> Result<()> {
    let config = parse_args()?;

    let default_filter = if config.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    println!("🚀 Kurir - Lock-Free Fan-In Ring Buffer");
    println!("=======================================\n");

    benchmark_ring_buffer()?;
    benchmark_registry_merge()?;
    run_fanin_demo(&config)?;

    println!("\n✅ All runs complete!");
    Ok(())
}

fn parse_args() -> Result<DemoConfig> {
    let args: Vec<String> = std::env::args().collect();
    let mut config = DemoConfig::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--sources" | "-s" => {
                config.sources = next_value(&args, &mut i)?;
            }
            "--capacity" | "-c" => {
                config.capacity = next_value(&args, &mut i)?;
            }
            "--events" | "-e" => {
                config.events = next_value(&args, &mut i)?;
            }
            "--verbose" | "-v" => {
                config.verbose = true;
            }
            "--help" | "-h" => {
                println!("Kurir - Lock-Free Fan-In Ring Buffer demo\n");
                println!("Usage: kurir [OPTIONS]\n");
                println!("Options:");
                println!("  -s, --sources <N>    Realtime producers (default: 4)");
                println!("  -c, --capacity <N>   Capacity per buffer (default: 1024)");
                println!("  -e, --events <N>     Events per producer (default: 100000)");
                println!("  -v, --verbose        Debug logging");
                println!("  -h, --help           Show this help");
                std::process::exit(0);
            }
            other => bail!("unknown option: {}", other),
        }
        i += 1;
    }

    if config.sources == 0 {
        bail!("--sources must be at least 1");
    }

    Ok(config)
}

fn next_value<V: std::str::FromStr>(args: &[String], i: &mut usize) -> Result<V>
where
    V::Err: std::error::Error + Send + Sync + 'static,
{
    let flag = &args[*i];
    let raw = args
        .get(*i + 1)
        .with_context(|| format!("{} needs a value", flag))?;
    *i += 1;
    raw.parse()
        .with_context(|| format!("invalid value for {}: {}", flag, raw))
}

fn benchmark_ring_buffer() -> Result<()> {
    println!("📊 Ring Buffer Benchmark (Lock-Free SPSC)");
    println!("-----------------------------------------");

    const ITERATIONS: usize = 1_000_000;
    let mut rb: RingBuffer<u64> = RingBuffer::new(0, 65536)?;
    let (mut tx, mut rx) = rb.split();

    // Warm up
    for i in 0..1000 {
        let _ = tx.put(i);
    }
    rx.clear_read();

    // Benchmark put
    let start = Instant::now();
    for i in 0..ITERATIONS {
        if tx.put(i as u64).is_err() {
            let _ = rx.remove();
            let _ = tx.put(i as u64);
        }
    }
    let put_duration = start.elapsed();

    rx.clear_read();
    for i in 0..ITERATIONS.min(rx.capacity()) {
        let _ = tx.put(i as u64);
    }

    // Benchmark get
    let start = Instant::now();
    let mut drained = 0usize;
    while rx.get().is_ok() {
        drained += 1;
    }
    let get_duration = start.elapsed();

    let put_ns = put_duration.as_nanos() as f64 / ITERATIONS as f64;
    let get_ns = get_duration.as_nanos() as f64 / drained.max(1) as f64;

    println!("  Operations: {}", ITERATIONS);
    println!(
        "  Put latency: {:.2} ns/op ({:.3} μs/op)",
        put_ns,
        put_ns / 1000.0
    );
    println!(
        "  Get latency: {:.2} ns/op ({:.3} μs/op)",
        get_ns,
        get_ns / 1000.0
    );
    println!(
        "  Throughput:  {:.2} M ops/sec\n",
        ITERATIONS as f64 / put_duration.as_secs_f64() / 1_000_000.0
    );

    Ok(())
}

fn benchmark_registry_merge() -> Result<()> {
    println!("📊 Registry Merge Benchmark (Fan-In)");
    println!("------------------------------------");

    const BUFFERS: BufferId = 8;
    const PER_BUFFER: u64 = 4096;

    let mut registry: BufferRegistry<u64> = BufferRegistry::new();
    for id in 0..BUFFERS {
        registry.create_buffer(id, PER_BUFFER as usize)?;
    }

    let (mut tx, mut rx) = registry.split();
    for id in 0..BUFFERS {
        for i in 0..PER_BUFFER {
            let _ = tx.put(id, i * BUFFERS as u64 + id as u64);
        }
    }

    let total = rx.size(View::Live);
    let start = Instant::now();
    let mut last = 0u64;
    let mut sorted = true;
    while let Ok(value) = rx.get(View::Snapshot) {
        sorted &= value >= last;
        last = value;
    }
    let merge_duration = start.elapsed();

    let get_ns = merge_duration.as_nanos() as f64 / total.max(1) as f64;
    println!("  Buffers: {}, items: {}", BUFFERS, total);
    println!("  Merge get latency: {:.2} ns/op", get_ns);
    println!("  Merged order: {}\n", if sorted { "sorted ✅" } else { "UNSORTED ⚠️" });

    Ok(())
}

fn run_fanin_demo(config: &DemoConfig) -> Result<()> {
    println!("📊 Fan-In Demo (realtime producers -> dispatch thread)");
    println!("------------------------------------------------------");

    let registry_config = RegistryConfig::default().with_default_capacity(config.capacity);
    let mut registry: BufferRegistry<Stamped<u32>> = BufferRegistry::with_config(registry_config);
    for id in 0..config.sources {
        let id = BufferId::try_from(id).context("too many sources")?;
        registry
            .create_default_buffer(id)
            .with_context(|| format!("creating buffer {}", id))?;
    }
    info!(
        "{} buffers ready (capacity {})",
        registry.len(),
        config.capacity
    );

    let stats = FanInStats::new();
    let (producers, mut rx) = registry.split_producers();
    let sources = producers.len();
    let events = config.events;

    let start = Instant::now();
    let mut consumed = 0u64;
    let mut scans = 0u64;
    let mut torn_scans = 0u64;

    thread::scope(|s| {
        for (index, mut tx) in producers.into_iter().enumerate() {
            let stats = &stats;
            s.spawn(move || {
                for i in 0..events {
                    // Timestamp: periode 10 dengan offset per sumber
                    let event = Stamped::new(i * 10 + index as u64, tx.id() as u32);
                    match tx.put(event) {
                        Ok(()) => stats.produced.fetch_add(1, Ordering::Relaxed),
                        // Realtime path: overflow = data hilang, tidak retry
                        Err(_) => stats.dropped.fetch_add(1, Ordering::Relaxed),
                    };
                    if i % 64 == 63 {
                        // Simulasi periode audio callback
                        thread::sleep(Duration::from_micros(50));
                    }
                }
                stats.finished.fetch_add(1, Ordering::Release);
                debug!("producer {} finished", tx.id());
            });
        }

        // Consumer: refresh snapshot sekali, lalu scan dengan view beku
        loop {
            let done = stats.finished.load(Ordering::Acquire) == sources;
            let pending = rx.size(View::Live);
            if pending == 0 {
                if done {
                    break;
                }
                thread::yield_now();
                continue;
            }

            scans += 1;
            let mut last: Option<u64> = None;
            while let Ok(event) = rx.get(View::Snapshot) {
                if last.is_some_and(|t| event.time < t) {
                    torn_scans += 1;
                }
                last = Some(event.time);
                consumed += 1;
            }
        }
    });

    let elapsed = start.elapsed();
    let produced = stats.produced.load(Ordering::Relaxed);
    let dropped = stats.dropped.load(Ordering::Relaxed);

    println!("  Sources:      {}", sources);
    println!("  Produced:     {}", produced);
    println!("  Dropped:      {} (overflow)", dropped);
    println!("  Consumed:     {}", consumed);
    println!("  Scans:        {}", scans);
    println!(
        "  Rate:         {:.2} M events/sec",
        consumed as f64 / elapsed.as_secs_f64() / 1_000_000.0
    );

    if consumed != produced || torn_scans > 0 {
        bail!(
            "fan-in mismatch: produced {}, consumed {}, unsorted scans {}",
            produced,
            consumed,
            torn_scans
        );
    }

    Ok(())
}
