// src/main.rs
mod metrics;

use anyhow::{anyhow, ensure, Context, Result};
use clap::{Parser as ClapParser, Subcommand};
use serde_json::json;
use std::{
    io::Write,
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
};
use tracing::info;

use crate::metrics::Metrics;
use itchcast::{
    book::{OrderBook, PriceLevel, Side},
    builder::{BookBuilder, BuilderOutput},
    itch::{self, Envelope},
    parser::{CaptureReader, ItchProducer},
    queue::{Consumer, Producer, SpmcRing},
    snapshot,
};

#[derive(ClapParser, Debug)]
#[command(name = "itchcast", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Replay an ITCH 5.0 capture and build per-security books.
    Run {
        /// Capture file: [u16_be length][payload] records.
        #[arg(long)]
        file: PathBuf,
        /// Broadcast queue capacity; must be a power of two.
        #[arg(long, default_value_t = 4096)]
        capacity: usize,
        /// Book-builder threads; securities shard by locate code.
        #[arg(long, default_value_t = 1)]
        consumers: usize,
        /// Restrict building to these locate codes (repeatable).
        #[arg(long)]
        locate: Vec<u16>,
        /// Levels per side in the final snapshot.
        #[arg(long, default_value_t = 10)]
        depth: usize,
        #[arg(long, default_value = "final_books.json")]
        out: PathBuf,
        /// Stream top-of-book changes as NDJSON on stdout.
        #[arg(long)]
        tape: bool,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()))
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Cmd::Run { file, capacity, consumers, locate, depth, out, tape } => {
            run(file, capacity, consumers, locate, depth, out, tape)
        }
    }
}

fn run(
    file: PathBuf,
    capacity: usize,
    consumers: usize,
    locate: Vec<u16>,
    depth: usize,
    out: PathBuf,
    tape: bool,
) -> Result<()> {
    ensure!(capacity.is_power_of_two(), "--capacity must be a power of two");
    ensure!(consumers >= 1, "need at least one consumer");

    let mut reader = CaptureReader::open(&file)?;
    info!("capture: {:?} bytes={}", file, reader.len());

    let ring = SpmcRing::<Envelope>::new(capacity);
    let running = Arc::new(AtomicBool::new(true));

    let mut handles = Vec::with_capacity(consumers);
    for shard in 0..consumers {
        let rx = Consumer::attach(&ring);
        let running = Arc::clone(&running);
        let locate = locate.clone();
        handles.push(thread::spawn(move || -> Result<BuilderOutput> {
            let mut builder = BookBuilder::new(rx, shard, consumers);
            if !locate.is_empty() {
                builder.retain_only(&locate);
            }
            if tape {
                builder.run(&running, |loc, bid, ask| {
                    let line = snapshot::encode_top(loc, bid, ask);
                    let stdout = std::io::stdout();
                    let mut w = stdout.lock();
                    let _ = w.write_all(&line);
                    let _ = w.write_all(b"\n");
                })
            } else {
                builder.run(&running, |_, _, _| {})
            }
        }));
    }

    let mut producer = ItchProducer::new(Producer::claim(&ring));
    let report = producer.run(&mut reader);
    info!(
        "producer done: frames={} published={} unknown={} short={}",
        report.frames, report.published, report.unknown_types, report.short_frames
    );
    running.store(false, Ordering::Relaxed);

    let mut metrics = Metrics::default();
    metrics.absorb_producer(&report);

    let mut books: Vec<(u16, Option<[u8; 8]>, OrderBook)> = Vec::new();
    for handle in handles {
        let output = handle
            .join()
            .map_err(|_| anyhow!("builder thread panicked"))?
            .context("builder failed")?;
        metrics.absorb_builder(&output.stats);
        for (loc, book) in output.books {
            let ticker = output.tickers.get(&loc).copied();
            books.push((loc, ticker, book));
        }
    }

    if tape {
        let stdout = std::io::stdout();
        let mut w = stdout.lock();
        for (loc, ticker, book) in &books {
            let name = ticker.as_ref().map(itch::trim_ticker).unwrap_or("");
            let line = snapshot::encode_book(
                name,
                *loc,
                &book.snapshot_top_k(Side::Bid, depth),
                &book.snapshot_top_k(Side::Ask, depth),
            );
            let _ = w.write_all(&line);
            let _ = w.write_all(b"\n");
        }
    }

    let final_text = build_final_json(&books, depth);
    std::fs::write(&out, final_text).with_context(|| format!("write snapshot {:?}", out))?;
    info!("wrote final books to {:?}", out);
    info!("metrics:\n{}", metrics.text_report());
    Ok(())
}

fn build_final_json(books: &[(u16, Option<[u8; 8]>, OrderBook)], depth: usize) -> String {
    let mut entries = serde_json::Map::new();
    let mut sorted: Vec<_> = books.iter().collect();
    sorted.sort_by_key(|(loc, _, _)| *loc);

    for (loc, ticker, book) in sorted {
        let name = match ticker {
            Some(t) => {
                let t = itch::trim_ticker(t);
                if t.is_empty() { format!("locate:{loc}") } else { t.to_string() }
            }
            None => format!("locate:{loc}"),
        };
        let bids: Vec<PriceLevel> = book.snapshot_top_k(Side::Bid, depth);
        let asks: Vec<PriceLevel> = book.snapshot_top_k(Side::Ask, depth);
        if bids.is_empty() && asks.is_empty() {
            continue;
        }
        entries.insert(
            name,
            json!({
                "locate": loc,
                "bids": bids,
                "asks": asks
            }),
        );
    }

    json!({ "type": "final", "books": entries }).to_string()
}
