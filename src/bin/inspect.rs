use std::path::PathBuf;

use anyhow::{anyhow, Result};
use itchcast::itch::{kind_name, wire_len};
use itchcast::parser::CaptureReader;

fn main() -> Result<()> {
    let path: PathBuf = std::env::args()
        .nth(1)
        .ok_or_else(|| anyhow!("usage: inspect <capture-file>"))?
        .into();

    let mut reader = CaptureReader::open(&path)?;

    let mut counts = [0u64; 256];
    let mut short = 0u64;
    let mut total = 0u64;

    while let Some(frame) = reader.next_frame() {
        total += 1;
        match frame.first() {
            Some(&t) => {
                counts[t as usize] += 1;
                if wire_len(t).is_some_and(|need| frame.len() < need) {
                    short += 1;
                }
            }
            None => short += 1,
        }
    }

    for (t, &n) in counts.iter().enumerate() {
        if n == 0 {
            continue;
        }
        match kind_name(t as u8) {
            Some(name) => println!("{name}={n}"),
            None => println!("unknown(0x{t:02x})={n}"),
        }
    }
    println!("total={total}");
    println!("malformed={short}");
    Ok(())
}
