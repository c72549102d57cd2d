use abx_client::capture::FrameReader;
use abx_client::record::CaptureFrame;
use anyhow::{Context, Result};
use clap::Parser;
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(about = "Play back an ABX session capture")]
struct Args {
    /// Input capture file (.bin)
    #[arg(long, short = 'i')]
    input: PathBuf,

    /// Print each record as it is read
    #[arg(long, default_value_t = false)]
    print_records: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let file = File::open(&args.input).with_context(|| format!("open {:?}", args.input))?;
    let rdr = BufReader::new(file);
    let mut frames = FrameReader::new(rdr);
    let mut records = 0usize;
    let mut unrecovered = Vec::new();
    let mut last_seq: Option<i32> = None;
    let mut out_of_order = 0usize;

    while let Some(frame) = frames.next_frame()? {
        match frame {
            CaptureFrame::Header(h) => {
                eprintln!(
                    "Header: v{} server={} max_seq={} records={} created={}ns",
                    h.version, h.server, h.max_sequence, h.record_count, h.created_unix_ns
                );
            }
            CaptureFrame::Record(r) => {
                records += 1;
                if last_seq.is_some_and(|prev| r.sequence_number() <= prev) {
                    out_of_order += 1;
                }
                last_seq = Some(r.sequence_number());
                if args.print_records {
                    println!(
                        "seq={:>6} {:<4} {:<4} qty={:>8} price={:>10}",
                        r.sequence_number(),
                        r.symbol(),
                        r.side(),
                        r.quantity(),
                        r.price()
                    );
                }
            }
            CaptureFrame::Unrecovered { sequence, reason } => {
                println!("MISSING seq={} ({})", sequence, reason);
                unrecovered.push(sequence);
            }
        }
    }
    eprintln!(
        "Read {} frames: {} records, {} unrecovered {:?}, {} out of order.",
        frames.frames_read(),
        records,
        unrecovered.len(),
        unrecovered,
        out_of_order
    );
    Ok(())
}
