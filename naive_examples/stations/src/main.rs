use anyhow::{Context, Result};
use clap::Parser;
use foldstat::{run_single_pass, write_report, MalformedPolicy};
use std::fs::File;
use std::io;
use std::time::Instant;
use tracing::info;

/// Single-threaded baseline: read everything, fold once, print.
#[derive(Parser, Debug)]
struct Args {
    /// Input file, or `-` for stdin
    #[arg(default_value = "-")]
    input: String,
    #[arg(long, default_value = "skip")]
    on_malformed: MalformedPolicy,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(io::stderr)
        .init();
    let start = Instant::now();
    let args = Args::parse();

    let outcome = if args.input == "-" {
        run_single_pass(io::stdin().lock(), args.on_malformed)?
    } else {
        let file = File::open(&args.input).with_context(|| format!("open {}", args.input))?;
        run_single_pass(file, args.on_malformed)?
    };

    write_report(&outcome.table, io::stdout().lock())?;
    info!(took_ms = start.elapsed().as_millis() as u64, "took {:?}", start.elapsed());
    Ok(())
}
