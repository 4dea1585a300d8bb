use anyhow::{Context, Result};
use clap::Parser;
use foldstat::{write_report, MalformedPolicy, Pipeline, PipelineConfig};
use std::fs::File;
use std::io::{self, Read};
use std::path::PathBuf;
use std::time::Instant;
use tracing::info;

/// Per-key min/mean/max over `key;value` lines, aggregated in parallel.
#[derive(Parser, Debug)]
struct Args {
    /// Input file, or `-` for stdin
    #[arg(default_value = "-")]
    input: String,
    /// Worker threads (default: FOLDSTAT_WORKERS or CPU count)
    #[arg(long)]
    workers: Option<usize>,
    /// Read block size in bytes (default: FOLDSTAT_BLOCK_BYTES or 128 MiB)
    #[arg(long)]
    block_bytes: Option<usize>,
    /// Chunk queue capacity (default: FOLDSTAT_QUEUE_CAP or 1)
    #[arg(long)]
    queue_cap: Option<usize>,
    /// What to do with malformed lines: skip or abort
    #[arg(long)]
    on_malformed: Option<MalformedPolicy>,
    /// Write run statistics as JSON to this path
    #[arg(long)]
    stats_json: Option<PathBuf>,
}

impl Args {
    fn config(&self) -> PipelineConfig {
        let mut cfg = PipelineConfig::from_env();
        if let Some(n) = self.workers { cfg = cfg.with_workers(n); }
        if let Some(n) = self.block_bytes { cfg = cfg.with_block_bytes(n); }
        if let Some(n) = self.queue_cap { cfg = cfg.with_queue_capacity(n); }
        if let Some(p) = self.on_malformed { cfg = cfg.with_malformed(p); }
        cfg
    }
}

fn open_input(input: &str) -> Result<Box<dyn Read + Send>> {
    if input == "-" {
        return Ok(Box::new(io::stdin()));
    }
    let file = File::open(input).with_context(|| format!("open {}", input))?;
    Ok(Box::new(file))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(io::stderr)
        .init();
    let start = Instant::now();
    let args = Args::parse();

    let pipeline = Pipeline::new(args.config());
    let outcome = pipeline.run(open_input(&args.input)?)?;

    let lines = write_report(&outcome.table, io::stdout().lock())?;
    if let Some(path) = &args.stats_json {
        let file = File::create(path).with_context(|| format!("create {}", path.display()))?;
        serde_json::to_writer_pretty(file, &outcome.stats).context("write stats json")?;
    }
    info!(lines, took_ms = start.elapsed().as_millis() as u64, "took {:?}", start.elapsed());
    Ok(())
}
