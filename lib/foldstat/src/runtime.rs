use crate::chunker::Chunker;
use crate::config::{MalformedPolicy, PipelineConfig};
use crate::merge::{merge_partials, MergeOutcome};
use crate::stats::{RunStats, WorkerStats};
use crate::table::StatTable;
use crate::utils::{elapsed_ms, CancelFlag};
use crate::worker::{fold_chunk, run_worker};
use anyhow::{anyhow, Context, Result};
use crossbeam_channel as channel;
use std::io::Read;
use std::thread;
use std::time::Instant;
use tracing::{debug, info};

/// Final table of a completed run plus its counters.
#[derive(Debug)]
pub struct RunOutcome {
    pub table: StatTable,
    pub stats: RunStats,
}

/// Chunker thread -> bounded chunk queue -> worker pool -> fan-in merge.
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self { Self { config: config.normalized() } }

    /// Run the whole pipeline over `source`. Either every byte is aggregated
    /// or an error is returned; there are no partial results.
    pub fn run<R: Read + Send>(&self, source: R) -> Result<RunOutcome> {
        let cfg = &self.config;
        let start = Instant::now();
        info!(
            workers = cfg.workers, block_bytes = cfg.block_bytes, queue_cap = cfg.queue_capacity(),
            on_malformed = %cfg.malformed,
            "pipeline starting"
        );

        let (chunk_tx, chunk_rx) = channel::bounded::<Vec<u8>>(cfg.queue_capacity());
        // one slot per worker so no handoff waits on the merger
        let (result_tx, result_rx) = channel::bounded(cfg.workers);

        let cancel = CancelFlag::new();
        let (merged, produced) = thread::scope(|s| {
            let producer = {
                let cancel = cancel.clone();
                s.spawn(move || produce_chunks(source, cfg.block_bytes, chunk_tx, &cancel))
            };

            let mut workers = Vec::with_capacity(cfg.workers);
            for worker_id in 0..cfg.workers {
                let rx = chunk_rx.clone();
                let tx = result_tx.clone();
                let cancel = cancel.clone();
                let policy = cfg.malformed;
                workers.push(s.spawn(move || {
                    let report = run_worker(worker_id, rx, policy, &cancel);
                    // merger only stops receiving once every sender is gone
                    let _ = tx.send(report);
                }));
            }
            // the pool holds the only remaining ends
            drop(chunk_rx);
            drop(result_tx);

            let merged = merge_partials(result_rx);

            let panicked = any_panicked(workers);
            let produced = producer.join().map_err(|_| anyhow!("chunker thread panicked")).and_then(|r| r);
            if panicked {
                return (Err(anyhow!("worker thread panicked")), produced);
            }
            (merged, produced)
        });

        // a read failure outranks whatever the workers made of a truncated stream
        let produced = produced?;
        let MergeOutcome { table, workers, stats: merge_stats } = merged?;

        let mut stats = RunStats::new();
        stats.record_workers(&workers);
        stats.record_merge(&merge_stats);
        stats.wall_ms = elapsed_ms(start);
        debug_assert_eq!(stats.chunks, produced.chunks);
        debug_assert_eq!(table.observations(), stats.records);
        info!(
            workers = stats.workers, partials = merge_stats.partials, chunks = stats.chunks, bytes = produced.bytes,
            records = stats.records, malformed = stats.malformed, keys = stats.keys,
            min_worker_ms = stats.min_worker_ms, max_worker_ms = stats.max_worker_ms,
            merge_ms = stats.merge_ms, wall_ms = stats.wall_ms,
            "pipeline complete"
        );
        Ok(RunOutcome { table, stats })
    }
}

struct Produced {
    chunks: u64,
    bytes: u64,
}

/// Chunker loop. Blocks on the bounded queue when workers fall behind; stops
/// early without error if every worker has gone away or the run is cancelled.
fn produce_chunks<R: Read>(
    source: R,
    block_bytes: usize,
    tx: channel::Sender<Vec<u8>>,
    cancel: &CancelFlag,
) -> Result<Produced> {
    let mut chunker = Chunker::new(source, block_bytes);
    while !cancel.is_cancelled() {
        let Some(chunk) = chunker.next() else { break };
        if tx.send(chunk?).is_err() {
            debug!("chunk queue closed, no workers left");
            break;
        }
    }
    if cancel.is_cancelled() {
        debug!(chunks = chunker.chunks_emitted(), bytes = chunker.bytes_read(), "run cancelled, source left unread");
    }
    Ok(Produced { chunks: chunker.chunks_emitted(), bytes: chunker.bytes_read() })
}

/// Joins every handle; true if any of the threads panicked.
fn any_panicked<T>(handles: Vec<thread::ScopedJoinHandle<'_, T>>) -> bool {
    handles.into_iter().fold(false, |panicked, h| h.join().is_err() | panicked)
}

/// Reads the whole source and folds it on the calling thread. Reference
/// result for the parallel pipeline.
pub fn run_single_pass<R: Read>(mut source: R, policy: MalformedPolicy) -> Result<RunOutcome> {
    let start = Instant::now();
    let mut input = Vec::new();
    source.read_to_end(&mut input).context("read source")?;

    let mut table = StatTable::new();
    let mut worker = WorkerStats::default();
    if !input.is_empty() {
        fold_chunk(&mut table, &input, policy, &mut worker)?;
    }
    worker.keys = table.len();
    worker.wall_ms = elapsed_ms(start);

    let mut stats = RunStats::new();
    stats.record_workers(std::slice::from_ref(&worker));
    stats.keys = table.len();
    stats.wall_ms = worker.wall_ms;
    info!(records = stats.records, malformed = stats.malformed, keys = stats.keys, wall_ms = stats.wall_ms, "single pass complete");
    Ok(RunOutcome { table, stats })
}
