use crate::config::MalformedPolicy;
use crate::record::{lines, parse_record};
use crate::stats::WorkerStats;
use crate::table::StatTable;
use crate::utils::{elapsed_ms, CancelFlag};
use anyhow::Result;
use crossbeam_channel::Receiver;
use std::time::Instant;
use tracing::{debug, warn};

// Per worker; past this only the counter moves.
const MALFORMED_WARN_LIMIT: u64 = 5;

/// A worker's private table plus its counters, handed to the merger once the
/// chunk queue is drained.
#[derive(Debug)]
pub struct WorkerReport {
    pub table: StatTable,
    pub stats: WorkerStats,
}

/// Parse every line of `chunk` and fold it into `table`.
pub fn fold_chunk(table: &mut StatTable, chunk: &[u8], policy: MalformedPolicy, stats: &mut WorkerStats) -> Result<()> {
    for (idx, line) in lines(chunk).enumerate() {
        if line.is_empty() {
            continue;
        }
        match parse_record(line) {
            Ok(rec) => {
                table.observe(rec.key, rec.value);
                stats.records += 1;
            }
            Err(err) => match policy {
                MalformedPolicy::Skip => {
                    stats.malformed += 1;
                    if stats.malformed <= MALFORMED_WARN_LIMIT {
                        warn!(
                            worker = stats.worker_id, chunk_line = idx + 1, error = %err,
                            text = %String::from_utf8_lossy(line),
                            "skipping malformed record"
                        );
                    }
                }
                MalformedPolicy::Abort => {
                    let text = String::from_utf8_lossy(line).into_owned();
                    return Err(anyhow::Error::new(err)
                        .context(format!("malformed record {:?} at line {} of chunk", text, idx + 1)));
                }
            },
        }
    }
    stats.chunks += 1;
    stats.bytes += chunk.len() as u64;
    Ok(())
}

/// Worker loop: pull chunks until the queue is closed and empty, then hand off.
///
/// A fold error raises `cancel` so the chunker and the other workers stop;
/// a worker that finds `cancel` raised stops pulling and returns what it has,
/// which the merger discards in favour of the error.
pub fn run_worker(
    worker_id: usize,
    chunks: Receiver<Vec<u8>>,
    policy: MalformedPolicy,
    cancel: &CancelFlag,
) -> Result<WorkerReport> {
    let start = Instant::now();
    let mut table = StatTable::new();
    let mut stats = WorkerStats { worker_id, ..Default::default() };
    for chunk in chunks.iter() {
        if cancel.is_cancelled() {
            debug!(worker = worker_id, chunks = stats.chunks, "run cancelled, leaving queue");
            break;
        }
        if let Err(err) = fold_chunk(&mut table, &chunk, policy, &mut stats) {
            cancel.cancel();
            return Err(err.context(format!("worker {}", worker_id)));
        }
    }
    stats.keys = table.len();
    stats.wall_ms = elapsed_ms(start);
    debug!(
        worker = worker_id, chunks = stats.chunks, records = stats.records,
        malformed = stats.malformed, keys = stats.keys, wall_ms = stats.wall_ms,
        "worker drained queue"
    );
    if stats.malformed > MALFORMED_WARN_LIMIT {
        warn!(worker = worker_id, malformed = stats.malformed, "malformed records skipped");
    }
    Ok(WorkerReport { table, stats })
}
