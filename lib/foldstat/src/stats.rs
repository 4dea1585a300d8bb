use serde::Serialize;

/// Counters one worker accumulates while folding; handed off with its table.
#[derive(Default, Clone, Debug, Serialize)]
pub struct WorkerStats {
    pub worker_id: usize,
    pub chunks: u64,
    pub bytes: u64,
    pub records: u64,
    pub malformed: u64,
    pub keys: usize,
    pub wall_ms: u64,
}

#[derive(Default, Clone, Debug, Serialize)]
pub struct MergeStats {
    pub partials: usize,
    pub keys: usize,
    pub wall_ms: u64,
}

/// Whole-run summary, logged at the end of a run and optionally dumped as JSON.
#[derive(Default, Clone, Debug, Serialize)]
pub struct RunStats {
    pub workers: usize,
    pub chunks: u64,
    pub bytes: u64,
    pub records: u64,
    pub malformed: u64,
    pub keys: usize,
    pub min_worker_ms: u64,
    pub max_worker_ms: u64,
    pub merge_ms: u64,
    pub wall_ms: u64,
}

impl RunStats {
    pub fn new() -> Self { Self::default() }

    pub fn record_workers(&mut self, per_worker: &[WorkerStats]) {
        if per_worker.is_empty() { return; }
        self.workers = per_worker.len();
        self.chunks = per_worker.iter().map(|w| w.chunks).sum();
        self.bytes = per_worker.iter().map(|w| w.bytes).sum();
        self.records = per_worker.iter().map(|w| w.records).sum();
        self.malformed = per_worker.iter().map(|w| w.malformed).sum();
        self.min_worker_ms = per_worker.iter().map(|w| w.wall_ms).min().unwrap_or(0);
        self.max_worker_ms = per_worker.iter().map(|w| w.wall_ms).max().unwrap_or(0);
    }

    pub fn record_merge(&mut self, merge: &MergeStats) {
        self.keys = merge.keys;
        self.merge_ms = merge.wall_ms;
    }
}
