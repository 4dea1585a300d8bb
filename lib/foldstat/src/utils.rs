use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::warn;

/// Worker count when nothing is configured: one per logical CPU.
pub fn default_workers() -> usize {
    num_cpus::get().max(1)
}

/// Parses a strictly positive integer setting; anything else is reported and
/// ignored so the caller falls back to its default.
pub fn parse_positive(name: &str, raw: &str) -> Option<usize> {
    match raw.trim().parse::<usize>() {
        Ok(n) if n > 0 => Some(n),
        _ => {
            warn!(setting = name, value = raw, "ignoring invalid value, expected a positive integer");
            None
        }
    }
}

pub fn elapsed_ms(since: Instant) -> u64 {
    since.elapsed().as_millis() as u64
}

/// Run-wide stop signal shared by the chunker and every worker. Once raised
/// it stays raised.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self { Self::default() }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}
