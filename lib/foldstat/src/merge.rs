use crate::api::Aggregate;
use crate::stats::{MergeStats, WorkerStats};
use crate::table::{KeyTable, StatTable};
use crate::utils::elapsed_ms;
use crate::worker::WorkerReport;
use anyhow::Result;
use crossbeam_channel::Receiver;
use rayon::prelude::*;
use std::time::Instant;
use tracing::{debug, error};

#[derive(Debug)]
pub struct MergeOutcome {
    pub table: StatTable,
    pub workers: Vec<WorkerStats>,
    pub stats: MergeStats,
}

/// Fan-in reducer. Every worker holds a sender of `results`; partial tables
/// are folded into one accumulator in arrival order and the call returns once
/// all senders are gone. The accumulator is only ever touched here.
///
/// A worker error is kept (first one wins) while the channel keeps being
/// drained so no worker blocks on its handoff.
pub fn merge_partials(results: Receiver<Result<WorkerReport>>) -> Result<MergeOutcome> {
    let start = Instant::now();
    let mut table = StatTable::new();
    let mut workers = Vec::new();
    let mut failure: Option<anyhow::Error> = None;

    for result in results.iter() {
        match result {
            Ok(report) => {
                if failure.is_some() {
                    debug!(worker = report.stats.worker_id, "discarding partial table after failure");
                    continue;
                }
                debug!(worker = report.stats.worker_id, keys = report.table.len(), "merging partial table");
                workers.push(report.stats);
                table.absorb(report.table);
            }
            Err(e) => {
                if failure.is_none() {
                    error!(error = %format!("{:#}", e), "worker failed");
                    failure = Some(e);
                } else {
                    debug!(error = %format!("{:#}", e), "additional worker failure");
                }
            }
        }
    }
    if let Some(e) = failure {
        return Err(e);
    }

    let stats = MergeStats { partials: workers.len(), keys: table.len(), wall_ms: elapsed_ms(start) };
    Ok(MergeOutcome { table, workers, stats })
}

/// Sequential left fold of tables.
pub fn merge_tables<A, I>(tables: I) -> KeyTable<A>
where
    A: Aggregate,
    I: IntoIterator<Item = KeyTable<A>>,
{
    tables.into_iter().fold(KeyTable::new(), |mut acc, t| {
        acc.absorb(t);
        acc
    })
}

/// Pairwise reduction on the rayon pool. Same result as `merge_tables` up to
/// floating-point rounding.
pub fn tree_merge<A>(tables: Vec<KeyTable<A>>) -> KeyTable<A>
where
    A: Aggregate,
{
    tables.into_par_iter().reduce(KeyTable::new, |mut left, right| {
        left.absorb(right);
        left
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::statistic::Statistic;
    use crossbeam_channel as channel;
    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;
    use rand::{Rng, SeedableRng};

    const KEYS: [&str; 6] = ["alpha", "beta", "gamma", "delta", "eps", "zeta"];

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() <= 1e-9 * a.abs().max(b.abs()).max(1.0)
    }

    fn random_records(rng: &mut StdRng, n: usize) -> Vec<(&'static str, f64)> {
        (0..n)
            .map(|_| (KEYS[rng.gen_range(0..KEYS.len())], rng.gen_range(-999..=999) as f64 / 10.0))
            .collect()
    }

    fn fold_all(records: &[(&str, f64)]) -> StatTable {
        let mut t = StatTable::new();
        for (k, v) in records {
            t.observe(k, *v);
        }
        t
    }

    fn partition(rng: &mut StdRng, records: &[(&'static str, f64)], k: usize) -> Vec<StatTable> {
        let mut groups = vec![Vec::new(); k];
        for r in records {
            groups[rng.gen_range(0..k)].push(*r);
        }
        groups.iter().map(|g| fold_all(g)).collect()
    }

    fn assert_tables_agree(a: &StatTable, b: &StatTable) {
        assert_eq!(a.len(), b.len());
        for (key, sa) in a {
            let sb: &Statistic = b.get(key).unwrap();
            assert_eq!(sa.count, sb.count, "{}", key);
            assert_eq!(sa.min, sb.min, "{}", key);
            assert_eq!(sa.max, sb.max, "{}", key);
            assert!(close(sa.mean, sb.mean), "{}: {} vs {}", key, sa.mean, sb.mean);
        }
    }

    #[test]
    fn any_partition_matches_single_pass() {
        let mut rng = StdRng::seed_from_u64(7);
        let records = random_records(&mut rng, 20_000);
        let whole = fold_all(&records);
        for k in [1, 2, 3, 8, 31] {
            let parts = partition(&mut rng, &records, k);
            assert_tables_agree(&merge_tables(parts), &whole);
        }
    }

    #[test]
    fn merge_order_and_grouping_do_not_matter() {
        let mut rng = StdRng::seed_from_u64(11);
        let records = random_records(&mut rng, 5_000);
        let parts = partition(&mut rng, &records, 12);

        let linear = merge_tables(parts.clone());
        let mut shuffled = parts.clone();
        shuffled.shuffle(&mut rng);
        let reordered = merge_tables(shuffled);
        let tree = tree_merge(parts);

        assert_tables_agree(&linear, &reordered);
        assert_tables_agree(&linear, &tree);
    }

    #[test]
    fn mean_equals_sum_over_count() {
        let mut rng = StdRng::seed_from_u64(3);
        let records = random_records(&mut rng, 10_000);
        let merged = merge_tables(partition(&mut rng, &records, 5));
        for key in KEYS {
            let values: Vec<f64> = records.iter().filter(|(k, _)| *k == key).map(|(_, v)| *v).collect();
            let expected = values.iter().sum::<f64>() / values.len() as f64;
            let got = merged.get(key).unwrap();
            assert_eq!(got.count, values.len() as u64);
            assert!(close(got.mean, expected), "{}: {} vs {}", key, got.mean, expected);
        }
    }

    #[test]
    fn empty_inputs_merge_to_empty_table() {
        assert!(merge_tables(Vec::<StatTable>::new()).is_empty());
        assert!(tree_merge(vec![StatTable::new(), StatTable::new()]).is_empty());
    }

    fn report(worker_id: usize, records: &[(&str, f64)]) -> WorkerReport {
        let table = fold_all(records);
        WorkerReport { stats: WorkerStats { worker_id, keys: table.len(), ..Default::default() }, table }
    }

    #[test]
    fn fan_in_collects_every_worker() {
        let (tx, rx) = channel::bounded(3);
        let senders: Vec<_> = (0..3)
            .map(|id| {
                let tx = tx.clone();
                std::thread::spawn(move || {
                    tx.send(Ok(report(id, &[("k", id as f64), ("only", 1.0)]))).unwrap();
                })
            })
            .collect();
        drop(tx);
        let outcome = merge_partials(rx).unwrap();
        for s in senders {
            s.join().unwrap();
        }
        assert_eq!(outcome.stats.partials, 3);
        assert_eq!(outcome.workers.len(), 3);
        let k = outcome.table.get("k").unwrap();
        assert_eq!((k.count, k.min, k.max, k.mean), (3, 0.0, 2.0, 1.0));
        assert_eq!(outcome.table.get("only").unwrap().count, 3);
    }

    #[test]
    fn worker_failure_is_returned_after_draining() {
        let (tx, rx) = channel::bounded(4);
        tx.send(Ok(report(0, &[("a", 1.0)]))).unwrap();
        tx.send(Err(anyhow::anyhow!("worker 1 exploded"))).unwrap();
        tx.send(Ok(report(2, &[("a", 2.0)]))).unwrap();
        tx.send(Err(anyhow::anyhow!("worker 3 exploded"))).unwrap();
        drop(tx);
        let err = merge_partials(rx).unwrap_err();
        assert_eq!(err.to_string(), "worker 1 exploded");
    }
}
