//! End-to-end runs of the pipeline over in-memory sources.
//!
//! These check the observable contract: sorted `key=min/mean/max` lines, no
//! lost tail record, clean empty input, and identical results whatever the
//! worker count or block size.

use foldstat::{render, run_single_pass, MalformedPolicy, Pipeline, PipelineConfig};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::io::Cursor;

/// Worker counts each scenario is repeated with
const POOL_SIZES: [usize; 3] = [1, 4, 16];

fn run(input: &[u8], workers: usize, block_bytes: usize) -> Vec<String> {
    let config = PipelineConfig::new().with_workers(workers).with_block_bytes(block_bytes);
    let outcome = Pipeline::new(config).run(Cursor::new(input.to_vec())).unwrap();
    render(&outcome.table)
}

fn tenths(t: i64) -> String {
    let sign = if t < 0 { "-" } else { "" };
    format!("{}{}.{}", sign, t.abs() / 10, t.abs() % 10)
}

#[test]
fn two_keys_interleaved() {
    for workers in POOL_SIZES {
        assert_eq!(run(b"a;1.0\nb;2.0\na;3.0\n", workers, 1024), vec!["a=1.0/2.0/3.0", "b=2.0/2.0/2.0"]);
    }
}

#[test]
fn single_record() {
    assert_eq!(run(b"x;5.5\n", 4, 1024), vec!["x=5.5/5.5/5.5"]);
}

#[test]
fn empty_input_yields_no_lines() {
    for workers in POOL_SIZES {
        assert!(run(b"", workers, 1024).is_empty());
    }
}

#[test]
fn final_record_without_newline_is_counted() {
    for block in [1, 2, 5, 11, 4096] {
        assert_eq!(run(b"a;1.0\na;2.0", 4, block), vec!["a=1.0/1.5/2.0"], "block {}", block);
    }
}

#[test]
fn only_blank_lines() {
    assert!(run(b"\n\n\r\n", 2, 2).is_empty());
}

#[test]
fn identical_output_across_pool_sizes() {
    // Values come in pairs c+d / c-d around a per-key centre c ending in .3,
    // so every true mean sits far from a rounding boundary.
    let mut rng = StdRng::seed_from_u64(1_000_000);
    let mut lines: Vec<String> = Vec::with_capacity(1_000_000);
    for key in 0..10i64 {
        let centre = key * 10 + 3 - 50;
        for _ in 0..50_000 {
            let d: i64 = rng.gen_range(0..=500);
            lines.push(format!("station{};{}\n", key, tenths(centre + d)));
            lines.push(format!("station{};{}\n", key, tenths(centre - d)));
        }
    }
    lines.shuffle(&mut rng);
    let input = lines.concat().into_bytes();

    let expected: Vec<String> = {
        let single = run_single_pass(Cursor::new(input.clone()), MalformedPolicy::Skip).unwrap();
        assert_eq!(single.stats.records, 1_000_000);
        render(&single.table)
    };
    assert_eq!(expected.len(), 10);
    for (key, line) in expected.iter().enumerate() {
        let mean = tenths(key as i64 * 10 + 3 - 50);
        assert!(line.contains(&format!("/{}/", mean)), "{} should have mean {}", line, mean);
    }

    for workers in POOL_SIZES {
        assert_eq!(run(&input, workers, 256 * 1024), expected, "workers {}", workers);
    }
}

#[test]
fn per_key_statistics_match_direct_computation() {
    let mut rng = StdRng::seed_from_u64(42);
    let keys = ["Abha", "Bulawayo", "Cracow", "Dushanbe", "Edmonton", "Ä-key"];
    let mut records: Vec<(&str, i64)> = Vec::new();
    let mut input = String::new();
    for _ in 0..30_000 {
        let key = keys[rng.gen_range(0..keys.len())];
        let t: i64 = rng.gen_range(-999..=999);
        records.push((key, t));
        input.push_str(&format!("{};{}\n", key, tenths(t)));
    }

    let config = PipelineConfig::new().with_workers(8).with_block_bytes(4096);
    let table = Pipeline::new(config).run(Cursor::new(input.into_bytes())).unwrap().table;

    for key in keys {
        let values: Vec<i64> = records.iter().filter(|(k, _)| *k == key).map(|(_, t)| *t).collect();
        let stat = table.get(key).unwrap();
        assert_eq!(stat.count, values.len() as u64);
        assert_eq!(stat.min, *values.iter().min().unwrap() as f64 / 10.0);
        assert_eq!(stat.max, *values.iter().max().unwrap() as f64 / 10.0);
        let exact = values.iter().sum::<i64>() as f64 / 10.0 / values.len() as f64;
        assert!((stat.mean - exact).abs() <= 1e-9 * exact.abs().max(1.0), "{}: {} vs {}", key, stat.mean, exact);
        assert!(stat.min <= stat.mean && stat.mean <= stat.max);
    }
}

#[test]
fn output_keys_strictly_ascending() {
    let mut rng = StdRng::seed_from_u64(9);
    let mut input = String::new();
    for _ in 0..5_000 {
        input.push_str(&format!("k{:x};1.0\n", rng.gen_range(0..400u32)));
    }
    let lines = run(input.as_bytes(), 4, 512);
    let keys: Vec<&str> = lines.iter().map(|l| l.split('=').next().unwrap()).collect();
    assert!(keys.windows(2).all(|w| w[0].as_bytes() < w[1].as_bytes()));
}

#[test]
fn malformed_lines_are_skipped_and_counted() {
    let input = b"a;1.0\nnot a record\na;3.0\nb;\n;4.0\nb;2.0\n";
    let config = PipelineConfig::new().with_workers(3).with_block_bytes(7);
    let outcome = Pipeline::new(config).run(Cursor::new(input.to_vec())).unwrap();
    assert_eq!(outcome.stats.malformed, 3);
    assert_eq!(outcome.stats.records, 3);
    assert_eq!(render(&outcome.table), vec!["a=1.0/2.0/3.0", "b=2.0/2.0/2.0"]);
}

#[test]
fn malformed_lines_abort_when_asked() {
    let input = b"a;1.0\nnot a record\na;3.0\n";
    let config = PipelineConfig::new()
        .with_workers(2)
        .with_block_bytes(7)
        .with_malformed(MalformedPolicy::Abort);
    let err = Pipeline::new(config).run(Cursor::new(input.to_vec())).unwrap_err();
    assert!(err.downcast_ref::<foldstat::MalformedRecord>().is_some(), "{:#}", err);
}
