use crate::statistic::Statistic;
use crate::table::StatTable;
use anyhow::{Context, Result};
use rayon::prelude::*;
use std::io::{BufWriter, Write};

/// Round to one decimal, half away from zero, and fold `-0.0` into `0.0`.
///
/// Rounding happens on the binary value, so a mean like `1.15` (stored as
/// `1.149999...`) rounds down.
pub fn round_tenth(x: f64) -> f64 {
    (x * 10.0).round() / 10.0 + 0.0
}

pub fn format_line(key: &str, stat: &Statistic) -> String {
    format!(
        "{}={:.1}/{:.1}/{:.1}",
        key,
        round_tenth(stat.min),
        round_tenth(stat.mean),
        round_tenth(stat.max)
    )
}

/// Entries ordered by key bytes. Keys are unique in a table so the order is
/// strict.
pub fn sorted_entries(table: &StatTable) -> Vec<(&str, &Statistic)> {
    let mut entries: Vec<(&str, &Statistic)> = table.iter().map(|(k, s)| (k.as_str(), s)).collect();
    entries.par_sort_unstable_by(|a, b| a.0.as_bytes().cmp(b.0.as_bytes()));
    entries
}

pub fn render(table: &StatTable) -> Vec<String> {
    sorted_entries(table).into_iter().map(|(k, s)| format_line(k, s)).collect()
}

/// Write one line per key; returns the number of lines written.
pub fn write_report<W: Write>(table: &StatTable, out: W) -> Result<usize> {
    let mut w = BufWriter::with_capacity(1 << 16, out);
    let entries = sorted_entries(table);
    for (key, stat) in &entries {
        writeln!(w, "{}", format_line(key, stat)).context("write report line")?;
    }
    w.flush().context("flush report")?;
    Ok(entries.len())
}
