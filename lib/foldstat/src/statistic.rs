use crate::api::Aggregate;
use serde::Serialize;

/// Running count/min/max/mean for one key.
///
/// The mean is kept as a running average rather than a sum. Both the fold and
/// the combine use delta forms (`m + (v - m) / n`) which are algebraically equal
/// to the weighted averages `(n*m + v) / (n + 1)` and
/// `(na*ma + nb*mb) / (na + nb)`, but never materialise the `n*m` products.
/// Rounding error still grows with the number of updates, so means are only
/// equal to `sum / count` within a relative tolerance. If the difference
/// itself overflows (values near `±f64::MAX` of opposite sign) the update is
/// done as `m*(1-w) + v*w` instead.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Statistic {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
}

impl Statistic {
    pub fn new(value: f64) -> Self {
        Self { count: 1, min: value, max: value, mean: value }
    }

    pub fn fold(&mut self, value: f64) {
        self.count += 1;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
        let n = self.count as f64;
        let delta = value - self.mean;
        self.mean = if delta.is_finite() {
            self.mean + delta / n
        } else {
            self.mean * (1.0 - 1.0 / n) + value / n
        };
        self.clamp_mean();
    }

    pub fn merge(&mut self, other: &Statistic) {
        let count = self.count + other.count;
        let weight = other.count as f64 / count as f64;
        let delta = other.mean - self.mean;
        self.mean = if delta.is_finite() {
            self.mean + delta * weight
        } else {
            self.mean * (1.0 - weight) + other.mean * weight
        };
        self.count = count;
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
        self.clamp_mean();
    }

    // rounding may push the mean an ulp outside the observed range
    fn clamp_mean(&mut self) {
        self.mean = self.mean.clamp(self.min, self.max);
    }
}

impl Aggregate for Statistic {
    type Value = f64;

    fn from_value(value: f64) -> Self { Statistic::new(value) }

    fn observe(&mut self, value: f64) { self.fold(value) }

    fn combine(&mut self, other: &Self) { self.merge(other) }

    fn count(&self) -> u64 { self.count }
}
