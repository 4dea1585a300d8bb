// ========== Core fold/combine trait ==========

/// A per-key accumulator that workers fold observations into and the merger
/// combines across workers.
///
/// There is no empty state: an accumulator only comes into existence from a
/// first observation, so a key that was never seen can not be combined as if
/// it were a zero-valued observation.
pub trait Aggregate: Send + Clone + 'static {
    type Value: Copy + Send + 'static;

    /// Accumulator holding exactly one observation.
    fn from_value(value: Self::Value) -> Self;

    /// Fold one more observation in.
    fn observe(&mut self, value: Self::Value);

    /// Associative, commutative merge of another accumulator over a disjoint
    /// set of observations.
    fn combine(&mut self, other: &Self);

    /// Number of observations folded in so far.
    fn count(&self) -> u64;
}
