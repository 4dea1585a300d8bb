use crate::api::Aggregate;
use crate::statistic::Statistic;
use std::collections::hash_map::{Entry, IntoIter, Iter};
use std::collections::HashMap;

/// Key -> accumulator mapping. One per worker while folding, one owned by the
/// merger while reducing.
#[derive(Clone, Debug)]
pub struct KeyTable<A: Aggregate> {
    entries: HashMap<String, A>,
}

pub type StatTable = KeyTable<Statistic>;

impl<A: Aggregate> Default for KeyTable<A> {
    fn default() -> Self { Self { entries: HashMap::new() } }
}

impl<A: Aggregate> KeyTable<A> {
    pub fn new() -> Self { Self::default() }

    /// Fold one observation for `key`. Only allocates the key on first sight.
    pub fn observe(&mut self, key: &str, value: A::Value) {
        match self.entries.get_mut(key) {
            Some(acc) => acc.observe(value),
            None => {
                self.entries.insert(key.to_owned(), A::from_value(value));
            }
        }
    }

    /// Combine one accumulator into the entry for `key`, inserting it verbatim
    /// when the key is new.
    pub fn combine_entry(&mut self, key: String, acc: A) {
        match self.entries.entry(key) {
            Entry::Occupied(mut e) => e.get_mut().combine(&acc),
            Entry::Vacant(e) => {
                e.insert(acc);
            }
        }
    }

    /// Drain `other` into `self`.
    pub fn absorb(&mut self, other: KeyTable<A>) {
        // keep the bigger map as the accumulator to cut rehashing
        if other.entries.len() > self.entries.len() {
            let small = std::mem::replace(&mut self.entries, other.entries);
            for (k, acc) in small {
                self.combine_entry(k, acc);
            }
        } else {
            for (k, acc) in other.entries {
                self.combine_entry(k, acc);
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&A> { self.entries.get(key) }

    pub fn len(&self) -> usize { self.entries.len() }

    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    pub fn iter(&self) -> Iter<'_, String, A> { self.entries.iter() }

    /// Total observations across all keys.
    pub fn observations(&self) -> u64 {
        self.entries.values().map(|a| a.count()).sum()
    }
}

impl<A: Aggregate> IntoIterator for KeyTable<A> {
    type Item = (String, A);
    type IntoIter = IntoIter<String, A>;

    fn into_iter(self) -> Self::IntoIter { self.entries.into_iter() }
}

impl<'a, A: Aggregate> IntoIterator for &'a KeyTable<A> {
    type Item = (&'a String, &'a A);
    type IntoIter = Iter<'a, String, A>;

    fn into_iter(self) -> Self::IntoIter { self.entries.iter() }
}
