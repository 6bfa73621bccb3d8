use super::evaluation::Evaluation;
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

/// Bit pattern of a non-negative loading; orders the same way as the value itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
struct LoadingKey(u64);

impl LoadingKey {
    fn new(loading: f64) -> Self {
        // -0.0 and 0.0 must share a slot.
        Self((loading + 0.0).to_bits())
    }
}

/// Append-only store of evaluations keyed by loading.
///
/// Once a loading has been evaluated its entry is never replaced.
#[derive(Debug, Default, Clone)]
pub struct EvaluationCache {
    data: BTreeMap<LoadingKey, Evaluation>,
}

impl EvaluationCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, loading: f64) -> Option<&Evaluation> {
        self.data.get(&LoadingKey::new(loading))
    }

    pub fn contains(&self, loading: f64) -> bool {
        self.data.contains_key(&LoadingKey::new(loading))
    }

    /// Returns the cached evaluation for `loading`, computing and storing it on a miss.
    pub fn get_or_try_insert_with<E>(
        &mut self,
        loading: f64,
        compute: impl FnOnce() -> Result<Evaluation, E>,
    ) -> Result<&Evaluation, E> {
        match self.data.entry(LoadingKey::new(loading)) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => Ok(entry.insert(compute()?)),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Evaluations in ascending loading order.
    pub fn iter(&self) -> impl Iterator<Item = &Evaluation> {
        self.data.values()
    }

    pub fn best(&self) -> Option<&Evaluation> {
        self.iter()
            .max_by(|a, b| a.stability.score.total_cmp(&b.stability.score))
    }
}
