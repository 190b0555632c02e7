use std::collections::HashMap;
use std::hash::Hash;

/// Accumulates a value per key and remembers first-seen order, which breaks
/// ties when ranking.
#[derive(Clone, Debug)]
pub(crate) struct Tally<K> {
    entries: HashMap<K, (i64, usize)>,
}

impl<K: Eq + Hash + Clone> Tally<K> {
    pub fn new() -> Self {
        Self { entries: HashMap::new() }
    }

    pub fn add(&mut self, key: K, amount: i64) {
        let next = self.entries.len();
        self.entries.entry(key).or_insert((0, next)).0 += amount;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// The `n` largest entries, ties going to the earliest inserted key.
    pub fn top(&self, n: usize) -> Vec<(K, i64)> {
        let mut all: Vec<(&K, &(i64, usize))> = self.entries.iter().collect();
        all.sort_by(|a, b| b.1 .0.cmp(&a.1 .0).then(a.1 .1.cmp(&b.1 .1)));
        all.into_iter().take(n).map(|(k, (v, _))| (k.clone(), *v)).collect()
    }
}

impl<K: Eq + Hash + Clone> Default for Tally<K> {
    fn default() -> Self {
        Self::new()
    }
}
