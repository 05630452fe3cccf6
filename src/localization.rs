//! Weighted localization paths
//!
//! A [`WeightedPath`] is an ordered list of `(sid, weight)` pairs. Fault
//! localization ranks suspect modification sites; fix localization ranks
//! donor sites. The order is part of the contract: roulette draws
//! accumulate weights in list order, so a fixed seed and a fixed path give
//! a reproducible search.

use rand::Rng;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::ast::AtomId;
use crate::store::AtomStore;

/// An ordered, weighted list of statement ids
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WeightedPath {
    entries: Vec<(AtomId, f64)>,
}

impl WeightedPath {
    /// Creates an empty path.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a path from `(sid, weight)` pairs, keeping their order.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (AtomId, f64)>) -> Self {
        Self {
            entries: pairs.into_iter().collect(),
        }
    }

    /// Appends an entry.
    pub fn push(&mut self, sid: AtomId, weight: f64) {
        self.entries.push((sid, weight));
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if the path has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates `(sid, weight)` pairs in path order.
    pub fn iter(&self) -> impl Iterator<Item = (AtomId, f64)> + '_ {
        self.entries.iter().copied()
    }

    /// The ids in path order.
    pub fn ids(&self) -> Vec<AtomId> {
        self.entries.iter().map(|(sid, _)| *sid).collect()
    }

    /// Weight of `sid`, or 0.0 if absent. First occurrence wins.
    pub fn weight_of(&self, sid: AtomId) -> f64 {
        self.entries
            .iter()
            .find(|(s, _)| *s == sid)
            .map(|(_, w)| *w)
            .unwrap_or(0.0)
    }

    /// Returns a copy with duplicate ids removed, first occurrence kept.
    pub fn dedup(&self) -> WeightedPath {
        let mut seen = FxHashSet::default();
        self.entries
            .iter()
            .filter(|(sid, _)| seen.insert(*sid))
            .copied()
            .collect()
    }

    /// Total weight.
    pub fn total_weight(&self) -> f64 {
        self.entries.iter().map(|(_, w)| w).sum()
    }

    /// Roulette draw: picks an id with probability proportional to its
    /// weight, accumulating in path order. Returns `None` when the path is
    /// empty or all weights are zero.
    pub fn roulette(&self, rng: &mut impl Rng) -> Option<AtomId> {
        let total = self.total_weight();
        if self.entries.is_empty() || total <= 0.0 {
            return None;
        }
        let r = rng.gen::<f64>() * total;
        let mut acc = 0.0;
        for (sid, w) in &self.entries {
            acc += w;
            if acc >= r {
                return Some(*sid);
            }
        }
        // Float accumulation can land a hair short of the total.
        self.entries.last().map(|(sid, _)| *sid)
    }

    /// Builds fault localization from coverage: statements that only
    /// negative (failing) runs executed get `neg_weight`; statements both
    /// kinds of run executed get `shared_weight`. Path order follows the
    /// first negative trace that touched each statement.
    pub fn fault_from_coverage(
        neg_traces: &[Vec<AtomId>],
        pos_traces: &[Vec<AtomId>],
        neg_weight: f64,
        shared_weight: f64,
    ) -> WeightedPath {
        let pos_covered: FxHashSet<AtomId> =
            pos_traces.iter().flatten().copied().collect();
        let mut seen = FxHashSet::default();
        let mut path = WeightedPath::new();
        for trace in neg_traces {
            for &sid in trace {
                if sid == 0 || !seen.insert(sid) {
                    continue;
                }
                let w = if pos_covered.contains(&sid) {
                    shared_weight
                } else {
                    neg_weight
                };
                path.push(sid, w);
            }
        }
        path
    }

    /// Builds fix localization from coverage: every statement some run
    /// executed becomes a donor at weight 1.0, canonicalized through the
    /// store's representative map so textually identical donors collapse
    /// onto one entry. Path order follows the first trace that touched
    /// each representative, positive traces first.
    pub fn fix_from_coverage(
        pos_traces: &[Vec<AtomId>],
        neg_traces: &[Vec<AtomId>],
        store: &AtomStore,
    ) -> WeightedPath {
        let mut seen = FxHashSet::default();
        let mut path = WeightedPath::new();
        for trace in pos_traces.iter().chain(neg_traces) {
            for &sid in trace {
                if sid == 0 || sid > store.max_atom() {
                    continue;
                }
                let rep = store.canonical_id(sid);
                if seen.insert(rep) {
                    path.push(rep, 1.0);
                }
            }
        }
        path
    }

    /// Builds fix localization over the whole code bank: one entry of
    /// weight 1.0 per canonical representative, in sid order. Textually
    /// identical donors collapse onto one entry.
    pub fn fix_from_bank(store: &AtomStore) -> WeightedPath {
        let mut seen = FxHashSet::default();
        let mut path = WeightedPath::new();
        for sid in 1..=store.max_atom() {
            let rep = store.canonical_id(sid);
            if seen.insert(rep) {
                path.push(rep, 1.0);
            }
        }
        path
    }

    /// Scales every weight in place.
    pub fn scale(&mut self, factor: f64) {
        for (_, w) in &mut self.entries {
            *w *= factor;
        }
    }

    /// Weight lookup table, first occurrence wins.
    pub fn weight_map(&self) -> FxHashMap<AtomId, f64> {
        let mut map = FxHashMap::default();
        for (sid, w) in &self.entries {
            map.entry(*sid).or_insert(*w);
        }
        map
    }
}

impl FromIterator<(AtomId, f64)> for WeightedPath {
    fn from_iter<T: IntoIterator<Item = (AtomId, f64)>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}
