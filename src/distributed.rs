//! Multi-deme search with ring exchange
//!
//! The coordinator runs `num_comps` independent GA demes and, every
//! `gen_per_exchange` generations, passes each deme's best (or most
//! diverse) variants to the next deme in the ring. Demes share nothing but
//! the immutable base program and these messages; within a deme the GA is
//! strictly sequential, so the whole coordinator is deterministic for a
//! fixed seed.
//!
//! Messages carry variants as edit histories in the wire format, joined by
//! `.`, edits newest first. The receiver rebuilds each variant by cloning
//! the original and replaying the edits in reverse.

use std::path::Path;
use std::time::Instant;

use rustc_hash::FxHashSet;
use tracing::{debug, warn};

use crate::edit;
use crate::error::{RepairError, Result};
use crate::fitness::Fitness;
use crate::rep::Variant;
use crate::search::ga::GeneticSearch;
use crate::search::{RepairOutcome, SearchStats};

/// On-disk population format version
const POP_FORMAT_VERSION: u32 = 1;
const POP_HEADER: &str = "mendel-pop";

/// One deme: a GA engine plus its current population
struct Deme<R> {
    engine: GeneticSearch,
    population: Vec<R>,
}

/// Coordinator for the multi-deme search
pub struct DistributedSearch<R: Variant> {
    original: R,
    demes: Vec<Deme<R>>,
}

impl<R: Variant> DistributedSearch<R> {
    /// Builds `num_comps` demes seeded from the session configuration.
    /// Each deme gets its own PRNG stream and an initial population of
    /// mutated copies of the original.
    pub fn new(original: R) -> Result<Self> {
        let ctx = original.context().clone();
        let num_comps = ctx.config().distributed.num_comps.max(1);
        let mut demes = Vec::with_capacity(num_comps);
        for comp_id in 1..=num_comps {
            let mut engine = GeneticSearch::new(&ctx, comp_id);
            let population = engine.initial_population(&original, Vec::new())?;
            demes.push(Deme { engine, population });
        }
        Ok(Self { original, demes })
    }

    /// Runs the full search: rounds of `gen_per_exchange` generations per
    /// deme with an exchange barrier in between, until the configured
    /// generation budget is spent or a deme finds a solution.
    pub fn run<F: Fitness<R>>(&mut self, fitness: &mut F) -> Result<RepairOutcome<R>> {
        let started = Instant::now();
        let ctx = self.original.context().clone();
        let cfg = ctx.config();
        let total_generations = cfg.ga.generations;
        let per_exchange = cfg.distributed.gen_per_exchange.max(1);

        let mut stats = SearchStats::default();
        let mut done = 0;
        while done < total_generations {
            let batch = per_exchange.min(total_generations - done);

            for deme in &mut self.demes {
                let population = std::mem::take(&mut deme.population);
                let round = deme.engine.run_generations(population, batch, fitness);
                stats.variants_evaluated += round.evaluated;
                deme.population = round.population;
                if let Some(variant) = round.solution {
                    stats.generations = done + round.generations;
                    stats.search_time = started.elapsed();
                    return Ok(RepairOutcome::Repaired { variant, stats });
                }
            }
            done += batch;
            stats.generations = done;

            if done < total_generations {
                self.exchange(fitness, &mut stats);
            }
        }

        let mut best: Option<(R, f64)> = None;
        for deme in &mut self.demes {
            for v in &mut deme.population {
                let score = fitness.evaluate(v);
                stats.variants_evaluated += 1;
                if best.as_ref().map_or(true, |(_, b)| score > *b) {
                    best = Some((v.clone(), score));
                }
            }
        }
        stats.search_time = started.elapsed();
        Ok(RepairOutcome::Exhausted { best, stats })
    }

    /// The exchange barrier: every deme selects its outgoing variants and
    /// its retained incumbents, then each message travels one step around
    /// the ring.
    fn exchange<F: Fitness<R>>(&mut self, fitness: &mut F, stats: &mut SearchStats) {
        let cfg = self.original.context().config().clone();
        let k = cfg.distributed.variants_exchanged;
        let pop_size = cfg.ga.pop_size;
        let diversity = cfg.distributed.diversity_selection;
        let target = fitness.target();

        let mut messages = Vec::with_capacity(self.demes.len());
        for deme in &mut self.demes {
            let mut scored: Vec<(R, f64)> = std::mem::take(&mut deme.population)
                .into_iter()
                .map(|mut v| {
                    let score = fitness.evaluate(&mut v);
                    stats.variants_evaluated += 1;
                    (v, score)
                })
                .collect();
            // Fitness descending, stable for ties.
            scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

            let outgoing: Vec<R> = if k >= pop_size {
                scored.iter().map(|(v, _)| v.clone()).collect()
            } else if !diversity {
                scored.iter().take(k).map(|(v, _)| v.clone()).collect()
            } else {
                let pool: &[(R, f64)] = if pop_size / 2 < k {
                    &scored
                } else {
                    &scored[..(2 * k).min(scored.len())]
                };
                diversity_select(pool, k, &self.original, target)
            };

            // Incumbents minus the worst k (nothing retained when the
            // whole population travels).
            let retain = pop_size.saturating_sub(k);
            scored.truncate(retain);
            deme.population = scored.into_iter().map(|(v, _)| v).collect();

            messages.push(encode_message(&outgoing));
        }

        // Ring delivery: deme i's message lands at deme i + 1.
        let n = self.demes.len();
        for (i, payload) in messages.into_iter().enumerate() {
            let receiver = (i + 1) % n;
            debug!(from = i + 1, to = receiver + 1, "exchanging variants");
            let incoming = decode_message(&self.original, &payload);
            self.demes[receiver].population.extend(incoming);
        }
    }
}

/// Greedy diversity selection: repeatedly picks the variant whose history
/// tokens cover the most still-uncovered tokens of the pool's union,
/// padding with copies of the original (at target fitness) once nothing
/// new is covered.
fn diversity_select<R: Variant>(pool: &[(R, f64)], k: usize, original: &R, target: f64) -> Vec<R> {
    let token_sets: Vec<FxHashSet<String>> = pool
        .iter()
        .map(|(v, _)| v.history().iter().map(|e| e.describe()).collect())
        .collect();
    let mut uncovered: FxHashSet<String> = token_sets.iter().flatten().cloned().collect();

    let mut chosen: Vec<R> = Vec::with_capacity(k);
    let mut available: Vec<usize> = (0..pool.len()).collect();

    while chosen.len() < k && !available.is_empty() {
        let (slot, best_idx, covered) = available
            .iter()
            .enumerate()
            .map(|(slot, &idx)| {
                let covered = token_sets[idx].intersection(&uncovered).count();
                (slot, idx, covered)
            })
            .max_by(|a, b| a.2.cmp(&b.2).then(b.1.cmp(&a.1)))
            .unwrap();
        if covered == 0 {
            break;
        }
        for tok in &token_sets[best_idx] {
            uncovered.remove(tok);
        }
        chosen.push(pool[best_idx].0.clone());
        available.remove(slot);
    }

    while chosen.len() < k {
        let mut pad = original.clone();
        pad.set_cached_fitness(target);
        chosen.push(pad);
    }
    chosen
}

/// Encodes a message: variants joined by `.`, each an edit history in the
/// wire format, newest edit first.
pub fn encode_message<R: Variant>(variants: &[R]) -> String {
    variants
        .iter()
        .map(|v| edit::encode_history(v.history()))
        .collect::<Vec<_>>()
        .join(".")
}

/// Decodes a message against the original: each history is replayed in
/// the reverse of message order onto a fresh clone. Unknown records were
/// already dropped by the history decoder.
pub fn decode_message<R: Variant>(original: &R, payload: &str) -> Vec<R> {
    if payload.is_empty() {
        return Vec::new();
    }
    payload
        .split('.')
        .map(|hist| {
            let mut variant = original.clone();
            let mut edits = edit::decode_history(hist);
            edits.reverse();
            for e in edits {
                variant.push_edit(e);
            }
            variant
        })
        .collect()
}

/// Writes a population checkpoint: a version header line, then the
/// message payload.
pub fn write_population<R: Variant>(path: &Path, variants: &[R]) -> Result<()> {
    let body = format!(
        "{} {}\n{}\n",
        POP_HEADER,
        POP_FORMAT_VERSION,
        encode_message(variants)
    );
    std::fs::write(path, body)?;
    Ok(())
}

/// Reads a population checkpoint written by [`write_population`]. A
/// missing or mismatched header is fatal.
pub fn read_population<R: Variant>(path: &Path, original: &R) -> Result<Vec<R>> {
    let text = std::fs::read_to_string(path)?;
    let mut lines = text.lines();
    let header = lines.next().unwrap_or("");
    let expected = format!("{} {}", POP_HEADER, POP_FORMAT_VERSION);
    if header != expected {
        return Err(RepairError::VersionMismatch {
            expected: POP_FORMAT_VERSION,
            found: header.to_string(),
        });
    }
    let payload = lines.next().unwrap_or("");
    if payload.is_empty() {
        warn!(path = %path.display(), "population checkpoint is empty");
        return Ok(Vec::new());
    }
    Ok(decode_message(original, payload))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::context::CoreContext;
    use crate::localization::WeightedPath;
    use crate::rep::patch::PatchRep;
    use crate::store::AtomStore;

    fn original() -> PatchRep {
        let store = AtomStore::load_sources(vec![(
            "t.c".into(),
            "int f() {\n    int a = 0;\n    a = a + 1;\n    a = a + 2;\n    a = a + 3;\n    return a;\n}\n"
                .into(),
        )])
        .unwrap();
        let ctx = CoreContext::shared(store, Config::default());
        let mut v = PatchRep::new(ctx);
        let fix = v.fix_localization().clone();
        v.set_localization(
            WeightedPath::from_pairs([(2, 1.0), (3, 1.0), (4, 1.0)]),
            fix,
        );
        v
    }

    #[test]
    fn message_roundtrip_rebuilds_histories() {
        let base = original();
        let mut a = base.clone();
        a.delete(2);
        a.append(3, 4);
        let mut b = base.clone();
        b.swap(2, 3);

        let payload = encode_message(&[a.clone(), b.clone()]);
        assert_eq!(payload, "a(3,4) d(2).s(2,3)");

        let decoded = decode_message(&base, &payload);
        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded[0].history(), a.history());
        assert_eq!(decoded[1].history(), b.history());
    }

    #[test]
    fn diversity_selection_covers_distinct_histories() {
        let base = original();
        let mut d1 = base.clone();
        d1.delete(2);
        let d2 = d1.clone();
        let mut a1 = base.clone();
        a1.append(3, 4);
        let mut s1 = base.clone();
        s1.swap(2, 3);

        let pool: Vec<(PatchRep, f64)> =
            vec![(d1, 3.0), (d2, 3.0), (a1, 1.0), (s1, 0.5)];
        let chosen = diversity_select(&pool, 3, &base, 4.0);
        assert_eq!(chosen.len(), 3);

        let fingerprints: FxHashSet<String> =
            chosen.iter().map(|v| v.fingerprint()).collect();
        assert_eq!(fingerprints.len(), 3, "all three histories are distinct");
    }

    #[test]
    fn diversity_selection_pads_with_originals() {
        let base = original();
        let mut d1 = base.clone();
        d1.delete(2);
        let d2 = d1.clone();

        // Only one distinct history in the pool, so two pads are needed.
        let pool: Vec<(PatchRep, f64)> = vec![(d1, 1.0), (d2, 1.0)];
        let chosen = diversity_select(&pool, 3, &base, 7.0);
        assert_eq!(chosen.len(), 3);
        let pads: Vec<_> = chosen.iter().filter(|v| v.history().is_empty()).collect();
        assert_eq!(pads.len(), 2);
        assert_eq!(pads[0].cached_fitness(), Some(7.0));
    }

    #[test]
    fn checkpoint_version_mismatch_is_fatal() {
        let dir = std::env::temp_dir();
        let path = dir.join("mendel_pop_version_test.txt");
        std::fs::write(&path, "mendel-pop 999\nd(2)\n").unwrap();
        let err = read_population(&path, &original()).unwrap_err();
        assert!(matches!(err, RepairError::VersionMismatch { .. }));
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn checkpoint_roundtrip() {
        let base = original();
        let mut a = base.clone();
        a.delete(2);

        let dir = std::env::temp_dir();
        let path = dir.join("mendel_pop_roundtrip_test.txt");
        write_population(&path, &[a.clone()]).unwrap();
        let back = read_population(&path, &base).unwrap();
        assert_eq!(back.len(), 1);
        assert_eq!(back[0].history(), a.history());
        std::fs::remove_file(&path).ok();
    }
}
