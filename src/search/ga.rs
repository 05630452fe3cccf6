//! Genetic search over edit scripts
//!
//! The population is a set of variants; selection is by tournament,
//! crossover is one-point over the fault paths, and mutation is the
//! weighted micro-mutation: each fault-path statement fires with
//! probability `μ · weight` and receives one of delete/append/swap (or a
//! subatom substitution when enabled), with donors drawn by roulette.
//!
//! Every stochastic choice draws from one seeded generator per engine, so
//! a fixed seed reproduces the whole run.

use std::time::Instant;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rustc_hash::FxHashSet;
use tracing::{debug, warn};

use crate::ast::{AtomId, Expr};
use crate::config::GaParams;
use crate::context::CoreContext;
use crate::error::{RepairError, Result};
use crate::fitness::Fitness;
use crate::localization::WeightedPath;
use crate::rep::Variant;
use crate::search::{RepairOutcome, SearchStats};

/// One deme's genetic-algorithm engine
pub struct GeneticSearch {
    params: GaParams,
    /// `(num_comps, comp_id)` when search-space splitting is active
    split: Option<(usize, usize)>,
    rng: StdRng,
}

/// Result of running a batch of generations
pub struct GaRound<R> {
    /// Post-mutation population, solution included if one was found
    pub population: Vec<R>,
    /// First variant that reached the target, if any
    pub solution: Option<R>,
    /// Fitness evaluations performed in this round
    pub evaluated: usize,
    /// Generations completed in this round
    pub generations: usize,
}

impl GeneticSearch {
    /// Creates an engine for deme `comp_id` (1-based; use 1 when not
    /// distributed). The PRNG stream is derived from the session seed and
    /// the deme number.
    pub fn new(ctx: &CoreContext, comp_id: usize) -> Self {
        let cfg = ctx.config();
        let split = (cfg.distributed.split_search && cfg.distributed.num_comps > 1)
            .then_some((cfg.distributed.num_comps, comp_id));
        Self {
            params: cfg.ga.clone(),
            split,
            rng: StdRng::seed_from_u64(cfg.seed.wrapping_add(comp_id as u64)),
        }
    }

    /// Runs the full configured search: build the initial population, run
    /// every generation, surface the outcome.
    pub fn run<R: Variant, F: Fitness<R>>(
        &mut self,
        original: &R,
        seed_population: Vec<R>,
        fitness: &mut F,
    ) -> Result<RepairOutcome<R>> {
        let started = Instant::now();
        let population = self.initial_population(original, seed_population)?;
        let generations = self.params.generations;
        let round = self.run_generations(population, generations, fitness);

        let stats = SearchStats {
            variants_evaluated: round.evaluated,
            generations: round.generations,
            search_time: started.elapsed(),
        };

        match round.solution {
            Some(variant) => Ok(RepairOutcome::Repaired { variant, stats }),
            None => {
                let mut best: Option<(R, f64)> = None;
                for v in round.population {
                    let score = v.cached_fitness().unwrap_or(0.0);
                    if best.as_ref().map_or(true, |(_, b)| score > *b) {
                        best = Some((v, score));
                    }
                }
                Ok(RepairOutcome::Exhausted { best, stats })
            }
        }
    }

    /// Builds the initial population: the incoming variants, one copy of
    /// the original, and freshly mutated copies of the original up to the
    /// population size. More than `pop_size - 1` incoming variants is an
    /// error.
    pub fn initial_population<R: Variant>(
        &mut self,
        original: &R,
        seed_population: Vec<R>,
    ) -> Result<Vec<R>> {
        let pop_size = self.params.pop_size;
        if seed_population.len() + 1 > pop_size {
            return Err(RepairError::InvalidArgument(format!(
                "seed population of {} does not fit a population of {}",
                seed_population.len(),
                pop_size
            )));
        }
        let mut population = seed_population;
        population.push(original.clone());
        while population.len() < pop_size {
            let mut fresh = original.clone();
            self.mutate(&mut fresh);
            population.push(fresh);
        }
        Ok(population)
    }

    /// Runs `generations` full evaluate → select → cross → mutate cycles,
    /// then one final fitness evaluation.
    ///
    /// Finding a solution is not an in-loop cancellation point: the
    /// generation that produced it completes before the round returns.
    pub fn run_generations<R: Variant, F: Fitness<R>>(
        &mut self,
        mut population: Vec<R>,
        generations: usize,
        fitness: &mut F,
    ) -> GaRound<R> {
        let target = fitness.target();
        let mut solution: Option<R> = None;
        let mut evaluated = 0;
        let mut completed = 0;

        for gen in 0..generations {
            let mut scored: Vec<(R, f64)> = Vec::with_capacity(population.len());
            for mut v in population {
                let score = fitness.evaluate(&mut v);
                evaluated += 1;
                if score >= target && solution.is_none() {
                    solution = Some(v.clone());
                }
                scored.push((v, score));
            }
            debug!(
                gen,
                best = scored.iter().map(|(_, f)| *f).fold(0.0, f64::max),
                "generation evaluated"
            );

            let parents = self.select_parents(&scored);
            let crossed = self.cross_population(parents);
            population = crossed;
            for v in &mut population {
                self.mutate(v);
            }
            completed += 1;

            if solution.is_some() {
                break;
            }
        }

        // Final evaluation catches a solution built by the last mutation
        // round.
        for v in &mut population {
            let score = fitness.evaluate(v);
            evaluated += 1;
            if score >= target && solution.is_none() {
                solution = Some(v.clone());
            }
        }

        GaRound {
            population,
            solution,
            evaluated,
            generations: completed,
        }
    }

    /// Tournament-selects `pop_size` parents, with replacement.
    fn select_parents<R: Variant>(&mut self, scored: &[(R, f64)]) -> Vec<R> {
        (0..self.params.pop_size)
            .map(|_| scored[self.tournament(scored)].0.clone())
            .collect()
    }

    /// One tournament: draw `tournament_k` individuals uniformly, sort by
    /// fitness descending, walk the list accepting entry `i` with
    /// probability `p·(1−p)^i`; falling off the end restarts the draw.
    fn tournament<R>(&mut self, scored: &[(R, f64)]) -> usize {
        let k = self.params.tournament_k.max(1);
        let p = self.params.tournament_p;
        loop {
            let mut sample: Vec<usize> = (0..k)
                .map(|_| self.rng.gen_range(0..scored.len()))
                .collect();
            sample.sort_by(|&a, &b| {
                scored[b]
                    .1
                    .partial_cmp(&scored[a].1)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then(a.cmp(&b))
            });
            if p >= 1.0 {
                return sample[0];
            }
            for &idx in &sample {
                if self.rng.gen::<f64>() <= p {
                    return idx;
                }
            }
        }
    }

    /// Pairs parents into couples and crosses each with probability
    /// `cross_rate`; an odd last parent passes through untouched.
    fn cross_population<R: Variant>(&mut self, parents: Vec<R>) -> Vec<R> {
        let mut next = Vec::with_capacity(parents.len());
        let mut iter = parents.into_iter();
        while let Some(first) = iter.next() {
            match iter.next() {
                Some(second) => {
                    if self.rng.gen::<f64>() <= self.params.cross_rate {
                        let (c1, c2) = self.one_point_cross(&first, &second);
                        next.push(c1);
                        next.push(c2);
                    } else {
                        next.push(first);
                        next.push(second);
                    }
                }
                None => next.push(first),
            }
        }
        next
    }

    /// One-point crossover over the parents' fault paths. The cut is drawn
    /// from the shared prefix of the two id lists; parents with an empty
    /// path pass through uncrossed.
    fn one_point_cross<R: Variant>(&mut self, p1: &R, p2: &R) -> (R, R) {
        let m1 = p1.fault_localization().ids();
        let m2 = p2.fault_localization().ids();
        let shared = m1.len().min(m2.len());
        if shared == 0 {
            return (p1.clone(), p2.clone());
        }
        let cut = self.rng.gen_range(0..shared);

        let mut c1 = p1.clone();
        c1.crossover_prefix(p2, &m1[..=cut], &m2[..=cut]);
        let mut c2 = p2.clone();
        c2.crossover_prefix(p1, &m2[..=cut], &m1[..=cut]);
        (c1, c2)
    }

    /// Weighted micro-mutation over the variant's fault path.
    pub fn mutate<R: Variant>(&mut self, variant: &mut R) {
        let mut path = variant.fault_localization().clone();
        if let Some((num_comps, comp_id)) = self.split {
            // comp_id is 1-based, so the last deme owns residue class 0.
            path = path
                .iter()
                .filter(|(id, _)| id % num_comps == comp_id % num_comps)
                .collect();
        }

        let mut forced: FxHashSet<AtomId> = FxHashSet::default();
        if self.params.pro_mut > 0 {
            path = path.dedup();
            for _ in 0..self.params.pro_mut {
                if let Some(id) = path.roulette(&mut self.rng) {
                    forced.insert(id);
                }
            }
        }

        for (id, weight) in path.iter() {
            let fired = self.rng.gen::<f64>() <= self.params.mut_rate * weight;
            if fired || forced.contains(&id) {
                self.mutate_at(variant, id);
            }
        }
    }

    /// Applies one mutation at `id`: a subatom substitution when enabled
    /// and available, otherwise a statement-level operator chosen
    /// uniformly, retrying with the operator excluded when it has no legal
    /// donor. Delete always succeeds, so the retry terminates.
    fn mutate_at<R: Variant>(&mut self, variant: &mut R, id: AtomId) {
        let use_subatoms = variant.context().config().use_subatoms;
        if use_subatoms {
            let slots = variant.subatoms_of(id);
            if !slots.is_empty() && self.rng.gen::<f64>() <= self.params.subatom_mut_rate {
                if self.rng.gen::<f64>() <= self.params.subatom_const_rate {
                    let index = self.rng.gen_range(0..slots.len());
                    variant.replace_subatom(id, index, Expr::zero());
                    return;
                }
                let donors: WeightedPath = variant
                    .append_sources(id)
                    .iter()
                    .filter(|(donor, _)| !variant.subatoms_of(*donor).is_empty())
                    .collect();
                if let Some(donor) = donors.roulette(&mut self.rng) {
                    let donor_slots = variant.subatoms_of(donor);
                    let expr = donor_slots[self.rng.gen_range(0..donor_slots.len())].clone();
                    let index = self.rng.gen_range(0..slots.len());
                    variant.replace_subatom(id, index, expr);
                    return;
                }
                // No donor with subatoms; fall back to a statement-level
                // mutation.
            }
        }

        #[derive(Clone, Copy, PartialEq)]
        enum Op {
            Delete,
            Append,
            Swap,
        }
        let mut options = vec![Op::Delete, Op::Append, Op::Swap];
        loop {
            let op = options[self.rng.gen_range(0..options.len())];
            match op {
                Op::Delete => {
                    variant.delete(id);
                    return;
                }
                Op::Append => match variant.append_sources(id).roulette(&mut self.rng) {
                    Some(donor) => {
                        variant.append(id, donor);
                        return;
                    }
                    None => {
                        warn!(id, "append has no legal donor, excluding it");
                        options.retain(|o| *o != Op::Append);
                    }
                },
                Op::Swap => match variant.swap_sources(id).roulette(&mut self.rng) {
                    Some(donor) => {
                        variant.swap(id, donor);
                        return;
                    }
                    None => {
                        warn!(id, "swap has no legal donor, excluding it");
                        options.retain(|o| *o != Op::Swap);
                    }
                },
            }
        }
    }
}
