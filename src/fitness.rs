//! Fitness evaluation
//!
//! The search engines only know this seam: an evaluator maps a variant to
//! a non-negative score, higher is better, and names the score a solution
//! must reach (the positive-test count). Compile or harness failures show
//! up as the sentinel minimum fitness 0.0, so broken variants stay in the
//! population but are selected against.

use rustc_hash::FxHashMap;

use crate::rep::Variant;

/// Evaluator seam between the search and the external test runner
pub trait Fitness<R: Variant> {
    /// Scores a variant. Must be deterministic for a given edit history.
    fn evaluate(&mut self, variant: &mut R) -> f64;

    /// The solution threshold: the number of positive tests.
    fn target(&self) -> f64;
}

/// One predicate test over the printed source
pub type SourceTest = Box<dyn Fn(&str) -> bool>;

/// Built-in evaluator for tests: pretty-prints the variant and counts the
/// passing predicates. Stands in for the compile-and-run harness the same
/// way a mock backend stands in for a real solver.
pub struct SourceTestFitness {
    tests: Vec<SourceTest>,
}

impl SourceTestFitness {
    /// Creates an evaluator from predicate tests.
    pub fn new(tests: Vec<SourceTest>) -> Self {
        Self { tests }
    }
}

impl<R: Variant> Fitness<R> for SourceTestFitness {
    fn evaluate(&mut self, variant: &mut R) -> f64 {
        if let Some(f) = variant.cached_fitness() {
            return f;
        }
        let source = variant.pretty_print();
        let passed = self.tests.iter().filter(|t| t(&source)).count() as f64;
        variant.set_cached_fitness(passed);
        passed
    }

    fn target(&self) -> f64 {
        self.tests.len() as f64
    }
}

/// Memoizing wrapper keyed on the serialized edit history
///
/// Identical histories compile to identical programs, so their scores are
/// shared across the whole population.
pub struct CachedFitness<F> {
    inner: F,
    cache: FxHashMap<String, f64>,
    hits: usize,
}

impl<F> CachedFitness<F> {
    /// Wraps an evaluator.
    pub fn new(inner: F) -> Self {
        Self {
            inner,
            cache: FxHashMap::default(),
            hits: 0,
        }
    }

    /// Number of evaluations answered from the cache.
    pub fn hits(&self) -> usize {
        self.hits
    }

    /// Number of distinct histories evaluated.
    pub fn entries(&self) -> usize {
        self.cache.len()
    }
}

impl<R: Variant, F: Fitness<R>> Fitness<R> for CachedFitness<F> {
    fn evaluate(&mut self, variant: &mut R) -> f64 {
        let key = variant.fingerprint();
        if let Some(&score) = self.cache.get(&key) {
            self.hits += 1;
            variant.set_cached_fitness(score);
            return score;
        }
        let score = self.inner.evaluate(variant);
        self.cache.insert(key, score);
        score
    }

    fn target(&self) -> f64 {
        self.inner.target()
    }
}
