//! Search engines
//!
//! Both engines consume a seeded original variant, its localization, and a
//! fitness evaluator, and report a [`RepairOutcome`]: the brute-force
//! worklist sweeps every distance-one edit in weight order, the genetic
//! algorithm evolves a population of edit scripts.

use std::time::Duration;

pub mod brute;
pub mod ga;

/// Counters and timing collected during a search
#[derive(Debug, Clone, Default)]
pub struct SearchStats {
    /// Fitness evaluations performed
    pub variants_evaluated: usize,
    /// GA generations completed (0 for brute force)
    pub generations: usize,
    /// Wall-clock search time
    pub search_time: Duration,
}

/// Result of a search
#[derive(Debug)]
pub enum RepairOutcome<R> {
    /// A variant reached the solution threshold
    Repaired {
        /// The repairing variant
        variant: R,
        /// Search statistics
        stats: SearchStats,
    },
    /// The search ended without a solution
    Exhausted {
        /// Best variant seen, with its fitness, if anything was evaluated
        best: Option<(R, f64)>,
        /// Search statistics
        stats: SearchStats,
    },
}

impl<R> RepairOutcome<R> {
    /// True if a repair was found.
    pub fn is_repaired(&self) -> bool {
        matches!(self, RepairOutcome::Repaired { .. })
    }

    /// The repairing variant, if any.
    pub fn repair(&self) -> Option<&R> {
        match self {
            RepairOutcome::Repaired { variant, .. } => Some(variant),
            RepairOutcome::Exhausted { .. } => None,
        }
    }

    /// Search statistics.
    pub fn stats(&self) -> &SearchStats {
        match self {
            RepairOutcome::Repaired { stats, .. } => stats,
            RepairOutcome::Exhausted { stats, .. } => stats,
        }
    }
}
