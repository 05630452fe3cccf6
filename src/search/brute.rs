//! Brute-force worklist search
//!
//! Enumerates every distance-one edit the operators allow, pairs each with
//! a priority weight, sorts descending, and evaluates lazily one variant
//! at a time until the first solution. With a fault path of hundreds of
//! statements the worklist easily reaches 10⁵ candidates, so nothing is
//! materialized before its turn comes.

use std::cmp::Ordering;
use std::time::Instant;

use tracing::{debug, warn};

use crate::ast::Expr;
use crate::edit::Edit;
use crate::fitness::Fitness;
use crate::rep::Variant;
use crate::search::{RepairOutcome, SearchStats};

const APPEND_WEIGHT: f64 = 0.9;
const SWAP_WEIGHT: f64 = 0.8;
const SUBATOM_WEIGHT: f64 = 0.9;

/// Builds the weighted worklist of all distance-one edits, sorted by
/// weight descending with a deterministic tie-break.
pub fn worklist<R: Variant>(original: &R) -> Vec<(f64, Edit)> {
    let fault = original.fault_localization();
    let use_subatoms = original.context().config().use_subatoms;
    let mut items: Vec<(f64, Edit)> = Vec::new();

    for (x, wx) in fault.iter() {
        items.push((wx, Edit::Delete(x)));

        for (y, wy) in original.append_sources(x).iter() {
            items.push((wx * wy * APPEND_WEIGHT, Edit::Append(x, y)));
        }

        // swap_sources carries fault weights; x < y discards the
        // symmetric duplicate of each pair.
        for (y, wy) in original.swap_sources(x).iter() {
            if x < y {
                items.push((wx * wy * SWAP_WEIGHT, Edit::Swap(x, y)));
            }
        }

        if use_subatoms {
            let slots = original.subatoms_of(x).len();
            for index in 0..slots {
                items.push((
                    wx * SUBATOM_WEIGHT,
                    Edit::ReplaceSubatom {
                        dest: x,
                        index,
                        expr: Expr::zero(),
                    },
                ));
            }
            for (y, _) in original.append_sources(x).iter() {
                for donor_expr in original.subatoms_of(y) {
                    for index in 0..slots {
                        items.push((
                            wx * SUBATOM_WEIGHT,
                            Edit::ReplaceSubatom {
                                dest: x,
                                index,
                                expr: donor_expr.clone(),
                            },
                        ));
                    }
                }
            }
        }
    }

    items.sort_by(|(wa, ea), (wb, eb)| {
        wb.partial_cmp(wa)
            .unwrap_or(Ordering::Equal)
            .then_with(|| ea.sort_key().cmp(&eb.sort_key()))
    });
    items
}

/// Runs the sweep: evaluates worklist entries in order and stops at the
/// first variant whose fitness reaches the evaluator's target.
pub fn search<R: Variant, F: Fitness<R>>(original: &R, fitness: &mut F) -> RepairOutcome<R> {
    let started = Instant::now();
    let items = worklist(original);
    let mut stats = SearchStats::default();

    if items.is_empty() {
        warn!("brute force: no candidate edits, nothing to search");
        stats.search_time = started.elapsed();
        return RepairOutcome::Exhausted { best: None, stats };
    }
    debug!(candidates = items.len(), "brute force sweep starting");

    let target = fitness.target();
    let mut best: Option<(R, f64)> = None;

    for (weight, edit) in items {
        let mut candidate = original.clone();
        candidate.push_edit(edit);
        let score = fitness.evaluate(&mut candidate);
        stats.variants_evaluated += 1;

        if score >= target {
            debug!(weight, score, "brute force found a repair");
            stats.search_time = started.elapsed();
            return RepairOutcome::Repaired {
                variant: candidate,
                stats,
            };
        }
        if best.as_ref().map_or(true, |(_, b)| score > *b) {
            best = Some((candidate, score));
        }
    }

    stats.search_time = started.elapsed();
    RepairOutcome::Exhausted { best, stats }
}
