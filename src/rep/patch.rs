//! Patch-form representation
//!
//! A `PatchRep` is an edit history against the shared base program;
//! nothing else. Cloning copies a `Vec` of edits, and the mutated tree
//! only exists while printing or evaluating, built by the deferred
//! transform in [`crate::rep::Materializer`].

use std::sync::Arc;

use indexmap::IndexMap;
use rustc_hash::FxHashSet;

use crate::ast::{AtomId, Unit};
use crate::context::CoreContext;
use crate::edit::Edit;
use crate::localization::WeightedPath;
use crate::rep::{assert_edit_sids, Materializer, Variant};

/// Deferred-application variant: shared store plus an edit history
#[derive(Clone, Debug)]
pub struct PatchRep {
    ctx: Arc<CoreContext>,
    history: Vec<Edit>,
    fault: WeightedPath,
    fix: WeightedPath,
    fitness: Option<f64>,
}

impl PatchRep {
    /// Creates the original (zero-edit) variant.
    ///
    /// Fix localization defaults to the canonicalized code bank; fault
    /// localization starts empty and must be installed before searching.
    pub fn new(ctx: Arc<CoreContext>) -> Self {
        let fix = WeightedPath::fix_from_bank(ctx.store());
        Self {
            ctx,
            history: Vec::new(),
            fault: WeightedPath::new(),
            fix,
            fitness: None,
        }
    }
}

impl Variant for PatchRep {
    fn context(&self) -> &Arc<CoreContext> {
        &self.ctx
    }

    fn history(&self) -> &[Edit] {
        &self.history
    }

    fn fault_localization(&self) -> &WeightedPath {
        &self.fault
    }

    fn fix_localization(&self) -> &WeightedPath {
        &self.fix
    }

    fn set_localization(&mut self, fault: WeightedPath, fix: WeightedPath) {
        self.fault = fault;
        self.fix = fix;
    }

    fn cached_fitness(&self) -> Option<f64> {
        self.fitness
    }

    fn set_cached_fitness(&mut self, fitness: f64) {
        self.fitness = Some(fitness);
    }

    fn push_edit(&mut self, edit: Edit) {
        assert_edit_sids(&self.ctx, &edit);
        self.history.push(edit);
        self.fitness = None;
    }

    fn program(&self) -> IndexMap<String, Unit> {
        Materializer::new(&self.ctx, &self.history).run()
    }

    fn crossover_prefix(&mut self, donor: &Self, my_ids: &[AtomId], donor_ids: &[AtomId]) {
        debug_assert_eq!(my_ids.len(), donor_ids.len());
        if my_ids.is_empty() {
            return;
        }

        // Exchanging statement bodies along the prefix is, in patch form,
        // exchanging the edits that target those statements: this variant
        // drops its own edits on the prefix and adopts the donor's.
        let mine: FxHashSet<AtomId> = my_ids.iter().copied().collect();
        let theirs: FxHashSet<AtomId> = donor_ids.iter().copied().collect();

        self.history.retain(|e| {
            matches!(e, Edit::Crossover(_, _)) || !mine.contains(&e.target())
        });
        for e in donor.history() {
            if !matches!(e, Edit::Crossover(_, _)) && theirs.contains(&e.target()) {
                self.history.push(e.clone());
            }
        }
        self.history.push(Edit::Crossover(
            *my_ids.last().unwrap(),
            *donor_ids.last().unwrap(),
        ));
        self.fitness = None;
    }
}
