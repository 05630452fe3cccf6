//! Candidate representations
//!
//! A [`Variant`] is one candidate repair: the base program plus an ordered
//! edit history. Two implementations share the contract:
//!
//! - [`patch::PatchRep`] keeps only the history and materializes the
//!   mutated tree on demand;
//! - [`tree::TreeRep`] owns a deep copy of the tree and applies edits
//!   eagerly, keeping the history as provenance.
//!
//! Everything the search engines touch goes through the trait, so they are
//! generic over the flavor.

use std::sync::Arc;

use indexmap::IndexMap;
use rustc_hash::FxHashSet;
use tracing::warn;

use crate::ast::visitor::{rewrite_block, zero_ids};
use crate::ast::{printer, AtomId, Block, Expr, Stmt, StmtKind, Unit};
use crate::context::CoreContext;
use crate::edit::{self, Edit};
use crate::error::{RepairError, Result};
use crate::localization::WeightedPath;

pub mod patch;
pub mod tree;

/// One candidate variant of the program under repair
pub trait Variant: Clone {
    /// The shared session context.
    fn context(&self) -> &Arc<CoreContext>;

    /// The edit history, oldest first.
    fn history(&self) -> &[Edit];

    /// Candidate modification sites with suspiciousness weights.
    fn fault_localization(&self) -> &WeightedPath;

    /// Candidate donor sites with fix-utility weights.
    fn fix_localization(&self) -> &WeightedPath;

    /// Installs both localization paths.
    fn set_localization(&mut self, fault: WeightedPath, fix: WeightedPath);

    /// Fitness from the last evaluation, if no edit happened since.
    fn cached_fitness(&self) -> Option<f64>;

    /// Records an evaluation result.
    fn set_cached_fitness(&mut self, fitness: f64);

    /// Appends one edit, applies it (eagerly or deferred, per flavor) and
    /// invalidates the cached fitness.
    ///
    /// Ids must name numbered statements; anything else is a caller bug
    /// and panics.
    fn push_edit(&mut self, edit: Edit);

    /// The materialized program, file name → mutated unit.
    fn program(&self) -> IndexMap<String, Unit>;

    /// Receives the donor's statement bodies along the crossover prefix:
    /// for each `i`, this variant's statement at `my_ids[i]` takes the
    /// donor's body at `donor_ids[i]`. Leaves a provenance marker in the
    /// history.
    fn crossover_prefix(&mut self, donor: &Self, my_ids: &[AtomId], donor_ids: &[AtomId]);

    /// Replaces statement `x` with an empty block.
    fn delete(&mut self, x: AtomId) {
        self.push_edit(Edit::Delete(x));
    }

    /// Inlines a fresh clone of `y` after `x`.
    fn append(&mut self, x: AtomId, y: AtomId) {
        self.push_edit(Edit::Append(x, y));
    }

    /// Exchanges the bodies of `x` and `y`.
    fn swap(&mut self, x: AtomId, y: AtomId) {
        self.push_edit(Edit::Swap(x, y));
    }

    /// Replaces `x` with a fresh clone of `y`.
    fn replace(&mut self, x: AtomId, y: AtomId) {
        self.push_edit(Edit::Replace(x, y));
    }

    /// Replaces the `index`-th subatom of `x` with `expr`.
    fn replace_subatom(&mut self, x: AtomId, index: usize, expr: Expr) {
        self.push_edit(Edit::ReplaceSubatom {
            dest: x,
            index,
            expr,
        });
    }

    /// Applies the named template at `dest`. The name must be registered
    /// with the session context.
    fn apply_template(
        &mut self,
        name: &str,
        dest: AtomId,
        bindings: Vec<(String, AtomId)>,
    ) -> Result<()> {
        if self.context().template(name).is_none() {
            return Err(RepairError::InvalidArgument(format!(
                "unknown template `{}`",
                name
            )));
        }
        self.push_edit(Edit::Template {
            name: name.to_string(),
            dest,
            bindings,
        });
        Ok(())
    }

    /// Donors that may be appended after `dest`, scope-filtered per the
    /// session's semantic check.
    fn append_sources(&self, dest: AtomId) -> WeightedPath {
        let ctx = self.context();
        ctx.store()
            .append_sources(dest, self.fix_localization(), ctx.config().semantic_check)
    }

    /// Statements that may be swapped with `dest`.
    fn swap_sources(&self, dest: AtomId) -> WeightedPath {
        let ctx = self.context();
        ctx.store()
            .swap_sources(dest, self.fault_localization(), ctx.config().semantic_check)
    }

    /// Donors that may replace `dest`.
    fn replace_sources(&self, dest: AtomId) -> WeightedPath {
        let ctx = self.context();
        ctx.store()
            .replace_sources(dest, self.fix_localization(), ctx.config().semantic_check)
    }

    /// Subatom slots of the banked statement `sid`.
    fn subatoms_of(&self, sid: AtomId) -> Vec<Expr> {
        self.context().store().subatoms_of(sid)
    }

    /// Serialized history; the fitness-cache key.
    fn fingerprint(&self) -> String {
        edit::fingerprint(self.history())
    }

    /// Pretty-prints the materialized program, files in load order.
    fn pretty_print(&self) -> String {
        let mut out = String::new();
        for (_, unit) in self.program() {
            out.push_str(&printer::unit_to_string(&unit));
        }
        out
    }
}

/// Panics unless `sid` names a numbered statement. Histories produced by
/// the core's own operators can never fail this.
pub(crate) fn assert_known_sid(ctx: &CoreContext, sid: AtomId) {
    assert!(
        sid != 0 && sid <= ctx.store().max_atom(),
        "edit references unknown statement id {}",
        sid
    );
}

pub(crate) fn assert_edit_sids(ctx: &CoreContext, edit: &Edit) {
    match edit {
        Edit::Delete(x) => assert_known_sid(ctx, *x),
        Edit::Append(x, y) | Edit::Swap(x, y) | Edit::Replace(x, y) => {
            assert_known_sid(ctx, *x);
            assert_known_sid(ctx, *y);
        }
        Edit::ReplaceSubatom { dest, .. } | Edit::Template { dest, .. } => {
            assert_known_sid(ctx, *dest)
        }
        Edit::Crossover(_, _) => {}
    }
}

/// One entry of the working history the transform folds over.
///
/// The working history is derived from the public history at apply time:
/// `Swap(x, y)` fires at both endpoints, so it expands into two entries
/// sharing the original position; in `swap_bug` mode it expands into the
/// historical delete-then-append pair instead.
#[derive(Debug, Clone)]
pub(crate) enum WorkEdit {
    Delete(AtomId),
    /// Donor cloned from the code bank, ids zeroed
    AppendBank {
        dest: AtomId,
        donor: AtomId,
    },
    /// Donor cloned from the code bank, ids zeroed
    ReplaceBank {
        dest: AtomId,
        donor: AtomId,
    },
    /// Donor is the other endpoint's body as folded up to this position
    SwapWith {
        dest: AtomId,
        other: AtomId,
    },
    /// Legacy swap half: append the folded body of `donor` after `dest`
    AppendFolded {
        dest: AtomId,
        donor: AtomId,
    },
    Subatom {
        dest: AtomId,
        index: usize,
        expr: Expr,
    },
    Template {
        dest: AtomId,
        name: String,
        bindings: Vec<(String, AtomId)>,
    },
}

impl WorkEdit {
    pub(crate) fn dest(&self) -> AtomId {
        match self {
            WorkEdit::Delete(x)
            | WorkEdit::AppendBank { dest: x, .. }
            | WorkEdit::ReplaceBank { dest: x, .. }
            | WorkEdit::SwapWith { dest: x, .. }
            | WorkEdit::AppendFolded { dest: x, .. }
            | WorkEdit::Subatom { dest: x, .. }
            | WorkEdit::Template { dest: x, .. } => *x,
        }
    }
}

/// Expands the public history into the working history. Each entry keeps
/// the index of the public edit it came from, so the two halves of a swap
/// observe the same point in time.
pub(crate) fn working_history(history: &[Edit], swap_bug: bool) -> Vec<(usize, WorkEdit)> {
    let mut work = Vec::with_capacity(history.len() + 2);
    for (pos, e) in history.iter().enumerate() {
        match e {
            Edit::Delete(x) => work.push((pos, WorkEdit::Delete(*x))),
            Edit::Append(x, y) => work.push((
                pos,
                WorkEdit::AppendBank {
                    dest: *x,
                    donor: *y,
                },
            )),
            Edit::Replace(x, y) => work.push((
                pos,
                WorkEdit::ReplaceBank {
                    dest: *x,
                    donor: *y,
                },
            )),
            Edit::Swap(x, y) => {
                if swap_bug {
                    let (lo, hi) = (*x.min(y), *x.max(y));
                    work.push((pos, WorkEdit::Delete(lo)));
                    work.push((pos, WorkEdit::AppendFolded { dest: lo, donor: hi }));
                } else {
                    work.push((pos, WorkEdit::SwapWith { dest: *x, other: *y }));
                    work.push((pos, WorkEdit::SwapWith { dest: *y, other: *x }));
                }
            }
            Edit::ReplaceSubatom { dest, index, expr } => work.push((
                pos,
                WorkEdit::Subatom {
                    dest: *dest,
                    index: *index,
                    expr: expr.clone(),
                },
            )),
            Edit::Template {
                name,
                dest,
                bindings,
            } => work.push((
                pos,
                WorkEdit::Template {
                    dest: *dest,
                    name: name.clone(),
                    bindings: bindings.clone(),
                },
            )),
            Edit::Crossover(_, _) => {}
        }
    }
    work
}

/// The deferred transform: folds working-history entries over statements
/// of the base program.
pub(crate) struct Materializer<'a> {
    ctx: &'a CoreContext,
    work: Vec<(usize, WorkEdit)>,
    touched: FxHashSet<AtomId>,
}

impl<'a> Materializer<'a> {
    pub(crate) fn new(ctx: &'a CoreContext, history: &[Edit]) -> Self {
        let work = working_history(history, ctx.config().swap_bug);
        let mut touched = FxHashSet::default();
        for (_, w) in &work {
            touched.insert(w.dest());
        }
        Self {
            ctx,
            work,
            touched,
        }
    }

    /// Applies the transform to every file of the base program.
    ///
    /// The walk doubles as the duplicate-sid fix-up: the first occurrence
    /// of a sid folds its edits, every later occurrence (a swap clone) is
    /// zeroed on sight. Zeroing also bounds the walk when a swap pulls an
    /// ancestor's body into its own descendant.
    pub(crate) fn run(&self) -> IndexMap<String, Unit> {
        let mut files = self.ctx.store().files().clone();
        let mut seen: FxHashSet<AtomId> = FxHashSet::default();
        for (_, unit) in files.iter_mut() {
            for func in &mut unit.functions {
                rewrite_block(&mut func.body, &mut |stmt| {
                    if stmt.sid == 0 {
                        return;
                    }
                    if !seen.insert(stmt.sid) {
                        stmt.sid = 0;
                        return;
                    }
                    if self.touched.contains(&stmt.sid) {
                        self.fold_all(stmt);
                    }
                });
            }
        }
        files
    }

    /// Folds every working edit targeting `stmt` over it, in order.
    fn fold_all(&self, stmt: &mut Stmt) {
        let sid = stmt.sid;
        for (pos, w) in &self.work {
            if w.dest() == sid {
                self.fold_one(stmt, w, *pos);
            }
        }
    }

    /// The body of `sid` as folded by every edit strictly before `upto`.
    fn folded_kind(&self, sid: AtomId, upto: usize) -> StmtKind {
        let mut stmt = self
            .ctx
            .store()
            .bank_stmt(sid)
            .unwrap_or_else(|| panic!("edit references unknown statement id {}", sid))
            .clone();
        for (pos, w) in &self.work {
            if *pos < upto && w.dest() == sid {
                self.fold_one(&mut stmt, w, *pos);
            }
        }
        stmt.kind
    }

    fn fold_one(&self, stmt: &mut Stmt, work: &WorkEdit, pos: usize) {
        match work {
            WorkEdit::Delete(_) => {
                stmt.kind = StmtKind::Block(Block::new());
            }
            WorkEdit::AppendBank { donor, .. } => {
                let clone = self.bank_clone(*donor);
                let old = std::mem::replace(&mut stmt.kind, StmtKind::Empty);
                stmt.kind = StmtKind::Block(Block {
                    stmts: vec![Stmt::new(old), clone],
                });
            }
            WorkEdit::ReplaceBank { donor, .. } => {
                let clone = self.bank_clone(*donor);
                stmt.kind = StmtKind::Block(Block { stmts: vec![clone] });
            }
            WorkEdit::SwapWith { other, .. } => {
                stmt.kind = self.folded_kind(*other, pos);
            }
            WorkEdit::AppendFolded { donor, .. } => {
                let folded = Stmt::new(self.folded_kind(*donor, pos));
                let old = std::mem::replace(&mut stmt.kind, StmtKind::Empty);
                stmt.kind = StmtKind::Block(Block {
                    stmts: vec![Stmt::new(old), folded],
                });
            }
            WorkEdit::Subatom { index, expr, .. } => {
                stmt.replace_subatom(*index, expr.clone());
            }
            WorkEdit::Template {
                name, bindings, ..
            } => match self.ctx.template(name) {
                Some(t) => {
                    if let Some(mut built) = t(self.ctx.store(), bindings) {
                        zero_ids(&mut built);
                        stmt.kind = StmtKind::Block(Block { stmts: vec![built] });
                    } else {
                        warn!(template = name, "template rejected its bindings");
                    }
                }
                None => warn!(template = name, "template vanished from the registry"),
            },
        }
    }

    fn bank_clone(&self, donor: AtomId) -> Stmt {
        let mut clone = self
            .ctx
            .store()
            .bank_stmt(donor)
            .unwrap_or_else(|| panic!("edit references unknown statement id {}", donor))
            .clone();
        zero_ids(&mut clone);
        clone
    }
}

/// Zeroes the second and later occurrences of every non-zero sid, in
/// pre-order. Swap clones can briefly duplicate ids; after this pass no
/// two statements in the tree share one.
pub(crate) fn fix_duplicate_sids_block(block: &mut Block, seen: &mut FxHashSet<AtomId>) {
    for stmt in &mut block.stmts {
        if stmt.sid != 0 && !seen.insert(stmt.sid) {
            stmt.sid = 0;
        }
        match &mut stmt.kind {
            StmtKind::If {
                then_blk, else_blk, ..
            } => {
                fix_duplicate_sids_block(then_blk, seen);
                fix_duplicate_sids_block(else_blk, seen);
            }
            StmtKind::While { body, .. } => fix_duplicate_sids_block(body, seen),
            StmtKind::Block(b) => fix_duplicate_sids_block(b, seen),
            _ => {}
        }
    }
}
