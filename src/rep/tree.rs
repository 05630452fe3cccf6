//! Whole-tree representation
//!
//! A `TreeRep` owns a deep copy of the base program and applies every edit
//! in place as it arrives. The history is kept as provenance (and for the
//! wire format); printing just walks the owned tree.

use std::sync::Arc;

use indexmap::IndexMap;
use rustc_hash::FxHashSet;
use tracing::warn;

use crate::ast::visitor::zero_ids;
use crate::ast::{AtomId, Block, Stmt, StmtKind, Unit};
use crate::context::CoreContext;
use crate::edit::Edit;
use crate::localization::WeightedPath;
use crate::rep::{assert_edit_sids, fix_duplicate_sids_block, Variant};

/// Eager-application variant: a private mutated copy of the tree
#[derive(Clone)]
pub struct TreeRep {
    ctx: Arc<CoreContext>,
    files: IndexMap<String, Unit>,
    history: Vec<Edit>,
    fault: WeightedPath,
    fix: WeightedPath,
    fitness: Option<f64>,
}

impl TreeRep {
    /// Creates the original variant by deep-copying the base program.
    pub fn new(ctx: Arc<CoreContext>) -> Self {
        let files = ctx.store().files().clone();
        let fix = WeightedPath::fix_from_bank(ctx.store());
        Self {
            ctx,
            files,
            history: Vec::new(),
            fault: WeightedPath::new(),
            fix,
            fitness: None,
        }
    }

    fn kind_of(&self, sid: AtomId) -> Option<StmtKind> {
        for unit in self.files.values() {
            for func in &unit.functions {
                if let Some(stmt) = find_stmt(&func.body, sid) {
                    return Some(stmt.kind.clone());
                }
            }
        }
        None
    }

    fn set_kind(&mut self, sid: AtomId, kind: StmtKind) -> bool {
        for unit in self.files.values_mut() {
            for func in &mut unit.functions {
                if let Some(stmt) = find_stmt_mut(&mut func.body, sid) {
                    stmt.kind = kind;
                    return true;
                }
            }
        }
        false
    }

    fn with_stmt_mut(&mut self, sid: AtomId, f: impl FnOnce(&mut Stmt)) -> bool {
        for unit in self.files.values_mut() {
            for func in &mut unit.functions {
                if let Some(stmt) = find_stmt_mut(&mut func.body, sid) {
                    f(stmt);
                    return true;
                }
            }
        }
        false
    }

    fn fix_duplicates(&mut self) {
        let mut seen = FxHashSet::default();
        for unit in self.files.values_mut() {
            for func in &mut unit.functions {
                fix_duplicate_sids_block(&mut func.body, &mut seen);
            }
        }
    }

    /// Applies one edit to the owned tree.
    ///
    /// A destination that earlier edits removed from the tree (a statement
    /// swallowed by delete or replace) makes the edit a no-op; the history
    /// still records it.
    fn apply(&mut self, edit: &Edit) {
        match edit {
            Edit::Delete(x) => {
                self.set_kind(*x, StmtKind::Block(Block::new()));
            }
            Edit::Append(x, y) => {
                if let Some(donor_kind) = self.kind_of(*y) {
                    let mut clone = Stmt::new(donor_kind);
                    zero_ids(&mut clone);
                    self.with_stmt_mut(*x, |stmt| {
                        let old = std::mem::replace(&mut stmt.kind, StmtKind::Empty);
                        stmt.kind = StmtKind::Block(Block {
                            stmts: vec![Stmt::new(old), clone],
                        });
                    });
                } else {
                    warn!(donor = y, "append donor is no longer in the tree");
                }
            }
            Edit::Swap(x, y) => {
                if self.ctx.config().swap_bug {
                    // Historical behavior: delete at the smaller id, then
                    // append the larger id's body there.
                    let (lo, hi) = (*x.min(y), *x.max(y));
                    self.apply(&Edit::Delete(lo));
                    self.apply(&Edit::Append(lo, hi));
                } else {
                    match (self.kind_of(*x), self.kind_of(*y)) {
                        (Some(kx), Some(ky)) => {
                            self.set_kind(*x, ky);
                            self.set_kind(*y, kx);
                            self.fix_duplicates();
                        }
                        _ => warn!(x, y, "swap endpoint is no longer in the tree"),
                    }
                }
            }
            Edit::Replace(x, y) => {
                if let Some(donor_kind) = self.kind_of(*y) {
                    let mut clone = Stmt::new(donor_kind);
                    zero_ids(&mut clone);
                    self.set_kind(*x, StmtKind::Block(Block { stmts: vec![clone] }));
                } else {
                    warn!(donor = y, "replace donor is no longer in the tree");
                }
            }
            Edit::ReplaceSubatom { dest, index, expr } => {
                let (index, expr) = (*index, expr.clone());
                self.with_stmt_mut(*dest, |stmt| stmt.replace_subatom(index, expr));
            }
            Edit::Template {
                name,
                dest,
                bindings,
            } => match self.ctx.template(name) {
                Some(t) => {
                    if let Some(mut built) = t(self.ctx.store(), bindings) {
                        zero_ids(&mut built);
                        self.set_kind(*dest, StmtKind::Block(Block { stmts: vec![built] }));
                    } else {
                        warn!(template = name, "template rejected its bindings");
                    }
                }
                None => warn!(template = name, "template vanished from the registry"),
            },
            Edit::Crossover(_, _) => {}
        }
    }
}

impl Variant for TreeRep {
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
        self.apply(&edit);
        self.history.push(edit);
        self.fitness = None;
    }

    fn program(&self) -> IndexMap<String, Unit> {
        self.files.clone()
    }

    fn crossover_prefix(&mut self, donor: &Self, my_ids: &[AtomId], donor_ids: &[AtomId]) {
        debug_assert_eq!(my_ids.len(), donor_ids.len());
        if my_ids.is_empty() {
            return;
        }
        for (mine, theirs) in my_ids.iter().zip(donor_ids) {
            if let Some(kind) = donor.kind_of(*theirs) {
                self.set_kind(*mine, kind);
            }
        }
        self.fix_duplicates();
        self.history.push(Edit::Crossover(
            *my_ids.last().unwrap(),
            *donor_ids.last().unwrap(),
        ));
        self.fitness = None;
    }
}

fn find_stmt(block: &Block, sid: AtomId) -> Option<&Stmt> {
    for stmt in &block.stmts {
        if stmt.sid == sid {
            return Some(stmt);
        }
        let found = match &stmt.kind {
            StmtKind::If {
                then_blk, else_blk, ..
            } => find_stmt(then_blk, sid).or_else(|| find_stmt(else_blk, sid)),
            StmtKind::While { body, .. } => find_stmt(body, sid),
            StmtKind::Block(b) => find_stmt(b, sid),
            _ => None,
        };
        if found.is_some() {
            return found;
        }
    }
    None
}

fn find_stmt_mut(block: &mut Block, sid: AtomId) -> Option<&mut Stmt> {
    for stmt in &mut block.stmts {
        if stmt.sid == sid {
            return Some(stmt);
        }
        let found = match &mut stmt.kind {
            StmtKind::If {
                then_blk, else_blk, ..
            } => find_stmt_mut(then_blk, sid).or_else(|| find_stmt_mut(else_blk, sid)),
            StmtKind::While { body, .. } => find_stmt_mut(body, sid),
            StmtKind::Block(b) => find_stmt_mut(b, sid),
            _ => None,
        };
        if found.is_some() {
            return found;
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::store::AtomStore;

    fn rep(src: &str) -> TreeRep {
        let store = AtomStore::load_sources(vec![("t.c".into(), src.into())]).unwrap();
        TreeRep::new(CoreContext::shared(store, Config::default()))
    }

    #[test]
    fn swap_exchanges_live_bodies() {
        let mut v = rep("int f() {\n    int x = 0;\n    x = 1;\n    x = 2;\n    return x;\n}\n");
        // 1: decl, 2: x = 1, 3: x = 2, 4: return
        v.swap(2, 3);
        let text = v.pretty_print();
        let one = text.find("x = 1;").unwrap();
        let two = text.find("x = 2;").unwrap();
        assert!(two < one);

        v.swap(2, 3);
        let text = v.pretty_print();
        let one = text.find("x = 1;").unwrap();
        let two = text.find("x = 2;").unwrap();
        assert!(one < two, "swap twice restores the original order");
    }

    #[test]
    fn delete_then_print() {
        let mut v = rep("int f() {\n    int a = 0;\n    a = a + 1;\n    return a;\n}\n");
        v.delete(2);
        let text = v.pretty_print();
        assert!(!text.contains("a + 1"));
        assert!(text.contains("return a;"));
    }

    #[test]
    fn history_is_provenance() {
        let mut v = rep("int f() {\n    int a = 0;\n    return a;\n}\n");
        v.delete(1);
        v.append(2, 1);
        assert_eq!(v.history().len(), 2);
    }
}
