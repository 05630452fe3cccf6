//! Walkers over the statement tree
//!
//! The tree is a closed sum type, so traversal is a single recursive walk
//! handing each node kind to a dispatch object. Implementors override only
//! the hooks they care about.

use super::{Block, Expr, Stmt, StmtKind, Unit, VarId};

/// Dispatch object for tree walks
///
/// Every hook has a no-op default. `on_stmt` fires in pre-order, before the
/// statement's children; expression hooks fire in left-to-right order.
pub trait AstVisitor {
    /// Called for every statement, before its children
    fn on_stmt(&mut self, _stmt: &Stmt) {}

    /// Called for every expression node
    fn on_expr(&mut self, _expr: &Expr) {}

    /// Called for every variable reference in lvalue position
    fn on_lval(&mut self, _vid: VarId, _name: &str) {}

    /// Called for every local declaration
    fn on_vardecl(&mut self, _vid: VarId, _name: &str) {}

    /// Called for every block, before its statements
    fn on_block(&mut self, _block: &Block) {}

    /// Called for every global declaration
    fn on_global(&mut self, _vid: VarId) {}
}

/// Walks a whole unit in source order.
pub fn walk_unit(unit: &Unit, v: &mut impl AstVisitor) {
    for g in &unit.globals {
        v.on_global(g.vid);
        if let Some(e) = &g.init {
            walk_expr(e, v);
        }
    }
    for f in &unit.functions {
        walk_block(&f.body, v);
    }
}

/// Walks a block and its statements.
pub fn walk_block(block: &Block, v: &mut impl AstVisitor) {
    v.on_block(block);
    for s in &block.stmts {
        walk_stmt(s, v);
    }
}

/// Walks one statement subtree in pre-order.
pub fn walk_stmt(stmt: &Stmt, v: &mut impl AstVisitor) {
    v.on_stmt(stmt);
    match &stmt.kind {
        StmtKind::Instr(e) => walk_expr(e, v),
        StmtKind::Decl { vid, name, init } => {
            v.on_vardecl(*vid, name);
            if let Some(e) = init {
                walk_expr(e, v);
            }
        }
        StmtKind::Return(Some(e)) => walk_expr(e, v),
        StmtKind::Return(None) | StmtKind::Break | StmtKind::Continue | StmtKind::Empty => {}
        StmtKind::If {
            cond,
            then_blk,
            else_blk,
        } => {
            walk_expr(cond, v);
            walk_block(then_blk, v);
            walk_block(else_blk, v);
        }
        StmtKind::While { cond, body } => {
            walk_expr(cond, v);
            walk_block(body, v);
        }
        StmtKind::Block(b) => walk_block(b, v),
    }
}

/// Walks one expression tree left to right.
pub fn walk_expr(expr: &Expr, v: &mut impl AstVisitor) {
    v.on_expr(expr);
    match expr {
        Expr::Const(_) => {}
        Expr::Var { .. } => {}
        Expr::Unary { expr: inner, .. } => walk_expr(inner, v),
        Expr::Binary { lhs, rhs, .. } => {
            walk_expr(lhs, v);
            walk_expr(rhs, v);
        }
        Expr::Assign { target, value } => {
            if let Expr::Var { vid, name } = target.as_ref() {
                v.on_lval(*vid, name);
            }
            walk_expr(value, v);
        }
        Expr::Call { args, .. } => {
            for a in args {
                walk_expr(a, v);
            }
        }
    }
}

/// Applies `f` to every statement in the block, in pre-order.
///
/// `f` runs before the statement's children are visited, so a replacement
/// body installed by `f` is itself traversed. Callers that rewrite nodes
/// are responsible for termination (clones inlined by edits carry sid 0
/// and are never rewritten again).
pub fn rewrite_block(block: &mut Block, f: &mut impl FnMut(&mut Stmt)) {
    for s in &mut block.stmts {
        rewrite_stmt(s, f);
    }
}

/// Applies `f` to one statement subtree in pre-order.
pub fn rewrite_stmt(stmt: &mut Stmt, f: &mut impl FnMut(&mut Stmt)) {
    f(stmt);
    match &mut stmt.kind {
        StmtKind::If {
            then_blk, else_blk, ..
        } => {
            rewrite_block(then_blk, f);
            rewrite_block(else_blk, f);
        }
        StmtKind::While { body, .. } => rewrite_block(body, f),
        StmtKind::Block(b) => rewrite_block(b, f),
        _ => {}
    }
}

/// Zeroes the sid of every statement in the subtree.
///
/// Clones inlined by append/replace run through this before insertion so
/// that no edit keying on the donor's sid fires a second, spurious time.
pub fn zero_ids(stmt: &mut Stmt) {
    rewrite_stmt(stmt, &mut |s| s.sid = 0);
}

/// Zeroes the sid of every statement in each block of the subtree.
pub fn zero_block_ids(block: &mut Block) {
    rewrite_block(block, &mut |s| s.sid = 0);
}

/// Collects the free variable ids of a statement subtree.
///
/// A variable is free if it is referenced somewhere in the subtree but not
/// declared by the subtree itself. Globals are not excluded here; the
/// store subtracts them when building `locals_used`.
pub fn free_vars(stmt: &Stmt) -> rustc_hash::FxHashSet<VarId> {
    struct Collector {
        used: rustc_hash::FxHashSet<VarId>,
        declared: rustc_hash::FxHashSet<VarId>,
    }

    impl AstVisitor for Collector {
        fn on_expr(&mut self, expr: &Expr) {
            if let Expr::Var { vid, .. } = expr {
                self.used.insert(*vid);
            }
        }

        fn on_lval(&mut self, vid: VarId, _name: &str) {
            self.used.insert(vid);
        }

        fn on_vardecl(&mut self, vid: VarId, _name: &str) {
            self.declared.insert(vid);
        }
    }

    let mut c = Collector {
        used: rustc_hash::FxHashSet::default(),
        declared: rustc_hash::FxHashSet::default(),
    };
    walk_stmt(stmt, &mut c);
    c.used.retain(|v| !c.declared.contains(v));
    c.used
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::BinOp;

    fn sample_if() -> Stmt {
        // if (a < b) { x = 1; } else { }
        Stmt::new(StmtKind::If {
            cond: Expr::Binary {
                op: BinOp::Lt,
                lhs: Box::new(Expr::var(1, "a")),
                rhs: Box::new(Expr::var(2, "b")),
            },
            then_blk: Block {
                stmts: vec![Stmt {
                    sid: 7,
                    kind: StmtKind::Instr(Expr::Assign {
                        target: Box::new(Expr::var(3, "x")),
                        value: Box::new(Expr::Const(1)),
                    }),
                }],
            },
            else_blk: Block::new(),
        })
    }

    #[test]
    fn count_statements() {
        struct Counter(usize);
        impl AstVisitor for Counter {
            fn on_stmt(&mut self, _: &Stmt) {
                self.0 += 1;
            }
        }

        let mut c = Counter(0);
        walk_stmt(&sample_if(), &mut c);
        assert_eq!(c.0, 2); // the if and the assignment
    }

    #[test]
    fn zero_ids_clears_subtree() {
        let mut s = sample_if();
        s.sid = 3;
        zero_ids(&mut s);

        struct NonZero(usize);
        impl AstVisitor for NonZero {
            fn on_stmt(&mut self, s: &Stmt) {
                if s.sid != 0 {
                    self.0 += 1;
                }
            }
        }
        let mut c = NonZero(0);
        walk_stmt(&s, &mut c);
        assert_eq!(c.0, 0);
    }

    #[test]
    fn free_vars_excludes_declared() {
        // { int t = a; x = t; } as a raw block
        let block = Stmt::new(StmtKind::Block(Block {
            stmts: vec![
                Stmt::new(StmtKind::Decl {
                    vid: 9,
                    name: "t".into(),
                    init: Some(Expr::var(1, "a")),
                }),
                Stmt::new(StmtKind::Instr(Expr::Assign {
                    target: Box::new(Expr::var(3, "x")),
                    value: Box::new(Expr::var(9, "t")),
                })),
            ],
        }));

        let free = free_vars(&block);
        assert!(free.contains(&1));
        assert!(free.contains(&3));
        assert!(!free.contains(&9));
    }
}
