//! AST types for the built-in C-subset provider
//!
//! The tree is a plain value type: statements own their children and carry
//! a statement id (`sid`) label. All cross-statement references elsewhere in
//! the crate are ids into the [`crate::store::AtomStore`], never pointers
//! into this tree, so cloning a subtree is always safe.

use std::fmt;

/// Statement id. Dense, positive, assigned during numbering.
///
/// Id `0` is reserved for "unnumbered / do not touch": dummy nodes, raw
/// blocks, and clones inlined by edits all carry sid 0.
pub type AtomId = usize;

/// Variable id, dense across one load.
pub type VarId = usize;

/// Expressions. These are the subatoms of the statements that contain them.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Integer literal
    Const(i64),
    /// Variable reference, name kept for printing
    Var {
        /// Resolved variable id (0 until resolution)
        vid: VarId,
        /// Source name
        name: String,
    },
    /// Unary operation
    Unary {
        /// Operator
        op: UnOp,
        /// Operand
        expr: Box<Expr>,
    },
    /// Binary operation
    Binary {
        /// Operator
        op: BinOp,
        /// Left operand
        lhs: Box<Expr>,
        /// Right operand
        rhs: Box<Expr>,
    },
    /// Assignment; the target is always a `Var`
    Assign {
        /// Assigned variable
        target: Box<Expr>,
        /// Value expression
        value: Box<Expr>,
    },
    /// Function call
    Call {
        /// Callee name
        name: String,
        /// Arguments
        args: Vec<Expr>,
    },
}

impl Expr {
    /// The language constant used by subatom-to-constant mutations.
    pub fn zero() -> Expr {
        Expr::Const(0)
    }

    /// Convenience constructor for a named variable reference.
    pub fn var(vid: VarId, name: impl Into<String>) -> Expr {
        Expr::Var {
            vid,
            name: name.into(),
        }
    }
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    /// Arithmetic negation
    Neg,
    /// Logical not
    Not,
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `%`
    Rem,
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `&&`
    And,
    /// `||`
    Or,
}

impl BinOp {
    /// Printable operator token
    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Rem => "%",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::And => "&&",
            BinOp::Or => "||",
        }
    }
}

/// A sequence of statements
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Block {
    /// Statements in source order
    pub stmts: Vec<Stmt>,
}

impl Block {
    /// Creates an empty block
    pub fn new() -> Self {
        Self::default()
    }
}

/// A statement: a sid label plus a kind
#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    /// Statement id; 0 = unnumbered
    pub sid: AtomId,
    /// The statement itself
    pub kind: StmtKind,
}

impl Stmt {
    /// Creates an unnumbered statement
    pub fn new(kind: StmtKind) -> Self {
        Self { sid: 0, kind }
    }

    /// True for the statement kinds that receive sids and may be edited.
    ///
    /// Ordinary instructions (including declarations), `return`, `if`, and
    /// loops are mutatable; jumps and raw blocks are not.
    pub fn is_mutatable(&self) -> bool {
        matches!(
            self.kind,
            StmtKind::Instr(_)
                | StmtKind::Decl { .. }
                | StmtKind::Return(_)
                | StmtKind::If { .. }
                | StmtKind::While { .. }
                | StmtKind::Empty
        )
    }

    /// The top-level expression slots of this statement, left to right.
    ///
    /// Nested statements are not descended into; their expressions belong
    /// to their own sids.
    pub fn subatoms(&self) -> Vec<&Expr> {
        match &self.kind {
            StmtKind::Instr(e) => match e {
                Expr::Assign { value, .. } => vec![value.as_ref()],
                Expr::Call { args, .. } => args.iter().collect(),
                other => vec![other],
            },
            StmtKind::Decl { init: Some(e), .. } => vec![e],
            StmtKind::Return(Some(e)) => vec![e],
            StmtKind::If { cond, .. } => vec![cond],
            StmtKind::While { cond, .. } => vec![cond],
            _ => Vec::new(),
        }
    }

    /// Replaces the `index`-th subatom slot with `expr`.
    ///
    /// Out-of-range indices leave the statement unchanged; the caller
    /// samples indices from [`Stmt::subatoms`] so a miss is a no-op rather
    /// than an error.
    pub fn replace_subatom(&mut self, index: usize, expr: Expr) {
        match &mut self.kind {
            StmtKind::Instr(e) => match e {
                Expr::Assign { value, .. } => {
                    if index == 0 {
                        **value = expr;
                    }
                }
                Expr::Call { args, .. } => {
                    if let Some(slot) = args.get_mut(index) {
                        *slot = expr;
                    }
                }
                other => {
                    if index == 0 {
                        *other = expr;
                    }
                }
            },
            StmtKind::Decl { init: Some(e), .. } => {
                if index == 0 {
                    *e = expr;
                }
            }
            StmtKind::Return(Some(e)) => {
                if index == 0 {
                    *e = expr;
                }
            }
            StmtKind::If { cond, .. } | StmtKind::While { cond, .. } => {
                if index == 0 {
                    *cond = expr;
                }
            }
            _ => {}
        }
    }
}

/// Statement kinds
#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    /// Expression statement (assignment or call)
    Instr(Expr),
    /// Local declaration, optionally initialized
    Decl {
        /// Declared variable id
        vid: VarId,
        /// Source name
        name: String,
        /// Initializer, if any
        init: Option<Expr>,
    },
    /// `return`, optionally with a value
    Return(Option<Expr>),
    /// Conditional with two branches; an absent `else` is an empty block
    If {
        /// Condition
        cond: Expr,
        /// Then branch
        then_blk: Block,
        /// Else branch
        else_blk: Block,
    },
    /// `while` loop
    While {
        /// Condition
        cond: Expr,
        /// Body
        body: Block,
    },
    /// Raw block; not numbered, exists only as structure
    Block(Block),
    /// `break`
    Break,
    /// `continue`
    Continue,
    /// Dummy statement standing in for an empty block body
    Empty,
}

/// One function definition
#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    /// Function name
    pub name: String,
    /// Parameters in declaration order
    pub params: Vec<Param>,
    /// Body
    pub body: Block,
}

/// One function parameter
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    /// Resolved variable id
    pub vid: VarId,
    /// Source name
    pub name: String,
}

/// One global declaration
#[derive(Debug, Clone, PartialEq)]
pub struct GlobalDecl {
    /// Resolved variable id
    pub vid: VarId,
    /// Source name
    pub name: String,
    /// Initializer, if any
    pub init: Option<Expr>,
}

/// One parsed source file: globals then functions
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Unit {
    /// Global declarations in source order
    pub globals: Vec<GlobalDecl>,
    /// Function definitions, in source order
    pub functions: Vec<Function>,
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", printer::expr_to_string(self))
    }
}

impl fmt::Display for Stmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", printer::stmt_to_string(self, 0))
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", printer::unit_to_string(self))
    }
}

pub mod parser;
pub mod printer;
pub mod visitor;

#[cfg(test)]
mod tests {
    use super::*;

    fn assign(vid: VarId, name: &str, value: Expr) -> Stmt {
        Stmt::new(StmtKind::Instr(Expr::Assign {
            target: Box::new(Expr::var(vid, name)),
            value: Box::new(value),
        }))
    }

    #[test]
    fn mutatable_kinds() {
        assert!(assign(1, "a", Expr::Const(1)).is_mutatable());
        assert!(Stmt::new(StmtKind::Return(None)).is_mutatable());
        assert!(Stmt::new(StmtKind::Empty).is_mutatable());
        assert!(!Stmt::new(StmtKind::Break).is_mutatable());
        assert!(!Stmt::new(StmtKind::Block(Block::new())).is_mutatable());
    }

    #[test]
    fn subatom_slots() {
        let s = assign(1, "a", Expr::Const(7));
        let subs = s.subatoms();
        assert_eq!(subs.len(), 1);
        assert_eq!(*subs[0], Expr::Const(7));

        let call = Stmt::new(StmtKind::Instr(Expr::Call {
            name: "f".into(),
            args: vec![Expr::Const(1), Expr::Const(2)],
        }));
        assert_eq!(call.subatoms().len(), 2);

        assert!(Stmt::new(StmtKind::Break).subatoms().is_empty());
    }

    #[test]
    fn replace_subatom_in_place() {
        let mut s = assign(1, "a", Expr::Const(7));
        s.replace_subatom(0, Expr::zero());
        assert_eq!(*s.subatoms()[0], Expr::Const(0));

        // Out-of-range index is a no-op
        s.replace_subatom(5, Expr::Const(9));
        assert_eq!(*s.subatoms()[0], Expr::Const(0));
    }
}
