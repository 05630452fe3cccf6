//! Pretty-printer for the C subset
//!
//! The printed form doubles as the canonicalization key for fix sites, so
//! it must be deterministic: same tree, same text.

use super::{Block, Expr, Function, Stmt, StmtKind, UnOp, Unit};

const INDENT: &str = "    ";

/// Prints a whole unit.
pub fn unit_to_string(unit: &Unit) -> String {
    let mut out = String::new();
    for g in &unit.globals {
        match &g.init {
            Some(e) => out.push_str(&format!("int {} = {};\n", g.name, expr_to_string(e))),
            None => out.push_str(&format!("int {};\n", g.name)),
        }
    }
    if !unit.globals.is_empty() && !unit.functions.is_empty() {
        out.push('\n');
    }
    for (i, f) in unit.functions.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        out.push_str(&function_to_string(f));
    }
    out
}

fn function_to_string(f: &Function) -> String {
    let params = f
        .params
        .iter()
        .map(|p| format!("int {}", p.name))
        .collect::<Vec<_>>()
        .join(", ");
    let mut out = format!("int {}({}) {{\n", f.name, params);
    for s in &f.body.stmts {
        out.push_str(&stmt_to_string(s, 1));
    }
    out.push_str("}\n");
    out
}

/// Prints one statement subtree at the given indent depth.
///
/// Every statement ends in a newline; blocks print their braces on the
/// owning statement's lines.
pub fn stmt_to_string(stmt: &Stmt, depth: usize) -> String {
    let pad = INDENT.repeat(depth);
    match &stmt.kind {
        StmtKind::Instr(e) => format!("{}{};\n", pad, expr_to_string(e)),
        StmtKind::Decl { name, init, .. } => match init {
            Some(e) => format!("{}int {} = {};\n", pad, name, expr_to_string(e)),
            None => format!("{}int {};\n", pad, name),
        },
        StmtKind::Return(Some(e)) => format!("{}return {};\n", pad, expr_to_string(e)),
        StmtKind::Return(None) => format!("{}return;\n", pad),
        StmtKind::If {
            cond,
            then_blk,
            else_blk,
        } => {
            let mut out = format!("{}if ({}) {{\n", pad, expr_to_string(cond));
            out.push_str(&block_body(then_blk, depth + 1));
            if else_blk.stmts.is_empty() {
                out.push_str(&format!("{}}}\n", pad));
            } else {
                out.push_str(&format!("{}}} else {{\n", pad));
                out.push_str(&block_body(else_blk, depth + 1));
                out.push_str(&format!("{}}}\n", pad));
            }
            out
        }
        StmtKind::While { cond, body } => {
            let mut out = format!("{}while ({}) {{\n", pad, expr_to_string(cond));
            out.push_str(&block_body(body, depth + 1));
            out.push_str(&format!("{}}}\n", pad));
            out
        }
        StmtKind::Block(b) => {
            let mut out = format!("{}{{\n", pad);
            out.push_str(&block_body(b, depth + 1));
            out.push_str(&format!("{}}}\n", pad));
            out
        }
        StmtKind::Break => format!("{}break;\n", pad),
        StmtKind::Continue => format!("{}continue;\n", pad),
        StmtKind::Empty => format!("{};\n", pad),
    }
}

fn block_body(block: &Block, depth: usize) -> String {
    block
        .stmts
        .iter()
        .map(|s| stmt_to_string(s, depth))
        .collect()
}

/// Prints one expression. Parenthesizes every compound operand, which is
/// redundant but unambiguous and keeps the canonical text stable.
pub fn expr_to_string(expr: &Expr) -> String {
    match expr {
        Expr::Const(n) => n.to_string(),
        Expr::Var { name, .. } => name.clone(),
        Expr::Unary { op, expr } => {
            let sym = match op {
                UnOp::Neg => "-",
                UnOp::Not => "!",
            };
            format!("{}{}", sym, operand(expr))
        }
        Expr::Binary { op, lhs, rhs } => {
            format!("{} {} {}", operand(lhs), op.symbol(), operand(rhs))
        }
        Expr::Assign { target, value } => {
            format!("{} = {}", expr_to_string(target), expr_to_string(value))
        }
        Expr::Call { name, args } => {
            let args = args
                .iter()
                .map(expr_to_string)
                .collect::<Vec<_>>()
                .join(", ");
            format!("{}({})", name, args)
        }
    }
}

fn operand(expr: &Expr) -> String {
    match expr {
        Expr::Const(_) | Expr::Var { .. } | Expr::Call { .. } => expr_to_string(expr),
        _ => format!("({})", expr_to_string(expr)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::BinOp;

    #[test]
    fn print_expr() {
        let e = Expr::Binary {
            op: BinOp::Add,
            lhs: Box::new(Expr::var(1, "a")),
            rhs: Box::new(Expr::Const(1)),
        };
        assert_eq!(expr_to_string(&e), "a + 1");
    }

    #[test]
    fn print_nested_expr() {
        let e = Expr::Binary {
            op: BinOp::Mul,
            lhs: Box::new(Expr::Binary {
                op: BinOp::Add,
                lhs: Box::new(Expr::var(1, "a")),
                rhs: Box::new(Expr::var(2, "b")),
            }),
            rhs: Box::new(Expr::Const(2)),
        };
        assert_eq!(expr_to_string(&e), "(a + b) * 2");
    }

    #[test]
    fn print_if_without_else() {
        let s = Stmt::new(StmtKind::If {
            cond: Expr::var(1, "a"),
            then_blk: Block {
                stmts: vec![Stmt::new(StmtKind::Return(Some(Expr::Const(1))))],
            },
            else_blk: Block::new(),
        });
        let text = stmt_to_string(&s, 0);
        assert!(text.starts_with("if (a) {\n"));
        assert!(text.contains("return 1;"));
        assert!(!text.contains("else"));
    }

    #[test]
    fn identical_trees_print_identically() {
        let a = Stmt::new(StmtKind::Return(Some(Expr::var(4, "r"))));
        let mut b = a.clone();
        b.sid = 17; // sids never show up in the text
        assert_eq!(stmt_to_string(&a, 0), stmt_to_string(&b, 0));
    }
}
