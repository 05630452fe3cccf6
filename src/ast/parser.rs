//! Lexer and parser for the C subset
//!
//! The parser is purely syntactic: variable references come out with
//! `vid = 0` and get resolved against the scope tables during numbering.
//! One statement per instruction is inherent to the grammar, so no
//! compound-splitting pass is needed afterwards.

use logos::Logos;

use super::{BinOp, Block, Expr, Function, GlobalDecl, Param, Stmt, StmtKind, UnOp, Unit};
use crate::error::{RepairError, Result};

#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
#[logos(skip r"[ \t\r\n]+")]
#[logos(skip r"//[^\n]*")]
#[logos(skip r"/\*([^*]|\*[^/])*\*/")]
enum Tok {
    #[token("int")]
    Int,
    #[token("if")]
    If,
    #[token("else")]
    Else,
    #[token("while")]
    While,
    #[token("return")]
    Return,
    #[token("break")]
    Break,
    #[token("continue")]
    Continue,

    #[regex(r"[A-Za-z_][A-Za-z0-9_]*")]
    Ident,
    #[regex(r"[0-9]+")]
    Number,

    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token(";")]
    Semi,
    #[token(",")]
    Comma,

    #[token("==")]
    EqEq,
    #[token("!=")]
    Ne,
    #[token("<=")]
    Le,
    #[token(">=")]
    Ge,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,
    #[token("&&")]
    AndAnd,
    #[token("||")]
    OrOr,
    #[token("!")]
    Bang,
    #[token("=")]
    Assign,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,
}

#[derive(Debug, Clone)]
struct Token {
    kind: Tok,
    text: String,
    start: usize,
}

/// Parses one source file into a [`Unit`].
pub fn parse_unit(file: &str, src: &str) -> Result<Unit> {
    let mut tokens = Vec::new();
    let mut lexer = Tok::lexer(src);
    while let Some(item) = lexer.next() {
        let span = lexer.span();
        match item {
            Ok(kind) => tokens.push(Token {
                kind,
                text: lexer.slice().to_string(),
                start: span.start,
            }),
            Err(()) => {
                return Err(parse_error(file, src, span.start, "unrecognized token"));
            }
        }
    }

    Parser {
        file,
        src,
        tokens,
        pos: 0,
    }
    .unit()
}

fn parse_error(file: &str, src: &str, offset: usize, message: impl Into<String>) -> RepairError {
    let line = src[..offset.min(src.len())].matches('\n').count() + 1;
    RepairError::Parse {
        file: file.to_string(),
        line,
        message: message.into(),
    }
}

struct Parser<'a> {
    file: &'a str,
    src: &'a str,
    tokens: Vec<Token>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<Tok> {
        self.tokens.get(self.pos).map(|t| t.kind)
    }

    fn peek2(&self) -> Option<Tok> {
        self.tokens.get(self.pos + 1).map(|t| t.kind)
    }

    fn advance(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).cloned();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn check(&self, kind: Tok) -> bool {
        self.peek() == Some(kind)
    }

    fn eat(&mut self, kind: Tok) -> bool {
        if self.check(kind) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: Tok, what: &str) -> Result<Token> {
        if self.check(kind) {
            Ok(self.advance().unwrap())
        } else {
            Err(self.error_here(format!("expected {}", what)))
        }
    }

    fn error_here(&self, message: String) -> RepairError {
        let offset = self
            .tokens
            .get(self.pos)
            .map(|t| t.start)
            .unwrap_or(self.src.len());
        parse_error(self.file, self.src, offset, message)
    }

    fn unit(mut self) -> Result<Unit> {
        let mut unit = Unit::default();
        while self.peek().is_some() {
            self.expect(Tok::Int, "`int`")?;
            let name = self.expect(Tok::Ident, "a name")?.text;
            if self.check(Tok::LParen) {
                unit.functions.push(self.function(name)?);
            } else {
                let init = if self.eat(Tok::Assign) {
                    Some(self.expr()?)
                } else {
                    None
                };
                self.expect(Tok::Semi, "`;`")?;
                unit.globals.push(GlobalDecl { vid: 0, name, init });
            }
        }
        Ok(unit)
    }

    fn function(&mut self, name: String) -> Result<Function> {
        self.expect(Tok::LParen, "`(`")?;
        let mut params = Vec::new();
        if !self.check(Tok::RParen) {
            loop {
                self.expect(Tok::Int, "`int`")?;
                let pname = self.expect(Tok::Ident, "a parameter name")?.text;
                params.push(Param { vid: 0, name: pname });
                if !self.eat(Tok::Comma) {
                    break;
                }
            }
        }
        self.expect(Tok::RParen, "`)`")?;
        let body = self.block()?;
        Ok(Function { name, params, body })
    }

    fn block(&mut self) -> Result<Block> {
        self.expect(Tok::LBrace, "`{`")?;
        let mut stmts = Vec::new();
        while !self.check(Tok::RBrace) {
            if self.peek().is_none() {
                return Err(self.error_here("unterminated block".into()));
            }
            stmts.push(self.stmt()?);
        }
        self.expect(Tok::RBrace, "`}`")?;
        Ok(Block { stmts })
    }

    fn stmt(&mut self) -> Result<Stmt> {
        match self.peek() {
            Some(Tok::Int) => {
                self.advance();
                let name = self.expect(Tok::Ident, "a name")?.text;
                let init = if self.eat(Tok::Assign) {
                    Some(self.expr()?)
                } else {
                    None
                };
                self.expect(Tok::Semi, "`;`")?;
                Ok(Stmt::new(StmtKind::Decl { vid: 0, name, init }))
            }
            Some(Tok::Return) => {
                self.advance();
                let value = if self.check(Tok::Semi) {
                    None
                } else {
                    Some(self.expr()?)
                };
                self.expect(Tok::Semi, "`;`")?;
                Ok(Stmt::new(StmtKind::Return(value)))
            }
            Some(Tok::If) => {
                self.advance();
                self.expect(Tok::LParen, "`(`")?;
                let cond = self.expr()?;
                self.expect(Tok::RParen, "`)`")?;
                let then_blk = self.block()?;
                let else_blk = if self.eat(Tok::Else) {
                    self.block()?
                } else {
                    Block::new()
                };
                Ok(Stmt::new(StmtKind::If {
                    cond,
                    then_blk,
                    else_blk,
                }))
            }
            Some(Tok::While) => {
                self.advance();
                self.expect(Tok::LParen, "`(`")?;
                let cond = self.expr()?;
                self.expect(Tok::RParen, "`)`")?;
                let body = self.block()?;
                Ok(Stmt::new(StmtKind::While { cond, body }))
            }
            Some(Tok::Break) => {
                self.advance();
                self.expect(Tok::Semi, "`;`")?;
                Ok(Stmt::new(StmtKind::Break))
            }
            Some(Tok::Continue) => {
                self.advance();
                self.expect(Tok::Semi, "`;`")?;
                Ok(Stmt::new(StmtKind::Continue))
            }
            Some(Tok::LBrace) => Ok(Stmt::new(StmtKind::Block(self.block()?))),
            Some(Tok::Semi) => {
                self.advance();
                Ok(Stmt::new(StmtKind::Empty))
            }
            Some(_) => {
                let e = self.expr()?;
                self.expect(Tok::Semi, "`;`")?;
                Ok(Stmt::new(StmtKind::Instr(e)))
            }
            None => Err(self.error_here("expected a statement".into())),
        }
    }

    // Assignment is only recognized at the top of an expression, which is
    // all the C subset needs: `a = ...` statements and initializers.
    fn expr(&mut self) -> Result<Expr> {
        if self.check(Tok::Ident) && self.peek2() == Some(Tok::Assign) {
            let name = self.advance().unwrap().text;
            self.advance(); // `=`
            let value = self.expr()?;
            return Ok(Expr::Assign {
                target: Box::new(Expr::var(0, name)),
                value: Box::new(value),
            });
        }
        self.or_expr()
    }

    fn or_expr(&mut self) -> Result<Expr> {
        let mut lhs = self.and_expr()?;
        while self.eat(Tok::OrOr) {
            let rhs = self.and_expr()?;
            lhs = binary(BinOp::Or, lhs, rhs);
        }
        Ok(lhs)
    }

    fn and_expr(&mut self) -> Result<Expr> {
        let mut lhs = self.cmp_expr()?;
        while self.eat(Tok::AndAnd) {
            let rhs = self.cmp_expr()?;
            lhs = binary(BinOp::And, lhs, rhs);
        }
        Ok(lhs)
    }

    fn cmp_expr(&mut self) -> Result<Expr> {
        let mut lhs = self.add_expr()?;
        loop {
            let op = match self.peek() {
                Some(Tok::EqEq) => BinOp::Eq,
                Some(Tok::Ne) => BinOp::Ne,
                Some(Tok::Lt) => BinOp::Lt,
                Some(Tok::Le) => BinOp::Le,
                Some(Tok::Gt) => BinOp::Gt,
                Some(Tok::Ge) => BinOp::Ge,
                _ => break,
            };
            self.advance();
            let rhs = self.add_expr()?;
            lhs = binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn add_expr(&mut self) -> Result<Expr> {
        let mut lhs = self.mul_expr()?;
        loop {
            let op = match self.peek() {
                Some(Tok::Plus) => BinOp::Add,
                Some(Tok::Minus) => BinOp::Sub,
                _ => break,
            };
            self.advance();
            let rhs = self.mul_expr()?;
            lhs = binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn mul_expr(&mut self) -> Result<Expr> {
        let mut lhs = self.unary_expr()?;
        loop {
            let op = match self.peek() {
                Some(Tok::Star) => BinOp::Mul,
                Some(Tok::Slash) => BinOp::Div,
                Some(Tok::Percent) => BinOp::Rem,
                _ => break,
            };
            self.advance();
            let rhs = self.unary_expr()?;
            lhs = binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn unary_expr(&mut self) -> Result<Expr> {
        if self.eat(Tok::Minus) {
            let inner = self.unary_expr()?;
            return Ok(Expr::Unary {
                op: UnOp::Neg,
                expr: Box::new(inner),
            });
        }
        if self.eat(Tok::Bang) {
            let inner = self.unary_expr()?;
            return Ok(Expr::Unary {
                op: UnOp::Not,
                expr: Box::new(inner),
            });
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Expr> {
        match self.peek() {
            Some(Tok::Number) => {
                let tok = self.advance().unwrap();
                let value = tok
                    .text
                    .parse::<i64>()
                    .map_err(|_| self.error_here(format!("integer literal `{}` overflows", tok.text)))?;
                Ok(Expr::Const(value))
            }
            Some(Tok::Ident) => {
                let name = self.advance().unwrap().text;
                if self.eat(Tok::LParen) {
                    let mut args = Vec::new();
                    if !self.check(Tok::RParen) {
                        loop {
                            args.push(self.expr()?);
                            if !self.eat(Tok::Comma) {
                                break;
                            }
                        }
                    }
                    self.expect(Tok::RParen, "`)`")?;
                    Ok(Expr::Call { name, args })
                } else {
                    Ok(Expr::var(0, name))
                }
            }
            Some(Tok::LParen) => {
                self.advance();
                let e = self.expr()?;
                self.expect(Tok::RParen, "`)`")?;
                Ok(e)
            }
            _ => Err(self.error_here("expected an expression".into())),
        }
    }
}

fn binary(op: BinOp, lhs: Expr, rhs: Expr) -> Expr {
    Expr::Binary {
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_simple_function() {
        let unit = parse_unit(
            "t.c",
            "int main() {\n    int a = 0;\n    a = a + 1;\n    return a;\n}\n",
        )
        .unwrap();
        assert_eq!(unit.functions.len(), 1);
        assert_eq!(unit.functions[0].body.stmts.len(), 3);
    }

    #[test]
    fn parse_globals_and_params() {
        let unit = parse_unit("t.c", "int limit = 10;\nint f(int x, int y) { return x; }\n").unwrap();
        assert_eq!(unit.globals.len(), 1);
        assert_eq!(unit.globals[0].name, "limit");
        assert_eq!(unit.functions[0].params.len(), 2);
    }

    #[test]
    fn parse_control_flow() {
        let src = "int f(int n) {\n    while (n > 0) {\n        if (n % 2 == 0) {\n            n = n / 2;\n        } else {\n            n = n - 1;\n        }\n    }\n    return n;\n}\n";
        let unit = parse_unit("t.c", src).unwrap();
        let body = &unit.functions[0].body;
        assert!(matches!(body.stmts[0].kind, StmtKind::While { .. }));
    }

    #[test]
    fn parse_error_carries_line() {
        let err = parse_unit("t.c", "int f() {\n    return 1\n}\n").unwrap_err();
        match err {
            RepairError::Parse { line, .. } => assert_eq!(line, 3),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn assignment_binds_loosest() {
        let unit = parse_unit("t.c", "int f() { x = 1 + 2 * 3; return x; }").unwrap();
        match &unit.functions[0].body.stmts[0].kind {
            StmtKind::Instr(Expr::Assign { value, .. }) => {
                assert_eq!(super::super::printer::expr_to_string(value), "1 + (2 * 3)");
            }
            other => panic!("unexpected stmt: {other:?}"),
        }
    }
}
