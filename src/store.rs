//! The frozen statement arena
//!
//! An [`AtomStore`] holds the parsed base program and everything the search
//! needs to address it: the numbering of mutatable statements, the scope
//! tables behind the semantic check, the statement code bank that donates
//! bodies to append/replace/swap, and the canonicalization map that
//! collapses textually identical fix sites onto one representative id.
//!
//! The store is built once per session and never mutated afterwards; every
//! variant shares it read-only.

use std::path::Path;

use indexmap::IndexMap;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::ast::{parser, printer, visitor, AtomId, Block, Expr, Stmt, StmtKind, Unit, VarId};
use crate::config::SemanticCheck;
use crate::error::{RepairError, Result};
use crate::localization::WeightedPath;

/// Name and type of one variable
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarInfo {
    /// Source name
    pub name: String,
    /// Type name; the built-in provider only has `int`
    pub ty: String,
}

/// The parsed, numbered, frozen base program
#[derive(Debug, Clone)]
pub struct AtomStore {
    files: IndexMap<String, Unit>,
    stmt_map: FxHashMap<AtomId, (String, String)>,
    globals: FxHashSet<VarId>,
    locals_have: FxHashMap<AtomId, FxHashSet<VarId>>,
    locals_used: FxHashMap<AtomId, FxHashSet<VarId>>,
    varinfo: Vec<VarInfo>,
    max_atom: AtomId,
    bank: FxHashMap<AtomId, Stmt>,
    canonical: FxHashMap<AtomId, AtomId>,
}

impl AtomStore {
    /// Loads a program from a single `.c` source file or a `.list`/`.txt`
    /// manifest naming one source file per line (relative to the manifest).
    pub fn load(path: &Path) -> Result<AtomStore> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();
        match ext.as_str() {
            "c" => {
                let src = std::fs::read_to_string(path)?;
                let name = path.to_string_lossy().into_owned();
                Self::load_sources(vec![(name, src)])
            }
            "list" | "txt" => {
                let base = path.parent().unwrap_or_else(|| Path::new("."));
                let manifest = std::fs::read_to_string(path)?;
                let mut sources = Vec::new();
                for line in manifest.lines() {
                    let line = line.trim();
                    if line.is_empty() || line.starts_with('#') {
                        continue;
                    }
                    let file = base.join(line);
                    let src = std::fs::read_to_string(&file)?;
                    sources.push((file.to_string_lossy().into_owned(), src));
                }
                Self::load_sources(sources)
            }
            other => Err(RepairError::UnknownExtension(other.to_string())),
        }
    }

    /// Loads a program from in-memory `(file name, source)` pairs.
    pub fn load_sources(sources: Vec<(String, String)>) -> Result<AtomStore> {
        if sources.is_empty() {
            return Err(RepairError::InvalidArgument(
                "no source files to load".to_string(),
            ));
        }

        let mut files = IndexMap::new();
        for (name, src) in &sources {
            let unit = parser::parse_unit(name, src)?;
            files.insert(name.clone(), unit);
        }

        let mut store = AtomStore {
            files,
            stmt_map: FxHashMap::default(),
            globals: FxHashSet::default(),
            locals_have: FxHashMap::default(),
            locals_used: FxHashMap::default(),
            varinfo: vec![VarInfo {
                name: String::new(),
                ty: String::new(),
            }],
            max_atom: 0,
            bank: FxHashMap::default(),
            canonical: FxHashMap::default(),
        };
        store.number()?;
        store.validate()?;
        Ok(store)
    }

    /// Numbers every mutatable statement and builds the side tables.
    fn number(&mut self) -> Result<()> {
        // Globals first so every function sees them during resolution.
        let mut global_names: FxHashMap<String, VarId> = FxHashMap::default();
        let file_names: Vec<String> = self.files.keys().cloned().collect();
        for fname in &file_names {
            let mut unit = self.files.get(fname).unwrap().clone();
            for g in &mut unit.globals {
                let vid = self.fresh_var(&g.name);
                g.vid = vid;
                self.globals.insert(vid);
                global_names.insert(g.name.clone(), vid);
            }
            self.files.insert(fname.clone(), unit);
        }

        for fname in &file_names {
            let mut unit = self.files.get(fname).unwrap().clone();
            for func in &mut unit.functions {
                let mut scopes: Vec<FxHashMap<String, VarId>> = vec![FxHashMap::default()];
                for p in &mut func.params {
                    let vid = self.fresh_var(&p.name);
                    p.vid = vid;
                    scopes.last_mut().unwrap().insert(p.name.clone(), vid);
                }
                let fn_name = func.name.clone();
                self.number_block(
                    &mut func.body,
                    &mut scopes,
                    &global_names,
                    &fn_name,
                    fname,
                )?;

                // The subtree is fully resolved now; collect the used sets,
                // the code bank, and the canonical text map.
                let mut numbered: Vec<&Stmt> = Vec::new();
                collect_numbered(&func.body, &mut numbered);
                for stmt in numbered {
                    let mut used = visitor::free_vars(stmt);
                    used.retain(|v| !self.globals.contains(v));
                    self.locals_used.insert(stmt.sid, used);
                    self.bank.insert(stmt.sid, stmt.clone());
                }
            }
            self.files.insert(fname.clone(), unit);
        }

        // Canonical fix-site ids, first printed form wins. Iteration is in
        // sid order so representatives are stable across loads.
        let mut by_text: FxHashMap<String, AtomId> = FxHashMap::default();
        for sid in 1..=self.max_atom {
            if let Some(stmt) = self.bank.get(&sid) {
                let text = printer::stmt_to_string(stmt, 0);
                let rep = *by_text.entry(text).or_insert(sid);
                self.canonical.insert(sid, rep);
            }
        }
        Ok(())
    }

    fn number_block(
        &mut self,
        block: &mut Block,
        scopes: &mut Vec<FxHashMap<String, VarId>>,
        globals: &FxHashMap<String, VarId>,
        fn_name: &str,
        file: &str,
    ) -> Result<()> {
        for stmt in &mut block.stmts {
            self.number_stmt(stmt, scopes, globals, fn_name, file)?;
        }
        Ok(())
    }

    fn number_stmt(
        &mut self,
        stmt: &mut Stmt,
        scopes: &mut Vec<FxHashMap<String, VarId>>,
        globals: &FxHashMap<String, VarId>,
        fn_name: &str,
        file: &str,
    ) -> Result<()> {
        // Declarations extend the current scope before the statement is
        // recorded: an appended clone runs after its destination, so the
        // destination's own variable is legal donor material.
        if let StmtKind::Decl { vid, name, init } = &mut stmt.kind {
            if let Some(e) = init {
                resolve_expr(e, scopes, globals, fn_name, file)?;
            }
            let fresh = self.fresh_var(name);
            *vid = fresh;
            scopes.last_mut().unwrap().insert(name.clone(), fresh);
        } else {
            match &mut stmt.kind {
                StmtKind::Instr(e) | StmtKind::Return(Some(e)) => {
                    resolve_expr(e, scopes, globals, fn_name, file)?;
                }
                StmtKind::If { cond, .. } | StmtKind::While { cond, .. } => {
                    resolve_expr(cond, scopes, globals, fn_name, file)?;
                }
                _ => {}
            }
        }

        if stmt.is_mutatable() {
            self.max_atom += 1;
            stmt.sid = self.max_atom;
            self.stmt_map
                .insert(stmt.sid, (fn_name.to_string(), file.to_string()));
            let mut have = FxHashSet::default();
            for scope in scopes.iter() {
                have.extend(scope.values().copied());
            }
            self.locals_have.insert(stmt.sid, have);
        }

        match &mut stmt.kind {
            StmtKind::If {
                then_blk, else_blk, ..
            } => {
                ensure_handle(then_blk);
                ensure_handle(else_blk);
                scopes.push(FxHashMap::default());
                self.number_block(then_blk, scopes, globals, fn_name, file)?;
                scopes.pop();
                scopes.push(FxHashMap::default());
                self.number_block(else_blk, scopes, globals, fn_name, file)?;
                scopes.pop();
            }
            StmtKind::While { body, .. } => {
                ensure_handle(body);
                scopes.push(FxHashMap::default());
                self.number_block(body, scopes, globals, fn_name, file)?;
                scopes.pop();
            }
            StmtKind::Block(b) => {
                scopes.push(FxHashMap::default());
                self.number_block(b, scopes, globals, fn_name, file)?;
                scopes.pop();
            }
            _ => {}
        }
        Ok(())
    }

    fn fresh_var(&mut self, name: &str) -> VarId {
        let vid = self.varinfo.len();
        self.varinfo.push(VarInfo {
            name: name.to_string(),
            ty: "int".to_string(),
        });
        vid
    }

    /// Checks the numbering invariants; violations are load-time fatal.
    fn validate(&self) -> Result<()> {
        for sid in 1..=self.max_atom {
            if !self.bank.contains_key(&sid) {
                return Err(RepairError::Numbering(format!(
                    "sid {} was assigned but never banked",
                    sid
                )));
            }
            let have = self
                .locals_have
                .get(&sid)
                .ok_or(RepairError::MissingScope(sid))?;
            let used = self
                .locals_used
                .get(&sid)
                .ok_or(RepairError::MissingScope(sid))?;
            for v in used {
                if !have.contains(v) && !self.globals.contains(v) {
                    return Err(RepairError::Numbering(format!(
                        "sid {} uses variable {} that is neither in scope nor global",
                        sid, v
                    )));
                }
            }
        }
        Ok(())
    }

    /// The highest assigned statement id.
    pub fn max_atom(&self) -> AtomId {
        self.max_atom
    }

    /// File name → parsed unit, in load order.
    pub fn files(&self) -> &IndexMap<String, Unit> {
        &self.files
    }

    /// Function and file of a numbered statement.
    pub fn stmt_location(&self, sid: AtomId) -> Option<(&str, &str)> {
        self.stmt_map
            .get(&sid)
            .map(|(f, file)| (f.as_str(), file.as_str()))
    }

    /// The set of global variable ids.
    pub fn globals(&self) -> &FxHashSet<VarId> {
        &self.globals
    }

    /// Name and type of a variable.
    pub fn varinfo(&self, vid: VarId) -> Option<&VarInfo> {
        if vid == 0 {
            None
        } else {
            self.varinfo.get(vid)
        }
    }

    /// Variables in scope at a numbered statement.
    pub fn locals_have(&self, sid: AtomId) -> Option<&FxHashSet<VarId>> {
        self.locals_have.get(&sid)
    }

    /// Non-global variables used by a numbered statement's subtree.
    pub fn locals_used(&self, sid: AtomId) -> Option<&FxHashSet<VarId>> {
        self.locals_used.get(&sid)
    }

    /// Pristine copy of a numbered statement, as it was at load time.
    pub fn bank_stmt(&self, sid: AtomId) -> Option<&Stmt> {
        self.bank.get(&sid)
    }

    /// Representative id for a fix site; statements with identical printed
    /// forms share one representative. Fault localization never uses this.
    pub fn canonical_id(&self, sid: AtomId) -> AtomId {
        self.canonical.get(&sid).copied().unwrap_or(sid)
    }

    /// Whether a statement from `src` may legally move to `dest`:
    /// every non-global variable `src` uses must be in scope at `dest`.
    ///
    /// Both ids must be numbered; anything else is a caller bug.
    pub fn in_scope_at(&self, dest: AtomId, src: AtomId) -> bool {
        let have = self
            .locals_have
            .get(&dest)
            .unwrap_or_else(|| panic!("no scope info for destination {}", dest));
        let used = self
            .locals_used
            .get(&src)
            .unwrap_or_else(|| panic!("no scope info for source {}", src));
        used.is_subset(have)
    }

    /// Donor statements that may be appended after `dest`, with their fix
    /// weights. Under `SemanticCheck::None` the whole fix path qualifies.
    pub fn append_sources(
        &self,
        dest: AtomId,
        fix: &WeightedPath,
        check: SemanticCheck,
    ) -> WeightedPath {
        match check {
            SemanticCheck::None => fix.clone(),
            SemanticCheck::Scope => fix
                .iter()
                .filter(|(src, _)| self.in_scope_at(dest, *src))
                .collect(),
        }
    }

    /// Statements that may be swapped with `dest`: scope-compatible in both
    /// directions, drawn from the fault path, never `dest` itself.
    pub fn swap_sources(
        &self,
        dest: AtomId,
        fault: &WeightedPath,
        check: SemanticCheck,
    ) -> WeightedPath {
        fault
            .iter()
            .filter(|(src, _)| *src != dest)
            .filter(|(src, _)| match check {
                SemanticCheck::None => true,
                SemanticCheck::Scope => {
                    self.in_scope_at(dest, *src) && self.in_scope_at(*src, dest)
                }
            })
            .collect()
    }

    /// Donor statements that may replace `dest`, with their fix weights.
    pub fn replace_sources(
        &self,
        dest: AtomId,
        fix: &WeightedPath,
        check: SemanticCheck,
    ) -> WeightedPath {
        fix.iter()
            .filter(|(src, _)| *src != dest)
            .filter(|(src, _)| match check {
                SemanticCheck::None => true,
                SemanticCheck::Scope => self.in_scope_at(dest, *src),
            })
            .collect()
    }

    /// Subatom slots of a banked statement.
    pub fn subatoms_of(&self, sid: AtomId) -> Vec<Expr> {
        self.bank
            .get(&sid)
            .map(|s| s.subatoms().into_iter().cloned().collect())
            .unwrap_or_default()
    }
}

/// Replaces an empty block body with a single dummy statement so edits
/// have a handle there.
fn ensure_handle(block: &mut Block) {
    if block.stmts.is_empty() {
        block.stmts.push(Stmt::new(StmtKind::Empty));
    }
}

fn collect_numbered<'a>(block: &'a Block, out: &mut Vec<&'a Stmt>) {
    for stmt in &block.stmts {
        if stmt.sid != 0 {
            out.push(stmt);
        }
        match &stmt.kind {
            StmtKind::If {
                then_blk, else_blk, ..
            } => {
                collect_numbered(then_blk, out);
                collect_numbered(else_blk, out);
            }
            StmtKind::While { body, .. } => collect_numbered(body, out),
            StmtKind::Block(b) => collect_numbered(b, out),
            _ => {}
        }
    }
}

fn resolve_expr(
    expr: &mut Expr,
    scopes: &[FxHashMap<String, VarId>],
    globals: &FxHashMap<String, VarId>,
    fn_name: &str,
    file: &str,
) -> Result<()> {
    match expr {
        Expr::Const(_) => Ok(()),
        Expr::Var { vid, name } => {
            for scope in scopes.iter().rev() {
                if let Some(v) = scope.get(name) {
                    *vid = *v;
                    return Ok(());
                }
            }
            if let Some(v) = globals.get(name) {
                *vid = *v;
                return Ok(());
            }
            Err(RepairError::Numbering(format!(
                "unresolved variable `{}` in {} ({})",
                name, fn_name, file
            )))
        }
        Expr::Unary { expr, .. } => resolve_expr(expr, scopes, globals, fn_name, file),
        Expr::Binary { lhs, rhs, .. } => {
            resolve_expr(lhs, scopes, globals, fn_name, file)?;
            resolve_expr(rhs, scopes, globals, fn_name, file)
        }
        Expr::Assign { target, value } => {
            resolve_expr(target, scopes, globals, fn_name, file)?;
            resolve_expr(value, scopes, globals, fn_name, file)
        }
        Expr::Call { args, .. } => {
            for a in args {
                resolve_expr(a, scopes, globals, fn_name, file)?;
            }
            Ok(())
        }
    }
}
