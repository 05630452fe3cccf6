//! Coverage instrumentation
//!
//! [`instrumented_source`] emits a compilable C rendering of a variant in
//! which every numbered statement first appends its sid (one text line per
//! execution) to a trace file. The companion [`read_trace`] parses such a
//! file back into a sid sequence for the localization builders.
//!
//! Modes compose: `uniq` caps each sid at one emission per run through a
//! byte array sized `max_atom + 1`; `multithread` opens and flushes the
//! trace file per emission instead of holding one handle per process.

use std::path::Path;

use tracing::warn;

use crate::ast::{AtomId, Block, Expr, Stmt, StmtKind};
use crate::config::Config;
use crate::error::Result;
use crate::rep::Variant;

const NOTE_FN: &str = "_cov_note";

/// Coverage emission modes
#[derive(Debug, Clone, Copy, Default)]
pub struct CoverageOptions {
    /// Emit each sid at most once per run
    pub uniq: bool,
    /// Open and flush the trace file per emission
    pub multithread: bool,
}

impl CoverageOptions {
    /// Reads the modes from a session configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            uniq: config.uniq_coverage,
            multithread: config.multithread_coverage,
        }
    }
}

/// Emits the instrumented source for a variant: the trace helper, then the
/// program with every numbered statement preceded by its emission call.
pub fn instrumented_source<R: Variant>(variant: &R, trace_path: &str) -> String {
    let opts = CoverageOptions::from_config(variant.context().config());
    let max_atom = variant.context().store().max_atom();

    let mut out = String::from("#include <stdio.h>\n\n");
    out.push_str(&trace_helper(trace_path, max_atom, opts));
    out.push('\n');

    for (_, mut unit) in variant.program() {
        for func in &mut unit.functions {
            instrument_block(&mut func.body);
        }
        out.push_str(&crate::ast::printer::unit_to_string(&unit));
    }
    out
}

fn trace_helper(trace_path: &str, max_atom: AtomId, opts: CoverageOptions) -> String {
    let mut out = String::new();
    if opts.uniq {
        out.push_str(&format!(
            "static unsigned char _cov_seen[{}];\n",
            max_atom + 1
        ));
    }
    if !opts.multithread {
        out.push_str("static FILE *_cov_fp;\n");
    }
    out.push_str(&format!("\nstatic void {}(int sid) {{\n", NOTE_FN));
    if opts.uniq {
        out.push_str("    if (_cov_seen[sid]) {\n        return;\n    }\n");
        out.push_str("    _cov_seen[sid] = 1;\n");
    }
    if opts.multithread {
        out.push_str(&format!(
            "    FILE *fp = fopen(\"{}\", \"a\");\n",
            trace_path
        ));
        out.push_str("    fprintf(fp, \"%d\\n\", sid);\n");
        out.push_str("    fflush(fp);\n");
        out.push_str("    fclose(fp);\n");
    } else {
        out.push_str(&format!(
            "    if (!_cov_fp) {{\n        _cov_fp = fopen(\"{}\", \"a\");\n    }}\n",
            trace_path
        ));
        out.push_str("    fprintf(_cov_fp, \"%d\\n\", sid);\n");
        out.push_str("    fflush(_cov_fp);\n");
    }
    out.push_str("}\n");
    out
}

/// Rewrites every numbered statement into `{ _cov_note(sid); stmt }`,
/// children first so nested statements get their own emissions.
fn instrument_block(block: &mut Block) {
    for stmt in &mut block.stmts {
        match &mut stmt.kind {
            StmtKind::If {
                then_blk, else_blk, ..
            } => {
                instrument_block(then_blk);
                instrument_block(else_blk);
            }
            StmtKind::While { body, .. } => instrument_block(body),
            StmtKind::Block(b) => instrument_block(b),
            _ => {}
        }
        if stmt.sid != 0 {
            let note = Stmt::new(StmtKind::Instr(Expr::Call {
                name: NOTE_FN.to_string(),
                args: vec![Expr::Const(stmt.sid as i64)],
            }));
            let inner = std::mem::replace(stmt, Stmt::new(StmtKind::Empty));
            *stmt = Stmt::new(StmtKind::Block(Block {
                stmts: vec![note, inner],
            }));
        }
    }
}

/// Reads a trace file: one sid per line. Unparsable lines are dropped with
/// a warning.
pub fn read_trace(path: &Path) -> Result<Vec<AtomId>> {
    let text = std::fs::read_to_string(path)?;
    let mut sids = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match line.parse::<AtomId>() {
            Ok(sid) => sids.push(sid),
            Err(_) => warn!(line, "dropping unparsable trace line"),
        }
    }
    Ok(sids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::context::CoreContext;
    use crate::rep::patch::PatchRep;
    use crate::store::AtomStore;

    fn variant(config: Config) -> PatchRep {
        let store = AtomStore::load_sources(vec![(
            "t.c".into(),
            "int f(int n) {\n    if (n > 0) {\n        n = n - 1;\n    }\n    return n;\n}\n"
                .into(),
        )])
        .unwrap();
        PatchRep::new(CoreContext::shared(store, config))
    }

    #[test]
    fn every_numbered_statement_emits() {
        let v = variant(Config::default());
        let src = instrumented_source(&v, "trace.out");
        // 1 = if, 2 = n - 1, 3 = return (+ the dummy else handle)
        assert!(src.contains("_cov_note(1);"));
        assert!(src.contains("_cov_note(2);"));
        assert!(src.contains("fopen(\"trace.out\""));
        // The emission precedes its statement.
        let note = src.find("_cov_note(2);").unwrap();
        let stmt = src.find("n = n - 1;").unwrap();
        assert!(note < stmt);
    }

    #[test]
    fn uniq_mode_sizes_the_seen_array() {
        let mut config = Config::default();
        config.uniq_coverage = true;
        let v = variant(config);
        let max = v.context().store().max_atom();
        let src = instrumented_source(&v, "trace.out");
        assert!(src.contains(&format!("_cov_seen[{}]", max + 1)));
        assert!(src.contains("_cov_seen[sid] = 1;"));
    }

    #[test]
    fn multithread_mode_closes_per_emission() {
        let mut config = Config::default();
        config.multithread_coverage = true;
        let v = variant(config);
        let src = instrumented_source(&v, "trace.out");
        assert!(src.contains("fclose(fp);"));
        assert!(!src.contains("static FILE *_cov_fp;"));
    }

    #[test]
    fn trace_roundtrip() {
        let dir = std::env::temp_dir();
        let path = dir.join("mendel_trace_test.txt");
        std::fs::write(&path, "1\n2\n2\nnot-a-sid\n3\n").unwrap();
        let sids = read_trace(&path).unwrap();
        assert_eq!(sids, vec![1, 2, 2, 3]);
        std::fs::remove_file(&path).ok();
    }
}
