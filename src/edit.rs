//! Edit scripts and their wire format
//!
//! An [`Edit`] names a statement-level change relative to the base
//! program. Histories are ordered lists of edits; list order is
//! application order, and later edits see the result of earlier ones on
//! the same statement.
//!
//! The wire format covers the four statement-level operators plus the
//! crossover provenance marker:
//!
//! ```text
//! hist     := edit (' ' edit)*
//! edit     := 'd(' id ')' | 'a(' id ',' id ')' | 's(' id ',' id ')' | 'r(' id ',' id ')'
//! variants := hist ('.' hist)*
//! ```
//!
//! Subatom and template edits have no wire record; encoding skips them
//! with a warning, so round-tripping is guaranteed only for `d/a/s/r`
//! histories.

use rustc_hash::FxHashSet;
use tracing::warn;

use crate::ast::{AtomId, Expr};

/// One edit relative to the base program
#[derive(Debug, Clone, PartialEq)]
pub enum Edit {
    /// Replace statement `x` with an empty block
    Delete(AtomId),
    /// After `x`, inline a fresh clone of statement `y`
    Append(AtomId, AtomId),
    /// Exchange the bodies of `x` and `y`
    Swap(AtomId, AtomId),
    /// Replace `x` with a fresh clone of `y`
    Replace(AtomId, AtomId),
    /// Replace the `index`-th expression subatom of `dest` with `expr`
    ReplaceSubatom {
        /// Edited statement
        dest: AtomId,
        /// Left-to-right subatom index
        index: usize,
        /// Replacement expression
        expr: Expr,
    },
    /// Apply the named code template at `dest`
    Template {
        /// Registered template name
        name: String,
        /// Edited statement
        dest: AtomId,
        /// Hole name → donor statement id
        bindings: Vec<(String, AtomId)>,
    },
    /// Provenance marker left by crossover; never replayed
    Crossover(AtomId, AtomId),
}

impl Edit {
    /// The primary statement this edit is keyed on.
    pub fn target(&self) -> AtomId {
        match self {
            Edit::Delete(x)
            | Edit::Append(x, _)
            | Edit::Swap(x, _)
            | Edit::Replace(x, _)
            | Edit::ReplaceSubatom { dest: x, .. }
            | Edit::Template { dest: x, .. }
            | Edit::Crossover(x, _) => *x,
        }
    }

    /// Adds every sid whose statement the transform must visit for this
    /// edit. Swap fires at both endpoints.
    pub fn collect_touched(&self, out: &mut FxHashSet<AtomId>) {
        match self {
            Edit::Delete(x)
            | Edit::Append(x, _)
            | Edit::Replace(x, _)
            | Edit::ReplaceSubatom { dest: x, .. }
            | Edit::Template { dest: x, .. } => {
                out.insert(*x);
            }
            Edit::Swap(x, y) => {
                out.insert(*x);
                out.insert(*y);
            }
            Edit::Crossover(_, _) => {}
        }
    }

    /// Wire token for this edit, if the format has one.
    pub fn encode(&self) -> Option<String> {
        match self {
            Edit::Delete(x) => Some(format!("d({})", x)),
            Edit::Append(x, y) => Some(format!("a({},{})", x, y)),
            Edit::Swap(x, y) => Some(format!("s({},{})", x, y)),
            Edit::Replace(x, y) => Some(format!("r({},{})", x, y)),
            Edit::Crossover(x, y) => Some(format!("x({},{})", x, y)),
            Edit::ReplaceSubatom { .. } | Edit::Template { .. } => None,
        }
    }

    /// Total printable form; distinguishes every edit, including the ones
    /// the wire format cannot carry. This is what history fingerprints are
    /// made of.
    pub fn describe(&self) -> String {
        match self {
            Edit::ReplaceSubatom { dest, index, expr } => {
                format!("u({},{},{})", dest, index, expr)
            }
            Edit::Template {
                name,
                dest,
                bindings,
            } => {
                let holes = bindings
                    .iter()
                    .map(|(h, sid)| format!("{}:{}", h, sid))
                    .collect::<Vec<_>>()
                    .join(",");
                format!("t({},{},[{}])", name, dest, holes)
            }
            other => other.encode().unwrap(),
        }
    }

    /// Deterministic ordering key used to break weight ties in the
    /// brute-force worklist: operator rank first, then ids.
    pub fn sort_key(&self) -> (u8, AtomId, AtomId, usize) {
        match self {
            Edit::Delete(x) => (0, *x, 0, 0),
            Edit::Append(x, y) => (1, *x, *y, 0),
            Edit::Swap(x, y) => (2, *x, *y, 0),
            Edit::Replace(x, y) => (3, *x, *y, 0),
            Edit::ReplaceSubatom { dest, index, .. } => (4, *dest, 0, *index),
            Edit::Template { dest, .. } => (5, *dest, 0, 0),
            Edit::Crossover(x, y) => (6, *x, *y, 0),
        }
    }
}

impl std::fmt::Display for Edit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.describe())
    }
}

/// Serialized form of a history; the fitness-cache key.
pub fn fingerprint(history: &[Edit]) -> String {
    history
        .iter()
        .map(Edit::describe)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Encodes a history for the wire, newest edit first. Edits without a
/// wire record are skipped with a warning.
pub fn encode_history(history: &[Edit]) -> String {
    let mut tokens = Vec::new();
    for edit in history.iter().rev() {
        match edit.encode() {
            Some(tok) => tokens.push(tok),
            None => warn!(edit = %edit, "edit has no wire record, skipping"),
        }
    }
    tokens.join(" ")
}

/// Decodes a wire history into edits in message order (newest first).
///
/// Crossover markers and unrecognized records are dropped with a warning;
/// the rest of the history is kept.
pub fn decode_history(text: &str) -> Vec<Edit> {
    let mut edits = Vec::new();
    for token in text.split_whitespace() {
        match decode_token(token) {
            Some(Edit::Crossover(_, _)) => {
                warn!(token, "dropping crossover marker from incoming history");
            }
            Some(edit) => edits.push(edit),
            None => {
                warn!(token, "dropping unrecognized edit record");
            }
        }
    }
    edits
}

fn decode_token(token: &str) -> Option<Edit> {
    let (kind, rest) = token.split_at(1);
    let ids = rest.strip_prefix('(')?.strip_suffix(')')?;
    let mut parts = ids.split(',').map(|p| p.trim().parse::<AtomId>());
    let mut next = || parts.next().and_then(|r| r.ok());
    match kind {
        "d" => Some(Edit::Delete(next()?)),
        "a" => Some(Edit::Append(next()?, next()?)),
        "s" => Some(Edit::Swap(next()?, next()?)),
        "r" => Some(Edit::Replace(next()?, next()?)),
        "x" => Some(Edit::Crossover(next()?, next()?)),
        _ => None,
    }
}
