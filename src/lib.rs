//! # mendel
//!
//! The search and representation layer of an automated program-repair
//! engine.
//!
//! Given a buggy program and a test suite that distinguishes passing from
//! failing runs, mendel searches the space of statement-level edits
//! (delete, append, swap, replace, and expression-level substitution) for
//! a variant that passes every test. The search is guided by a weighted
//! fault-localization path and runs either as a genetic-programming loop
//! with tournament selection and crossover, or as a brute-force sweep over
//! all distance-one edits. A multi-deme coordinator exchanges the best
//! variants between independent populations.
//!
//! ## Example
//!
//! ```rust,ignore
//! use mendel::config::Config;
//! use mendel::context::CoreContext;
//! use mendel::fitness::SourceTestFitness;
//! use mendel::rep::patch::PatchRep;
//! use mendel::rep::Variant;
//! use mendel::search::ga::GeneticSearch;
//! use mendel::store::AtomStore;
//!
//! let store = AtomStore::load(Path::new("buggy.c"))?;
//! let ctx = CoreContext::shared(store, Config::default());
//!
//! let mut original = PatchRep::new(ctx.clone());
//! original.set_localization(fault_path, fix_path);
//!
//! let mut engine = GeneticSearch::new(&ctx, 1);
//! let mut fitness = SourceTestFitness::new(tests);
//! let outcome = engine.run(&original, Vec::new(), &mut fitness)?;
//! if let Some(repair) = outcome.repair() {
//!     println!("{}", repair.pretty_print());
//! }
//! ```

#![warn(missing_docs)]
#![warn(rust_2024_compatibility)]

/// Abstract syntax tree types for the built-in C-subset provider
pub mod ast;

/// The frozen statement arena: numbering, scope tables, and the code bank
pub mod store;

/// Edit variants, the wire codec, and history fingerprints
pub mod edit;

/// Weighted fault and fix localization paths
pub mod localization;

/// Candidate representations: the shared trait, patch form, and whole-tree form
pub mod rep;

/// Fitness evaluation seam and the built-in source-predicate evaluator
pub mod fitness;

/// Search engines: brute-force worklist and the genetic algorithm
pub mod search;

/// Multi-deme coordinator with ring exchange and diversity selection
pub mod distributed;

/// Coverage instrumentation and trace reading
pub mod coverage;

/// Session configuration
pub mod config;

/// Per-session context shared by all variants
pub mod context;

/// Error types
pub mod error {
    //! Error types for mendel

    use thiserror::Error;

    /// Errors that can occur while loading programs or running a search
    #[derive(Error, Debug)]
    pub enum RepairError {
        /// Input file has an extension the loader does not understand
        #[error("unknown input extension: {0}")]
        UnknownExtension(String),

        /// The built-in provider failed to parse a source file
        #[error("parse error in {file}:{line}: {message}")]
        Parse {
            /// File being parsed
            file: String,
            /// 1-based line of the offending token
            line: usize,
            /// What went wrong
            message: String,
        },

        /// Statement numbering produced an inconsistent store
        #[error("numbering invariant violated: {0}")]
        Numbering(String),

        /// A numbered statement has no scope information
        #[error("missing scope info for statement {0}")]
        MissingScope(usize),

        /// Invalid argument
        #[error("invalid argument: {0}")]
        InvalidArgument(String),

        /// A serialized population was written by an incompatible version
        #[error("version mismatch: expected {expected}, found {found}")]
        VersionMismatch {
            /// Version this build writes
            expected: u32,
            /// Header found in the file
            found: String,
        },

        /// Underlying I/O failure
        #[error(transparent)]
        Io(#[from] std::io::Error),
    }

    /// Result type for mendel operations
    pub type Result<T> = std::result::Result<T, RepairError>;
}

pub use error::{RepairError, Result};

pub use ast::AtomId;
pub use edit::Edit;
pub use localization::WeightedPath;
pub use rep::Variant;
pub use search::{RepairOutcome, SearchStats};
