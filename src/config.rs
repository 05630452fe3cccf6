//! Session configuration
//!
//! One [`Config`] covers the whole session: GA parameters, the distributed
//! coordinator, the semantic check level, and the coverage/compat flags.
//! Defaults match the conventional repair setup; `parse_str` accepts the
//! `key value` line format used by configuration files.

use tracing::warn;

use crate::error::{RepairError, Result};

/// Level of semantic checking applied when enumerating donor statements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SemanticCheck {
    /// No filtering; every donor qualifies
    None,
    /// Scope filtering: a donor must only use variables in scope at the
    /// destination
    #[default]
    Scope,
}

/// Genetic-algorithm parameters
#[derive(Debug, Clone)]
pub struct GaParams {
    /// Number of generations to run
    pub generations: usize,
    /// Population size
    pub pop_size: usize,
    /// Per-statement mutation probability multiplier (`μ`)
    pub mut_rate: f64,
    /// Force at least this many mutations per call; 0 disables
    pub pro_mut: usize,
    /// Probability that a firing mutation works on a subatom (`μₛ`)
    pub subatom_mut_rate: f64,
    /// Probability that a subatom mutation substitutes the language
    /// constant instead of donor material (`μₛc`)
    pub subatom_const_rate: f64,
    /// Per-couple crossover probability (`χ`)
    pub cross_rate: f64,
    /// Tournament sample size
    pub tournament_k: usize,
    /// Tournament acceptance probability for the best-ranked sample
    pub tournament_p: f64,
}

impl Default for GaParams {
    fn default() -> Self {
        Self {
            generations: 10,
            pop_size: 40,
            mut_rate: 0.06,
            pro_mut: 1,
            subatom_mut_rate: 0.0,
            subatom_const_rate: 0.1,
            cross_rate: 1.0,
            tournament_k: 2,
            tournament_p: 1.0,
        }
    }
}

/// Distributed-search parameters
#[derive(Debug, Clone)]
pub struct DistributedParams {
    /// Number of demes
    pub num_comps: usize,
    /// Partition the mutation space by `sid mod num_comps`
    pub split_search: bool,
    /// Select outgoing variants by history diversity instead of fitness
    pub diversity_selection: bool,
    /// Variants sent at each exchange
    pub variants_exchanged: usize,
    /// GA generations between exchanges
    pub gen_per_exchange: usize,
}

impl Default for DistributedParams {
    fn default() -> Self {
        Self {
            num_comps: 1,
            split_search: false,
            diversity_selection: false,
            variants_exchanged: 5,
            gen_per_exchange: 2,
        }
    }
}

/// Full session configuration
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// GA parameters
    pub ga: GaParams,
    /// Distributed-search parameters
    pub distributed: DistributedParams,
    /// Donor filtering level
    pub semantic_check: SemanticCheck,
    /// Enable expression-level (subatom) mutation operators
    pub use_subatoms: bool,
    /// Coverage: emit each sid at most once per run
    pub uniq_coverage: bool,
    /// Coverage: open and flush the trace file per emission
    pub multithread_coverage: bool,
    /// Reproduce the historical swap behavior (delete at the smaller id,
    /// append the larger id's body there) instead of the corrected
    /// both-endpoints exchange
    pub swap_bug: bool,
    /// PRNG seed; deme `i` derives its stream from `seed + i`
    pub seed: u64,
}

impl Config {
    /// Parses `key value` lines. Blank lines and `#` comments are skipped;
    /// unknown keys log a warning and are ignored. A malformed value for a
    /// known key is an error.
    pub fn parse_str(&mut self, text: &str) -> Result<()> {
        for raw in text.lines() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (key, value) = match line.split_once(char::is_whitespace) {
                Some((k, v)) => (k.trim(), v.trim()),
                None => (line, ""),
            };
            self.set(key, value)?;
        }
        Ok(())
    }

    /// Applies a single `key value` setting.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "generations" => self.ga.generations = parse(key, value)?,
            "popsize" => self.ga.pop_size = parse(key, value)?,
            "mutp" => self.ga.mut_rate = parse(key, value)?,
            "promut" => self.ga.pro_mut = parse(key, value)?,
            "subatom-mutp" => self.ga.subatom_mut_rate = parse(key, value)?,
            "subatom-constp" => self.ga.subatom_const_rate = parse(key, value)?,
            "crossp" => self.ga.cross_rate = parse(key, value)?,
            "tournament-k" => self.ga.tournament_k = parse(key, value)?,
            "tournament-p" => self.ga.tournament_p = parse(key, value)?,
            "num-comps" => self.distributed.num_comps = parse(key, value)?,
            "split-search" => self.distributed.split_search = parse_flag(key, value)?,
            "diversity-selection" => {
                self.distributed.diversity_selection = parse_flag(key, value)?
            }
            "variants-exchanged" => self.distributed.variants_exchanged = parse(key, value)?,
            "gen-per-exchange" => self.distributed.gen_per_exchange = parse(key, value)?,
            "semantic-check" => {
                self.semantic_check = match value {
                    "none" => SemanticCheck::None,
                    "scope" => SemanticCheck::Scope,
                    other => {
                        return Err(RepairError::InvalidArgument(format!(
                            "semantic-check must be `none` or `scope`, got `{}`",
                            other
                        )))
                    }
                }
            }
            "use-subatoms" => self.use_subatoms = parse_flag(key, value)?,
            "uniq-coverage" => self.uniq_coverage = parse_flag(key, value)?,
            "multithread-coverage" => self.multithread_coverage = parse_flag(key, value)?,
            "swap-bug" => self.swap_bug = parse_flag(key, value)?,
            "seed" => self.seed = parse(key, value)?,
            unknown => {
                warn!(key = unknown, "ignoring unknown configuration key");
            }
        }
        Ok(())
    }
}

fn parse<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value.parse().map_err(|_| {
        RepairError::InvalidArgument(format!("bad value `{}` for key `{}`", value, key))
    })
}

/// Bare flags count as enabled; `true`/`false` spell it out.
fn parse_flag(key: &str, value: &str) -> Result<bool> {
    match value {
        "" | "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        other => Err(RepairError::InvalidArgument(format!(
            "bad value `{}` for flag `{}`",
            other, key
        ))),
    }
}
