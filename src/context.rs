//! Per-session core context
//!
//! Everything a variant needs to interpret its edit history lives here:
//! the frozen [`AtomStore`], the session [`Config`], and the registry of
//! named code templates. One context is built per repair session and
//! shared by every variant of every deme; there is no process-level
//! mutable state.

use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::ast::{AtomId, Stmt};
use crate::config::Config;
use crate::error::{RepairError, Result};
use crate::store::AtomStore;

/// Instantiates a statement from donor bindings.
///
/// A template receives the store and its `(hole name, donor sid)` bindings
/// and produces the statement body that replaces the destination; `None`
/// means the bindings do not fit this template.
pub type TemplateFn =
    Arc<dyn Fn(&AtomStore, &[(String, AtomId)]) -> Option<Stmt> + Send + Sync>;

/// Shared session state: store, configuration, templates
pub struct CoreContext {
    store: AtomStore,
    config: Config,
    templates: FxHashMap<String, TemplateFn>,
}

impl CoreContext {
    /// Creates a context from a loaded store and a configuration.
    pub fn new(store: AtomStore, config: Config) -> Self {
        Self {
            store,
            config,
            templates: FxHashMap::default(),
        }
    }

    /// Convenience: builds the context and wraps it for sharing.
    pub fn shared(store: AtomStore, config: Config) -> Arc<Self> {
        Arc::new(Self::new(store, config))
    }

    /// The frozen program.
    pub fn store(&self) -> &AtomStore {
        &self.store
    }

    /// The session configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Registers a named template. Must happen before the context is
    /// shared; replacing an existing name is an error.
    pub fn register_template(&mut self, name: &str, template: TemplateFn) -> Result<()> {
        if self.templates.contains_key(name) {
            return Err(RepairError::InvalidArgument(format!(
                "template `{}` is already registered",
                name
            )));
        }
        self.templates.insert(name.to_string(), template);
        Ok(())
    }

    /// Looks up a registered template.
    pub fn template(&self, name: &str) -> Option<&TemplateFn> {
        self.templates.get(name)
    }
}

impl std::fmt::Debug for CoreContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreContext")
            .field("max_atom", &self.store.max_atom())
            .field("templates", &self.templates.len())
            .finish()
    }
}
