//! Tool registry: maps tool names and circuit DSLs to adapter instances.
//!
//! The registry is an explicitly constructed, immutable value passed to the
//! batch runner rather than ambient global state, so tests can swap in fake
//! adapters freely. Registration order is preserved and drives report order.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::adapters::{CircomspectAdapter, PicusAdapter, ToolAdapter, ZkfuzzAdapter};
use crate::model::Dsl;

/// Static identity and capabilities of one wrapped analyzer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolDescriptor {
    pub id: String,
    /// DSLs this tool can analyze.
    pub dsls: Vec<Dsl>,
    /// Per-invocation wall-clock limit used when the caller supplies none.
    pub default_timeout_secs: u64,
}

impl ToolDescriptor {
    pub fn new(id: &str, dsls: &[Dsl], default_timeout_secs: u64) -> Self {
        Self { id: id.to_string(), dsls: dsls.to_vec(), default_timeout_secs }
    }

    pub fn supports(&self, dsl: Dsl) -> bool {
        self.dsls.contains(&dsl)
    }

    pub fn default_timeout(&self) -> Duration {
        Duration::from_secs(self.default_timeout_secs)
    }
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("unknown tool '{0}'")]
    UnknownTool(String),
    #[error("tool '{tool}' does not support DSL '{dsl}'")]
    UnsupportedDsl { tool: String, dsl: Dsl },
}

/// Ordered table of registered adapters.
pub struct ToolRegistry {
    entries: Vec<Arc<dyn ToolAdapter>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    pub fn register<A: ToolAdapter + 'static>(&mut self, adapter: A) -> &mut Self {
        self.entries.push(Arc::new(adapter));
        self
    }

    /// Resolve one tool by name for the given DSL.
    ///
    /// Fails with [`RegistryError::UnknownTool`] when no descriptor matches
    /// the name, and with [`RegistryError::UnsupportedDsl`] when the tool
    /// exists but does not declare support for `dsl`.
    pub fn resolve(&self, name: &str, dsl: Dsl) -> Result<Arc<dyn ToolAdapter>, RegistryError> {
        let wanted = name.trim().to_ascii_lowercase();
        let adapter = self
            .entries
            .iter()
            .find(|a| a.descriptor().id == wanted)
            .ok_or_else(|| RegistryError::UnknownTool(name.trim().to_string()))?;
        if !adapter.descriptor().supports(dsl) {
            return Err(RegistryError::UnsupportedDsl {
                tool: adapter.descriptor().id.clone(),
                dsl,
            });
        }
        Ok(Arc::clone(adapter))
    }

    /// Every adapter supporting `dsl`, in registration order. Backs the
    /// `all` tool-selection keyword.
    pub fn resolve_all(&self, dsl: Dsl) -> Vec<Arc<dyn ToolAdapter>> {
        self.entries.iter().filter(|a| a.descriptor().supports(dsl)).cloned().collect()
    }

    /// Descriptors in registration order, for listings and error messages.
    pub fn descriptors(&self) -> Vec<&ToolDescriptor> {
        self.entries.iter().map(|a| a.descriptor()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Registry populated with the built-in adapters.
pub fn default_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(CircomspectAdapter::new());
    registry.register(PicusAdapter::new());
    registry.register(ZkfuzzAdapter::new());
    registry
}
