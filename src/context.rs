//! Context data sources and the factory that resolves them by name

use crate::config::ContextSpec;
use crate::data::DuckDbContext;
use crate::error::Result;
use indexmap::IndexMap;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

/// Column name to value for a single row
pub type RowData = HashMap<String, String>;

/// Row key to row data for one namespace in one context
pub type NamespaceData = HashMap<String, RowData>;

/// Shared cancellation flag handed to data source fetches
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Return `Err(Cancelled)` once the token has fired
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(crate::error::ReconError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// One of the two datasets being reconciled.
///
/// `namespace_data` returns `Ok(None)` when the namespace does not exist in
/// this context. Long fetches should poll `cancel` and bail out with
/// `ReconError::Cancelled` once it fires.
pub trait ContextDataSource: Send + Sync {
    fn name(&self) -> &str;

    fn namespace_data(&self, namespace: &str, cancel: &CancelToken) -> Result<Option<NamespaceData>>;
}

/// Resolves a context name into a data source
pub trait ContextFactory: Send + Sync {
    fn resolve(&self, name: &str) -> Option<Arc<dyn ContextDataSource>>;
}

/// Context backed by data held in memory
#[derive(Debug, Clone, Default)]
pub struct InMemoryContext {
    name: String,
    namespaces: HashMap<String, NamespaceData>,
}

impl InMemoryContext {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespaces: HashMap::new(),
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>, data: NamespaceData) -> Self {
        self.insert_namespace(namespace, data);
        self
    }

    pub fn insert_namespace(&mut self, namespace: impl Into<String>, data: NamespaceData) {
        self.namespaces.insert(namespace.into(), data);
    }
}

impl ContextDataSource for InMemoryContext {
    fn name(&self) -> &str {
        &self.name
    }

    fn namespace_data(&self, namespace: &str, cancel: &CancelToken) -> Result<Option<NamespaceData>> {
        cancel.check()?;
        Ok(self.namespaces.get(namespace).cloned())
    }
}

/// Default context factory: explicitly registered instances plus
/// DuckDB-backed contexts built from configuration
#[derive(Default)]
pub struct ContextRegistry {
    registered: RwLock<HashMap<String, Arc<dyn ContextDataSource>>>,
    specs: IndexMap<String, ContextSpec>,
}

impl ContextRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from configured context specs
    pub fn from_specs(specs: IndexMap<String, ContextSpec>) -> Self {
        Self {
            registered: RwLock::new(HashMap::new()),
            specs,
        }
    }

    /// Register a ready-made context under its own name
    pub fn register(&self, context: Arc<dyn ContextDataSource>) {
        let name = context.name().to_string();
        self.registered
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(name, context);
    }
}

impl ContextFactory for ContextRegistry {
    fn resolve(&self, name: &str) -> Option<Arc<dyn ContextDataSource>> {
        if let Some(context) = self
            .registered
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(name)
        {
            return Some(Arc::clone(context));
        }

        let spec = self.specs.get(name)?;
        match DuckDbContext::open(name, spec) {
            Ok(context) => {
                let context: Arc<dyn ContextDataSource> = Arc::new(context);
                self.register(Arc::clone(&context));
                Some(context)
            }
            Err(e) => {
                log::error!("Unable to open context '{}': {}", name, e);
                None
            }
        }
    }
}
