// Sat Feb 7 2026 - Alex

use crate::symbol::{Demangler, SymbolPath};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Turns encoded type names into namespace-qualified paths, caching results
/// per encoded name. Resolution is deterministic, so repeated lookups of the
/// same name always yield the same path.
pub struct NameResolver {
    demangler: Arc<dyn Demangler>,
    cache: RwLock<HashMap<String, SymbolPath>>,
}

impl NameResolver {
    pub fn new(demangler: Arc<dyn Demangler>) -> Self {
        Self {
            demangler,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Resolves a linkage identifier to a qualified path. When the demangler
    /// cannot interpret the name, the raw identifier becomes a flat path in
    /// the global namespace so analysis can continue.
    pub fn resolve(&self, linkage: &str) -> SymbolPath {
        if let Some(path) = self.cache.read().get(linkage) {
            return path.clone();
        }

        let path = match self.demangler.demangle(linkage) {
            Some(structured) => structured.into_path(),
            None => {
                log::warn!("Could not demangle `{}`, using raw name", linkage);
                SymbolPath::flat(linkage)
            }
        };

        self.cache.write().insert(linkage.to_string(), path.clone());
        path
    }
}
