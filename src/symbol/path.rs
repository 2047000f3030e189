// Tue Feb 3 2026 - Alex

use serde::{Deserialize, Serialize};
use std::fmt;

/// A namespace-qualified symbol path, e.g. `N::Derived`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct SymbolPath {
    components: Vec<String>,
}

impl SymbolPath {
    pub fn new(components: Vec<String>) -> Self {
        Self { components }
    }

    /// A single-component path with no enclosing namespace.
    pub fn flat(name: &str) -> Self {
        Self {
            components: vec![name.to_string()],
        }
    }

    pub fn parse(path: &str) -> Self {
        Self {
            components: path.split("::").map(str::to_string).collect(),
        }
    }

    /// The unqualified type name (last component).
    pub fn name(&self) -> &str {
        self.components.last().map(String::as_str).unwrap_or("")
    }

    pub fn namespace(&self) -> &[String] {
        &self.components[..self.components.len().saturating_sub(1)]
    }

    pub fn components(&self) -> &[String] {
        &self.components
    }

    pub fn is_flat(&self) -> bool {
        self.components.len() <= 1
    }
}

impl fmt::Display for SymbolPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.components.join("::"))
    }
}

impl From<String> for SymbolPath {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl From<SymbolPath> for String {
    fn from(path: SymbolPath) -> Self {
        path.to_string()
    }
}

/// The structured result of demangling a linkage name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructuredName {
    pub namespace: Vec<String>,
    pub name: String,
}

impl StructuredName {
    pub fn into_path(self) -> SymbolPath {
        let mut components = self.namespace;
        components.push(self.name);
        SymbolPath::new(components)
    }
}
