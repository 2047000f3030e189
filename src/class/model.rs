// Sat Feb 7 2026 - Alex

use crate::class::CompositeLayout;
use crate::memory::Address;
use crate::rtti::BaseDescriptor;
use crate::symbol::SymbolPath;
use once_cell::sync::OnceCell;
use std::fmt;

/// A recovered class type: resolved name, direct base list, and the lazily
/// built layout. The layout slot fills exactly once; repeated build requests
/// observe the same value.
pub struct ClassTypeInfo {
    path: SymbolPath,
    address: Address,
    type_name: String,
    bases: Vec<BaseDescriptor>,
    layout: OnceCell<CompositeLayout>,
}

impl ClassTypeInfo {
    pub fn new(
        path: SymbolPath,
        address: Address,
        type_name: String,
        bases: Vec<BaseDescriptor>,
    ) -> Self {
        Self {
            path,
            address,
            type_name,
            bases,
            layout: OnceCell::new(),
        }
    }

    /// A class known only by name, with no resident type info. Stands in for
    /// bases that live in other modules.
    pub fn stub(path: SymbolPath) -> Self {
        let type_name = path.name().to_string();
        Self::new(path, Address::zero(), type_name, Vec::new())
    }

    pub fn path(&self) -> &SymbolPath {
        &self.path
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Direct bases in declaration order.
    pub fn bases(&self) -> &[BaseDescriptor] {
        &self.bases
    }

    pub fn is_root(&self) -> bool {
        self.bases.is_empty()
    }

    pub fn has_virtual_bases(&self) -> bool {
        self.bases.iter().any(|b| b.is_virtual())
    }

    /// The built layout, if one has been computed.
    pub fn layout(&self) -> Option<&CompositeLayout> {
        self.layout_slot().get()
    }

    pub(crate) fn layout_slot(&self) -> &OnceCell<CompositeLayout> {
        &self.layout
    }
}

impl fmt::Debug for ClassTypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassTypeInfo")
            .field("path", &self.path)
            .field("address", &self.address)
            .field("bases", &self.bases.len())
            .field("layout_built", &self.layout.get().is_some())
            .finish()
    }
}

impl fmt::Display for ClassTypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "class {} @ {}", self.path, self.address)
    }
}
