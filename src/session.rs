// Sun Feb 8 2026 - Alex

use crate::class::{ClassTypeInfo, CompositeLayout, LayoutBuilder, NameResolver};
use crate::memory::{Address, CancelToken, HostStore, MemoryError, StoreScanner};
use crate::rtti::{
    BaseDescriptor, RttiAbi, RttiError, TypeInfoKind, TypeInfoRecord, VirtualDisplacement,
};
use crate::symbol::{BuiltinDemangler, SymbolPath};
use crate::utils::logging::ScopedTimer;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// One analysis of one binary: a host store, an ABI strategy, and the caches
/// that make classification and recovery idempotent. Identifying the same
/// address twice returns the same record; recovering the same class twice
/// returns the same model and layout.
pub struct AnalysisSession {
    store: Arc<dyn HostStore>,
    abi: Arc<dyn RttiAbi>,
    resolver: NameResolver,
    records: RwLock<HashMap<Address, Arc<TypeInfoRecord>>>,
    classes: RwLock<HashMap<SymbolPath, Arc<ClassTypeInfo>>>,
    vbtables: RwLock<HashMap<SymbolPath, Address>>,
}

impl AnalysisSession {
    pub fn new(store: Arc<dyn HostStore>, abi: Arc<dyn RttiAbi>) -> Self {
        Self {
            store,
            abi,
            resolver: NameResolver::new(Arc::new(BuiltinDemangler)),
            records: RwLock::new(HashMap::new()),
            classes: RwLock::new(HashMap::new()),
            vbtables: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_demangler(mut self, demangler: Arc<dyn crate::symbol::Demangler>) -> Self {
        self.resolver = NameResolver::new(demangler);
        self
    }

    pub fn store(&self) -> &dyn HostStore {
        self.store.as_ref()
    }

    pub fn abi(&self) -> &dyn RttiAbi {
        self.abi.as_ref()
    }

    /// Classifies the structure at `address`, caching the result. Arbitrary
    /// data yields an `Unknown` record, never an error.
    pub fn identify(&self, address: Address) -> Arc<TypeInfoRecord> {
        if let Some(record) = self.records.read().get(&address) {
            return record.clone();
        }
        let record = Arc::new(self.abi.identify(self.store.as_ref(), address));
        // First insertion wins so concurrent callers observe one record.
        self.records
            .write()
            .entry(address)
            .or_insert(record)
            .clone()
    }

    /// Recovers the class model for the type info at `address`.
    pub fn class_at(&self, address: Address) -> Result<Arc<ClassTypeInfo>, RttiError> {
        let record = self.identify(address);
        if !record.kind.is_class() {
            return Err(RttiError::NotAClass(address));
        }
        Ok(self.class_from_record(&record))
    }

    pub fn class_by_path(&self, path: &SymbolPath) -> Option<Arc<ClassTypeInfo>> {
        self.classes.read().get(path).cloned()
    }

    fn class_from_record(&self, record: &TypeInfoRecord) -> Arc<ClassTypeInfo> {
        let path = self.resolver.resolve(&self.abi.linkage_name(record));
        if let Some(class) = self.classes.read().get(&path) {
            return class.clone();
        }

        let class = Arc::new(ClassTypeInfo::new(
            path.clone(),
            record.address,
            record.type_name.clone(),
            record.bases().to_vec(),
        ));
        let class = self
            .classes
            .write()
            .entry(path.clone())
            .or_insert(class)
            .clone();

        let mut edit = self.store.begin_edit("register class");
        edit.record_class(&path.to_string());
        edit.commit();
        log::debug!("Recovered class {}", class);
        class
    }

    /// Resolves the class model behind one base descriptor. A base whose
    /// type info is not resident (external module, or a descriptor with no
    /// hierarchy attached) resolves by name, falling back to a stub model
    /// so the derived layout can still be built.
    pub(crate) fn class_for_base(
        &self,
        base: &BaseDescriptor,
    ) -> Result<Arc<ClassTypeInfo>, RttiError> {
        if !base.base_type.is_null() {
            let record = self.identify(base.base_type);
            if record.kind.is_class() {
                return Ok(self.class_from_record(&record));
            }
        }

        let named = TypeInfoRecord {
            address: base.base_type,
            kind: TypeInfoKind::Class,
            type_name: base.base_name.clone(),
        };
        let path = self.resolver.resolve(&self.abi.linkage_name(&named));
        if let Some(class) = self.class_by_path(&path) {
            return Ok(class);
        }

        log::debug!("Base {} has no resident type info, using a stub", path);
        let class = Arc::new(ClassTypeInfo::stub(path.clone()));
        Ok(self
            .classes
            .write()
            .entry(path)
            .or_insert(class)
            .clone())
    }

    /// Builds (or fetches the already-built) layout for `class`.
    pub fn build_layout<'c>(
        &self,
        class: &'c ClassTypeInfo,
    ) -> Result<&'c CompositeLayout, RttiError> {
        LayoutBuilder::new(self).build(class)
    }

    /// Registers the virtual base table of a class, enabling exact virtual
    /// base placement for descriptors that carry vbtable displacements.
    pub fn register_vbtable(&self, path: SymbolPath, table: Address) {
        self.vbtables.write().insert(path, table);
    }

    /// The effective displacement of a virtual base of `owner`: the vbptr
    /// offset plus the entry read from the registered vbtable. `None` when
    /// no table is registered or the entry is unreadable.
    pub(crate) fn vbtable_displacement(
        &self,
        owner: &SymbolPath,
        vd: &VirtualDisplacement,
    ) -> Option<i64> {
        let table = *self.vbtables.read().get(owner)?;
        let entry = table.offset(vd.vbtable_index as i64);
        let slot = self.store.read_i32(entry).ok()?;
        Some(vd.vbtable_offset as i64 + slot as i64)
    }

    /// Locates a type info by its encoded type name: finds the name string,
    /// then the pointer-aligned references to it, and classifies the
    /// enclosing candidate structure. Cancellable between scan blocks.
    pub fn find_type_info(
        &self,
        type_name: &str,
        token: &CancelToken,
    ) -> Result<Option<Address>, MemoryError> {
        let _timer = ScopedTimer::new(&format!("find_type_info `{}`", type_name));
        let scanner = StoreScanner::new(self.store.as_ref());
        let pointer_size = self.store.pointer_size() as u64;

        for string_addr in scanner.find_string(type_name, token)? {
            for reference in scanner.find_references(string_addr, token)? {
                token.checkpoint()?;
                // The name pointer is the second field, so the candidate
                // starts one pointer earlier.
                let Some(candidate) = reference.checked_sub(pointer_size) else {
                    continue;
                };
                let record = self.identify(candidate);
                if !record.is_unknown() {
                    log::info!("Found type info for `{}` at {}", type_name, candidate);
                    return Ok(Some(candidate));
                }
            }
        }
        Ok(None)
    }

    /// Every class recovered so far, in no particular order.
    pub fn recovered_classes(&self) -> Vec<Arc<ClassTypeInfo>> {
        self.classes.read().values().cloned().collect()
    }
}
