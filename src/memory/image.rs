// Mon Feb 2 2026 - Alex

use crate::memory::{Address, HostStore, MemoryError, Relocation, StoreEdit};
use goblin::elf::Elf;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// An in-memory image of the analyzed binary. Backs the [`HostStore`]
/// interface with a flat byte buffer plus the relocation table, and keeps
/// materialized strings / registered classes behind locks so concurrent
/// analyses can share one store.
pub struct ImageStore {
    base: Address,
    data: Vec<u8>,
    pointer_size: usize,
    relocations: HashMap<u64, Relocation>,
    strings: RwLock<HashMap<u64, String>>,
    classes: RwLock<Vec<String>>,
}

impl ImageStore {
    pub fn new(base: Address, size: usize) -> Self {
        Self {
            base,
            data: vec![0; size],
            pointer_size: 8,
            relocations: HashMap::new(),
            strings: RwLock::new(HashMap::new()),
            classes: RwLock::new(Vec::new()),
        }
    }

    pub fn with_pointer_size(mut self, pointer_size: usize) -> Self {
        self.pointer_size = pointer_size;
        self
    }

    /// Loads the loadable segments of an ELF file into a contiguous image.
    pub fn load_elf<P: AsRef<Path>>(path: P) -> Result<Self, MemoryError> {
        let bytes = fs::read(path.as_ref())?;
        let elf = Elf::parse(&bytes)
            .map_err(|e| MemoryError::BinaryParseError(format!("Failed to parse ELF: {}", e)))?;

        let loads: Vec<_> = elf
            .program_headers
            .iter()
            .filter(|ph| ph.p_type == goblin::elf::program_header::PT_LOAD)
            .collect();
        if loads.is_empty() {
            return Err(MemoryError::BinaryParseError(
                "No loadable segments".to_string(),
            ));
        }

        let low = loads.iter().map(|ph| ph.p_vaddr).min().unwrap_or(0);
        let high = loads
            .iter()
            .map(|ph| ph.p_vaddr + ph.p_memsz)
            .max()
            .unwrap_or(0);
        let mut image = Self::new(Address::new(low), (high - low) as usize)
            .with_pointer_size(if elf.is_64 { 8 } else { 4 });

        for ph in &loads {
            let start = (ph.p_vaddr - low) as usize;
            let end = start + ph.p_filesz as usize;
            let file_end = (ph.p_offset + ph.p_filesz) as usize;
            if end <= image.data.len() && file_end <= bytes.len() {
                image.data[start..end]
                    .copy_from_slice(&bytes[ph.p_offset as usize..file_end]);
            }
        }

        for reloc in elf.dynrelas.iter().chain(elf.pltrelocs.iter()) {
            if let Some(sym) = elf.dynsyms.get(reloc.r_sym) {
                if let Some(name) = elf.dynstrtab.get_at(sym.st_name) {
                    if !name.is_empty() {
                        image.add_relocation(Address::new(reloc.r_offset), name);
                    }
                }
            }
        }

        log::debug!(
            "Loaded ELF image: base {:#x}, {} bytes, {} relocations",
            low,
            image.data.len(),
            image.relocations.len()
        );
        Ok(image)
    }

    pub fn add_relocation(&mut self, addr: Address, symbol: &str) {
        self.relocations.insert(
            addr.as_u64(),
            Relocation {
                address: addr,
                symbol: symbol.to_string(),
            },
        );
    }

    fn offset_of(&self, addr: Address, len: usize) -> Option<usize> {
        let off = addr.as_u64().checked_sub(self.base.as_u64())? as usize;
        (off + len <= self.data.len()).then_some(off)
    }

    pub fn write_bytes(&mut self, addr: Address, bytes: &[u8]) {
        if let Some(off) = self.offset_of(addr, bytes.len()) {
            self.data[off..off + bytes.len()].copy_from_slice(bytes);
        }
    }

    pub fn write_u32(&mut self, addr: Address, value: u32) {
        self.write_bytes(addr, &value.to_le_bytes());
    }

    pub fn write_u64(&mut self, addr: Address, value: u64) {
        self.write_bytes(addr, &value.to_le_bytes());
    }

    pub fn write_ptr(&mut self, addr: Address, value: Address) {
        match self.pointer_size {
            4 => self.write_u32(addr, value.as_u64() as u32),
            _ => self.write_u64(addr, value.as_u64()),
        }
    }

    /// Writes a NUL-terminated string.
    pub fn write_str(&mut self, addr: Address, value: &str) {
        self.write_bytes(addr, value.as_bytes());
        self.write_bytes(addr + value.len() as u64, &[0]);
    }

    pub fn materialized_string(&self, addr: Address) -> Option<String> {
        self.strings.read().get(&addr.as_u64()).cloned()
    }

    pub fn registered_classes(&self) -> Vec<String> {
        self.classes.read().clone()
    }
}

impl HostStore for ImageStore {
    fn read_bytes(&self, addr: Address, len: usize) -> Result<Vec<u8>, MemoryError> {
        let off = self
            .offset_of(addr, len)
            .ok_or(MemoryError::OutOfBounds(addr.as_u64()))?;
        Ok(self.data[off..off + len].to_vec())
    }

    fn is_readable(&self, addr: Address, len: usize) -> bool {
        self.offset_of(addr, len).is_some()
    }

    fn pointer_size(&self) -> usize {
        self.pointer_size
    }

    fn image_base(&self) -> Address {
        self.base
    }

    fn readable_ranges(&self) -> Vec<(Address, u64)> {
        vec![(self.base, self.data.len() as u64)]
    }

    fn relocation_at(&self, addr: Address) -> Option<Relocation> {
        self.relocations.get(&addr.as_u64()).cloned()
    }

    fn begin_edit(&self, label: &str) -> Box<dyn StoreEdit + '_> {
        Box::new(ImageEdit {
            store: self,
            label: label.to_string(),
            strings: Vec::new(),
            classes: Vec::new(),
        })
    }
}

/// Buffered edit against an [`ImageStore`]. Changes are applied atomically on
/// commit; a dropped edit leaves no trace.
struct ImageEdit<'a> {
    store: &'a ImageStore,
    label: String,
    strings: Vec<(Address, String)>,
    classes: Vec<String>,
}

impl StoreEdit for ImageEdit<'_> {
    fn record_string(&mut self, addr: Address, value: &str) {
        self.strings.push((addr, value.to_string()));
    }

    fn record_class(&mut self, path: &str) {
        self.classes.push(path.to_string());
    }

    fn commit(self: Box<Self>) {
        if !self.strings.is_empty() {
            let mut strings = self.store.strings.write();
            for (addr, value) in self.strings {
                strings.entry(addr.as_u64()).or_insert(value);
            }
        }
        if !self.classes.is_empty() {
            let mut classes = self.store.classes.write();
            for path in self.classes {
                if !classes.contains(&path) {
                    classes.push(path);
                }
            }
        }
        log::trace!("Committed edit: {}", self.label);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_write_roundtrip() {
        let mut image = ImageStore::new(Address::new(0x1000), 0x100);
        image.write_u64(Address::new(0x1008), 0xdead_beef);
        image.write_str(Address::new(0x1020), "5Shape");

        assert_eq!(image.read_u64(Address::new(0x1008)).unwrap(), 0xdead_beef);
        assert_eq!(
            image.read_c_string(Address::new(0x1020), 64).unwrap(),
            "5Shape"
        );
        assert!(image.read_u64(Address::new(0x2000)).is_err());
        assert!(!image.is_readable(Address::new(0xfff), 8));
    }

    #[test]
    fn test_edit_commit_and_drop() {
        let image = ImageStore::new(Address::new(0x1000), 0x100);

        let mut edit = image.begin_edit("register");
        edit.record_class("N::Derived");
        edit.commit();
        assert_eq!(image.registered_classes(), vec!["N::Derived".to_string()]);

        // Dropped without commit: nothing becomes visible.
        let mut edit = image.begin_edit("aborted");
        edit.record_class("N::Other");
        drop(edit);
        assert_eq!(image.registered_classes(), vec!["N::Derived".to_string()]);
    }
}
