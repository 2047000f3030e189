// Mon Feb 2 2026 - Alex

use crate::memory::{Address, MemoryError};

/// A relocation entry: an address patched by the loader, tagged with the
/// symbol it resolves to. Used when a referenced type_info lives in another
/// module and only its symbol name is present in this image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relocation {
    pub address: Address,
    pub symbol: String,
}

/// Read access to the host program store plus the narrow write surface the
/// analysis needs. Reads must be safe under concurrent access; writes are
/// scoped through [`StoreEdit`] and become visible only on commit.
pub trait HostStore: Send + Sync {
    fn read_bytes(&self, addr: Address, len: usize) -> Result<Vec<u8>, MemoryError>;
    fn is_readable(&self, addr: Address, len: usize) -> bool;
    fn pointer_size(&self) -> usize;
    fn image_base(&self) -> Address;
    fn readable_ranges(&self) -> Vec<(Address, u64)>;
    fn relocation_at(&self, addr: Address) -> Option<Relocation>;
    fn begin_edit(&self, label: &str) -> Box<dyn StoreEdit + '_>;

    fn read_u8(&self, addr: Address) -> Result<u8, MemoryError> {
        Ok(self.read_bytes(addr, 1)?[0])
    }

    fn read_u32(&self, addr: Address) -> Result<u32, MemoryError> {
        let bytes = self.read_bytes(addr, 4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn read_i32(&self, addr: Address) -> Result<i32, MemoryError> {
        Ok(self.read_u32(addr)? as i32)
    }

    fn read_u64(&self, addr: Address) -> Result<u64, MemoryError> {
        let bytes = self.read_bytes(addr, 8)?;
        Ok(u64::from_le_bytes([
            bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
        ]))
    }

    /// Reads a pointer-sized little-endian value.
    fn read_ptr(&self, addr: Address) -> Result<Address, MemoryError> {
        match self.pointer_size() {
            4 => Ok(Address::new(self.read_u32(addr)? as u64)),
            _ => Ok(Address::new(self.read_u64(addr)?)),
        }
    }

    /// Resolves an image-relative 32-bit reference (MSVC x64 RTTI encoding).
    fn read_rva(&self, addr: Address) -> Result<Address, MemoryError> {
        let rva = self.read_u32(addr)?;
        Ok(self.image_base() + rva as u64)
    }

    /// Reads a NUL-terminated string, bounded to keep runaway reads cheap.
    fn read_c_string(&self, addr: Address, max_len: usize) -> Result<String, MemoryError> {
        let mut out = Vec::new();
        let mut cursor = addr;
        while out.len() < max_len {
            let byte = self
                .read_u8(cursor)
                .map_err(|_| MemoryError::UnreadableString(addr.as_u64()))?;
            if byte == 0 {
                return String::from_utf8(out)
                    .map_err(|_| MemoryError::UnreadableString(addr.as_u64()));
            }
            out.push(byte);
            cursor = cursor + 1;
        }
        Err(MemoryError::UnreadableString(addr.as_u64()))
    }
}

/// An all-or-nothing modification scope against the host store. Dropping an
/// edit without committing discards every recorded change.
pub trait StoreEdit {
    /// Materializes a discovered string (e.g. a type name the analysis had
    /// to read out of raw bytes) in the host store.
    fn record_string(&mut self, addr: Address, value: &str);
    /// Registers a newly recovered class by its qualified path.
    fn record_class(&mut self, path: &str);
    fn commit(self: Box<Self>);
}
