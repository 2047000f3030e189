// Wed Feb 4 2026 - Alex

use crate::memory::{Address, HostStore, MemoryError};
use crate::symbol::SymbolPath;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RttiError {
    #[error("Malformed type info at {address}: expected {expected}, found {found}")]
    Malformed {
        address: Address,
        expected: String,
        found: String,
    },
    #[error("Negative base offset {offset} at {address}")]
    NegativeOffset { address: Address, offset: i64 },
    #[error("Class hierarchy of {0} contains a cycle")]
    CyclicHierarchy(SymbolPath),
    #[error("No class type info at {0}")]
    NotAClass(Address),
    #[error(transparent)]
    Memory(#[from] MemoryError),
}

/// Builds a diagnostic message for an invalid type-info candidate: the
/// address, the identifier mismatch, the potential typename, and any
/// relocation at the address. Enough context to triage obfuscated RTTI.
pub fn describe_invalid(
    store: &dyn HostStore,
    address: Address,
    expected: &str,
    found: &str,
) -> String {
    let mut message = format!(
        "The type info at {} is not valid\nExpected {} to match identifier {}\n",
        address, found, expected
    );
    let name_addr = address + store.pointer_size() as u64;
    if let Ok(name_ptr) = store.read_ptr(name_addr) {
        if let Ok(name) = store.read_c_string(name_ptr, 256) {
            message.push_str(&format!("Potential typename: {}\n", name));
        }
    }
    if let Some(reloc) = store.relocation_at(address) {
        message.push_str(&format!(
            "Relocation at {} to symbol {}",
            reloc.address, reloc.symbol
        ));
    }
    message
}
