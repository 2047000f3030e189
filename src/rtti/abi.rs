// Wed Feb 4 2026 - Alex

use crate::memory::{Address, HostStore};
use crate::rtti::TypeInfoRecord;

/// One ABI family's classification and decoding capability. Implementations
/// are mutually exclusive strategies selected when the analysis starts;
/// supporting a new ABI means adding an implementation, not touching
/// existing ones.
pub trait RttiAbi: Send + Sync {
    fn name(&self) -> &'static str;

    /// Classifies the structure at `address`. Returns a record with kind
    /// `Unknown` when any structural precondition fails; arbitrary data is
    /// an expected input, never an error.
    fn identify(&self, store: &dyn HostStore, address: Address) -> TypeInfoRecord;

    /// The linkage identifier handed to the demangling service for this
    /// record's type name.
    fn linkage_name(&self, record: &TypeInfoRecord) -> String;
}
