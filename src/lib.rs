// Mon Feb 2 2026 - Alex

//! Recovery of C++ class hierarchies from RTTI left in compiled binaries.
//!
//! Given read access to a loaded image, the analysis classifies candidate
//! addresses as type-info structures (Itanium or MSVC encoding), decodes
//! their base-class lists, and rebuilds each class's composite layout:
//! which base sub-objects it contains and at which byte offsets, with
//! virtual bases represented exactly once.

pub mod class;
pub mod fixture;
pub mod memory;
pub mod rtti;
pub mod session;
pub mod symbol;
pub mod utils;

pub use class::{ClassTypeInfo, CompositeLayout, LayoutField, NameResolver};
pub use memory::{Address, CancelToken, HostStore, ImageStore, MemoryError, StoreScanner};
pub use rtti::{
    BaseAttributes, BaseDescriptor, ItaniumAbi, MsvcAbi, RttiAbi, RttiError, TypeInfoKind,
    TypeInfoRecord,
};
pub use session::AnalysisSession;
pub use symbol::{BuiltinDemangler, Demangler, SymbolPath};
