// Wed Feb 4 2026 - Alex

//! Type-info classification and base-list decoding for the supported
//! ABI families.

pub mod abi;
pub mod error;
pub mod itanium;
pub mod msvc;
pub mod record;

pub use abi::RttiAbi;
pub use error::{describe_invalid, RttiError};
pub use itanium::{decode_offset_flags, ItaniumAbi};
pub use msvc::MsvcAbi;
pub use record::{
    BaseAttributes, BaseDescriptor, InheritanceFlags, TypeInfoKind, TypeInfoRecord,
    VirtualDisplacement,
};
