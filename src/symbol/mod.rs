// Tue Feb 3 2026 - Alex

pub mod demangle;
pub mod path;

pub use demangle::{BuiltinDemangler, Demangler};
pub use path::{StructuredName, SymbolPath};
