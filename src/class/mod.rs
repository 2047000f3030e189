// Sat Feb 7 2026 - Alex

//! The recovered class model: resolved names, base lists, and composite
//! layouts.

pub mod builder;
pub mod layout;
pub mod model;
pub mod resolver;

pub use builder::LayoutBuilder;
pub use layout::{CompositeLayout, LayoutField};
pub use model::ClassTypeInfo;
pub use resolver::NameResolver;
