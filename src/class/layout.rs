// Sat Feb 7 2026 - Alex

use crate::symbol::SymbolPath;
use serde::Serialize;
use std::fmt;

/// One placed base sub-object inside a recovered composite layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LayoutField {
    /// Field name, `super_{Base}` with an ordinal suffix on collision.
    pub name: String,
    /// Byte offset from the start of the most-derived object.
    pub offset: u64,
    /// Extent of the sub-object, excluding its own virtual bases.
    pub size: u64,
    /// Set when this field is a virtual base, keyed by the base's path.
    /// Virtual bases appear exactly once regardless of how many
    /// inheritance paths reach them.
    pub virtual_base: Option<SymbolPath>,
}

impl LayoutField {
    pub fn is_virtual_base(&self) -> bool {
        self.virtual_base.is_some()
    }

    pub fn end(&self) -> u64 {
        self.offset + self.size
    }
}

/// The recovered structural layout of one class: its base sub-objects at
/// their resolved byte offsets. Built at most once per class and immutable
/// afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompositeLayout {
    pub path: SymbolPath,
    /// Direct bases in declaration order, then hoisted virtual bases in
    /// discovery order.
    pub fields: Vec<LayoutField>,
    /// Extent excluding virtual bases.
    pub nonvirtual_size: u64,
    /// Full extent including virtual bases.
    pub size: u64,
}

impl CompositeLayout {
    pub fn field_named(&self, name: &str) -> Option<&LayoutField> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn field_at(&self, offset: u64) -> Option<&LayoutField> {
        self.fields.iter().find(|f| f.offset == offset)
    }

    pub fn virtual_bases(&self) -> impl Iterator<Item = &LayoutField> {
        self.fields.iter().filter(|f| f.is_virtual_base())
    }

    /// Returns the first pair of fields occupying overlapping byte ranges,
    /// if any. Zero-sized fields never overlap.
    pub fn find_overlap(&self) -> Option<(&LayoutField, &LayoutField)> {
        for (i, a) in self.fields.iter().enumerate() {
            for b in &self.fields[i + 1..] {
                if a.size == 0 || b.size == 0 {
                    continue;
                }
                if a.offset < b.end() && b.offset < a.end() {
                    return Some((a, b));
                }
            }
        }
        None
    }
}

impl fmt::Display for CompositeLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "struct {} {{ // size 0x{:x}", self.path, self.size)?;
        for field in &self.fields {
            writeln!(f, "    +0x{:04x} {} // 0x{:x} bytes", field.offset, field.name, field.size)?;
        }
        write!(f, "}}")
    }
}
