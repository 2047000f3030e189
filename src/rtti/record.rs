// Wed Feb 4 2026 - Alex

use crate::memory::Address;
use bitflags::bitflags;
use std::fmt;

bitflags! {
    /// Normalized base-class attributes. VIRTUAL and PUBLIC are shared
    /// across ABI families; the remaining bits carry the MSVC Base Class
    /// Descriptor attributes that affect placement.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct BaseAttributes: u32 {
        const VIRTUAL           = 0x01;
        const PUBLIC            = 0x02;
        const NOT_VISIBLE       = 0x04;
        const AMBIGUOUS         = 0x08;
        const INDIRECT_VIRTUAL  = 0x10;
        const NON_POLYMORPHIC   = 0x20;
    }
}

/// The MSVC "resolve through the virtual base table" marker. `vbtable_offset`
/// is the displacement of the vbptr within the object; `vbtable_index` is the
/// byte offset of this base's displacement entry inside the vbtable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VirtualDisplacement {
    pub vbtable_offset: i32,
    pub vbtable_index: i32,
}

/// One decoded base-class entry, normalized across ABI families.
/// `offset` is relative to the start of the derived class's sub-object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseDescriptor {
    /// Address of the base's type-info structure. Null for external bases
    /// known only through a relocation symbol.
    pub base_type: Address,
    /// Raw type name of the base, as encoded in the binary.
    pub base_name: String,
    pub offset: i64,
    pub attributes: BaseAttributes,
    /// Present when the effective offset must be resolved through the
    /// instance's virtual base table at layout time.
    pub virtual_disp: Option<VirtualDisplacement>,
}

impl BaseDescriptor {
    pub fn is_virtual(&self) -> bool {
        self.attributes.contains(BaseAttributes::VIRTUAL)
    }

    pub fn is_public(&self) -> bool {
        self.attributes.contains(BaseAttributes::PUBLIC)
    }
}

/// Flags on an Itanium `__vmi_class_type_info`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InheritanceFlags {
    pub non_diamond_repeat: bool,
    pub diamond_shaped: bool,
}

impl InheritanceFlags {
    pub const NON_DIAMOND_REPEAT: u32 = 0x1;
    pub const DIAMOND_SHAPED: u32 = 0x2;

    pub fn from_raw(raw: u32) -> Self {
        Self {
            non_diamond_repeat: (raw & Self::NON_DIAMOND_REPEAT) != 0,
            diamond_shaped: (raw & Self::DIAMOND_SHAPED) != 0,
        }
    }
}

/// The classified variant of a type-info structure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeInfoKind {
    /// The ABI's own `type_info` root class.
    Class,
    /// A class with no base classes.
    NoBase,
    /// Single non-virtual public inheritance; the one base sits at offset 0.
    SingleBase { base: BaseDescriptor },
    /// Multiple and/or virtual inheritance.
    MultiBase {
        flags: InheritanceFlags,
        bases: Vec<BaseDescriptor>,
    },
    Fundamental,
    Pointer,
    PointerToMember,
    /// Not a recognizable type-info structure. Expected and cheap.
    Unknown,
}

impl TypeInfoKind {
    /// True for kinds that describe a class type with a recoverable layout.
    pub fn is_class(&self) -> bool {
        matches!(
            self,
            Self::NoBase | Self::SingleBase { .. } | Self::MultiBase { .. }
        )
    }
}

/// A classified type-info structure. Immutable once created; `address` plus
/// `kind` identify it within one analyzed binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeInfoRecord {
    pub address: Address,
    pub kind: TypeInfoKind,
    /// Raw encoded type name (Itanium mangled fragment or MSVC decorated name).
    pub type_name: String,
}

impl TypeInfoRecord {
    pub fn unknown(address: Address) -> Self {
        Self {
            address,
            kind: TypeInfoKind::Unknown,
            type_name: String::new(),
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self.kind, TypeInfoKind::Unknown)
    }

    /// The direct base list in declaration order. Empty for non-class kinds.
    pub fn bases(&self) -> &[BaseDescriptor] {
        match &self.kind {
            TypeInfoKind::SingleBase { base } => std::slice::from_ref(base),
            TypeInfoKind::MultiBase { bases, .. } => bases,
            _ => &[],
        }
    }
}

impl fmt::Display for TypeInfoRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} `{}` @ {}", self.kind_name(), self.type_name, self.address)
    }
}

impl TypeInfoRecord {
    fn kind_name(&self) -> &'static str {
        match self.kind {
            TypeInfoKind::Class => "Class",
            TypeInfoKind::NoBase => "NoBase",
            TypeInfoKind::SingleBase { .. } => "SingleBase",
            TypeInfoKind::MultiBase { .. } => "MultiBase",
            TypeInfoKind::Fundamental => "Fundamental",
            TypeInfoKind::Pointer => "Pointer",
            TypeInfoKind::PointerToMember => "PointerToMember",
            TypeInfoKind::Unknown => "Unknown",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inheritance_flags() {
        let flags = InheritanceFlags::from_raw(0);
        assert!(!flags.non_diamond_repeat);
        assert!(!flags.diamond_shaped);

        let flags = InheritanceFlags::from_raw(
            InheritanceFlags::NON_DIAMOND_REPEAT | InheritanceFlags::DIAMOND_SHAPED,
        );
        assert!(flags.non_diamond_repeat);
        assert!(flags.diamond_shaped);
    }

    #[test]
    fn test_single_base_slice() {
        let base = BaseDescriptor {
            base_type: Address::new(0x1000),
            base_name: "4Base".to_string(),
            offset: 0,
            attributes: BaseAttributes::PUBLIC,
            virtual_disp: None,
        };
        let record = TypeInfoRecord {
            address: Address::new(0x2000),
            kind: TypeInfoKind::SingleBase { base: base.clone() },
            type_name: "7Derived".to_string(),
        };
        assert_eq!(record.bases(), &[base]);
        assert!(record.kind.is_class());
        assert!(TypeInfoRecord::unknown(Address::zero()).bases().is_empty());
    }
}
