// Fri Feb 6 2026 - Alex

//! MSVC RTTI structures (64-bit images, image-relative 32-bit references).
//!
//! ```text
//! TypeDescriptor:           +0 type_info vftable ptr, +8 spare,
//!                           +16 decorated name ".?AVDerived@N@@"
//! CompleteObjectLocator:    +0 u32 signature, +4 u32 offset, +8 u32 cdOffset,
//!                           +12 rva TypeDescriptor, +16 rva HierarchyDescriptor
//! ClassHierarchyDescriptor: +0 u32 signature, +4 u32 attributes,
//!                           +8 u32 base count, +12 rva base array (of rvas)
//! BaseClassDescriptor:      +0 rva TypeDescriptor, +4 u32 contained bases,
//!                           +8 i32 mdisp, +12 i32 pdisp, +16 i32 vdisp,
//!                           +20 u32 attributes
//! ```
//!
//! The hierarchy array holds the class itself first, then every base, direct
//! and indirect, in depth-first order; `contained bases` gives the subtree
//! size so the direct base list can be recovered by skipping subtrees.

use crate::memory::{Address, HostStore};
use crate::rtti::error::{describe_invalid, RttiError};
use crate::rtti::{
    BaseAttributes, BaseDescriptor, InheritanceFlags, RttiAbi, TypeInfoKind, TypeInfoRecord,
    VirtualDisplacement,
};

const BCD_NOT_VISIBLE: u32 = 0x1;
const BCD_AMBIGUOUS: u32 = 0x2;
const BCD_PRIV_OR_PROT_BASE: u32 = 0x4;
const BCD_PRIV_OR_PROT_IN_COMPOBJ: u32 = 0x8;
const BCD_VBASE_OF_CONTAINED: u32 = 0x10;
const BCD_NONPOLYMORPHIC: u32 = 0x20;

const MAX_NAME_LEN: usize = 512;

/// Identifier and base-list decoder for the Visual C++ family. Classifies
/// Complete Object Locators (full hierarchy available) and bare Type
/// Descriptors (type identity only).
pub struct MsvcAbi {
    max_bases: u32,
}

impl MsvcAbi {
    pub fn new() -> Self {
        Self { max_bases: 64 }
    }

    pub fn with_max_bases(mut self, max_bases: u32) -> Self {
        self.max_bases = max_bases;
        self
    }

    /// Reads the decorated name out of a TypeDescriptor, validating the
    /// type_info vftable pointer on the way.
    fn descriptor_name(&self, store: &dyn HostStore, td: Address) -> Option<String> {
        let vftable = store.read_ptr(td).ok()?;
        if vftable.is_null() || !store.is_readable(vftable, store.pointer_size()) {
            return None;
        }
        let name_addr = td + 2 * store.pointer_size() as u64;
        let name = store.read_c_string(name_addr, MAX_NAME_LEN).ok()?;
        if !name.starts_with('.') || !name.bytes().all(|b| b.is_ascii_graphic()) {
            return None;
        }
        Some(name)
    }

    /// Attempts to classify `address` as a Complete Object Locator.
    fn identify_locator(&self, store: &dyn HostStore, address: Address) -> Option<TypeInfoRecord> {
        let signature = store.read_u32(address).ok()?;
        if signature > 1 {
            return None;
        }
        let td = store.read_rva(address + 12).ok()?;
        let type_name = self.descriptor_name(store, td)?;
        if !type_name.starts_with(".?A") {
            return None;
        }

        let chd = store.read_rva(address + 16).ok()?;
        let mut bases = match self.decode_hierarchy(store, chd, td) {
            Some(bases) => bases,
            None => {
                log::warn!(
                    "{}",
                    describe_invalid(store, address, "hierarchy descriptor", &type_name)
                );
                return None;
            }
        };

        let kind = match bases.len() {
            0 => TypeInfoKind::NoBase,
            1 if !bases[0].is_virtual() && bases[0].is_public() && bases[0].offset == 0 => {
                TypeInfoKind::SingleBase {
                    base: bases.remove(0),
                }
            }
            _ => TypeInfoKind::MultiBase {
                flags: InheritanceFlags::default(),
                bases,
            },
        };

        Some(TypeInfoRecord {
            address,
            kind,
            type_name,
        })
    }

    /// Decodes the Class Hierarchy Descriptor into the direct base list,
    /// skipping each direct base's contained subtree.
    fn decode_hierarchy(
        &self,
        store: &dyn HostStore,
        chd: Address,
        self_td: Address,
    ) -> Option<Vec<BaseDescriptor>> {
        let signature = store.read_u32(chd).ok()?;
        if signature != 0 {
            return None;
        }
        let count = store.read_u32(chd + 8).ok()?;
        if count == 0 || count > self.max_bases {
            log::warn!("Rejecting hierarchy at {}: base count {} out of range", chd, count);
            return None;
        }
        let array = store.read_rva(chd + 12).ok()?;
        if !store.is_readable(array, count as usize * 4) {
            return None;
        }

        // Entry 0 describes the class itself.
        let self_bcd = store.read_rva(array).ok()?;
        if store.read_rva(self_bcd).ok()? != self_td {
            return None;
        }

        let mut bases = Vec::new();
        let mut i = 1u32;
        while i < count {
            let bcd = store.read_rva(array + i as u64 * 4).ok()?;
            let contained = store.read_u32(bcd + 4).ok()?;
            // A subtree larger than the whole array cannot be skipped over;
            // the hierarchy is corrupt.
            if contained >= count {
                log::warn!(
                    "Rejecting hierarchy at {}: contained base count {} out of range",
                    chd,
                    contained
                );
                return None;
            }
            match self.decode_base_descriptor(store, bcd) {
                Ok(base) => bases.push(base),
                Err(e) => log::warn!("Discarding malformed base descriptor at {}: {}", bcd, e),
            }
            i += contained + 1;
        }
        Some(bases)
    }

    fn decode_base_descriptor(
        &self,
        store: &dyn HostStore,
        bcd: Address,
    ) -> Result<BaseDescriptor, RttiError> {
        let td = store.read_rva(bcd)?;
        let base_name = self
            .descriptor_name(store, td)
            .ok_or_else(|| RttiError::Malformed {
                address: bcd,
                expected: "type descriptor reference".to_string(),
                found: td.to_string(),
            })?;
        let mdisp = store.read_i32(bcd + 8)?;
        let pdisp = store.read_i32(bcd + 12)?;
        let vdisp = store.read_i32(bcd + 16)?;
        let raw = store.read_u32(bcd + 20)?;

        let mut attributes = BaseAttributes::empty();
        if raw & (BCD_PRIV_OR_PROT_BASE | BCD_PRIV_OR_PROT_IN_COMPOBJ) == 0 {
            attributes |= BaseAttributes::PUBLIC;
        }
        if raw & BCD_NOT_VISIBLE != 0 {
            attributes |= BaseAttributes::NOT_VISIBLE;
        }
        if raw & BCD_AMBIGUOUS != 0 {
            attributes |= BaseAttributes::AMBIGUOUS;
        }
        if raw & BCD_NONPOLYMORPHIC != 0 {
            attributes |= BaseAttributes::NON_POLYMORPHIC;
        }
        if raw & BCD_VBASE_OF_CONTAINED != 0 {
            attributes |= BaseAttributes::INDIRECT_VIRTUAL;
        }

        // pdisp of -1 means a direct member displacement; anything else
        // routes the offset through the instance's virtual base table.
        let virtual_disp = (pdisp >= 0).then_some(VirtualDisplacement {
            vbtable_offset: pdisp,
            vbtable_index: vdisp,
        });
        if virtual_disp.is_some() {
            attributes |= BaseAttributes::VIRTUAL;
        } else if mdisp < 0 {
            return Err(RttiError::NegativeOffset {
                address: bcd,
                offset: mdisp as i64,
            });
        }

        Ok(BaseDescriptor {
            base_type: td,
            base_name,
            offset: mdisp as i64,
            attributes,
            virtual_disp,
        })
    }

    /// Classifies a bare TypeDescriptor from its decorated name alone.
    fn identify_descriptor(
        &self,
        store: &dyn HostStore,
        address: Address,
    ) -> Option<TypeInfoRecord> {
        let type_name = self.descriptor_name(store, address)?;
        let kind = if type_name.starts_with(".?AV") || type_name.starts_with(".?AU") {
            // A class type; its hierarchy lives in a locator elsewhere.
            TypeInfoKind::Class
        } else if type_name.starts_with(".P8") || type_name.starts_with(".?AP8") {
            TypeInfoKind::PointerToMember
        } else if type_name.starts_with(".PEA") || type_name.starts_with(".PA") {
            TypeInfoKind::Pointer
        } else {
            TypeInfoKind::Fundamental
        };
        Some(TypeInfoRecord {
            address,
            kind,
            type_name,
        })
    }
}

impl Default for MsvcAbi {
    fn default() -> Self {
        Self::new()
    }
}

impl RttiAbi for MsvcAbi {
    fn name(&self) -> &'static str {
        "msvc"
    }

    fn identify(&self, store: &dyn HostStore, address: Address) -> TypeInfoRecord {
        if let Some(record) = self.identify_locator(store, address) {
            return record;
        }
        if let Some(record) = self.identify_descriptor(store, address) {
            return record;
        }
        TypeInfoRecord::unknown(address)
    }

    fn linkage_name(&self, record: &TypeInfoRecord) -> String {
        record.type_name.clone()
    }
}
