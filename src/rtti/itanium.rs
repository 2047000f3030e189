// Thu Feb 5 2026 - Alex

//! Itanium C++ ABI type-info structures.
//!
//! Every variant starts with a pointer to the vtable of its own type_info
//! class followed by a pointer to the mangled type name:
//!
//! ```text
//! __class_type_info:      +0 vptr, +8 name
//! __si_class_type_info:   +0 vptr, +8 name, +16 base type_info*
//! __vmi_class_type_info:  +0 vptr, +8 name, +16 u32 flags, +20 u32 count,
//!                         +24 array of { type_info*, offset_flags word }
//! ```
//!
//! The vptr points two words past the start of the vtable, so the type_info
//! pointer identifying the variant sits one pointer before the vptr target.

use crate::memory::{Address, HostStore};
use crate::rtti::error::{describe_invalid, RttiError};
use crate::rtti::{
    BaseAttributes, BaseDescriptor, InheritanceFlags, RttiAbi, TypeInfoKind, TypeInfoRecord,
};

const TYPE_INFO_ID: &str = "St9type_info";
const CLASS_ID: &str = "N10__cxxabiv117__class_type_infoE";
const SI_CLASS_ID: &str = "N10__cxxabiv120__si_class_type_infoE";
const VMI_CLASS_ID: &str = "N10__cxxabiv121__vmi_class_type_infoE";
const FUNDAMENTAL_ID: &str = "N10__cxxabiv123__fundamental_type_infoE";
const POINTER_ID: &str = "N10__cxxabiv119__pointer_type_infoE";
const POINTER_TO_MEMBER_ID: &str = "N10__cxxabiv129__pointer_to_member_type_infoE";

const MAX_NAME_LEN: usize = 512;

/// Identifier and base-list decoder for the GCC/Clang family.
pub struct ItaniumAbi {
    max_bases: u32,
}

impl ItaniumAbi {
    pub fn new() -> Self {
        Self { max_bases: 64 }
    }

    pub fn with_max_bases(mut self, max_bases: u32) -> Self {
        self.max_bases = max_bases;
        self
    }

    /// Derives the identifier naming the type_info variant at `address`:
    /// either through the relocation symbol when the vtable reference is an
    /// unresolved external, or by following the vptr back to the variant's
    /// own type_info and reading its name.
    fn id_string(&self, store: &dyn HostStore, address: Address) -> Option<String> {
        if let Some(reloc) = store.relocation_at(address) {
            if let Some(encoded) = reloc.symbol.strip_prefix("_ZTI") {
                return Some(encoded.to_string());
            }
        }

        let vptr = store.read_ptr(address).ok()?;
        if vptr.is_null() {
            return None;
        }
        let variant_slot = vptr.checked_sub(store.pointer_size() as u64)?;
        let variant_type_info = store.read_ptr(variant_slot).ok()?;
        self.type_name(store, variant_type_info)
    }

    /// Reads the mangled type name referenced from the second field.
    /// Anonymous-namespace names carry a leading `*` that breaks demangling
    /// and is stripped here.
    fn type_name(&self, store: &dyn HostStore, address: Address) -> Option<String> {
        let name_ptr = store.read_ptr(address + store.pointer_size() as u64).ok()?;
        if name_ptr.is_null() {
            return None;
        }
        let raw = store.read_c_string(name_ptr, MAX_NAME_LEN).ok()?;
        let name = raw.strip_prefix('*').unwrap_or(&raw);
        if name.is_empty() || !name.bytes().all(|b| b.is_ascii_graphic()) {
            return None;
        }
        Some(name.to_string())
    }

    /// Quick structural check for "points at something type-info-shaped".
    fn looks_like_type_info(&self, store: &dyn HostStore, address: Address) -> bool {
        match store.read_ptr(address) {
            Ok(vptr) if !vptr.is_null() => {}
            _ => return false,
        }
        self.type_name(store, address).is_some()
    }

    fn decode_single_base(
        &self,
        store: &dyn HostStore,
        address: Address,
    ) -> Option<BaseDescriptor> {
        let pointer_size = store.pointer_size() as u64;
        let slot = address + 2 * pointer_size;
        if let Ok(base_addr) = store.read_ptr(slot) {
            if self.looks_like_type_info(store, base_addr) {
                return Some(BaseDescriptor {
                    base_type: base_addr,
                    base_name: self.type_name(store, base_addr)?,
                    offset: 0,
                    attributes: BaseAttributes::PUBLIC,
                    virtual_disp: None,
                });
            }
        }
        // The base may live in another module; the slot then carries a
        // relocation to its _ZTI symbol instead of resident data.
        self.external_base(store, slot, 0, BaseAttributes::PUBLIC)
    }

    fn external_base(
        &self,
        store: &dyn HostStore,
        slot: Address,
        offset: i64,
        attributes: BaseAttributes,
    ) -> Option<BaseDescriptor> {
        let reloc = store.relocation_at(slot)?;
        let encoded = reloc.symbol.strip_prefix("_ZTI")?;
        Some(BaseDescriptor {
            base_type: Address::zero(),
            base_name: encoded.to_string(),
            offset,
            attributes,
            virtual_disp: None,
        })
    }

    fn decode_multi_base(
        &self,
        store: &dyn HostStore,
        address: Address,
    ) -> Option<(InheritanceFlags, Vec<BaseDescriptor>)> {
        let pointer_size = store.pointer_size() as u64;
        let flags_addr = address + 2 * pointer_size;
        let raw_flags = store.read_u32(flags_addr).ok()?;
        let count = store.read_u32(flags_addr + 4).ok()?;
        if count == 0 || count > self.max_bases {
            log::warn!(
                "Rejecting vmi_class_type_info at {}: base count {} out of range",
                address,
                count
            );
            return None;
        }

        let entry_size = 2 * pointer_size;
        let array = flags_addr + 8;
        if !store.is_readable(array, (count as u64 * entry_size) as usize) {
            return None;
        }

        let mut bases = Vec::with_capacity(count as usize);
        for i in 0..count as u64 {
            let entry = array + i * entry_size;
            match self.decode_base_entry(store, entry) {
                Ok(base) => bases.push(base),
                // A single bad record is discarded; siblings keep decoding.
                Err(e) => log::warn!("Discarding malformed base entry at {}: {}", entry, e),
            }
        }
        Some((InheritanceFlags::from_raw(raw_flags), bases))
    }

    fn decode_base_entry(
        &self,
        store: &dyn HostStore,
        entry: Address,
    ) -> Result<BaseDescriptor, RttiError> {
        let pointer_size = store.pointer_size() as u64;
        let word = entry + pointer_size;
        // The word is pointer-sized and signed; on 32-bit images it must be
        // sign-extended so negative encoded offsets stay negative.
        let offset_flags = match store.pointer_size() {
            4 => store.read_i32(word)? as i64,
            _ => store.read_u64(word)? as i64,
        };
        let (attributes, offset) = decode_offset_flags(offset_flags);
        if offset < 0 {
            return Err(RttiError::NegativeOffset {
                address: entry,
                offset,
            });
        }

        let base_addr = store.read_ptr(entry)?;
        if self.looks_like_type_info(store, base_addr) {
            if let Some(base_name) = self.type_name(store, base_addr) {
                return Ok(BaseDescriptor {
                    base_type: base_addr,
                    base_name,
                    offset,
                    attributes,
                    virtual_disp: None,
                });
            }
        }
        self.external_base(store, entry, offset, attributes)
            .ok_or_else(|| RttiError::Malformed {
                address: entry,
                expected: "type_info reference".to_string(),
                found: base_addr.to_string(),
            })
    }
}

impl Default for ItaniumAbi {
    fn default() -> Self {
        Self::new()
    }
}

/// Splits an `__offset_flags` word: the byte offset lives in the high bits
/// (arithmetic shift), the low flag byte carries virtual (bit 0) and public
/// (bit 1).
pub fn decode_offset_flags(offset_flags: i64) -> (BaseAttributes, i64) {
    let mut attributes = BaseAttributes::empty();
    if offset_flags & 0x1 != 0 {
        attributes |= BaseAttributes::VIRTUAL;
    }
    if offset_flags & 0x2 != 0 {
        attributes |= BaseAttributes::PUBLIC;
    }
    (attributes, offset_flags >> 8)
}

impl RttiAbi for ItaniumAbi {
    fn name(&self) -> &'static str {
        "itanium"
    }

    fn identify(&self, store: &dyn HostStore, address: Address) -> TypeInfoRecord {
        let Some(id) = self.id_string(store, address) else {
            return TypeInfoRecord::unknown(address);
        };
        let Some(type_name) = self.type_name(store, address) else {
            return TypeInfoRecord::unknown(address);
        };

        let kind = match id.as_str() {
            TYPE_INFO_ID => TypeInfoKind::Class,
            CLASS_ID => TypeInfoKind::NoBase,
            FUNDAMENTAL_ID => TypeInfoKind::Fundamental,
            POINTER_ID => TypeInfoKind::Pointer,
            POINTER_TO_MEMBER_ID => TypeInfoKind::PointerToMember,
            SI_CLASS_ID => match self.decode_single_base(store, address) {
                Some(base) => TypeInfoKind::SingleBase { base },
                None => {
                    log::warn!(
                        "{}",
                        describe_invalid(store, address, SI_CLASS_ID, &id)
                    );
                    return TypeInfoRecord::unknown(address);
                }
            },
            VMI_CLASS_ID => match self.decode_multi_base(store, address) {
                Some((flags, bases)) => TypeInfoKind::MultiBase { flags, bases },
                None => {
                    log::warn!(
                        "{}",
                        describe_invalid(store, address, VMI_CLASS_ID, &id)
                    );
                    return TypeInfoRecord::unknown(address);
                }
            },
            _ => return TypeInfoRecord::unknown(address),
        };

        // Materialize the name string in the host store so later passes see
        // it as data rather than raw bytes.
        if let Ok(name_ptr) = store.read_ptr(address + store.pointer_size() as u64) {
            let mut edit = store.begin_edit(&format!("type name at {}", name_ptr));
            edit.record_string(name_ptr, &type_name);
            edit.commit();
        }

        TypeInfoRecord {
            address,
            kind,
            type_name,
        }
    }

    fn linkage_name(&self, record: &TypeInfoRecord) -> String {
        format!("_ZTI{}", record.type_name)
    }
}
