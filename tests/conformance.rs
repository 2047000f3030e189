// Mon Feb 9 2026 - Alex

//! End-to-end recovery over synthetic images: hand-assembled RTTI for both
//! ABI encodings, checked down to the recovered field offsets.

use rtti_recover::fixture;
use rtti_recover::memory::{Address, CancelToken, MemoryError};
use rtti_recover::rtti::TypeInfoKind;
use rtti_recover::symbol::SymbolPath;
use rtti_recover::{AnalysisSession, ImageStore, ItaniumAbi, MsvcAbi, RttiError};
use std::sync::Arc;

const BASE: u64 = 0x10000;

// Strings.
const S_CLASS_ID: u64 = BASE;
const S_SI_ID: u64 = BASE + 0x40;
const S_VMI_ID: u64 = BASE + 0x90;
const S_BASE: u64 = BASE + 0xe0;
const S_DERIVED: u64 = BASE + 0xf0;
const S_V: u64 = BASE + 0x110;
const S_B1: u64 = BASE + 0x118;
const S_B2: u64 = BASE + 0x120;
const S_D: u64 = BASE + 0x128;
const S_NS_A: u64 = BASE + 0x140;
const S_NS_BASE: u64 = BASE + 0x150;
const S_NS_DERIVED: u64 = BASE + 0x160;
const S_X: u64 = BASE + 0x170;
const S_EXTKID: u64 = BASE + 0x180;

// The ABI's own type_info objects and the vtable slots pointing back at them.
const META_CLASS: u64 = BASE + 0x200;
const META_SI: u64 = BASE + 0x220;
const META_VMI: u64 = BASE + 0x240;
const VT_CLASS: u64 = BASE + 0x300;
const VT_SI: u64 = BASE + 0x310;
const VT_VMI: u64 = BASE + 0x320;

// Type infos under test.
const TI_BASE: u64 = BASE + 0x400;
const TI_DERIVED: u64 = BASE + 0x420;
const TI_V: u64 = BASE + 0x440;
const TI_B1: u64 = BASE + 0x460;
const TI_B2: u64 = BASE + 0x4a0;
const TI_D: u64 = BASE + 0x4e0;
const TI_NS_A: u64 = BASE + 0x520;
const TI_NS_BASE: u64 = BASE + 0x540;
const TI_NS_DERIVED: u64 = BASE + 0x560;
const TI_X: u64 = BASE + 0x5a0;
const TI_EXTKID: u64 = BASE + 0x5c0;

fn addr(value: u64) -> Address {
    Address::new(value)
}

/// A vptr value whose preceding slot names the given metaclass, matching
/// how compilers emit type_info vtables.
fn vptr(vt_slot: u64) -> Address {
    addr(vt_slot + 8)
}

fn write_class_ti(image: &mut ImageStore, at: u64, name: u64) {
    image.write_ptr(addr(at), vptr(VT_CLASS));
    image.write_ptr(addr(at + 8), addr(name));
}

fn write_si_ti(image: &mut ImageStore, at: u64, name: u64, base: u64) {
    image.write_ptr(addr(at), vptr(VT_SI));
    image.write_ptr(addr(at + 8), addr(name));
    image.write_ptr(addr(at + 16), addr(base));
}

fn write_vmi_ti(image: &mut ImageStore, at: u64, name: u64, flags: u32, bases: &[(u64, i64)]) {
    image.write_ptr(addr(at), vptr(VT_VMI));
    image.write_ptr(addr(at + 8), addr(name));
    image.write_u32(addr(at + 16), flags);
    image.write_u32(addr(at + 20), bases.len() as u32);
    for (i, (base, offset_flags)) in bases.iter().enumerate() {
        let entry = at + 24 + (i as u64) * 16;
        image.write_ptr(addr(entry), addr(*base));
        image.write_u64(addr(entry + 8), *offset_flags as u64);
    }
}

fn itanium_image() -> ImageStore {
    let mut image = ImageStore::new(addr(BASE), 0x1000);

    image.write_str(addr(S_CLASS_ID), "N10__cxxabiv117__class_type_infoE");
    image.write_str(addr(S_SI_ID), "N10__cxxabiv120__si_class_type_infoE");
    image.write_str(addr(S_VMI_ID), "N10__cxxabiv121__vmi_class_type_infoE");
    image.write_str(addr(S_BASE), "4Base");
    image.write_str(addr(S_DERIVED), "7Derived");
    image.write_str(addr(S_V), "1V");
    image.write_str(addr(S_B1), "2B1");
    image.write_str(addr(S_B2), "2B2");
    image.write_str(addr(S_D), "1D");
    image.write_str(addr(S_NS_A), "N2ns1AE");
    image.write_str(addr(S_NS_BASE), "N2ns4BaseE");
    image.write_str(addr(S_NS_DERIVED), "N2ns7DerivedE");
    image.write_str(addr(S_X), "1X");
    image.write_str(addr(S_EXTKID), "6ExtKid");

    // Metaclass objects carry their own id string as name.
    image.write_ptr(addr(META_CLASS), addr(1));
    image.write_ptr(addr(META_CLASS + 8), addr(S_CLASS_ID));
    image.write_ptr(addr(META_SI), addr(1));
    image.write_ptr(addr(META_SI + 8), addr(S_SI_ID));
    image.write_ptr(addr(META_VMI), addr(1));
    image.write_ptr(addr(META_VMI + 8), addr(S_VMI_ID));

    // Vtable slots: the word before each vptr target points at the metaclass.
    image.write_ptr(addr(VT_CLASS), addr(META_CLASS));
    image.write_ptr(addr(VT_SI), addr(META_SI));
    image.write_ptr(addr(VT_VMI), addr(META_VMI));

    // struct Base {}; struct Derived : Base {};
    write_class_ti(&mut image, TI_BASE, S_BASE);
    write_si_ti(&mut image, TI_DERIVED, S_DERIVED, TI_BASE);

    // Diamond: B1 and B2 each virtually inherit V; D inherits both.
    // Encoded virtual-base offsets already account for D's layout.
    write_class_ti(&mut image, TI_V, S_V);
    write_vmi_ti(&mut image, TI_B1, S_B1, 0, &[(TI_V, (16 << 8) | 0x3)]);
    write_vmi_ti(&mut image, TI_B2, S_B2, 0, &[(TI_V, (8 << 8) | 0x3)]);
    write_vmi_ti(
        &mut image,
        TI_D,
        S_D,
        0x2,
        &[(TI_B1, 0x2), (TI_B2, (8 << 8) | 0x2)],
    );

    // namespace ns { struct A; struct Base; struct Derived : A, Base; }
    write_class_ti(&mut image, TI_NS_A, S_NS_A);
    write_class_ti(&mut image, TI_NS_BASE, S_NS_BASE);
    write_vmi_ti(
        &mut image,
        TI_NS_DERIVED,
        S_NS_DERIVED,
        0,
        &[(TI_NS_A, 0x2), (TI_NS_BASE, (8 << 8) | 0x2)],
    );

    // struct X : X (malformed on purpose).
    write_si_ti(&mut image, TI_X, S_X, TI_X);

    // struct ExtKid : Ext, where Ext's type info lives in another module.
    image.write_ptr(addr(TI_EXTKID), vptr(VT_SI));
    image.write_ptr(addr(TI_EXTKID + 8), addr(S_EXTKID));
    image.write_ptr(addr(TI_EXTKID + 16), addr(0));
    image.add_relocation(addr(TI_EXTKID + 16), "_ZTI3Ext");

    image
}

fn itanium_session() -> AnalysisSession {
    AnalysisSession::new(Arc::new(itanium_image()), Arc::new(ItaniumAbi::new()))
}

#[test]
fn single_inheritance_base_at_zero() {
    let session = itanium_session();

    let record = session.identify(addr(TI_DERIVED));
    assert!(matches!(record.kind, TypeInfoKind::SingleBase { .. }));
    assert_eq!(record.type_name, "7Derived");

    let class = session.class_at(addr(TI_DERIVED)).unwrap();
    assert_eq!(class.path().to_string(), "Derived");

    let layout = session.build_layout(&class).unwrap();
    let base = layout.field_named("super_Base").unwrap();
    assert_eq!(base.offset, 0);
    assert_eq!(base.size, 8);
    assert!(layout.find_overlap().is_none());
}

#[test]
fn diamond_places_virtual_base_once() {
    let session = itanium_session();
    let class = session.class_at(addr(TI_D)).unwrap();
    let layout = session.build_layout(&class).unwrap();

    assert_eq!(layout.fields.len(), 3);
    assert_eq!(layout.virtual_bases().count(), 1);

    assert_eq!(layout.field_named("super_B1").unwrap().offset, 0);
    assert_eq!(layout.field_named("super_B2").unwrap().offset, 8);
    let v = layout.field_named("super_V").unwrap();
    assert_eq!(v.offset, 16);
    assert_eq!(v.virtual_base, Some(SymbolPath::flat("V")));

    assert!(layout.find_overlap().is_none());
    assert_eq!(layout.nonvirtual_size, 16);
    assert_eq!(layout.size, 24);
}

#[test]
fn recovery_is_idempotent() {
    let session = itanium_session();

    let first = session.identify(addr(TI_D));
    let second = session.identify(addr(TI_D));
    assert!(Arc::ptr_eq(&first, &second));

    let class_a = session.class_at(addr(TI_D)).unwrap();
    let class_b = session.class_at(addr(TI_D)).unwrap();
    assert!(Arc::ptr_eq(&class_a, &class_b));

    let layout_a = session.build_layout(&class_a).unwrap().clone();
    let layout_b = session.build_layout(&class_b).unwrap().clone();
    assert_eq!(layout_a, layout_b);
}

#[test]
fn arbitrary_data_is_unknown_not_an_error() {
    let session = itanium_session();

    // A string, a metaclass body, and unmapped space.
    for candidate in [S_BASE, META_CLASS, BASE + 0xf00] {
        let record = session.identify(addr(candidate));
        assert!(record.is_unknown(), "expected Unknown at {:#x}", candidate);
    }
    assert!(matches!(
        session.class_at(addr(S_BASE)),
        Err(RttiError::NotAClass(_))
    ));
}

#[test]
fn self_referential_hierarchy_is_rejected() {
    let session = itanium_session();
    let class = session.class_at(addr(TI_X)).unwrap();
    let result = session.build_layout(&class);
    assert!(matches!(result, Err(RttiError::CyclicHierarchy(_))));
}

#[test]
fn external_base_resolves_through_relocation() {
    let session = itanium_session();
    let class = session.class_at(addr(TI_EXTKID)).unwrap();
    assert_eq!(class.bases().len(), 1);
    assert_eq!(class.bases()[0].base_name, "3Ext");

    let layout = session.build_layout(&class).unwrap();
    let ext = layout.field_named("super_Ext").unwrap();
    assert_eq!(ext.offset, 0);
}

#[test]
fn namespaced_classes_match_fixture() {
    let session = itanium_session();
    session.class_at(addr(TI_NS_DERIVED)).unwrap();

    let fixture = fixture::parse(
        r#"{
            "ns::Derived": {
                "offsets": { "super_A": "0", "super_Base": "8" }
            }
        }"#,
    )
    .unwrap();
    let mismatches = fixture::verify(&session, &fixture);
    assert!(mismatches.is_empty(), "mismatches: {:?}", mismatches);

    // A wrong expectation is reported, not swallowed.
    let fixture = fixture::parse(
        r#"{"ns::Derived": {"offsets": {"super_Base": "16"}}}"#,
    )
    .unwrap();
    let mismatches = fixture::verify(&session, &fixture);
    assert_eq!(mismatches.len(), 1);
}

#[test]
fn captured_fixture_verifies_cleanly() {
    let session = itanium_session();
    for ti in [TI_DERIVED, TI_D, TI_NS_DERIVED] {
        let class = session.class_at(addr(ti)).unwrap();
        session.build_layout(&class).unwrap();
    }

    let captured = fixture::capture(&session);
    assert!(captured.contains_key("ns::Derived"));
    let json = fixture::to_json(&captured).unwrap();
    let reparsed = fixture::parse(&json).unwrap();
    assert!(fixture::verify(&session, &reparsed).is_empty());
}

#[test]
fn find_type_info_by_name() {
    let session = itanium_session();
    let token = CancelToken::new();

    let found = session.find_type_info("7Derived", &token).unwrap();
    assert_eq!(found, Some(addr(TI_DERIVED)));

    let missing = session.find_type_info("9NoSuchCls", &token).unwrap();
    assert_eq!(missing, None);
}

#[test]
fn cancelled_scan_stops_early() {
    let session = itanium_session();
    let token = CancelToken::new();
    token.cancel();

    let result = session.find_type_info("7Derived", &token);
    assert!(matches!(result, Err(MemoryError::Cancelled)));
}

// --- MSVC encoding ---

const PE_BASE: u64 = 0x1_4000_0000;

const TD_VFT: u64 = 0x100;
const TD_BASE: u64 = 0x200;
const TD_DERIVED: u64 = 0x240;
const TD_A: u64 = 0x280;
const TD_E: u64 = 0x2c0;

const BCD_SELF_D: u64 = 0x300;
const BCD_A: u64 = 0x320;
const BCD_BASE: u64 = 0x340;
const ARR_D: u64 = 0x360;
const CHD_D: u64 = 0x380;
const COL_D: u64 = 0x3a0;

const BCD_SELF_A: u64 = 0x400;
const ARR_A: u64 = 0x420;
const CHD_A: u64 = 0x430;
const COL_A: u64 = 0x440;

const BCD_SELF_BASE: u64 = 0x460;
const ARR_BASE: u64 = 0x480;
const CHD_BASE: u64 = 0x490;
const COL_BASE: u64 = 0x4a0;

const BCD_SELF_E: u64 = 0x4c0;
const BCD_VBASE: u64 = 0x4e0;
const ARR_E: u64 = 0x500;
const CHD_E: u64 = 0x510;
const COL_E: u64 = 0x520;

const VBTABLE_E: u64 = 0x600;

// A hierarchy whose second descriptor claims an absurd contained count.
const BCD_SELF_BAD: u64 = 0x700;
const BCD_BAD: u64 = 0x720;
const ARR_BAD: u64 = 0x740;
const CHD_BAD: u64 = 0x750;
const COL_BAD: u64 = 0x760;

fn pe(rva: u64) -> Address {
    Address::new(PE_BASE + rva)
}

fn write_td(image: &mut ImageStore, at: u64, name: &str) {
    image.write_ptr(pe(at), pe(TD_VFT));
    image.write_str(pe(at + 16), name);
}

fn write_bcd(image: &mut ImageStore, at: u64, td: u64, contained: u32, pmd: [i32; 3], attrs: u32) {
    image.write_u32(pe(at), td as u32);
    image.write_u32(pe(at + 4), contained);
    image.write_u32(pe(at + 8), pmd[0] as u32);
    image.write_u32(pe(at + 12), pmd[1] as u32);
    image.write_u32(pe(at + 16), pmd[2] as u32);
    image.write_u32(pe(at + 20), attrs);
}

fn write_chd(image: &mut ImageStore, at: u64, attrs: u32, count: u32, array: u64) {
    image.write_u32(pe(at), 0);
    image.write_u32(pe(at + 4), attrs);
    image.write_u32(pe(at + 8), count);
    image.write_u32(pe(at + 12), array as u32);
}

fn write_col(image: &mut ImageStore, at: u64, td: u64, chd: u64) {
    image.write_u32(pe(at), 1);
    image.write_u32(pe(at + 4), 0);
    image.write_u32(pe(at + 8), 0);
    image.write_u32(pe(at + 12), td as u32);
    image.write_u32(pe(at + 16), chd as u32);
    image.write_u32(pe(at + 20), at as u32);
}

fn msvc_image() -> ImageStore {
    let mut image = ImageStore::new(pe(0), 0x1000);

    write_td(&mut image, TD_BASE, ".?AVBase@@");
    write_td(&mut image, TD_DERIVED, ".?AVDerived@@");
    write_td(&mut image, TD_A, ".?AVA@@");
    write_td(&mut image, TD_E, ".?AVE@@");

    // class A {}; class Base {}; class Derived : A, Base {};
    write_bcd(&mut image, BCD_SELF_D, TD_DERIVED, 2, [0, -1, 0], 0);
    write_bcd(&mut image, BCD_A, TD_A, 0, [0, -1, 0], 0);
    write_bcd(&mut image, BCD_BASE, TD_BASE, 0, [8, -1, 0], 0);
    image.write_u32(pe(ARR_D), BCD_SELF_D as u32);
    image.write_u32(pe(ARR_D + 4), BCD_A as u32);
    image.write_u32(pe(ARR_D + 8), BCD_BASE as u32);
    write_chd(&mut image, CHD_D, 0x1, 3, ARR_D);
    write_col(&mut image, COL_D, TD_DERIVED, CHD_D);

    write_bcd(&mut image, BCD_SELF_A, TD_A, 0, [0, -1, 0], 0);
    image.write_u32(pe(ARR_A), BCD_SELF_A as u32);
    write_chd(&mut image, CHD_A, 0, 1, ARR_A);
    write_col(&mut image, COL_A, TD_A, CHD_A);

    write_bcd(&mut image, BCD_SELF_BASE, TD_BASE, 0, [0, -1, 0], 0);
    image.write_u32(pe(ARR_BASE), BCD_SELF_BASE as u32);
    write_chd(&mut image, CHD_BASE, 0, 1, ARR_BASE);
    write_col(&mut image, COL_BASE, TD_BASE, CHD_BASE);

    // class E : virtual Base {}; placement goes through E's vbtable.
    write_bcd(&mut image, BCD_SELF_E, TD_E, 1, [0, -1, 0], 0);
    write_bcd(&mut image, BCD_VBASE, TD_BASE, 0, [0, 0, 4], 0);
    image.write_u32(pe(ARR_E), BCD_SELF_E as u32);
    image.write_u32(pe(ARR_E + 4), BCD_VBASE as u32);
    write_chd(&mut image, CHD_E, 0x2, 2, ARR_E);
    write_col(&mut image, COL_E, TD_E, CHD_E);

    image.write_u32(pe(VBTABLE_E), 0);
    image.write_u32(pe(VBTABLE_E + 4), 16);

    // Corrupt hierarchy: the subtree-skip count of the second entry is
    // larger than the whole array.
    write_bcd(&mut image, BCD_SELF_BAD, TD_A, 2, [0, -1, 0], 0);
    image.write_u32(pe(BCD_BAD), TD_BASE as u32);
    image.write_u32(pe(BCD_BAD + 4), u32::MAX);
    image.write_u32(pe(ARR_BAD), BCD_SELF_BAD as u32);
    image.write_u32(pe(ARR_BAD + 4), BCD_BAD as u32);
    image.write_u32(pe(ARR_BAD + 8), BCD_BAD as u32);
    write_chd(&mut image, CHD_BAD, 0x1, 3, ARR_BAD);
    write_col(&mut image, COL_BAD, TD_A, CHD_BAD);

    image
}

fn msvc_session() -> AnalysisSession {
    AnalysisSession::new(Arc::new(msvc_image()), Arc::new(MsvcAbi::new()))
}

#[test]
fn msvc_locator_decodes_direct_bases() {
    let session = msvc_session();
    session.class_at(pe(COL_A)).unwrap();
    session.class_at(pe(COL_BASE)).unwrap();

    let class = session.class_at(pe(COL_D)).unwrap();
    assert_eq!(class.path().to_string(), "Derived");
    assert_eq!(class.bases().len(), 2);

    let layout = session.build_layout(&class).unwrap();
    assert_eq!(layout.field_named("super_A").unwrap().offset, 0);
    assert_eq!(layout.field_named("super_Base").unwrap().offset, 8);
    assert!(layout.find_overlap().is_none());
}

#[test]
fn msvc_virtual_base_uses_registered_vbtable() {
    let session = msvc_session();
    session.class_at(pe(COL_BASE)).unwrap();

    let class = session.class_at(pe(COL_E)).unwrap();
    assert!(class.has_virtual_bases());
    session.register_vbtable(SymbolPath::flat("E"), pe(VBTABLE_E));

    let layout = session.build_layout(&class).unwrap();
    let base = layout.field_named("super_Base").unwrap();
    assert!(base.is_virtual_base());
    assert_eq!(base.offset, 16);
}

#[test]
fn msvc_out_of_range_contained_count_is_unknown() {
    let session = msvc_session();
    let record = session.identify(pe(COL_BAD));
    assert!(record.is_unknown());
}

#[test]
fn itanium_32bit_discards_negative_offset_entry() {
    const B32: u64 = 0x20000;
    const TI_BASE32: u64 = B32 + 0xb0;
    const TI_NEG32: u64 = B32 + 0xc0;

    let mut image = ImageStore::new(addr(B32), 0x200).with_pointer_size(4);
    image.write_str(addr(B32), "N10__cxxabiv117__class_type_infoE");
    image.write_str(addr(B32 + 0x40), "N10__cxxabiv121__vmi_class_type_infoE");
    image.write_str(addr(B32 + 0x70), "4Base");
    image.write_str(addr(B32 + 0x78), "3Neg");

    image.write_ptr(addr(B32 + 0x80), addr(1));
    image.write_ptr(addr(B32 + 0x84), addr(B32));
    image.write_ptr(addr(B32 + 0x90), addr(1));
    image.write_ptr(addr(B32 + 0x94), addr(B32 + 0x40));
    image.write_ptr(addr(B32 + 0xa0), addr(B32 + 0x80));
    image.write_ptr(addr(B32 + 0xa8), addr(B32 + 0x90));

    image.write_ptr(addr(TI_BASE32), addr(B32 + 0xa4));
    image.write_ptr(addr(TI_BASE32 + 4), addr(B32 + 0x70));

    // Two entries: one encoding offset -8, one a valid base at offset 8.
    image.write_ptr(addr(TI_NEG32), addr(B32 + 0xac));
    image.write_ptr(addr(TI_NEG32 + 4), addr(B32 + 0x78));
    image.write_u32(addr(TI_NEG32 + 8), 0);
    image.write_u32(addr(TI_NEG32 + 12), 2);
    image.write_ptr(addr(TI_NEG32 + 16), addr(TI_BASE32));
    image.write_u32(addr(TI_NEG32 + 20), ((-8i32) << 8 | 0x2) as u32);
    image.write_ptr(addr(TI_NEG32 + 24), addr(TI_BASE32));
    image.write_u32(addr(TI_NEG32 + 28), (8 << 8) | 0x2);

    let session = AnalysisSession::new(Arc::new(image), Arc::new(ItaniumAbi::new()));
    let record = session.identify(addr(TI_NEG32));
    assert!(record.kind.is_class());
    assert_eq!(record.bases().len(), 1);
    assert_eq!(record.bases()[0].offset, 8);
    assert_eq!(record.bases()[0].base_name, "4Base");
}

#[test]
fn msvc_bare_descriptor_classifies_without_hierarchy() {
    let session = msvc_session();
    let record = session.identify(pe(TD_A));
    assert!(matches!(record.kind, TypeInfoKind::Class));
    assert_eq!(record.type_name, ".?AVA@@");

    // A locator address is a class; a descriptor alone is not.
    assert!(matches!(
        session.class_at(pe(TD_A)),
        Err(RttiError::NotAClass(_))
    ));
}
