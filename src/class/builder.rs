// Sun Feb 8 2026 - Alex

use crate::class::{ClassTypeInfo, CompositeLayout, LayoutField};
use crate::rtti::{BaseDescriptor, RttiError};
use crate::session::AnalysisSession;
use crate::symbol::SymbolPath;
use indexmap::IndexSet;
use std::collections::HashMap;

/// Builds composite layouts by recursing over the base graph. Carries the
/// in-progress stack so a hierarchy that reaches back into itself is
/// rejected instead of recursing forever.
pub struct LayoutBuilder<'s> {
    session: &'s AnalysisSession,
    in_progress: Vec<SymbolPath>,
}

impl<'s> LayoutBuilder<'s> {
    pub fn new(session: &'s AnalysisSession) -> Self {
        Self {
            session,
            in_progress: Vec::new(),
        }
    }

    /// Builds the layout for `class`, filling its layout slot on first use.
    /// Later calls for the same class observe the identical layout.
    pub fn build<'c>(&mut self, class: &'c ClassTypeInfo) -> Result<&'c CompositeLayout, RttiError> {
        if let Some(layout) = class.layout_slot().get() {
            return Ok(layout);
        }
        // Checked before entering the cell initializer: a hierarchy that
        // reaches back to a class currently being built must not re-enter
        // its own initialization.
        if self.in_progress.contains(class.path()) {
            return Err(RttiError::CyclicHierarchy(class.path().clone()));
        }
        class.layout_slot().get_or_try_init(|| self.compute(class))
    }

    fn compute(&mut self, class: &ClassTypeInfo) -> Result<CompositeLayout, RttiError> {
        self.in_progress.push(class.path().clone());
        let result = self.compute_inner(class);
        self.in_progress.pop();
        result
    }

    fn compute_inner(&mut self, class: &ClassTypeInfo) -> Result<CompositeLayout, RttiError> {
        let pointer_size = self.session.store().pointer_size() as u64;
        let mut fields: Vec<LayoutField> = Vec::new();
        let mut placed_virtual: IndexSet<SymbolPath> = IndexSet::new();
        let mut name_counts: HashMap<String, usize> = HashMap::new();

        for base in class.bases() {
            let base_class = self.session.class_for_base(base)?;
            let base_layout = self.build(&base_class)?;
            let base_size = base_layout.nonvirtual_size;
            // Virtual bases of this base, relative to its own start. Copied
            // out so the layout can be hoisted after base_class is dropped.
            let hoisted: Vec<(SymbolPath, u64, u64)> = base_layout
                .fields
                .iter()
                .filter_map(|f| f.virtual_base.clone().map(|p| (p, f.offset, f.size)))
                .collect();

            let offset = self.effective_offset(class.path(), base)?;

            if base.is_virtual() {
                // One sub-object per virtual base; the first placement wins.
                if placed_virtual.insert(base_class.path().clone()) {
                    fields.push(LayoutField {
                        name: unique_name(&mut name_counts, base_class.path().name()),
                        offset,
                        size: base_size,
                        virtual_base: Some(base_class.path().clone()),
                    });
                }
            } else {
                fields.push(LayoutField {
                    name: unique_name(&mut name_counts, base_class.path().name()),
                    offset,
                    size: base_size,
                    virtual_base: None,
                });
                // Virtual bases reached through a non-virtual base keep
                // their encoded placement within it.
                for (vpath, rel_offset, vsize) in hoisted {
                    if placed_virtual.insert(vpath.clone()) {
                        fields.push(LayoutField {
                            name: unique_name(&mut name_counts, vpath.name()),
                            offset: offset + rel_offset,
                            size: vsize,
                            virtual_base: Some(vpath),
                        });
                    }
                }
            }
        }

        let nonvirtual_size = fields
            .iter()
            .filter(|f| !f.is_virtual_base())
            .map(LayoutField::end)
            .max()
            .unwrap_or(0)
            .max(pointer_size);
        let size = fields
            .iter()
            .map(LayoutField::end)
            .max()
            .unwrap_or(0)
            .max(nonvirtual_size);

        let layout = CompositeLayout {
            path: class.path().clone(),
            fields,
            nonvirtual_size,
            size,
        };
        if let Some((a, b)) = layout.find_overlap() {
            log::warn!(
                "Layout of {} has overlapping bases {} and {}",
                class.path(),
                a.name,
                b.name
            );
        }
        Ok(layout)
    }

    /// The byte offset at which a base sub-object starts. Offsets carried as
    /// virtual displacements resolve through the instance's virtual base
    /// table when one is known, falling back to the member displacement.
    fn effective_offset(
        &self,
        owner: &SymbolPath,
        base: &BaseDescriptor,
    ) -> Result<u64, RttiError> {
        let raw = match base.virtual_disp {
            Some(vd) => match self.session.vbtable_displacement(owner, &vd) {
                Some(disp) => disp,
                None => {
                    log::debug!(
                        "No virtual base table registered for {}, using member displacement",
                        owner
                    );
                    base.offset
                }
            },
            None => base.offset,
        };
        if raw < 0 {
            return Err(RttiError::NegativeOffset {
                address: base.base_type,
                offset: raw,
            });
        }
        Ok(raw as u64)
    }
}

/// `super_{name}`, with an ordinal suffix when the same base name recurs.
fn unique_name(counts: &mut HashMap<String, usize>, base_name: &str) -> String {
    let count = counts.entry(base_name.to_string()).or_insert(0);
    let name = if *count == 0 {
        format!("super_{}", base_name)
    } else {
        format!("super_{}_{}", base_name, count)
    };
    *count += 1;
    name
}
