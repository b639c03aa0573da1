//! Declaration pool and operand pools
//!
//! - [`DeclarePool`] owns every [`Declare`] of a compilation unit
//! - [`ImmPool`] deduplicates immediates by `(bit pattern, type)`
//! - [`RegionPool`] deduplicates `<vs;w,hs>` regions
//!
//! The operand pools have a fixed capacity. Once full, lookups of new keys
//! miss and the caller gets a fresh, unshared instance instead of an error.

use super::declare::{AliasLink, Declare, DeclareId, RegFileKind, SubRegAlign};
use super::operand::{Operand, OperandId, Region, RegionId};
use super::regvar::{DeclareKind, RegVar, RegVarKind, TransientKind};
use super::types::{ElemType, ExecSize};
use crate::{Error, Result};
use std::collections::HashMap;

/// Owner of all declares of one compilation unit
#[derive(Debug)]
pub struct DeclarePool {
    decls: Vec<Declare>,
    grf_size: u32,
    addr_spill_count: u32,
}

impl DeclarePool {
    /// Creates an empty pool for a GRF of `grf_size` bytes
    pub fn new(grf_size: u32) -> Self {
        Self {
            decls: Vec::new(),
            grf_size,
            addr_spill_count: 0,
        }
    }

    /// Creates a declare and its register variable.
    ///
    /// `base` is required for `Tmp`, `Spill` and `Fill`; `representative`
    /// must be a destination region for `Spill` and a source region for
    /// `Fill`.
    #[allow(clippy::too_many_arguments)]
    pub fn create(
        &mut self,
        name: impl Into<String>,
        reg_file: RegFileKind,
        num_elems: u16,
        num_rows: u16,
        ty: ElemType,
        kind: DeclareKind,
        base: Option<DeclareId>,
        representative: Option<(OperandId, &Operand)>,
        exec_size: Option<ExecSize>,
    ) -> Result<DeclareId> {
        let reg_var_kind = match kind {
            DeclareKind::Regular => RegVarKind::Default,
            DeclareKind::AddrSpill => {
                let slot = self.addr_spill_count;
                self.addr_spill_count += 1;
                RegVarKind::AddrSpill { slot }
            }
            DeclareKind::Tmp => RegVarKind::Tmp {
                base: base.ok_or(Error::MissingBindingOperand {
                    kind,
                    what: "base declare",
                })?,
            },
            DeclareKind::Spill | DeclareKind::Fill => {
                let base = base.ok_or(Error::MissingBindingOperand {
                    kind,
                    what: "base declare",
                })?;
                let (transient, wants) = if kind == DeclareKind::Spill {
                    (TransientKind::Spill, "destination region")
                } else {
                    (TransientKind::Fill, "source region")
                };
                let representative = match representative {
                    Some((id, Operand::Dst(_))) if transient == TransientKind::Spill => id,
                    Some((id, Operand::Src(_))) if transient == TransientKind::Fill => id,
                    _ => return Err(Error::MissingBindingOperand { kind, what: wants }),
                };
                RegVarKind::Transient {
                    base,
                    representative,
                    exec_size: exec_size.unwrap_or(ExecSize::SIMD1),
                    kind: transient,
                }
            }
            DeclareKind::CoalescedSpill => RegVarKind::Coalesced { is_fill: false },
            DeclareKind::CoalescedFill => RegVarKind::Coalesced { is_fill: true },
        };

        let id = DeclareId(self.decls.len() as u32);
        let mut decl = Declare::new(
            id,
            name.into(),
            reg_file,
            num_elems,
            num_rows,
            ty,
            RegVar::new(reg_var_kind),
        );

        let align = match reg_file {
            RegFileKind::Address => SubRegAlign::Any,
            RegFileKind::Flag => {
                if decl.num_flag_elems() == 32 {
                    SubRegAlign::EVEN_WORD
                } else {
                    SubRegAlign::Any
                }
            }
            RegFileKind::Grf | RegFileKind::Input => {
                if decl.byte_size() >= self.grf_size {
                    SubRegAlign::Grf
                } else {
                    ty.min_sub_reg_align()
                }
            }
        };
        decl.set_sub_reg_align(align);

        tracing::debug!(
            decl = %id,
            name = decl.name(),
            file = ?reg_file,
            elems = num_elems,
            rows = num_rows,
            ty = %ty,
            align = ?align,
            "created declare"
        );
        self.decls.push(decl);
        Ok(id)
    }

    /// Links `id` to read/write through `target` at `offset` bytes.
    ///
    /// Fails if the link would close a cycle.
    pub fn set_alias(&mut self, id: DeclareId, target: DeclareId, offset: u32) -> Result<()> {
        let mut cursor = Some(target);
        while let Some(current) = cursor {
            if current == id {
                return Err(Error::AliasCycle {
                    declare: self.get(id).name().to_string(),
                    target: self.get(target).name().to_string(),
                });
            }
            cursor = self.get(current).alias().map(|link| link.target);
        }
        self.get_mut(id).set_alias_link(AliasLink { target, offset });
        Ok(())
    }

    /// Terminal non-aliased declare of `id`'s chain and the total byte
    /// offset accumulated along the way
    pub fn root_declare(&self, id: DeclareId) -> (DeclareId, u32) {
        let mut current = id;
        let mut offset = 0;
        while let Some(link) = self.get(current).alias() {
            offset += link.offset;
            current = link.target;
        }
        (current, offset)
    }

    /// Every declare on `id`'s alias chain that has an outgoing link,
    /// starting with `id` itself
    pub fn alias_links(&self, id: DeclareId) -> Vec<(DeclareId, AliasLink)> {
        let mut links = Vec::new();
        let mut current = id;
        while let Some(link) = self.get(current).alias() {
            links.push((current, link));
            current = link.target;
        }
        links
    }

    /// Panics if `id` was not created by this pool
    pub fn get(&self, id: DeclareId) -> &Declare {
        &self.decls[id.index()]
    }

    pub fn get_mut(&mut self, id: DeclareId) -> &mut Declare {
        &mut self.decls[id.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Declare> {
        self.decls.iter()
    }

    pub fn len(&self) -> usize {
        self.decls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decls.is_empty()
    }

    pub fn grf_size(&self) -> u32 {
        self.grf_size
    }
}

impl Drop for DeclarePool {
    fn drop(&mut self) {
        tracing::trace!(count = self.decls.len(), "releasing declare pool");
        self.decls.clear();
    }
}

/// Immediate deduplication table
#[derive(Debug)]
pub struct ImmPool {
    entries: HashMap<(i64, ElemType), OperandId>,
    capacity: usize,
}

impl ImmPool {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            capacity,
        }
    }

    pub fn lookup(&self, bits: i64, ty: ElemType) -> Option<OperandId> {
        self.entries.get(&(bits, ty)).copied()
    }

    /// Returns the pooled operand for `(bits, ty)`, allocating it with
    /// `alloc` on a miss. When the pool is full the new operand is returned
    /// without being pooled.
    pub fn get_or_insert_with(
        &mut self,
        bits: i64,
        ty: ElemType,
        alloc: impl FnOnce() -> OperandId,
    ) -> OperandId {
        if let Some(id) = self.lookup(bits, ty) {
            return id;
        }
        let id = alloc();
        if self.entries.len() < self.capacity {
            self.entries.insert((bits, ty), id);
        } else {
            tracing::warn!(
                capacity = self.capacity,
                bits,
                ty = %ty,
                "immediate pool full, allocating unshared immediate"
            );
        }
        id
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Region table with deduplication of identical strides
#[derive(Debug)]
pub struct RegionPool {
    regions: Vec<Region>,
    index: HashMap<(u16, u16, u16), RegionId>,
    capacity: usize,
}

impl RegionPool {
    pub fn new(capacity: usize) -> Self {
        Self {
            regions: Vec::new(),
            index: HashMap::new(),
            capacity,
        }
    }

    pub fn lookup(&self, vert_stride: u16, width: u16, horz_stride: u16) -> Option<RegionId> {
        self.index.get(&(vert_stride, width, horz_stride)).copied()
    }

    /// Returns the shared region for the triple, creating it if needed
    pub fn create(&mut self, vert_stride: u16, width: u16, horz_stride: u16) -> RegionId {
        if let Some(id) = self.lookup(vert_stride, width, horz_stride) {
            return id;
        }
        let region = Region::new(vert_stride, width, horz_stride);
        let id = RegionId(self.regions.len() as u32);
        self.regions.push(region);
        if self.index.len() < self.capacity {
            self.index.insert(region.key(), id);
        } else {
            tracing::warn!(
                capacity = self.capacity,
                region = %region,
                "region pool full, allocating unshared region"
            );
        }
        id
    }

    pub fn get(&self, id: RegionId) -> Region {
        self.regions[id.index()]
    }

    /// Number of distinct region instances (pooled or not)
    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::super::operand::{DstRegion, RegAccess, RegBase};
    use super::*;

    fn regular(pool: &mut DeclarePool, file: RegFileKind, elems: u16, rows: u16, ty: ElemType) -> DeclareId {
        pool.create("V", file, elems, rows, ty, DeclareKind::Regular, None, None, None)
            .unwrap()
    }

    #[test]
    fn test_default_alignment_by_file_and_size() {
        let mut pool = DeclarePool::new(32);
        let full = regular(&mut pool, RegFileKind::Grf, 8, 1, ElemType::F);
        let small = regular(&mut pool, RegFileKind::Grf, 2, 1, ElemType::F);
        let bytes = regular(&mut pool, RegFileKind::Grf, 4, 1, ElemType::UB);
        let addr = regular(&mut pool, RegFileKind::Address, 8, 1, ElemType::UW);
        let flag32 = regular(&mut pool, RegFileKind::Flag, 2, 1, ElemType::UW);
        let flag16 = regular(&mut pool, RegFileKind::Flag, 1, 1, ElemType::UW);

        assert_eq!(pool.get(full).sub_reg_align(), SubRegAlign::Grf);
        assert_eq!(pool.get(small).sub_reg_align(), SubRegAlign::EVEN_WORD);
        assert_eq!(pool.get(bytes).sub_reg_align(), SubRegAlign::Any);
        assert_eq!(pool.get(addr).sub_reg_align(), SubRegAlign::Any);
        assert_eq!(pool.get(flag32).num_flag_elems(), 32);
        assert_eq!(pool.get(flag32).sub_reg_align(), SubRegAlign::EVEN_WORD);
        assert_eq!(pool.get(flag16).sub_reg_align(), SubRegAlign::Any);
    }

    #[test]
    fn test_alias_chain_accumulates_offsets() {
        let mut pool = DeclarePool::new(32);
        let root = regular(&mut pool, RegFileKind::Grf, 8, 4, ElemType::UD);
        let mid = regular(&mut pool, RegFileKind::Grf, 16, 2, ElemType::UW);
        let leaf = regular(&mut pool, RegFileKind::Grf, 4, 1, ElemType::F);
        pool.set_alias(mid, root, 32).unwrap();
        pool.set_alias(leaf, mid, 8).unwrap();

        assert_eq!(pool.root_declare(leaf), (root, 40));
        assert_eq!(pool.root_declare(root), (root, 0));
        assert_eq!(pool.alias_links(leaf).len(), 2);
    }

    #[test]
    fn test_alias_cycle_rejected() {
        let mut pool = DeclarePool::new(32);
        let a = regular(&mut pool, RegFileKind::Grf, 8, 1, ElemType::UD);
        let b = regular(&mut pool, RegFileKind::Grf, 8, 1, ElemType::UD);
        pool.set_alias(a, b, 0).unwrap();
        assert!(matches!(pool.set_alias(b, a, 0), Err(Error::AliasCycle { .. })));
        assert!(matches!(pool.set_alias(a, a, 0), Err(Error::AliasCycle { .. })));
    }

    #[test]
    fn test_binding_kinds_require_companions() {
        let mut pool = DeclarePool::new(32);
        let base = regular(&mut pool, RegFileKind::Grf, 8, 1, ElemType::UD);

        let err = pool
            .create("T", RegFileKind::Grf, 8, 1, ElemType::UD, DeclareKind::Tmp, None, None, None)
            .unwrap_err();
        assert!(matches!(err, Error::MissingBindingOperand { .. }));

        let dst = Operand::Dst(DstRegion {
            base: RegBase::Declare(base),
            access: RegAccess::Direct,
            row_off: 0,
            sub_reg_off: 0,
            horz_stride: 1,
            ty: ElemType::UD,
        });
        let spill = pool
            .create(
                "S",
                RegFileKind::Grf,
                8,
                1,
                ElemType::UD,
                DeclareKind::Spill,
                Some(base),
                Some((OperandId(0), &dst)),
                Some(ExecSize::SIMD8),
            )
            .unwrap();
        assert!(matches!(
            pool.get(spill).reg_var().kind(),
            RegVarKind::Transient {
                kind: TransientKind::Spill,
                ..
            }
        ));

        // a fill needs a source region, not a destination
        let err = pool
            .create(
                "F",
                RegFileKind::Grf,
                8,
                1,
                ElemType::UD,
                DeclareKind::Fill,
                Some(base),
                Some((OperandId(0), &dst)),
                None,
            )
            .unwrap_err();
        assert!(matches!(err, Error::MissingBindingOperand { .. }));
    }

    #[test]
    fn test_addr_spill_slots_are_unique() {
        let mut pool = DeclarePool::new(32);
        let a = pool
            .create("A", RegFileKind::Grf, 1, 1, ElemType::UW, DeclareKind::AddrSpill, None, None, None)
            .unwrap();
        let b = pool
            .create("B", RegFileKind::Grf, 1, 1, ElemType::UW, DeclareKind::AddrSpill, None, None, None)
            .unwrap();
        assert_eq!(pool.get(a).reg_var().kind(), &RegVarKind::AddrSpill { slot: 0 });
        assert_eq!(pool.get(b).reg_var().kind(), &RegVarKind::AddrSpill { slot: 1 });
    }

    #[test]
    fn test_region_pool_shares_and_degrades() {
        let mut pool = RegionPool::new(2);
        let a = pool.create(8, 8, 1);
        assert_eq!(pool.create(8, 8, 1), a);
        let b = pool.create(0, 1, 0);
        assert_ne!(a, b);

        // full: a third distinct region is allocated but not shared
        let c1 = pool.create(16, 16, 1);
        let c2 = pool.create(16, 16, 1);
        assert_ne!(c1, c2);
        assert_eq!(pool.get(c1), pool.get(c2));
    }

    #[test]
    fn test_imm_pool_degrades_when_full() {
        let mut pool = ImmPool::new(1);
        let mut next = 0u32;
        let mut alloc = || {
            next += 1;
            OperandId(next)
        };
        let a = pool.get_or_insert_with(1, ElemType::UD, &mut alloc);
        assert_eq!(pool.get_or_insert_with(1, ElemType::UD, &mut alloc), a);
        let b1 = pool.get_or_insert_with(2, ElemType::UD, &mut alloc);
        let b2 = pool.get_or_insert_with(2, ElemType::UD, &mut alloc);
        assert_ne!(b1, b2);
        assert_eq!(pool.len(), 1);
    }
}
