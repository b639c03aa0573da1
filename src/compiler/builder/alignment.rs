//! Alignment analyzer
//!
//! [`IrBuilder::is_aligned`] answers whether an operand starts at a multiple
//! of a byte alignment. When the answer depends only on where the allocator
//! will later place a declare, the root declare's sub-register alignment is
//! tightened so the answer stays true. Alignments are only ever raised.
//!
//! Address registers are followed through their single definition:
//!
//! ```text
//! shl  (1) t   idx   log2(align)     or   and (1) t idx ~(align-1)
//! add  (1) a0  t     &V + off
//! mov  (8) r[a0, disp] ...
//! ```
//!
//! Any link with zero or several definitions makes the operand unaligned.

use super::IrBuilder;
use crate::compiler::ir::{
    DeclareId, InstrId, Opcode, Operand, OperandId, PhyReg, RegAccess, RegBase, RegFileKind,
    SubRegAlign,
};

impl IrBuilder {
    /// True if `operand` is provably aligned to `align` bytes. May tighten
    /// the alignment of the operand's root declare. Alignments that are not
    /// a power of two are never satisfied.
    pub fn is_aligned(&mut self, operand: OperandId, align: u32) -> bool {
        if !align.is_power_of_two() {
            tracing::trace!(required = align, "alignment is not a power of two");
            return false;
        }
        let (base, access, row_off, sub_reg_off, ty) = match self.operand(operand) {
            Operand::Imm(_)
            | Operand::AddrExp(_)
            | Operand::Label(_)
            | Operand::CondMod(_)
            | Operand::Pred(_) => return true,
            Operand::Src(src) => (src.base, src.access, src.row_off, src.sub_reg_off, src.ty),
            Operand::Dst(dst) => (dst.base, dst.access, dst.row_off, dst.sub_reg_off, dst.ty),
        };

        if let RegAccess::Indirect { addr, imm_disp, .. } = access {
            return self.is_grf_or_half_grf(align)
                && self.addr_aligned(addr, imm_disp as i64, align, &mut Vec::new());
        }

        let grf = self.grf_size() as i64;
        let region_off = row_off as i64 * grf + sub_reg_off as i64 * ty.size() as i64;
        match base {
            RegBase::Declare(decl) => {
                self.declare_aligned(decl, region_off, align, &mut Vec::new())
            }
            RegBase::Phys(PhyReg::Null) => true,
            RegBase::Phys(PhyReg::Grf(n)) => (n as i64 * grf + region_off) % align as i64 == 0,
            RegBase::Phys(_) => region_off % align as i64 == 0,
        }
    }

    fn is_grf_or_half_grf(&self, align: u32) -> bool {
        let grf = self.grf_size();
        align == grf || align == grf / 2
    }

    /// Checks `decl + extra` bytes against `align`, walking the alias chain.
    /// `visiting` holds the address roots already being followed.
    fn declare_aligned(
        &mut self,
        decl: DeclareId,
        extra: i64,
        align: u32,
        visiting: &mut Vec<DeclareId>,
    ) -> bool {
        let grf = self.grf_size();
        let mut offset = extra;

        for (link_decl, link) in self.declares.alias_links(decl) {
            let link_align = self.declares.get(link_decl).sub_reg_align();
            if link_align != SubRegAlign::Any && !compatible(link_align.bytes(grf), align) {
                tracing::trace!(
                    decl = %link_decl,
                    align = ?link_align,
                    required = align,
                    "alias link alignment incompatible"
                );
                return false;
            }
            offset += link.offset as i64;
        }

        let (root, _) = self.declares.root_declare(decl);
        let root_decl = self.declares.get(root);
        if let Some(addr) = root_decl.reg_var().byte_addr(grf, root_decl.elem_size()) {
            offset += addr as i64;
        }
        if offset % align as i64 != 0 {
            tracing::trace!(decl = %decl, offset, required = align, "offset not aligned");
            return false;
        }

        match root_decl.reg_file() {
            RegFileKind::Grf | RegFileKind::Input => self.tighten_grf_root(root, align),
            RegFileKind::Flag => {
                if align == 4 {
                    self.declares
                        .get_mut(root)
                        .tighten_sub_reg_align(SubRegAlign::EVEN_WORD, grf);
                }
                true
            }
            RegFileKind::Address => {
                if self.is_grf_or_half_grf(align) {
                    self.addr_aligned(root, 0, align, visiting)
                } else {
                    true
                }
            }
        }
    }

    /// Raises a GRF root to `align` if its current alignment divides it
    fn tighten_grf_root(&mut self, root: DeclareId, align: u32) -> bool {
        let grf = self.grf_size();
        let current = self.declares.get(root).sub_reg_align();
        let current_bytes = current.bytes(grf);
        if current == SubRegAlign::Any || (current_bytes < align && align % current_bytes == 0) {
            let tightened = self
                .declares
                .get_mut(root)
                .tighten_sub_reg_align(SubRegAlign::from_words(align / 2, grf), grf);
            tracing::trace!(decl = %root, align = ?tightened, "tightened root alignment");
            true
        } else {
            current_bytes >= align && current_bytes % align == 0
        }
    }

    /// The address in `addr` (plus `disp`) is a multiple of `align` by
    /// construction of its unique definition
    fn addr_aligned(
        &mut self,
        addr: DeclareId,
        disp: i64,
        align: u32,
        visiting: &mut Vec<DeclareId>,
    ) -> bool {
        if disp % align as i64 != 0 {
            return false;
        }
        let (root, _) = self.declares.root_declare(addr);
        if visiting.contains(&root) {
            tracing::trace!(decl = %addr, "address derived from itself");
            return false;
        }
        visiting.push(root);
        let Some(def) = self.unique_def(addr) else {
            tracing::trace!(decl = %addr, "address without a unique definition");
            return false;
        };
        let inst = self.instruction(def);
        if inst.opcode() != Opcode::Add || inst.exec_size().lanes() != 1 {
            return false;
        }
        let (Some(src0), Some(src1)) = (inst.src(0), inst.src(1)) else {
            return false;
        };

        let Some(index) = self.operand(src0).as_src().and_then(|s| s.base.declare()) else {
            return false;
        };
        if !self.index_aligned(index, align) {
            return false;
        }

        let Operand::AddrExp(exp) = self.operand(src1) else {
            return false;
        };
        let (decl, exp_off) = (exp.decl, exp.offset as i64);
        self.declare_aligned(decl, exp_off, align, visiting)
    }

    /// `index` is produced by a single `shl` or `and` that clears the low bits
    fn index_aligned(&self, index: DeclareId, align: u32) -> bool {
        let Some(def) = self.unique_def(index) else {
            return false;
        };
        let inst = self.instruction(def);
        let Some(imm) = inst
            .src(1)
            .and_then(|s| self.operand(s).as_imm())
            .map(|imm| imm.as_u64())
        else {
            return false;
        };
        match inst.opcode() {
            Opcode::Shl => imm < 64 && (1u64 << imm) % align as u64 == 0,
            Opcode::And => imm & (align as u64 - 1) == 0,
            _ => false,
        }
    }

    /// The only listed instruction writing `decl` (through any alias)
    pub(crate) fn unique_def(&self, decl: DeclareId) -> Option<InstrId> {
        let (root, _) = self.declares.root_declare(decl);
        let mut defs = self.instructions().filter(|(_, inst)| {
            inst.dst()
                .and_then(|d| self.operand(d).as_dst())
                .filter(|d| d.access == RegAccess::Direct)
                .and_then(|d| d.base.declare())
                .map(|d| self.declares.root_declare(d).0 == root)
                .unwrap_or(false)
        });
        let (first, _) = defs.next()?;
        defs.next().is_none().then_some(first)
    }
}

/// Link alignment of `link_bytes` is compatible with a requirement of
/// `align` bytes
fn compatible(link_bytes: u32, align: u32) -> bool {
    if link_bytes >= align {
        link_bytes % align == 0
    } else {
        align % link_bytes == 0
    }
}
