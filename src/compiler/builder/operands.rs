//! Operand constructors, immediates and temporaries

use super::IrBuilder;
use crate::compiler::ir::{
    AddrExp, CondMod, CondModifier, DeclareId, DstRegion, ElemType, Immediate, Label, LabelKind,
    Operand, OperandId, PhyReg, PredControl, PredState, Predicate, RegAccess, RegBase,
    RegFileKind, RegionId, SrcModifier, SrcRegion, SubRegAlign,
};
use crate::Result;

impl IrBuilder {
    // ------------------------------------------------------------------
    // Regions
    // ------------------------------------------------------------------

    pub fn create_region(&mut self, vert_stride: u16, width: u16, horz_stride: u16) -> RegionId {
        self.regions.create(vert_stride, width, horz_stride)
    }

    /// `<0;1,0>`
    pub fn region_scalar(&mut self) -> RegionId {
        self.create_region(0, 1, 0)
    }

    /// `<1;1,0>`
    pub fn region_stride1(&mut self) -> RegionId {
        self.create_region(1, 1, 0)
    }

    /// `<n;n,1>`
    pub fn region_n(&mut self, n: u16) -> RegionId {
        self.create_region(n, n, 1)
    }

    // ------------------------------------------------------------------
    // Register regions
    // ------------------------------------------------------------------

    pub fn create_src(
        &mut self,
        decl: DeclareId,
        row_off: u16,
        sub_reg_off: u16,
        region: RegionId,
        ty: ElemType,
    ) -> OperandId {
        self.create_src_with_modifier(SrcModifier::None, decl, row_off, sub_reg_off, region, ty)
    }

    pub fn create_src_with_modifier(
        &mut self,
        modifier: SrcModifier,
        decl: DeclareId,
        row_off: u16,
        sub_reg_off: u16,
        region: RegionId,
        ty: ElemType,
    ) -> OperandId {
        self.alloc_operand(Operand::Src(SrcRegion {
            modifier,
            base: RegBase::Declare(decl),
            access: RegAccess::Direct,
            row_off,
            sub_reg_off,
            region,
            ty,
        }))
    }

    /// Source over a physical register (architecture registers, null)
    pub fn create_src_phys(
        &mut self,
        reg: PhyReg,
        row_off: u16,
        sub_reg_off: u16,
        region: RegionId,
        ty: ElemType,
    ) -> OperandId {
        self.alloc_operand(Operand::Src(SrcRegion {
            modifier: SrcModifier::None,
            base: RegBase::Phys(reg),
            access: RegAccess::Direct,
            row_off,
            sub_reg_off,
            region,
            ty,
        }))
    }

    /// Whole-declare source at row 0, sub-register 0, in the declare's type
    pub fn create_src_region(&mut self, decl: DeclareId, region: RegionId) -> OperandId {
        let ty = self.declares.get(decl).elem_type();
        self.create_src(decl, 0, 0, region, ty)
    }

    /// Source addressed through `addr.addr_sub_reg` plus `imm_disp` bytes
    pub fn create_indirect_src(
        &mut self,
        addr: DeclareId,
        addr_sub_reg: u16,
        region: RegionId,
        ty: ElemType,
        imm_disp: i16,
    ) -> OperandId {
        self.alloc_operand(Operand::Src(SrcRegion {
            modifier: SrcModifier::None,
            base: RegBase::Declare(addr),
            access: RegAccess::Indirect {
                addr,
                addr_sub_reg,
                imm_disp,
            },
            row_off: 0,
            sub_reg_off: 0,
            region,
            ty,
        }))
    }

    pub fn create_dst(
        &mut self,
        decl: DeclareId,
        row_off: u16,
        sub_reg_off: u16,
        horz_stride: u16,
        ty: ElemType,
    ) -> OperandId {
        self.alloc_operand(Operand::Dst(DstRegion {
            base: RegBase::Declare(decl),
            access: RegAccess::Direct,
            row_off,
            sub_reg_off,
            horz_stride,
            ty,
        }))
    }

    /// Whole-declare destination in the declare's type
    pub fn create_dst_region(&mut self, decl: DeclareId, horz_stride: u16) -> OperandId {
        let ty = self.declares.get(decl).elem_type();
        self.create_dst(decl, 0, 0, horz_stride, ty)
    }

    pub fn create_indirect_dst(
        &mut self,
        addr: DeclareId,
        addr_sub_reg: u16,
        horz_stride: u16,
        ty: ElemType,
        imm_disp: i16,
    ) -> OperandId {
        self.alloc_operand(Operand::Dst(DstRegion {
            base: RegBase::Declare(addr),
            access: RegAccess::Indirect {
                addr,
                addr_sub_reg,
                imm_disp,
            },
            row_off: 0,
            sub_reg_off: 0,
            horz_stride,
            ty,
        }))
    }

    pub fn create_null_dst(&mut self, ty: ElemType) -> OperandId {
        self.alloc_operand(Operand::Dst(DstRegion {
            base: RegBase::Phys(PhyReg::Null),
            access: RegAccess::Direct,
            row_off: 0,
            sub_reg_off: 0,
            horz_stride: 1,
            ty,
        }))
    }

    // ------------------------------------------------------------------
    // Other operand kinds
    // ------------------------------------------------------------------

    pub fn create_predicate(
        &mut self,
        state: PredState,
        flag: DeclareId,
        sub_reg_off: u16,
        control: PredControl,
    ) -> OperandId {
        self.alloc_operand(Operand::Pred(Predicate {
            state,
            flag,
            sub_reg_off,
            control,
        }))
    }

    pub fn create_cond_mod(
        &mut self,
        modifier: CondModifier,
        flag: Option<DeclareId>,
        sub_reg_off: u16,
    ) -> OperandId {
        self.alloc_operand(Operand::CondMod(CondMod {
            modifier,
            flag,
            sub_reg_off,
        }))
    }

    pub fn create_label(&mut self, name: impl Into<String>, kind: LabelKind) -> OperandId {
        self.alloc_operand(Operand::Label(Label {
            name: name.into(),
            kind,
        }))
    }

    /// `&decl + offset`
    pub fn create_addr_exp(&mut self, decl: DeclareId, offset: i32, ty: ElemType) -> OperandId {
        self.alloc_operand(Operand::AddrExp(AddrExp { decl, offset, ty }))
    }

    /// Private copy of an operand, never shared with the original's users
    pub fn duplicate_operand(&mut self, id: OperandId) -> OperandId {
        let copy = self.operands[id.index()].clone();
        self.alloc_operand(copy)
    }

    // ------------------------------------------------------------------
    // Immediates
    // ------------------------------------------------------------------

    /// Pooled immediate with the raw bit pattern `bits`
    pub fn create_imm(&mut self, bits: i64, ty: ElemType) -> OperandId {
        let bits = canonical_bits(bits, ty);
        let operands = &mut self.operands;
        self.imm_pool.get_or_insert_with(bits, ty, || {
            let id = OperandId(operands.len() as u32);
            operands.push(Operand::Imm(Immediate { bits, ty }));
            id
        })
    }

    /// Float immediate, narrowed to `hf` when enabled and lossless
    pub fn create_imm_f32(&mut self, value: f32) -> OperandId {
        if self.options.narrow_float_immediates() {
            if let Some(half) = f32_to_f16_exact(value) {
                return self.create_imm(half as i64, ElemType::HF);
            }
        }
        self.create_imm(value.to_bits() as i64, ElemType::F)
    }

    /// Integer immediate in the narrowest type of `ty`'s signedness that
    /// holds `value` (w/uw, then d/ud). Never widens.
    pub fn create_imm_with_lower_type(&mut self, value: i64, ty: ElemType) -> OperandId {
        let lowered = if ty.is_signed_int() {
            if i16::try_from(value).is_ok() {
                ElemType::W
            } else if i32::try_from(value).is_ok() {
                ElemType::D
            } else {
                ty
            }
        } else if ty.is_unsigned_int() {
            if u16::try_from(value).is_ok() {
                ElemType::UW
            } else if u32::try_from(value).is_ok() {
                ElemType::UD
            } else {
                ty
            }
        } else {
            ty
        };
        let ty = if lowered.size() < ty.size() { lowered } else { ty };
        self.create_imm(value, ty)
    }

    // ------------------------------------------------------------------
    // Temporaries
    // ------------------------------------------------------------------

    /// Scratch declare of `num_elems` elements. Up to one GRF fits in a
    /// single row; larger requests use full rows, the last one partially.
    pub fn create_temp_var(
        &mut self,
        num_elems: u32,
        ty: ElemType,
        align: SubRegAlign,
        prefix: &str,
    ) -> Result<DeclareId> {
        let grf = self.grf_size();
        let total_bytes = num_elems * ty.size();
        let (width, rows) = if total_bytes <= grf {
            (num_elems, 1)
        } else {
            (grf / ty.size(), (total_bytes + grf - 1) / grf)
        };
        let name = format!("{}{}", prefix, self.temp_count);
        self.temp_count += 1;
        let id = self.create_declare(name, RegFileKind::Grf, width as u16, rows as u16, ty)?;
        self.declares.get_mut(id).set_sub_reg_align(align);
        Ok(id)
    }

    /// Flag declare of `words` 16-bit words
    pub fn create_temp_flag(&mut self, words: u16) -> Result<DeclareId> {
        let name = format!("TF{}", self.temp_count);
        self.temp_count += 1;
        self.create_declare(name, RegFileKind::Flag, words, 1, ElemType::UW)
    }
}

/// Normalizes a bit pattern to the width of `ty` (sign-extended for signed
/// integers, zero-extended otherwise) so equal values share a pool key
fn canonical_bits(bits: i64, ty: ElemType) -> i64 {
    let signed = ty.is_signed_int();
    match ty.size() {
        1 if signed => bits as i8 as i64,
        1 => bits as u8 as i64,
        2 if signed => bits as i16 as i64,
        2 => bits as u16 as i64,
        4 if signed => bits as i32 as i64,
        4 => bits as u32 as i64,
        _ => bits,
    }
}

/// Half-float encoding of `value` if it converts without loss.
///
/// Accepts signed zeros, and values whose low 13 mantissa bits are clear
/// with an unbiased exponent in [-16, 15]; the result must round-trip.
fn f32_to_f16_exact(value: f32) -> Option<u16> {
    let bits = value.to_bits();
    let sign = ((bits >> 16) & 0x8000) as u16;
    if bits & 0x7FFF_FFFF == 0 {
        return Some(sign);
    }
    let exp = ((bits >> 23) & 0xFF) as i32 - 127;
    let mant = bits & 0x7F_FFFF;
    if mant & 0x1FFF != 0 || !(-16..=15).contains(&exp) {
        return None;
    }
    let half = if exp >= -14 {
        sign | (((exp + 15) as u16) << 10) | (mant >> 13) as u16
    } else {
        // subnormal half: the implicit one moves into the mantissa
        let full = 0x400 | (mant >> 13);
        let shift = (-14 - exp) as u32;
        if full & ((1 << shift) - 1) != 0 {
            return None;
        }
        sign | (full >> shift) as u16
    };
    (f16_to_f32(half).to_bits() == bits).then_some(half)
}

fn f16_to_f32(half: u16) -> f32 {
    let sign = ((half & 0x8000) as u32) << 16;
    let exp = ((half >> 10) & 0x1F) as u32;
    let mant = (half & 0x3FF) as u32;
    let bits = match (exp, mant) {
        (0, 0) => sign,
        (0, m) => {
            // normalize a subnormal
            let shift = m.leading_zeros() - 21;
            let m = (m << shift) & 0x3FF;
            sign | ((127 - 15 + 1 - shift) << 23) | (m << 13)
        }
        (0x1F, m) => sign | 0x7F80_0000 | (m << 13),
        (e, m) => sign | ((e + 127 - 15) << 23) | (m << 13),
    };
    f32::from_bits(bits)
}
