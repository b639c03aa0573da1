//! Predefined variables, kernel input binding and entry expansion
//!
//! Predefined variables are ABI-mandated registers. Depending on where their
//! value lives they are:
//!
//! - hard-wired into r0 at a fixed byte offset (r0 itself, group ids)
//! - placed in the predefined region that follows the kernel inputs
//! - fixed GRF blocks of the stack-call ABI, or the frame/stack pointers in
//!   the last GRF
//! - architecture registers (timestamp, state, control, channel enable, debug)
//! - computed at kernel entry from the r0 header (thread X/Y, hardware
//!   thread id, color)

use super::IrBuilder;
use crate::compiler::ir::{
    ArchReg, DeclareId, DeclareKind, ElemType, ExecSize, InstOptions, InstrId, Opcode, Operand,
    OperandId, PhyReg, RegFileKind,
};
use crate::{Error, Result};

/// ABI-mandated variables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PredefinedVar {
    Null,
    X,
    Y,
    GroupIdX,
    GroupIdY,
    GroupIdZ,
    LocalSizeX,
    LocalSizeY,
    LocalSizeZ,
    GroupCountX,
    GroupCountY,
    GroupCountZ,
    Tsc,
    R0,
    Arg,
    Ret,
    FeSp,
    FeFp,
    HwTid,
    Sr0,
    Cr0,
    Ce0,
    Dbg,
    Color,
}

/// Where a predefined variable's value lives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Storage {
    Null,
    /// Byte offset into r0
    R0(u32),
    /// Byte offset into the predefined region
    Region(u32),
    StackArg,
    StackRet,
    /// Sub-register (in qwords) of the last GRF
    LastGrf(u32),
    Arch(ArchReg),
    /// Derived from r0 by the entry expansion
    Computed,
}

impl PredefinedVar {
    pub const ALL: [PredefinedVar; 24] = [
        PredefinedVar::Null,
        PredefinedVar::X,
        PredefinedVar::Y,
        PredefinedVar::GroupIdX,
        PredefinedVar::GroupIdY,
        PredefinedVar::GroupIdZ,
        PredefinedVar::LocalSizeX,
        PredefinedVar::LocalSizeY,
        PredefinedVar::LocalSizeZ,
        PredefinedVar::GroupCountX,
        PredefinedVar::GroupCountY,
        PredefinedVar::GroupCountZ,
        PredefinedVar::Tsc,
        PredefinedVar::R0,
        PredefinedVar::Arg,
        PredefinedVar::Ret,
        PredefinedVar::FeSp,
        PredefinedVar::FeFp,
        PredefinedVar::HwTid,
        PredefinedVar::Sr0,
        PredefinedVar::Cr0,
        PredefinedVar::Ce0,
        PredefinedVar::Dbg,
        PredefinedVar::Color,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            PredefinedVar::Null => "%null",
            PredefinedVar::X => "%thread_x",
            PredefinedVar::Y => "%thread_y",
            PredefinedVar::GroupIdX => "%group_id_x",
            PredefinedVar::GroupIdY => "%group_id_y",
            PredefinedVar::GroupIdZ => "%group_id_z",
            PredefinedVar::LocalSizeX => "%local_size_x",
            PredefinedVar::LocalSizeY => "%local_size_y",
            PredefinedVar::LocalSizeZ => "%local_size_z",
            PredefinedVar::GroupCountX => "%group_count_x",
            PredefinedVar::GroupCountY => "%group_count_y",
            PredefinedVar::GroupCountZ => "%group_count_z",
            PredefinedVar::Tsc => "%tsc",
            PredefinedVar::R0 => "%r0",
            PredefinedVar::Arg => "%arg",
            PredefinedVar::Ret => "%retval",
            PredefinedVar::FeSp => "%sp",
            PredefinedVar::FeFp => "%fp",
            PredefinedVar::HwTid => "%hw_id",
            PredefinedVar::Sr0 => "%sr0",
            PredefinedVar::Cr0 => "%cr0",
            PredefinedVar::Ce0 => "%ce0",
            PredefinedVar::Dbg => "%dbg0",
            PredefinedVar::Color => "%color",
        }
    }

    fn storage(&self) -> Storage {
        match self {
            PredefinedVar::Null => Storage::Null,
            PredefinedVar::R0 => Storage::R0(0),
            PredefinedVar::GroupIdX => Storage::R0(4),
            PredefinedVar::GroupIdY => Storage::R0(24),
            PredefinedVar::GroupIdZ => Storage::R0(28),
            PredefinedVar::LocalSizeX => Storage::Region(0),
            PredefinedVar::LocalSizeY => Storage::Region(4),
            PredefinedVar::LocalSizeZ => Storage::Region(8),
            PredefinedVar::GroupCountX => Storage::Region(12),
            PredefinedVar::GroupCountY => Storage::Region(16),
            PredefinedVar::GroupCountZ => Storage::Region(20),
            PredefinedVar::Arg => Storage::StackArg,
            PredefinedVar::Ret => Storage::StackRet,
            PredefinedVar::FeSp => Storage::LastGrf(0),
            PredefinedVar::FeFp => Storage::LastGrf(1),
            PredefinedVar::Tsc => Storage::Arch(ArchReg::Tm0),
            PredefinedVar::Sr0 => Storage::Arch(ArchReg::Sr0),
            PredefinedVar::Cr0 => Storage::Arch(ArchReg::Cr0),
            PredefinedVar::Ce0 => Storage::Arch(ArchReg::Ce0),
            PredefinedVar::Dbg => Storage::Arch(ArchReg::Dbg),
            PredefinedVar::X | PredefinedVar::Y | PredefinedVar::HwTid | PredefinedVar::Color => {
                Storage::Computed
            }
        }
    }

    /// (type, elements per row, rows)
    fn shape(&self, builder: &IrBuilder) -> (ElemType, u16, u16) {
        let grf_dwords = (builder.grf_size() / 4) as u16;
        let abi = builder.options.stack_call;
        match self {
            PredefinedVar::X | PredefinedVar::Y | PredefinedVar::Color => (ElemType::UW, 1, 1),
            PredefinedVar::FeSp | PredefinedVar::FeFp => (ElemType::UQ, 1, 1),
            PredefinedVar::Tsc => (ElemType::UD, 5, 1),
            PredefinedVar::Sr0 => (ElemType::UD, 4, 1),
            PredefinedVar::Dbg => (ElemType::UD, 2, 1),
            PredefinedVar::Arg => (ElemType::UD, grf_dwords, abi.arg_size_grfs as u16),
            PredefinedVar::Ret => (ElemType::UD, grf_dwords, abi.ret_size_grfs as u16),
            _ => (ElemType::UD, 1, 1),
        }
    }
}

/// A kernel argument placed at a fixed payload byte offset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KernelInput {
    pub decl: DeclareId,
    /// Byte offset from the input payload base
    pub offset: u32,
}

impl IrBuilder {
    pub(super) fn create_predefined_vars(&mut self) -> Result<()> {
        let mut table = Vec::with_capacity(PredefinedVar::ALL.len());
        for var in PredefinedVar::ALL {
            let id = match var {
                PredefinedVar::R0 => self.builtins.r0,
                PredefinedVar::Null => self.builtins.null,
                _ => {
                    let (ty, elems, rows) = var.shape(self);
                    self.declares.create(
                        var.name(),
                        RegFileKind::Grf,
                        elems,
                        rows,
                        ty,
                        DeclareKind::Regular,
                        None,
                        None,
                        None,
                    )?
                }
            };
            table.push(id);
        }
        self.predefined = table;
        Ok(())
    }

    /// Declare backing a predefined variable
    pub fn predefined_var(&self, var: PredefinedVar) -> DeclareId {
        self.predefined[var as usize]
    }

    /// Creates an input declare living at `offset` bytes past the input
    /// payload base
    pub fn create_input(
        &mut self,
        name: impl Into<String>,
        num_elems: u16,
        num_rows: u16,
        ty: ElemType,
        offset: u32,
    ) -> Result<DeclareId> {
        let decl = self.create_declare(name, RegFileKind::Input, num_elems, num_rows, ty)?;
        self.inputs.push(KernelInput { decl, offset });
        Ok(decl)
    }

    /// First byte of the predefined region: the end of the inputs rounded up
    /// to a dword, or one GRF when there are no inputs
    pub fn predefined_region_start(&self) -> u32 {
        let base = self.options.input_payload_base;
        let end = self
            .inputs
            .iter()
            .map(|input| {
                base.saturating_add(input.offset)
                    .saturating_add(self.declares.get(input.decl).byte_size())
            })
            .max();
        match end {
            Some(end) => end.saturating_add(3) & !3,
            None => self.grf_size(),
        }
    }

    /// Pins every input and predefined variable to its physical location.
    ///
    /// Fails if anything other than the frame/stack pointers would reach a
    /// reserved GRF.
    pub fn bind_kernel_inputs(&mut self) -> Result<()> {
        let grf = self.grf_size();
        let limit = self.options.usable_grfs();
        let base = self.options.input_payload_base;

        for input in self.inputs.clone() {
            let decl = self.declares.get(input.decl);
            let start =
                check_in_range(decl.name(), base, input.offset, decl.byte_size(), grf, limit)?;
            let sub_reg = (start % grf) / decl.elem_size();
            tracing::debug!(
                input = decl.name(),
                grf = start / grf,
                sub_reg,
                "binding kernel input"
            );
            self.declares
                .get_mut(input.decl)
                .reg_var_mut()
                .pin(PhyReg::Grf(start / grf), sub_reg);
        }

        let region_start = self.predefined_region_start();
        let abi = self.options.stack_call;
        let last_grf = self.options.platform.total_grfs.saturating_sub(1);

        for var in PredefinedVar::ALL {
            let id = self.predefined_var(var);
            let decl = self.declares.get(id);
            let elem_size = decl.elem_size();
            let (reg, sub_reg) = match var.storage() {
                Storage::Computed => continue,
                Storage::Null => (PhyReg::Null, 0),
                Storage::Arch(arch) => (PhyReg::Arch(arch), 0),
                Storage::R0(byte) => (PhyReg::Grf(0), byte / elem_size),
                Storage::Region(off) => {
                    let start = check_in_range(
                        decl.name(),
                        region_start,
                        off,
                        decl.byte_size(),
                        grf,
                        limit,
                    )?;
                    (PhyReg::Grf(start / grf), (start % grf) / elem_size)
                }
                Storage::StackArg => {
                    let start = abi.arg_start_grf.saturating_mul(grf);
                    check_in_range(decl.name(), start, 0, decl.byte_size(), grf, limit)?;
                    (PhyReg::Grf(abi.arg_start_grf), 0)
                }
                Storage::StackRet => {
                    let start = abi.ret_start_grf.saturating_mul(grf);
                    check_in_range(decl.name(), start, 0, decl.byte_size(), grf, limit)?;
                    (PhyReg::Grf(abi.ret_start_grf), 0)
                }
                // exempt from the reserved-GRF check
                Storage::LastGrf(sub) => (PhyReg::Grf(last_grf), sub),
            };
            tracing::debug!(var = var.name(), reg = %reg, sub_reg, "binding predefined variable");
            self.declares.get_mut(id).reg_var_mut().pin(reg, sub_reg);
        }
        Ok(())
    }

    /// Materializes the r0-derived predefined variables that the kernel
    /// uses, right before its first non-label instruction, in the order
    /// hardware thread id, X, Y, color. Later calls do nothing.
    pub fn expand_predefined_vars(&mut self) -> Result<()> {
        if self.predefined_expanded {
            tracing::debug!("predefined variables already expanded");
            return Ok(());
        }
        let new_r0 = self.options.new_r0_format;
        let mut expansion: Vec<InstrId> = Vec::new();

        if self.is_var_used(PredefinedVar::HwTid) {
            let mask = self.options.platform.generation.hw_tid_mask();
            let id = self.r0_and(PredefinedVar::HwTid, 5, mask)?;
            expansion.push(id);
        }

        if self.is_var_used(PredefinedVar::X) {
            let mask = if new_r0 { 0xFFF } else { 0x1FF };
            let id = self.r0_and(PredefinedVar::X, 1, mask)?;
            expansion.push(id);
        }

        if self.is_var_used(PredefinedVar::Y) {
            if new_r0 {
                // y = (r0.1 >> 16) & 0xfff
                let shr = self.r0_op(PredefinedVar::Y, Opcode::Shr, 1, 16)?;
                expansion.push(shr);
                let y = self.predefined_var(PredefinedVar::Y);
                let s = self.region_scalar();
                let dst = self.create_dst_region(y, 1);
                let src = self.create_src_region(y, s);
                let mask = self.create_imm(0xFFF, ElemType::UW);
                let and = self.create_bin_op(
                    Opcode::And,
                    ExecSize::SIMD1,
                    dst,
                    src,
                    mask,
                    InstOptions::WRITE_ENABLE,
                    false,
                )?;
                expansion.push(and);
            } else {
                let id = self.r0_and(PredefinedVar::Y, 6, 0x1FF)?;
                expansion.push(id);
            }
        }

        if self.is_var_used(PredefinedVar::Color) {
            let id = if new_r0 {
                self.r0_and(PredefinedVar::Color, 2, 0xF)?
            } else {
                self.r0_op(PredefinedVar::Color, Opcode::Shr, 2, 24)?
            };
            expansion.push(id);
        }

        let position = self
            .inst_list
            .iter()
            .position(|id| !self.instrs[id.index()].is_label())
            .unwrap_or(self.inst_list.len());
        tracing::debug!(count = expansion.len(), position, "expanding predefined variables");
        for (i, id) in expansion.into_iter().enumerate() {
            self.insert_before(position + i, id);
        }
        self.predefined_expanded = true;
        Ok(())
    }

    /// `and (1) var r0.<sub>:ud mask`
    fn r0_and(&mut self, var: PredefinedVar, r0_sub: u16, mask: u32) -> Result<InstrId> {
        self.r0_op(var, Opcode::And, r0_sub, mask)
    }

    /// `<op> (1) var r0.<sub>:ud imm`, detached
    fn r0_op(
        &mut self,
        var: PredefinedVar,
        opcode: Opcode,
        r0_sub: u16,
        imm: u32,
    ) -> Result<InstrId> {
        let decl = self.predefined_var(var);
        let r0 = self.builtins.r0;
        let s = self.region_scalar();
        let dst = self.create_dst_region(decl, 1);
        let src = self.create_src(r0, 0, r0_sub, s, ElemType::UD);
        let imm = self.create_imm(imm as i64, ElemType::UD);
        self.create_bin_op(
            opcode,
            ExecSize::SIMD1,
            dst,
            src,
            imm,
            InstOptions::WRITE_ENABLE,
            false,
        )
    }

    /// Any listed instruction reads or writes the variable
    fn is_var_used(&self, var: PredefinedVar) -> bool {
        let decl = self.predefined_var(var);
        self.instructions().any(|(_, inst)| {
            inst.dst()
                .into_iter()
                .chain(inst.srcs())
                .chain(inst.predicate())
                .chain(inst.cond_mod())
                .any(|op| self.operand_references(op, decl))
        })
    }

    fn operand_references(&self, op: OperandId, decl: DeclareId) -> bool {
        match self.operand(op) {
            Operand::Pred(pred) => pred.flag == decl,
            Operand::CondMod(cm) => cm.flag == Some(decl),
            other => other
                .base_declare()
                .map(|d| self.declares.root_declare(d).0 == decl)
                .unwrap_or(false),
        }
    }
}

/// `[base + offset, base + offset + size)` must end before GRF `limit`.
/// Returns the start byte.
fn check_in_range(
    name: &str,
    base: u32,
    offset: u32,
    size: u32,
    grf: u32,
    limit: u32,
) -> Result<u32> {
    let out_of_range = |last: u32| Error::InputOutOfRange {
        name: name.to_string(),
        grf: last,
        limit,
    };
    let past_end = || out_of_range(u32::MAX / grf);
    let start = base.checked_add(offset).ok_or_else(past_end)?;
    let end = start.checked_add(size.max(1) - 1).ok_or_else(past_end)?;
    let last = end / grf;
    if last >= limit {
        return Err(out_of_range(last));
    }
    Ok(start)
}
