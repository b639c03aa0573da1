//! Instruction constructors and list editing
//!
//! Every constructor takes `append`: `true` places the instruction at the end
//! of the kernel's list, `false` leaves it detached so the caller can insert
//! it later with [`IrBuilder::insert_before`] or
//! [`IrBuilder::append_instruction`]. Detached instructions are invisible to
//! anything that walks the list.

use super::IrBuilder;
use crate::compiler::ir::{
    ExecSize, InstKind, InstOptions, InstrId, Instruction, Intrinsic, MathFunction, Opcode,
    Operand, OperandId,
};
use crate::{Error, Result};

impl IrBuilder {
    /// Generic two-source instruction
    #[allow(clippy::too_many_arguments)]
    pub fn create_instruction(
        &mut self,
        pred: Option<OperandId>,
        opcode: Opcode,
        cond_mod: Option<OperandId>,
        saturate: bool,
        exec_size: ExecSize,
        dst: Option<OperandId>,
        src0: Option<OperandId>,
        src1: Option<OperandId>,
        options: InstOptions,
        append: bool,
    ) -> Result<InstrId> {
        self.create_inst3(
            pred, opcode, cond_mod, saturate, exec_size, dst, src0, src1, None, options, append,
        )
    }

    /// Generic three-source instruction
    #[allow(clippy::too_many_arguments)]
    pub fn create_inst3(
        &mut self,
        pred: Option<OperandId>,
        opcode: Opcode,
        cond_mod: Option<OperandId>,
        saturate: bool,
        exec_size: ExecSize,
        dst: Option<OperandId>,
        src0: Option<OperandId>,
        src1: Option<OperandId>,
        src2: Option<OperandId>,
        options: InstOptions,
        append: bool,
    ) -> Result<InstrId> {
        check_generic_opcode(opcode, saturate)?;
        let inst = self.new_instruction(
            opcode,
            exec_size,
            pred,
            cond_mod,
            saturate,
            dst,
            [src0, src1, src2],
            options,
            InstKind::Generic,
        );
        Ok(self.add_instruction(inst, append))
    }

    pub fn create_mov(
        &mut self,
        exec_size: ExecSize,
        dst: OperandId,
        src: OperandId,
        options: InstOptions,
        append: bool,
    ) -> Result<InstrId> {
        self.create_instruction(
            None,
            Opcode::Mov,
            None,
            false,
            exec_size,
            Some(dst),
            Some(src),
            None,
            options,
            append,
        )
    }

    #[allow(clippy::too_many_arguments)]
    pub fn create_bin_op(
        &mut self,
        opcode: Opcode,
        exec_size: ExecSize,
        dst: OperandId,
        src0: OperandId,
        src1: OperandId,
        options: InstOptions,
        append: bool,
    ) -> Result<InstrId> {
        self.create_instruction(
            None,
            opcode,
            None,
            false,
            exec_size,
            Some(dst),
            Some(src0),
            Some(src1),
            options,
            append,
        )
    }

    /// Label definition; `label` must be a label operand
    pub fn create_label_inst(&mut self, label: OperandId, append: bool) -> Result<InstrId> {
        let operand = self.operand(label);
        if !matches!(operand, Operand::Label(_)) {
            return Err(Error::InvalidOperand {
                expected: "label",
                got: operand.kind_name(),
            });
        }
        let inst = self.new_instruction(
            Opcode::Label,
            ExecSize::SIMD1,
            None,
            None,
            false,
            None,
            [Some(label), None, None],
            InstOptions::NONE,
            InstKind::Generic,
        );
        Ok(self.add_instruction(inst, append))
    }

    /// Flow-control instruction with optional jump/join targets
    #[allow(clippy::too_many_arguments)]
    pub fn create_cf_instruction(
        &mut self,
        pred: Option<OperandId>,
        opcode: Opcode,
        exec_size: ExecSize,
        jip: Option<OperandId>,
        uip: Option<OperandId>,
        options: InstOptions,
        append: bool,
    ) -> Result<InstrId> {
        if !opcode.is_flow_control() {
            return Err(Error::WrongConstructor {
                opcode: opcode.to_string(),
                expected: "create_instruction",
            });
        }
        for target in [jip, uip].into_iter().flatten() {
            let operand = self.operand(target);
            if !matches!(operand, Operand::Label(_)) {
                return Err(Error::InvalidOperand {
                    expected: "label",
                    got: operand.kind_name(),
                });
            }
        }
        let inst = self.new_instruction(
            opcode,
            exec_size,
            pred,
            None,
            false,
            None,
            [None, None, None],
            options,
            InstKind::FlowControl { jip, uip },
        );
        Ok(self.add_instruction(inst, append))
    }

    #[allow(clippy::too_many_arguments)]
    pub fn create_math(
        &mut self,
        pred: Option<OperandId>,
        function: MathFunction,
        saturate: bool,
        exec_size: ExecSize,
        dst: OperandId,
        src0: OperandId,
        src1: Option<OperandId>,
        options: InstOptions,
        append: bool,
    ) -> Result<InstrId> {
        let src1 = if function.is_unary() { None } else { src1 };
        let inst = self.new_instruction(
            Opcode::Math,
            exec_size,
            pred,
            None,
            saturate,
            Some(dst),
            [Some(src0), src1, None],
            options,
            InstKind::Math { function },
        );
        Ok(self.add_instruction(inst, append))
    }

    #[allow(clippy::too_many_arguments)]
    pub fn create_intrinsic(
        &mut self,
        pred: Option<OperandId>,
        intrinsic: Intrinsic,
        exec_size: ExecSize,
        dst: Option<OperandId>,
        src0: Option<OperandId>,
        src1: Option<OperandId>,
        src2: Option<OperandId>,
        options: InstOptions,
        append: bool,
    ) -> Result<InstrId> {
        let inst = self.new_instruction(
            Opcode::Intrinsic,
            exec_size,
            pred,
            None,
            false,
            dst,
            [src0, src1, src2],
            options,
            InstKind::Intrinsic(intrinsic),
        );
        Ok(self.add_instruction(inst, append))
    }

    // ------------------------------------------------------------------
    // List editing
    // ------------------------------------------------------------------

    /// Appends a detached instruction to the kernel
    pub fn append_instruction(&mut self, id: InstrId) {
        self.stamp_location(id);
        self.inst_list.push(id);
    }

    /// Inserts a detached instruction at `position` of the list; positions
    /// past the end append
    pub fn insert_before(&mut self, position: usize, id: InstrId) {
        let position = position.min(self.inst_list.len());
        self.stamp_location(id);
        self.inst_list.insert(position, id);
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new_instruction(
        &self,
        opcode: Opcode,
        exec_size: ExecSize,
        predicate: Option<OperandId>,
        cond_mod: Option<OperandId>,
        saturate: bool,
        dst: Option<OperandId>,
        srcs: [Option<OperandId>; 3],
        options: InstOptions,
        kind: InstKind,
    ) -> Instruction {
        Instruction {
            opcode,
            exec_size,
            predicate,
            cond_mod,
            saturate,
            dst,
            srcs,
            options,
            kind,
            cisa_offset: self.cisa_offset,
            location: None,
        }
    }

    /// Moves `inst` into the arena, appending it to the list if asked
    pub(crate) fn add_instruction(&mut self, inst: Instruction, append: bool) -> InstrId {
        let id = InstrId(self.instrs.len() as u32);
        self.instrs.push(inst);
        if append {
            self.append_instruction(id);
        }
        id
    }

    fn stamp_location(&mut self, id: InstrId) {
        if self.options.track_source_locations {
            let inst = &mut self.instrs[id.index()];
            if inst.location.is_none() {
                inst.location = self.location.clone();
            }
        }
    }
}

fn check_generic_opcode(opcode: Opcode, saturate: bool) -> Result<()> {
    let expected = if opcode.is_flow_control() {
        if saturate {
            return Err(Error::SaturationOnFlowControl {
                opcode: opcode.to_string(),
            });
        }
        "create_cf_instruction"
    } else if opcode.is_math() {
        "create_math"
    } else if opcode.is_send() {
        "create_send"
    } else if opcode == Opcode::Label {
        "create_label_inst"
    } else if opcode == Opcode::Intrinsic {
        "create_intrinsic"
    } else {
        return Ok(());
    };
    Err(Error::WrongConstructor {
        opcode: opcode.to_string(),
        expected,
    })
}
