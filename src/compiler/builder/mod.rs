//! IR builder
//!
//! [`IrBuilder`] is the construction API the frontend drives, one instance
//! per kernel. It owns every table of the compilation unit:
//!
//! - the [`DeclarePool`] with all declares
//! - the operand arena plus the immediate and region pools
//! - the instruction arena and the ordered instruction list
//!
//! The implementation is split by concern:
//!
//! | File | Contents |
//! |------|----------|
//! | `operands.rs` | operand constructors, immediates, temporaries |
//! | `instructions.rs` | instruction constructors, list editing |
//! | `predefined.rs` | predefined variables, input binding, entry expansion |
//! | `alignment.rs` | alignment analyzer |
//! | `send.rs` | send construction and descriptor lowering |

mod alignment;
mod instructions;
mod operands;
mod predefined;
mod send;

pub use predefined::{KernelInput, PredefinedVar};
pub use send::SendMessage;

use super::ir::{
    Declare, DeclareId, DeclareKind, DeclarePool, ElemType, ImmPool, InstrId, Instruction,
    Operand, OperandId, PhyReg, RegFileKind, RegionPool, SourceLocation,
};
use super::BuilderOptions;
use crate::Result;
use std::sync::Arc;

/// Declares every builder creates up front
#[derive(Debug, Clone, Copy)]
pub struct Builtins {
    /// Thread payload header, pinned to r0
    pub r0: DeclareId,
    /// Address register a0.0 (ud)
    pub a0: DeclareId,
    /// a0.2 (ud), aliasing a0 at byte 8
    pub a0_dot2: DeclareId,
    /// Bindless surface-state offset ("T252")
    pub t252: DeclareId,
    /// Bindless sampler-state offset
    pub bindless_sampler: DeclareId,
    /// The null register
    pub null: DeclareId,
}

/// Per-kernel IR construction context
#[derive(Debug)]
pub struct IrBuilder {
    kernel_name: String,
    options: BuilderOptions,
    declares: DeclarePool,
    operands: Vec<Operand>,
    imm_pool: ImmPool,
    regions: RegionPool,
    /// Every instruction ever created, listed or detached
    instrs: Vec<Instruction>,
    /// Kernel body in program order
    inst_list: Vec<InstrId>,
    cisa_offset: i32,
    location: Option<SourceLocation>,
    temp_count: u32,
    builtins: Builtins,
    /// Indexed by `PredefinedVar as usize`
    predefined: Vec<DeclareId>,
    inputs: Vec<KernelInput>,
    /// Entry sequence for the r0-derived variables already inserted
    predefined_expanded: bool,
}

impl IrBuilder {
    /// Creates a builder with the builtin and predefined declares in place
    pub fn new(kernel_name: impl Into<String>, options: BuilderOptions) -> Result<Self> {
        let grf_size = options.grf_size();
        let mut declares = DeclarePool::new(grf_size);

        let r0 = declares.create(
            "BuiltInR0",
            RegFileKind::Grf,
            (grf_size / 4) as u16,
            1,
            ElemType::UD,
            DeclareKind::Regular,
            None,
            None,
            None,
        )?;
        declares.get_mut(r0).reg_var_mut().pin(PhyReg::Grf(0), 0);

        let a0 = declares.create(
            "BuiltinA0",
            RegFileKind::Address,
            1,
            1,
            ElemType::UD,
            DeclareKind::Regular,
            None,
            None,
            None,
        )?;
        declares.get_mut(a0).reg_var_mut().pin(PhyReg::Addr(0), 0);

        let a0_dot2 = declares.create(
            "BuiltinA0Dot2",
            RegFileKind::Address,
            1,
            1,
            ElemType::UD,
            DeclareKind::Regular,
            None,
            None,
            None,
        )?;
        declares.set_alias(a0_dot2, a0, 8)?;

        let t252 = declares.create(
            "T252",
            RegFileKind::Grf,
            1,
            1,
            ElemType::UD,
            DeclareKind::Regular,
            None,
            None,
            None,
        )?;
        let bindless_sampler = declares.create(
            "B_S",
            RegFileKind::Grf,
            1,
            1,
            ElemType::UD,
            DeclareKind::Regular,
            None,
            None,
            None,
        )?;
        let null = declares.create(
            "BuiltinNull",
            RegFileKind::Grf,
            1,
            1,
            ElemType::UD,
            DeclareKind::Regular,
            None,
            None,
            None,
        )?;
        declares.get_mut(null).reg_var_mut().pin(PhyReg::Null, 0);

        let mut builder = Self {
            kernel_name: kernel_name.into(),
            imm_pool: ImmPool::new(options.imm_pool_capacity),
            regions: RegionPool::new(options.region_pool_capacity),
            options,
            declares,
            operands: Vec::new(),
            instrs: Vec::new(),
            inst_list: Vec::new(),
            cisa_offset: 0,
            location: None,
            temp_count: 0,
            builtins: Builtins {
                r0,
                a0,
                a0_dot2,
                t252,
                bindless_sampler,
                null,
            },
            predefined: Vec::new(),
            inputs: Vec::new(),
            predefined_expanded: false,
        };
        builder.create_predefined_vars()?;
        Ok(builder)
    }

    pub fn kernel_name(&self) -> &str {
        &self.kernel_name
    }

    pub fn options(&self) -> &BuilderOptions {
        &self.options
    }

    pub fn grf_size(&self) -> u32 {
        self.options.grf_size()
    }

    pub fn builtins(&self) -> &Builtins {
        &self.builtins
    }

    // ------------------------------------------------------------------
    // Declares
    // ------------------------------------------------------------------

    /// Creates an ordinary virtual register
    pub fn create_declare(
        &mut self,
        name: impl Into<String>,
        reg_file: RegFileKind,
        num_elems: u16,
        num_rows: u16,
        ty: ElemType,
    ) -> Result<DeclareId> {
        self.declares.create(
            name,
            reg_file,
            num_elems,
            num_rows,
            ty,
            DeclareKind::Regular,
            None,
            None,
            None,
        )
    }

    /// Creates a declare of any binding kind; see [`DeclarePool::create`]
    #[allow(clippy::too_many_arguments)]
    pub fn create_declare_with_kind(
        &mut self,
        name: impl Into<String>,
        reg_file: RegFileKind,
        num_elems: u16,
        num_rows: u16,
        ty: ElemType,
        kind: DeclareKind,
        base: Option<DeclareId>,
        representative: Option<OperandId>,
        exec_size: Option<super::ir::ExecSize>,
    ) -> Result<DeclareId> {
        let representative = representative.map(|id| (id, &self.operands[id.index()]));
        self.declares.create(
            name,
            reg_file,
            num_elems,
            num_rows,
            ty,
            kind,
            base,
            representative,
            exec_size,
        )
    }

    /// Makes `id` read and write through `target` at `byte_offset`
    pub fn set_alias(&mut self, id: DeclareId, target: DeclareId, byte_offset: u32) -> Result<()> {
        self.declares.set_alias(id, target, byte_offset)
    }

    pub fn root_declare(&self, id: DeclareId) -> (DeclareId, u32) {
        self.declares.root_declare(id)
    }

    pub fn declare(&self, id: DeclareId) -> &Declare {
        self.declares.get(id)
    }

    pub fn declare_mut(&mut self, id: DeclareId) -> &mut Declare {
        self.declares.get_mut(id)
    }

    pub fn declares(&self) -> &DeclarePool {
        &self.declares
    }

    // ------------------------------------------------------------------
    // Source positions
    // ------------------------------------------------------------------

    /// Marker stamped on every instruction placed in the list from now on
    pub fn set_cisa_offset(&mut self, offset: i32) {
        self.cisa_offset = offset;
    }

    pub fn cisa_offset(&self) -> i32 {
        self.cisa_offset
    }

    /// Current frontend location; recorded only with location tracking on
    pub fn set_source_location(&mut self, file: &str, line: u32) {
        let file = match &self.location {
            Some(loc) if &*loc.file == file => loc.file.clone(),
            _ => Arc::from(file),
        };
        self.location = Some(SourceLocation { file, line });
    }

    // ------------------------------------------------------------------
    // Tables
    // ------------------------------------------------------------------

    pub fn operand(&self, id: OperandId) -> &Operand {
        &self.operands[id.index()]
    }

    pub fn num_operands(&self) -> usize {
        self.operands.len()
    }

    pub fn region(&self, id: super::ir::RegionId) -> super::ir::Region {
        self.regions.get(id)
    }

    pub fn num_regions(&self) -> usize {
        self.regions.len()
    }

    pub fn instruction(&self, id: InstrId) -> &Instruction {
        &self.instrs[id.index()]
    }

    /// Kernel body in program order
    pub fn instruction_list(&self) -> &[InstrId] {
        &self.inst_list
    }

    /// Listed instructions in program order
    pub fn instructions(&self) -> impl Iterator<Item = (InstrId, &Instruction)> + '_ {
        self.inst_list
            .iter()
            .map(move |id| (*id, &self.instrs[id.index()]))
    }

    /// Every instruction created, including detached ones
    pub fn num_created_instructions(&self) -> usize {
        self.instrs.len()
    }

    pub fn kernel_inputs(&self) -> &[KernelInput] {
        &self.inputs
    }

    fn alloc_operand(&mut self, operand: Operand) -> OperandId {
        let id = OperandId(self.operands.len() as u32);
        self.operands.push(operand);
        id
    }
}

#[cfg(test)]
mod tests {
    use super::super::ir::{AliasLink, RegVarKind, SubRegAlign};
    use super::*;

    #[test]
    fn test_builtins_are_bound() {
        let b = IrBuilder::new("k", BuilderOptions::default()).unwrap();
        let builtins = *b.builtins();
        assert_eq!(
            b.declare(builtins.r0).reg_var().binding().map(|p| p.reg),
            Some(PhyReg::Grf(0))
        );
        assert_eq!(
            b.declare(builtins.a0).reg_var().binding().map(|p| p.reg),
            Some(PhyReg::Addr(0))
        );
        assert_eq!(
            b.declare(builtins.a0_dot2).alias(),
            Some(AliasLink {
                target: builtins.a0,
                offset: 8
            })
        );
        assert_eq!(b.root_declare(builtins.a0_dot2), (builtins.a0, 8));
        assert_eq!(b.declare(builtins.r0).sub_reg_align(), SubRegAlign::Grf);
    }

    #[test]
    fn test_create_declare_with_kind_checks_representative() {
        let mut b = IrBuilder::new("k", BuilderOptions::default()).unwrap();
        let base = b
            .create_declare("V", RegFileKind::Grf, 8, 1, ElemType::F)
            .unwrap();
        let stride1 = b.region_stride1();
        let src = b.create_src_region(base, stride1);
        let fill = b
            .create_declare_with_kind(
                "FL",
                RegFileKind::Grf,
                8,
                1,
                ElemType::F,
                DeclareKind::Fill,
                Some(base),
                Some(src),
                None,
            )
            .unwrap();
        assert!(matches!(
            b.declare(fill).reg_var().kind(),
            RegVarKind::Transient { .. }
        ));
    }

    #[test]
    fn test_source_location_reuses_file_name() {
        let mut b = IrBuilder::new("k", BuilderOptions::default()).unwrap();
        b.set_source_location("a.cl", 1);
        let first = b.location.clone().unwrap();
        b.set_source_location("a.cl", 2);
        let second = b.location.clone().unwrap();
        assert!(Arc::ptr_eq(&first.file, &second.file));
        assert_eq!(second.line, 2);
    }
}
