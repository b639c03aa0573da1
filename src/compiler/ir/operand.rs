//! Operand definitions
//!
//! Operands are immutable once created and live in the builder's operand
//! arena. Instructions refer to them by [`OperandId`], so one operand can be
//! shared by any number of instructions; a private copy is made explicitly
//! with `IrBuilder::duplicate_operand`.

use super::declare::DeclareId;
use super::regvar::PhyReg;
use super::types::ElemType;
use std::fmt;

/// Handle of an operand in the builder's arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OperandId(pub u32);

impl OperandId {
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

/// Handle of a pooled region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegionId(pub u32);

impl RegionId {
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

/// Addressing stride descriptor `<vertical-stride; width, horizontal-stride>`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Region {
    /// Elements between the starts of consecutive rows
    pub vert_stride: u16,
    /// Elements per row
    pub width: u16,
    /// Elements between consecutive elements of a row
    pub horz_stride: u16,
}

impl Region {
    pub fn new(vert_stride: u16, width: u16, horz_stride: u16) -> Self {
        Self {
            vert_stride,
            width,
            horz_stride,
        }
    }

    /// `<0;1,0>`: every lane reads the same element
    pub fn is_scalar(&self) -> bool {
        self.vert_stride == 0 && self.width == 1 && self.horz_stride == 0
    }

    /// Pooling key
    pub fn key(&self) -> (u16, u16, u16) {
        (self.vert_stride, self.width, self.horz_stride)
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<{};{},{}>",
            self.vert_stride, self.width, self.horz_stride
        )
    }
}

/// What a register operand is based on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegBase {
    /// A virtual register
    Declare(DeclareId),
    /// A physical register used directly (null, architecture registers)
    Phys(PhyReg),
}

impl RegBase {
    pub fn declare(&self) -> Option<DeclareId> {
        match self {
            RegBase::Declare(id) => Some(*id),
            RegBase::Phys(_) => None,
        }
    }
}

/// Direct or address-register-indirect access
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegAccess {
    /// The operand names its register directly
    Direct,
    /// The register is found through an address register
    Indirect {
        /// Address declare holding the register byte address
        addr: DeclareId,
        /// Sub-register of the address declare
        addr_sub_reg: u16,
        /// Immediate byte displacement added to the address
        imm_disp: i16,
    },
}

/// Source modifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SrcModifier {
    #[default]
    None,
    Neg,
    Abs,
    NegAbs,
    Not,
}

/// Source register region
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SrcRegion {
    pub modifier: SrcModifier,
    pub base: RegBase,
    pub access: RegAccess,
    /// Row (register) offset from the base
    pub row_off: u16,
    /// Sub-register offset within the row, in elements of `ty`
    pub sub_reg_off: u16,
    pub region: RegionId,
    pub ty: ElemType,
}

/// Destination register region
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DstRegion {
    pub base: RegBase,
    pub access: RegAccess,
    pub row_off: u16,
    pub sub_reg_off: u16,
    pub horz_stride: u16,
    pub ty: ElemType,
}

/// Typed scalar constant; `bits` holds the raw bit pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Immediate {
    pub bits: i64,
    pub ty: ElemType,
}

impl Immediate {
    /// Interprets the bit pattern as an unsigned value of the type's width
    pub fn as_u64(&self) -> u64 {
        match self.ty.size() {
            1 => self.bits as u8 as u64,
            2 => self.bits as u16 as u64,
            4 => self.bits as u32 as u64,
            _ => self.bits as u64,
        }
    }

    pub fn as_f32(&self) -> Option<f32> {
        (self.ty == ElemType::F).then(|| f32::from_bits(self.bits as u32))
    }
}

/// Predicate sense
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PredState {
    Plus,
    Minus,
}

/// Predicate channel-combination control
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PredControl {
    #[default]
    Default,
    Any,
    All,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Predicate {
    pub state: PredState,
    pub flag: DeclareId,
    pub sub_reg_off: u16,
    pub control: PredControl,
}

/// Condition modifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CondModifier {
    /// Zero / equal
    Z,
    /// Not zero / not equal
    Nz,
    Gt,
    Ge,
    Lt,
    Le,
    /// Overflow
    Ov,
    /// Unordered
    Un,
}

impl CondModifier {
    pub fn mnemonic(&self) -> &'static str {
        match self {
            CondModifier::Z => "z",
            CondModifier::Nz => "nz",
            CondModifier::Gt => "gt",
            CondModifier::Ge => "ge",
            CondModifier::Lt => "lt",
            CondModifier::Le => "le",
            CondModifier::Ov => "ov",
            CondModifier::Un => "un",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CondMod {
    pub modifier: CondModifier,
    /// Flag written by the comparison (none for the implicit flag)
    pub flag: Option<DeclareId>,
    pub sub_reg_off: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LabelKind {
    Block,
    Subroutine,
    FunctionCall,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Label {
    pub name: String,
    pub kind: LabelKind,
}

/// `&decl + offset`: the GRF byte address of a declare
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddrExp {
    pub decl: DeclareId,
    pub offset: i32,
    pub ty: ElemType,
}

/// An operand
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    Imm(Immediate),
    Src(SrcRegion),
    Dst(DstRegion),
    Pred(Predicate),
    CondMod(CondMod),
    Label(Label),
    AddrExp(AddrExp),
}

impl Operand {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Operand::Imm(_) => "immediate",
            Operand::Src(_) => "source region",
            Operand::Dst(_) => "destination region",
            Operand::Pred(_) => "predicate",
            Operand::CondMod(_) => "condition modifier",
            Operand::Label(_) => "label",
            Operand::AddrExp(_) => "address expression",
        }
    }

    pub fn is_imm(&self) -> bool {
        matches!(self, Operand::Imm(_))
    }

    pub fn as_imm(&self) -> Option<&Immediate> {
        match self {
            Operand::Imm(imm) => Some(imm),
            _ => None,
        }
    }

    pub fn as_src(&self) -> Option<&SrcRegion> {
        match self {
            Operand::Src(src) => Some(src),
            _ => None,
        }
    }

    pub fn as_dst(&self) -> Option<&DstRegion> {
        match self {
            Operand::Dst(dst) => Some(dst),
            _ => None,
        }
    }

    pub fn as_label(&self) -> Option<&Label> {
        match self {
            Operand::Label(label) => Some(label),
            _ => None,
        }
    }

    /// Element type of value-carrying operands
    pub fn elem_type(&self) -> Option<ElemType> {
        match self {
            Operand::Imm(imm) => Some(imm.ty),
            Operand::Src(src) => Some(src.ty),
            Operand::Dst(dst) => Some(dst.ty),
            Operand::AddrExp(exp) => Some(exp.ty),
            Operand::Pred(_) | Operand::CondMod(_) | Operand::Label(_) => None,
        }
    }

    /// Declare an operand is based on (direct base or address expression)
    pub fn base_declare(&self) -> Option<DeclareId> {
        match self {
            Operand::Src(src) => src.base.declare(),
            Operand::Dst(dst) => dst.base.declare(),
            Operand::AddrExp(exp) => Some(exp.decl),
            _ => None,
        }
    }
}
