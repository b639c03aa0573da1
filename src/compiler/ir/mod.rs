//! # Backend IR data model
//!
//! Typed virtual registers, operands and instructions produced by the
//! [`IrBuilder`](crate::compiler::IrBuilder) and consumed by register
//! allocation, scheduling and encoding.
//!
//! ## Module Structure
//!
//! ```text
//! ir/
//! ├── mod.rs          # This file - module definition and re-exports
//! ├── types.rs        # ElemType, ExecSize
//! ├── regvar.rs       # RegVar binding variants, physical registers
//! ├── declare.rs      # Declare, DeclareId, SubRegAlign, alias links
//! ├── operand.rs      # Operand kinds, Region
//! ├── pool.rs         # DeclarePool, ImmPool, RegionPool
//! ├── instruction.rs  # Opcode, Instruction, InstKind
//! └── send_desc.rs    # SendMsgDesc and descriptor bit layout
//! ```
//!
//! ## Key Types
//!
//! - [`Declare`] - Named, typed `rows x width` block in one register file
//! - [`RegVar`] - Physical-binding facet of a declare (closed set of variants)
//! - [`Operand`] - Immutable operand, referenced by [`OperandId`]
//! - [`Instruction`] - One operation, referenced by [`InstrId`]
//! - [`SendMsgDesc`] - The two descriptor words of a send
//!
//! All cross references are arena handles. Nothing is freed individually;
//! dropping the builder drops every table at once.

mod declare;
mod instruction;
mod operand;
mod pool;
mod regvar;
pub mod send_desc;
mod types;

pub use declare::{AliasLink, Declare, DeclareId, LivenessHints, RegFileKind, SubRegAlign};
pub use instruction::{
    InstKind, InstOptions, InstrId, Instruction, Intrinsic, MathFunction, Opcode, SourceLocation,
};
pub use operand::{
    AddrExp, CondMod, CondModifier, DstRegion, Immediate, Label, LabelKind, Operand, OperandId,
    PredControl, PredState, Predicate, RegAccess, RegBase, Region, RegionId, SrcModifier,
    SrcRegion,
};
pub use pool::{DeclarePool, ImmPool, RegionPool};
pub use regvar::{ArchReg, DeclareKind, PhyBinding, PhyReg, RegVar, RegVarKind, TransientKind};
pub use send_desc::{SendAccess, SendMsgDesc, Sfid, PREDEF_SURF_252};
pub use types::{ElemType, ExecSize};
