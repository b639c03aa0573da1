//! IR instruction definitions

use super::operand::OperandId;
use super::send_desc::SendMsgDesc;
use super::types::ExecSize;
use std::fmt;
use std::sync::Arc;

/// Handle of an instruction in the builder's arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstrId(pub u32);

impl InstrId {
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

/// Instruction opcode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    // Data movement
    Mov,
    Sel,
    // Arithmetic
    Add,
    Mul,
    Mad,
    Avg,
    // Logic
    And,
    Or,
    Xor,
    Not,
    Shl,
    Shr,
    Asr,
    Cmp,
    // Flow control
    Label,
    Jmpi,
    If,
    Else,
    Endif,
    While,
    Break,
    Cont,
    Goto,
    Join,
    Call,
    Ret,
    // Math
    Math,
    // Send
    Send,
    Sendc,
    Sends,
    Sendsc,
    // Pseudo
    Intrinsic,
    Nop,
}

impl Opcode {
    pub fn mnemonic(&self) -> &'static str {
        match self {
            Opcode::Mov => "mov",
            Opcode::Sel => "sel",
            Opcode::Add => "add",
            Opcode::Mul => "mul",
            Opcode::Mad => "mad",
            Opcode::Avg => "avg",
            Opcode::And => "and",
            Opcode::Or => "or",
            Opcode::Xor => "xor",
            Opcode::Not => "not",
            Opcode::Shl => "shl",
            Opcode::Shr => "shr",
            Opcode::Asr => "asr",
            Opcode::Cmp => "cmp",
            Opcode::Label => "label",
            Opcode::Jmpi => "jmpi",
            Opcode::If => "if",
            Opcode::Else => "else",
            Opcode::Endif => "endif",
            Opcode::While => "while",
            Opcode::Break => "break",
            Opcode::Cont => "cont",
            Opcode::Goto => "goto",
            Opcode::Join => "join",
            Opcode::Call => "call",
            Opcode::Ret => "ret",
            Opcode::Math => "math",
            Opcode::Send => "send",
            Opcode::Sendc => "sendc",
            Opcode::Sends => "sends",
            Opcode::Sendsc => "sendsc",
            Opcode::Intrinsic => "intrinsic",
            Opcode::Nop => "nop",
        }
    }

    /// Opcodes built by the flow-control constructor (labels excluded)
    pub fn is_flow_control(&self) -> bool {
        matches!(
            self,
            Opcode::Jmpi
                | Opcode::If
                | Opcode::Else
                | Opcode::Endif
                | Opcode::While
                | Opcode::Break
                | Opcode::Cont
                | Opcode::Goto
                | Opcode::Join
                | Opcode::Call
                | Opcode::Ret
        )
    }

    pub fn is_math(&self) -> bool {
        *self == Opcode::Math
    }

    pub fn is_send(&self) -> bool {
        matches!(
            self,
            Opcode::Send | Opcode::Sendc | Opcode::Sends | Opcode::Sendsc
        )
    }

    pub fn is_split_send(&self) -> bool {
        matches!(self, Opcode::Sends | Opcode::Sendsc)
    }

    /// Number of general sources the opcode reads
    pub fn num_srcs(&self) -> usize {
        match self {
            Opcode::Mad => 3,
            Opcode::Mov | Opcode::Not => 1,
            Opcode::Sel
            | Opcode::Add
            | Opcode::Mul
            | Opcode::Avg
            | Opcode::And
            | Opcode::Or
            | Opcode::Xor
            | Opcode::Shl
            | Opcode::Shr
            | Opcode::Asr
            | Opcode::Cmp => 2,
            Opcode::Math => 2,
            Opcode::Send | Opcode::Sendc => 1,
            Opcode::Sends | Opcode::Sendsc => 2,
            _ => 0,
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

/// Instruction option bits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct InstOptions(u32);

impl InstOptions {
    pub const NONE: InstOptions = InstOptions(0);
    /// Execute regardless of the channel mask
    pub const WRITE_ENABLE: InstOptions = InstOptions(1 << 0);
    pub const NO_DD_CHECK: InstOptions = InstOptions(1 << 1);
    pub const NO_DD_CLEAR: InstOptions = InstOptions(1 << 2);
    pub const ALIGN16: InstOptions = InstOptions(1 << 3);
    pub const NO_COMPACT: InstOptions = InstOptions(1 << 4);
    pub const ATOMIC: InstOptions = InstOptions(1 << 5);
    pub const BREAKPOINT: InstOptions = InstOptions(1 << 6);

    pub fn bits(&self) -> u32 {
        self.0
    }

    pub fn contains(&self, other: InstOptions) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn names(&self) -> Vec<&'static str> {
        const NAMES: [(InstOptions, &str); 7] = [
            (InstOptions::WRITE_ENABLE, "NoMask"),
            (InstOptions::NO_DD_CHECK, "NoDDChk"),
            (InstOptions::NO_DD_CLEAR, "NoDDClr"),
            (InstOptions::ALIGN16, "Align16"),
            (InstOptions::NO_COMPACT, "NoCompact"),
            (InstOptions::ATOMIC, "Atomic"),
            (InstOptions::BREAKPOINT, "Breakpoint"),
        ];
        NAMES
            .iter()
            .filter(|(opt, _)| self.contains(*opt))
            .map(|(_, name)| *name)
            .collect()
    }
}

impl std::ops::BitOr for InstOptions {
    type Output = InstOptions;

    fn bitor(self, rhs: InstOptions) -> InstOptions {
        InstOptions(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for InstOptions {
    fn bitor_assign(&mut self, rhs: InstOptions) {
        self.0 |= rhs.0;
    }
}

/// Math function-control tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MathFunction {
    Inv,
    Log,
    Exp,
    Sqrt,
    Rsqrt,
    Sin,
    Cos,
    Pow,
    Fdiv,
    IntDiv,
    IntDivQuot,
    IntDivRem,
}

impl MathFunction {
    pub fn name(&self) -> &'static str {
        match self {
            MathFunction::Inv => "inv",
            MathFunction::Log => "log",
            MathFunction::Exp => "exp",
            MathFunction::Sqrt => "sqrt",
            MathFunction::Rsqrt => "rsqt",
            MathFunction::Sin => "sin",
            MathFunction::Cos => "cos",
            MathFunction::Pow => "pow",
            MathFunction::Fdiv => "fdiv",
            MathFunction::IntDiv => "idiv",
            MathFunction::IntDivQuot => "quot",
            MathFunction::IntDivRem => "rem",
        }
    }

    /// Single-source functions ignore src1
    pub fn is_unary(&self) -> bool {
        !matches!(
            self,
            MathFunction::Pow
                | MathFunction::Fdiv
                | MathFunction::IntDiv
                | MathFunction::IntDivQuot
                | MathFunction::IntDivRem
        )
    }
}

/// Pseudo operations consumed by later passes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Intrinsic {
    Spill,
    Fill,
    PseudoKill,
    PseudoUse,
    Split,
    CallerSave,
    CallerRestore,
    CalleeSave,
    CalleeRestore,
    MemFence,
}

impl Intrinsic {
    pub fn name(&self) -> &'static str {
        match self {
            Intrinsic::Spill => "spill",
            Intrinsic::Fill => "fill",
            Intrinsic::PseudoKill => "pseudo_kill",
            Intrinsic::PseudoUse => "pseudo_use",
            Intrinsic::Split => "split",
            Intrinsic::CallerSave => "caller_save",
            Intrinsic::CallerRestore => "caller_restore",
            Intrinsic::CalleeSave => "callee_save",
            Intrinsic::CalleeRestore => "callee_restore",
            Intrinsic::MemFence => "mem_fence",
        }
    }
}

/// Opcode-class specific payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstKind {
    Generic,
    FlowControl {
        /// Jump target
        jip: Option<OperandId>,
        /// Join/update target
        uip: Option<OperandId>,
    },
    Math {
        function: MathFunction,
    },
    Send {
        msg: Box<SendMsgDesc>,
        /// Descriptor operand: immediate or the address register
        desc: OperandId,
        /// Extended descriptor operand (split sends, or bindless)
        ext_desc: Option<OperandId>,
    },
    Intrinsic(Intrinsic),
}

/// Source position of the frontend construct an instruction came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    pub file: Arc<str>,
    pub line: u32,
}

/// One IR operation
#[derive(Debug, Clone)]
pub struct Instruction {
    pub(crate) opcode: Opcode,
    pub(crate) exec_size: ExecSize,
    pub(crate) predicate: Option<OperandId>,
    pub(crate) cond_mod: Option<OperandId>,
    pub(crate) saturate: bool,
    pub(crate) dst: Option<OperandId>,
    pub(crate) srcs: [Option<OperandId>; 3],
    pub(crate) options: InstOptions,
    pub(crate) kind: InstKind,
    pub(crate) cisa_offset: i32,
    pub(crate) location: Option<SourceLocation>,
}

impl Instruction {
    pub fn opcode(&self) -> Opcode {
        self.opcode
    }

    pub fn exec_size(&self) -> ExecSize {
        self.exec_size
    }

    pub fn predicate(&self) -> Option<OperandId> {
        self.predicate
    }

    pub fn cond_mod(&self) -> Option<OperandId> {
        self.cond_mod
    }

    pub fn saturate(&self) -> bool {
        self.saturate
    }

    pub fn dst(&self) -> Option<OperandId> {
        self.dst
    }

    pub fn src(&self, i: usize) -> Option<OperandId> {
        self.srcs.get(i).copied().flatten()
    }

    pub fn srcs(&self) -> impl Iterator<Item = OperandId> + '_ {
        self.srcs.iter().flatten().copied()
    }

    pub fn options(&self) -> InstOptions {
        self.options
    }

    pub fn is_write_enable(&self) -> bool {
        self.options.contains(InstOptions::WRITE_ENABLE)
    }

    pub fn kind(&self) -> &InstKind {
        &self.kind
    }

    pub fn is_label(&self) -> bool {
        self.opcode == Opcode::Label
    }

    pub fn send_desc(&self) -> Option<&SendMsgDesc> {
        match &self.kind {
            InstKind::Send { msg, .. } => Some(msg),
            _ => None,
        }
    }

    pub fn math_function(&self) -> Option<MathFunction> {
        match self.kind {
            InstKind::Math { function } => Some(function),
            _ => None,
        }
    }

    pub fn cisa_offset(&self) -> i32 {
        self.cisa_offset
    }

    pub fn location(&self) -> Option<&SourceLocation> {
        self.location.as_ref()
    }
}
