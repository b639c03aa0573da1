//! Element types and execution sizes

use super::declare::SubRegAlign;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Element type of a declare or operand (numeric kind + byte width)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ElemType {
    /// Signed 8-bit integer
    B,
    /// Unsigned 8-bit integer
    UB,
    /// Signed 16-bit integer
    W,
    /// Unsigned 16-bit integer
    UW,
    /// Signed 32-bit integer
    D,
    /// Unsigned 32-bit integer
    UD,
    /// Signed 64-bit integer
    Q,
    /// Unsigned 64-bit integer
    UQ,
    /// IEEE half-precision float
    HF,
    /// bfloat16
    BF,
    /// IEEE single-precision float
    F,
    /// IEEE double-precision float
    DF,
}

impl ElemType {
    /// Returns the size of this type in bytes
    pub fn size(&self) -> u32 {
        match self {
            ElemType::B | ElemType::UB => 1,
            ElemType::W | ElemType::UW | ElemType::HF | ElemType::BF => 2,
            ElemType::D | ElemType::UD | ElemType::F => 4,
            ElemType::Q | ElemType::UQ | ElemType::DF => 8,
        }
    }

    /// Returns true for signed integer types
    pub fn is_signed_int(&self) -> bool {
        matches!(self, ElemType::B | ElemType::W | ElemType::D | ElemType::Q)
    }

    /// Returns true for unsigned integer types
    pub fn is_unsigned_int(&self) -> bool {
        matches!(self, ElemType::UB | ElemType::UW | ElemType::UD | ElemType::UQ)
    }

    /// Returns true for floating-point types
    pub fn is_float(&self) -> bool {
        matches!(self, ElemType::HF | ElemType::BF | ElemType::F | ElemType::DF)
    }

    /// Minimum sub-register alignment implied by the type alone
    pub fn min_sub_reg_align(&self) -> SubRegAlign {
        match self.size() {
            4 => SubRegAlign::Words(2),
            8 => SubRegAlign::Words(4),
            _ => SubRegAlign::Any,
        }
    }

    /// Short textual suffix used by the IR dump (e.g. `ud`, `f`)
    pub fn suffix(&self) -> &'static str {
        match self {
            ElemType::B => "b",
            ElemType::UB => "ub",
            ElemType::W => "w",
            ElemType::UW => "uw",
            ElemType::D => "d",
            ElemType::UD => "ud",
            ElemType::Q => "q",
            ElemType::UQ => "uq",
            ElemType::HF => "hf",
            ElemType::BF => "bf",
            ElemType::F => "f",
            ElemType::DF => "df",
        }
    }

    /// Parses a type from its textual suffix
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "b" => Some(ElemType::B),
            "ub" => Some(ElemType::UB),
            "w" => Some(ElemType::W),
            "uw" => Some(ElemType::UW),
            "d" => Some(ElemType::D),
            "ud" => Some(ElemType::UD),
            "q" => Some(ElemType::Q),
            "uq" => Some(ElemType::UQ),
            "hf" => Some(ElemType::HF),
            "bf" => Some(ElemType::BF),
            "f" => Some(ElemType::F),
            "df" => Some(ElemType::DF),
            _ => None,
        }
    }
}

impl fmt::Display for ElemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

/// Execution width of an instruction (SIMD lanes)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ExecSize(pub u8);

impl ExecSize {
    /// Scalar execution
    pub const SIMD1: ExecSize = ExecSize(1);
    /// 2 lanes
    pub const SIMD2: ExecSize = ExecSize(2);
    /// 4 lanes
    pub const SIMD4: ExecSize = ExecSize(4);
    /// 8 lanes
    pub const SIMD8: ExecSize = ExecSize(8);
    /// 16 lanes
    pub const SIMD16: ExecSize = ExecSize(16);
    /// 32 lanes
    pub const SIMD32: ExecSize = ExecSize(32);

    /// Number of lanes
    pub fn lanes(&self) -> u32 {
        self.0 as u32
    }
}

impl fmt::Display for ExecSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_sizes() {
        assert_eq!(ElemType::UB.size(), 1);
        assert_eq!(ElemType::HF.size(), 2);
        assert_eq!(ElemType::F.size(), 4);
        assert_eq!(ElemType::DF.size(), 8);
    }

    #[test]
    fn test_type_derived_alignment() {
        assert_eq!(ElemType::UW.min_sub_reg_align(), SubRegAlign::Any);
        assert_eq!(ElemType::F.min_sub_reg_align(), SubRegAlign::Words(2));
        assert_eq!(ElemType::Q.min_sub_reg_align(), SubRegAlign::Words(4));
    }

    #[test]
    fn test_parse_roundtrips_suffix() {
        for ty in [ElemType::B, ElemType::UD, ElemType::HF, ElemType::DF] {
            assert_eq!(ElemType::parse(ty.suffix()), Some(ty));
        }
        assert_eq!(ElemType::parse("x"), None);
    }
}
