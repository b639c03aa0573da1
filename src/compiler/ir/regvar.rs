//! Physical-binding facet of a declare
//!
//! Every [`Declare`](super::Declare) owns exactly one [`RegVar`]. The variant
//! records *why* the declare exists (ordinary virtual register, spill slot,
//! transient spill/fill copy, ...), and the binding records *where* it lives
//! once a physical register has been chosen for it.

use super::declare::DeclareId;
use super::operand::OperandId;
use super::types::ExecSize;
use crate::{Error, Result};
use std::fmt;

/// Binding kind requested when creating a declare
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeclareKind {
    /// Ordinary virtual register
    Regular,
    /// Spill location for address-register contents
    AddrSpill,
    /// Alias-only placeholder over a base declare
    Tmp,
    /// Materialized spill copy
    Spill,
    /// Materialized fill copy
    Fill,
    /// Merged spill group
    CoalescedSpill,
    /// Merged fill group
    CoalescedFill,
}

impl TryFrom<u8> for DeclareKind {
    type Error = Error;

    fn try_from(raw: u8) -> Result<Self> {
        match raw {
            0 => Ok(DeclareKind::Regular),
            1 => Ok(DeclareKind::AddrSpill),
            2 => Ok(DeclareKind::Tmp),
            3 => Ok(DeclareKind::Spill),
            4 => Ok(DeclareKind::Fill),
            5 => Ok(DeclareKind::CoalescedSpill),
            6 => Ok(DeclareKind::CoalescedFill),
            other => Err(Error::UnknownBindingKind(other)),
        }
    }
}

/// Direction of a transient copy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransientKind {
    /// Register contents written out to memory
    Spill,
    /// Register contents read back from memory
    Fill,
}

/// Variant of a register variable
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegVarKind {
    /// Ordinary virtual register, assigned later by allocation
    Default,
    /// Synthetic location for spilled address-register contents
    AddrSpill {
        /// Unique spill-slot index within the compilation unit
        slot: u32,
    },
    /// Placeholder aliasing a base register variable
    Tmp {
        /// Declare whose register variable this one stands in for
        base: DeclareId,
    },
    /// Spill or fill copy tied to a representative operand
    Transient {
        /// Declare being spilled or filled
        base: DeclareId,
        /// Destination region (spill) or source region (fill) the copy represents
        representative: OperandId,
        /// Execution size of the copy
        exec_size: ExecSize,
        /// Spill or fill
        kind: TransientKind,
    },
    /// Coalesced spill or fill group
    Coalesced {
        /// True for a fill group, false for a spill group
        is_fill: bool,
    },
}

/// Architecture registers that are not part of the GRF
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArchReg {
    /// State register
    Sr0,
    /// Control register
    Cr0,
    /// Channel-enable register
    Ce0,
    /// Debug register
    Dbg,
    /// Timestamp register
    Tm0,
}

/// A physical register
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PhyReg {
    /// General register file entry `rN`
    Grf(u32),
    /// Address register `aN`
    Addr(u32),
    /// Flag register `fN`
    Flag(u32),
    /// The null register
    Null,
    /// Other architecture register
    Arch(ArchReg),
}

impl fmt::Display for PhyReg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PhyReg::Grf(n) => write!(f, "r{}", n),
            PhyReg::Addr(n) => write!(f, "a{}", n),
            PhyReg::Flag(n) => write!(f, "f{}", n),
            PhyReg::Null => f.write_str("null"),
            PhyReg::Arch(ArchReg::Sr0) => f.write_str("sr0"),
            PhyReg::Arch(ArchReg::Cr0) => f.write_str("cr0"),
            PhyReg::Arch(ArchReg::Ce0) => f.write_str("ce0"),
            PhyReg::Arch(ArchReg::Dbg) => f.write_str("dbg0"),
            PhyReg::Arch(ArchReg::Tm0) => f.write_str("tm0"),
        }
    }
}

/// Register + sub-register (in elements of the declare's type)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PhyBinding {
    /// Physical register
    pub reg: PhyReg,
    /// Sub-register number, counted in elements of the declare's type
    pub sub_reg: u32,
}

/// Register variable: variant plus (eventual) physical binding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegVar {
    kind: RegVarKind,
    binding: Option<PhyBinding>,
    pinned: bool,
}

impl RegVar {
    /// Creates an unbound register variable of the given variant
    pub fn new(kind: RegVarKind) -> Self {
        Self {
            kind,
            binding: None,
            pinned: false,
        }
    }

    /// The variant of this register variable
    pub fn kind(&self) -> &RegVarKind {
        &self.kind
    }

    /// True once a physical register has been assigned
    pub fn is_phy_assigned(&self) -> bool {
        self.binding.is_some()
    }

    /// The physical binding, if any
    pub fn binding(&self) -> Option<PhyBinding> {
        self.binding
    }

    /// Register number of a GRF/address/flag binding
    pub fn reg_num(&self) -> Option<u32> {
        match self.binding?.reg {
            PhyReg::Grf(n) | PhyReg::Addr(n) | PhyReg::Flag(n) => Some(n),
            PhyReg::Null | PhyReg::Arch(_) => Some(0),
        }
    }

    /// Sub-register number of the binding
    pub fn sub_reg_num(&self) -> Option<u32> {
        self.binding.map(|b| b.sub_reg)
    }

    /// Assigns a physical register. Pinned bindings are never replaced.
    pub fn set_phy(&mut self, reg: PhyReg, sub_reg: u32) -> bool {
        if self.pinned {
            return false;
        }
        self.binding = Some(PhyBinding { reg, sub_reg });
        true
    }

    /// Assigns a physical register that later allocation must not change
    pub fn pin(&mut self, reg: PhyReg, sub_reg: u32) {
        self.binding = Some(PhyBinding { reg, sub_reg });
        self.pinned = true;
    }

    /// True if the binding was fixed before allocation (ABI or input)
    pub fn is_pinned(&self) -> bool {
        self.pinned
    }

    /// Absolute GRF byte address of a GRF binding
    pub fn byte_addr(&self, grf_size: u32, elem_size: u32) -> Option<u32> {
        match self.binding? {
            PhyBinding {
                reg: PhyReg::Grf(n),
                sub_reg,
            } => Some(n * grf_size + sub_reg * elem_size),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declare_kind_from_raw() {
        assert_eq!(DeclareKind::try_from(0).unwrap(), DeclareKind::Regular);
        assert_eq!(DeclareKind::try_from(6).unwrap(), DeclareKind::CoalescedFill);
        assert!(matches!(
            DeclareKind::try_from(7),
            Err(Error::UnknownBindingKind(7))
        ));
    }

    #[test]
    fn test_byte_addr() {
        let mut rv = RegVar::new(RegVarKind::Default);
        assert_eq!(rv.byte_addr(32, 4), None);
        rv.set_phy(PhyReg::Grf(3), 2);
        assert_eq!(rv.byte_addr(32, 4), Some(3 * 32 + 8));
        assert_eq!(rv.reg_num(), Some(3));
        assert_eq!(rv.sub_reg_num(), Some(2));
    }

    #[test]
    fn test_pinned_binding_is_not_replaced() {
        let mut rv = RegVar::new(RegVarKind::Default);
        rv.pin(PhyReg::Grf(0), 0);
        assert!(!rv.set_phy(PhyReg::Grf(7), 0));
        assert_eq!(rv.reg_num(), Some(0));
        assert!(rv.is_pinned());
    }
}
