//! Send message descriptors
//!
//! A send instruction is parameterized by two 32-bit words:
//!
//! ```text
//! desc:     [28:25] mlen | [24:20] rlen | [19] header | [18:0] function control
//! ext_desc: [31:16] extended function control | [10:6] ex_mlen | [5] EOT | [3:0] SFID
//! ```
//!
//! The resource operands (surface and sampler index) travel alongside the
//! raw words; when they are not compile-time immediates the builder folds
//! them into the address register before the send.

use super::operand::OperandId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Bit layout of the descriptor words
pub mod layout {
    pub const FUNC_CTRL_MASK: u32 = 0x7FFFF;
    pub const HEADER_BIT: u32 = 19;
    pub const RLEN_SHIFT: u32 = 20;
    pub const RLEN_MASK: u32 = 0x1F;
    pub const MLEN_SHIFT: u32 = 25;
    pub const MLEN_MASK: u32 = 0xF;

    pub const SFID_MASK: u32 = 0xF;
    pub const EOT_BIT: u32 = 5;
    pub const EX_MLEN_SHIFT: u32 = 6;
    pub const EX_MLEN_MASK: u32 = 0x1F;
    pub const EXT_FUNC_CTRL_SHIFT: u32 = 16;

    /// Binding-table-index field in the low byte of `desc`
    pub const BTI_MASK: u32 = 0xFF;
}

/// Binding-table index that routes a surface through the bindless path
pub const PREDEF_SURF_252: u32 = 252;

/// Shared function the message is addressed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sfid {
    Null,
    Sampler,
    Gateway,
    DpDc2,
    DpRc,
    Urb,
    Spawner,
    Vme,
    DpCc,
    DpDc,
    DpPi,
    DpDc1,
    Cre,
}

impl Sfid {
    pub fn raw(&self) -> u32 {
        match self {
            Sfid::Null => 0x0,
            Sfid::Sampler => 0x2,
            Sfid::Gateway => 0x3,
            Sfid::DpDc2 => 0x4,
            Sfid::DpRc => 0x5,
            Sfid::Urb => 0x6,
            Sfid::Spawner => 0x7,
            Sfid::Vme => 0x8,
            Sfid::DpCc => 0x9,
            Sfid::DpDc => 0xA,
            Sfid::DpPi => 0xB,
            Sfid::DpDc1 => 0xC,
            Sfid::Cre => 0xD,
        }
    }

    pub fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0x0 => Some(Sfid::Null),
            0x2 => Some(Sfid::Sampler),
            0x3 => Some(Sfid::Gateway),
            0x4 => Some(Sfid::DpDc2),
            0x5 => Some(Sfid::DpRc),
            0x6 => Some(Sfid::Urb),
            0x7 => Some(Sfid::Spawner),
            0x8 => Some(Sfid::Vme),
            0x9 => Some(Sfid::DpCc),
            0xA => Some(Sfid::DpDc),
            0xB => Some(Sfid::DpPi),
            0xC => Some(Sfid::DpDc1),
            0xD => Some(Sfid::Cre),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Sfid::Null => "null",
            Sfid::Sampler => "sampler",
            Sfid::Gateway => "gateway",
            Sfid::DpDc2 => "dc2",
            Sfid::DpRc => "rc",
            Sfid::Urb => "urb",
            Sfid::Spawner => "ts",
            Sfid::Vme => "vme",
            Sfid::DpCc => "dcro",
            Sfid::DpDc => "dc",
            Sfid::DpPi => "pixi",
            Sfid::DpDc1 => "dc1",
            Sfid::Cre => "cre",
        }
    }
}

impl fmt::Display for Sfid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Direction of the memory transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SendAccess {
    Read,
    Write,
    ReadWrite,
}

/// Packs the message descriptor word
pub fn encode_desc(func_ctrl: u32, header_present: bool, rlen: u32, mlen: u32) -> u32 {
    (func_ctrl & layout::FUNC_CTRL_MASK)
        | ((header_present as u32) << layout::HEADER_BIT)
        | ((rlen & layout::RLEN_MASK) << layout::RLEN_SHIFT)
        | ((mlen & layout::MLEN_MASK) << layout::MLEN_SHIFT)
}

/// Packs the extended descriptor word
pub fn encode_ext_desc(sfid: Sfid, eot: bool, ex_mlen: u32, ext_func_ctrl: u32) -> u32 {
    (sfid.raw() & layout::SFID_MASK)
        | ((eot as u32) << layout::EOT_BIT)
        | ((ex_mlen & layout::EX_MLEN_MASK) << layout::EX_MLEN_SHIFT)
        | ((ext_func_ctrl & 0xFFFF) << layout::EXT_FUNC_CTRL_SHIFT)
}

/// Descriptor of one send message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendMsgDesc {
    desc: u32,
    ext_desc: u32,
    sfid: Sfid,
    access: SendAccess,
    surface: Option<OperandId>,
    sampler: Option<OperandId>,
}

impl SendMsgDesc {
    /// Builds a descriptor from its individual fields
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        func_ctrl: u32,
        rlen: u32,
        mlen: u32,
        sfid: Sfid,
        ex_mlen: u32,
        ext_func_ctrl: u32,
        header_present: bool,
        eot: bool,
        access: SendAccess,
        surface: Option<OperandId>,
        sampler: Option<OperandId>,
    ) -> Self {
        Self {
            desc: encode_desc(func_ctrl, header_present, rlen, mlen),
            ext_desc: encode_ext_desc(sfid, eot, ex_mlen, ext_func_ctrl),
            sfid,
            access,
            surface,
            sampler,
        }
    }

    /// Wraps already-packed words. The SFID is decoded from `ext_desc`;
    /// unknown encodings are treated as the null function.
    pub fn from_raw(
        desc: u32,
        ext_desc: u32,
        access: SendAccess,
        surface: Option<OperandId>,
        sampler: Option<OperandId>,
    ) -> Self {
        let sfid = Sfid::from_raw(ext_desc & layout::SFID_MASK).unwrap_or(Sfid::Null);
        Self {
            desc,
            ext_desc,
            sfid,
            access,
            surface,
            sampler,
        }
    }

    pub fn desc(&self) -> u32 {
        self.desc
    }

    pub fn ext_desc(&self) -> u32 {
        self.ext_desc
    }

    pub fn sfid(&self) -> Sfid {
        self.sfid
    }

    pub fn access(&self) -> SendAccess {
        self.access
    }

    pub fn is_read(&self) -> bool {
        matches!(self.access, SendAccess::Read | SendAccess::ReadWrite)
    }

    pub fn is_write(&self) -> bool {
        matches!(self.access, SendAccess::Write | SendAccess::ReadWrite)
    }

    pub fn func_ctrl(&self) -> u32 {
        self.desc & layout::FUNC_CTRL_MASK
    }

    pub fn header_present(&self) -> bool {
        (self.desc >> layout::HEADER_BIT) & 1 != 0
    }

    /// Response length in GRFs
    pub fn response_len(&self) -> u32 {
        (self.desc >> layout::RLEN_SHIFT) & layout::RLEN_MASK
    }

    /// First payload length in GRFs
    pub fn msg_len(&self) -> u32 {
        (self.desc >> layout::MLEN_SHIFT) & layout::MLEN_MASK
    }

    /// Second (split-send) payload length in GRFs
    pub fn ext_msg_len(&self) -> u32 {
        (self.ext_desc >> layout::EX_MLEN_SHIFT) & layout::EX_MLEN_MASK
    }

    pub fn eot(&self) -> bool {
        (self.ext_desc >> layout::EOT_BIT) & 1 != 0
    }

    pub fn ext_func_ctrl(&self) -> u32 {
        self.ext_desc >> layout::EXT_FUNC_CTRL_SHIFT
    }

    /// Binding-table index in the low byte of `desc`
    pub fn bti(&self) -> u32 {
        self.desc & layout::BTI_MASK
    }

    /// Replaces the binding-table index byte
    pub fn set_bti(&mut self, bti: u32) {
        self.desc = (self.desc & !layout::BTI_MASK) | (bti & layout::BTI_MASK);
    }

    pub(crate) fn set_desc(&mut self, desc: u32) {
        self.desc = desc;
    }

    pub fn surface(&self) -> Option<OperandId> {
        self.surface
    }

    pub fn sampler(&self) -> Option<OperandId> {
        self.sampler
    }

    pub(crate) fn set_surface(&mut self, surface: Option<OperandId>) {
        self.surface = surface;
    }
}
