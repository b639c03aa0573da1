//! Virtual-register declarations
//!
//! A [`Declare`] is a named, typed block of `rows x width` elements in one
//! register file. Declares are only ever created by the
//! [`DeclarePool`](super::DeclarePool), referenced everywhere else through a
//! [`DeclareId`], and dropped together with the pool.
//!
//! A declare may alias another declare at a byte offset. Only the root of an
//! alias chain is ever given storage by the allocator; see
//! [`DeclarePool::root_declare`](super::DeclarePool::root_declare).

use super::regvar::RegVar;
use super::types::ElemType;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Handle of a declare inside its pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeclareId(pub u32);

impl DeclareId {
    /// Index into the owning pool's table
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for DeclareId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "V{}", self.0)
    }
}

/// Register file a declare lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RegFileKind {
    /// General register file
    Grf,
    /// Address registers
    Address,
    /// Flag (predicate) registers
    Flag,
    /// Kernel input payload (GRF storage, fixed by input binding)
    Input,
}

/// Sub-register alignment requirement, measured in 16-bit words
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SubRegAlign {
    /// No constraint
    Any,
    /// Explicit word count (2 = even word, 4 = four words, ...)
    Words(u16),
    /// Half a GRF
    HalfGrf,
    /// A full GRF
    Grf,
}

impl SubRegAlign {
    /// Even-word alignment (4 bytes)
    pub const EVEN_WORD: SubRegAlign = SubRegAlign::Words(2);

    /// Alignment in 16-bit words for a GRF of `grf_size` bytes
    pub fn words(&self, grf_size: u32) -> u32 {
        match self {
            SubRegAlign::Any => 1,
            SubRegAlign::Words(n) => (*n).max(1) as u32,
            SubRegAlign::HalfGrf => grf_size / 4,
            SubRegAlign::Grf => grf_size / 2,
        }
    }

    /// Alignment in bytes for a GRF of `grf_size` bytes
    pub fn bytes(&self, grf_size: u32) -> u32 {
        self.words(grf_size) * 2
    }

    /// Canonical alignment for a word count
    pub fn from_words(words: u32, grf_size: u32) -> Self {
        if words <= 1 {
            SubRegAlign::Any
        } else if words == grf_size / 2 {
            SubRegAlign::Grf
        } else if words == grf_size / 4 {
            SubRegAlign::HalfGrf
        } else {
            SubRegAlign::Words(words as u16)
        }
    }
}

/// Hints consumed by later passes (allocation, spilling)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LivenessHints {
    /// Never spill this declare
    pub do_not_spill: bool,
    /// Value is live on kernel/function entry
    pub live_in: bool,
    /// Value is live on kernel/function exit
    pub live_out: bool,
}

/// Alias link: this declare reads/writes through `target` at `offset` bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AliasLink {
    /// Aliased-to declare
    pub target: DeclareId,
    /// Byte offset into the target
    pub offset: u32,
}

/// A virtual-register declaration
#[derive(Debug, Clone)]
pub struct Declare {
    id: DeclareId,
    name: String,
    reg_file: RegFileKind,
    elem_type: ElemType,
    num_elems: u16,
    num_rows: u16,
    num_flag_elems: u32,
    sub_reg_align: SubRegAlign,
    reg_var: RegVar,
    alias: Option<AliasLink>,
    hints: LivenessHints,
}

impl Declare {
    pub(crate) fn new(
        id: DeclareId,
        name: String,
        reg_file: RegFileKind,
        num_elems: u16,
        num_rows: u16,
        elem_type: ElemType,
        reg_var: RegVar,
    ) -> Self {
        // Flags are counted in 16-bit words; predicate bits are 16 per word
        let num_flag_elems = if reg_file == RegFileKind::Flag {
            num_elems as u32 * num_rows as u32 * 16
        } else {
            0
        };
        Self {
            id,
            name,
            reg_file,
            elem_type,
            num_elems,
            num_rows,
            num_flag_elems,
            sub_reg_align: SubRegAlign::Any,
            reg_var,
            alias: None,
            hints: LivenessHints::default(),
        }
    }

    pub fn id(&self) -> DeclareId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn reg_file(&self) -> RegFileKind {
        self.reg_file
    }

    pub fn elem_type(&self) -> ElemType {
        self.elem_type
    }

    pub fn elem_size(&self) -> u32 {
        self.elem_type.size()
    }

    /// Elements per row
    pub fn num_elems(&self) -> u16 {
        self.num_elems
    }

    pub fn num_rows(&self) -> u16 {
        self.num_rows
    }

    pub fn total_elems(&self) -> u32 {
        self.num_elems as u32 * self.num_rows as u32
    }

    pub fn byte_size(&self) -> u32 {
        self.total_elems() * self.elem_size()
    }

    /// Predicate bits held by a flag declare (0 for other files)
    pub fn num_flag_elems(&self) -> u32 {
        self.num_flag_elems
    }

    pub(crate) fn set_num_flag_elems(&mut self, bits: u32) {
        self.num_flag_elems = bits;
    }

    pub fn sub_reg_align(&self) -> SubRegAlign {
        self.sub_reg_align
    }

    /// Overwrites the alignment. Only valid before any operand references
    /// this declare; use [`Declare::tighten_sub_reg_align`] afterwards.
    pub(crate) fn set_sub_reg_align(&mut self, align: SubRegAlign) {
        self.sub_reg_align = align;
    }

    /// Raises the alignment to at least `align`; never loosens it.
    /// Returns the resulting alignment.
    pub fn tighten_sub_reg_align(&mut self, align: SubRegAlign, grf_size: u32) -> SubRegAlign {
        if align.words(grf_size) > self.sub_reg_align.words(grf_size) {
            self.sub_reg_align = SubRegAlign::from_words(align.words(grf_size), grf_size);
        }
        self.sub_reg_align
    }

    pub fn reg_var(&self) -> &RegVar {
        &self.reg_var
    }

    pub fn reg_var_mut(&mut self) -> &mut RegVar {
        &mut self.reg_var
    }

    /// Direct alias link (one hop)
    pub fn alias(&self) -> Option<AliasLink> {
        self.alias
    }

    pub(crate) fn set_alias_link(&mut self, link: AliasLink) {
        self.alias = Some(link);
    }

    pub fn hints(&self) -> LivenessHints {
        self.hints
    }

    pub fn hints_mut(&mut self) -> &mut LivenessHints {
        &mut self.hints
    }

    /// Binding fixed before allocation (predefined or input variable)
    pub fn is_pinned(&self) -> bool {
        self.reg_var.is_pinned()
    }
}
