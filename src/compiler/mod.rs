//! # Kernel IR construction
//!
//! Turns a stream of virtual-ISA calls into machine-shaped IR: typed
//! virtual registers, pooled operands and an ordered instruction list, with
//! the ABI-mandated registers already bound.
//!
//! ## Architecture
//!
//! ```text
//! frontend calls → IrBuilder ─┬─ DeclarePool / ImmPool / RegionPool
//!                             ├─ instruction list (program order)
//!                             ├─ alignment analyzer
//!                             └─ send descriptor lowering
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! use visa_ir::compiler::{BuilderOptions, IrBuilder};
//! use visa_ir::compiler::ir::{ElemType, ExecSize, InstOptions, Opcode, RegFileKind};
//!
//! let mut builder = IrBuilder::new("kernel", BuilderOptions::default())?;
//! let v = builder.create_declare("V0", RegFileKind::Grf, 8, 1, ElemType::F)?;
//! let dst = builder.create_dst_region(v, 1);
//! let one = builder.create_imm_f32(1.0);
//! builder.create_mov(ExecSize::SIMD8, dst, one, InstOptions::NONE, true)?;
//! println!("{}", visa_ir::compiler::debug::dump_kernel(&builder));
//! ```

pub mod builder;
pub mod debug;
pub mod ir;

pub use builder::{IrBuilder, KernelInput, PredefinedVar, SendMessage};
pub use debug::{dump_kernel, format_instruction, print_kernel};

use crate::Result;
use serde::{Deserialize, Serialize};

/// Hardware generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PlatformGeneration {
    Gen9,
    Gen11,
    Xe,
    XeHpc,
}

impl PlatformGeneration {
    /// GRF width in bytes
    pub fn default_grf_size(&self) -> u32 {
        match self {
            PlatformGeneration::XeHpc => 64,
            _ => 32,
        }
    }

    /// Mask extracting the hardware thread id from `r0.5`
    pub fn hw_tid_mask(&self) -> u32 {
        if *self >= PlatformGeneration::Xe {
            0x3FF
        } else {
            0x1FF
        }
    }

    /// Half-float immediates are encodable from Gen11 on
    pub fn supports_hf_immediates(&self) -> bool {
        *self >= PlatformGeneration::Gen11
    }
}

/// Per-platform register file facts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Platform {
    pub generation: PlatformGeneration,
    /// Bytes per GRF
    pub grf_size: u32,
    /// Number of GRFs per thread
    pub total_grfs: u32,
}

impl Platform {
    pub fn new(generation: PlatformGeneration) -> Self {
        Self {
            generation,
            grf_size: generation.default_grf_size(),
            total_grfs: 128,
        }
    }
}

impl Default for Platform {
    fn default() -> Self {
        Platform::new(PlatformGeneration::Xe)
    }
}

/// Fixed GRF blocks used by the stack-call ABI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackCallAbi {
    pub arg_start_grf: u32,
    pub arg_size_grfs: u32,
    pub ret_start_grf: u32,
    pub ret_size_grfs: u32,
}

impl Default for StackCallAbi {
    fn default() -> Self {
        Self {
            arg_start_grf: 26,
            arg_size_grfs: 32,
            ret_start_grf: 26,
            ret_size_grfs: 12,
        }
    }
}

/// Builder configuration, fixed at construction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuilderOptions {
    /// Target platform
    pub platform: Platform,
    /// GRFs at the top of the file kept out of input/predefined binding
    pub reserved_grfs: u32,
    /// Narrow exactly representable float immediates to half float
    pub half_float_immediates: bool,
    /// Thread X/Y live in `r0.1` (12 bits each) instead of `r0.1`/`r0.6`
    pub new_r0_format: bool,
    /// Lower bindless sampler indices with the and/sel sequence
    pub align_bindless_sampler: bool,
    /// Byte address of the first kernel input in the payload
    pub input_payload_base: u32,
    /// Record the current source location on appended instructions
    pub track_source_locations: bool,
    /// Maximum number of pooled immediates
    pub imm_pool_capacity: usize,
    /// Maximum number of pooled regions
    pub region_pool_capacity: usize,
    pub stack_call: StackCallAbi,
}

impl Default for BuilderOptions {
    fn default() -> Self {
        Self {
            platform: Platform::default(),
            reserved_grfs: 0,
            half_float_immediates: false,
            new_r0_format: false,
            align_bindless_sampler: false,
            input_payload_base: 0,
            track_source_locations: false,
            imm_pool_capacity: 4096,
            region_pool_capacity: 1024,
            stack_call: StackCallAbi::default(),
        }
    }
}

impl BuilderOptions {
    /// Parses options from JSON; absent fields keep their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn grf_size(&self) -> u32 {
        self.platform.grf_size
    }

    /// First GRF that inputs and predefined variables may not reach
    pub fn usable_grfs(&self) -> u32 {
        self.platform.total_grfs.saturating_sub(self.reserved_grfs)
    }

    /// Half-float immediates requested and legal on the platform
    pub fn narrow_float_immediates(&self) -> bool {
        self.half_float_immediates && self.platform.generation.supports_hf_immediates()
    }
}
