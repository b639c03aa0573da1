//! # visa-ir - Backend IR for a GPU kernel compiler
//!
//! Turns an abstract virtual-ISA instruction stream into machine-shaped IR:
//! typed virtual registers with aliasing and sub-register layout rules,
//! pooled operands, an ordered instruction list, and bit-exact send
//! message descriptors.
//!
//! ## Features
//!
//! - **Declares** - named `rows x width` register blocks with alias chains,
//!   alignment constraints and physical bindings
//! - **Operand pooling** - immediates and regions are deduplicated per kernel
//! - **Alignment analysis** - proves operand alignment through alias and
//!   indirect-addressing chains, tightening declares where that is free
//! - **Send lowering** - surface and sampler indices folded into the
//!   descriptor or computed into the address register
//! - **ABI binding** - predefined variables and kernel inputs pinned before
//!   allocation
//!
//! ## Quick Start
//!
//! ```rust
//! use visa_ir::compiler::ir::{ElemType, ExecSize, InstOptions, Opcode, RegFileKind};
//! use visa_ir::{BuilderOptions, IrBuilder};
//!
//! # fn main() -> visa_ir::Result<()> {
//! let mut builder = IrBuilder::new("scale", BuilderOptions::default())?;
//! let v = builder.create_declare("V", RegFileKind::Grf, 8, 1, ElemType::F)?;
//!
//! let dst = builder.create_dst_region(v, 1);
//! let region = builder.region_stride1();
//! let src = builder.create_src_region(v, region);
//! let two = builder.create_imm_f32(2.0);
//! builder.create_bin_op(Opcode::Mul, ExecSize::SIMD8, dst, src, two, InstOptions::NONE, true)?;
//!
//! assert_eq!(builder.instruction_list().len(), 1);
//! println!("{}", visa_ir::compiler::dump_kernel(&builder));
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! Construction contract violations are returned as [`Error`]; analysis
//! queries such as [`IrBuilder::is_aligned`] answer with plain values.
//!
//! ```rust
//! use visa_ir::compiler::ir::{ExecSize, InstOptions, Opcode};
//! use visa_ir::{BuilderOptions, Error, IrBuilder};
//!
//! let mut builder = IrBuilder::new("k", BuilderOptions::default()).unwrap();
//! let err = builder
//!     .create_instruction(None, Opcode::Math, None, false, ExecSize::SIMD1, None, None, None, InstOptions::NONE, true)
//!     .unwrap_err();
//! assert!(matches!(err, Error::WrongConstructor { .. }));
//! ```

// Allow specific clippy warnings that are false positives or intentional design choices
#![allow(clippy::too_many_arguments)] // Builder constructors mirror the virtual-ISA call shapes
#![allow(clippy::new_without_default)]

/// Version of the crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod compiler;
pub mod error;
pub mod parallel;

// Re-export main types
pub use compiler::{BuilderOptions, IrBuilder, Platform, PlatformGeneration};
pub use error::{Error, ErrorSeverity, Result};
pub use parallel::{build_kernels, build_kernels_collect, ParallelConfig};
