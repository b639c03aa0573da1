//! Parallel kernel construction
//!
//! Builds independent kernels concurrently, one [`IrBuilder`](crate::IrBuilder)
//! per kernel.

mod executor;

pub use executor::{build_kernels, build_kernels_collect, KernelSource, ParallelConfig};
