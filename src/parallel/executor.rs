//! Parallel executor for kernel construction
//!
//! Uses Rayon for work-stealing parallelism with configurable limits. Each
//! kernel gets its own builder; nothing is shared between tasks except the
//! read-only options.

use crate::compiler::{BuilderOptions, IrBuilder};
use crate::error::{Error, Result};
use rayon::prelude::*;

/// Configuration for parallel execution
#[derive(Debug, Clone)]
pub struct ParallelConfig {
    /// Maximum number of parallel tasks (default: num_cpus)
    pub max_parallelism: usize,
    /// Stop at the first failing kernel instead of building all of them
    pub fail_fast: bool,
}

impl Default for ParallelConfig {
    fn default() -> Self {
        Self {
            max_parallelism: num_cpus::get(),
            fail_fast: false,
        }
    }
}

/// Anything that names a kernel to build
pub trait KernelSource {
    fn kernel_name(&self) -> &str;
}

impl KernelSource for String {
    fn kernel_name(&self) -> &str {
        self
    }
}

impl KernelSource for &str {
    fn kernel_name(&self) -> &str {
        self
    }
}

/// Builds every kernel with `build`, in parallel
///
/// # Arguments
/// * `kernels` - Kernels to build, one builder each
/// * `options` - Builder options shared by all kernels
/// * `build` - Populates a fresh builder for one kernel (must be thread-safe)
/// * `config` - Parallel execution configuration
///
/// # Returns
/// * `Ok(Vec<IrBuilder>)` - Finished builders, in input order
/// * `Err(Error)` - The first failure in input order
///
/// # Example
/// ```ignore
/// let builders = build_kernels(
///     &["copy", "scale"],
///     &BuilderOptions::default(),
///     |name, b| emit_kernel(name, b),
///     ParallelConfig::default(),
/// )?;
/// ```
pub fn build_kernels<K, F>(
    kernels: &[K],
    options: &BuilderOptions,
    build: F,
    config: ParallelConfig,
) -> Result<Vec<IrBuilder>>
where
    K: KernelSource + Sync,
    F: Fn(&K, &mut IrBuilder) -> Result<()> + Send + Sync,
{
    if kernels.is_empty() {
        return Ok(Vec::new());
    }

    // Single kernel - no parallelism needed
    if kernels.len() == 1 {
        return Ok(vec![build_one(&kernels[0], options, &build)?]);
    }

    let pool = thread_pool(&config, kernels.len())?;
    pool.install(|| {
        if config.fail_fast {
            kernels
                .par_iter()
                .map(|kernel| build_one(kernel, options, &build))
                .collect::<Result<Vec<IrBuilder>>>()
        } else {
            let results: Vec<Result<IrBuilder>> = kernels
                .par_iter()
                .map(|kernel| build_one(kernel, options, &build))
                .collect();
            results.into_iter().collect()
        }
    })
}

/// Builds every kernel and returns each outcome individually, in input order
pub fn build_kernels_collect<K, F>(
    kernels: &[K],
    options: &BuilderOptions,
    build: F,
    config: ParallelConfig,
) -> Result<Vec<Result<IrBuilder>>>
where
    K: KernelSource + Sync,
    F: Fn(&K, &mut IrBuilder) -> Result<()> + Send + Sync,
{
    let pool = thread_pool(&config, kernels.len())?;
    Ok(pool.install(|| {
        kernels
            .par_iter()
            .map(|kernel| build_one(kernel, options, &build))
            .collect()
    }))
}

fn thread_pool(config: &ParallelConfig, tasks: usize) -> Result<rayon::ThreadPool> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(config.max_parallelism.min(tasks).max(1))
        .build()
        .map_err(|e| Error::compiler(format!("Failed to create thread pool: {}", e)))
}

fn build_one<K, F>(kernel: &K, options: &BuilderOptions, build: &F) -> Result<IrBuilder>
where
    K: KernelSource,
    F: Fn(&K, &mut IrBuilder) -> Result<()>,
{
    let mut builder = IrBuilder::new(kernel.kernel_name(), options.clone())?;
    build(kernel, &mut builder)?;
    tracing::debug!(
        kernel = kernel.kernel_name(),
        instructions = builder.instruction_list().len(),
        "kernel built"
    );
    Ok(builder)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::ir::{ElemType, ExecSize, InstOptions, RegFileKind};

    fn emit_movs(name: &&str, b: &mut IrBuilder) -> Result<()> {
        if *name == "bad" {
            return Err(Error::compiler("cannot build"));
        }
        let v = b.create_declare("V", RegFileKind::Grf, 8, 1, ElemType::UD)?;
        let dst = b.create_dst_region(v, 1);
        let one = b.create_imm(1, ElemType::UD);
        b.create_mov(ExecSize::SIMD8, dst, one, InstOptions::NONE, true)?;
        Ok(())
    }

    #[test]
    fn test_build_kernels_basic() {
        let kernels = ["a", "b", "c"];
        let builders = build_kernels(
            &kernels,
            &BuilderOptions::default(),
            emit_movs,
            ParallelConfig::default(),
        )
        .unwrap();

        assert_eq!(builders.len(), 3);
        assert_eq!(builders[0].kernel_name(), "a");
        assert_eq!(builders[2].kernel_name(), "c");
        assert!(builders.iter().all(|b| b.instruction_list().len() == 1));
    }

    #[test]
    fn test_build_kernels_empty() {
        let kernels: [&str; 0] = [];
        let builders = build_kernels(
            &kernels,
            &BuilderOptions::default(),
            emit_movs,
            ParallelConfig::default(),
        )
        .unwrap();
        assert!(builders.is_empty());
    }

    #[test]
    fn test_build_kernels_error_fail_fast() {
        let config = ParallelConfig {
            fail_fast: true,
            ..Default::default()
        };
        let result = build_kernels(
            &["a", "bad", "c"],
            &BuilderOptions::default(),
            emit_movs,
            config,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_build_kernels_collect_all() {
        let results = build_kernels_collect(
            &["a", "bad", "c"],
            &BuilderOptions::default(),
            emit_movs,
            ParallelConfig::default(),
        )
        .unwrap();

        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert!(results[1].is_err());
        assert_eq!(results[2].as_ref().unwrap().kernel_name(), "c");
    }
}
