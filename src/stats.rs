//! Mean and standard deviation reductions
//!
//! Used to pick quantization multipliers dynamically: a common choice is
//! `127 / (mean + k * stddev)` over |activations|. The per-ISA reductions
//! live in the kernel files; this module holds the result type, the scalar
//! reference, and the runtime dispatch.

use crate::cpu::{self, CpuType};
use crate::error::IntGemmError;

/// Result of a mean / standard deviation reduction
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeanStd {
    pub mean: f32,
    pub stddev: f32,
}

impl MeanStd {
    /// Build from running sums: `stddev = sqrt(E[x^2] - E[x]^2)`
    pub(crate) fn from_sums(sum: f32, sum_sq: f32, n: usize) -> Self {
        let mean = sum / n as f32;
        let variance = sum_sq / n as f32 - mean * mean;
        MeanStd {
            mean,
            // Accumulated rounding can push a zero variance slightly negative
            stddev: variance.max(0.0).sqrt(),
        }
    }
}

/// Scalar reference reduction
pub fn mean_std_ref(input: &[f32], absolute: bool) -> MeanStd {
    let mut sum = 0.0f32;
    let mut sum_sq = 0.0f32;
    for &x in input {
        sum += if absolute { x.abs() } else { x };
        sum_sq += x * x;
    }
    MeanStd::from_sums(sum, sum_sq, input.len())
}

/// Mean and standard deviation with the best available ISA
///
/// `absolute` folds |x| into the mean (the stddev always uses x^2).
pub fn vector_mean_std(input: &[f32], absolute: bool) -> Result<MeanStd, IntGemmError> {
    let tag = cpu::kcpu().ok_or(IntGemmError::UnsupportedCpu {
        required: CpuType::Sse2,
        detected: None,
    })?;
    #[cfg(target_arch = "x86_64")]
    {
        let ms = match tag {
            CpuType::Avx512Bw | CpuType::Avx512Vnni => crate::kernels::avx512::mean_std(input, absolute),
            CpuType::Avx2 => crate::kernels::avx2::mean_std(input, absolute),
            CpuType::Sse2 | CpuType::Ssse3 => crate::kernels::sse2::mean_std(input, absolute),
        };
        Ok(ms)
    }
    #[cfg(not(target_arch = "x86_64"))]
    {
        let _ = tag;
        unreachable!("kcpu() never reports a tag off x86-64")
    }
}
