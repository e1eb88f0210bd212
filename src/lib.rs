//! intgemm — runtime-dispatched integer matrix multiplication
//!
//! Quantizes float matrices to int8 or int16 and multiplies them with the
//! widening integer multiply-add instructions of whatever SIMD level the
//! CPU offers (SSE2, SSSE3, AVX2, AVX-512BW, AVX-512VNNI). Weights are
//! prepared once into a register-blocked layout; each multiply streams
//! int32 accumulator tiles through an inlined write kernel that
//! unquantizes, adds bias, or applies an activation.
//!
//! Typical inference flow:
//!
//! ```no_run
//! use intgemm::{AlignedBuffer, BiasAddUnquantize, dispatch};
//!
//! # fn main() -> Result<(), intgemm::IntGemmError> {
//! let (a_rows, width, b_cols) = (8, 256, 256);
//! # let a_floats = AlignedBuffer::<f32>::new(a_rows * width)?;
//! # let b_floats = AlignedBuffer::<f32>::new(width * b_cols)?;
//! # let bias = vec![0.0f32; b_cols];
//! let quant_mult = 127.0 / 2.0;
//! let unquant_mult = 1.0 / (quant_mult * quant_mult);
//!
//! let mut a_q = AlignedBuffer::<i8>::new(a_rows * width)?;
//! let mut b_packed = AlignedBuffer::<i8>::new(width * b_cols)?;
//! dispatch::prepare_a_i8(&a_floats, a_q.as_mut_slice(), quant_mult, a_rows, width)?;
//! dispatch::prepare_b_i8(&b_floats, b_packed.as_mut_slice(), quant_mult, width, b_cols)?;
//!
//! let mut out = vec![0.0f32; a_rows * b_cols];
//! let mut writer = BiasAddUnquantize::new(&mut out, &bias, b_cols, unquant_mult);
//! dispatch::multiply_i8(a_q.as_slice(), b_packed.as_slice(), &mut writer,
//!                       a_rows, width, b_cols)?;
//! # Ok(())
//! # }
//! ```
//!
//! Preparing B is the expensive step; do it once per weight matrix and
//! reuse the packed buffer. All kernel inputs must be 64-byte aligned
//! (checked in debug builds only); [`AlignedBuffer`] produces conforming
//! storage.

pub mod aligned;
pub mod bias;
pub mod cpu;
pub mod dispatch;
pub mod error;
pub mod kernels;
pub mod pack;
pub mod stats;
pub mod write;

// Re-export the main types
pub use aligned::AlignedBuffer;
pub use bias::prepare_bias_for_8;
pub use cpu::CpuType;
pub use error::IntGemmError;
pub use kernels::{GemmKernel, GemmKernel8};
pub use stats::{MeanStd, vector_mean_std};
pub use write::{
    Activation, BiasAddUnquantize, Exp, Identity, JustUnquantize, Relu, Rescale, Sigmoid, Tanh,
    UnquantizeActivate, WriteKernel,
};

/// Quantization multiplier for values clipped to `[-range, range]`
///
/// The usual choice for int8: `127 / range`, so the extreme of the clip
/// range maps to the extreme of the quantized range.
pub fn quant_mult_for_range(range: f32) -> f32 {
    debug_assert!(range > 0.0);
    127.0 / range
}

/// Multiplier converting accumulated int32 products back to floats
pub fn unquant_mult(quant_mult_a: f32, quant_mult_b: f32) -> f32 {
    1.0 / (quant_mult_a * quant_mult_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quant_mult_roundtrip() {
        let q = quant_mult_for_range(2.0);
        assert_eq!(q, 63.5);
        let u = unquant_mult(q, q);
        assert!((u - (2.0 / 127.0) * (2.0 / 127.0)).abs() < 1e-9);
    }
}
