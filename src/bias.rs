//! Bias folding for the shifted (unsigned A) multiply
//!
//! Shifting quantized A by +128 adds `128 * sum_k B_q[k, j]` to every
//! int32 accumulator of column j. After unquantization that constant is
//! `128 * sum_k B_f[k, j] / quant_mult_b`, so subtracting it from the bias
//! up front makes the shifted path agree with the signed one.

use crate::error::{IntGemmError, check_len};

/// Fold the unsigned-A correction into `bias`
///
/// `b` is the *float* B (`width x b_cols`, row-major; reading the float
/// matrix keeps this independent of whether `prepare_b` ran yet), `alpha`
/// the clipping range that defined B's quantization multiplier
/// `127 / alpha`. In-place: `bias[j] -= 128 * column_sum(j) * alpha / 127`.
pub fn prepare_bias_for_8(
    b: &[f32],
    bias: &mut [f32],
    alpha: f32,
    width: usize,
    b_cols: usize,
) -> Result<(), IntGemmError> {
    check_len("B input length", b.len(), width * b_cols)?;
    check_len("bias length", bias.len(), b_cols)?;
    debug_assert!(alpha > 0.0);

    let quant_mult_b = 127.0 / alpha;
    for (j, slot) in bias.iter_mut().enumerate() {
        let mut colsum = 0.0f32;
        for k in 0..width {
            colsum += b[k * b_cols + j];
        }
        *slot -= 128.0 * colsum / quant_mult_b;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_ones_column_sums() {
        // width 256 of ones, alpha 2: correction is 128 * 256 * 2 / 127
        let width = 256;
        let b_cols = 8;
        let b = vec![1.0f32; width * b_cols];
        let mut bias = vec![0.0f32; b_cols];
        prepare_bias_for_8(&b, &mut bias, 2.0, width, b_cols).unwrap();
        let expect = -128.0 * 256.0 * 2.0 / 127.0;
        for &v in &bias {
            assert!((v - expect).abs() < 0.01, "got {v}, want {expect}");
        }
        assert!((bias[0] + 516.03).abs() < 0.01);
    }

    #[test]
    fn test_existing_bias_is_preserved() {
        let b = vec![0.5f32; 16 * 8];
        let mut bias: Vec<f32> = (0..8).map(|j| j as f32).collect();
        prepare_bias_for_8(&b, &mut bias, 1.0, 16, 8).unwrap();
        let correction = 128.0 * 8.0 / 127.0;
        for (j, &v) in bias.iter().enumerate() {
            assert!((v - (j as f32 - correction)).abs() < 1e-4);
        }
    }

    #[test]
    fn test_shape_mismatch() {
        let b = vec![0.0f32; 64];
        let mut bias = vec![0.0f32; 8];
        assert!(prepare_bias_for_8(&b, &mut bias, 1.0, 16, 8).is_err());
    }
}
