//! Portable scalar kernels
//!
//! These are the reference semantics every SIMD kernel is tested against,
//! and the only kernels available off x86-64. The quantizers round
//! half-to-even, the same mode `cvtps2dq` uses under the default MXCSR, so
//! scalar and vector results agree exactly rather than merely within the
//! rounding-tie tolerance.

use crate::cpu::CpuType;
use crate::error::{IntGemmError, check_len};
use crate::kernels::{GemmKernel, GemmKernel8, check_multiply_shapes};
use crate::pack::{TILE_COL, run_offset};
use crate::write::WriteKernel;

#[inline]
pub(crate) fn quantize_one_i8(x: f32, quant_mult: f32) -> i8 {
    // -128 is excluded so pmaddubsw pair sums and sign flips stay exact
    (x * quant_mult).round_ties_even().clamp(-127.0, 127.0) as i8
}

#[inline]
pub(crate) fn quantize_one_i16(x: f32, quant_mult: f32) -> i16 {
    (x * quant_mult).round_ties_even().clamp(-32768.0, 32767.0) as i16
}

/// Portable 8-bit kernel; the test oracle for the SSSE3/AVX2/AVX-512 paths
pub struct ScalarI8;

/// Portable 16-bit kernel; the test oracle for the SSE2/AVX2/AVX-512 paths
pub struct ScalarI16;

impl GemmKernel for ScalarI8 {
    type Integer = i8;

    // Matches the narrowest SIMD variant so packed buffers interoperate
    const TILE_ROW: usize = 16;
    const NAME: &'static str = "scalar-8bit";
    const USES: Option<CpuType> = None;

    fn quantize(input: &[f32], output: &mut [i8], quant_mult: f32) -> Result<(), IntGemmError> {
        check_len("quantize output length", output.len(), input.len())?;
        for (dst, &x) in output.iter_mut().zip(input) {
            *dst = quantize_one_i8(x, quant_mult);
        }
        Ok(())
    }

    fn multiply<W: WriteKernel>(
        a: &[i8],
        b: &[i8],
        write: &mut W,
        a_rows: usize,
        width: usize,
        b_cols: usize,
    ) -> Result<(), IntGemmError> {
        check_multiply_shapes(a.len(), b.len(), a_rows, width, b_cols, Self::TILE_ROW)?;
        let k_blocks = width / Self::TILE_ROW;
        for row in 0..a_rows {
            let a_row = &a[row * width..(row + 1) * width];
            for ct in 0..b_cols / TILE_COL {
                let mut acc = [0i32; TILE_COL];
                for kb in 0..k_blocks {
                    let a_run = &a_row[kb * Self::TILE_ROW..(kb + 1) * Self::TILE_ROW];
                    for (c, lane) in acc.iter_mut().enumerate() {
                        let off = run_offset(ct, kb, c, k_blocks, Self::TILE_ROW);
                        let b_run = &b[off..off + Self::TILE_ROW];
                        for (&av, &bv) in a_run.iter().zip(b_run) {
                            *lane += av as i32 * bv as i32;
                        }
                    }
                }
                write.write(row, ct * TILE_COL, &acc);
            }
        }
        Ok(())
    }
}

impl GemmKernel8 for ScalarI8 {
    /// Exact, like the VNNI path: products accumulate straight into i32
    fn multiply_shifted<W: WriteKernel>(
        a: &[u8],
        b: &[i8],
        write: &mut W,
        a_rows: usize,
        width: usize,
        b_cols: usize,
    ) -> Result<(), IntGemmError> {
        check_multiply_shapes(a.len(), b.len(), a_rows, width, b_cols, Self::TILE_ROW)?;
        let k_blocks = width / Self::TILE_ROW;
        for row in 0..a_rows {
            let a_row = &a[row * width..(row + 1) * width];
            for ct in 0..b_cols / TILE_COL {
                let mut acc = [0i32; TILE_COL];
                for kb in 0..k_blocks {
                    let a_run = &a_row[kb * Self::TILE_ROW..(kb + 1) * Self::TILE_ROW];
                    for (c, lane) in acc.iter_mut().enumerate() {
                        let off = run_offset(ct, kb, c, k_blocks, Self::TILE_ROW);
                        let b_run = &b[off..off + Self::TILE_ROW];
                        for (&av, &bv) in a_run.iter().zip(b_run) {
                            *lane += av as i32 * bv as i32;
                        }
                    }
                }
                write.write(row, ct * TILE_COL, &acc);
            }
        }
        Ok(())
    }
}

impl GemmKernel for ScalarI16 {
    type Integer = i16;

    const TILE_ROW: usize = 8;
    const NAME: &'static str = "scalar-16bit";
    const USES: Option<CpuType> = None;

    fn quantize(input: &[f32], output: &mut [i16], quant_mult: f32) -> Result<(), IntGemmError> {
        check_len("quantize output length", output.len(), input.len())?;
        for (dst, &x) in output.iter_mut().zip(input) {
            *dst = quantize_one_i16(x, quant_mult);
        }
        Ok(())
    }

    fn multiply<W: WriteKernel>(
        a: &[i16],
        b: &[i16],
        write: &mut W,
        a_rows: usize,
        width: usize,
        b_cols: usize,
    ) -> Result<(), IntGemmError> {
        check_multiply_shapes(a.len(), b.len(), a_rows, width, b_cols, Self::TILE_ROW)?;
        let k_blocks = width / Self::TILE_ROW;
        for row in 0..a_rows {
            let a_row = &a[row * width..(row + 1) * width];
            for ct in 0..b_cols / TILE_COL {
                let mut acc = [0i32; TILE_COL];
                for kb in 0..k_blocks {
                    let a_run = &a_row[kb * Self::TILE_ROW..(kb + 1) * Self::TILE_ROW];
                    for (c, lane) in acc.iter_mut().enumerate() {
                        let off = run_offset(ct, kb, c, k_blocks, Self::TILE_ROW);
                        let b_run = &b[off..off + Self::TILE_ROW];
                        for (&av, &bv) in a_run.iter().zip(b_run) {
                            *lane += av as i32 * bv as i32;
                        }
                    }
                }
                write.write(row, ct * TILE_COL, &acc);
            }
        }
        Ok(())
    }
}

/// Row-major oracle: `out[r, c] = sum_k a[r, k] * b[k, c]` in i32
///
/// Works on the unpacked quantized B, independent of the tile layout, so it
/// cross-checks both the packing and the microkernels.
pub fn multiply_rowmajor_i8(
    a: &[i8],
    b: &[i8],
    out: &mut [i32],
    a_rows: usize,
    width: usize,
    b_cols: usize,
) {
    for row in 0..a_rows {
        for col in 0..b_cols {
            let mut sum = 0i32;
            for k in 0..width {
                sum += a[row * width + k] as i32 * b[k * b_cols + col] as i32;
            }
            out[row * b_cols + col] = sum;
        }
    }
}

/// Row-major oracle for the 16-bit path
pub fn multiply_rowmajor_i16(
    a: &[i16],
    b: &[i16],
    out: &mut [i32],
    a_rows: usize,
    width: usize,
    b_cols: usize,
) {
    for row in 0..a_rows {
        for col in 0..b_cols {
            let mut sum = 0i32;
            for k in 0..width {
                sum += a[row * width + k] as i32 * b[k * b_cols + col] as i32;
            }
            out[row * b_cols + col] = sum;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::write::JustUnquantize;

    #[test]
    fn test_quantize_corners_i8() {
        let input = [0.0f32, 1.0, 126.0, 127.0, 128.0, 32767.0, -127.0, -128.0, -32769.0];
        let mut out = [0i8; 9];
        ScalarI8::quantize(&input, &mut out, 1.0).unwrap();
        assert_eq!(out, [0, 1, 126, 127, 127, 127, -127, -127, -127]);
    }

    #[test]
    fn test_quantize_corners_i16() {
        let input = [32766.0f32, 32767.0, 32768.0, 32769.0, -32768.0, -32769.0];
        let mut out = [0i16; 6];
        ScalarI16::quantize(&input, &mut out, 1.0).unwrap();
        assert_eq!(out, [32766, 32767, 32767, 32767, -32768, -32768]);
    }

    #[test]
    fn test_quantize_ties_round_to_even() {
        let input = [-0.5f32, 0.5, 1.5, 2.5];
        let mut out = [0i8; 4];
        ScalarI8::quantize(&input, &mut out, 1.0).unwrap();
        assert_eq!(out, [0, 0, 2, 2]);
    }

    #[test]
    fn test_multiply_against_rowmajor() {
        let a_rows = 3;
        let width = 32;
        let b_cols = 8;
        let a: Vec<i8> = (0..a_rows * width).map(|i| ((i * 7) % 255) as i8).collect();
        let b_rowmajor: Vec<i8> = (0..width * b_cols).map(|i| ((i * 13) % 251) as i8).collect();

        let mut packed = vec![0i8; b_rowmajor.len()];
        crate::pack::pack_b(&b_rowmajor, &mut packed, width, b_cols, ScalarI8::TILE_ROW).unwrap();

        let mut expect = vec![0i32; a_rows * b_cols];
        multiply_rowmajor_i8(&a, &b_rowmajor, &mut expect, a_rows, width, b_cols);

        let mut out = vec![0.0f32; a_rows * b_cols];
        let mut wk = JustUnquantize::new(&mut out, b_cols, 1.0);
        ScalarI8::multiply(&a, &packed, &mut wk, a_rows, width, b_cols).unwrap();

        for (o, e) in out.iter().zip(&expect) {
            assert_eq!(*o, *e as f32);
        }
    }

    #[test]
    fn test_shifted_matches_signed_plus_column_shift() {
        let width = 16;
        let b_cols = 8;
        let a_q: Vec<i8> = (0..width).map(|i| (i as i8) - 8).collect();
        let a_u: Vec<u8> = a_q.iter().map(|&q| (q as i16 + 128) as u8).collect();
        let b_rowmajor: Vec<i8> = (0..width * b_cols).map(|i| ((i % 17) as i8) - 8).collect();

        let mut packed = vec![0i8; b_rowmajor.len()];
        crate::pack::pack_b(&b_rowmajor, &mut packed, width, b_cols, 16).unwrap();

        let mut signed = vec![0i32; b_cols];
        let mut shifted = vec![0i32; b_cols];
        {
            let mut wk = crate::write::Rescale::new(&mut signed, b_cols, 1.0);
            ScalarI8::multiply(&a_q, &packed, &mut wk, 1, width, b_cols).unwrap();
        }
        {
            let mut wk = crate::write::Rescale::new(&mut shifted, b_cols, 1.0);
            ScalarI8::multiply_shifted(&a_u, &packed, &mut wk, 1, width, b_cols).unwrap();
        }

        // shifted = signed + 128 * column_sum(B)
        for col in 0..b_cols {
            let colsum: i32 = (0..width).map(|k| b_rowmajor[k * b_cols + col] as i32).sum();
            assert_eq!(shifted[col], signed[col] + 128 * colsum);
        }
    }
}
