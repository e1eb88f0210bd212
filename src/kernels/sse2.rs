//! SSE2 16-bit kernels
//!
//! The baseline path: every x86-64 CPU runs these. 16-bit quantization
//! packs pairs of converted i32 vectors; the GEMM inner product is a
//! single `pmaddwd` per load pair.

use std::arch::x86_64::*;

use crate::aligned::debug_assert_aligned;
use crate::cpu::CpuType;
use crate::error::{IntGemmError, check_len};
use crate::kernels::{GemmKernel, check_multiply_shapes};
use crate::pack::{TILE_COL, run_offset};
use crate::stats::MeanStd;
use crate::write::WriteKernel;

pub struct Sse2I16;

impl GemmKernel for Sse2I16 {
    type Integer = i16;

    const TILE_ROW: usize = 8;
    const NAME: &'static str = "sse2-16bit";
    const USES: Option<CpuType> = Some(CpuType::Sse2);

    fn quantize(input: &[f32], output: &mut [i16], quant_mult: f32) -> Result<(), IntGemmError> {
        check_len("quantize output length", output.len(), input.len())?;
        debug_assert!(CpuType::Sse2.is_supported());
        unsafe { quantize(input, output, quant_mult) };
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
        debug_assert!(CpuType::Sse2.is_supported());
        debug_assert_aligned(a.as_ptr());
        debug_assert_aligned(b.as_ptr());
        unsafe { multiply(a, b, write, a_rows, width, b_cols) };
        Ok(())
    }
}

/// Sum the four i32 lanes
#[inline]
pub(crate) fn hsum_epi32_sse2(v: __m128i) -> i32 {
    unsafe {
        let hi64 = _mm_unpackhi_epi64(v, v);
        let sum2 = _mm_add_epi32(v, hi64);
        let hi32 = _mm_shuffle_epi32::<0b01_01_01_01>(sum2);
        _mm_cvtsi128_si32(_mm_add_epi32(sum2, hi32))
    }
}

/// Sum the four f32 lanes
#[inline]
pub(crate) fn hsum_ps_sse2(v: __m128) -> f32 {
    unsafe {
        let hi64 = _mm_movehl_ps(v, v);
        let sum2 = _mm_add_ps(v, hi64);
        let hi32 = _mm_shuffle_ps::<0b01_01_01_01>(sum2, sum2);
        _mm_cvtss_f32(_mm_add_ss(sum2, hi32))
    }
}

#[target_feature(enable = "sse2")]
unsafe fn quantize(input: &[f32], output: &mut [i16], quant_mult: f32) {
    let size = input.len();
    let chunks = size / 8;
    unsafe {
        let mult = _mm_set1_ps(quant_mult);
        let in_ptr = input.as_ptr();
        let out_ptr = output.as_mut_ptr();
        for i in 0..chunks {
            let base = in_ptr.add(i * 8);
            let lo = _mm_cvtps_epi32(_mm_mul_ps(_mm_loadu_ps(base), mult));
            let hi = _mm_cvtps_epi32(_mm_mul_ps(_mm_loadu_ps(base.add(4)), mult));
            let words = _mm_packs_epi32(lo, hi);
            _mm_storeu_si128(out_ptr.add(i * 8) as *mut __m128i, words);
        }
    }
    for i in chunks * 8..size {
        output[i] = super::scalar::quantize_one_i16(input[i], quant_mult);
    }
}

#[target_feature(enable = "sse2")]
unsafe fn multiply<W: WriteKernel>(
    a: &[i16],
    b: &[i16],
    write: &mut W,
    a_rows: usize,
    width: usize,
    b_cols: usize,
) {
    let k_blocks = width / 8;
    let mut row = 0;
    while row + 2 <= a_rows {
        for ct in 0..b_cols / TILE_COL {
            unsafe { tile::<2, W>(a, b, write, row, width, k_blocks, ct) };
        }
        row += 2;
    }
    if row < a_rows {
        for ct in 0..b_cols / TILE_COL {
            unsafe { tile::<1, W>(a, b, write, row, width, k_blocks, ct) };
        }
    }
}

#[target_feature(enable = "sse2")]
unsafe fn tile<const M: usize, W: WriteKernel>(
    a: &[i16],
    b: &[i16],
    write: &mut W,
    row: usize,
    width: usize,
    k_blocks: usize,
    ct: usize,
) {
    unsafe {
        let mut acc = [[_mm_setzero_si128(); TILE_COL]; M];
        for kb in 0..k_blocks {
            let mut a_vec = [_mm_setzero_si128(); M];
            for m in 0..M {
                let ptr = a.as_ptr().add((row + m) * width + kb * 8);
                a_vec[m] = _mm_load_si128(ptr as *const __m128i);
            }
            for c in 0..TILE_COL {
                let off = run_offset(ct, kb, c, k_blocks, 8);
                let b_vec = _mm_load_si128(b.as_ptr().add(off) as *const __m128i);
                for m in 0..M {
                    let pairs32 = _mm_madd_epi16(a_vec[m], b_vec);
                    acc[m][c] = _mm_add_epi32(acc[m][c], pairs32);
                }
            }
        }
        for m in 0..M {
            let mut lanes = [0i32; TILE_COL];
            for c in 0..TILE_COL {
                lanes[c] = hsum_epi32_sse2(acc[m][c]);
            }
            write.write(row + m, ct * TILE_COL, &lanes);
        }
    }
}

/// Mean and standard deviation of a float vector, optionally of |x|
pub fn mean_std(input: &[f32], absolute: bool) -> MeanStd {
    debug_assert!(CpuType::Sse2.is_supported());
    unsafe { mean_std_inner(input, absolute) }
}

#[target_feature(enable = "sse2")]
unsafe fn mean_std_inner(input: &[f32], absolute: bool) -> MeanStd {
    let size = input.len();
    let chunks = size / 4;
    let mut sum;
    let mut sum_sq;
    unsafe {
        let sign_mask = _mm_set1_ps(-0.0);
        let mut vsum = _mm_setzero_ps();
        let mut vsum_sq = _mm_setzero_ps();
        let ptr = input.as_ptr();
        for i in 0..chunks {
            let v = _mm_loadu_ps(ptr.add(i * 4));
            let addend = if absolute { _mm_andnot_ps(sign_mask, v) } else { v };
            vsum = _mm_add_ps(vsum, addend);
            vsum_sq = _mm_add_ps(vsum_sq, _mm_mul_ps(v, v));
        }
        sum = hsum_ps_sse2(vsum);
        sum_sq = hsum_ps_sse2(vsum_sq);
    }
    for &x in &input[chunks * 4..] {
        sum += if absolute { x.abs() } else { x };
        sum_sq += x * x;
    }
    MeanStd::from_sums(sum, sum_sq, size)
}
