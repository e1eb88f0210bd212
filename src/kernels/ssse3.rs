//! SSSE3 8-bit kernels
//!
//! `pmaddubsw` (the widening 8-bit multiply) is SSSE3, so pedantically
//! that is the level the 8-bit path needs; everything else here is SSE2.
//! The signed multiply runs `a * b` as `|a| * sign(b, a)`: `pmaddubsw`
//! wants its first operand unsigned, and with |a|, |b| <= 127 the i16
//! pair sums peak at 32258, under the saturation point.

use std::arch::x86_64::*;

use crate::aligned::debug_assert_aligned;
use crate::cpu::CpuType;
use crate::error::{IntGemmError, check_len};
use crate::kernels::{GemmKernel, GemmKernel8, check_multiply_shapes};
use crate::pack::{TILE_COL, run_offset};
use crate::write::WriteKernel;

use super::sse2::hsum_epi32_sse2;

pub struct Ssse3I8;

impl GemmKernel for Ssse3I8 {
    type Integer = i8;

    const TILE_ROW: usize = 16;
    const NAME: &'static str = "ssse3-8bit";
    const USES: Option<CpuType> = Some(CpuType::Ssse3);

    fn quantize(input: &[f32], output: &mut [i8], quant_mult: f32) -> Result<(), IntGemmError> {
        check_len("quantize output length", output.len(), input.len())?;
        debug_assert!(CpuType::Ssse3.is_supported());
        unsafe { quantize(input, output, quant_mult) };
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
        debug_assert!(CpuType::Ssse3.is_supported());
        debug_assert_aligned(a.as_ptr());
        debug_assert_aligned(b.as_ptr());
        unsafe { multiply(a, b, write, a_rows, width, b_cols) };
        Ok(())
    }
}

impl GemmKernel8 for Ssse3I8 {
    fn multiply_shifted<W: WriteKernel>(
        a: &[u8],
        b: &[i8],
        write: &mut W,
        a_rows: usize,
        width: usize,
        b_cols: usize,
    ) -> Result<(), IntGemmError> {
        check_multiply_shapes(a.len(), b.len(), a_rows, width, b_cols, Self::TILE_ROW)?;
        debug_assert!(CpuType::Ssse3.is_supported());
        debug_assert_aligned(a.as_ptr());
        debug_assert_aligned(b.as_ptr());
        unsafe { multiply_shifted(a, b, write, a_rows, width, b_cols) };
        Ok(())
    }
}

#[target_feature(enable = "ssse3")]
unsafe fn quantize(input: &[f32], output: &mut [i8], quant_mult: f32) {
    let size = input.len();
    let chunks = size / 16;
    unsafe {
        let mult = _mm_set1_ps(quant_mult);
        // packs_epi16 saturates to -128; nudging those lanes to -127 keeps
        // the quantized range symmetric
        let min_bound = _mm_set1_epi8(-128);
        let in_ptr = input.as_ptr();
        let out_ptr = output.as_mut_ptr();
        for i in 0..chunks {
            let base = in_ptr.add(i * 16);
            let g0 = _mm_cvtps_epi32(_mm_mul_ps(_mm_loadu_ps(base), mult));
            let g1 = _mm_cvtps_epi32(_mm_mul_ps(_mm_loadu_ps(base.add(4)), mult));
            let g2 = _mm_cvtps_epi32(_mm_mul_ps(_mm_loadu_ps(base.add(8)), mult));
            let g3 = _mm_cvtps_epi32(_mm_mul_ps(_mm_loadu_ps(base.add(12)), mult));
            let words_lo = _mm_packs_epi32(g0, g1);
            let words_hi = _mm_packs_epi32(g2, g3);
            let bytes = _mm_packs_epi16(words_lo, words_hi);
            // bytes == -128 ? +1 : +0  (cmpeq yields -1 in matching lanes)
            let at_floor = _mm_cmpeq_epi8(bytes, min_bound);
            let clamped = _mm_sub_epi8(bytes, at_floor);
            _mm_storeu_si128(out_ptr.add(i * 16) as *mut __m128i, clamped);
        }
    }
    for i in chunks * 16..size {
        output[i] = super::scalar::quantize_one_i8(input[i], quant_mult);
    }
}

#[target_feature(enable = "ssse3")]
unsafe fn multiply<W: WriteKernel>(
    a: &[i8],
    b: &[i8],
    write: &mut W,
    a_rows: usize,
    width: usize,
    b_cols: usize,
) {
    let k_blocks = width / 16;
    let mut row = 0;
    while row + 2 <= a_rows {
        for ct in 0..b_cols / TILE_COL {
            unsafe { tile_signed::<2, W>(a, b, write, row, width, k_blocks, ct) };
        }
        row += 2;
    }
    if row < a_rows {
        for ct in 0..b_cols / TILE_COL {
            unsafe { tile_signed::<1, W>(a, b, write, row, width, k_blocks, ct) };
        }
    }
}

/// One M x 8 output tile of the signed path
#[target_feature(enable = "ssse3")]
unsafe fn tile_signed<const M: usize, W: WriteKernel>(
    a: &[i8],
    b: &[i8],
    write: &mut W,
    row: usize,
    width: usize,
    k_blocks: usize,
    ct: usize,
) {
    unsafe {
        let ones = _mm_set1_epi16(1);
        let mut acc = [[_mm_setzero_si128(); TILE_COL]; M];
        for kb in 0..k_blocks {
            let mut a_vec = [_mm_setzero_si128(); M];
            let mut a_abs = [_mm_setzero_si128(); M];
            for m in 0..M {
                let ptr = a.as_ptr().add((row + m) * width + kb * 16);
                a_vec[m] = _mm_load_si128(ptr as *const __m128i);
                a_abs[m] = _mm_abs_epi8(a_vec[m]);
            }
            for c in 0..TILE_COL {
                let off = run_offset(ct, kb, c, k_blocks, 16);
                let b_vec = _mm_load_si128(b.as_ptr().add(off) as *const __m128i);
                for m in 0..M {
                    let b_signed = _mm_sign_epi8(b_vec, a_vec[m]);
                    let pairs16 = _mm_maddubs_epi16(a_abs[m], b_signed);
                    let pairs32 = _mm_madd_epi16(pairs16, ones);
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

#[target_feature(enable = "ssse3")]
unsafe fn multiply_shifted<W: WriteKernel>(
    a: &[u8],
    b: &[i8],
    write: &mut W,
    a_rows: usize,
    width: usize,
    b_cols: usize,
) {
    let k_blocks = width / 16;
    let mut row = 0;
    while row + 2 <= a_rows {
        for ct in 0..b_cols / TILE_COL {
            unsafe { tile_shifted::<2, W>(a, b, write, row, width, k_blocks, ct) };
        }
        row += 2;
    }
    if row < a_rows {
        for ct in 0..b_cols / TILE_COL {
            unsafe { tile_shifted::<1, W>(a, b, write, row, width, k_blocks, ct) };
        }
    }
}

/// One M x 8 output tile of the shifted (unsigned A) path
#[target_feature(enable = "ssse3")]
unsafe fn tile_shifted<const M: usize, W: WriteKernel>(
    a: &[u8],
    b: &[i8],
    write: &mut W,
    row: usize,
    width: usize,
    k_blocks: usize,
    ct: usize,
) {
    unsafe {
        let ones = _mm_set1_epi16(1);
        let mut acc = [[_mm_setzero_si128(); TILE_COL]; M];
        for kb in 0..k_blocks {
            let mut a_vec = [_mm_setzero_si128(); M];
            for m in 0..M {
                let ptr = a.as_ptr().add((row + m) * width + kb * 16);
                a_vec[m] = _mm_load_si128(ptr as *const __m128i);
            }
            for c in 0..TILE_COL {
                let off = run_offset(ct, kb, c, k_blocks, 16);
                let b_vec = _mm_load_si128(b.as_ptr().add(off) as *const __m128i);
                for m in 0..M {
                    let pairs16 = _mm_maddubs_epi16(a_vec[m], b_vec);
                    let pairs32 = _mm_madd_epi16(pairs16, ones);
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
