//! AVX2 8-bit and 16-bit kernels
//!
//! Same structure as the SSSE3/SSE2 files at twice the vector width. The
//! 256-bit pack instructions work per 128-bit lane, so quantization ends
//! with a cross-lane permute to restore element order.

use std::arch::x86_64::*;

use crate::aligned::debug_assert_aligned;
use crate::cpu::CpuType;
use crate::error::{IntGemmError, check_len};
use crate::kernels::{GemmKernel, GemmKernel8, check_multiply_shapes};
use crate::pack::{TILE_COL, run_offset};
use crate::stats::MeanStd;
use crate::write::WriteKernel;

use super::sse2::{hsum_epi32_sse2, hsum_ps_sse2};

pub struct Avx2I8;
pub struct Avx2I16;

impl GemmKernel for Avx2I8 {
    type Integer = i8;

    const TILE_ROW: usize = 32;
    const NAME: &'static str = "avx2-8bit";
    const USES: Option<CpuType> = Some(CpuType::Avx2);

    fn quantize(input: &[f32], output: &mut [i8], quant_mult: f32) -> Result<(), IntGemmError> {
        check_len("quantize output length", output.len(), input.len())?;
        debug_assert!(CpuType::Avx2.is_supported());
        unsafe { quantize_8(input, output, quant_mult) };
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
        debug_assert!(CpuType::Avx2.is_supported());
        debug_assert_aligned(a.as_ptr());
        debug_assert_aligned(b.as_ptr());
        unsafe { multiply_8(a, b, write, a_rows, width, b_cols) };
        Ok(())
    }
}

impl GemmKernel8 for Avx2I8 {
    fn multiply_shifted<W: WriteKernel>(
        a: &[u8],
        b: &[i8],
        write: &mut W,
        a_rows: usize,
        width: usize,
        b_cols: usize,
    ) -> Result<(), IntGemmError> {
        check_multiply_shapes(a.len(), b.len(), a_rows, width, b_cols, Self::TILE_ROW)?;
        debug_assert!(CpuType::Avx2.is_supported());
        debug_assert_aligned(a.as_ptr());
        debug_assert_aligned(b.as_ptr());
        unsafe { multiply_shifted_8(a, b, write, a_rows, width, b_cols) };
        Ok(())
    }
}

impl GemmKernel for Avx2I16 {
    type Integer = i16;

    const TILE_ROW: usize = 16;
    const NAME: &'static str = "avx2-16bit";
    const USES: Option<CpuType> = Some(CpuType::Avx2);

    fn quantize(input: &[f32], output: &mut [i16], quant_mult: f32) -> Result<(), IntGemmError> {
        check_len("quantize output length", output.len(), input.len())?;
        debug_assert!(CpuType::Avx2.is_supported());
        unsafe { quantize_16(input, output, quant_mult) };
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
        debug_assert!(CpuType::Avx2.is_supported());
        debug_assert_aligned(a.as_ptr());
        debug_assert_aligned(b.as_ptr());
        unsafe { multiply_16(a, b, write, a_rows, width, b_cols) };
        Ok(())
    }
}

/// Sum the eight i32 lanes
#[inline]
fn hsum_epi32_avx2(v: __m256i) -> i32 {
    unsafe {
        let lo = _mm256_castsi256_si128(v);
        let hi = _mm256_extracti128_si256::<1>(v);
        hsum_epi32_sse2(_mm_add_epi32(lo, hi))
    }
}

#[target_feature(enable = "avx2")]
unsafe fn quantize_8(input: &[f32], output: &mut [i8], quant_mult: f32) {
    let size = input.len();
    let chunks = size / 32;
    unsafe {
        let mult = _mm256_set1_ps(quant_mult);
        let floor_val = _mm256_set1_epi8(-127);
        // packs interleave per 128-bit lane; this dword permute restores
        // source order afterwards
        let unscramble = _mm256_setr_epi32(0, 4, 1, 5, 2, 6, 3, 7);
        let in_ptr = input.as_ptr();
        let out_ptr = output.as_mut_ptr();
        for i in 0..chunks {
            let base = in_ptr.add(i * 32);
            let g0 = _mm256_cvtps_epi32(_mm256_mul_ps(_mm256_loadu_ps(base), mult));
            let g1 = _mm256_cvtps_epi32(_mm256_mul_ps(_mm256_loadu_ps(base.add(8)), mult));
            let g2 = _mm256_cvtps_epi32(_mm256_mul_ps(_mm256_loadu_ps(base.add(16)), mult));
            let g3 = _mm256_cvtps_epi32(_mm256_mul_ps(_mm256_loadu_ps(base.add(24)), mult));
            let words_lo = _mm256_packs_epi32(g0, g1);
            let words_hi = _mm256_packs_epi32(g2, g3);
            let bytes = _mm256_packs_epi16(words_lo, words_hi);
            let clamped = _mm256_max_epi8(bytes, floor_val);
            let ordered = _mm256_permutevar8x32_epi32(clamped, unscramble);
            _mm256_storeu_si256(out_ptr.add(i * 32) as *mut __m256i, ordered);
        }
    }
    for i in chunks * 32..size {
        output[i] = super::scalar::quantize_one_i8(input[i], quant_mult);
    }
}

#[target_feature(enable = "avx2")]
unsafe fn quantize_16(input: &[f32], output: &mut [i16], quant_mult: f32) {
    let size = input.len();
    let chunks = size / 16;
    unsafe {
        let mult = _mm256_set1_ps(quant_mult);
        let in_ptr = input.as_ptr();
        let out_ptr = output.as_mut_ptr();
        for i in 0..chunks {
            let base = in_ptr.add(i * 16);
            let lo = _mm256_cvtps_epi32(_mm256_mul_ps(_mm256_loadu_ps(base), mult));
            let hi = _mm256_cvtps_epi32(_mm256_mul_ps(_mm256_loadu_ps(base.add(8)), mult));
            let words = _mm256_packs_epi32(lo, hi);
            // qword order after the lane-wise pack is 0, 2, 1, 3
            let ordered = _mm256_permute4x64_epi64::<0b11_01_10_00>(words);
            _mm256_storeu_si256(out_ptr.add(i * 16) as *mut __m256i, ordered);
        }
    }
    for i in chunks * 16..size {
        output[i] = super::scalar::quantize_one_i16(input[i], quant_mult);
    }
}

#[target_feature(enable = "avx2")]
unsafe fn multiply_8<W: WriteKernel>(
    a: &[i8],
    b: &[i8],
    write: &mut W,
    a_rows: usize,
    width: usize,
    b_cols: usize,
) {
    let k_blocks = width / 32;
    let mut row = 0;
    while row + 2 <= a_rows {
        for ct in 0..b_cols / TILE_COL {
            unsafe { tile_signed_8::<2, W>(a, b, write, row, width, k_blocks, ct) };
        }
        row += 2;
    }
    if row < a_rows {
        for ct in 0..b_cols / TILE_COL {
            unsafe { tile_signed_8::<1, W>(a, b, write, row, width, k_blocks, ct) };
        }
    }
}

#[target_feature(enable = "avx2")]
unsafe fn tile_signed_8<const M: usize, W: WriteKernel>(
    a: &[i8],
    b: &[i8],
    write: &mut W,
    row: usize,
    width: usize,
    k_blocks: usize,
    ct: usize,
) {
    unsafe {
        let ones = _mm256_set1_epi16(1);
        let mut acc = [[_mm256_setzero_si256(); TILE_COL]; M];
        for kb in 0..k_blocks {
            let mut a_vec = [_mm256_setzero_si256(); M];
            let mut a_abs = [_mm256_setzero_si256(); M];
            for m in 0..M {
                let ptr = a.as_ptr().add((row + m) * width + kb * 32);
                a_vec[m] = _mm256_load_si256(ptr as *const __m256i);
                a_abs[m] = _mm256_abs_epi8(a_vec[m]);
            }
            for c in 0..TILE_COL {
                let off = run_offset(ct, kb, c, k_blocks, 32);
                let b_vec = _mm256_load_si256(b.as_ptr().add(off) as *const __m256i);
                for m in 0..M {
                    let b_signed = _mm256_sign_epi8(b_vec, a_vec[m]);
                    let pairs16 = _mm256_maddubs_epi16(a_abs[m], b_signed);
                    let pairs32 = _mm256_madd_epi16(pairs16, ones);
                    acc[m][c] = _mm256_add_epi32(acc[m][c], pairs32);
                }
            }
        }
        for m in 0..M {
            let mut lanes = [0i32; TILE_COL];
            for c in 0..TILE_COL {
                lanes[c] = hsum_epi32_avx2(acc[m][c]);
            }
            write.write(row + m, ct * TILE_COL, &lanes);
        }
    }
}

#[target_feature(enable = "avx2")]
unsafe fn multiply_shifted_8<W: WriteKernel>(
    a: &[u8],
    b: &[i8],
    write: &mut W,
    a_rows: usize,
    width: usize,
    b_cols: usize,
) {
    let k_blocks = width / 32;
    let mut row = 0;
    while row + 2 <= a_rows {
        for ct in 0..b_cols / TILE_COL {
            unsafe { tile_shifted_8::<2, W>(a, b, write, row, width, k_blocks, ct) };
        }
        row += 2;
    }
    if row < a_rows {
        for ct in 0..b_cols / TILE_COL {
            unsafe { tile_shifted_8::<1, W>(a, b, write, row, width, k_blocks, ct) };
        }
    }
}

#[target_feature(enable = "avx2")]
unsafe fn tile_shifted_8<const M: usize, W: WriteKernel>(
    a: &[u8],
    b: &[i8],
    write: &mut W,
    row: usize,
    width: usize,
    k_blocks: usize,
    ct: usize,
) {
    unsafe {
        let ones = _mm256_set1_epi16(1);
        let mut acc = [[_mm256_setzero_si256(); TILE_COL]; M];
        for kb in 0..k_blocks {
            let mut a_vec = [_mm256_setzero_si256(); M];
            for m in 0..M {
                let ptr = a.as_ptr().add((row + m) * width + kb * 32);
                a_vec[m] = _mm256_load_si256(ptr as *const __m256i);
            }
            for c in 0..TILE_COL {
                let off = run_offset(ct, kb, c, k_blocks, 32);
                let b_vec = _mm256_load_si256(b.as_ptr().add(off) as *const __m256i);
                for m in 0..M {
                    let pairs16 = _mm256_maddubs_epi16(a_vec[m], b_vec);
                    let pairs32 = _mm256_madd_epi16(pairs16, ones);
                    acc[m][c] = _mm256_add_epi32(acc[m][c], pairs32);
                }
            }
        }
        for m in 0..M {
            let mut lanes = [0i32; TILE_COL];
            for c in 0..TILE_COL {
                lanes[c] = hsum_epi32_avx2(acc[m][c]);
            }
            write.write(row + m, ct * TILE_COL, &lanes);
        }
    }
}

#[target_feature(enable = "avx2")]
unsafe fn multiply_16<W: WriteKernel>(
    a: &[i16],
    b: &[i16],
    write: &mut W,
    a_rows: usize,
    width: usize,
    b_cols: usize,
) {
    let k_blocks = width / 16;
    let mut row = 0;
    while row + 2 <= a_rows {
        for ct in 0..b_cols / TILE_COL {
            unsafe { tile_16::<2, W>(a, b, write, row, width, k_blocks, ct) };
        }
        row += 2;
    }
    if row < a_rows {
        for ct in 0..b_cols / TILE_COL {
            unsafe { tile_16::<1, W>(a, b, write, row, width, k_blocks, ct) };
        }
    }
}

#[target_feature(enable = "avx2")]
unsafe fn tile_16<const M: usize, W: WriteKernel>(
    a: &[i16],
    b: &[i16],
    write: &mut W,
    row: usize,
    width: usize,
    k_blocks: usize,
    ct: usize,
) {
    unsafe {
        let mut acc = [[_mm256_setzero_si256(); TILE_COL]; M];
        for kb in 0..k_blocks {
            let mut a_vec = [_mm256_setzero_si256(); M];
            for m in 0..M {
                let ptr = a.as_ptr().add((row + m) * width + kb * 16);
                a_vec[m] = _mm256_load_si256(ptr as *const __m256i);
            }
            for c in 0..TILE_COL {
                let off = run_offset(ct, kb, c, k_blocks, 16);
                let b_vec = _mm256_load_si256(b.as_ptr().add(off) as *const __m256i);
                for m in 0..M {
                    let pairs32 = _mm256_madd_epi16(a_vec[m], b_vec);
                    acc[m][c] = _mm256_add_epi32(acc[m][c], pairs32);
                }
            }
        }
        for m in 0..M {
            let mut lanes = [0i32; TILE_COL];
            for c in 0..TILE_COL {
                lanes[c] = hsum_epi32_avx2(acc[m][c]);
            }
            write.write(row + m, ct * TILE_COL, &lanes);
        }
    }
}

/// Mean and standard deviation of a float vector, optionally of |x|
pub fn mean_std(input: &[f32], absolute: bool) -> MeanStd {
    debug_assert!(CpuType::Avx2.is_supported());
    unsafe { mean_std_inner(input, absolute) }
}

#[target_feature(enable = "avx2")]
unsafe fn mean_std_inner(input: &[f32], absolute: bool) -> MeanStd {
    let size = input.len();
    let chunks = size / 8;
    let mut sum;
    let mut sum_sq;
    unsafe {
        let sign_mask = _mm256_set1_ps(-0.0);
        let mut vsum = _mm256_setzero_ps();
        let mut vsum_sq = _mm256_setzero_ps();
        let ptr = input.as_ptr();
        for i in 0..chunks {
            let v = _mm256_loadu_ps(ptr.add(i * 8));
            let addend = if absolute { _mm256_andnot_ps(sign_mask, v) } else { v };
            vsum = _mm256_add_ps(vsum, addend);
            vsum_sq = _mm256_add_ps(vsum_sq, _mm256_mul_ps(v, v));
        }
        let lo = _mm256_castps256_ps128(vsum);
        let hi = _mm256_extractf128_ps::<1>(vsum);
        sum = hsum_ps_sse2(_mm_add_ps(lo, hi));
        let lo = _mm256_castps256_ps128(vsum_sq);
        let hi = _mm256_extractf128_ps::<1>(vsum_sq);
        sum_sq = hsum_ps_sse2(_mm_add_ps(lo, hi));
    }
    for &x in &input[chunks * 8..] {
        sum += if absolute { x.abs() } else { x };
        sum_sq += x * x;
    }
    MeanStd::from_sums(sum, sum_sq, size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aligned::AlignedBuffer;
    use crate::kernels::scalar::{ScalarI8, ScalarI16};
    use crate::write::JustUnquantize;

    fn have_avx2() -> bool {
        CpuType::Avx2.is_supported()
    }

    #[test]
    fn test_quantize_8_matches_scalar() {
        if !have_avx2() {
            return;
        }
        // 100 exercises both full vectors and the scalar tail
        let input: Vec<f32> = (0..100).map(|i| (i as f32 - 50.0) * 3.7).collect();
        let mut simd = vec![0i8; input.len()];
        let mut reference = vec![0i8; input.len()];
        Avx2I8::quantize(&input, &mut simd, 0.7).unwrap();
        ScalarI8::quantize(&input, &mut reference, 0.7).unwrap();
        assert_eq!(simd, reference);
    }

    #[test]
    fn test_quantize_16_matches_scalar() {
        if !have_avx2() {
            return;
        }
        let input: Vec<f32> = (0..99).map(|i| (i as f32 - 49.0) * 771.3).collect();
        let mut simd = vec![0i16; input.len()];
        let mut reference = vec![0i16; input.len()];
        Avx2I16::quantize(&input, &mut simd, 1.9).unwrap();
        ScalarI16::quantize(&input, &mut reference, 1.9).unwrap();
        assert_eq!(simd, reference);
    }

    #[test]
    fn test_quantize_8_element_order() {
        if !have_avx2() {
            return;
        }
        // Values 0..32 map to themselves; any permute mistake shows up
        let input: Vec<f32> = (0..32).map(|i| i as f32).collect();
        let mut out = vec![0i8; 32];
        Avx2I8::quantize(&input, &mut out, 1.0).unwrap();
        let expect: Vec<i8> = (0i8..32).collect();
        assert_eq!(out, expect);
    }

    #[test]
    fn test_multiply_8_matches_scalar() {
        if !have_avx2() {
            return;
        }
        let (a_rows, width, b_cols) = (7, 64, 24);
        let a = AlignedBuffer::from_fn(a_rows * width, |i| ((i * 31 + 11) % 251) as i8 as f32 / 8.0)
            .unwrap();
        let b = AlignedBuffer::from_fn(width * b_cols, |i| ((i * 23 + 5) % 249) as i8 as f32 / 8.0)
            .unwrap();

        let mut a_q = AlignedBuffer::<i8>::new(a.len()).unwrap();
        let mut b_packed = AlignedBuffer::<i8>::new(b.len()).unwrap();
        Avx2I8::prepare_a(&a, a_q.as_mut_slice(), 4.0, a_rows, width).unwrap();
        Avx2I8::prepare_b(&b, b_packed.as_mut_slice(), 4.0, width, b_cols).unwrap();

        // Scalar oracle runs on the unpacked quantized B
        let mut b_q = vec![0i8; b.len()];
        ScalarI8::quantize(&b, &mut b_q, 4.0).unwrap();
        let mut expect = vec![0i32; a_rows * b_cols];
        crate::kernels::scalar::multiply_rowmajor_i8(
            a_q.as_slice(),
            &b_q,
            &mut expect,
            a_rows,
            width,
            b_cols,
        );

        let mut simd = vec![0.0f32; a_rows * b_cols];
        let mut wk = JustUnquantize::new(&mut simd, b_cols, 1.0);
        Avx2I8::multiply(a_q.as_slice(), b_packed.as_slice(), &mut wk, a_rows, width, b_cols)
            .unwrap();

        for (s, e) in simd.iter().zip(&expect) {
            assert_eq!(*s, *e as f32);
        }
    }

    #[test]
    fn test_multiply_16_matches_scalar() {
        if !have_avx2() {
            return;
        }
        let (a_rows, width, b_cols) = (4, 32, 8);
        let a = AlignedBuffer::from_fn(a_rows * width, |i| (i as f32) - 60.0).unwrap();
        let b = AlignedBuffer::from_fn(width * b_cols, |i| ((i % 41) as f32) - 20.0).unwrap();

        let mut a_q = AlignedBuffer::<i16>::new(a.len()).unwrap();
        let mut b_packed = AlignedBuffer::<i16>::new(b.len()).unwrap();
        Avx2I16::prepare_a(&a, a_q.as_mut_slice(), 32.0, a_rows, width).unwrap();
        Avx2I16::prepare_b(&b, b_packed.as_mut_slice(), 32.0, width, b_cols).unwrap();

        let mut b_q = vec![0i16; b.len()];
        ScalarI16::quantize(&b, &mut b_q, 32.0).unwrap();
        let mut expect = vec![0i32; a_rows * b_cols];
        crate::kernels::scalar::multiply_rowmajor_i16(
            a_q.as_slice(),
            &b_q,
            &mut expect,
            a_rows,
            width,
            b_cols,
        );

        let mut simd = vec![0.0f32; a_rows * b_cols];
        let mut wk = JustUnquantize::new(&mut simd, b_cols, 1.0);
        Avx2I16::multiply(a_q.as_slice(), b_packed.as_slice(), &mut wk, a_rows, width, b_cols)
            .unwrap();

        for (s, e) in simd.iter().zip(&expect) {
            assert_eq!(*s, *e as f32);
        }
    }

    #[test]
    fn test_mean_std_matches_reference() {
        if !have_avx2() {
            return;
        }
        let input: Vec<f32> = (0..1000).map(|i| ((i * 37) % 211) as f32 / 211.0 - 0.5).collect();
        for absolute in [false, true] {
            let fast = mean_std(&input, absolute);
            let reference = crate::stats::mean_std_ref(&input, absolute);
            assert!((fast.mean - reference.mean).abs() <= 2e-5);
            assert!((fast.stddev - reference.stddev).abs() <= 2e-5);
        }
    }
}
