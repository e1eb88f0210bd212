//! AVX-512BW and AVX-512VNNI kernels
//!
//! Quantization uses the saturating down-converts (`vpmovsdb`/`vpmovsdw`),
//! which keep element order, so there is no cross-lane fixup; tails use
//! masked loads and stores instead of a scalar loop. There is no EVEX
//! `vpsignb`, so the signed 8-bit path flips B with a sign-bit mask and a
//! masked subtract-from-zero. The VNNI kernel replaces the whole
//! `pmaddubsw` + `pmaddwd` sequence with one `vpdpbusd` that accumulates
//! straight into i32, with no 16-bit intermediate to saturate.

use std::arch::x86_64::*;

use crate::aligned::debug_assert_aligned;
use crate::cpu::CpuType;
use crate::error::{IntGemmError, check_len};
use crate::kernels::{GemmKernel, GemmKernel8, check_multiply_shapes};
use crate::pack::{TILE_COL, run_offset};
use crate::stats::MeanStd;
use crate::write::WriteKernel;

pub struct Avx512I8;
pub struct Avx512I16;

/// `Avx512I8` with the shifted multiply running on `vpdpbusd`
pub struct Avx512VnniI8;

impl GemmKernel for Avx512I8 {
    type Integer = i8;

    const TILE_ROW: usize = 64;
    const NAME: &'static str = "avx512-8bit";
    const USES: Option<CpuType> = Some(CpuType::Avx512Bw);

    fn quantize(input: &[f32], output: &mut [i8], quant_mult: f32) -> Result<(), IntGemmError> {
        check_len("quantize output length", output.len(), input.len())?;
        debug_assert!(CpuType::Avx512Bw.is_supported());
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
        debug_assert!(CpuType::Avx512Bw.is_supported());
        debug_assert_aligned(a.as_ptr());
        debug_assert_aligned(b.as_ptr());
        unsafe { multiply_8(a, b, write, a_rows, width, b_cols) };
        Ok(())
    }
}

impl GemmKernel8 for Avx512I8 {
    fn multiply_shifted<W: WriteKernel>(
        a: &[u8],
        b: &[i8],
        write: &mut W,
        a_rows: usize,
        width: usize,
        b_cols: usize,
    ) -> Result<(), IntGemmError> {
        check_multiply_shapes(a.len(), b.len(), a_rows, width, b_cols, Self::TILE_ROW)?;
        debug_assert!(CpuType::Avx512Bw.is_supported());
        debug_assert_aligned(a.as_ptr());
        debug_assert_aligned(b.as_ptr());
        unsafe { multiply_shifted_8(a, b, write, a_rows, width, b_cols) };
        Ok(())
    }
}

impl GemmKernel for Avx512VnniI8 {
    type Integer = i8;

    const TILE_ROW: usize = 64;
    const NAME: &'static str = "avx512vnni-8bit";
    const USES: Option<CpuType> = Some(CpuType::Avx512Vnni);

    fn quantize(input: &[f32], output: &mut [i8], quant_mult: f32) -> Result<(), IntGemmError> {
        Avx512I8::quantize(input, output, quant_mult)
    }

    fn multiply<W: WriteKernel>(
        a: &[i8],
        b: &[i8],
        write: &mut W,
        a_rows: usize,
        width: usize,
        b_cols: usize,
    ) -> Result<(), IntGemmError> {
        Avx512I8::multiply(a, b, write, a_rows, width, b_cols)
    }
}

impl GemmKernel8 for Avx512VnniI8 {
    fn multiply_shifted<W: WriteKernel>(
        a: &[u8],
        b: &[i8],
        write: &mut W,
        a_rows: usize,
        width: usize,
        b_cols: usize,
    ) -> Result<(), IntGemmError> {
        check_multiply_shapes(a.len(), b.len(), a_rows, width, b_cols, Self::TILE_ROW)?;
        debug_assert!(CpuType::Avx512Vnni.is_supported());
        debug_assert_aligned(a.as_ptr());
        debug_assert_aligned(b.as_ptr());
        unsafe { multiply_shifted_vnni(a, b, write, a_rows, width, b_cols) };
        Ok(())
    }
}

impl GemmKernel for Avx512I16 {
    type Integer = i16;

    const TILE_ROW: usize = 32;
    const NAME: &'static str = "avx512-16bit";
    const USES: Option<CpuType> = Some(CpuType::Avx512Bw);

    fn quantize(input: &[f32], output: &mut [i16], quant_mult: f32) -> Result<(), IntGemmError> {
        check_len("quantize output length", output.len(), input.len())?;
        debug_assert!(CpuType::Avx512Bw.is_supported());
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
        debug_assert!(CpuType::Avx512Bw.is_supported());
        debug_assert_aligned(a.as_ptr());
        debug_assert_aligned(b.as_ptr());
        unsafe { multiply_16(a, b, write, a_rows, width, b_cols) };
        Ok(())
    }
}

#[target_feature(enable = "avx512f")]
unsafe fn quantize_8(input: &[f32], output: &mut [i8], quant_mult: f32) {
    let size = input.len();
    let chunks = size / 16;
    unsafe {
        let mult = _mm512_set1_ps(quant_mult);
        let floor_val = _mm512_set1_epi32(-127);
        let in_ptr = input.as_ptr();
        let out_ptr = output.as_mut_ptr();
        for i in 0..chunks {
            let v = _mm512_cvtps_epi32(_mm512_mul_ps(_mm512_loadu_ps(in_ptr.add(i * 16)), mult));
            let clamped = _mm512_max_epi32(v, floor_val);
            let bytes = _mm512_cvtsepi32_epi8(clamped);
            _mm_storeu_si128(out_ptr.add(i * 16) as *mut __m128i, bytes);
        }
        let rem = size - chunks * 16;
        if rem > 0 {
            let mask: __mmask16 = (1u16 << rem) - 1;
            let v = _mm512_maskz_loadu_ps(mask, in_ptr.add(chunks * 16));
            let q = _mm512_cvtps_epi32(_mm512_mul_ps(v, mult));
            let clamped = _mm512_max_epi32(q, floor_val);
            _mm512_mask_cvtsepi32_storeu_epi8(out_ptr.add(chunks * 16), mask, clamped);
        }
    }
}

#[target_feature(enable = "avx512f")]
unsafe fn quantize_16(input: &[f32], output: &mut [i16], quant_mult: f32) {
    let size = input.len();
    let chunks = size / 16;
    unsafe {
        let mult = _mm512_set1_ps(quant_mult);
        let in_ptr = input.as_ptr();
        let out_ptr = output.as_mut_ptr();
        for i in 0..chunks {
            let v = _mm512_cvtps_epi32(_mm512_mul_ps(_mm512_loadu_ps(in_ptr.add(i * 16)), mult));
            let words = _mm512_cvtsepi32_epi16(v);
            _mm256_storeu_si256(out_ptr.add(i * 16) as *mut __m256i, words);
        }
        let rem = size - chunks * 16;
        if rem > 0 {
            let mask: __mmask16 = (1u16 << rem) - 1;
            let v = _mm512_maskz_loadu_ps(mask, in_ptr.add(chunks * 16));
            let q = _mm512_cvtps_epi32(_mm512_mul_ps(v, mult));
            _mm512_mask_cvtsepi32_storeu_epi16(out_ptr.add(chunks * 16), mask, q);
        }
    }
}

#[target_feature(enable = "avx512f,avx512bw")]
unsafe fn multiply_8<W: WriteKernel>(
    a: &[i8],
    b: &[i8],
    write: &mut W,
    a_rows: usize,
    width: usize,
    b_cols: usize,
) {
    let k_blocks = width / 64;
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

#[target_feature(enable = "avx512f,avx512bw")]
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
        let ones = _mm512_set1_epi16(1);
        let zero = _mm512_setzero_si512();
        let mut acc = [[_mm512_setzero_si512(); TILE_COL]; M];
        for kb in 0..k_blocks {
            let mut a_abs = [_mm512_setzero_si512(); M];
            let mut a_neg = [0u64; M];
            for m in 0..M {
                let ptr = a.as_ptr().add((row + m) * width + kb * 64);
                let a_vec = _mm512_load_si512(ptr as *const __m512i);
                a_abs[m] = _mm512_abs_epi8(a_vec);
                a_neg[m] = _mm512_movepi8_mask(a_vec);
            }
            for c in 0..TILE_COL {
                let off = run_offset(ct, kb, c, k_blocks, 64);
                let b_vec = _mm512_load_si512(b.as_ptr().add(off) as *const __m512i);
                for m in 0..M {
                    // b * sign(a); lanes with a == 0 contribute nothing
                    // because the unsigned multiplier |a| is zero there
                    let b_signed = _mm512_mask_sub_epi8(b_vec, a_neg[m], zero, b_vec);
                    let pairs16 = _mm512_maddubs_epi16(a_abs[m], b_signed);
                    let pairs32 = _mm512_madd_epi16(pairs16, ones);
                    acc[m][c] = _mm512_add_epi32(acc[m][c], pairs32);
                }
            }
        }
        for m in 0..M {
            let mut lanes = [0i32; TILE_COL];
            for c in 0..TILE_COL {
                lanes[c] = _mm512_reduce_add_epi32(acc[m][c]);
            }
            write.write(row + m, ct * TILE_COL, &lanes);
        }
    }
}

#[target_feature(enable = "avx512f,avx512bw")]
unsafe fn multiply_shifted_8<W: WriteKernel>(
    a: &[u8],
    b: &[i8],
    write: &mut W,
    a_rows: usize,
    width: usize,
    b_cols: usize,
) {
    let k_blocks = width / 64;
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

#[target_feature(enable = "avx512f,avx512bw")]
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
        let ones = _mm512_set1_epi16(1);
        let mut acc = [[_mm512_setzero_si512(); TILE_COL]; M];
        for kb in 0..k_blocks {
            let mut a_vec = [_mm512_setzero_si512(); M];
            for m in 0..M {
                let ptr = a.as_ptr().add((row + m) * width + kb * 64);
                a_vec[m] = _mm512_load_si512(ptr as *const __m512i);
            }
            for c in 0..TILE_COL {
                let off = run_offset(ct, kb, c, k_blocks, 64);
                let b_vec = _mm512_load_si512(b.as_ptr().add(off) as *const __m512i);
                for m in 0..M {
                    let pairs16 = _mm512_maddubs_epi16(a_vec[m], b_vec);
                    let pairs32 = _mm512_madd_epi16(pairs16, ones);
                    acc[m][c] = _mm512_add_epi32(acc[m][c], pairs32);
                }
            }
        }
        for m in 0..M {
            let mut lanes = [0i32; TILE_COL];
            for c in 0..TILE_COL {
                lanes[c] = _mm512_reduce_add_epi32(acc[m][c]);
            }
            write.write(row + m, ct * TILE_COL, &lanes);
        }
    }
}

#[target_feature(enable = "avx512f,avx512bw,avx512vnni")]
unsafe fn multiply_shifted_vnni<W: WriteKernel>(
    a: &[u8],
    b: &[i8],
    write: &mut W,
    a_rows: usize,
    width: usize,
    b_cols: usize,
) {
    let k_blocks = width / 64;
    let mut row = 0;
    while row + 2 <= a_rows {
        for ct in 0..b_cols / TILE_COL {
            unsafe { tile_shifted_vnni::<2, W>(a, b, write, row, width, k_blocks, ct) };
        }
        row += 2;
    }
    if row < a_rows {
        for ct in 0..b_cols / TILE_COL {
            unsafe { tile_shifted_vnni::<1, W>(a, b, write, row, width, k_blocks, ct) };
        }
    }
}

#[target_feature(enable = "avx512f,avx512bw,avx512vnni")]
unsafe fn tile_shifted_vnni<const M: usize, W: WriteKernel>(
    a: &[u8],
    b: &[i8],
    write: &mut W,
    row: usize,
    width: usize,
    k_blocks: usize,
    ct: usize,
) {
    unsafe {
        let mut acc = [[_mm512_setzero_si512(); TILE_COL]; M];
        for kb in 0..k_blocks {
            let mut a_vec = [_mm512_setzero_si512(); M];
            for m in 0..M {
                let ptr = a.as_ptr().add((row + m) * width + kb * 64);
                a_vec[m] = _mm512_load_si512(ptr as *const __m512i);
            }
            for c in 0..TILE_COL {
                let off = run_offset(ct, kb, c, k_blocks, 64);
                let b_vec = _mm512_load_si512(b.as_ptr().add(off) as *const __m512i);
                for m in 0..M {
                    acc[m][c] = _mm512_dpbusd_epi32(acc[m][c], a_vec[m], b_vec);
                }
            }
        }
        for m in 0..M {
            let mut lanes = [0i32; TILE_COL];
            for c in 0..TILE_COL {
                lanes[c] = _mm512_reduce_add_epi32(acc[m][c]);
            }
            write.write(row + m, ct * TILE_COL, &lanes);
        }
    }
}

#[target_feature(enable = "avx512f,avx512bw")]
unsafe fn multiply_16<W: WriteKernel>(
    a: &[i16],
    b: &[i16],
    write: &mut W,
    a_rows: usize,
    width: usize,
    b_cols: usize,
) {
    let k_blocks = width / 32;
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

#[target_feature(enable = "avx512f,avx512bw")]
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
        let mut acc = [[_mm512_setzero_si512(); TILE_COL]; M];
        for kb in 0..k_blocks {
            let mut a_vec = [_mm512_setzero_si512(); M];
            for m in 0..M {
                let ptr = a.as_ptr().add((row + m) * width + kb * 32);
                a_vec[m] = _mm512_load_si512(ptr as *const __m512i);
            }
            for c in 0..TILE_COL {
                let off = run_offset(ct, kb, c, k_blocks, 32);
                let b_vec = _mm512_load_si512(b.as_ptr().add(off) as *const __m512i);
                for m in 0..M {
                    let pairs32 = _mm512_madd_epi16(a_vec[m], b_vec);
                    acc[m][c] = _mm512_add_epi32(acc[m][c], pairs32);
                }
            }
        }
        for m in 0..M {
            let mut lanes = [0i32; TILE_COL];
            for c in 0..TILE_COL {
                lanes[c] = _mm512_reduce_add_epi32(acc[m][c]);
            }
            write.write(row + m, ct * TILE_COL, &lanes);
        }
    }
}

/// Mean and standard deviation of a float vector, optionally of |x|
pub fn mean_std(input: &[f32], absolute: bool) -> MeanStd {
    debug_assert!(CpuType::Avx512Bw.is_supported());
    unsafe { mean_std_inner(input, absolute) }
}

#[target_feature(enable = "avx512f")]
unsafe fn mean_std_inner(input: &[f32], absolute: bool) -> MeanStd {
    let size = input.len();
    let chunks = size / 16;
    let sum;
    let sum_sq;
    unsafe {
        let mut vsum = _mm512_setzero_ps();
        let mut vsum_sq = _mm512_setzero_ps();
        let ptr = input.as_ptr();
        for i in 0..chunks {
            let v = _mm512_loadu_ps(ptr.add(i * 16));
            let addend = if absolute { _mm512_abs_ps(v) } else { v };
            vsum = _mm512_add_ps(vsum, addend);
            vsum_sq = _mm512_add_ps(vsum_sq, _mm512_mul_ps(v, v));
        }
        let rem = size - chunks * 16;
        if rem > 0 {
            let mask: __mmask16 = (1u16 << rem) - 1;
            let v = _mm512_maskz_loadu_ps(mask, ptr.add(chunks * 16));
            let addend = if absolute { _mm512_abs_ps(v) } else { v };
            vsum = _mm512_add_ps(vsum, addend);
            vsum_sq = _mm512_add_ps(vsum_sq, _mm512_mul_ps(v, v));
        }
        sum = _mm512_reduce_add_ps(vsum);
        sum_sq = _mm512_reduce_add_ps(vsum_sq);
    }
    MeanStd::from_sums(sum, sum_sq, size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aligned::AlignedBuffer;
    use crate::kernels::scalar::{ScalarI8, ScalarI16, multiply_rowmajor_i8};
    use crate::write::{JustUnquantize, Rescale};

    fn have_avx512() -> bool {
        CpuType::Avx512Bw.is_supported()
    }

    #[test]
    fn test_quantize_8_matches_scalar() {
        if !have_avx512() {
            return;
        }
        // 67 leaves a 3-element masked tail
        let input: Vec<f32> = (0..67).map(|i| (i as f32 - 33.0) * 5.1).collect();
        let mut simd = vec![0i8; input.len()];
        let mut reference = vec![0i8; input.len()];
        Avx512I8::quantize(&input, &mut simd, 0.9).unwrap();
        ScalarI8::quantize(&input, &mut reference, 0.9).unwrap();
        assert_eq!(simd, reference);
    }

    #[test]
    fn test_quantize_16_matches_scalar() {
        if !have_avx512() {
            return;
        }
        let input: Vec<f32> = (0..50).map(|i| (i as f32 - 25.0) * 2000.3).collect();
        let mut simd = vec![0i16; input.len()];
        let mut reference = vec![0i16; input.len()];
        Avx512I16::quantize(&input, &mut simd, 1.0).unwrap();
        ScalarI16::quantize(&input, &mut reference, 1.0).unwrap();
        assert_eq!(simd, reference);
    }

    #[test]
    fn test_multiply_8_matches_rowmajor_oracle() {
        if !have_avx512() {
            return;
        }
        let (a_rows, width, b_cols) = (3, 128, 16);
        let a = AlignedBuffer::from_fn(a_rows * width, |i| ((i * 41 + 13) % 251) as i8 as f32 / 8.0)
            .unwrap();
        let b = AlignedBuffer::from_fn(width * b_cols, |i| ((i * 19 + 3) % 247) as i8 as f32 / 8.0)
            .unwrap();

        let mut a_q = AlignedBuffer::<i8>::new(a.len()).unwrap();
        let mut b_packed = AlignedBuffer::<i8>::new(b.len()).unwrap();
        Avx512I8::prepare_a(&a, a_q.as_mut_slice(), 4.0, a_rows, width).unwrap();
        Avx512I8::prepare_b(&b, b_packed.as_mut_slice(), 4.0, width, b_cols).unwrap();

        let mut b_q = vec![0i8; b.len()];
        ScalarI8::quantize(&b, &mut b_q, 4.0).unwrap();
        let mut expect = vec![0i32; a_rows * b_cols];
        multiply_rowmajor_i8(a_q.as_slice(), &b_q, &mut expect, a_rows, width, b_cols);

        let mut simd = vec![0.0f32; a_rows * b_cols];
        let mut wk = JustUnquantize::new(&mut simd, b_cols, 1.0);
        Avx512I8::multiply(a_q.as_slice(), b_packed.as_slice(), &mut wk, a_rows, width, b_cols)
            .unwrap();

        for (s, e) in simd.iter().zip(&expect) {
            assert_eq!(*s, *e as f32);
        }
    }

    #[test]
    fn test_vnni_shifted_matches_scalar_exactly() {
        if !CpuType::Avx512Vnni.is_supported() {
            return;
        }
        // Full-range inputs: vpdpbusd has no 16-bit intermediate, so it
        // must agree with the scalar oracle everywhere
        let (a_rows, width, b_cols) = (4, 64, 8);
        let a = AlignedBuffer::from_fn(a_rows * width, |i| ((i * 57 + 1) % 255) as f32 - 127.0)
            .unwrap();
        let b = AlignedBuffer::from_fn(width * b_cols, |i| ((i * 83 + 9) % 255) as f32 - 127.0)
            .unwrap();

        let mut a_u = AlignedBuffer::<u8>::new(a.len()).unwrap();
        let mut b_packed = AlignedBuffer::<i8>::new(b.len()).unwrap();
        Avx512VnniI8::prepare_a_shifted(&a, a_u.as_mut_slice(), 1.0, a_rows, width).unwrap();
        Avx512VnniI8::prepare_b(&b, b_packed.as_mut_slice(), 1.0, width, b_cols).unwrap();

        let mut simd = vec![0i32; a_rows * b_cols];
        let mut reference = vec![0i32; a_rows * b_cols];
        {
            let mut wk = Rescale::new(&mut simd, b_cols, 1.0);
            Avx512VnniI8::multiply_shifted(a_u.as_slice(), b_packed.as_slice(), &mut wk, a_rows, width, b_cols)
                .unwrap();
        }
        {
            let mut wk = Rescale::new(&mut reference, b_cols, 1.0);
            ScalarI8::multiply_shifted(a_u.as_slice(), b_packed.as_slice(), &mut wk, a_rows, width, b_cols)
                .unwrap();
        }
        assert_eq!(simd, reference);
    }

    #[test]
    fn test_multiply_16_matches_scalar() {
        if !have_avx512() {
            return;
        }
        let (a_rows, width, b_cols) = (5, 64, 8);
        let a = AlignedBuffer::from_fn(a_rows * width, |i| (i as f32 % 100.0) - 50.0).unwrap();
        let b = AlignedBuffer::from_fn(width * b_cols, |i| (i as f32 % 90.0) - 45.0).unwrap();

        let mut a_q = AlignedBuffer::<i16>::new(a.len()).unwrap();
        let mut b_packed = AlignedBuffer::<i16>::new(b.len()).unwrap();
        Avx512I16::prepare_a(&a, a_q.as_mut_slice(), 64.0, a_rows, width).unwrap();
        Avx512I16::prepare_b(&b, b_packed.as_mut_slice(), 64.0, width, b_cols).unwrap();

        let mut b_q = vec![0i16; b.len()];
        ScalarI16::quantize(&b, &mut b_q, 64.0).unwrap();
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
        Avx512I16::multiply(a_q.as_slice(), b_packed.as_slice(), &mut wk, a_rows, width, b_cols)
            .unwrap();

        for (s, e) in simd.iter().zip(&expect) {
            assert_eq!(*s, *e as f32);
        }
    }

    #[test]
    fn test_mean_std_matches_reference() {
        if !have_avx512() {
            return;
        }
        let input: Vec<f32> = (0..2048).map(|i| ((i * 53) % 409) as f32 / 409.0 - 0.5).collect();
        for absolute in [false, true] {
            let fast = mean_std(&input, absolute);
            let reference = crate::stats::mean_std_ref(&input, absolute);
            assert!((fast.mean - reference.mean).abs() <= 2e-5);
            assert!((fast.stddev - reference.stddev).abs() <= 2e-5);
        }
    }
}
