//! Preparation pipeline tests: packing, column selection, bias folding
//!
//! The load-bearing property is layout idempotence: selecting every column
//! of a packed B must reproduce the packed buffer bit-for-bit, for every
//! kernel's tile geometry.

use intgemm::kernels::scalar::{ScalarI8, ScalarI16};
use intgemm::write::Rescale;
use intgemm::{AlignedBuffer, GemmKernel, IntGemmError};

#[cfg(target_arch = "x86_64")]
use intgemm::kernels::{
    avx2::{Avx2I8, Avx2I16},
    avx512::{Avx512I8, Avx512I16},
    sse2::Sse2I16,
    ssse3::Ssse3I8,
};

fn supported<K: GemmKernel>() -> bool {
    match K::USES {
        Some(tag) => tag.is_supported(),
        None => true,
    }
}

fn pseudo_floats(n: usize, seed: u64) -> Vec<f32> {
    let mut state = seed | 1;
    (0..n)
        .map(|_| {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            ((state >> 40) as f32 / (1u32 << 24) as f32) * 4.0 - 2.0
        })
        .collect()
}

fn check_select_all_is_identity<K: GemmKernel>() {
    if !supported::<K>() {
        return;
    }
    let rows = K::TILE_ROW * 3;
    let cols = 32;
    let b_f = AlignedBuffer::from_slice(&pseudo_floats(rows * cols, 41)).unwrap();

    let mut packed = AlignedBuffer::<K::Integer>::new(rows * cols).unwrap();
    K::prepare_b(&b_f, packed.as_mut_slice(), 50.0, rows, cols).unwrap();

    let all: Vec<usize> = (0..cols).collect();
    let mut selected = AlignedBuffer::<K::Integer>::new(rows * cols).unwrap();
    K::select_columns_b(packed.as_slice(), selected.as_mut_slice(), rows, &all).unwrap();

    assert_eq!(packed.as_slice(), selected.as_slice(), "{}", K::NAME);
}

#[test]
fn select_all_columns_is_identity() {
    check_select_all_is_identity::<ScalarI8>();
    check_select_all_is_identity::<ScalarI16>();
    #[cfg(target_arch = "x86_64")]
    {
        check_select_all_is_identity::<Ssse3I8>();
        check_select_all_is_identity::<Sse2I16>();
        check_select_all_is_identity::<Avx2I8>();
        check_select_all_is_identity::<Avx2I16>();
        check_select_all_is_identity::<Avx512I8>();
        check_select_all_is_identity::<Avx512I16>();
    }
}

#[test]
fn selected_columns_multiply_like_the_originals() {
    // Multiply against a selected subset == the matching columns of a
    // multiply against the full B
    let (a_rows, width, b_cols) = (3, 32, 32);
    let a_f = AlignedBuffer::from_slice(&pseudo_floats(a_rows * width, 43)).unwrap();
    let b_f = AlignedBuffer::from_slice(&pseudo_floats(width * b_cols, 47)).unwrap();

    let mut a_q = AlignedBuffer::<i8>::new(a_rows * width).unwrap();
    let mut b_packed = AlignedBuffer::<i8>::new(width * b_cols).unwrap();
    ScalarI8::prepare_a(&a_f, a_q.as_mut_slice(), 40.0, a_rows, width).unwrap();
    ScalarI8::prepare_b(&b_f, b_packed.as_mut_slice(), 40.0, width, b_cols).unwrap();

    // Two tiles: columns 16..24 and 0..8, deliberately out of order
    let picked: Vec<usize> = (16..24).chain(0..8).collect();
    let mut b_sel = AlignedBuffer::<i8>::new(width * picked.len()).unwrap();
    ScalarI8::select_columns_b(b_packed.as_slice(), b_sel.as_mut_slice(), width, &picked).unwrap();

    let mut full = vec![0i32; a_rows * b_cols];
    let mut writer = Rescale::new(&mut full, b_cols, 1.0);
    ScalarI8::multiply(a_q.as_slice(), b_packed.as_slice(), &mut writer, a_rows, width, b_cols)
        .unwrap();

    let sel_cols = picked.len();
    let mut subset = vec![0i32; a_rows * sel_cols];
    let mut writer = Rescale::new(&mut subset, sel_cols, 1.0);
    ScalarI8::multiply(a_q.as_slice(), b_sel.as_slice(), &mut writer, a_rows, width, sel_cols)
        .unwrap();

    for r in 0..a_rows {
        for (j, &src) in picked.iter().enumerate() {
            assert_eq!(subset[r * sel_cols + j], full[r * b_cols + src]);
        }
    }
}

#[test]
fn prepare_a_is_elementwise_quantize() {
    let (rows, cols) = (5, 48);
    let a_f = pseudo_floats(rows * cols, 53);

    let mut via_prepare = vec![0i8; rows * cols];
    let mut via_quantize = vec![0i8; rows * cols];
    ScalarI8::prepare_a(&a_f, &mut via_prepare, 31.0, rows, cols).unwrap();
    ScalarI8::quantize(&a_f, &mut via_quantize, 31.0).unwrap();
    assert_eq!(via_prepare, via_quantize);
}

#[test]
fn prepare_a_shifted_adds_128() {
    use intgemm::GemmKernel8;

    let input = [-2.0f32, -1.0, 0.0, 1.0, 2.0, 0.5, -0.5, 1.5];
    let mut signed = [0i8; 8];
    let mut shifted = [0u8; 8];
    ScalarI8::quantize(&input, &mut signed, 10.0).unwrap();
    ScalarI8::prepare_a_shifted(&input, &mut shifted, 10.0, 1, 8).unwrap();
    for (s, u) in signed.iter().zip(&shifted) {
        assert_eq!(*u as i16, *s as i16 + 128);
    }
}

#[test]
fn prepare_b_rejects_bad_shapes() {
    let b_f = vec![0.0f32; 20 * 8];
    let mut out = vec![0i8; 20 * 8];
    // 20 rows is not a multiple of ScalarI8's 16-row tile
    match ScalarI8::prepare_b(&b_f, &mut out, 1.0, 20, 8) {
        Err(IntGemmError::Shape { .. }) => {}
        other => panic!("expected Shape error, got {:?}", other),
    }

    let b_f = vec![0.0f32; 16 * 6];
    let mut out = vec![0i8; 16 * 6];
    // 6 cols is not a multiple of the 8-column tile
    assert!(ScalarI8::prepare_b(&b_f, &mut out, 1.0, 16, 6).is_err());
}

#[test]
fn select_rejects_ragged_counts() {
    let rows = 16;
    let b_f = vec![0.25f32; rows * 16];
    let mut packed = vec![0i8; rows * 16];
    ScalarI8::prepare_b(&b_f, &mut packed, 1.0, rows, 16).unwrap();

    let mut out = vec![0i8; rows * 4];
    let picked = [0usize, 1, 2, 3];
    assert!(ScalarI8::select_columns_b(&packed, &mut out, rows, &picked).is_err());
}

#[test]
fn allocation_is_aligned_and_padded() {
    let buf = AlignedBuffer::<i8>::new(17).unwrap();
    assert_eq!(buf.as_slice().as_ptr() as usize % 64, 0);
    assert_eq!(buf.capacity(), 64);
    assert_eq!(buf.len(), 17);
}

#[test]
fn error_messages_name_the_dimension() {
    let err = ScalarI8::prepare_b(&[0.0; 8], &mut [0i8; 8], 1.0, 1, 8).unwrap_err();
    let text = err.to_string();
    assert!(text.contains("B rows"), "unexpected message: {text}");
}
