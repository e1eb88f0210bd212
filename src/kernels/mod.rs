//! Per-ISA GEMM kernel families
//!
//! Each instruction set gets a zero-sized tag struct implementing
//! [`GemmKernel`]; generic code takes the tag as a type parameter so the
//! whole pipeline monomorphizes down to one inlined loop per ISA. The
//! runtime dispatcher in [`crate::dispatch`] picks a tag by CPU probe;
//! callers that know their target can name a tag directly.

use std::fmt;

use crate::aligned::AlignedBuffer;
use crate::cpu::CpuType;
use crate::error::{IntGemmError, check_len, check_multiple};
use crate::pack;
use crate::write::WriteKernel;

pub mod scalar;
#[cfg(target_arch = "x86_64")]
pub mod sse2;
#[cfg(target_arch = "x86_64")]
pub mod ssse3;
#[cfg(target_arch = "x86_64")]
pub mod avx2;
#[cfg(target_arch = "x86_64")]
pub mod avx512;

/// Documented safe ceiling on the shared dimension
///
/// Int32 accumulators are exact for |q| <= 127 up to width 2^16; half that
/// leaves headroom for the 16-bit intermediate of `pmaddubsw`.
pub const MAX_WIDTH: usize = 1 << 15;

/// Quantized element types accepted by the kernels
pub trait GemmInt: Copy + Default + PartialEq + fmt::Debug + 'static {}
impl GemmInt for i8 {}
impl GemmInt for i16 {}

/// One ISA's quantize / prepare / multiply operation set
///
/// `TILE_ROW` is the number of quantized values one vector load covers (the
/// B row-block size); `TILE_COL` is the number of output columns one
/// microkernel invocation produces. B preparation requires
/// `rows % TILE_ROW == 0` and `cols % TILE_COL == 0`.
pub trait GemmKernel {
    type Integer: GemmInt;

    const TILE_ROW: usize;
    const TILE_COL: usize = pack::TILE_COL;
    const NAME: &'static str;
    /// CPU tag this kernel needs at runtime; `None` for the portable scalars
    const USES: Option<CpuType>;

    /// Saturating round-to-nearest-even quantization of `input.len()` floats
    ///
    /// Inputs with `|x * quant_mult| >= 2^31` are outside the contract: the
    /// vector float-to-int conversion reports them as `i32::MIN` regardless
    /// of sign. Every representable target value is far below that.
    fn quantize(
        input: &[f32],
        output: &mut [Self::Integer],
        quant_mult: f32,
    ) -> Result<(), IntGemmError>;

    /// Row-major elementwise quantization of A
    fn prepare_a(
        input: &[f32],
        output: &mut [Self::Integer],
        quant_mult: f32,
        rows: usize,
        cols: usize,
    ) -> Result<(), IntGemmError> {
        check_len("A input length", input.len(), rows * cols)?;
        Self::quantize(input, output, quant_mult)
    }

    /// Quantize B and permute it into the packed tile layout
    fn prepare_b(
        input: &[f32],
        output: &mut [Self::Integer],
        quant_mult: f32,
        rows: usize,
        cols: usize,
    ) -> Result<(), IntGemmError> {
        check_multiple("B rows", rows, Self::TILE_ROW)?;
        check_multiple("B cols", cols, Self::TILE_COL)?;
        check_len("B input length", input.len(), rows * cols)?;
        let mut quantized = AlignedBuffer::<Self::Integer>::new(rows * cols)?;
        Self::quantize(input, quantized.as_mut_slice(), quant_mult)?;
        pack::pack_b(quantized.as_slice(), output, rows, cols, Self::TILE_ROW)
    }

    /// Copy a subset of packed B columns into a new packed buffer
    ///
    /// `cols` lists the source column of each output column; its length must
    /// be a multiple of `TILE_COL`.
    fn select_columns_b(
        input: &[Self::Integer],
        output: &mut [Self::Integer],
        rows: usize,
        cols: &[usize],
    ) -> Result<(), IntGemmError> {
        check_multiple("B rows", rows, Self::TILE_ROW)?;
        check_multiple("packed B length", input.len(), rows)?;
        let input_cols = input.len() / rows;
        pack::select_columns(input, output, rows, input_cols, cols, Self::TILE_ROW)
    }

    /// C = A x B over the packed layout, streaming int32 accumulator tiles
    /// into `write`
    ///
    /// `a` is row-major quantized A (`a_rows x width`), `b` is packed
    /// (`width x b_cols`). Requires `width % TILE_ROW == 0` and
    /// `b_cols % TILE_COL == 0`; accumulation is integer-exact for
    /// `width <=` [`MAX_WIDTH`] (debug-asserted).
    fn multiply<W: WriteKernel>(
        a: &[Self::Integer],
        b: &[Self::Integer],
        write: &mut W,
        a_rows: usize,
        width: usize,
        b_cols: usize,
    ) -> Result<(), IntGemmError>;
}

/// Extra operations of the 8-bit kernels: the unsigned-A ("shifted") path
///
/// AVX-512VNNI's `vpdpbusd` needs its first operand unsigned, so A is
/// quantized then shifted by +128 into u8. The constant `128 * column_sum(B)`
/// this adds to every output is removed up front by
/// [`crate::bias::prepare_bias_for_8`].
pub trait GemmKernel8: GemmKernel<Integer = i8> {
    /// Quantize A and reinterpret as unsigned: `u = q + 128`
    fn prepare_a_shifted(
        input: &[f32],
        output: &mut [u8],
        quant_mult: f32,
        rows: usize,
        cols: usize,
    ) -> Result<(), IntGemmError> {
        check_len("A input length", input.len(), rows * cols)?;
        check_len("A output length", output.len(), rows * cols)?;
        let mut quantized = AlignedBuffer::<i8>::new(rows * cols)?;
        Self::quantize(input, quantized.as_mut_slice(), quant_mult)?;
        for (dst, &q) in output.iter_mut().zip(quantized.as_slice()) {
            *dst = (q as i16 + 128) as u8;
        }
        Ok(())
    }

    /// C = A x B with A in the shifted (u8) representation
    ///
    /// Exact on VNNI. On `pmaddubsw` ISAs the 16-bit pair sums can saturate
    /// when adjacent `u * q` products both approach 255 * 127; inputs
    /// quantized from real activations stay far below that.
    fn multiply_shifted<W: WriteKernel>(
        a: &[u8],
        b: &[i8],
        write: &mut W,
        a_rows: usize,
        width: usize,
        b_cols: usize,
    ) -> Result<(), IntGemmError>;
}

/// Shared shape validation for the multiply entry points
pub(crate) fn check_multiply_shapes(
    a_len: usize,
    b_len: usize,
    a_rows: usize,
    width: usize,
    b_cols: usize,
    tile_row: usize,
) -> Result<(), IntGemmError> {
    check_multiple("width", width, tile_row)?;
    check_multiple("B cols", b_cols, pack::TILE_COL)?;
    check_len("A length", a_len, a_rows * width)?;
    check_len("packed B length", b_len, width * b_cols)?;
    debug_assert!(width <= MAX_WIDTH, "width {} exceeds the exact-accumulation bound", width);
    Ok(())
}
