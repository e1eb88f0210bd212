//! Post-processing kernels consumed by the GEMM driver
//!
//! The driver hands a write kernel one tile row of int32 accumulators at a
//! time, together with the logical (row, column) of the first lane. Write
//! kernels are threaded through `multiply` as a generic parameter so the
//! compiler inlines them into the inner loop; trait objects would put a
//! call through a vtable on every output tile.

use crate::pack::TILE_COL;

/// Receives finished accumulator lanes from the GEMM driver
///
/// `acc` holds [`TILE_COL`] per-column sums for output row `row`, starting
/// at output column `col`.
pub trait WriteKernel {
    fn write(&mut self, row: usize, col: usize, acc: &[i32]);
}

/// `out[r, c] = acc * unquant_mult`
pub struct JustUnquantize<'a> {
    out: &'a mut [f32],
    cols: usize,
    unquant_mult: f32,
}

impl<'a> JustUnquantize<'a> {
    pub fn new(out: &'a mut [f32], cols: usize, unquant_mult: f32) -> Self {
        Self { out, cols, unquant_mult }
    }
}

impl WriteKernel for JustUnquantize<'_> {
    #[inline]
    fn write(&mut self, row: usize, col: usize, acc: &[i32]) {
        debug_assert_eq!(acc.len(), TILE_COL);
        let base = row * self.cols + col;
        for (j, &a) in acc.iter().enumerate() {
            self.out[base + j] = a as f32 * self.unquant_mult;
        }
    }
}

/// `out[r, c] = acc * unquant_mult + bias[c]`
pub struct BiasAddUnquantize<'a> {
    out: &'a mut [f32],
    bias: &'a [f32],
    cols: usize,
    unquant_mult: f32,
}

impl<'a> BiasAddUnquantize<'a> {
    pub fn new(out: &'a mut [f32], bias: &'a [f32], cols: usize, unquant_mult: f32) -> Self {
        debug_assert_eq!(bias.len(), cols);
        Self { out, bias, cols, unquant_mult }
    }
}

impl WriteKernel for BiasAddUnquantize<'_> {
    #[inline]
    fn write(&mut self, row: usize, col: usize, acc: &[i32]) {
        debug_assert_eq!(acc.len(), TILE_COL);
        let base = row * self.cols + col;
        for (j, &a) in acc.iter().enumerate() {
            self.out[base + j] = a as f32 * self.unquant_mult + self.bias[col + j];
        }
    }
}

/// Integer rescale: `out[r, c] = round(acc * scale)`
///
/// Rounds half-to-even, matching the quantizers. Used by prepare chains
/// that feed one integer GEMM's output into another.
pub struct Rescale<'a> {
    out: &'a mut [i32],
    cols: usize,
    scale: f32,
}

impl<'a> Rescale<'a> {
    pub fn new(out: &'a mut [i32], cols: usize, scale: f32) -> Self {
        Self { out, cols, scale }
    }
}

impl WriteKernel for Rescale<'_> {
    #[inline]
    fn write(&mut self, row: usize, col: usize, acc: &[i32]) {
        debug_assert_eq!(acc.len(), TILE_COL);
        let base = row * self.cols + col;
        for (j, &a) in acc.iter().enumerate() {
            self.out[base + j] = (a as f32 * self.scale).round_ties_even() as i32;
        }
    }
}

/// Elementwise nonlinearity applied after unquantization
pub trait Activation {
    fn apply(x: f32) -> f32;
}

/// Pass-through
pub struct Identity;

impl Activation for Identity {
    #[inline]
    fn apply(x: f32) -> f32 {
        x
    }
}

/// `max(x, 0)`
pub struct Relu;

impl Activation for Relu {
    #[inline]
    fn apply(x: f32) -> f32 {
        x.max(0.0)
    }
}

/// e^x via range reduction and a degree-5 polynomial
///
/// x is split as `x = n*ln2 + r`, |r| <= ln2/2; e^r is a minimax degree-5
/// polynomial and 2^n is assembled directly in the exponent bits. Relative
/// error stays below 3e-7 over the representable range; the input is
/// clamped to [-87.34, 88.38] so the exponent field never wraps.
pub struct Exp;

#[inline]
fn exp_f32(x: f32) -> f32 {
    const LOG2E: f32 = std::f32::consts::LOG2_E;
    const LN2_HI: f32 = 0.693_359_375;
    const LN2_LO: f32 = -2.121_944_4e-4;

    let x = x.clamp(-87.336_544, 88.376_26);
    let n = (x * LOG2E).round_ties_even();
    let r = (x - n * LN2_HI) - n * LN2_LO;

    // e^r, |r| <= 0.3466
    let mut p = 1.987_569_1e-4_f32;
    p = p * r + 1.398_199_9e-3;
    p = p * r + 8.333_452_e-3;
    p = p * r + 4.166_579_5e-2;
    p = p * r + 1.666_666_6e-1;
    p = p * r + 5e-1;
    p = p * r + 1.0;
    p = p * r + 1.0;

    // 2^n through the exponent field
    let bits = (((n as i32) + 127) as u32) << 23;
    p * f32::from_bits(bits)
}

impl Activation for Exp {
    #[inline]
    fn apply(x: f32) -> f32 {
        exp_f32(x)
    }
}

/// `1 / (1 + e^-x)`, built on the [`Exp`] approximation
pub struct Sigmoid;

impl Activation for Sigmoid {
    #[inline]
    fn apply(x: f32) -> f32 {
        // Both branches keep the exp argument non-positive
        if x >= 0.0 {
            1.0 / (1.0 + exp_f32(-x))
        } else {
            let e = exp_f32(x);
            e / (1.0 + e)
        }
    }
}

/// `tanh(x) = (e^2x - 1) / (e^2x + 1)`, built on the [`Exp`] approximation
pub struct Tanh;

impl Activation for Tanh {
    #[inline]
    fn apply(x: f32) -> f32 {
        // tanh(-x) = -tanh(x); exp argument stays non-positive
        let e = exp_f32(-2.0 * x.abs());
        let t = (1.0 - e) / (1.0 + e);
        if x < 0.0 { -t } else { t }
    }
}

/// `out[r, c] = A(acc * unquant_mult + bias[c])` for an [`Activation`] `A`
///
/// The bias is optional; composition with [`BiasAddUnquantize`] semantics is
/// by construction rather than by chaining kernels.
pub struct UnquantizeActivate<'a, A: Activation> {
    out: &'a mut [f32],
    bias: Option<&'a [f32]>,
    cols: usize,
    unquant_mult: f32,
    _activation: std::marker::PhantomData<A>,
}

impl<'a, A: Activation> UnquantizeActivate<'a, A> {
    pub fn new(
        out: &'a mut [f32],
        bias: Option<&'a [f32]>,
        cols: usize,
        unquant_mult: f32,
    ) -> Self {
        if let Some(b) = bias {
            debug_assert_eq!(b.len(), cols);
        }
        Self {
            out,
            bias,
            cols,
            unquant_mult,
            _activation: std::marker::PhantomData,
        }
    }
}

impl<A: Activation> WriteKernel for UnquantizeActivate<'_, A> {
    #[inline]
    fn write(&mut self, row: usize, col: usize, acc: &[i32]) {
        debug_assert_eq!(acc.len(), TILE_COL);
        let base = row * self.cols + col;
        for (j, &a) in acc.iter().enumerate() {
            let mut x = a as f32 * self.unquant_mult;
            if let Some(bias) = self.bias {
                x += bias[col + j];
            }
            self.out[base + j] = A::apply(x);
        }
    }
}
