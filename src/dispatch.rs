//! Runtime kernel selection
//!
//! One entry point per logical operation; each resolves the process-wide
//! CPU tag and forwards to the strongest kernel it supports. The packed
//! layout of a prepared B depends on the selected kernel's `TILE_ROW`, and
//! the tag never changes within a process, so buffers prepared through
//! these functions are always consumed by the kernel that produced them.
//!
//! The 16-bit path needs SSE2 (always present on x86-64); the 8-bit path
//! needs SSSE3 for `pmaddubsw`. Anything below that, including non-x86
//! targets, gets [`IntGemmError::UnsupportedCpu`] rather than a silent
//! scalar fallback; the portable kernels stay available under
//! [`crate::kernels::scalar`] for callers that want them explicitly.

use crate::cpu::{self, CpuType};
use crate::error::IntGemmError;
use crate::write::WriteKernel;

fn tag_at_least(required: CpuType) -> Result<CpuType, IntGemmError> {
    match cpu::kcpu() {
        Some(tag) if tag >= required => Ok(tag),
        detected => Err(IntGemmError::UnsupportedCpu { required, detected }),
    }
}

/// Row block size of the packed B layout the dispatcher will use for int8
pub fn tile_row_i8() -> Result<usize, IntGemmError> {
    let tag = tag_at_least(CpuType::Ssse3)?;
    Ok(match tag {
        CpuType::Avx512Bw | CpuType::Avx512Vnni => 64,
        CpuType::Avx2 => 32,
        _ => 16,
    })
}

/// Row block size of the packed B layout the dispatcher will use for int16
pub fn tile_row_i16() -> Result<usize, IntGemmError> {
    let tag = tag_at_least(CpuType::Sse2)?;
    Ok(match tag {
        CpuType::Avx512Bw | CpuType::Avx512Vnni => 32,
        CpuType::Avx2 => 16,
        _ => 8,
    })
}

#[cfg(target_arch = "x86_64")]
mod imp {
    use super::*;
    use crate::kernels::GemmKernel;
    use crate::kernels::GemmKernel8;
    use crate::kernels::avx2::{Avx2I8, Avx2I16};
    use crate::kernels::avx512::{Avx512I8, Avx512I16, Avx512VnniI8};
    use crate::kernels::sse2::Sse2I16;
    use crate::kernels::ssse3::Ssse3I8;

    pub fn quantize_i8(
        input: &[f32],
        output: &mut [i8],
        quant_mult: f32,
    ) -> Result<(), IntGemmError> {
        match tag_at_least(CpuType::Ssse3)? {
            CpuType::Avx512Bw | CpuType::Avx512Vnni => Avx512I8::quantize(input, output, quant_mult),
            CpuType::Avx2 => Avx2I8::quantize(input, output, quant_mult),
            _ => Ssse3I8::quantize(input, output, quant_mult),
        }
    }

    pub fn quantize_i16(
        input: &[f32],
        output: &mut [i16],
        quant_mult: f32,
    ) -> Result<(), IntGemmError> {
        match tag_at_least(CpuType::Sse2)? {
            CpuType::Avx512Bw | CpuType::Avx512Vnni => Avx512I16::quantize(input, output, quant_mult),
            CpuType::Avx2 => Avx2I16::quantize(input, output, quant_mult),
            _ => Sse2I16::quantize(input, output, quant_mult),
        }
    }

    pub fn prepare_a_i8(
        input: &[f32],
        output: &mut [i8],
        quant_mult: f32,
        rows: usize,
        cols: usize,
    ) -> Result<(), IntGemmError> {
        match tag_at_least(CpuType::Ssse3)? {
            CpuType::Avx512Bw | CpuType::Avx512Vnni => {
                Avx512I8::prepare_a(input, output, quant_mult, rows, cols)
            }
            CpuType::Avx2 => Avx2I8::prepare_a(input, output, quant_mult, rows, cols),
            _ => Ssse3I8::prepare_a(input, output, quant_mult, rows, cols),
        }
    }

    pub fn prepare_a_i16(
        input: &[f32],
        output: &mut [i16],
        quant_mult: f32,
        rows: usize,
        cols: usize,
    ) -> Result<(), IntGemmError> {
        match tag_at_least(CpuType::Sse2)? {
            CpuType::Avx512Bw | CpuType::Avx512Vnni => {
                Avx512I16::prepare_a(input, output, quant_mult, rows, cols)
            }
            CpuType::Avx2 => Avx2I16::prepare_a(input, output, quant_mult, rows, cols),
            _ => Sse2I16::prepare_a(input, output, quant_mult, rows, cols),
        }
    }

    pub fn prepare_a_shifted_i8(
        input: &[f32],
        output: &mut [u8],
        quant_mult: f32,
        rows: usize,
        cols: usize,
    ) -> Result<(), IntGemmError> {
        match tag_at_least(CpuType::Ssse3)? {
            CpuType::Avx512Vnni => {
                Avx512VnniI8::prepare_a_shifted(input, output, quant_mult, rows, cols)
            }
            CpuType::Avx512Bw => Avx512I8::prepare_a_shifted(input, output, quant_mult, rows, cols),
            CpuType::Avx2 => Avx2I8::prepare_a_shifted(input, output, quant_mult, rows, cols),
            _ => Ssse3I8::prepare_a_shifted(input, output, quant_mult, rows, cols),
        }
    }

    pub fn prepare_b_i8(
        input: &[f32],
        output: &mut [i8],
        quant_mult: f32,
        rows: usize,
        cols: usize,
    ) -> Result<(), IntGemmError> {
        match tag_at_least(CpuType::Ssse3)? {
            CpuType::Avx512Bw | CpuType::Avx512Vnni => {
                Avx512I8::prepare_b(input, output, quant_mult, rows, cols)
            }
            CpuType::Avx2 => Avx2I8::prepare_b(input, output, quant_mult, rows, cols),
            _ => Ssse3I8::prepare_b(input, output, quant_mult, rows, cols),
        }
    }

    pub fn prepare_b_i16(
        input: &[f32],
        output: &mut [i16],
        quant_mult: f32,
        rows: usize,
        cols: usize,
    ) -> Result<(), IntGemmError> {
        match tag_at_least(CpuType::Sse2)? {
            CpuType::Avx512Bw | CpuType::Avx512Vnni => {
                Avx512I16::prepare_b(input, output, quant_mult, rows, cols)
            }
            CpuType::Avx2 => Avx2I16::prepare_b(input, output, quant_mult, rows, cols),
            _ => Sse2I16::prepare_b(input, output, quant_mult, rows, cols),
        }
    }

    pub fn select_columns_b_i8(
        input: &[i8],
        output: &mut [i8],
        rows: usize,
        cols: &[usize],
    ) -> Result<(), IntGemmError> {
        match tag_at_least(CpuType::Ssse3)? {
            CpuType::Avx512Bw | CpuType::Avx512Vnni => {
                Avx512I8::select_columns_b(input, output, rows, cols)
            }
            CpuType::Avx2 => Avx2I8::select_columns_b(input, output, rows, cols),
            _ => Ssse3I8::select_columns_b(input, output, rows, cols),
        }
    }

    pub fn select_columns_b_i16(
        input: &[i16],
        output: &mut [i16],
        rows: usize,
        cols: &[usize],
    ) -> Result<(), IntGemmError> {
        match tag_at_least(CpuType::Sse2)? {
            CpuType::Avx512Bw | CpuType::Avx512Vnni => {
                Avx512I16::select_columns_b(input, output, rows, cols)
            }
            CpuType::Avx2 => Avx2I16::select_columns_b(input, output, rows, cols),
            _ => Sse2I16::select_columns_b(input, output, rows, cols),
        }
    }

    pub fn multiply_i8<W: WriteKernel>(
        a: &[i8],
        b: &[i8],
        write: &mut W,
        a_rows: usize,
        width: usize,
        b_cols: usize,
    ) -> Result<(), IntGemmError> {
        match tag_at_least(CpuType::Ssse3)? {
            CpuType::Avx512Bw | CpuType::Avx512Vnni => {
                Avx512I8::multiply(a, b, write, a_rows, width, b_cols)
            }
            CpuType::Avx2 => Avx2I8::multiply(a, b, write, a_rows, width, b_cols),
            _ => Ssse3I8::multiply(a, b, write, a_rows, width, b_cols),
        }
    }

    pub fn multiply_i16<W: WriteKernel>(
        a: &[i16],
        b: &[i16],
        write: &mut W,
        a_rows: usize,
        width: usize,
        b_cols: usize,
    ) -> Result<(), IntGemmError> {
        match tag_at_least(CpuType::Sse2)? {
            CpuType::Avx512Bw | CpuType::Avx512Vnni => {
                Avx512I16::multiply(a, b, write, a_rows, width, b_cols)
            }
            CpuType::Avx2 => Avx2I16::multiply(a, b, write, a_rows, width, b_cols),
            _ => Sse2I16::multiply(a, b, write, a_rows, width, b_cols),
        }
    }

    pub fn multiply_shifted_i8<W: WriteKernel>(
        a: &[u8],
        b: &[i8],
        write: &mut W,
        a_rows: usize,
        width: usize,
        b_cols: usize,
    ) -> Result<(), IntGemmError> {
        match tag_at_least(CpuType::Ssse3)? {
            CpuType::Avx512Vnni => Avx512VnniI8::multiply_shifted(a, b, write, a_rows, width, b_cols),
            CpuType::Avx512Bw => Avx512I8::multiply_shifted(a, b, write, a_rows, width, b_cols),
            CpuType::Avx2 => Avx2I8::multiply_shifted(a, b, write, a_rows, width, b_cols),
            _ => Ssse3I8::multiply_shifted(a, b, write, a_rows, width, b_cols),
        }
    }
}

// Off x86-64 every entry point reports the missing baseline.
#[cfg(not(target_arch = "x86_64"))]
mod imp {
    use super::*;

    fn unsupported<T>(required: CpuType) -> Result<T, IntGemmError> {
        Err(IntGemmError::UnsupportedCpu { required, detected: None })
    }

    pub fn quantize_i8(_: &[f32], _: &mut [i8], _: f32) -> Result<(), IntGemmError> {
        unsupported(CpuType::Ssse3)
    }

    pub fn quantize_i16(_: &[f32], _: &mut [i16], _: f32) -> Result<(), IntGemmError> {
        unsupported(CpuType::Sse2)
    }

    pub fn prepare_a_i8(_: &[f32], _: &mut [i8], _: f32, _: usize, _: usize) -> Result<(), IntGemmError> {
        unsupported(CpuType::Ssse3)
    }

    pub fn prepare_a_i16(_: &[f32], _: &mut [i16], _: f32, _: usize, _: usize) -> Result<(), IntGemmError> {
        unsupported(CpuType::Sse2)
    }

    pub fn prepare_a_shifted_i8(_: &[f32], _: &mut [u8], _: f32, _: usize, _: usize) -> Result<(), IntGemmError> {
        unsupported(CpuType::Ssse3)
    }

    pub fn prepare_b_i8(_: &[f32], _: &mut [i8], _: f32, _: usize, _: usize) -> Result<(), IntGemmError> {
        unsupported(CpuType::Ssse3)
    }

    pub fn prepare_b_i16(_: &[f32], _: &mut [i16], _: f32, _: usize, _: usize) -> Result<(), IntGemmError> {
        unsupported(CpuType::Sse2)
    }

    pub fn select_columns_b_i8(_: &[i8], _: &mut [i8], _: usize, _: &[usize]) -> Result<(), IntGemmError> {
        unsupported(CpuType::Ssse3)
    }

    pub fn select_columns_b_i16(_: &[i16], _: &mut [i16], _: usize, _: &[usize]) -> Result<(), IntGemmError> {
        unsupported(CpuType::Sse2)
    }

    pub fn multiply_i8<W: WriteKernel>(
        _: &[i8],
        _: &[i8],
        _: &mut W,
        _: usize,
        _: usize,
        _: usize,
    ) -> Result<(), IntGemmError> {
        unsupported(CpuType::Ssse3)
    }

    pub fn multiply_i16<W: WriteKernel>(
        _: &[i16],
        _: &[i16],
        _: &mut W,
        _: usize,
        _: usize,
        _: usize,
    ) -> Result<(), IntGemmError> {
        unsupported(CpuType::Sse2)
    }

    pub fn multiply_shifted_i8<W: WriteKernel>(
        _: &[u8],
        _: &[i8],
        _: &mut W,
        _: usize,
        _: usize,
        _: usize,
    ) -> Result<(), IntGemmError> {
        unsupported(CpuType::Ssse3)
    }
}

pub use imp::{
    multiply_i8, multiply_i16, multiply_shifted_i8, prepare_a_i8, prepare_a_i16,
    prepare_a_shifted_i8, prepare_b_i8, prepare_b_i16, quantize_i8, quantize_i16,
    select_columns_b_i8, select_columns_b_i16,
};
