//! Register-blocked storage layout for prepared B matrices
//!
//! A quantized B (`rows x cols`, row-major, `rows` multiple of the kernel's
//! `TILE_ROW`, `cols` multiple of [`TILE_COL`]) is rearranged into tiles so
//! the GEMM inner loop reads one column's next `TILE_ROW` values with a
//! single vector load:
//!
//! - columns are grouped into tiles of [`TILE_COL`] columns,
//! - rows (the shared `k` dimension) are grouped into blocks of `TILE_ROW`
//!   values,
//! - within one (column tile, row block) cell the data is column-major:
//!   eight runs of `TILE_ROW` consecutive-`k` values, one run per column.
//!
//! The layout is identical for every ISA up to its `TILE_ROW`, so packing
//! and column selection are plain index shuffles shared by all kernels.

use crate::error::{IntGemmError, check_len, check_multiple};

/// Output columns produced per microkernel invocation
pub const TILE_COL: usize = 8;

/// Element offset of the run for column-in-tile `c`, row block `kb`,
/// column tile `ct`
#[inline]
pub(crate) fn run_offset(ct: usize, kb: usize, c: usize, k_blocks: usize, tile_row: usize) -> usize {
    ((ct * k_blocks + kb) * TILE_COL + c) * tile_row
}

/// Rearrange a quantized row-major B into the packed tile layout
///
/// `quantized` is `rows * cols` in row-major order; `output` must have the
/// same length.
pub(crate) fn pack_b<T: Copy>(
    quantized: &[T],
    output: &mut [T],
    rows: usize,
    cols: usize,
    tile_row: usize,
) -> Result<(), IntGemmError> {
    check_multiple("B rows", rows, tile_row)?;
    check_multiple("B cols", cols, TILE_COL)?;
    check_len("quantized B length", quantized.len(), rows * cols)?;
    check_len("packed B length", output.len(), rows * cols)?;

    let k_blocks = rows / tile_row;
    for ct in 0..cols / TILE_COL {
        for kb in 0..k_blocks {
            for c in 0..TILE_COL {
                let col = ct * TILE_COL + c;
                let dst = run_offset(ct, kb, c, k_blocks, tile_row);
                for r in 0..tile_row {
                    output[dst + r] = quantized[(kb * tile_row + r) * cols + col];
                }
            }
        }
    }
    Ok(())
}

/// Copy a subset of packed columns into a new packed buffer
///
/// `cols` lists the logical source column of every output column, in output
/// order; its length must be a multiple of [`TILE_COL`] so the output stays
/// whole tiles. Arbitrary (even repeated) source columns are allowed: each
/// column's data is a set of contiguous runs in the packed layout.
pub(crate) fn select_columns<T: Copy>(
    input: &[T],
    output: &mut [T],
    rows: usize,
    input_cols: usize,
    cols: &[usize],
    tile_row: usize,
) -> Result<(), IntGemmError> {
    check_multiple("B rows", rows, tile_row)?;
    check_multiple("B cols", input_cols, TILE_COL)?;
    check_multiple("selected column count", cols.len(), TILE_COL)?;
    check_len("packed B length", input.len(), rows * input_cols)?;
    check_len("selected output length", output.len(), rows * cols.len())?;
    if let Some(&bad) = cols.iter().find(|&&c| c >= input_cols) {
        return Err(IntGemmError::Shape {
            what: "selected column index",
            value: bad,
            expected: 0,
            multiple_of: false,
        });
    }

    let k_blocks = rows / tile_row;
    for (dst_col, &src_col) in cols.iter().enumerate() {
        let (dst_ct, dst_c) = (dst_col / TILE_COL, dst_col % TILE_COL);
        let (src_ct, src_c) = (src_col / TILE_COL, src_col % TILE_COL);
        for kb in 0..k_blocks {
            let src = run_offset(src_ct, kb, src_c, k_blocks, tile_row);
            let dst = run_offset(dst_ct, kb, dst_c, k_blocks, tile_row);
            output[dst..dst + tile_row].copy_from_slice(&input[src..src + tile_row]);
        }
    }
    Ok(())
}
