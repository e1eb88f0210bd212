use std::fmt;

use crate::cpu::CpuType;

/// Errors surfaced at the library entry points
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntGemmError {
    /// The CPU does not provide the instruction set a kernel requires
    UnsupportedCpu {
        required: CpuType,
        detected: Option<CpuType>,
    },
    /// A dimensional precondition was violated
    Shape {
        what: &'static str,
        value: usize,
        /// Required divisor when `multiple_of`, exact size otherwise;
        /// zero means `value` itself is out of range
        expected: usize,
        multiple_of: bool,
    },
    /// Aligned buffer allocation failed
    Allocation {
        bytes: usize,
    },
}

impl fmt::Display for IntGemmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntGemmError::UnsupportedCpu { required, detected } => match detected {
                Some(tag) => write!(f, "kernel requires {} but CPU provides {}", required, tag),
                None => write!(f, "kernel requires {} but no x86-64 SIMD support was detected", required),
            },
            IntGemmError::Shape { what, value, expected, multiple_of } => {
                if *expected == 0 {
                    write!(f, "{} ({}) is out of range", what, value)
                } else if *multiple_of {
                    write!(f, "{} ({}) must be a multiple of {}", what, value, expected)
                } else {
                    write!(f, "{} is {}, expected {}", what, value, expected)
                }
            }
            IntGemmError::Allocation { bytes } => {
                write!(f, "failed to allocate {} bytes of 64-byte aligned memory", bytes)
            }
        }
    }
}

impl std::error::Error for IntGemmError {}

/// Check that `value` is a nonzero multiple of `multiple`
pub(crate) fn check_multiple(
    what: &'static str,
    value: usize,
    multiple: usize,
) -> Result<(), IntGemmError> {
    if value == 0 || value % multiple != 0 {
        return Err(IntGemmError::Shape {
            what,
            value,
            expected: multiple,
            multiple_of: true,
        });
    }
    Ok(())
}

/// Check that a slice length matches exactly what an operation expects
pub(crate) fn check_len(
    what: &'static str,
    len: usize,
    expected: usize,
) -> Result<(), IntGemmError> {
    if len != expected {
        return Err(IntGemmError::Shape {
            what,
            value: len,
            expected,
            multiple_of: false,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_multiple() {
        let err = check_multiple("B rows", 15, 16).unwrap_err();
        assert_eq!(err.to_string(), "B rows (15) must be a multiple of 16");
    }

    #[test]
    fn test_display_exact() {
        let err = check_len("A length", 12, 64).unwrap_err();
        assert_eq!(err.to_string(), "A length is 12, expected 64");
    }

    #[test]
    fn test_display_unsupported() {
        let err = IntGemmError::UnsupportedCpu {
            required: CpuType::Ssse3,
            detected: Some(CpuType::Sse2),
        };
        assert_eq!(err.to_string(), "kernel requires SSSE3 but CPU provides SSE2");
    }
}
