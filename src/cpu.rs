use std::fmt;
use std::sync::OnceLock;

/// CPU capability tag, ordered from weakest to strongest
///
/// The ordering matters: a kernel tagged `USES = CpuType::Ssse3` runs on any
/// CPU whose detected tag is `>= Ssse3`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CpuType {
    /// Baseline x86-64 (16-bit quantize and GEMM only)
    Sse2,
    /// Adds `pmaddubsw`, the 8-bit widening multiply
    Ssse3,
    /// 256-bit integer vectors
    Avx2,
    /// 512-bit integer vectors with byte/word operations
    Avx512Bw,
    /// AVX-512 with `vpdpbusd` (u8 x s8 dot-product accumulate)
    Avx512Vnni,
}

impl CpuType {
    /// Detect the strongest tag the current CPU supports
    ///
    /// Returns `None` on non-x86-64 targets and on x86 CPUs without SSE2
    /// (SSE2 is architectural on x86-64, so `None` there is unreachable in
    /// practice).
    pub fn detect_best() -> Option<Self> {
        #[cfg(target_arch = "x86_64")]
        {
            if std::is_x86_feature_detected!("avx512bw")
                && std::is_x86_feature_detected!("avx512vnni")
            {
                return Some(Self::Avx512Vnni);
            }
            if std::is_x86_feature_detected!("avx512f")
                && std::is_x86_feature_detected!("avx512bw")
            {
                return Some(Self::Avx512Bw);
            }
            if std::is_x86_feature_detected!("avx2") {
                return Some(Self::Avx2);
            }
            if std::is_x86_feature_detected!("ssse3") {
                return Some(Self::Ssse3);
            }
            if std::is_x86_feature_detected!("sse2") {
                return Some(Self::Sse2);
            }
        }
        None
    }

    /// Check if this tag's instruction set is present on the current CPU
    pub fn is_supported(&self) -> bool {
        #[cfg(target_arch = "x86_64")]
        {
            match self {
                Self::Sse2 => std::is_x86_feature_detected!("sse2"),
                Self::Ssse3 => std::is_x86_feature_detected!("ssse3"),
                Self::Avx2 => std::is_x86_feature_detected!("avx2"),
                Self::Avx512Bw => {
                    std::is_x86_feature_detected!("avx512f")
                        && std::is_x86_feature_detected!("avx512bw")
                }
                Self::Avx512Vnni => {
                    std::is_x86_feature_detected!("avx512bw")
                        && std::is_x86_feature_detected!("avx512vnni")
                }
            }
        }
        #[cfg(not(target_arch = "x86_64"))]
        {
            false
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Sse2 => "SSE2",
            Self::Ssse3 => "SSSE3",
            Self::Avx2 => "AVX2",
            Self::Avx512Bw => "AVX-512BW",
            Self::Avx512Vnni => "AVX-512VNNI",
        }
    }
}

impl fmt::Display for CpuType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

static KCPU: OnceLock<Option<CpuType>> = OnceLock::new();

/// The process-wide capability tag, probed once on first use
///
/// Safe to read concurrently; the probe result never changes while the
/// process runs.
pub fn kcpu() -> Option<CpuType> {
    *KCPU.get_or_init(CpuType::detect_best)
}
