//! Checksum kernel registry.
//!
//! Every kernel has the signature [`KernelFn`] and returns the same
//! accumulator, up to one's-complement equivalence, for the same input. They
//! differ only in main-loop stride, lane width, carry encoding and alignment
//! handling.

use core::fmt;
use core::str::FromStr;

use crate::error::ChecksumError;
use crate::features::Feature;

mod generic;
#[cfg(all(target_arch = "aarch64", feature = "neon"))]
mod neon;
mod vector;
#[cfg(all(
    target_arch = "x86_64",
    any(feature = "adx", feature = "sse41", feature = "avx2")
))]
mod x86;

/// Signature shared by every kernel: `(buffer, initial) -> accumulator`.
pub type KernelFn = fn(&[u8], u64) -> u64;

/// A checksum kernel implementation.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Kernel {
    /// Scalar 64-bit carry chain. Runs everywhere and serves as the oracle.
    Generic,
    /// Portable 4-lane kernel, carry-minus-one, tree fold.
    Vec128,
    /// [`Vec128`](Self::Vec128) with a 16-byte alignment prologue.
    Vec128Align,
    /// Portable 8-lane kernel, carry-minus-one, tree fold.
    Vec256,
    /// [`Vec256`](Self::Vec256) with a serial fold.
    Vec256Serial,
    /// [`Vec256`](Self::Vec256) with a 32-byte alignment prologue.
    Vec256Align,
    /// [`Vec256Align`](Self::Vec256Align) using the negated-carry encoding.
    Vec256AlignNegc,
    /// Dual `adcx`/`adox` carry chains.
    Adx,
    /// SSE4.1 4-lane kernel with aligned loads.
    Sse41,
    /// AVX2 8-lane kernel with aligned loads.
    Avx2,
    /// NEON 4-lane kernel.
    Neon,
}

impl Kernel {
    /// Every kernel, in registration order.
    pub const ALL: [Self; 11] = [
        Self::Generic,
        Self::Vec128,
        Self::Vec128Align,
        Self::Vec256,
        Self::Vec256Serial,
        Self::Vec256Align,
        Self::Vec256AlignNegc,
        Self::Adx,
        Self::Sse41,
        Self::Avx2,
        Self::Neon,
    ];

    /// Kernels tried by [`detect`](Self::detect), fastest first.
    pub const PREFERENCE: [Self; 5] = [Self::Avx2, Self::Adx, Self::Sse41, Self::Neon, Self::Generic];

    /// Stable lower-case name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Generic => "generic",
            Self::Vec128 => "vec128",
            Self::Vec128Align => "vec128-align",
            Self::Vec256 => "vec256",
            Self::Vec256Serial => "vec256-serial",
            Self::Vec256Align => "vec256-align",
            Self::Vec256AlignNegc => "vec256-align-negc",
            Self::Adx => "adx",
            Self::Sse41 => "sse41",
            Self::Avx2 => "avx2",
            Self::Neon => "neon",
        }
    }

    /// One-line description used in reports.
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::Generic => "64-bit carry chain, 32-byte strides",
            Self::Vec128 => "portable 4x32 lanes, carry-minus-one, tree fold",
            Self::Vec128Align => "portable 4x32 lanes, 16-byte aligned",
            Self::Vec256 => "portable 8x32 lanes, carry-minus-one, tree fold",
            Self::Vec256Serial => "portable 8x32 lanes, carry-minus-one, serial fold",
            Self::Vec256Align => "portable 8x32 lanes, 32-byte aligned",
            Self::Vec256AlignNegc => "portable 8x32 lanes, 32-byte aligned, negated carry",
            Self::Adx => "dual ADCX/ADOX carry chains, 64-byte blocks",
            Self::Sse41 => "SSE4.1 4x32 lanes, aligned loads",
            Self::Avx2 => "AVX2 8x32 lanes, aligned loads",
            Self::Neon => "NEON 4x32 lanes, negated carry",
        }
    }

    /// CPU feature the kernel depends on, if any.
    #[must_use]
    pub const fn required_feature(self) -> Option<Feature> {
        match self {
            Self::Adx => Some(Feature::HardwareCarry),
            Self::Sse41 | Self::Neon => Some(Feature::Vector128),
            Self::Avx2 => Some(Feature::Vector256),
            _ => None,
        }
    }

    /// Reports whether the kernel was compiled into this build.
    #[must_use]
    pub const fn is_built(self) -> bool {
        match self {
            Self::Adx => cfg!(all(target_arch = "x86_64", feature = "adx")),
            Self::Sse41 => cfg!(all(target_arch = "x86_64", feature = "sse41")),
            Self::Avx2 => cfg!(all(target_arch = "x86_64", feature = "avx2")),
            Self::Neon => cfg!(all(target_arch = "aarch64", feature = "neon")),
            _ => true,
        }
    }

    /// Reports whether the kernel may be invoked on this machine.
    #[must_use]
    pub fn is_available(self) -> bool {
        self.is_built() && self.required_feature().is_none_or(Feature::usable)
    }

    /// Iterates over the kernels that may be invoked on this machine.
    pub fn available() -> impl Iterator<Item = Self> {
        Self::ALL.into_iter().filter(|kernel| kernel.is_available())
    }

    /// Returns the fastest kernel available on this machine.
    #[must_use]
    pub fn detect() -> Self {
        Self::PREFERENCE
            .into_iter()
            .find(|kernel| kernel.is_available())
            .unwrap_or(Self::Generic)
    }

    /// Returns the kernel's entry point.
    ///
    /// Hardware kernels re-check their feature on every call. Calling the
    /// entry point of an unavailable kernel logs the violation and aborts the
    /// process. Use [`try_compute`](Self::try_compute) when the kernel comes
    /// from untrusted input.
    #[must_use]
    #[allow(unreachable_patterns)]
    pub fn entry(self) -> KernelFn {
        match self {
            Self::Generic => generic::checksum_generic,
            Self::Vec128 => vector::checksum_vec128,
            Self::Vec128Align => vector::checksum_vec128_align,
            Self::Vec256 => vector::checksum_vec256,
            Self::Vec256Serial => vector::checksum_vec256_serial,
            Self::Vec256Align => vector::checksum_vec256_align,
            Self::Vec256AlignNegc => vector::checksum_vec256_align_negc,
            #[cfg(all(target_arch = "x86_64", feature = "adx"))]
            Self::Adx => x86::checksum_adx,
            #[cfg(all(target_arch = "x86_64", feature = "sse41"))]
            Self::Sse41 => x86::checksum_sse41,
            #[cfg(all(target_arch = "x86_64", feature = "avx2"))]
            Self::Avx2 => x86::checksum_avx2,
            #[cfg(all(target_arch = "aarch64", feature = "neon"))]
            Self::Neon => neon::checksum_neon,
            _ => unavailable(self),
        }
    }

    /// Runs the kernel over `data`, chaining from `initial`.
    ///
    /// Aborts if the kernel is unavailable; see [`entry`](Self::entry).
    #[inline]
    #[must_use]
    pub fn compute(self, data: &[u8], initial: u64) -> u64 {
        (self.entry())(data, initial)
    }

    /// Runs the kernel over `data` if it is available on this machine.
    ///
    /// # Examples
    ///
    /// ```
    /// use fastcsum::Kernel;
    ///
    /// let acc = Kernel::Generic.try_compute(b"\x45\x00\x00\x1c", 0).unwrap();
    /// assert_ne!(acc, 0);
    /// ```
    pub fn try_compute(self, data: &[u8], initial: u64) -> Result<u64, ChecksumError> {
        self.ensure_available()?;
        Ok(self.compute(data, initial))
    }

    pub(crate) fn ensure_available(self) -> Result<(), ChecksumError> {
        if self.is_available() {
            return Ok(());
        }
        let feature = self.required_feature().unwrap_or(Feature::Vector128);
        Err(ChecksumError::KernelUnavailable {
            kernel: self,
            feature,
        })
    }
}

impl fmt::Display for Kernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Kernel {
    type Err = ChecksumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|kernel| kernel.name() == wanted || (wanted == "sse4.1" && *kernel == Self::Sse41))
            .ok_or_else(|| ChecksumError::UnknownKernel { name: s.to_owned() })
    }
}

/// Reports a kernel invoked without the hardware or build support it needs,
/// then aborts.
#[cold]
pub(crate) fn unavailable(kernel: Kernel) -> ! {
    tracing::error!(
        kernel = kernel.name(),
        feature = kernel.required_feature().map(Feature::name),
        "checksum kernel invoked without required CPU support"
    );
    std::process::abort()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fold::fold_complement;

    #[test]
    fn names_are_unique_and_parse_back() {
        for kernel in Kernel::ALL {
            assert_eq!(kernel.name().parse::<Kernel>(), Ok(kernel));
            assert_eq!(
                Kernel::ALL.iter().filter(|k| k.name() == kernel.name()).count(),
                1
            );
        }
        assert_eq!("SSE4.1".parse::<Kernel>(), Ok(Kernel::Sse41));
    }

    #[test]
    fn unknown_kernel_is_an_error() {
        assert_eq!(
            "avx512".parse::<Kernel>(),
            Err(ChecksumError::UnknownKernel {
                name: "avx512".to_owned()
            })
        );
    }

    #[test]
    fn portable_kernels_are_always_available() {
        for kernel in Kernel::ALL {
            if kernel.required_feature().is_none() {
                assert!(kernel.is_built());
                assert!(kernel.is_available(), "{kernel}");
            }
        }
    }

    #[test]
    fn detect_returns_an_available_kernel() {
        let kernel = Kernel::detect();
        assert!(kernel.is_available());
        assert!(Kernel::available().any(|k| k == kernel));
    }

    #[test]
    fn try_compute_rejects_unavailable_kernels() {
        for kernel in Kernel::ALL {
            let result = kernel.try_compute(&[1, 2, 3], 0);
            if kernel.is_available() {
                assert!(result.is_ok());
            } else {
                assert_eq!(
                    result,
                    Err(ChecksumError::KernelUnavailable {
                        kernel,
                        feature: kernel.required_feature().unwrap()
                    })
                );
            }
        }
    }

    #[test]
    fn available_kernels_agree_on_a_header() {
        // IPv4 header with a zeroed checksum field.
        let header = [
            0x45, 0x00, 0x00, 0x73, 0x00, 0x00, 0x40, 0x00, 0x40, 0x11, 0x00, 0x00, 0xC0, 0xA8,
            0x00, 0x01, 0xC0, 0xA8, 0x00, 0xC7,
        ];
        for kernel in Kernel::available() {
            let csum = fold_complement(kernel.compute(&header, 0));
            assert_eq!(csum.to_ne_bytes(), [0xB8, 0x61], "{kernel}");
        }
    }
}
