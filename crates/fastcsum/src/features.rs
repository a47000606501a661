//! CPU feature queries gating the hardware kernels.
//!
//! Each [`Feature`] answers three questions:
//!
//! - [`built_with`](Feature::built_with): was support compiled in? This is a
//!   constant derived from the target architecture and the cargo features
//!   `adx`, `sse41`, `avx2` and `neon`.
//! - [`cpu_has`](Feature::cpu_has): does the running CPU report it? Detection
//!   runs once per process and is cached in a `OnceLock`.
//! - [`usable`](Feature::usable): both of the above.

use core::fmt;
use core::str::FromStr;
use std::sync::OnceLock;

use crate::error::ChecksumError;

/// Hardware capability a kernel can depend on.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Feature {
    /// Dual independent carry chains (`adcx`/`adox` on x86_64).
    HardwareCarry,
    /// 128-bit vector lanes (SSE4.1 on x86_64, NEON on aarch64).
    Vector128,
    /// 256-bit vector lanes (AVX2 on x86_64).
    Vector256,
}

impl Feature {
    /// Every feature, in report order.
    pub const ALL: [Self; 3] = [Self::HardwareCarry, Self::Vector128, Self::Vector256];

    /// Canonical lower-case name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::HardwareCarry => "hardware-carry",
            Self::Vector128 => "vector128",
            Self::Vector256 => "vector256",
        }
    }

    /// Reports whether support for this feature was compiled in.
    #[must_use]
    pub const fn built_with(self) -> bool {
        match self {
            Self::HardwareCarry => cfg!(all(target_arch = "x86_64", feature = "adx")),
            Self::Vector128 => cfg!(any(
                all(target_arch = "x86_64", feature = "sse41"),
                all(target_arch = "aarch64", feature = "neon")
            )),
            Self::Vector256 => cfg!(all(target_arch = "x86_64", feature = "avx2")),
        }
    }

    /// Reports whether the running CPU supports this feature.
    ///
    /// The first call performs detection for every feature. Later calls read
    /// the cached result.
    #[must_use]
    pub fn cpu_has(self) -> bool {
        let cpu = cpu_features();
        match self {
            Self::HardwareCarry => cpu.hardware_carry,
            Self::Vector128 => cpu.vector128,
            Self::Vector256 => cpu.vector256,
        }
    }

    /// Reports whether kernels depending on this feature may be called.
    #[must_use]
    pub fn usable(self) -> bool {
        self.built_with() && self.cpu_has()
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Feature {
    type Err = ChecksumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hardware-carry" | "hwcarry" | "adx" => Ok(Self::HardwareCarry),
            "vector128" | "vec128" | "sse4.1" | "sse41" | "neon" => Ok(Self::Vector128),
            "vector256" | "vec256" | "avx2" => Ok(Self::Vector256),
            _ => Err(ChecksumError::UnknownFeature { name: s.to_owned() }),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
struct CpuFeatures {
    hardware_carry: bool,
    vector128: bool,
    vector256: bool,
}

static FEATURES: OnceLock<CpuFeatures> = OnceLock::new();

#[inline]
fn cpu_features() -> CpuFeatures {
    *FEATURES.get_or_init(|| {
        let detected = detect();
        tracing::debug!(
            hardware_carry = detected.hardware_carry,
            vector128 = detected.vector128,
            vector256 = detected.vector256,
            "detected checksum CPU features"
        );
        detected
    })
}

#[cfg(target_arch = "x86_64")]
fn detect() -> CpuFeatures {
    CpuFeatures {
        hardware_carry: std::arch::is_x86_feature_detected!("adx"),
        vector128: std::arch::is_x86_feature_detected!("sse4.1"),
        vector256: std::arch::is_x86_feature_detected!("avx2"),
    }
}

#[cfg(target_arch = "aarch64")]
fn detect() -> CpuFeatures {
    CpuFeatures {
        vector128: std::arch::is_aarch64_feature_detected!("neon"),
        ..CpuFeatures::default()
    }
}

#[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
fn detect() -> CpuFeatures {
    CpuFeatures::default()
}

/// Looks up `name` and reports [`Feature::built_with`].
pub fn feature_built_with(name: &str) -> Result<bool, ChecksumError> {
    name.parse::<Feature>().map(Feature::built_with)
}

/// Looks up `name` and reports [`Feature::cpu_has`].
pub fn feature_cpu_has(name: &str) -> Result<bool, ChecksumError> {
    name.parse::<Feature>().map(Feature::cpu_has)
}

/// Looks up `name` and reports [`Feature::usable`].
///
/// # Examples
///
/// ```
/// use fastcsum::feature_usable;
///
/// let usable = feature_usable("vector256").unwrap();
/// assert_eq!(usable, fastcsum::Feature::Vector256.usable());
/// assert!(feature_usable("mmx").is_err());
/// ```
pub fn feature_usable(name: &str) -> Result<bool, ChecksumError> {
    name.parse::<Feature>().map(Feature::usable)
}

#[cfg(test)]
pub(crate) fn cpu_features_cached_for_tests() -> bool {
    FEATURES.get().is_some()
}
