use serde::Serialize;

/// Identification of the processor the report was produced on.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct CpuInfo {
    /// Target architecture the binary was compiled for.
    pub arch: &'static str,
    /// CPUID vendor string, such as `GenuineIntel`.
    pub vendor: Option<String>,
    /// CPUID processor brand string.
    pub brand: Option<String>,
}

impl CpuInfo {
    /// Queries the running processor.
    #[must_use]
    pub fn detect() -> Self {
        let (vendor, brand) = identify();
        Self {
            arch: std::env::consts::ARCH,
            vendor,
            brand,
        }
    }

    /// One-line summary for the text report.
    #[must_use]
    pub fn summary(&self) -> String {
        match (&self.vendor, &self.brand) {
            (Some(vendor), Some(brand)) => format!("{} {vendor} ({brand})", self.arch),
            (Some(vendor), None) => format!("{} {vendor}", self.arch),
            (None, Some(brand)) => format!("{} ({brand})", self.arch),
            (None, None) => self.arch.to_owned(),
        }
    }
}

#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
fn identify() -> (Option<String>, Option<String>) {
    let cpuid = raw_cpuid::CpuId::new();
    let vendor = cpuid.get_vendor_info().map(|info| info.as_str().to_owned());
    let brand = cpuid
        .get_processor_brand_string()
        .map(|brand| brand.as_str().trim().to_owned())
        .filter(|brand| !brand.is_empty());
    (vendor, brand)
}

#[cfg(not(any(target_arch = "x86", target_arch = "x86_64")))]
fn identify() -> (Option<String>, Option<String>) {
    (None, None)
}
