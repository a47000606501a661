use std::io::{self, Write};

use fastcsum::{Feature, Kernel};
use serde::Serialize;

use crate::cpu::CpuInfo;

/// Support status of one CPU feature.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct FeatureRow {
    /// Canonical feature name.
    pub name: &'static str,
    /// Compiled into this build.
    pub built: bool,
    /// Reported by the running CPU.
    pub cpu: bool,
    /// Both of the above.
    pub usable: bool,
}

impl From<Feature> for FeatureRow {
    fn from(feature: Feature) -> Self {
        Self {
            name: feature.name(),
            built: feature.built_with(),
            cpu: feature.cpu_has(),
            usable: feature.usable(),
        }
    }
}

/// Status of one checksum kernel.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct KernelRow {
    /// Kernel name accepted by `--kernel`.
    pub name: &'static str,
    /// Short description of the strategy.
    pub description: &'static str,
    /// Feature the kernel depends on, if any.
    pub feature: Option<&'static str>,
    /// Compiled into this build.
    pub built: bool,
    /// Runnable on this machine.
    pub available: bool,
}

impl From<Kernel> for KernelRow {
    fn from(kernel: Kernel) -> Self {
        Self {
            name: kernel.name(),
            description: kernel.description(),
            feature: kernel.required_feature().map(Feature::name),
            built: kernel.is_built(),
            available: kernel.is_available(),
        }
    }
}

/// Everything `fastcsum` reports when run without operands.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Report {
    /// Crate version.
    pub version: &'static str,
    /// Processor identification.
    pub cpu: CpuInfo,
    /// Feature support, one row per feature.
    pub features: Vec<FeatureRow>,
    /// Every registered kernel.
    pub kernels: Vec<KernelRow>,
    /// Kernel that checksums would use.
    pub selected: &'static str,
}

impl Report {
    /// Gathers the report for the running process.
    #[must_use]
    pub fn collect(selected: Kernel) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION"),
            cpu: CpuInfo::detect(),
            features: Feature::ALL.into_iter().map(FeatureRow::from).collect(),
            kernels: Kernel::ALL.into_iter().map(KernelRow::from).collect(),
            selected: selected.name(),
        }
    }

    /// Writes the human-readable feature report.
    pub fn write_text<W: Write + ?Sized>(&self, out: &mut W) -> io::Result<()> {
        writeln!(out, "fastcsum {}", self.version)?;
        writeln!(out, "cpu: {}", self.cpu.summary())?;
        writeln!(out)?;
        writeln!(out, "{:<16} {:<6} {:<6} {}", "feature", "built", "cpu", "usable")?;
        for row in &self.features {
            writeln!(
                out,
                "{:<16} {:<6} {:<6} {}",
                row.name,
                yes_no(row.built),
                yes_no(row.cpu),
                yes_no(row.usable)
            )?;
        }
        writeln!(out)?;
        let available: Vec<&str> = self
            .kernels
            .iter()
            .filter(|row| row.available)
            .map(|row| row.name)
            .collect();
        writeln!(out, "available kernels: {}", available.join(" "))?;
        writeln!(out, "selected kernel: {}", self.selected)
    }

    /// Writes one line per kernel with its build and runtime status.
    pub fn write_kernels<W: Write + ?Sized>(&self, out: &mut W) -> io::Result<()> {
        for row in &self.kernels {
            let status = match (row.built, row.available) {
                (_, true) => "available",
                (true, false) => "no-cpu",
                (false, false) => "not-built",
            };
            writeln!(out, "{:<18} {:<10} {}", row.name, status, row.description)?;
        }
        Ok(())
    }
}

const fn yes_no(flag: bool) -> &'static str {
    if flag { "yes" } else { "no" }
}
