//! Process-wide kernel selection.

use std::sync::OnceLock;

use crate::error::ChecksumError;
use crate::fold::fold_complement;
use crate::kernels::{Kernel, KernelFn};

/// Environment variable naming the kernel [`global`] should use.
pub const KERNEL_ENV: &str = "FASTCSUM_KERNEL";

/// A resolved kernel together with its entry point.
#[derive(Clone, Copy, Debug)]
pub struct Dispatcher {
    kernel: Kernel,
    entry: KernelFn,
}

impl Dispatcher {
    /// Selects the fastest kernel available on this machine.
    ///
    /// # Examples
    ///
    /// ```
    /// use fastcsum::Dispatcher;
    ///
    /// let dispatcher = Dispatcher::detect();
    /// assert!(dispatcher.kernel().is_available());
    /// ```
    #[must_use]
    pub fn detect() -> Self {
        let kernel = Kernel::detect();
        Self {
            kernel,
            entry: kernel.entry(),
        }
    }

    /// Pins a specific kernel, rejecting ones that cannot run here.
    pub fn with_kernel(kernel: Kernel) -> Result<Self, ChecksumError> {
        kernel.ensure_available()?;
        Ok(Self {
            kernel,
            entry: kernel.entry(),
        })
    }

    /// Resolves a kernel override, falling back to detection when the
    /// override is absent, unknown or unavailable.
    fn from_override(value: Option<&str>) -> Self {
        let Some(name) = value else {
            return Self::detect();
        };
        match name.parse::<Kernel>().and_then(Self::with_kernel) {
            Ok(dispatcher) => dispatcher,
            Err(error) => {
                tracing::warn!(%error, "ignoring {KERNEL_ENV}; using detected kernel");
                Self::detect()
            }
        }
    }

    /// Kernel this dispatcher calls.
    #[must_use]
    pub const fn kernel(&self) -> Kernel {
        self.kernel
    }

    /// Sums `data` into `initial` with the selected kernel.
    #[inline]
    #[must_use]
    pub fn checksum_partial(&self, data: &[u8], initial: u64) -> u64 {
        (self.entry)(data, initial)
    }

    /// Computes the finished 16-bit checksum of `data`.
    #[inline]
    #[must_use]
    pub fn checksum(&self, data: &[u8]) -> u16 {
        fold_complement(self.checksum_partial(data, 0))
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::detect()
    }
}

static GLOBAL: OnceLock<Dispatcher> = OnceLock::new();

/// Returns the process-wide dispatcher.
///
/// The kernel is chosen on first use: the one named by `FASTCSUM_KERNEL` if
/// set and available, otherwise the fastest detected kernel.
pub fn global() -> &'static Dispatcher {
    GLOBAL.get_or_init(|| {
        let requested = std::env::var(KERNEL_ENV).ok();
        let dispatcher = Dispatcher::from_override(requested.as_deref());
        tracing::debug!(kernel = %dispatcher.kernel(), "selected checksum kernel");
        dispatcher
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_matches_kernel_detection() {
        assert_eq!(Dispatcher::detect().kernel(), Kernel::detect());
    }

    #[test]
    fn override_selects_named_kernel() {
        let dispatcher = Dispatcher::from_override(Some("vec256-serial"));
        assert_eq!(dispatcher.kernel(), Kernel::Vec256Serial);
    }

    #[test]
    fn bad_override_falls_back_to_detection() {
        assert_eq!(Dispatcher::from_override(Some("bogus")).kernel(), Kernel::detect());
        assert_eq!(Dispatcher::from_override(None).kernel(), Kernel::detect());
    }

    #[test]
    fn unavailable_override_falls_back() {
        for kernel in Kernel::ALL.into_iter().filter(|k| !k.is_available()) {
            let dispatcher = Dispatcher::from_override(Some(kernel.name()));
            assert_eq!(dispatcher.kernel(), Kernel::detect());
            assert!(Dispatcher::with_kernel(kernel).is_err());
        }
    }

    #[test]
    fn global_dispatcher_is_consistent() {
        let first = global();
        let second = global();
        assert!(std::ptr::eq(first, second));
        assert!(first.kernel().is_available());
    }

    #[test]
    fn checksum_folds_partial() {
        let dispatcher = Dispatcher::with_kernel(Kernel::Generic).unwrap();
        let data = [0x00, 0x01, 0xF2, 0x03, 0xF4, 0xF5, 0xF6, 0xF7];
        assert_eq!(dispatcher.checksum(&data), u16::from_be(!0xDDF2));
    }
}
