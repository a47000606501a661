use thiserror::Error;

use crate::features::Feature;
use crate::kernels::Kernel;

/// Errors raised when resolving kernels or features by name.
///
/// The checksum kernels themselves cannot fail. These errors only arise at
/// the selection boundary, where names come from configuration or the
/// command line.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum ChecksumError {
    /// No kernel is registered under the given name.
    #[error("unknown checksum kernel '{name}'")]
    UnknownKernel {
        /// Name supplied by the caller.
        name: String,
    },
    /// No CPU feature is known under the given name.
    #[error("unknown CPU feature '{name}'")]
    UnknownFeature {
        /// Name supplied by the caller.
        name: String,
    },
    /// The kernel exists but cannot run in this build or on this CPU.
    #[error("checksum kernel '{kernel}' is unavailable: {feature} is not usable")]
    KernelUnavailable {
        /// Kernel that was requested.
        kernel: Kernel,
        /// Feature the kernel depends on.
        feature: Feature,
    },
}
