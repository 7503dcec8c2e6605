//! Error taxonomy shared by every fallible harness operation.

use thiserror::Error;

/// Classified failures surfaced by the dispatch harness.
///
/// Every variant is fatal for the operation that produced it; nothing in the
/// harness retries or falls back to a degraded execution path. The run
/// controller is expected to propagate these to the process boundary.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The externally supplied device index does not name an enumerated device.
    #[error("device index {index} out of range ({count} devices enumerated)")]
    IndexOutOfRange { index: usize, count: usize },

    /// Kernel source text failed to compile for the bound device.
    #[error("kernel source failed to compile: {diagnostics}")]
    Build { diagnostics: String },

    /// The named entry point is absent from the built program module.
    #[error("kernel entry point `{name}` not found: {diagnostics}")]
    EntryNotFound { name: String, diagnostics: String },

    /// The local extent does not tile the global extent, or exceeds what the
    /// selected device reports it can schedule per work group.
    #[error("invalid work-group size: {reason}")]
    InvalidWorkGroupSize { reason: String },

    /// Generic device or driver failure surfaced during an enqueue or a
    /// blocking call.
    #[error("device runtime failure: {reason}")]
    DeviceRuntime { reason: String },
}

pub type Result<T> = std::result::Result<T, DispatchError>;
