//! Dispatch-level error definitions
//!
//! Per-item failures never surface here; they are accounted in run
//! telemetry. Only total failure to start (or drive) a run is an error.

use contracts::ContractError;
use thiserror::Error;

/// Run-level error type
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Every identity failed validation; nothing was attempted
    #[error("no identities passed validation")]
    NoValidIdentities,

    /// A run is already active; exactly one run may be live at a time
    #[error("a dispatch run is already active")]
    AlreadyRunning,

    /// Stop/status requested with no active run
    #[error("no dispatch run is active")]
    NoRunActive,

    /// The run task was aborted or panicked
    #[error("run task failed: {0}")]
    RunTaskFailed(String),

    /// Contract-level error
    #[error(transparent)]
    Contract(#[from] ContractError),
}
