//! Graphics error types.

use thiserror::Error;

use crate::handle::ResourceKind;

/// Errors that can occur in the graphics layer.
///
/// Only recoverable conditions are represented here. Usage bugs (wrong state,
/// out-of-range copies) are reported through `gpu_assert!` instead.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphicsError {
    /// A native constructor returned a null handle.
    #[error("failed to create {kind}: {message}")]
    CreationFailed {
        /// Kind of object that could not be created.
        kind: ResourceKind,
        /// Diagnostic reported by the backend.
        message: String,
    },
    /// Mapping a transfer buffer into host memory failed.
    #[error("failed to map transfer buffer: {0}")]
    MapFailed(String),
    /// The backend rejected a command buffer submission.
    #[error("failed to submit command buffer: {0}")]
    SubmitFailed(String),
    /// Waiting for the device to finish its work failed.
    #[error("failed to wait for device idle: {0}")]
    WaitFailed(String),
    /// The next swapchain texture could not be acquired.
    #[error("failed to acquire swapchain texture: {0}")]
    SwapchainAcquireFailed(String),
    /// The device could not take over presentation for a window.
    #[error("failed to claim window: {0}")]
    WindowClaimFailed(String),
    /// The window collaborator could not provide a native handle.
    #[error("window handle unavailable: {0}")]
    WindowHandle(String),
    /// An invalid parameter was provided.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}

impl GraphicsError {
    /// Build a creation failure from a backend diagnostic.
    ///
    /// Backends are not required to set an error string, so an empty message
    /// is replaced with a generic one.
    pub fn creation_failed(kind: ResourceKind, message: impl Into<String>) -> Self {
        Self::CreationFailed {
            kind,
            message: non_empty(message.into()),
        }
    }
}

impl From<raw_window_handle::HandleError> for GraphicsError {
    fn from(err: raw_window_handle::HandleError) -> Self {
        Self::WindowHandle(err.to_string())
    }
}

/// Result alias used throughout the crate.
pub type GraphicsResult<T> = Result<T, GraphicsError>;

pub(crate) fn non_empty(message: String) -> String {
    if message.is_empty() {
        "unknown GPU backend error".to_string()
    } else {
        message
    }
}
