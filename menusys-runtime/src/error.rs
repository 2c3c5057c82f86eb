// Error types for the menusys runtime.

use thiserror::Error;

use crate::loader::LoadFailure;

/// Rich error type for bridge operations.
#[derive(Debug, Error)]
pub enum MenuError {
    /// The native module or its root menu-system object is missing.
    #[error("menu system is not available")]
    Unavailable,

    /// One optional export could not be resolved.
    #[error("native export `{0}` is not available")]
    Unsupported(&'static str),

    /// A null pointer was supplied where a live native object is required.
    #[error("invalid native handle: {0}")]
    InvalidHandle(&'static str),

    /// The native call returned null where an object was expected.
    #[error("native call failed: {0}")]
    NativeCallFailed(&'static str),

    /// The menu facade was closed or disposed.
    #[error("menu has been disposed")]
    Disposed,

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("menu profile '{0}' not found")]
    ProfileNotFound(String),

    #[error("callback token space exhausted")]
    TokensExhausted,

    #[error(transparent)]
    Load(#[from] LoadFailure),
}

impl MenuError {
    /// True when the root cause is the native module being absent or incomplete,
    /// as opposed to a programming error on the caller's side.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            MenuError::Unavailable
                | MenuError::Unsupported(_)
                | MenuError::NativeCallFailed(_)
                | MenuError::Load(_)
        )
    }
}

/// Convenience alias used throughout the runtime.
pub type MenuResult<T> = Result<T, MenuError>;
