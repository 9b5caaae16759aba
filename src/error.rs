//! Error handling stuff
use displaydoc::Display;
use std::io;
use thiserror::Error;

/// Error type for overlay operations
#[derive(Debug, Display, Error)]
pub enum OverlayError {
    /// {0}
    Io(#[from] io::Error),

    /// Overlay configuration root `{0}` does not exist (is configfs mounted?)
    RootMissing(String),

    /// Couldn't compile `{file}`: {reason}
    Compile {
        file: String,
        reason: String,
        code: Option<i32>,
    },

    /// {0}
    Usage(String),
}

impl OverlayError {
    /// Whether this is a mistake in the invocation rather than a failure of
    /// an external call.
    pub fn is_usage(&self) -> bool {
        matches!(self, OverlayError::Usage(_) | OverlayError::RootMissing(_))
    }

    /// Process exit code to report this error with.
    ///
    /// A failed compiler run keeps the compiler's own exit status; everything
    /// else is 1.
    pub fn exit_code(&self) -> i32 {
        match self {
            OverlayError::Compile { code: Some(code), .. } => *code,
            _ => 1,
        }
    }
}

/// Error text.
pub(crate) mod text {
    pub const NAME: &str = "an overlay name is required";

    pub const SOURCE: &str = "exactly one of --dts or --dtb is required";
}
