//! Error types for conversions.

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

/// Why a conversion did not produce its destination file.
///
/// Every variant is surfaced to the caller as-is; nothing here is retried.
/// Malformed header/footer templates are deliberately not an error: unknown
/// placeholders pass through as text.
#[derive(Error, Debug)]
pub enum ConversionError {
    /// A destination or resource path could not be read or written.
    #[error("access to '{}' was denied", path.display())]
    UnauthorizedAccess { path: PathBuf },

    /// The backend exceeded its execution-time allowance and was terminated.
    #[error("rendering '{}' timed out after {:.1}s", destination.display(), timeout.as_secs_f32())]
    RenderTimeout {
        destination: PathBuf,
        timeout: Duration,
    },

    /// The backend exited unsuccessfully or never confirmed its output.
    #[error("render backend failed ({}): {diagnostics}", status_text(*status))]
    BackendFailure {
        status: Option<i32>,
        diagnostics: String,
    },

    /// The settings file could not be interpreted.
    #[error("invalid settings: {0}")]
    Settings(String),

    /// Anything else, forwarded with its original name and message.
    #[error("{name}: {message}")]
    Unknown { name: String, message: String },
}

fn status_text(status: Option<i32>) -> String {
    match status {
        Some(code) => format!("exit status {code}"),
        None => "terminated by signal".to_string(),
    }
}

impl ConversionError {
    /// Classify an I/O failure on `path`: permission problems become
    /// [`ConversionError::UnauthorizedAccess`], everything else is forwarded
    /// unchanged as [`ConversionError::Unknown`].
    pub fn from_io(err: io::Error, path: &Path) -> Self {
        match err.kind() {
            io::ErrorKind::PermissionDenied => ConversionError::UnauthorizedAccess {
                path: path.to_path_buf(),
            },
            kind => ConversionError::Unknown {
                name: format!("{kind:?}"),
                message: format!("{}: {err}", path.display()),
            },
        }
    }

    pub fn unknown(name: impl Into<String>, message: impl ToString) -> Self {
        ConversionError::Unknown {
            name: name.into(),
            message: message.to_string(),
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ConversionError::RenderTimeout { .. })
    }
}

pub type Result<T> = std::result::Result<T, ConversionError>;
