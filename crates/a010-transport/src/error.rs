use std::path::PathBuf;

/// Errors that can occur in serial link operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to open the device node.
    #[error("failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to apply line settings (termios) to the device.
    #[error("failed to configure {path}: {source}")]
    Configure {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The requested baud rate is not one the camera supports.
    #[error("unsupported baud rate: {0}")]
    UnsupportedBaudRate(u32),

    /// The baud rate is valid for the camera but not available on this platform.
    #[error("baud rate {0} is not available on this platform")]
    PlatformBaudRate(u32),

    /// An I/O error occurred on the link.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TransportError>;
