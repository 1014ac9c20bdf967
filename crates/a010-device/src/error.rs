/// Errors that can occur in camera operations.
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] a010_transport::TransportError),

    /// Frame-level error, including transport failures seen by the reader worker.
    #[error("frame error: {0}")]
    Frame(#[from] a010_frame::FrameError),

    /// Writing an AT command to the link failed.
    #[error("failed to send {command}: {source}")]
    Command {
        command: String,
        source: std::io::Error,
    },

    /// A background worker thread could not be started.
    #[error("failed to spawn {name} thread: {source}")]
    Spawn {
        name: &'static str,
        source: std::io::Error,
    },

    /// A background worker thread panicked.
    #[error("{0} thread panicked")]
    WorkerPanicked(&'static str),
}

pub type Result<T> = std::result::Result<T, DeviceError>;
