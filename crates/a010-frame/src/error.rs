/// Errors surfaced by frame decoding and encoding.
///
/// Protocol noise (bad sync bytes, out-of-range lengths, duplicate ids,
/// checksum mismatches) is not an error: the decoder resynchronizes silently
/// and counts it in [`DecoderStats`](crate::DecoderStats).
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// Ingested bytes do not fit in the rolling buffer.
    #[error(
        "rolling buffer overflow ({incoming} incoming bytes, {buffered} buffered, capacity {capacity})"
    )]
    BufferOverflow {
        incoming: usize,
        buffered: usize,
        capacity: usize,
    },

    /// A frame cannot be encoded because its pixel payload is outside 625..=10000 bytes.
    #[error("pixel payload length {len} outside {min}..={max}")]
    PixelLengthOutOfRange { len: usize, min: usize, max: usize },

    /// The byte source failed; the decoder was reset to tail scanning.
    #[error("transport failure: {0}")]
    Transport(#[source] std::io::Error),

    /// An I/O error that did not disturb decoder state (timeouts, write failures).
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The byte source reached end of stream.
    #[error("connection closed")]
    ConnectionClosed,
}

pub type Result<T> = std::result::Result<T, FrameError>;

pub(crate) fn transport_to_frame_error(err: a010_transport::TransportError) -> FrameError {
    match err {
        a010_transport::TransportError::Io(io) => FrameError::Io(io),
        a010_transport::TransportError::Open { source, .. }
        | a010_transport::TransportError::Configure { source, .. } => FrameError::Io(source),
        other => FrameError::Io(std::io::Error::other(other.to_string())),
    }
}
