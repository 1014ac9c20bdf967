use std::collections::VecDeque;
use std::io::{ErrorKind, Read};

use a010_transport::SerialStream;

use crate::codec::{Frame, FrameConfig};
use crate::decoder::{DecoderStats, FrameDecoder};
use crate::error::{transport_to_frame_error, FrameError, Result};

/// Reads validated frames from any `Read` byte source.
///
/// Handles partial reads and resynchronization internally. Callers always
/// get complete frames; corrupted ones never surface.
pub struct FrameReader<T> {
    inner: T,
    decoder: FrameDecoder,
    pending: VecDeque<Frame>,
    chunk: Vec<u8>,
    config: FrameConfig,
}

impl<T: Read> FrameReader<T> {
    /// Create a new frame reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        // Leftovers after an ingest are shorter than one info block, so half
        // the buffer per read always fits.
        let chunk_size = config
            .read_chunk_size
            .min(config.buffer_capacity / 2)
            .max(1);
        Self {
            inner,
            decoder: FrameDecoder::with_capacity(config.buffer_capacity),
            pending: VecDeque::new(),
            chunk: vec![0; chunk_size],
            config,
        }
    }

    /// Read the next complete frame (blocking).
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` when EOF is reached and
    /// `Err(FrameError::Io)` when a read times out. Any other read failure
    /// resets the decoder and is returned as `Err(FrameError::Transport)`.
    pub fn read_frame(&mut self) -> Result<Frame> {
        loop {
            if let Some(frame) = self.pending.pop_front() {
                return Ok(frame);
            }

            let read = match self.inner.read(&mut self.chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                    return Err(FrameError::Io(err))
                }
                Err(err) => return Err(self.decoder.on_transport_error(err)),
            };

            if read == 0 {
                return Err(FrameError::ConnectionClosed);
            }

            self.decoder
                .ingest(&self.chunk[..read], &mut self.pending)?;
        }
    }

    /// Frames already decoded but not yet returned by [`read_frame`](Self::read_frame).
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Decoder counters.
    pub fn stats(&self) -> DecoderStats {
        self.decoder.stats()
    }

    /// Borrow the decoder.
    pub fn decoder(&self) -> &FrameDecoder {
        &self.decoder
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current frame reader configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl FrameReader<SerialStream> {
    /// Create a frame reader for a `SerialStream` and apply read timeout from config.
    pub fn with_config_link(inner: SerialStream, config: FrameConfig) -> Result<Self> {
        inner
            .set_read_timeout(config.read_timeout)
            .map_err(transport_to_frame_error)?;
        Ok(Self::with_config(inner, config))
    }
}

impl<T: Read> Iterator for FrameReader<T> {
    type Item = Result<Frame>;

    /// Yields frames until end of stream. Errors other than EOF are yielded
    /// once; the caller decides whether to keep iterating.
    fn next(&mut self) -> Option<Self::Item> {
        match self.read_frame() {
            Ok(frame) => Some(Ok(frame)),
            Err(FrameError::ConnectionClosed) => None,
            Err(err) => Some(Err(err)),
        }
    }
}
