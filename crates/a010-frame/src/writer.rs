use std::io::{ErrorKind, Write};

use a010_transport::SerialStream;
use bytes::BytesMut;

use crate::codec::{encode_frame, Frame, FrameConfig, PIXELS_LEN_MAX, FRAME_OVERHEAD, TAIL};
use crate::error::{transport_to_frame_error, FrameError, Result};

/// Writes encoded frames to any `Write` stream.
///
/// The first frame written is preceded by one `0xDD` byte so a decoder
/// starting at the same point can sync on it. Used to emulate a camera and to
/// produce capture files.
pub struct FrameWriter<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
    primed: bool,
}

impl<T: Write> FrameWriter<T> {
    /// Create a new frame writer with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame writer with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(FRAME_OVERHEAD + PIXELS_LEN_MAX + 1),
            config,
            primed: false,
        }
    }

    /// Encode and write a complete frame (blocking).
    pub fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        self.buf.clear();
        if !self.primed {
            self.buf.extend_from_slice(&[TAIL]);
        }
        encode_frame(frame, &mut self.buf)?;

        write_all(&mut self.inner, &self.buf)?;
        self.primed = true;
        self.flush()
    }

    /// Write bytes verbatim, bypassing framing.
    pub fn write_raw(&mut self, bytes: &[u8]) -> Result<()> {
        write_all(&mut self.inner, bytes)?;
        self.flush()
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    /// Whether the leading sync byte has been written.
    pub fn is_primed(&self) -> bool {
        self.primed
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current frame writer configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl FrameWriter<SerialStream> {
    /// Create a frame writer for a `SerialStream` and apply write timeout from config.
    pub fn with_config_link(inner: SerialStream, config: FrameConfig) -> Result<Self> {
        inner
            .set_write_timeout(config.write_timeout)
            .map_err(transport_to_frame_error)?;
        Ok(Self::with_config(inner, config))
    }
}

fn write_all<T: Write>(inner: &mut T, bytes: &[u8]) -> Result<()> {
    let mut offset = 0usize;
    while offset < bytes.len() {
        match inner.write(&bytes[offset..]) {
            Ok(0) => return Err(FrameError::ConnectionClosed),
            Ok(n) => offset += n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
            Err(err) => return Err(FrameError::Io(err)),
        }
    }
    Ok(())
}
