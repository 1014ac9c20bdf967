use std::fs::File;
use std::io::{ErrorKind, Read, Write};
use std::path::Path;
#[cfg(unix)]
use std::path::PathBuf;
use std::time::Duration;

use crate::baud::BaudRate;
use crate::error::Result;

/// A connected link to the camera. Implements Read + Write.
///
/// This is the I/O type every layer above reads camera bytes from and writes
/// AT commands to. A real device is a configured tty; captures replayed from
/// disk and in-process loopback pairs use the same type so the decoder and
/// driver cannot tell them apart.
///
/// On a tty, a read that times out is reported as `ErrorKind::TimedOut`
/// rather than `Ok(0)`, so `Ok(0)` always means end of stream. Flushing a
/// tty waits until queued output has left the UART.
pub struct SerialStream {
    inner: SerialStreamInner,
}

enum SerialStreamInner {
    #[cfg(unix)]
    Tty { file: File, path: PathBuf },
    File(File),
    #[cfg(unix)]
    Loopback(std::os::unix::net::UnixStream),
}

impl Read for SerialStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            #[cfg(unix)]
            SerialStreamInner::Tty { file, .. } => match file.read(buf)? {
                0 if !buf.is_empty() => Err(std::io::Error::from(ErrorKind::TimedOut)),
                n => Ok(n),
            },
            SerialStreamInner::File(file) => file.read(buf),
            #[cfg(unix)]
            SerialStreamInner::Loopback(stream) => stream.read(buf),
        }
    }
}

impl Write for SerialStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            #[cfg(unix)]
            SerialStreamInner::Tty { file, .. } => file.write(buf),
            SerialStreamInner::File(file) => file.write(buf),
            #[cfg(unix)]
            SerialStreamInner::Loopback(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match &mut self.inner {
            #[cfg(unix)]
            SerialStreamInner::Tty { file, .. } => crate::serial::drain(file),
            SerialStreamInner::File(file) => file.flush(),
            #[cfg(unix)]
            SerialStreamInner::Loopback(stream) => stream.flush(),
        }
    }
}

impl SerialStream {
    /// Wrap an already configured tty.
    #[cfg(unix)]
    pub(crate) fn from_tty(file: File, path: PathBuf) -> Self {
        Self {
            inner: SerialStreamInner::Tty { file, path },
        }
    }

    /// Wrap a plain file, e.g. a raw capture being replayed.
    ///
    /// Line-setting operations are no-ops on such streams.
    pub fn from_file(file: File) -> Self {
        Self {
            inner: SerialStreamInner::File(file),
        }
    }

    /// Create a connected in-process pair: bytes written to one end are read
    /// from the other. Used to emulate a camera without hardware.
    #[cfg(unix)]
    pub fn pair() -> Result<(Self, Self)> {
        let (left, right) = std::os::unix::net::UnixStream::pair()?;
        Ok((
            Self {
                inner: SerialStreamInner::Loopback(left),
            },
            Self {
                inner: SerialStreamInner::Loopback(right),
            },
        ))
    }

    /// Try to clone this stream (creates a new file descriptor).
    pub fn try_clone(&self) -> Result<Self> {
        let inner = match &self.inner {
            #[cfg(unix)]
            SerialStreamInner::Tty { file, path } => SerialStreamInner::Tty {
                file: file.try_clone()?,
                path: path.clone(),
            },
            SerialStreamInner::File(file) => SerialStreamInner::File(file.try_clone()?),
            #[cfg(unix)]
            SerialStreamInner::Loopback(stream) => SerialStreamInner::Loopback(stream.try_clone()?),
        };
        Ok(Self { inner })
    }

    /// Set read timeout on the underlying link.
    ///
    /// On a tty the timeout is applied through `VTIME`, which has a resolution
    /// of 100 ms and a ceiling of 25.5 s.
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        match &self.inner {
            #[cfg(unix)]
            SerialStreamInner::Tty { file, path } => {
                crate::serial::apply_read_timeout(file, path, timeout)
            }
            SerialStreamInner::File(_) => Ok(()),
            #[cfg(unix)]
            SerialStreamInner::Loopback(stream) => {
                stream.set_read_timeout(timeout).map_err(Into::into)
            }
        }
    }

    /// Set write timeout on the underlying link (loopback only; tty writes block).
    pub fn set_write_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        match &self.inner {
            #[cfg(unix)]
            SerialStreamInner::Tty { .. } => Ok(()),
            SerialStreamInner::File(_) => Ok(()),
            #[cfg(unix)]
            SerialStreamInner::Loopback(stream) => {
                stream.set_write_timeout(timeout).map_err(Into::into)
            }
        }
    }

    /// Change the line speed of a tty.
    pub fn set_baud_rate(&self, rate: BaudRate) -> Result<()> {
        match &self.inner {
            #[cfg(unix)]
            SerialStreamInner::Tty { file, path } => crate::serial::apply_baud_rate(file, path, rate),
            _ => Ok(()),
        }
    }

    /// Discard bytes queued in both directions.
    pub fn purge(&self) -> Result<()> {
        match &self.inner {
            #[cfg(unix)]
            SerialStreamInner::Tty { file, path } => crate::serial::purge(file, path),
            _ => Ok(()),
        }
    }

    /// Device path, for tty streams.
    pub fn path(&self) -> Option<&Path> {
        match &self.inner {
            #[cfg(unix)]
            SerialStreamInner::Tty { path, .. } => Some(path.as_path()),
            _ => None,
        }
    }

    /// Short link kind name for diagnostics.
    pub fn kind(&self) -> &'static str {
        match &self.inner {
            #[cfg(unix)]
            SerialStreamInner::Tty { .. } => "tty",
            SerialStreamInner::File(_) => "file",
            #[cfg(unix)]
            SerialStreamInner::Loopback(_) => "loopback",
        }
    }
}

impl std::fmt::Debug for SerialStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut dbg = f.debug_struct("SerialStream");
        dbg.field("type", &self.kind());
        if let Some(path) = self.path() {
            dbg.field("path", &path);
        }
        dbg.finish()
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn loopback_pair_carries_bytes_both_ways() {
        let (mut left, mut right) = SerialStream::pair().unwrap();

        left.write_all(b"AT+ISP=1\r").unwrap();
        let mut buf = [0u8; 9];
        right.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"AT+ISP=1\r");

        right.write_all(&[0xDD, 0x00, 0xFF]).unwrap();
        let mut buf = [0u8; 3];
        left.read_exact(&mut buf).unwrap();
        assert_eq!(buf, [0xDD, 0x00, 0xFF]);
    }

    #[test]
    fn loopback_read_timeout_reports_would_block() {
        let (left, _right) = SerialStream::pair().unwrap();
        left.set_read_timeout(Some(Duration::from_millis(10)))
            .unwrap();
        let mut reader = left.try_clone().unwrap();
        let mut buf = [0u8; 4];
        let err = reader.read(&mut buf).unwrap_err();
        assert!(matches!(
            err.kind(),
            ErrorKind::WouldBlock | ErrorKind::TimedOut
        ));
    }

    #[test]
    fn file_stream_ignores_line_settings() {
        let dir = std::env::temp_dir().join(format!("a010-stream-file-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("capture.bin");
        std::fs::write(&path, [1u8, 2, 3]).unwrap();

        let stream = SerialStream::from_file(File::open(&path).unwrap());
        assert_eq!(stream.kind(), "file");
        assert!(stream.path().is_none());
        stream.purge().unwrap();
        stream.set_baud_rate(BaudRate::B921600).unwrap();
        stream
            .set_read_timeout(Some(Duration::from_millis(5)))
            .unwrap();

        let mut stream = stream;
        let mut out = Vec::new();
        stream.read_to_end(&mut out).unwrap();
        assert_eq!(out, vec![1, 2, 3]);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn debug_output_names_kind() {
        let (left, _right) = SerialStream::pair().unwrap();
        assert!(format!("{left:?}").contains("loopback"));
    }
}
