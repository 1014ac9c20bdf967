use std::fs::{File, OpenOptions};
use std::os::fd::AsRawFd;
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;
use std::time::Duration;

use tracing::{debug, info};

use crate::baud::BaudRate;
use crate::error::{Result, TransportError};
use crate::stream::SerialStream;

/// Line settings applied when a link is opened.
#[derive(Debug, Clone)]
pub struct LinkConfig {
    /// UART speed. Default: 115200, the camera's factory setting.
    pub baud_rate: BaudRate,
    /// Read timeout. `None` blocks until at least one byte arrives.
    pub read_timeout: Option<Duration>,
    /// Write timeout (loopback links only).
    pub write_timeout: Option<Duration>,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            baud_rate: BaudRate::default(),
            read_timeout: Some(Duration::from_millis(100)),
            write_timeout: None,
        }
    }
}

/// Serial tty transport.
///
/// Opens the device node in raw mode with 8 data bits, no parity, one stop
/// bit and no flow control, which is what the camera's UART expects.
pub struct SerialLink;

impl SerialLink {
    /// Open and configure a serial device.
    pub fn open(path: impl AsRef<Path>, config: &LinkConfig) -> Result<SerialStream> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_NOCTTY)
            .open(path)
            .map_err(|source| TransportError::Open {
                path: path.to_path_buf(),
                source,
            })?;

        configure_raw(&file, path, config)?;
        info!(?path, baud = config.baud_rate.bps(), "serial link open");

        Ok(SerialStream::from_tty(file, path.to_path_buf()))
    }

    /// Transport name for diagnostics.
    pub fn transport_name() -> &'static str {
        "serial-tty"
    }
}

fn configure_raw(file: &File, path: &Path, config: &LinkConfig) -> Result<()> {
    let speed = config.baud_rate.speed()?;
    let mut tio = get_attr(file, path)?;

    // SAFETY: `tio` is a valid, initialized termios obtained from tcgetattr.
    unsafe { libc::cfmakeraw(&mut tio) };
    tio.c_cflag |= libc::CLOCAL | libc::CREAD;
    tio.c_cflag &= !(libc::CSTOPB | libc::PARENB | libc::CSIZE);
    tio.c_cflag |= libc::CS8;
    #[cfg(target_os = "linux")]
    {
        tio.c_cflag &= !libc::CRTSCTS;
    }
    set_timeout_fields(&mut tio, config.read_timeout);
    set_speed_fields(&mut tio, path, speed)?;

    set_attr(file, path, &tio)
}

pub(crate) fn apply_read_timeout(file: &File, path: &Path, timeout: Option<Duration>) -> Result<()> {
    let mut tio = get_attr(file, path)?;
    set_timeout_fields(&mut tio, timeout);
    set_attr(file, path, &tio)
}

pub(crate) fn apply_baud_rate(file: &File, path: &Path, rate: BaudRate) -> Result<()> {
    let speed = rate.speed()?;
    let mut tio = get_attr(file, path)?;
    set_speed_fields(&mut tio, path, speed)?;
    set_attr(file, path, &tio)?;
    debug!(?path, baud = rate.bps(), "line speed changed");
    Ok(())
}

/// Block until queued output has been transmitted.
pub(crate) fn drain(file: &File) -> std::io::Result<()> {
    // SAFETY: the descriptor is open for the lifetime of `file`.
    if unsafe { libc::tcdrain(file.as_raw_fd()) } != 0 {
        return Err(std::io::Error::last_os_error());
    }
    Ok(())
}

pub(crate) fn purge(file: &File, path: &Path) -> Result<()> {
    // SAFETY: the descriptor is open for the lifetime of `file`.
    let rc = unsafe { libc::tcflush(file.as_raw_fd(), libc::TCIOFLUSH) };
    if rc != 0 {
        return Err(configure_error(path));
    }
    debug!(?path, "purged link buffers");
    Ok(())
}

/// VTIME counts tenths of a second in a `cc_t`, so 1..=255.
fn vtime_for(timeout: Duration) -> libc::cc_t {
    let tenths = timeout.as_millis().div_ceil(100);
    tenths.clamp(1, 255) as libc::cc_t
}

fn set_timeout_fields(tio: &mut libc::termios, timeout: Option<Duration>) {
    match timeout {
        Some(timeout) => {
            tio.c_cc[libc::VMIN] = 0;
            tio.c_cc[libc::VTIME] = vtime_for(timeout);
        }
        None => {
            tio.c_cc[libc::VMIN] = 1;
            tio.c_cc[libc::VTIME] = 0;
        }
    }
}

fn set_speed_fields(tio: &mut libc::termios, path: &Path, speed: libc::speed_t) -> Result<()> {
    // SAFETY: `tio` is a valid termios struct owned by the caller.
    let rc = unsafe { libc::cfsetispeed(tio, speed) | libc::cfsetospeed(tio, speed) };
    if rc != 0 {
        return Err(configure_error(path));
    }
    Ok(())
}

fn get_attr(file: &File, path: &Path) -> Result<libc::termios> {
    // SAFETY: termios is a plain C struct; all-zero is a valid bit pattern and
    // tcgetattr overwrites it on success.
    let mut tio: libc::termios = unsafe { std::mem::zeroed() };
    // SAFETY: the descriptor is open and `tio` is a valid writable pointer.
    let rc = unsafe { libc::tcgetattr(file.as_raw_fd(), &mut tio) };
    if rc != 0 {
        return Err(configure_error(path));
    }
    Ok(tio)
}

fn set_attr(file: &File, path: &Path, tio: &libc::termios) -> Result<()> {
    // SAFETY: the descriptor is open and `tio` points to an initialized termios.
    let rc = unsafe { libc::tcsetattr(file.as_raw_fd(), libc::TCSANOW, tio) };
    if rc != 0 {
        return Err(configure_error(path));
    }
    Ok(())
}

fn configure_error(path: &Path) -> TransportError {
    TransportError::Configure {
        path: path.to_path_buf(),
        source: std::io::Error::last_os_error(),
    }
}
