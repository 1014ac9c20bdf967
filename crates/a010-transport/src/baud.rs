//! UART speeds understood by the camera.
//!
//! The camera selects its UART speed with `AT+BAUD=<index>`; the index order
//! below is the one the firmware expects.

use std::fmt;

use crate::error::{Result, TransportError};

/// Supported UART baud rates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BaudRate {
    B9600,
    B57600,
    #[default]
    B115200,
    B230400,
    B460800,
    B921600,
    B1000000,
    B2000000,
    B3000000,
}

impl BaudRate {
    /// All rates in camera index order.
    pub const ALL: [BaudRate; 9] = [
        BaudRate::B9600,
        BaudRate::B57600,
        BaudRate::B115200,
        BaudRate::B230400,
        BaudRate::B460800,
        BaudRate::B921600,
        BaudRate::B1000000,
        BaudRate::B2000000,
        BaudRate::B3000000,
    ];

    /// Bits per second.
    pub fn bps(self) -> u32 {
        match self {
            BaudRate::B9600 => 9_600,
            BaudRate::B57600 => 57_600,
            BaudRate::B115200 => 115_200,
            BaudRate::B230400 => 230_400,
            BaudRate::B460800 => 460_800,
            BaudRate::B921600 => 921_600,
            BaudRate::B1000000 => 1_000_000,
            BaudRate::B2000000 => 2_000_000,
            BaudRate::B3000000 => 3_000_000,
        }
    }

    /// Look up a rate by its bits-per-second value.
    pub fn from_bps(bps: u32) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|rate| rate.bps() == bps)
            .ok_or(TransportError::UnsupportedBaudRate(bps))
    }

    /// Index sent with `AT+BAUD=`.
    pub fn command_index(self) -> u8 {
        match self {
            BaudRate::B9600 => 0,
            BaudRate::B57600 => 1,
            BaudRate::B115200 => 2,
            BaudRate::B230400 => 3,
            BaudRate::B460800 => 4,
            BaudRate::B921600 => 5,
            BaudRate::B1000000 => 6,
            BaudRate::B2000000 => 7,
            BaudRate::B3000000 => 8,
        }
    }

    /// termios speed constant for this rate.
    #[cfg(unix)]
    pub(crate) fn speed(self) -> Result<libc::speed_t> {
        let speed = match self {
            BaudRate::B9600 => libc::B9600,
            BaudRate::B57600 => libc::B57600,
            BaudRate::B115200 => libc::B115200,
            BaudRate::B230400 => libc::B230400,
            #[cfg(target_os = "linux")]
            BaudRate::B460800 => libc::B460800,
            #[cfg(target_os = "linux")]
            BaudRate::B921600 => libc::B921600,
            #[cfg(target_os = "linux")]
            BaudRate::B1000000 => libc::B1000000,
            #[cfg(target_os = "linux")]
            BaudRate::B2000000 => libc::B2000000,
            #[cfg(target_os = "linux")]
            BaudRate::B3000000 => libc::B3000000,
            #[cfg(not(target_os = "linux"))]
            other => return Err(TransportError::PlatformBaudRate(other.bps())),
        };
        Ok(speed)
    }
}

impl fmt::Display for BaudRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.bps())
    }
}
