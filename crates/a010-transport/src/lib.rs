//! Serial link transport for the MaixSense-A010 ToF camera.
//!
//! Opens and configures the UART the camera is attached to and hands back a
//! [`SerialStream`]: a plain `Read + Write` byte pipe. Captures on disk and
//! in-process loopback pairs are exposed through the same type.
//!
//! This is the lowest layer of a010. The frame decoder and the camera driver
//! build on top of it.

pub mod baud;
pub mod error;
pub mod stream;

#[cfg(unix)]
pub mod serial;

pub use baud::BaudRate;
pub use error::{Result, TransportError};
pub use stream::SerialStream;

#[cfg(unix)]
pub use serial::{LinkConfig, SerialLink};
