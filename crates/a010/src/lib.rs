//! Host-side support for the Sipeed MaixSense-A010 ToF depth camera.
//!
//! The camera streams depth images over a UART in a checksummed frame format
//! with no flow control. This crate ties the layers together:
//!
//! - [`transport`]: serial link setup (termios, baud rates, loopback pairs)
//! - [`frame`]: resynchronizing frame decoder, blocking reader/writer, and a
//!   `tokio-util` codec behind the `async` feature
//! - [`device`]: camera driver with `AT+` commands, frame queues and a
//!   dispatcher (behind the `device` feature, on by default)
//!
//! ```no_run
//! # #[cfg(all(unix, feature = "device"))]
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use a010::device::{Binning, Camera, CameraConfig};
//!
//! let camera = Camera::open("/dev/ttyUSB0", CameraConfig::default())?;
//! let queue = camera.new_queue();
//! camera.connect_queue(queue.clone());
//! camera.set_binning(Binning::Quarter)?;
//!
//! if let Some(frame) = queue.recv() {
//!     println!("frame {} ({}x{})", frame.frame_id, frame.rows, frame.cols);
//! }
//! camera.terminate()?;
//! # Ok(())
//! # }
//! # #[cfg(not(all(unix, feature = "device")))]
//! # fn main() {}
//! ```

/// Re-export transport types.
pub mod transport {
    pub use a010_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use a010_frame::*;
}

/// Re-export camera driver types (requires `device` feature).
#[cfg(feature = "device")]
pub mod device {
    pub use a010_device::*;
}
