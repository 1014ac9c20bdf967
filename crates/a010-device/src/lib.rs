//! Driver for the MaixSense-A010 ToF camera.
//!
//! Builds on the frame decoder to give a running camera connection:
//! - [`Camera`]: reader worker thread plus `AT+` command helpers
//! - [`FrameQueue`]: non-blocking handoff with an overflow policy
//! - [`Dispatcher`]: fan-out of queued frames to registered consumers

pub mod camera;
pub mod command;
pub mod error;
pub mod queue;

pub use camera::{Camera, CameraConfig, DEFAULT_READ_TIMEOUT};
pub use command::{AtCommand, Binning, DisplayFlags, DisplayTarget};
pub use error::{DeviceError, Result};
pub use queue::{
    BoxedConsumer, Dispatcher, FrameConsumer, FrameQueue, OverflowPolicy, DEFAULT_QUEUE_CAPACITY,
};
