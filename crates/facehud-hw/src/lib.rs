//! facehud-hw — webcam capture.

pub mod camera;
pub mod frame;

pub use camera::{Camera, CameraError, DeviceInfo};
pub use frame::RgbFrame;

/// The capture stream type handed out by [`Camera::start_stream`].
pub use v4l::prelude::MmapStream;
