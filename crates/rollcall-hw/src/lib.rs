//! rollcall-hw — Camera capture for the live recognition loop.
//!
//! Provides V4L2-based webcam access producing interleaved RGB24 frames.

pub mod camera;
pub mod frame;

pub use camera::{Camera, CameraError, PixelFormat};
pub use frame::Frame;
