//! emora-hw — Hardware abstraction for webcam capture.
//!
//! Provides V4L2-based camera access, the RGB frame type with pixel
//! conversions, and the single-person privacy mask.

pub mod camera;
pub mod frame;
pub mod privacy;

pub use camera::{Camera, CameraError, PixelFormat};
pub use frame::Frame;
