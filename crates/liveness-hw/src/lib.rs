//! liveness-hw — Camera access for the manual capture flow.
//!
//! Provides V4L2-based camera capture, a worker-thread media stream that
//! owns the device, and PNG snapshot encoding.

pub mod camera;
pub mod frame;
pub mod stream;

pub use camera::{Camera, CameraError, DeviceInfo, PixelFormat};
pub use frame::{Frame, Snapshot};
pub use stream::{CameraAccess, MediaStream, V4lCameraAccess, VideoSource};
