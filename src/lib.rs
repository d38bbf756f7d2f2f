//! Virtual-Cam-Output: feed synthetic video into a V4L2 loopback camera
//!
//! This library converts RGBA frames to YUYV and writes them to a virtual
//! video sink, behind trait-based abstractions so the single-writer session
//! logic can be exercised with mock devices as well as real hardware.

pub mod controller;
pub mod convert;
pub mod device;
pub mod pattern;
pub mod pipeline;
pub mod service;
pub mod session;
pub mod stats;
pub mod traits;
pub mod validation;

#[cfg(test)]
pub mod mock;

pub use controller::CameraController;
pub use device::{V4L2Opener, V4L2Output};
pub use pipeline::{FramePump, PumpStats, Submitted};
pub use service::{CameraService, Response, ServiceConfig};
pub use session::DeviceSession;
pub use stats::{StatsEvent, StatsReporter};
pub use traits::{
    CameraError, DeviceOpener, Format, FourCC, Frame, OutputDevice, PixelFormat, SessionState,
};
