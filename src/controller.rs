//! Single-session camera controller.

use std::path::PathBuf;
use std::sync::mpsc::Receiver;

use log::{debug, info, warn};

use crate::convert::rgba_to_yuyv_into;
use crate::session::DeviceSession;
use crate::stats::{StatsEvent, StatsReporter};
use crate::traits::{CameraError, DeviceOpener, Format, Frame, PixelFormat, Result};

/// Drives at most one [`DeviceSession`] at a time.
///
/// The controller is an ordinary value owned by the application; every
/// operation takes `&mut self`, so writes are serialized and a conversion
/// plus OS write always completes before the next frame is accepted.
pub struct CameraController<O: DeviceOpener> {
    opener: O,
    session: Option<DeviceSession<O::Device>>,
    frame_count: u64,
    yuyv: Vec<u8>,
    stats: StatsReporter,
}

impl<O: DeviceOpener> CameraController<O> {
    /// Create an idle controller with the default stats interval.
    pub fn new(opener: O) -> Self {
        Self::with_stats(opener, StatsReporter::default())
    }

    /// Create an idle controller reporting through `stats`.
    pub const fn with_stats(opener: O, stats: StatsReporter) -> Self {
        Self {
            opener,
            session: None,
            frame_count: 0,
            yuyv: Vec::new(),
            stats,
        }
    }

    /// Register a stats observer.
    pub fn subscribe(&mut self) -> Receiver<StatsEvent> {
        self.stats.subscribe()
    }

    /// Open `device_path` and configure it for `width` x `height` YUYV.
    ///
    /// On failure the partially opened session is released and the
    /// controller stays idle.
    pub fn start<P: Into<PathBuf>>(&mut self, device_path: P, width: u32, height: u32) -> Result<()> {
        if self.session.is_some() {
            return Err(CameraError::AlreadyRunning);
        }

        let mut session = DeviceSession::new(device_path);
        let configured = session
            .open(&self.opener)
            .and_then(|()| session.set_format(width, height));

        let format = match configured {
            Ok(format) => format,
            Err(err) => {
                if let Err(close_err) = session.close() {
                    warn!(
                        "Failed to release {} after start error: {close_err}",
                        session.path().display()
                    );
                }
                return Err(err);
            }
        };

        info!(
            "Camera started on {} at {}x{}",
            session.path().display(),
            format.width,
            format.height
        );

        self.yuyv = vec![0; format.frame_len()];
        self.frame_count = 0;
        self.session = Some(session);
        Ok(())
    }

    /// Convert and write an RGBA frame.
    pub fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        let format = self.active_format()?;

        if frame.pixel_format() != PixelFormat::Rgba32 {
            return Err(CameraError::InvalidFormat(format!(
                "expected RGBA32 frame, got {:?}",
                frame.pixel_format()
            )));
        }

        if frame.width() != format.width || frame.height() != format.height {
            return Err(CameraError::SizeMismatch {
                expected: PixelFormat::Rgba32
                    .frame_len(format.width, format.height)
                    .unwrap_or(usize::MAX),
                actual: frame.data().len(),
            });
        }

        self.write_rgba(frame.data())
    }

    /// Convert and write raw RGBA bytes at the session's geometry.
    ///
    /// `frame_count` only advances when the device accepted the whole frame.
    pub fn write_rgba(&mut self, rgba: &[u8]) -> Result<()> {
        let format = self.active_format()?;
        rgba_to_yuyv_into(rgba, format.width, format.height, &mut self.yuyv)?;

        let Some(session) = self.session.as_mut() else {
            return Err(CameraError::NotRunning);
        };

        match session.write_frame(&self.yuyv) {
            Ok(_) => {
                self.frame_count += 1;
                if let Some(event) = self.stats.record(self.frame_count) {
                    debug!("Stats: {} frames written", event.frame_count);
                }
                Ok(())
            }
            Err(err) => {
                if !session.is_open() {
                    warn!("Session ended by write failure, camera stopped: {err}");
                    self.session = None;
                }
                Err(err)
            }
        }
    }

    /// Close the active session, if any. Always leaves the controller idle.
    ///
    /// Never fails: close errors are logged, and stopping an idle
    /// controller is a no-op.
    pub fn stop(&mut self) -> Result<()> {
        let Some(mut session) = self.session.take() else {
            return Ok(());
        };

        if let Err(err) = session.close() {
            warn!("Error closing {}: {err}", session.path().display());
        }
        info!("Camera stopped after {} frames", self.frame_count);
        Ok(())
    }

    /// Whether a session is active.
    pub const fn is_running(&self) -> bool {
        self.session.is_some()
    }

    /// Frames successfully written in the current (or last) session.
    pub const fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Geometry of the active session.
    pub fn format(&self) -> Option<Format> {
        self.session.as_ref().and_then(|s| s.format().copied())
    }

    fn active_format(&self) -> Result<Format> {
        let session = self.session.as_ref().ok_or(CameraError::NotRunning)?;
        session.format().copied().ok_or(CameraError::NotConfigured)
    }
}
