//! Device session: one exclusive handle on a virtual video sink.
//!
//! ```text
//! Closed --open--> Open --set_format--> Configured --write_frame--> Streaming
//!    ^                                                                  |
//!    +------------------- close / write failure ------------------------+
//! ```

use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use crate::traits::{CameraError, DeviceOpener, Format, OutputDevice, Result, SessionState};

/// A session on a single device node.
///
/// Frames are written whole: each `write_frame` hands exactly one frame to
/// the OS in a single write, so a session is never left with a partial
/// frame pending.
pub struct DeviceSession<D: OutputDevice> {
    path: PathBuf,
    state: SessionState,
    format: Option<Format>,
    device: Option<D>,
    frames_written: u64,
}

impl<D: OutputDevice> DeviceSession<D> {
    /// Create a closed session for `path`. Nothing is opened yet.
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            state: SessionState::Closed,
            format: None,
            device: None,
            frames_written: 0,
        }
    }

    /// Acquire the device handle.
    pub fn open<O>(&mut self, opener: &O) -> Result<()>
    where
        O: DeviceOpener<Device = D>,
    {
        if self.state != SessionState::Closed {
            return Err(CameraError::InvalidState {
                operation: "open",
                state: self.state,
            });
        }

        info!("Opening output device {}", self.path.display());
        let device = opener.open(&self.path)?;

        self.device = Some(device);
        self.state = SessionState::Open;
        self.frames_written = 0;
        Ok(())
    }

    /// Negotiate YUYV geometry with the sink.
    ///
    /// If the driver refuses or adjusts the geometry, any earlier format is
    /// no longer in effect: the session drops back to `Open` and must be
    /// configured again before writing.
    pub fn set_format(&mut self, width: u32, height: u32) -> Result<Format> {
        let device = match (self.state, self.device.as_mut()) {
            (SessionState::Open | SessionState::Configured, Some(device)) => device,
            (state, _) => {
                return Err(CameraError::InvalidState {
                    operation: "set format",
                    state,
                })
            }
        };

        let requested = Format::yuyv(width, height)?;
        let negotiated = device.set_format(&requested);

        let actual = match negotiated {
            Ok(actual) => actual,
            Err(err) => {
                self.unconfigure();
                return Err(err);
            }
        };

        if actual.width != requested.width
            || actual.height != requested.height
            || actual.pixel_format != requested.pixel_format
        {
            self.unconfigure();
            return Err(CameraError::InvalidFormat(format!(
                "driver adjusted {}x{} {:?} to {}x{} {:?}",
                requested.width,
                requested.height,
                requested.pixel_format,
                actual.width,
                actual.height,
                actual.pixel_format
            )));
        }

        debug!(
            "Configured {}: {}x{} YUYV, {} bytes/frame",
            self.path.display(),
            requested.width,
            requested.height,
            requested.size
        );

        self.format = Some(requested);
        self.state = SessionState::Configured;
        Ok(requested)
    }

    fn unconfigure(&mut self) {
        self.format = None;
        self.state = SessionState::Open;
    }

    /// Write one YUYV frame. Returns the number of bytes written.
    ///
    /// A failed or short write closes the session.
    pub fn write_frame(&mut self, data: &[u8]) -> Result<usize> {
        let format = match (self.state, self.format) {
            (SessionState::Configured | SessionState::Streaming, Some(format)) => format,
            _ => return Err(CameraError::NotConfigured),
        };

        if data.len() != format.frame_len() {
            return Err(CameraError::SizeMismatch {
                expected: format.frame_len(),
                actual: data.len(),
            });
        }

        let Some(device) = self.device.as_mut() else {
            return Err(CameraError::NotConfigured);
        };

        let failure = match device.write(data) {
            Ok(written) if written == data.len() => {
                self.state = SessionState::Streaming;
                self.frames_written += 1;
                return Ok(written);
            }
            Ok(written) => format!("short write: {written} of {} bytes", data.len()),
            Err(err) => err.to_string(),
        };

        warn!(
            "Write to {} failed after {} frames: {failure}",
            self.path.display(),
            self.frames_written
        );
        if let Err(err) = self.close() {
            warn!("Failed to release {}: {err}", self.path.display());
        }
        Err(CameraError::WriteFailed(failure))
    }

    /// Release the device handle. Closing a closed session does nothing.
    pub fn close(&mut self) -> Result<()> {
        self.state = SessionState::Closed;
        self.format = None;

        let Some(device) = self.device.take() else {
            return Ok(());
        };

        info!(
            "Closing output device {} (wrote {} frames)",
            self.path.display(),
            self.frames_written
        );
        device.close()
    }

    /// Current lifecycle state.
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Negotiated format, if configured.
    pub const fn format(&self) -> Option<&Format> {
        self.format.as_ref()
    }

    /// Device node path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether a device handle is held.
    pub const fn is_open(&self) -> bool {
        self.device.is_some()
    }

    /// Frames written since the last open.
    pub const fn frames_written(&self) -> u64 {
        self.frames_written
    }
}

impl<D: OutputDevice> Drop for DeviceSession<D> {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            warn!("Failed to release {}: {err}", self.path.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockDevice, MockOpener};

    const PATH: &str = "/dev/video10";

    fn configured(opener: &MockOpener) -> DeviceSession<MockDevice> {
        let mut session = DeviceSession::new(PATH);
        session.open(opener).expect("open should succeed");
        session.set_format(4, 2).expect("set_format should succeed");
        session
    }

    #[test]
    fn test_state_transitions() {
        let opener = MockOpener::with_device(PATH);
        let mut session = DeviceSession::new(PATH);
        assert_eq!(session.state(), SessionState::Closed);

        session.open(&opener).expect("open should succeed");
        assert_eq!(session.state(), SessionState::Open);

        session.set_format(4, 2).expect("set_format should succeed");
        assert_eq!(session.state(), SessionState::Configured);

        session.write_frame(&[16; 16]).expect("write should succeed");
        assert_eq!(session.state(), SessionState::Streaming);
        assert_eq!(session.frames_written(), 1);

        session.close().expect("close should succeed");
        assert_eq!(session.state(), SessionState::Closed);
        assert!(!opener.is_held(PATH));
    }

    #[test]
    fn test_open_missing_device() {
        let opener = MockOpener::new();
        let mut session: DeviceSession<MockDevice> = DeviceSession::new(PATH);
        assert!(matches!(
            session.open(&opener),
            Err(CameraError::DeviceNotFound(_))
        ));
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[test]
    fn test_open_busy_device() {
        let opener = MockOpener::with_device(PATH);
        let _first = configured(&opener);

        let mut second = DeviceSession::new(PATH);
        assert!(matches!(
            second.open(&opener),
            Err(CameraError::DeviceBusy(_))
        ));
    }

    #[test]
    fn test_open_twice_is_invalid() {
        let opener = MockOpener::with_device(PATH);
        let mut session = configured(&opener);
        assert!(matches!(
            session.open(&opener),
            Err(CameraError::InvalidState {
                operation: "open",
                ..
            })
        ));
    }

    #[test]
    fn test_set_format_rejects_bad_geometry() {
        let opener = MockOpener::with_device(PATH);
        let mut session = DeviceSession::new(PATH);
        session.open(&opener).expect("open should succeed");

        assert!(matches!(session.set_format(0, 2), Err(CameraError::InvalidFormat(_))));
        assert!(matches!(session.set_format(3, 2), Err(CameraError::InvalidFormat(_))));
        assert_eq!(session.state(), SessionState::Open);
    }

    #[test]
    fn test_set_format_requires_open_session() {
        let mut session: DeviceSession<MockDevice> = DeviceSession::new(PATH);
        assert!(matches!(
            session.set_format(4, 2),
            Err(CameraError::InvalidState { .. })
        ));
    }

    #[test]
    fn test_set_format_rejected_while_streaming() {
        let opener = MockOpener::with_device(PATH);
        let mut session = configured(&opener);
        session.write_frame(&[16; 16]).expect("write should succeed");

        assert!(matches!(
            session.set_format(8, 2),
            Err(CameraError::InvalidState {
                state: SessionState::Streaming,
                ..
            })
        ));
    }

    #[test]
    fn test_driver_adjusted_format_is_rejected() {
        let opener = MockOpener::with_device(PATH).with_max_width(2);
        let mut session = DeviceSession::new(PATH);
        session.open(&opener).expect("open should succeed");

        assert!(matches!(session.set_format(4, 2), Err(CameraError::InvalidFormat(_))));
    }

    #[test]
    fn test_adjusted_reconfigure_clears_old_format() {
        let opener = MockOpener::with_device(PATH).with_max_width(4);
        let mut session = configured(&opener);
        assert_eq!(session.state(), SessionState::Configured);

        assert!(matches!(session.set_format(8, 2), Err(CameraError::InvalidFormat(_))));
        assert_eq!(session.state(), SessionState::Open);
        assert!(session.format().is_none());
        assert!(matches!(session.write_frame(&[16; 16]), Err(CameraError::NotConfigured)));

        session.set_format(4, 2).expect("set_format should succeed");
        session.write_frame(&[16; 16]).expect("write should succeed");
    }

    #[test]
    fn test_invalid_geometry_keeps_configuration() {
        let opener = MockOpener::with_device(PATH);
        let mut session = configured(&opener);

        assert!(matches!(session.set_format(3, 2), Err(CameraError::InvalidFormat(_))));
        assert_eq!(session.state(), SessionState::Configured);
        assert_eq!(session.format().map(|f| f.width), Some(4));
    }

    #[test]
    fn test_write_before_format() {
        let opener = MockOpener::with_device(PATH);
        let mut session = DeviceSession::new(PATH);
        assert!(matches!(session.write_frame(&[0; 16]), Err(CameraError::NotConfigured)));

        session.open(&opener).expect("open should succeed");
        assert!(matches!(session.write_frame(&[0; 16]), Err(CameraError::NotConfigured)));
    }

    #[test]
    fn test_write_size_mismatch_keeps_session() {
        let opener = MockOpener::with_device(PATH);
        let mut session = configured(&opener);

        assert!(matches!(
            session.write_frame(&[0; 15]),
            Err(CameraError::SizeMismatch {
                expected: 16,
                actual: 15
            })
        ));
        assert_eq!(session.state(), SessionState::Configured);
        assert!(opener.written_frames().is_empty());
    }

    #[test]
    fn test_short_write_closes_session() {
        let opener = MockOpener::with_device(PATH);
        let mut session = configured(&opener);
        opener.set_short_writes(true);

        assert!(matches!(
            session.write_frame(&[16; 16]),
            Err(CameraError::WriteFailed(_))
        ));
        assert_eq!(session.state(), SessionState::Closed);
        assert!(!session.is_open());
        assert!(!opener.is_held(PATH));
    }

    #[test]
    fn test_write_error_closes_session() {
        let opener = MockOpener::with_device(PATH);
        let mut session = configured(&opener);
        opener.set_fail_writes(true);

        assert!(matches!(
            session.write_frame(&[16; 16]),
            Err(CameraError::WriteFailed(_))
        ));
        assert!(matches!(session.write_frame(&[16; 16]), Err(CameraError::NotConfigured)));
    }

    #[test]
    fn test_close_is_idempotent() {
        let opener = MockOpener::with_device(PATH);
        let mut session = configured(&opener);

        session.close().expect("first close should succeed");
        session.close().expect("second close should succeed");

        let mut never_opened: DeviceSession<MockDevice> = DeviceSession::new(PATH);
        never_opened.close().expect("closing a closed session should succeed");
    }

    #[test]
    fn test_reopen_after_close() {
        let opener = MockOpener::with_device(PATH);
        let mut session = configured(&opener);
        session.close().expect("close should succeed");

        session.open(&opener).expect("reopen should succeed");
        assert!(session.format().is_none());
        assert_eq!(session.state(), SessionState::Open);
    }

    #[test]
    fn test_drop_releases_device() {
        let opener = MockOpener::with_device(PATH);
        {
            let _session = configured(&opener);
            assert!(opener.is_held(PATH));
        }
        assert!(!opener.is_held(PATH));
    }
}
