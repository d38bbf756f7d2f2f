//! Mock device implementation for testing without a loopback module.

use crate::traits::{CameraError, DeviceOpener, Format, OutputDevice, Result};
use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

/// Shared state between a [`MockOpener`] and the devices it hands out.
#[derive(Default)]
struct MockState {
    existing: HashSet<PathBuf>,
    held: HashSet<PathBuf>,
    written: Vec<Vec<u8>>,
    max_width: Option<u32>,
    short_writes: bool,
    fail_writes: bool,
    fail_close: bool,
}

/// In-memory stand-in for the OS layer.
///
/// Cloning shares state, so a test can keep one clone to inspect what a
/// controller or session did with the other.
#[derive(Clone, Default)]
pub struct MockOpener {
    state: Arc<Mutex<MockState>>,
}

impl MockOpener {
    /// Create an opener with no device nodes.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an opener with a single device node at `path`.
    #[must_use]
    pub fn with_device(path: &str) -> Self {
        let opener = Self::new();
        opener.lock().existing.insert(PathBuf::from(path));
        opener
    }

    /// Make the driver clamp widths to `max_width`.
    #[must_use]
    pub fn with_max_width(self, max_width: u32) -> Self {
        self.lock().max_width = Some(max_width);
        self
    }

    /// Accept only part of each frame from now on.
    pub fn set_short_writes(&self, enabled: bool) {
        self.lock().short_writes = enabled;
    }

    /// Fail every write from now on.
    pub fn set_fail_writes(&self, enabled: bool) {
        self.lock().fail_writes = enabled;
    }

    /// Fail handle release from now on.
    pub fn set_fail_close(&self, enabled: bool) {
        self.lock().fail_close = enabled;
    }

    /// Whether a device currently holds `path`.
    #[must_use]
    pub fn is_held(&self, path: &str) -> bool {
        self.lock().held.contains(Path::new(path))
    }

    /// Every frame accepted so far, in order.
    #[must_use]
    pub fn written_frames(&self) -> Vec<Vec<u8>> {
        self.lock().written.clone()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl DeviceOpener for MockOpener {
    type Device = MockDevice;

    fn open(&self, path: &Path) -> Result<MockDevice> {
        let mut state = self.lock();
        if !state.existing.contains(path) {
            return Err(CameraError::DeviceNotFound(path.display().to_string()));
        }
        if !state.held.insert(path.to_path_buf()) {
            return Err(CameraError::DeviceBusy(path.display().to_string()));
        }

        Ok(MockDevice {
            path: path.to_path_buf(),
            state: Arc::clone(&self.state),
        })
    }
}

/// Mock handle recording everything written to it.
pub struct MockDevice {
    path: PathBuf,
    state: Arc<Mutex<MockState>>,
}

impl MockDevice {
    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl OutputDevice for MockDevice {
    fn set_format(&mut self, format: &Format) -> Result<Format> {
        let mut actual = *format;
        if let Some(max_width) = self.lock().max_width {
            actual.width = actual.width.min(max_width);
        }
        Ok(actual)
    }

    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        let mut state = self.lock();
        if state.fail_writes {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "consumer went away"));
        }

        let accepted = if state.short_writes {
            data.len() / 2
        } else {
            data.len()
        };
        state.written.push(data.get(..accepted).unwrap_or_default().to_vec());
        Ok(accepted)
    }

    fn close(self) -> Result<()> {
        if self.lock().fail_close {
            return Err(CameraError::Io(io::Error::other("release failed")));
        }
        Ok(())
    }
}

impl Drop for MockDevice {
    fn drop(&mut self) {
        let path = self.path.clone();
        self.lock().held.remove(&path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_opener_tracks_holders() {
        let opener = MockOpener::with_device("/dev/video10");
        let device = opener
            .open(Path::new("/dev/video10"))
            .expect("open should succeed");
        assert!(opener.is_held("/dev/video10"));

        assert!(matches!(
            opener.open(Path::new("/dev/video10")),
            Err(CameraError::DeviceBusy(_))
        ));

        drop(device);
        assert!(!opener.is_held("/dev/video10"));
    }

    #[test]
    fn test_mock_device_records_writes() {
        let opener = MockOpener::with_device("/dev/video10");
        let mut device = opener
            .open(Path::new("/dev/video10"))
            .expect("open should succeed");

        assert_eq!(device.write(&[1, 2, 3, 4]).expect("write"), 4);
        opener.set_short_writes(true);
        assert_eq!(device.write(&[5, 6, 7, 8]).expect("write"), 2);

        assert_eq!(opener.written_frames(), vec![vec![1, 2, 3, 4], vec![5, 6]]);
    }
}
