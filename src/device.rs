//! V4L2 output implementation using the v4l crate.
//!
//! Targets `v4l2loopback` sinks:
//!
//! ```bash
//! sudo modprobe v4l2loopback devices=1 video_nr=10 card_label="Virtual Camera" exclusive_caps=1
//! ```

use std::fs::{File, OpenOptions, TryLockError};
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use v4l::format::FieldOrder;
use v4l::video::output::Parameters;
use v4l::video::Output;
use v4l::Device;

use crate::traits::{CameraError, DeviceOpener, Format, FourCC, OutputDevice, PixelFormat, Result};

/// Frame rate advertised to consumers.
pub const DEFAULT_FPS: u32 = 30;

/// Opens [`V4L2Output`] handles.
#[derive(Debug, Clone, Copy, Default)]
pub struct V4L2Opener;

impl DeviceOpener for V4L2Opener {
    type Device = V4L2Output;

    fn open(&self, path: &Path) -> Result<V4L2Output> {
        V4L2Output::open(path)
    }
}

/// Exclusive writer handle on a V4L2 output node.
///
/// Frames go through a plain file handle with `write(2)`; format ioctls go
/// through a v4l `Device` on the same node. The file handle carries an
/// exclusive advisory lock so a second writer, in this or another process,
/// is refused with `DeviceBusy`.
pub struct V4L2Output {
    path: PathBuf,
    file: File,
    device: Device,
}

impl V4L2Output {
    /// Open and lock the output node at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(CameraError::DeviceNotFound(path.display().to_string()));
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|err| open_error(path, &err))?;

        match file.try_lock() {
            Ok(()) => {}
            Err(TryLockError::WouldBlock) => {
                return Err(CameraError::DeviceBusy(path.display().to_string()));
            }
            Err(TryLockError::Error(err)) => return Err(open_error(path, &err)),
        }

        let device = Device::with_path(path).map_err(|err| open_error(path, &err))?;

        match device.query_caps() {
            Ok(caps) => {
                let can_output = caps
                    .capabilities
                    .contains(v4l::capability::Flags::VIDEO_OUTPUT);
                info!(
                    "Opened {} ({}, driver {})",
                    path.display(),
                    caps.card,
                    caps.driver
                );
                if !can_output {
                    warn!(
                        "{} does not advertise video output; writes may be rejected",
                        path.display()
                    );
                }
            }
            Err(err) => warn!("Could not query {} capabilities: {err}", path.display()),
        }

        Ok(Self {
            path: path.to_path_buf(),
            file,
            device,
        })
    }

    /// Device node path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl OutputDevice for V4L2Output {
    fn set_format(&mut self, format: &Format) -> Result<Format> {
        let mut fmt = v4l::Format::new(format.width, format.height, format.fourcc().into());
        fmt.field_order = FieldOrder::Progressive;
        fmt.stride = format.stride;
        fmt.size = format.size;

        let actual = Output::set_format(&self.device, &fmt)
            .map_err(|err| CameraError::InvalidFormat(format!("VIDIOC_S_FMT failed: {err}")))?;

        debug!(
            "Set V4L2 format on {}: {}x{} {}",
            self.path.display(),
            actual.width,
            actual.height,
            actual.fourcc
        );

        // Frame interval is advisory for loopback consumers
        if let Err(err) = Output::set_params(&self.device, &Parameters::with_fps(DEFAULT_FPS)) {
            warn!("Could not set {DEFAULT_FPS} fps on {}: {err}", self.path.display());
        }

        Ok(Format {
            width: actual.width,
            height: actual.height,
            pixel_format: PixelFormat::try_from(FourCC::from(actual.fourcc))?,
            stride: actual.stride,
            size: actual.size,
        })
    }

    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.file.write(data)
    }

    fn close(self) -> Result<()> {
        self.file.unlock().map_err(CameraError::Io)
    }
}

fn open_error(path: &Path, err: &io::Error) -> CameraError {
    match err.kind() {
        ErrorKind::NotFound => CameraError::DeviceNotFound(path.display().to_string()),
        ErrorKind::ResourceBusy => CameraError::DeviceBusy(path.display().to_string()),
        ErrorKind::PermissionDenied => CameraError::DeviceOpenFailed(format!(
            "permission denied for {}, try adding user to 'video' group",
            path.display()
        )),
        _ => CameraError::DeviceOpenFailed(format!("{}: {err}", path.display())),
    }
}
