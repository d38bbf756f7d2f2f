//! Core traits and types for the virtual camera output pipeline.

use std::io;
use std::path::Path;

use crate::convert::yuv_to_rgb;

/// Pixel format code (e.g., YUYV, AB24).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FourCC(pub [u8; 4]);

impl FourCC {
    /// Create a new `FourCC` from a 4-byte array.
    #[must_use]
    pub const fn new(code: &[u8; 4]) -> Self {
        Self(*code)
    }

    /// YUYV pixel format (4:2:2 packed).
    pub const YUYV: Self = Self::new(b"YUYV");
    /// 32-bit RGBA in memory byte order, as V4L2 names it.
    pub const AB24: Self = Self::new(b"AB24");
}

impl From<v4l::FourCC> for FourCC {
    fn from(fourcc: v4l::FourCC) -> Self {
        Self(fourcc.repr)
    }
}

impl From<FourCC> for v4l::FourCC {
    fn from(fourcc: FourCC) -> Self {
        Self::new(&fourcc.0)
    }
}

/// Pixel layouts understood by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// Packed 8-bit R, G, B, A.
    Rgba32,
    /// Packed `[Y0 U Y1 V]`, the only on-wire format.
    Yuyv422,
}

impl PixelFormat {
    /// Bytes per pixel (averaged over a YUYV pair).
    #[must_use]
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Rgba32 => 4,
            Self::Yuyv422 => 2,
        }
    }

    /// V4L2 code for this layout.
    #[must_use]
    pub const fn fourcc(self) -> FourCC {
        match self {
            Self::Rgba32 => FourCC::AB24,
            Self::Yuyv422 => FourCC::YUYV,
        }
    }

    /// Exact buffer length for a `width` x `height` image, `None` on overflow.
    #[must_use]
    pub fn frame_len(self, width: u32, height: u32) -> Option<usize> {
        let width = usize::try_from(width).ok()?;
        let height = usize::try_from(height).ok()?;
        width
            .checked_mul(height)?
            .checked_mul(self.bytes_per_pixel())
    }
}

impl TryFrom<FourCC> for PixelFormat {
    type Error = CameraError;

    fn try_from(fourcc: FourCC) -> Result<Self> {
        match fourcc {
            FourCC::YUYV => Ok(Self::Yuyv422),
            FourCC::AB24 => Ok(Self::Rgba32),
            other => Err(CameraError::InvalidFormat(format!(
                "unsupported fourcc {}",
                String::from_utf8_lossy(&other.0)
            ))),
        }
    }
}

/// Video format specification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Format {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Pixel layout.
    pub pixel_format: PixelFormat,
    /// Bytes per line (stride).
    pub stride: u32,
    /// Total frame size in bytes.
    pub size: u32,
}

impl Format {
    /// Create a packed format, rejecting empty or overflowing geometry.
    pub fn new(width: u32, height: u32, pixel_format: PixelFormat) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(CameraError::InvalidFormat(format!(
                "dimensions must be positive, got {width}x{height}"
            )));
        }

        #[allow(clippy::cast_possible_truncation)]
        let bpp = pixel_format.bytes_per_pixel() as u32;
        let stride = width.checked_mul(bpp);
        let size = stride.and_then(|stride| stride.checked_mul(height));

        match (stride, size) {
            (Some(stride), Some(size)) => Ok(Self {
                width,
                height,
                pixel_format,
                stride,
                size,
            }),
            _ => Err(CameraError::InvalidFormat(format!(
                "{width}x{height} frame size overflows"
            ))),
        }
    }

    /// Create the on-wire YUYV format. YUYV packs pixel pairs, so the width must be even.
    pub fn yuyv(width: u32, height: u32) -> Result<Self> {
        if width % 2 != 0 {
            return Err(CameraError::InvalidFormat(format!(
                "YUYV width must be even, got {width}"
            )));
        }
        Self::new(width, height, PixelFormat::Yuyv422)
    }

    /// V4L2 code for the pixel layout.
    #[must_use]
    pub const fn fourcc(&self) -> FourCC {
        self.pixel_format.fourcc()
    }

    /// Frame size as a buffer length.
    #[must_use]
    pub const fn frame_len(&self) -> usize {
        self.size as usize
    }
}

/// A video frame with its geometry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    width: u32,
    height: u32,
    pixel_format: PixelFormat,
    data: Vec<u8>,
}

impl Frame {
    /// Wrap `data` as a frame, checking its length against the geometry.
    pub fn new(width: u32, height: u32, pixel_format: PixelFormat, data: Vec<u8>) -> Result<Self> {
        let expected = pixel_format
            .frame_len(width, height)
            .ok_or_else(|| CameraError::InvalidFormat(format!("{width}x{height} overflows")))?;

        if data.len() != expected {
            return Err(CameraError::SizeMismatch {
                expected,
                actual: data.len(),
            });
        }

        Ok(Self {
            width,
            height,
            pixel_format,
            data,
        })
    }

    /// Wrap an RGBA32 buffer.
    pub fn rgba(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        Self::new(width, height, PixelFormat::Rgba32, data)
    }

    /// Wrap a YUYV422 buffer.
    pub fn yuyv(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        Self::new(width, height, PixelFormat::Yuyv422, data)
    }

    /// Frame width in pixels.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Frame height in pixels.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Pixel layout of `data`.
    #[must_use]
    pub const fn pixel_format(&self) -> PixelFormat {
        self.pixel_format
    }

    /// Raw frame bytes.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Take the raw frame bytes.
    #[must_use]
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// Get RGB values for a pixel at the specified coordinates.
    ///
    /// # Arguments
    ///
    /// * `x` - X coordinate (0-based)
    /// * `y` - Y coordinate (0-based)
    ///
    /// # Returns
    ///
    /// Returns `Some((r, g, b))` if the coordinates are valid, `None` otherwise.
    ///
    /// # Notes
    ///
    /// For YUYV frames, odd x coordinates use the second luma sample of the pair
    /// together with the shared U/V values. Alpha is dropped for RGBA frames.
    #[must_use]
    pub fn pixel_at(&self, x: u32, y: u32) -> Option<(u8, u8, u8)> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let row = usize::try_from(y).ok()? * usize::try_from(self.width).ok()?;

        match self.pixel_format {
            PixelFormat::Rgba32 => {
                let offset = (row + usize::try_from(x).ok()?) * 4;
                let px = self.data.get(offset..offset + 3)?;
                Some((*px.first()?, *px.get(1)?, *px.get(2)?))
            }
            PixelFormat::Yuyv422 => {
                // YUYV format: [Y0 U Y1 V] repeats
                let pair_x = usize::try_from(x & !1).ok()?;
                let offset = (row + pair_x) * 2;

                let y_val = if x % 2 == 0 {
                    *self.data.get(offset)? // Y0
                } else {
                    *self.data.get(offset + 2)? // Y1
                };
                let u = *self.data.get(offset + 1)?;
                let v = *self.data.get(offset + 3)?;

                Some(yuv_to_rgb(y_val, u, v))
            }
        }
    }
}

/// Lifecycle states of a device session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No OS handle held.
    Closed,
    /// Handle held, geometry not negotiated.
    Open,
    /// Geometry negotiated, nothing written yet.
    Configured,
    /// At least one frame has been written.
    Streaming,
}

/// Error type for camera output operations.
#[derive(Debug)]
pub enum CameraError {
    /// Device node does not exist.
    DeviceNotFound(String),
    /// Device node is held by another session.
    DeviceBusy(String),
    /// The OS refused a handle for the device.
    DeviceOpenFailed(String),
    /// Requested geometry or pixel format is not supported.
    InvalidFormat(String),
    /// Operation is not valid in the session's current state.
    InvalidState {
        /// Operation that was attempted.
        operation: &'static str,
        /// State the session was in.
        state: SessionState,
    },
    /// No format has been negotiated yet.
    NotConfigured,
    /// Buffer length does not match the negotiated geometry.
    SizeMismatch {
        /// Length the geometry requires.
        expected: usize,
        /// Length that was supplied.
        actual: usize,
    },
    /// The OS rejected or truncated a frame write. Fatal to the session.
    WriteFailed(String),
    /// A session is already active.
    AlreadyRunning,
    /// No session is active.
    NotRunning,
    /// I/O error.
    Io(io::Error),
}

impl std::fmt::Display for CameraError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DeviceNotFound(path) => write!(f, "Device not found: {path}"),
            Self::DeviceBusy(path) => write!(f, "Device busy: {path}"),
            Self::DeviceOpenFailed(msg) => write!(f, "Failed to open device: {msg}"),
            Self::InvalidFormat(msg) => write!(f, "Invalid format: {msg}"),
            Self::InvalidState { operation, state } => {
                write!(f, "Cannot {operation} while session is {state:?}")
            }
            Self::NotConfigured => write!(f, "Device format not configured"),
            Self::SizeMismatch { expected, actual } => {
                write!(f, "Size mismatch: expected {expected} bytes, got {actual}")
            }
            Self::WriteFailed(msg) => write!(f, "Failed to write frame: {msg}"),
            Self::AlreadyRunning => write!(f, "Camera already running"),
            Self::NotRunning => write!(f, "Camera not running"),
            Self::Io(err) => write!(f, "I/O error: {err}"),
        }
    }
}

impl std::error::Error for CameraError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for CameraError {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}

/// Result type for camera operations.
pub type Result<T> = std::result::Result<T, CameraError>;

/// An exclusive OS handle to a virtual video sink.
pub trait OutputDevice {
    /// Negotiate the frame geometry. Returns the format the driver accepted.
    fn set_format(&mut self, format: &Format) -> Result<Format>;

    /// Write one buffer, returning how many bytes the OS accepted.
    fn write(&mut self, data: &[u8]) -> io::Result<usize>;

    /// Release the handle.
    fn close(self) -> Result<()>
    where
        Self: Sized,
    {
        Ok(())
    }
}

/// Acquires [`OutputDevice`] handles for device paths.
pub trait DeviceOpener {
    /// The handle type produced.
    type Device: OutputDevice;

    /// Acquire an exclusive handle on `path`.
    fn open(&self, path: &Path) -> Result<Self::Device>;
}
