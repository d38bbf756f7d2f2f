//! Request/response surface for front-ends.
//!
//! Every call returns a [`Response`] instead of an error so it can be
//! handed straight back over whatever bridge the front-end uses.

use std::path::PathBuf;
use std::sync::mpsc::Receiver;

use serde::{Deserialize, Serialize};

use crate::controller::CameraController;
use crate::stats::{StatsEvent, StatsReporter, DEFAULT_INTERVAL};
use crate::traits::{DeviceOpener, Result};

/// Service settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ServiceConfig {
    /// Output device node.
    pub device_path: PathBuf,
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Frames between stats notifications.
    pub stats_interval: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            device_path: PathBuf::from("/dev/video10"),
            width: 1920,
            height: 1080,
            stats_interval: DEFAULT_INTERVAL,
        }
    }
}

/// Outcome of a service call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Response {
    /// Whether the call succeeded.
    pub success: bool,
    /// Failure description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Response {
    /// A successful response.
    #[must_use]
    pub const fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    /// A failed response carrying `message`.
    #[must_use]
    pub fn failed<M: Into<String>>(message: M) -> Self {
        Self {
            success: false,
            error: Some(message.into()),
        }
    }
}

impl<T> From<Result<T>> for Response {
    fn from(result: Result<T>) -> Self {
        match result {
            Ok(_) => Self::ok(),
            Err(err) => Self::failed(err.to_string()),
        }
    }
}

/// A capturable screen or window, as reported by the desktop layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Source {
    /// Opaque source identifier.
    pub id: String,
    /// Human-readable name.
    pub name: String,
}

/// Enumerates capture sources. Implemented by the desktop layer.
pub trait SourceLister {
    /// Currently capturable sources.
    fn sources(&self) -> Vec<Source>;
}

/// Lister for hosts without a desktop layer.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSources;

impl SourceLister for NoSources {
    fn sources(&self) -> Vec<Source> {
        Vec::new()
    }
}

/// Camera front-end binding a controller to a fixed configuration.
pub struct CameraService<O: DeviceOpener> {
    config: ServiceConfig,
    controller: CameraController<O>,
    sources: Box<dyn SourceLister>,
}

impl<O: DeviceOpener> CameraService<O> {
    /// Create a stopped service.
    pub fn new(opener: O, config: ServiceConfig) -> Self {
        let stats = StatsReporter::new(config.stats_interval);
        Self {
            config,
            controller: CameraController::with_stats(opener, stats),
            sources: Box::new(NoSources),
        }
    }

    /// Delegate source enumeration to `lister`.
    #[must_use]
    pub fn with_sources<L: SourceLister + 'static>(mut self, lister: L) -> Self {
        self.sources = Box::new(lister);
        self
    }

    /// Capturable sources from the desktop layer.
    pub fn list_sources(&self) -> Vec<Source> {
        self.sources.sources()
    }

    /// Start the camera with the configured device and geometry.
    pub fn start(&mut self) -> Response {
        let ServiceConfig {
            device_path,
            width,
            height,
            ..
        } = &self.config;
        self.controller
            .start(device_path.clone(), *width, *height)
            .into()
    }

    /// Convert and write one RGBA frame at the configured geometry.
    pub fn write_frame(&mut self, rgba: &[u8]) -> Response {
        self.controller.write_rgba(rgba).into()
    }

    /// Stop the camera. Always succeeds.
    pub fn stop(&mut self) -> Response {
        self.controller.stop().into()
    }

    /// Register for `{frameCount}` notifications.
    pub fn subscribe_stats(&mut self) -> Receiver<StatsEvent> {
        self.controller.subscribe()
    }

    /// Whether the camera is running.
    pub const fn is_running(&self) -> bool {
        self.controller.is_running()
    }

    /// Service settings.
    pub const fn config(&self) -> &ServiceConfig {
        &self.config
    }
}
