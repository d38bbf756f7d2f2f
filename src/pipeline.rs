//! Producer/writer boundary for threaded hosts.
//!
//! Producers hand frames to a [`FramePump`], which owns a
//! [`CameraController`] on a dedicated writer thread. The queue between
//! them is a single-slot mailbox with drop-oldest semantics: submitting
//! while a frame is still pending replaces that frame, so the producer
//! never blocks and the device always receives the freshest image.
//!
//! A write failure that ends the session also ends the pump: the writer
//! thread exits and later submissions return the failure.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use log::{debug, error, info, warn};

use crate::controller::CameraController;
use crate::traits::{CameraError, DeviceOpener, Frame, Result};

/// What happened to a submitted frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submitted {
    /// The mailbox was empty.
    Queued,
    /// An unwritten frame was discarded to make room.
    ReplacedPending,
}

/// Counters for a pump's lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PumpStats {
    /// Frames accepted by `submit`.
    pub submitted: u64,
    /// Frames the controller wrote successfully.
    pub written: u64,
    /// Frames replaced before the writer reached them, or discarded at shutdown.
    pub dropped: u64,
    /// Frames the controller rejected.
    pub failed: u64,
}

#[derive(Default)]
struct PumpCounters {
    submitted: AtomicU64,
    written: AtomicU64,
    dropped: AtomicU64,
    failed: AtomicU64,
}

impl PumpCounters {
    fn to_stats(&self) -> PumpStats {
        PumpStats {
            submitted: self.submitted.load(Ordering::Relaxed),
            written: self.written.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

#[derive(Default)]
struct Mailbox {
    pending: Option<Frame>,
    shutdown: bool,
    /// Why the writer gave up, once the session has ended.
    stopped: Option<String>,
}

#[derive(Default)]
struct Shared {
    mailbox: Mutex<Mailbox>,
    ready: Condvar,
    counters: PumpCounters,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Mailbox> {
        self.mailbox.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Depth-1 frame queue drained by a writer thread.
pub struct FramePump<O: DeviceOpener> {
    shared: Arc<Shared>,
    worker: Option<JoinHandle<CameraController<O>>>,
}

impl<O> FramePump<O>
where
    O: DeviceOpener + Send + 'static,
    O::Device: Send,
{
    /// Move `controller` onto a writer thread.
    pub fn spawn(controller: CameraController<O>) -> Result<Self> {
        let shared = Arc::new(Shared::default());
        let worker_shared = Arc::clone(&shared);

        let worker = thread::Builder::new()
            .name("frame-writer".to_owned())
            .spawn(move || writer_loop(&worker_shared, controller))?;

        info!("Frame pump started");
        Ok(Self {
            shared,
            worker: Some(worker),
        })
    }

    /// Offer a frame to the writer without blocking.
    pub fn submit(&self, frame: Frame) -> Result<Submitted> {
        let mut mailbox = self.shared.lock();
        if mailbox.shutdown {
            return Err(CameraError::NotRunning);
        }
        if let Some(reason) = &mailbox.stopped {
            return Err(CameraError::WriteFailed(reason.clone()));
        }

        let outcome = if mailbox.pending.replace(frame).is_some() {
            self.shared.counters.dropped.fetch_add(1, Ordering::Relaxed);
            Submitted::ReplacedPending
        } else {
            Submitted::Queued
        };
        drop(mailbox);

        self.shared.counters.submitted.fetch_add(1, Ordering::Relaxed);
        self.shared.ready.notify_one();
        Ok(outcome)
    }

    /// Snapshot of the pump counters.
    pub fn stats(&self) -> PumpStats {
        self.shared.counters.to_stats()
    }

    /// Stop the writer and take the controller back.
    ///
    /// A frame already being written completes; a pending frame is
    /// discarded. Returns `None` if the writer thread panicked.
    pub fn shutdown(mut self) -> Option<CameraController<O>> {
        self.join()
    }
}

impl<O: DeviceOpener> FramePump<O> {
    fn join(&mut self) -> Option<CameraController<O>> {
        let worker = self.worker.take()?;

        self.shared.lock().shutdown = true;
        self.shared.ready.notify_all();

        match worker.join() {
            Ok(controller) => {
                info!("Frame pump stopped: {:?}", self.shared.counters.to_stats());
                Some(controller)
            }
            Err(_) => {
                error!("Frame writer thread panicked");
                None
            }
        }
    }
}

impl<O: DeviceOpener> Drop for FramePump<O> {
    fn drop(&mut self) {
        if let Some(mut controller) = self.join() {
            if let Err(err) = controller.stop() {
                warn!("Failed to stop camera: {err}");
            }
        }
    }
}

fn writer_loop<O: DeviceOpener>(
    shared: &Shared,
    mut controller: CameraController<O>,
) -> CameraController<O> {
    loop {
        let frame = {
            let mut mailbox = shared.lock();
            loop {
                if mailbox.shutdown {
                    if mailbox.pending.take().is_some() {
                        shared.counters.dropped.fetch_add(1, Ordering::Relaxed);
                        debug!("Discarded pending frame at shutdown");
                    }
                    return controller;
                }
                if let Some(frame) = mailbox.pending.take() {
                    break frame;
                }
                mailbox = shared
                    .ready
                    .wait(mailbox)
                    .unwrap_or_else(PoisonError::into_inner);
            }
        };

        match controller.write_frame(&frame) {
            Ok(()) => {
                shared.counters.written.fetch_add(1, Ordering::Relaxed);
            }
            Err(err) if !controller.is_running() => {
                error!("Camera stopped by write failure, frame pump exiting: {err}");
                {
                    let mut mailbox = shared.lock();
                    if mailbox.pending.take().is_some() {
                        shared.counters.dropped.fetch_add(1, Ordering::Relaxed);
                    }
                    mailbox.stopped = Some(match err {
                        CameraError::WriteFailed(reason) => reason,
                        other => other.to_string(),
                    });
                    shared.counters.failed.fetch_add(1, Ordering::Relaxed);
                }
                return controller;
            }
            Err(err) => {
                shared.counters.failed.fetch_add(1, Ordering::Relaxed);
                warn!("Frame write failed: {err}");
            }
        }
    }
}
