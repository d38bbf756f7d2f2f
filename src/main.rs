//! Virtual-cam-output binary for feeding a loopback camera.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand, ValueEnum};
use signal_hook::consts::SIGINT;
use signal_hook::flag;

use virtual_cam_output::pattern::{self, TestPattern};
use virtual_cam_output::traits::Result;
use virtual_cam_output::{
    CameraController, CameraError, DeviceSession, Frame, FramePump, StatsReporter, V4L2Opener,
};

/// Feed synthetic frames into a V4L2 loopback camera
#[derive(Parser)]
#[command(name = "virtual-cam-output")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose logging (use RUST_LOG=debug for more)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write YUYV test patterns straight to the device
    Pattern(PatternArgs),

    /// Push RGBA frames through the full conversion pipeline
    Feed(FeedArgs),
}

#[derive(clap::Args, Debug)]
struct OutputArgs {
    /// Output device
    #[arg(short, long, default_value = "/dev/video10")]
    device: PathBuf,

    /// Resolution in WxH format
    #[arg(short, long, default_value = "640x480")]
    resolution: String,

    /// Target frame rate
    #[arg(short = 'F', long, default_value = "30")]
    fps: u32,

    /// Number of frames to write (0=unlimited)
    #[arg(short, long, default_value = "0")]
    frames: u64,
}

#[derive(clap::Args, Debug)]
struct PatternArgs {
    #[command(flatten)]
    output: OutputArgs,

    /// Pattern to generate
    #[arg(short, long, value_enum, default_value = "gradient")]
    pattern: PatternKind,
}

#[derive(clap::Args, Debug)]
struct FeedArgs {
    #[command(flatten)]
    output: OutputArgs,

    /// Frames between stats reports
    #[arg(long, default_value = "30")]
    stats_interval: u64,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum PatternKind {
    /// Animated luma ramp
    Gradient,
    /// 100% color bars
    Bars,
    /// Solid white
    Solid,
}

impl From<PatternKind> for TestPattern {
    fn from(kind: PatternKind) -> Self {
        match kind {
            PatternKind::Gradient => Self::Gradient,
            PatternKind::Bars => Self::ColorBars,
            PatternKind::Solid => Self::Solid(235, 128, 128),
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    let result = match cli.command {
        Commands::Pattern(args) => run_pattern(&args),
        Commands::Feed(args) => run_feed(&args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{err}");
            ExitCode::from(exit_status(&err))
        }
    }
}

/// Initialize env_logger based on verbosity flags
fn init_logging(verbose: bool, quiet: bool) {
    let env = env_logger::Env::default();

    let env = if quiet {
        env.default_filter_or("error")
    } else if verbose {
        env.default_filter_or("debug")
    } else {
        env.default_filter_or("info")
    };

    env_logger::Builder::from_env(env)
        .format_timestamp(None)
        .format_target(false)
        .init();
}

/// Process exit status for a failed run.
const fn exit_status(err: &CameraError) -> u8 {
    match err {
        CameraError::InvalidFormat(_) => 2,
        CameraError::DeviceNotFound(_) | CameraError::DeviceBusy(_) => 3,
        _ => 1,
    }
}

/// Parse resolution string in format "WxH"
fn parse_resolution(s: &str) -> Result<(u32, u32)> {
    let invalid = || CameraError::InvalidFormat(format!("invalid resolution (expected WxH): {s}"));

    let (width, height) = s.split_once('x').ok_or_else(invalid)?;
    let width = width.parse::<u32>().map_err(|_| invalid())?;
    let height = height.parse::<u32>().map_err(|_| invalid())?;

    if width == 0 || height == 0 {
        return Err(invalid());
    }
    Ok((width, height))
}

/// Install signal handler for graceful shutdown on Ctrl+C
fn install_signal_handler() -> Result<Arc<AtomicBool>> {
    let term = Arc::new(AtomicBool::new(false));
    flag::register(SIGINT, Arc::clone(&term))?;
    log::debug!("Installed SIGINT handler");
    Ok(term)
}

/// Fixed-rate ticker that sleeps until the next frame slot.
struct Pacer {
    interval: Duration,
    next: Instant,
}

impl Pacer {
    fn new(fps: u32) -> Self {
        Self {
            interval: Duration::from_secs(1) / fps.max(1),
            next: Instant::now(),
        }
    }

    fn wait(&mut self) {
        self.next += self.interval;
        let now = Instant::now();
        if self.next > now {
            thread::sleep(self.next - now);
        } else {
            // Running behind, don't try to catch up
            self.next = now;
        }
    }
}

const fn frame_limit(frames: u64) -> u64 {
    if frames == 0 {
        u64::MAX
    } else {
        frames
    }
}

fn run_pattern(args: &PatternArgs) -> Result<()> {
    let output = &args.output;
    let (width, height) = parse_resolution(&output.resolution)?;
    let pattern = TestPattern::from(args.pattern);
    let term = install_signal_handler()?;

    let mut session = DeviceSession::new(output.device.clone());
    session.open(&V4L2Opener)?;
    let format = session.set_format(width, height)?;

    log::info!(
        "Writing {:?} frames at {}x{} @ {} fps to {} (Ctrl+C to stop)",
        pattern,
        width,
        height,
        output.fps,
        output.device.display()
    );

    let max_frames = frame_limit(output.frames);
    let mut pacer = Pacer::new(output.fps);
    let mut frame_count = 0u64;
    let mut phase = 0u8;
    let started = Instant::now();

    while frame_count < max_frames && !term.load(Ordering::Relaxed) {
        let frame = pattern::yuyv_frame(&format, pattern, phase);
        session.write_frame(&frame)?;
        frame_count += 1;
        phase = phase.wrapping_add(1);

        if frame_count % 30 == 0 {
            log::info!("Frames written: {frame_count}");
        }
        pacer.wait();
    }

    if term.load(Ordering::Relaxed) {
        log::info!("Stopping...");
    }
    session.close()?;

    #[allow(clippy::cast_precision_loss)]
    let fps = frame_count as f64 / started.elapsed().as_secs_f64().max(f64::EPSILON);
    log::info!("Closed after {frame_count} frames ({fps:.1} fps)");
    Ok(())
}

fn run_feed(args: &FeedArgs) -> Result<()> {
    let output = &args.output;
    let (width, height) = parse_resolution(&output.resolution)?;
    let term = install_signal_handler()?;

    let mut controller =
        CameraController::with_stats(V4L2Opener, StatsReporter::new(args.stats_interval));
    let stats = controller.subscribe();
    controller.start(output.device.clone(), width, height)?;

    let pump = FramePump::spawn(controller)?;
    log::info!(
        "Feeding RGBA frames at {}x{} @ {} fps to {} (Ctrl+C to stop)",
        width,
        height,
        output.fps,
        output.device.display()
    );

    let max_frames = frame_limit(output.frames);
    let mut pacer = Pacer::new(output.fps);
    let mut produced = 0u64;
    let mut phase = 0u8;

    while produced < max_frames && !term.load(Ordering::Relaxed) {
        let frame = Frame::rgba(width, height, pattern::rgba_gradient(width, height, phase))?;
        pump.submit(frame)?;
        produced += 1;
        phase = phase.wrapping_add(1);

        for event in stats.try_iter() {
            log::info!("Frames written: {}", event.frame_count);
        }
        pacer.wait();
    }

    let summary = pump.stats();
    match pump.shutdown() {
        Some(mut controller) => controller.stop()?,
        None => log::warn!("Writer thread exited abnormally"),
    }

    log::info!(
        "Closed: {} submitted, {} written, {} dropped, {} failed",
        summary.submitted,
        summary.written,
        summary.dropped,
        summary.failed
    );
    Ok(())
}
