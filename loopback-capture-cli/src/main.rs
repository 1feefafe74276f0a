use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use parking_lot::Mutex;
use tracing_subscriber::EnvFilter;

use loopback_capture_core::{RecordingContainer, DEFAULT_HEADROOM};

#[cfg_attr(not(target_os = "windows"), allow(dead_code))]
mod recorder;

use recorder::{RecordingOptions, RecordingProgress};

#[derive(Parser)]
#[command(name = "loopback-record")]
#[command(about = "Record what the default output device is playing to a 32-bit float WAV file")]
struct Args {
    /// Output file path
    #[arg(short, long)]
    output: PathBuf,

    /// Stop after this many seconds (default: until Ctrl+C)
    #[arg(short, long)]
    duration_secs: Option<f64>,

    /// Poll interval of the capture thread in milliseconds
    #[arg(long, default_value_t = 10)]
    poll_ms: u64,

    /// Copy buffer size as a multiple of the announced packet size
    #[arg(long, default_value_t = DEFAULT_HEADROOM)]
    headroom: u32,

    /// Initialize COM outside the session, as an embedding host would
    #[arg(long)]
    no_com_init: bool,

    /// Write headerless f32le samples instead of WAV
    #[arg(long)]
    raw: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    if let Some(secs) = args.duration_secs {
        if !secs.is_finite() || secs <= 0.0 {
            anyhow::bail!("--duration-secs must be a positive number, got {}", secs);
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        eprintln!("\nReceived Ctrl+C, stopping recording...");
        r.store(false, Ordering::SeqCst);
    })
    .context("Failed to set Ctrl+C handler")?;

    let options = RecordingOptions {
        output: args.output.clone(),
        container: if args.raw {
            RecordingContainer::Raw
        } else {
            RecordingContainer::Wav
        },
        poll_interval: Duration::from_millis(args.poll_ms.max(1)),
        headroom: args.headroom.max(1),
    };

    println!("Recording default output device to {}", args.output.display());
    println!("Press Ctrl+C to stop\n");

    let progress = Arc::new(Mutex::new(RecordingProgress::default()));
    let capture = spawn_capture(options, !args.no_com_init, running.clone(), progress.clone())?;

    let started = Instant::now();
    let deadline = args.duration_secs.map(Duration::from_secs_f64);
    while running.load(Ordering::SeqCst) && !capture.is_finished() {
        if deadline.is_some_and(|d| started.elapsed() >= d) {
            running.store(false, Ordering::SeqCst);
            break;
        }

        let p = *progress.lock();
        print!(
            "\rRecording: {:.1}s | Frames: {} | Packets: {} | Dropped: {}    ",
            p.duration_secs(),
            p.frames_written,
            p.diagnostics.packets_released,
            p.diagnostics.frames_dropped
        );
        std::io::stdout().flush().ok();
        std::thread::sleep(Duration::from_millis(200));
    }
    running.store(false, Ordering::SeqCst);

    let summary = capture
        .join()
        .map_err(|_| anyhow::anyhow!("capture thread panicked"))??;

    println!("\n\nRecording complete!");
    println!("Output: {}", summary.file_path);
    println!(
        "Duration: {:.2}s ({} frames, {} Hz, {} ch)",
        summary.duration_secs, summary.frames_written, summary.format.sample_rate, summary.format.channels
    );
    if summary.diagnostics.has_overrun() {
        println!("Dropped frames: {}", summary.diagnostics.frames_dropped);
    }

    Ok(())
}

/// Run the session on its own thread; COM objects are created and used
/// there only.
#[cfg(target_os = "windows")]
fn spawn_capture(
    options: RecordingOptions,
    owns_com: bool,
    running: Arc<AtomicBool>,
    progress: Arc<Mutex<RecordingProgress>>,
) -> Result<std::thread::JoinHandle<Result<loopback_capture_core::RecordingSummary>>> {
    use loopback_capture_core::{CaptureSession, FaultPolicy, SessionConfig};
    use loopback_capture_windows::{ComApartment, MmcssRegistration, WasapiLoopbackEndpoint};

    std::thread::Builder::new()
        .name("wasapi-loopback-capture".into())
        .spawn(move || -> Result<loopback_capture_core::RecordingSummary> {
            let _mmcss = MmcssRegistration::pro_audio();
            // Host-style COM: initialized here, outlives the session.
            let _com = if owns_com {
                None
            } else {
                Some(ComApartment::initialize()?)
            };

            let config = SessionConfig {
                owns_platform_threading_init: owns_com,
                fault_policy: FaultPolicy::Propagate,
                ..Default::default()
            };
            let session = CaptureSession::new(WasapiLoopbackEndpoint::new(), config)?;

            let result = recorder::record(session, &options, &running, &progress);
            running.store(false, Ordering::SeqCst);
            result
        })
        .context("failed to spawn capture thread")
}

#[cfg(not(target_os = "windows"))]
fn spawn_capture(
    _options: RecordingOptions,
    _owns_com: bool,
    _running: Arc<AtomicBool>,
    _progress: Arc<Mutex<RecordingProgress>>,
) -> Result<std::thread::JoinHandle<Result<loopback_capture_core::RecordingSummary>>> {
    anyhow::bail!("loopback capture requires Windows (WASAPI)")
}
