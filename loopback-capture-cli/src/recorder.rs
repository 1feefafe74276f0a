//! Polling capture loop shared by the binary and its tests.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use parking_lot::Mutex;

use loopback_capture_core::storage::summary::write_summary;
use loopback_capture_core::{
    drain_pending, CaptureDiagnostics, CaptureSession, LoopbackEndpoint, RecordingContainer, RecordingSummary,
    RecordingWriter,
};

pub struct RecordingOptions {
    pub output: PathBuf,
    pub container: RecordingContainer,
    pub poll_interval: Duration,
    pub headroom: u32,
}

/// Snapshot published by the capture thread after every poll tick.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecordingProgress {
    pub frames_written: u64,
    pub sample_rate: u32,
    pub diagnostics: CaptureDiagnostics,
}

impl RecordingProgress {
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames_written as f64 / self.sample_rate as f64
    }
}

/// Start `session`, drain it into the output file every poll tick until
/// `running` clears, then stop and write the summary sidecar.
///
/// Must run on the thread that owns the session's platform objects.
pub fn record<E: LoopbackEndpoint>(
    mut session: CaptureSession<E>,
    options: &RecordingOptions,
    running: &AtomicBool,
    progress: &Mutex<RecordingProgress>,
) -> Result<RecordingSummary> {
    let format = session.start_capture().context("failed to start loopback capture")?;
    if !format.is_valid {
        session.stop_capture().ok();
        bail!(
            "mix format is {}-bit {} ch, only 32-bit float is supported",
            format.bits_per_sample,
            format.channels
        );
    }

    let mut writer = RecordingWriter::create(options.output.clone(), options.container, format)
        .with_context(|| format!("failed to create {}", options.output.display()))?;
    progress.lock().sample_rate = format.sample_rate;
    tracing::info!(
        path = %writer.file_path().display(),
        buffer_hns = session.config().buffer_duration_hns,
        "recording"
    );

    // Finalize the file even when capture fails, so the header sizes match
    // what was written.
    let pumped = pump(&mut session, &mut writer, options, running, progress);
    let finished = writer.finish();
    pumped?;
    let frames = finished.context("failed to finalize recording")?;

    let diagnostics = session.diagnostics();
    if diagnostics.has_overrun() {
        tracing::warn!(frames_dropped = diagnostics.frames_dropped, "packets exceeded the copy buffer");
    }

    let summary = RecordingSummary::new(
        &writer.file_path().display().to_string(),
        options.container,
        format,
        frames,
        diagnostics,
    );
    let summary_path = write_summary(&summary, writer.file_path())?;
    tracing::info!(path = %summary_path.display(), "summary written");

    Ok(summary)
}

/// Drain every poll tick until `running` clears, drain once more, stop.
fn pump<E: LoopbackEndpoint>(
    session: &mut CaptureSession<E>,
    writer: &mut RecordingWriter,
    options: &RecordingOptions,
    running: &AtomicBool,
    progress: &Mutex<RecordingProgress>,
) -> Result<()> {
    let mut scratch = Vec::new();

    while running.load(Ordering::SeqCst) {
        drain_pending(session, &mut scratch, options.headroom, |bytes| writer.write(bytes))?;

        {
            let mut p = progress.lock();
            p.frames_written = writer.frames_written();
            p.diagnostics = session.diagnostics();
        }

        thread::sleep(options.poll_interval);
    }

    // Whatever arrived during the last sleep.
    drain_pending(session, &mut scratch, options.headroom, |bytes| writer.write(bytes))?;
    session.stop_capture()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use loopback_capture_core::models::format::{WAVE_FORMAT_IEEE_FLOAT, WAVE_FORMAT_PCM};
    use loopback_capture_core::processing::wav_format::WAV_HEADER_SIZE;
    use loopback_capture_core::{CaptureError, CapturedPacket, FaultPolicy, MixFormat, SessionConfig};
    use std::collections::VecDeque;
    use std::fs;

    /// Endpoint that hands out a fixed list of packets once.
    struct QueuedEndpoint {
        mix: MixFormat,
        packets: VecDeque<u32>,
        buffer: Vec<u8>,
        acquired: usize,
        fail_on_acquire: Option<usize>,
    }

    impl QueuedEndpoint {
        fn new(format_tag: u16, bits_per_sample: u16, packets: &[u32]) -> Self {
            Self {
                mix: MixFormat {
                    format_tag,
                    sub_format: None,
                    channels: 2,
                    samples_per_sec: 48_000,
                    bits_per_sample,
                    block_align: 2 * bits_per_sample / 8,
                },
                packets: packets.iter().copied().collect(),
                buffer: Vec::new(),
                acquired: 0,
                fail_on_acquire: None,
            }
        }

        /// Report a stream failure on the `n`th acquire (0-based).
        fn failing_on_acquire(mut self, n: usize) -> Self {
            self.fail_on_acquire = Some(n);
            self
        }
    }

    impl LoopbackEndpoint for QueuedEndpoint {
        fn initialize_threading(&mut self) -> Result<(), CaptureError> {
            Ok(())
        }

        fn uninitialize_threading(&mut self) {}

        fn open(&mut self, _buffer_duration_hns: i64) -> Result<MixFormat, CaptureError> {
            Ok(self.mix)
        }

        fn next_packet_frames(&mut self) -> Result<u32, CaptureError> {
            Ok(self.packets.front().copied().unwrap_or(0))
        }

        fn acquire_packet(&mut self) -> Result<CapturedPacket<'_>, CaptureError> {
            if self.fail_on_acquire == Some(self.acquired) {
                return Err(CaptureError::StreamFailed("device invalidated".into()));
            }
            self.acquired += 1;
            let frames = self.packets.pop_front().unwrap_or(0);
            self.buffer = vec![0x11; frames as usize * self.mix.block_align as usize];
            Ok(CapturedPacket {
                frames,
                data: &self.buffer,
                silent: false,
                discontinuity: false,
            })
        }

        fn release_packet(&mut self, _frames: u32) -> Result<(), CaptureError> {
            Ok(())
        }

        fn close(&mut self) -> Result<(), CaptureError> {
            Ok(())
        }
    }

    fn options(name: &str) -> RecordingOptions {
        RecordingOptions {
            output: std::env::temp_dir().join(format!("loopback-record-{}-{}.wav", name, std::process::id())),
            container: RecordingContainer::Wav,
            poll_interval: Duration::from_millis(1),
            headroom: 10,
        }
    }

    fn session(endpoint: QueuedEndpoint) -> CaptureSession<QueuedEndpoint> {
        let config = SessionConfig::default().with_fault_policy(FaultPolicy::Propagate);
        CaptureSession::new(endpoint, config).unwrap()
    }

    #[test]
    fn final_drain_writes_pending_packets_and_summary() {
        let options = options("drain");
        let running = AtomicBool::new(false);
        let progress = Mutex::new(RecordingProgress::default());

        let endpoint = QueuedEndpoint::new(WAVE_FORMAT_IEEE_FLOAT, 32, &[480, 512]);
        let summary = record(session(endpoint), &options, &running, &progress).unwrap();

        assert_eq!(summary.frames_written, 992);
        assert_eq!(summary.diagnostics.packets_released, 2);
        assert_eq!(
            fs::metadata(&options.output).unwrap().len(),
            (WAV_HEADER_SIZE + 992 * 8) as u64
        );

        let sidecar = loopback_capture_core::storage::summary::summary_path(&options.output);
        assert!(sidecar.exists());

        fs::remove_file(&options.output).ok();
        fs::remove_file(&sidecar).ok();
    }

    #[test]
    fn capture_failure_still_finalizes_wav_header() {
        let options = options("fault");
        let running = AtomicBool::new(false);
        let progress = Mutex::new(RecordingProgress::default());

        let endpoint = QueuedEndpoint::new(WAVE_FORMAT_IEEE_FLOAT, 32, &[480, 512]).failing_on_acquire(1);
        let err = record(session(endpoint), &options, &running, &progress).unwrap_err();
        assert!(err.to_string().contains("device invalidated"));

        let bytes = fs::read(&options.output).unwrap();
        assert_eq!(bytes.len(), WAV_HEADER_SIZE + 480 * 8);
        let data_size = u32::from_le_bytes([bytes[40], bytes[41], bytes[42], bytes[43]]);
        assert_eq!(data_size, 480 * 8);
        let riff_size = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        assert_eq!(riff_size as usize, bytes.len() - 8);

        fs::remove_file(&options.output).ok();
    }

    #[test]
    fn refuses_non_float_mix_format() {
        let options = options("pcm");
        let running = AtomicBool::new(false);
        let progress = Mutex::new(RecordingProgress::default());

        let endpoint = QueuedEndpoint::new(WAVE_FORMAT_PCM, 16, &[480]);
        let err = record(session(endpoint), &options, &running, &progress).unwrap_err();

        assert!(err.to_string().contains("32-bit float"));
        assert!(!options.output.exists());
    }

    #[test]
    fn progress_duration_uses_sample_rate() {
        let progress = RecordingProgress {
            frames_written: 96_000,
            sample_rate: 48_000,
            ..Default::default()
        };
        assert!((progress.duration_secs() - 2.0).abs() < f64::EPSILON);
        assert_eq!(RecordingProgress::default().duration_secs(), 0.0);
    }
}
