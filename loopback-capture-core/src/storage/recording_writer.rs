use std::fs::{self, File};
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::models::error::CaptureError;
use crate::models::format::AudioFormat;
use crate::models::recording_result::RecordingContainer;
use crate::processing::wav_format;

/// Streaming writer for captured packet bytes.
///
/// ## File Format
///
/// **WAV:**
/// ```text
/// [44-byte WAV header, sizes patched on finish]
/// [interleaved samples exactly as delivered by the capture buffers...]
/// ```
///
/// **Raw:** the sample bytes only (f32le for float captures), suitable for
/// `ffmpeg -f f32le -ac <channels> -ar <rate> -i <file>`.
pub struct RecordingWriter {
    file_path: PathBuf,
    container: RecordingContainer,
    format: AudioFormat,
    file: Option<BufWriter<File>>,
    data_bytes: u64,
}

impl RecordingWriter {
    /// Create the output file and write a placeholder header for WAV.
    pub fn create(
        file_path: PathBuf,
        container: RecordingContainer,
        format: AudioFormat,
    ) -> Result<Self, CaptureError> {
        if let Some(parent) = file_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .map_err(|e| CaptureError::StorageError(format!("failed to create directory: {}", e)))?;
            }
        }

        let file = File::create(&file_path)
            .map_err(|e| CaptureError::StorageError(format!("failed to create file: {}", e)))?;

        let mut writer = Self {
            file_path,
            container,
            format,
            file: Some(BufWriter::new(file)),
            data_bytes: 0,
        };

        if container == RecordingContainer::Wav {
            let header = wav_format::generate_wav_header(&format, 0);
            writer.write_raw(&header)?;
        }
        Ok(writer)
    }

    /// Append sample bytes. Must be whole frames.
    pub fn write(&mut self, data: &[u8]) -> Result<(), CaptureError> {
        let frame_bytes = self.format.frame_bytes();
        if frame_bytes > 0 && data.len() % frame_bytes != 0 {
            return Err(CaptureError::InvalidArgument(format!(
                "{} bytes is not a whole number of {}-byte frames",
                data.len(),
                frame_bytes
            )));
        }

        self.write_raw(data)?;
        self.data_bytes += data.len() as u64;
        Ok(())
    }

    /// Flush, patch the WAV size fields and close the file.
    ///
    /// Returns the number of frames written.
    pub fn finish(&mut self) -> Result<u64, CaptureError> {
        let mut file = self
            .file
            .take()
            .ok_or_else(|| CaptureError::StorageError("file is not open".into()))?;

        if self.container == RecordingContainer::Wav {
            let riff = wav_format::riff_size(self.data_bytes + wav_format::WAV_HEADER_SIZE as u64 - 8);
            let data = wav_format::riff_size(self.data_bytes);

            file.seek(SeekFrom::Start(4))
                .map_err(|e| CaptureError::StorageError(e.to_string()))?;
            file.write_all(&riff.to_le_bytes())
                .map_err(|e| CaptureError::StorageError(e.to_string()))?;
            file.seek(SeekFrom::Start(40))
                .map_err(|e| CaptureError::StorageError(e.to_string()))?;
            file.write_all(&data.to_le_bytes())
                .map_err(|e| CaptureError::StorageError(e.to_string()))?;
        }

        file.flush().map_err(|e| CaptureError::StorageError(e.to_string()))?;
        Ok(self.frames_written())
    }

    pub fn frames_written(&self) -> u64 {
        match self.format.frame_bytes() {
            0 => 0,
            frame_bytes => self.data_bytes / frame_bytes as u64,
        }
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    fn write_raw(&mut self, data: &[u8]) -> Result<(), CaptureError> {
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| CaptureError::StorageError("file is not open".into()))?;
        file.write_all(data)
            .map_err(|e| CaptureError::StorageError(format!("write failed: {}", e)))
    }
}
