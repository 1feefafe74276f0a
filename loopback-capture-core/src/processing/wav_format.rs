//! WAV header generation for captured loopback audio.
//!
//! Writes the canonical 44-byte RIFF header. Float captures use format
//! code 3 (`WAVE_FORMAT_IEEE_FLOAT`) so the raw packet bytes can be stored
//! unchanged; anything else is labelled integer PCM.

use crate::models::format::AudioFormat;

/// Size of the standard WAV RIFF header in bytes.
pub const WAV_HEADER_SIZE: usize = 44;

pub const WAV_FORMAT_CODE_PCM: u16 = 1;
pub const WAV_FORMAT_CODE_IEEE_FLOAT: u16 = 3;

/// WAV `fmt ` format code matching a capture format.
pub fn format_code(format: &AudioFormat) -> u16 {
    if format.is_valid {
        WAV_FORMAT_CODE_IEEE_FLOAT
    } else {
        WAV_FORMAT_CODE_PCM
    }
}

/// Generate a 44-byte WAV RIFF header.
///
/// Layout:
/// ```text
/// [0-3]    "RIFF"
/// [4-7]    36 + data_size
/// [8-11]   "WAVE"
/// [12-15]  "fmt "
/// [16-19]  16
/// [20-21]  format code (1 = PCM, 3 = IEEE float)
/// [22-23]  channels
/// [24-27]  sample_rate
/// [28-31]  byte_rate = sample_rate * block_align
/// [32-33]  block_align
/// [34-35]  bits_per_sample
/// [36-39]  "data"
/// [40-43]  data_size
/// ```
pub fn generate_wav_header(format: &AudioFormat, data_size: u32) -> [u8; WAV_HEADER_SIZE] {
    let block_align = format.frame_size_bytes as u16;
    let byte_rate = format.sample_rate * format.frame_size_bytes;
    let chunk_size = 36u32.saturating_add(data_size);

    let mut header = [0u8; WAV_HEADER_SIZE];

    header[0..4].copy_from_slice(b"RIFF");
    header[4..8].copy_from_slice(&chunk_size.to_le_bytes());
    header[8..12].copy_from_slice(b"WAVE");

    header[12..16].copy_from_slice(b"fmt ");
    header[16..20].copy_from_slice(&16u32.to_le_bytes());
    header[20..22].copy_from_slice(&format_code(format).to_le_bytes());
    header[22..24].copy_from_slice(&(format.channels as u16).to_le_bytes());
    header[24..28].copy_from_slice(&format.sample_rate.to_le_bytes());
    header[28..32].copy_from_slice(&byte_rate.to_le_bytes());
    header[32..34].copy_from_slice(&block_align.to_le_bytes());
    header[34..36].copy_from_slice(&(format.bits_per_sample as u16).to_le_bytes());

    header[36..40].copy_from_slice(b"data");
    header[40..44].copy_from_slice(&data_size.to_le_bytes());

    header
}

/// Clamp a byte count to the 32-bit size fields of a RIFF header.
pub fn riff_size(bytes: u64) -> u32 {
    bytes.min(u32::MAX as u64) as u32
}
