use serde::{Deserialize, Serialize};

/// `WAVEFORMATEX::wFormatTag` for integer PCM.
pub const WAVE_FORMAT_PCM: u16 = 0x0001;
/// `WAVEFORMATEX::wFormatTag` for IEEE-754 float samples.
pub const WAVE_FORMAT_IEEE_FLOAT: u16 = 0x0003;
/// `WAVEFORMATEX::wFormatTag` announcing a trailing `WAVEFORMATEXTENSIBLE`.
pub const WAVE_FORMAT_EXTENSIBLE: u16 = 0xFFFE;

/// `KSDATAFORMAT_SUBTYPE_PCM` as a big-endian u128 (`GUID::to_u128` layout).
pub const KSDATAFORMAT_SUBTYPE_PCM: u128 = 0x00000001_0000_0010_8000_00aa00389b71;
/// `KSDATAFORMAT_SUBTYPE_IEEE_FLOAT` as a big-endian u128.
pub const KSDATAFORMAT_SUBTYPE_IEEE_FLOAT: u128 = 0x00000003_0000_0010_8000_00aa00389b71;

/// Sample encoding of an endpoint mix format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleEncoding {
    Pcm,
    IeeeFloat,
    Other,
}

/// The endpoint's native mix format, copied out of the platform's
/// `WAVEFORMATEX` / `WAVEFORMATEXTENSIBLE` before it is freed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MixFormat {
    pub format_tag: u16,
    /// `SubFormat` GUID, present only for `WAVE_FORMAT_EXTENSIBLE`.
    pub sub_format: Option<u128>,
    pub channels: u16,
    pub samples_per_sec: u32,
    pub bits_per_sample: u16,
    pub block_align: u16,
}

impl MixFormat {
    pub fn encoding(&self) -> SampleEncoding {
        match self.format_tag {
            WAVE_FORMAT_IEEE_FLOAT => SampleEncoding::IeeeFloat,
            WAVE_FORMAT_PCM => SampleEncoding::Pcm,
            WAVE_FORMAT_EXTENSIBLE => match self.sub_format {
                Some(KSDATAFORMAT_SUBTYPE_IEEE_FLOAT) => SampleEncoding::IeeeFloat,
                Some(KSDATAFORMAT_SUBTYPE_PCM) => SampleEncoding::Pcm,
                _ => SampleEncoding::Other,
            },
            _ => SampleEncoding::Other,
        }
    }
}

/// Immutable snapshot of the negotiated capture format.
///
/// Taken once when the stream starts. `is_valid` is true only for 32-bit
/// IEEE float samples, the layout downstream float-buffer consumers assume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioFormat {
    pub is_valid: bool,
    pub frame_size_bytes: u32,
    pub channels: u32,
    pub bits_per_sample: u32,
    pub sample_rate: u32,
}

impl AudioFormat {
    pub fn from_mix_format(mix: &MixFormat) -> Self {
        Self {
            is_valid: mix.encoding() == SampleEncoding::IeeeFloat && mix.bits_per_sample == 32,
            frame_size_bytes: mix.block_align as u32,
            channels: mix.channels as u32,
            bits_per_sample: mix.bits_per_sample as u32,
            sample_rate: mix.samples_per_sec,
        }
    }

    /// Frame size as a byte count for slicing.
    pub fn frame_bytes(&self) -> usize {
        self.frame_size_bytes as usize
    }

    /// Duration in seconds covered by `frames` frames.
    pub fn frames_to_secs(&self, frames: u64) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        frames as f64 / self.sample_rate as f64
    }
}
