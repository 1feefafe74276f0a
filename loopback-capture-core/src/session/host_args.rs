//! Checks for loosely typed arguments arriving from a scripting host.

use crate::models::error::CaptureError;

/// Convert a host number into a frame count.
///
/// Hosts pass frame counts as doubles; anything that is not a whole number
/// in `0..=u32::MAX` is a usage error.
pub fn frame_count_from_number(name: &str, value: f64) -> Result<u32, CaptureError> {
    if value.is_finite() && value.fract() == 0.0 && (0.0..=u32::MAX as f64).contains(&value) {
        Ok(value as u32)
    } else {
        Err(CaptureError::InvalidArgument(format!(
            "{} must be a whole number between 0 and {}, got {}",
            name,
            u32::MAX,
            value
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_whole_numbers_in_range() {
        assert_eq!(frame_count_from_number("maxFrameCount", 0.0).unwrap(), 0);
        assert_eq!(frame_count_from_number("maxFrameCount", 4800.0).unwrap(), 4800);
        assert_eq!(frame_count_from_number("maxFrameCount", u32::MAX as f64).unwrap(), u32::MAX);
    }

    #[test]
    fn rejects_values_that_are_not_frame_counts() {
        for value in [-1.0, 1.5, f64::NAN, f64::INFINITY, u32::MAX as f64 + 1.0] {
            let err = frame_count_from_number("expectedFrameCount", value).unwrap_err();
            assert!(matches!(err, CaptureError::InvalidArgument(_)), "{} accepted", value);
            assert!(!err.is_platform_fault());
        }
    }
}
