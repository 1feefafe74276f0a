use crate::models::error::CaptureError;
use crate::session::capture_session::{frames_to_bytes, CaptureSession};
use crate::traits::loopback_endpoint::LoopbackEndpoint;

/// Default ratio between the caller's buffer capacity and the announced
/// packet size, leaving room for packets that grow between query and acquire.
pub const DEFAULT_HEADROOM: u32 = 10;

/// Drain every packet that is pending right now.
///
/// One poll tick of a timer-driven reader: query the next packet size,
/// grow `scratch` to `next * headroom` frames if needed, acquire-and-copy,
/// hand the written bytes to `sink`, and repeat until the platform reports
/// no pending packet. Returns the number of frames handed to `sink`.
pub fn drain_pending<E, F>(
    session: &mut CaptureSession<E>,
    scratch: &mut Vec<u8>,
    headroom: u32,
    mut sink: F,
) -> Result<u64, CaptureError>
where
    E: LoopbackEndpoint,
    F: FnMut(&[u8]) -> Result<(), CaptureError>,
{
    let frame_bytes = session.audio_format()?.frame_bytes();
    let headroom = headroom.max(1);
    let mut drained = 0u64;

    let mut next = session.query_next_packet_frames()?;
    while next > 0 {
        let max_frames = next.saturating_mul(headroom);
        let required = frames_to_bytes(max_frames, frame_bytes)?;
        if scratch.len() < required {
            scratch.resize(required, 0);
        }

        let frames = session.acquire_and_copy_buffer(next, max_frames, scratch)?;
        sink(&scratch[..frames as usize * frame_bytes])?;
        drained += frames as u64;

        next = session.query_next_packet_frames()?;
    }

    Ok(drained)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::config::{FaultPolicy, SessionConfig};
    use crate::session::fake_endpoint::{ScriptedEndpoint, ScriptedPacket};

    fn started(packets: &[ScriptedPacket]) -> CaptureSession<ScriptedEndpoint> {
        let config = SessionConfig::default().with_fault_policy(FaultPolicy::Propagate);
        let mut session = CaptureSession::new(ScriptedEndpoint::stereo_float(packets), config).unwrap();
        session.start_capture().unwrap();
        session
    }

    #[test]
    fn drains_until_no_packet_is_pending() {
        let mut session = started(&[
            ScriptedPacket::frames(480),
            ScriptedPacket::frames(441),
            ScriptedPacket::frames(0),
            ScriptedPacket::frames(512),
        ]);
        let mut scratch = Vec::new();
        let mut chunks = Vec::new();

        let drained = drain_pending(&mut session, &mut scratch, DEFAULT_HEADROOM, |bytes| {
            chunks.push(bytes.len());
            Ok(())
        })
        .unwrap();

        assert_eq!(drained, 921);
        assert_eq!(chunks, vec![480 * 8, 441 * 8]);
        assert_eq!(scratch.len(), 4800 * 8);

        // The zero-frame packet stops this tick; the next one picks up 512.
        let mut next_tick = 0;
        let drained = drain_pending(&mut session, &mut scratch, DEFAULT_HEADROOM, |bytes| {
            next_tick += bytes.len();
            Ok(())
        })
        .unwrap();
        assert_eq!(drained, 0);
        assert_eq!(next_tick, 0);
    }

    #[test]
    fn sink_receives_packet_bytes() {
        let mut session = started(&[ScriptedPacket::frames(3)]);
        let mut scratch = Vec::new();
        let mut received = Vec::new();

        drain_pending(&mut session, &mut scratch, 1, |bytes| {
            received.extend_from_slice(bytes);
            Ok(())
        })
        .unwrap();

        assert_eq!(received, ScriptedEndpoint::pattern(24));
    }

    #[test]
    fn sink_error_stops_the_drain() {
        let mut session = started(&[ScriptedPacket::frames(10), ScriptedPacket::frames(10)]);
        let mut scratch = Vec::new();

        let err = drain_pending(&mut session, &mut scratch, DEFAULT_HEADROOM, |_| {
            Err(CaptureError::StorageError("disk full".into()))
        })
        .unwrap_err();

        assert_eq!(err, CaptureError::StorageError("disk full".into()));
        assert_eq!(session.diagnostics().packets_released, 1);
    }

    #[test]
    fn requires_a_started_session() {
        let config = SessionConfig::default().with_fault_policy(FaultPolicy::Propagate);
        let mut session = CaptureSession::new(ScriptedEndpoint::stereo_float(&[]), config).unwrap();
        let mut scratch = Vec::new();

        assert!(drain_pending(&mut session, &mut scratch, DEFAULT_HEADROOM, |_| Ok(())).is_err());
    }
}
