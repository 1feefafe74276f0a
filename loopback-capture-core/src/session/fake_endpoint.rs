//! Scripted endpoint for driving `CaptureSession` without an audio device.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use crate::models::error::CaptureError;
use crate::models::format::{
    MixFormat, KSDATAFORMAT_SUBTYPE_IEEE_FLOAT, WAVE_FORMAT_EXTENSIBLE,
};
use crate::traits::loopback_endpoint::{CapturedPacket, LoopbackEndpoint};

/// Every call the session makes, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointCall {
    InitializeThreading,
    UninitializeThreading,
    Open(i64),
    NextPacketFrames(u32),
    Acquire(u32),
    Release(u32),
    Close,
}

/// Step at which the fake reports a platform error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailAt {
    InitializeThreading,
    Open,
    NextPacketFrames,
    Acquire,
    Release,
    Close,
}

#[derive(Debug, Clone, Copy)]
pub struct ScriptedPacket {
    pub frames: u32,
    pub silent: bool,
    pub discontinuity: bool,
}

impl ScriptedPacket {
    pub fn frames(frames: u32) -> Self {
        Self {
            frames,
            silent: false,
            discontinuity: false,
        }
    }

    pub fn silent(frames: u32) -> Self {
        Self {
            silent: true,
            ..Self::frames(frames)
        }
    }

    pub fn discontinuous(frames: u32) -> Self {
        Self {
            discontinuity: true,
            ..Self::frames(frames)
        }
    }
}

pub struct ScriptedEndpoint {
    mix: MixFormat,
    packets: VecDeque<ScriptedPacket>,
    calls: Rc<RefCell<Vec<EndpointCall>>>,
    fail_at: Option<FailAt>,
    current: Vec<u8>,
    outstanding: bool,
}

impl ScriptedEndpoint {
    /// Stereo 32-bit float at 48 kHz: 8 bytes per frame.
    pub fn stereo_float(packets: &[ScriptedPacket]) -> Self {
        Self::with_format(
            MixFormat {
                format_tag: WAVE_FORMAT_EXTENSIBLE,
                sub_format: Some(KSDATAFORMAT_SUBTYPE_IEEE_FLOAT),
                channels: 2,
                samples_per_sec: 48_000,
                bits_per_sample: 32,
                block_align: 8,
            },
            packets,
        )
    }

    pub fn with_format(mix: MixFormat, packets: &[ScriptedPacket]) -> Self {
        Self {
            mix,
            packets: packets.iter().copied().collect(),
            calls: Rc::new(RefCell::new(Vec::new())),
            fail_at: None,
            current: Vec::new(),
            outstanding: false,
        }
    }

    pub fn failing_at(mut self, step: FailAt) -> Self {
        self.fail_at = Some(step);
        self
    }

    /// Shared call log that outlives the endpoint.
    pub fn calls(&self) -> Rc<RefCell<Vec<EndpointCall>>> {
        Rc::clone(&self.calls)
    }

    /// Contents of a non-silent packet: each byte is its offset modulo 251.
    pub fn pattern(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    fn check(&self, step: FailAt) -> Result<(), CaptureError> {
        if self.fail_at == Some(step) {
            return Err(CaptureError::StreamFailed(format!("scripted failure at {:?}", step)));
        }
        Ok(())
    }

    fn log(&self, call: EndpointCall) {
        self.calls.borrow_mut().push(call);
    }
}

impl LoopbackEndpoint for ScriptedEndpoint {
    fn initialize_threading(&mut self) -> Result<(), CaptureError> {
        self.check(FailAt::InitializeThreading)
            .map_err(|e| CaptureError::ThreadingInitFailed(e.to_string()))?;
        self.log(EndpointCall::InitializeThreading);
        Ok(())
    }

    fn uninitialize_threading(&mut self) {
        self.log(EndpointCall::UninitializeThreading);
    }

    fn open(&mut self, buffer_duration_hns: i64) -> Result<MixFormat, CaptureError> {
        self.check(FailAt::Open)
            .map_err(|e| CaptureError::ConfigurationFailed(e.to_string()))?;
        self.log(EndpointCall::Open(buffer_duration_hns));
        Ok(self.mix)
    }

    fn next_packet_frames(&mut self) -> Result<u32, CaptureError> {
        self.check(FailAt::NextPacketFrames)?;
        let frames = self.packets.front().map(|p| p.frames).unwrap_or(0);
        self.log(EndpointCall::NextPacketFrames(frames));
        Ok(frames)
    }

    fn acquire_packet(&mut self) -> Result<CapturedPacket<'_>, CaptureError> {
        assert!(!self.outstanding, "acquired a packet before releasing the previous one");
        self.check(FailAt::Acquire)?;

        let packet = self.packets.pop_front().unwrap_or(ScriptedPacket::frames(0));
        self.current = if packet.silent {
            vec![0xAA; packet.frames as usize * self.mix.block_align as usize]
        } else {
            Self::pattern(packet.frames as usize * self.mix.block_align as usize)
        };
        self.outstanding = true;
        self.log(EndpointCall::Acquire(packet.frames));

        Ok(CapturedPacket {
            frames: packet.frames,
            data: &self.current,
            silent: packet.silent,
            discontinuity: packet.discontinuity,
        })
    }

    fn release_packet(&mut self, frames: u32) -> Result<(), CaptureError> {
        assert!(self.outstanding, "released a packet that was never acquired");
        self.outstanding = false;
        self.check(FailAt::Release)?;
        self.log(EndpointCall::Release(frames));
        Ok(())
    }

    fn close(&mut self) -> Result<(), CaptureError> {
        self.log(EndpointCall::Close);
        self.check(FailAt::Close)
    }

    fn describe(&self) -> String {
        "scripted endpoint".into()
    }
}
