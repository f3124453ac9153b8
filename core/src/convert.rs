//! Mode converter between DMR bursts and YSF VD mode 2 frames
//!
//! Each direction owns a [`StreamQueue`] of canonical units. The producing
//! side pushes whole source frames, the consuming side pulls whole
//! destination frames, so the 3:5 unit ratio between DMR and YSF is absorbed
//! by the queue.

use log::debug;

use crate::ambe::{self, VoiceFrame, UNITS_PER_DMR_BURST};
use crate::error::Result;
use crate::queue::{FrameTag, StreamQueue};
use crate::ysf_payload::{self, UNITS_PER_YSF_FRAME};

/// One direction of conversion
#[derive(Debug)]
struct Lane {
    queue: StreamQueue,
    in_stream: bool,
    units_since_header: usize,
    /// Units per destination frame
    ratio: usize,
}

impl Lane {
    fn new(ratio: usize) -> Self {
        Self {
            queue: StreamQueue::new(),
            in_stream: false,
            units_since_header: 0,
            ratio,
        }
    }

    fn put_header(&mut self) -> Result<()> {
        if self.in_stream {
            debug!("ModeConverter: header while stream open, ignored");
            return Ok(());
        }
        self.queue.push_header()?;
        self.in_stream = true;
        self.units_since_header = 0;
        Ok(())
    }

    fn put_units(&mut self, units: &[VoiceFrame]) -> Result<()> {
        if !self.in_stream {
            debug!("ModeConverter: late entry, synthesising header");
            self.put_header()?;
        }
        for unit in units {
            self.queue.push_data(*unit)?;
            self.units_since_header += 1;
        }
        Ok(())
    }

    fn put_eot(&mut self) -> Result<()> {
        if !self.in_stream {
            return Ok(());
        }
        let silence = VoiceFrame::silence();
        while self.units_since_header % self.ratio != 0 {
            self.queue.push_data(silence)?;
            self.units_since_header += 1;
        }
        self.queue.push_eot()?;
        self.in_stream = false;
        Ok(())
    }
}

/// Converts voice streams in both directions between DMR and YSF
#[derive(Debug)]
pub struct ModeConverter {
    dmr_to_ysf: Lane,
    ysf_to_dmr: Lane,
}

impl Default for ModeConverter {
    fn default() -> Self {
        Self::new()
    }
}

impl ModeConverter {
    pub fn new() -> Self {
        Self {
            dmr_to_ysf: Lane::new(UNITS_PER_YSF_FRAME),
            ysf_to_dmr: Lane::new(UNITS_PER_DMR_BURST),
        }
    }

    pub fn put_dmr_header(&mut self) -> Result<()> {
        self.dmr_to_ysf.put_header()
    }

    /// Queue the three voice units of a 33-byte DMR voice burst
    pub fn put_dmr(&mut self, burst: &[u8]) -> Result<()> {
        let units = ambe::read_dmr_burst(burst)?;
        self.dmr_to_ysf.put_units(&units)
    }

    pub fn put_dmr_eot(&mut self) -> Result<()> {
        self.dmr_to_ysf.put_eot()
    }

    /// Substitute `bursts` missing DMR bursts with silence
    pub fn put_dmr_silence(&mut self, bursts: usize) -> Result<()> {
        let units = vec![VoiceFrame::silence(); bursts * UNITS_PER_DMR_BURST];
        self.dmr_to_ysf.put_units(&units)
    }

    /// Next YSF frame's worth of units
    pub fn get_ysf(&mut self, out: &mut [VoiceFrame; UNITS_PER_YSF_FRAME]) -> FrameTag {
        self.dmr_to_ysf.queue.pop_group(out)
    }

    pub fn put_ysf_header(&mut self) -> Result<()> {
        self.ysf_to_dmr.put_header()
    }

    /// Queue the five voice units of a 120-byte VD mode 2 frame
    pub fn put_ysf(&mut self, frame: &[u8]) -> Result<()> {
        let units = ysf_payload::read_vd2_voice(frame)?;
        self.ysf_to_dmr.put_units(&units)
    }

    pub fn put_ysf_eot(&mut self) -> Result<()> {
        self.ysf_to_dmr.put_eot()
    }

    /// Substitute `frames` missing YSF frames with silence
    pub fn put_ysf_silence(&mut self, frames: usize) -> Result<()> {
        let units = vec![VoiceFrame::silence(); frames * UNITS_PER_YSF_FRAME];
        self.ysf_to_dmr.put_units(&units)
    }

    /// Next DMR burst's worth of units
    pub fn get_dmr(&mut self, out: &mut [VoiceFrame; UNITS_PER_DMR_BURST]) -> FrameTag {
        self.ysf_to_dmr.queue.pop_group(out)
    }

    /// Voice units waiting for the YSF side
    pub fn ysf_units_available(&self) -> usize {
        self.dmr_to_ysf.queue.data_units()
    }

    /// Voice units waiting for the DMR side
    pub fn dmr_units_available(&self) -> usize {
        self.ysf_to_dmr.queue.data_units()
    }

    pub fn ysf_ratio(&self) -> usize {
        self.dmr_to_ysf.ratio
    }

    pub fn dmr_ratio(&self) -> usize {
        self.ysf_to_dmr.ratio
    }
}
