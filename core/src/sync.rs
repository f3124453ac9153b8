//! Frame synchronisation markers
//!
//! Every digital voice frame starts (YSF, NXDN, P25) or is centred on (DMR) a
//! fixed bit pattern. Markers are written into and matched against frame
//! buffers at their protocol-defined bit offset.

use crate::bits;
use crate::error::{GatewayError, Result};

/// YSF frame sync, first five bytes of every 120-byte frame
pub const YSF_SYNC: [u8; 5] = [0xD4, 0x71, 0xC9, 0x63, 0x4D];

pub const DMR_BS_VOICE_SYNC: [u8; 6] = [0x75, 0x5F, 0xD7, 0xDF, 0x75, 0xF7];
pub const DMR_BS_DATA_SYNC: [u8; 6] = [0xDF, 0xF5, 0x7D, 0x75, 0xDF, 0x5D];
pub const DMR_MS_VOICE_SYNC: [u8; 6] = [0x7F, 0x7D, 0x5D, 0xD5, 0x7D, 0xFD];
pub const DMR_MS_DATA_SYNC: [u8; 6] = [0xD5, 0xD7, 0xF7, 0x7F, 0xD7, 0x57];

/// NXDN frame sync word (20 bits, low nibble of the last byte unused)
pub const NXDN_FSW: [u8; 3] = [0xCD, 0xF5, 0x90];

/// P25 frame sync (48 bits)
pub const P25_SYNC: [u8; 6] = [0x55, 0x75, 0xF5, 0xFF, 0x77, 0xFF];

/// First bit of the 48-bit sync / EMB field in a 33-byte DMR burst
pub const DMR_SYNC_START_BIT: usize = 108;

/// Known frame synchronisation patterns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameMarker {
    Ysf,
    DmrBsVoice,
    DmrBsData,
    DmrMsVoice,
    DmrMsData,
    Nxdn,
    P25,
}

impl FrameMarker {
    /// Pattern bytes, MSB first
    pub fn pattern(&self) -> &'static [u8] {
        match self {
            FrameMarker::Ysf => &YSF_SYNC,
            FrameMarker::DmrBsVoice => &DMR_BS_VOICE_SYNC,
            FrameMarker::DmrBsData => &DMR_BS_DATA_SYNC,
            FrameMarker::DmrMsVoice => &DMR_MS_VOICE_SYNC,
            FrameMarker::DmrMsData => &DMR_MS_DATA_SYNC,
            FrameMarker::Nxdn => &NXDN_FSW,
            FrameMarker::P25 => &P25_SYNC,
        }
    }

    /// Number of significant bits in the pattern
    pub fn bit_len(&self) -> usize {
        match self {
            FrameMarker::Ysf => 40,
            FrameMarker::Nxdn => 20,
            _ => 48,
        }
    }

    /// Bit offset of the pattern inside its frame
    pub fn start_bit(&self) -> usize {
        match self {
            FrameMarker::DmrBsVoice
            | FrameMarker::DmrBsData
            | FrameMarker::DmrMsVoice
            | FrameMarker::DmrMsData => DMR_SYNC_START_BIT,
            _ => 0,
        }
    }

    /// Minimum frame size in bytes able to hold the marker
    fn required_len(&self) -> usize {
        (self.start_bit() + self.bit_len()).div_ceil(8)
    }

    /// Write the pattern into `frame`, leaving surrounding bits untouched
    pub fn write(&self, frame: &mut [u8]) -> Result<()> {
        GatewayError::check_min_len("sync marker frame", frame, self.required_len())?;
        bits::copy_bits(self.pattern(), 0, frame, self.start_bit(), self.bit_len());
        Ok(())
    }

    /// Hamming distance between the pattern and the bits at its position in `frame`
    pub fn distance(&self, frame: &[u8]) -> u32 {
        if frame.len() < self.required_len() {
            return self.bit_len() as u32;
        }
        let pattern = self.pattern();
        let start = self.start_bit();
        (0..self.bit_len())
            .filter(|&i| bits::read_bit(pattern, i) != bits::read_bit(frame, start + i))
            .count() as u32
    }

    /// True if `frame` carries the pattern with at most `max_errors` bit errors
    pub fn matches(&self, frame: &[u8], max_errors: u32) -> bool {
        self.distance(frame) <= max_errors
    }
}

/// Classify the 48-bit field of a DMR burst as one of the four DMR sync patterns
pub fn detect_dmr_sync(burst: &[u8], max_errors: u32) -> Option<FrameMarker> {
    [
        FrameMarker::DmrBsVoice,
        FrameMarker::DmrBsData,
        FrameMarker::DmrMsVoice,
        FrameMarker::DmrMsData,
    ]
    .into_iter()
    .map(|m| (m, m.distance(burst)))
    .filter(|&(_, d)| d <= max_errors)
    .min_by_key(|&(_, d)| d)
    .map(|(m, _)| m)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ysf_sync_at_frame_start() {
        let mut frame = [0u8; 120];
        FrameMarker::Ysf.write(&mut frame).unwrap();
        assert_eq!(&frame[..5], &YSF_SYNC);
        assert!(FrameMarker::Ysf.matches(&frame, 0));
    }

    #[test]
    fn test_dmr_sync_straddles_nibbles() {
        let mut burst = [0u8; 33];
        FrameMarker::DmrBsVoice.write(&mut burst).unwrap();
        // Bit 108 is the low nibble of byte 13
        assert_eq!(burst[13], 0x07);
        assert_eq!(&burst[14..19], &[0x55, 0xFD, 0x7D, 0xF7, 0x5F]);
        assert_eq!(burst[19], 0x70);
        assert_eq!(burst[12], 0x00);
        assert_eq!(burst[20], 0x00);
    }

    #[test]
    fn test_dmr_sync_keeps_neighbouring_bits() {
        let mut burst = [0xFFu8; 33];
        FrameMarker::DmrMsData.write(&mut burst).unwrap();
        assert_eq!(burst[13] & 0xF0, 0xF0);
        assert_eq!(burst[19] & 0x0F, 0x0F);
        assert!(FrameMarker::DmrMsData.matches(&burst, 0));
    }

    #[test]
    fn test_detect_dmr_sync_with_errors() {
        let mut burst = [0u8; 33];
        FrameMarker::DmrBsData.write(&mut burst).unwrap();
        burst[15] ^= 0x11;
        assert_eq!(detect_dmr_sync(&burst, 4), Some(FrameMarker::DmrBsData));
        assert_eq!(detect_dmr_sync(&burst, 1), None);
        assert_eq!(detect_dmr_sync(&[0u8; 33], 4), None);
    }

    #[test]
    fn test_nxdn_and_p25_markers() {
        let mut frame = [0u8; 8];
        FrameMarker::Nxdn.write(&mut frame).unwrap();
        assert_eq!(&frame[..3], &[0xCD, 0xF5, 0x90]);
        assert!(FrameMarker::Nxdn.matches(&frame, 0));

        let mut frame = [0u8; 8];
        FrameMarker::P25.write(&mut frame).unwrap();
        assert_eq!(&frame[..6], &P25_SYNC);
        assert_eq!(FrameMarker::P25.distance(&[0u8; 2]), 48);
    }

    #[test]
    fn test_write_rejects_short_frame() {
        let mut burst = [0u8; 19];
        assert!(matches!(
            FrameMarker::DmrBsVoice.write(&mut burst),
            Err(GatewayError::FrameLength { expected: 20, actual: 19, .. })
        ));
        assert_eq!(burst, [0u8; 19]);
        assert!(FrameMarker::Ysf.write(&mut [0u8; 4]).is_err());
        assert!(FrameMarker::Ysf.write(&mut [0u8; 5]).is_ok());
    }
}
