//! YSF frame information channel
//!
//! Four FICH bytes and their CRC are split into four Golay (24,12) words,
//! convolutionally coded and interleaved into the 25 bytes following the sync.

use crate::bits;
use crate::convolution::{ConvolutionalEncoder, ViterbiDecoder};
use crate::crc;
use crate::error::{GatewayError, Result};
use crate::golay;
use crate::ysf::{YSF_FRAME_BYTES, YSF_SYNC_BYTES};

pub const FICH_BYTES: usize = 25;
const FICH_INFO_BYTES: usize = 4;
const FICH_CRC_BYTES: usize = FICH_INFO_BYTES + 2;
const GOLAY_WORDS: usize = 4;
const CODED_BITS: usize = 100;
const TAIL_BITS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameIndicator {
    Header,
    Communications,
    Terminator,
    Test,
}

impl FrameIndicator {
    fn from_bits(value: u8) -> Self {
        match value & 0x03 {
            0 => FrameIndicator::Header,
            1 => FrameIndicator::Communications,
            2 => FrameIndicator::Terminator,
            _ => FrameIndicator::Test,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YsfDataType {
    VoiceData1,
    DataFullRate,
    VoiceData2,
    VoiceFullRate,
}

impl YsfDataType {
    fn from_bits(value: u8) -> Self {
        match value & 0x03 {
            0 => YsfDataType::VoiceData1,
            1 => YsfDataType::DataFullRate,
            2 => YsfDataType::VoiceData2,
            _ => YsfDataType::VoiceFullRate,
        }
    }
}

/// Call mode: group call to everyone
pub const CM_GROUP: u8 = 0;
/// Call mode: individual call
pub const CM_INDIVIDUAL: u8 = 3;
/// Frame total used by VD mode 2 voice
pub const VD2_FRAME_TOTAL: u8 = 6;
/// Message route: busy, as sent by network gateways
pub const MR_BUSY: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fich {
    pub fi: FrameIndicator,
    pub cs: u8,
    pub cm: u8,
    pub bn: u8,
    pub bt: u8,
    pub frame_number: u8,
    pub frame_total: u8,
    pub dev: bool,
    pub mr: u8,
    pub voip: bool,
    pub dt: YsfDataType,
    pub sql: bool,
    pub sq: u8,
}

impl Fich {
    /// FICH with the field values a network gateway sends
    pub fn new(fi: FrameIndicator, dt: YsfDataType) -> Self {
        Self {
            fi,
            cs: 2,
            cm: CM_GROUP,
            bn: 0,
            bt: 0,
            frame_number: 0,
            frame_total: 0,
            dev: false,
            mr: MR_BUSY,
            voip: false,
            dt,
            sql: false,
            sq: 0,
        }
    }

    pub fn to_bytes(&self) -> [u8; FICH_INFO_BYTES] {
        [
            ((self.fi as u8) << 6)
                | ((self.cs & 0x03) << 4)
                | ((self.cm & 0x03) << 2)
                | (self.bn & 0x03),
            ((self.bt & 0x03) << 6) | ((self.frame_number & 0x07) << 3) | (self.frame_total & 0x07),
            ((self.dev as u8) << 6)
                | ((self.mr & 0x07) << 3)
                | ((self.voip as u8) << 2)
                | (self.dt as u8),
            ((self.sql as u8) << 7) | (self.sq & 0x7F),
        ]
    }

    pub fn from_bytes(b: &[u8; FICH_INFO_BYTES]) -> Self {
        Self {
            fi: FrameIndicator::from_bits(b[0] >> 6),
            cs: (b[0] >> 4) & 0x03,
            cm: (b[0] >> 2) & 0x03,
            bn: b[0] & 0x03,
            bt: (b[1] >> 6) & 0x03,
            frame_number: (b[1] >> 3) & 0x07,
            frame_total: b[1] & 0x07,
            dev: b[2] & 0x40 != 0,
            mr: (b[2] >> 3) & 0x07,
            voip: b[2] & 0x04 != 0,
            dt: YsfDataType::from_bits(b[2]),
            sql: b[3] & 0x80 != 0,
            sq: b[3] & 0x7F,
        }
    }

    /// Write the coded FICH into a 120-byte YSF frame
    pub fn encode(&self, frame: &mut [u8]) -> Result<()> {
        GatewayError::check_len("YSF frame", frame, YSF_FRAME_BYTES)?;

        let mut info = [0u8; FICH_CRC_BYTES];
        info[..FICH_INFO_BYTES].copy_from_slice(&self.to_bytes());
        crc::add_crc16(&mut info);

        let mut golay_bits = Vec::with_capacity(CODED_BITS);
        for w in 0..GOLAY_WORDS {
            let word = golay::encode_24_12(bits::read_bits(&info, w * 12, 12));
            golay_bits.extend((0..24).map(|i| (word >> (23 - i)) & 1 == 1));
        }
        golay_bits.extend_from_slice(&[false; TAIL_BITS]);

        let coded = ConvolutionalEncoder::new().encode(&golay_bits);
        let fich = &mut frame[YSF_SYNC_BYTES..YSF_SYNC_BYTES + FICH_BYTES];
        interleave_dibits(&coded, fich, 5);
        Ok(())
    }

    /// Decode the FICH of a 120-byte YSF frame
    pub fn decode(frame: &[u8]) -> Result<Self> {
        GatewayError::check_len("YSF frame", frame, YSF_FRAME_BYTES)?;

        let fich = &frame[YSF_SYNC_BYTES..YSF_SYNC_BYTES + FICH_BYTES];
        let coded = deinterleave_dibits(fich, CODED_BITS, 5);
        let decoded = ViterbiDecoder::new().decode(&coded)?;

        let mut info = [0u8; FICH_CRC_BYTES];
        for w in 0..GOLAY_WORDS {
            let word = decoded[w * 24..(w + 1) * 24]
                .iter()
                .fold(0u32, |acc, &b| (acc << 1) | b as u32);
            bits::write_bits(&mut info, w * 12, 12, golay::decode_24_12(word));
        }

        if !crc::check_crc16(&info) {
            return Err(GatewayError::ProtocolDesync("FICH CRC mismatch".into()));
        }
        let mut bytes = [0u8; FICH_INFO_BYTES];
        bytes.copy_from_slice(&info[..FICH_INFO_BYTES]);
        Ok(Self::from_bytes(&bytes))
    }
}

/// Dibit interleaver shared by the YSF coded channels: dibit `i` of `coded`
/// lands at bit `(i % rows) * 40 + (i / rows) * 2`
pub(crate) fn interleave_dibits(coded: &[bool], out: &mut [u8], rows: usize) {
    for (i, pair) in coded.chunks(2).enumerate() {
        let n = (i % rows) * 40 + (i / rows) * 2;
        bits::write_bit(out, n, pair[0]);
        bits::write_bit(out, n + 1, pair[1]);
    }
}

pub(crate) fn deinterleave_dibits(data: &[u8], dibits: usize, rows: usize) -> Vec<bool> {
    let mut coded = Vec::with_capacity(dibits * 2);
    for i in 0..dibits {
        let n = (i % rows) * 40 + (i / rows) * 2;
        coded.push(bits::read_bit(data, n));
        coded.push(bits::read_bit(data, n + 1));
    }
    coded
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Fich {
        Fich {
            frame_number: 5,
            frame_total: VD2_FRAME_TOTAL,
            sq: 0x42,
            sql: true,
            ..Fich::new(FrameIndicator::Communications, YsfDataType::VoiceData2)
        }
    }

    #[test]
    fn test_field_packing() {
        let fich = sample();
        assert_eq!(fich.to_bytes(), [0x60, 0x2E, 0x12, 0xC2]);
        assert_eq!(Fich::from_bytes(&fich.to_bytes()), fich);
    }

    #[test]
    fn test_interleave_covers_fich() {
        let coded = vec![true; 200];
        let mut out = [0u8; FICH_BYTES];
        interleave_dibits(&coded, &mut out, 5);
        assert!(out.iter().all(|&b| b == 0xFF));
        assert_eq!(deinterleave_dibits(&out, 100, 5), coded);
    }

    #[test]
    fn test_round_trip_leaves_rest_of_frame() {
        let mut frame = [0xAAu8; YSF_FRAME_BYTES];
        sample().encode(&mut frame).unwrap();
        assert_eq!(&frame[..5], &[0xAA; 5]);
        assert_eq!(&frame[30..], &[0xAA; 90][..]);
        assert_eq!(Fich::decode(&frame).unwrap(), sample());
    }

    #[test]
    fn test_corrects_channel_errors() {
        let mut frame = [0u8; YSF_FRAME_BYTES];
        let fich = Fich::new(FrameIndicator::Header, YsfDataType::DataFullRate);
        fich.encode(&mut frame).unwrap();
        frame[6] ^= 0x10;
        frame[17] ^= 0x01;
        frame[27] ^= 0x80;
        assert_eq!(Fich::decode(&frame).unwrap(), fich);
    }

    #[test]
    fn test_garbage_fails_crc() {
        let mut frame = [0u8; YSF_FRAME_BYTES];
        for (i, b) in frame.iter_mut().enumerate() {
            *b = (i as u8).wrapping_mul(37).wrapping_add(11);
        }
        assert!(matches!(
            Fich::decode(&frame),
            Err(GatewayError::ProtocolDesync(_))
        ));
    }

    #[test]
    fn test_wrong_frame_size() {
        assert!(Fich::decode(&[0u8; 119]).is_err());
    }
}
