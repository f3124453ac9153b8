//! Canonical vocoder unit and its DMR / YSF over-the-air layouts
//!
//! DMR and YSF VD mode 2 both carry AMBE+2 3600x2450, so a voice unit is
//! converted by re-protecting the same 49 parameter bits rather than by
//! transcoding audio. The canonical form is `a` (12 bits), `b` (12 bits) and
//! `c` (25 bits) packed MSB-first into 7 bytes.

use crate::bits;
use crate::dmr::DMR_BURST_BYTES;
use crate::error::{GatewayError, Result};
use crate::golay;
use crate::ysf_payload;

pub const VOICE_FRAME_BITS: usize = 49;
pub const VOICE_FRAME_BYTES: usize = 7;

/// Coded AMBE length inside a DMR burst
pub const DMR_AMBE_BYTES: usize = 9;
const DMR_AMBE_BITS: usize = 72;

/// Voice channel length inside a YSF VD mode 2 block
pub const YSF_VCH_BYTES: usize = 13;
const YSF_VCH_BITS: usize = 104;

/// Canonical bits repeated three times in the YSF VCH
const YSF_TRIPLED_BITS: usize = 27;

/// DMR AMBE+2 silence frame
pub const DMR_SILENCE: [u8; DMR_AMBE_BYTES] = [0xB9, 0xE8, 0x81, 0x52, 0x61, 0x73, 0x00, 0x2A, 0x6B];

pub const UNITS_PER_DMR_BURST: usize = 3;

/// Bit runs (start, length) of each AMBE frame inside a DMR voice burst
const DMR_BURST_AMBE: [&[(usize, usize)]; UNITS_PER_DMR_BURST] = [
    &[(0, 72)],
    &[(72, 36), (156, 36)],
    &[(192, 72)],
];

/// Positions of the 24 Golay(24,12) bits protecting `a`
const DMR_A_TABLE: [usize; 24] = [
    0, 4, 8, 12, 16, 20, 24, 28, 32, 36, 40, 44, 48, 52, 56, 60, 64, 68, 1, 5, 9, 13, 17, 21,
];

/// Positions of the 23 scrambled Golay(23,12) bits protecting `b`
const DMR_B_TABLE: [usize; 23] = [
    25, 29, 33, 37, 41, 45, 49, 53, 57, 61, 65, 69, 2, 6, 10, 14, 18, 22, 26, 30, 34, 38, 42,
];

/// Positions of the 25 unprotected `c` bits
const DMR_C_TABLE: [usize; 25] = [
    46, 50, 54, 58, 62, 66, 70, 3, 7, 11, 15, 19, 23, 27, 31, 35, 39, 43, 47, 51, 55, 59, 63, 67,
    71,
];

/// Scrambling mask applied to the `b` codeword, seeded by the `a` field
fn dmr_b_mask(a: u32) -> u32 {
    let mut pr = 16 * a;
    let mut mask = 0u32;
    for _ in 0..23 {
        pr = (173 * pr + 13849) % 65536;
        mask = (mask << 1) | (pr >> 15);
    }
    mask
}

/// 26 x 4 block interleaver used by the VD mode 2 voice channel
fn vch_interleave(i: usize) -> usize {
    (i % 26) * 4 + i / 26
}

/// One vocoder parameter set in canonical form
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VoiceFrame([u8; VOICE_FRAME_BYTES]);

impl VoiceFrame {
    pub fn from_fields(a: u32, b: u32, c: u32) -> Self {
        let mut bytes = [0u8; VOICE_FRAME_BYTES];
        bits::write_bits(&mut bytes, 0, 12, a & 0xFFF);
        bits::write_bits(&mut bytes, 12, 12, b & 0xFFF);
        bits::write_bits(&mut bytes, 24, 25, c & 0x1FF_FFFF);
        Self(bytes)
    }

    /// Build from packed bytes; the seven trailing pad bits are cleared
    pub fn from_bytes(mut bytes: [u8; VOICE_FRAME_BYTES]) -> Self {
        bytes[VOICE_FRAME_BYTES - 1] &= 0x80;
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; VOICE_FRAME_BYTES] {
        &self.0
    }

    pub fn a(&self) -> u32 {
        bits::read_bits(&self.0, 0, 12)
    }

    pub fn b(&self) -> u32 {
        bits::read_bits(&self.0, 12, 12)
    }

    pub fn c(&self) -> u32 {
        bits::read_bits(&self.0, 24, 25)
    }

    /// Canonical form of the DMR silence frame
    pub fn silence() -> Self {
        Self::from_dmr_ambe(&DMR_SILENCE)
    }

    /// Protect and scatter into the 72-bit DMR AMBE layout
    pub fn to_dmr_ambe(&self) -> [u8; DMR_AMBE_BYTES] {
        let a = self.a();
        let a_word = golay::encode_24_12(a);
        let b_word = golay::encode_23_12(self.b()) ^ dmr_b_mask(a);
        let c_word = self.c();

        let mut out = [0u8; DMR_AMBE_BYTES];
        for (i, &pos) in DMR_A_TABLE.iter().enumerate() {
            bits::write_bit(&mut out, pos, (a_word >> (23 - i)) & 1 == 1);
        }
        for (i, &pos) in DMR_B_TABLE.iter().enumerate() {
            bits::write_bit(&mut out, pos, (b_word >> (22 - i)) & 1 == 1);
        }
        for (i, &pos) in DMR_C_TABLE.iter().enumerate() {
            bits::write_bit(&mut out, pos, (c_word >> (24 - i)) & 1 == 1);
        }
        out
    }

    /// Gather and error-correct a 72-bit DMR AMBE frame
    pub fn from_dmr_ambe(ambe: &[u8; DMR_AMBE_BYTES]) -> Self {
        let gather = |table: &[usize]| {
            table
                .iter()
                .fold(0u32, |acc, &pos| (acc << 1) | bits::read_bit(ambe, pos) as u32)
        };

        let a = golay::decode_24_12(gather(&DMR_A_TABLE));
        let b = golay::decode_23_12(gather(&DMR_B_TABLE) ^ dmr_b_mask(a));
        let c = gather(&DMR_C_TABLE);
        Self::from_fields(a, b, c)
    }

    /// Encode as a whitened, interleaved YSF VD mode 2 voice channel
    pub fn to_ysf_vch(&self) -> [u8; YSF_VCH_BYTES] {
        let mut vch = [0u8; YSF_VCH_BYTES];
        let mut n = 0;
        for i in 0..YSF_TRIPLED_BITS {
            let bit = bits::read_bit(&self.0, i);
            for _ in 0..3 {
                bits::write_bit(&mut vch, n, bit);
                n += 1;
            }
        }
        bits::copy_bits(
            &self.0,
            YSF_TRIPLED_BITS,
            &mut vch,
            n,
            VOICE_FRAME_BITS - YSF_TRIPLED_BITS,
        );

        ysf_payload::whiten(&mut vch);

        let mut out = [0u8; YSF_VCH_BYTES];
        for i in 0..YSF_VCH_BITS {
            bits::write_bit(&mut out, vch_interleave(i), bits::read_bit(&vch, i));
        }
        out
    }

    /// Decode a YSF VD mode 2 voice channel, majority-voting the tripled bits
    pub fn from_ysf_vch(data: &[u8; YSF_VCH_BYTES]) -> Self {
        let mut vch = [0u8; YSF_VCH_BYTES];
        for i in 0..YSF_VCH_BITS {
            bits::write_bit(&mut vch, i, bits::read_bit(data, vch_interleave(i)));
        }

        ysf_payload::whiten(&mut vch);

        let mut bytes = [0u8; VOICE_FRAME_BYTES];
        for i in 0..YSF_TRIPLED_BITS {
            let votes = (0..3)
                .filter(|k| bits::read_bit(&vch, i * 3 + k))
                .count();
            bits::write_bit(&mut bytes, i, votes >= 2);
        }
        bits::copy_bits(
            &vch,
            YSF_TRIPLED_BITS * 3,
            &mut bytes,
            YSF_TRIPLED_BITS,
            VOICE_FRAME_BITS - YSF_TRIPLED_BITS,
        );
        Self(bytes)
    }
}

/// Extract the three voice units from a 33-byte DMR voice burst
pub fn read_dmr_burst(burst: &[u8]) -> Result<[VoiceFrame; UNITS_PER_DMR_BURST]> {
    GatewayError::check_len("DMR burst", burst, DMR_BURST_BYTES)?;

    let mut frames = [VoiceFrame::default(); UNITS_PER_DMR_BURST];
    for (frame, runs) in frames.iter_mut().zip(DMR_BURST_AMBE.iter()) {
        let mut ambe = [0u8; DMR_AMBE_BYTES];
        let mut n = 0;
        for &(start, len) in runs.iter() {
            bits::copy_bits(burst, start, &mut ambe, n, len);
            n += len;
        }
        debug_assert_eq!(n, DMR_AMBE_BITS);
        *frame = VoiceFrame::from_dmr_ambe(&ambe);
    }
    Ok(frames)
}

/// Write three voice units into a 33-byte DMR burst, leaving the sync/EMB field untouched
pub fn write_dmr_burst(burst: &mut [u8], frames: &[VoiceFrame; UNITS_PER_DMR_BURST]) -> Result<()> {
    GatewayError::check_len("DMR burst", burst, DMR_BURST_BYTES)?;

    for (frame, runs) in frames.iter().zip(DMR_BURST_AMBE.iter()) {
        let ambe = frame.to_dmr_ambe();
        let mut n = 0;
        for &(start, len) in runs.iter() {
            bits::copy_bits(&ambe, n, burst, start, len);
            n += len;
        }
    }
    Ok(())
}
