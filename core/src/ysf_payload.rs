//! YSF payload channels
//!
//! The 90 payload bytes of a YSF frame are five 18-byte blocks. Header,
//! terminator and data full-rate frames carry two callsign-data channels
//! (CSD1 in the first nine bytes of each block, CSD2 in the last nine). VD
//! mode 2 frames carry a 5-byte data channel and a 13-byte voice channel per
//! block.

use crate::ambe::{VoiceFrame, YSF_VCH_BYTES};
use crate::bits;
use crate::convolution::{ConvolutionalEncoder, ViterbiDecoder};
use crate::crc;
use crate::error::{GatewayError, Result};
use crate::ysf::{YSF_FRAME_BYTES, YSF_PAYLOAD_START};
use crate::ysf_fich::{deinterleave_dibits, interleave_dibits};

/// PN9 whitening sequence XORed over coded YSF channels
pub const YSF_WHITENING: [u8; 45] = [
    0x93, 0xD7, 0x51, 0x21, 0x9C, 0x2F, 0x6C, 0xD0, 0xEF, 0x0F, 0xF8, 0x3D, 0xF1, 0x73, 0x20,
    0x94, 0xED, 0x1E, 0x7C, 0xD8, 0xA9, 0x1C, 0x6D, 0x5C, 0x4C, 0x44, 0x02, 0x11, 0x84, 0xE5,
    0x58, 0x6F, 0x4D, 0xC8, 0xA1, 0x5A, 0x7E, 0xC9, 0x2D, 0xF9, 0x35, 0x33, 0x01, 0x8C, 0xA3,
];

pub const BLOCKS: usize = 5;
const BLOCK_BYTES: usize = 18;
const CSD_HALF_BYTES: usize = 9;
const TAIL_BITS: usize = 4;

/// Callsign data channel payload
pub const CSD_BYTES: usize = 20;
const CSD_CODED_BYTES: usize = 45;
const CSD_DIBITS: usize = 180;

/// VD mode 2 data channel payload
pub const DCH_BYTES: usize = 10;
const DCH_SLICE_BYTES: usize = 5;
const DCH_CODED_BYTES: usize = 25;
const DCH_DIBITS: usize = 100;

pub const CALLSIGN_LENGTH: usize = 10;

/// Voice units carried by a VD mode 2 frame
pub const UNITS_PER_YSF_FRAME: usize = BLOCKS;

/// Callsign padded with spaces to the 10-byte YSF field
pub fn callsign_field(callsign: &str) -> [u8; CALLSIGN_LENGTH] {
    let mut field = [b' '; CALLSIGN_LENGTH];
    for (dst, src) in field.iter_mut().zip(callsign.trim().bytes()) {
        *dst = src.to_ascii_uppercase();
    }
    field
}

/// Callsign text from a 10-byte field, trailing padding removed
pub fn callsign_text(field: &[u8]) -> String {
    String::from_utf8_lossy(field)
        .trim_end_matches([' ', '\0'])
        .trim_start()
        .to_string()
}

/// XOR the whitening sequence over `data`; applying it twice restores the input
pub fn whiten(data: &mut [u8]) {
    for (byte, w) in data.iter_mut().zip(YSF_WHITENING.iter()) {
        *byte ^= w;
    }
}

/// CRC, tail, convolutional code, interleave and whitening of one channel
fn encode_channel(info: &[u8], coded_bytes: usize, rows: usize) -> Vec<u8> {
    let mut with_crc = info.to_vec();
    with_crc.extend_from_slice(&[0, 0]);
    crc::add_crc16(&mut with_crc);

    let mut input = bits::bytes_to_bits(&with_crc);
    input.extend_from_slice(&[false; TAIL_BITS]);
    let coded = ConvolutionalEncoder::new().encode(&input);

    let mut out = vec![0u8; coded_bytes];
    interleave_dibits(&coded, &mut out, rows);
    whiten(&mut out);
    out
}

fn decode_channel(mut data: Vec<u8>, info_bytes: usize, dibits: usize, rows: usize) -> Result<Vec<u8>> {
    whiten(&mut data);
    let coded = deinterleave_dibits(&data, dibits, rows);
    let decoded = ViterbiDecoder::new().decode(&coded)?;

    let with_crc = bits::bits_to_bytes(&decoded[..(info_bytes + 2) * 8]);
    if !crc::check_crc16(&with_crc) {
        return Err(GatewayError::ProtocolDesync("YSF channel CRC mismatch".into()));
    }
    Ok(with_crc[..info_bytes].to_vec())
}

fn block_offset(block: usize) -> usize {
    YSF_PAYLOAD_START + block * BLOCK_BYTES
}

/// Write CSD1 and CSD2 into a header, terminator or data full-rate frame
pub fn write_csd(frame: &mut [u8], csd1: &[u8; CSD_BYTES], csd2: &[u8; CSD_BYTES]) -> Result<()> {
    GatewayError::check_len("YSF frame", frame, YSF_FRAME_BYTES)?;

    for (half, info) in [csd1, csd2].into_iter().enumerate() {
        let coded = encode_channel(info, CSD_CODED_BYTES, 9);
        for block in 0..BLOCKS {
            let start = block_offset(block) + half * CSD_HALF_BYTES;
            frame[start..start + CSD_HALF_BYTES]
                .copy_from_slice(&coded[block * CSD_HALF_BYTES..(block + 1) * CSD_HALF_BYTES]);
        }
    }
    Ok(())
}

/// Read one CSD channel (0 = CSD1, 1 = CSD2)
pub fn read_csd(frame: &[u8], half: usize) -> Result<[u8; CSD_BYTES]> {
    GatewayError::check_len("YSF frame", frame, YSF_FRAME_BYTES)?;

    let mut coded = Vec::with_capacity(CSD_CODED_BYTES);
    for block in 0..BLOCKS {
        let start = block_offset(block) + half * CSD_HALF_BYTES;
        coded.extend_from_slice(&frame[start..start + CSD_HALF_BYTES]);
    }
    let info = decode_channel(coded, CSD_BYTES, CSD_DIBITS, 9)?;
    let mut out = [0u8; CSD_BYTES];
    out.copy_from_slice(&info);
    Ok(out)
}

/// Header / terminator CSD: destination and source callsigns in CSD1,
/// downlink and uplink in CSD2
pub fn write_callsigns(frame: &mut [u8], source: &str, dest: &str) -> Result<()> {
    let mut csd1 = [b' '; CSD_BYTES];
    csd1[..CALLSIGN_LENGTH].copy_from_slice(&callsign_field(dest));
    csd1[CALLSIGN_LENGTH..].copy_from_slice(&callsign_field(source));
    let csd2 = [b' '; CSD_BYTES];
    write_csd(frame, &csd1, &csd2)
}

/// Source callsign from a header or terminator frame
pub fn read_source_callsign(frame: &[u8]) -> Result<String> {
    let csd1 = read_csd(frame, 0)?;
    Ok(callsign_text(&csd1[CALLSIGN_LENGTH..]))
}

/// Destination callsign from a header or terminator frame
pub fn read_dest_callsign(frame: &[u8]) -> Result<String> {
    let csd1 = read_csd(frame, 0)?;
    Ok(callsign_text(&csd1[..CALLSIGN_LENGTH]))
}

/// Data full-rate communications payload: 40 bytes split across the two channels
pub fn write_data_fr(frame: &mut [u8], data: &[u8; 2 * CSD_BYTES]) -> Result<()> {
    let mut csd1 = [0u8; CSD_BYTES];
    let mut csd2 = [0u8; CSD_BYTES];
    csd1.copy_from_slice(&data[..CSD_BYTES]);
    csd2.copy_from_slice(&data[CSD_BYTES..]);
    write_csd(frame, &csd1, &csd2)
}

pub fn read_data_fr(frame: &[u8]) -> Result<[u8; 2 * CSD_BYTES]> {
    let mut out = [0u8; 2 * CSD_BYTES];
    out[..CSD_BYTES].copy_from_slice(&read_csd(frame, 0)?);
    out[CSD_BYTES..].copy_from_slice(&read_csd(frame, 1)?);
    Ok(out)
}

/// Data channel contents for VD mode 2 frame number `frame_number`
pub fn vd2_dch(frame_number: u8, source: &str, dest: &str) -> [u8; DCH_BYTES] {
    match frame_number {
        0 => callsign_field(dest),
        1 => callsign_field(source),
        _ => [b' '; DCH_BYTES],
    }
}

/// Write a VD mode 2 payload: one DCH slice and one VCH per block
pub fn write_vd2(
    frame: &mut [u8],
    dch: &[u8; DCH_BYTES],
    voice: &[VoiceFrame; UNITS_PER_YSF_FRAME],
) -> Result<()> {
    GatewayError::check_len("YSF frame", frame, YSF_FRAME_BYTES)?;

    let coded = encode_channel(dch, DCH_CODED_BYTES, 5);
    for (block, unit) in voice.iter().enumerate() {
        let start = block_offset(block);
        frame[start..start + DCH_SLICE_BYTES]
            .copy_from_slice(&coded[block * DCH_SLICE_BYTES..(block + 1) * DCH_SLICE_BYTES]);
        frame[start + DCH_SLICE_BYTES..start + BLOCK_BYTES].copy_from_slice(&unit.to_ysf_vch());
    }
    Ok(())
}

/// The five voice units of a VD mode 2 frame
pub fn read_vd2_voice(frame: &[u8]) -> Result<[VoiceFrame; UNITS_PER_YSF_FRAME]> {
    GatewayError::check_len("YSF frame", frame, YSF_FRAME_BYTES)?;

    let mut units = [VoiceFrame::default(); UNITS_PER_YSF_FRAME];
    for (block, unit) in units.iter_mut().enumerate() {
        let start = block_offset(block) + DCH_SLICE_BYTES;
        let mut vch = [0u8; YSF_VCH_BYTES];
        vch.copy_from_slice(&frame[start..start + YSF_VCH_BYTES]);
        *unit = VoiceFrame::from_ysf_vch(&vch);
    }
    Ok(units)
}

pub fn read_vd2_dch(frame: &[u8]) -> Result<[u8; DCH_BYTES]> {
    GatewayError::check_len("YSF frame", frame, YSF_FRAME_BYTES)?;

    let mut coded = Vec::with_capacity(DCH_CODED_BYTES);
    for block in 0..BLOCKS {
        let start = block_offset(block);
        coded.extend_from_slice(&frame[start..start + DCH_SLICE_BYTES]);
    }
    let info = decode_channel(coded, DCH_BYTES, DCH_DIBITS, 5)?;
    let mut out = [0u8; DCH_BYTES];
    out.copy_from_slice(&info);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    /// Nine-stage LFSR, x[n+9] = x[n] ^ x[n+4]
    fn pn9(len: usize) -> Vec<u8> {
        let mut state = 0x1C9u16;
        let mut out = vec![0u8; len];
        for i in 0..len * 8 {
            let bit = state & 1;
            let feedback = (state ^ (state >> 4)) & 1;
            state = (state >> 1) | (feedback << 8);
            bits::write_bit(&mut out, i, bit == 1);
        }
        out
    }

    #[test]
    fn test_callsign_fields() {
        assert_eq!(&callsign_field("g4klx"), b"G4KLX     ");
        assert_eq!(&callsign_field("ABCDEFGHIJKL"), b"ABCDEFGHIJ");
        assert_eq!(callsign_text(b"G4KLX     "), "G4KLX");
        assert_eq!(callsign_text(b"M1ABC\0\0\0\0\0"), "M1ABC");
    }

    proptest! {
        #[test]
        fn prop_whitening_is_self_inverse(original in prop::array::uniform13(any::<u8>())) {
            let mut data = original;
            whiten(&mut data);
            prop_assert_ne!(data, original);
            whiten(&mut data);
            prop_assert_eq!(data, original);
        }

        #[test]
        fn prop_whitening_is_self_inverse_any_length(original in prop::collection::vec(any::<u8>(), 0..=45)) {
            let mut data = original.clone();
            whiten(&mut data);
            whiten(&mut data);
            prop_assert_eq!(data, original);
        }
    }

    #[test]
    fn test_csd_round_trip_with_errors() {
        let mut frame = [0u8; YSF_FRAME_BYTES];
        write_callsigns(&mut frame, "M0ABC", "ALL").unwrap();
        frame[40] ^= 0x04;
        frame[75] ^= 0x80;
        frame[110] ^= 0x01;
        assert_eq!(read_source_callsign(&frame).unwrap(), "M0ABC");
        assert_eq!(read_dest_callsign(&frame).unwrap(), "ALL");
        assert_eq!(read_csd(&frame, 1).unwrap(), [b' '; CSD_BYTES]);
    }

    #[test]
    fn test_data_fr_round_trip() {
        let mut data = [0u8; 40];
        for (i, b) in data.iter_mut().enumerate() {
            *b = i as u8 * 3;
        }
        let mut frame = [0u8; YSF_FRAME_BYTES];
        write_data_fr(&mut frame, &data).unwrap();
        assert_eq!(read_data_fr(&frame).unwrap(), data);
    }

    #[test]
    fn test_vd2_round_trip() {
        let voice = [
            VoiceFrame::from_fields(1, 2, 3),
            VoiceFrame::silence(),
            VoiceFrame::from_fields(0xFFF, 0, 0x1FFFFFF),
            VoiceFrame::from_fields(0x800, 0x001, 0x1000000),
            VoiceFrame::silence(),
        ];
        let dch = vd2_dch(1, "M0ABC", "DMR");
        let mut frame = [0u8; YSF_FRAME_BYTES];
        write_vd2(&mut frame, &dch, &voice).unwrap();
        assert_eq!(read_vd2_voice(&frame).unwrap(), voice);
        assert_eq!(&read_vd2_dch(&frame).unwrap(), b"M0ABC     ");
    }

    #[test]
    fn test_vd2_dch_by_frame_number() {
        assert_eq!(&vd2_dch(0, "SRC", "DST"), b"DST       ");
        assert_eq!(&vd2_dch(1, "SRC", "DST"), b"SRC       ");
        assert_eq!(&vd2_dch(5, "SRC", "DST"), b"          ");
    }

    #[test]
    fn test_corrupt_dch_reports_desync() {
        let mut frame = [0u8; YSF_FRAME_BYTES];
        write_vd2(&mut frame, &[b' '; DCH_BYTES], &[VoiceFrame::silence(); 5]).unwrap();
        for block in 0..BLOCKS {
            let start = block_offset(block);
            for b in &mut frame[start..start + 5] {
                *b ^= 0x5A;
            }
        }
        assert!(read_vd2_dch(&frame).is_err());
    }

    #[test]
    fn test_whitening_is_pn9() {
        assert_eq!(pn9(45), YSF_WHITENING.to_vec());
    }
}
