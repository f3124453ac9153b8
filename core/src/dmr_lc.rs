//! DMR full link control
//!
//! The nine LC bytes carried by voice LC header and terminator bursts, protected
//! by RS(12,9) with a data-type specific mask and then by BPTC(196,96).

use crate::bits;
use crate::bptc::{self, BPTC_BITS};
use crate::dmr::DataType;
use crate::error::{GatewayError, Result};
use crate::rs129;

pub const LC_BYTES: usize = 9;

pub const FLCO_GROUP: u8 = 0x00;
pub const FLCO_PRIVATE: u8 = 0x03;

const HEADER_CRC_MASK: u8 = 0x96;
const TERMINATOR_CRC_MASK: u8 = 0x99;

/// Bit runs of the BPTC payload inside a 33-byte burst
const INFO_RUNS: [(usize, usize); 2] = [(0, 98), (166, 98)];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkControl {
    pub private_call: bool,
    pub fid: u8,
    pub options: u8,
    pub dst_id: u32,
    pub src_id: u32,
}

impl LinkControl {
    pub fn group(src_id: u32, dst_id: u32) -> Self {
        Self {
            private_call: false,
            fid: 0,
            options: 0,
            dst_id,
            src_id,
        }
    }

    pub fn private(src_id: u32, dst_id: u32) -> Self {
        Self {
            private_call: true,
            ..Self::group(src_id, dst_id)
        }
    }

    pub fn to_bytes(&self) -> [u8; LC_BYTES] {
        let mut lc = [0u8; LC_BYTES];
        lc[0] = if self.private_call {
            FLCO_PRIVATE
        } else {
            FLCO_GROUP
        };
        lc[1] = self.fid;
        lc[2] = self.options;
        lc[3..6].copy_from_slice(&self.dst_id.to_be_bytes()[1..]);
        lc[6..9].copy_from_slice(&self.src_id.to_be_bytes()[1..]);
        lc
    }

    pub fn from_bytes(lc: &[u8; LC_BYTES]) -> Result<Self> {
        let private_call = match lc[0] & 0x3F {
            FLCO_GROUP => false,
            FLCO_PRIVATE => true,
            other => {
                return Err(GatewayError::ProtocolDesync(format!(
                    "unsupported FLCO 0x{:02X}",
                    other
                )))
            }
        };
        Ok(Self {
            private_call,
            fid: lc[1],
            options: lc[2],
            dst_id: u32::from_be_bytes([0, lc[3], lc[4], lc[5]]),
            src_id: u32::from_be_bytes([0, lc[6], lc[7], lc[8]]),
        })
    }
}

fn crc_mask(data_type: DataType) -> Result<u8> {
    match data_type {
        DataType::VoiceLcHeader => Ok(HEADER_CRC_MASK),
        DataType::TerminatorWithLc => Ok(TERMINATOR_CRC_MASK),
        other => Err(GatewayError::ProtocolDesync(format!(
            "{:?} does not carry a full LC",
            other
        ))),
    }
}

/// Write the BPTC-coded full LC into the info bits of `burst`
pub fn encode_full_lc(lc: &LinkControl, data_type: DataType, burst: &mut [u8]) -> Result<()> {
    GatewayError::check_len("DMR burst", burst, crate::dmr::DMR_BURST_BYTES)?;
    let mask = crc_mask(data_type)?;

    let data = lc.to_bytes();
    let mut payload = [0u8; bptc::PAYLOAD_BYTES];
    payload[..LC_BYTES].copy_from_slice(&data);
    for (i, p) in rs129::parity(&data).iter().enumerate() {
        payload[LC_BYTES + i] = p ^ mask;
    }

    let raw = bptc::encode(&payload);
    let mut n = 0;
    for &(start, len) in INFO_RUNS.iter() {
        for i in 0..len {
            bits::write_bit(burst, start + i, raw[n]);
            n += 1;
        }
    }
    Ok(())
}

/// Recover and verify the full LC carried by a header or terminator burst
pub fn decode_full_lc(burst: &[u8], data_type: DataType) -> Result<LinkControl> {
    GatewayError::check_len("DMR burst", burst, crate::dmr::DMR_BURST_BYTES)?;
    let mask = crc_mask(data_type)?;

    let mut raw = [false; BPTC_BITS];
    let mut n = 0;
    for &(start, len) in INFO_RUNS.iter() {
        for i in 0..len {
            raw[n] = bits::read_bit(burst, start + i);
            n += 1;
        }
    }

    let mut payload = bptc::decode(&raw);
    for p in payload[LC_BYTES..].iter_mut() {
        *p ^= mask;
    }
    if !rs129::check(&payload) {
        return Err(GatewayError::ProtocolDesync(
            "full LC failed Reed-Solomon check".into(),
        ));
    }

    let mut data = [0u8; LC_BYTES];
    data.copy_from_slice(&payload[..LC_BYTES]);
    LinkControl::from_bytes(&data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lc_byte_layout() {
        let lc = LinkControl::group(0x232A41, 9);
        assert_eq!(
            lc.to_bytes(),
            [0x00, 0x00, 0x00, 0x00, 0x00, 0x09, 0x23, 0x2A, 0x41]
        );
        assert_eq!(LinkControl::private(1, 2).to_bytes()[0], FLCO_PRIVATE);
    }

    #[test]
    fn test_unknown_flco_rejected() {
        let mut bytes = LinkControl::group(1, 2).to_bytes();
        bytes[0] = 0x30;
        assert!(LinkControl::from_bytes(&bytes).is_err());
    }

    #[test]
    fn test_header_round_trip_with_errors() {
        let lc = LinkControl::group(3_112_345, 91);
        let mut burst = [0u8; 33];
        encode_full_lc(&lc, DataType::VoiceLcHeader, &mut burst).unwrap();
        burst[2] ^= 0x01;
        burst[30] ^= 0x40;
        assert_eq!(
            decode_full_lc(&burst, DataType::VoiceLcHeader).unwrap(),
            lc
        );
    }

    #[test]
    fn test_mask_distinguishes_header_from_terminator() {
        let lc = LinkControl::private(1234, 5678);
        let mut burst = [0u8; 33];
        encode_full_lc(&lc, DataType::TerminatorWithLc, &mut burst).unwrap();
        assert_eq!(
            decode_full_lc(&burst, DataType::TerminatorWithLc).unwrap(),
            lc
        );
        assert!(decode_full_lc(&burst, DataType::VoiceLcHeader).is_err());
    }

    #[test]
    fn test_info_runs_skip_slot_type_and_sync() {
        let lc = LinkControl::group(0xFFFFFF, 0xFFFFFF);
        let mut burst = [0u8; 33];
        encode_full_lc(&lc, DataType::VoiceLcHeader, &mut burst).unwrap();
        for bit in 98..166 {
            assert!(!bits::read_bit(&burst, bit));
        }
    }

    #[test]
    fn test_wrong_data_type_rejected() {
        let lc = LinkControl::group(1, 1);
        let mut burst = [0u8; 33];
        assert!(encode_full_lc(&lc, DataType::Idle, &mut burst).is_err());
    }
}
