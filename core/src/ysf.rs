//! YSF frame assembly and the `YSFD` network frame

use crate::ambe::VoiceFrame;
use crate::error::{GatewayError, Result};
use crate::sync::FrameMarker;
use crate::ysf_fich::{Fich, FrameIndicator, YsfDataType, VD2_FRAME_TOTAL};
use crate::ysf_payload::{self, callsign_field, CALLSIGN_LENGTH, UNITS_PER_YSF_FRAME};

pub const YSF_FRAME_BYTES: usize = 120;
pub const YSF_SYNC_BYTES: usize = 5;
pub const YSF_PAYLOAD_START: usize = YSF_SYNC_BYTES + crate::ysf_fich::FICH_BYTES;

pub const YSFD_TAG: &[u8; 4] = b"YSFD";
pub const YSFP_TAG: &[u8; 4] = b"YSFP";
pub const YSFU_TAG: &[u8; 4] = b"YSFU";
pub const YSFD_FRAME_BYTES: usize = 155;
const YSFD_HEADER_BYTES: usize = 35;

/// Frame numbers cycled by VD mode 2 communications frames
pub const VD2_FRAME_NUMBERS: u8 = VD2_FRAME_TOTAL + 1;

fn new_frame() -> Result<[u8; YSF_FRAME_BYTES]> {
    let mut frame = [0u8; YSF_FRAME_BYTES];
    FrameMarker::Ysf.write(&mut frame)?;
    Ok(frame)
}

/// Header or terminator frame naming source and destination
pub fn build_lc_frame(
    fi: FrameIndicator,
    dt: YsfDataType,
    source: &str,
    dest: &str,
) -> Result<[u8; YSF_FRAME_BYTES]> {
    let mut frame = new_frame()?;
    let fich = Fich {
        frame_total: VD2_FRAME_TOTAL,
        ..Fich::new(fi, dt)
    };
    fich.encode(&mut frame)?;
    ysf_payload::write_callsigns(&mut frame, source, dest)?;
    Ok(frame)
}

/// VD mode 2 communications frame
pub fn build_vd2_frame(
    frame_number: u8,
    source: &str,
    dest: &str,
    voice: &[VoiceFrame; UNITS_PER_YSF_FRAME],
) -> Result<[u8; YSF_FRAME_BYTES]> {
    let mut frame = new_frame()?;
    let fich = Fich {
        frame_number,
        frame_total: VD2_FRAME_TOTAL,
        ..Fich::new(FrameIndicator::Communications, YsfDataType::VoiceData2)
    };
    fich.encode(&mut frame)?;
    let dch = ysf_payload::vd2_dch(frame_number, source, dest);
    ysf_payload::write_vd2(&mut frame, &dch, voice)?;
    Ok(frame)
}

/// Data full-rate frame, used for Wires-X signalling
pub fn build_data_fr_frame(
    fi: FrameIndicator,
    frame_number: u8,
    frame_total: u8,
    payload: &[u8; 40],
) -> Result<[u8; YSF_FRAME_BYTES]> {
    let mut frame = new_frame()?;
    let fich = Fich {
        frame_number,
        frame_total,
        ..Fich::new(fi, YsfDataType::DataFullRate)
    };
    fich.encode(&mut frame)?;
    ysf_payload::write_data_fr(&mut frame, payload)?;
    Ok(frame)
}

/// One `YSFD` network frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YsfdFrame {
    pub gateway: [u8; CALLSIGN_LENGTH],
    pub source: [u8; CALLSIGN_LENGTH],
    pub dest: [u8; CALLSIGN_LENGTH],
    /// 7-bit network frame counter
    pub counter: u8,
    pub eot: bool,
    pub frame: [u8; YSF_FRAME_BYTES],
}

impl YsfdFrame {
    pub fn new(gateway: &str, source: &str, dest: &str, counter: u8, eot: bool, frame: [u8; YSF_FRAME_BYTES]) -> Self {
        Self {
            gateway: callsign_field(gateway),
            source: callsign_field(source),
            dest: callsign_field(dest),
            counter: counter & 0x7F,
            eot,
            frame,
        }
    }

    pub fn parse(data: &[u8]) -> Result<Self> {
        GatewayError::check_len("YSFD frame", data, YSFD_FRAME_BYTES)?;
        if &data[..4] != YSFD_TAG {
            return Err(GatewayError::ProtocolDesync("missing YSFD tag".into()));
        }

        let mut gateway = [0u8; CALLSIGN_LENGTH];
        let mut source = [0u8; CALLSIGN_LENGTH];
        let mut dest = [0u8; CALLSIGN_LENGTH];
        gateway.copy_from_slice(&data[4..14]);
        source.copy_from_slice(&data[14..24]);
        dest.copy_from_slice(&data[24..34]);
        let mut frame = [0u8; YSF_FRAME_BYTES];
        frame.copy_from_slice(&data[YSFD_HEADER_BYTES..]);

        Ok(Self {
            gateway,
            source,
            dest,
            counter: data[34] >> 1,
            eot: data[34] & 0x01 != 0,
            frame,
        })
    }

    pub fn to_bytes(&self) -> [u8; YSFD_FRAME_BYTES] {
        let mut out = [0u8; YSFD_FRAME_BYTES];
        out[..4].copy_from_slice(YSFD_TAG);
        out[4..14].copy_from_slice(&self.gateway);
        out[14..24].copy_from_slice(&self.source);
        out[24..34].copy_from_slice(&self.dest);
        out[34] = (self.counter << 1) | self.eot as u8;
        out[YSFD_HEADER_BYTES..].copy_from_slice(&self.frame);
        out
    }

    pub fn source_callsign(&self) -> String {
        ysf_payload::callsign_text(&self.source)
    }

    pub fn dest_callsign(&self) -> String {
        ysf_payload::callsign_text(&self.dest)
    }

    /// FICH of the carried frame, `None` when it cannot be decoded
    pub fn fich(&self) -> Option<Fich> {
        Fich::decode(&self.frame).ok()
    }
}

/// Reflector poll / registration frame
pub fn build_poll(callsign: &str) -> [u8; 14] {
    let mut out = [0u8; 14];
    out[..4].copy_from_slice(YSFP_TAG);
    out[4..].copy_from_slice(&callsign_field(callsign));
    out
}

/// Reflector unlink frame
pub fn build_unlink(callsign: &str) -> [u8; 14] {
    let mut out = [0u8; 14];
    out[..4].copy_from_slice(YSFU_TAG);
    out[4..].copy_from_slice(&callsign_field(callsign));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_frame() {
        let frame = build_lc_frame(FrameIndicator::Header, YsfDataType::VoiceData2, "M0ABC", "ALL").unwrap();
        assert!(FrameMarker::Ysf.matches(&frame, 0));
        let fich = Fich::decode(&frame).unwrap();
        assert_eq!(fich.fi, FrameIndicator::Header);
        assert_eq!(fich.dt, YsfDataType::VoiceData2);
        assert_eq!(ysf_payload::read_source_callsign(&frame).unwrap(), "M0ABC");
    }

    #[test]
    fn test_vd2_frame() {
        let voice = [VoiceFrame::from_fields(0x111, 0x222, 0x333); 5];
        let frame = build_vd2_frame(3, "M0ABC", "ALL", &voice).unwrap();
        let fich = Fich::decode(&frame).unwrap();
        assert_eq!(fich.fi, FrameIndicator::Communications);
        assert_eq!(fich.frame_number, 3);
        assert_eq!(fich.frame_total, VD2_FRAME_TOTAL);
        assert_eq!(ysf_payload::read_vd2_voice(&frame).unwrap(), voice);
    }

    #[test]
    fn test_ysfd_round_trip() {
        let frame = build_lc_frame(FrameIndicator::Terminator, YsfDataType::VoiceData2, "M0ABC", "ALL").unwrap();
        let ysfd = YsfdFrame::new("gw1", "m0abc", "ALL", 0x45, true, frame);
        let bytes = ysfd.to_bytes();
        assert_eq!(&bytes[..4], b"YSFD");
        assert_eq!(&bytes[4..14], b"GW1       ");
        assert_eq!(bytes[34], 0x8B);
        let parsed = YsfdFrame::parse(&bytes).unwrap();
        assert_eq!(parsed, ysfd);
        assert_eq!(parsed.source_callsign(), "M0ABC");
        assert_eq!(parsed.fich().unwrap().fi, FrameIndicator::Terminator);
    }

    #[test]
    fn test_ysfd_rejects_bad_input() {
        assert!(YsfdFrame::parse(&[0u8; 154]).is_err());
        let mut bytes = [0u8; YSFD_FRAME_BYTES];
        bytes[..4].copy_from_slice(b"YSFP");
        assert!(matches!(
            YsfdFrame::parse(&bytes),
            Err(GatewayError::ProtocolDesync(_))
        ));
    }

    #[test]
    fn test_poll_and_unlink() {
        assert_eq!(&build_poll("m0abc"), b"YSFPM0ABC     ");
        assert_eq!(&build_unlink("M0ABC")[..4], b"YSFU");
    }
}
