//! Wires-X room control messages
//!
//! Room connect and disconnect requests are short byte messages sent to the
//! reflector inside YSF data full-rate frames: a header frame, one or more
//! communications frames carrying 40 payload bytes each, and a terminator.

use log::debug;

use crate::crc;
use crate::error::{GatewayError, Result};
use crate::ysf::{self, YSF_FRAME_BYTES};
use crate::ysf_fich::{Fich, FrameIndicator, YsfDataType};
use crate::ysf_payload::{self, callsign_field, CALLSIGN_LENGTH, CSD_BYTES};

pub const DX_REQ: [u8; 3] = [0x5D, 0x71, 0x5F];
pub const CONN_REQ: [u8; 3] = [0x5D, 0x23, 0x5F];
pub const DISC_REQ: [u8; 3] = [0x5D, 0x2A, 0x5F];
pub const CONN_RESP: [u8; 3] = [0x5D, 0x41, 0x5F];

pub const NODE_ID_LENGTH: usize = 5;
const ROOM_DIGITS: usize = 5;
const END_MARKER: u8 = 0x03;
/// Sequence, code, node id and callsign
const HEADER_BYTES: usize = 1 + 3 + NODE_ID_LENGTH + CALLSIGN_LENGTH;
const FR_PAYLOAD_BYTES: usize = 2 * CSD_BYTES;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    DxRequest,
    Connect(u32),
    Disconnect,
    ConnectReply(u32),
}

impl Command {
    fn code(&self) -> [u8; 3] {
        match self {
            Command::DxRequest => DX_REQ,
            Command::Connect(_) => CONN_REQ,
            Command::Disconnect => DISC_REQ,
            Command::ConnectReply(_) => CONN_RESP,
        }
    }

    fn room(&self) -> Option<u32> {
        match self {
            Command::Connect(room) | Command::ConnectReply(room) => Some(*room),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub seq: u8,
    pub command: Command,
    pub node_id: [u8; NODE_ID_LENGTH],
    pub callsign: [u8; CALLSIGN_LENGTH],
}

impl Message {
    pub fn new(seq: u8, command: Command, node_id: &str, callsign: &str) -> Self {
        let mut id = [b' '; NODE_ID_LENGTH];
        for (dst, src) in id.iter_mut().zip(node_id.bytes()) {
            *dst = src;
        }
        Self {
            seq,
            command,
            node_id: id,
            callsign: callsign_field(callsign),
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_BYTES + ROOM_DIGITS + 2);
        out.push(self.seq);
        out.extend_from_slice(&self.command.code());
        out.extend_from_slice(&self.node_id);
        out.extend_from_slice(&self.callsign);
        if let Some(room) = self.command.room() {
            out.extend_from_slice(format!("{:05}", room % 100_000).as_bytes());
        }
        out.push(END_MARKER);
        out.push(crc::byte_sum(&out));
        out
    }

    /// Parse a message, ignoring any padding after the checksum
    pub fn parse(data: &[u8]) -> Result<Self> {
        GatewayError::check_min_len("Wires-X message", data, HEADER_BYTES + 2)?;

        let code = [data[1], data[2], data[3]];
        let len = match code {
            CONN_REQ | CONN_RESP => HEADER_BYTES + ROOM_DIGITS + 2,
            DX_REQ | DISC_REQ => HEADER_BYTES + 2,
            other => {
                return Err(GatewayError::ProtocolDesync(format!(
                    "unknown Wires-X code {:02X?}",
                    other
                )))
            }
        };
        GatewayError::check_min_len("Wires-X message", data, len)?;

        let body = &data[..len - 1];
        if crc::byte_sum(body) != data[len - 1] {
            return Err(GatewayError::ProtocolDesync("Wires-X checksum mismatch".into()));
        }
        if body[len - 2] != END_MARKER {
            return Err(GatewayError::ProtocolDesync("Wires-X end marker missing".into()));
        }

        let room = || -> Result<u32> {
            std::str::from_utf8(&body[HEADER_BYTES..HEADER_BYTES + ROOM_DIGITS])
                .ok()
                .and_then(|s| s.parse().ok())
                .ok_or_else(|| GatewayError::ProtocolDesync("Wires-X room not numeric".into()))
        };
        let command = match code {
            CONN_REQ => Command::Connect(room()?),
            CONN_RESP => Command::ConnectReply(room()?),
            DX_REQ => Command::DxRequest,
            _ => Command::Disconnect,
        };

        let mut node_id = [0u8; NODE_ID_LENGTH];
        node_id.copy_from_slice(&data[4..4 + NODE_ID_LENGTH]);
        let mut callsign = [0u8; CALLSIGN_LENGTH];
        callsign.copy_from_slice(&data[4 + NODE_ID_LENGTH..HEADER_BYTES]);

        Ok(Self {
            seq: data[0],
            command,
            node_id,
            callsign,
        })
    }
}

/// Wrap a message into header, communications and terminator frames
pub fn build_frames(message: &Message, source: &str) -> Result<Vec<[u8; YSF_FRAME_BYTES]>> {
    let bytes = message.to_bytes();
    let chunks: Vec<&[u8]> = bytes.chunks(FR_PAYLOAD_BYTES).collect();
    let frame_total = (chunks.len() - 1) as u8;

    let mut frames = Vec::with_capacity(chunks.len() + 2);
    frames.push(ysf::build_lc_frame(
        FrameIndicator::Header,
        YsfDataType::DataFullRate,
        source,
        "ALL",
    )?);
    for (n, chunk) in chunks.iter().enumerate() {
        let mut payload = [0u8; FR_PAYLOAD_BYTES];
        payload[..chunk.len()].copy_from_slice(chunk);
        frames.push(ysf::build_data_fr_frame(
            FrameIndicator::Communications,
            n as u8,
            frame_total,
            &payload,
        )?);
    }
    frames.push(ysf::build_lc_frame(
        FrameIndicator::Terminator,
        YsfDataType::DataFullRate,
        source,
        "ALL",
    )?);
    Ok(frames)
}

/// Collects data full-rate payloads until a terminator completes a message
#[derive(Debug, Default)]
pub struct Reassembler {
    buffer: Vec<u8>,
    active: bool,
}

impl Reassembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a decoded data full-rate frame; returns a message on the terminator
    pub fn add_frame(&mut self, fich: &Fich, frame: &[u8]) -> Option<Message> {
        if fich.dt != YsfDataType::DataFullRate {
            return None;
        }
        match fich.fi {
            FrameIndicator::Header => {
                self.buffer.clear();
                self.active = true;
                None
            }
            FrameIndicator::Communications if self.active => {
                match ysf_payload::read_data_fr(frame) {
                    Ok(payload) => self.buffer.extend_from_slice(&payload),
                    Err(e) => {
                        debug!("Wires-X: dropped frame: {}", e);
                        self.active = false;
                    }
                }
                None
            }
            FrameIndicator::Terminator if self.active => {
                self.active = false;
                let buffer = std::mem::take(&mut self.buffer);
                match Message::parse(&buffer) {
                    Ok(message) => Some(message),
                    Err(e) => {
                        debug!("Wires-X: {}", e);
                        None
                    }
                }
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_request_layout() {
        let msg = Message::new(1, Command::Connect(21080), "12345", "m0abc");
        let bytes = msg.to_bytes();
        assert_eq!(bytes[0], 1);
        assert_eq!(&bytes[1..4], &CONN_REQ);
        assert_eq!(&bytes[4..9], b"12345");
        assert_eq!(&bytes[9..19], b"M0ABC     ");
        assert_eq!(&bytes[19..24], b"21080");
        assert_eq!(bytes[24], 0x03);
        assert_eq!(bytes[25], crc::byte_sum(&bytes[..25]));
        assert_eq!(Message::parse(&bytes).unwrap(), msg);
    }

    #[test]
    fn test_disconnect_has_no_room() {
        let msg = Message::new(2, Command::Disconnect, "12345", "M0ABC");
        let bytes = msg.to_bytes();
        assert_eq!(bytes.len(), 21);
        assert_eq!(Message::parse(&bytes).unwrap().command, Command::Disconnect);
    }

    #[test]
    fn test_checksum_detected() {
        let mut bytes = Message::new(3, Command::DxRequest, "1", "M0ABC").to_bytes();
        bytes[5] ^= 0x01;
        assert!(Message::parse(&bytes).is_err());
        assert!(Message::parse(&[0x5D; 4]).is_err());
    }

    #[test]
    fn test_frames_round_trip() {
        let msg = Message::new(7, Command::ConnectReply(31337), "00042", "REFLECTOR");
        let frames = build_frames(&msg, "M0ABC").unwrap();
        assert_eq!(frames.len(), 3);

        let mut reassembler = Reassembler::new();
        let mut result = None;
        for frame in &frames {
            let fich = Fich::decode(frame).unwrap();
            assert_eq!(fich.dt, YsfDataType::DataFullRate);
            if let Some(m) = reassembler.add_frame(&fich, frame) {
                result = Some(m);
            }
        }
        assert_eq!(result, Some(msg));
    }

    #[test]
    fn test_terminator_without_header_ignored() {
        let msg = Message::new(1, Command::Disconnect, "1", "A");
        let frames = build_frames(&msg, "M0ABC").unwrap();
        let mut reassembler = Reassembler::new();
        let last = frames.last().unwrap();
        let fich = Fich::decode(last).unwrap();
        assert_eq!(reassembler.add_frame(&fich, last), None);
    }
}
