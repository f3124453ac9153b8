//! DMR burst assembly and the Homebrew `DMRD` network frame

use crate::ambe::{self, VoiceFrame, UNITS_PER_DMR_BURST};
use crate::bits;
use crate::dmr_embedded::{self, Lcss, FRAGMENT_BYTES, FRAGMENT_COUNT};
use crate::dmr_lc::{self, LinkControl};
use crate::error::{GatewayError, Result};
use crate::golay;
use crate::qr1676;
use crate::sync::FrameMarker;

pub const DMR_BURST_BYTES: usize = 33;

/// Voice bursts per superframe (A-F)
pub const BURSTS_PER_SUPERFRAME: u32 = 6;

pub const DMRD_TAG: &[u8; 4] = b"DMRD";
pub const DMRD_FRAME_BYTES: usize = 53;
/// MMDVMHost may append BER and RSSI
pub const DMRD_FRAME_BYTES_EXTENDED: usize = 55;

const SLOT_TYPE_RUNS: [(usize, usize); 2] = [(98, 10), (156, 10)];
const EMB_RUNS: [(usize, usize); 2] = [(108, 8), (148, 8)];

/// Data type carried in the slot type field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    VoiceLcHeader = 1,
    TerminatorWithLc = 2,
    Csbk = 3,
    Idle = 9,
}

impl DataType {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(DataType::VoiceLcHeader),
            2 => Some(DataType::TerminatorWithLc),
            3 => Some(DataType::Csbk),
            9 => Some(DataType::Idle),
            _ => None,
        }
    }
}

/// Colour code and data type of a data burst, Golay (20,8) protected
pub fn write_slot_type(burst: &mut [u8], color_code: u8, data_type: DataType) {
    let word = golay::encode_20_8(((color_code & 0x0F) << 4) | data_type as u8);
    let mut n = 0;
    for &(start, len) in SLOT_TYPE_RUNS.iter() {
        for i in 0..len {
            bits::write_bit(burst, start + i, (word >> (19 - n)) & 1 == 1);
            n += 1;
        }
    }
}

pub fn read_slot_type(burst: &[u8]) -> (u8, Option<DataType>) {
    let mut word = 0u32;
    for &(start, len) in SLOT_TYPE_RUNS.iter() {
        word = (word << len) | bits::read_bits(burst, start, len);
    }
    let value = golay::decode_20_8(word);
    (value >> 4, DataType::from_u8(value & 0x0F))
}

/// Embedded signalling word of a voice burst B-F
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Emb {
    pub color_code: u8,
    pub pi: bool,
    pub lcss: Lcss,
}

impl Emb {
    pub fn write(&self, burst: &mut [u8]) {
        let data = ((self.color_code & 0x0F) << 3) | ((self.pi as u8) << 2) | self.lcss as u8;
        let word = qr1676::encode(data) as u32;
        let mut n = 0;
        for &(start, len) in EMB_RUNS.iter() {
            bits::write_bits(burst, start, len, (word >> (16 - n - len)) & 0xFF);
            n += len;
        }
    }

    pub fn read(burst: &[u8]) -> Option<Self> {
        let word = EMB_RUNS
            .iter()
            .fold(0u32, |acc, &(start, len)| (acc << len) | bits::read_bits(burst, start, len));
        let data = qr1676::decode(word as u16)?;
        Some(Self {
            color_code: data >> 3,
            pi: data & 0x04 != 0,
            lcss: Lcss::from_bits(data),
        })
    }
}

/// Silence bursts needed to end a transmission on a superframe boundary
pub fn superframe_fill(bursts: u32) -> u32 {
    (BURSTS_PER_SUPERFRAME - bursts % BURSTS_PER_SUPERFRAME) % BURSTS_PER_SUPERFRAME
}

/// Voice LC header or terminator burst
pub fn build_lc_burst(
    lc: &LinkControl,
    data_type: DataType,
    color_code: u8,
) -> Result<[u8; DMR_BURST_BYTES]> {
    let mut burst = [0u8; DMR_BURST_BYTES];
    dmr_lc::encode_full_lc(lc, data_type, &mut burst)?;
    write_slot_type(&mut burst, color_code, data_type);
    FrameMarker::DmrBsData.write(&mut burst)?;
    Ok(burst)
}

/// Voice burst `voice_seq` (0 = A ... 5 = F) of a superframe
pub fn build_voice_burst(
    frames: &[VoiceFrame; UNITS_PER_DMR_BURST],
    voice_seq: u8,
    color_code: u8,
    embedded: &[[u8; FRAGMENT_BYTES]; FRAGMENT_COUNT],
) -> Result<[u8; DMR_BURST_BYTES]> {
    let mut burst = [0u8; DMR_BURST_BYTES];
    ambe::write_dmr_burst(&mut burst, frames)?;

    match voice_seq {
        0 => FrameMarker::DmrBsVoice.write(&mut burst)?,
        1..=4 => {
            let index = (voice_seq - 1) as usize;
            Emb {
                color_code,
                pi: false,
                lcss: Lcss::for_fragment(index),
            }
            .write(&mut burst);
            dmr_embedded::write_fragment(&mut burst, &embedded[index]);
        }
        5 => {
            Emb {
                color_code,
                pi: false,
                lcss: Lcss::Single,
            }
            .write(&mut burst);
            dmr_embedded::write_fragment(&mut burst, &[0u8; FRAGMENT_BYTES]);
        }
        other => {
            return Err(GatewayError::ProtocolDesync(format!(
                "voice sequence {} outside superframe",
                other
            )))
        }
    }
    Ok(burst)
}

/// Frame type bits of the DMRD flags byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameType {
    Voice,
    VoiceSync,
    DataSync,
}

impl FrameType {
    fn bits(&self) -> u8 {
        match self {
            FrameType::Voice => 0,
            FrameType::VoiceSync => 1,
            FrameType::DataSync => 2,
        }
    }

    fn from_bits(value: u8) -> Result<Self> {
        match value {
            0 => Ok(FrameType::Voice),
            1 => Ok(FrameType::VoiceSync),
            2 => Ok(FrameType::DataSync),
            other => Err(GatewayError::ProtocolDesync(format!(
                "DMRD frame type {}",
                other
            ))),
        }
    }
}

/// One Homebrew `DMRD` frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DmrdFrame {
    pub seq: u8,
    pub src_id: u32,
    pub dst_id: u32,
    pub repeater_id: u32,
    /// Timeslot, 1 or 2
    pub slot: u8,
    pub private_call: bool,
    pub frame_type: FrameType,
    /// Data type for data sync frames, voice sequence 0-5 otherwise
    pub data_type_or_seq: u8,
    pub stream_id: u32,
    pub burst: [u8; DMR_BURST_BYTES],
}

impl DmrdFrame {
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() != DMRD_FRAME_BYTES && data.len() != DMRD_FRAME_BYTES_EXTENDED {
            return Err(GatewayError::FrameLength {
                what: "DMRD frame",
                expected: DMRD_FRAME_BYTES,
                actual: data.len(),
            });
        }
        if &data[..4] != DMRD_TAG {
            return Err(GatewayError::ProtocolDesync("missing DMRD tag".into()));
        }

        let flags = data[15];
        let mut burst = [0u8; DMR_BURST_BYTES];
        burst.copy_from_slice(&data[20..20 + DMR_BURST_BYTES]);

        Ok(Self {
            seq: data[4],
            src_id: u32::from_be_bytes([0, data[5], data[6], data[7]]),
            dst_id: u32::from_be_bytes([0, data[8], data[9], data[10]]),
            repeater_id: u32::from_be_bytes([data[11], data[12], data[13], data[14]]),
            slot: if flags & 0x80 != 0 { 2 } else { 1 },
            private_call: flags & 0x40 != 0,
            frame_type: FrameType::from_bits((flags >> 4) & 0x03)?,
            data_type_or_seq: flags & 0x0F,
            stream_id: u32::from_be_bytes([data[16], data[17], data[18], data[19]]),
            burst,
        })
    }

    pub fn to_bytes(&self) -> [u8; DMRD_FRAME_BYTES] {
        let mut out = [0u8; DMRD_FRAME_BYTES];
        out[..4].copy_from_slice(DMRD_TAG);
        out[4] = self.seq;
        out[5..8].copy_from_slice(&self.src_id.to_be_bytes()[1..]);
        out[8..11].copy_from_slice(&self.dst_id.to_be_bytes()[1..]);
        out[11..15].copy_from_slice(&self.repeater_id.to_be_bytes());

        let mut flags = (self.frame_type.bits() << 4) | (self.data_type_or_seq & 0x0F);
        if self.slot == 2 {
            flags |= 0x80;
        }
        if self.private_call {
            flags |= 0x40;
        }
        out[15] = flags;
        out[16..20].copy_from_slice(&self.stream_id.to_be_bytes());
        out[20..].copy_from_slice(&self.burst);
        out
    }

    /// Data type of a data sync frame
    pub fn data_type(&self) -> Option<DataType> {
        match self.frame_type {
            FrameType::DataSync => DataType::from_u8(self.data_type_or_seq),
            _ => None,
        }
    }

    /// Position in the superframe of a voice frame
    pub fn voice_seq(&self) -> Option<u8> {
        match self.frame_type {
            FrameType::Voice | FrameType::VoiceSync => Some(self.data_type_or_seq),
            FrameType::DataSync => None,
        }
    }
}
