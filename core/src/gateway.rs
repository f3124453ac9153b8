//! Gateway session: moves voice streams between the DMR and YSF networks
//!
//! Each direction has an inbound state (idle or receiving a stream) and an
//! outbound transmitter fed by the [`ModeConverter`] at the destination
//! protocol's frame rate. Everything runs from [`Gateway::clock`], driven by
//! elapsed time, so a test can step the whole gateway with synthetic time.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use tokio_util::sync::CancellationToken;

use crate::ambe::{VoiceFrame, UNITS_PER_DMR_BURST};
use crate::config::GatewayConfig;
use crate::convert::ModeConverter;
use crate::dmr::{self, DataType, DmrdFrame, Emb, FrameType, BURSTS_PER_SUPERFRAME, DMR_BURST_BYTES};
use crate::dmr_embedded::{self, EmbeddedLcDecoder, FRAGMENT_BYTES, FRAGMENT_COUNT};
use crate::dmr_lc::{self, LinkControl};
use crate::error::{GatewayError, Result};
use crate::lookup::{DmrIdTable, IdLookup};
use crate::network::{DmrNetwork, YsfNetwork};
use crate::queue::FrameTag;
use crate::routing::{RoomLink, RouteAction, RouteTable};
use crate::timer::{Pacer, Timer};
use crate::transport::UdpTransport;
use crate::wiresx::{self, Command, Message, Reassembler};
use crate::ysf::{self, YsfdFrame, VD2_FRAME_NUMBERS, YSF_FRAME_BYTES};
use crate::ysf_fich::{FrameIndicator, YsfDataType};
use crate::ysf_payload::UNITS_PER_YSF_FRAME;

/// Loop sleep when nothing arrived
const IDLE_SLEEP: Duration = Duration::from_millis(5);
const YSF_DEST_ALL: &str = "ALL";

/// A stream being received from one of the networks
#[derive(Debug)]
pub struct StreamSession {
    stream_id: u32,
    src_id: u32,
    dst_id: u32,
    source: String,
    dest: String,
    frames: u32,
    missing_frames: u32,
    last_seq: Option<u8>,
    late_entry: bool,
    duration: Duration,
    embedded: EmbeddedLcDecoder,
}

impl StreamSession {
    fn new(stream_id: u32, src_id: u32, dst_id: u32, source: String, dest: String, late_entry: bool) -> Self {
        Self {
            stream_id,
            src_id,
            dst_id,
            source,
            dest,
            frames: 0,
            missing_frames: 0,
            last_seq: None,
            late_entry,
            duration: Duration::ZERO,
            embedded: EmbeddedLcDecoder::new(),
        }
    }

    /// Record the sequence number of a voice frame, returning how many were
    /// skipped, or `None` for a repeat of the previous frame
    fn note_sequence(&mut self, seq: u8, modulus: u8) -> Option<u8> {
        let missing = match self.last_seq {
            Some(last) if last == seq => return None,
            Some(last) => (seq + modulus - (last + 1) % modulus) % modulus,
            None => 0,
        };
        self.last_seq = Some(seq);
        self.frames += 1;
        self.missing_frames += missing as u32;
        Some(missing)
    }

    pub fn stream_id(&self) -> u32 {
        self.stream_id
    }

    pub fn src_id(&self) -> u32 {
        self.src_id
    }

    pub fn dst_id(&self) -> u32 {
        self.dst_id
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn dest(&self) -> &str {
        &self.dest
    }

    /// Voice frames received
    pub fn frames(&self) -> u32 {
        self.frames
    }

    pub fn missing_frames(&self) -> u32 {
        self.missing_frames
    }

    pub fn is_late_entry(&self) -> bool {
        self.late_entry
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }
}

#[derive(Debug)]
enum Rx {
    Idle,
    Active(StreamSession),
}

impl Rx {
    fn session(&self) -> Option<&StreamSession> {
        match self {
            Rx::Idle => None,
            Rx::Active(session) => Some(session),
        }
    }
}

#[derive(Debug)]
struct DmrTx {
    stream_id: u32,
    lc: LinkControl,
    embedded: [[u8; FRAGMENT_BYTES]; FRAGMENT_COUNT],
    bursts: u32,
}

#[derive(Debug)]
struct YsfTx {
    source: String,
    dest: String,
    frame_number: u8,
}

fn network_lc(frame: &DmrdFrame) -> LinkControl {
    if frame.private_call {
        LinkControl::private(frame.src_id, frame.dst_id)
    } else {
        LinkControl::group(frame.src_id, frame.dst_id)
    }
}

fn log_frame_error(side: &str, e: &GatewayError) {
    match e {
        GatewayError::ProtocolDesync(_) | GatewayError::FrameLength { .. } => {
            debug!("Gateway: dropped {} frame: {}", side, e)
        }
        _ => warn!("Gateway: {} frame failed: {}", side, e),
    }
}

pub struct Gateway {
    dmr: DmrNetwork,
    ysf: YsfNetwork,
    converter: ModeConverter,
    lookup: Box<dyn IdLookup>,
    routes: RouteTable,
    room_link: RoomLink,
    wiresx_rx: Reassembler,
    wiresx_seq: u8,

    callsign: String,
    dmr_id: u32,
    slot: u8,
    color_code: u8,
    /// Destination of YSF traffic on the DMR side
    talkgroup: u32,

    dmr_rx: Rx,
    ysf_rx: Rx,
    dmr_watchdog: Timer,
    ysf_watchdog: Timer,

    dmr_tx: Option<DmrTx>,
    ysf_tx: Option<YsfTx>,
    /// Identities of streams queued in the converter, oldest first
    pending_dmr: VecDeque<LinkControl>,
    pending_ysf: VecDeque<(String, String)>,
    dmr_pacer: Pacer,
    ysf_pacer: Pacer,
    dmr_seq: u8,
    ysf_counter: u8,
}

impl Gateway {
    pub fn new(
        config: &GatewayConfig,
        dmr: DmrNetwork,
        ysf: YsfNetwork,
        lookup: Box<dyn IdLookup>,
        routes: RouteTable,
    ) -> Self {
        Self {
            dmr,
            ysf,
            converter: ModeConverter::new(),
            lookup,
            routes,
            room_link: RoomLink::new(config.link_timeout()),
            wiresx_rx: Reassembler::new(),
            wiresx_seq: 0,
            callsign: config.ysf_callsign(),
            dmr_id: config.general.dmr_id,
            slot: config.dmr.slot,
            color_code: config.dmr.color_code,
            talkgroup: config.dmr.startup_tg,
            dmr_rx: Rx::Idle,
            ysf_rx: Rx::Idle,
            dmr_watchdog: Timer::new(config.watchdog()),
            ysf_watchdog: Timer::new(config.watchdog()),
            dmr_tx: None,
            ysf_tx: None,
            pending_dmr: VecDeque::new(),
            pending_ysf: VecDeque::new(),
            dmr_pacer: Pacer::new(config.dmr_period()),
            ysf_pacer: Pacer::new(config.ysf_period()),
            dmr_seq: 0,
            ysf_counter: 0,
        }
    }

    /// Build a gateway on UDP transports, loading the ID and route files
    pub fn from_config(config: &GatewayConfig) -> Result<Self> {
        let lookup: Box<dyn IdLookup> = match &config.lookup.file {
            Some(path) => Box::new(DmrIdTable::load(path)?),
            None => Box::new(DmrIdTable::new()),
        };
        let routes = match &config.routing.file {
            Some(path) => RouteTable::load(path, config.routing.unlink_tg)?,
            None => RouteTable::new(config.routing.unlink_tg),
        };
        let dmr = DmrNetwork::new(Box::new(UdpTransport::new(
            config.dmr_local_addr()?,
            config.dmr_remote_addr()?,
        )));
        let ysf = YsfNetwork::new(
            Box::new(UdpTransport::new(config.ysf_local_addr()?, config.ysf_remote_addr()?)),
            &config.ysf_callsign(),
        );
        Ok(Self::new(config, dmr, ysf, lookup, routes))
    }

    pub fn open(&mut self) -> Result<()> {
        self.dmr.open()?;
        self.ysf.open()?;
        info!(
            "Gateway: {} (DMR ID {}) running on slot {}, startup TG {}",
            self.callsign, self.dmr_id, self.slot, self.talkgroup
        );
        Ok(())
    }

    /// Run until `cancel` fires. Failing to open either network is fatal.
    pub fn run(&mut self, cancel: &CancellationToken) -> Result<()> {
        self.open()?;
        let mut last = Instant::now();
        while !cancel.is_cancelled() {
            let now = Instant::now();
            let busy = self.clock(now.duration_since(last));
            last = now;
            if !busy {
                std::thread::sleep(IDLE_SLEEP);
            }
        }
        info!("Gateway: shutting down");
        self.close();
        Ok(())
    }

    /// Finish any transmission in progress and close both networks
    pub fn close(&mut self) {
        if let Err(e) = self.finish_dmr_tx() {
            warn!("Gateway: DMR terminator failed: {}", e);
        }
        if let Err(e) = self.finish_ysf_tx() {
            warn!("Gateway: YSF terminator failed: {}", e);
        }
        if self.room_link.room().is_some() {
            if let Err(e) = self.send_wiresx(Command::Disconnect) {
                warn!("Wires-X: disconnect failed: {}", e);
            }
        }
        self.dmr.close();
        self.ysf.close();
    }

    /// Advance the gateway by `elapsed`: handle inbound frames, run the
    /// watchdogs and emit whatever the pacers allow. Returns true when
    /// any inbound frame was handled.
    pub fn clock(&mut self, elapsed: Duration) -> bool {
        self.dmr.clock(elapsed);
        if let Err(e) = self.ysf.clock(elapsed) {
            warn!("Gateway: YSF poll failed: {}", e);
        }
        if let Err(e) = self.room_link.clock(elapsed) {
            warn!("Gateway: {}", e);
        }

        // Count the step before draining so a frame read now re-arms the watchdog
        self.advance_watchdogs(elapsed);
        let handled = self.drain_dmr() + self.drain_ysf();
        self.check_watchdogs();

        self.dmr_pacer.clock(elapsed);
        while self.dmr_pacer.tick() {
            match self.emit_dmr() {
                Ok(true) => {}
                Ok(false) => {
                    self.dmr_pacer.reset();
                    break;
                }
                Err(e) => warn!("Gateway: DMR transmit failed: {}", e),
            }
        }
        self.ysf_pacer.clock(elapsed);
        while self.ysf_pacer.tick() {
            match self.emit_ysf() {
                Ok(true) => {}
                Ok(false) => {
                    self.ysf_pacer.reset();
                    break;
                }
                Err(e) => warn!("Gateway: YSF transmit failed: {}", e),
            }
        }
        handled > 0
    }

    /// Stream currently received from the DMR side
    pub fn dmr_session(&self) -> Option<&StreamSession> {
        self.dmr_rx.session()
    }

    /// Stream currently received from the YSF side
    pub fn ysf_session(&self) -> Option<&StreamSession> {
        self.ysf_rx.session()
    }

    pub fn linked_room(&self) -> Option<u32> {
        self.room_link.room()
    }

    pub fn is_link_confirmed(&self) -> bool {
        self.room_link.is_confirmed()
    }

    /// Talkgroup YSF traffic is sent to
    pub fn talkgroup(&self) -> u32 {
        self.talkgroup
    }

    fn advance_watchdogs(&mut self, elapsed: Duration) {
        if let Rx::Active(session) = &mut self.dmr_rx {
            session.duration += elapsed;
        }
        if let Rx::Active(session) = &mut self.ysf_rx {
            session.duration += elapsed;
        }
        self.dmr_watchdog.clock(elapsed);
        self.ysf_watchdog.clock(elapsed);
    }

    fn check_watchdogs(&mut self) {
        if self.dmr_watchdog.has_expired() {
            warn!("Gateway: DMR watchdog expired");
            if let Err(e) = self.end_dmr_stream("watchdog") {
                warn!("Gateway: {}", e);
            }
        }
        if self.ysf_watchdog.has_expired() {
            warn!("Gateway: YSF watchdog expired");
            if let Err(e) = self.end_ysf_stream("watchdog") {
                warn!("Gateway: {}", e);
            }
        }
    }

    fn drain_dmr(&mut self) -> usize {
        let mut handled = 0;
        loop {
            match self.dmr.read() {
                Ok(Some(frame)) => {
                    handled += 1;
                    if let Err(e) = self.handle_dmr(&frame) {
                        log_frame_error("DMR", &e);
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    warn!("Gateway: DMR network read failed: {}", e);
                    break;
                }
            }
        }
        handled
    }

    fn drain_ysf(&mut self) -> usize {
        let mut handled = 0;
        loop {
            match self.ysf.read() {
                Ok(Some(frame)) => {
                    handled += 1;
                    if let Err(e) = self.handle_ysf(&frame) {
                        log_frame_error("YSF", &e);
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    warn!("Gateway: YSF network read failed: {}", e);
                    break;
                }
            }
        }
        handled
    }

    // DMR -> YSF

    fn dmr_rx_is(&self, stream_id: u32) -> bool {
        matches!(&self.dmr_rx, Rx::Active(s) if s.stream_id == stream_id)
    }

    fn handle_dmr(&mut self, frame: &DmrdFrame) -> Result<()> {
        if frame.slot != self.slot {
            debug!("Gateway: ignored DMR frame on slot {}", frame.slot);
            return Ok(());
        }
        match frame.frame_type {
            FrameType::DataSync => match frame.data_type() {
                Some(DataType::VoiceLcHeader) => self.dmr_header(frame),
                Some(DataType::TerminatorWithLc) => {
                    if self.dmr_rx_is(frame.stream_id) {
                        self.end_dmr_stream("end of transmission")?;
                    }
                    Ok(())
                }
                other => {
                    debug!("Gateway: ignored DMR data burst {:?}", other);
                    Ok(())
                }
            },
            FrameType::Voice | FrameType::VoiceSync => self.dmr_voice(frame),
        }
    }

    fn dmr_header(&mut self, frame: &DmrdFrame) -> Result<()> {
        if self.dmr_rx_is(frame.stream_id) {
            debug!("Gateway: repeated DMR header for stream {:08X}", frame.stream_id);
            return Ok(());
        }
        if matches!(self.dmr_rx, Rx::Active(_)) {
            self.end_dmr_stream("superseded by a new stream")?;
        }
        let lc = match dmr_lc::decode_full_lc(&frame.burst, DataType::VoiceLcHeader) {
            Ok(lc) => lc,
            Err(e) => {
                debug!("Gateway: header LC unreadable ({}), using network ids", e);
                network_lc(frame)
            }
        };
        self.start_dmr_stream(frame.stream_id, &lc, false)
    }

    fn start_dmr_stream(&mut self, stream_id: u32, lc: &LinkControl, late_entry: bool) -> Result<()> {
        let source = self.lookup.find_callsign(lc.src_id);
        let dest = if lc.private_call {
            self.lookup.find_callsign(lc.dst_id)
        } else {
            format!("TG {}", lc.dst_id)
        };
        info!(
            "Gateway: DMR {} from {} ({}) to {}",
            if late_entry { "late entry" } else { "stream" },
            source,
            lc.src_id,
            dest
        );

        self.converter.put_dmr_header()?;
        self.pending_ysf.push_back((source.clone(), YSF_DEST_ALL.to_string()));
        self.dmr_rx = Rx::Active(StreamSession::new(
            stream_id, lc.src_id, lc.dst_id, source, dest, late_entry,
        ));
        self.dmr_watchdog.start();

        if !lc.private_call {
            self.route(lc.dst_id);
        }
        Ok(())
    }

    fn dmr_voice(&mut self, frame: &DmrdFrame) -> Result<()> {
        let seq = frame
            .voice_seq()
            .filter(|&s| (s as u32) < BURSTS_PER_SUPERFRAME)
            .ok_or_else(|| GatewayError::ProtocolDesync("DMR voice sequence out of range".into()))?;

        if !self.dmr_rx_is(frame.stream_id) {
            if frame.frame_type != FrameType::VoiceSync {
                debug!("Gateway: DMR voice without header, waiting for sync");
                return Ok(());
            }
            if matches!(self.dmr_rx, Rx::Active(_)) {
                self.end_dmr_stream("superseded by a new stream")?;
            }
            self.start_dmr_stream(frame.stream_id, &network_lc(frame), true)?;
        }

        let Rx::Active(session) = &mut self.dmr_rx else {
            return Ok(());
        };
        let Some(missing) = session.note_sequence(seq, BURSTS_PER_SUPERFRAME as u8) else {
            debug!("Gateway: repeated DMR burst {} in stream {:08X}", seq, session.stream_id);
            return Ok(());
        };
        let embedded = if (1..=4).contains(&seq) {
            Emb::read(&frame.burst).and_then(|emb| {
                session
                    .embedded
                    .add_fragment(emb.lcss, &dmr_embedded::read_fragment(&frame.burst))
            })
        } else {
            None
        };
        let identified = match embedded {
            Some(lc) if lc.src_id != session.src_id => {
                session.src_id = lc.src_id;
                session.source = self.lookup.find_callsign(lc.src_id);
                info!(
                    "Gateway: DMR stream {:08X} identified as {} ({})",
                    session.stream_id, session.source, session.src_id
                );
                Some(session.source.clone())
            }
            _ => None,
        };

        self.dmr_watchdog.start();
        if missing > 0 {
            debug!("Gateway: {} DMR bursts missing", missing);
            self.converter.put_dmr_silence(missing as usize)?;
        }
        self.converter.put_dmr(&frame.burst)?;
        if let Some(source) = identified {
            self.refine_ysf_source(source);
        }
        Ok(())
    }

    fn end_dmr_stream(&mut self, reason: &str) -> Result<()> {
        let Rx::Active(session) = std::mem::replace(&mut self.dmr_rx, Rx::Idle) else {
            return Ok(());
        };
        self.dmr_watchdog.stop();
        info!(
            "Gateway: DMR stream from {} ended ({}), {} frames, {} missing, {:.1}s",
            session.source,
            reason,
            session.frames,
            session.missing_frames,
            session.duration.as_secs_f32()
        );
        self.converter.put_dmr_eot()
    }

    /// Late-entry identification after the YSF header may already be queued
    fn refine_ysf_source(&mut self, source: String) {
        if let Some(pending) = self.pending_ysf.back_mut() {
            pending.0 = source;
        } else if let Some(tx) = &mut self.ysf_tx {
            tx.source = source;
        }
    }

    fn route(&mut self, tg: u32) {
        let action = self.routes.resolve(tg);
        if action != RouteAction::Unlink {
            self.talkgroup = tg;
        }
        for command in self.room_link.request(action) {
            if let Err(e) = self.send_wiresx(command) {
                warn!("Wires-X: {:?} failed: {}", command, e);
            }
        }
    }

    fn send_wiresx(&mut self, command: Command) -> Result<()> {
        let node_id = format!("{:05}", self.dmr_id % 100_000);
        let message = Message::new(self.wiresx_seq, command, &node_id, &self.callsign);
        self.wiresx_seq = self.wiresx_seq.wrapping_add(1);

        let frames = wiresx::build_frames(&message, &self.callsign)?;
        let last = frames.len().saturating_sub(1);
        for (n, frame) in frames.into_iter().enumerate() {
            let ysfd = YsfdFrame::new(&self.callsign, &self.callsign, YSF_DEST_ALL, n as u8, n == last, frame);
            self.ysf.write(&ysfd)?;
        }
        debug!("Wires-X: sent {:?}", command);
        Ok(())
    }

    fn emit_ysf(&mut self) -> Result<bool> {
        let mut units = [VoiceFrame::silence(); UNITS_PER_YSF_FRAME];
        match self.converter.get_ysf(&mut units) {
            FrameTag::NoData => return Ok(false),
            FrameTag::Header => {
                self.finish_ysf_tx()?;
                self.begin_ysf_tx()?;
            }
            FrameTag::Data => {
                if self.ysf_tx.is_none() {
                    self.begin_ysf_tx()?;
                }
                self.send_ysf_voice(&units)?;
            }
            FrameTag::Eot => self.finish_ysf_tx()?,
        }
        Ok(true)
    }

    fn begin_ysf_tx(&mut self) -> Result<()> {
        let (source, dest) = self
            .pending_ysf
            .pop_front()
            .unwrap_or_else(|| (self.callsign.clone(), YSF_DEST_ALL.to_string()));
        let frame = ysf::build_lc_frame(FrameIndicator::Header, YsfDataType::VoiceData2, &source, &dest)?;
        debug!("Gateway: YSF transmit from {}", source);
        self.ysf_tx = Some(YsfTx {
            source,
            dest,
            frame_number: 0,
        });
        self.send_ysf(frame, false)
    }

    fn send_ysf_voice(&mut self, units: &[VoiceFrame; UNITS_PER_YSF_FRAME]) -> Result<()> {
        let Some(tx) = &mut self.ysf_tx else {
            return Ok(());
        };
        let frame = ysf::build_vd2_frame(tx.frame_number, &tx.source, &tx.dest, units)?;
        tx.frame_number = (tx.frame_number + 1) % VD2_FRAME_NUMBERS;
        self.send_ysf(frame, false)
    }

    fn finish_ysf_tx(&mut self) -> Result<()> {
        let Some(tx) = &self.ysf_tx else {
            return Ok(());
        };
        let frame = ysf::build_lc_frame(FrameIndicator::Terminator, YsfDataType::VoiceData2, &tx.source, &tx.dest);
        let result = frame.and_then(|frame| self.send_ysf(frame, true));
        self.ysf_tx = None;
        result
    }

    fn send_ysf(&mut self, frame: [u8; YSF_FRAME_BYTES], eot: bool) -> Result<()> {
        let Some(tx) = &self.ysf_tx else {
            return Ok(());
        };
        let ysfd = YsfdFrame::new(&self.callsign, &tx.source, &tx.dest, self.ysf_counter, eot, frame);
        self.ysf_counter = (self.ysf_counter + 1) & 0x7F;
        self.ysf.write(&ysfd)
    }

    // YSF -> DMR

    fn ysf_rx_is(&self, source: &str) -> bool {
        matches!(&self.ysf_rx, Rx::Active(s) if s.source == source)
    }

    fn handle_ysf(&mut self, frame: &YsfdFrame) -> Result<()> {
        let fich = frame
            .fich()
            .ok_or_else(|| GatewayError::ProtocolDesync("YSF FICH unreadable".into()))?;
        match fich.dt {
            YsfDataType::VoiceData2 => {}
            YsfDataType::DataFullRate => {
                if let Some(message) = self.wiresx_rx.add_frame(&fich, &frame.frame) {
                    self.wiresx_message(message);
                }
                return Ok(());
            }
            other => {
                debug!("Gateway: unsupported YSF data type {:?}", other);
                return Ok(());
            }
        }

        let source = frame.source_callsign();
        match fich.fi {
            FrameIndicator::Header => {
                if self.ysf_rx_is(&source) {
                    debug!("Gateway: repeated YSF header from {}", source);
                    return Ok(());
                }
                if matches!(self.ysf_rx, Rx::Active(_)) {
                    self.end_ysf_stream("superseded by a new stream")?;
                }
                self.start_ysf_stream(source, false)
            }
            FrameIndicator::Communications => self.ysf_voice(frame, source, fich.frame_number),
            FrameIndicator::Terminator => {
                if self.ysf_rx_is(&source) {
                    self.end_ysf_stream("end of transmission")?;
                }
                Ok(())
            }
            FrameIndicator::Test => {
                debug!("Gateway: ignored YSF test frame");
                Ok(())
            }
        }
    }

    fn start_ysf_stream(&mut self, source: String, late_entry: bool) -> Result<()> {
        let src_id = match self.lookup.find_id(&source) {
            0 => self.dmr_id,
            id => id,
        };
        let dst_id = self.talkgroup;
        info!(
            "Gateway: YSF {} from {} ({}) to TG {}",
            if late_entry { "late entry" } else { "stream" },
            source,
            src_id,
            dst_id
        );

        self.converter.put_ysf_header()?;
        self.pending_dmr.push_back(LinkControl::group(src_id, dst_id));
        self.ysf_rx = Rx::Active(StreamSession::new(
            0,
            src_id,
            dst_id,
            source,
            format!("TG {}", dst_id),
            late_entry,
        ));
        self.ysf_watchdog.start();
        Ok(())
    }

    fn ysf_voice(&mut self, frame: &YsfdFrame, source: String, frame_number: u8) -> Result<()> {
        if frame_number >= VD2_FRAME_NUMBERS {
            return Err(GatewayError::ProtocolDesync(format!(
                "YSF frame number {} out of range",
                frame_number
            )));
        }
        if !self.ysf_rx_is(&source) {
            if matches!(self.ysf_rx, Rx::Active(_)) {
                self.end_ysf_stream("superseded by a new stream")?;
            }
            self.start_ysf_stream(source, true)?;
        }

        let Rx::Active(session) = &mut self.ysf_rx else {
            return Ok(());
        };
        let Some(missing) = session.note_sequence(frame_number, VD2_FRAME_NUMBERS) else {
            debug!("Gateway: repeated YSF frame {} from {}", frame_number, session.source);
            return Ok(());
        };

        self.ysf_watchdog.start();
        if missing > 0 {
            debug!("Gateway: {} YSF frames missing", missing);
            self.converter.put_ysf_silence(missing as usize)?;
        }
        self.converter.put_ysf(&frame.frame)?;
        if frame.eot {
            self.end_ysf_stream("end of transmission")?;
        }
        Ok(())
    }

    fn end_ysf_stream(&mut self, reason: &str) -> Result<()> {
        let Rx::Active(session) = std::mem::replace(&mut self.ysf_rx, Rx::Idle) else {
            return Ok(());
        };
        self.ysf_watchdog.stop();
        info!(
            "Gateway: YSF stream from {} ended ({}), {} frames, {} missing, {:.1}s",
            session.source,
            reason,
            session.frames,
            session.missing_frames,
            session.duration.as_secs_f32()
        );
        self.converter.put_ysf_eot()
    }

    fn wiresx_message(&mut self, message: Message) {
        match message.command {
            Command::ConnectReply(room) => {
                if self.room_link.confirm(room) {
                    info!("Wires-X: linked to room {}", room);
                }
            }
            other => debug!("Wires-X: ignored {:?}", other),
        }
    }

    fn emit_dmr(&mut self) -> Result<bool> {
        let mut units = [VoiceFrame::silence(); UNITS_PER_DMR_BURST];
        match self.converter.get_dmr(&mut units) {
            FrameTag::NoData => return Ok(false),
            FrameTag::Header => {
                self.finish_dmr_tx()?;
                self.begin_dmr_tx()?;
            }
            FrameTag::Data => {
                if self.dmr_tx.is_none() {
                    self.begin_dmr_tx()?;
                }
                self.send_dmr_voice(&units)?;
            }
            FrameTag::Eot => self.finish_dmr_tx()?,
        }
        Ok(true)
    }

    fn begin_dmr_tx(&mut self) -> Result<()> {
        let lc = self
            .pending_dmr
            .pop_front()
            .unwrap_or_else(|| LinkControl::group(self.dmr_id, self.talkgroup));
        let burst = dmr::build_lc_burst(&lc, DataType::VoiceLcHeader, self.color_code)?;
        let stream_id = rand::random();
        debug!("Gateway: DMR transmit {:08X} from {} to {}", stream_id, lc.src_id, lc.dst_id);
        self.dmr_tx = Some(DmrTx {
            stream_id,
            lc,
            embedded: dmr_embedded::encode(&lc),
            bursts: 0,
        });
        self.send_dmr(FrameType::DataSync, DataType::VoiceLcHeader as u8, burst)
    }

    fn send_dmr_voice(&mut self, units: &[VoiceFrame; UNITS_PER_DMR_BURST]) -> Result<()> {
        let Some(tx) = &mut self.dmr_tx else {
            return Ok(());
        };
        let seq = (tx.bursts % BURSTS_PER_SUPERFRAME) as u8;
        let burst = dmr::build_voice_burst(units, seq, self.color_code, &tx.embedded)?;
        tx.bursts += 1;
        let frame_type = if seq == 0 {
            FrameType::VoiceSync
        } else {
            FrameType::Voice
        };
        self.send_dmr(frame_type, seq, burst)
    }

    /// Pad to a superframe boundary and send the terminator
    fn finish_dmr_tx(&mut self) -> Result<()> {
        let result = self.send_dmr_terminator();
        self.dmr_tx = None;
        result
    }

    fn send_dmr_terminator(&mut self) -> Result<()> {
        let Some(tx) = &self.dmr_tx else {
            return Ok(());
        };
        let lc = tx.lc;
        let silence = [VoiceFrame::silence(); UNITS_PER_DMR_BURST];
        for _ in 0..dmr::superframe_fill(tx.bursts) {
            self.send_dmr_voice(&silence)?;
        }
        let burst = dmr::build_lc_burst(&lc, DataType::TerminatorWithLc, self.color_code)?;
        self.send_dmr(FrameType::DataSync, DataType::TerminatorWithLc as u8, burst)
    }

    fn send_dmr(&mut self, frame_type: FrameType, data_type_or_seq: u8, burst: [u8; DMR_BURST_BYTES]) -> Result<()> {
        let Some(tx) = &self.dmr_tx else {
            return Ok(());
        };
        let frame = DmrdFrame {
            seq: self.dmr_seq,
            src_id: tx.lc.src_id,
            dst_id: tx.lc.dst_id,
            repeater_id: self.dmr.repeater_id(),
            slot: self.slot,
            private_call: tx.lc.private_call,
            frame_type,
            data_type_or_seq,
            stream_id: tx.stream_id,
            burst,
        };
        self.dmr_seq = self.dmr_seq.wrapping_add(1);
        self.dmr.write(&frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_gaps() {
        let mut session = StreamSession::new(1, 2, 3, "A".into(), "B".into(), false);
        assert_eq!(session.note_sequence(0, 6), Some(0));
        assert_eq!(session.note_sequence(1, 6), Some(0));
        assert_eq!(session.note_sequence(4, 6), Some(2));
        assert_eq!(session.note_sequence(5, 6), Some(0));
        assert_eq!(session.note_sequence(1, 6), Some(1));
        assert_eq!(session.frames(), 5);
        assert_eq!(session.missing_frames(), 3);
    }

    #[test]
    fn test_sequence_first_frame_never_missing() {
        let mut session = StreamSession::new(0, 0, 0, "A".into(), "B".into(), true);
        assert_eq!(session.note_sequence(3, 7), Some(0));
        assert_eq!(session.note_sequence(6, 7), Some(2));
        assert_eq!(session.note_sequence(0, 7), Some(0));
        assert!(session.is_late_entry());
    }

    #[test]
    fn test_sequence_repeat_is_not_a_wrap() {
        let mut session = StreamSession::new(1, 2, 3, "A".into(), "B".into(), false);
        assert_eq!(session.note_sequence(0, 6), Some(0));
        assert_eq!(session.note_sequence(1, 6), Some(0));
        assert_eq!(session.note_sequence(1, 6), None);
        assert_eq!(session.note_sequence(2, 6), Some(0));
        assert_eq!(session.frames(), 3);
        assert_eq!(session.missing_frames(), 0);
    }

    #[test]
    fn test_network_lc() {
        let frame = DmrdFrame {
            seq: 0,
            src_id: 2345001,
            dst_id: 2345002,
            repeater_id: 1,
            slot: 1,
            private_call: true,
            frame_type: FrameType::VoiceSync,
            data_type_or_seq: 0,
            stream_id: 1,
            burst: [0u8; DMR_BURST_BYTES],
        };
        assert_eq!(network_lc(&frame), LinkControl::private(2345001, 2345002));
    }
}
