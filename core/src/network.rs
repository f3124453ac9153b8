//! Network wrappers: the Homebrew master side facing MMDVMHost and the YSF
//! reflector client. Both sit on a [`Transport`] and hand voice frames to the gateway.

use std::time::Duration;

use log::{debug, info, warn};

use crate::dmr::{DmrdFrame, DMRD_TAG};
use crate::error::{GatewayError, Result};
use crate::timer::Timer;
use crate::transport::{Transport, MAX_DATAGRAM_BYTES};
use crate::ysf::{self, YsfdFrame, YSFD_TAG, YSFP_TAG, YSFU_TAG};

const RPTL: &[u8] = b"RPTL";
const RPTK: &[u8] = b"RPTK";
const RPTCL: &[u8] = b"RPTCL";
const RPTC: &[u8] = b"RPTC";
const RPTO: &[u8] = b"RPTO";
const RPTPING: &[u8] = b"RPTPING";
const RPTACK: &[u8] = b"RPTACK";
const MSTNAK: &[u8] = b"MSTNAK";
const MSTPONG: &[u8] = b"MSTPONG";
const MSTCL: &[u8] = b"MSTCL";

/// A repeater that stops pinging for this long is logged out
pub const REPEATER_TIMEOUT: Duration = Duration::from_secs(60);
/// Interval between `YSFP` polls
pub const YSF_POLL_INTERVAL: Duration = Duration::from_secs(5);
/// Reflector considered lost after this many unanswered polls
const YSF_MISSED_POLLS: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginState {
    Waiting,
    Challenged,
    Authenticated,
    Running,
}

fn reply(tag: &[u8], value: u32) -> Vec<u8> {
    let mut out = Vec::with_capacity(tag.len() + 4);
    out.extend_from_slice(tag);
    out.extend_from_slice(&value.to_be_bytes());
    out
}

fn repeater_id_of(data: &[u8], tag: &[u8]) -> Result<u32> {
    GatewayError::check_min_len("Homebrew control frame", data, tag.len() + 4)?;
    let at = tag.len();
    Ok(u32::from_be_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]]))
}

/// Master side of the MMDVM Homebrew protocol for a single repeater
pub struct DmrNetwork {
    transport: Box<dyn Transport>,
    state: LoginState,
    repeater_id: u32,
    timer: Timer,
}

impl DmrNetwork {
    pub fn new(transport: Box<dyn Transport>) -> Self {
        Self {
            transport,
            state: LoginState::Waiting,
            repeater_id: 0,
            timer: Timer::new(REPEATER_TIMEOUT),
        }
    }

    pub fn open(&mut self) -> Result<()> {
        info!("DmrNetwork: waiting for repeater login");
        self.transport.open()
    }

    pub fn state(&self) -> LoginState {
        self.state
    }

    pub fn is_logged_in(&self) -> bool {
        self.state == LoginState::Running
    }

    pub fn repeater_id(&self) -> u32 {
        self.repeater_id
    }

    /// Answer pending control frames and return the next voice frame, if any
    pub fn read(&mut self) -> Result<Option<DmrdFrame>> {
        let mut buf = [0u8; MAX_DATAGRAM_BYTES];
        loop {
            let n = self.transport.read(&mut buf)?;
            if n == 0 {
                return Ok(None);
            }
            match self.handle(&buf[..n]) {
                Ok(Some(frame)) => return Ok(Some(frame)),
                Ok(None) => {}
                Err(GatewayError::Io(e)) => return Err(GatewayError::Io(e)),
                Err(e) => debug!("DmrNetwork: dropped frame: {}", e),
            }
        }
    }

    fn handle(&mut self, data: &[u8]) -> Result<Option<DmrdFrame>> {
        if data.starts_with(DMRD_TAG) {
            if self.state != LoginState::Running {
                debug!("DmrNetwork: DMRD before login completed");
                return Ok(None);
            }
            let frame = DmrdFrame::parse(data)?;
            return Ok(Some(frame));
        }

        if data.starts_with(RPTL) {
            self.repeater_id = repeater_id_of(data, RPTL)?;
            // The key is not verified, any salt will do
            let salt: u32 = rand::random();
            self.state = LoginState::Challenged;
            info!("DmrNetwork: login request from repeater {}", self.repeater_id);
            self.transport.write(&reply(RPTACK, salt))?;
        } else if data.starts_with(RPTK) {
            let id = repeater_id_of(data, RPTK)?;
            if self.state != LoginState::Challenged || id != self.repeater_id {
                self.transport.write(&reply(MSTNAK, id))?;
                return Ok(None);
            }
            self.state = LoginState::Authenticated;
            self.transport.write(&reply(RPTACK, id))?;
        } else if data.starts_with(RPTCL) {
            info!("DmrNetwork: repeater {} closed the connection", self.repeater_id);
            self.state = LoginState::Waiting;
            self.timer.stop();
        } else if data.starts_with(RPTC) {
            let id = repeater_id_of(data, RPTC)?;
            if self.state != LoginState::Authenticated || id != self.repeater_id {
                self.transport.write(&reply(MSTNAK, id))?;
                return Ok(None);
            }
            self.state = LoginState::Running;
            self.timer.start();
            info!("DmrNetwork: repeater {} logged in", id);
            self.transport.write(&reply(RPTACK, id))?;
        } else if data.starts_with(RPTO) {
            let id = repeater_id_of(data, RPTO)?;
            self.transport.write(&reply(RPTACK, id))?;
        } else if data.starts_with(RPTPING) {
            let id = repeater_id_of(data, RPTPING)?;
            if self.state == LoginState::Running && id == self.repeater_id {
                self.timer.start();
                self.transport.write(&reply(MSTPONG, id))?;
            } else {
                self.transport.write(&reply(MSTNAK, id))?;
            }
        } else {
            return Err(GatewayError::ProtocolDesync(format!(
                "unknown Homebrew frame {:02X?}",
                &data[..data.len().min(8)]
            )));
        }
        Ok(None)
    }

    /// Send a voice frame to the repeater; dropped while nobody is logged in
    pub fn write(&mut self, frame: &DmrdFrame) -> Result<()> {
        if self.state != LoginState::Running {
            debug!("DmrNetwork: no repeater logged in, frame dropped");
            return Ok(());
        }
        self.transport.write(&frame.to_bytes())
    }

    pub fn clock(&mut self, elapsed: Duration) {
        self.transport.clock(elapsed);
        self.timer.clock(elapsed);
        if self.timer.has_expired() {
            warn!("DmrNetwork: repeater {} timed out", self.repeater_id);
            self.state = LoginState::Waiting;
            self.timer.stop();
        }
    }

    pub fn close(&mut self) {
        if self.state == LoginState::Running {
            if let Err(e) = self.transport.write(&reply(MSTCL, self.repeater_id)) {
                warn!("DmrNetwork: failed to send close: {}", e);
            }
        }
        self.state = LoginState::Waiting;
        self.transport.close();
    }
}

/// Client of a YSF reflector or YSFGateway
pub struct YsfNetwork {
    transport: Box<dyn Transport>,
    callsign: String,
    poll: Timer,
    unanswered: u32,
    linked: bool,
}

impl YsfNetwork {
    pub fn new(transport: Box<dyn Transport>, callsign: &str) -> Self {
        Self {
            transport,
            callsign: callsign.to_string(),
            poll: Timer::new(YSF_POLL_INTERVAL),
            unanswered: 0,
            linked: false,
        }
    }

    /// Open the transport and register with an immediate poll
    pub fn open(&mut self) -> Result<()> {
        self.transport.open()?;
        self.send_poll()?;
        self.poll.start();
        Ok(())
    }

    /// True while the reflector answers polls
    pub fn is_linked(&self) -> bool {
        self.linked
    }

    fn send_poll(&mut self) -> Result<()> {
        self.unanswered += 1;
        self.transport.write(&ysf::build_poll(&self.callsign))
    }

    pub fn read(&mut self) -> Result<Option<YsfdFrame>> {
        let mut buf = [0u8; MAX_DATAGRAM_BYTES];
        loop {
            let n = self.transport.read(&mut buf)?;
            if n == 0 {
                return Ok(None);
            }
            let data = &buf[..n];
            if data.starts_with(YSFD_TAG) {
                match YsfdFrame::parse(data) {
                    Ok(frame) => return Ok(Some(frame)),
                    Err(e) => debug!("YsfNetwork: dropped frame: {}", e),
                }
            } else if data.starts_with(YSFP_TAG) {
                if !self.linked {
                    info!("YsfNetwork: reflector answered poll");
                }
                self.linked = true;
                self.unanswered = 0;
            } else if data.starts_with(YSFU_TAG) {
                info!("YsfNetwork: reflector unlinked us");
                self.linked = false;
            } else {
                debug!("YsfNetwork: ignored {} byte datagram", n);
            }
        }
    }

    pub fn write(&mut self, frame: &YsfdFrame) -> Result<()> {
        self.transport.write(&frame.to_bytes())
    }

    /// Keep the reflector registration alive
    pub fn clock(&mut self, elapsed: Duration) -> Result<()> {
        self.transport.clock(elapsed);
        self.poll.clock(elapsed);
        if !self.poll.has_expired() {
            return Ok(());
        }
        self.poll.start();
        if self.linked && self.unanswered >= YSF_MISSED_POLLS {
            warn!("YsfNetwork: {} polls unanswered, reflector lost", self.unanswered);
            self.linked = false;
        }
        self.send_poll()
    }

    pub fn close(&mut self) {
        if let Err(e) = self.transport.write(&ysf::build_unlink(&self.callsign)) {
            warn!("YsfNetwork: failed to send unlink: {}", e);
        }
        self.linked = false;
        self.poll.stop();
        self.transport.close();
    }
}
