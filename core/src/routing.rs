//! Talkgroup to YSF room routing and the room link state

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use log::{debug, info};

use crate::error::{GatewayError, Result};
use crate::timer::Timer;
use crate::wiresx::Command;

pub const DEFAULT_UNLINK_TG: u32 = 4000;
pub const LINK_CONFIRM_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteAction {
    Link(u32),
    Unlink,
}

/// Read-only map from DMR talkgroup to YSF room
#[derive(Debug, Clone)]
pub struct RouteTable {
    routes: HashMap<u32, u32>,
    unlink_tg: u32,
}

impl RouteTable {
    pub fn new(unlink_tg: u32) -> Self {
        Self {
            routes: HashMap::new(),
            unlink_tg,
        }
    }

    pub fn load(path: impl AsRef<Path>, unlink_tg: u32) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let table = Self::parse(&text, unlink_tg)?;
        info!("RouteTable: loaded {} routes from {}", table.routes.len(), path.display());
        Ok(table)
    }

    /// Parse `talkgroup;room` lines, `#` starts a comment
    pub fn parse(text: &str, unlink_tg: u32) -> Result<Self> {
        let mut table = Self::new(unlink_tg);
        for (n, line) in text.lines().enumerate() {
            let line = line.split('#').next().unwrap_or_default().trim();
            if line.is_empty() {
                continue;
            }
            let parsed = line
                .split_once(';')
                .and_then(|(tg, room)| Some((tg.trim().parse().ok()?, room.trim().parse().ok()?)));
            let Some((tg, room)) = parsed else {
                return Err(GatewayError::Config(format!(
                    "route line {}: expected `talkgroup;room`, got `{}`",
                    n + 1,
                    line
                )));
            };
            table.insert(tg, room);
        }
        Ok(table)
    }

    pub fn insert(&mut self, tg: u32, room: u32) {
        self.routes.insert(tg, room);
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn unlink_tg(&self) -> u32 {
        self.unlink_tg
    }

    /// Room for a talkgroup; a table miss uses the talkgroup number as the room
    pub fn resolve(&self, tg: u32) -> RouteAction {
        if tg == self.unlink_tg {
            return RouteAction::Unlink;
        }
        RouteAction::Link(self.routes.get(&tg).copied().unwrap_or(tg))
    }
}

/// Tracks which room the YSF side is linked to and whether the reflector confirmed it
#[derive(Debug)]
pub struct RoomLink {
    room: Option<u32>,
    confirmed: bool,
    timer: Timer,
}

impl Default for RoomLink {
    fn default() -> Self {
        Self::new(LINK_CONFIRM_TIMEOUT)
    }
}

impl RoomLink {
    pub fn new(confirm_timeout: Duration) -> Self {
        Self {
            room: None,
            confirmed: false,
            timer: Timer::new(confirm_timeout),
        }
    }

    pub fn room(&self) -> Option<u32> {
        self.room
    }

    pub fn is_confirmed(&self) -> bool {
        self.confirmed
    }

    /// Wires-X commands needed to carry out `action`
    pub fn request(&mut self, action: RouteAction) -> Vec<Command> {
        match action {
            RouteAction::Unlink => match self.room.take() {
                Some(room) => {
                    info!("RoomLink: unlinking from room {}", room);
                    self.confirmed = false;
                    self.timer.stop();
                    vec![Command::Disconnect]
                }
                None => Vec::new(),
            },
            RouteAction::Link(room) if self.room == Some(room) => Vec::new(),
            RouteAction::Link(room) => {
                let mut commands = Vec::with_capacity(2);
                if let Some(old) = self.room {
                    info!("RoomLink: leaving room {}", old);
                    commands.push(Command::Disconnect);
                }
                info!("RoomLink: linking to room {}", room);
                commands.push(Command::Connect(room));
                self.room = Some(room);
                self.confirmed = false;
                self.timer.start();
                commands
            }
        }
    }

    /// Reflector confirmed a connect; returns false when it names another room
    pub fn confirm(&mut self, room: u32) -> bool {
        if self.room != Some(room) {
            debug!("RoomLink: reply for room {} while linking {:?}", room, self.room);
            return false;
        }
        self.confirmed = true;
        self.timer.stop();
        true
    }

    /// Advance the confirmation timer. An unconfirmed link that times out is
    /// forgotten so the next routing request retries it.
    pub fn clock(&mut self, elapsed: Duration) -> Result<()> {
        self.timer.clock(elapsed);
        if !self.timer.has_expired() {
            return Ok(());
        }
        self.timer.stop();
        let room = self.room.take();
        Err(GatewayError::LinkFailure(format!(
            "no reply linking room {:?} within {:?}",
            room.unwrap_or_default(),
            self.timer.timeout()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROUTES: &str = "\
# talkgroup;room
91;21080
3100 ; 31337   # trailing comment

";

    #[test]
    fn test_parse_routes() {
        let table = RouteTable::parse(ROUTES, DEFAULT_UNLINK_TG).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.resolve(91), RouteAction::Link(21080));
        assert_eq!(table.resolve(3100), RouteAction::Link(31337));
    }

    #[test]
    fn test_table_miss_and_unlink() {
        let table = RouteTable::parse(ROUTES, 4000).unwrap();
        assert_eq!(table.resolve(12345), RouteAction::Link(12345));
        assert_eq!(table.resolve(4000), RouteAction::Unlink);
    }

    #[test]
    fn test_malformed_line_is_config_error() {
        assert!(matches!(
            RouteTable::parse("91-21080\n", 4000),
            Err(GatewayError::Config(_))
        ));
    }

    #[test]
    fn test_room_change_disconnects_old() {
        let mut link = RoomLink::default();
        assert_eq!(link.request(RouteAction::Link(100)), vec![Command::Connect(100)]);
        assert_eq!(link.request(RouteAction::Link(100)), vec![]);
        assert_eq!(
            link.request(RouteAction::Link(200)),
            vec![Command::Disconnect, Command::Connect(200)]
        );
        assert_eq!(link.request(RouteAction::Unlink), vec![Command::Disconnect]);
        assert_eq!(link.request(RouteAction::Unlink), vec![]);
        assert_eq!(link.room(), None);
    }

    #[test]
    fn test_confirmation() {
        let mut link = RoomLink::default();
        link.request(RouteAction::Link(100));
        assert!(!link.confirm(200));
        assert!(link.confirm(100));
        assert!(link.is_confirmed());
        assert!(link.clock(Duration::from_secs(30)).is_ok());
    }

    #[test]
    fn test_timeout_allows_retry() {
        let mut link = RoomLink::new(Duration::from_secs(5));
        link.request(RouteAction::Link(100));
        assert!(link.clock(Duration::from_secs(4)).is_ok());
        assert!(matches!(
            link.clock(Duration::from_secs(1)),
            Err(GatewayError::LinkFailure(_))
        ));
        assert_eq!(link.room(), None);
        assert_eq!(link.request(RouteAction::Link(100)), vec![Command::Connect(100)]);
    }
}
