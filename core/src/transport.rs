//! Datagram transports the network wrappers run over

use std::io::ErrorKind;
use std::net::{SocketAddr, UdpSocket};
use std::time::Duration;

use log::{debug, info};

use crate::error::{GatewayError, Result};

/// Largest datagram either protocol produces, with headroom
pub const MAX_DATAGRAM_BYTES: usize = 512;

/// A packet pipe to one peer. `read` never blocks: it returns 0 when nothing is pending.
pub trait Transport {
    fn open(&mut self) -> Result<()>;

    /// Copy one pending datagram into `buf`, returning its length
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    fn write(&mut self, frame: &[u8]) -> Result<()>;

    /// Advance transport timers
    fn clock(&mut self, _elapsed: Duration) {}

    fn close(&mut self);
}

fn not_open() -> GatewayError {
    GatewayError::Io(std::io::Error::new(ErrorKind::NotConnected, "transport not open"))
}

/// Non-blocking UDP socket bound locally and talking to a fixed peer
#[derive(Debug)]
pub struct UdpTransport {
    local: SocketAddr,
    remote: SocketAddr,
    socket: Option<UdpSocket>,
}

impl UdpTransport {
    pub fn new(local: SocketAddr, remote: SocketAddr) -> Self {
        Self {
            local,
            remote,
            socket: None,
        }
    }

    /// Bound address, useful when the local port was 0
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.socket.as_ref().and_then(|s| s.local_addr().ok())
    }

    pub fn remote_addr(&self) -> SocketAddr {
        self.remote
    }
}

impl Transport for UdpTransport {
    fn open(&mut self) -> Result<()> {
        let socket = UdpSocket::bind(self.local)?;
        socket.set_nonblocking(true)?;
        info!("UdpTransport: bound {} for peer {}", socket.local_addr()?, self.remote);
        self.socket = Some(socket);
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let socket = self.socket.as_ref().ok_or_else(not_open)?;
        loop {
            match socket.recv_from(buf) {
                Ok((n, addr)) if addr == self.remote => return Ok(n),
                Ok((n, addr)) => {
                    debug!("UdpTransport: ignored {} bytes from {}", n, addr);
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => return Ok(0),
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn write(&mut self, frame: &[u8]) -> Result<()> {
        let socket = self.socket.as_ref().ok_or_else(not_open)?;
        match socket.send_to(frame, self.remote) {
            Ok(_) => Ok(()),
            // A full send buffer loses this datagram, the same as the network would
            Err(e) if e.kind() == ErrorKind::WouldBlock => {
                debug!("UdpTransport: send buffer full, dropped {} bytes", frame.len());
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn close(&mut self) {
        if self.socket.take().is_some() {
            info!("UdpTransport: closed socket for peer {}", self.remote);
        }
    }
}
