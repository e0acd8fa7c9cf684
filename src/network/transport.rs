use std::io;
use std::net::{Ipv4Addr, SocketAddr, UdpSocket};

use tracing::trace;

use super::bind_socket;
use crate::core::{Error, Result};
use crate::protocol::ARTNET_PORT;

/// Datagram transport the node sends and receives through.
///
/// The node never opens or binds sockets itself; whoever owns it supplies
/// an implementation of this trait.
pub trait Transport {
    /// Receives one datagram into `buf`, returning its length and sender.
    /// Returns `None` when nothing is waiting.
    fn receive(&mut self, buf: &mut [u8]) -> Result<Option<(usize, Ipv4Addr)>>;

    /// Sends a datagram to `destination`
    fn send(&mut self, datagram: &[u8], destination: Ipv4Addr) -> Result<()>;
}

/// Non-blocking UDP transport over a std socket
pub struct UdpTransport {
    socket: UdpSocket,
    remote_port: u16,
}

impl UdpTransport {
    /// Binds to `bind_addr` with broadcast enabled, sending to the Art-Net
    /// port
    pub fn bind(bind_addr: SocketAddr) -> Result<Self> {
        Self::bind_with_remote_port(bind_addr, ARTNET_PORT)
    }

    /// Binds to `bind_addr`, sending to `remote_port`
    pub fn bind_with_remote_port(bind_addr: SocketAddr, remote_port: u16) -> Result<Self> {
        let socket = bind_socket(bind_addr)?;
        Ok(UdpTransport {
            socket,
            remote_port,
        })
    }

    /// Returns the local socket address
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.socket
            .local_addr()
            .map_err(|e| Error::network(format!("Failed to get local address: {}", e)))
    }
}

impl Transport for UdpTransport {
    fn receive(&mut self, buf: &mut [u8]) -> Result<Option<(usize, Ipv4Addr)>> {
        match self.socket.recv_from(buf) {
            Ok((len, SocketAddr::V4(source))) => Ok(Some((len, *source.ip()))),
            Ok((_, source)) => {
                trace!(%source, "ignoring datagram from IPv6 sender");
                Ok(None)
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn send(&mut self, datagram: &[u8], destination: Ipv4Addr) -> Result<()> {
        self.socket
            .send_to(datagram, (destination, self.remote_port))
            .map_err(|e| Error::network(format!("Failed to send to {}: {}", destination, e)))?;
        Ok(())
    }
}
