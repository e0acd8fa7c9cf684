//! Network transport module
//!
//! This module supplies the datagram transport a node runs over: the
//! `Transport` seam, a blocking UDP implementation, and an async service
//! that drives a node from a tokio socket.

mod service;
mod transport;

pub use self::service::{DmxFrame, NodeCommand, NodeHandle, NodeService};
pub use self::transport::{Transport, UdpTransport};

use std::net::SocketAddr;

use socket2::{Domain, Protocol, Socket, Type};

use crate::core::Result;

/// Creates a non-blocking UDP socket bound to `addr` with address reuse
/// and broadcast enabled.
pub(crate) fn bind_socket(addr: SocketAddr) -> Result<std::net::UdpSocket> {
    let socket = Socket::new(Domain::for_address(addr), Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    socket.set_broadcast(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    Ok(socket.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn test_bind_socket() {
        let socket = bind_socket(SocketAddr::from((Ipv4Addr::LOCALHOST, 0))).unwrap();
        assert!(socket.broadcast().unwrap());
        assert_ne!(socket.local_addr().unwrap().port(), 0);
    }
}
