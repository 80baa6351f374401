use iosamurai_rs::{DatagramSocket, LinkError};
use log::{debug, warn};
use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket};

/// A bound, non-blocking `std::net::UdpSocket` behind the core datagram HAL.
pub struct UdpDatagramSocket {
    socket: UdpSocket,
    local: Option<SocketAddrV4>,
}

impl UdpDatagramSocket {
    /// Binds to `addr` and switches the socket to non-blocking mode.
    pub fn bind(addr: SocketAddrV4) -> Result<Self, String> {
        let socket = UdpSocket::bind(addr)
            .map_err(|e| format!("Failed to bind UDP socket to {}: {}", addr, e))?;
        socket
            .set_nonblocking(true)
            .map_err(|e| format!("Failed to set UDP socket non-blocking: {}", e))?;
        let local = match socket.local_addr() {
            Ok(SocketAddr::V4(v4)) => Some(v4),
            _ => None,
        };
        debug!("UDP socket bound to {:?}", local);
        Ok(Self { socket, local })
    }

    /// Binds to an ephemeral port on all interfaces.
    pub fn bind_ephemeral() -> Result<Self, String> {
        Self::bind(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0))
    }
}

impl DatagramSocket for UdpDatagramSocket {
    fn send_to(&mut self, data: &[u8], peer: SocketAddrV4) -> Result<(), LinkError> {
        match self.socket.send_to(data, peer) {
            Ok(n) if n == data.len() => Ok(()),
            Ok(n) => {
                warn!("UDP send_to {} wrote {} of {} bytes", peer, n, data.len());
                Err(LinkError::IoError)
            }
            Err(e) => {
                debug!("UDP send_to {} error: {}", peer, e);
                Err(LinkError::IoError)
            }
        }
    }

    fn recv_from(&mut self, buffer: &mut [u8]) -> Result<Option<(usize, SocketAddrV4)>, LinkError> {
        match self.socket.recv_from(buffer) {
            Ok((size, SocketAddr::V4(src))) => Ok(Some((size, src))),
            Ok((_, SocketAddr::V6(src))) => {
                warn!("Received UDP datagram from IPv6 address {}, skipping.", src);
                Ok(None)
            }
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
            // ICMP port-unreachable surfaced on some platforms; the datagram is simply gone.
            Err(ref e) if e.kind() == io::ErrorKind::ConnectionReset => Ok(None),
            Err(e) => {
                warn!("UDP recv_from error: {}", e);
                Err(LinkError::IoError)
            }
        }
    }

    fn local_addr(&self) -> Option<SocketAddrV4> {
        self.local
    }
}
