// crates/iosamurai-rs/tests/simulator/interface.rs
use super::VirtualNetwork;
use iosamurai_rs::hal::{DatagramSocket, LinkError};
use std::cell::RefCell;
use std::net::SocketAddrV4;
use std::rc::Rc;

/// An in-memory datagram socket bound to one address of a `VirtualNetwork`.
pub struct SimulatedSocket {
    local: SocketAddrV4,
    network: Rc<RefCell<VirtualNetwork>>,
}

impl SimulatedSocket {
    pub fn new(local: SocketAddrV4, network: Rc<RefCell<VirtualNetwork>>) -> Self {
        network.borrow_mut().bind(local);
        Self { local, network }
    }
}

impl DatagramSocket for SimulatedSocket {
    fn send_to(&mut self, data: &[u8], peer: SocketAddrV4) -> Result<(), LinkError> {
        self.network.borrow_mut().transmit(self.local, peer, data);
        Ok(())
    }

    fn recv_from(&mut self, buffer: &mut [u8]) -> Result<Option<(usize, SocketAddrV4)>, LinkError> {
        let Some(packet) = self.network.borrow_mut().receive(self.local) else {
            return Ok(None);
        };
        if buffer.len() < packet.data.len() {
            return Err(LinkError::BufferTooShort);
        }
        buffer[..packet.data.len()].copy_from_slice(&packet.data);
        Ok(Some((packet.data.len(), packet.src)))
    }

    fn local_addr(&self) -> Option<SocketAddrV4> {
        Some(self.local)
    }
}
