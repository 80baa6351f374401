// crates/iosamurai-rs/tests/simulator/mod.rs
#![allow(dead_code)]

pub mod interface;

pub use interface::SimulatedSocket;

use iosamurai_rs::codec::{ChecksumState, ChecksumTable, Codec, InboundFrame};
use iosamurai_rs::unit::{NetworkContext, PeripheralContext, StatusView, UnitEvent, UnitPeripherals};
use iosamurai_rs::{DigitalInputs, DigitalOutputs, PeripheralPresence, SharedImage, UnitConfig};
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::net::{Ipv4Addr, SocketAddrV4};
use std::rc::Rc;

/// Period of one simulated control cycle.
pub const CYCLE_US: u64 = 1_000;

/// Represents a datagram in flight on the virtual network.
#[derive(Debug, Clone)]
pub struct Packet {
    pub data: Vec<u8>,
    pub src: SocketAddrV4,
    pub dst: SocketAddrV4,
    pub transmit_time_us: u64,
}

/// A virtual UDP segment that manages time, delivery and fault injection.
#[derive(Default)]
pub struct VirtualNetwork {
    current_time_us: u64,
    inboxes: HashMap<SocketAddrV4, VecDeque<Packet>>,
    /// Number of upcoming datagrams from a source that will be lost.
    drops: HashMap<SocketAddrV4, usize>,
    /// Number of upcoming datagrams from a source that will arrive with a flipped bit.
    corruptions: HashMap<SocketAddrV4, usize>,
    /// Every datagram handed to the network, delivered or not.
    pub packet_history: Vec<Packet>,
}

impl VirtualNetwork {
    pub fn new() -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Self::default()))
    }

    pub fn tick(&mut self, duration_us: u64) {
        self.current_time_us += duration_us;
    }

    pub fn current_time(&self) -> u64 {
        self.current_time_us
    }

    pub fn bind(&mut self, addr: SocketAddrV4) {
        self.inboxes.entry(addr).or_default();
    }

    pub fn drop_next_from(&mut self, src: SocketAddrV4, count: usize) {
        *self.drops.entry(src).or_default() += count;
    }

    pub fn corrupt_next_from(&mut self, src: SocketAddrV4, count: usize) {
        *self.corruptions.entry(src).or_default() += count;
    }

    pub fn transmit(&mut self, src: SocketAddrV4, dst: SocketAddrV4, data: &[u8]) {
        let mut packet = Packet {
            data: data.to_vec(),
            src,
            dst,
            transmit_time_us: self.current_time_us,
        };
        self.packet_history.push(packet.clone());

        if let Some(n) = self.drops.get_mut(&src).filter(|n| **n > 0) {
            *n -= 1;
            return;
        }
        if let Some(n) = self.corruptions.get_mut(&src).filter(|n| **n > 0) {
            *n -= 1;
            packet.data[0] ^= 0x01;
        }
        // Datagrams to unbound addresses vanish, as they would on a real segment.
        if let Some(inbox) = self.inboxes.get_mut(&dst) {
            inbox.push_back(packet);
        }
    }

    pub fn receive(&mut self, addr: SocketAddrV4) -> Option<Packet> {
        self.inboxes.get_mut(&addr)?.pop_front()
    }

    pub fn sent_from(&self, src: SocketAddrV4) -> usize {
        self.packet_history.iter().filter(|p| p.src == src).count()
    }
}

pub fn addr(last_octet: u8, port: u16) -> SocketAddrV4 {
    SocketAddrV4::new(Ipv4Addr::new(192, 168, 0, last_octet), port)
}

/// A board with every optional peripheral fitted.
#[derive(Debug, Default)]
pub struct SimBoard {
    pub inputs: u16,
    pub adc: u16,
    pub outputs: DigitalOutputs,
    pub led: bool,
    pub last_view: Option<StatusView>,
}

impl UnitPeripherals for SimBoard {
    fn probe(&mut self) -> PeripheralPresence {
        PeripheralPresence::OUTPUT_EXPANDER
            | PeripheralPresence::INPUT_EXPANDER
            | PeripheralPresence::DISPLAY
    }

    fn read_inputs(&mut self) -> DigitalInputs {
        DigitalInputs(self.inputs)
    }

    fn write_outputs(&mut self, outputs: DigitalOutputs) {
        self.outputs = outputs;
    }

    fn read_adc(&mut self) -> u16 {
        self.adc
    }

    fn show_status(&mut self, view: &StatusView) {
        self.last_view = Some(*view);
    }

    fn set_led(&mut self, on: bool) {
        self.led = on;
    }
}

/// A complete remote unit on the virtual network, both contexts stepped in
/// lockstep by the test.
pub struct UnitHarness {
    pub network: NetworkContext<'static, SimulatedSocket>,
    pub peripherals: PeripheralContext<'static, SimBoard>,
    pub image: &'static SharedImage,
    pub addr: SocketAddrV4,
}

impl UnitHarness {
    pub fn new(addr: SocketAddrV4, net: &Rc<RefCell<VirtualNetwork>>, config: UnitConfig) -> Self {
        // Stands in for the `static` image of a real unit.
        let image: &'static SharedImage = Box::leak(Box::new(SharedImage::new()));
        let socket = SimulatedSocket::new(addr, net.clone());
        Self {
            network: NetworkContext::new(socket, image, &config),
            peripherals: PeripheralContext::new(SimBoard::default(), image, &config),
            image,
            addr,
        }
    }

    /// Drains the unit's inbox at the current network time, then refreshes
    /// the peripherals. Returns every event seen.
    pub fn step(&mut self, net: &Rc<RefCell<VirtualNetwork>>) -> Vec<UnitEvent> {
        let now = net.borrow().current_time();
        let mut events = Vec::new();
        for _ in 0..16 {
            let event = self.network.poll(now).expect("simulated socket never fails");
            if event == UnitEvent::Idle {
                break;
            }
            events.push(event);
        }
        self.peripherals.poll();
        events
    }

    pub fn board(&self) -> &SimBoard {
        self.peripherals.peripherals()
    }

    pub fn board_mut(&mut self) -> &mut SimBoard {
        self.peripherals.peripherals_mut()
    }
}

/// A unit stand-in that sends hand-encoded replies, for checking the host
/// engine against exact index values.
pub struct ScriptedUnit {
    pub socket: SimulatedSocket,
    pub checksum: ChecksumState,
    pub host: SocketAddrV4,
}

impl ScriptedUnit {
    pub fn new(addr: SocketAddrV4, host: SocketAddrV4, net: &Rc<RefCell<VirtualNetwork>>) -> Self {
        Self {
            socket: SimulatedSocket::new(addr, net.clone()),
            checksum: ChecksumState::new(),
            host,
        }
    }

    pub fn reply(&mut self, inputs: u16, analog_raw: u16) {
        use iosamurai_rs::DatagramSocket;
        let frame = InboundFrame {
            inputs: DigitalInputs(inputs),
            analog_raw,
            presence: PeripheralPresence::empty(),
        };
        let mut buf = [0u8; 5];
        let len = frame
            .encode(&ChecksumTable::IDENTITY, &mut self.checksum, &mut buf)
            .unwrap();
        self.socket.send_to(&buf[..len], self.host).unwrap();
    }
}
