//! The process image shared between the unit's network and peripheral contexts.
//!
//! Every record is packed into a single atomic word so that a reader always
//! sees a complete record. Each cell has exactly one writer; stores use
//! `Release` and loads `Acquire`. The peer address does not fit one 32-bit
//! word and is guarded by a sequence counter instead.
//!
//! Only 8- and 32-bit loads and stores are used, so the image works on cores
//! without 64-bit atomics or compare-and-swap (e.g. Cortex-M0+).

use crate::types::{ANALOG_RAW_MASK, DigitalInputs, DigitalOutputs, FrameFlags, PeripheralPresence};
use core::hint;
use core::net::{Ipv4Addr, SocketAddrV4};
use core::sync::atomic::{self, AtomicU8, AtomicU32, Ordering};

/// Latest accepted command, written by the network context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UnitCommand {
    pub outputs: DigitalOutputs,
    pub flags: FrameFlags,
}

/// Latest peripheral sample, written by the peripheral context. This is the
/// payload of the next reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UnitSample {
    pub inputs: DigitalInputs,
    /// Calibrated, conditioned 12-bit analog value.
    pub analog_raw: u16,
    /// Peripherals to advertise. Empty unless reporting is enabled.
    pub presence: PeripheralPresence,
}

/// Link status flags, written by the network context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UnitStatus {
    /// Latched on a rejected command until the unit times out.
    pub checksum_error: bool,
    /// No command accepted within the unit timeout.
    pub timeout_error: bool,
    /// At least one command accepted since the last timeout.
    pub connected: bool,
}

impl UnitStatus {
    const CHECKSUM_ERROR: u8 = 1 << 0;
    const TIMEOUT_ERROR: u8 = 1 << 1;
    const CONNECTED: u8 = 1 << 2;

    /// True when the physical outputs may follow the command.
    pub fn is_healthy(&self) -> bool {
        !self.checksum_error && !self.timeout_error
    }

    fn pack(self) -> u8 {
        (self.checksum_error as u8 * Self::CHECKSUM_ERROR)
            | (self.timeout_error as u8 * Self::TIMEOUT_ERROR)
            | (self.connected as u8 * Self::CONNECTED)
    }

    fn unpack(bits: u8) -> Self {
        Self {
            checksum_error: bits & Self::CHECKSUM_ERROR != 0,
            timeout_error: bits & Self::TIMEOUT_ERROR != 0,
            connected: bits & Self::CONNECTED != 0,
        }
    }
}

const COMMAND_VALID: u32 = 1 << 16;
const PEER_VALID: u32 = 1 << 16;

/// The only state both unit contexts touch.
///
/// The contexts borrow it, so it can live in a `static` on a bare-metal
/// target (`SharedImage::new` is `const`) or behind an `Arc` on a host OS.
#[derive(Debug)]
pub struct SharedImage {
    command: AtomicU32,
    sample: AtomicU32,
    status: AtomicU8,
    /// Odd while `set_peer` is in progress.
    peer_seq: AtomicU32,
    peer_ip: AtomicU32,
    /// Port in the low half, `PEER_VALID` above it.
    peer_port: AtomicU32,
}

impl SharedImage {
    /// A fresh image: no command, zero sample, timed out, no peer.
    pub const fn new() -> Self {
        Self {
            command: AtomicU32::new(0),
            sample: AtomicU32::new(0),
            status: AtomicU8::new(UnitStatus::TIMEOUT_ERROR),
            peer_seq: AtomicU32::new(0),
            peer_ip: AtomicU32::new(0),
            peer_port: AtomicU32::new(0),
        }
    }

    // --- Network context → peripheral context ---

    pub fn publish_command(&self, command: UnitCommand) {
        let word =
            u32::from(command.outputs.0) | (u32::from(command.flags.0) << 8) | COMMAND_VALID;
        self.command.store(word, Ordering::Release);
    }

    /// Withdraws the command. [`command`](Self::command) returns `None` until
    /// the next accepted frame.
    pub fn clear_command(&self) {
        self.command.store(0, Ordering::Release);
    }

    pub fn command(&self) -> Option<UnitCommand> {
        let word = self.command.load(Ordering::Acquire);
        if word & COMMAND_VALID == 0 {
            return None;
        }
        Some(UnitCommand {
            outputs: DigitalOutputs(word as u8),
            flags: FrameFlags::from_bits_truncate((word >> 8) as u8),
        })
    }

    pub fn set_status(&self, status: UnitStatus) {
        self.status.store(status.pack(), Ordering::Release);
    }

    pub fn status(&self) -> UnitStatus {
        UnitStatus::unpack(self.status.load(Ordering::Acquire))
    }

    /// Only the network context may call this.
    pub fn set_peer(&self, peer: Option<SocketAddrV4>) {
        let (ip, port) = match peer {
            Some(addr) => (addr.ip().to_bits(), u32::from(addr.port()) | PEER_VALID),
            None => (0, 0),
        };
        // Single writer: a plain load/store pair is enough to bump the counter.
        let seq = self.peer_seq.load(Ordering::Relaxed);
        self.peer_seq.store(seq.wrapping_add(1), Ordering::Relaxed);
        atomic::fence(Ordering::Release);
        self.peer_ip.store(ip, Ordering::Relaxed);
        self.peer_port.store(port, Ordering::Relaxed);
        self.peer_seq.store(seq.wrapping_add(2), Ordering::Release);
    }

    /// Source address of the last accepted command, forgotten on timeout.
    pub fn peer(&self) -> Option<SocketAddrV4> {
        loop {
            let seq = self.peer_seq.load(Ordering::Acquire);
            if seq & 1 == 0 {
                let ip = self.peer_ip.load(Ordering::Relaxed);
                let port = self.peer_port.load(Ordering::Relaxed);
                atomic::fence(Ordering::Acquire);
                if self.peer_seq.load(Ordering::Relaxed) == seq {
                    if port & PEER_VALID == 0 {
                        return None;
                    }
                    return Some(SocketAddrV4::new(Ipv4Addr::from_bits(ip), port as u16));
                }
            }
            hint::spin_loop();
        }
    }

    // --- Peripheral context → network context ---

    pub fn publish_sample(&self, sample: UnitSample) {
        let [inputs_lo, inputs_hi] = sample.inputs.to_bytes();
        let [analog_lo, analog_hi] = (sample.analog_raw & ANALOG_RAW_MASK).to_le_bytes();
        let word =
            u32::from_le_bytes([inputs_lo, inputs_hi, analog_lo, analog_hi | sample.presence.0]);
        self.sample.store(word, Ordering::Release);
    }

    pub fn sample(&self) -> UnitSample {
        let [inputs_lo, inputs_hi, analog_lo, analog_hi] =
            self.sample.load(Ordering::Acquire).to_le_bytes();
        UnitSample {
            inputs: DigitalInputs::from_bytes(inputs_lo, inputs_hi),
            analog_raw: u16::from_le_bytes([analog_lo, analog_hi]) & ANALOG_RAW_MASK,
            presence: PeripheralPresence::from_analog_hi(analog_hi),
        }
    }
}

impl Default for SharedImage {
    fn default() -> Self {
        Self::new()
    }
}
