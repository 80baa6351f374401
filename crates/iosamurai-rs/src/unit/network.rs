use super::shared::{SharedImage, UnitCommand, UnitStatus};
use crate::codec::{ChecksumState, ChecksumTable, Codec, InboundFrame, OutboundFrame};
use crate::config::UnitConfig;
use crate::hal::{DatagramSocket, LinkError};
use crate::log::{UnitContext, io_debug, io_info, io_trace, io_warn};
use crate::types::{INBOUND_FRAME_LEN, OUTBOUND_FRAME_LEN, RECEIVE_BUFFER_LEN};
use crate::watchdog::{Watchdog, WatchdogEvent};
use core::net::SocketAddrV4;

const CONTEXT: UnitContext = UnitContext { context: "network" };

/// Result of one [`NetworkContext::poll`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitEvent {
    /// No datagram was pending.
    Idle,
    /// A command was accepted and answered.
    Replied(SocketAddrV4),
    /// A command was accepted but the reply could not be sent.
    ReplyFailed(SocketAddrV4),
    /// A command failed the checksum. The error is latched and replies stop
    /// until the unit times out.
    ChecksumRejected,
    /// A datagram was discarded without touching the link state.
    Ignored,
    /// No command was accepted within the timeout. Outputs are off and both
    /// checksum indices are back at 1.
    TimedOut,
}

/// The unit's networking context: answers each accepted command with the
/// latest peripheral sample.
pub struct NetworkContext<'a, S: DatagramSocket> {
    socket: S,
    image: &'a SharedImage,
    table: ChecksumTable,
    checksum: ChecksumState,
    watchdog: Watchdog,
    status: UnitStatus,
}

impl<'a, S: DatagramSocket> NetworkContext<'a, S> {
    pub fn new(socket: S, image: &'a SharedImage, config: &UnitConfig) -> Self {
        let status = UnitStatus {
            timeout_error: true,
            ..UnitStatus::default()
        };
        image.set_status(status);
        Self {
            socket,
            image,
            table: config.checksum_table.clone(),
            checksum: ChecksumState::new(),
            watchdog: Watchdog::new(config.timeout_us),
            status,
        }
    }

    /// Runs one non-blocking step at time `now_us` (microseconds, monotonic).
    pub fn poll(&mut self, now_us: u64) -> Result<UnitEvent, LinkError> {
        if !self.watchdog.has_run() {
            self.watchdog.arm(now_us);
        }
        if self.watchdog.evaluate(now_us) == WatchdogEvent::Expired {
            self.enter_timeout();
            return Ok(UnitEvent::TimedOut);
        }
        if self.watchdog.is_expired() && self.status.checksum_error {
            self.status.checksum_error = false;
            self.image.set_status(self.status);
        }

        let mut buffer = [0u8; RECEIVE_BUFFER_LEN];
        let Some((len, source)) = self.socket.recv_from(&mut buffer)? else {
            return Ok(UnitEvent::Idle);
        };
        if len != OUTBOUND_FRAME_LEN {
            io_debug!(CONTEXT, "Ignoring datagram of {} bytes from {}", len, source);
            return Ok(UnitEvent::Ignored);
        }
        if self.status.checksum_error {
            return Ok(UnitEvent::Ignored);
        }

        let command = match OutboundFrame::decode(&buffer[..len], &self.table, &mut self.checksum) {
            Ok(command) => command,
            Err(e) => {
                io_warn!(
                    CONTEXT,
                    "Command from {} rejected, outputs off until timeout: {}",
                    source,
                    e
                );
                self.status.checksum_error = true;
                self.status.connected = false;
                self.image.clear_command();
                self.image.set_status(self.status);
                return Ok(UnitEvent::ChecksumRejected);
            }
        };

        io_trace!(CONTEXT, "RX {:02X?} from {}", &buffer[..len], source);
        self.watchdog.feed();
        if !self.status.connected {
            io_info!(CONTEXT, "Host {} connected", source);
        }
        self.image.publish_command(UnitCommand {
            outputs: command.outputs,
            flags: command.flags,
        });
        self.image.set_peer(Some(source));
        self.status = UnitStatus {
            checksum_error: false,
            timeout_error: false,
            connected: true,
        };
        self.image.set_status(self.status);

        Ok(self.reply(source))
    }

    fn reply(&mut self, peer: SocketAddrV4) -> UnitEvent {
        let sample = self.image.sample();
        let frame = InboundFrame {
            inputs: sample.inputs,
            analog_raw: sample.analog_raw,
            presence: sample.presence,
        };
        let mut buffer = [0u8; INBOUND_FRAME_LEN];
        let index_before = self.checksum.idx_in;
        let sent = frame
            .encode(&self.table, &mut self.checksum, &mut buffer)
            .and_then(|len| self.socket.send_to(&buffer[..len], peer));
        match sent {
            Ok(()) => {
                io_trace!(CONTEXT, "TX {:02X?} to {}", &buffer, peer);
                UnitEvent::Replied(peer)
            }
            Err(e) => {
                self.checksum.idx_in = index_before;
                io_warn!(CONTEXT, "Reply to {} dropped: {}", peer, e);
                UnitEvent::ReplyFailed(peer)
            }
        }
    }

    fn enter_timeout(&mut self) {
        io_warn!(
            CONTEXT,
            "No valid command for {} us; outputs off, checksum indices reset",
            self.watchdog.elapsed()
        );
        self.checksum.reset();
        self.image.clear_command();
        self.image.set_peer(None);
        self.status = UnitStatus {
            checksum_error: false,
            timeout_error: true,
            connected: false,
        };
        self.image.set_status(self.status);
    }

    pub fn status(&self) -> UnitStatus {
        self.status
    }

    pub fn checksum_state(&self) -> ChecksumState {
        self.checksum
    }

    pub fn local_addr(&self) -> Option<SocketAddrV4> {
        self.socket.local_addr()
    }

    pub fn socket_mut(&mut self) -> &mut S {
        &mut self.socket
    }
}
