//! Host-side protocol engine: one channel per remote unit.
//!
//! A channel is driven by the surrounding periodic scheduler, which calls
//! [`Channel::tick_watchdog`], [`Channel::send`] and [`Channel::receive`]
//! back-to-back once per control cycle. None of them block.

use crate::analog::{AnalogConditioner, AnalogReading};
use crate::codec::{
    CHECKSUM_INDEX_RESET, ChecksumState, ChecksumTable, Codec, InboundFrame, OutboundFrame,
};
use crate::config::ChannelConfig;
use crate::hal::{DatagramSocket, LinkError};
use crate::log::{ChannelContext, io_debug, io_error, io_info, io_trace, io_warn};
use crate::types::{
    DigitalInputs, DigitalOutputs, FrameFlags, INBOUND_FRAME_LEN, OUTBOUND_FRAME_LEN,
    PeripheralPresence, RECEIVE_BUFFER_LEN,
};
use crate::watchdog::{Watchdog, WatchdogEvent, WatchdogState};
use core::net::SocketAddrV4;

/// Result of one [`Channel::send`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// A command frame was transmitted.
    Sent,
    /// A zero-output resynchronisation frame was transmitted while expired.
    Probe,
    /// The watchdog has not run yet; nothing was transmitted.
    NotStarted,
    /// The watchdog is expired; nothing was transmitted.
    SkippedExpired,
    /// The socket refused the datagram. It is not retried.
    Dropped,
}

/// Result of one [`Channel::receive`] call that did not fail the checksum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiveOutcome {
    /// A valid frame was accepted and applied.
    Accepted,
    /// No datagram was pending.
    NoData,
    /// A datagram of the given length was discarded.
    WrongLength(usize),
    /// A datagram from an address other than the channel's peer was discarded.
    ForeignSource(SocketAddrV4),
}

/// Running counters of one channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChannelStats {
    pub frames_sent: u64,
    pub frames_received: u64,
    pub checksum_errors: u64,
    pub wrong_length: u64,
    pub foreign_datagrams: u64,
    pub send_failures: u64,
    pub watchdog_trips: u64,
}

/// One independent protocol instance against a single remote unit.
pub struct Channel<S: DatagramSocket> {
    context: ChannelContext,
    socket: S,
    table: ChecksumTable,
    display_off: bool,
    resync_probe: bool,
    resync_interval: u64,

    // --- Link state ---
    checksum: ChecksumState,
    watchdog: Watchdog,
    tick: u64,
    connected: bool,
    start_warning_sent: bool,
    /// Tick of the last resynchronisation frame sent during this expiry.
    last_resync_tick: Option<u64>,
    stats: ChannelStats,

    // --- Process image ---
    outputs: DigitalOutputs,
    inputs: DigitalInputs,
    presence: PeripheralPresence,
    analog: AnalogConditioner,
    interlock_in: bool,
}

impl<S: DatagramSocket> Channel<S> {
    pub fn new(index: usize, peer: SocketAddrV4, socket: S, config: ChannelConfig) -> Self {
        let context = ChannelContext { channel: index, peer };
        io_info!(
            context,
            "Channel created (timeout {} ticks, resync probe {})",
            config.timeout_ticks,
            config.resync_probe
        );
        Self {
            context,
            socket,
            table: config.checksum_table,
            display_off: config.display_off,
            resync_probe: config.resync_probe,
            resync_interval: config.resync_interval_ticks.max(1),
            checksum: ChecksumState::new(),
            watchdog: Watchdog::new(config.timeout_ticks),
            tick: 0,
            connected: false,
            start_warning_sent: false,
            last_resync_tick: None,
            stats: ChannelStats::default(),
            outputs: DigitalOutputs::default(),
            inputs: DigitalInputs::default(),
            presence: PeripheralPresence::empty(),
            analog: AnalogConditioner::new(config.analog),
            interlock_in: false,
        }
    }

    /// Advances the watchdog by one cycle.
    ///
    /// On the `Running → Expired` edge both checksum indices are reset to 1.
    /// Returns `Err(LinkError::WatchdogExpired)` for every cycle the channel
    /// spends expired.
    pub fn tick_watchdog(&mut self) -> Result<(), LinkError> {
        self.tick += 1;
        if self.watchdog.evaluate(self.tick) == WatchdogEvent::Expired {
            self.checksum.reset();
            self.connected = false;
            self.last_resync_tick = None;
            self.stats.watchdog_trips += 1;
            io_warn!(
                self.context,
                "Watchdog expired after {} ticks without a valid frame; outputs forced off, checksum indices reset",
                self.watchdog.elapsed()
            );
        }
        if self.watchdog.is_expired() {
            Err(LinkError::WatchdogExpired)
        } else {
            Ok(())
        }
    }

    /// Transmits this cycle's command frame.
    ///
    /// While expired with resync enabled, one zero-output frame is
    /// sent from the reset index, then nothing for `resync_interval_ticks`
    /// cycles so that its reply can arrive before the next one goes out.
    pub fn send(&mut self) -> Result<SendOutcome, LinkError> {
        if !self.watchdog.has_run() {
            if !self.start_warning_sent {
                self.start_warning_sent = true;
                io_warn!(self.context, "Transmission suppressed until the watchdog has run once");
            }
            return Ok(SendOutcome::NotStarted);
        }

        let expired = self.watchdog.is_expired();
        if expired && !self.resync_probe {
            return Ok(SendOutcome::SkippedExpired);
        }
        let resync_pending = self
            .last_resync_tick
            .is_some_and(|sent| self.tick - sent < self.resync_interval);
        if expired && resync_pending {
            return Ok(SendOutcome::SkippedExpired);
        }
        if expired {
            // Every resync frame is encoded from the reset index so that it
            // matches a unit that has reset as well, however many were lost.
            self.checksum.idx_out = CHECKSUM_INDEX_RESET;
        }

        let frame = OutboundFrame {
            outputs: self.effective_outputs(),
            flags: self.flags(),
        };
        let mut buffer = [0u8; OUTBOUND_FRAME_LEN];
        let index_before = self.checksum.idx_out;
        let len = frame.encode(&self.table, &mut self.checksum, &mut buffer)?;

        match self.socket.send_to(&buffer[..len], self.context.peer) {
            Ok(()) => {
                self.stats.frames_sent += 1;
                io_trace!(self.context, "TX {:02X?}", &buffer[..len]);
                if expired {
                    self.last_resync_tick = Some(self.tick);
                    Ok(SendOutcome::Probe)
                } else {
                    Ok(SendOutcome::Sent)
                }
            }
            Err(e) => {
                // The peer never saw this frame, so its index must not count.
                self.checksum.idx_out = index_before;
                self.stats.send_failures += 1;
                io_warn!(self.context, "Send failed, frame dropped: {}", e);
                Ok(SendOutcome::Dropped)
            }
        }
    }

    /// Performs one non-blocking read and applies the frame if it is valid.
    ///
    /// A checksum mismatch is returned as `Err(LinkError::ChecksumMismatch)`.
    /// In every case other than `Accepted` the channel is marked disconnected
    /// and the last-known inputs and analog value are left untouched.
    pub fn receive(&mut self) -> Result<ReceiveOutcome, LinkError> {
        let mut buffer = [0u8; RECEIVE_BUFFER_LEN];
        let received = self.socket.recv_from(&mut buffer).inspect_err(|e| {
            self.connected = false;
            io_error!(self.context, "Socket read failed: {}", e);
        })?;

        let Some((len, source)) = received else {
            self.connected = false;
            return Ok(ReceiveOutcome::NoData);
        };
        if source != self.context.peer {
            self.connected = false;
            self.stats.foreign_datagrams += 1;
            io_debug!(self.context, "Ignoring datagram from {}", source);
            return Ok(ReceiveOutcome::ForeignSource(source));
        }
        if len != INBOUND_FRAME_LEN {
            self.connected = false;
            self.stats.wrong_length += 1;
            io_debug!(self.context, "Ignoring datagram of {} bytes", len);
            return Ok(ReceiveOutcome::WrongLength(len));
        }

        let frame = match InboundFrame::decode(&buffer[..len], &self.table, &mut self.checksum) {
            Ok(frame) => frame,
            Err(e) => {
                self.connected = false;
                if matches!(e, LinkError::ChecksumMismatch { .. }) {
                    self.stats.checksum_errors += 1;
                }
                io_warn!(self.context, "Frame rejected: {}", e);
                return Err(e);
            }
        };

        io_trace!(self.context, "RX {:02X?}", &buffer[..len]);
        self.inputs = frame.inputs;
        self.presence = frame.presence;
        self.analog.process(frame.analog_raw);
        self.connected = true;
        self.stats.frames_received += 1;
        if self.watchdog.feed() == WatchdogEvent::Recovered {
            self.last_resync_tick = None;
            io_info!(self.context, "Link recovered, outputs released");
        }
        Ok(ReceiveOutcome::Accepted)
    }

    fn flags(&self) -> FrameFlags {
        let mut flags = FrameFlags::empty();
        flags.set(FrameFlags::ANALOG_LOW_PASS, self.analog.config().low_pass);
        flags.set(FrameFlags::DISPLAY_OFF, self.display_off);
        flags
    }

    fn effective_outputs(&self) -> DigitalOutputs {
        if self.watchdog.is_expired() {
            DigitalOutputs::default()
        } else {
            self.outputs
        }
    }

    // --- Digital I/O ---

    /// Last accepted state of input `index`.
    pub fn input(&self, index: usize) -> bool {
        self.inputs.get(index)
    }

    /// Negation of [`input`](Self::input).
    pub fn input_not(&self, index: usize) -> bool {
        !self.inputs.get(index)
    }

    pub fn inputs(&self) -> DigitalInputs {
        self.inputs
    }

    /// Commands output `index`. Takes effect on the next [`send`](Self::send).
    pub fn set_output(&mut self, index: usize, value: bool) {
        self.outputs.set(index, value);
    }

    pub fn set_outputs(&mut self, outputs: DigitalOutputs) {
        self.outputs = outputs;
    }

    /// Output `index` as transmitted. Reads `false` while the watchdog is expired.
    pub fn output(&self, index: usize) -> bool {
        self.effective_outputs().get(index)
    }

    pub fn outputs(&self) -> DigitalOutputs {
        self.effective_outputs()
    }

    // --- Analog ---

    pub fn analog(&self) -> f32 {
        self.analog.reading().value
    }

    pub fn analog_s32(&self) -> i32 {
        self.analog.reading().value_s32
    }

    pub fn analog_reading(&self) -> AnalogReading {
        self.analog.reading()
    }

    pub fn analog_raw(&self) -> u16 {
        self.analog.raw()
    }

    pub fn set_analog_range(&mut self, min: f32, max: f32) {
        self.analog.set_range(min, max);
    }

    /// Toggles the host-side filter and the unit-side filter request.
    pub fn set_analog_low_pass(&mut self, enable: bool) {
        self.analog.set_low_pass(enable);
    }

    pub fn set_analog_round(&mut self, enable: bool) {
        self.analog.set_round(enable);
    }

    pub fn set_display_off(&mut self, display_off: bool) {
        self.display_off = display_off;
    }

    // --- Link status ---

    /// True when the last [`receive`](Self::receive) accepted a frame.
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// The upstream "ready" signal forwarded by the interlock loop.
    pub fn set_interlock_in(&mut self, ready: bool) {
        self.interlock_in = ready;
    }

    /// `interlock_in`, forced low while the watchdog is expired.
    pub fn interlock_out(&self) -> bool {
        self.interlock_in && !self.watchdog.is_expired()
    }

    /// Cycles since the last accepted frame.
    pub fn elapsed_ticks(&self) -> u64 {
        self.watchdog.elapsed()
    }

    pub fn watchdog_state(&self) -> WatchdogState {
        self.watchdog.state()
    }

    pub fn is_expired(&self) -> bool {
        self.watchdog.is_expired()
    }

    pub fn checksum_state(&self) -> ChecksumState {
        self.checksum
    }

    /// Peripherals the unit reported present, if it reports them.
    pub fn presence(&self) -> PeripheralPresence {
        self.presence
    }

    pub fn stats(&self) -> ChannelStats {
        self.stats
    }

    pub fn index(&self) -> usize {
        self.context.channel
    }

    pub fn peer(&self) -> SocketAddrV4 {
        self.context.peer
    }

    pub fn local_addr(&self) -> Option<SocketAddrV4> {
        self.socket.local_addr()
    }

    pub fn socket(&self) -> &S {
        &self.socket
    }

    pub fn socket_mut(&mut self) -> &mut S {
        &mut self.socket
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::collections::VecDeque;
    use alloc::vec::Vec;
    use core::net::Ipv4Addr;

    const UNIT: SocketAddrV4 = SocketAddrV4::new(Ipv4Addr::new(192, 168, 0, 178), 8888);

    #[derive(Default)]
    struct MockSocket {
        sent: Vec<Vec<u8>>,
        inbox: VecDeque<(Vec<u8>, SocketAddrV4)>,
        fail_sends: bool,
    }

    impl DatagramSocket for MockSocket {
        fn send_to(&mut self, data: &[u8], _peer: SocketAddrV4) -> Result<(), LinkError> {
            if self.fail_sends {
                return Err(LinkError::IoError);
            }
            self.sent.push(data.to_vec());
            Ok(())
        }

        fn recv_from(
            &mut self,
            buffer: &mut [u8],
        ) -> Result<Option<(usize, SocketAddrV4)>, LinkError> {
            Ok(self.inbox.pop_front().map(|(data, from)| {
                buffer[..data.len()].copy_from_slice(&data);
                (data.len(), from)
            }))
        }
    }

    fn channel(config: ChannelConfig) -> Channel<MockSocket> {
        Channel::new(0, UNIT, MockSocket::default(), config)
    }

    /// Encodes a unit reply with the unit-side index `unit`.
    fn reply(unit: &mut ChecksumState, inputs: u16, analog: u16) -> Vec<u8> {
        let mut buf = [0u8; INBOUND_FRAME_LEN];
        InboundFrame {
            inputs: DigitalInputs(inputs),
            analog_raw: analog,
            presence: PeripheralPresence::empty(),
        }
        .encode(&ChecksumTable::IDENTITY, unit, &mut buf)
        .unwrap();
        buf.to_vec()
    }

    #[test]
    fn test_no_transmission_before_first_tick() {
        let mut ch = channel(ChannelConfig::default());
        ch.set_output(0, true);
        assert_eq!(ch.send().unwrap(), SendOutcome::NotStarted);
        assert_eq!(ch.send().unwrap(), SendOutcome::NotStarted);
        assert!(ch.socket().sent.is_empty());
        assert_eq!(ch.checksum_state(), ChecksumState::new());

        ch.tick_watchdog().unwrap();
        assert_eq!(ch.send().unwrap(), SendOutcome::Sent);
        // outputs=0x01, flags=0 -> 1 + 1 + 0 + 1 = 3
        assert_eq!(ch.socket().sent[0], [0x01, 0x00, 0x03]);
    }

    #[test]
    fn test_accepted_frame_updates_image() {
        let mut ch = channel(ChannelConfig::default().with_analog(crate::AnalogConfig {
            max: 100.0,
            ..Default::default()
        }));
        let mut unit = ChecksumState::new();
        ch.tick_watchdog().unwrap();
        ch.socket_mut().inbox.push_back((reply(&mut unit, 0x8001, 4095), UNIT));

        assert_eq!(ch.receive().unwrap(), ReceiveOutcome::Accepted);
        assert!(ch.is_connected());
        assert!(ch.input(0) && ch.input(15) && ch.input_not(1));
        assert_eq!(ch.analog(), 100.0);
        assert_eq!(ch.analog_s32(), 100);
        assert_eq!(ch.checksum_state().idx_in, unit.idx_in);
        assert_eq!(ch.stats().frames_received, 1);
    }

    #[test]
    fn test_checksum_mismatch_keeps_last_known_values() {
        let mut ch = channel(ChannelConfig::default());
        let mut unit = ChecksumState::new();
        ch.tick_watchdog().unwrap();
        ch.socket_mut().inbox.push_back((reply(&mut unit, 0x00FF, 2000), UNIT));
        ch.receive().unwrap();
        let idx_in = ch.checksum_state().idx_in;

        let mut corrupted = reply(&mut unit, 0xFF00, 10);
        corrupted[4] ^= 0x40;
        ch.socket_mut().inbox.push_back((corrupted, UNIT));
        let err = ch.receive().unwrap_err();
        assert!(matches!(err, LinkError::ChecksumMismatch { .. }));
        assert!(!ch.is_connected());
        assert_eq!(ch.inputs(), DigitalInputs(0x00FF));
        assert_eq!(ch.analog_raw(), 2000);
        assert_eq!(ch.checksum_state().idx_in, idx_in);
        assert_eq!(ch.stats().checksum_errors, 1);
    }

    #[test]
    fn test_wrong_length_and_foreign_source_are_no_data() {
        let mut ch = channel(ChannelConfig::default());
        ch.tick_watchdog().unwrap();
        ch.socket_mut().inbox.push_back((alloc::vec![1, 2, 3], UNIT));
        assert_eq!(ch.receive().unwrap(), ReceiveOutcome::WrongLength(3));

        let stranger = SocketAddrV4::new(Ipv4Addr::new(10, 0, 0, 9), 8888);
        let mut unit = ChecksumState::new();
        ch.socket_mut().inbox.push_back((reply(&mut unit, 1, 1), stranger));
        assert_eq!(ch.receive().unwrap(), ReceiveOutcome::ForeignSource(stranger));

        assert_eq!(ch.receive().unwrap(), ReceiveOutcome::NoData);
        assert!(!ch.is_connected());
        assert_eq!(ch.checksum_state(), ChecksumState::new());
        assert_eq!(ch.stats().wrong_length, 1);
        assert_eq!(ch.stats().foreign_datagrams, 1);
    }

    #[test]
    fn test_fail_safe_while_expired() {
        let mut ch = channel(ChannelConfig::default().with_timeout_ticks(2));
        ch.set_output(3, true);
        ch.set_interlock_in(true);
        ch.tick_watchdog().unwrap();
        assert!(ch.interlock_out());
        assert!(ch.output(3));

        ch.tick_watchdog().unwrap();
        assert_eq!(ch.tick_watchdog(), Err(LinkError::WatchdogExpired));
        assert!(ch.is_expired());
        assert_eq!(ch.outputs(), DigitalOutputs(0));
        assert!(!ch.interlock_out());
        assert_eq!(ch.send().unwrap(), SendOutcome::SkippedExpired);
        assert_eq!(ch.stats().watchdog_trips, 1);

        // The commanded value is kept and released on recovery.
        let mut unit = ChecksumState::new();
        ch.socket_mut().inbox.push_back((reply(&mut unit, 0, 0), UNIT));
        ch.receive().unwrap();
        assert!(!ch.is_expired());
        assert!(ch.output(3));
        assert!(ch.interlock_out());
    }

    #[test]
    fn test_interlock_mirrors_upstream_ready() {
        let mut ch = channel(ChannelConfig::default());
        ch.tick_watchdog().unwrap();
        assert!(!ch.interlock_out());
        ch.set_interlock_in(true);
        assert!(ch.interlock_out());
    }

    #[test]
    fn test_resync_probe_is_encoded_from_reset_index() {
        let mut ch = channel(
            ChannelConfig::default()
                .with_timeout_ticks(1)
                .with_resync_probe(true),
        );
        ch.set_output(0, true);
        ch.tick_watchdog().unwrap();
        ch.send().unwrap();
        ch.send().unwrap();
        assert_ne!(ch.checksum_state().idx_out, CHECKSUM_INDEX_RESET);

        assert!(ch.tick_watchdog().is_err());
        assert_eq!(ch.send().unwrap(), SendOutcome::Probe);
        let sent = &ch.socket().sent;
        // Zero outputs, no flags, index 1: 1 + 0 + 0 + 1 = 2.
        assert_eq!(sent[sent.len() - 1], [0x00, 0x00, 0x02]);
    }

    #[test]
    fn test_resync_frames_are_spaced_by_interval() {
        let mut ch = channel(
            ChannelConfig::default()
                .with_timeout_ticks(1)
                .with_resync_probe(true)
                .with_resync_interval_ticks(3),
        );
        ch.tick_watchdog().unwrap();
        ch.send().unwrap();
        ch.tick_watchdog().unwrap_err();

        let mut outcomes = Vec::new();
        for _ in 0..7 {
            outcomes.push(ch.send().unwrap());
            let _ = ch.tick_watchdog();
        }
        use SendOutcome::{Probe, SkippedExpired};
        assert_eq!(
            outcomes,
            [Probe, SkippedExpired, SkippedExpired, Probe, SkippedExpired, SkippedExpired, Probe]
        );
        // Every frame restarts from the reset index, whatever the previous one did.
        let sent = &ch.socket().sent;
        assert_eq!(sent.len(), 4);
        assert!(sent[1..].iter().all(|frame| frame == &[0x00, 0x00, 0x02]));
    }

    #[test]
    fn test_failed_resync_frame_is_retried_next_cycle() {
        let mut ch = channel(
            ChannelConfig::default()
                .with_timeout_ticks(1)
                .with_resync_probe(true),
        );
        ch.tick_watchdog().unwrap();
        ch.tick_watchdog().unwrap_err();
        ch.socket_mut().fail_sends = true;
        assert_eq!(ch.send().unwrap(), SendOutcome::Dropped);
        ch.socket_mut().fail_sends = false;
        let _ = ch.tick_watchdog();
        assert_eq!(ch.send().unwrap(), SendOutcome::Probe);
    }

    #[test]
    fn test_each_trip_resyncs_immediately() {
        let mut ch = channel(
            ChannelConfig::default()
                .with_timeout_ticks(1)
                .with_resync_probe(true),
        );
        ch.tick_watchdog().unwrap();
        ch.tick_watchdog().unwrap_err();
        assert_eq!(ch.send().unwrap(), SendOutcome::Probe);

        let mut unit = ChecksumState::new();
        ch.socket_mut().inbox.push_back((reply(&mut unit, 0, 0), UNIT));
        ch.receive().unwrap();
        assert!(!ch.is_expired());

        // The next trip resyncs at once instead of waiting out the old interval.
        ch.tick_watchdog().unwrap();
        ch.tick_watchdog().unwrap_err();
        assert_eq!(ch.send().unwrap(), SendOutcome::Probe);
    }

    #[test]
    fn test_failed_send_does_not_advance_index() {
        let mut ch = channel(ChannelConfig::default());
        ch.tick_watchdog().unwrap();
        ch.socket_mut().fail_sends = true;
        assert_eq!(ch.send().unwrap(), SendOutcome::Dropped);
        assert_eq!(ch.checksum_state().idx_out, CHECKSUM_INDEX_RESET);
        assert_eq!(ch.stats().send_failures, 1);
    }

    #[test]
    fn test_flags_follow_configuration() {
        let mut ch = channel(ChannelConfig::default().with_display_off(true));
        ch.set_analog_low_pass(true);
        ch.tick_watchdog().unwrap();
        ch.send().unwrap();
        assert_eq!(ch.socket().sent[0][1], 0b11);
    }
}
