//! Host driver bootstrap and the RT → NRT diagnostic snapshot channel.

use crate::config::HostConfig;
use crate::socket::UdpDatagramSocket;
use crossbeam_channel::{Receiver, Sender, TrySendError};
use iosamurai_rs::{
    Channel, ChannelStats, DatagramSocket, HostDriver, WatchdogState, parse_address_list,
};
use log::{error, info};
use serde::Serialize;
use std::net::{Ipv4Addr, SocketAddrV4};

/// Opens one socket per configured address and builds the driver.
///
/// A channel whose socket cannot be created is reported once and left out;
/// the remaining channels keep their address-list index.
pub fn open_host_driver(config: &HostConfig) -> HostDriver<UdpDatagramSocket> {
    let peers = parse_address_list(&config.addresses);
    if peers.is_empty() {
        error!("No valid unit address in '{}'", config.addresses);
    }
    let channel_config = config.channel_config();
    let mut channels = Vec::with_capacity(peers.len());
    for (index, peer) in peers.into_iter().enumerate() {
        match open_socket(config.local_port, index) {
            Ok(socket) => {
                channels.push(Channel::new(index, peer, socket, channel_config.clone()));
            }
            Err(e) => error!("Channel {} ({}) disabled: {}", index, peer, e),
        }
    }
    info!("Host driver ready with {} channel(s)", channels.len());
    HostDriver::new(channels)
}

fn open_socket(base_port: Option<u16>, index: usize) -> Result<UdpDatagramSocket, String> {
    match base_port {
        None => UdpDatagramSocket::bind_ephemeral(),
        Some(base) => {
            let port = u16::try_from(index)
                .ok()
                .and_then(|i| base.checked_add(i))
                .ok_or_else(|| format!("Local port {} + {} out of range", base, index))?;
            UdpDatagramSocket::bind(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port))
        }
    }
}

/// A serializable copy of a channel's counters.
#[derive(Serialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub frames_sent: u64,
    pub frames_received: u64,
    pub checksum_errors: u64,
    pub wrong_length: u64,
    pub foreign_datagrams: u64,
    pub send_failures: u64,
    pub watchdog_trips: u64,
}

impl From<ChannelStats> for StatsSnapshot {
    fn from(stats: ChannelStats) -> Self {
        Self {
            frames_sent: stats.frames_sent,
            frames_received: stats.frames_received,
            checksum_errors: stats.checksum_errors,
            wrong_length: stats.wrong_length,
            foreign_datagrams: stats.foreign_datagrams,
            send_failures: stats.send_failures,
            watchdog_trips: stats.watchdog_trips,
        }
    }
}

/// The process image and link state of one channel at the end of a cycle.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct ChannelSnapshot {
    pub index: usize,
    pub peer: String,
    pub connected: bool,
    pub watchdog: &'static str,
    pub elapsed_ticks: u64,
    pub inputs: u16,
    pub outputs: u8,
    pub analog: f32,
    pub analog_s32: i32,
    pub interlock_out: bool,
    pub output_expander: bool,
    pub input_expander: bool,
    pub display: bool,
    pub stats: StatsSnapshot,
}

impl ChannelSnapshot {
    pub fn from_channel<S: DatagramSocket>(channel: &Channel<S>) -> Self {
        let presence = channel.presence();
        Self {
            index: channel.index(),
            peer: channel.peer().to_string(),
            connected: channel.is_connected(),
            watchdog: match channel.watchdog_state() {
                WatchdogState::Idle => "idle",
                WatchdogState::Running => "running",
                WatchdogState::Expired => "expired",
            },
            elapsed_ticks: channel.elapsed_ticks(),
            inputs: channel.inputs().0,
            outputs: channel.outputs().0,
            analog: channel.analog(),
            analog_s32: channel.analog_s32(),
            interlock_out: channel.interlock_out(),
            output_expander: presence.has_output_expander(),
            input_expander: presence.has_input_expander(),
            display: presence.has_display(),
            stats: channel.stats().into(),
        }
    }
}

/// One snapshot of every channel, sent from the cycle thread to a monitor.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct DriverSnapshot {
    pub cycle: u64,
    pub channels: Vec<ChannelSnapshot>,
}

impl DriverSnapshot {
    pub fn from_driver<S: DatagramSocket>(driver: &HostDriver<S>) -> Self {
        Self {
            cycle: driver.last_report().cycle,
            channels: driver.channels().map(ChannelSnapshot::from_channel).collect(),
        }
    }

    pub fn to_json(&self) -> Result<String, String> {
        serde_json::to_string(self).map_err(|e| e.to_string())
    }
}

/// The cycle-thread end of the snapshot channel. Never blocks: a snapshot the
/// consumer has not picked up yet is discarded in favour of the newer one, so
/// the consumer always reads the latest cycle.
pub struct SnapshotPublisher {
    tx: Sender<DriverSnapshot>,
    /// Used only to evict a stale snapshot.
    stale: Receiver<DriverSnapshot>,
}

impl SnapshotPublisher {
    /// Returns `true` if the snapshot was queued. Returns `false` only when
    /// the consumer took the slot between the eviction and the retry.
    pub fn publish<S: DatagramSocket>(&self, driver: &HostDriver<S>) -> bool {
        match self.tx.try_send(DriverSnapshot::from_driver(driver)) {
            Ok(()) => true,
            Err(TrySendError::Full(snapshot)) => {
                let _ = self.stale.try_recv();
                self.tx.try_send(snapshot).is_ok()
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }
}

/// Creates the single-slot channel between the cycle thread and a monitor.
pub fn snapshot_channel() -> (SnapshotPublisher, Receiver<DriverSnapshot>) {
    let (tx, rx) = crossbeam_channel::bounded(1);
    let publisher = SnapshotPublisher {
        tx,
        stale: rx.clone(),
    };
    (publisher, rx)
}
