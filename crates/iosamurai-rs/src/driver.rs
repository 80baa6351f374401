//! Multi-channel host driver.

use crate::channel::{Channel, ReceiveOutcome, SendOutcome};
use crate::hal::{DatagramSocket, LinkError};
use crate::log::io_info;
use alloc::vec::Vec;

/// What happened to one channel during one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelCycle {
    pub watchdog: Result<(), LinkError>,
    pub send: Result<SendOutcome, LinkError>,
    pub receive: Result<ReceiveOutcome, LinkError>,
    pub connected: bool,
}

/// Outcome of one [`HostDriver::run_cycle`], indexed like the channels.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleReport {
    pub cycle: u64,
    pub channels: Vec<ChannelCycle>,
}

impl CycleReport {
    pub fn connected_count(&self) -> usize {
        self.channels.iter().filter(|c| c.connected).count()
    }

    pub fn all_connected(&self) -> bool {
        self.channels.iter().all(|c| c.connected)
    }

    /// Channels whose watchdog is currently expired.
    pub fn expired(&self) -> impl Iterator<Item = usize> + '_ {
        self.channels
            .iter()
            .enumerate()
            .filter(|(_, c)| c.watchdog.is_err())
            .map(|(i, _)| i)
    }
}

/// An ordered set of independent channels driven in lockstep by one
/// periodic caller.
pub struct HostDriver<S: DatagramSocket> {
    channels: Vec<Channel<S>>,
    report: CycleReport,
}

impl<S: DatagramSocket> HostDriver<S> {
    pub fn new(channels: Vec<Channel<S>>) -> Self {
        let report = CycleReport {
            cycle: 0,
            channels: Vec::with_capacity(channels.len()),
        };
        Self { channels, report }
    }

    /// Runs `tick_watchdog`, `send` and `receive` on every channel, in order.
    ///
    /// The report buffer is reused, so a steady-state cycle does not allocate.
    pub fn run_cycle(&mut self) -> &CycleReport {
        self.report.cycle += 1;
        self.report.channels.clear();
        for channel in self.channels.iter_mut() {
            let watchdog = channel.tick_watchdog();
            let send = channel.send();
            let receive = channel.receive();
            self.report.channels.push(ChannelCycle {
                watchdog,
                send,
                receive,
                connected: channel.is_connected(),
            });
        }
        &self.report
    }

    /// The report of the most recent cycle.
    pub fn last_report(&self) -> &CycleReport {
        &self.report
    }

    pub fn channel(&self, index: usize) -> Option<&Channel<S>> {
        self.channels.get(index)
    }

    pub fn channel_mut(&mut self, index: usize) -> Option<&mut Channel<S>> {
        self.channels.get_mut(index)
    }

    pub fn channels(&self) -> impl Iterator<Item = &Channel<S>> {
        self.channels.iter()
    }

    pub fn channels_mut(&mut self) -> impl Iterator<Item = &mut Channel<S>> {
        self.channels.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Stops the driver and closes every channel's socket.
    pub fn shutdown(self) {
        io_info!(
            "Host driver shut down after {} cycles, {} channel(s) closed",
            self.report.cycle,
            self.channels.len()
        );
    }
}
