// crates/iosamurai-rs-linux/src/lib.rs
//! `std` platform layer for `iosamurai-rs`: a non-blocking UDP socket, host
//! driver bootstrap from configuration and a threaded software unit.

pub mod config;
pub mod driver;
pub mod socket;
pub mod unit_runtime;

pub use config::HostConfig;
pub use driver::{
    ChannelSnapshot, DriverSnapshot, SnapshotPublisher, open_host_driver, snapshot_channel,
};
pub use socket::UdpDatagramSocket;
pub use unit_runtime::{UnitHandle, spawn_unit};
