//! Remote unit runtime.
//!
//! The unit runs two contexts concurrently. [`NetworkContext`] owns the
//! socket, the checksum state and the watchdog and answers every accepted
//! command. [`PeripheralContext`] owns the board I/O. They communicate only
//! through a [`SharedImage`].

pub mod network;
pub mod peripherals;
pub mod shared;

pub use network::{NetworkContext, UnitEvent};
pub use peripherals::{LinkStatus, PeripheralContext, StatusView, UnitPeripherals};
pub use shared::{SharedImage, UnitCommand, UnitSample, UnitStatus};
