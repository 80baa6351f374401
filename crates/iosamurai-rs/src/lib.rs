#![cfg_attr(not(feature = "std"), no_std)]

// 'alloc' is used for dynamic allocation (e.g., the channel list of a host driver)
extern crate alloc;

// --- Foundation Modules ---
pub mod types;
pub mod hal;
pub(crate) mod log;

// --- Link Codec ---
pub mod codec;
pub mod analog;

// --- Supervision and Protocol Engines ---
pub mod watchdog;
pub mod config;
pub mod address;
pub mod channel;
pub mod driver;
pub mod unit;

// --- Top-level Exports ---
pub use types::{DigitalInputs, DigitalOutputs, FrameFlags, PeripheralPresence};
pub use hal::{DatagramSocket, LinkError};
pub use codec::{ChecksumState, ChecksumTable, InboundFrame, OutboundFrame};
pub use analog::{AnalogConditioner, AnalogReading};
pub use watchdog::{Watchdog, WatchdogEvent, WatchdogState};
pub use config::{AnalogConfig, ChannelConfig, UnitConfig};
pub use address::parse_address_list;
pub use channel::{Channel, ChannelStats, ReceiveOutcome, SendOutcome};
pub use driver::{ChannelCycle, CycleReport, HostDriver};
pub use unit::{NetworkContext, PeripheralContext, SharedImage, UnitEvent, UnitPeripherals};
