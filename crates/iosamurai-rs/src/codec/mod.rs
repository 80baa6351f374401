//! Link codec shared by both peers: frame layouts, the rolling checksum and
//! the byte ↔ bit mapping of the digital points.

pub mod checksum;
pub mod frame;

pub use checksum::{CHECKSUM_INDEX_RESET, ChecksumState, ChecksumTable, checksum_advance};
pub use frame::{Codec, InboundFrame, OutboundFrame};
