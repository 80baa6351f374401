//! The rolling "jump-table" checksum.
//!
//! Each direction keeps an 8-bit index. Every accepted frame advances it by
//! the byte sum of its payload plus one; the expected checksum is the table
//! entry at the new index. With the identity table this is a mod-256 running
//! sum: any corruption that changes the payload sum is caught, but swapped
//! bytes or compensating errors are not. The scheme offers no authentication.

use crate::hal::LinkError;

/// Value both direction indices hold after power-up and after every
/// watchdog-triggered resynchronisation.
pub const CHECKSUM_INDEX_RESET: u8 = 1;

/// A fixed 256-entry byte permutation shared by both peers.
#[derive(Clone, PartialEq, Eq)]
pub struct ChecksumTable([u8; 256]);

impl ChecksumTable {
    /// The table used by the reference units: `table[i] = i`.
    pub const IDENTITY: Self = {
        let mut table = [0u8; 256];
        let mut i = 0;
        while i < 256 {
            table[i] = i as u8;
            i += 1;
        }
        Self(table)
    };

    /// Creates a table from raw bytes, rejecting anything that is not a permutation.
    pub fn new(table: [u8; 256]) -> Result<Self, LinkError> {
        let mut seen = [false; 256];
        for &value in table.iter() {
            if seen[value as usize] {
                return Err(LinkError::InvalidChecksumTable);
            }
            seen[value as usize] = true;
        }
        Ok(Self(table))
    }

    /// Table lookup.
    pub fn get(&self, index: u8) -> u8 {
        self.0[index as usize]
    }

    /// Advances `index` over `payload` and returns `(new_index, expected_byte)`.
    pub fn advance(&self, index: u8, payload: &[u8]) -> (u8, u8) {
        let new_index = payload
            .iter()
            .fold(index, |acc, &b| acc.wrapping_add(b))
            .wrapping_add(1);
        (new_index, self.get(new_index))
    }
}

impl Default for ChecksumTable {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl core::fmt::Debug for ChecksumTable {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        if *self == Self::IDENTITY {
            write!(f, "ChecksumTable(identity)")
        } else {
            write!(f, "ChecksumTable({:02X?}..)", &self.0[..8])
        }
    }
}

/// `checksum_advance` with the identity table.
pub fn checksum_advance(index: u8, payload: &[u8]) -> (u8, u8) {
    ChecksumTable::IDENTITY.advance(index, payload)
}

/// Per-direction rolling indices of one peer.
///
/// `idx_out` tracks controller → unit frames, `idx_in` unit → controller
/// frames. The host encodes with `idx_out` and decodes with `idx_in`; the
/// unit does the opposite. An index only moves when a frame is encoded or
/// accepted, so a single lost frame desynchronises the peers until both
/// sides [`reset`](Self::reset).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChecksumState {
    pub idx_out: u8,
    pub idx_in: u8,
}

impl ChecksumState {
    pub fn new() -> Self {
        Self {
            idx_out: CHECKSUM_INDEX_RESET,
            idx_in: CHECKSUM_INDEX_RESET,
        }
    }

    /// Realigns both directions to the reset value.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Encodes one frame: advances `index` and returns the checksum byte to append.
    pub(crate) fn seal(table: &ChecksumTable, index: &mut u8, payload: &[u8]) -> u8 {
        let (new_index, checksum) = table.advance(*index, payload);
        *index = new_index;
        checksum
    }

    /// Verifies one received frame. `index` only advances when the frame is accepted.
    pub(crate) fn verify(
        table: &ChecksumTable,
        index: &mut u8,
        payload: &[u8],
        received: u8,
    ) -> Result<(), LinkError> {
        let (new_index, expected) = table.advance(*index, payload);
        if expected != received {
            return Err(LinkError::ChecksumMismatch { expected, received });
        }
        *index = new_index;
        Ok(())
    }
}

impl Default for ChecksumState {
    fn default() -> Self {
        Self::new()
    }
}
