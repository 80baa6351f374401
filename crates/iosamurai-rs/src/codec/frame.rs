use super::checksum::{ChecksumState, ChecksumTable};
use crate::hal::LinkError;
use crate::types::{
    ANALOG_RAW_MASK, DigitalInputs, DigitalOutputs, FrameFlags, INBOUND_FRAME_LEN,
    OUTBOUND_FRAME_LEN, PeripheralPresence,
};

/// A trait for the fixed-size frames of the protocol.
///
/// Implementors describe their payload layout and which rolling index guards
/// them; the provided `encode`/`decode` methods append or verify the trailing
/// checksum byte.
pub trait Codec: Sized {
    /// Total datagram length including the checksum byte.
    const LEN: usize;

    /// Writes the payload (everything but the checksum) into `buffer[..Self::LEN - 1]`.
    fn write_payload(&self, buffer: &mut [u8]);

    /// Parses a payload of exactly `Self::LEN - 1` bytes.
    fn read_payload(payload: &[u8]) -> Self;

    /// The rolling index guarding this frame direction.
    fn index(state: &mut ChecksumState) -> &mut u8;

    /// Serializes the frame and its checksum into `buffer`, advancing the
    /// direction's index. Returns the number of bytes written.
    fn encode(
        &self,
        table: &ChecksumTable,
        state: &mut ChecksumState,
        buffer: &mut [u8],
    ) -> Result<usize, LinkError> {
        if buffer.len() < Self::LEN {
            return Err(LinkError::BufferTooShort);
        }
        let payload_len = Self::LEN - 1;
        self.write_payload(&mut buffer[..payload_len]);
        let checksum = ChecksumState::seal(table, Self::index(state), &buffer[..payload_len]);
        buffer[payload_len] = checksum;
        Ok(Self::LEN)
    }

    /// Verifies and parses a received datagram.
    ///
    /// On a checksum mismatch the index is left untouched and
    /// `LinkError::ChecksumMismatch` is returned.
    fn decode(
        datagram: &[u8],
        table: &ChecksumTable,
        state: &mut ChecksumState,
    ) -> Result<Self, LinkError> {
        if datagram.len() != Self::LEN {
            return Err(LinkError::InvalidLength(datagram.len()));
        }
        let (payload, checksum) = datagram.split_at(Self::LEN - 1);
        ChecksumState::verify(table, Self::index(state), payload, checksum[0])?;
        Ok(Self::read_payload(payload))
    }
}

/// Controller → unit frame: `[outputs][flags][checksum]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OutboundFrame {
    pub outputs: DigitalOutputs,
    pub flags: FrameFlags,
}

impl Codec for OutboundFrame {
    const LEN: usize = OUTBOUND_FRAME_LEN;

    fn write_payload(&self, buffer: &mut [u8]) {
        buffer[0] = self.outputs.0;
        // Reserved bits are always sent as zero.
        buffer[1] = FrameFlags::from_bits_truncate(self.flags.0).0;
    }

    fn read_payload(payload: &[u8]) -> Self {
        Self {
            outputs: DigitalOutputs(payload[0]),
            flags: FrameFlags::from_bits_truncate(payload[1]),
        }
    }

    fn index(state: &mut ChecksumState) -> &mut u8 {
        &mut state.idx_out
    }
}

/// Unit → controller frame:
/// `[inputs_lo][inputs_hi][analog_lo][analog_hi][checksum]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InboundFrame {
    pub inputs: DigitalInputs,
    /// 12-bit raw analog sample.
    pub analog_raw: u16,
    /// Presence bits carried in the top of `analog_hi`; empty unless the unit reports them.
    pub presence: PeripheralPresence,
}

impl InboundFrame {
    /// The four payload bytes as they travel on the wire.
    pub fn payload(&self) -> [u8; 4] {
        let [inputs_lo, inputs_hi] = self.inputs.to_bytes();
        let [analog_lo, analog_hi] = (self.analog_raw & ANALOG_RAW_MASK).to_le_bytes();
        [inputs_lo, inputs_hi, analog_lo, analog_hi | self.presence.0]
    }
}

impl Codec for InboundFrame {
    const LEN: usize = INBOUND_FRAME_LEN;

    fn write_payload(&self, buffer: &mut [u8]) {
        buffer[..4].copy_from_slice(&self.payload());
    }

    fn read_payload(payload: &[u8]) -> Self {
        Self {
            inputs: DigitalInputs::from_bytes(payload[0], payload[1]),
            analog_raw: u16::from_le_bytes([payload[2], payload[3]]) & ANALOG_RAW_MASK,
            presence: PeripheralPresence::from_analog_hi(payload[3]),
        }
    }

    fn index(state: &mut ChecksumState) -> &mut u8 {
        &mut state.idx_in
    }
}
