use core::ops::BitOr;

// --- Wire Constants ---

/// Length of a controller → unit datagram: `[outputs][flags][checksum]`.
pub const OUTBOUND_FRAME_LEN: usize = 3;

/// Length of a unit → controller datagram:
/// `[inputs_lo][inputs_hi][analog_lo][analog_hi][checksum]`.
pub const INBOUND_FRAME_LEN: usize = 5;

/// Number of digital inputs carried by an inbound frame.
pub const DIGITAL_INPUT_COUNT: usize = 16;

/// Number of digital outputs carried by an outbound frame.
pub const DIGITAL_OUTPUT_COUNT: usize = 8;

/// Largest raw analog sample (12-bit ADC).
pub const ANALOG_RAW_MAX: u16 = 4095;

/// Mask applied to the little-endian analog word to extract the 12-bit sample.
pub const ANALOG_RAW_MASK: u16 = 0x0FFF;

/// Default UDP port of a remote unit.
pub const DEFAULT_UNIT_PORT: u16 = 8888;

/// Receive buffer size used by both peers. Larger than either frame so that
/// oversized datagrams are detected as wrong-length instead of truncated.
pub const RECEIVE_BUFFER_LEN: usize = 64;

/// The 16 sampled digital inputs of a remote unit, bit `i` = input `i`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DigitalInputs(pub u16);

impl DigitalInputs {
    /// Builds the input word from the two wire bytes.
    pub fn from_bytes(lo: u8, hi: u8) -> Self {
        Self(u16::from_le_bytes([lo, hi]))
    }

    /// Returns `[inputs_lo, inputs_hi]`.
    pub fn to_bytes(self) -> [u8; 2] {
        self.0.to_le_bytes()
    }

    /// State of input `index`; out-of-range indices read as `false`.
    pub fn get(&self, index: usize) -> bool {
        index < DIGITAL_INPUT_COUNT && (self.0 >> index) & 1 == 1
    }

    /// Unpacks into one boolean per input, bit 0 first.
    pub fn to_array(self) -> [bool; DIGITAL_INPUT_COUNT] {
        core::array::from_fn(|i| self.get(i))
    }

    /// Packs booleans into the input word, element 0 = bit 0.
    pub fn from_array(bits: &[bool; DIGITAL_INPUT_COUNT]) -> Self {
        Self(
            bits.iter()
                .enumerate()
                .fold(0u16, |acc, (i, &b)| acc | ((b as u16) << i)),
        )
    }
}

/// The 8 commanded digital outputs, bit `i` = output `i`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DigitalOutputs(pub u8);

impl DigitalOutputs {
    /// State of output `index`; out-of-range indices read as `false`.
    pub fn get(&self, index: usize) -> bool {
        index < DIGITAL_OUTPUT_COUNT && (self.0 >> index) & 1 == 1
    }

    /// Sets or clears output `index`. Out-of-range indices are ignored.
    pub fn set(&mut self, index: usize, value: bool) {
        if index >= DIGITAL_OUTPUT_COUNT {
            return;
        }
        if value {
            self.0 |= 1 << index;
        } else {
            self.0 &= !(1 << index);
        }
    }

    /// Unpacks into one boolean per output, bit 0 first.
    pub fn to_array(self) -> [bool; DIGITAL_OUTPUT_COUNT] {
        core::array::from_fn(|i| self.get(i))
    }

    /// Packs booleans into the output byte, element 0 = bit 0.
    pub fn from_array(bits: &[bool; DIGITAL_OUTPUT_COUNT]) -> Self {
        Self(
            bits.iter()
                .enumerate()
                .fold(0u8, |acc, (i, &b)| acc | ((b as u8) << i)),
        )
    }
}

/// The `flags` byte of an outbound frame as a type-safe bitmask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameFlags(pub u8);

impl FrameFlags {
    // --- Flag Constants ---
    pub const ANALOG_LOW_PASS: Self = Self(1 << 0);
    pub const DISPLAY_OFF: Self = Self(1 << 1);

    /// Bits that are defined on the wire. Everything else is reserved and sent as zero.
    pub const DEFINED: Self = Self(0b0000_0011);

    /// Creates flags from a raw byte, dropping reserved bits.
    pub fn from_bits_truncate(bits: u8) -> Self {
        Self(bits & Self::DEFINED.0)
    }

    /// Checks if all of the specified flags are set.
    pub fn contains(&self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }

    /// Returns an empty set of flags.
    pub fn empty() -> Self {
        Self(0)
    }

    /// Sets or clears the specified flags.
    pub fn set(&mut self, other: Self, value: bool) {
        if value {
            self.0 |= other.0;
        } else {
            self.0 &= !other.0;
        }
    }
}

impl BitOr for FrameFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0)
    }
}

/// Optional peripherals a unit found when it probed its bus at startup.
///
/// Optionally reported in the top three bits of `analog_hi`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PeripheralPresence(pub u8);

impl PeripheralPresence {
    pub const OUTPUT_EXPANDER: Self = Self(1 << 7);
    pub const INPUT_EXPANDER: Self = Self(1 << 6);
    pub const DISPLAY: Self = Self(1 << 5);

    const MASK: u8 = 0b1110_0000;

    /// Extracts presence bits from the `analog_hi` wire byte.
    pub fn from_analog_hi(analog_hi: u8) -> Self {
        Self(analog_hi & Self::MASK)
    }

    pub fn contains(&self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }

    pub fn empty() -> Self {
        Self(0)
    }

    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0 & Self::MASK;
    }

    pub fn has_output_expander(&self) -> bool {
        self.contains(Self::OUTPUT_EXPANDER)
    }

    pub fn has_input_expander(&self) -> bool {
        self.contains(Self::INPUT_EXPANDER)
    }

    pub fn has_display(&self) -> bool {
        self.contains(Self::DISPLAY)
    }
}

impl BitOr for PeripheralPresence {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0)
    }
}
