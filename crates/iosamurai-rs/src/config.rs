//! Static configuration of host channels and of the remote unit.

use crate::analog::{DEFAULT_HOST_ALPHA, DEFAULT_UNIT_ALPHA};
use crate::codec::ChecksumTable;
use crate::types::ANALOG_RAW_MAX;

/// Default host watchdog timeout, in control cycles.
pub const DEFAULT_TIMEOUT_TICKS: u64 = 10;

/// Default spacing of resynchronisation frames, in control cycles.
pub const DEFAULT_RESYNC_INTERVAL_TICKS: u64 = 10;

/// Default unit watchdog timeout, in microseconds.
pub const DEFAULT_UNIT_TIMEOUT_US: u64 = 100_000;

/// Analog conditioning parameters of one channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnalogConfig {
    /// Engineering value mapped to raw 0.
    pub min: f32,
    /// Engineering value mapped to raw 4095.
    pub max: f32,
    /// Enables the host-side exponential low-pass. Also requested from the unit
    /// through the frame flags.
    pub low_pass: bool,
    /// Rounds the conditioned value to the nearest integer.
    pub round: bool,
    /// EMA smoothing factor.
    pub alpha: f32,
}

impl Default for AnalogConfig {
    fn default() -> Self {
        Self {
            min: 0.0,
            max: 1.0,
            low_pass: false,
            round: false,
            alpha: DEFAULT_HOST_ALPHA,
        }
    }
}

/// Configuration of one host channel.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    pub timeout_ticks: u64,
    pub analog: AnalogConfig,
    /// Asks the unit to blank its display.
    pub display_off: bool,
    /// While expired, transmit zero-output frames from the reset index instead
    /// of staying silent. Needed when the unit only answers requests.
    pub resync_probe: bool,
    /// Cycles between two resynchronisation frames. Must exceed the reply
    /// latency, or the second frame reaches a unit that already accepted the
    /// first one and is rejected.
    pub resync_interval_ticks: u64,
    pub checksum_table: ChecksumTable,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            timeout_ticks: DEFAULT_TIMEOUT_TICKS,
            analog: AnalogConfig::default(),
            display_off: false,
            resync_probe: false,
            resync_interval_ticks: DEFAULT_RESYNC_INTERVAL_TICKS,
            checksum_table: ChecksumTable::IDENTITY,
        }
    }
}

impl ChannelConfig {
    pub fn with_timeout_ticks(mut self, ticks: u64) -> Self {
        self.timeout_ticks = ticks;
        self
    }

    pub fn with_analog(mut self, analog: AnalogConfig) -> Self {
        self.analog = analog;
        self
    }

    pub fn with_display_off(mut self, display_off: bool) -> Self {
        self.display_off = display_off;
        self
    }

    pub fn with_resync_probe(mut self, enable: bool) -> Self {
        self.resync_probe = enable;
        self
    }

    pub fn with_resync_interval_ticks(mut self, ticks: u64) -> Self {
        self.resync_interval_ticks = ticks;
        self
    }

    pub fn with_checksum_table(mut self, table: ChecksumTable) -> Self {
        self.checksum_table = table;
        self
    }
}

/// Configuration of a remote unit.
#[derive(Debug, Clone)]
pub struct UnitConfig {
    /// Time without an accepted command before the unit fails safe.
    pub timeout_us: u64,
    /// Raw ADC reading that maps to 0.
    pub adc_min: u16,
    /// Raw ADC reading that maps to 4095.
    pub adc_max: u16,
    /// Smoothing factor of the unit-side low-pass.
    pub alpha: f32,
    /// Advertise probed peripherals in the top bits of `analog_hi`.
    pub report_peripherals: bool,
    pub checksum_table: ChecksumTable,
}

impl Default for UnitConfig {
    fn default() -> Self {
        Self {
            timeout_us: DEFAULT_UNIT_TIMEOUT_US,
            adc_min: 0,
            adc_max: ANALOG_RAW_MAX,
            alpha: DEFAULT_UNIT_ALPHA,
            report_peripherals: false,
            checksum_table: ChecksumTable::IDENTITY,
        }
    }
}

impl UnitConfig {
    pub fn with_timeout_us(mut self, timeout_us: u64) -> Self {
        self.timeout_us = timeout_us;
        self
    }

    pub fn with_calibration(mut self, adc_min: u16, adc_max: u16) -> Self {
        self.adc_min = adc_min;
        self.adc_max = adc_max;
        self
    }

    pub fn with_alpha(mut self, alpha: f32) -> Self {
        self.alpha = alpha;
        self
    }

    pub fn with_report_peripherals(mut self, enable: bool) -> Self {
        self.report_peripherals = enable;
        self
    }

    pub fn with_checksum_table(mut self, table: ChecksumTable) -> Self {
        self.checksum_table = table;
        self
    }
}
