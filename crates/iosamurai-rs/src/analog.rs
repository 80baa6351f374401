//! Analog signal conditioning: range scaling, exponential low-pass and
//! optional rounding.

use crate::config::AnalogConfig;
use crate::types::ANALOG_RAW_MAX;

/// Smoothing factor used by the host when its own low-pass is enabled.
pub const DEFAULT_HOST_ALPHA: f32 = 0.1;

/// Smoothing factor used by the unit when the host requests low-pass filtering.
pub const DEFAULT_UNIT_ALPHA: f32 = 0.25;

/// Clamps `raw` to the 12-bit range and maps it linearly onto `[min, max]`.
pub fn scale(raw: u16, min: f32, max: f32) -> f32 {
    let ratio = f32::from(raw.min(ANALOG_RAW_MAX)) / f32::from(ANALOG_RAW_MAX);
    ratio * (max - min) + min
}

/// Exponential moving average.
///
/// The first call (with `first == true`) returns `sample` unchanged and clears
/// the flag. Written as `previous + α·(sample − previous)`, which equals
/// `α·sample + (1−α)·previous` and leaves a constant input exactly unchanged.
pub fn low_pass(sample: f32, previous: f32, first: &mut bool, alpha: f32) -> f32 {
    if *first {
        *first = false;
        return sample;
    }
    previous + alpha * (sample - previous)
}

/// Maps an uncalibrated ADC reading from `[adc_min, adc_max]` onto `[0, 4095]`, clamped.
pub fn calibrate(reading: u16, adc_min: u16, adc_max: u16) -> u16 {
    if adc_max <= adc_min {
        return reading.min(ANALOG_RAW_MAX);
    }
    let span = f32::from(adc_max - adc_min);
    let value = (f32::from(reading) - f32::from(adc_min)) / span * f32::from(ANALOG_RAW_MAX);
    round_half_away(value).clamp(0, i32::from(ANALOG_RAW_MAX)) as u16
}

/// Rounds to the nearest integer, halves away from zero. Usable without `std`.
pub fn round_half_away(value: f32) -> i32 {
    if value >= 0.0 {
        (value + 0.5) as i32
    } else {
        (value - 0.5) as i32
    }
}

/// One conditioned analog value: the floating-point reading and its integer twin.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AnalogReading {
    pub value: f32,
    pub value_s32: i32,
}

/// Per-channel analog state: the last raw sample, the filter memory and the
/// conditioning parameters.
#[derive(Debug, Clone)]
pub struct AnalogConditioner {
    config: AnalogConfig,
    raw: u16,
    filtered: f32,
    first_sample: bool,
    reading: AnalogReading,
}

impl AnalogConditioner {
    pub fn new(config: AnalogConfig) -> Self {
        Self {
            config,
            raw: 0,
            filtered: 0.0,
            first_sample: true,
            reading: AnalogReading::default(),
        }
    }

    pub fn config(&self) -> &AnalogConfig {
        &self.config
    }

    /// Changes the output range. The filter restarts from the next sample so
    /// old-range history does not bleed into the new range.
    pub fn set_range(&mut self, min: f32, max: f32) {
        if self.config.min != min || self.config.max != max {
            self.config.min = min;
            self.config.max = max;
            self.first_sample = true;
        }
    }

    pub fn set_low_pass(&mut self, enable: bool) {
        if enable && !self.config.low_pass {
            self.first_sample = true;
        }
        self.config.low_pass = enable;
    }

    pub fn set_round(&mut self, enable: bool) {
        self.config.round = enable;
    }

    /// Runs one raw sample through scaling, filtering and rounding.
    pub fn process(&mut self, raw: u16) -> AnalogReading {
        self.raw = raw.min(ANALOG_RAW_MAX);
        let mut value = scale(self.raw, self.config.min, self.config.max);
        if self.config.low_pass {
            value = low_pass(value, self.filtered, &mut self.first_sample, self.config.alpha);
            self.filtered = value;
        }
        let value_s32 = if self.config.round {
            let rounded = round_half_away(value);
            value = rounded as f32;
            rounded
        } else {
            value as i32
        };
        self.reading = AnalogReading { value, value_s32 };
        self.reading
    }

    pub fn raw(&self) -> u16 {
        self.raw
    }

    pub fn filtered(&self) -> f32 {
        self.filtered
    }

    pub fn is_first_sample(&self) -> bool {
        self.first_sample
    }

    /// Last conditioned reading. Persists across cycles without a valid frame.
    pub fn reading(&self) -> AnalogReading {
        self.reading
    }
}

impl Default for AnalogConditioner {
    fn default() -> Self {
        Self::new(AnalogConfig::default())
    }
}
