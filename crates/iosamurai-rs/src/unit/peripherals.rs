use super::shared::{SharedImage, UnitSample, UnitStatus};
use crate::analog::{calibrate, low_pass, round_half_away};
use crate::config::UnitConfig;
use crate::log::{UnitContext, io_info};
use crate::types::{
    ANALOG_RAW_MAX, DIGITAL_INPUT_COUNT, DIGITAL_OUTPUT_COUNT, DigitalInputs, DigitalOutputs,
    FrameFlags, PeripheralPresence,
};
use core::fmt;
use core::net::Ipv4Addr;

const CONTEXT: UnitContext = UnitContext { context: "peripheral" };

/// Board-level I/O of a remote unit.
///
/// Implementations wrap the expander, ADC, display and LED drivers. Only the
/// peripherals reported by [`probe`](Self::probe) are accessed afterwards.
pub trait UnitPeripherals {
    /// Detects the optional peripherals. Called once, at startup.
    fn probe(&mut self) -> PeripheralPresence;

    /// Reads the 16 digital inputs. Only called with an input expander present.
    fn read_inputs(&mut self) -> DigitalInputs;

    /// Drives the 8 digital outputs. Only called with an output expander present.
    fn write_outputs(&mut self, outputs: DigitalOutputs);

    /// Reads the uncalibrated ADC.
    fn read_adc(&mut self) -> u16;

    /// Renders the status screen. Only called with a display present and not
    /// disabled by the host.
    fn show_status(&mut self, view: &StatusView);

    /// Blanks the display when the host disables it.
    fn blank_display(&mut self) {}

    /// Drives the link indicator.
    fn set_led(&mut self, on: bool);
}

/// Link condition as shown on the status screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStatus {
    Connected,
    ChecksumError,
    TimeoutError,
}

impl LinkStatus {
    pub fn from_status(status: UnitStatus) -> Self {
        if status.checksum_error {
            LinkStatus::ChecksumError
        } else if status.timeout_error {
            LinkStatus::TimeoutError
        } else {
            LinkStatus::Connected
        }
    }

    pub fn text(&self) -> &'static str {
        match self {
            LinkStatus::Connected => "Connected.",
            LinkStatus::ChecksumError => "Checksum error",
            LinkStatus::TimeoutError => "Timeout error",
        }
    }
}

/// Everything the status screen shows for one refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusView {
    pub outputs: DigitalOutputs,
    pub inputs: DigitalInputs,
    pub analog: u16,
    /// The host's address when known, else the unit's own. Hidden on a checksum error.
    pub address: Option<Ipv4Addr>,
    pub link: LinkStatus,
}

fn write_bits(f: &mut fmt::Formatter<'_>, word: u16, count: usize) -> fmt::Result {
    for i in 0..count {
        f.write_str(if (word >> i) & 1 == 1 { "1" } else { "0" })?;
    }
    Ok(())
}

impl fmt::Display for StatusView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_bits(f, u16::from(self.outputs.0), DIGITAL_OUTPUT_COUNT)?;
        writeln!(f)?;
        writeln!(f, "0123456789ABCDEF")?;
        write_bits(f, self.inputs.0, DIGITAL_INPUT_COUNT)?;
        writeln!(f)?;
        writeln!(f, "ADC: {}", self.analog)?;
        if let Some(address) = self.address {
            writeln!(f, "{}", address)?;
        }
        write!(f, "{}", self.link.text())
    }
}

/// The unit's peripheral context: mirrors the accepted command onto the
/// outputs and samples inputs and the analog channel for the next reply.
pub struct PeripheralContext<'a, P: UnitPeripherals> {
    peripherals: P,
    image: &'a SharedImage,
    presence: PeripheralPresence,
    report_peripherals: bool,
    adc_min: u16,
    adc_max: u16,
    alpha: f32,
    filtered: f32,
    first_sample: bool,
    display_blanked: bool,
    own_address: Option<Ipv4Addr>,
}

impl<'a, P: UnitPeripherals> PeripheralContext<'a, P> {
    /// Probes the peripherals once and publishes an all-zero sample.
    pub fn new(mut peripherals: P, image: &'a SharedImage, config: &UnitConfig) -> Self {
        let presence = peripherals.probe();
        io_info!(
            CONTEXT,
            "Probed peripherals: output expander {}, input expander {}, display {}",
            presence.has_output_expander(),
            presence.has_input_expander(),
            presence.has_display()
        );
        image.publish_sample(UnitSample::default());
        Self {
            peripherals,
            image,
            presence,
            report_peripherals: config.report_peripherals,
            adc_min: config.adc_min,
            adc_max: config.adc_max,
            alpha: config.alpha,
            filtered: 0.0,
            first_sample: true,
            display_blanked: false,
            own_address: None,
        }
    }

    /// Address shown on the status screen while no host is known.
    pub fn with_own_address(mut self, address: Ipv4Addr) -> Self {
        self.own_address = Some(address);
        self
    }

    /// Runs one peripheral cycle and returns what the status screen shows.
    pub fn poll(&mut self) -> StatusView {
        let status = self.image.status();
        let command = self.image.command();
        self.peripherals.set_led(!status.timeout_error);

        let outputs = match command {
            Some(command) if status.is_healthy() => command.outputs,
            _ => DigitalOutputs::default(),
        };
        if self.presence.has_output_expander() {
            self.peripherals.write_outputs(outputs);
        }

        let flags = command.map(|c| c.flags).unwrap_or_default();
        let analog = self.sample_analog(flags.contains(FrameFlags::ANALOG_LOW_PASS));
        let inputs = if self.presence.has_input_expander() {
            self.peripherals.read_inputs()
        } else {
            DigitalInputs::default()
        };
        self.image.publish_sample(UnitSample {
            inputs,
            analog_raw: analog,
            presence: if self.report_peripherals {
                self.presence
            } else {
                PeripheralPresence::empty()
            },
        });

        let link = LinkStatus::from_status(status);
        let view = StatusView {
            outputs,
            inputs,
            analog,
            address: match link {
                LinkStatus::ChecksumError => None,
                _ => self.image.peer().map(|peer| *peer.ip()).or(self.own_address),
            },
            link,
        };
        self.refresh_display(&view, flags.contains(FrameFlags::DISPLAY_OFF));
        view
    }

    fn sample_analog(&mut self, low_pass_requested: bool) -> u16 {
        let reading = self.peripherals.read_adc();
        let calibrated = f32::from(calibrate(reading, self.adc_min, self.adc_max));
        self.filtered = if low_pass_requested {
            low_pass(calibrated, self.filtered, &mut self.first_sample, self.alpha)
        } else {
            calibrated
        };
        round_half_away(self.filtered).clamp(0, i32::from(ANALOG_RAW_MAX)) as u16
    }

    fn refresh_display(&mut self, view: &StatusView, display_off: bool) {
        if !self.presence.has_display() {
            return;
        }
        if display_off {
            if !self.display_blanked {
                self.peripherals.blank_display();
                self.display_blanked = true;
            }
            return;
        }
        self.display_blanked = false;
        self.peripherals.show_status(view);
    }

    pub fn presence(&self) -> PeripheralPresence {
        self.presence
    }

    pub fn peripherals(&self) -> &P {
        &self.peripherals
    }

    pub fn peripherals_mut(&mut self) -> &mut P {
        &mut self.peripherals
    }

    pub fn into_peripherals(self) -> P {
        self.peripherals
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unit::shared::UnitCommand;
    use alloc::string::ToString;
    use core::net::SocketAddrV4;

    #[derive(Default)]
    struct Board {
        presence: PeripheralPresence,
        probes: u32,
        inputs: u16,
        adc: u16,
        outputs: Option<DigitalOutputs>,
        shown: u32,
        blanked: u32,
        led: bool,
    }

    impl UnitPeripherals for Board {
        fn probe(&mut self) -> PeripheralPresence {
            self.probes += 1;
            self.presence
        }
        fn read_inputs(&mut self) -> DigitalInputs {
            DigitalInputs(self.inputs)
        }
        fn write_outputs(&mut self, outputs: DigitalOutputs) {
            self.outputs = Some(outputs);
        }
        fn read_adc(&mut self) -> u16 {
            self.adc
        }
        fn show_status(&mut self, _view: &StatusView) {
            self.shown += 1;
        }
        fn blank_display(&mut self) {
            self.blanked += 1;
        }
        fn set_led(&mut self, on: bool) {
            self.led = on;
        }
    }

    fn full_board() -> Board {
        Board {
            presence: PeripheralPresence::OUTPUT_EXPANDER
                | PeripheralPresence::INPUT_EXPANDER
                | PeripheralPresence::DISPLAY,
            ..Board::default()
        }
    }

    fn healthy(image: &SharedImage, outputs: u8, flags: FrameFlags) {
        image.publish_command(UnitCommand {
            outputs: DigitalOutputs(outputs),
            flags,
        });
        image.set_status(UnitStatus {
            checksum_error: false,
            timeout_error: false,
            connected: true,
        });
    }

    #[test]
    fn test_outputs_follow_healthy_command_only() {
        let image = SharedImage::new();
        let mut ctx = PeripheralContext::new(full_board(), &image, &UnitConfig::default());

        ctx.poll();
        assert_eq!(ctx.peripherals().outputs, Some(DigitalOutputs(0)));
        assert!(!ctx.peripherals().led);

        healthy(&image, 0x5A, FrameFlags::empty());
        ctx.poll();
        assert_eq!(ctx.peripherals().outputs, Some(DigitalOutputs(0x5A)));
        assert!(ctx.peripherals().led);

        image.set_status(UnitStatus {
            checksum_error: true,
            timeout_error: false,
            connected: false,
        });
        let view = ctx.poll();
        assert_eq!(ctx.peripherals().outputs, Some(DigitalOutputs(0)));
        assert_eq!(view.link, LinkStatus::ChecksumError);
        assert_eq!(view.address, None);
    }

    #[test]
    fn test_probe_runs_once_and_absent_peripherals_are_skipped() {
        let image = SharedImage::new();
        let board = Board {
            inputs: 0xFFFF,
            ..Board::default()
        };
        let mut ctx = PeripheralContext::new(board, &image, &UnitConfig::default());
        healthy(&image, 0xFF, FrameFlags::empty());
        for _ in 0..3 {
            ctx.poll();
        }
        assert_eq!(ctx.peripherals().probes, 1);
        assert_eq!(ctx.peripherals().outputs, None);
        assert_eq!(ctx.peripherals().shown, 0);
        assert_eq!(image.sample().inputs, DigitalInputs(0));
    }

    #[test]
    fn test_sample_is_calibrated_and_published() {
        let image = SharedImage::new();
        let config = UnitConfig::default().with_calibration(100, 3900);
        let mut board = full_board();
        board.inputs = 0x1234;
        board.adc = 3950;
        let mut ctx = PeripheralContext::new(board, &image, &config);
        ctx.poll();
        let sample = image.sample();
        assert_eq!(sample.inputs, DigitalInputs(0x1234));
        assert_eq!(sample.analog_raw, 4095);
        assert_eq!(sample.presence, PeripheralPresence::empty());
    }

    #[test]
    fn test_presence_reported_when_enabled() {
        let image = SharedImage::new();
        let config = UnitConfig::default().with_report_peripherals(true);
        let mut ctx = PeripheralContext::new(full_board(), &image, &config);
        ctx.poll();
        assert!(image.sample().presence.has_display());
    }

    #[test]
    fn test_unit_low_pass_follows_host_flag() {
        let image = SharedImage::new();
        let mut board = full_board();
        board.adc = 1000;
        let mut ctx = PeripheralContext::new(board, &image, &UnitConfig::default());
        healthy(&image, 0, FrameFlags::ANALOG_LOW_PASS);
        assert_eq!(ctx.poll().analog, 1000);
        ctx.peripherals_mut().adc = 2000;
        // 1000 + 0.25 * (2000 - 1000)
        assert_eq!(ctx.poll().analog, 1250);

        healthy(&image, 0, FrameFlags::empty());
        assert_eq!(ctx.poll().analog, 2000);
    }

    #[test]
    fn test_display_off_blanks_once() {
        let image = SharedImage::new();
        let mut ctx = PeripheralContext::new(full_board(), &image, &UnitConfig::default());
        healthy(&image, 0, FrameFlags::DISPLAY_OFF);
        ctx.poll();
        ctx.poll();
        assert_eq!(ctx.peripherals().blanked, 1);
        assert_eq!(ctx.peripherals().shown, 0);

        healthy(&image, 0, FrameFlags::empty());
        ctx.poll();
        assert_eq!(ctx.peripherals().shown, 1);
    }

    #[test]
    fn test_status_view_text() {
        let image = SharedImage::new();
        let mut ctx = PeripheralContext::new(full_board(), &image, &UnitConfig::default())
            .with_own_address(Ipv4Addr::new(192, 168, 0, 178));
        let view = ctx.poll();
        assert_eq!(view.address, Some(Ipv4Addr::new(192, 168, 0, 178)));
        assert!(view.to_string().ends_with("192.168.0.178\nTimeout error"));

        healthy(&image, 0b0000_0011, FrameFlags::empty());
        image.set_peer(Some(SocketAddrV4::new(Ipv4Addr::new(192, 168, 0, 5), 40000)));
        let text = ctx.poll().to_string();
        assert!(text.starts_with("11000000\n0123456789ABCDEF\n"));
        assert!(text.ends_with("192.168.0.5\nConnected."));
    }
}
