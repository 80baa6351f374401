// crates/iosamurai-rs-linux/examples/soft_unit.rs
//! A software remote unit for bench testing a host without hardware.
//!
//! The inputs count up once per second, the ADC sweeps its range and the
//! status screen is printed whenever its text changes.
//!
//! `cargo run -p iosamurai-rs-linux --example soft_unit -- 0.0.0.0:8888`

use iosamurai_rs::unit::{StatusView, UnitPeripherals};
use iosamurai_rs::{DigitalInputs, DigitalOutputs, PeripheralPresence, UnitConfig};
use iosamurai_rs_linux::spawn_unit;
use log::{error, info};
use std::net::{Ipv4Addr, SocketAddrV4};
use std::{env, process, thread, time::Duration, time::Instant};

struct ConsoleBoard {
    start: Instant,
    outputs: DigitalOutputs,
    screen: String,
}

impl UnitPeripherals for ConsoleBoard {
    fn probe(&mut self) -> PeripheralPresence {
        PeripheralPresence::OUTPUT_EXPANDER
            | PeripheralPresence::INPUT_EXPANDER
            | PeripheralPresence::DISPLAY
    }

    fn read_inputs(&mut self) -> DigitalInputs {
        DigitalInputs(self.start.elapsed().as_secs() as u16)
    }

    fn write_outputs(&mut self, outputs: DigitalOutputs) {
        if outputs != self.outputs {
            info!("Outputs {:08b}", outputs.0);
            self.outputs = outputs;
        }
    }

    fn read_adc(&mut self) -> u16 {
        (self.start.elapsed().as_millis() % 4096) as u16
    }

    fn show_status(&mut self, view: &StatusView) {
        // Ignore the ADC line so the screen is only printed on real changes.
        let text = StatusView { analog: 0, ..*view }.to_string();
        if text != self.screen {
            println!("{}\n", view);
            self.screen = text;
        }
    }

    fn blank_display(&mut self) {
        info!("Display off");
        self.screen.clear();
    }

    fn set_led(&mut self, _on: bool) {}
}

fn main() {
    env_logger::try_init().ok();

    let bind = match env::args().nth(1).map(|arg| arg.parse::<SocketAddrV4>()) {
        None => SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, iosamurai_rs::types::DEFAULT_UNIT_PORT),
        Some(Ok(addr)) => addr,
        Some(Err(e)) => {
            error!("Invalid bind address: {}", e);
            process::exit(1);
        }
    };

    let board = ConsoleBoard {
        start: Instant::now(),
        outputs: DigitalOutputs::default(),
        screen: String::new(),
    };
    let config = UnitConfig::default().with_report_peripherals(true);
    let _unit = match spawn_unit(bind, board, config, Duration::from_millis(10)) {
        Ok(unit) => unit,
        Err(e) => {
            error!("{}", e);
            process::exit(1);
        }
    };

    loop {
        thread::park();
    }
}
