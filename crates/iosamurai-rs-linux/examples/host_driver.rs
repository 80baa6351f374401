// crates/iosamurai-rs-linux/examples/host_driver.rs
//! Runs the multi-channel host driver at a fixed cycle and prints a JSON
//! snapshot of every channel once per second from a non-real-time thread.
//!
//! Configuration comes from the JSON file named by the first argument, or
//! from the `IOSAMURAI_*` environment variables:
//!
//! `IOSAMURAI_ADDRESSES="192.168.0.178:8888" cargo run -p iosamurai-rs-linux --example host_driver`
//!
//! Input 0 of every unit is mirrored to output 0 and the interlock input is
//! held high, so `interlock_out` reports the link health.

use iosamurai_rs_linux::{DriverSnapshot, HostConfig, open_host_driver, snapshot_channel};
use log::{error, info, warn};
use std::{
    env, process, thread,
    time::{Duration, Instant},
};

fn main() {
    env_logger::try_init().ok();

    let config = match env::args().nth(1) {
        Some(path) => HostConfig::from_json_file(path),
        None => HostConfig::from_env(),
    };
    let config = match config {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            process::exit(1);
        }
    };

    let (publisher, snapshot_rx) = snapshot_channel();

    // The monitor thread; it may lag, the cycle thread never waits for it.
    thread::spawn(move || {
        while let Ok(snapshot) = snapshot_rx.recv() {
            print_snapshot(&snapshot);
            thread::sleep(Duration::from_secs(1));
        }
    });

    let mut driver = open_host_driver(&config);
    if driver.is_empty() {
        error!("No channel could be opened");
        process::exit(1);
    }
    for channel in driver.channels_mut() {
        channel.set_interlock_in(true);
    }

    let period = Duration::from_micros(config.cycle_us);
    info!("Running {} channel(s) every {:?}", driver.len(), period);
    let mut next = Instant::now();
    loop {
        driver.run_cycle();
        for channel in driver.channels_mut() {
            let mirrored = channel.input(0);
            channel.set_output(0, mirrored);
        }
        publisher.publish(&driver);

        next += period;
        let now = Instant::now();
        if next > now {
            thread::sleep(next - now);
        } else {
            warn!("Cycle overrun by {:?}", now - next);
            next = now;
        }
    }
}

fn print_snapshot(snapshot: &DriverSnapshot) {
    match snapshot.to_json() {
        Ok(json) => println!("{}", json),
        Err(e) => error!("Failed to serialize snapshot: {}", e),
    }
}
