//! A software remote unit: the network and peripheral contexts on two OS threads.

use crate::socket::UdpDatagramSocket;
use iosamurai_rs::unit::{
    NetworkContext, PeripheralContext, SharedImage, UnitEvent, UnitPeripherals,
};
use iosamurai_rs::{LinkError, UnitConfig};
use log::{error, info};
use std::net::SocketAddrV4;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// How long the network thread yields when no datagram is pending.
const NETWORK_IDLE_SLEEP: Duration = Duration::from_micros(100);

/// Handle to a running unit. Dropping it stops both threads.
pub struct UnitHandle<P: UnitPeripherals + Send + 'static> {
    stop: Arc<AtomicBool>,
    image: Arc<SharedImage>,
    local_addr: Option<SocketAddrV4>,
    network: Option<JoinHandle<Result<(), LinkError>>>,
    peripheral: Option<JoinHandle<P>>,
}

/// Binds the unit socket and starts both contexts.
///
/// Each context is built on its own thread and borrows the shared image from
/// there. The peripherals are probed when the peripheral thread starts.
/// `peripheral_period` is the refresh interval of the peripheral context.
pub fn spawn_unit<P: UnitPeripherals + Send + 'static>(
    bind: SocketAddrV4,
    peripherals: P,
    config: UnitConfig,
    peripheral_period: Duration,
) -> Result<UnitHandle<P>, String> {
    let socket = UdpDatagramSocket::bind(bind)?;
    let local_addr = iosamurai_rs::DatagramSocket::local_addr(&socket);
    let image = Arc::new(SharedImage::new());
    let stop = Arc::new(AtomicBool::new(false));

    let network = {
        let stop = stop.clone();
        let image = image.clone();
        let config = config.clone();
        thread::Builder::new()
            .name("unit-network".into())
            .spawn(move || {
                let mut network_ctx = NetworkContext::new(socket, &image, &config);
                let start = Instant::now();
                while !stop.load(Ordering::Relaxed) {
                    let now_us = start.elapsed().as_micros() as u64;
                    match network_ctx.poll(now_us) {
                        Ok(UnitEvent::Idle) => thread::sleep(NETWORK_IDLE_SLEEP),
                        Ok(_) => {}
                        Err(e) => {
                            error!("[unit-network] Socket failed: {}", e);
                            return Err(e);
                        }
                    }
                }
                Ok(())
            })
            .map_err(|e| format!("Failed to spawn network thread: {}", e))?
    };

    let peripheral = {
        let stop = stop.clone();
        let image = image.clone();
        thread::Builder::new()
            .name("unit-peripheral".into())
            .spawn(move || {
                let mut peripheral_ctx = PeripheralContext::new(peripherals, &image, &config);
                if let Some(addr) = local_addr {
                    peripheral_ctx = peripheral_ctx.with_own_address(*addr.ip());
                }
                while !stop.load(Ordering::Relaxed) {
                    peripheral_ctx.poll();
                    thread::sleep(peripheral_period);
                }
                peripheral_ctx.into_peripherals()
            })
            .map_err(|e| format!("Failed to spawn peripheral thread: {}", e))?
    };

    info!("Unit listening on {:?}", local_addr);
    Ok(UnitHandle {
        stop,
        image,
        local_addr,
        network: Some(network),
        peripheral: Some(peripheral),
    })
}

impl<P: UnitPeripherals + Send + 'static> UnitHandle<P> {
    pub fn local_addr(&self) -> Option<SocketAddrV4> {
        self.local_addr
    }

    /// The process image shared by both threads.
    pub fn image(&self) -> &Arc<SharedImage> {
        &self.image
    }

    /// Stops and joins both threads, handing the peripherals back.
    pub fn stop(mut self) -> Result<P, String> {
        self.stop.store(true, Ordering::Relaxed);
        let network = self.network.take().map(|h| h.join());
        let peripheral = self.peripheral.take().map(|h| h.join());
        match network {
            Some(Ok(Ok(()))) | None => {}
            Some(Ok(Err(e))) => return Err(format!("Network context failed: {}", e)),
            Some(Err(_)) => return Err("Network thread panicked".to_string()),
        }
        match peripheral {
            Some(Ok(peripherals)) => Ok(peripherals),
            Some(Err(_)) => Err("Peripheral thread panicked".to_string()),
            None => Err("Unit already stopped".to_string()),
        }
    }
}

impl<P: UnitPeripherals + Send + 'static> Drop for UnitHandle<P> {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.network.take() {
            let _ = handle.join();
        }
        if let Some(handle) = self.peripheral.take() {
            let _ = handle.join();
        }
    }
}
