use crate::hal::LinkError;
use crate::log::io_warn;
use alloc::vec::Vec;
use core::net::{Ipv4Addr, SocketAddrV4};

/// Parses a semicolon-separated list of `ip:port` entries, one per channel.
///
/// Malformed entries are logged and skipped. Order and duplicates are kept.
pub fn parse_address_list(list: &str) -> Vec<SocketAddrV4> {
    list.split(';')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .filter_map(|entry| match parse_entry(entry) {
            Ok(addr) => Some(addr),
            Err(e) => {
                io_warn!("Skipping address entry '{}': {}", entry, e);
                None
            }
        })
        .collect()
}

fn parse_entry(entry: &str) -> Result<SocketAddrV4, LinkError> {
    let (ip, port) = entry.rsplit_once(':').ok_or(LinkError::InvalidAddress)?;
    let ip: Ipv4Addr = ip.trim().parse()?;
    let port: u16 = port.trim().parse()?;
    if port == 0 {
        return Err(LinkError::InvalidAddress);
    }
    Ok(SocketAddrV4::new(ip, port))
}
