use alloc::format;
use alloc::string::String;
use core::net::SocketAddrV4;

/// Trait for structs that provide metadata for logging
pub trait LogMetadata {
    fn meta(&self) -> String;
}

/// Identifies a host-side channel in log lines.
#[derive(Debug, Clone, Copy)]
pub struct ChannelContext {
    pub channel: usize,
    pub peer: SocketAddrV4,
}

impl LogMetadata for ChannelContext {
    fn meta(&self) -> String {
        format!("channel={}, peer={}", self.channel, self.peer)
    }
}

/// Identifies a remote unit context in log lines.
#[derive(Debug, Clone, Copy)]
pub struct UnitContext {
    pub context: &'static str,
}

impl LogMetadata for UnitContext {
    fn meta(&self) -> String {
        format!("unit, context={}", self.context)
    }
}

// =============================================
// Logging Macros (namespaced under crate::log)
// =============================================

// ===== io_info! =====
macro_rules! io_info {
    ($ctx:expr, $fmt:literal $(, $($arg:tt)+)?) => {{
        let meta = $crate::log::LogMetadata::meta(&$ctx);
        log::info!(concat!("[{}] ", $fmt), meta $(, $($arg)+)?);
    }};
    ($fmt:literal $(, $($arg:tt)+)?) => {{
        log::info!($fmt $(, $($arg)+)?);
    }};
}

// ===== io_warn! =====
macro_rules! io_warn {
    ($ctx:expr, $fmt:literal $(, $($arg:tt)+)?) => {{
        let meta = $crate::log::LogMetadata::meta(&$ctx);
        log::warn!(concat!("[{}] ", $fmt), meta $(, $($arg)+)?);
    }};
    ($fmt:literal $(, $($arg:tt)+)?) => {{
        log::warn!($fmt $(, $($arg)+)?);
    }};
}

// ===== io_error! =====
macro_rules! io_error {
    ($ctx:expr, $fmt:literal $(, $($arg:tt)+)?) => {{
        let meta = $crate::log::LogMetadata::meta(&$ctx);
        log::error!(concat!("[{}] ", $fmt), meta $(, $($arg)+)?);
    }};
    ($fmt:literal $(, $($arg:tt)+)?) => {{
        log::error!($fmt $(, $($arg)+)?);
    }};
}

// ===== io_debug! =====
macro_rules! io_debug {
    ($ctx:expr, $fmt:literal $(, $($arg:tt)+)?) => {{
        let meta = $crate::log::LogMetadata::meta(&$ctx);
        log::debug!(concat!("[{}] ", $fmt), meta $(, $($arg)+)?);
    }};
    ($fmt:literal $(, $($arg:tt)+)?) => {{
        log::debug!($fmt $(, $($arg)+)?);
    }};
}

// ===== io_trace! =====
macro_rules! io_trace {
    ($ctx:expr, $fmt:literal $(, $($arg:tt)+)?) => {{
        let meta = $crate::log::LogMetadata::meta(&$ctx);
        log::trace!(concat!("[{}] ", $fmt), meta $(, $($arg)+)?);
    }};
    ($fmt:literal $(, $($arg:tt)+)?) => {{
        log::trace!($fmt $(, $($arg)+)?);
    }};
}

// Re-export macros for use in other files
pub(crate) use io_info;
pub(crate) use io_warn;
pub(crate) use io_error;
pub(crate) use io_debug;
pub(crate) use io_trace;
