use core::fmt;
use core::net::SocketAddrV4;

/// Defines a portable, descriptive Error type for the IO-Samurai stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkError {
    /// The socket for a channel could not be created or bound.
    SocketUnavailable(&'static str),
    /// An underlying I/O error occurred while sending or receiving.
    IoError,
    /// The provided buffer is too small for the operation.
    BufferTooShort,
    /// A datagram of the wrong size was received.
    InvalidLength(usize),
    /// The received checksum byte does not match the locally expected one.
    ChecksumMismatch { expected: u8, received: u8 },
    /// No valid frame was accepted within the configured timeout.
    WatchdogExpired,
    /// An address entry could not be parsed.
    InvalidAddress,
    /// A checksum table is not a 256-entry byte permutation.
    InvalidChecksumTable,
}

impl LinkError {
    /// Transport errors disable a channel. Everything else heals once valid
    /// traffic resumes.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            Self::SocketUnavailable(_) | Self::InvalidAddress | Self::InvalidChecksumTable
        )
    }
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SocketUnavailable(s) => write!(f, "Socket unavailable: {}", s),
            Self::IoError => write!(f, "An underlying I/O error occurred"),
            Self::BufferTooShort => write!(f, "Buffer is too short for the frame"),
            Self::InvalidLength(len) => write!(f, "Datagram has invalid length: {len}"),
            Self::ChecksumMismatch { expected, received } => write!(
                f,
                "Checksum mismatch: expected {expected:#04x}, received {received:#04x}"
            ),
            Self::WatchdogExpired => write!(f, "Watchdog expired, link considered dead"),
            Self::InvalidAddress => write!(f, "Invalid ip:port address entry"),
            Self::InvalidChecksumTable => {
                write!(f, "Checksum table is not a 256-entry byte permutation")
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for LinkError {}

impl From<core::net::AddrParseError> for LinkError {
    fn from(_: core::net::AddrParseError) -> Self {
        LinkError::InvalidAddress
    }
}

impl From<core::num::ParseIntError> for LinkError {
    fn from(_: core::num::ParseIntError) -> Self {
        LinkError::InvalidAddress
    }
}

/// Hardware Abstraction Layer (HAL) for datagram transmission.
///
/// This trait abstracts the physical sending and receiving of UDP datagrams,
/// enabling the protocol logic to remain platform-agnostic (no_std). The same
/// trait backs an OS socket on the host and an Ethernet controller socket on
/// a microcontroller.
pub trait DatagramSocket {
    /// Sends one datagram to `peer`. Must not block and must not retry.
    fn send_to(&mut self, data: &[u8], peer: SocketAddrV4) -> Result<(), LinkError>;

    /// Attempts to receive a single datagram into the provided buffer.
    ///
    /// Must return immediately: `Ok(None)` when nothing is pending, otherwise
    /// the number of bytes read and the sender's address. Datagrams larger
    /// than `buffer` are reported with their full length if the platform
    /// allows it, so callers can reject them as wrong-length.
    fn recv_from(&mut self, buffer: &mut [u8]) -> Result<Option<(usize, SocketAddrV4)>, LinkError>;

    /// Returns the local address the socket is bound to, if known.
    fn local_addr(&self) -> Option<SocketAddrV4> {
        None
    }
}

impl<T: DatagramSocket + ?Sized> DatagramSocket for &mut T {
    fn send_to(&mut self, data: &[u8], peer: SocketAddrV4) -> Result<(), LinkError> {
        (**self).send_to(data, peer)
    }

    fn recv_from(&mut self, buffer: &mut [u8]) -> Result<Option<(usize, SocketAddrV4)>, LinkError> {
        (**self).recv_from(buffer)
    }

    fn local_addr(&self) -> Option<SocketAddrV4> {
        (**self).local_addr()
    }
}
