//! Contracts between the client core and the host's connection layer.

#[cfg(doc)]
use crate::client::Client;

/// A byte transport driven by the host's event loop.
///
/// `start`, `send` and `close` are non-blocking: they only initiate work, and
/// the host reports the outcome later through the matching [`Client`] entry
/// point ([`Client::transport_connected`], [`Client::transport_sent`],
/// [`Client::transport_closed`], ...). The client guarantees at most one
/// [`Transport::send`] is outstanding at any time; the next send is issued
/// only after the host reported completion of the previous one. The trait
/// also carries the host's clock ([`Transport::now`]), the only time source
/// the client consults.
pub trait Transport {
    type Error;

    /// Initiates a TCP connection to the broker.
    ///
    /// The host must follow up with [`Client::transport_connected`] once the
    /// connection is established, or [`Client::transport_error`] if it fails.
    fn start(&mut self, host: &str, port: u16) -> Result<(), Self::Error>;

    /// Hands bytes to the transport for transmission.
    ///
    /// The slice is only valid for the duration of the call; transports that
    /// transmit asynchronously must copy it. Completion is reported through
    /// [`Client::transport_sent`] with the number of bytes confirmed.
    fn send(&mut self, data: &[u8]) -> Result<(), Self::Error>;

    /// Initiates closing the connection.
    ///
    /// The host must follow up with [`Client::transport_closed`].
    fn close(&mut self) -> Result<(), Self::Error>;

    /// The host's monotonic clock, in milliseconds.
    ///
    /// Readings are only ever compared against earlier readings, the origin
    /// is arbitrary. This is the single time source of the client.
    fn now(&mut self) -> u64;
}

/// A received buffer, possibly split over several non-contiguous segments.
///
/// Mirrors the chained receive buffers of modem stacks: the client walks the
/// chain with monotonically increasing offsets and never assumes two segments
/// are adjacent in memory. The buffer is considered consumed when
/// [`Client::transport_received`] returns.
pub trait Segments {
    /// Returns the longest linear run starting at logical `offset`, or `None`
    /// once `offset` reaches the end of the buffer.
    fn linear(&self, offset: usize) -> Option<&[u8]>;
}

impl Segments for [u8] {
    fn linear(&self, offset: usize) -> Option<&[u8]> {
        self.get(offset..).filter(|rest| !rest.is_empty())
    }
}

impl<'a> Segments for [&'a [u8]] {
    fn linear(&self, offset: usize) -> Option<&[u8]> {
        let mut skip = offset;
        for segment in self {
            if skip < segment.len() {
                return Some(&segment[skip..]);
            }
            skip -= segment.len();
        }
        None
    }
}
