use core::fmt;

/// A MQTT client error.
#[derive(Debug, PartialEq, Eq)]
pub enum Error<E> {
    /// The operation requires an established session.
    Disconnected,
    /// A connection attempt is already in progress or established.
    AlreadyConnected,
    /// The transmit buffer cannot hold the encoded packet.
    ///
    /// Nothing was written; the session is unaffected.
    BufferFull,
    /// All request slots are taken.
    ///
    /// No wire traffic was produced; retry after a request completes.
    RequestLimit,
    /// An underlying error occurred on the transport.
    Connection(E),
}

impl<E> From<E> for Error<E> {
    fn from(value: E) -> Self {
        Self::Connection(value)
    }
}

impl<E> fmt::Display for Error<E>
where
    E: fmt::Display,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "The client is not connected!"),
            Self::AlreadyConnected => write!(f, "A connection is already in progress!"),
            Self::BufferFull => {
                write!(f, "The transmit buffer is too full for the packet!")
            }
            Self::RequestLimit => write!(f, "Too many requests are in flight!"),
            Self::Connection(err) => write!(f, "A transport error occured: {err}"),
        }
    }
}

impl<E> core::error::Error for Error<E> where E: core::error::Error {}

/// A MQTT client result.
pub type Result<T, E> = core::result::Result<T, Error<E>>;
