use crate::protocol::QoS;

/// Events delivered to the callback registered with [`Client::connect`].
///
/// Delivery is edge triggered: events fire while the triggering transport
/// event is being processed and borrow received data in place, nothing is
/// stored. `A` is the per-request context handed back when a request
/// completes.
///
/// [`Client::connect`]: crate::client::Client::connect
#[derive(Debug)]
pub enum Event<'a, A> {
    /// The connection handshake finished, successfully or not.
    Connect(ConnectStatus),
    /// The connection was closed. `accepted` is `false` when the session
    /// never got past the handshake.
    Disconnect { accepted: bool },
    /// An outbound publish completed.
    ///
    /// For QoS 0 this fires once the transport confirmed the bytes left the
    /// host, for QoS 1/2 once the broker acknowledged the packet.
    Publish {
        result: Result<(), RequestError>,
        context: A,
    },
    /// A message from the broker arrived on a subscribed topic.
    Message(Message<'a>),
    /// A subscribe request completed.
    Subscribe {
        result: Result<(), RequestError>,
        context: A,
    },
    /// An unsubscribe request completed.
    Unsubscribe {
        result: Result<(), RequestError>,
        context: A,
    },
    /// The broker answered a keep alive ping.
    KeepAlive,
}

/// An inbound PUBLISH, borrowed from the receive path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Message<'a> {
    pub topic: &'a str,
    pub payload: &'a [u8],
    pub qos: QoS,
    pub retain: bool,
    pub dup: bool,
}

/// Broker's verdict on a connection attempt, or [`ConnectStatus::TcpFailed`]
/// when the transport never came up.
///
/// The refusal variants map the CONNACK return codes one to five.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectStatus {
    Accepted,
    RefusedProtocolVersion,
    RefusedIdentifier,
    RefusedServerUnavailable,
    RefusedCredentials,
    RefusedNotAuthorized,
    /// A reserved return code; carried through so the host can see it.
    Refused(u8),
    TcpFailed,
}

impl From<u8> for ConnectStatus {
    fn from(code: u8) -> Self {
        match code {
            0 => Self::Accepted,
            1 => Self::RefusedProtocolVersion,
            2 => Self::RefusedIdentifier,
            3 => Self::RefusedServerUnavailable,
            4 => Self::RefusedCredentials,
            5 => Self::RefusedNotAuthorized,
            code => Self::Refused(code),
        }
    }
}

/// Why a request finished without the expected acknowledgement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestError {
    /// The broker rejected the request.
    Rejected,
    /// The connection closed before the acknowledgement arrived.
    Disconnected,
    /// No acknowledgement arrived within the configured request timeout.
    TimedOut,
}

pub(crate) type EventHandler<A> = Box<dyn FnMut(Event<'_, A>)>;
