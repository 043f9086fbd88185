pub mod client;
mod log;
pub mod protocol;
pub mod transport;
mod traits;
mod utils;

pub use self::client::{
    Client, ConnectStatus, Error, Event, Message, RequestError, SessionOptions, Will,
};
pub use self::protocol::QoS;
pub use self::transport::{Segments, Transport};
