use std::time::Duration;

use crate::protocol::QoS;

/// Session parameters, immutable for the lifetime of a connection.
///
/// Sessions are always opened with the clean session flag set; resuming
/// broker-side state is not supported.
///
/// # Examples:
///
/// ```
/// # use microqtt::{SessionOptions, Will};
/// let options = SessionOptions::new("sensor-7")
///     .keep_alive(60)
///     .with_username("user")
///     .with_password("secret")
///     .with_will(Will::new("devices/sensor-7/status", b"offline".to_vec()));
/// ```
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub(crate) client_id: String,
    pub(crate) username: Option<String>,
    pub(crate) password: Option<String>,
    pub(crate) will: Option<Will>,
    pub(crate) keep_alive: u16,
    pub(crate) request_timeout: Option<Duration>,
}

impl SessionOptions {
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            username: None,
            password: None,
            will: None,
            keep_alive: 0,
            request_timeout: None,
        }
    }

    /// The keep alive interval in seconds, zero disables keep alive.
    pub fn keep_alive(mut self, seconds: u16) -> Self {
        self.keep_alive = seconds;
        self
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn with_will(mut self, will: Will) -> Self {
        self.will = Some(will);
        self
    }

    /// Arms a timeout for pending requests.
    ///
    /// Requests waiting longer than this for their acknowledgement are
    /// retired with a timeout error during [`Client::transport_poll`].
    /// Disabled by default.
    ///
    /// [`Client::transport_poll`]: crate::client::Client::transport_poll
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }
}

/// The will message the broker publishes if the session dies abnormally.
#[derive(Debug, Clone)]
pub struct Will {
    pub(crate) topic: String,
    pub(crate) payload: Vec<u8>,
    pub(crate) qos: QoS,
    pub(crate) retain: bool,
}

impl Will {
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
            qos: QoS::AtMostOnce,
            retain: false,
        }
    }

    pub fn qos(mut self, qos: QoS) -> Self {
        self.qos = qos;
        self
    }

    pub fn retain(mut self, retain: bool) -> Self {
        self.retain = retain;
        self
    }
}
