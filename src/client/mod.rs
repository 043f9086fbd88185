use core::mem;

use crate::log;
use crate::protocol::QoS;
use crate::protocol::v4::{self, TopicFilter};
use crate::transport::{Segments, Transport};

mod buffer;
mod decoder;
mod error;
mod event;
mod options;
mod requests;
mod session;

pub use self::error::{Error, Result};
pub use self::event::{ConnectStatus, Event, Message, RequestError};
pub use self::options::{SessionOptions, Will};
pub use self::requests::MAX_REQUESTS;

use self::decoder::Decoder;
use self::event::EventHandler;
use self::requests::Kind;
use self::session::{Session, State, emit, request_failed};

/// Interval in milliseconds at which the host is expected to call
/// [`Client::transport_poll`]. The keep alive schedule counts these ticks.
pub const POLL_INTERVAL_MS: u32 = 500;

/// An MQTT 3.1.1 client on top of an event-driven transport.
///
/// The client never blocks and never waits: the caller-facing API only
/// enqueues packets into the transmit ring, and all progress is made by the
/// host forwarding its connection events into the `transport_*` entry points.
/// The host must deliver those events serialized, which the `&mut self`
/// receivers enforce.
///
/// `T` is the transport, `A` the per-request context type handed back in
/// completion events.
pub struct Client<T, A = ()> {
    transport: T,
    session: Session<A>,
    decoder: Decoder,
    on_event: Option<EventHandler<A>>,
    context: Option<A>,
}

impl<T, A> Client<T, A> {
    /// Creates a new client with the given buffer capacities.
    ///
    /// `tx_capacity` bounds the outgoing packet queue, `rx_capacity` bounds
    /// the largest incoming packet that has to be reassembled from fragments.
    pub fn new(transport: T, tx_capacity: usize, rx_capacity: usize) -> Self {
        Self {
            transport,
            session: Session::new(tx_capacity),
            decoder: Decoder::new(rx_capacity),
            on_event: None,
            context: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.session.state == State::Connected
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Attaches an opaque client level context, retrievable with
    /// [`Client::context`].
    pub fn set_context(&mut self, context: A) {
        self.context = Some(context);
    }

    pub fn context(&self) -> Option<&A> {
        self.context.as_ref()
    }

    pub fn context_mut(&mut self) -> Option<&mut A> {
        self.context.as_mut()
    }
}

impl<T, A> Client<T, A>
where
    T: Transport,
{
    /// Initiates a connection to the broker.
    ///
    /// Opens the transport and registers the event callback; the MQTT
    /// handshake itself runs once the host reports the transport as
    /// connected. The outcome arrives as an [`Event::Connect`].
    pub fn connect<F>(
        &mut self,
        host: &str,
        port: u16,
        options: SessionOptions,
        on_event: F,
    ) -> Result<(), T::Error>
    where
        F: FnMut(Event<'_, A>) + 'static,
    {
        if self.session.state != State::Disconnected {
            return Err(Error::AlreadyConnected);
        }

        self.session.options = Some(options);
        self.on_event = Some(Box::new(on_event));

        self.transport.start(host, port).map_err(Error::Connection)?;
        self.session.state = State::Connecting;

        Ok(())
    }

    /// Initiates an orderly disconnect.
    ///
    /// On an established session a DISCONNECT packet is enqueued first, best
    /// effort; the transport is closed once the transmit ring drained. The
    /// final [`Event::Disconnect`] arrives through
    /// [`Client::transport_closed`].
    pub fn disconnect(&mut self) -> Result<(), T::Error> {
        if !matches!(self.session.state, State::Connecting | State::Connected) {
            return Err(Error::Disconnected);
        }

        if self.session.state == State::Connected
            && self.session.enqueue(&v4::Disconnect).is_err()
        {
            log::debug!("no room for DISCONNECT, closing without it");
        }
        self.session.state = State::Disconnecting;

        if !self.session.is_sending && self.session.tx.is_empty() {
            self.transport.close().map_err(Error::Connection)?;
        } else {
            self.flush();
        }

        Ok(())
    }

    /// Subscribes to a topic filter.
    ///
    /// `context` is returned in the completion event.
    pub fn subscribe(&mut self, topic: &str, qos: QoS, context: A) -> Result<(), T::Error> {
        if self.session.state != State::Connected {
            return Err(Error::Disconnected);
        }

        let packet_id = self.session.next_packet_id();
        let Some(slot) = self.session.requests.create(Kind::Subscribe, packet_id, context)
        else {
            return Err(Error::RequestLimit);
        };

        let filters = [TopicFilter { name: topic, qos }];
        let packet = v4::Subscribe {
            packet_id,
            filters: &filters,
        };

        if self.session.enqueue(&packet).is_err() {
            self.session.requests.delete(slot);
            return Err(Error::BufferFull);
        }

        self.session.requests.set_pending(slot, self.transport.now());
        self.flush();
        Ok(())
    }

    /// Removes a subscription.
    pub fn unsubscribe(&mut self, topic: &str, context: A) -> Result<(), T::Error> {
        if self.session.state != State::Connected {
            return Err(Error::Disconnected);
        }

        let packet_id = self.session.next_packet_id();
        let Some(slot) = self
            .session
            .requests
            .create(Kind::Unsubscribe, packet_id, context)
        else {
            return Err(Error::RequestLimit);
        };

        let filters = [topic];
        let packet = v4::Unsubscribe {
            packet_id,
            filters: &filters,
        };

        if self.session.enqueue(&packet).is_err() {
            self.session.requests.delete(slot);
            return Err(Error::BufferFull);
        }

        self.session.requests.set_pending(slot, self.transport.now());
        self.flush();
        Ok(())
    }

    /// Publishes a message.
    ///
    /// The completion event fires when the bytes left the host (QoS 0) or
    /// when the broker acknowledged the packet (QoS 1/2).
    pub fn publish(
        &mut self,
        topic: &str,
        payload: &[u8],
        qos: QoS,
        retain: bool,
        context: A,
    ) -> Result<(), T::Error> {
        if self.session.state != State::Connected {
            return Err(Error::Disconnected);
        }

        let packet_id = match qos {
            QoS::AtMostOnce => 0,
            _ => self.session.next_packet_id(),
        };
        let Some(slot) = self.session.requests.create(Kind::Publish, packet_id, context)
        else {
            return Err(Error::RequestLimit);
        };

        let packet = v4::Publish {
            dup: false,
            qos,
            retain,
            packet_id: (packet_id != 0).then_some(packet_id),
            topic,
            payload,
        };

        if self.session.enqueue(&packet).is_err() {
            self.session.requests.delete(slot);
            return Err(Error::BufferFull);
        }

        if qos == QoS::AtMostOnce {
            // Everything written so far, including this packet, must be
            // confirmed sent before the publish counts as delivered.
            self.session
                .requests
                .set_expected_sent(slot, self.session.written_total);
        }

        self.session.requests.set_pending(slot, self.transport.now());
        self.flush();
        Ok(())
    }

    /// Entry point for the host: the transport connection is established.
    pub fn transport_connected(&mut self) {
        self.decoder.reset();
        self.session.poll_ticks = 0;

        match self.session.enqueue_connect() {
            Ok(()) => self.flush(),
            Err(_) => {
                log::warn!("transmit buffer too small for CONNECT, closing");
                self.close_transport();
            }
        }
    }

    /// Entry point for the host: data arrived on the connection.
    ///
    /// The buffer is considered consumed when this returns; events for
    /// messages contained in it fire before that, borrowing the data in
    /// place.
    pub fn transport_received(&mut self, data: &(impl Segments + ?Sized)) {
        let session = &mut self.session;
        let on_event = &mut self.on_event;

        self.decoder.feed(data, |header, body| {
            session.dispatch(on_event, header, body);
        });

        self.flush();
    }

    /// Entry point for the host: an earlier send completed.
    ///
    /// `len` is the number of bytes the transport confirmed. A failed send
    /// tears the connection down.
    pub fn transport_sent(&mut self, len: usize, ok: bool) {
        self.session.is_sending = false;

        if !ok {
            log::warn!("send of {} bytes failed, closing", len);
            self.close_transport();
            return;
        }

        self.session.sent_total += len as u64;
        self.session.tx.advance(len);

        while let Some(context) = self.session.requests.take_sent(self.session.sent_total) {
            emit(
                &mut self.on_event,
                Event::Publish {
                    result: Ok(()),
                    context,
                },
            );
        }

        if self.session.state == State::Disconnecting && self.session.tx.is_empty() {
            self.close_transport();
        } else {
            self.flush();
        }
    }

    /// Entry point for the host: the periodic poll tick, expected every
    /// [`POLL_INTERVAL_MS`].
    ///
    /// Drives the keep alive schedule and, when configured, the request
    /// timeout sweep. Suppressed while disconnecting.
    pub fn transport_poll(&mut self) {
        if self.session.state == State::Disconnecting {
            return;
        }

        self.session.poll_ticks = self.session.poll_ticks.saturating_add(1);

        if let Some(timeout) = self.session.options.as_ref().and_then(|o| o.request_timeout) {
            let now = self.transport.now();
            while let Some((kind, context)) = self.session.requests.take_expired(timeout, now) {
                log::warn!("request timed out without acknowledgement");
                emit(
                    &mut self.on_event,
                    request_failed(kind, context, RequestError::TimedOut),
                );
            }
        }

        if self.session.state != State::Connected {
            return;
        }

        let keep_alive = self.session.options.as_ref().map_or(0, |o| o.keep_alive);
        if keep_alive == 0 {
            return;
        }

        let elapsed_ms = u64::from(self.session.poll_ticks) * u64::from(POLL_INTERVAL_MS);
        if elapsed_ms >= u64::from(keep_alive) * 1000 {
            if self.session.enqueue(&v4::PingReq).is_ok() {
                self.session.poll_ticks = 0;
                self.flush();
            }
        }
    }

    /// Entry point for the host: the connection is closed.
    ///
    /// Emits the final [`Event::Disconnect`], fails every request still in
    /// flight and resets all per-connection state.
    pub fn transport_closed(&mut self) {
        let was = mem::replace(&mut self.session.state, State::Disconnected);

        emit(
            &mut self.on_event,
            Event::Disconnect {
                accepted: matches!(was, State::Connected | State::Disconnecting),
            },
        );

        while let Some((kind, context)) = self.session.requests.take_any() {
            emit(
                &mut self.on_event,
                request_failed(kind, context, RequestError::Disconnected),
            );
        }

        self.session.reset();
        self.decoder.reset();
    }

    /// Entry point for the host: the transport failed to come up.
    pub fn transport_error(&mut self) {
        self.session.state = State::Disconnected;
        emit(&mut self.on_event, Event::Connect(ConnectStatus::TcpFailed));
    }

    /// Hands the largest contiguous block of queued bytes to the transport,
    /// unless a send is already in flight.
    fn flush(&mut self) {
        if self.session.is_sending || self.session.tx.is_empty() {
            return;
        }

        let block = self.session.tx.contiguous();
        match self.transport.send(block) {
            Ok(()) => self.session.is_sending = true,
            Err(_) => {
                log::warn!("handing data to the transport failed, closing");
                self.close_transport();
            }
        }
    }

    fn close_transport(&mut self) {
        if self.transport.close().is_err() {
            log::warn!("closing the transport failed");
        }
    }
}
