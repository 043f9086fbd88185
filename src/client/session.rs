use core::fmt;

use crate::client::buffer::{BufferFull, TxBuffer};
use crate::client::event::{ConnectStatus, Event, EventHandler, Message, RequestError};
use crate::client::options::SessionOptions;
use crate::client::requests::{Kind, Registry};
use crate::log;
use crate::protocol::types::{FixedHeader, RemainingLength};
use crate::protocol::v4::{self, ty};
use crate::protocol::{Packet, QoS};
use crate::traits::Writable;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum State {
    Disconnected,
    Connecting,
    Connected,
    Disconnecting,
}

/// Everything a connection's lifetime owns besides the transport itself:
/// the state machine, the transmit ring, the request registry, the byte
/// accounting for QoS 0 completion and the packet identifier generator.
pub(crate) struct Session<A> {
    pub(crate) state: State,
    pub(crate) options: Option<SessionOptions>,
    pub(crate) tx: TxBuffer,
    pub(crate) requests: Registry<A>,
    /// Bytes written into the transmit ring, ever.
    pub(crate) written_total: u64,
    /// Bytes the transport confirmed sent, ever. Never exceeds `written_total`.
    pub(crate) sent_total: u64,
    pub(crate) is_sending: bool,
    pub(crate) poll_ticks: u32,
    packet_id: u16,
}

impl<A> Session<A> {
    pub fn new(tx_capacity: usize) -> Self {
        Self {
            state: State::Disconnected,
            options: None,
            tx: TxBuffer::new(tx_capacity),
            requests: Registry::new(),
            written_total: 0,
            sent_total: 0,
            is_sending: false,
            poll_ticks: 0,
            packet_id: 0,
        }
    }

    /// The next packet identifier; wraps 65535 to 1 and never yields 0.
    pub fn next_packet_id(&mut self) -> u16 {
        self.packet_id = match self.packet_id {
            u16::MAX => 1,
            id => id + 1,
        };
        self.packet_id
    }

    /// Clears all per-connection state after the transport closed.
    pub fn reset(&mut self) {
        self.tx.reset();
        self.requests.clear();
        self.written_total = 0;
        self.sent_total = 0;
        self.is_sending = false;
        self.poll_ticks = 0;
    }

    /// Encodes a packet into the transmit ring.
    ///
    /// The full raw size is checked against the free ring space up front, a
    /// packet never enters the ring partially. Returns the raw packet size.
    pub fn enqueue<P>(&mut self, packet: &P) -> Result<usize, BufferFull>
    where
        P: Packet + Writable + fmt::Debug,
    {
        write_packet(&mut self.tx, &mut self.written_total, packet)
    }

    /// Builds and enqueues the CONNECT packet from the session options.
    pub fn enqueue_connect(&mut self) -> Result<(), BufferFull> {
        let Some(options) = self.options.as_ref() else {
            return Err(BufferFull);
        };

        let packet = v4::Connect {
            client_id: &options.client_id,
            keep_alive: options.keep_alive,
            clean_session: true,
            will: options.will.as_ref().map(|will| v4::connect::Will {
                topic: &will.topic,
                payload: &will.payload,
                qos: will.qos,
                retain: will.retain,
            }),
            username: options.username.as_deref(),
            password: options.password.as_deref(),
        };

        write_packet(&mut self.tx, &mut self.written_total, &packet)?;
        Ok(())
    }

    /// Interprets one reassembled packet and reacts to it.
    pub fn dispatch(&mut self, events: &mut Option<EventHandler<A>>, header: u8, body: &[u8]) {
        match header >> 4 {
            ty::CONNACK => self.on_connack(events, body),
            ty::PUBLISH => self.on_publish(events, header & 0b1111, body),
            ty::PUBACK => match v4::PubAck::parse(body) {
                Ok(ack) => self.on_publish_done(events, ack.packet_id),
                Err(_) => log::warn!("protocol violation: malformed PUBACK"),
            },
            ty::PUBCOMP => match v4::PubComp::parse(body) {
                Ok(ack) => self.on_publish_done(events, ack.packet_id),
                Err(_) => log::warn!("protocol violation: malformed PUBCOMP"),
            },
            ty::PUBREC => match v4::PubRec::parse(body) {
                Ok(ack) => self.acknowledge(&v4::PubRel {
                    packet_id: ack.packet_id,
                }),
                Err(_) => log::warn!("protocol violation: malformed PUBREC"),
            },
            ty::PUBREL => match v4::PubRel::parse(body) {
                Ok(ack) => self.acknowledge(&v4::PubComp {
                    packet_id: ack.packet_id,
                }),
                Err(_) => log::warn!("protocol violation: malformed PUBREL"),
            },
            ty::SUBACK => self.on_suback(events, body),
            ty::UNSUBACK => self.on_unsuback(events, body),
            ty::PINGRESP => emit(events, Event::KeepAlive),
            other => log::trace!("ignoring packet type {}", other),
        }
    }

    fn on_connack(&mut self, events: &mut Option<EventHandler<A>>, body: &[u8]) {
        if self.state != State::Connecting {
            log::warn!("protocol violation: CONNACK outside of connection handshake");
            return;
        }

        let Ok(ack) = v4::ConnAck::parse(body) else {
            log::warn!("protocol violation: malformed CONNACK");
            return;
        };

        let status = ConnectStatus::from(ack.return_code);
        if status == ConnectStatus::Accepted {
            self.state = State::Connected;
            log::debug!("connection accepted by broker");
        } else {
            log::debug!("connection refused with code {}", ack.return_code);
        }

        emit(events, Event::Connect(status));
    }

    fn on_publish(&mut self, events: &mut Option<EventHandler<A>>, flags: u8, body: &[u8]) {
        let message = match v4::Publish::parse(flags, body) {
            Ok(message) => message,
            Err(_) => {
                log::warn!("protocol violation: malformed PUBLISH");
                return;
            }
        };

        log::debug!("<- {:?}", message);

        match (message.qos, message.packet_id) {
            (QoS::AtLeastOnce, Some(packet_id)) => self.acknowledge(&v4::PubAck { packet_id }),
            (QoS::ExactlyOnce, Some(packet_id)) => self.acknowledge(&v4::PubRec { packet_id }),
            _ => {}
        }

        emit(
            events,
            Event::Message(Message {
                topic: message.topic,
                payload: message.payload,
                qos: message.qos,
                retain: message.retain,
                dup: message.dup,
            }),
        );
    }

    fn on_publish_done(&mut self, events: &mut Option<EventHandler<A>>, packet_id: u16) {
        match self.requests.complete(packet_id) {
            Some((_, context)) => emit(
                events,
                Event::Publish {
                    result: Ok(()),
                    context,
                },
            ),
            None => log::warn!(
                "protocol violation: acknowledgement for unknown packet {}",
                packet_id
            ),
        }
    }

    fn on_suback(&mut self, events: &mut Option<EventHandler<A>>, body: &[u8]) {
        let Ok(ack) = v4::SubAck::parse(body) else {
            log::warn!("protocol violation: malformed SUBACK");
            return;
        };

        match self.requests.complete(ack.packet_id) {
            Some((_, context)) => {
                let result = match ack.granted() {
                    true => Ok(()),
                    false => Err(RequestError::Rejected),
                };
                emit(events, Event::Subscribe { result, context });
            }
            None => log::warn!(
                "protocol violation: SUBACK for unknown packet {}",
                ack.packet_id
            ),
        }
    }

    fn on_unsuback(&mut self, events: &mut Option<EventHandler<A>>, body: &[u8]) {
        let Ok(ack) = v4::UnsubAck::parse(body) else {
            log::warn!("protocol violation: malformed UNSUBACK");
            return;
        };

        match self.requests.complete(ack.packet_id) {
            Some((_, context)) => emit(
                events,
                Event::Unsubscribe {
                    result: Ok(()),
                    context,
                },
            ),
            None => log::warn!(
                "protocol violation: UNSUBACK for unknown packet {}",
                ack.packet_id
            ),
        }
    }

    /// Enqueues an acknowledgement, dropping it when the ring has no room.
    fn acknowledge<P>(&mut self, packet: &P)
    where
        P: Packet + Writable + fmt::Debug,
    {
        if self.enqueue(packet).is_err() {
            log::warn!("transmit buffer full, dropping {:?}", packet);
        }
    }
}

fn write_packet<P>(
    tx: &mut TxBuffer,
    written_total: &mut u64,
    packet: &P,
) -> Result<usize, BufferFull>
where
    P: Packet + Writable + fmt::Debug,
{
    let rem_len = packet.size();
    let Ok(length) = RemainingLength::try_from(rem_len) else {
        return Err(BufferFull);
    };

    let total = 1 + length.size() + rem_len;
    if total > tx.free() {
        return Err(BufferFull);
    }

    log::debug!("-> {:?}", packet);

    FixedHeader::new(P::TYPE, packet.flags(), length).write_to(&mut *tx)?;
    packet.write_to(&mut *tx)?;

    *written_total += total as u64;
    Ok(total)
}

pub(crate) fn emit<A>(events: &mut Option<EventHandler<A>>, event: Event<'_, A>) {
    if let Some(handler) = events.as_mut() {
        handler(event);
    }
}

/// The error event matching a retired request's kind.
pub(crate) fn request_failed<A>(kind: Kind, context: A, error: RequestError) -> Event<'static, A> {
    let result = Err(error);
    match kind {
        Kind::Subscribe => Event::Subscribe { result, context },
        Kind::Unsubscribe => Event::Unsubscribe { result, context },
        Kind::Publish => Event::Publish { result, context },
    }
}
