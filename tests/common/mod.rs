#![allow(dead_code)]

pub mod mock;

use std::cell::RefCell;
use std::rc::Rc;

use microqtt::{Client, ConnectStatus, Event, RequestError, SessionOptions};

use self::mock::{MockState, MockTransport};

/// An owned copy of an [`Event`], recorded for asserting on delivery order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recorded {
    Connect(ConnectStatus),
    Disconnect {
        accepted: bool,
    },
    Publish {
        result: Result<(), RequestError>,
        context: u32,
    },
    Message {
        topic: String,
        payload: Vec<u8>,
        qos: u8,
        retain: bool,
        dup: bool,
    },
    Subscribe {
        result: Result<(), RequestError>,
        context: u32,
    },
    Unsubscribe {
        result: Result<(), RequestError>,
        context: u32,
    },
    KeepAlive,
}

impl From<Event<'_, u32>> for Recorded {
    fn from(event: Event<'_, u32>) -> Self {
        match event {
            Event::Connect(status) => Self::Connect(status),
            Event::Disconnect { accepted } => Self::Disconnect { accepted },
            Event::Publish { result, context } => Self::Publish { result, context },
            Event::Message(message) => Self::Message {
                topic: message.topic.to_owned(),
                payload: message.payload.to_vec(),
                qos: message.qos.into(),
                retain: message.retain,
                dup: message.dup,
            },
            Event::Subscribe { result, context } => Self::Subscribe { result, context },
            Event::Unsubscribe { result, context } => Self::Unsubscribe { result, context },
            Event::KeepAlive => Self::KeepAlive,
        }
    }
}

/// A client wired to a scripted transport, with every emitted event recorded.
pub struct Harness {
    pub client: Client<MockTransport, u32>,
    pub state: Rc<RefCell<MockState>>,
    pub events: Rc<RefCell<Vec<Recorded>>>,
}

impl Harness {
    pub fn new(tx_capacity: usize, rx_capacity: usize) -> Self {
        let _ = env_logger::builder().is_test(true).try_init();

        let (transport, state) = MockTransport::new();
        Self {
            client: Client::new(transport, tx_capacity, rx_capacity),
            state,
            events: Rc::new(RefCell::new(Vec::new())),
        }
    }

    /// A client that already went through the full handshake with the
    /// default options (client id "abc", keep alive 60).
    pub fn connected(tx_capacity: usize, rx_capacity: usize) -> Self {
        let mut harness = Self::new(tx_capacity, rx_capacity);
        harness.establish(SessionOptions::new("abc").keep_alive(60));
        harness
    }

    pub fn connect(&mut self, options: SessionOptions) {
        let events = Rc::clone(&self.events);
        self.client
            .connect("broker.example", 1883, options, move |event| {
                events.borrow_mut().push(Recorded::from(event));
            })
            .unwrap();
    }

    /// Runs the connect/CONNACK exchange to completion.
    pub fn establish(&mut self, options: SessionOptions) {
        self.connect(options);
        self.client.transport_connected();
        self.ack_send();
        self.client.transport_received(&[0x20, 0x02, 0x00, 0x00][..]);
        assert!(self.client.is_connected());
    }

    /// Reports the most recent transport send as completed.
    pub fn ack_send(&mut self) {
        let len = self.last_sent().len();
        self.client.transport_sent(len, true);
    }

    /// Moves the mock clock forward.
    pub fn advance_time(&mut self, ms: u64) {
        self.state.borrow_mut().now += ms;
    }

    pub fn last_sent(&self) -> Vec<u8> {
        self.state.borrow().sent.last().cloned().expect("no sends")
    }

    pub fn sent_count(&self) -> usize {
        self.state.borrow().sent.len()
    }

    pub fn closed(&self) -> usize {
        self.state.borrow().closed
    }

    pub fn events(&self) -> Vec<Recorded> {
        self.events.borrow().clone()
    }

    pub fn take_events(&self) -> Vec<Recorded> {
        std::mem::take(&mut *self.events.borrow_mut())
    }
}
