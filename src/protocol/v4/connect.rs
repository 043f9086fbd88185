use crate::protocol::types::{BinaryData, EncodedStr};
use crate::protocol::v4::ty;
use crate::protocol::{Packet, PacketError, ParseResult, QoS};
use crate::traits::Writable;
use crate::utils::Cursor;

/// The CONNECT packet opening an MQTT 3.1.1 session.
///
/// The variable header is always ten bytes: protocol name "MQTT", revision
/// level 4, the connect flags and the keep alive interval. The payload carries
/// the client identifier followed by will topic and message, username and
/// password, in this order, each only when present.
#[derive(Debug, Clone, Copy)]
pub struct Connect<'a> {
    pub client_id: &'a str,
    pub keep_alive: u16,
    pub clean_session: bool,
    pub will: Option<Will<'a>>,
    pub username: Option<&'a str>,
    pub password: Option<&'a str>,
}

impl Packet for Connect<'_> {
    const TYPE: u8 = ty::CONNECT;
}

impl Writable for Connect<'_> {
    fn size(&self) -> usize {
        10 + EncodedStr(self.client_id).size()
            + self.will.size()
            + self.username.map(EncodedStr).size()
            + self.password.map(EncodedStr).size()
    }

    fn write_to<S>(&self, mut sink: S) -> Result<(), S::Error>
    where
        S: embedded_io::Write,
    {
        // Protocol Name:
        EncodedStr("MQTT").write_to(&mut sink)?;

        // Protocol Level:
        4u8.write_to(&mut sink)?;

        // Connect Flags:
        let connect_flags = {
            let username = u8::from(self.username.is_some());
            let password = u8::from(self.password.is_some());
            let will_retain = u8::from(self.will.is_some_and(|w| w.retain));
            let will_qos = self.will.map_or(0, |w| u8::from(w.qos));
            let will = u8::from(self.will.is_some());
            let clean_session = u8::from(self.clean_session);

            username << 7
                | password << 6
                | will_retain << 5
                | will_qos << 3
                | will << 2
                | clean_session << 1
        };
        connect_flags.write_to(&mut sink)?;

        // Keep Alive:
        self.keep_alive.write_to(&mut sink)?;

        // Payload:
        EncodedStr(self.client_id).write_to(&mut sink)?;
        self.will.write_to(&mut sink)?;
        self.username.map(EncodedStr).write_to(&mut sink)?;
        self.password.map(EncodedStr).write_to(&mut sink)?;

        Ok(())
    }
}

/// The will message registered with the broker in a [`Connect`] packet.
#[derive(Debug, Clone, Copy)]
pub struct Will<'a> {
    pub topic: &'a str,
    pub payload: &'a [u8],
    pub qos: QoS,
    pub retain: bool,
}

impl Writable for Will<'_> {
    fn size(&self) -> usize {
        EncodedStr(self.topic).size() + BinaryData(self.payload).size()
    }

    fn write_to<S>(&self, mut sink: S) -> Result<(), S::Error>
    where
        S: embedded_io::Write,
    {
        EncodedStr(self.topic).write_to(&mut sink)?;
        BinaryData(self.payload).write_to(&mut sink)?;

        Ok(())
    }
}

/// The broker's answer to a [`Connect`] packet.
///
/// The return code is kept raw: values above five are reserved by the
/// protocol but still have to be surfaced to the host.
#[derive(Debug, PartialEq, Eq)]
pub struct ConnAck {
    pub session_present: bool,
    pub return_code: u8,
}

impl Packet for ConnAck {
    const TYPE: u8 = ty::CONNACK;
}

impl ConnAck {
    pub fn parse(body: &[u8]) -> ParseResult<Self, PacketError> {
        let mut cursor = Cursor::new(body);

        let flags = cursor.read_u8()?;
        let return_code = cursor.read_u8()?;

        Ok(Self {
            session_present: flags & 0x01 != 0,
            return_code,
        })
    }
}
