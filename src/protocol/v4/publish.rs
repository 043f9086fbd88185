use core::fmt;

use crate::protocol::types::EncodedStr;
use crate::protocol::v4::ty;
use crate::protocol::{Packet, PacketError, ParseResult, QoS};
use crate::traits::Writable;
use crate::utils::Cursor;

/// A PUBLISH packet, used in both directions.
///
/// The payload is the raw rest of the packet, it carries no length prefix.
pub struct Publish<'a> {
    pub dup: bool,
    pub qos: QoS,
    pub retain: bool,
    pub packet_id: Option<u16>,
    pub topic: &'a str,
    pub payload: &'a [u8],
}

impl fmt::Debug for Publish<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Publish {{ ")?;
        write!(f, "Q{} ", u8::from(self.qos))?;
        write!(f, "D{} ", self.dup as u8)?;
        write!(f, "R{} ", self.retain as u8)?;
        match self.packet_id {
            Some(id) => write!(f, "Id:{id} ")?,
            None => write!(f, "Id:- ")?,
        };
        write!(f, "| {:?}: ", self.topic)?;
        match str::from_utf8(self.payload) {
            Ok(payload) => write!(f, "{payload:?} ")?,
            Err(_) => write!(f, "{:?} ", self.payload)?,
        }
        write!(f, "}}")?;

        Ok(())
    }
}

impl Packet for Publish<'_> {
    const TYPE: u8 = ty::PUBLISH;

    fn flags(&self) -> u8 {
        (self.dup as u8) << 3 | u8::from(self.qos) << 1 | self.retain as u8
    }
}

impl<'a> Publish<'a> {
    /// Parses a PUBLISH packet body.
    ///
    /// `flags` is the low nibble of the fixed header, it decides whether a
    /// packet identifier is present.
    pub fn parse(flags: u8, body: &'a [u8]) -> ParseResult<Self, PacketError> {
        let mut cursor = Cursor::new(body);

        let dup = flags & 0b1000 > 0;
        let qos =
            QoS::try_from((flags >> 1) & 0b11).map_err(|_| PacketError::Malformed)?;
        let retain = flags & 0b0001 > 0;

        let EncodedStr(topic) = cursor.read()?;

        let packet_id = match qos {
            QoS::AtMostOnce => None,
            _ => Some(cursor.read_u16_be()?),
        };

        let payload = cursor.rest();

        Ok(Self {
            dup,
            qos,
            retain,
            packet_id,
            topic,
            payload,
        })
    }
}

impl Writable for Publish<'_> {
    fn size(&self) -> usize {
        EncodedStr(self.topic).size() + self.packet_id.size() + self.payload.len()
    }

    fn write_to<S>(&self, mut sink: S) -> Result<(), S::Error>
    where
        S: embedded_io::Write,
    {
        EncodedStr(self.topic).write_to(&mut sink)?;
        self.packet_id.write_to(&mut sink)?;

        sink.write_all(self.payload)?;

        Ok(())
    }
}
