use crate::log;
use crate::transport::Segments;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Init,
    RemainingLength,
    Body,
}

/// Reassembles MQTT packets from a stream of transport receive buffers.
///
/// The decoder consumes one byte at a time and survives packets that arrive
/// partially, split across segments, or coalesced with their neighbors. A body
/// that is fully contained in the current linear segment is dispatched
/// straight out of the segment without copying; everything else is gathered in
/// the scratch buffer first. Bodies larger than the scratch buffer are counted
/// to completion and then dropped, so the decoder stays aligned with the
/// stream.
pub(crate) struct Decoder {
    state: State,
    header: u8,
    remaining: usize,
    multiplier: u32,
    position: usize,
    buf: Box<[u8]>,
}

impl Decoder {
    pub fn new(rx_capacity: usize) -> Self {
        Self {
            state: State::Init,
            header: 0,
            remaining: 0,
            multiplier: 0,
            position: 0,
            buf: vec![0; rx_capacity].into_boxed_slice(),
        }
    }

    pub fn reset(&mut self) {
        self.state = State::Init;
        self.header = 0;
        self.remaining = 0;
        self.multiplier = 0;
        self.position = 0;
    }

    /// Feeds received data into the decoder, invoking `dispatch` with the
    /// fixed header byte and the complete body for every reassembled packet.
    pub fn feed<S, F>(&mut self, data: &S, mut dispatch: F)
    where
        S: Segments + ?Sized,
        F: FnMut(u8, &[u8]),
    {
        let mut offset = 0;
        while let Some(segment) = data.linear(offset) {
            offset += segment.len();

            let mut idx = 0;
            while idx < segment.len() {
                match self.state {
                    State::Init => {
                        self.header = segment[idx];
                        idx += 1;
                        self.remaining = 0;
                        self.multiplier = 0;
                        self.position = 0;
                        self.state = State::RemainingLength;
                    }
                    State::RemainingLength => {
                        let byte = segment[idx];
                        idx += 1;

                        self.remaining |= ((byte & 0x7f) as usize) << (7 * self.multiplier);
                        self.multiplier += 1;

                        if byte & 0x80 != 0 {
                            if self.multiplier == 4 {
                                log::warn!("remaining length exceeds four bytes, resyncing");
                                self.state = State::Init;
                            }
                            continue;
                        }

                        if self.remaining == 0 {
                            dispatch(self.header, &[]);
                            self.state = State::Init;
                        } else if segment.len() - idx >= self.remaining {
                            dispatch(self.header, &segment[idx..idx + self.remaining]);
                            idx += self.remaining;
                            self.state = State::Init;
                        } else {
                            self.state = State::Body;
                        }
                    }
                    State::Body => {
                        let chunk = (self.remaining - self.position).min(segment.len() - idx);
                        if self.position < self.buf.len() {
                            let fits = chunk.min(self.buf.len() - self.position);
                            self.buf[self.position..self.position + fits]
                                .copy_from_slice(&segment[idx..idx + fits]);
                        }
                        self.position += chunk;
                        idx += chunk;

                        if self.position == self.remaining {
                            if self.remaining <= self.buf.len() {
                                dispatch(self.header, &self.buf[..self.remaining]);
                            } else {
                                log::warn!(
                                    "packet of {} bytes exceeds receive buffer of {}, dropped",
                                    self.remaining,
                                    self.buf.len(),
                                );
                            }
                            self.state = State::Init;
                        }
                    }
                }
            }
        }
    }
}
