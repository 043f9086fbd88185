use std::time::Duration;

use bitflags::bitflags;

/// Number of in-flight requests a client tracks at once.
pub const MAX_REQUESTS: usize = 8;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    struct Status: u8 {
        const IN_USE = 1 << 0;
        const PENDING = 1 << 1;
        const SUBSCRIBE = 1 << 2;
        const UNSUBSCRIBE = 1 << 3;
        const PUBLISH = 1 << 4;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Kind {
    Subscribe,
    Unsubscribe,
    Publish,
}

impl Kind {
    fn status(self) -> Status {
        match self {
            Self::Subscribe => Status::SUBSCRIBE,
            Self::Unsubscribe => Status::UNSUBSCRIBE,
            Self::Publish => Status::PUBLISH,
        }
    }

    fn from_status(status: Status) -> Option<Self> {
        if status.contains(Status::SUBSCRIBE) {
            Some(Self::Subscribe)
        } else if status.contains(Status::UNSUBSCRIBE) {
            Some(Self::Unsubscribe)
        } else if status.contains(Status::PUBLISH) {
            Some(Self::Publish)
        } else {
            None
        }
    }
}

struct Slot<A> {
    status: Status,
    packet_id: u16,
    /// Clock reading at [`Registry::set_pending`], in host milliseconds.
    pending_since: Option<u64>,
    expected_sent: u64,
    context: Option<A>,
}

impl<A> Slot<A> {
    fn empty() -> Self {
        Self {
            status: Status::empty(),
            packet_id: 0,
            pending_since: None,
            expected_sent: 0,
            context: None,
        }
    }

    fn is_pending(&self) -> bool {
        self.status.contains(Status::IN_USE | Status::PENDING)
    }

    fn clear(&mut self) -> Option<(Kind, A)> {
        let kind = Kind::from_status(self.status);
        let context = self.context.take();
        *self = Self::empty();
        kind.zip(context)
    }
}

/// Fixed capacity registry of requests awaiting completion.
///
/// Slots are allocated first-free and looked up by a linear scan over the
/// packet identifier. QoS 1/2 requests are retired when the matching
/// acknowledgement arrives ([`Registry::complete`]); QoS 0 publishes carry
/// packet id zero and are retired once the transport confirmed enough bytes
/// ([`Registry::take_sent`]).
pub(crate) struct Registry<A> {
    slots: [Slot<A>; MAX_REQUESTS],
}

impl<A> Registry<A> {
    pub fn new() -> Self {
        Self {
            slots: core::array::from_fn(|_| Slot::empty()),
        }
    }

    /// Claims a free slot, or `None` when all slots are taken.
    pub fn create(&mut self, kind: Kind, packet_id: u16, context: A) -> Option<usize> {
        let index = self
            .slots
            .iter()
            .position(|slot| !slot.status.contains(Status::IN_USE))?;

        self.slots[index] = Slot {
            status: Status::IN_USE | kind.status(),
            packet_id,
            pending_since: None,
            expected_sent: 0,
            context: Some(context),
        };

        Some(index)
    }

    pub fn delete(&mut self, index: usize) {
        let _ = self.slots[index].clear();
    }

    /// Marks the request as awaiting completion and stamps the caller's clock.
    pub fn set_pending(&mut self, index: usize, now_ms: u64) {
        let slot = &mut self.slots[index];
        slot.status.insert(Status::PENDING);
        slot.pending_since = Some(now_ms);
    }

    /// Records the cumulative sent-byte count at which a QoS 0 publish is done.
    pub fn set_expected_sent(&mut self, index: usize, expected: u64) {
        self.slots[index].expected_sent = expected;
    }

    /// Retires the pending request with the given nonzero packet identifier.
    pub fn complete(&mut self, packet_id: u16) -> Option<(Kind, A)> {
        if packet_id == 0 {
            return None;
        }
        self.slots
            .iter_mut()
            .find(|slot| slot.is_pending() && slot.packet_id == packet_id)?
            .clear()
    }

    /// Retires the oldest QoS 0 publish whose bytes the transport confirmed.
    pub fn take_sent(&mut self, sent_total: u64) -> Option<A> {
        let index = self
            .slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| {
                slot.is_pending() && slot.packet_id == 0 && slot.expected_sent <= sent_total
            })
            .min_by_key(|(_, slot)| slot.expected_sent)
            .map(|(index, _)| index)?;

        self.slots[index].clear().map(|(_, context)| context)
    }

    /// Retires the first pending request older than `timeout` at `now_ms`.
    pub fn take_expired(&mut self, timeout: Duration, now_ms: u64) -> Option<(Kind, A)> {
        let timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        let index = self.slots.iter().position(|slot| {
            slot.is_pending()
                && slot
                    .pending_since
                    .is_some_and(|since| now_ms.saturating_sub(since) >= timeout_ms)
        })?;

        self.slots[index].clear()
    }

    /// Retires any request, used to fan out errors when the connection closes.
    pub fn take_any(&mut self) -> Option<(Kind, A)> {
        let index = self
            .slots
            .iter()
            .position(|slot| slot.status.contains(Status::IN_USE))?;

        self.slots[index].clear()
    }

    pub fn clear(&mut self) {
        for slot in &mut self.slots {
            let _ = slot.clear();
        }
    }

    #[cfg(test)]
    fn in_use(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| slot.status.contains(Status::IN_USE))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity_is_bounded() {
        let mut registry = Registry::new();

        for i in 0..MAX_REQUESTS {
            assert!(registry.create(Kind::Publish, i as u16 + 1, i).is_some());
        }
        assert!(registry.create(Kind::Publish, 99, 99).is_none());

        assert_eq!(registry.complete(3), Some((Kind::Publish, 2)));
        assert!(registry.create(Kind::Publish, 99, 99).is_some());
    }

    #[test]
    fn test_complete_requires_pending() {
        let mut registry = Registry::new();

        let slot = registry.create(Kind::Subscribe, 7, "sub").unwrap();
        assert_eq!(registry.complete(7), None);

        registry.set_pending(slot, 0);
        assert_eq!(registry.complete(7), Some((Kind::Subscribe, "sub")));
        assert_eq!(registry.complete(7), None);
        assert_eq!(registry.in_use(), 0);
    }

    #[test]
    fn test_packet_id_zero_never_completes_by_id() {
        let mut registry = Registry::new();

        let slot = registry.create(Kind::Publish, 0, ()).unwrap();
        registry.set_pending(slot, 0);
        assert_eq!(registry.complete(0), None);
        assert_eq!(registry.in_use(), 1);
    }

    #[test]
    fn test_take_sent_in_enqueue_order() {
        let mut registry = Registry::new();

        for expected in [10u64, 20, 30] {
            let slot = registry.create(Kind::Publish, 0, expected).unwrap();
            registry.set_expected_sent(slot, expected);
            registry.set_pending(slot, 0);
        }

        assert_eq!(registry.take_sent(5), None);
        assert_eq!(registry.take_sent(25), Some(10));
        assert_eq!(registry.take_sent(25), Some(20));
        assert_eq!(registry.take_sent(25), None);
        assert_eq!(registry.take_sent(30), Some(30));
    }

    #[test]
    fn test_take_expired() {
        let mut registry = Registry::new();

        let slot = registry.create(Kind::Unsubscribe, 4, ()).unwrap();
        registry.set_pending(slot, 1_000);

        assert_eq!(registry.take_expired(Duration::from_secs(30), 30_999), None);
        assert_eq!(
            registry.take_expired(Duration::from_secs(30), 31_000),
            Some((Kind::Unsubscribe, ()))
        );
    }

    #[test]
    fn test_take_any_drains_everything() {
        let mut registry = Registry::new();

        registry.create(Kind::Publish, 1, 1).unwrap();
        registry.create(Kind::Subscribe, 2, 2).unwrap();

        assert_eq!(registry.take_any(), Some((Kind::Publish, 1)));
        assert_eq!(registry.take_any(), Some((Kind::Subscribe, 2)));
        assert_eq!(registry.take_any(), None);
    }
}
