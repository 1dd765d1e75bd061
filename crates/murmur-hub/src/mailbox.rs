// SPDX-FileCopyrightText: 2026 Murmur Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bounded outbound mailbox feeding a connection's write loop.
//!
//! Producers never wait: a full or closed mailbox is reported back as a
//! [`DeliveryMiss`] and the envelope is dropped.

use strum::Display;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::envelope::Envelope;

/// Why an envelope was not enqueued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum DeliveryMiss {
    /// Every slot is occupied; the peer is not draining fast enough.
    Full,
    /// The connection is shutting down or gone.
    Closed,
}

/// Producer side. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Mailbox {
    tx: mpsc::Sender<Envelope>,
    closed: CancellationToken,
}

/// Consumer side, owned by the write loop.
#[derive(Debug)]
pub struct MailboxReceiver {
    pub(crate) rx: mpsc::Receiver<Envelope>,
    pub(crate) closed: CancellationToken,
}

impl Mailbox {
    /// Create a mailbox with `capacity` slots (at least one).
    pub fn new(capacity: usize) -> (Mailbox, MailboxReceiver) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let closed = CancellationToken::new();
        (
            Mailbox {
                tx,
                closed: closed.clone(),
            },
            MailboxReceiver { rx, closed },
        )
    }

    /// Enqueue without waiting.
    pub fn try_deliver(&self, envelope: Envelope) -> Result<(), DeliveryMiss> {
        if self.closed.is_cancelled() {
            return Err(DeliveryMiss::Closed);
        }
        self.tx.try_send(envelope).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => DeliveryMiss::Full,
            mpsc::error::TrySendError::Closed(_) => DeliveryMiss::Closed,
        })
    }

    /// Signal closure. Idempotent. Returns `true` on the first call.
    pub fn close(&self) -> bool {
        let first = !self.closed.is_cancelled();
        self.closed.cancel();
        first
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled() || self.tx.is_closed()
    }

    /// Resolves once the mailbox is closed.
    pub async fn closed(&self) {
        self.closed.cancelled().await
    }

    /// Free slots right now.
    pub fn remaining(&self) -> usize {
        self.tx.capacity()
    }
}

impl MailboxReceiver {
    /// Take everything queued at this instant without waiting.
    pub(crate) fn drain_ready(&mut self, into: &mut Vec<Envelope>) {
        while let Ok(envelope) = self.rx.try_recv() {
            into.push(envelope);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_mailbox_reports_full() {
        let (mailbox, _rx) = Mailbox::new(1);
        assert_eq!(mailbox.try_deliver(Envelope::invalid_message()), Ok(()));
        assert_eq!(
            mailbox.try_deliver(Envelope::invalid_message()),
            Err(DeliveryMiss::Full)
        );
        assert_eq!(mailbox.remaining(), 0);
    }

    #[test]
    fn closed_mailbox_rejects_and_close_is_idempotent() {
        let (mailbox, _rx) = Mailbox::new(4);
        assert!(mailbox.close());
        assert!(!mailbox.close());
        assert!(mailbox.is_closed());
        assert_eq!(
            mailbox.try_deliver(Envelope::invalid_message()),
            Err(DeliveryMiss::Closed)
        );
    }

    #[test]
    fn dropped_receiver_reads_as_closed() {
        let (mailbox, rx) = Mailbox::new(4);
        drop(rx);
        assert!(mailbox.is_closed());
        assert_eq!(
            mailbox.try_deliver(Envelope::send_failed("x")),
            Err(DeliveryMiss::Closed)
        );
    }

    #[test]
    fn drain_preserves_enqueue_order() {
        let (mailbox, mut rx) = Mailbox::new(8);
        for i in 0..3 {
            mailbox.try_deliver(Envelope::send_failed(format!("{i}"))).unwrap();
        }
        let mut drained = Vec::new();
        rx.drain_ready(&mut drained);
        assert_eq!(
            drained,
            (0..3)
                .map(|i| Envelope::send_failed(format!("{i}")))
                .collect::<Vec<_>>()
        );
    }

    #[test]
    fn miss_display_is_snake_case() {
        assert_eq!(DeliveryMiss::Full.to_string(), "full");
        assert_eq!(DeliveryMiss::Closed.to_string(), "closed");
    }
}
