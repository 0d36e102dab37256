// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Channel-backed lifecycle observer.
//!
//! The entity publishes lifecycle notifications through the
//! [`EntityListener`](crate::entity::EntityListener) callback trait. For
//! applications that would rather poll or block on a queue, this adapter
//! forwards every notification into a crossbeam channel.

use crossbeam::channel::{unbounded, Receiver, Sender};
use std::sync::Arc;

use crate::entity::EntityListener;
use crate::transaction::{TransactionId, TransactionResult};

/// A lifecycle notification, in emission order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityEvent {
    TransactionCreated(TransactionId),
    TransactionCompleted(TransactionId, TransactionResult),
}

/// Listener that forwards notifications into a channel.
///
/// # Example
///
/// ```no_run
/// use cfdp::events::ChannelListener;
/// # fn wire(entity: &cfdp::entity::Entity) {
/// let (listener, events) = ChannelListener::new();
/// entity.set_listener(listener);
/// while let Ok(event) = events.recv() {
///     println!("{:?}", event);
/// }
/// # }
/// ```
pub struct ChannelListener {
    tx: Sender<EntityEvent>,
}

impl ChannelListener {
    /// Create the listener and the receiving end of its channel.
    #[must_use]
    pub fn new() -> (Arc<Self>, Receiver<EntityEvent>) {
        let (tx, rx) = unbounded();
        (Arc::new(Self { tx }), rx)
    }
}

impl EntityListener for ChannelListener {
    fn on_transaction_created(&self, id: TransactionId) {
        let _ = self.tx.send(EntityEvent::TransactionCreated(id));
    }

    fn on_transaction_completed(&self, id: TransactionId, result: TransactionResult) {
        let _ = self.tx.send(EntityEvent::TransactionCompleted(id, result));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdu::{ConditionCode, FileStatus};

    #[test]
    fn test_events_forwarded_in_order() {
        let (listener, events) = ChannelListener::new();
        let id = TransactionId::new(1, 5);
        let result = TransactionResult {
            success: true,
            condition: ConditionCode::NoError,
            file_status: FileStatus::RetainedSuccessfully,
            bytes_transferred: 42,
        };

        listener.on_transaction_created(id);
        listener.on_transaction_completed(id, result);

        assert_eq!(events.recv().unwrap(), EntityEvent::TransactionCreated(id));
        assert_eq!(
            events.recv().unwrap(),
            EntityEvent::TransactionCompleted(id, result)
        );
    }

    #[test]
    fn test_dropped_receiver_is_harmless() {
        let (listener, events) = ChannelListener::new();
        drop(events);
        listener.on_transaction_created(TransactionId::new(1, 1));
    }
}
