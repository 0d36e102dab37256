// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Transaction state machines.
//!
//! One state machine instance per active file transfer: the send machine
//! drives the Metadata/FileData/EOF opener sequence and services Class 2
//! repairs; the receive machine reassembles segments, negotiates
//! retransmission and commits the file. Both share the lifecycle
//! `Initial -> Active -> (Suspended <-> Active)* -> {Complete | Cancelled}`;
//! terminal states are absorbing.

pub mod recv;
pub mod send;

use std::fmt;
use std::time::Instant;

use crate::filestore::Filestore;
use crate::metrics::EntityMetrics;
use crate::pdu::{ChecksumType, ConditionCode, EntityId, FileStatus, Pdu, TransmissionMode};

pub(crate) use recv::RecvTransaction;
pub(crate) use send::SendTransaction;

// ============================================================================
// Identifiers and results
// ============================================================================

/// Globally unique transfer identifier: originating entity plus the sequence
/// number that entity assigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransactionId {
    pub source: EntityId,
    pub seq: u64,
}

impl TransactionId {
    #[must_use]
    pub fn new(source: EntityId, seq: u64) -> Self {
        Self { source, seq }
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.source, self.seq)
    }
}

/// Transaction lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Initial,
    Active,
    Suspended,
    Complete,
    Cancelled,
}

impl TransactionState {
    /// Terminal states are absorbing; the engine drops the registry entry.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, TransactionState::Complete | TransactionState::Cancelled)
    }
}

/// Outcome delivered with the completion notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionResult {
    pub success: bool,
    pub condition: ConditionCode,
    pub file_status: FileStatus,
    pub bytes_transferred: u64,
}

/// User request submitted through `Entity::put`.
#[derive(Debug, Clone)]
pub struct PutRequest {
    pub destination_entity_id: EntityId,
    pub source_filename: String,
    pub destination_filename: String,
    /// Overrides the remote/default transmission mode when set.
    pub transmission_mode: Option<TransmissionMode>,
    /// Overrides the remote/default checksum type when set.
    pub checksum_type: Option<ChecksumType>,
    pub closure_requested: bool,
}

impl PutRequest {
    /// Request with source and destination paths and everything else default.
    #[must_use]
    pub fn new(
        destination_entity_id: EntityId,
        source_filename: impl Into<String>,
        destination_filename: impl Into<String>,
    ) -> Self {
        Self {
            destination_entity_id,
            source_filename: source_filename.into(),
            destination_filename: destination_filename.into(),
            transmission_mode: None,
            checksum_type: None,
            closure_requested: false,
        }
    }
}

// ============================================================================
// Send capability and dispatch context
// ============================================================================

/// Borrowed capability every transaction uses to ship bytes to a peer.
///
/// The transport behind it must treat each invocation as one complete PDU and
/// must not block; PDUs of one transaction are handed over in emission order.
pub trait PduSender: Send + Sync {
    fn send_pdu(&self, pdu: &[u8], destination: EntityId);
}

/// Borrowed context threaded through every state machine tick.
pub(crate) struct TxContext<'a> {
    pub sender: &'a dyn PduSender,
    pub metrics: &'a EntityMetrics,
}

// ============================================================================
// Direction-erased wrapper
// ============================================================================

/// A registered transaction, either direction.
pub(crate) enum Transaction {
    Send(SendTransaction),
    Recv(RecvTransaction),
}

impl Transaction {
    pub(crate) fn state(&self) -> TransactionState {
        match self {
            Transaction::Send(tx) => tx.state(),
            Transaction::Recv(tx) => tx.state(),
        }
    }

    pub(crate) fn result(&self) -> Option<TransactionResult> {
        match self {
            Transaction::Send(tx) => tx.result(),
            Transaction::Recv(tx) => tx.result(),
        }
    }

    pub(crate) fn handle_pdu(&mut self, pdu: Pdu, filestore: &dyn Filestore, ctx: &TxContext<'_>) {
        match self {
            Transaction::Send(tx) => tx.handle_pdu(&pdu, ctx),
            Transaction::Recv(tx) => tx.handle_pdu(pdu, filestore, ctx),
        }
    }

    pub(crate) fn on_timer(&mut self, now: Instant, filestore: &dyn Filestore, ctx: &TxContext<'_>) {
        match self {
            Transaction::Send(tx) => tx.on_timer(now, ctx),
            Transaction::Recv(tx) => tx.on_timer(now, filestore, ctx),
        }
    }

    pub(crate) fn cancel(&mut self) {
        match self {
            Transaction::Send(tx) => tx.cancel(),
            Transaction::Recv(tx) => tx.cancel(),
        }
    }

    pub(crate) fn suspend(&mut self) {
        match self {
            Transaction::Send(tx) => tx.suspend(),
            Transaction::Recv(tx) => tx.suspend(),
        }
    }

    pub(crate) fn resume(&mut self) {
        match self {
            Transaction::Send(tx) => tx.resume(),
            Transaction::Recv(tx) => tx.resume(),
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::filestore::FilestoreError;
    use parking_lot::Mutex;
    use std::collections::HashMap;

    /// Sender that records every emission for inspection.
    #[derive(Default)]
    pub(crate) struct RecordingSender {
        sent: Mutex<Vec<(Vec<u8>, EntityId)>>,
    }

    impl PduSender for RecordingSender {
        fn send_pdu(&self, pdu: &[u8], destination: EntityId) {
            self.sent.lock().push((pdu.to_vec(), destination));
        }
    }

    impl RecordingSender {
        pub(crate) fn decoded(&self) -> Vec<Pdu> {
            self.sent
                .lock()
                .iter()
                .map(|(bytes, _)| Pdu::decode(bytes).expect("valid PDU").1)
                .collect()
        }

        pub(crate) fn destinations(&self) -> Vec<EntityId> {
            self.sent.lock().iter().map(|(_, dest)| *dest).collect()
        }

        pub(crate) fn raw(&self) -> Vec<(Vec<u8>, EntityId)> {
            self.sent.lock().clone()
        }
    }

    /// Writable in-memory filestore for state machine tests.
    #[derive(Default)]
    pub(crate) struct MemoryFilestore {
        files: Mutex<HashMap<String, Vec<u8>>>,
        pub(crate) fail_writes: bool,
    }

    impl MemoryFilestore {
        pub(crate) fn with_file(path: &str, data: Vec<u8>) -> Self {
            let store = Self::default();
            store.files.lock().insert(path.to_string(), data);
            store
        }

        pub(crate) fn rejecting() -> Self {
            Self {
                files: Mutex::new(HashMap::new()),
                fail_writes: true,
            }
        }

        pub(crate) fn contents(&self, path: &str) -> Option<Vec<u8>> {
            self.files.lock().get(path).cloned()
        }
    }

    impl Filestore for MemoryFilestore {
        fn read_all(&self, path: &str) -> Result<Vec<u8>, FilestoreError> {
            self.files
                .lock()
                .get(path)
                .cloned()
                .ok_or_else(|| FilestoreError::NotFound(path.into()))
        }

        fn write_all(&self, path: &str, data: &[u8]) -> Result<(), FilestoreError> {
            if self.fail_writes {
                return Err(FilestoreError::Io {
                    path: path.into(),
                    source: std::io::Error::other("injected failure"),
                });
            }
            self.files.lock().insert(path.to_string(), data.to_vec());
            Ok(())
        }

        fn exists(&self, path: &str) -> bool {
            self.files.lock().contains_key(path)
        }

        fn size_of(&self, path: &str) -> Result<u64, FilestoreError> {
            self.read_all(path).map(|data| data.len() as u64)
        }

        fn create_file(&self, path: &str) -> Result<(), FilestoreError> {
            self.write_all(path, &[])
        }

        fn delete_file(&self, path: &str) -> Result<(), FilestoreError> {
            self.files
                .lock()
                .remove(path)
                .map(|_| ())
                .ok_or_else(|| FilestoreError::NotFound(path.into()))
        }

        fn rename(&self, from: &str, to: &str) -> Result<(), FilestoreError> {
            let mut files = self.files.lock();
            let data = files
                .remove(from)
                .ok_or_else(|| FilestoreError::NotFound(from.into()))?;
            files.insert(to.to_string(), data);
            Ok(())
        }

        fn append(&self, target: &str, source: &str) -> Result<(), FilestoreError> {
            let mut files = self.files.lock();
            let data = files
                .get(source)
                .cloned()
                .ok_or_else(|| FilestoreError::NotFound(source.into()))?;
            files
                .get_mut(target)
                .ok_or_else(|| FilestoreError::NotFound(target.into()))?
                .extend_from_slice(&data);
            Ok(())
        }

        fn replace(&self, target: &str, source: &str) -> Result<(), FilestoreError> {
            let mut files = self.files.lock();
            let data = files
                .get(source)
                .cloned()
                .ok_or_else(|| FilestoreError::NotFound(source.into()))?;
            files.insert(target.to_string(), data);
            Ok(())
        }

        fn create_directory(&self, _: &str) -> Result<(), FilestoreError> {
            Ok(())
        }

        fn remove_directory(&self, _: &str) -> Result<(), FilestoreError> {
            Ok(())
        }
    }
}
