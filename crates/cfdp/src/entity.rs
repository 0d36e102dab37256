// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Entity engine: per-entity transaction registry and PDU routing.
//!
//! One [`Entity`] per CFDP endpoint. Application threads call [`Entity::put`]
//! and the control operations; a transport delivery thread feeds
//! [`Entity::process_pdu`]. A single mutex guards the registry; each
//! transaction sits behind its own mutex so the registry lock is never held
//! across PDU body processing. The sequence counter is a lock-free atomic
//! fetch-add.
//!
//! Recently terminated transaction ids are remembered in a bounded LRU so
//! that late retransmissions and duplicates for finished transfers are
//! dropped silently instead of resurrecting state.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use arc_swap::ArcSwap;
use dashmap::DashMap;
use lru::LruCache;
use parking_lot::{Mutex, RwLock};

use crate::codec::fits_width;
use crate::config::{EntityConfig, RemoteEntityConfig};
use crate::filestore::{Filestore, OsFilestore};
use crate::metrics::{EntityMetrics, MetricsSnapshot};
use crate::pdu::{ConditionCode, Direction, EntityId, FileStatus, Pdu, TransactionStatus};
use crate::transaction::recv::RecvParams;
use crate::transaction::send::SendParams;
use crate::transaction::{
    PduSender, PutRequest, RecvTransaction, SendTransaction, Transaction, TransactionId,
    TransactionResult, TxContext,
};
use crate::{Error, Result};

/// Bounded size of the recently-terminated id table.
const RECENT_TRANSACTION_CAPACITY: usize = 256;

/// Observer for transaction lifecycle notifications.
///
/// Callbacks run on the thread that drove the transition and must not block.
pub trait EntityListener: Send + Sync {
    fn on_transaction_created(&self, _id: TransactionId) {}
    fn on_transaction_completed(&self, _id: TransactionId, _result: TransactionResult) {}
}

/// A CFDP endpoint: registry, sequence counter and routing.
pub struct Entity {
    config: ArcSwap<EntityConfig>,
    remotes: DashMap<EntityId, RemoteEntityConfig>,
    filestore: Arc<dyn Filestore>,
    sender: Arc<dyn PduSender>,
    listener: RwLock<Option<Arc<dyn EntityListener>>>,
    transactions: Mutex<HashMap<TransactionId, Arc<Mutex<Transaction>>>>,
    recent: Mutex<LruCache<TransactionId, TransactionResult>>,
    next_seq: AtomicU64,
    metrics: Arc<EntityMetrics>,
}

impl Entity {
    /// Bind an entity to its MIB and send capability, with an OS filestore
    /// rooted at `config.filestore_root`.
    pub fn new(config: EntityConfig, sender: Arc<dyn PduSender>) -> Self {
        let filestore: Arc<dyn Filestore> = Arc::new(OsFilestore::new(&config.filestore_root));
        Self::with_filestore(config, sender, filestore)
    }

    /// Bind with an explicit filestore implementation.
    pub fn with_filestore(
        config: EntityConfig,
        sender: Arc<dyn PduSender>,
        filestore: Arc<dyn Filestore>,
    ) -> Self {
        let recent_capacity =
            NonZeroUsize::new(RECENT_TRANSACTION_CAPACITY).unwrap_or(NonZeroUsize::MIN);
        Self {
            config: ArcSwap::from_pointee(config),
            remotes: DashMap::new(),
            filestore,
            sender,
            listener: RwLock::new(None),
            transactions: Mutex::new(HashMap::new()),
            recent: Mutex::new(LruCache::new(recent_capacity)),
            next_seq: AtomicU64::new(0),
            metrics: Arc::new(EntityMetrics::new()),
        }
    }

    /// This entity's id.
    #[must_use]
    pub fn entity_id(&self) -> EntityId {
        self.config.load().entity_id
    }

    /// Snapshot of the current MIB.
    #[must_use]
    pub fn config(&self) -> Arc<EntityConfig> {
        self.config.load_full()
    }

    /// Swap in a new MIB; transactions already started keep their resolved
    /// parameters.
    pub fn update_config(&self, config: EntityConfig) {
        self.config.store(Arc::new(config));
    }

    /// Install or replace the per-remote override for `entity_id`.
    pub fn set_remote_config(&self, entity_id: EntityId, remote: RemoteEntityConfig) {
        self.remotes.insert(entity_id, remote);
    }

    /// Drop the per-remote override for `entity_id`.
    pub fn remove_remote_config(&self, entity_id: EntityId) {
        self.remotes.remove(&entity_id);
    }

    /// Register the lifecycle observer (replaces any previous one).
    pub fn set_listener(&self, listener: Arc<dyn EntityListener>) {
        *self.listener.write() = Some(listener);
    }

    /// Protocol counters.
    #[must_use]
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    // ========================================================================
    // User operations
    // ========================================================================

    /// Submit a file for transmission; returns the new transaction id.
    ///
    /// The transaction is started synchronously: for Class 1 the whole
    /// transfer is emitted (and the transaction completed) before this
    /// returns.
    pub fn put(&self, request: PutRequest) -> Result<TransactionId> {
        let config = self.config.load_full();
        if !fits_width(
            request.destination_entity_id,
            usize::from(config.entity_id_length),
        ) {
            return Err(Error::InvalidConfig(format!(
                "destination entity id {} does not fit in {} octets",
                request.destination_entity_id, config.entity_id_length
            )));
        }

        let remote = self
            .remotes
            .get(&request.destination_entity_id)
            .map(|entry| *entry.value())
            .unwrap_or_default();

        // Priority order: explicit request, per-remote override, entity default.
        let mode = request
            .transmission_mode
            .or(remote.transmission_mode)
            .unwrap_or(config.default_transmission_mode);
        let checksum_type = request
            .checksum_type
            .or(remote.checksum_type)
            .unwrap_or(config.default_checksum_type);
        let segment_length = remote
            .max_file_segment_length
            .map_or(config.max_file_segment_length, |remote_max| {
                usize::min(config.max_file_segment_length, remote_max)
            });

        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed) + 1;
        let id = TransactionId::new(config.entity_id, seq);

        let transaction = SendTransaction::new(SendParams {
            id,
            destination: request.destination_entity_id,
            mode,
            checksum_type,
            closure_requested: request.closure_requested,
            segment_length,
            entity_id_length: config.entity_id_length,
            sequence_number_length: config.sequence_number_length,
            crc_present: config.use_crc,
            source_filename: request.source_filename,
            destination_filename: request.destination_filename,
            ack_timeout: config.ack_timeout,
            inactivity_timeout: config.inactivity_timeout,
            max_ack_retries: config.max_ack_retries,
            max_nak_retries: config.max_nak_retries,
        });
        let slot = Arc::new(Mutex::new(Transaction::Send(transaction)));
        self.transactions.lock().insert(id, slot.clone());
        log::debug!("[entity] {} created send transaction {}", config.entity_id, id);
        self.notify_created(id);

        {
            let mut tx = slot.lock();
            if let Transaction::Send(send) = &mut *tx {
                send.start(&*self.filestore, &self.context());
            }
        }
        self.finalize_if_terminal(id, &slot);

        Ok(id)
    }

    /// Cancel the addressed transaction. Returns `false` when unknown.
    pub fn cancel(&self, id: TransactionId) -> bool {
        let Some(slot) = self.lookup(id) else {
            return false;
        };
        slot.lock().cancel();
        self.finalize_if_terminal(id, &slot);
        true
    }

    /// Suspend the addressed transaction. Returns `false` when unknown.
    pub fn suspend(&self, id: TransactionId) -> bool {
        let Some(slot) = self.lookup(id) else {
            return false;
        };
        slot.lock().suspend();
        true
    }

    /// Resume the addressed transaction. Returns `false` when unknown.
    pub fn resume(&self, id: TransactionId) -> bool {
        let Some(slot) = self.lookup(id) else {
            return false;
        };
        slot.lock().resume();
        true
    }

    /// Wire-level status of a transaction id.
    #[must_use]
    pub fn transaction_status(&self, id: TransactionId) -> TransactionStatus {
        if self.transactions.lock().contains_key(&id) {
            return TransactionStatus::Active;
        }
        if self.recent.lock().peek(&id).is_some() {
            return TransactionStatus::Terminated;
        }
        TransactionStatus::Unrecognized
    }

    /// Ids of all live transactions.
    #[must_use]
    pub fn active_transactions(&self) -> Vec<TransactionId> {
        self.transactions.lock().keys().copied().collect()
    }

    // ========================================================================
    // Inbound path
    // ========================================================================

    /// Decode one inbound PDU buffer and route it to its transaction.
    ///
    /// Undecodable buffers are counted and reported but poison nothing; PDUs
    /// for recently terminated transactions are dropped silently.
    pub fn process_pdu(&self, raw: &[u8]) -> Result<()> {
        self.metrics.incr_pdus_received();

        let (header, pdu) = match Pdu::decode(raw) {
            Ok(decoded) => decoded,
            Err(err) => {
                self.metrics.incr_decode_errors();
                log::warn!("[entity] dropping undecodable PDU: {}", err);
                return Err(Error::Pdu(err));
            }
        };
        if header.version != crate::pdu::CFDP_VERSION {
            log::debug!("[entity] peer speaks version {}", header.version);
        }

        let id = TransactionId::new(header.source_entity_id, header.sequence_number);

        if self.recent.lock().peek(&id).is_some() {
            log::debug!("[entity] dropping late PDU for terminated {}", id);
            return Ok(());
        }

        let config = self.config.load_full();
        let mut created = false;
        let slot = {
            let mut transactions = self.transactions.lock();
            match transactions.get(&id) {
                Some(slot) => Some(slot.clone()),
                None => {
                    if header.direction != Direction::TowardReceiver {
                        log::debug!("[entity] dropping PDU for unknown send transaction {}", id);
                        None
                    } else if header.destination_entity_id != config.entity_id {
                        log::warn!(
                            "[entity] dropping misdirected PDU for entity {} (we are {})",
                            header.destination_entity_id,
                            config.entity_id
                        );
                        None
                    } else {
                        let transaction = RecvTransaction::new(RecvParams {
                            id,
                            destination: header.destination_entity_id,
                            mode: header.transmission_mode,
                            default_checksum_type: config.default_checksum_type,
                            // Mirror the sender's widths so reverse traffic can
                            // always carry the ids it chose.
                            entity_id_length: header.entity_id_length,
                            sequence_number_length: header.sequence_number_length,
                            crc_present: config.use_crc,
                            nak_timeout: config.nak_timeout,
                            inactivity_timeout: config.inactivity_timeout,
                            max_nak_retries: config.max_nak_retries,
                        });
                        let slot = Arc::new(Mutex::new(Transaction::Recv(transaction)));
                        transactions.insert(id, slot.clone());
                        created = true;
                        Some(slot)
                    }
                }
            }
        };
        let Some(slot) = slot else {
            return Ok(());
        };

        if created {
            log::debug!("[entity] {} created receive transaction {}", config.entity_id, id);
            self.notify_created(id);
        }

        // Registry lock released; the transaction's own mutex serialises the
        // body processing.
        slot.lock().handle_pdu(pdu, &*self.filestore, &self.context());
        self.finalize_if_terminal(id, &slot);

        Ok(())
    }

    // ========================================================================
    // Timers and teardown
    // ========================================================================

    /// Drive the inactivity/ACK/NAK timers of every live transaction.
    ///
    /// Ticks never reach terminal transactions.
    pub fn check_timers(&self) {
        let now = Instant::now();
        let snapshot: Vec<(TransactionId, Arc<Mutex<Transaction>>)> = self
            .transactions
            .lock()
            .iter()
            .map(|(id, slot)| (*id, slot.clone()))
            .collect();

        for (id, slot) in snapshot {
            {
                let mut tx = slot.lock();
                if tx.state().is_terminal() {
                    continue;
                }
                tx.on_timer(now, &*self.filestore, &self.context());
            }
            self.finalize_if_terminal(id, &slot);
        }
    }

    /// Cancel every live transaction and empty the registry.
    pub fn shutdown(&self) {
        let snapshot: Vec<(TransactionId, Arc<Mutex<Transaction>>)> = self
            .transactions
            .lock()
            .iter()
            .map(|(id, slot)| (*id, slot.clone()))
            .collect();

        for (id, slot) in snapshot {
            slot.lock().cancel();
            self.finalize_if_terminal(id, &slot);
        }
        log::debug!("[entity] {} shut down", self.entity_id());
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn context(&self) -> TxContext<'_> {
        TxContext {
            sender: &*self.sender,
            metrics: &self.metrics,
        }
    }

    fn lookup(&self, id: TransactionId) -> Option<Arc<Mutex<Transaction>>> {
        self.transactions.lock().get(&id).cloned()
    }

    /// Unregister a transaction that reached a terminal state and publish the
    /// completion exactly once.
    fn finalize_if_terminal(&self, id: TransactionId, slot: &Arc<Mutex<Transaction>>) {
        let result = {
            let tx = slot.lock();
            if !tx.state().is_terminal() {
                return;
            }
            tx.result()
        };

        // First finalizer wins; late callers see the id already gone.
        if self.transactions.lock().remove(&id).is_none() {
            return;
        }

        let result = result.unwrap_or(TransactionResult {
            success: false,
            condition: ConditionCode::NoError,
            file_status: FileStatus::Unreported,
            bytes_transferred: 0,
        });
        self.recent.lock().put(id, result);
        self.metrics.record_completion(result.success);
        log::debug!(
            "[entity] {} finished: success={} condition={:?}",
            id,
            result.success,
            result.condition
        );

        let listener = self.listener.read().clone();
        if let Some(listener) = listener {
            listener.on_transaction_completed(id, result);
        }
    }

    fn notify_created(&self, id: TransactionId) {
        let listener = self.listener.read().clone();
        if let Some(listener) = listener {
            listener.on_transaction_created(id);
        }
    }
}
