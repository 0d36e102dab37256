// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Receive-side transaction state machine.
//!
//! Created by the engine on the first toward-receiver PDU of an unknown
//! transaction id. Accumulates file data segments, and on EOF runs a
//! completion attempt: enumerate gaps, NAK them (Class 2) or fault (Class 1),
//! assemble, verify the checksum, commit the file, and close with a Finished
//! PDU when the class or the closure request demands one. A NAK timer re-runs
//! the completion attempt while repairs are outstanding.
//!
//! The file size cached from Metadata is overwritten by the EOF's value; the
//! two are deliberately not cross-checked.

use std::time::{Duration, Instant};

use crate::checksum;
use crate::filestore::Filestore;
use crate::pdu::{
    ChecksumType, ConditionCode, Direction, EntityId, EofPdu, FileDataPdu, FileStatus,
    FinishedPdu, MetadataPdu, NakPdu, Pdu, PduHeader, PduType, TransmissionMode, CFDP_VERSION,
};
use crate::segment::SegmentMap;

use super::{TransactionId, TransactionResult, TransactionState, TxContext};

/// Construction parameters taken from the creating PDU header and the MIB.
pub(crate) struct RecvParams {
    pub id: TransactionId,
    /// Our own entity id (the header's destination).
    pub destination: EntityId,
    pub mode: TransmissionMode,
    pub default_checksum_type: ChecksumType,
    pub entity_id_length: u8,
    pub sequence_number_length: u8,
    pub crc_present: bool,
    pub nak_timeout: Duration,
    pub inactivity_timeout: Duration,
    pub max_nak_retries: u32,
}

/// Receive-side state machine.
pub(crate) struct RecvTransaction {
    id: TransactionId,
    destination: EntityId,
    mode: TransmissionMode,
    entity_id_length: u8,
    sequence_number_length: u8,
    crc_present: bool,

    metadata_received: bool,
    closure_requested: bool,
    checksum_type: ChecksumType,
    source_filename: Option<String>,
    destination_filename: Option<String>,
    /// Declared size; the EOF value overwrites the Metadata value.
    file_size: u64,
    expected_checksum: Option<u32>,
    segments: SegmentMap,
    eof_received: bool,

    nak_retries: u32,
    max_nak_retries: u32,
    nak_timeout: Duration,
    inactivity_timeout: Duration,
    nak_deadline: Option<Instant>,
    /// Missing byte count at the previous completion attempt; shrinkage
    /// resets the NAK retry counter (forward progress).
    last_missing: Option<u64>,
    last_activity: Instant,

    state: TransactionState,
    result: Option<TransactionResult>,
}

impl RecvTransaction {
    pub(crate) fn new(params: RecvParams) -> Self {
        Self {
            id: params.id,
            destination: params.destination,
            mode: params.mode,
            entity_id_length: params.entity_id_length,
            sequence_number_length: params.sequence_number_length,
            crc_present: params.crc_present,
            metadata_received: false,
            closure_requested: false,
            checksum_type: params.default_checksum_type,
            source_filename: None,
            destination_filename: None,
            file_size: 0,
            expected_checksum: None,
            segments: SegmentMap::new(),
            eof_received: false,
            nak_retries: 0,
            max_nak_retries: params.max_nak_retries,
            nak_timeout: params.nak_timeout,
            inactivity_timeout: params.inactivity_timeout,
            nak_deadline: None,
            last_missing: None,
            last_activity: Instant::now(),
            state: TransactionState::Initial,
            result: None,
        }
    }

    pub(crate) fn state(&self) -> TransactionState {
        self.state
    }

    pub(crate) fn result(&self) -> Option<TransactionResult> {
        self.result
    }

    /// Consume an inbound PDU addressed to this transaction.
    pub(crate) fn handle_pdu(&mut self, pdu: Pdu, filestore: &dyn Filestore, ctx: &TxContext<'_>) {
        if self.state.is_terminal() {
            return;
        }
        if self.state == TransactionState::Initial {
            self.state = TransactionState::Active;
        }
        self.last_activity = Instant::now();
        if self.state == TransactionState::Suspended {
            log::debug!("[recv] {} suspended, PDU ignored", self.id);
            return;
        }

        match pdu {
            Pdu::Metadata(metadata) => self.on_metadata(metadata, filestore, ctx),
            Pdu::FileData(file_data) => self.on_file_data(file_data, filestore, ctx),
            Pdu::Eof(eof) => self.on_eof(eof, filestore, ctx),
            other => {
                // Unknown or unsupported directives never kill the transfer.
                log::debug!(
                    "[recv] {} tolerating inbound {:?} PDU",
                    self.id,
                    other.directive_code()
                );
            }
        }
    }

    fn on_metadata(&mut self, metadata: MetadataPdu, filestore: &dyn Filestore, ctx: &TxContext<'_>) {
        self.closure_requested = metadata.closure_requested;
        self.checksum_type = metadata.checksum_type;
        if !self.eof_received {
            self.file_size = metadata.file_size;
        }
        self.source_filename = Some(metadata.source_filename);
        self.destination_filename = Some(metadata.destination_filename);
        self.metadata_received = true;
        log::debug!(
            "[recv] {} metadata: {} bytes, '{}' -> '{}'",
            self.id,
            self.file_size,
            self.source_filename.as_deref().unwrap_or(""),
            self.destination_filename.as_deref().unwrap_or("")
        );

        // Metadata can arrive after EOF on a reordering link.
        if self.eof_received {
            self.attempt_completion(filestore, ctx);
        }
    }

    fn on_file_data(
        &mut self,
        file_data: FileDataPdu,
        filestore: &dyn Filestore,
        ctx: &TxContext<'_>,
    ) {
        self.segments.insert(file_data.offset, file_data.data);

        // After EOF, retry completion as soon as the gap set drains; the NAK
        // timer covers the case where retransmissions are lost again.
        if self.eof_received && self.segments.gaps(self.file_size).is_empty() {
            self.attempt_completion(filestore, ctx);
        }
    }

    fn on_eof(&mut self, eof: EofPdu, filestore: &dyn Filestore, ctx: &TxContext<'_>) {
        if eof.condition != ConditionCode::NoError {
            // Sender-side fault or cancel: the transfer ends here.
            log::info!(
                "[recv] {} EOF carries condition {:?}, terminating",
                self.id,
                eof.condition
            );
            self.fail(eof.condition, FileStatus::DiscardedDeliberately);
            return;
        }

        self.expected_checksum = Some(eof.checksum);
        self.file_size = eof.file_size;
        self.eof_received = true;
        self.attempt_completion(filestore, ctx);
    }

    /// Gap check, NAK negotiation, assembly, verification, commit.
    fn attempt_completion(&mut self, filestore: &dyn Filestore, ctx: &TxContext<'_>) {
        let gaps = self.segments.gaps(self.file_size);

        if !gaps.is_empty() {
            if self.mode == TransmissionMode::Acknowledged {
                let missing: u64 = gaps.iter().map(|g| g.end - g.start).sum();
                if let Some(previous) = self.last_missing {
                    if missing < previous {
                        // Forward progress: the repair loop is working.
                        self.nak_retries = 0;
                    }
                }
                self.last_missing = Some(missing);

                let nak = NakPdu {
                    start_of_scope: 0,
                    end_of_scope: self.file_size,
                    segment_requests: gaps.iter().map(|g| (g.start, g.end)).collect(),
                };
                log::debug!(
                    "[recv] {} requesting {} missing ranges ({} bytes)",
                    self.id,
                    nak.segment_requests.len(),
                    missing
                );
                self.emit(Pdu::Nak(nak), ctx);
                ctx.metrics.incr_naks_sent();

                self.nak_retries += 1;
                if self.nak_retries > self.max_nak_retries {
                    log::warn!("[recv] {} NAK limit reached", self.id);
                    self.fail(ConditionCode::NakLimitReached, FileStatus::DiscardedDeliberately);
                } else {
                    self.nak_deadline = Some(Instant::now() + self.nak_timeout);
                }
                return;
            }

            // Class 1 has no repair path.
            self.fail(ConditionCode::FileSizeError, FileStatus::DiscardedDeliberately);
            return;
        }

        if !self.metadata_received {
            // All data present but the Metadata PDU is still in flight; the
            // inactivity watchdog bounds how long we wait for it.
            log::debug!("[recv] {} data complete, metadata outstanding", self.id);
            return;
        }

        let assembled = match self.segments.assemble(self.file_size) {
            Ok(assembled) => assembled,
            Err(gap) => {
                log::warn!("[recv] {} assembly failed: {}", self.id, gap);
                self.fail(ConditionCode::FileSizeError, FileStatus::DiscardedDeliberately);
                return;
            }
        };

        if let Some(expected) = self.expected_checksum {
            if !checksum::verify(self.checksum_type, &assembled, expected) {
                log::warn!(
                    "[recv] {} checksum mismatch: expected 0x{:08X}, computed 0x{:08X}",
                    self.id,
                    expected,
                    checksum::compute(self.checksum_type, &assembled)
                );
                self.fail(
                    ConditionCode::FileChecksumFailure,
                    FileStatus::DiscardedDeliberately,
                );
                return;
            }
        }

        let Some(destination) = self.destination_filename.clone() else {
            log::warn!("[recv] {} EOF without metadata, nowhere to commit", self.id);
            self.fail(
                ConditionCode::InvalidFileStructure,
                FileStatus::DiscardedDeliberately,
            );
            return;
        };

        if let Err(err) = filestore.write_all(&destination, &assembled) {
            log::warn!("[recv] {} filestore rejected '{}': {}", self.id, destination, err);
            self.fail(
                ConditionCode::FilestoreRejection,
                FileStatus::DiscardedFilestoreRejection,
            );
            return;
        }

        if self.mode == TransmissionMode::Acknowledged || self.closure_requested {
            self.emit(
                Pdu::Finished(FinishedPdu {
                    condition: ConditionCode::NoError,
                    delivery_complete: true,
                    file_status: FileStatus::RetainedSuccessfully,
                }),
                ctx,
            );
        }

        log::debug!(
            "[recv] {} committed {} bytes to '{}'",
            self.id,
            self.file_size,
            destination
        );
        self.state = TransactionState::Complete;
        self.result = Some(TransactionResult {
            success: true,
            condition: ConditionCode::NoError,
            file_status: FileStatus::RetainedSuccessfully,
            bytes_transferred: self.file_size,
        });
    }

    /// Timer tick: inactivity watchdog plus NAK re-emission after EOF.
    pub(crate) fn on_timer(&mut self, now: Instant, filestore: &dyn Filestore, ctx: &TxContext<'_>) {
        if self.state != TransactionState::Active {
            return;
        }
        if now.duration_since(self.last_activity) > self.inactivity_timeout {
            log::warn!("[recv] {} inactivity limit reached", self.id);
            self.fail(
                ConditionCode::InactivityDetected,
                FileStatus::DiscardedDeliberately,
            );
            return;
        }
        if self.eof_received && self.mode == TransmissionMode::Acknowledged {
            if let Some(deadline) = self.nak_deadline {
                if now >= deadline {
                    self.attempt_completion(filestore, ctx);
                }
            }
        }
    }

    /// Cancel from any non-terminal state.
    pub(crate) fn cancel(&mut self) {
        if self.state.is_terminal() {
            return;
        }
        self.state = TransactionState::Cancelled;
        self.result = Some(TransactionResult {
            success: false,
            condition: ConditionCode::CancelRequestReceived,
            file_status: FileStatus::DiscardedDeliberately,
            bytes_transferred: self.segments.bytes_received(),
        });
    }

    pub(crate) fn suspend(&mut self) {
        if self.state == TransactionState::Active {
            self.state = TransactionState::Suspended;
        }
    }

    pub(crate) fn resume(&mut self) {
        if self.state == TransactionState::Suspended {
            self.state = TransactionState::Active;
            self.last_activity = Instant::now();
            if self.eof_received {
                self.nak_deadline = Some(Instant::now() + self.nak_timeout);
            }
        }
    }

    fn emit(&self, pdu: Pdu, ctx: &TxContext<'_>) {
        let header = self.make_header();
        match pdu.encode(&header) {
            Ok(bytes) => {
                ctx.metrics.incr_pdus_sent();
                // Reverse traffic is addressed to the transaction's source.
                ctx.sender.send_pdu(&bytes, self.id.source);
            }
            Err(err) => log::error!("[recv] {} failed to encode PDU: {}", self.id, err),
        }
    }

    fn make_header(&self) -> PduHeader {
        PduHeader {
            version: CFDP_VERSION,
            pdu_type: PduType::FileDirective,
            direction: Direction::TowardSender,
            transmission_mode: self.mode,
            crc_present: self.crc_present,
            large_file: self.file_size > u64::from(u32::MAX),
            data_field_length: 0,
            segmentation_control: false,
            entity_id_length: self.entity_id_length,
            segment_metadata: false,
            sequence_number_length: self.sequence_number_length,
            source_entity_id: self.id.source,
            sequence_number: self.id.seq,
            destination_entity_id: self.destination,
        }
    }

    fn fail(&mut self, condition: ConditionCode, file_status: FileStatus) {
        self.state = TransactionState::Complete;
        self.result = Some(TransactionResult {
            success: false,
            condition,
            file_status,
            bytes_transferred: self.segments.bytes_received(),
        });
    }
}
