// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Send-side transaction state machine.
//!
//! `start` reads the source file, computes its checksum and emits the opener
//! sequence Metadata, FileData..., EOF. A Class 1 transaction completes right
//! there; a Class 2 transaction stays active to service NAK retransmission
//! requests and to close the Finished/ACK handshake. An ACK timer re-emits
//! EOF while the receiver stays silent.

use std::time::{Duration, Instant};

use crate::checksum;
use crate::filestore::Filestore;
use crate::pdu::{
    AckPdu, ChecksumType, ConditionCode, Direction, DirectiveCode, EntityId, EofPdu, FileDataPdu,
    FileStatus, FinishedPdu, MetadataPdu, NakPdu, Pdu, PduHeader, PduType, TransactionStatus,
    TransmissionMode, CFDP_VERSION,
};

use super::{TransactionId, TransactionResult, TransactionState, TxContext};

/// Construction parameters resolved by the entity engine (request, remote
/// override, entity default - in that priority order).
pub(crate) struct SendParams {
    pub id: TransactionId,
    pub destination: EntityId,
    pub mode: TransmissionMode,
    pub checksum_type: ChecksumType,
    pub closure_requested: bool,
    pub segment_length: usize,
    pub entity_id_length: u8,
    pub sequence_number_length: u8,
    pub crc_present: bool,
    pub source_filename: String,
    pub destination_filename: String,
    pub ack_timeout: Duration,
    pub inactivity_timeout: Duration,
    pub max_ack_retries: u32,
    pub max_nak_retries: u32,
}

/// Send-side state machine.
pub(crate) struct SendTransaction {
    id: TransactionId,
    destination: EntityId,
    mode: TransmissionMode,
    checksum_type: ChecksumType,
    closure_requested: bool,
    segment_length: usize,
    entity_id_length: u8,
    sequence_number_length: u8,
    crc_present: bool,
    source_filename: String,
    destination_filename: String,

    /// Cached source bytes, read once at start.
    data: Vec<u8>,
    checksum: u32,
    file_size: u64,
    bytes_sent: u64,
    eof_sent: bool,
    eof_acked: bool,
    finished_seen: bool,

    nak_events: u32,
    max_nak_events: u32,
    ack_retries: u32,
    max_ack_retries: u32,
    ack_timeout: Duration,
    inactivity_timeout: Duration,
    ack_deadline: Option<Instant>,
    last_activity: Instant,

    state: TransactionState,
    result: Option<TransactionResult>,
}

impl SendTransaction {
    pub(crate) fn new(params: SendParams) -> Self {
        Self {
            id: params.id,
            destination: params.destination,
            mode: params.mode,
            checksum_type: params.checksum_type,
            closure_requested: params.closure_requested,
            segment_length: params.segment_length,
            entity_id_length: params.entity_id_length,
            sequence_number_length: params.sequence_number_length,
            crc_present: params.crc_present,
            source_filename: params.source_filename,
            destination_filename: params.destination_filename,
            data: Vec::new(),
            checksum: 0,
            file_size: 0,
            bytes_sent: 0,
            eof_sent: false,
            eof_acked: false,
            finished_seen: false,
            nak_events: 0,
            max_nak_events: params.max_nak_retries,
            ack_retries: 0,
            max_ack_retries: params.max_ack_retries,
            ack_timeout: params.ack_timeout,
            inactivity_timeout: params.inactivity_timeout,
            ack_deadline: None,
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

    /// Read the source file and emit the opener sequence.
    pub(crate) fn start(&mut self, filestore: &dyn Filestore, ctx: &TxContext<'_>) {
        self.state = TransactionState::Active;
        self.last_activity = Instant::now();

        let data = match filestore.read_all(&self.source_filename) {
            Ok(data) => data,
            Err(err) => {
                log::warn!(
                    "[send] {} cannot read '{}': {}",
                    self.id,
                    self.source_filename,
                    err
                );
                self.fail(ConditionCode::FilestoreRejection);
                return;
            }
        };
        self.file_size = data.len() as u64;
        self.checksum = checksum::compute(self.checksum_type, &data);
        self.data = data;

        // Closure is implied by the acknowledged class.
        let metadata = MetadataPdu {
            closure_requested: self.closure_requested
                || self.mode == TransmissionMode::Acknowledged,
            checksum_type: self.checksum_type,
            file_size: self.file_size,
            source_filename: self.source_filename.clone(),
            destination_filename: self.destination_filename.clone(),
        };
        self.emit(Pdu::Metadata(metadata), ctx);

        let mut offset = 0usize;
        while offset < self.data.len() {
            let end = usize::min(offset + self.segment_length, self.data.len());
            self.emit(
                Pdu::FileData(FileDataPdu::new(offset as u64, self.data[offset..end].to_vec())),
                ctx,
            );
            self.bytes_sent += (end - offset) as u64;
            offset = end;
        }

        self.emit_eof(ctx);
        self.eof_sent = true;

        match self.mode {
            TransmissionMode::Unacknowledged => {
                log::debug!("[send] {} class 1 transfer complete", self.id);
                self.complete_success();
            }
            TransmissionMode::Acknowledged => {
                self.ack_deadline = Some(Instant::now() + self.ack_timeout);
            }
        }
    }

    /// Consume an inbound PDU addressed to this transaction.
    pub(crate) fn handle_pdu(&mut self, pdu: &Pdu, ctx: &TxContext<'_>) {
        if self.state.is_terminal() {
            return;
        }
        self.last_activity = Instant::now();
        if self.state == TransactionState::Suspended {
            log::debug!("[send] {} suspended, PDU ignored", self.id);
            return;
        }

        match pdu {
            Pdu::Nak(nak) => self.on_nak(nak, ctx),
            Pdu::Ack(ack) if ack.acked_directive == DirectiveCode::Eof => {
                self.eof_acked = true;
                self.ack_deadline = None;
            }
            Pdu::Finished(finished) => self.on_finished(*finished, ctx),
            other => {
                log::debug!(
                    "[send] {} ignoring inbound {:?} PDU",
                    self.id,
                    other.directive_code()
                );
            }
        }
    }

    fn on_nak(&mut self, nak: &NakPdu, ctx: &TxContext<'_>) {
        ctx.metrics.incr_naks_received();
        self.nak_events += 1;
        if self.nak_events > self.max_nak_events {
            log::warn!("[send] {} NAK limit exceeded", self.id);
            self.fail(ConditionCode::NakLimitReached);
            return;
        }

        for &(start, end) in &nak.segment_requests {
            // Requests straddling the end of file are skipped silently.
            if start >= end || end > self.file_size {
                log::debug!(
                    "[send] {} skipping NAK request [{}, {}) beyond file of {} bytes",
                    self.id,
                    start,
                    end,
                    self.file_size
                );
                continue;
            }
            let range = start as usize..end as usize;
            self.emit(
                Pdu::FileData(FileDataPdu::new(start, self.data[range].to_vec())),
                ctx,
            );
            ctx.metrics.incr_segments_retransmitted();
        }
    }

    fn on_finished(&mut self, finished: FinishedPdu, ctx: &TxContext<'_>) {
        self.finished_seen = true;
        self.emit(
            Pdu::Ack(AckPdu::of_finished(
                finished.condition,
                TransactionStatus::Terminated,
            )),
            ctx,
        );

        self.state = TransactionState::Complete;
        self.result = Some(TransactionResult {
            success: finished.condition == ConditionCode::NoError,
            condition: finished.condition,
            file_status: finished.file_status,
            bytes_transferred: self.file_size,
        });
    }

    /// Timer tick: inactivity watchdog plus EOF re-emission while the
    /// Finished PDU is outstanding.
    pub(crate) fn on_timer(&mut self, now: Instant, ctx: &TxContext<'_>) {
        if self.state != TransactionState::Active {
            return;
        }
        if now.duration_since(self.last_activity) > self.inactivity_timeout {
            log::warn!("[send] {} inactivity limit reached", self.id);
            self.fail(ConditionCode::InactivityDetected);
            return;
        }
        if self.mode != TransmissionMode::Acknowledged
            || !self.eof_sent
            || self.eof_acked
            || self.finished_seen
        {
            return;
        }
        if let Some(deadline) = self.ack_deadline {
            if now >= deadline {
                self.ack_retries += 1;
                if self.ack_retries > self.max_ack_retries {
                    log::warn!("[send] {} positive ACK limit reached", self.id);
                    self.fail(ConditionCode::PositiveAckLimitReached);
                    return;
                }
                log::debug!("[send] {} re-emitting EOF (retry {})", self.id, self.ack_retries);
                self.emit_eof(ctx);
                self.ack_deadline = Some(now + self.ack_timeout);
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
            file_status: FileStatus::Unreported,
            bytes_transferred: self.bytes_sent,
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
            if self.eof_sent && !self.finished_seen && !self.eof_acked {
                self.ack_deadline = Some(Instant::now() + self.ack_timeout);
            }
        }
    }

    fn emit_eof(&self, ctx: &TxContext<'_>) {
        self.emit(
            Pdu::Eof(EofPdu {
                condition: ConditionCode::NoError,
                checksum: self.checksum,
                file_size: self.file_size,
                fault_entity: None,
            }),
            ctx,
        );
    }

    fn emit(&self, pdu: Pdu, ctx: &TxContext<'_>) {
        let header = self.make_header();
        match pdu.encode(&header) {
            Ok(bytes) => {
                ctx.metrics.incr_pdus_sent();
                ctx.sender.send_pdu(&bytes, self.destination);
            }
            Err(err) => log::error!("[send] {} failed to encode PDU: {}", self.id, err),
        }
    }

    fn make_header(&self) -> PduHeader {
        PduHeader {
            version: CFDP_VERSION,
            pdu_type: PduType::FileDirective,
            direction: Direction::TowardReceiver,
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

    fn complete_success(&mut self) {
        self.state = TransactionState::Complete;
        self.result = Some(TransactionResult {
            success: true,
            condition: ConditionCode::NoError,
            file_status: FileStatus::Unreported,
            bytes_transferred: self.file_size,
        });
    }

    fn fail(&mut self, condition: ConditionCode) {
        self.state = TransactionState::Complete;
        self.result = Some(TransactionResult {
            success: false,
            condition,
            file_status: FileStatus::Unreported,
            bytes_transferred: self.bytes_sent,
        });
    }
}
