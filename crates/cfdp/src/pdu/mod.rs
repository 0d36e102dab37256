// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! CFDP Protocol Data Unit codec (CCSDS 727.0-B-5 wire layout).
//!
//! Layered in two stages: the common [`PduHeader`] is decoded once, then the
//! data field is dispatched to the body decoder selected by the PDU type bit
//! and, for directives, the directive code octet. Each body lives in its own
//! submodule:
//!
//! - [`metadata`] - transfer opener (filenames, size, checksum type)
//! - [`file_data`] - payload segments at sparse offsets
//! - [`eof`] - transfer closer (checksum, final size)
//! - [`finished`] - receiver's end-of-transaction report
//! - [`ack`] - directive acknowledgment
//! - [`nak`] - retransmission request (missing byte ranges)
//! - [`prompt`] - Prompt and Keep-Alive (round-trip only)

pub mod ack;
pub mod eof;
pub mod file_data;
pub mod finished;
pub mod header;
pub mod metadata;
pub mod nak;
pub mod prompt;

pub use ack::AckPdu;
pub use eof::EofPdu;
pub use file_data::{FileDataPdu, RecordContinuation, SegmentMetadata};
pub use finished::FinishedPdu;
pub use header::PduHeader;
pub use metadata::MetadataPdu;
pub use nak::NakPdu;
pub use prompt::{KeepAlivePdu, PromptPdu, PromptResponse};

/// Protocol version emitted in every outbound header.
pub const CFDP_VERSION: u8 = 1;

/// Entity identifier (1-8 octets on the wire, width per MIB).
pub type EntityId = u64;

// ============================================================================
// Header field enums
// ============================================================================

/// PDU type bit of the common header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PduType {
    /// File directive PDU (data field starts with a directive code).
    FileDirective = 0,
    /// File data PDU (data field carries an offset and file bytes).
    FileData = 1,
}

/// Direction bit of the common header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// PDU travels from the file sender to the file receiver.
    TowardReceiver = 0,
    /// PDU travels from the file receiver back to the file sender.
    TowardSender = 1,
}

/// CFDP transmission class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransmissionMode {
    /// Class 2: NAK-driven retransmission with Finished/ACK handshake.
    Acknowledged = 0,
    /// Class 1: best effort, no receiver confirmation.
    Unacknowledged = 1,
}

impl TransmissionMode {
    #[must_use]
    pub fn from_bit(bit: u8) -> Self {
        if bit & 0x01 == 0 {
            TransmissionMode::Acknowledged
        } else {
            TransmissionMode::Unacknowledged
        }
    }
}

/// Checksum algorithm negotiated through the Metadata PDU (4-bit field).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumType {
    /// Big-endian 32-bit word sum with wrapping addition.
    Modular = 0,
    /// Reflected CRC-32, polynomial 0xEDB88320.
    Crc32 = 1,
    /// CRC-32C (Castagnoli).
    Crc32C = 2,
    /// Verification disabled.
    Null = 15,
}

impl ChecksumType {
    #[must_use]
    pub fn from_bits(value: u8) -> Option<Self> {
        match value & 0x0F {
            0 => Some(ChecksumType::Modular),
            1 => Some(ChecksumType::Crc32),
            2 => Some(ChecksumType::Crc32C),
            15 => Some(ChecksumType::Null),
            _ => None,
        }
    }
}

/// Condition code carried by EOF, Finished and ACK PDUs (4-bit field).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionCode {
    NoError = 0,
    PositiveAckLimitReached = 1,
    KeepAliveLimitReached = 2,
    InvalidTransmissionMode = 3,
    FilestoreRejection = 4,
    FileChecksumFailure = 5,
    FileSizeError = 6,
    NakLimitReached = 7,
    InactivityDetected = 8,
    InvalidFileStructure = 9,
    CheckLimitReached = 10,
    UnsupportedChecksumType = 11,
    SuspendRequestReceived = 14,
    CancelRequestReceived = 15,
}

impl ConditionCode {
    #[must_use]
    pub fn from_bits(value: u8) -> Option<Self> {
        match value & 0x0F {
            0 => Some(ConditionCode::NoError),
            1 => Some(ConditionCode::PositiveAckLimitReached),
            2 => Some(ConditionCode::KeepAliveLimitReached),
            3 => Some(ConditionCode::InvalidTransmissionMode),
            4 => Some(ConditionCode::FilestoreRejection),
            5 => Some(ConditionCode::FileChecksumFailure),
            6 => Some(ConditionCode::FileSizeError),
            7 => Some(ConditionCode::NakLimitReached),
            8 => Some(ConditionCode::InactivityDetected),
            9 => Some(ConditionCode::InvalidFileStructure),
            10 => Some(ConditionCode::CheckLimitReached),
            11 => Some(ConditionCode::UnsupportedChecksumType),
            14 => Some(ConditionCode::SuspendRequestReceived),
            15 => Some(ConditionCode::CancelRequestReceived),
            _ => None,
        }
    }
}

/// Delivery outcome reported in the Finished PDU (2-bit field).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStatus {
    DiscardedDeliberately = 0,
    DiscardedFilestoreRejection = 1,
    RetainedSuccessfully = 2,
    Unreported = 3,
}

impl FileStatus {
    #[must_use]
    pub fn from_bits(value: u8) -> Self {
        match value & 0x03 {
            0 => FileStatus::DiscardedDeliberately,
            1 => FileStatus::DiscardedFilestoreRejection,
            2 => FileStatus::RetainedSuccessfully,
            _ => FileStatus::Unreported,
        }
    }
}

/// Transaction status reported in the ACK PDU (2-bit field).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionStatus {
    Undefined = 0,
    Active = 1,
    Terminated = 2,
    Unrecognized = 3,
}

impl TransactionStatus {
    #[must_use]
    pub fn from_bits(value: u8) -> Self {
        match value & 0x03 {
            0 => TransactionStatus::Undefined,
            1 => TransactionStatus::Active,
            2 => TransactionStatus::Terminated,
            _ => TransactionStatus::Unrecognized,
        }
    }
}

/// File directive codes (first octet of a directive PDU's data field).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectiveCode {
    Eof = 0x04,
    Finished = 0x05,
    Ack = 0x06,
    Metadata = 0x07,
    Nak = 0x08,
    Prompt = 0x09,
    KeepAlive = 0x0C,
}

impl DirectiveCode {
    #[must_use]
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x04 => Some(DirectiveCode::Eof),
            0x05 => Some(DirectiveCode::Finished),
            0x06 => Some(DirectiveCode::Ack),
            0x07 => Some(DirectiveCode::Metadata),
            0x08 => Some(DirectiveCode::Nak),
            0x09 => Some(DirectiveCode::Prompt),
            0x0C => Some(DirectiveCode::KeepAlive),
            _ => None,
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

/// PDU codec errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PduError {
    /// Buffer shorter than the fixed 4 octets or the full variable header.
    TruncatedHeader,
    /// Data field shorter than the header's `data_field_length` claims.
    TruncatedPdu { expected: usize, actual: usize },
    /// Directive code not defined by the protocol.
    UnsupportedDirective(u8),
    /// Reserved condition code value on the wire.
    InvalidConditionCode(u8),
    /// Reserved checksum type value in a Metadata PDU.
    InvalidChecksumType(u8),
    /// Serialised data field would exceed the 16-bit length field.
    DataFieldTooLong(usize),
    /// Filename longer than the 255 octets an LV value can carry.
    FilenameTooLong(usize),
    /// Filenames are restricted to ASCII on the wire.
    NonAsciiFilename,
    /// Segment metadata longer than the 63 octets its length field can carry.
    SegmentMetadataTooLong(usize),
}

impl core::fmt::Display for PduError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            PduError::TruncatedHeader => write!(f, "truncated PDU header"),
            PduError::TruncatedPdu { expected, actual } => {
                write!(f, "truncated PDU: need {} octets, have {}", expected, actual)
            }
            PduError::UnsupportedDirective(code) => {
                write!(f, "unsupported directive code 0x{:02X}", code)
            }
            PduError::InvalidConditionCode(value) => {
                write!(f, "reserved condition code {}", value)
            }
            PduError::InvalidChecksumType(value) => {
                write!(f, "reserved checksum type {}", value)
            }
            PduError::DataFieldTooLong(len) => {
                write!(f, "data field of {} octets exceeds 16-bit length", len)
            }
            PduError::FilenameTooLong(len) => {
                write!(f, "filename of {} octets exceeds LV capacity", len)
            }
            PduError::NonAsciiFilename => write!(f, "filename contains non-ASCII octets"),
            PduError::SegmentMetadataTooLong(len) => {
                write!(f, "segment metadata of {} octets exceeds 6-bit length", len)
            }
        }
    }
}

impl std::error::Error for PduError {}

/// Octet width of a file size or offset field under the given large-file flag.
#[must_use]
pub(crate) fn offset_width(large_file: bool) -> usize {
    if large_file {
        8
    } else {
        4
    }
}

// ============================================================================
// PDU sum type
// ============================================================================

/// A decoded PDU body, one variant per wire format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pdu {
    FileData(FileDataPdu),
    Metadata(MetadataPdu),
    Eof(EofPdu),
    Finished(FinishedPdu),
    Ack(AckPdu),
    Nak(NakPdu),
    Prompt(PromptPdu),
    KeepAlive(KeepAlivePdu),
}

impl Pdu {
    /// Directive code of this body, `None` for file data.
    #[must_use]
    pub fn directive_code(&self) -> Option<DirectiveCode> {
        match self {
            Pdu::FileData(_) => None,
            Pdu::Metadata(_) => Some(DirectiveCode::Metadata),
            Pdu::Eof(_) => Some(DirectiveCode::Eof),
            Pdu::Finished(_) => Some(DirectiveCode::Finished),
            Pdu::Ack(_) => Some(DirectiveCode::Ack),
            Pdu::Nak(_) => Some(DirectiveCode::Nak),
            Pdu::Prompt(_) => Some(DirectiveCode::Prompt),
            Pdu::KeepAlive(_) => Some(DirectiveCode::KeepAlive),
        }
    }

    /// Encode header and body into one wire buffer.
    ///
    /// The header's `pdu_type`, `segment_metadata` flag (file data only) and
    /// `data_field_length` are derived from the body before emission; all
    /// other header fields are taken from `header` as given.
    pub fn encode(&self, header: &PduHeader) -> Result<Vec<u8>, PduError> {
        let mut header = *header;
        let mut field = Vec::with_capacity(64);

        if let Pdu::FileData(body) = self {
            header.pdu_type = PduType::FileData;
            header.segment_metadata = body.segment_metadata.is_some();
            body.encode_into(&header, &mut field)?;
        } else {
            header.pdu_type = PduType::FileDirective;
            match self {
                Pdu::FileData(_) => {}
                Pdu::Metadata(body) => {
                    field.push(DirectiveCode::Metadata as u8);
                    body.encode_into(&header, &mut field)?;
                }
                Pdu::Eof(body) => {
                    field.push(DirectiveCode::Eof as u8);
                    body.encode_into(&header, &mut field)?;
                }
                Pdu::Finished(body) => {
                    field.push(DirectiveCode::Finished as u8);
                    body.encode_into(&mut field);
                }
                Pdu::Ack(body) => {
                    field.push(DirectiveCode::Ack as u8);
                    body.encode_into(&mut field);
                }
                Pdu::Nak(body) => {
                    field.push(DirectiveCode::Nak as u8);
                    body.encode_into(&header, &mut field);
                }
                Pdu::Prompt(body) => {
                    field.push(DirectiveCode::Prompt as u8);
                    body.encode_into(&mut field);
                }
                Pdu::KeepAlive(body) => {
                    field.push(DirectiveCode::KeepAlive as u8);
                    body.encode_into(&header, &mut field);
                }
            }
        }

        if field.len() > usize::from(u16::MAX) {
            return Err(PduError::DataFieldTooLong(field.len()));
        }
        header.data_field_length = field.len() as u16;

        let mut out = Vec::with_capacity(header.length() + field.len());
        header.encode_into(&mut out);
        out.extend_from_slice(&field);
        Ok(out)
    }

    /// Decode a wire buffer into its header and body.
    pub fn decode(buf: &[u8]) -> Result<(PduHeader, Pdu), PduError> {
        let header = PduHeader::decode(buf)?;
        let header_len = header.length();
        let field_end = header_len + usize::from(header.data_field_length);
        if buf.len() < field_end {
            return Err(PduError::TruncatedPdu {
                expected: field_end,
                actual: buf.len(),
            });
        }
        let field = &buf[header_len..field_end];

        let body = match header.pdu_type {
            PduType::FileData => Pdu::FileData(FileDataPdu::decode(&header, field)?),
            PduType::FileDirective => {
                let (&code, body) = field.split_first().ok_or(PduError::TruncatedPdu {
                    expected: header_len + 1,
                    actual: buf.len(),
                })?;
                match DirectiveCode::from_u8(code) {
                    Some(DirectiveCode::Metadata) => {
                        Pdu::Metadata(MetadataPdu::decode(&header, body)?)
                    }
                    Some(DirectiveCode::Eof) => Pdu::Eof(EofPdu::decode(&header, body)?),
                    Some(DirectiveCode::Finished) => Pdu::Finished(FinishedPdu::decode(body)?),
                    Some(DirectiveCode::Ack) => Pdu::Ack(AckPdu::decode(body)?),
                    Some(DirectiveCode::Nak) => Pdu::Nak(NakPdu::decode(&header, body)?),
                    Some(DirectiveCode::Prompt) => Pdu::Prompt(PromptPdu::decode(body)?),
                    Some(DirectiveCode::KeepAlive) => {
                        Pdu::KeepAlive(KeepAlivePdu::decode(&header, body)?)
                    }
                    None => return Err(PduError::UnsupportedDirective(code)),
                }
            }
        };

        Ok((header, body))
    }
}

#[cfg(test)]
pub(crate) mod tests_support {
    use super::*;

    /// Header template for directive-body tests.
    pub(crate) fn directive_header(large_file: bool) -> PduHeader {
        PduHeader {
            version: CFDP_VERSION,
            pdu_type: PduType::FileDirective,
            direction: Direction::TowardReceiver,
            transmission_mode: TransmissionMode::Acknowledged,
            crc_present: false,
            large_file,
            data_field_length: 0,
            segmentation_control: false,
            entity_id_length: 2,
            segment_metadata: false,
            sequence_number_length: 3,
            source_entity_id: 7,
            sequence_number: 42,
            destination_entity_id: 12,
        }
    }

    /// Encode, decode, compare, then re-encode and compare the bytes.
    pub(crate) fn round_trip(pdu: &Pdu, header: &PduHeader) {
        let bytes = pdu.encode(header).expect("encode");
        let (decoded_header, decoded) = Pdu::decode(&bytes).expect("decode");
        assert_eq!(&decoded, pdu);
        assert_eq!(
            bytes.len(),
            decoded_header.length() + usize::from(decoded_header.data_field_length)
        );

        let re_encoded = decoded.encode(&decoded_header).expect("re-encode");
        assert_eq!(re_encoded, bytes);
    }
}
