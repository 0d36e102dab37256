// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! File data PDU body - payload segments at sparse offsets.
//!
//! ```text
//! +--------------------------+-----------------+--------------------+
//! | segment metadata (opt)   | offset (4/8 BE) | file bytes         |
//! +--------------------------+-----------------+--------------------+
//! ```
//!
//! The segment metadata block is present only when the header's segment
//! metadata flag is set: one octet carrying the record continuation state in
//! the top two bits and the metadata length in the low six, followed by that
//! many metadata octets. Record boundaries are round-tripped but otherwise
//! ignored by the state machines.

use super::{offset_width, PduError, PduHeader};
use crate::codec::{read_uint_be, write_uint_be};

/// Maximum octets the 6-bit segment metadata length field can carry.
pub const MAX_SEGMENT_METADATA_LEN: usize = 63;

/// Record continuation state of a file data segment (2-bit field).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordContinuation {
    /// Segment is interior to a record.
    Neither = 0,
    /// Segment starts a record.
    Start = 1,
    /// Segment ends a record.
    End = 2,
    /// Segment is a complete record.
    Both = 3,
}

impl RecordContinuation {
    #[must_use]
    pub fn from_bits(value: u8) -> Self {
        match value & 0x03 {
            0 => RecordContinuation::Neither,
            1 => RecordContinuation::Start,
            2 => RecordContinuation::End,
            _ => RecordContinuation::Both,
        }
    }
}

/// Optional per-segment metadata block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentMetadata {
    pub record_continuation: RecordContinuation,
    pub metadata: Vec<u8>,
}

/// File data PDU body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDataPdu {
    pub segment_metadata: Option<SegmentMetadata>,
    pub offset: u64,
    pub data: Vec<u8>,
}

impl FileDataPdu {
    /// Plain segment without record metadata.
    #[must_use]
    pub fn new(offset: u64, data: Vec<u8>) -> Self {
        Self {
            segment_metadata: None,
            offset,
            data,
        }
    }

    /// Append the data field to `out`.
    pub fn encode_into(&self, header: &PduHeader, out: &mut Vec<u8>) -> Result<(), PduError> {
        if let Some(meta) = &self.segment_metadata {
            if meta.metadata.len() > MAX_SEGMENT_METADATA_LEN {
                return Err(PduError::SegmentMetadataTooLong(meta.metadata.len()));
            }
            out.push((meta.record_continuation as u8) << 6 | meta.metadata.len() as u8);
            out.extend_from_slice(&meta.metadata);
        }
        write_uint_be(self.offset, offset_width(header.large_file), out);
        out.extend_from_slice(&self.data);
        Ok(())
    }

    /// Decode the data field; presence of the metadata block is governed by
    /// the header's segment metadata flag.
    pub fn decode(header: &PduHeader, buf: &[u8]) -> Result<Self, PduError> {
        let mut rest = buf;

        let segment_metadata = if header.segment_metadata {
            let (&lead, after) = rest.split_first().ok_or(PduError::TruncatedPdu {
                expected: 1,
                actual: 0,
            })?;
            let len = usize::from(lead & 0x3F);
            if after.len() < len {
                return Err(PduError::TruncatedPdu {
                    expected: 1 + len,
                    actual: rest.len(),
                });
            }
            let meta = SegmentMetadata {
                record_continuation: RecordContinuation::from_bits(lead >> 6),
                metadata: after[..len].to_vec(),
            };
            rest = &after[len..];
            Some(meta)
        } else {
            None
        };

        let fss = offset_width(header.large_file);
        let offset = read_uint_be(rest, fss).ok_or(PduError::TruncatedPdu {
            expected: fss,
            actual: rest.len(),
        })?;
        let data = rest[fss..].to_vec();

        Ok(Self {
            segment_metadata,
            offset,
            data,
        })
    }
}
