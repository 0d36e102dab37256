// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Finished PDU body (directive 0x05) - the receiver's end-of-transaction
//! report.
//!
//! Single status octet: `(condition << 4) | (delivery << 2) | file_status`.
//! The delivery bit is set only when the condition code is `NoError`.

use super::{ConditionCode, FileStatus, PduError};

/// Finished PDU body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FinishedPdu {
    pub condition: ConditionCode,
    pub delivery_complete: bool,
    pub file_status: FileStatus,
}

impl FinishedPdu {
    /// Append the body (after the directive code octet) to `out`.
    pub fn encode_into(&self, out: &mut Vec<u8>) {
        let delivery = self.delivery_complete && self.condition == ConditionCode::NoError;
        out.push((self.condition as u8) << 4 | u8::from(delivery) << 2 | (self.file_status as u8));
    }

    /// Decode the body following the directive code octet.
    pub fn decode(buf: &[u8]) -> Result<Self, PduError> {
        let (&status, _) = buf.split_first().ok_or(PduError::TruncatedPdu {
            expected: 1,
            actual: 0,
        })?;
        let condition =
            ConditionCode::from_bits(status >> 4).ok_or(PduError::InvalidConditionCode(status >> 4))?;

        Ok(Self {
            condition,
            delivery_complete: status & 0x04 != 0,
            file_status: FileStatus::from_bits(status),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests_support::{directive_header, round_trip};
    use super::*;
    use crate::pdu::Pdu;

    #[test]
    fn test_finished_round_trip() {
        let body = FinishedPdu {
            condition: ConditionCode::NoError,
            delivery_complete: true,
            file_status: FileStatus::RetainedSuccessfully,
        };
        round_trip(&Pdu::Finished(body), &directive_header(false));
    }

    #[test]
    fn test_finished_status_octet() {
        let header = directive_header(false);
        let body = FinishedPdu {
            condition: ConditionCode::NoError,
            delivery_complete: true,
            file_status: FileStatus::RetainedSuccessfully,
        };
        let bytes = Pdu::Finished(body).encode(&header).unwrap();
        let field = &bytes[header.length()..];
        assert_eq!(field, &[0x05, 0x04 | 0x02]);
    }

    #[test]
    fn test_finished_delivery_bit_cleared_on_fault() {
        let header = directive_header(false);
        let body = FinishedPdu {
            condition: ConditionCode::FileChecksumFailure,
            delivery_complete: true, // inconsistent input, encoder clears it
            file_status: FileStatus::DiscardedDeliberately,
        };
        let bytes = Pdu::Finished(body).encode(&header).unwrap();
        let (_, decoded) = Pdu::decode(&bytes).unwrap();
        match decoded {
            Pdu::Finished(fin) => {
                assert!(!fin.delivery_complete);
                assert_eq!(fin.condition, ConditionCode::FileChecksumFailure);
            }
            other => panic!("expected Finished, got {:?}", other),
        }
    }
}
