// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! EOF PDU body (directive 0x04) - the transfer closer.
//!
//! ```text
//! +---------------+------------------+-----------------+------------------+
//! | cond<<4       | checksum (4, BE) | file size (4/8) | fault eid (opt)  |
//! +---------------+------------------+-----------------+------------------+
//! ```
//!
//! The fault entity id is appended only when the condition code is not
//! `NoError` and the sender chose to name the faulting entity. Its width is
//! the header's entity id width.

use super::{offset_width, ConditionCode, EntityId, PduError, PduHeader};
use crate::codec::{read_uint_be, write_uint_be};

/// EOF PDU body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EofPdu {
    pub condition: ConditionCode,
    pub checksum: u32,
    pub file_size: u64,
    pub fault_entity: Option<EntityId>,
}

impl EofPdu {
    /// Append the body (after the directive code octet) to `out`.
    pub fn encode_into(&self, header: &PduHeader, out: &mut Vec<u8>) -> Result<(), PduError> {
        out.push((self.condition as u8) << 4);
        out.extend_from_slice(&self.checksum.to_be_bytes());
        write_uint_be(self.file_size, offset_width(header.large_file), out);
        if self.condition != ConditionCode::NoError {
            if let Some(fault) = self.fault_entity {
                write_uint_be(fault, usize::from(header.entity_id_length), out);
            }
        }
        Ok(())
    }

    /// Decode the body following the directive code octet.
    pub fn decode(header: &PduHeader, buf: &[u8]) -> Result<Self, PduError> {
        let fss = offset_width(header.large_file);
        let needed = 1 + 4 + fss;
        if buf.len() < needed {
            return Err(PduError::TruncatedPdu {
                expected: needed,
                actual: buf.len(),
            });
        }

        let condition =
            ConditionCode::from_bits(buf[0] >> 4).ok_or(PduError::InvalidConditionCode(buf[0] >> 4))?;
        let checksum = u32::from_be_bytes([buf[1], buf[2], buf[3], buf[4]]);
        let file_size = read_uint_be(&buf[5..], fss).ok_or(PduError::TruncatedPdu {
            expected: needed,
            actual: buf.len(),
        })?;

        let rest = &buf[5 + fss..];
        let eid_len = usize::from(header.entity_id_length);
        let fault_entity = if condition != ConditionCode::NoError && rest.len() >= eid_len {
            read_uint_be(rest, eid_len)
        } else {
            None
        };

        Ok(Self {
            condition,
            checksum,
            file_size,
            fault_entity,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests_support::{directive_header, round_trip};
    use super::*;
    use crate::pdu::Pdu;

    #[test]
    fn test_eof_round_trip_no_error() {
        let body = EofPdu {
            condition: ConditionCode::NoError,
            checksum: 0x4849_0000,
            file_size: 2,
            fault_entity: None,
        };
        round_trip(&Pdu::Eof(body), &directive_header(false));
    }

    #[test]
    fn test_eof_round_trip_with_fault_entity() {
        let body = EofPdu {
            condition: ConditionCode::CancelRequestReceived,
            checksum: 0,
            file_size: 512,
            fault_entity: Some(7),
        };
        round_trip(&Pdu::Eof(body), &directive_header(false));
    }

    #[test]
    fn test_eof_fault_entity_suppressed_on_no_error() {
        // A fault id supplied alongside NoError is not serialised.
        let header = directive_header(false);
        let body = EofPdu {
            condition: ConditionCode::NoError,
            checksum: 1,
            file_size: 4,
            fault_entity: Some(9),
        };
        let bytes = Pdu::Eof(body).encode(&header).unwrap();
        let (_, decoded) = Pdu::decode(&bytes).unwrap();
        match decoded {
            Pdu::Eof(eof) => assert_eq!(eof.fault_entity, None),
            other => panic!("expected EOF, got {:?}", other),
        }
    }

    #[test]
    fn test_eof_wire_layout() {
        let header = directive_header(false);
        let body = EofPdu {
            condition: ConditionCode::NoError,
            checksum: 0x0102_0300,
            file_size: 3,
            fault_entity: None,
        };
        let bytes = Pdu::Eof(body).encode(&header).unwrap();
        let field = &bytes[header.length()..];

        assert_eq!(field[0], 0x04); // directive code
        assert_eq!(field[1], 0x00); // NoError << 4
        assert_eq!(&field[2..6], &[0x01, 0x02, 0x03, 0x00]);
        assert_eq!(&field[6..10], &[0, 0, 0, 3]);
    }

    #[test]
    fn test_eof_truncated() {
        let header = directive_header(false);
        let body = EofPdu {
            condition: ConditionCode::NoError,
            checksum: 5,
            file_size: 10,
            fault_entity: None,
        };
        let bytes = Pdu::Eof(body).encode(&header).unwrap();
        assert!(Pdu::decode(&bytes[..bytes.len() - 3]).is_err());
    }
}
