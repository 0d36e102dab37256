// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! NAK PDU body (directive 0x08) - retransmission request.
//!
//! ```text
//! +-----------------+-----------------+----------------------------+
//! | start of scope  | end of scope    | (start, end) request pairs |
//! +-----------------+-----------------+----------------------------+
//! ```
//!
//! Every offset field is 4 or 8 octets per the header's large file flag.
//! Decoding stops when fewer than two offset fields remain, so a trailing
//! odd field is tolerated rather than rejected.

use super::{offset_width, PduError, PduHeader};
use crate::codec::{read_uint_be, write_uint_be};

/// NAK PDU body.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NakPdu {
    pub start_of_scope: u64,
    pub end_of_scope: u64,
    /// Missing byte ranges as half-open `(start, end)` pairs.
    pub segment_requests: Vec<(u64, u64)>,
}

impl NakPdu {
    /// Append the body (after the directive code octet) to `out`.
    pub fn encode_into(&self, header: &PduHeader, out: &mut Vec<u8>) {
        let fss = offset_width(header.large_file);
        write_uint_be(self.start_of_scope, fss, out);
        write_uint_be(self.end_of_scope, fss, out);
        for &(start, end) in &self.segment_requests {
            write_uint_be(start, fss, out);
            write_uint_be(end, fss, out);
        }
    }

    /// Decode the body following the directive code octet.
    pub fn decode(header: &PduHeader, buf: &[u8]) -> Result<Self, PduError> {
        let fss = offset_width(header.large_file);
        if buf.len() < 2 * fss {
            return Err(PduError::TruncatedPdu {
                expected: 2 * fss,
                actual: buf.len(),
            });
        }

        let start_of_scope = read_uint_be(buf, fss).ok_or(PduError::TruncatedHeader)?;
        let end_of_scope = read_uint_be(&buf[fss..], fss).ok_or(PduError::TruncatedHeader)?;

        let mut segment_requests = Vec::new();
        let mut rest = &buf[2 * fss..];
        while rest.len() >= 2 * fss {
            let start = read_uint_be(rest, fss).ok_or(PduError::TruncatedHeader)?;
            let end = read_uint_be(&rest[fss..], fss).ok_or(PduError::TruncatedHeader)?;
            segment_requests.push((start, end));
            rest = &rest[2 * fss..];
        }

        Ok(Self {
            start_of_scope,
            end_of_scope,
            segment_requests,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests_support::{directive_header, round_trip};
    use super::*;
    use crate::pdu::Pdu;

    #[test]
    fn test_nak_round_trip_empty() {
        let body = NakPdu {
            start_of_scope: 0,
            end_of_scope: 1000,
            segment_requests: Vec::new(),
        };
        round_trip(&Pdu::Nak(body), &directive_header(false));
    }

    #[test]
    fn test_nak_round_trip_requests() {
        let body = NakPdu {
            start_of_scope: 0,
            end_of_scope: 1000,
            segment_requests: vec![(400, 800), (900, 1000)],
        };
        round_trip(&Pdu::Nak(body), &directive_header(false));
    }

    #[test]
    fn test_nak_large_file_offsets() {
        let big = u64::from(u32::MAX) + 500;
        let body = NakPdu {
            start_of_scope: 0,
            end_of_scope: big,
            segment_requests: vec![(big - 100, big)],
        };
        round_trip(&Pdu::Nak(body), &directive_header(true));
    }

    #[test]
    fn test_nak_ignores_trailing_odd_field() {
        let header = directive_header(false);
        let body = NakPdu {
            start_of_scope: 0,
            end_of_scope: 100,
            segment_requests: vec![(10, 20)],
        };
        let mut bytes = Pdu::Nak(body).encode(&header).unwrap();

        // Append a lone 4-octet field and patch the header length claim.
        bytes.extend_from_slice(&[0, 0, 0, 30]);
        let new_len = (bytes.len() - header.length()) as u16;
        bytes[1..3].copy_from_slice(&new_len.to_be_bytes());

        let (_, decoded) = Pdu::decode(&bytes).unwrap();
        match decoded {
            Pdu::Nak(nak) => assert_eq!(nak.segment_requests, vec![(10, 20)]),
            other => panic!("expected NAK, got {:?}", other),
        }
    }

    #[test]
    fn test_nak_truncated_scope() {
        let header = directive_header(false);
        let body = NakPdu::default();
        let bytes = Pdu::Nak(body).encode(&header).unwrap();
        assert!(Pdu::decode(&bytes[..bytes.len() - 5]).is_err());
    }
}
