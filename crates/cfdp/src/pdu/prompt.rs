// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Prompt (0x09) and Keep-Alive (0x0C) PDU bodies.
//!
//! Both are codec-only: they round-trip bit-exactly but drive no state
//! machine behavior in this engine.

use super::{offset_width, PduError, PduHeader};
use crate::codec::{read_uint_be, write_uint_be};

/// Response a Prompt PDU solicits (bit 7 of its status octet).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptResponse {
    Nak = 0,
    KeepAlive = 1,
}

/// Prompt PDU body: a single status octet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromptPdu {
    pub response: PromptResponse,
}

impl PromptPdu {
    /// Append the body (after the directive code octet) to `out`.
    pub fn encode_into(&self, out: &mut Vec<u8>) {
        out.push((self.response as u8) << 7);
    }

    /// Decode the body following the directive code octet.
    pub fn decode(buf: &[u8]) -> Result<Self, PduError> {
        let (&status, _) = buf.split_first().ok_or(PduError::TruncatedPdu {
            expected: 1,
            actual: 0,
        })?;
        let response = if status & 0x80 == 0 {
            PromptResponse::Nak
        } else {
            PromptResponse::KeepAlive
        };
        Ok(Self { response })
    }
}

/// Keep-Alive PDU body: the receiver's progress offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeepAlivePdu {
    pub progress: u64,
}

impl KeepAlivePdu {
    /// Append the body (after the directive code octet) to `out`.
    pub fn encode_into(&self, header: &PduHeader, out: &mut Vec<u8>) {
        write_uint_be(self.progress, offset_width(header.large_file), out);
    }

    /// Decode the body following the directive code octet.
    pub fn decode(header: &PduHeader, buf: &[u8]) -> Result<Self, PduError> {
        let fss = offset_width(header.large_file);
        let progress = read_uint_be(buf, fss).ok_or(PduError::TruncatedPdu {
            expected: fss,
            actual: buf.len(),
        })?;
        Ok(Self { progress })
    }
}
