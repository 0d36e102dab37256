// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! File checksum engines.
//!
//! CFDP negotiates the algorithm through the Metadata PDU; the EOF PDU then
//! carries the sender's value for the receiver to verify against the
//! reassembled file. Both sides feed bytes in strictly ascending offset
//! order over a contiguous buffer, never over the raw PDU stream, so
//! duplicates and reordering cannot double-count.

use crc::{Crc, CRC_32_ISCSI, CRC_32_ISO_HDLC};

use crate::pdu::ChecksumType;

/// Reflected CRC-32, polynomial 0xEDB88320, init/xorout 0xFFFFFFFF.
const CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

/// CRC-32C (Castagnoli), as used by iSCSI.
const CRC32C: Crc<u32> = Crc::<u32>::new(&CRC_32_ISCSI);

/// CFDP modular checksum: big-endian 32-bit word sum with wrapping addition.
///
/// A trailing partial word is left-aligned into the high octets (low octets
/// zero) before the final addition.
#[must_use]
pub fn modular(data: &[u8]) -> u32 {
    let mut sum: u32 = 0;
    let mut chunks = data.chunks_exact(4);
    for word in &mut chunks {
        sum = sum.wrapping_add(u32::from_be_bytes([word[0], word[1], word[2], word[3]]));
    }

    let tail = chunks.remainder();
    if !tail.is_empty() {
        let mut word = [0u8; 4];
        word[..tail.len()].copy_from_slice(tail);
        sum = sum.wrapping_add(u32::from_be_bytes(word));
    }

    sum
}

/// Compute the checksum of `data` with the given algorithm.
///
/// [`ChecksumType::Null`] always yields zero.
#[must_use]
pub fn compute(kind: ChecksumType, data: &[u8]) -> u32 {
    match kind {
        ChecksumType::Modular => modular(data),
        ChecksumType::Crc32 => CRC32.checksum(data),
        ChecksumType::Crc32C => CRC32C.checksum(data),
        ChecksumType::Null => 0,
    }
}

/// Verify `data` against `expected`; Null verification always passes.
#[must_use]
pub fn verify(kind: ChecksumType, data: &[u8], expected: u32) -> bool {
    kind == ChecksumType::Null || compute(kind, data) == expected
}
