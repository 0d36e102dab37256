// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Metadata PDU body (directive 0x07) - the transfer opener.
//!
//! ```text
//! +---------------+-----------------+----------------+----------------+
//! | status octet  | file size (4/8) | src name (LV)  | dst name (LV)  |
//! +---------------+-----------------+----------------+----------------+
//! ```
//!
//! Status octet: bit 6 carries `closure_requested`, the low 4 bits carry the
//! checksum type. An LV value is one length octet followed by that many ASCII
//! octets.

use super::{offset_width, ChecksumType, PduError, PduHeader};
use crate::codec::{read_uint_be, write_uint_be};

/// Maximum octets an LV-encoded filename can carry.
pub const MAX_FILENAME_LEN: usize = 255;

/// Metadata PDU body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataPdu {
    pub closure_requested: bool,
    pub checksum_type: ChecksumType,
    pub file_size: u64,
    pub source_filename: String,
    pub destination_filename: String,
}

fn write_lv(name: &str, out: &mut Vec<u8>) -> Result<(), PduError> {
    if !name.is_ascii() {
        return Err(PduError::NonAsciiFilename);
    }
    if name.len() > MAX_FILENAME_LEN {
        return Err(PduError::FilenameTooLong(name.len()));
    }
    out.push(name.len() as u8);
    out.extend_from_slice(name.as_bytes());
    Ok(())
}

fn read_lv(buf: &[u8]) -> Result<(String, usize), PduError> {
    let (&len, rest) = buf.split_first().ok_or(PduError::TruncatedPdu {
        expected: 1,
        actual: 0,
    })?;
    let len = usize::from(len);
    if rest.len() < len {
        return Err(PduError::TruncatedPdu {
            expected: len + 1,
            actual: buf.len(),
        });
    }
    let bytes = &rest[..len];
    if !bytes.is_ascii() {
        return Err(PduError::NonAsciiFilename);
    }
    // ASCII is valid UTF-8
    let name = String::from_utf8_lossy(bytes).into_owned();
    Ok((name, len + 1))
}

impl MetadataPdu {
    /// Append the body (after the directive code octet) to `out`.
    pub fn encode_into(&self, header: &PduHeader, out: &mut Vec<u8>) -> Result<(), PduError> {
        let status = u8::from(self.closure_requested) << 6 | (self.checksum_type as u8) & 0x0F;
        out.push(status);
        write_uint_be(self.file_size, offset_width(header.large_file), out);
        write_lv(&self.source_filename, out)?;
        write_lv(&self.destination_filename, out)?;
        Ok(())
    }

    /// Decode the body following the directive code octet.
    pub fn decode(header: &PduHeader, buf: &[u8]) -> Result<Self, PduError> {
        let fss = offset_width(header.large_file);
        let (&status, rest) = buf.split_first().ok_or(PduError::TruncatedPdu {
            expected: 1,
            actual: 0,
        })?;
        let closure_requested = status & 0x40 != 0;
        let checksum_type =
            ChecksumType::from_bits(status).ok_or(PduError::InvalidChecksumType(status & 0x0F))?;

        let file_size = read_uint_be(rest, fss).ok_or(PduError::TruncatedPdu {
            expected: 1 + fss,
            actual: buf.len(),
        })?;
        let rest = &rest[fss..];

        let (source_filename, consumed) = read_lv(rest)?;
        let (destination_filename, _) = read_lv(&rest[consumed..])?;

        Ok(Self {
            closure_requested,
            checksum_type,
            file_size,
            source_filename,
            destination_filename,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests_support::{directive_header, round_trip};
    use super::*;
    use crate::pdu::Pdu;

    #[test]
    fn test_metadata_round_trip() {
        let body = MetadataPdu {
            closure_requested: true,
            checksum_type: ChecksumType::Modular,
            file_size: 1000,
            source_filename: "a.bin".into(),
            destination_filename: "incoming/a.bin".into(),
        };
        round_trip(&Pdu::Metadata(body), &directive_header(false));
    }

    #[test]
    fn test_metadata_status_octet() {
        let body = MetadataPdu {
            closure_requested: true,
            checksum_type: ChecksumType::Null,
            file_size: 2,
            source_filename: "s".into(),
            destination_filename: "d".into(),
        };
        let bytes = Pdu::Metadata(body).encode(&directive_header(false)).unwrap();
        let header = PduHeader::decode(&bytes).unwrap();
        let field = &bytes[header.length()..];

        assert_eq!(field[0], 0x07); // directive code
        assert_eq!(field[1], 0x40 | 0x0F); // closure bit + Null checksum type
        assert_eq!(&field[2..6], &[0, 0, 0, 2]); // 4-octet file size
        assert_eq!(field[6], 1);
        assert_eq!(field[7], b's');
    }

    #[test]
    fn test_metadata_large_file_size_width() {
        let body = MetadataPdu {
            closure_requested: false,
            checksum_type: ChecksumType::Crc32,
            file_size: u64::from(u32::MAX) + 10,
            source_filename: "big".into(),
            destination_filename: "big".into(),
        };
        round_trip(&Pdu::Metadata(body), &directive_header(true));
    }

    #[test]
    fn test_metadata_rejects_non_ascii() {
        let body = MetadataPdu {
            closure_requested: false,
            checksum_type: ChecksumType::Modular,
            file_size: 0,
            source_filename: "fichier-é".into(),
            destination_filename: "d".into(),
        };
        assert_eq!(
            Pdu::Metadata(body).encode(&directive_header(false)),
            Err(PduError::NonAsciiFilename)
        );
    }

    #[test]
    fn test_metadata_truncated_filename() {
        let header = directive_header(false);
        let body = MetadataPdu {
            closure_requested: false,
            checksum_type: ChecksumType::Modular,
            file_size: 4,
            source_filename: "abc".into(),
            destination_filename: "def".into(),
        };
        let mut bytes = Pdu::Metadata(body).encode(&header).unwrap();
        // Chop the destination filename but keep the header length claim.
        bytes.truncate(bytes.len() - 2);
        assert!(Pdu::decode(&bytes).is_err());
    }
}
