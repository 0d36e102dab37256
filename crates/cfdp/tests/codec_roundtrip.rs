// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Randomized codec round-trip properties.
//!
//! Every PDU variant, populated with random field values across the full
//! range of header widths, must survive encode -> decode -> encode
//! byte-exactly, and every encoded buffer must satisfy the header length
//! arithmetic.

use cfdp::pdu::{
    AckPdu, ChecksumType, ConditionCode, Direction, EofPdu, FileDataPdu, FinishedPdu,
    KeepAlivePdu, MetadataPdu, NakPdu, Pdu, PduHeader, PduType, PromptPdu, PromptResponse,
    RecordContinuation, SegmentMetadata, TransactionStatus, TransmissionMode,
};

const ROUNDS: usize = 200;

fn mask(width: u8) -> u64 {
    if width >= 8 {
        u64::MAX
    } else {
        (1u64 << (u32::from(width) * 8)) - 1
    }
}

fn random_header(rng: &mut fastrand::Rng) -> PduHeader {
    let entity_id_length = rng.u8(1..=8);
    let sequence_number_length = rng.u8(1..=8);
    PduHeader {
        version: 1,
        pdu_type: PduType::FileDirective,
        direction: if rng.bool() {
            Direction::TowardReceiver
        } else {
            Direction::TowardSender
        },
        transmission_mode: if rng.bool() {
            TransmissionMode::Acknowledged
        } else {
            TransmissionMode::Unacknowledged
        },
        crc_present: rng.bool(),
        large_file: rng.bool(),
        data_field_length: 0,
        segmentation_control: rng.bool(),
        entity_id_length,
        segment_metadata: false,
        sequence_number_length,
        source_entity_id: rng.u64(..) & mask(entity_id_length),
        sequence_number: rng.u64(..) & mask(sequence_number_length),
        destination_entity_id: rng.u64(..) & mask(entity_id_length),
    }
}

fn offset_mask(header: &PduHeader) -> u64 {
    if header.large_file {
        u64::MAX
    } else {
        u64::from(u32::MAX)
    }
}

fn random_condition(rng: &mut fastrand::Rng) -> ConditionCode {
    const CODES: [ConditionCode; 14] = [
        ConditionCode::NoError,
        ConditionCode::PositiveAckLimitReached,
        ConditionCode::KeepAliveLimitReached,
        ConditionCode::InvalidTransmissionMode,
        ConditionCode::FilestoreRejection,
        ConditionCode::FileChecksumFailure,
        ConditionCode::FileSizeError,
        ConditionCode::NakLimitReached,
        ConditionCode::InactivityDetected,
        ConditionCode::InvalidFileStructure,
        ConditionCode::CheckLimitReached,
        ConditionCode::UnsupportedChecksumType,
        ConditionCode::SuspendRequestReceived,
        ConditionCode::CancelRequestReceived,
    ];
    CODES[rng.usize(..CODES.len())]
}

fn random_filename(rng: &mut fastrand::Rng) -> String {
    let len = rng.usize(1..=40);
    (0..len)
        .map(|_| rng.alphanumeric())
        .collect()
}

fn random_pdu(rng: &mut fastrand::Rng, header: &PduHeader) -> Pdu {
    match rng.usize(..8) {
        0 => Pdu::Metadata(MetadataPdu {
            closure_requested: rng.bool(),
            checksum_type: match rng.usize(..4) {
                0 => ChecksumType::Modular,
                1 => ChecksumType::Crc32,
                2 => ChecksumType::Crc32C,
                _ => ChecksumType::Null,
            },
            file_size: rng.u64(..) & offset_mask(header),
            source_filename: random_filename(rng),
            destination_filename: random_filename(rng),
        }),
        1 => {
            let condition = random_condition(rng);
            let fault_entity = if condition != ConditionCode::NoError && rng.bool() {
                Some(rng.u64(..) & mask(header.entity_id_length))
            } else {
                None
            };
            Pdu::Eof(EofPdu {
                condition,
                checksum: rng.u32(..),
                file_size: rng.u64(..) & offset_mask(header),
                fault_entity,
            })
        }
        2 => {
            let condition = random_condition(rng);
            Pdu::Finished(FinishedPdu {
                condition,
                // The encoder clears the bit on faults; keep the input lawful
                // so the round-trip comparison holds.
                delivery_complete: condition == ConditionCode::NoError && rng.bool(),
                file_status: match rng.usize(..4) {
                    0 => cfdp::FileStatus::DiscardedDeliberately,
                    1 => cfdp::FileStatus::DiscardedFilestoreRejection,
                    2 => cfdp::FileStatus::RetainedSuccessfully,
                    _ => cfdp::FileStatus::Unreported,
                },
            })
        }
        3 => Pdu::Ack(AckPdu {
            acked_directive: if rng.bool() {
                cfdp::pdu::DirectiveCode::Eof
            } else {
                cfdp::pdu::DirectiveCode::Finished
            },
            subtype: rng.u8(..=0x0F),
            condition: random_condition(rng),
            transaction_status: match rng.usize(..4) {
                0 => TransactionStatus::Undefined,
                1 => TransactionStatus::Active,
                2 => TransactionStatus::Terminated,
                _ => TransactionStatus::Unrecognized,
            },
        }),
        4 => {
            let requests = (0..rng.usize(..5))
                .map(|_| {
                    let start = rng.u64(..) & offset_mask(header);
                    let end = rng.u64(..) & offset_mask(header);
                    (start, end)
                })
                .collect();
            Pdu::Nak(NakPdu {
                start_of_scope: rng.u64(..) & offset_mask(header),
                end_of_scope: rng.u64(..) & offset_mask(header),
                segment_requests: requests,
            })
        }
        5 => {
            let segment_metadata = if rng.bool() {
                let len = rng.usize(..=63);
                Some(SegmentMetadata {
                    record_continuation: match rng.usize(..4) {
                        0 => RecordContinuation::Neither,
                        1 => RecordContinuation::Start,
                        2 => RecordContinuation::End,
                        _ => RecordContinuation::Both,
                    },
                    metadata: (0..len).map(|_| rng.u8(..)).collect(),
                })
            } else {
                None
            };
            let data_len = rng.usize(..=512);
            Pdu::FileData(FileDataPdu {
                segment_metadata,
                offset: rng.u64(..) & offset_mask(header),
                data: (0..data_len).map(|_| rng.u8(..)).collect(),
            })
        }
        6 => Pdu::Prompt(PromptPdu {
            response: if rng.bool() {
                PromptResponse::Nak
            } else {
                PromptResponse::KeepAlive
            },
        }),
        _ => Pdu::KeepAlive(KeepAlivePdu {
            progress: rng.u64(..) & offset_mask(header),
        }),
    }
}

#[test]
fn every_variant_round_trips_across_random_widths() {
    let mut rng = fastrand::Rng::with_seed(0x5EED_CAFE);

    for round in 0..ROUNDS {
        let header = random_header(&mut rng);
        let pdu = random_pdu(&mut rng, &header);

        let bytes = pdu
            .encode(&header)
            .unwrap_or_else(|err| panic!("round {}: encode failed: {}", round, err));
        let (decoded_header, decoded) = Pdu::decode(&bytes)
            .unwrap_or_else(|err| panic!("round {}: decode failed: {}", round, err));

        assert_eq!(decoded, pdu, "round {}: body mismatch", round);
        assert_eq!(
            decoded_header.source_entity_id, header.source_entity_id,
            "round {}",
            round
        );
        assert_eq!(
            decoded_header.sequence_number, header.sequence_number,
            "round {}",
            round
        );

        // Header arithmetic: total length = header + data field.
        assert_eq!(
            bytes.len(),
            decoded_header.length() + usize::from(decoded_header.data_field_length),
            "round {}",
            round
        );

        // Byte-exact re-encode.
        let re_encoded = decoded
            .encode(&decoded_header)
            .unwrap_or_else(|err| panic!("round {}: re-encode failed: {}", round, err));
        assert_eq!(re_encoded, bytes, "round {}: re-encode mismatch", round);
    }
}

#[test]
fn truncation_at_every_boundary_is_an_error_not_a_panic() {
    let mut rng = fastrand::Rng::with_seed(0xDECA_FBAD);
    let header = random_header(&mut rng);
    let pdu = random_pdu(&mut rng, &header);
    let bytes = pdu.encode(&header).expect("encode");

    for cut in 0..bytes.len() {
        // Any strict prefix must decode to an error, never panic.
        assert!(Pdu::decode(&bytes[..cut]).is_err(), "cut at {}", cut);
    }
}
