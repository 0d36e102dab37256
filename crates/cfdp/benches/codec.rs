// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Codec and checksum throughput benchmarks.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use cfdp::checksum;
use cfdp::pdu::{
    Direction, FileDataPdu, MetadataPdu, Pdu, PduHeader, PduType, TransmissionMode,
};
use cfdp::ChecksumType;

fn header() -> PduHeader {
    PduHeader {
        version: 1,
        pdu_type: PduType::FileData,
        direction: Direction::TowardReceiver,
        transmission_mode: TransmissionMode::Acknowledged,
        crc_present: false,
        large_file: false,
        data_field_length: 0,
        segmentation_control: false,
        entity_id_length: 2,
        segment_metadata: false,
        sequence_number_length: 4,
        source_entity_id: 1,
        sequence_number: 42,
        destination_entity_id: 2,
    }
}

fn bench_file_data_codec(c: &mut Criterion) {
    let pdu = Pdu::FileData(FileDataPdu::new(4096, vec![0xA5; 1024]));
    let header = header();
    let bytes = pdu.encode(&header).expect("encode");

    c.bench_function("encode_file_data_1k", |b| {
        b.iter(|| black_box(&pdu).encode(black_box(&header)).expect("encode"))
    });
    c.bench_function("decode_file_data_1k", |b| {
        b.iter(|| Pdu::decode(black_box(&bytes)).expect("decode"))
    });
}

fn bench_metadata_codec(c: &mut Criterion) {
    let pdu = Pdu::Metadata(MetadataPdu {
        closure_requested: true,
        checksum_type: ChecksumType::Modular,
        file_size: 1_000_000,
        source_filename: "payload/science_pass_0042.dat".into(),
        destination_filename: "downlink/science_pass_0042.dat".into(),
    });
    let header = header();
    let bytes = pdu.encode(&header).expect("encode");

    c.bench_function("encode_metadata", |b| {
        b.iter(|| black_box(&pdu).encode(black_box(&header)).expect("encode"))
    });
    c.bench_function("decode_metadata", |b| {
        b.iter(|| Pdu::decode(black_box(&bytes)).expect("decode"))
    });
}

fn bench_checksums(c: &mut Criterion) {
    let data = vec![0x3Cu8; 64 * 1024];

    c.bench_function("modular_64k", |b| {
        b.iter(|| checksum::compute(ChecksumType::Modular, black_box(&data)))
    });
    c.bench_function("crc32_64k", |b| {
        b.iter(|| checksum::compute(ChecksumType::Crc32, black_box(&data)))
    });
    c.bench_function("crc32c_64k", |b| {
        b.iter(|| checksum::compute(ChecksumType::Crc32C, black_box(&data)))
    });
}

criterion_group!(
    benches,
    bench_file_data_codec,
    bench_metadata_codec,
    bench_checksums
);
criterion_main!(benches);
