// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Frame Codec Benchmark
//!
//! Measures the byte-stuffing encoder and the information-frame parser at
//! typical fragment sizes. The parser path is the hot loop of the receive
//! side: one state-machine step per wire byte.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use slink::link::frame::{encode_information, max_frame_len};
use slink::link::information::{InfoEvent, InformationFsm};

fn payload_of(len: usize) -> Vec<u8> {
    // Mixed content with a sprinkling of bytes that need stuffing.
    (0..len)
        .map(|i| match i % 37 {
            0 => 0x7E,
            1 => 0x7D,
            _ => (i * 31) as u8,
        })
        .collect()
}

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode_information");

    for &len in &[64usize, 1024, 3000] {
        let payload = payload_of(len);
        let mut buf = vec![0u8; max_frame_len(len)];

        group.bench_with_input(BenchmarkId::from_parameter(len), &payload, |b, payload| {
            b.iter(|| {
                let n = encode_information(0, black_box(payload), &mut buf).expect("encode");
                black_box(n)
            });
        });
    }

    group.finish();
}

fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("information_parse");

    for &len in &[64usize, 1024, 3000] {
        let payload = payload_of(len);
        let mut buf = vec![0u8; max_frame_len(len)];
        let n = encode_information(0, &payload, &mut buf).expect("encode");
        let wire = buf[..n].to_vec();

        group.bench_with_input(BenchmarkId::from_parameter(len), &wire, |b, wire| {
            b.iter(|| {
                let mut fsm = InformationFsm::new(0);
                for &byte in wire {
                    if let InfoEvent::Delivered = fsm.on_byte(byte) {
                        return black_box(fsm.take_payload());
                    }
                }
                unreachable!("frame must deliver");
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_encode, bench_parse);
criterion_main!(benches);
