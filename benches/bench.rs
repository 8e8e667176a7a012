use criterion::{black_box, criterion_group, criterion_main, Criterion};
use hex_literal::hex;
use rpcd::buffer::SlidingBuffer;
use rpcd::codec::{Decode, Encode};
use rpcd::wire::{AcceptedStatus, CallHeader, Reply};

pub fn codec(c: &mut Criterion) {
    c.bench_function("decode_u32", |b| {
        let mut buf = [0u8; 4];
        42u32.encode_into(&mut buf).unwrap();
        b.iter(|| black_box(u32::decode_from(black_box(&buf)).unwrap()))
    });

    c.bench_function("decode_string", |b| {
        let s = "the quick brown fox".to_owned();
        let mut buf = vec![0u8; s.encoded_len()];
        s.encode_into(&mut buf).unwrap();
        b.iter(|| black_box(String::decode_from(black_box(&buf)).unwrap()))
    });

    c.bench_function("decode_tuple", |b| {
        let value: (u32, String, bool) = (7, "hi".to_owned(), true);
        let mut buf = vec![0u8; value.encoded_len()];
        value.encode_into(&mut buf).unwrap();
        b.iter(|| black_box(<(u32, String, bool)>::decode_from(black_box(&buf)).unwrap()))
    });
}

pub fn wire(c: &mut Criterion) {
    c.bench_function("decode_call_header", |b| {
        #[rustfmt::skip]
        let raw: [u8; CallHeader::ENCODED_LEN] = hex!(
            "00000001" "00000000" "00000002" "00000064" "00000000" "00000003"
            "00000000" "00000000" "00000000" "00000000"
        );
        b.iter(|| black_box(CallHeader::decode_from(black_box(&raw)).unwrap()))
    });

    c.bench_function("encode_success_reply", |b| {
        let reply = Reply::Accepted {
            xid: 42,
            status: AcceptedStatus::Success(&[0xAA, 0xBB, 0xCC, 0xDD]),
        };
        let mut buf = vec![0u8; reply.encoded_len()];
        b.iter(|| black_box(reply.encode_into(black_box(&mut buf))))
    });
}

pub fn buffer(c: &mut Criterion) {
    c.bench_function("sliding_buffer_fill_and_compact", |b| {
        b.iter(|| {
            let mut buf = SlidingBuffer::new(4096);
            for _ in 0..8 {
                let n = 128.min(buf.residual());
                buf.advance_end(n);
                buf.advance_start(n);
                buf.slide(1024);
            }
            black_box(buf.len())
        })
    });
}

criterion_group!(benches, codec, wire, buffer);
criterion_main!(benches);
