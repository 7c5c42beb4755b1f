//! Benchmarks for the client protocol path.
//!
//! Run with: `cargo bench`

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use wsbook::Limits;
use wsbook::book::{BitfinexDecoder, FeedDecoder, KrakenDecoder};
use wsbook::protocol::handshake::{ClientHandshake, ServerHandshake, compute_accept_key, validate_response};
use wsbook::protocol::{Frame, FrameDecoder, MessageAssembler, OpCode, apply_mask, apply_mask_fast};

const MASK: [u8; 4] = [0x37, 0xfa, 0x21, 0x3d];

fn server_frame(payload_size: usize) -> Vec<u8> {
    Frame::binary(vec![0xAB; payload_size]).encode_with_mask(None)
}

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode");
    for size in [10usize, 1024, 64 * 1024] {
        let frame = Frame::text(vec![b'a'; size]);
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::new("masked", size), &frame, |b, frame| {
            b.iter(|| black_box(frame).encode_with_mask(Some(MASK)))
        });
    }
    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");
    for size in [10usize, 1024, 64 * 1024] {
        let wire = server_frame(size);
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::new("whole", size), &wire, |b, wire| {
            let mut decoder = FrameDecoder::new(Limits::default());
            b.iter(|| decoder.decode(black_box(wire)).unwrap())
        });
    }

    // Stream split into the 1400-byte pieces a TCP socket typically yields.
    let stream: Vec<u8> = (0..64).flat_map(|_| server_frame(1000)).collect();
    group.throughput(Throughput::Bytes(stream.len() as u64));
    group.bench_function("chunked_1400b", |b| {
        let mut decoder = FrameDecoder::new(Limits::default());
        b.iter(|| {
            let mut count = 0;
            for chunk in stream.chunks(1400) {
                count += decoder.decode(black_box(chunk)).unwrap().len();
            }
            count
        })
    });
    group.finish();
}

fn bench_masking(c: &mut Criterion) {
    let mut group = c.benchmark_group("masking");
    for size in [64usize, 1024, 64 * 1024] {
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_function(BenchmarkId::new("bytewise", size), |b| {
            let mut data = vec![0xAB; size];
            b.iter(|| apply_mask(black_box(&mut data), MASK))
        });
        group.bench_function(BenchmarkId::new("word", size), |b| {
            let mut data = vec![0xAB; size];
            b.iter(|| apply_mask_fast(black_box(&mut data), MASK))
        });
    }
    group.finish();
}

fn bench_handshake(c: &mut Criterion) {
    let mut group = c.benchmark_group("handshake");
    let request = ClientHandshake::with_key("ws.kraken.com", "/", "dGhlIHNhbXBsZSBub25jZQ==");
    let response = format!(
        "HTTP/1.1 101 Switching Protocols\r\n\
         Upgrade: websocket\r\n\
         Connection: Upgrade\r\n\
         Sec-WebSocket-Accept: {}\r\n\r\n",
        compute_accept_key(request.key())
    )
    .into_bytes();

    group.bench_function("accept_key", |b| {
        b.iter(|| compute_accept_key(black_box("dGhlIHNhbXBsZSBub25jZQ==")))
    });
    group.bench_function("request_to_bytes", |b| b.iter(|| black_box(&request).to_bytes()));
    group.bench_function("parse_and_validate", |b| {
        b.iter(|| {
            let (parsed, _) = ServerHandshake::parse(black_box(&response)).unwrap();
            validate_response(&request, &parsed)
        })
    });
    group.finish();
}

fn bench_reassembly(c: &mut Criterion) {
    let mut group = c.benchmark_group("reassembly");
    group.throughput(Throughput::Bytes(64 * 1024));
    group.bench_function("text_16_fragments", |b| {
        let mut assembler = MessageAssembler::new(Limits::default());
        b.iter(|| {
            for i in 0..16 {
                let opcode = if i == 0 { OpCode::Text } else { OpCode::Continuation };
                let out = assembler
                    .push(Frame::new(i == 15, opcode, vec![b'a'; 4096]))
                    .unwrap();
                if let Some(message) = out {
                    return message;
                }
            }
            unreachable!("final fragment completes the message")
        })
    });
    group.finish();
}

fn bench_feeds(c: &mut Criterion) {
    let mut group = c.benchmark_group("feeds");
    let kraken = KrakenDecoder::default();
    let kraken_update = r#"[1234,{"a":[["5541.30000","2.50700000","1534614248.456738"],
        ["5542.50000","0.40100000","1534614248.456738"]]},{"b":[["5541.20000",
        "1.52900000","1534614248.765567"]],"c":"974942666"},"book-10","XBT/USD"]"#;
    let bitfinex = BitfinexDecoder::default();
    let bitfinex_snapshot = format!(
        "[17082,[{}]]",
        (0..25)
            .map(|i| format!("[{}.5,{},{}]", 7000 + i, i % 4 + 1, if i % 2 == 0 { "1.25" } else { "-0.75" }))
            .collect::<Vec<_>>()
            .join(",")
    );

    group.bench_function("kraken_update", |b| {
        b.iter(|| kraken.decode(black_box(kraken_update)).unwrap())
    });
    group.bench_function("bitfinex_snapshot_25", |b| {
        b.iter(|| bitfinex.decode(black_box(&bitfinex_snapshot)).unwrap())
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_encode,
    bench_decode,
    bench_masking,
    bench_handshake,
    bench_reassembly,
    bench_feeds
);

criterion_main!(benches);
