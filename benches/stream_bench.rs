use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use cvsclient::streaming::{make_reader, Charset, ConnectionStreams, Terminator};
use cvsclient::transport::{NoopLogger, ScriptedConnection};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::io::{BufReader, Write};
use std::sync::Arc;

/// A checkout-like reply: messages and small file updates, then `ok`.
fn make_transcript(files: usize) -> Vec<u8> {
    let mut out = Vec::new();
    for i in 0..files {
        let body = format!("int value_{} = {};\n", i, i);
        out.extend_from_slice(format!("M U module/file{}.c\n", i).as_bytes());
        out.extend_from_slice(
            format!(
                "Updated module/\n/cvsroot/module/file{i}.c\n/file{i}.c/1.1///\nu=rw,g=r,o=r\n{}\n{}",
                body.len(),
                body
            )
            .as_bytes(),
        );
    }
    out.extend_from_slice(b"ok\n");
    out
}

fn deflate(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::new(6));
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

fn count_tokens<R: std::io::BufRead>(input: R) -> usize {
    let mut reader = make_reader(input, Charset::Ascii);
    let mut count = 0;
    loop {
        let token = reader.read_token().unwrap();
        if token.terminator == Terminator::Eof {
            break;
        }
        count += 1;
    }
    count
}

fn bench_read_tokens(c: &mut Criterion) {
    let mut group = c.benchmark_group("read_tokens");

    for files in [100, 1000, 5000].iter() {
        let plain = make_transcript(*files);
        let compressed = deflate(&plain);
        group.throughput(Throughput::Bytes(plain.len() as u64));

        group.bench_with_input(BenchmarkId::new("plain", files), &plain, |b, data| {
            b.iter(|| count_tokens(BufReader::new(black_box(data.as_slice()))));
        });

        group.bench_with_input(BenchmarkId::new("zlib", files), &compressed, |b, data| {
            b.iter(|| {
                count_tokens(BufReader::new(ZlibDecoder::new(black_box(data.as_slice()))))
            });
        });
    }

    group.finish();
}

fn bench_connection_streams(c: &mut Criterion) {
    let mut group = c.benchmark_group("connection_streams");

    let body = make_transcript(1000);
    group.throughput(Throughput::Bytes(body.len() as u64));

    group.bench_function("plain_lines", |b| {
        b.iter(|| {
            let (connection, _handle) = ScriptedConnection::new(body.clone());
            let mut streams = ConnectionStreams::open(
                Box::new(connection),
                Arc::new(NoopLogger),
                Charset::Ascii,
            )
            .unwrap();
            let mut lines = 0;
            while streams.reader().read_line().unwrap().is_some() {
                lines += 1;
            }
            black_box(lines)
        });
    });

    group.bench_function("gzip_switch_lines", |b| {
        let mut transcript = b"ok\n".to_vec();
        transcript.extend(deflate(&body));
        b.iter(|| {
            let (connection, _handle) = ScriptedConnection::new(transcript.clone());
            let mut streams = ConnectionStreams::open(
                Box::new(connection),
                Arc::new(NoopLogger),
                Charset::Ascii,
            )
            .unwrap();
            streams.reader().read_line().unwrap();
            streams.set_gzipped(6).unwrap();
            let mut lines = 0;
            while streams.reader().read_line().unwrap().is_some() {
                lines += 1;
            }
            black_box(lines)
        });
    });

    group.finish();
}

criterion_group!(benches, bench_read_tokens, bench_connection_streams);
criterion_main!(benches);
