//! Decoder and Dispatch Benchmarks
//!
//! Run with: cargo bench --bench decoder

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use hookbot::config::Config;
use hookbot::connection::BotHandle;
use hookbot::hooks::{HookDispatcher, HookRegistry};
use hookbot::plugins::{BuiltinSource, PluginLoader};
use hookbot::protocol::{parse_line, LineDecoder};

const LINES: &[&str] = &[
    ":irc.example.net 001 hookbot :Welcome to the network",
    "PING :irc.example.net",
    ":alice!alice@host.example PRIVMSG #rust :has anyone tried the new borrow checker?",
    ":bob!b@10.0.0.1 JOIN #rust",
    ":carol!c@cloak/carol PRIVMSG hookbot :hookbot: admin list",
    ":irc.example.net 376 hookbot :End of /MOTD command.",
];

fn stream(repeat: usize) -> Vec<u8> {
    let mut bytes = Vec::new();
    for _ in 0..repeat {
        for line in LINES {
            bytes.extend_from_slice(line.as_bytes());
            bytes.extend_from_slice(b"\r\n");
        }
    }
    bytes
}

fn benchmark_parse_line(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_line");
    group.throughput(Throughput::Elements(LINES.len() as u64));

    group.bench_function("mixed", |b| {
        b.iter(|| {
            for line in LINES {
                black_box(parse_line(black_box(line)));
            }
        });
    });

    group.finish();
}

fn benchmark_decoder(c: &mut Criterion) {
    let bytes = stream(100);
    let mut group = c.benchmark_group("line_decoder");
    group.throughput(Throughput::Bytes(bytes.len() as u64));

    group.bench_function("single_feed", |b| {
        b.iter(|| {
            let mut decoder = LineDecoder::new();
            decoder.feed(black_box(&bytes));
            let mut count = 0;
            while let Some(event) = decoder.next_event() {
                black_box(event);
                count += 1;
            }
            count
        });
    });

    group.bench_function("chunked_feed", |b| {
        b.iter(|| {
            let mut decoder = LineDecoder::new();
            let mut count = 0;
            for chunk in bytes.chunks(512) {
                decoder.feed(black_box(chunk));
                while let Some(event) = decoder.next_event() {
                    black_box(event);
                    count += 1;
                }
            }
            count
        });
    });

    group.finish();
}

fn benchmark_dispatch(c: &mut Criterion) {
    let (bot, mut receivers) = BotHandle::detached(Config::default());
    let mut loader = PluginLoader::new(vec![Box::new(BuiltinSource::new())]);
    let mut registry = HookRegistry::new();
    loader.load_all(&mut registry);
    let mut dispatcher = HookDispatcher::new();
    dispatcher.activate(&registry, &bot);

    let events: Vec<_> = LINES.iter().map(|line| parse_line(line)).collect();

    let mut group = c.benchmark_group("dispatch");
    group.throughput(Throughput::Elements(events.len() as u64));

    group.bench_function("builtin_hooks", |b| {
        b.iter(|| {
            for event in &events {
                black_box(dispatcher.dispatch(black_box(event)));
            }
            while receivers.outbound.try_recv().is_ok() {}
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    benchmark_parse_line,
    benchmark_decoder,
    benchmark_dispatch
);
criterion_main!(benches);
