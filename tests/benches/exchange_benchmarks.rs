//! # Exchange Benchmarks
//!
//! | Path | What is measured |
//! |------|------------------|
//! | pending table | register + complete of one invocation |
//! | pending table | `fail_all_for_channel` over many owners |
//! | loopback | full request → reply round trip over a `MemoryChannel` pair |

use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use exchange_core::PendingTable;
use exchange_tests::integration::fixtures::Loopback;
use exchange_types::{ChannelId, RequestId, Response};
use rand::Rng;
use std::time::Duration;

fn bench_pending_table(c: &mut Criterion) {
    let mut group = c.benchmark_group("pending-table");
    group.measurement_time(Duration::from_secs(5));

    let table = PendingTable::new();
    let owner = ChannelId::next();

    group.bench_function("register_complete", |b| {
        b.iter(|| {
            let id = RequestId::next();
            let future = table.register(id, owner, Duration::from_secs(30)).unwrap();
            table.complete(Response::ok(id, Bytes::new()));
            black_box(future.is_done())
        })
    });

    for channels in [8usize, 64, 512] {
        group.throughput(Throughput::Elements(channels as u64 * 4));
        group.bench_with_input(
            BenchmarkId::new("fail_all_for_channel", channels),
            &channels,
            |b, &channels| {
                let owners: Vec<ChannelId> = (0..channels).map(|_| ChannelId::next()).collect();
                let mut rng = rand::thread_rng();
                b.iter(|| {
                    let table = PendingTable::new();
                    for _ in 0..channels * 4 {
                        let owner = owners[rng.gen_range(0..owners.len())];
                        let _ = table.register(RequestId::next(), owner, Duration::from_secs(30));
                    }
                    black_box(table.fail_all_for_channel(owners[0], "bench"))
                })
            },
        );
    }

    group.finish();
}

fn bench_loopback(c: &mut Criterion) {
    let mut group = c.benchmark_group("loopback");

    let net = Loopback::new();
    let channel = net.client.channel();

    for size in [16usize, 1024, 64 * 1024] {
        let payload = Bytes::from(vec![0xAB; size]);
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::new("request_reply", size), &payload, |b, payload| {
            b.iter(|| {
                let future = channel.request(payload.clone(), None).unwrap();
                let response = future.wait().unwrap();
                // Keep the transport logs from growing across iterations.
                net.client.memory.take_sent();
                net.server.memory.take_sent();
                black_box(response)
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_pending_table, bench_loopback);
criterion_main!(benches);
