//! Fan-out benchmarks for the hub.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use commentcast_core::{Event, EventKind, Hub, HubConfig, Mailbox};
use serde_json::json;

fn bench_broadcast(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let mut group = c.benchmark_group("broadcast");

    for subscribers in [1usize, 10, 100, 1000] {
        group.throughput(Throughput::Elements(subscribers as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(subscribers),
            &subscribers,
            |b, &subscribers| {
                let (hub, mut mailboxes) = rt.block_on(async {
                    let (hub, _task) = Hub::spawn(HubConfig {
                        mailbox_capacity: 1024,
                    });
                    let mut mailboxes: Vec<Mailbox> = Vec::with_capacity(subscribers);
                    for i in 0..subscribers {
                        let (handle, mailbox) = hub.open("bench", format!("user-{i}"));
                        hub.register(handle).await.unwrap();
                        mailboxes.push(mailbox);
                    }
                    (hub, mailboxes)
                });
                let event = Event::new(EventKind::Liked, "bench", json!({"id": "c1", "likes": 1}));

                b.iter(|| {
                    rt.block_on(hub.broadcast(black_box(&event))).unwrap();
                    for mailbox in &mut mailboxes {
                        while mailbox.try_recv().is_some() {}
                    }
                });
            },
        );
    }

    group.finish();
}

fn bench_register_unregister(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let (hub, _task) = rt.block_on(async { Hub::spawn(HubConfig::default()) });

    c.bench_function("register_unregister", |b| {
        b.iter(|| {
            rt.block_on(async {
                let (handle, _mailbox) = hub.open("bench", "user");
                let conn = handle.connection_ref();
                hub.register(handle).await.unwrap();
                hub.unregister(&conn);
            })
        });
    });
}

criterion_group!(benches, bench_broadcast, bench_register_unregister);
criterion_main!(benches);
