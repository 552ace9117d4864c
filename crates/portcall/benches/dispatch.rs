//! Dispatch round-trip benchmarks.
//!
//! Run with: cargo bench -p portcall

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use portcall::tagged::{decode_i64, decode_i64_le, decode_string, decode_utf8};
use portcall::{
    Dispatcher, DispatcherConfig, ManagedFn, NativePort, NormalTask, NotifierKind, StreamTask,
    SyncTask, TaggedCodec, WireObject, WireSyncReturn,
};

type I64Codec = TaggedCodec<i64, String>;

fn codec() -> Arc<I64Codec> {
    Arc::new(TaggedCodec::new(decode_i64, decode_string).with_sync(decode_i64_le, decode_utf8))
}

fn dispatcher(kind: NotifierKind) -> Dispatcher {
    Dispatcher::new(DispatcherConfig::new().notifier(kind)).expect("dispatcher")
}

fn bench_async(c: &mut Criterion) {
    let codec = codec();
    for kind in [NotifierKind::Condvar, NotifierKind::EventFd] {
        let d = dispatcher(kind);
        c.bench_function(&format!("async_inline_{}", kind), |b| {
            b.iter(|| {
                let r = d
                    .execute_async(NormalTask::new("add", Arc::clone(&codec), |port: NativePort| {
                        port.post(WireObject::success(WireObject::Int(black_box(300))));
                    }))
                    .expect("execute");
                black_box(r.wait().expect("result"))
            })
        });
    }

    let d = dispatcher(NotifierKind::default());
    c.bench_function("async_cross_thread", |b| {
        b.iter(|| {
            let r = d
                .execute_async(NormalTask::new("add", Arc::clone(&codec), |port: NativePort| {
                    std::thread::spawn(move || {
                        port.post(WireObject::success(WireObject::Int(300)));
                    });
                }))
                .expect("execute");
            black_box(r.wait().expect("result"))
        })
    });
}

fn bench_sync(c: &mut Criterion) {
    let codec = codec();
    let d = dispatcher(NotifierKind::default());
    c.bench_function("sync_decode_free", |b| {
        b.iter(|| {
            let out = d.execute_sync(SyncTask::new("get", Arc::clone(&codec), || {
                WireSyncReturn::success(&black_box(42i64).to_le_bytes())
            }));
            black_box(out.expect("result"))
        })
    });
}

fn bench_stream(c: &mut Criterion) {
    let codec = codec();
    let d = dispatcher(NotifierKind::default());
    c.bench_function("stream_100_elements", |b| {
        b.iter(|| {
            let s = d
                .execute_stream(StreamTask::new("frames", Arc::clone(&codec), |port: NativePort| {
                    for i in 0..100 {
                        port.post(WireObject::success(WireObject::Int(i)));
                    }
                    port.post(WireObject::END_OF_STREAM);
                }))
                .expect("execute");
            black_box(s.map(|r| r.expect("element")).sum::<i64>())
        })
    });
}

fn bench_reverse(c: &mut Criterion) {
    let d = dispatcher(NotifierKind::default());
    let f = d.register_callback(ManagedFn::binary(|a, b| {
        black_box((a, b));
    }));
    c.bench_function("reverse_call", |b| {
        b.iter(|| {
            d.invoke_callback(WireObject::Array(vec![
                WireObject::Callback(f),
                WireObject::Int(10),
                WireObject::Int(20),
            ]))
            .expect("invoke")
        })
    });
}

criterion_group!(benches, bench_async, bench_sync, bench_stream, bench_reverse);
criterion_main!(benches);
