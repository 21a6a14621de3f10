use criterion::{Criterion, Throughput, black_box, criterion_group, criterion_main};
use posebus_events::{MAX_PERSONS, PersonDetection, PoseClass};
use posebus_icc::{Channel, ChannelConfig, SNAPSHOT_SIZE, Snapshot};

fn bench_channel(label: &str) -> (tempfile::TempDir, Channel) {
    let dir = tempfile::tempdir().expect("tempdir");
    let lock = format!("/posebus_bench_{label}_{}", std::process::id());
    let cfg = ChannelConfig::new(dir.path(), "posebus_bench", lock);
    let ch = Channel::open(cfg).expect("failed to open channel");
    (dir, ch)
}

fn make_persons() -> Vec<PersonDetection> {
    (1..=MAX_PERSONS as u32)
        .map(|id| {
            PersonDetection::new(id, 1, 1)
                .with_classification(PoseClass::Standing, 0.9, [0.0, 0.0, 0.0, 0.9, 0.1, 0.0])
                .with_tracking(10)
        })
        .collect()
}

fn bench_write(c: &mut Criterion) {
    let (_dir, ch) = bench_channel("write");
    let persons = make_persons();

    let mut group = c.benchmark_group("channel");
    group.throughput(Throughput::Elements(1));

    let mut frame = 0u32;
    group.bench_function("write (10 persons)", |b| {
        b.iter(|| {
            frame = frame.wrapping_add(1);
            black_box(ch.write(black_box(&persons), frame, 1).expect("write"))
        });
    });

    drop(group);
    let _ = posebus_icc::remove(ch.config());
}

fn bench_read(c: &mut Criterion) {
    let (_dir, ch) = bench_channel("read");
    ch.write(&make_persons(), 1, 1).expect("write");
    let mut buf = Snapshot::new_boxed();

    let mut group = c.benchmark_group("channel");
    group.throughput(Throughput::Bytes(SNAPSHOT_SIZE as u64));

    group.bench_function("read_into (full snapshot)", |b| {
        b.iter(|| ch.read_into(black_box(&mut buf)).expect("read"));
    });

    group.bench_function("sequence_id", |b| {
        b.iter(|| black_box(ch.sequence_id().expect("seq")));
    });

    drop(group);
    let _ = posebus_icc::remove(ch.config());
}

criterion_group!(benches, bench_write, bench_read);
criterion_main!(benches);
