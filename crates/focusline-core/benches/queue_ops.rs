#![allow(missing_docs)]

use criterion::{BatchSize, BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use focusline_core::{FocusQueue, TaskId};

fn build_queue(len: usize) -> FocusQueue {
    let mut queue = FocusQueue::new();
    for idx in 0..len {
        queue = queue.add(TaskId::new(), idx % 2 == 0, None).queue;
    }
    queue
}

fn move_to_index_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("queue_move_to_index");
    for &len in &[8usize, 64, 256, 1024] {
        group.bench_with_input(BenchmarkId::from_parameter(len), &len, |b, &len| {
            b.iter_batched(
                || {
                    let queue = build_queue(len);
                    let first = queue.active_items().next().map(|item| item.id);
                    (queue, first)
                },
                |(queue, first)| {
                    if let Some(item) = first {
                        black_box(queue.move_to_index(item, len - 1));
                    }
                },
                BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

fn add_then_undo_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("queue_add_undo");
    for &len in &[8usize, 256] {
        group.bench_with_input(BenchmarkId::from_parameter(len), &len, |b, &len| {
            b.iter_batched(
                || build_queue(len),
                |queue| {
                    let mutation = queue.add(TaskId::new(), true, None);
                    if let Some(undo) = mutation.undo {
                        let _ = black_box(mutation.queue.revert(&undo, Default::default()));
                    }
                },
                BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

criterion_group!(benches, move_to_index_benchmark, add_then_undo_benchmark);
criterion_main!(benches);
