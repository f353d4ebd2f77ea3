use std::time::Duration;

use async_trait::async_trait;
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use weft_core::{BoundedStrategy, Context, FlowError, Node, Task, Workflow};

// Increments a counter in the context
struct Counter;

#[async_trait]
impl Task for Counter {
    fn name(&self) -> &str {
        "counter"
    }

    async fn execute(&self, ctx: &Context) -> Result<(), FlowError> {
        let n = ctx.get_cloned::<usize>("counter")?.unwrap_or(0);
        ctx.put("counter", n + 1)?;
        Ok(())
    }
}

fn linear(len: usize) -> Workflow {
    Workflow::new(Node::sequence("linear", (0..len).map(|_| Node::leaf(Counter))))
}

fn fan_out(width: usize, bounded: Option<usize>) -> Workflow {
    let mut builder = Node::parallel("fan_out")
        .share_context(false)
        .children((0..width).map(|_| Node::leaf(Counter)));
    if let Some(limit) = bounded {
        builder = builder.strategy(std::sync::Arc::new(BoundedStrategy::new(limit)));
    }
    Workflow::new(builder.build())
}

fn benchmark_sequence(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let mut group = c.benchmark_group("sequence");
    group.measurement_time(Duration::from_secs(10));

    for len in [1, 10, 100] {
        let workflow = linear(len);
        group.bench_with_input(BenchmarkId::from_parameter(len), &workflow, |b, wf| {
            b.to_async(&rt).iter(|| async { wf.run().await })
        });
    }
    group.finish();
}

fn benchmark_parallel(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let mut group = c.benchmark_group("parallel");

    for width in [4, 32, 256] {
        let unbounded = fan_out(width, None);
        group.bench_with_input(BenchmarkId::new("tokio", width), &unbounded, |b, wf| {
            b.to_async(&rt).iter(|| async { wf.run().await })
        });
        let bounded = fan_out(width, Some(4));
        group.bench_with_input(BenchmarkId::new("bounded_4", width), &bounded, |b, wf| {
            b.to_async(&rt).iter(|| async { wf.run().await })
        });
    }
    group.finish();
}

criterion_group!(benches, benchmark_sequence, benchmark_parallel);
criterion_main!(benches);
