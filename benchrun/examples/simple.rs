use std::time::{Duration, Instant};

use benchrun::{
    Bench, BenchConfig, BenchError, BenchReport, JsonReporter, Percentiles, Reporter,
    StdoutReporter, from_fn,
};

#[tokio::main]
async fn main() -> Result<(), BenchError> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // a busy loop paced at 10 calls per second
    let quick = from_fn(|ctx| {
        Box::pin(async move {
            let start = Instant::now();
            let mut acc = 0u64;
            for i in 0..1_000_000u64 {
                acc = acc.wrapping_add(std::hint::black_box(i));
            }
            std::hint::black_box(acc);
            ctx.timer("latency", start.elapsed());
            ctx.incr("calls", 1);
        })
    });
    let config = BenchConfig::builder()
        .name("quick")
        .concurrency(2)
        .duration(Duration::from_secs(5))
        .rate(10)
        .build();
    let mut bench = Bench::new(config, quick)?;
    let result = bench.run().await?;
    StdoutReporter.report(&BenchReport::from(result)).await?;
    for ctx in bench.contexts() {
        print!("{ctx}");
    }

    // sleeps as fast as the workers allow
    let delayed = from_fn(|ctx| {
        Box::pin(async move {
            let start = Instant::now();
            tokio::time::sleep(Duration::from_millis(100)).await;
            ctx.timer("latency", start.elapsed());
            ctx.incr("calls", 1);
        })
    });
    let config = BenchConfig::builder()
        .name("delayed")
        .concurrency(4)
        .duration(Duration::from_secs(2))
        .build();
    let mut bench = Bench::new(config, delayed)?;
    let result = bench.run().await?;
    JsonReporter
        .report(&BenchReport::new(result, Percentiles::Basic))
        .await
}
