use std::time::{Duration, Instant};

use benchrun::{
    Bench, BenchConfig, BenchError, BenchReport, Reporter, RunContext, StdoutReporter, workload,
};
use reqwest::Client;

#[workload]
async fn get_local(ctx: &mut RunContext) {
    // NEVER build heavy things like clients on every call,
    // keep one per worker in the scratch space instead
    let client = ctx
        .value_or_insert_with("client", || {
            Client::builder()
                .timeout(Duration::from_secs(5))
                .build()
                .unwrap_or_default()
        })
        .clone();
    if ctx.iteration() == 1 {
        ctx.incr("clients", 1);
    }

    let start = Instant::now();
    // Yeah lets hardcode it
    match client.get("http://localhost:3000").send().await {
        Ok(res) if res.status().is_success() => {
            ctx.timer("latency", start.elapsed());
        }
        Ok(_) => ctx.incr("bad_status", 1),
        Err(_) => ctx.incr("errors", 1),
    }
}

#[tokio::main]
async fn main() -> Result<(), BenchError> {
    tracing_subscriber::fmt().init();

    let config = BenchConfig::builder()
        .name("Http bench")
        .concurrency(10)
        .duration(Duration::from_secs(10))
        .rate(100)
        .build();

    let mut bench = Bench::new(config, get_local)?;
    let result = bench.run().await?;
    StdoutReporter.report(&BenchReport::from(result)).await
}
