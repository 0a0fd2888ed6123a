use std::time::{Duration, Instant};

use benchrun::{
    Bench, BenchConfig, BenchReport, DEFAULT_TIMER, RunContext, Workload, async_trait, from_fn,
    timed, workload,
};

fn config(concurrency: usize, duration: Duration) -> BenchConfig {
    BenchConfig::builder()
        .name("it")
        .concurrency(concurrency)
        .duration(duration)
        .build()
}

struct Sleep(Duration);

#[async_trait]
impl Workload for Sleep {
    async fn call(&self, ctx: &mut RunContext) {
        let start = Instant::now();
        tokio::time::sleep(self.0).await;
        ctx.timer("sleep", start.elapsed());
        ctx.incr("calls", 1);
    }
}

#[workload]
async fn first_call_only(ctx: &mut RunContext) {
    if ctx.iteration() == 1 {
        let delta = if ctx.id() == 1 { 3 } else { 5 };
        ctx.incr("x", delta);
    }
    tokio::time::sleep(Duration::from_millis(5)).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn call_count_is_conserved() {
    let mut bench = Bench::new(
        config(4, Duration::from_millis(150)),
        Sleep(Duration::from_millis(1)),
    )
    .unwrap();
    let total = bench.run().await.unwrap().total_calls;

    let from_workers: u64 = bench.contexts().iter().map(RunContext::iteration).sum();
    assert!(total > 0);
    assert_eq!(total, from_workers);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn second_run_returns_same_result() {
    let mut bench = Bench::new(
        config(2, Duration::from_millis(100)),
        Sleep(Duration::from_millis(5)),
    )
    .unwrap();

    let first = bench.run().await.unwrap().clone();
    let second = bench.run().await.unwrap().clone();

    assert_eq!(first.total_calls, second.total_calls);
    assert_eq!(first.counters, second.counters);
    assert_eq!(first.elapsed, second.elapsed);
    assert_eq!(first.timers["sleep"], second.timers["sleep"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn deadline_is_respected() {
    let duration = Duration::from_millis(200);
    let call = Duration::from_millis(20);
    let mut bench = Bench::new(config(2, duration), Sleep(call)).unwrap();
    let result = bench.run().await.unwrap();

    assert!(result.elapsed >= duration, "{:?}", result.elapsed);
    // one in-flight call at most, plus scheduling slack
    assert!(
        result.elapsed <= duration + call + Duration::from_millis(50),
        "{:?}",
        result.elapsed
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn rate_ceiling_is_approximated() {
    let config = BenchConfig::builder()
        .concurrency(4)
        .duration(Duration::from_secs(1))
        .rate(100)
        .build();
    let workload = from_fn(|ctx| Box::pin(async move { ctx.incr("calls", 1) }));
    let mut bench = Bench::new(config, workload).unwrap();
    let result = bench.run().await.unwrap();

    assert_eq!(result.rate, Some(100));
    assert!(
        (85..=101).contains(&result.total_calls),
        "got {} calls",
        result.total_calls
    );
    assert_eq!(result.counters["calls"] as u64, result.total_calls);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn counters_accumulate_across_workers() {
    let mut bench = Bench::new(config(2, Duration::from_millis(50)), first_call_only).unwrap();
    let result = bench.run().await.unwrap();

    assert_eq!(result.counters.get("x"), Some(&8));
    assert!(!result.counters.contains_key("never"));
    assert!(result.timers.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn two_workers_sleeping_ten_millis() {
    let mut bench = Bench::new(
        config(2, Duration::from_millis(200)),
        Sleep(Duration::from_millis(10)),
    )
    .unwrap();
    let result = bench.run().await.unwrap();

    assert!(
        (30..=42).contains(&result.total_calls),
        "got {} calls",
        result.total_calls
    );
    assert_eq!(result.counters["calls"] as u64, result.total_calls);
    let sleep = &result.timers["sleep"];
    assert_eq!(sleep.len(), result.total_calls);
    assert!(sleep.value_at_percentile(100.0) >= 10_000_000);

    let report = BenchReport::from(result);
    assert_eq!(report.timers.len(), 1);
    assert!(report.timers[0].percentiles.last().unwrap().millis >= 10.0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn scratch_values_stay_per_worker() {
    struct Client {
        owner: usize,
    }

    let workload = from_fn(|ctx| {
        Box::pin(async move {
            let id = ctx.id();
            if ctx.value::<Client>("client").is_none() {
                ctx.set_value("client", Client { owner: id });
                ctx.incr("connects", 1);
            }
            let owner = ctx.value::<Client>("client").map(|c| c.owner);
            if owner != Some(id) {
                ctx.incr("foreign", 1);
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        })
    });

    let mut bench = Bench::new(config(4, Duration::from_millis(60)), workload).unwrap();
    let result = bench.run().await.unwrap();

    assert_eq!(result.counters["connects"], 4);
    assert!(!result.counters.contains_key("foreign"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn timed_workload_fills_default_timer() {
    let workload = timed(|_id, _iteration| async move {
        let start = Instant::now();
        tokio::time::sleep(Duration::from_millis(3)).await;
        start.elapsed()
    });

    let mut bench = Bench::new(config(2, Duration::from_millis(60)), workload).unwrap();
    let result = bench.run().await.unwrap();

    let latency = &result.timers[DEFAULT_TIMER];
    assert_eq!(latency.len(), result.total_calls);
    // lowest equivalent value of a 3ms sample, within histogram precision
    assert!(latency.min() >= 2_990_000);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn iterations_are_strictly_increasing_per_worker() {
    let workload = from_fn(|ctx| {
        Box::pin(async move {
            let last = ctx.value::<u64>("last").copied().unwrap_or(0);
            if ctx.iteration() != last + 1 {
                ctx.incr("out_of_order", 1);
            }
            let iteration = ctx.iteration();
            ctx.set_value("last", iteration);
            tokio::task::yield_now().await;
        })
    });

    let mut bench = Bench::new(config(3, Duration::from_millis(50)), workload).unwrap();
    let result = bench.run().await.unwrap();

    assert!(result.total_calls > 0);
    assert!(!result.counters.contains_key("out_of_order"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn every_worker_runs_a_blocking_workload() {
    let workload = from_fn(|ctx| {
        Box::pin(async move {
            let start = Instant::now();
            while start.elapsed() < Duration::from_micros(200) {
                std::hint::spin_loop();
            }
            ctx.incr("calls", 1);
        })
    });

    let mut bench = Bench::new(config(4, Duration::from_millis(100)), workload).unwrap();
    let result = bench.run().await.unwrap();
    assert_eq!(result.counters["calls"] as u64, result.total_calls);

    for ctx in bench.contexts() {
        assert!(ctx.iteration() > 0, "worker {} never ran", ctx.id());
    }
}
