//! Rate limiting through a bounded pool of permits.
//!
//! A background generator task adds permits to a shared
//! [`tokio::sync::Semaphore`] at a constant cadence, and workers acquire and
//! forget one permit per call. The semaphore is the bounded, lossy queue between
//! the two sides:
//!
//! - capacity is `10 × rate` permits, enough to smooth short bursts without
//!   growing when consumers fall behind;
//! - when the pool is full, the permits of that tick are dropped instead of
//!   blocking the generator;
//! - the semaphore is never closed, so after [`TokenStream::stop`] a drained pool
//!   simply never yields again. Consumers always race it against the run
//!   deadline.
//!
//! # Cadence
//! The generator ticks every `1s / rate`, adding one permit per tick. Tokio timers
//! have millisecond granularity, so above 1000 permits/s it ticks every
//! millisecond and adds `rate × 1ms` permits per tick instead, carrying the
//! fractional part over to the next tick:
//!
//! ```text
//! add_f = per_tick + fractional
//! add_total = floor(add_f)
//! fractional = add_f - add_total
//! ```
//!
//! Generation is at a constant rate. Missed ticks are delayed rather than
//! replayed, so a stalled generator does not burst to catch up, and dropped
//! permits are not compensated.
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Semaphore, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Shortest interval the generator ticks at.
pub const MIN_TICK: Duration = Duration::from_millis(1);

/// Seconds' worth of permits the pool may hold.
const BUFFER_SECONDS: usize = 10;

/// A stream of permits produced at a fixed rate and shared by every worker.
pub struct TokenStream {
    rate: u32,
    capacity: usize,
    tokens: Arc<Semaphore>,
    stop: watch::Sender<bool>,
    generator: JoinHandle<()>,
}

impl TokenStream {
    /// Start generating `rate` permits per second. A rate of zero is treated as
    /// one permit per second.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(rate: u32) -> Self {
        let rate = rate.max(1);
        let capacity = (rate as usize)
            .saturating_mul(BUFFER_SECONDS)
            .min(Semaphore::MAX_PERMITS);
        let tokens = Arc::new(Semaphore::new(0));
        let (stop, stopped) = watch::channel(false);

        tracing::debug!(rate, capacity, "Spawning token generator task...");
        let generator = tokio::spawn(generator_task(tokens.clone(), rate, capacity, stopped));

        Self {
            rate,
            capacity,
            tokens,
            stop,
            generator,
        }
    }

    pub fn rate(&self) -> u32 {
        self.rate
    }

    /// Maximum number of permits buffered at once.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Permits currently waiting to be taken.
    pub fn available(&self) -> usize {
        self.tokens.available_permits()
    }

    /// Wait for the next permit.
    ///
    /// Once the stream is stopped and drained this never completes, so callers
    /// race it against their own cancellation signal.
    pub async fn next(&self) {
        match self.tokens.acquire().await {
            // the generator alone adds permits, a consumed one is never returned
            Ok(permit) => permit.forget(),
            Err(_) => std::future::pending::<()>().await,
        }
    }

    /// Stop generating permits. Calling it again has no effect. Permits already
    /// in the pool stay available.
    pub fn stop(&self) {
        if !self.stop.send_replace(true) {
            tracing::debug!("Token generator stopping...");
        }
    }

    pub fn is_stopped(&self) -> bool {
        *self.stop.borrow() || self.generator.is_finished()
    }
}

impl Drop for TokenStream {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Tick interval and permits per tick for a given rate.
pub fn tick_plan(rate: u32) -> (Duration, f64) {
    let interval = Duration::from_secs(1) / rate.max(1);
    if interval >= MIN_TICK {
        (interval, 1.0)
    } else {
        (MIN_TICK, rate as f64 * MIN_TICK.as_secs_f64())
    }
}

/// Pure function computing how many whole permits to add this tick.
///
/// Returns `(permits_to_add, next_fractional_part)`.
pub fn calc_token_limit(per_tick: f64, fractional: f64) -> (usize, f64) {
    let add_f = per_tick + fractional;
    let add_total_f = add_f.floor();
    let fractional = add_f - add_total_f;

    let add_total = if add_total_f >= Semaphore::MAX_PERMITS as f64 {
        Semaphore::MAX_PERMITS
    } else if add_total_f < 0.0 {
        0
    } else {
        add_total_f as usize
    };
    (add_total, fractional.max(0.0))
}

/// Add `add` permits without exceeding `capacity`, returning how many were
/// dropped.
fn refill(tokens: &Semaphore, add: usize, capacity: usize) -> usize {
    let free = capacity.saturating_sub(tokens.available_permits());
    let accepted = add.min(free);
    if accepted > 0 {
        tokens.add_permits(accepted);
    }
    add - accepted
}

async fn generator_task(
    tokens: Arc<Semaphore>,
    rate: u32,
    capacity: usize,
    mut stopped: watch::Receiver<bool>,
) {
    let (tick, per_tick) = tick_plan(rate);
    let mut interval = tokio::time::interval(tick);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // the first tick completes immediately, permits start one interval later
    interval.tick().await;

    let mut fractional = 0.0;
    tracing::debug!(?tick, per_tick, "Token generator started.");
    loop {
        tokio::select! {
            biased;
            // also resolves when the stream is dropped
            _ = stopped.wait_for(|s| *s) => break,
            _ = interval.tick() => {
                let (add, f) = calc_token_limit(per_tick, fractional);
                fractional = f;
                let dropped = refill(&tokens, add, capacity);
                if dropped > 0 {
                    tracing::trace!(dropped, "Token pool full, dropping permits.");
                }
            }
        }
    }
    tracing::debug!("Token generator finished.");
}
