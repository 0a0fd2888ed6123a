//! Executor: the worker loops and the signals that pace and stop them
//!
//! Every worker owns one [`RunContext`] and runs one of two loops, picked once per
//! run:
//!
//! - [`continuous`]: no rate limit. The worker checks the [`Deadline`] between
//!   calls and otherwise calls the workload back to back, yielding to the
//!   scheduler after each call so a workload that never awaits cannot keep the
//!   other workers off the runtime threads.
//! - [`on_token`]: rate-bounded. The worker waits for whichever comes first, the
//!   deadline or the next permit from the shared [`TokenStream`].
//!
//! Both loops bump the iteration counter *before* calling the workload, so the
//! workload sees the 1-based ordinal of the call in progress. Cancellation is
//! cooperative: a call in flight when the deadline passes is allowed to finish,
//! the deadline only prevents the next one.
//!
//! Workers never talk to each other. The only shared state is the deadline, which
//! is immutable, and the token pool.
pub mod token;
pub use token::TokenStream;

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::{context::RunContext, workload::Workload};

#[cfg(feature = "internals")]
pub use internals::*;
#[cfg(not(feature = "internals"))]
pub(crate) use internals::*;

/// Internal components of the execution engine.
/// Encapsulated in a module to allow conditional exposure via `#[cfg(feature = "internals")]`.
mod internals {
    use super::*;

    /// The single point in time at which every worker stops, created once per run
    /// and cloned into each worker.
    #[derive(Clone, Copy, Debug)]
    pub struct Deadline {
        at: Instant,
    }

    impl Deadline {
        pub fn at(at: Instant) -> Self {
            Self { at }
        }

        /// Non-blocking check used between calls.
        pub fn reached(&self) -> bool {
            Instant::now() >= self.at
        }

        /// Resolves once the deadline has passed.
        pub async fn expired(&self) {
            tokio::time::sleep_until(self.at).await
        }
    }

    /// Call the workload back to back until the deadline passes.
    pub async fn continuous<W: Workload>(
        mut ctx: RunContext,
        deadline: Deadline,
        workload: Arc<W>,
    ) -> RunContext {
        tracing::debug!("Worker {} started.", ctx.id());
        while !deadline.reached() {
            ctx.advance();
            workload.call(&mut ctx).await;
            tokio::task::yield_now().await;
        }
        tracing::debug!("Worker {} shutting down after {} calls.", ctx.id(), ctx.iteration());
        ctx
    }

    /// Call the workload once per permit until the deadline passes.
    pub async fn on_token<W: Workload>(
        mut ctx: RunContext,
        deadline: Deadline,
        tokens: Arc<TokenStream>,
        workload: Arc<W>,
    ) -> RunContext {
        tracing::debug!("Worker {} started.", ctx.id());
        loop {
            tokio::select! {
                // a permit that races with the deadline is left in the pool
                biased;
                _ = deadline.expired() => break,
                _ = tokens.next() => {
                    ctx.advance();
                    workload.call(&mut ctx).await;
                }
            }
        }
        tracing::debug!("Worker {} shutting down after {} calls.", ctx.id(), ctx.iteration());
        ctx
    }

    /// Spawn one Tokio task per context, all of them started before this returns.
    pub fn spawn_workers<W: Workload>(
        contexts: Vec<RunContext>,
        deadline: Deadline,
        tokens: Option<Arc<TokenStream>>,
        workload: Arc<W>,
    ) -> Vec<JoinHandle<RunContext>> {
        contexts
            .into_iter()
            .map(|ctx| {
                let workload = workload.clone();
                match tokens.clone() {
                    Some(tokens) => tokio::spawn(on_token(ctx, deadline, tokens, workload)),
                    None => tokio::spawn(continuous(ctx, deadline, workload)),
                }
            })
            .collect()
    }
}
