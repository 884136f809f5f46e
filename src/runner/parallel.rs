// Copyright (c) 2018-2023  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Dispatching of accepted [`Pickle`]s, either concurrently or one by one.

use std::sync::Arc;

use futures::{stream::FuturesUnordered, StreamExt as _};
use tracing::Instrument as _;

use crate::{error::Result, Pickle, TestResult, TestRunResult};

use super::{test_case::TestCaseRunner, Context};

/// Runs a single scenario to completion.
async fn run_scenario(
    ctx: &Context,
    pickle: Arc<Pickle>,
    is_skipped: bool,
) -> Result<TestResult> {
    let span = tracing::info_span!("scenario", pickle_id = %pickle.id);
    TestCaseRunner::new(ctx, pickle, is_skipped)?
        .run()
        .instrument(span)
        .await
}

/// Run-wide state of a dispatch, owned by its driving loop.
#[derive(Debug)]
struct Progress<'c> {
    ctx: &'c Context,

    /// Whether scenarios launched from now on are skipped.
    skip_rest: bool,

    /// Aggregated result so far.
    result: TestRunResult,
}

impl<'c> Progress<'c> {
    fn new(ctx: &'c Context) -> Self {
        Self {
            ctx,
            skip_rest: ctx.runtime.is_dry_run,
            result: TestRunResult::default(),
        }
    }

    /// Accounts a finished scenario, switching to skipping on the first
    /// failure when failing fast.
    fn finished(&mut self, scenario: &TestResult) {
        self.result.update(scenario, self.ctx.runtime.is_strict);
        if !self.skip_rest
            && !self.result.success
            && self.ctx.runtime.is_fail_fast
        {
            tracing::debug!("failing fast, skipping remaining scenarios");
            self.skip_rest = true;
        }
    }
}

/// Runs the given `pickles` keeping up to
/// [`RuntimeConfig::concurrency()`] of them in flight.
///
/// Every finished scenario launches the next queued one. Only scenarios
/// launched after the first failure are skipped when failing fast.
///
/// # Errors
///
/// On the first scenario failing to resolve or to communicate with the host.
/// Scenarios still in flight are abandoned.
///
/// [`RuntimeConfig::concurrency()`]: crate::config::RuntimeConfig::concurrency
pub(crate) async fn run_parallel(
    ctx: &Context,
    pickles: Vec<Arc<Pickle>>,
) -> Result<TestRunResult> {
    let limit = ctx.runtime.concurrency(pickles.len());
    tracing::debug!(total = pickles.len(), limit, "running concurrently");

    let mut progress = Progress::new(ctx);
    let mut queue = pickles.into_iter();
    let mut running = queue
        .by_ref()
        .take(limit)
        .map(|pickle| run_scenario(ctx, pickle, progress.skip_rest))
        .collect::<FuturesUnordered<_>>();

    while let Some(scenario) = running.next().await {
        progress.finished(&scenario?);
        if let Some(pickle) = queue.next() {
            running.push(run_scenario(ctx, pickle, progress.skip_rest));
        }
    }

    Ok(progress.result)
}

/// Runs the given `pickles` one by one.
///
/// # Errors
///
/// On the first scenario failing to resolve or to communicate with the host.
pub(crate) async fn run_sequential(
    ctx: &Context,
    pickles: Vec<Arc<Pickle>>,
) -> Result<TestRunResult> {
    tracing::debug!(total = pickles.len(), "running sequentially");

    let mut progress = Progress::new(ctx);
    for pickle in pickles {
        let scenario = run_scenario(ctx, pickle, progress.skip_rest).await?;
        progress.finished(&scenario);
    }

    Ok(progress.result)
}
