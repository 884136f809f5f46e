// Copyright (c) 2018-2023  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Orchestration of a whole run.
//!
//! A [`Runner`] consumes a stream of [`Inbound`] messages and produces a
//! stream of [`Outbound`] ones. Inbound responses are routed to the awaiting
//! requests as soon as they arrive, so any number of scenarios may be waiting
//! on the host at once.

mod parallel;
mod test_case;

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use derive_more::Display;
use futures::{
    channel::{mpsc, oneshot},
    future::{self, Either, FutureExt as _},
    pin_mut,
    stream::{self, LocalBoxStream},
    Stream, StreamExt as _,
};
use rand::{rngs::StdRng, Rng as _, SeedableRng as _};

use crate::{
    config::{FeaturesOrder, FeaturesOrderType, RuntimeConfig},
    correlation::Correlator,
    error::{Error, Result},
    filter::PickleFilter,
    message::{Command, DiscoveryEvent, Event, Inbound, Outbound, Start},
    support_code::SupportCodeLibrary,
    Discover, Pickle,
};

/// Everything scenarios of a single run share.
#[derive(Debug)]
pub(crate) struct Context {
    /// Directory reported locations are made relative to.
    pub(crate) base_directory: PathBuf,

    /// How to run scenarios.
    pub(crate) runtime: RuntimeConfig,

    /// Step definitions and hooks of the host.
    pub(crate) library: SupportCodeLibrary,

    /// Channel to the host.
    pub(crate) correlator: Arc<Correlator>,
}

/// Makes the given `uri` relative to the `base` directory, if it's inside.
pub(crate) fn relative_uri(base: &Path, uri: &str) -> String {
    Path::new(uri)
        .strip_prefix(base)
        .map_or_else(|_| uri.to_owned(), |p| p.display().to_string())
}

/// Lifecycle of a run.
#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
enum State {
    /// Waiting for [`Inbound::Start`].
    #[display(fmt = "idle")]
    Idle,

    /// Building support code and discovering pickles.
    #[display(fmt = "starting")]
    Starting,

    /// Executing accepted pickles.
    #[display(fmt = "running")]
    Running,

    /// Done, either successfully or not. Nothing is emitted anymore.
    #[display(fmt = "finished")]
    Finished,
}

/// Drives a run: discovers pickles with the provided [`Discover`]
/// implementation and executes them with the help of the host.
#[derive(Clone, Debug)]
pub struct Runner<D> {
    discovery: D,
}

impl<D> Runner<D>
where
    D: Discover + 'static,
{
    /// Creates a new [`Runner`] discovering pickles with the given
    /// `discovery`.
    #[must_use]
    pub const fn new(discovery: D) -> Self {
        Self { discovery }
    }

    /// Runs until the run finishes or the `inbound` stream ends.
    ///
    /// The returned stream ends right after [`Event::TestRunFinished`] or an
    /// [`Outbound::Error`]. If the `inbound` stream ends before
    /// [`Inbound::Start`], it ends without emitting anything.
    pub fn run<S>(self, inbound: S) -> LocalBoxStream<'static, Outbound>
    where
        S: Stream<Item = Inbound> + 'static,
    {
        let (sender, receiver) = mpsc::unbounded();
        let correlator = Arc::new(Correlator::new(sender));
        let (start_sender, start_receiver) = oneshot::channel();
        let (done_sender, done_receiver) = oneshot::channel();

        let dispatch = dispatch(
            inbound,
            Arc::clone(&correlator),
            start_sender,
            done_receiver,
        );
        let orchestrate = Orchestrator::new(self.discovery, correlator)
            .run(start_receiver, done_sender);

        stream::select(
            receiver.map(Either::Left),
            future::join(dispatch, orchestrate)
                .into_stream()
                .map(Either::Right),
        )
        .filter_map(|r| async {
            match r {
                Either::Left(msg) => Some(msg),
                Either::Right(_) => None,
            }
        })
        .boxed_local()
    }
}

/// Routes [`Inbound`] messages until the run finishes or they end.
///
/// Never awaits anything but the next message.
async fn dispatch<S>(
    inbound: S,
    correlator: Arc<Correlator>,
    start: oneshot::Sender<Box<Start>>,
    done: oneshot::Receiver<()>,
) where
    S: Stream<Item = Inbound>,
{
    let mut start = Some(start);
    let inbound = inbound.take_until(done);
    pin_mut!(inbound);

    while let Some(msg) = inbound.next().await {
        match msg {
            Inbound::Start(payload) => {
                if let Some(tx) = start.take() {
                    _ = tx.send(payload);
                } else {
                    tracing::warn!("ignoring repeated `start` message");
                }
            }
            Inbound::ActionComplete(response) => correlator.deliver(response),
        }
    }

    tracing::debug!("inbound finished");
    correlator.close();
}

/// Executor of a single run.
struct Orchestrator<D> {
    discovery: D,
    correlator: Arc<Correlator>,
    state: State,
}

impl<D: Discover> Orchestrator<D> {
    fn new(discovery: D, correlator: Arc<Correlator>) -> Self {
        Self { discovery, correlator, state: State::Idle }
    }

    fn transition(&mut self, to: State) {
        tracing::debug!(from = %self.state, %to, "run state changed");
        self.state = to;
    }

    /// Waits for the `start` payload and executes the run, reporting a
    /// failure as an [`Outbound::Error`].
    ///
    /// `_done` is dropped once the run finishes, stopping the [`dispatch()`].
    async fn run(
        mut self,
        start: oneshot::Receiver<Box<Start>>,
        _done: oneshot::Sender<()>,
    ) {
        if let Ok(start) = start.await {
            if let Err(e) = self.execute(*start).await {
                tracing::error!(error = %e, "run aborted");
                let message = e.to_string();
                self.correlator.emit(Outbound::Error { message });
            }
        } else {
            tracing::debug!("inbound finished before `start`");
        }

        self.transition(State::Finished);
        self.correlator.finish();
    }

    async fn execute(&mut self, start: Start) -> Result<()> {
        self.transition(State::Starting);
        let Start {
            base_directory,
            features_config,
            runtime_config,
            support_code_config,
        } = start;
        let base_directory = PathBuf::from(base_directory);

        let filter = PickleFilter::new(&features_config.filters)?;
        let library = SupportCodeLibrary::new(&support_code_config)?;
        let events = self.discovery.discover(&features_config)?;

        let mut pickles =
            self.accept(events, &filter, &base_directory).await?;
        shuffle(&mut pickles, features_config.order);
        tracing::info!(accepted = pickles.len(), "pickles discovered");

        self.transition(State::Running);
        let ctx = Context {
            base_directory,
            runtime: runtime_config,
            library,
            correlator: Arc::clone(&self.correlator),
        };
        ctx.correlator.emit(Event::TestRunStarted);

        let any_accepted = !pickles.is_empty();
        if any_accepted {
            _ = ctx
                .correlator
                .send_and_await(Command::RunBeforeTestRunHooks)
                .await?;
        }
        let result = if ctx.runtime.is_parallel() {
            parallel::run_parallel(&ctx, pickles).await?
        } else {
            parallel::run_sequential(&ctx, pickles).await?
        };
        if any_accepted {
            _ = ctx
                .correlator
                .send_and_await(Command::RunAfterTestRunHooks)
                .await?;
        }

        tracing::info!(success = result.success, "run finished");
        ctx.correlator.emit(Event::TestRunFinished {
            success: result.success,
            duration: result.duration,
        });
        Ok(())
    }

    /// Forwards every discovered event, deciding which [`Pickle`]s to run.
    ///
    /// # Errors
    ///
    /// On the first failure to read or parse a `.feature` file.
    async fn accept<E>(
        &self,
        events: E,
        filter: &PickleFilter,
        base_directory: &Path,
    ) -> Result<Vec<Arc<Pickle>>>
    where
        E: Stream<Item = DiscoveryEvent>,
    {
        let mut accepted = Vec::new();
        pin_mut!(events);

        while let Some(ev) = events.next().await {
            self.correlator.emit(Event::from(ev.clone()));
            match ev {
                DiscoveryEvent::Attachment(a) if a.media.is_stacktrace() => {
                    return Err(Error::Parse {
                        uri: relative_uri(base_directory, &a.source.uri),
                        message: a.data,
                    });
                }
                DiscoveryEvent::Pickle(pickle) => {
                    let pickle_id = pickle.id.clone();
                    if filter.matches(&pickle) {
                        accepted.push(pickle);
                        self.correlator
                            .emit(Event::PickleAccepted { pickle_id });
                    } else {
                        self.correlator
                            .emit(Event::PickleRejected { pickle_id });
                    }
                }
                DiscoveryEvent::Source(_)
                | DiscoveryEvent::GherkinDocument(_)
                | DiscoveryEvent::Attachment(_) => {}
            }
        }

        Ok(accepted)
    }
}

/// Reorders the given `pickles` according to the [`FeaturesOrder`].
///
/// The same seed always yields the same order.
fn shuffle<T>(pickles: &mut [T], order: FeaturesOrder) {
    if order.ty != FeaturesOrderType::Random {
        return;
    }

    #[allow(clippy::cast_sign_loss)] // only the bits matter
    let mut rng = StdRng::seed_from_u64(order.seed as u64);
    let len = pickles.len();
    for i in 0..len {
        let j = i + rng.gen_range(0..len - i);
        pickles.swap(i, j);
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::{relative_uri, shuffle};
    use crate::config::{FeaturesOrder, FeaturesOrderType};

    #[test]
    fn relative_uri_strips_base() {
        let base = Path::new("/project");

        assert_eq!(
            relative_uri(base, "/project/features/a.feature"),
            "features/a.feature",
        );
        assert_eq!(relative_uri(base, "/other/b.feature"), "/other/b.feature");
    }

    #[test]
    fn shuffle_is_deterministic() {
        let shuffled = |seed| {
            let mut items = (0..20).collect::<Vec<_>>();
            let order = FeaturesOrder { ty: FeaturesOrderType::Random, seed };
            shuffle(&mut items, order);
            items
        };

        assert_eq!(shuffled(7), shuffled(7));
        assert_ne!(shuffled(7), shuffled(8));

        let mut sorted = shuffled(7);
        sorted.sort_unstable();
        assert_eq!(sorted, (0..20).collect::<Vec<_>>());
    }

    #[test]
    fn defined_order_is_kept() {
        let mut items = vec![3, 1, 2];
        shuffle(&mut items, FeaturesOrder::default());

        assert_eq!(items, [3, 1, 2]);
    }
}
