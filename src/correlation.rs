// Copyright (c) 2018-2023  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Correlation of outbound requests with inbound responses.

use std::{
    collections::HashMap,
    sync::{PoisonError, RwLock},
};

use futures::{channel::mpsc, StreamExt as _};

use crate::{
    error::{Error, Result},
    message::{ActionComplete, ActionId, Command, Outbound},
};

/// Waiters registered by [`Correlator::send_and_await()`].
#[derive(Debug, Default)]
struct Pending {
    /// Response senders by the [`ActionId`] of their request.
    waiters: HashMap<ActionId, mpsc::UnboundedSender<ActionComplete>>,

    /// Whether no more responses can arrive.
    closed: bool,
}

/// Emitter of [`Outbound`] messages, routing responses back to the awaiting
/// requests.
///
/// Any number of requests may await their responses concurrently.
#[derive(Debug)]
pub struct Correlator {
    /// Sender of [`Outbound`] messages.
    outbound: mpsc::UnboundedSender<Outbound>,

    /// Requests awaiting responses.
    pending: RwLock<Pending>,
}

impl Correlator {
    /// Creates a new [`Correlator`] emitting into the given `outbound`
    /// channel.
    #[must_use]
    pub fn new(outbound: mpsc::UnboundedSender<Outbound>) -> Self {
        Self { outbound, pending: RwLock::new(Pending::default()) }
    }

    /// Emits the given message, never blocking.
    ///
    /// Messages emitted after the outbound side is gone are dropped.
    pub fn emit(&self, msg: impl Into<Outbound>) {
        _ = self.outbound.unbounded_send(msg.into());
    }

    /// Emits the given [`Command`] stamped with a fresh [`ActionId`] and
    /// waits for its response.
    ///
    /// # Errors
    ///
    /// With [`Error::TransportClosed`] if the inbound side is closed before
    /// the response arrives.
    pub async fn send_and_await(
        &self,
        cmd: Command,
    ) -> Result<ActionComplete> {
        let id = ActionId::new();
        let (tx, mut rx) = mpsc::unbounded();
        {
            let mut pending =
                self.pending.write().unwrap_or_else(PoisonError::into_inner);
            if pending.closed {
                return Err(Error::TransportClosed);
            }
            _ = pending.waiters.insert(id.clone(), tx);
        }

        tracing::debug!(%id, request = cmd.name(), "awaiting response");
        self.emit(cmd.into_outbound(id.clone()));
        let response = rx.next().await;

        _ = self
            .pending
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .waiters
            .remove(&id);

        response.ok_or(Error::TransportClosed)
    }

    /// Delivers the given response to the request awaiting it.
    ///
    /// Responses nobody awaits are dropped.
    pub fn deliver(&self, response: ActionComplete) {
        let pending =
            self.pending.read().unwrap_or_else(PoisonError::into_inner);
        if let Some(tx) = pending.waiters.get(&response.completed_id) {
            _ = tx.unbounded_send(response);
        } else {
            tracing::debug!(
                id = %response.completed_id,
                "dropping response to unknown request",
            );
        }
    }

    /// Marks the inbound side as closed, releasing every awaiting request
    /// with [`Error::TransportClosed`] and rejecting new ones.
    pub fn close(&self) {
        let mut pending =
            self.pending.write().unwrap_or_else(PoisonError::into_inner);
        pending.closed = true;
        pending.waiters.clear();
    }

    /// Closes the outbound side, so nothing is emitted anymore.
    ///
    /// Messages emitted before are still delivered.
    pub fn finish(&self) {
        self.outbound.close_channel();
    }

    /// Returns the number of requests awaiting their responses.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.pending
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .waiters
            .len()
    }
}

#[cfg(test)]
mod tests {
    use futures::{channel::mpsc, pin_mut, FutureExt as _, StreamExt as _};

    use super::Correlator;
    use crate::{
        message::{ActionComplete, ActionId, Command, Event, Outbound},
        Error, Status, TestResult,
    };

    #[test]
    fn routes_response_to_its_request() {
        let (tx, mut rx) = mpsc::unbounded();
        let corr = Correlator::new(tx);

        let first = corr.send_and_await(Command::RunBeforeTestRunHooks);
        let second = corr.send_and_await(Command::RunAfterTestRunHooks);
        pin_mut!(first, second);
        assert!((&mut first).now_or_never().is_none());
        assert!((&mut second).now_or_never().is_none());
        assert_eq!(corr.pending(), 2);

        let out1 = rx.next().now_or_never().flatten().unwrap();
        let out2 = rx.next().now_or_never().flatten().unwrap();
        assert!(matches!(out1, Outbound::RunBeforeTestRunHooks { .. }));
        assert!(matches!(out2, Outbound::RunAfterTestRunHooks { .. }));
        let id1 = out1.action_id().cloned().unwrap();
        let id2 = out2.action_id().cloned().unwrap();
        assert_ne!(id1, id2);

        corr.deliver(ActionComplete::ack(ActionId::from("unknown")));
        corr.deliver(
            ActionComplete::ack(id2.clone())
                .with_result(TestResult::new(Status::Failed)),
        );
        assert!((&mut first).now_or_never().is_none());

        let done = second.now_or_never().unwrap().unwrap();
        assert_eq!(done.completed_id, id2);
        assert_eq!(done.result.unwrap().status, Status::Failed);
        assert_eq!(corr.pending(), 1);

        corr.deliver(ActionComplete::ack(id1.clone()));
        let done = first.now_or_never().unwrap().unwrap();
        assert_eq!(done.completed_id, id1);
        assert_eq!(corr.pending(), 0);
    }

    #[test]
    fn close_releases_waiters() {
        let (tx, _rx) = mpsc::unbounded();
        let corr = Correlator::new(tx);

        let waiting = corr.send_and_await(Command::RunBeforeTestRunHooks);
        pin_mut!(waiting);
        assert!((&mut waiting).now_or_never().is_none());

        corr.close();
        let res = waiting.now_or_never().unwrap();
        assert!(matches!(res, Err(Error::TransportClosed)));

        let res = corr
            .send_and_await(Command::RunAfterTestRunHooks)
            .now_or_never()
            .unwrap();
        assert!(matches!(res, Err(Error::TransportClosed)));
        assert_eq!(corr.pending(), 0);
    }

    #[test]
    fn finish_ends_outbound_after_buffered_messages() {
        let (tx, rx) = mpsc::unbounded();
        let corr = Correlator::new(tx);

        corr.emit(Event::TestRunStarted);
        corr.finish();
        corr.emit(Event::TestRunStarted);

        let out = rx.collect::<Vec<_>>().now_or_never().unwrap();
        assert_eq!(out, [Outbound::from(Event::TestRunStarted)]);
    }
}
