//! Scripted in-process host driving a [`Runner`].

#![allow(dead_code)]

use std::{
    fs,
    path::Path,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    task::{Context, Poll},
};

use cucumber_engine::{
    config::{
        FeaturesConfig, Pattern, PatternType, StepDefinitionConfig,
        SupportCodeConfig,
    },
    discovery,
    message::{ActionComplete, Event, Inbound, Outbound, Start},
    Runner, Status, TestResult,
};
use futures::{
    channel::mpsc,
    task::{self, ArcWake},
    StreamExt as _,
};

/// Everything a run emitted, along with some observations of the host.
#[derive(Debug, Default)]
pub struct Transcript {
    /// Every [`Outbound`] message, in emission order.
    pub messages: Vec<Outbound>,

    /// Maximum number of requests awaiting responses at once.
    pub peak: usize,
}

impl Transcript {
    /// Returns every emitted [`Event`].
    pub fn events(&self) -> impl Iterator<Item = &Event> {
        self.messages.iter().filter_map(|m| match m {
            Outbound::Event { event } => Some(event),
            _ => None,
        })
    }

    /// Returns the `success` of the emitted [`Event::TestRunFinished`].
    pub fn success(&self) -> Option<bool> {
        self.events().find_map(|ev| match ev {
            Event::TestRunFinished { success, .. } => Some(*success),
            _ => None,
        })
    }

    /// Returns the message of the emitted [`Outbound::Error`], if any.
    pub fn error(&self) -> Option<&str> {
        self.messages.iter().find_map(|m| match m {
            Outbound::Error { message } => Some(message.as_str()),
            _ => None,
        })
    }

    /// Returns the finished scenario results, in finishing order.
    pub fn scenarios(&self) -> Vec<&TestResult> {
        self.events()
            .filter_map(|ev| match ev {
                Event::TestCaseFinished { result, .. } => Some(result),
                _ => None,
            })
            .collect()
    }

    /// Returns the wire names of the emitted requests, in emission order.
    pub fn requests(&self) -> Vec<String> {
        self.messages
            .iter()
            .filter(|m| m.action_id().is_some())
            .map(|m| {
                serde_json::to_value(m).unwrap()["type"]
                    .as_str()
                    .unwrap()
                    .to_owned()
            })
            .collect()
    }

    /// Returns the names of the [`Pickle`]s in the order they were
    /// initialized.
    ///
    /// [`Pickle`]: cucumber_engine::Pickle
    pub fn initialized(&self) -> Vec<String> {
        self.messages
            .iter()
            .filter_map(|m| match m {
                Outbound::InitializeTestCase { pickle, .. } => {
                    Some(pickle.name.clone())
                }
                _ => None,
            })
            .collect()
    }
}

/// Answers every request with success, and every snippet request with
/// a fixed snippet.
pub fn passing(msg: &Outbound) -> ActionComplete {
    let ack = ActionComplete::ack(msg.action_id().unwrap().clone());
    match msg {
        Outbound::GenerateSnippet { .. } => ack.with_snippet("snippet();"),
        Outbound::RunTestStep { .. }
        | Outbound::RunBeforeTestCaseHook { .. }
        | Outbound::RunAfterTestCaseHook { .. } => {
            ack.with_result(TestResult::new(Status::Passed))
        }
        _ => ack,
    }
}

/// Records whether the engine has woken itself up.
#[derive(Debug, Default)]
struct Woken(AtomicBool);

impl ArcWake for Woken {
    fn wake_by_ref(arc_self: &Arc<Self>) {
        arc_self.0.store(true, Ordering::SeqCst);
    }
}

/// Runs the given [`Start`] to completion, answering requests with the
/// `respond` function.
///
/// Requests are answered in batches, only once the engine is pending without
/// having woken itself up, so concurrent requests pile up.
pub fn run<F>(start: Start, mut respond: F) -> Transcript
where
    F: FnMut(&Outbound) -> ActionComplete,
{
    let (tx, rx) = mpsc::unbounded();
    tx.unbounded_send(Inbound::Start(Box::new(start))).unwrap();
    let mut outbound = Runner::new(discovery::Basic).run(rx);

    let woken = Arc::new(Woken::default());
    let waker = task::waker(Arc::clone(&woken));
    let mut cx = Context::from_waker(&waker);

    let mut transcript = Transcript::default();
    let mut queue = Vec::new();
    loop {
        woken.0.store(false, Ordering::SeqCst);
        match outbound.poll_next_unpin(&mut cx) {
            Poll::Ready(Some(msg)) => {
                if msg.action_id().is_some() {
                    queue.push(respond(&msg));
                }
                transcript.messages.push(msg);
            }
            Poll::Ready(None) => break,
            Poll::Pending if woken.0.load(Ordering::SeqCst) => {}
            Poll::Pending => {
                assert!(!queue.is_empty(), "engine stalled without requests");
                transcript.peak = transcript.peak.max(queue.len());
                for response in queue.drain(..) {
                    tx.unbounded_send(Inbound::ActionComplete(response))
                        .unwrap();
                }
            }
        }
    }
    transcript
}

/// Writes the given `.feature` files into the `dir`.
pub fn write_features(dir: &Path, files: &[(&str, &str)]) {
    for (name, contents) in files {
        fs::write(dir.join(name), contents).unwrap();
    }
}

/// Creates a [`Start`] running every `.feature` file in the `dir` against
/// the given `(id, cucumber expression)` step definitions.
pub fn start(dir: &Path, steps: &[(&str, &str)]) -> Start {
    Start {
        base_directory: dir.display().to_string(),
        features_config: FeaturesConfig {
            absolute_paths: vec![dir.display().to_string()],
            ..FeaturesConfig::default()
        },
        support_code_config: SupportCodeConfig {
            step_definitions: steps
                .iter()
                .enumerate()
                .map(|(line, (id, source))| StepDefinitionConfig {
                    id: (*id).to_owned(),
                    pattern: Pattern {
                        source: (*source).to_owned(),
                        ty: PatternType::CucumberExpression,
                    },
                    uri: Some(dir.join("steps.js").display().to_string()),
                    line: Some(line + 1),
                })
                .collect(),
            ..SupportCodeConfig::default()
        },
        ..Start::default()
    }
}
