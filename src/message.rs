// Copyright (c) 2018-2023  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Messages exchanged with the host.
//!
//! The host sends [`Inbound`] messages: a single [`Inbound::Start`] followed
//! by [`Inbound::ActionComplete`] responses. The engine answers with
//! [`Outbound`] messages: [`Event`]s, at most one [`Outbound::Error`], and
//! requests correlated by an [`ActionId`].

use std::{sync::Arc, time::Duration};

use derive_more::{Display, From};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    config::{FeaturesConfig, RuntimeConfig, SupportCodeConfig},
    pickle::{Location, PickleArgument},
    GeneratedExpression, PatternMatch, Pickle, SourceLocation, TestResult,
};

/// Correlation ID of a request and its response.
#[derive(
    Clone, Debug, Deserialize, Display, Eq, Hash, PartialEq, Serialize,
)]
#[serde(transparent)]
pub struct ActionId(String);

impl ActionId {
    /// Generates a new random [`ActionId`].
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for ActionId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&str> for ActionId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

/// Message received from the host.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Inbound {
    /// Starts a run. Only the first one is honoured.
    Start(Box<Start>),

    /// Response to a request.
    ActionComplete(ActionComplete),
}

/// Payload of [`Inbound::Start`].
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Start {
    /// Directory reported locations are made relative to.
    pub base_directory: String,

    /// Which features to run.
    pub features_config: FeaturesConfig,

    /// How to run them.
    pub runtime_config: RuntimeConfig,

    /// What the host has registered.
    pub support_code_config: SupportCodeConfig,
}

/// Response of the host to a correlated request.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionComplete {
    /// [`ActionId`] of the request this is a response to.
    #[serde(alias = "responseTo")]
    pub completed_id: ActionId,

    /// Outcome of running a hook or a step.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<TestResult>,

    /// Snippet generated for an undefined step.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
}

impl ActionComplete {
    /// Creates a bare [`ActionComplete`] acknowledging the request with the
    /// given `id`.
    #[must_use]
    pub const fn ack(id: ActionId) -> Self {
        Self { completed_id: id, result: None, snippet: None }
    }

    /// Attaches the given [`TestResult`] to this [`ActionComplete`].
    #[must_use]
    pub fn with_result(mut self, result: TestResult) -> Self {
        self.result = Some(result);
        self
    }

    /// Attaches the given `snippet` to this [`ActionComplete`].
    #[must_use]
    pub fn with_snippet(mut self, snippet: impl Into<String>) -> Self {
        self.snippet = Some(snippet.into());
        self
    }
}

/// Message sent to the host.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Outbound {
    /// Something happened.
    Event {
        /// What happened.
        event: Event,
    },

    /// Run is aborted. Nothing follows.
    Error {
        /// Explanation.
        message: String,
    },

    /// Request to run the before run hooks.
    RunBeforeTestRunHooks {
        /// Correlation ID.
        id: ActionId,
    },

    /// Request to run the after run hooks.
    RunAfterTestRunHooks {
        /// Correlation ID.
        id: ActionId,
    },

    /// Request to set up a fresh scenario context.
    InitializeTestCase {
        /// Correlation ID.
        id: ActionId,

        /// Scenario to set up.
        pickle: Arc<Pickle>,
    },

    /// Request to run a before scenario hook.
    #[serde(rename_all = "camelCase")]
    RunBeforeTestCaseHook {
        /// Correlation ID.
        id: ActionId,

        /// Scenario the hook runs for.
        pickle_id: String,

        /// Hook to run.
        hook_id: String,
    },

    /// Request to run an after scenario hook.
    #[serde(rename_all = "camelCase")]
    RunAfterTestCaseHook {
        /// Correlation ID.
        id: ActionId,

        /// Scenario the hook runs for.
        pickle_id: String,

        /// Hook to run.
        hook_id: String,
    },

    /// Request to run a step.
    #[serde(rename_all = "camelCase")]
    RunTestStep {
        /// Correlation ID.
        id: ActionId,

        /// Scenario the step belongs to.
        pickle_id: String,

        /// Step definition to run.
        step_definition_id: String,

        /// Arguments captured from the step text.
        pattern_matches: Vec<PatternMatch>,

        /// Multiline argument of the step.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        step_argument: Option<PickleArgument>,
    },

    /// Request to render a snippet for an undefined step.
    #[serde(rename_all = "camelCase")]
    GenerateSnippet {
        /// Correlation ID.
        id: ActionId,

        /// Candidate expressions for the step.
        generated_expressions: Vec<GeneratedExpression>,

        /// Multiline argument of the step.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        step_argument: Option<PickleArgument>,
    },
}

impl Outbound {
    /// Returns the [`ActionId`] of this [`Outbound`] message, if it's a
    /// request.
    #[must_use]
    pub const fn action_id(&self) -> Option<&ActionId> {
        match self {
            Self::Event { .. } | Self::Error { .. } => None,
            Self::RunBeforeTestRunHooks { id }
            | Self::RunAfterTestRunHooks { id }
            | Self::InitializeTestCase { id, .. }
            | Self::RunBeforeTestCaseHook { id, .. }
            | Self::RunAfterTestCaseHook { id, .. }
            | Self::RunTestStep { id, .. }
            | Self::GenerateSnippet { id, .. } => Some(id),
        }
    }
}

impl From<Event> for Outbound {
    fn from(event: Event) -> Self {
        Self::Event { event }
    }
}

/// Request awaiting a response, before being stamped with an [`ActionId`].
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// [`Outbound::RunBeforeTestRunHooks`].
    RunBeforeTestRunHooks,

    /// [`Outbound::RunAfterTestRunHooks`].
    RunAfterTestRunHooks,

    /// [`Outbound::InitializeTestCase`].
    InitializeTestCase {
        /// Scenario to set up.
        pickle: Arc<Pickle>,
    },

    /// [`Outbound::RunBeforeTestCaseHook`].
    RunBeforeTestCaseHook {
        /// Scenario the hook runs for.
        pickle_id: String,

        /// Hook to run.
        hook_id: String,
    },

    /// [`Outbound::RunAfterTestCaseHook`].
    RunAfterTestCaseHook {
        /// Scenario the hook runs for.
        pickle_id: String,

        /// Hook to run.
        hook_id: String,
    },

    /// [`Outbound::RunTestStep`].
    RunTestStep {
        /// Scenario the step belongs to.
        pickle_id: String,

        /// Step definition to run.
        step_definition_id: String,

        /// Arguments captured from the step text.
        pattern_matches: Vec<PatternMatch>,

        /// Multiline argument of the step.
        step_argument: Option<PickleArgument>,
    },

    /// [`Outbound::GenerateSnippet`].
    GenerateSnippet {
        /// Candidate expressions for the step.
        generated_expressions: Vec<GeneratedExpression>,

        /// Multiline argument of the step.
        step_argument: Option<PickleArgument>,
    },
}

impl Command {
    /// Returns the wire name of this [`Command`].
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::RunBeforeTestRunHooks => "run_before_test_run_hooks",
            Self::RunAfterTestRunHooks => "run_after_test_run_hooks",
            Self::InitializeTestCase { .. } => "initialize_test_case",
            Self::RunBeforeTestCaseHook { .. } => "run_before_test_case_hook",
            Self::RunAfterTestCaseHook { .. } => "run_after_test_case_hook",
            Self::RunTestStep { .. } => "run_test_step",
            Self::GenerateSnippet { .. } => "generate_snippet",
        }
    }

    /// Stamps this [`Command`] with the given [`ActionId`].
    #[must_use]
    pub fn into_outbound(self, id: ActionId) -> Outbound {
        match self {
            Self::RunBeforeTestRunHooks => {
                Outbound::RunBeforeTestRunHooks { id }
            }
            Self::RunAfterTestRunHooks => Outbound::RunAfterTestRunHooks { id },
            Self::InitializeTestCase { pickle } => {
                Outbound::InitializeTestCase { id, pickle }
            }
            Self::RunBeforeTestCaseHook { pickle_id, hook_id } => {
                Outbound::RunBeforeTestCaseHook { id, pickle_id, hook_id }
            }
            Self::RunAfterTestCaseHook { pickle_id, hook_id } => {
                Outbound::RunAfterTestCaseHook { id, pickle_id, hook_id }
            }
            Self::RunTestStep {
                pickle_id,
                step_definition_id,
                pattern_matches,
                step_argument,
            } => Outbound::RunTestStep {
                id,
                pickle_id,
                step_definition_id,
                pattern_matches,
                step_argument,
            },
            Self::GenerateSnippet { generated_expressions, step_argument } => {
                Outbound::GenerateSnippet {
                    id,
                    generated_expressions,
                    step_argument,
                }
            }
        }
    }
}

/// Media type of a [`Source`] or an [`Attachment`].
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Media {
    /// Encoding of the data.
    pub encoding: String,

    /// MIME type of the data.
    pub content_type: String,
}

impl Media {
    /// MIME type of Gherkin sources.
    pub const GHERKIN: &'static str = "text/x.cucumber.gherkin+plain";

    /// MIME type of parse and read failures.
    pub const STACKTRACE: &'static str = "text/x.cucumber.stacktrace+plain";

    /// Creates a UTF-8 [`Media`] of the given `content_type`.
    #[must_use]
    pub fn utf8(content_type: &str) -> Self {
        Self { encoding: "UTF8".into(), content_type: content_type.into() }
    }

    /// Indicates whether this [`Media`] describes a failure stack trace.
    #[must_use]
    pub fn is_stacktrace(&self) -> bool {
        self.content_type == Self::STACKTRACE
    }
}

/// Contents of a discovered `.feature` file.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Source {
    /// URI of the file.
    pub uri: String,

    /// Raw contents.
    pub data: String,

    /// [`Media`] of the contents.
    pub media: Media,
}

/// Outline of a parsed `.feature` file.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct GherkinDocument {
    /// URI of the file.
    pub uri: String,

    /// Feature declared by the file.
    pub feature: FeatureSummary,
}

/// Outline of a `Feature`.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureSummary {
    /// Keyword, in the language of the file.
    pub keyword: String,

    /// Name of the `Feature`.
    pub name: String,

    /// Free-form description, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Tags, including the leading `@`.
    pub tags: Vec<String>,

    /// Position of the `Feature` keyword.
    pub location: Location,

    /// Number of scenarios, counting the ones inside rules.
    pub scenarios: usize,
}

/// Arbitrary data attached to a source.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Attachment {
    /// Source the data relates to.
    pub source: SourceReference,

    /// Attached data.
    pub data: String,

    /// [`Media`] of the data.
    pub media: Media,
}

/// Reference to a position inside a source file.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct SourceReference {
    /// URI of the file.
    pub uri: String,

    /// Position inside the file, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
}

/// Event produced by a [`Discover`]y source.
///
/// [`Discover`]: crate::Discover
#[derive(Clone, Debug, From, PartialEq)]
pub enum DiscoveryEvent {
    /// `.feature` file was read.
    Source(Source),

    /// `.feature` file was parsed.
    GherkinDocument(GherkinDocument),

    /// [`Pickle`] was compiled.
    Pickle(Arc<Pickle>),

    /// Something was attached to a source, like a failure to parse it.
    Attachment(Attachment),
}

impl From<DiscoveryEvent> for Event {
    fn from(ev: DiscoveryEvent) -> Self {
        match ev {
            DiscoveryEvent::Source(s) => Self::Source(s),
            DiscoveryEvent::GherkinDocument(d) => Self::GherkinDocument(d),
            DiscoveryEvent::Pickle(pickle) => Self::Pickle { pickle },
            DiscoveryEvent::Attachment(a) => Self::Attachment(a),
        }
    }
}

/// Step of a [`Event::TestCasePrepared`].
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCasePreparedStep {
    /// Location of the step inside the `.feature` file. Absent for hooks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_location: Option<SourceLocation>,

    /// Location of the hook or the single matching step definition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_location: Option<SourceLocation>,
}

/// Something that happened during a run.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Event {
    /// `.feature` file was read.
    Source(Source),

    /// `.feature` file was parsed.
    GherkinDocument(GherkinDocument),

    /// [`Pickle`] was compiled.
    Pickle {
        /// Compiled [`Pickle`].
        pickle: Arc<Pickle>,
    },

    /// Something was attached to a source.
    Attachment(Attachment),

    /// [`Pickle`] passed the filters.
    #[serde(rename_all = "camelCase")]
    PickleAccepted {
        /// ID of the [`Pickle`].
        pickle_id: String,
    },

    /// [`Pickle`] didn't pass the filters.
    #[serde(rename_all = "camelCase")]
    PickleRejected {
        /// ID of the [`Pickle`].
        pickle_id: String,
    },

    /// Run is about to execute the accepted [`Pickle`]s.
    TestRunStarted,

    /// Scenario is resolved and about to start.
    #[serde(rename_all = "camelCase")]
    TestCasePrepared {
        /// ID of the [`Pickle`].
        pickle_id: String,

        /// Location of the scenario.
        source_location: SourceLocation,

        /// Before hooks, steps, and after hooks, in execution order.
        steps: Vec<TestCasePreparedStep>,
    },

    /// Scenario started.
    #[serde(rename_all = "camelCase")]
    TestCaseStarted {
        /// ID of the [`Pickle`].
        pickle_id: String,
    },

    /// Hook or step started.
    #[serde(rename_all = "camelCase")]
    TestStepStarted {
        /// ID of the [`Pickle`].
        pickle_id: String,

        /// Index into [`Event::TestCasePrepared::steps`].
        index: usize,
    },

    /// Hook or step finished.
    #[serde(rename_all = "camelCase")]
    TestStepFinished {
        /// ID of the [`Pickle`].
        pickle_id: String,

        /// Index into [`Event::TestCasePrepared::steps`].
        index: usize,

        /// Outcome of the hook or step.
        result: TestResult,
    },

    /// Scenario finished.
    #[serde(rename_all = "camelCase")]
    TestCaseFinished {
        /// ID of the [`Pickle`].
        pickle_id: String,

        /// Aggregated outcome of the scenario.
        result: TestResult,
    },

    /// Run finished.
    TestRunFinished {
        /// Whether no scenario caused a failure.
        success: bool,

        /// Total time spent in scenarios. Transmitted as nanoseconds.
        #[serde(with = "crate::result::nanos")]
        duration: Duration,
    },
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{ActionId, Command, Event, Inbound, Outbound};
    use crate::{PatternMatch, Status, TestResult};

    #[test]
    fn deserializes_start() {
        let msg: Inbound = serde_json::from_value(json!({
            "type": "start",
            "baseDirectory": "/project",
            "runtimeConfig": {"maxParallel": 2, "isFailFast": true},
            "featuresConfig": {"absolutePaths": ["/project/features"]},
        }))
        .unwrap();

        let Inbound::Start(start) = msg else {
            panic!("expected `start`, got: {msg:?}");
        };
        assert_eq!(start.base_directory, "/project");
        assert_eq!(start.runtime_config.max_parallel, 2);
        assert!(start.runtime_config.is_fail_fast);
        assert_eq!(
            start.features_config.absolute_paths,
            ["/project/features"],
        );
        assert!(start.support_code_config.step_definitions.is_empty());
    }

    #[test]
    fn deserializes_action_complete() {
        for field in ["completedId", "responseTo"] {
            let msg: Inbound = serde_json::from_value(json!({
                "type": "action_complete",
                field: "42",
                "result": {"status": "passed", "duration": 10},
            }))
            .unwrap();

            let Inbound::ActionComplete(done) = msg else {
                panic!("expected `action_complete`, got: {msg:?}");
            };
            assert_eq!(done.completed_id, ActionId::from("42"));
            assert_eq!(done.result.unwrap().status, Status::Passed);
            assert!(done.snippet.is_none());
        }
    }

    #[test]
    fn serializes_requests() {
        let cmd = Command::RunTestStep {
            pickle_id: "p".into(),
            step_definition_id: "s".into(),
            pattern_matches: vec![PatternMatch {
                captures: vec!["5".into()],
                parameter_type_name: "int".into(),
            }],
            step_argument: None,
        };
        assert_eq!(cmd.name(), "run_test_step");

        let out = cmd.into_outbound(ActionId::from("1"));
        assert_eq!(out.action_id(), Some(&ActionId::from("1")));
        assert_eq!(
            serde_json::to_value(&out).unwrap(),
            json!({
                "type": "run_test_step",
                "id": "1",
                "pickleId": "p",
                "stepDefinitionId": "s",
                "patternMatches": [
                    {"captures": ["5"], "parameterTypeName": "int"},
                ],
            }),
        );
    }

    #[test]
    fn serializes_events() {
        let out = Outbound::from(Event::TestStepFinished {
            pickle_id: "p".into(),
            index: 2,
            result: TestResult::new(Status::Skipped),
        });
        assert_eq!(out.action_id(), None);
        assert_eq!(
            serde_json::to_value(&out).unwrap(),
            json!({
                "type": "event",
                "event": {
                    "type": "test-step-finished",
                    "pickleId": "p",
                    "index": 2,
                    "result": {"status": "skipped", "duration": 0},
                },
            }),
        );

        assert_eq!(
            serde_json::to_value(Event::TestRunStarted).unwrap(),
            json!({"type": "test-run-started"}),
        );
    }
}
