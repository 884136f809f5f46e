// Copyright (c) 2018-2023  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Execution of a single scenario.

use std::{path::Path, sync::Arc};

use crate::{
    error::{Error, Result},
    message::{Command, Event, TestCasePreparedStep},
    support_code::{StepDefinition, StepMatches, TestCaseHookDefinition},
    Pickle, Status, TestResult,
};

use super::{relative_uri, Context};

/// Unit of a scenario, executed in order.
#[derive(Clone, Copy, Debug)]
enum Unit<'c> {
    /// Before scenario hook.
    BeforeHook(&'c TestCaseHookDefinition),

    /// Step, by its index in [`Pickle::steps`].
    Step(usize),

    /// After scenario hook.
    AfterHook(&'c TestCaseHookDefinition),
}

/// Runner of a single [`Pickle`], resolved against the support code of a
/// run.
pub(crate) struct TestCaseRunner<'c> {
    /// Run this scenario belongs to.
    ctx: &'c Context,

    /// Scenario to run.
    pickle: Arc<Pickle>,

    /// Whether every unit is to be reported as [`Status::Skipped`] without
    /// involving the host.
    is_skipped: bool,

    /// Before hooks applying to the [`Pickle`].
    before_hooks: Vec<&'c TestCaseHookDefinition>,

    /// After hooks applying to the [`Pickle`].
    after_hooks: Vec<&'c TestCaseHookDefinition>,

    /// Matching step definitions of each of the [`Pickle::steps`].
    steps: Vec<StepMatches<'c>>,

    /// Running aggregated result.
    result: TestResult,
}

impl<'c> TestCaseRunner<'c> {
    /// Resolves the given [`Pickle`] against the support code of the run.
    ///
    /// # Errors
    ///
    /// If matching any step of the [`Pickle`] fails.
    pub(crate) fn new(
        ctx: &'c Context,
        pickle: Arc<Pickle>,
        is_skipped: bool,
    ) -> Result<Self> {
        let steps = pickle
            .steps
            .iter()
            .map(|step| ctx.library.matching_step_definitions(&step.text))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            before_hooks: ctx.library.matching_before_hooks(&pickle.tags),
            after_hooks: ctx.library.matching_after_hooks(&pickle.tags),
            steps,
            result: TestResult::new(if is_skipped {
                Status::Skipped
            } else {
                Status::Passed
            }),
            ctx,
            pickle,
            is_skipped,
        })
    }

    /// Runs the scenario, returning its aggregated [`TestResult`].
    ///
    /// # Errors
    ///
    /// If the host doesn't answer a request properly.
    pub(crate) async fn run(mut self) -> Result<TestResult> {
        self.emit(Event::TestCasePrepared {
            pickle_id: self.pickle.id.clone(),
            source_location: self.pickle.source_location(),
            steps: self.prepared_steps(),
        });
        self.emit(Event::TestCaseStarted { pickle_id: self.pickle.id.clone() });

        if !self.is_skipped {
            let pickle = Arc::clone(&self.pickle);
            _ = self
                .ctx
                .correlator
                .send_and_await(Command::InitializeTestCase { pickle })
                .await?;
        }

        for (index, unit) in self.units().into_iter().enumerate() {
            self.emit(Event::TestStepStarted {
                pickle_id: self.pickle.id.clone(),
                index,
            });
            let result = self.execute(unit).await?;
            tracing::debug!(index, status = %result.status, "unit finished");
            self.emit(Event::TestStepFinished {
                pickle_id: self.pickle.id.clone(),
                index,
                result: result.clone(),
            });
            self.result.aggregate(&result);
        }

        self.emit(Event::TestCaseFinished {
            pickle_id: self.pickle.id.clone(),
            result: self.result.clone(),
        });
        Ok(self.result)
    }

    fn emit(&self, event: Event) {
        self.ctx.correlator.emit(event);
    }

    /// Lists the units of the scenario in execution order.
    fn units(&self) -> Vec<Unit<'c>> {
        self.before_hooks
            .iter()
            .copied()
            .map(Unit::BeforeHook)
            .chain((0..self.pickle.steps.len()).map(Unit::Step))
            .chain(self.after_hooks.iter().copied().map(Unit::AfterHook))
            .collect()
    }

    /// Describes the units of the scenario for [`Event::TestCasePrepared`].
    fn prepared_steps(&self) -> Vec<TestCasePreparedStep> {
        let hook = |h: &&TestCaseHookDefinition| TestCasePreparedStep {
            source_location: None,
            action_location: h.location(),
        };
        let steps = self.pickle.steps.iter().zip(&self.steps).map(
            |(step, (defs, _))| TestCasePreparedStep {
                source_location: Some(self.pickle.step_location(step)),
                action_location: match defs.as_slice() {
                    [def] => def.location(),
                    _ => None,
                },
            },
        );

        self.before_hooks
            .iter()
            .map(hook)
            .chain(steps)
            .chain(self.after_hooks.iter().map(hook))
            .collect()
    }

    /// Executes a single [`Unit`], taking the scenario result so far into
    /// account.
    async fn execute(&self, unit: Unit<'c>) -> Result<TestResult> {
        let is_running = self.result.status == Status::Passed;
        let pickle_id = self.pickle.id.clone();

        match unit {
            _ if self.is_skipped => Ok(TestResult::new(Status::Skipped)),
            Unit::BeforeHook(_) if !is_running => {
                Ok(TestResult::new(Status::Skipped))
            }
            Unit::BeforeHook(hook) => {
                self.request_result(Command::RunBeforeTestCaseHook {
                    pickle_id,
                    hook_id: hook.id.clone(),
                })
                .await
            }
            Unit::AfterHook(hook) => {
                self.request_result(Command::RunAfterTestCaseHook {
                    pickle_id,
                    hook_id: hook.id.clone(),
                })
                .await
            }
            Unit::Step(index) => self.execute_step(index, is_running).await,
        }
    }

    async fn execute_step(
        &self,
        index: usize,
        is_running: bool,
    ) -> Result<TestResult> {
        let step = &self.pickle.steps[index];
        let (defs, matches) = &self.steps[index];

        match defs.as_slice() {
            [] => {
                let cmd = Command::GenerateSnippet {
                    generated_expressions: self
                        .ctx
                        .library
                        .generate_expressions(&step.text),
                    step_argument: step.argument.clone(),
                };
                let request = cmd.name();
                let snippet = self
                    .ctx
                    .correlator
                    .send_and_await(cmd)
                    .await?
                    .snippet
                    .ok_or(Error::Protocol { request, expected: "snippet" })?;
                Ok(TestResult::new(Status::Undefined)
                    .with_message(undefined_message(&snippet)))
            }
            [_] if !is_running => Ok(TestResult::new(Status::Skipped)),
            [def] => {
                self.request_result(Command::RunTestStep {
                    pickle_id: self.pickle.id.clone(),
                    step_definition_id: def.id.clone(),
                    pattern_matches: matches.clone().unwrap_or_default(),
                    step_argument: step.argument.clone(),
                })
                .await
            }
            many => Ok(TestResult::new(Status::Ambiguous).with_message(
                ambiguous_message(many, &self.ctx.base_directory),
            )),
        }
    }

    /// Sends the given [`Command`] and extracts the [`TestResult`] out of its
    /// response.
    async fn request_result(&self, cmd: Command) -> Result<TestResult> {
        let request = cmd.name();
        self.ctx
            .correlator
            .send_and_await(cmd)
            .await?
            .result
            .ok_or(Error::Protocol { request, expected: "result" })
    }
}

/// Renders the message of an undefined step out of the host's `snippet`.
fn undefined_message(snippet: &str) -> String {
    format!(
        "Undefined. Implement with the following snippet:\n\n  {}",
        snippet.replace('\n', "\n  "),
    )
}

/// Renders the message of an ambiguous step: one line per candidate
/// [`StepDefinition`], with patterns aligned in a column.
fn ambiguous_message(defs: &[&StepDefinition], base_dir: &Path) -> String {
    let rows = defs
        .iter()
        .map(|def| {
            let location = def
                .location()
                .map(|loc| {
                    format!("{}:{}", relative_uri(base_dir, &loc.uri), loc.line)
                })
                .unwrap_or_default();
            (format!("'{}'", def.pattern.source), location)
        })
        .collect::<Vec<_>>();
    let width = rows.iter().map(|(p, _)| p.chars().count()).max().unwrap_or(0);

    let mut msg = String::from("Multiple step definitions match:\n");
    for (pattern, location) in rows {
        let line = format!("  {pattern:<width$} - {location}");
        msg.push_str(line.trim_end());
        msg.push('\n');
    }
    msg
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::{ambiguous_message, undefined_message};
    use crate::{
        config::{Pattern, StepDefinitionConfig, SupportCodeConfig},
        support_code::SupportCodeLibrary,
    };

    #[test]
    fn undefined_message_indents_snippet() {
        assert_eq!(
            undefined_message("Given('a', function() {\n  // code\n});"),
            "Undefined. Implement with the following snippet:\n\n  \
             Given('a', function() {\n    // code\n  });",
        );
    }

    #[test]
    fn ambiguous_message_aligns_patterns() {
        let def = |id: &str, source: &str, uri: Option<&str>| {
            StepDefinitionConfig {
                id: id.into(),
                pattern: Pattern {
                    source: source.into(),
                    ..Pattern::default()
                },
                uri: uri.map(Into::into),
                line: uri.map(|_| 4),
            }
        };
        let lib = SupportCodeLibrary::new(&SupportCodeConfig {
            step_definitions: vec![
                def("1", "a {int} step", Some("/project/steps/a.js")),
                def("2", "a {} step", Some("/elsewhere/b.js")),
                def("3", "{}", None),
            ],
            ..SupportCodeConfig::default()
        })
        .unwrap();
        let (defs, _) = lib.matching_step_definitions("a 1 step").unwrap();

        assert_eq!(
            ambiguous_message(&defs, Path::new("/project")),
            "Multiple step definitions match:\n  \
             'a {int} step' - steps/a.js:4\n  \
             'a {} step'    - /elsewhere/b.js:4\n  \
             '{}'           -\n",
        );
    }
}
