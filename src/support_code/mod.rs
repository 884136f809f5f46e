// Copyright (c) 2018-2023  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Host-side step definitions and hooks, as known to the engine.

mod expression;
pub mod generator;
pub mod parameter;

use crate::{
    config::{
        Pattern, StepDefinitionConfig, SupportCodeConfig,
        TestCaseHookDefinitionConfig,
    },
    error::{Error, Result},
    tag::TagExpression,
    GeneratedExpression, PatternMatch, SourceLocation,
};

use self::expression::Matcher;

#[doc(inline)]
pub use self::parameter::{ParameterType, ParameterTypeRegistry};

/// Step definitions matching a step text, along with the [`PatternMatch`]es
/// of the single matching one (if it's single indeed).
pub type StepMatches<'l> =
    (Vec<&'l StepDefinition>, Option<Vec<PatternMatch>>);

/// Step definition registered by the host.
#[derive(Clone, Debug)]
pub struct StepDefinition {
    /// ID the host knows this [`StepDefinition`] by.
    pub id: String,

    /// [`Pattern`] this [`StepDefinition`] matches steps with.
    pub pattern: Pattern,

    /// File this [`StepDefinition`] is declared in.
    pub uri: Option<String>,

    /// Line this [`StepDefinition`] is declared at.
    pub line: Option<usize>,

    matcher: Matcher,
}

impl StepDefinition {
    fn new(
        config: &StepDefinitionConfig,
        registry: &ParameterTypeRegistry,
    ) -> Result<Self> {
        let matcher = Matcher::new(&config.pattern, registry).map_err(
            |reason| Error::StepPattern {
                id: config.id.clone(),
                pattern: config.pattern.source.clone(),
                reason,
            },
        )?;
        Ok(Self {
            id: config.id.clone(),
            pattern: config.pattern.clone(),
            uri: config.uri.clone(),
            line: config.line,
            matcher,
        })
    }

    /// Returns the [`SourceLocation`] of this [`StepDefinition`], if known.
    #[must_use]
    pub fn location(&self) -> Option<SourceLocation> {
        location(self.uri.as_ref(), self.line)
    }
}

/// Before or after scenario hook registered by the host.
#[derive(Clone, Debug)]
pub struct TestCaseHookDefinition {
    /// ID the host knows this [`TestCaseHookDefinition`] by.
    pub id: String,

    /// File this [`TestCaseHookDefinition`] is declared in.
    pub uri: Option<String>,

    /// Line this [`TestCaseHookDefinition`] is declared at.
    pub line: Option<usize>,

    tags: TagExpression,
}

impl TestCaseHookDefinition {
    fn new(config: &TestCaseHookDefinitionConfig) -> Result<Self> {
        Ok(Self {
            id: config.id.clone(),
            uri: config.uri.clone(),
            line: config.line,
            tags: TagExpression::parse(&config.tag_expression)?,
        })
    }

    /// Indicates whether this [`TestCaseHookDefinition`] applies to a
    /// scenario with the given `tags`.
    #[must_use]
    pub fn applies_to<S: AsRef<str>>(&self, tags: &[S]) -> bool {
        self.tags.evaluate(tags)
    }

    /// Returns the [`SourceLocation`] of this [`TestCaseHookDefinition`], if
    /// known.
    #[must_use]
    pub fn location(&self) -> Option<SourceLocation> {
        location(self.uri.as_ref(), self.line)
    }
}

fn location(
    uri: Option<&String>,
    line: Option<usize>,
) -> Option<SourceLocation> {
    Some(SourceLocation { uri: uri?.clone(), line: line? })
}

/// Everything the host registered for a run, ready for matching.
#[derive(Clone, Debug, Default)]
pub struct SupportCodeLibrary {
    registry: ParameterTypeRegistry,
    step_definitions: Vec<StepDefinition>,
    before_hooks: Vec<TestCaseHookDefinition>,
    after_hooks: Vec<TestCaseHookDefinition>,
}

impl SupportCodeLibrary {
    /// Builds a new [`SupportCodeLibrary`] out of the given `config`.
    ///
    /// # Errors
    ///
    /// If any parameter type, step definition pattern or hook tag expression
    /// is invalid.
    pub fn new(config: &SupportCodeConfig) -> Result<Self> {
        let mut registry = ParameterTypeRegistry::new();
        for ty in &config.parameter_types {
            registry.define(ty)?;
        }

        let step_definitions = config
            .step_definitions
            .iter()
            .map(|def| StepDefinition::new(def, &registry))
            .collect::<Result<_>>()?;
        let before_hooks = config
            .before_hooks
            .iter()
            .map(TestCaseHookDefinition::new)
            .collect::<Result<_>>()?;
        let after_hooks = config
            .after_hooks
            .iter()
            .map(TestCaseHookDefinition::new)
            .collect::<Result<_>>()?;

        Ok(Self { registry, step_definitions, before_hooks, after_hooks })
    }

    /// Returns the [`ParameterTypeRegistry`] of this [`SupportCodeLibrary`].
    #[must_use]
    pub const fn parameter_types(&self) -> &ParameterTypeRegistry {
        &self.registry
    }

    /// Finds all the [`StepDefinition`]s matching the given step `text`, in
    /// definition order.
    ///
    /// [`PatternMatch`]es are returned only when exactly one
    /// [`StepDefinition`] matches.
    ///
    /// # Errors
    ///
    /// If matching against any [`StepDefinition`] fails.
    pub fn matching_step_definitions(
        &self,
        text: &str,
    ) -> Result<StepMatches<'_>> {
        let mut defs = Vec::new();
        let mut matches = None;
        for def in &self.step_definitions {
            if let Some(m) = def.matcher.matches(text)? {
                defs.push(def);
                matches = (defs.len() == 1).then_some(m);
            }
        }
        Ok((defs, matches))
    }

    /// Returns the before scenario hooks applying to the given `tags`, in
    /// definition order.
    #[must_use]
    pub fn matching_before_hooks<S: AsRef<str>>(
        &self,
        tags: &[S],
    ) -> Vec<&TestCaseHookDefinition> {
        self.before_hooks.iter().filter(|h| h.applies_to(tags)).collect()
    }

    /// Returns the after scenario hooks applying to the given `tags`, in
    /// definition order.
    #[must_use]
    pub fn matching_after_hooks<S: AsRef<str>>(
        &self,
        tags: &[S],
    ) -> Vec<&TestCaseHookDefinition> {
        self.after_hooks.iter().filter(|h| h.applies_to(tags)).collect()
    }

    /// Generates candidate Cucumber Expressions for an undefined step `text`.
    #[must_use]
    pub fn generate_expressions(
        &self,
        text: &str,
    ) -> Vec<GeneratedExpression> {
        generator::generate(&self.registry, text)
    }
}

#[cfg(test)]
mod tests {
    use super::SupportCodeLibrary;
    use crate::{
        config::{
            Pattern, PatternType, StepDefinitionConfig, SupportCodeConfig,
            TestCaseHookDefinitionConfig,
        },
        Error,
    };

    fn step(id: &str, source: &str) -> StepDefinitionConfig {
        StepDefinitionConfig {
            id: id.into(),
            pattern: Pattern {
                source: source.into(),
                ty: PatternType::CucumberExpression,
            },
            uri: Some("/project/steps.js".into()),
            line: Some(3),
        }
    }

    fn hook(id: &str, tag_expression: &str) -> TestCaseHookDefinitionConfig {
        TestCaseHookDefinitionConfig {
            id: id.into(),
            tag_expression: tag_expression.into(),
            ..TestCaseHookDefinitionConfig::default()
        }
    }

    #[test]
    fn matches_single_definition() {
        let lib = SupportCodeLibrary::new(&SupportCodeConfig {
            step_definitions: vec![
                step("1", "I have {int} cukes"),
                step("2", "I eat {int} cukes"),
            ],
            ..SupportCodeConfig::default()
        })
        .unwrap();

        let (defs, matches) =
            lib.matching_step_definitions("I eat 5 cukes").unwrap();
        assert_eq!(defs.iter().map(|d| &d.id).collect::<Vec<_>>(), ["2"]);
        let matches = matches.unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].captures, ["5"]);
        assert_eq!(matches[0].parameter_type_name, "int");
    }

    #[test]
    fn partitions_into_three_outcomes() {
        let lib = SupportCodeLibrary::new(&SupportCodeConfig {
            step_definitions: vec![
                step("1", "I have {int} cukes"),
                step("2", "I have {} cukes"),
                step("3", "I eat cukes"),
            ],
            ..SupportCodeConfig::default()
        })
        .unwrap();

        let (defs, matches) =
            lib.matching_step_definitions("I sleep").unwrap();
        assert!(defs.is_empty());
        assert!(matches.is_none());

        let (defs, matches) =
            lib.matching_step_definitions("I eat cukes").unwrap();
        assert_eq!(defs.len(), 1);
        assert_eq!(matches, Some(vec![]));

        let (defs, matches) =
            lib.matching_step_definitions("I have 3 cukes").unwrap();
        assert_eq!(
            defs.iter().map(|d| &d.id).collect::<Vec<_>>(),
            ["1", "2"],
        );
        assert!(matches.is_none());
    }

    #[test]
    fn filters_hooks_by_tags() {
        let lib = SupportCodeLibrary::new(&SupportCodeConfig {
            before_hooks: vec![hook("b1", ""), hook("b2", "@db")],
            after_hooks: vec![hook("a1", "not @db")],
            ..SupportCodeConfig::default()
        })
        .unwrap();

        let ids = |hooks: Vec<&super::TestCaseHookDefinition>| {
            hooks.into_iter().map(|h| h.id.clone()).collect::<Vec<_>>()
        };
        assert_eq!(ids(lib.matching_before_hooks(&["@db"])), ["b1", "b2"]);
        assert_eq!(ids(lib.matching_before_hooks::<&str>(&[])), ["b1"]);
        assert!(lib.matching_after_hooks(&["@db"]).is_empty());
        assert_eq!(ids(lib.matching_after_hooks(&["@ui"])), ["a1"]);
    }

    #[test]
    fn construction_errors() {
        let err = SupportCodeLibrary::new(&SupportCodeConfig {
            step_definitions: vec![step("7", "I see {color}")],
            ..SupportCodeConfig::default()
        })
        .unwrap_err();
        assert!(matches!(err, Error::StepPattern { ref id, .. } if id == "7"));

        let err = SupportCodeLibrary::new(&SupportCodeConfig {
            after_hooks: vec![hook("a", "@x and")],
            ..SupportCodeConfig::default()
        })
        .unwrap_err();
        assert!(matches!(err, Error::TagExpression { .. }));
    }

    #[test]
    fn generates_expressions() {
        let lib = SupportCodeLibrary::default();
        let exprs = lib.generate_expressions("I have 3 cukes");

        assert_eq!(exprs.len(), 2);
        assert_eq!(exprs[0].text, "I have {int} cukes");
        assert_eq!(exprs[0].parameter_type_names, ["int"]);
        assert_eq!(exprs[1].text, "I have {float} cukes");
    }
}
