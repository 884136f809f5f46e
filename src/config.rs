// Copyright (c) 2018-2023  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Configuration of a run, as supplied by the host in the `start` message.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use smart_default::SmartDefault;

/// Run-wide switches.
#[derive(
    Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize, SmartDefault,
)]
#[serde(default, rename_all = "camelCase")]
pub struct RuntimeConfig {
    /// Skip every scenario dispatched after the first failing one.
    pub is_fail_fast: bool,

    /// Skip every hook and step, only reporting what would run.
    pub is_dry_run: bool,

    /// Treat `pending` scenarios as failures.
    pub is_strict: bool,

    /// Maximum number of concurrently running scenarios.
    ///
    /// Any value `<= 0` means "all at once" (both `0` and `-1` are used by
    /// hosts for this), while `1` runs scenarios sequentially.
    #[default = 1]
    pub max_parallel: i64,
}

impl RuntimeConfig {
    /// Indicates whether more than one scenario may run at a time.
    #[must_use]
    pub const fn is_parallel(&self) -> bool {
        self.max_parallel <= 0 || self.max_parallel > 1
    }

    /// Number of scenarios to keep running at once, given `total` ones.
    #[must_use]
    pub fn concurrency(&self, total: usize) -> usize {
        usize::try_from(self.max_parallel)
            .ok()
            .filter(|max| *max > 0)
            .map_or(total, |max| max.min(total))
    }
}

/// Which `.feature` files to run, and how.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FeaturesConfig {
    /// Absolute paths to `.feature` files or directories containing them.
    pub absolute_paths: Vec<String>,

    /// Default Gherkin language. Empty means English.
    pub language: String,

    /// Order to run the accepted pickles in.
    pub order: FeaturesOrder,

    /// Filters selecting the pickles to run.
    pub filters: FeaturesFilterConfig,
}

/// Order of running pickles.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct FeaturesOrder {
    /// Kind of the order.
    #[serde(rename = "type")]
    pub ty: FeaturesOrderType,

    /// Seed of a [`FeaturesOrderType::Random`] order.
    pub seed: i64,
}

/// Kind of a [`FeaturesOrder`].
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FeaturesOrderType {
    /// Order of definition.
    #[default]
    Defined,

    /// Deterministic shuffle driven by [`FeaturesOrder::seed`].
    Random,
}

/// Filters selecting pickles to run.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FeaturesFilterConfig {
    /// [Tag expression][1]. Empty accepts everything.
    ///
    /// [1]: https://cucumber.io/docs/cucumber/api#tag-expressions
    pub tag_expression: String,

    /// Regular expressions, any of which a pickle's name has to match.
    pub names: Vec<String>,

    /// Lines, per URI, any of which a pickle has to be located at.
    pub lines: HashMap<String, Vec<usize>>,
}

/// Step definitions, hooks and parameter types registered by the host.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SupportCodeConfig {
    /// Step definitions, in definition order.
    pub step_definitions: Vec<StepDefinitionConfig>,

    /// Hooks to run before each matching scenario.
    #[serde(alias = "beforeTestCaseHookDefinitions")]
    pub before_hooks: Vec<TestCaseHookDefinitionConfig>,

    /// Hooks to run after each matching scenario.
    #[serde(alias = "afterTestCaseHookDefinitions")]
    pub after_hooks: Vec<TestCaseHookDefinitionConfig>,

    /// Custom parameter types.
    pub parameter_types: Vec<ParameterTypeConfig>,
}

/// Descriptor of a host-side step definition.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StepDefinitionConfig {
    /// ID the host knows this step definition by.
    pub id: String,

    /// Pattern steps are matched against.
    pub pattern: Pattern,

    /// File the step definition is declared in.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,

    /// Line the step definition is declared at.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
}

/// Step definition pattern.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct Pattern {
    /// Source of the pattern.
    pub source: String,

    /// Syntax of the [`Pattern::source`].
    #[serde(rename = "type")]
    pub ty: PatternType,
}

/// Syntax of a [`Pattern`].
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternType {
    /// [Cucumber Expression][1].
    ///
    /// [1]: https://github.com/cucumber/cucumber-expressions
    #[default]
    CucumberExpression,

    /// Regular expression.
    RegularExpression,
}

/// Descriptor of a host-side before/after scenario hook.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TestCaseHookDefinitionConfig {
    /// ID the host knows this hook by.
    pub id: String,

    /// [Tag expression][1] gating this hook. Empty matches every scenario.
    ///
    /// [1]: https://cucumber.io/docs/cucumber/api#tag-expressions
    pub tag_expression: String,

    /// File the hook is declared in.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,

    /// Line the hook is declared at.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
}

/// Custom [parameter type][1].
///
/// [1]: https://github.com/cucumber/cucumber-expressions#custom-parameter-types
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ParameterTypeConfig {
    /// Name used inside `{}` of a Cucumber Expression.
    pub name: String,

    /// Regular expressions matching values of this parameter type.
    #[serde(alias = "regularExpressions")]
    pub regexps: Vec<String>,

    /// Prefer this type when a regular expression group matches several.
    pub prefer_for_regexp_match: bool,

    /// Use this type when generating snippets.
    pub use_for_snippets: bool,
}

#[cfg(test)]
mod tests {
    use super::{FeaturesOrderType, RuntimeConfig, SupportCodeConfig};

    #[test]
    fn unbounded_concurrency() {
        for max_parallel in [-1, 0] {
            let cfg =
                RuntimeConfig { max_parallel, ..RuntimeConfig::default() };
            assert!(cfg.is_parallel());
            assert_eq!(cfg.concurrency(5), 5);
        }
    }

    #[test]
    fn bounded_concurrency() {
        let cfg = RuntimeConfig { max_parallel: 2, ..RuntimeConfig::default() };
        assert!(cfg.is_parallel());
        assert_eq!(cfg.concurrency(5), 2);
        assert_eq!(cfg.concurrency(1), 1);

        assert!(!RuntimeConfig::default().is_parallel());
    }

    #[test]
    fn deserializes_camel_case_with_defaults() {
        let cfg: RuntimeConfig =
            serde_json::from_str(r#"{"isStrict": true}"#).unwrap();
        assert!(cfg.is_strict);
        assert_eq!(cfg.max_parallel, 1);

        let order: super::FeaturesOrder =
            serde_json::from_str(r#"{"type": "random", "seed": 7}"#).unwrap();
        assert_eq!(order.ty, FeaturesOrderType::Random);
        assert_eq!(order.seed, 7);
    }

    #[test]
    fn accepts_legacy_hook_field_names() {
        let cfg: SupportCodeConfig = serde_json::from_str(
            r#"{"beforeTestCaseHookDefinitions": [{"id": "h1"}]}"#,
        )
        .unwrap();
        assert_eq!(cfg.before_hooks.len(), 1);
        assert_eq!(cfg.before_hooks[0].id, "h1");
        assert!(cfg.before_hooks[0].tag_expression.is_empty());
    }
}
