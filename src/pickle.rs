// Copyright (c) 2018-2023  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! [Pickle]s and the values derived from them while running.
//!
//! [Pickle]: https://github.com/cucumber/messages

use derive_more::Display;
use serde::{Deserialize, Serialize};

/// Position inside a source file.
#[derive(
    Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize,
)]
pub struct Location {
    /// 1-based line number.
    pub line: usize,

    /// 1-based column number, if known.
    #[serde(default)]
    pub column: usize,
}

/// Line of a particular source file.
#[derive(
    Clone, Debug, Deserialize, Display, Eq, Hash, PartialEq, Serialize,
)]
#[display(fmt = "{}:{}", uri, line)]
pub struct SourceLocation {
    /// URI of the source file.
    pub uri: String,

    /// 1-based line number.
    pub line: usize,
}

/// One concrete scenario instance, after [Scenario Outline][1] expansion.
///
/// [1]: https://cucumber.io/docs/gherkin/reference#scenario-outline
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pickle {
    /// Unique ID of this [`Pickle`].
    pub id: String,

    /// URI of the `.feature` file this [`Pickle`] originates from.
    pub uri: String,

    /// Name of the scenario.
    pub name: String,

    /// Gherkin language of the source.
    #[serde(default)]
    pub language: String,

    /// Tag names, including the leading `@`.
    #[serde(default)]
    pub tags: Vec<String>,

    /// Steps, including the ones of any `Background`.
    #[serde(default)]
    pub steps: Vec<PickleStep>,

    /// Source positions: the scenario itself and, for an expanded outline,
    /// the `Examples` row.
    #[serde(default)]
    pub locations: Vec<Location>,
}

impl Pickle {
    /// Returns the [`SourceLocation`] of this [`Pickle`].
    #[must_use]
    pub fn source_location(&self) -> SourceLocation {
        SourceLocation {
            uri: self.uri.clone(),
            line: self.locations.first().map_or(0, |l| l.line),
        }
    }

    /// Returns the [`SourceLocation`] of the given step of this [`Pickle`].
    #[must_use]
    pub fn step_location(&self, step: &PickleStep) -> SourceLocation {
        SourceLocation {
            uri: self.uri.clone(),
            line: step.locations.last().map_or(0, |l| l.line),
        }
    }
}

/// One step of a [`Pickle`].
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PickleStep {
    /// Text of the step, without its keyword.
    pub text: String,

    /// Multiline argument, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub argument: Option<PickleArgument>,

    /// Source positions: the step itself is the last one.
    #[serde(default)]
    pub locations: Vec<Location>,
}

/// Multiline argument of a [`PickleStep`].
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PickleArgument {
    /// [Doc String][1].
    ///
    /// [1]: https://cucumber.io/docs/gherkin/reference#doc-strings
    #[serde(rename_all = "camelCase")]
    DocString {
        /// Content of the doc string.
        content: String,

        /// Declared media type, if any.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content_type: Option<String>,
    },

    /// [Data Table][1].
    ///
    /// [1]: https://cucumber.io/docs/gherkin/reference#data-tables
    DataTable {
        /// Rows of cells.
        rows: Vec<Vec<String>>,
    },
}

/// Argument captured by a step definition pattern.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternMatch {
    /// Captured values, in order.
    pub captures: Vec<String>,

    /// Name of the parameter type owning the captures. Empty for the
    /// anonymous one.
    pub parameter_type_name: String,
}

/// Candidate [Cucumber Expression][1] generated for an undefined step.
///
/// [1]: https://github.com/cucumber/cucumber-expressions
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedExpression {
    /// Source of the expression.
    pub text: String,

    /// Names of the parameter types used, in order.
    pub parameter_type_names: Vec<String>,
}
