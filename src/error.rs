// Copyright (c) 2018-2023  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Errors aborting a whole run.
//!
//! Scenario outcomes (failed, undefined, ambiguous steps and so on) are never
//! represented here: they are [`TestResult`]s aggregated into the run result.
//! Every [`Error`] is fatal and is reported to the host as a single
//! [`Outbound::Error`] message right before the outbound stream closes.
//!
//! [`Outbound::Error`]: crate::message::Outbound::Error
//! [`TestResult`]: crate::TestResult

use derive_more::{Display, Error};

/// Alias for a [`Result`](std::result::Result) with this crate's [`Error`].
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Fatal error of a run.
#[derive(Debug, Display, Error)]
pub enum Error {
    /// Tag expression failed to parse.
    #[display(fmt = "Invalid tag expression `{}`: {}", expression, reason)]
    TagExpression {
        /// Source of the tag expression.
        expression: String,

        /// Parser's explanation.
        reason: String,
    },

    /// Scenario name filter failed to compile.
    #[display(fmt = "Invalid name filter `{}`: {}", pattern, source)]
    NameFilter {
        /// Source of the name filter.
        pattern: String,

        /// Compilation error.
        source: regex::Error,
    },

    /// Step definition pattern failed to compile.
    #[display(
        fmt = "Invalid pattern `{}` of step definition `{}`: {}",
        pattern,
        id,
        reason
    )]
    StepPattern {
        /// ID of the step definition.
        id: String,

        /// Source of the pattern.
        pattern: String,

        /// Compiler's explanation.
        reason: String,
    },

    /// Parameter type was defined twice.
    #[display(fmt = "There is already a parameter type with name `{}`", _0)]
    DuplicateParameterType(#[error(not(source))] String),

    /// Regular expression of a parameter type failed to compile.
    #[display(
        fmt = "Invalid regular expression `{}` of parameter type `{}`: {}",
        regexp,
        name,
        source
    )]
    ParameterTypeRegexp {
        /// Name of the parameter type.
        name: String,

        /// Source of the regular expression.
        regexp: String,

        /// Compilation error.
        source: regex::Error,
    },

    /// Regular expression has more than one preferential parameter type.
    #[display(
        fmt = "There can only be one preferential parameter type per \
               regexp. The regexp `{}` is used for: {}",
        regexp,
        "names.join(\", \")"
    )]
    PreferentialParameterType {
        /// Source of the regular expression.
        regexp: String,

        /// Names of the clashing parameter types.
        names: Vec<String>,
    },

    /// Capture group of a regular expression is claimed by multiple
    /// parameter types, none of them preferential.
    #[display(
        fmt = "Your regular expression `{}` matches multiple parameter types \
               with regexp `{}`: {}",
        pattern,
        group,
        "candidates.join(\", \")"
    )]
    AmbiguousParameterType {
        /// Source of the step definition pattern.
        pattern: String,

        /// Source of the ambiguous capture group.
        group: String,

        /// Names of the candidate parameter types.
        candidates: Vec<String>,
    },

    /// Gherkin language isn't supported.
    #[display(fmt = "Unsupported Gherkin language `{}`", _0)]
    Language(#[error(not(source))] String),

    /// Source reported as unparseable by the discovery.
    #[display(fmt = "Parse error in '{}': {}", uri, message)]
    Parse {
        /// URI of the source, relative to the base directory if possible.
        uri: String,

        /// Parser's explanation.
        message: String,
    },

    /// Host answered a request with a response of the wrong shape.
    #[display(fmt = "Expected `{}` in the response to `{}`", expected, request)]
    Protocol {
        /// Kind of the request.
        request: &'static str,

        /// Missing response field.
        expected: &'static str,
    },

    /// Inbound transport closed while a response was still awaited.
    #[display(fmt = "Transport closed while awaiting a response")]
    TransportClosed,
}
