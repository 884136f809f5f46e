// Copyright (c) 2018-2023  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Selection of [`Pickle`]s to run.

use std::collections::HashMap;

use regex::Regex;

use crate::{
    config::FeaturesFilterConfig,
    error::{Error, Result},
    tag::TagExpression,
    Pickle,
};

/// Predicate accepting a [`Pickle`] when it's located at one of the
/// configured lines, its name matches one of the configured patterns, and its
/// tags satisfy the configured tag expression.
///
/// Each of the three checks passes when it isn't configured.
#[derive(Clone, Debug)]
pub struct PickleFilter {
    /// Patterns any of which a name should match.
    names: Vec<Regex>,

    /// Lines, per URI, any of which a [`Pickle`] should be located at.
    lines: HashMap<String, Vec<usize>>,

    /// Expression tags should satisfy.
    tags: TagExpression,
}

impl PickleFilter {
    /// Builds a new [`PickleFilter`] out of the given `config`.
    ///
    /// # Errors
    ///
    /// If the tag expression doesn't parse, or any name pattern doesn't
    /// compile.
    pub fn new(config: &FeaturesFilterConfig) -> Result<Self> {
        let tags = TagExpression::parse(&config.tag_expression)?;
        let names = config
            .names
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|source| Error::NameFilter {
                    pattern: pattern.clone(),
                    source,
                })
            })
            .collect::<Result<_>>()?;

        Ok(Self { names, lines: config.lines.clone(), tags })
    }

    /// Indicates whether the given [`Pickle`] should run.
    #[must_use]
    pub fn matches(&self, pickle: &Pickle) -> bool {
        self.matches_any_line(pickle)
            && self.matches_any_name(pickle)
            && self.tags.evaluate(&pickle.tags)
    }

    fn matches_any_line(&self, pickle: &Pickle) -> bool {
        match self.lines.get(&pickle.uri) {
            None => true,
            Some(lines) if lines.is_empty() => true,
            Some(lines) => pickle
                .locations
                .iter()
                .any(|loc| lines.contains(&loc.line)),
        }
    }

    fn matches_any_name(&self, pickle: &Pickle) -> bool {
        self.names.is_empty()
            || self.names.iter().any(|re| re.is_match(&pickle.name))
    }
}
