// Copyright (c) 2018-2023  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! [Parameter types][1] usable in step definition patterns.
//!
//! [1]: https://github.com/cucumber/cucumber-expressions#parameter-types

use std::collections::HashMap;

use itertools::Itertools as _;
use lazy_regex::regex;
use regex::Regex;

use crate::{
    config::ParameterTypeConfig,
    error::{Error, Result},
};

/// Named set of regular expressions a step argument is matched with.
#[derive(Clone, Debug)]
pub struct ParameterType {
    /// Name used inside `{}` of a Cucumber Expression.
    name: String,

    /// Sources of the regular expressions.
    regexps: Vec<String>,

    /// Compiled [`ParameterType::regexps`], used for snippet generation.
    matchers: Vec<Regex>,

    /// Whether this [`ParameterType`] wins a regular expression group
    /// claimed by several ones.
    prefer_for_regexp_match: bool,

    /// Whether this [`ParameterType`] is used when generating snippets.
    use_for_snippets: bool,

    /// Whether this [`ParameterType`] is known to Cucumber Expressions
    /// natively.
    is_builtin: bool,
}

impl ParameterType {
    fn builtin(
        name: &str,
        matchers: Vec<Regex>,
        prefer_for_regexp_match: bool,
        use_for_snippets: bool,
    ) -> Self {
        Self {
            name: name.to_owned(),
            regexps: matchers
                .iter()
                .map(|re| re.as_str().to_owned())
                .collect(),
            matchers,
            prefer_for_regexp_match,
            use_for_snippets,
            is_builtin: true,
        }
    }

    /// Name of this [`ParameterType`]. Empty for the anonymous one.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Sources of the regular expressions of this [`ParameterType`].
    #[must_use]
    pub fn regexps(&self) -> &[String] {
        &self.regexps
    }

    /// Indicates whether this [`ParameterType`] is preferred when matching
    /// regular expression groups.
    #[must_use]
    pub const fn prefer_for_regexp_match(&self) -> bool {
        self.prefer_for_regexp_match
    }

    /// Indicates whether this [`ParameterType`] is used for snippets.
    #[must_use]
    pub const fn use_for_snippets(&self) -> bool {
        self.use_for_snippets
    }

    pub(crate) fn matchers(&self) -> &[Regex] {
        &self.matchers
    }

    /// Regular expression matching a value of this [`ParameterType`]: all of
    /// its [`ParameterType::regexps`] as alternatives.
    pub(crate) fn pattern(&self) -> String {
        match self.regexps.as_slice() {
            [single] => single.clone(),
            many => many.iter().map(|re| format!("(?:{re})")).join("|"),
        }
    }
}

/// Ordering used for ties: preferential types first, then by name.
pub(crate) fn preference(
    a: &ParameterType,
    b: &ParameterType,
) -> std::cmp::Ordering {
    b.prefer_for_regexp_match
        .cmp(&a.prefer_for_regexp_match)
        .then_with(|| a.name.cmp(&b.name))
}

/// Registry of built-in and host-defined [`ParameterType`]s.
#[derive(Clone, Debug)]
pub struct ParameterTypeRegistry {
    /// [`ParameterType`]s in definition order.
    types: Vec<ParameterType>,

    /// Indices of [`ParameterType`]s by their name.
    by_name: HashMap<String, usize>,

    /// Indices of [`ParameterType`]s by any of their regular expressions.
    by_regexp: HashMap<String, Vec<usize>>,
}

impl Default for ParameterTypeRegistry {
    fn default() -> Self {
        let builtins = [
            ParameterType::builtin(
                "int",
                vec![
                    Regex::clone(regex!(r"-?\d+")),
                    Regex::clone(regex!(r"\d+")),
                ],
                true,
                true,
            ),
            ParameterType::builtin(
                "float",
                vec![Regex::clone(regex!(
                    r"[+-]?(?:\d+\.\d*|\d*\.\d+|\d+)(?:[eE][+-]?\d+)?"
                ))],
                false,
                true,
            ),
            ParameterType::builtin(
                "word",
                vec![Regex::clone(regex!(r"[^\s]+"))],
                false,
                false,
            ),
            ParameterType::builtin(
                "string",
                vec![Regex::clone(regex!(
                    r#""([^"\\]*(?:\\.[^"\\]*)*)"|'([^'\\]*(?:\\.[^'\\]*)*)'"#
                ))],
                false,
                true,
            ),
            ParameterType::builtin(
                "",
                vec![Regex::clone(regex!(".*"))],
                true,
                false,
            ),
        ];

        let mut registry = Self {
            types: Vec::with_capacity(builtins.len()),
            by_name: HashMap::new(),
            by_regexp: HashMap::new(),
        };
        for ty in builtins {
            registry.insert(ty);
        }
        registry
    }
}

impl ParameterTypeRegistry {
    /// Creates a new [`ParameterTypeRegistry`] with the built-in `int`,
    /// `float`, `word`, `string` and anonymous [`ParameterType`]s.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Defines a new [`ParameterType`] out of the given `config`.
    ///
    /// # Errors
    ///
    /// - If a [`ParameterType`] with the same name exists already.
    /// - If any of the regular expressions doesn't compile.
    /// - If it's preferential for a regular expression another preferential
    ///   [`ParameterType`] has already.
    pub fn define(&mut self, config: &ParameterTypeConfig) -> Result<()> {
        if self.by_name.contains_key(&config.name) {
            return Err(Error::DuplicateParameterType(config.name.clone()));
        }

        let matchers = config
            .regexps
            .iter()
            .map(|re| {
                Regex::new(re).map_err(|source| Error::ParameterTypeRegexp {
                    name: config.name.clone(),
                    regexp: re.clone(),
                    source,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        if config.prefer_for_regexp_match {
            for re in &config.regexps {
                let rival = self
                    .by_regexp
                    .get(re)
                    .into_iter()
                    .flatten()
                    .map(|&i| &self.types[i])
                    .find(|ty| ty.prefer_for_regexp_match);
                if let Some(rival) = rival {
                    return Err(Error::PreferentialParameterType {
                        regexp: re.clone(),
                        names: vec![rival.name.clone(), config.name.clone()],
                    });
                }
            }
        }

        self.insert(ParameterType {
            name: config.name.clone(),
            regexps: config.regexps.clone(),
            matchers,
            prefer_for_regexp_match: config.prefer_for_regexp_match,
            use_for_snippets: config.use_for_snippets,
            is_builtin: false,
        });
        Ok(())
    }

    fn insert(&mut self, ty: ParameterType) {
        let idx = self.types.len();
        _ = self.by_name.insert(ty.name.clone(), idx);
        for re in &ty.regexps {
            self.by_regexp.entry(re.clone()).or_default().push(idx);
        }
        self.types.push(ty);
    }

    /// Looks up a [`ParameterType`] by its `name`.
    #[must_use]
    pub fn lookup_by_name(&self, name: &str) -> Option<&ParameterType> {
        self.by_name.get(name).map(|&i| &self.types[i])
    }

    /// Looks up a [`ParameterType`] owning the given regular expression
    /// `source`.
    ///
    /// # Errors
    ///
    /// With the names of all the candidates, if several [`ParameterType`]s
    /// own the `source` and none of them is preferential.
    pub fn lookup_by_regexp(
        &self,
        source: &str,
    ) -> Result<Option<&ParameterType>, Vec<String>> {
        let mut candidates = self
            .by_regexp
            .get(source)
            .into_iter()
            .flatten()
            .map(|&i| &self.types[i])
            .collect::<Vec<_>>();
        candidates.sort_by(|a, b| preference(a, b));

        match candidates.as_slice() {
            [] => Ok(None),
            [single] => Ok(Some(*single)),
            [first, ..] if first.prefer_for_regexp_match => Ok(Some(*first)),
            many => Err(many.iter().map(|ty| ty.name.clone()).collect()),
        }
    }

    /// Returns the [`ParameterType::pattern`]s of the host-defined
    /// [`ParameterType`]s by their names.
    ///
    /// Built-in ones are omitted, as Cucumber Expressions expand them on
    /// their own.
    #[must_use]
    pub fn custom_patterns(&self) -> HashMap<&str, String> {
        self.types
            .iter()
            .filter(|ty| !ty.is_builtin)
            .map(|ty| (ty.name.as_str(), ty.pattern()))
            .collect()
    }

    /// Iterates over the [`ParameterType`]s used for snippet generation, in
    /// definition order.
    pub fn snippet_types(&self) -> impl Iterator<Item = &ParameterType> {
        self.types.iter().filter(|ty| ty.use_for_snippets)
    }
}
