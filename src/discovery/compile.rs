// Copyright (c) 2018-2023  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Compilation of [`gherkin::Feature`]s into [`Pickle`]s.

use std::borrow::Cow;

use lazy_regex::regex;
use once_cell::sync::Lazy;
use regex::Regex;
use uuid::Uuid;

use crate::{
    message::FeatureSummary,
    pickle::{Location, PickleArgument, PickleStep},
    Pickle,
};

/// Values of a single [`Examples`] row, by their column names.
///
/// [`Examples`]: gherkin::Examples
type Row<'f> = Vec<(&'f str, &'f str)>;

/// Compiles the given [`gherkin::Feature`] into [`Pickle`]s, in definition
/// order.
///
/// Scenarios without steps produce no [`Pickle`]s. Each [`Examples`] row of
/// a [Scenario Outline][1] produces its own [`Pickle`].
///
/// [`Examples`]: gherkin::Examples
/// [1]: https://cucumber.io/docs/gherkin/reference#scenario-outline
pub(crate) fn pickles(
    feature: &gherkin::Feature,
    uri: &str,
    language: &str,
) -> Vec<Pickle> {
    let compiler = Compiler { uri, language };
    let tags = tag_names(&feature.tags);
    let background = background_steps(feature.background.as_ref());

    let mut out = Vec::new();
    for scenario in &feature.scenarios {
        compiler.scenario(&mut out, &tags, &background, scenario);
    }
    for rule in &feature.rules {
        let tags = tags
            .iter()
            .cloned()
            .chain(tag_names(&rule.tags))
            .collect::<Vec<_>>();
        let background = background
            .iter()
            .cloned()
            .chain(background_steps(rule.background.as_ref()))
            .collect::<Vec<_>>();
        for scenario in &rule.scenarios {
            compiler.scenario(&mut out, &tags, &background, scenario);
        }
    }
    out
}

/// Outlines the given [`gherkin::Feature`].
pub(crate) fn summary(feature: &gherkin::Feature) -> FeatureSummary {
    FeatureSummary {
        keyword: feature.keyword.clone(),
        name: feature.name.clone(),
        description: feature.description.clone(),
        tags: tag_names(&feature.tags),
        location: location(feature.position),
        scenarios: feature.scenarios.len()
            + feature.rules.iter().map(|r| r.scenarios.len()).sum::<usize>(),
    }
}

#[derive(Clone, Copy, Debug)]
struct Compiler<'a> {
    uri: &'a str,
    language: &'a str,
}

impl Compiler<'_> {
    fn scenario(
        &self,
        out: &mut Vec<Pickle>,
        tags: &[String],
        background: &[PickleStep],
        scenario: &gherkin::Scenario,
    ) {
        if scenario.steps.is_empty() {
            return;
        }

        let tags = tags
            .iter()
            .cloned()
            .chain(tag_names(&scenario.tags))
            .collect::<Vec<_>>();

        if scenario.examples.is_empty() {
            let steps = background
                .iter()
                .cloned()
                .chain(scenario.steps.iter().map(|s| step(s, &[], None)))
                .collect();
            out.push(self.pickle(
                scenario.name.clone(),
                tags,
                steps,
                vec![location(scenario.position)],
            ));
            return;
        }

        for examples in &scenario.examples {
            let Some(table) = &examples.table else {
                continue;
            };
            let Some((header, rows)) = table.rows.split_first() else {
                continue;
            };
            let tags = tags
                .iter()
                .cloned()
                .chain(tag_names(&examples.tags))
                .collect::<Vec<_>>();

            for (i, cells) in rows.iter().enumerate() {
                let row = header
                    .iter()
                    .map(String::as_str)
                    .zip(cells.iter().map(String::as_str))
                    .collect::<Row<'_>>();
                let row_location = Location {
                    line: table.position.line + i + 1,
                    column: table.position.col,
                };

                let steps = background
                    .iter()
                    .cloned()
                    .chain(
                        scenario
                            .steps
                            .iter()
                            .map(|s| step(s, &row, Some(row_location))),
                    )
                    .collect();
                out.push(self.pickle(
                    interpolate(&scenario.name, &row).into_owned(),
                    tags.clone(),
                    steps,
                    vec![location(scenario.position), row_location],
                ));
            }
        }
    }

    fn pickle(
        &self,
        name: String,
        tags: Vec<String>,
        steps: Vec<PickleStep>,
        locations: Vec<Location>,
    ) -> Pickle {
        Pickle {
            id: Uuid::new_v4().to_string(),
            uri: self.uri.to_owned(),
            name,
            language: self.language.to_owned(),
            tags,
            steps,
            locations,
        }
    }
}

fn background_steps(bg: Option<&gherkin::Background>) -> Vec<PickleStep> {
    bg.map(|bg| bg.steps.iter().map(|s| step(s, &[], None)).collect())
        .unwrap_or_default()
}

/// Compiles a single [`gherkin::Step`], substituting the `row` values into
/// its text and argument.
fn step(
    step: &gherkin::Step,
    row: &[(&str, &str)],
    row_location: Option<Location>,
) -> PickleStep {
    let argument = step
        .docstring
        .as_ref()
        .map(|content| PickleArgument::DocString {
            content: interpolate(content, row).into_owned(),
            content_type: None,
        })
        .or_else(|| {
            step.table.as_ref().map(|t| PickleArgument::DataTable {
                rows: t
                    .rows
                    .iter()
                    .map(|r| {
                        r.iter()
                            .map(|c| interpolate(c, row).into_owned())
                            .collect()
                    })
                    .collect(),
            })
        });

    PickleStep {
        text: interpolate(&step.value, row).into_owned(),
        argument,
        locations: row_location
            .into_iter()
            .chain([location(step.position)])
            .collect(),
    }
}

/// Replaces `<name>` placeholders with the `row` values. Placeholders without
/// a matching column are left as is.
fn interpolate<'s>(s: &'s str, row: &[(&str, &str)]) -> Cow<'s, str> {
    /// [`Regex`] matching placeholders [`Examples`] should expand into.
    ///
    /// [`Examples`]: gherkin::Examples
    static TEMPLATE_REGEX: &Lazy<Regex> = regex!(r"<([^>\s]+)>");

    if row.is_empty() {
        return Cow::Borrowed(s);
    }
    TEMPLATE_REGEX.replace_all(s, |cap: &regex::Captures<'_>| {
        let name = &cap[1];
        row.iter()
            .find_map(|(k, v)| (*k == name).then_some(*v))
            .unwrap_or(&cap[0])
            .to_owned()
    })
}

fn tag_names(tags: &[String]) -> Vec<String> {
    tags.iter()
        .map(|t| {
            if t.starts_with('@') {
                t.clone()
            } else {
                format!("@{t}")
            }
        })
        .collect()
}

const fn location(pos: gherkin::LineCol) -> Location {
    Location { line: pos.line, column: pos.col }
}
