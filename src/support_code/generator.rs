// Copyright (c) 2018-2023  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Generation of Cucumber Expressions for undefined steps.

use itertools::Itertools as _;
use regex::Regex;

use super::{parameter, ParameterType, ParameterTypeRegistry};
use crate::GeneratedExpression;

/// Maximum number of [`GeneratedExpression`]s returned for a single step.
pub const MAX_EXPRESSIONS: usize = 256;

/// Match of a single [`ParameterType`] regular expression inside a text.
#[derive(Clone, Copy, Debug)]
struct Found<'r> {
    ty: &'r ParameterType,
    start: usize,
    end: usize,
}

/// Finds the first match of `re` in `text` starting at or after `pos`, which
/// is bounded by word boundaries on both sides.
fn find_word<'r>(
    ty: &'r ParameterType,
    re: &Regex,
    text: &str,
    mut pos: usize,
) -> Option<Found<'r>> {
    let is_boundary =
        |c: char| c.is_whitespace() || c.is_ascii_punctuation();

    while pos < text.len() {
        let m = re.find_at(text, pos)?;
        let starts_word =
            text[..m.start()].chars().next_back().map_or(true, is_boundary);
        let ends_word =
            text[m.end()..].chars().next().map_or(true, is_boundary);
        if m.start() < m.end() && starts_word && ends_word {
            return Some(Found { ty, start: m.start(), end: m.end() });
        }
        pos = text[m.start()..]
            .chars()
            .next()
            .map_or(text.len(), |c| m.start() + c.len_utf8());
    }
    None
}

/// Escapes the characters of a step `text` having a special meaning in
/// Cucumber Expressions.
fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '(' | '{' | '/') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Generates Cucumber Expressions matching the given step `text`, using the
/// [`ParameterType`]s marked for snippets.
///
/// Every leftmost-longest [`ParameterType`] match becomes a parameter. When
/// several [`ParameterType`]s match the same span, one expression is produced
/// per combination, preferential ones first, up to [`MAX_EXPRESSIONS`].
#[must_use]
pub fn generate(
    registry: &ParameterTypeRegistry,
    text: &str,
) -> Vec<GeneratedExpression> {
    let matchers = registry
        .snippet_types()
        .flat_map(|ty| ty.matchers().iter().map(move |re| (ty, re)))
        .collect::<Vec<_>>();

    let mut literals = Vec::new();
    let mut choices: Vec<Vec<&ParameterType>> = Vec::new();
    let mut pos = 0;

    while pos < text.len() {
        let found = matchers
            .iter()
            .filter_map(|(ty, re)| find_word(ty, re, text, pos))
            .collect::<Vec<_>>();
        let Some(best) = found
            .iter()
            .min_by(|a, b| a.start.cmp(&b.start).then(b.end.cmp(&a.end)))
            .copied()
        else {
            break;
        };

        let mut tied = found
            .iter()
            .filter(|f| f.start == best.start && f.end == best.end)
            .map(|f| f.ty)
            .collect::<Vec<_>>();
        tied.sort_by(|a, b| parameter::preference(a, b));
        tied.dedup_by(|a, b| a.name() == b.name());

        literals.push(escape(&text[pos..best.start]));
        choices.push(tied);
        pos = best.end;
    }
    let tail = escape(&text[pos..]);

    if choices.is_empty() {
        return vec![render(&literals, &tail, &[])];
    }
    choices
        .iter()
        .map(|tied| tied.iter())
        .multi_cartesian_product()
        .take(MAX_EXPRESSIONS)
        .map(|types| render(&literals, &tail, &types))
        .collect()
}

fn render(
    literals: &[String],
    tail: &str,
    types: &[&&ParameterType],
) -> GeneratedExpression {
    let mut text = String::new();
    for (literal, ty) in literals.iter().zip(types) {
        text.push_str(literal);
        text.push('{');
        text.push_str(ty.name());
        text.push('}');
    }
    text.push_str(tail);

    GeneratedExpression {
        text,
        parameter_type_names: types
            .iter()
            .map(|ty| ty.name().to_owned())
            .collect(),
    }
}
