// Copyright (c) 2018-2023  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Compilation of step definition [`Pattern`]s into [`Regex`]es and
//! extraction of [`PatternMatch`]es out of them.

use std::collections::HashSet;

use cucumber_expressions::{Expression, SingleExpression};
use regex::{Captures, Regex};

use super::ParameterTypeRegistry;
use crate::{
    config::{Pattern, PatternType},
    error::{Error, Result},
    PatternMatch,
};

/// Compiled step definition [`Pattern`].
#[derive(Clone, Debug)]
pub(crate) struct Matcher {
    /// Source of the [`Pattern`] this [`Matcher`] is compiled from.
    source: String,

    /// Compiled [`Regex`].
    regex: Regex,

    /// Parameters captured by the [`Matcher::regex`], or the group source and
    /// candidate parameter type names of the first ambiguous group of a
    /// regular expression.
    params: std::result::Result<Vec<Param>, (String, Vec<String>)>,
}

/// Parameter of a [`Matcher`].
#[derive(Clone, Debug)]
struct Param {
    /// Name of the parameter type.
    name: String,

    /// Top-level capture groups holding the value of this [`Param`].
    groups: Vec<Group>,
}

impl Matcher {
    /// Compiles the given [`Pattern`].
    ///
    /// # Errors
    ///
    /// With a human-readable reason, if the [`Pattern`] is malformed or refers
    /// to an unknown parameter type.
    pub(crate) fn new(
        pattern: &Pattern,
        registry: &ParameterTypeRegistry,
    ) -> std::result::Result<Self, String> {
        let (regex, params) = match pattern.ty {
            PatternType::CucumberExpression => {
                let custom = registry.custom_patterns();
                let regex = Expression::regex_with_parameters(
                    pattern.source.as_str(),
                    &custom,
                )
                .map_err(|e| e.to_string())?;
                let names = parameter_names(&pattern.source)?;
                let params = expression_params(&regex, names);
                (regex, Ok(params))
            }
            PatternType::RegularExpression => {
                let regex =
                    Regex::new(&pattern.source).map_err(|e| e.to_string())?;
                let params = regexp_params(&regex, registry);
                (regex, params)
            }
        };

        Ok(Self { source: pattern.source.clone(), regex, params })
    }

    /// Matches the given step `text`, returning one [`PatternMatch`] per
    /// parameter, or [`None`] if the `text` doesn't match.
    ///
    /// # Errors
    ///
    /// If a capture group of a regular expression is claimed by several
    /// parameter types, none of them preferential.
    pub(crate) fn matches(
        &self,
        text: &str,
    ) -> Result<Option<Vec<PatternMatch>>> {
        let params = self.params.as_ref().map_err(|(group, candidates)| {
            Error::AmbiguousParameterType {
                pattern: self.source.clone(),
                group: group.clone(),
                candidates: candidates.clone(),
            }
        })?;

        let Some(caps) = self.regex.captures(text) else {
            return Ok(None);
        };
        Ok(Some(
            params
                .iter()
                .map(|p| PatternMatch {
                    captures: p
                        .groups
                        .iter()
                        .flat_map(|g| g.values(&caps))
                        .collect(),
                    parameter_type_name: p.name.clone(),
                })
                .collect(),
        ))
    }
}

/// Returns the parameter type names of a Cucumber Expression, in order.
fn parameter_names(source: &str) -> std::result::Result<Vec<String>, String> {
    let ast = Expression::parse(source).map_err(|e| e.to_string())?;
    Ok(ast
        .0
        .iter()
        .filter_map(|e| match e {
            SingleExpression::Parameter(par) => {
                Some((*par.input.fragment()).to_owned())
            }
            SingleExpression::Alternation(_)
            | SingleExpression::Optional(_)
            | SingleExpression::Text(_)
            | SingleExpression::Whitespaces(_) => None,
        })
        .collect())
}

/// Distributes the top-level capture groups of an expanded Cucumber
/// Expression between its parameters.
///
/// A parameter with capture groups of its own gets them named as
/// `__{parameter}_{group}`. Any other parameter is a single unnamed group.
fn expression_params(regex: &Regex, names: Vec<String>) -> Vec<Param> {
    let owner = |g: &Group| {
        regex
            .capture_names()
            .nth(g.index)
            .flatten()
            .and_then(|n| n.strip_prefix("__"))
            .and_then(|n| n.split_once('_'))
            .and_then(|(id, _)| id.parse::<usize>().ok())
    };

    let groups = Group::scan(regex.as_str());
    let named = groups.iter().filter_map(owner).collect::<HashSet<_>>();
    let mut params = names
        .into_iter()
        .map(|name| Param { name, groups: Vec::new() })
        .collect::<Vec<_>>();
    let mut unnamed = (0..params.len()).filter(|id| !named.contains(id));

    for group in groups {
        let Some(id) = owner(&group).or_else(|| unnamed.next()) else {
            continue;
        };
        if let Some(param) = params.get_mut(id) {
            param.groups.push(group);
        }
    }
    params
}

/// Makes a [`Param`] of every top-level capture group of a regular
/// expression, naming it after the [`ParameterType`] owning its source.
///
/// [`ParameterType`]: super::ParameterType
fn regexp_params(
    regex: &Regex,
    registry: &ParameterTypeRegistry,
) -> std::result::Result<Vec<Param>, (String, Vec<String>)> {
    Group::scan(regex.as_str())
        .into_iter()
        .map(|group| {
            let src = group.source(regex.as_str());
            match registry.lookup_by_regexp(src) {
                Ok(ty) => Ok(Param {
                    name: ty.map(|t| t.name().to_owned()).unwrap_or_default(),
                    groups: vec![group],
                }),
                Err(candidates) => Err((src.to_owned(), candidates)),
            }
        })
        .collect()
}

/// Capture group of a [`Regex`] along with its nested capture groups.
#[derive(Clone, Debug, Eq, PartialEq)]
struct Group {
    /// Byte range of the group contents inside the [`Regex`] source.
    span: (usize, usize),

    /// Index of the group in [`Captures`].
    index: usize,

    /// Nearest nested capture groups.
    children: Vec<Group>,
}

impl Group {
    /// Scans the given valid [`Regex`] `source` for its top-level capture
    /// groups.
    ///
    /// Non-capturing groups are transparent: capture groups inside them are
    /// attached to the nearest enclosing capture group.
    fn scan(source: &str) -> Vec<Self> {
        struct Frame {
            open: Option<(usize, usize)>,
            children: Vec<Group>,
        }

        let mut stack = vec![Frame { open: None, children: Vec::new() }];
        let mut next_index = 1;
        let mut class_depth = 0_usize;
        let mut chars = source.char_indices().peekable();

        while let Some((pos, c)) = chars.next() {
            match c {
                '\\' => {
                    _ = chars.next();
                }
                '[' => {
                    if class_depth == 0 {
                        _ = chars.next_if(|&(_, c)| c == '^');
                        _ = chars.next_if(|&(_, c)| c == ']');
                    }
                    class_depth += 1;
                }
                ']' if class_depth > 0 => class_depth -= 1,
                '(' if class_depth == 0 => {
                    let rest = &source[pos + 1..];
                    let open = if !rest.starts_with('?') {
                        Some(pos + 1)
                    } else if rest.starts_with("?P<")
                        || (rest.starts_with("?<")
                            && !rest.starts_with("?<=")
                            && !rest.starts_with("?<!"))
                    {
                        rest.find('>').map(|end| pos + 1 + end + 1)
                    } else {
                        None
                    };
                    let open = open.map(|start| {
                        next_index += 1;
                        (start, next_index - 1)
                    });
                    stack.push(Frame { open, children: Vec::new() });
                }
                ')' if class_depth == 0 && stack.len() > 1 => {
                    if let Some(frame) = stack.pop() {
                        let parent = stack.last_mut().map(|f| &mut f.children);
                        if let Some(parent) = parent {
                            match frame.open {
                                Some((start, index)) => parent.push(Self {
                                    span: (start, pos),
                                    index,
                                    children: frame.children,
                                }),
                                None => parent.extend(frame.children),
                            }
                        }
                    }
                }
                _ => {}
            }
        }

        stack.into_iter().next().map(|f| f.children).unwrap_or_default()
    }

    /// Returns the contents of this [`Group`] inside the `source`.
    fn source<'s>(&self, source: &'s str) -> &'s str {
        &source[self.span.0..self.span.1]
    }

    /// Returns the values of this [`Group`]: values of the participating
    /// nested groups, if there are any, or its own value otherwise.
    fn values(&self, caps: &Captures<'_>) -> Vec<String> {
        if self.children.is_empty() {
            caps.get(self.index)
                .map(|m| m.as_str().to_owned())
                .into_iter()
                .collect()
        } else {
            self.children
                .iter()
                .filter_map(|c| caps.get(c.index))
                .map(|m| m.as_str().to_owned())
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Group, Matcher};
    use crate::{
        config::{ParameterTypeConfig, Pattern, PatternType},
        support_code::ParameterTypeRegistry,
        Error, PatternMatch,
    };

    fn expr(source: &str) -> Pattern {
        Pattern {
            source: source.into(),
            ty: PatternType::CucumberExpression,
        }
    }

    fn regexp(source: &str) -> Pattern {
        Pattern {
            source: source.into(),
            ty: PatternType::RegularExpression,
        }
    }

    fn pm(name: &str, captures: &[&str]) -> PatternMatch {
        PatternMatch {
            captures: captures.iter().map(|&c| c.to_owned()).collect(),
            parameter_type_name: name.into(),
        }
    }

    #[test]
    fn scans_nested_groups() {
        let src = r"a(b(?:c(d))[()](?P<n>e))(?:f)(g)";
        let groups = Group::scan(src);

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].index, 1);
        assert_eq!(groups[0].source(src), r"b(?:c(d))[()](?P<n>e)");
        assert_eq!(
            groups[0]
                .children
                .iter()
                .map(|g| (g.index, g.source(src)))
                .collect::<Vec<_>>(),
            [(2, "d"), (3, "e")],
        );
        assert_eq!(groups[1].index, 4);
        assert_eq!(groups[1].source(src), "g");
    }

    #[test]
    fn matches_cucumber_expression() {
        let registry = ParameterTypeRegistry::new();
        let m = Matcher::new(
            &expr("I have {int} cucumber(s) in my belly/stomach"),
            &registry,
        )
        .unwrap();

        assert_eq!(
            m.matches("I have 42 cucumbers in my stomach").unwrap(),
            Some(vec![pm("int", &["42"])]),
        );
        assert_eq!(
            m.matches("I have -1 cucumber in my belly").unwrap(),
            Some(vec![pm("int", &["-1"])]),
        );
        assert_eq!(m.matches("I have 42 cucumbers").unwrap(), None);
    }

    #[test]
    fn string_parameter_captures_nested_groups() {
        let registry = ParameterTypeRegistry::new();
        let m = Matcher::new(&expr("I say {string}"), &registry).unwrap();

        assert_eq!(
            m.matches(r#"I say "hello""#).unwrap(),
            Some(vec![pm("string", &["hello"])]),
        );
        assert_eq!(
            m.matches("I say 'bye'").unwrap(),
            Some(vec![pm("string", &["bye"])]),
        );
    }

    #[test]
    fn string_parameters_are_separate() {
        let registry = ParameterTypeRegistry::new();
        let m = Matcher::new(&expr("{string} and {string}"), &registry)
            .unwrap();

        assert_eq!(
            m.matches(r#"'fish' and "chips""#).unwrap(),
            Some(vec![pm("string", &["fish"]), pm("string", &["chips"])]),
        );
    }

    #[test]
    fn float_parameter() {
        let registry = ParameterTypeRegistry::new();
        let m = Matcher::new(&expr("it weighs {float} kg"), &registry)
            .unwrap();

        for value in ["1.5", "-.5", "+2", "1.5E+2"] {
            assert_eq!(
                m.matches(&format!("it weighs {value} kg")).unwrap(),
                Some(vec![pm("float", &[value])]),
            );
        }
    }

    #[test]
    fn custom_parameter_types() {
        let mut registry = ParameterTypeRegistry::new();
        registry
            .define(&ParameterTypeConfig {
                name: "color".into(),
                regexps: vec!["red|blue".into()],
                ..ParameterTypeConfig::default()
            })
            .unwrap();
        registry
            .define(&ParameterTypeConfig {
                name: "size".into(),
                regexps: vec![r"(\d+)x(\d+)".into()],
                ..ParameterTypeConfig::default()
            })
            .unwrap();
        let m = Matcher::new(
            &expr("a {color} box of {size} and {int} more"),
            &registry,
        )
        .unwrap();

        assert_eq!(
            m.matches("a blue box of 3x4 and 5 more").unwrap(),
            Some(vec![
                pm("color", &["blue"]),
                pm("size", &["3", "4"]),
                pm("int", &["5"]),
            ]),
        );
    }

    #[test]
    fn escapes_text() {
        let registry = ParameterTypeRegistry::new();
        let m = Matcher::new(&expr(r"a.b \(c) \{d} e*"), &registry).unwrap();

        assert!(m.matches("a.b (c) {d} e*").unwrap().is_some());
        assert!(m.matches("axb (c) {d} e*").unwrap().is_none());
        assert!(m.matches("a.b (c) {d} ee").unwrap().is_none());
    }

    #[test]
    fn anonymous_parameter() {
        let registry = ParameterTypeRegistry::new();
        let m = Matcher::new(&expr("I eat {}"), &registry).unwrap();

        assert_eq!(
            m.matches("I eat cukes").unwrap(),
            Some(vec![pm("", &["cukes"])]),
        );
    }

    #[test]
    fn rejects_unknown_parameter_type() {
        let registry = ParameterTypeRegistry::new();
        let err = Matcher::new(&expr("I see {color}"), &registry).unwrap_err();
        assert!(err.contains("color"), "{err}");
    }

    #[test]
    fn matches_regular_expression() {
        let registry = ParameterTypeRegistry::new();
        let m = Matcher::new(&regexp(r"^I have (\d+) (\w+)$"), &registry)
            .unwrap();

        assert_eq!(
            m.matches("I have 3 cukes").unwrap(),
            Some(vec![pm("int", &["3"]), pm("", &["cukes"])]),
        );
        assert_eq!(m.matches("I have cukes").unwrap(), None);
    }

    #[test]
    fn regular_expression_is_not_anchored() {
        let registry = ParameterTypeRegistry::new();
        let m = Matcher::new(&regexp("cukes"), &registry).unwrap();

        assert_eq!(m.matches("many cukes here").unwrap(), Some(vec![]));
    }

    #[test]
    fn ambiguous_regexp_group_errors() {
        let mut registry = ParameterTypeRegistry::new();
        for name in ["color", "shade"] {
            registry
                .define(&ParameterTypeConfig {
                    name: name.into(),
                    regexps: vec!["red|blue".into()],
                    ..ParameterTypeConfig::default()
                })
                .unwrap();
        }
        let m =
            Matcher::new(&regexp("^I see (red|blue)$"), &registry).unwrap();

        let err = m.matches("I see red").unwrap_err();
        assert!(matches!(
            err,
            Error::AmbiguousParameterType { ref group, ref candidates, .. }
                if group == "red|blue" && candidates == &["color", "shade"]
        ));
    }
}
