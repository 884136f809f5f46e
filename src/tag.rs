// Copyright (c) 2018-2023  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! [Tag expressions][1] over pickle tags.
//!
//! [1]: https://cucumber.io/docs/cucumber/api#tag-expressions

use gherkin::tagexpr::TagOperation;
use sealed::sealed;

use crate::error::{Error, Result};

/// Extension of a [`TagOperation`] allowing to evaluate it.
#[sealed]
pub trait Ext {
    /// Evaluates this [`TagOperation`] for the given `tags`.
    ///
    /// `tags` are expected without the leading `@`.
    #[must_use]
    fn eval<I, S>(&self, tags: I) -> bool
    where
        S: AsRef<str>,
        I: IntoIterator<Item = S> + Clone;
}

#[sealed]
impl Ext for TagOperation {
    fn eval<I, S>(&self, tags: I) -> bool
    where
        S: AsRef<str>,
        I: IntoIterator<Item = S> + Clone,
    {
        match self {
            Self::And(l, r) => l.eval(tags.clone()) & r.eval(tags),
            Self::Or(l, r) => l.eval(tags.clone()) | r.eval(tags),
            Self::Not(t) => !t.eval(tags),
            Self::Tag(t) => tags.into_iter().any(|tag| tag.as_ref() == t),
        }
    }
}

/// Parsed tag expression. An empty source is a tautology.
#[derive(Clone, Debug)]
pub struct TagExpression(Option<TagOperation>);

impl TagExpression {
    /// Parses the given tag expression `source`.
    ///
    /// # Errors
    ///
    /// If the `source` isn't a valid tag expression.
    pub fn parse(source: &str) -> Result<Self> {
        let source = source.trim();
        if source.is_empty() {
            return Ok(Self(None));
        }
        source.parse::<TagOperation>().map(|op| Self(Some(op))).map_err(|e| {
            Error::TagExpression {
                expression: source.to_owned(),
                reason: e.to_string(),
            }
        })
    }

    /// Indicates whether this [`TagExpression`] always evaluates to `true`.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_none()
    }

    /// Evaluates this [`TagExpression`] against the given tag names, with or
    /// without their leading `@`.
    #[must_use]
    pub fn evaluate<S: AsRef<str>>(&self, tags: &[S]) -> bool {
        self.0.as_ref().map_or(true, |op| {
            op.eval(tags.iter().map(|t| {
                let t = t.as_ref();
                t.strip_prefix('@').unwrap_or(t)
            }))
        })
    }
}
