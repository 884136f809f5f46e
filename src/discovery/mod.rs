// Copyright (c) 2018-2023  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Tools for discovering [`Pickle`]s.
//!
//! [`Pickle`]: crate::Pickle

pub mod basic;
mod compile;

use futures::Stream;

use crate::{config::FeaturesConfig, error::Result, message::DiscoveryEvent};

#[doc(inline)]
pub use self::basic::Basic;

/// Source of [`Pickle`]s to run.
///
/// Any failure to read or parse a source is reported as an
/// [`Attachment`] with the [`Media::STACKTRACE`] content type, which aborts
/// the run.
///
/// [`Attachment`]: crate::message::Attachment
/// [`Media::STACKTRACE`]: crate::message::Media::STACKTRACE
/// [`Pickle`]: crate::Pickle
pub trait Discover {
    /// Output events of this [`Discover`]y.
    type Output: Stream<Item = DiscoveryEvent> + 'static;

    /// Starts discovering the [`Pickle`]s described by the given `config`.
    ///
    /// # Errors
    ///
    /// If the `config` itself is invalid, like naming an unsupported
    /// language.
    ///
    /// [`Pickle`]: crate::Pickle
    fn discover(&self, config: &FeaturesConfig) -> Result<Self::Output>;
}
