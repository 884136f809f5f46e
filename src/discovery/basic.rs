// Copyright (c) 2018-2023  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Default [`Discover`] implementation.

use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use futures::{stream, StreamExt as _};

use crate::{
    config::FeaturesConfig,
    error::{Error, Result},
    message::{
        Attachment, DiscoveryEvent, GherkinDocument, Media, Source,
        SourceReference,
    },
};

use super::{compile, Discover};

/// Language assumed when none is configured.
const DEFAULT_LANGUAGE: &str = "en";

/// Default [`Discover`]y of `.feature` files on the local file system.
///
/// Every configured path is either a `.feature` file, or a directory walked
/// recursively for them.
///
/// As there is no async runtime-agnostic way to interact with io, this
/// [`Discover`]y is blocking.
#[derive(Clone, Copy, Debug, Default)]
pub struct Basic;

impl Discover for Basic {
    type Output = stream::LocalBoxStream<'static, DiscoveryEvent>;

    fn discover(&self, config: &FeaturesConfig) -> Result<Self::Output> {
        let language = if config.language.is_empty() {
            DEFAULT_LANGUAGE.to_owned()
        } else {
            config.language.clone()
        };
        _ = gherkin::GherkinEnv::new(&language)
            .map_err(|_| Error::Language(language.clone()))?;

        let paths = config
            .absolute_paths
            .iter()
            .map(PathBuf::from)
            .collect::<Vec<_>>();

        Ok(stream::iter(paths)
            .flat_map(move |path| stream::iter(load_path(&path, &language)))
            .boxed_local())
    }
}

/// Loads a single configured path, which is either a file or a directory.
fn load_path(path: &Path, language: &str) -> Vec<DiscoveryEvent> {
    if !path.is_dir() {
        return load_file(path, language);
    }

    let walker = match globwalk::GlobWalkerBuilder::new(path, "*.feature")
        .case_insensitive(true)
        .build()
    {
        Ok(walker) => walker,
        Err(e) => return vec![failure(path, &e)],
    };
    let mut files = walker
        .filter_map(Result::ok)
        .map(|entry| entry.into_path())
        .collect::<Vec<_>>();
    files.sort();

    tracing::debug!(dir = %path.display(), files = files.len(), "walked");
    files.iter().flat_map(|f| load_file(f, language)).collect()
}

/// Reads and compiles a single `.feature` file.
fn load_file(path: &Path, language: &str) -> Vec<DiscoveryEvent> {
    let uri = path.display().to_string();
    let data = match fs::read_to_string(path) {
        Ok(data) => data,
        Err(e) => return vec![failure(path, &e)],
    };

    let mut events = vec![DiscoveryEvent::from(Source {
        uri: uri.clone(),
        data,
        media: Media::utf8(Media::GHERKIN),
    })];

    let feature = gherkin::GherkinEnv::new(language)
        .map_err(|e| e.to_string())
        .and_then(|env| {
            gherkin::Feature::parse_path(path, env).map_err(|e| e.to_string())
        });
    match feature {
        Ok(feature) => {
            events.push(
                GherkinDocument {
                    uri: uri.clone(),
                    feature: compile::summary(&feature),
                }
                .into(),
            );
            events.extend(
                compile::pickles(&feature, &uri, language)
                    .into_iter()
                    .map(|p| DiscoveryEvent::Pickle(Arc::new(p))),
            );
        }
        Err(message) => {
            tracing::debug!(%uri, %message, "failed to parse");
            events.push(failure(path, &message));
        }
    }
    events
}

/// Reports a failure to read or parse the source at the given `path`.
fn failure(path: &Path, err: &impl ToString) -> DiscoveryEvent {
    Attachment {
        source: SourceReference {
            uri: path.display().to_string(),
            location: None,
        },
        data: err.to_string(),
        media: Media::utf8(Media::STACKTRACE),
    }
    .into()
}
