// Copyright (c) 2018-2023  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Engine speaking newline-delimited JSON over stdin and stdout.

use anyhow::Context as _;
use clap::Parser;
use cucumber_engine::{discovery, message::Inbound, Runner};
use futures::{stream, StreamExt as _};
use tokio::io::{self, AsyncBufReadExt as _, AsyncWriteExt as _, BufReader};
use tracing_subscriber::filter::LevelFilter;

/// Run Cucumber features for a host process owning the step code.
///
/// Reads `start` and `action_complete` messages from stdin, one JSON object
/// per line, and writes events and requests to stdout the same way.
#[derive(Clone, Copy, Debug, Default, Parser)]
#[command(name = "cucumber-engine", version, about, long_about = None)]
struct Opts {
    /// Log debug output, including every message, to stderr.
    #[arg(long)]
    debug: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let opts = Opts::parse();
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_max_level(if opts.debug {
            LevelFilter::DEBUG
        } else {
            LevelFilter::WARN
        })
        .init();

    let lines = BufReader::new(io::stdin()).lines();
    let inbound = stream::unfold(lines, |mut lines| async move {
        loop {
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => return None,
                Err(e) => {
                    tracing::error!(error = %e, "failed to read stdin");
                    return None;
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            tracing::debug!(%line, "inbound");
            match serde_json::from_str::<Inbound>(&line) {
                Ok(msg) => return Some((msg, lines)),
                Err(e) => {
                    tracing::error!(error = %e, %line, "malformed message");
                }
            }
        }
    });

    let mut outbound = Runner::new(discovery::Basic).run(inbound);
    let mut stdout = io::stdout();
    while let Some(msg) = outbound.next().await {
        let mut line = serde_json::to_string(&msg)
            .context("failed to serialize outbound message")?;
        tracing::debug!(%line, "outbound");
        line.push('\n');
        stdout
            .write_all(line.as_bytes())
            .await
            .context("failed to write stdout")?;
        stdout.flush().await.context("failed to flush stdout")?;
    }
    Ok(())
}
