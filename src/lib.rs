// Copyright (c) 2018-2023  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

#![cfg_attr(any(doc, test), doc = include_str!("../README.md"))]
#![cfg_attr(not(any(doc, test)), doc = env!("CARGO_PKG_NAME"))]
#![deny(nonstandard_style, rustdoc::all, trivial_casts, trivial_numeric_casts)]
#![forbid(non_ascii_idents, unsafe_code)]
#![warn(
    clippy::as_conversions,
    clippy::clone_on_ref_ptr,
    clippy::dbg_macro,
    clippy::expect_used,
    clippy::get_unwrap,
    clippy::mem_forget,
    clippy::pedantic,
    clippy::print_stderr,
    clippy::print_stdout,
    clippy::str_to_string,
    clippy::unwrap_used,
    clippy::use_debug,
    future_incompatible,
    let_underscore_drop,
    missing_copy_implementations,
    missing_debug_implementations,
    missing_docs,
    unreachable_pub,
    unused_import_braces,
    unused_labels,
    unused_qualifications,
    unused_results
)]
#![cfg_attr(
    test,
    allow(clippy::unwrap_used, clippy::expect_used, clippy::use_debug)
)]

pub mod config;
pub mod correlation;
pub mod discovery;
pub mod error;
pub mod filter;
pub mod message;
pub mod pickle;
pub mod result;
pub mod runner;
pub mod support_code;
pub mod tag;

#[doc(inline)]
pub use self::{
    discovery::Discover,
    error::{Error, Result},
    pickle::{
        GeneratedExpression, PatternMatch, Pickle, PickleStep, SourceLocation,
    },
    result::{Status, TestResult, TestRunResult},
    runner::Runner,
};
