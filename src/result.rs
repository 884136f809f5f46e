// Copyright (c) 2018-2023  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Outcomes of hooks, steps, scenarios and whole runs.

use std::time::Duration;

use derive_more::Display;
use serde::{Deserialize, Serialize};

/// Status of a [`TestResult`].
#[derive(
    Clone, Copy, Debug, Deserialize, Display, Eq, Hash, PartialEq, Serialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Hook or step ran successfully.
    #[display(fmt = "passed")]
    Passed,

    /// Hook or step failed.
    #[display(fmt = "failed")]
    Failed,

    /// Hook or step wasn't executed, either deliberately or because of
    /// a previous problem.
    #[display(fmt = "skipped")]
    Skipped,

    /// Step has an incomplete implementation.
    #[display(fmt = "pending")]
    Pending,

    /// Step has no matching definition.
    #[display(fmt = "undefined")]
    Undefined,

    /// Step has multiple matching definitions.
    #[display(fmt = "ambiguous")]
    Ambiguous,
}

impl Status {
    /// Indicates whether a scenario finished with this [`Status`] fails the
    /// whole run.
    #[must_use]
    pub const fn causes_failure(self, is_strict: bool) -> bool {
        match self {
            Self::Ambiguous | Self::Failed | Self::Undefined => true,
            Self::Pending => is_strict,
            Self::Passed | Self::Skipped => false,
        }
    }

    /// Indicates whether a scenario currently having this [`Status`] should
    /// adopt the given `next` unit [`Status`].
    ///
    /// The first [`Failed`] or [`Ambiguous`] status is never replaced, while
    /// [`Pending`] and [`Undefined`] can only be replaced by one of those two.
    ///
    /// [`Ambiguous`]: Self::Ambiguous
    /// [`Failed`]: Self::Failed
    /// [`Pending`]: Self::Pending
    /// [`Undefined`]: Self::Undefined
    #[must_use]
    pub const fn is_overridden_by(self, next: Self) -> bool {
        match next {
            Self::Failed | Self::Ambiguous => {
                !matches!(self, Self::Failed | Self::Ambiguous)
            }
            Self::Passed | Self::Skipped | Self::Pending | Self::Undefined => {
                matches!(self, Self::Passed | Self::Skipped)
            }
        }
    }
}

/// Result of a single hook or step, or of a whole scenario.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    /// [`Status`] of the outcome.
    pub status: Status,

    /// Time spent. Transmitted as nanoseconds.
    #[serde(default, with = "nanos")]
    pub duration: Duration,

    /// Explanation of the [`Status`], if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl TestResult {
    /// Creates a new [`TestResult`] with the given [`Status`], no duration and
    /// no message.
    #[must_use]
    pub const fn new(status: Status) -> Self {
        Self { status, duration: Duration::ZERO, message: None }
    }

    /// Attaches the given `message` to this [`TestResult`].
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Folds the result of a scenario's hook or step into this scenario
    /// [`TestResult`].
    pub fn aggregate(&mut self, unit: &Self) {
        self.duration = self.duration.saturating_add(unit.duration);
        if self.status.is_overridden_by(unit.status) {
            self.status = unit.status;
        }
        if self.message.as_deref().map_or(true, str::is_empty) {
            if let Some(msg) = unit.message.as_ref().filter(|m| !m.is_empty()) {
                self.message = Some(msg.clone());
            }
        }
    }
}

/// Result of a whole run.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct TestRunResult {
    /// Whether no scenario has caused a failure so far.
    pub success: bool,

    /// Total time spent in scenarios.
    pub duration: Duration,
}

impl Default for TestRunResult {
    fn default() -> Self {
        Self { success: true, duration: Duration::ZERO }
    }
}

impl TestRunResult {
    /// Accounts the given scenario [`TestResult`].
    ///
    /// Once failed, this [`TestRunResult`] never becomes successful again.
    pub fn update(&mut self, scenario: &TestResult, is_strict: bool) {
        self.duration = self.duration.saturating_add(scenario.duration);
        if scenario.status.causes_failure(is_strict) {
            self.success = false;
        }
    }
}

/// (De)serialization of a [`Duration`] as a number of nanoseconds.
pub(crate) mod nanos {
    use std::time::Duration;

    use serde::{Deserialize as _, Deserializer, Serializer};

    pub(crate) fn serialize<S: Serializer>(
        duration: &Duration,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let nanos = u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX);
        serializer.serialize_u64(nanos)
    }

    pub(crate) fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_nanos)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{Status, TestResult, TestRunResult};

    const ALL: [Status; 6] = [
        Status::Passed,
        Status::Failed,
        Status::Skipped,
        Status::Pending,
        Status::Undefined,
        Status::Ambiguous,
    ];

    fn fold(statuses: &[Status]) -> Status {
        let mut result = TestResult::new(Status::Passed);
        for st in statuses {
            result.aggregate(&TestResult::new(*st));
        }
        result.status
    }

    #[test]
    fn first_failure_is_sticky() {
        for first in [Status::Failed, Status::Ambiguous] {
            for next in ALL {
                assert_eq!(
                    fold(&[first, next]),
                    first,
                    "`{first}` replaced by `{next}`",
                );
            }
        }
    }

    #[test]
    fn pending_and_undefined_yield_only_to_failures() {
        for first in [Status::Pending, Status::Undefined] {
            for next in ALL {
                let expected = match next {
                    Status::Failed | Status::Ambiguous => next,
                    _ => first,
                };
                assert_eq!(fold(&[first, next]), expected);
            }
        }
    }

    #[test]
    fn skipped_is_overridden_by_anything() {
        let mut result = TestResult::new(Status::Skipped);
        result.aggregate(&TestResult::new(Status::Passed));
        assert_eq!(result.status, Status::Passed);

        let mut result = TestResult::new(Status::Skipped);
        result.aggregate(&TestResult::new(Status::Undefined));
        assert_eq!(result.status, Status::Undefined);
    }

    #[test]
    fn keeps_first_message_and_sums_durations() {
        let mut result = TestResult::new(Status::Passed);
        for (st, ms, msg) in [
            (Status::Passed, 10, None),
            (Status::Undefined, 5, Some("first")),
            (Status::Failed, 7, Some("second")),
        ] {
            let mut unit = TestResult::new(st);
            unit.duration = Duration::from_millis(ms);
            unit.message = msg.map(str::to_owned);
            result.aggregate(&unit);
        }

        assert_eq!(result.status, Status::Failed);
        assert_eq!(result.duration, Duration::from_millis(22));
        assert_eq!(result.message.as_deref(), Some("first"));
    }

    #[test]
    fn run_result_never_recovers() {
        let mut run = TestRunResult::default();
        run.update(&TestResult::new(Status::Pending), false);
        assert!(run.success);

        run.update(&TestResult::new(Status::Pending), true);
        assert!(!run.success);

        run.update(&TestResult::new(Status::Passed), true);
        assert!(!run.success);
    }

    #[test]
    fn duration_is_transmitted_as_nanos() {
        let mut result = TestResult::new(Status::Failed).with_message("boom");
        result.duration = Duration::from_micros(3);

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "status": "failed",
                "duration": 3000,
                "message": "boom",
            }),
        );
    }
}
