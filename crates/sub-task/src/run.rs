// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::{
	fmt::{self, Display, Formatter},
	time::Duration,
};

use cdcflow_type::{Error, RunId, TaskId, Timestamp};

/// How a task execution ended.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
	Succeeded,
	Failed {
		error: Error,
	},
	/// The execution overran the configured action timeout.
	TimedOut {
		timeout: Duration,
	},
	/// Stopped between batches on request.
	Cancelled,
}

impl RunOutcome {
	pub fn is_success(&self) -> bool {
		matches!(self, RunOutcome::Succeeded)
	}

	/// Failed or timed out. A cancelled run is not a failure.
	pub fn is_failure(&self) -> bool {
		matches!(
			self,
			RunOutcome::Failed {
				..
			} | RunOutcome::TimedOut {
				..
			}
		)
	}
}

impl Display for RunOutcome {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		match self {
			RunOutcome::Succeeded => f.write_str("succeeded"),
			RunOutcome::Failed {
				error,
			} => write!(f, "failed: {}", error),
			RunOutcome::TimedOut {
				timeout,
			} => write!(f, "timed out after {:?}", timeout),
			RunOutcome::Cancelled => f.write_str("cancelled"),
		}
	}
}

/// Audit record of one task execution. Immutable once completed.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineRun {
	pub run_id: RunId,
	pub task: TaskId,
	pub started_at: Timestamp,
	pub ended_at: Timestamp,
	/// Records whose batch was committed
	pub records_processed: u64,
	pub outcome: RunOutcome,
}

impl PipelineRun {
	pub fn duration(&self) -> Duration {
		self.ended_at.saturating_since(self.started_at)
	}

	pub fn is_success(&self) -> bool {
		self.outcome.is_success()
	}

	/// The error behind a failed or timed out run.
	pub fn error(&self) -> Option<Error> {
		match &self.outcome {
			RunOutcome::Failed {
				error,
			} => Some(error.clone()),
			RunOutcome::TimedOut {
				timeout,
			} => Some(Error::Timeout {
				task: self.task.clone(),
				timeout: *timeout,
			}),
			_ => None,
		}
	}
}
