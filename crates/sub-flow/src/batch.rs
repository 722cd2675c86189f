// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::fmt::{self, Display, Formatter};

use cdcflow_sub_task::PipelineRun;
use cdcflow_type::TaskId;

/// What happened to one task of a batch.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskResult {
	Succeeded(PipelineRun),
	/// The run failed, timed out or was cancelled.
	Failed(PipelineRun),
	/// The task had no pending changes.
	NoChanges,
	/// The task was already running elsewhere.
	Busy,
	/// Not run because `upstream` failed or was skipped earlier in the batch.
	Skipped {
		upstream: TaskId,
	},
}

impl TaskResult {
	pub fn run(&self) -> Option<&PipelineRun> {
		match self {
			TaskResult::Succeeded(run) | TaskResult::Failed(run) => Some(run),
			_ => None,
		}
	}

	/// Whether dependents of this task must be skipped.
	pub fn blocks_dependents(&self) -> bool {
		matches!(
			self,
			TaskResult::Failed(_)
				| TaskResult::Skipped {
					..
				}
		)
	}
}

impl Display for TaskResult {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		match self {
			TaskResult::Succeeded(_) => f.write_str("succeeded"),
			TaskResult::Failed(run) => write!(f, "failed ({})", run.outcome),
			TaskResult::NoChanges => f.write_str("no changes"),
			TaskResult::Busy => f.write_str("busy"),
			TaskResult::Skipped {
				upstream,
			} => write!(f, "skipped (upstream {} did not succeed)", upstream),
		}
	}
}

/// Per-task results of [`run_batch`](crate::Orchestrator::run_batch), in batch order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchResult {
	results: Vec<(TaskId, TaskResult)>,
}

impl BatchResult {
	pub(crate) fn push(&mut self, task: TaskId, result: TaskResult) {
		self.results.push((task, result));
	}

	pub fn get(&self, task: &TaskId) -> Option<&TaskResult> {
		self.results.iter().find(|(id, _)| id == task).map(|(_, result)| result)
	}

	pub fn iter(&self) -> std::slice::Iter<'_, (TaskId, TaskResult)> {
		self.results.iter()
	}

	pub fn len(&self) -> usize {
		self.results.len()
	}

	pub fn is_empty(&self) -> bool {
		self.results.is_empty()
	}

	/// No task failed or was skipped.
	pub fn is_success(&self) -> bool {
		!self.results.iter().any(|(_, result)| result.blocks_dependents())
	}

	pub fn failed(&self) -> impl Iterator<Item = &TaskId> {
		self.results.iter().filter(|(_, r)| matches!(r, TaskResult::Failed(_))).map(|(id, _)| id)
	}

	pub fn skipped(&self) -> impl Iterator<Item = &TaskId> {
		self.results
			.iter()
			.filter(|(_, r)| {
				matches!(
					r,
					TaskResult::Skipped {
						..
					}
				)
			})
			.map(|(id, _)| id)
	}

	pub fn runs(&self) -> impl Iterator<Item = &PipelineRun> {
		self.results.iter().filter_map(|(_, result)| result.run())
	}
}

impl<'a> IntoIterator for &'a BatchResult {
	type Item = &'a (TaskId, TaskResult);
	type IntoIter = std::slice::Iter<'a, (TaskId, TaskResult)>;

	fn into_iter(self) -> Self::IntoIter {
		self.results.iter()
	}
}
