// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use cdcflow_type::{TaskId, Timestamp};

use crate::{run::RunOutcome, task::TaskStatus};

#[derive(Debug, Clone, PartialEq)]
pub struct TaskHealth {
	pub task: TaskId,
	pub status: TaskStatus,
	pub last_outcome: Option<RunOutcome>,
	pub last_run_at: Option<Timestamp>,
	pub consecutive_failures: u32,
	pub next_due: Option<Timestamp>,
}

impl TaskHealth {
	pub fn is_healthy(&self) -> bool {
		self.status != TaskStatus::Failed
	}
}

/// Status and most recent outcome of every registered task, in registration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HealthReport {
	tasks: Vec<TaskHealth>,
}

impl HealthReport {
	pub(crate) fn new(tasks: Vec<TaskHealth>) -> Self {
		Self {
			tasks,
		}
	}

	/// True when no task is in the failed state.
	pub fn is_healthy(&self) -> bool {
		self.tasks.iter().all(TaskHealth::is_healthy)
	}

	pub fn get(&self, task: &TaskId) -> Option<&TaskHealth> {
		self.tasks.iter().find(|health| &health.task == task)
	}

	pub fn failing(&self) -> impl Iterator<Item = &TaskHealth> {
		self.tasks.iter().filter(|health| !health.is_healthy())
	}

	pub fn iter(&self) -> std::slice::Iter<'_, TaskHealth> {
		self.tasks.iter()
	}

	pub fn len(&self) -> usize {
		self.tasks.len()
	}

	pub fn is_empty(&self) -> bool {
		self.tasks.is_empty()
	}
}

impl<'a> IntoIterator for &'a HealthReport {
	type Item = &'a TaskHealth;
	type IntoIter = std::slice::Iter<'a, TaskHealth>;

	fn into_iter(self) -> Self::IntoIter {
		self.tasks.iter()
	}
}

#[cfg(test)]
mod tests {
	use cdcflow_type::Error;

	use super::*;

	fn health(task: &str, status: TaskStatus, last_outcome: Option<RunOutcome>) -> TaskHealth {
		TaskHealth {
			task: TaskId::new(task),
			status,
			last_outcome,
			last_run_at: None,
			consecutive_failures: 0,
			next_due: None,
		}
	}

	#[test]
	fn test_empty_report_is_healthy() {
		assert!(HealthReport::default().is_healthy());
	}

	#[test]
	fn test_single_failed_task_makes_report_unhealthy() {
		let report = HealthReport::new(vec![
			health("rate_calls", TaskStatus::Idle, Some(RunOutcome::Succeeded)),
			health(
				"fraud_alerts",
				TaskStatus::Failed,
				Some(RunOutcome::Failed {
					error: Error::action("sink unavailable"),
				}),
			),
		]);

		assert!(!report.is_healthy());
		let failing: Vec<_> = report.failing().map(|h| h.task.as_str()).collect();
		assert_eq!(failing, vec!["fraud_alerts"]);
		assert_eq!(report.get(&TaskId::new("rate_calls")).unwrap().status, TaskStatus::Idle);
	}
}
