// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::collections::{HashMap, HashSet};

use cdcflow_sub_task::{Execution, HealthReport, TaskDefinition, TaskScheduler};
use cdcflow_type::{Error, Result, TaskId};
use parking_lot::RwLock;
use tracing::{debug, instrument, warn};

use crate::{
	batch::{BatchResult, TaskResult},
	graph::DependencyGraph,
};

/// Runs scheduler tasks as dependency-ordered batches.
///
/// Dependencies only affect [`run_batch`](Orchestrator::run_batch); periodic
/// ticking through the scheduler is unaffected by them.
pub struct Orchestrator {
	scheduler: TaskScheduler,
	graph: RwLock<DependencyGraph>,
}

impl Orchestrator {
	pub fn new(scheduler: TaskScheduler) -> Self {
		Self {
			scheduler,
			graph: RwLock::new(DependencyGraph::new()),
		}
	}

	pub fn scheduler(&self) -> &TaskScheduler {
		&self.scheduler
	}

	pub fn register(&self, def: TaskDefinition) -> Result<()> {
		let task = def.id().clone();
		self.scheduler.register(def)?;
		self.graph.write().add_task(&task);
		Ok(())
	}

	/// Unregister the task and forget every dependency edge touching it.
	pub fn unregister(&self, task: &TaskId) -> Result<()> {
		self.scheduler.unregister(task)?;
		self.graph.write().remove_task(task);
		Ok(())
	}

	/// Declare that `task` must run after `upstream` within a batch.
	pub fn depends_on(&self, task: &TaskId, upstream: &TaskId) -> Result<()> {
		for id in [task, upstream] {
			if !self.scheduler.contains(id) {
				return Err(Error::UnknownTask {
					task: id.clone(),
				});
			}
		}

		self.graph.write().add_dependency(task, upstream)?;
		debug!(task = %task, upstream = %upstream, "dependency declared");
		Ok(())
	}

	/// Direct upstream tasks of `task`.
	pub fn upstream(&self, task: &TaskId) -> Vec<TaskId> {
		self.graph.read().upstream(task)
	}

	/// Every registered task, upstream tasks first; independent tasks keep
	/// registration order.
	pub fn execution_order(&self) -> Result<Vec<TaskId>> {
		let mut graph = self.graph.read().clone();
		for task in self.scheduler.tasks() {
			graph.add_task(&task);
		}
		graph.toposort()
	}

	/// Run every registered task once, in [`execution_order`](Self::execution_order).
	pub fn run_all(&self) -> Result<BatchResult> {
		let order = self.execution_order()?;
		self.run_batch(&order)
	}

	/// Execute `tasks` in the given order.
	///
	/// A task whose upstream failed or was skipped earlier in the batch is
	/// skipped. Fails without running anything if a task is unknown or listed
	/// before one of its upstream tasks.
	#[instrument(name = "orchestrator::run_batch", level = "debug", skip_all, fields(tasks = tasks.len()))]
	pub fn run_batch(&self, tasks: &[TaskId]) -> Result<BatchResult> {
		let upstream = self.validate(tasks)?;

		let mut result = BatchResult::default();
		let mut blocked: Vec<&TaskId> = Vec::new();

		for task in tasks {
			let blocking = blocked.iter().find(|b| upstream[task].contains(**b)).map(|b| (*b).clone());
			let task_result = match blocking {
				Some(upstream) => {
					warn!(task = %task, upstream = %upstream, "task skipped");
					TaskResult::Skipped {
						upstream,
					}
				}
				None => match self.scheduler.execute(task)? {
					Execution::Completed(run) if run.is_success() => TaskResult::Succeeded(run),
					Execution::Completed(run) => TaskResult::Failed(run),
					Execution::NoChanges => TaskResult::NoChanges,
					Execution::Busy => TaskResult::Busy,
				},
			};

			debug!(task = %task, result = %task_result, "batch step finished");
			if task_result.blocks_dependents() {
				blocked.push(task);
			}
			result.push(task.clone(), task_result);
		}

		Ok(result)
	}

	pub fn health_report(&self) -> HealthReport {
		self.scheduler.health_report()
	}

	/// Transitive upstream sets of every task in the batch, after checking the
	/// batch can run as given.
	fn validate(&self, tasks: &[TaskId]) -> Result<HashMap<TaskId, HashSet<TaskId>>> {
		let graph = self.graph.read();
		let mut upstream = HashMap::with_capacity(tasks.len());

		for (position, task) in tasks.iter().enumerate() {
			if !self.scheduler.contains(task) {
				return Err(Error::UnknownTask {
					task: task.clone(),
				});
			}

			let transitive = graph.transitive_upstream(task);
			if let Some(later) = tasks[position + 1..].iter().find(|later| transitive.contains(*later)) {
				return Err(Error::InvalidBatchOrder {
					task: task.clone(),
					upstream: later.clone(),
				});
			}
			upstream.insert(task.clone(), transitive);
		}

		Ok(upstream)
	}
}
