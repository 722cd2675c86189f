// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::{
	collections::VecDeque,
	sync::{
		Arc,
		atomic::{AtomicBool, AtomicU64, Ordering},
	},
};

use cdcflow_cdc::CursorRegistry;
use cdcflow_type::{Clock, CursorId, Error, Result, RunId, TaskId, Timestamp};
use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use rayon::{ThreadPool, ThreadPoolBuilder, prelude::*};
use tracing::{debug, instrument, trace};

use crate::{
	cancel::CancellationToken,
	config::{ExecutionMode, SchedulerConfig},
	execute::{Execution, run_sources},
	health::{HealthReport, TaskHealth},
	observer::{RunObserver, TracingObserver},
	run::{PipelineRun, RunOutcome},
	task::{TaskContext, TaskDefinition, TaskStatus},
};

/// Outcome of a single [`TaskScheduler::tick`], one entry per due task in
/// registration order.
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
	at: Timestamp,
	executions: Vec<(TaskId, Execution)>,
}

impl TickReport {
	pub fn at(&self) -> Timestamp {
		self.at
	}

	pub fn executions(&self) -> &[(TaskId, Execution)] {
		&self.executions
	}

	pub fn get(&self, task: &TaskId) -> Option<&Execution> {
		self.executions.iter().find(|(id, _)| id == task).map(|(_, execution)| execution)
	}

	/// Runs recorded during this tick.
	pub fn runs(&self) -> impl Iterator<Item = &PipelineRun> {
		self.executions.iter().filter_map(|(_, execution)| execution.run())
	}

	/// Due tasks that were skipped because their cursors were empty.
	pub fn skipped(&self) -> impl Iterator<Item = &TaskId> {
		self.executions.iter().filter(|(_, execution)| matches!(execution, Execution::NoChanges)).map(|(id, _)| id)
	}

	/// Due tasks that were still running from an earlier invocation.
	pub fn busy(&self) -> impl Iterator<Item = &TaskId> {
		self.executions.iter().filter(|(_, execution)| matches!(execution, Execution::Busy)).map(|(id, _)| id)
	}

	/// No task was due.
	pub fn is_empty(&self) -> bool {
		self.executions.is_empty()
	}
}

/// Runs registered tasks on their interval, skipping tasks without pending
/// changes and never running the same task twice at once.
///
/// Cheap to clone; clones share the same task set.
#[derive(Clone)]
pub struct TaskScheduler {
	inner: Arc<Inner>,
}

struct Inner {
	registry: CursorRegistry,
	config: SchedulerConfig,
	tasks: RwLock<IndexMap<TaskId, Arc<TaskEntry>>>,
	history: Mutex<VecDeque<PipelineRun>>,
	observers: RwLock<Vec<Arc<dyn RunObserver>>>,
	next_run: AtomicU64,
	pool: Option<ThreadPool>,
}

struct TaskEntry {
	def: TaskDefinition,
	running: AtomicBool,
	state: Mutex<TaskState>,
}

#[derive(Default)]
struct TaskState {
	status: TaskStatus,
	next_due: Option<Timestamp>,
	failures: u32,
	last_run: Option<PipelineRun>,
	token: CancellationToken,
}

/// Clears the running flag on every exit path.
struct RunningFlag<'a>(&'a AtomicBool);

impl Drop for RunningFlag<'_> {
	fn drop(&mut self) {
		self.0.store(false, Ordering::Release);
	}
}

impl TaskEntry {
	fn new(def: TaskDefinition) -> Self {
		Self {
			def,
			running: AtomicBool::new(false),
			state: Mutex::new(TaskState::default()),
		}
	}

	fn try_start(&self) -> Option<RunningFlag<'_>> {
		self.running
			.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
			.ok()
			.map(|_| RunningFlag(&self.running))
	}

	fn is_due(&self, now: Timestamp) -> bool {
		self.state.lock().next_due.is_none_or(|due| due <= now)
	}

	fn health(&self) -> TaskHealth {
		let state = self.state.lock();
		TaskHealth {
			task: self.def.id().clone(),
			status: state.status,
			last_outcome: state.last_run.as_ref().map(|run| run.outcome.clone()),
			last_run_at: state.last_run.as_ref().map(|run| run.ended_at),
			consecutive_failures: state.failures,
			next_due: state.next_due,
		}
	}
}

impl TaskScheduler {
	/// Scheduler reading through `registry`, reporting runs to a [`TracingObserver`].
	pub fn new(registry: CursorRegistry, config: SchedulerConfig) -> Result<Self> {
		let pool = match config.execution {
			ExecutionMode::Sequential => None,
			ExecutionMode::Concurrent {
				workers,
			} => Some(
				ThreadPoolBuilder::new()
					.num_threads(workers.max(1))
					.thread_name(|i| format!("cdcflow-task-{i}"))
					.build()
					.map_err(|err| Error::config(format!("failed to build task pool: {}", err)))?,
			),
		};

		Ok(Self {
			inner: Arc::new(Inner {
				registry,
				config,
				tasks: RwLock::new(IndexMap::new()),
				history: Mutex::new(VecDeque::new()),
				observers: RwLock::new(vec![Arc::new(TracingObserver)]),
				next_run: AtomicU64::new(1),
				pool,
			}),
		})
	}

	pub fn registry(&self) -> &CursorRegistry {
		&self.inner.registry
	}

	pub fn config(&self) -> &SchedulerConfig {
		&self.inner.config
	}

	fn clock(&self) -> &Clock {
		self.inner.registry.log().clock()
	}

	pub fn add_observer(&self, observer: Arc<dyn RunObserver>) {
		self.inner.observers.write().push(observer);
	}

	/// Add a task. It becomes due at the next tick.
	pub fn register(&self, def: TaskDefinition) -> Result<()> {
		if let Some(cursor) = def.sources().iter().find(|cursor| !self.inner.registry.contains(**cursor)) {
			return Err(Error::UnknownCursor {
				cursor: *cursor,
			});
		}

		let mut tasks = self.inner.tasks.write();
		if tasks.contains_key(def.id()) {
			return Err(Error::DuplicateTask {
				task: def.id().clone(),
			});
		}

		debug!(
			task = %def.id(),
			interval_ms = def.interval().as_millis() as u64,
			sources = def.sources().len(),
			action = def.action().name(),
			"task registered"
		);
		tasks.insert(def.id().clone(), Arc::new(TaskEntry::new(def)));
		Ok(())
	}

	/// Remove a task for good. A running execution is asked to stop.
	pub fn unregister(&self, task: &TaskId) -> Result<()> {
		let Some(entry) = self.inner.tasks.write().shift_remove(task) else {
			return Err(Error::UnknownTask {
				task: task.clone(),
			});
		};

		if entry.running.load(Ordering::Acquire) {
			entry.state.lock().token.cancel();
		}
		debug!(task = %task, "task unregistered");
		Ok(())
	}

	pub fn contains(&self, task: &TaskId) -> bool {
		self.inner.tasks.read().contains_key(task)
	}

	/// Registered task ids in registration order.
	pub fn tasks(&self) -> Vec<TaskId> {
		self.inner.tasks.read().keys().cloned().collect()
	}

	pub fn definition(&self, task: &TaskId) -> Result<TaskDefinition> {
		Ok(self.entry(task)?.def.clone())
	}

	/// Run every due task that has pending changes.
	///
	/// Action failures are recorded in the returned runs and never fail the tick.
	#[instrument(name = "scheduler::tick", level = "trace", skip_all, fields(now = now.0))]
	pub fn tick(&self, now: Timestamp) -> TickReport {
		let due: Vec<Arc<TaskEntry>> =
			self.inner.tasks.read().values().filter(|entry| entry.is_due(now)).cloned().collect();

		let executions: Vec<(TaskId, Execution)> = match &self.inner.pool {
			Some(pool) => pool.install(|| {
				due.par_iter().map(|entry| (entry.def.id().clone(), self.run_due(entry, now))).collect()
			}),
			None => due.iter().map(|entry| (entry.def.id().clone(), self.run_due(entry, now))).collect(),
		};

		TickReport {
			at: now,
			executions,
		}
	}

	/// Run a task right away, regardless of its schedule.
	pub fn execute(&self, task: &TaskId) -> Result<Execution> {
		let entry = self.entry(task)?;
		Ok(self.execute_entry(&entry))
	}

	/// Ask a running execution to stop after its current batch.
	///
	/// Returns whether an execution was in progress.
	pub fn cancel(&self, task: &TaskId) -> Result<bool> {
		let entry = self.entry(task)?;
		if !entry.running.load(Ordering::Acquire) {
			return Ok(false);
		}

		entry.state.lock().token.cancel();
		debug!(task = %task, "cancellation requested");
		Ok(true)
	}

	pub fn status(&self, task: &TaskId) -> Result<TaskStatus> {
		Ok(self.entry(task)?.state.lock().status)
	}

	pub fn next_due(&self, task: &TaskId) -> Result<Option<Timestamp>> {
		Ok(self.entry(task)?.state.lock().next_due)
	}

	/// Retained run history, oldest first.
	pub fn runs(&self) -> Vec<PipelineRun> {
		self.inner.history.lock().iter().cloned().collect()
	}

	pub fn runs_for(&self, task: &TaskId) -> Vec<PipelineRun> {
		self.inner.history.lock().iter().filter(|run| &run.task == task).cloned().collect()
	}

	pub fn last_run(&self, task: &TaskId) -> Result<Option<PipelineRun>> {
		Ok(self.entry(task)?.state.lock().last_run.clone())
	}

	pub fn health_report(&self) -> HealthReport {
		HealthReport::new(self.inner.tasks.read().values().map(|entry| entry.health()).collect())
	}

	fn entry(&self, task: &TaskId) -> Result<Arc<TaskEntry>> {
		self.inner.tasks.read().get(task).cloned().ok_or_else(|| Error::UnknownTask {
			task: task.clone(),
		})
	}

	fn run_due(&self, entry: &TaskEntry, now: Timestamp) -> Execution {
		let execution = self.execute_entry(entry);

		let mut state = entry.state.lock();
		match &execution {
			// stays due; checked again on the next tick
			Execution::Busy => trace!(task = %entry.def.id(), "task still running"),
			Execution::NoChanges => {
				trace!(task = %entry.def.id(), "no pending changes");
				state.next_due = Some(now + entry.def.interval());
			}
			Execution::Completed(run) => {
				let delay = if run.outcome.is_failure() {
					self.inner.config.retry.delay(state.failures)
				} else {
					None
				};
				state.next_due = Some(now + delay.unwrap_or(entry.def.interval()));
			}
		}
		execution
	}

	fn execute_entry(&self, entry: &TaskEntry) -> Execution {
		let Some(_running) = entry.try_start() else {
			return Execution::Busy;
		};

		let pending = self.has_pending(entry.def.sources());
		if let Ok(false) = pending {
			return Execution::NoChanges;
		}

		let run_id = RunId(self.inner.next_run.fetch_add(1, Ordering::Relaxed));
		let token = CancellationToken::new();
		{
			let mut state = entry.state.lock();
			state.status = TaskStatus::Running;
			state.token = token.clone();
		}

		let ctx = TaskContext::new(
			entry.def.id().clone(),
			run_id,
			self.clock().clone(),
			self.inner.config.action_timeout,
			token,
		);
		debug!(task = %entry.def.id(), run = run_id.0, "task run started");

		let (records_processed, outcome) = match pending {
			Err(error) => (
				0,
				RunOutcome::Failed {
					error,
				},
			),
			Ok(_) => run_sources(&self.inner.registry, &entry.def, &ctx, self.inner.config.batch_size),
		};

		let run = PipelineRun {
			run_id,
			task: entry.def.id().clone(),
			started_at: ctx.started_at(),
			ended_at: self.clock().now(),
			records_processed,
			outcome,
		};
		self.complete(entry, &run);
		Execution::Completed(run)
	}

	/// Whether any source cursor has records past its offset.
	fn has_pending(&self, sources: &[CursorId]) -> Result<bool> {
		for cursor in sources {
			if !self.inner.registry.peek(*cursor)?.is_empty()? {
				return Ok(true);
			}
		}
		Ok(false)
	}

	fn complete(&self, entry: &TaskEntry, run: &PipelineRun) {
		{
			let mut state = entry.state.lock();
			if run.outcome.is_failure() {
				state.status = TaskStatus::Failed;
				state.failures = state.failures.saturating_add(1);
			} else {
				state.status = TaskStatus::Idle;
				if run.is_success() {
					state.failures = 0;
				}
			}
			state.last_run = Some(run.clone());
		}

		{
			let limit = self.inner.config.history_limit;
			let mut history = self.inner.history.lock();
			history.push_back(run.clone());
			while history.len() > limit {
				history.pop_front();
			}
		}

		for observer in self.inner.observers.read().iter() {
			observer.on_run(run);
		}
	}
}

impl std::fmt::Debug for TaskScheduler {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("TaskScheduler").field("tasks", &self.tasks()).field("config", &self.inner.config).finish()
	}
}
