// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::{sync::Arc, time::Duration};

use cdcflow_cdc::{
	ChangeLog, ChangeRange, ChangeRecord, CursorRegistry, Operation, StartPosition, StreamCursor, TableDef,
	compute_watermark,
};
use cdcflow_sub_flow::{BatchResult, DependencyGraph, Orchestrator};
use cdcflow_sub_task::{HealthReport, PipelineRun, RunObserver, TaskDefinition, TaskScheduler, TickReport};
use cdcflow_type::{Clock, ConsumerId, CursorId, Error, Result, Row, SequenceNumber, TableId, TaskId, Timestamp};
use parking_lot::Mutex;
use tracing::{debug, info, instrument};

use crate::{builder::PipelineBuilder, config::PipelineConfig, registry::ActionRegistry, worker::TickWorker};

/// One change data capture pipeline: its change log, cursors and tasks.
///
/// Driven either manually through [`tick`](Pipeline::tick) or by a background
/// thread started with [`start`](Pipeline::start).
pub struct Pipeline {
	clock: Clock,
	log: ChangeLog,
	cursors: CursorRegistry,
	orchestrator: Orchestrator,
	tick_interval: Duration,
	worker: Mutex<Option<TickWorker>>,
}

impl Pipeline {
	pub(crate) fn new(
		clock: Clock,
		log: ChangeLog,
		cursors: CursorRegistry,
		orchestrator: Orchestrator,
		tick_interval: Duration,
	) -> Self {
		Self {
			clock,
			log,
			cursors,
			orchestrator,
			tick_interval,
			worker: Mutex::new(None),
		}
	}

	pub fn builder() -> PipelineBuilder {
		PipelineBuilder::new()
	}

	/// In-memory pipeline with default settings.
	pub fn memory() -> Result<Self> {
		PipelineBuilder::new().build()
	}

	/// Build a pipeline with the tables, cursors and tasks declared in `config`.
	pub fn from_config(config: &PipelineConfig, actions: &ActionRegistry) -> Result<Self> {
		let pipeline = PipelineBuilder::new().with_config(config).build()?;
		pipeline.provision(config, actions)?;
		Ok(pipeline)
	}

	pub fn from_json(json: &str, actions: &ActionRegistry) -> Result<Self> {
		Self::from_config(&PipelineConfig::from_json(json)?, actions)
	}

	/// Create the tables, cursors, tasks and dependencies declared in `config`.
	///
	/// Everything that can be checked up front is checked before anything is
	/// created: unknown actions, tables or tasks that already exist, and
	/// dependency cycles all leave the pipeline untouched.
	pub fn provision(&self, config: &PipelineConfig, actions: &ActionRegistry) -> Result<()> {
		config.validate()?;
		let resolved =
			config.tasks.iter().map(|task| actions.get(&task.action)).collect::<Result<Vec<_>>>()?;

		let existing = self.log.tables();
		if let Some(table) = config.tables.iter().find(|t| existing.iter().any(|id| id.as_str() == t.name)) {
			return Err(Error::config(format!("table '{}' already exists", table.name)));
		}
		if let Some(task) = config.tasks.iter().find(|t| self.scheduler().contains(&TaskId::new(t.id.as_str()))) {
			return Err(Error::DuplicateTask {
				task: TaskId::new(task.id.as_str()),
			});
		}

		let mut graph = DependencyGraph::new();
		for task in &config.tasks {
			for upstream in &task.depends_on {
				graph.add_dependency(&TaskId::new(task.id.as_str()), &TaskId::new(upstream.as_str()))?;
			}
		}

		for table in &config.tables {
			self.create_table(table.definition())?;
		}

		for (task, action) in config.tasks.iter().zip(resolved) {
			let mut def = TaskDefinition::new(task.id.as_str(), task.interval, action);
			for source in &task.sources {
				let cursor = self.create_cursor(
					source.consumer_for(task),
					&TableId::new(source.table.as_str()),
					source.start,
				)?;
				def = def.with_source(cursor);
			}
			self.register(def)?;
		}

		for task in &config.tasks {
			for upstream in &task.depends_on {
				self.depends_on(&TaskId::new(task.id.as_str()), &TaskId::new(upstream.as_str()))?;
			}
		}

		info!(tables = config.tables.len(), tasks = config.tasks.len(), "pipeline provisioned");
		Ok(())
	}

	pub fn clock(&self) -> &Clock {
		&self.clock
	}

	pub fn log(&self) -> &ChangeLog {
		&self.log
	}

	pub fn cursors(&self) -> &CursorRegistry {
		&self.cursors
	}

	pub fn scheduler(&self) -> &TaskScheduler {
		self.orchestrator.scheduler()
	}

	pub fn orchestrator(&self) -> &Orchestrator {
		&self.orchestrator
	}

	pub fn tick_interval(&self) -> Duration {
		self.tick_interval
	}

	pub fn create_table(&self, def: TableDef) -> Result<()> {
		self.log.create_table(def)
	}

	/// Drop `table` and invalidate every cursor reading it. Returns the number
	/// of invalidated cursors.
	pub fn drop_table(&self, table: &TableId) -> Result<usize> {
		self.log.drop_table(table)?;
		Ok(self.cursors.invalidate_table(table))
	}

	pub fn append(&self, table: &TableId, operation: Operation, payload: Row) -> Result<SequenceNumber> {
		self.log.append(table, operation, payload)
	}

	pub fn insert(&self, table: &TableId, payload: Row) -> Result<SequenceNumber> {
		self.append(table, Operation::Insert, payload)
	}

	pub fn update(&self, table: &TableId, payload: Row) -> Result<SequenceNumber> {
		self.append(table, Operation::Update, payload)
	}

	pub fn delete(&self, table: &TableId, payload: Row) -> Result<SequenceNumber> {
		self.append(table, Operation::Delete, payload)
	}

	pub fn read_range(&self, table: &TableId, from: SequenceNumber, to: Option<SequenceNumber>) -> Result<ChangeRange> {
		self.log.read_range(table, from, to)
	}

	pub fn create_cursor(
		&self,
		consumer: impl Into<ConsumerId>,
		table: &TableId,
		start: StartPosition,
	) -> Result<CursorId> {
		self.cursors.create_cursor(consumer, table, start)
	}

	pub fn drop_cursor(&self, cursor: CursorId) -> Result<()> {
		self.cursors.drop_cursor(cursor)
	}

	pub fn cursor(&self, cursor: CursorId) -> Result<StreamCursor> {
		self.cursors.cursor(cursor)
	}

	pub fn peek(&self, cursor: CursorId) -> Result<ChangeRange> {
		self.cursors.peek(cursor)
	}

	pub fn consume(&self, cursor: CursorId) -> Result<Vec<ChangeRecord>> {
		self.cursors.consume(cursor)
	}

	pub fn register(&self, def: TaskDefinition) -> Result<()> {
		self.orchestrator.register(def)
	}

	pub fn unregister(&self, task: &TaskId) -> Result<()> {
		self.orchestrator.unregister(task)
	}

	pub fn depends_on(&self, task: &TaskId, upstream: &TaskId) -> Result<()> {
		self.orchestrator.depends_on(task, upstream)
	}

	pub fn add_observer(&self, observer: Arc<dyn RunObserver>) {
		self.scheduler().add_observer(observer)
	}

	pub fn tick(&self, now: Timestamp) -> TickReport {
		self.scheduler().tick(now)
	}

	/// Tick at the pipeline clock's current time.
	pub fn tick_now(&self) -> TickReport {
		self.tick(self.clock.now())
	}

	pub fn run_batch(&self, tasks: &[TaskId]) -> Result<BatchResult> {
		self.orchestrator.run_batch(tasks)
	}

	pub fn run_all(&self) -> Result<BatchResult> {
		self.orchestrator.run_all()
	}

	pub fn cancel(&self, task: &TaskId) -> Result<bool> {
		self.scheduler().cancel(task)
	}

	pub fn runs(&self) -> Vec<PipelineRun> {
		self.scheduler().runs()
	}

	pub fn health_report(&self) -> HealthReport {
		self.orchestrator.health_report()
	}

	/// Lowest offset across the valid cursors reading `table`.
	pub fn watermark(&self, table: &TableId) -> Option<SequenceNumber> {
		compute_watermark(&self.cursors, table)
	}

	/// Discard every record all of a table's consumers have seen.
	///
	/// Tables without a valid cursor are left alone. Returns the number of
	/// records removed per compacted table.
	#[instrument(name = "pipeline::compact", level = "debug", skip_all)]
	pub fn compact(&self) -> Result<Vec<(TableId, usize)>> {
		let mut compacted = Vec::new();
		for table in self.log.tables() {
			let Some(watermark) = self.watermark(&table) else {
				continue;
			};
			let removed = self.log.compact(&table, watermark)?;
			compacted.push((table, removed));
		}
		Ok(compacted)
	}

	/// Start ticking on a background thread every `tick_interval`.
	///
	/// Starting an already running pipeline has no effect.
	pub fn start(&self) -> Result<()> {
		let mut worker = self.worker.lock();
		if worker.as_ref().is_some_and(|w| w.is_running()) {
			return Ok(());
		}

		*worker = Some(TickWorker::spawn(self.scheduler().clone(), self.clock.clone(), self.tick_interval)?);
		debug!("pipeline started");
		Ok(())
	}

	/// Stop the background thread and wait for its current tick to finish.
	pub fn shutdown(&self) {
		let worker = self.worker.lock().take();
		if let Some(mut worker) = worker {
			worker.shutdown();
			debug!(ticks = worker.ticks(), "pipeline stopped");
		}
	}

	pub fn is_running(&self) -> bool {
		self.worker.lock().as_ref().is_some_and(|w| w.is_running())
	}

	/// Make a started pipeline tick now instead of waiting for the interval.
	pub fn wake(&self) {
		if let Some(worker) = self.worker.lock().as_ref() {
			worker.wake();
		}
	}
}

impl Drop for Pipeline {
	fn drop(&mut self) {
		self.shutdown();
	}
}
