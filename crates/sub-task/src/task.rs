// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::{
	fmt::{self, Debug, Display, Formatter},
	sync::Arc,
	time::Duration,
};

use cdcflow_cdc::ChangeRecord;
use cdcflow_type::{Clock, CursorId, Result, RunId, SequenceNumber, TableId, TaskId, Timestamp};
use serde::{Deserialize, Serialize};

use crate::cancel::CancellationToken;

/// Lifecycle state of a registered task.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
	#[default]
	Idle,
	Running,
	Failed,
}

impl Display for TaskStatus {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		match self {
			TaskStatus::Idle => f.write_str("idle"),
			TaskStatus::Running => f.write_str("running"),
			TaskStatus::Failed => f.write_str("failed"),
		}
	}
}

/// Context handed to an action for the duration of one execution.
pub struct TaskContext {
	task: TaskId,
	run: RunId,
	started_at: Timestamp,
	deadline: Option<Timestamp>,
	clock: Clock,
	token: CancellationToken,
}

impl TaskContext {
	pub(crate) fn new(
		task: TaskId,
		run: RunId,
		clock: Clock,
		timeout: Option<Duration>,
		token: CancellationToken,
	) -> Self {
		let started_at = clock.now();
		Self {
			task,
			run,
			started_at,
			deadline: timeout.map(|timeout| started_at + timeout),
			clock,
			token,
		}
	}

	pub fn task(&self) -> &TaskId {
		&self.task
	}

	pub fn run(&self) -> RunId {
		self.run
	}

	pub fn started_at(&self) -> Timestamp {
		self.started_at
	}

	pub fn now(&self) -> Timestamp {
		self.clock.now()
	}

	pub fn deadline(&self) -> Option<Timestamp> {
		self.deadline
	}

	pub fn is_cancelled(&self) -> bool {
		self.token.is_cancelled()
	}

	pub fn is_past_deadline(&self) -> bool {
		self.deadline.is_some_and(|deadline| self.clock.now() > deadline)
	}

	/// Whether a long-running action should give up early.
	pub fn should_stop(&self) -> bool {
		self.is_cancelled() || self.is_past_deadline()
	}
}

/// A contiguous slice of pending records read through one source cursor.
#[derive(Debug, Clone, Copy)]
pub struct ChangeBatch<'a> {
	pub cursor: CursorId,
	pub table: &'a TableId,
	pub records: &'a [ChangeRecord],
}

impl<'a> ChangeBatch<'a> {
	pub fn len(&self) -> usize {
		self.records.len()
	}

	pub fn is_empty(&self) -> bool {
		self.records.is_empty()
	}

	pub fn iter(&self) -> std::slice::Iter<'a, ChangeRecord> {
		self.records.iter()
	}

	pub fn last_sequence(&self) -> Option<SequenceNumber> {
		self.records.last().map(|r| r.sequence)
	}
}

impl<'a> IntoIterator for &ChangeBatch<'a> {
	type Item = &'a ChangeRecord;
	type IntoIter = std::slice::Iter<'a, ChangeRecord>;

	fn into_iter(self) -> Self::IntoIter {
		self.records.iter()
	}
}

/// Side effect applied to pending change records.
///
/// The same batch may be delivered again after a failure, so actions should be
/// idempotent with respect to a record's sequence number.
pub trait TaskAction: Send + Sync + 'static {
	fn apply(&self, ctx: &TaskContext, batch: &ChangeBatch<'_>) -> Result<()>;

	fn name(&self) -> &str {
		"unnamed_action"
	}
}

/// Closure-backed [`TaskAction`].
pub struct ClosureAction<F> {
	name: String,
	closure: F,
}

impl<F> ClosureAction<F>
where
	F: Fn(&TaskContext, &ChangeBatch<'_>) -> Result<()> + Send + Sync + 'static,
{
	pub fn new(name: impl Into<String>, closure: F) -> Self {
		Self {
			name: name.into(),
			closure,
		}
	}
}

impl<F> TaskAction for ClosureAction<F>
where
	F: Fn(&TaskContext, &ChangeBatch<'_>) -> Result<()> + Send + Sync + 'static,
{
	fn apply(&self, ctx: &TaskContext, batch: &ChangeBatch<'_>) -> Result<()> {
		(self.closure)(ctx, batch)
	}

	fn name(&self) -> &str {
		&self.name
	}
}

/// A scheduled unit of work: which cursors to read, how often, and what to do
/// with the records.
#[derive(Clone)]
pub struct TaskDefinition {
	id: TaskId,
	interval: Duration,
	sources: Vec<CursorId>,
	action: Arc<dyn TaskAction>,
}

impl TaskDefinition {
	pub fn new(id: impl Into<TaskId>, interval: Duration, action: Arc<dyn TaskAction>) -> Self {
		Self {
			id: id.into(),
			interval,
			sources: Vec::new(),
			action,
		}
	}

	pub fn with_source(mut self, cursor: CursorId) -> Self {
		if !self.sources.contains(&cursor) {
			self.sources.push(cursor);
		}
		self
	}

	pub fn with_sources(self, cursors: impl IntoIterator<Item = CursorId>) -> Self {
		cursors.into_iter().fold(self, |def, cursor| def.with_source(cursor))
	}

	pub fn id(&self) -> &TaskId {
		&self.id
	}

	pub fn interval(&self) -> Duration {
		self.interval
	}

	pub fn sources(&self) -> &[CursorId] {
		&self.sources
	}

	pub fn action(&self) -> &Arc<dyn TaskAction> {
		&self.action
	}
}

impl Debug for TaskDefinition {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("TaskDefinition")
			.field("id", &self.id)
			.field("interval", &self.interval)
			.field("sources", &self.sources)
			.field("action", &self.action.name())
			.finish()
	}
}
