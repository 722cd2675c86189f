// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Destinations that task actions write change records into.
//!
//! Delivery is at-least-once: after a failed or interrupted run the same
//! records are handed over again. Both sinks here remember the sequence they
//! last applied per table incarnation and ignore anything at or below it, so
//! redelivery has no effect.

mod append;
mod view;

use std::{collections::HashMap, sync::Arc};

use cdcflow_cdc::ChangeRecord;
use cdcflow_sub_task::{ChangeBatch, TaskAction, TaskContext};
use cdcflow_type::{Result, SequenceNumber, TableId};
use tracing::trace;

pub use append::{AppendTable, AppendedRow};
pub use view::MaterializedView;

pub trait Sink: Send + Sync + 'static {
	fn write(&self, record: &ChangeRecord) -> Result<()>;

	/// Called once the records of a batch have been written.
	fn flush(&self) -> Result<()> {
		Ok(())
	}
}

/// Last record a sink applied per table, as `(epoch, sequence)`.
///
/// A recreated table restarts its sequence numbers under a higher epoch, so
/// the epoch is compared first.
#[derive(Debug, Default)]
pub(crate) struct AppliedMarks(HashMap<TableId, (u64, SequenceNumber)>);

impl AppliedMarks {
	pub(crate) fn contains(&self, record: &ChangeRecord) -> bool {
		self.0.get(&record.table).is_some_and(|&(epoch, sequence)| {
			record.epoch < epoch || (record.epoch == epoch && record.sequence <= sequence)
		})
	}

	pub(crate) fn mark(&mut self, record: &ChangeRecord) {
		self.0.insert(record.table.clone(), (record.epoch, record.sequence));
	}

	pub(crate) fn sequence(&self, table: &TableId) -> Option<SequenceNumber> {
		self.0.get(table).map(|&(_, sequence)| sequence)
	}
}

type Filter = Box<dyn Fn(&ChangeRecord) -> bool + Send + Sync>;

/// Task action that writes every record of a batch into a [`Sink`].
pub struct SinkAction<S> {
	name: String,
	sink: Arc<S>,
	filter: Option<Filter>,
}

impl<S: Sink> SinkAction<S> {
	pub fn new(name: impl Into<String>, sink: S) -> Self {
		Self {
			name: name.into(),
			sink: Arc::new(sink),
			filter: None,
		}
	}

	/// Only records matching `filter` reach the sink. Others still count as processed.
	pub fn with_filter<F>(mut self, filter: F) -> Self
	where
		F: Fn(&ChangeRecord) -> bool + Send + Sync + 'static,
	{
		self.filter = Some(Box::new(filter));
		self
	}

	pub fn sink(&self) -> &S {
		&self.sink
	}
}

impl<S: Sink> TaskAction for SinkAction<S> {
	fn apply(&self, ctx: &TaskContext, batch: &ChangeBatch<'_>) -> Result<()> {
		let mut written = 0usize;
		for record in batch {
			if self.filter.as_ref().is_some_and(|filter| !filter(record)) {
				continue;
			}
			self.sink.write(record)?;
			written += 1;
		}
		self.sink.flush()?;

		trace!(task = %ctx.task(), sink = %self.name, records = batch.len(), written, "sink batch");
		Ok(())
	}

	fn name(&self) -> &str {
		&self.name
	}
}
