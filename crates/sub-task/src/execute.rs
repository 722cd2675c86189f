// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::{
	any::Any,
	panic::{self, AssertUnwindSafe},
};

use cdcflow_cdc::CursorRegistry;
use cdcflow_type::{Error, Result};
use tracing::trace;

use crate::{
	run::{PipelineRun, RunOutcome},
	task::{ChangeBatch, TaskAction, TaskContext, TaskDefinition},
};

/// What happened when a task was asked to run once.
#[derive(Debug, Clone, PartialEq)]
pub enum Execution {
	/// The action was invoked; the run records how it ended.
	Completed(PipelineRun),
	/// Every source cursor was empty. No run was recorded.
	NoChanges,
	/// A previous execution of the task is still in progress.
	Busy,
}

impl Execution {
	pub fn run(&self) -> Option<&PipelineRun> {
		match self {
			Execution::Completed(run) => Some(run),
			_ => None,
		}
	}

	pub fn into_run(self) -> Option<PipelineRun> {
		match self {
			Execution::Completed(run) => Some(run),
			_ => None,
		}
	}

	pub fn is_success(&self) -> bool {
		self.run().is_some_and(PipelineRun::is_success)
	}
}

/// Feeds every pending record of the task's sources to its action, one batch at
/// a time, committing each cursor only past batches the action accepted.
///
/// Returns the number of committed records and the outcome.
pub(crate) fn run_sources(
	registry: &CursorRegistry,
	def: &TaskDefinition,
	ctx: &TaskContext,
	batch_size: usize,
) -> (u64, RunOutcome) {
	let mut processed = 0u64;

	for &cursor in def.sources() {
		let guard = match registry.begin_consume(cursor) {
			Ok(guard) => guard,
			Err(error) => {
				return (
					processed,
					RunOutcome::Failed {
						error,
					},
				);
			}
		};

		for records in guard.pending().chunks(batch_size.max(1)) {
			if let Some(outcome) = interrupted(ctx) {
				return (processed, outcome);
			}

			let batch = ChangeBatch {
				cursor,
				table: guard.table(),
				records,
			};
			trace!(task = %ctx.task(), cursor = cursor.0, records = batch.len(), "applying batch");

			if let Err(error) = apply(def.action().as_ref(), ctx, &batch) {
				return (
					processed,
					RunOutcome::Failed {
						error,
					},
				);
			}

			// a batch that finished past the deadline is redelivered later
			if let Some(outcome) = timed_out(ctx) {
				return (processed, outcome);
			}

			if let Some(last) = batch.last_sequence() {
				if let Err(error) = guard.commit_through(last) {
					return (
						processed,
						RunOutcome::Failed {
							error,
						},
					);
				}
			}
			processed += batch.len() as u64;
		}
	}

	(processed, RunOutcome::Succeeded)
}

fn interrupted(ctx: &TaskContext) -> Option<RunOutcome> {
	if ctx.is_cancelled() {
		return Some(RunOutcome::Cancelled);
	}
	timed_out(ctx)
}

fn timed_out(ctx: &TaskContext) -> Option<RunOutcome> {
	let deadline = ctx.deadline()?;
	ctx.is_past_deadline().then(|| RunOutcome::TimedOut {
		timeout: deadline.saturating_since(ctx.started_at()),
	})
}

/// Invokes the action, turning a panic into an action error.
fn apply(action: &dyn TaskAction, ctx: &TaskContext, batch: &ChangeBatch<'_>) -> Result<()> {
	match panic::catch_unwind(AssertUnwindSafe(|| action.apply(ctx, batch))) {
		Ok(result) => result,
		Err(payload) => Err(Error::action(format!("action '{}' panicked: {}", action.name(), panic_message(&*payload)))),
	}
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
	if let Some(message) = payload.downcast_ref::<&str>() {
		message.to_string()
	} else if let Some(message) = payload.downcast_ref::<String>() {
		message.clone()
	} else {
		"unknown panic payload".to_string()
	}
}
