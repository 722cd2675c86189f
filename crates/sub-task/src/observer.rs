// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use tracing::{debug, error, warn};

use crate::run::{PipelineRun, RunOutcome};

/// Receives every completed [`PipelineRun`], e.g. to feed a dashboard.
pub trait RunObserver: Send + Sync {
	fn on_run(&self, run: &PipelineRun);
}

/// Emits one structured `tracing` event per completed run.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl RunObserver for TracingObserver {
	fn on_run(&self, run: &PipelineRun) {
		let duration_ms = run.duration().as_millis() as u64;
		match &run.outcome {
			RunOutcome::Succeeded => debug!(
				run = run.run_id.0,
				task = %run.task,
				records = run.records_processed,
				duration_ms,
				"task run succeeded"
			),
			RunOutcome::Cancelled => warn!(
				run = run.run_id.0,
				task = %run.task,
				records = run.records_processed,
				"task run cancelled"
			),
			RunOutcome::TimedOut {
				timeout,
			} => error!(
				run = run.run_id.0,
				task = %run.task,
				records = run.records_processed,
				timeout_ms = timeout.as_millis() as u64,
				"task run timed out"
			),
			RunOutcome::Failed {
				error,
			} => error!(
				run = run.run_id.0,
				task = %run.task,
				records = run.records_processed,
				code = error.code(),
				%error,
				"task run failed"
			),
		}
	}
}
