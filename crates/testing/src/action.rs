// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Task actions with observable behaviour.

use std::{
	sync::{
		Arc,
		atomic::{AtomicBool, AtomicUsize, Ordering},
	},
	thread,
	time::Duration,
};

use cdcflow_cdc::ChangeRecord;
use cdcflow_sub_task::{ChangeBatch, TaskAction, TaskContext};
use cdcflow_type::{Error, MockClock, Result};
use parking_lot::Mutex;

/// Remembers every record and batch it was handed.
#[derive(Clone, Default)]
pub struct RecordingAction {
	records: Arc<Mutex<Vec<ChangeRecord>>>,
	batches: Arc<AtomicUsize>,
}

impl RecordingAction {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn records(&self) -> Vec<ChangeRecord> {
		self.records.lock().clone()
	}

	pub fn sequences(&self) -> Vec<u64> {
		self.records.lock().iter().map(|r| r.sequence.0).collect()
	}

	pub fn len(&self) -> usize {
		self.records.lock().len()
	}

	pub fn is_empty(&self) -> bool {
		self.records.lock().is_empty()
	}

	pub fn batches(&self) -> usize {
		self.batches.load(Ordering::SeqCst)
	}

	fn record(&self, batch: &ChangeBatch<'_>) {
		self.batches.fetch_add(1, Ordering::SeqCst);
		self.records.lock().extend(batch.iter().cloned());
	}
}

impl TaskAction for RecordingAction {
	fn apply(&self, _ctx: &TaskContext, batch: &ChangeBatch<'_>) -> Result<()> {
		self.record(batch);
		Ok(())
	}

	fn name(&self) -> &str {
		"recording"
	}
}

/// Fails a fixed number of times, then records like [`RecordingAction`].
#[derive(Clone)]
pub struct FailingAction {
	remaining: Arc<AtomicUsize>,
	attempts: Arc<AtomicUsize>,
	message: String,
	recorder: RecordingAction,
}

impl FailingAction {
	pub fn always(message: impl Into<String>) -> Self {
		Self::times(usize::MAX, message)
	}

	pub fn times(failures: usize, message: impl Into<String>) -> Self {
		Self {
			remaining: Arc::new(AtomicUsize::new(failures)),
			attempts: Arc::new(AtomicUsize::new(0)),
			message: message.into(),
			recorder: RecordingAction::new(),
		}
	}

	/// Records delivered in successful invocations.
	pub fn recorder(&self) -> &RecordingAction {
		&self.recorder
	}

	pub fn attempts(&self) -> usize {
		self.attempts.load(Ordering::SeqCst)
	}
}

impl TaskAction for FailingAction {
	fn apply(&self, _ctx: &TaskContext, batch: &ChangeBatch<'_>) -> Result<()> {
		self.attempts.fetch_add(1, Ordering::SeqCst);
		let failing = self.remaining.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1)).is_ok();
		if failing {
			return Err(Error::action(self.message.clone()));
		}
		self.recorder.record(batch);
		Ok(())
	}

	fn name(&self) -> &str {
		"failing"
	}
}

/// Panics on every invocation.
#[derive(Clone, Default)]
pub struct PanickingAction;

impl TaskAction for PanickingAction {
	fn apply(&self, _ctx: &TaskContext, _batch: &ChangeBatch<'_>) -> Result<()> {
		panic!("billing rule table is corrupt");
	}

	fn name(&self) -> &str {
		"panicking"
	}
}

/// Moves a mock clock forward on every batch, simulating slow work.
#[derive(Clone)]
pub struct SlowAction {
	clock: MockClock,
	per_batch: Duration,
	recorder: RecordingAction,
}

impl SlowAction {
	pub fn new(clock: MockClock, per_batch: Duration) -> Self {
		Self {
			clock,
			per_batch,
			recorder: RecordingAction::new(),
		}
	}

	pub fn recorder(&self) -> &RecordingAction {
		&self.recorder
	}
}

impl TaskAction for SlowAction {
	fn apply(&self, _ctx: &TaskContext, batch: &ChangeBatch<'_>) -> Result<()> {
		self.clock.advance(self.per_batch);
		self.recorder.record(batch);
		Ok(())
	}

	fn name(&self) -> &str {
		"slow"
	}
}

/// Parks inside every batch until [`release`](BlockingAction::release) is called.
#[derive(Clone, Default)]
pub struct BlockingAction {
	released: Arc<AtomicBool>,
	entered: Arc<AtomicUsize>,
	recorder: RecordingAction,
}

impl BlockingAction {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn release(&self) {
		self.released.store(true, Ordering::SeqCst);
	}

	/// Number of batches that have started.
	pub fn entered(&self) -> usize {
		self.entered.load(Ordering::SeqCst)
	}

	pub fn recorder(&self) -> &RecordingAction {
		&self.recorder
	}
}

impl TaskAction for BlockingAction {
	fn apply(&self, _ctx: &TaskContext, batch: &ChangeBatch<'_>) -> Result<()> {
		self.entered.fetch_add(1, Ordering::SeqCst);
		while !self.released.load(Ordering::SeqCst) {
			thread::sleep(Duration::from_millis(1));
		}
		self.recorder.record(batch);
		Ok(())
	}

	fn name(&self) -> &str {
		"blocking"
	}
}
