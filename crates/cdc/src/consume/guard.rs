// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::sync::Arc;

use cdcflow_type::{CursorId, Error, Result, SequenceNumber, TableId};
use tracing::trace;

use super::cursor::CursorSlot;
use crate::record::ChangeRecord;

/// Exclusive, two-phase consumption of a cursor.
///
/// Holds the snapshot of records that were pending when consumption began. The
/// cursor only moves when [`commit_through`](ConsumeGuard::commit_through) is called;
/// dropping the guard releases the cursor without advancing it.
pub struct ConsumeGuard {
	slot: Arc<CursorSlot>,
	cursor: CursorId,
	table: TableId,
	pending: Vec<ChangeRecord>,
}

impl ConsumeGuard {
	/// Caller must already hold the slot's consumption flag.
	pub(crate) fn new(slot: Arc<CursorSlot>, cursor: CursorId, table: TableId) -> Self {
		Self {
			slot,
			cursor,
			table,
			pending: Vec::new(),
		}
	}

	pub(crate) fn set_pending(&mut self, pending: Vec<ChangeRecord>) {
		self.pending = pending;
	}

	pub fn cursor(&self) -> CursorId {
		self.cursor
	}

	pub fn table(&self) -> &TableId {
		&self.table
	}

	pub fn pending(&self) -> &[ChangeRecord] {
		&self.pending
	}

	pub fn is_empty(&self) -> bool {
		self.pending.is_empty()
	}

	pub fn last_consumed(&self) -> SequenceNumber {
		self.slot.state.lock().last_consumed
	}

	/// Advance the cursor to `sequence`, which must lie within the pending snapshot.
	pub fn commit_through(&self, sequence: SequenceNumber) -> Result<()> {
		let current = self.last_consumed();
		if sequence < current {
			return Err(Error::InvalidOffset {
				cursor: self.cursor,
				target: sequence,
				reason: format!("cursor is already at {}", current),
			});
		}

		let upper = self.pending.last().map(|r| r.sequence).unwrap_or(current);
		if sequence > upper {
			return Err(Error::InvalidOffset {
				cursor: self.cursor,
				target: sequence,
				reason: format!("only records up to {} were read", upper),
			});
		}

		trace!(cursor = self.cursor.0, sequence = sequence.0, "commit");
		self.slot.advance(sequence);
		Ok(())
	}

	/// Advance the cursor past every pending record.
	pub fn commit(&self) -> Result<()> {
		match self.pending.last() {
			Some(last) => self.commit_through(last.sequence),
			None => Ok(()),
		}
	}

	pub fn into_records(mut self) -> Vec<ChangeRecord> {
		std::mem::take(&mut self.pending)
	}
}

impl Drop for ConsumeGuard {
	fn drop(&mut self) {
		self.slot.release();
	}
}
