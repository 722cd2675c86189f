// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::sync::atomic::{AtomicBool, Ordering};

use cdcflow_type::{ConsumerId, CursorId, SequenceNumber, TableId, Timestamp};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Where a new cursor starts reading.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StartPosition {
	/// Deliver every record still retained in the log.
	#[default]
	Beginning,
	/// Deliver only records appended after the cursor was created.
	Latest,
}

/// A consumer's read offset into one table's change log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreamCursor {
	pub id: CursorId,
	pub consumer: ConsumerId,
	pub table: TableId,
	pub last_consumed: SequenceNumber,
	pub created_at: Timestamp,
	/// Epoch of the table incarnation this cursor reads from.
	pub epoch: u64,
}

pub(crate) struct CursorSlot {
	pub(crate) state: Mutex<StreamCursor>,
	consuming: AtomicBool,
	invalidated: AtomicBool,
}

impl CursorSlot {
	pub(crate) fn new(cursor: StreamCursor) -> Self {
		Self {
			state: Mutex::new(cursor),
			consuming: AtomicBool::new(false),
			invalidated: AtomicBool::new(false),
		}
	}

	pub(crate) fn snapshot(&self) -> StreamCursor {
		self.state.lock().clone()
	}

	/// Claim exclusive consumption. Returns false if another consumer holds it.
	pub(crate) fn try_acquire(&self) -> bool {
		self.consuming.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire).is_ok()
	}

	pub(crate) fn release(&self) {
		self.consuming.store(false, Ordering::Release);
	}

	pub(crate) fn invalidate(&self) {
		self.invalidated.store(true, Ordering::Release);
	}

	pub(crate) fn is_invalidated(&self) -> bool {
		self.invalidated.load(Ordering::Acquire)
	}

	/// Move the offset forward. Never moves it backwards.
	pub(crate) fn advance(&self, to: SequenceNumber) {
		let mut state = self.state.lock();
		if to > state.last_consumed {
			state.last_consumed = to;
		}
	}
}
