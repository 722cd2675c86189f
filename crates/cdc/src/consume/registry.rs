// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::{
	collections::HashMap,
	sync::{
		Arc,
		atomic::{AtomicU64, Ordering},
	},
};

use cdcflow_type::{ConsumerId, CursorId, Error, Result, SequenceNumber, TableId};
use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::{debug, warn};

use super::{
	cursor::{CursorSlot, StartPosition, StreamCursor},
	guard::ConsumeGuard,
};
use crate::{
	log::{ChangeLog, ChangeRange},
	record::ChangeRecord,
};

/// Registry of every stream cursor opened against a [`ChangeLog`].
///
/// Cheap to clone; clones share the same cursors.
#[derive(Clone)]
pub struct CursorRegistry {
	inner: Arc<Inner>,
}

struct Inner {
	log: ChangeLog,
	cursors: DashMap<CursorId, Arc<CursorSlot>>,
	// (consumer, table) -> cursor; also serialises cursor creation
	owners: Mutex<HashMap<(ConsumerId, TableId), CursorId>>,
	next_id: AtomicU64,
}

impl CursorRegistry {
	pub fn new(log: ChangeLog) -> Self {
		Self {
			inner: Arc::new(Inner {
				log,
				cursors: DashMap::new(),
				owners: Mutex::new(HashMap::new()),
				next_id: AtomicU64::new(1),
			}),
		}
	}

	pub fn log(&self) -> &ChangeLog {
		&self.inner.log
	}

	/// Open a cursor for `consumer` on `table`.
	pub fn create_cursor(
		&self,
		consumer: impl Into<ConsumerId>,
		table: &TableId,
		start: StartPosition,
	) -> Result<CursorId> {
		let consumer = consumer.into();
		let mut owners = self.inner.owners.lock();

		let key = (consumer.clone(), table.clone());
		if let Some(existing) = owners.get(&key) {
			// a cursor left behind by a dropped table does not block re-subscribing
			let stale =
				self.slot(*existing).map(|slot| self.validate(*existing, &slot).is_err()).unwrap_or(true);
			if !stale {
				return Err(Error::DuplicateCursor {
					consumer,
					table: table.clone(),
				});
			}
			self.inner.cursors.remove(existing);
		}

		let marks = self.inner.log.marks(table)?;
		let last_consumed = match start {
			StartPosition::Beginning => SequenceNumber::ZERO,
			StartPosition::Latest => marks.high,
		};

		let id = CursorId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
		let cursor = StreamCursor {
			id,
			consumer: consumer.clone(),
			table: table.clone(),
			last_consumed,
			created_at: self.inner.log.clock().now(),
			epoch: marks.epoch,
		};

		debug!(cursor = id.0, consumer = %consumer, table = %table, ?start, "cursor created");

		self.inner.cursors.insert(id, Arc::new(CursorSlot::new(cursor)));
		owners.insert(key, id);
		Ok(id)
	}

	pub fn drop_cursor(&self, cursor: CursorId) -> Result<()> {
		let Some((_, slot)) = self.inner.cursors.remove(&cursor) else {
			return Err(Error::UnknownCursor {
				cursor,
			});
		};

		let state = slot.snapshot();
		let mut owners = self.inner.owners.lock();
		let key = (state.consumer, state.table);
		if owners.get(&key) == Some(&cursor) {
			owners.remove(&key);
		}

		debug!(cursor = cursor.0, "cursor dropped");
		Ok(())
	}

	pub fn cursor(&self, cursor: CursorId) -> Result<StreamCursor> {
		Ok(self.slot(cursor)?.snapshot())
	}

	/// Cursor owned by `consumer` on `table`, if any.
	pub fn find(&self, consumer: &ConsumerId, table: &TableId) -> Option<CursorId> {
		self.inner.owners.lock().get(&(consumer.clone(), table.clone())).copied()
	}

	pub fn contains(&self, cursor: CursorId) -> bool {
		self.inner.cursors.contains_key(&cursor)
	}

	/// Every cursor, ordered by id.
	pub fn cursors(&self) -> Vec<StreamCursor> {
		let mut cursors: Vec<_> = self.inner.cursors.iter().map(|entry| entry.value().snapshot()).collect();
		cursors.sort_by_key(|c| c.id);
		cursors
	}

	pub fn cursors_for_table(&self, table: &TableId) -> Vec<StreamCursor> {
		self.cursors().into_iter().filter(|c| &c.table == table).collect()
	}

	pub fn is_valid(&self, cursor: CursorId) -> Result<bool> {
		let slot = self.slot(cursor)?;
		Ok(self.validate(cursor, &slot).is_ok())
	}

	/// Pending records from the cursor's offset to the current high-water mark.
	///
	/// Does not move the cursor; two peeks without an intervening append or
	/// consume yield the same records.
	pub fn peek(&self, cursor: CursorId) -> Result<ChangeRange> {
		let slot = self.slot(cursor)?;
		let state = self.validate(cursor, &slot)?;
		let high = self.inner.log.high_water_mark(&state.table)?;
		self.inner.log.read_range(&state.table, state.last_consumed.next(), Some(high.next()))
	}

	/// Number of records between the cursor's offset and the high-water mark.
	pub fn lag(&self, cursor: CursorId) -> Result<u64> {
		let slot = self.slot(cursor)?;
		let state = self.validate(cursor, &slot)?;
		let high = self.inner.log.high_water_mark(&state.table)?;
		Ok(high.0.saturating_sub(state.last_consumed.0))
	}

	/// Read every pending record and advance the cursor past them.
	///
	/// Fails with [`Error::ConcurrentConsume`] if the cursor is being consumed
	/// elsewhere. An empty result is not an error.
	pub fn consume(&self, cursor: CursorId) -> Result<Vec<ChangeRecord>> {
		let guard = self.begin_consume(cursor)?;
		guard.commit()?;
		Ok(guard.into_records())
	}

	/// Claim the cursor and snapshot its pending records without advancing it.
	pub fn begin_consume(&self, cursor: CursorId) -> Result<ConsumeGuard> {
		let slot = self.slot(cursor)?;
		if !slot.try_acquire() {
			return Err(Error::ConcurrentConsume {
				cursor,
			});
		}

		let state = slot.snapshot();
		// from here on the guard owns the flag and releases it on every exit path
		let mut guard = ConsumeGuard::new(Arc::clone(&slot), cursor, state.table.clone());

		self.validate(cursor, &slot)?;
		let high = self.inner.log.high_water_mark(&state.table)?;
		let pending =
			self.inner.log.read_range(&state.table, state.last_consumed.next(), Some(high.next()))?.to_vec()?;

		guard.set_pending(pending);
		Ok(guard)
	}

	/// Skip every record currently in the log.
	pub fn fast_forward(&self, cursor: CursorId) -> Result<SequenceNumber> {
		let slot = self.slot(cursor)?;
		let state = self.validate(cursor, &slot)?;
		let high = self.inner.log.high_water_mark(&state.table)?;
		self.fast_forward_to(cursor, high)?;
		Ok(high)
	}

	/// Move the cursor forward to `target` without delivering the skipped records.
	pub fn fast_forward_to(&self, cursor: CursorId, target: SequenceNumber) -> Result<()> {
		let slot = self.slot(cursor)?;
		if !slot.try_acquire() {
			return Err(Error::ConcurrentConsume {
				cursor,
			});
		}
		let _guard = ConsumeGuard::new(Arc::clone(&slot), cursor, slot.snapshot().table);

		let state = self.validate(cursor, &slot)?;
		if target < state.last_consumed {
			return Err(Error::InvalidOffset {
				cursor,
				target,
				reason: format!("cursor is already at {}", state.last_consumed),
			});
		}

		let high = self.inner.log.high_water_mark(&state.table)?;
		if target > high {
			return Err(Error::InvalidOffset {
				cursor,
				target,
				reason: format!("high-water mark is {}", high),
			});
		}

		debug!(cursor = cursor.0, from = state.last_consumed.0, to = target.0, "cursor fast-forwarded");
		slot.advance(target);
		Ok(())
	}

	/// Mark every cursor reading `table` as invalid. Returns how many were affected.
	pub fn invalidate_table(&self, table: &TableId) -> usize {
		let mut count = 0;
		for entry in self.inner.cursors.iter() {
			let slot = entry.value();
			if &slot.state.lock().table == table && !slot.is_invalidated() {
				slot.invalidate();
				count += 1;
			}
		}
		if count > 0 {
			warn!(table = %table, cursors = count, "cursors invalidated");
		}
		count
	}

	fn slot(&self, cursor: CursorId) -> Result<Arc<CursorSlot>> {
		self.inner.cursors.get(&cursor).map(|slot| Arc::clone(slot.value())).ok_or(Error::UnknownCursor {
			cursor,
		})
	}

	/// Checks the cursor still reads the same incarnation of its table.
	fn validate(&self, cursor: CursorId, slot: &CursorSlot) -> Result<StreamCursor> {
		let state = slot.snapshot();
		let table = state.table.clone();
		let invalid = || Error::CursorInvalidated {
			cursor,
			table: table.clone(),
		};

		if slot.is_invalidated() {
			return Err(invalid());
		}

		match self.inner.log.marks(&state.table) {
			Ok(marks) if marks.epoch == state.epoch => Ok(state),
			_ => {
				slot.invalidate();
				Err(invalid())
			}
		}
	}
}
