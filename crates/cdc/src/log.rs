// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::{collections::VecDeque, fmt, sync::Arc};

use cdcflow_type::{Clock, Result, Row, SequenceNumber, TableId};
use tracing::debug;

use crate::{
	record::{ChangeRecord, Operation, TableDef},
	storage::{CdcStorage, MemoryCdcStorage, TableMarks},
};

/// Number of records fetched from storage per page while iterating a range
const DEFAULT_PAGE_SIZE: usize = 256;

/// Append-only, per-table record of row mutations.
///
/// Cheap to clone; clones share the same storage.
#[derive(Clone)]
pub struct ChangeLog {
	storage: Arc<dyn CdcStorage>,
	clock: Clock,
	page_size: usize,
}

impl ChangeLog {
	pub fn new(storage: impl CdcStorage, clock: Clock) -> Self {
		Self {
			storage: Arc::new(storage),
			clock,
			page_size: DEFAULT_PAGE_SIZE,
		}
	}

	/// Change log backed by [`MemoryCdcStorage`].
	pub fn memory(clock: Clock) -> Self {
		Self::new(MemoryCdcStorage::new(), clock)
	}

	pub fn with_page_size(mut self, page_size: usize) -> Self {
		self.page_size = page_size.max(1);
		self
	}

	pub fn clock(&self) -> &Clock {
		&self.clock
	}

	pub fn create_table(&self, def: TableDef) -> Result<()> {
		self.storage.create_table(def).map(|_| ())
	}

	pub fn drop_table(&self, table: &TableId) -> Result<()> {
		self.storage.drop_table(table)
	}

	pub fn definition(&self, table: &TableId) -> Result<TableDef> {
		self.storage.definition(table)
	}

	pub fn tables(&self) -> Vec<TableId> {
		self.storage.tables()
	}

	/// Append a mutation and return its sequence number.
	///
	/// Fails with a storage error when the table is unknown.
	pub fn append(&self, table: &TableId, operation: Operation, payload: Row) -> Result<SequenceNumber> {
		self.storage.append(table, operation, payload, self.clock.now())
	}

	/// Records with `from <= sequence < to`; an omitted `to` reads up to the
	/// high-water mark observed when iteration starts.
	pub fn read_range(&self, table: &TableId, from: SequenceNumber, to: Option<SequenceNumber>) -> Result<ChangeRange> {
		// surface unknown tables eagerly rather than on first iteration
		self.storage.marks(table)?;

		Ok(ChangeRange {
			storage: Arc::clone(&self.storage),
			table: table.clone(),
			from,
			to,
			page_size: self.page_size,
		})
	}

	pub fn high_water_mark(&self, table: &TableId) -> Result<SequenceNumber> {
		Ok(self.storage.marks(table)?.high)
	}

	pub fn low_water_mark(&self, table: &TableId) -> Result<SequenceNumber> {
		Ok(self.storage.marks(table)?.low)
	}

	pub fn marks(&self, table: &TableId) -> Result<TableMarks> {
		self.storage.marks(table)
	}

	/// Discard records up to and including `through`.
	pub fn compact(&self, table: &TableId, through: SequenceNumber) -> Result<usize> {
		let removed = self.storage.compact(table, through)?;
		debug!(table = %table, through = through.0, removed, "change log compaction");
		Ok(removed)
	}
}

impl fmt::Debug for ChangeLog {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ChangeLog").field("tables", &self.storage.tables()).finish()
	}
}

/// A lazy, restartable range of change records.
///
/// Every call to [`ChangeRange::iter`] starts a fresh pass from `from`.
#[derive(Clone)]
pub struct ChangeRange {
	storage: Arc<dyn CdcStorage>,
	table: TableId,
	from: SequenceNumber,
	to: Option<SequenceNumber>,
	page_size: usize,
}

impl ChangeRange {
	pub fn table(&self) -> &TableId {
		&self.table
	}

	pub fn from(&self) -> SequenceNumber {
		self.from
	}

	pub fn to(&self) -> Option<SequenceNumber> {
		self.to
	}

	pub fn iter(&self) -> ChangeIter {
		ChangeIter {
			storage: Arc::clone(&self.storage),
			table: self.table.clone(),
			next: self.from,
			end: self.to,
			page: VecDeque::new(),
			page_size: self.page_size,
			done: false,
		}
	}

	pub fn to_vec(&self) -> Result<Vec<ChangeRecord>> {
		self.iter().collect()
	}

	pub fn is_empty(&self) -> Result<bool> {
		Ok(self.iter().next().transpose()?.is_none())
	}
}

impl<'a> IntoIterator for &'a ChangeRange {
	type Item = Result<ChangeRecord>;
	type IntoIter = ChangeIter;

	fn into_iter(self) -> Self::IntoIter {
		self.iter()
	}
}

impl fmt::Debug for ChangeRange {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ChangeRange")
			.field("table", &self.table)
			.field("from", &self.from)
			.field("to", &self.to)
			.finish()
	}
}

/// Iterator over a [`ChangeRange`], fetching one page at a time.
pub struct ChangeIter {
	storage: Arc<dyn CdcStorage>,
	table: TableId,
	next: SequenceNumber,
	end: Option<SequenceNumber>,
	page: VecDeque<ChangeRecord>,
	page_size: usize,
	done: bool,
}

impl ChangeIter {
	fn fill(&mut self) -> Result<()> {
		let end = match self.end {
			Some(end) => end,
			None => {
				let end = self.storage.marks(&self.table)?.high.next();
				self.end = Some(end);
				end
			}
		};

		let page = self.storage.range(&self.table, self.next, end, self.page_size)?;
		match page.last() {
			Some(last) => self.next = last.sequence.next(),
			None => self.done = true,
		}
		self.page.extend(page);
		Ok(())
	}
}

impl Iterator for ChangeIter {
	type Item = Result<ChangeRecord>;

	fn next(&mut self) -> Option<Self::Item> {
		if self.page.is_empty() && !self.done {
			if let Err(err) = self.fill() {
				self.done = true;
				return Some(Err(err));
			}
		}
		self.page.pop_front().map(Ok)
	}
}
