// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Storage backends for the change log.

mod memory;

use cdcflow_type::{Result, Row, SequenceNumber, TableId, Timestamp};
pub use memory::MemoryCdcStorage;

use crate::record::{ChangeRecord, Operation, TableDef};

/// Position markers of a table's log.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TableMarks {
	/// Incarnation of the table id; bumped every time the table is created.
	pub epoch: u64,
	/// Highest sequence number ever written (0 if none).
	pub high: SequenceNumber,
	/// Lowest sequence number still retained. `high + 1` when the log is empty.
	pub low: SequenceNumber,
}

/// Backend that durably stores per-table change records.
///
/// Implementations assign sequence numbers; they must be strictly increasing
/// per table and never reused, including across compaction.
pub trait CdcStorage: Send + Sync + 'static {
	/// Register a table. Returns the epoch assigned to this incarnation.
	fn create_table(&self, def: TableDef) -> Result<u64>;

	fn drop_table(&self, table: &TableId) -> Result<()>;

	fn definition(&self, table: &TableId) -> Result<TableDef>;

	fn tables(&self) -> Vec<TableId>;

	/// Append one mutation, returning the sequence number assigned to it.
	fn append(
		&self,
		table: &TableId,
		operation: Operation,
		payload: Row,
		commit_time: Timestamp,
	) -> Result<SequenceNumber>;

	/// Read up to `limit` records with `from <= sequence < to`, in sequence order.
	fn range(&self, table: &TableId, from: SequenceNumber, to: SequenceNumber, limit: usize)
	-> Result<Vec<ChangeRecord>>;

	fn marks(&self, table: &TableId) -> Result<TableMarks>;

	/// Discard records with `sequence <= through`. Returns the number removed.
	fn compact(&self, table: &TableId, through: SequenceNumber) -> Result<usize>;
}
