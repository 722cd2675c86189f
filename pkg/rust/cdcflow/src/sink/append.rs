// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::sync::Arc;

use cdcflow_cdc::{ChangeRecord, Operation};
use cdcflow_type::{Result, Row, RowKey, SequenceNumber, TableId, Timestamp};
use parking_lot::RwLock;

use super::{AppliedMarks, Sink};

/// A row written to an [`AppendTable`], together with the change that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct AppendedRow {
	pub table: TableId,
	pub sequence: SequenceNumber,
	pub row_key: RowKey,
	pub operation: Operation,
	pub row: Row,
	pub commit_time: Timestamp,
}

#[derive(Default)]
struct AppendState {
	rows: Vec<AppendedRow>,
	applied: AppliedMarks,
}

/// Append-only table, e.g. an alert feed. Clones share the same rows.
#[derive(Clone, Default)]
pub struct AppendTable {
	state: Arc<RwLock<AppendState>>,
}

impl AppendTable {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn rows(&self) -> Vec<AppendedRow> {
		self.state.read().rows.clone()
	}

	pub fn len(&self) -> usize {
		self.state.read().rows.len()
	}

	pub fn is_empty(&self) -> bool {
		self.state.read().rows.is_empty()
	}

	pub fn last(&self) -> Option<AppendedRow> {
		self.state.read().rows.last().cloned()
	}
}

impl Sink for AppendTable {
	fn write(&self, record: &ChangeRecord) -> Result<()> {
		let mut state = self.state.write();
		if state.applied.contains(record) {
			return Ok(());
		}

		state.rows.push(AppendedRow {
			table: record.table.clone(),
			sequence: record.sequence,
			row_key: record.row_key.clone(),
			operation: record.operation,
			row: record.payload.clone(),
			commit_time: record.commit_time,
		});
		state.applied.mark(record);
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn call(sequence: u64) -> ChangeRecord {
		ChangeRecord {
			sequence: SequenceNumber(sequence),
			table: TableId::new("calls"),
			epoch: 1,
			row_key: RowKey::new(sequence.to_string()),
			operation: Operation::Insert,
			payload: Row::new().with("call_id", sequence as i64),
			commit_time: Timestamp::from_secs(sequence),
		}
	}

	#[test]
	fn test_appends_in_order() {
		let table = AppendTable::new();
		for sequence in 1..=3 {
			table.write(&call(sequence)).unwrap();
		}

		let sequences: Vec<u64> = table.rows().iter().map(|r| r.sequence.0).collect();
		assert_eq!(sequences, vec![1, 2, 3]);
		assert_eq!(table.last().map(|r| r.commit_time), Some(Timestamp::from_secs(3)));
	}

	#[test]
	fn test_redelivered_records_are_not_appended_twice() {
		let table = AppendTable::new();
		table.write(&call(1)).unwrap();
		table.write(&call(2)).unwrap();
		table.write(&call(1)).unwrap();
		table.write(&call(2)).unwrap();
		table.write(&call(3)).unwrap();

		assert_eq!(table.len(), 3);
	}

	#[test]
	fn test_recreated_table_restarts_numbering() {
		let table = AppendTable::new();
		for sequence in 1..=3 {
			table.write(&call(sequence)).unwrap();
		}

		let recreated = ChangeRecord {
			epoch: 2,
			..call(1)
		};
		table.write(&recreated).unwrap();
		// a late record from the dropped incarnation
		table.write(&call(3)).unwrap();

		assert_eq!(table.len(), 4);
		assert_eq!(table.last().map(|r| r.sequence), Some(SequenceNumber(1)));
	}
}
