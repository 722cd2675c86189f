// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::sync::Arc;

use cdcflow_cdc::{ChangeRecord, Operation};
use cdcflow_type::{Result, Row, RowKey, SequenceNumber, TableId};
use indexmap::IndexMap;
use parking_lot::RwLock;
use tracing::trace;

use super::{AppliedMarks, Sink};

#[derive(Default)]
struct ViewState {
	rows: IndexMap<RowKey, Row>,
	applied: AppliedMarks,
}

/// Keyed, continuously maintained copy of a table.
///
/// Inserts and updates upsert the row under its key, deletes remove it. Clones
/// share the same rows.
#[derive(Clone, Default)]
pub struct MaterializedView {
	state: Arc<RwLock<ViewState>>,
	columns: Option<Arc<[String]>>,
}

impl MaterializedView {
	pub fn new() -> Self {
		Self::default()
	}

	/// Keep only `columns` of each row.
	pub fn with_columns<I, C>(mut self, columns: I) -> Self
	where
		I: IntoIterator<Item = C>,
		C: Into<String>,
	{
		self.columns = Some(columns.into_iter().map(Into::into).collect());
		self
	}

	pub fn get(&self, key: &RowKey) -> Option<Row> {
		self.state.read().rows.get(key).cloned()
	}

	pub fn contains(&self, key: &RowKey) -> bool {
		self.state.read().rows.contains_key(key)
	}

	/// Rows in the order their keys were first inserted.
	pub fn rows(&self) -> Vec<(RowKey, Row)> {
		self.state.read().rows.iter().map(|(key, row)| (key.clone(), row.clone())).collect()
	}

	pub fn len(&self) -> usize {
		self.state.read().rows.len()
	}

	pub fn is_empty(&self) -> bool {
		self.state.read().rows.is_empty()
	}

	/// Highest sequence of `table` applied to the view.
	pub fn applied(&self, table: &TableId) -> Option<SequenceNumber> {
		self.state.read().applied.sequence(table)
	}

	fn project(&self, payload: &Row) -> Row {
		match &self.columns {
			None => payload.clone(),
			Some(columns) => columns.iter().fold(Row::new(), |row, column| match payload.get(column) {
				Some(value) => row.with(column.as_str(), value.clone()),
				None => row,
			}),
		}
	}
}

impl Sink for MaterializedView {
	fn write(&self, record: &ChangeRecord) -> Result<()> {
		let mut state = self.state.write();
		if state.applied.contains(record) {
			trace!(table = %record.table, sequence = record.sequence.0, "view skips redelivered record");
			return Ok(());
		}

		match record.operation {
			Operation::Insert | Operation::Update => {
				let row = self.project(&record.payload);
				state.rows.insert(record.row_key.clone(), row);
			}
			Operation::Delete => {
				state.rows.shift_remove(&record.row_key);
			}
		}
		state.applied.mark(record);
		Ok(())
	}
}
