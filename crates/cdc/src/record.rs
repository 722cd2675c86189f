// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::fmt::{self, Display, Formatter};

use cdcflow_type::{Error, Result, Row, RowKey, SequenceNumber, TableId, Timestamp};
use serde::{Deserialize, Serialize};

/// Kind of row mutation captured in the log.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
	Insert,
	Update,
	Delete,
}

impl Display for Operation {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		match self {
			Operation::Insert => f.write_str("INSERT"),
			Operation::Update => f.write_str("UPDATE"),
			Operation::Delete => f.write_str("DELETE"),
		}
	}
}

/// A single captured mutation. Immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeRecord {
	pub sequence: SequenceNumber,
	pub table: TableId,
	/// Incarnation of `table` the record was written to. Sequence numbers
	/// restart when a table is dropped and created again.
	#[serde(default)]
	pub epoch: u64,
	pub row_key: RowKey,
	pub operation: Operation,
	pub payload: Row,
	pub commit_time: Timestamp,
}

/// Definition of a captured table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDef {
	pub id: TableId,
	/// Column whose value identifies a row. Keyless tables key rows by sequence number.
	#[serde(default)]
	pub key_column: Option<String>,
}

impl TableDef {
	pub fn new(id: impl Into<TableId>) -> Self {
		Self {
			id: id.into(),
			key_column: None,
		}
	}

	pub fn keyed(id: impl Into<TableId>, key_column: impl Into<String>) -> Self {
		Self {
			id: id.into(),
			key_column: Some(key_column.into()),
		}
	}

	pub(crate) fn row_key(&self, payload: &Row, sequence: SequenceNumber) -> Result<RowKey> {
		let Some(column) = &self.key_column else {
			return Ok(RowKey(sequence.to_string()));
		};

		match payload.get(column) {
			Some(value) if !value.is_undefined() => Ok(RowKey(value.to_string())),
			_ => Err(Error::storage(format!(
				"row for table '{}' is missing key column '{}'",
				self.id, column
			))),
		}
	}
}
