// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::{
	fmt::{self, Display, Formatter},
	ops::Deref,
};

use serde::{Deserialize, Serialize};

macro_rules! string_id {
	($(#[$meta:meta])* $name:ident) => {
		$(#[$meta])*
		#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
		#[serde(transparent)]
		pub struct $name(String);

		impl $name {
			pub fn new(id: impl Into<String>) -> Self {
				Self(id.into())
			}

			pub fn as_str(&self) -> &str {
				&self.0
			}
		}

		impl Display for $name {
			fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
				f.write_str(&self.0)
			}
		}

		impl From<&str> for $name {
			fn from(value: &str) -> Self {
				Self(value.to_string())
			}
		}

		impl From<String> for $name {
			fn from(value: String) -> Self {
				Self(value)
			}
		}
	};
}

macro_rules! numeric_id {
	($(#[$meta:meta])* $name:ident) => {
		$(#[$meta])*
		#[repr(transparent)]
		#[derive(Debug, Copy, Clone, PartialOrd, PartialEq, Ord, Eq, Hash, Serialize, Deserialize)]
		#[serde(transparent)]
		pub struct $name(pub u64);

		impl Display for $name {
			fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
				Display::fmt(&self.0, f)
			}
		}

		impl Deref for $name {
			type Target = u64;

			fn deref(&self) -> &Self::Target {
				&self.0
			}
		}

		impl From<u64> for $name {
			fn from(value: u64) -> Self {
				Self(value)
			}
		}

		impl From<$name> for u64 {
			fn from(value: $name) -> Self {
				value.0
			}
		}
	};
}

string_id!(
	/// Identifies a source table whose mutations are captured.
	TableId
);

string_id!(
	/// Identifies the consumer that owns a cursor.
	ConsumerId
);

string_id!(
	/// Identifies a scheduled task.
	TaskId
);

numeric_id!(
	/// Handle of a stream cursor.
	CursorId
);

numeric_id!(
	/// Identifier of a single task invocation.
	RunId
);

numeric_id!(
	/// Position of a change record within its table's log.
	///
	/// The first record of a table has sequence 1, so `SequenceNumber(0)` means nothing
	/// was consumed yet.
	SequenceNumber
);

impl SequenceNumber {
	pub const ZERO: SequenceNumber = SequenceNumber(0);

	pub fn next(self) -> SequenceNumber {
		SequenceNumber(self.0 + 1)
	}

	pub fn prev(self) -> SequenceNumber {
		SequenceNumber(self.0.saturating_sub(1))
	}
}

/// Primary key of a captured row, rendered from the table's key column.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RowKey(pub String);

impl RowKey {
	pub fn new(key: impl Into<String>) -> Self {
		Self(key.into())
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl Display for RowKey {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_sequence_number_navigation() {
		assert_eq!(SequenceNumber::ZERO.next(), SequenceNumber(1));
		assert_eq!(SequenceNumber(5).prev(), SequenceNumber(4));
		assert_eq!(SequenceNumber::ZERO.prev(), SequenceNumber::ZERO);
	}

	#[test]
	fn test_string_ids_serialize_transparently() {
		let id = TaskId::new("materialize_calls");
		assert_eq!(serde_json::to_string(&id).unwrap(), "\"materialize_calls\"");

		let back: TableId = serde_json::from_str("\"calls\"").unwrap();
		assert_eq!(back, TableId::from("calls"));
	}

	#[test]
	fn test_numeric_id_display() {
		assert_eq!(CursorId(7).to_string(), "7");
		assert_eq!(*RunId(3), 3);
	}
}
