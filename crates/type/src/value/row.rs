// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::Value;

/// Snapshot of a row: column name to value, in column order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Row {
	columns: IndexMap<String, Value>,
}

impl Row {
	pub fn new() -> Self {
		Self::default()
	}

	/// Builder-style column insertion.
	pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
		self.set(column, value);
		self
	}

	pub fn set(&mut self, column: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
		self.columns.insert(column.into(), value.into())
	}

	pub fn get(&self, column: &str) -> Option<&Value> {
		self.columns.get(column)
	}

	pub fn remove(&mut self, column: &str) -> Option<Value> {
		self.columns.shift_remove(column)
	}

	pub fn len(&self) -> usize {
		self.columns.len()
	}

	pub fn is_empty(&self) -> bool {
		self.columns.is_empty()
	}

	pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
		self.columns.iter().map(|(name, value)| (name.as_str(), value))
	}

	pub fn column_names(&self) -> impl Iterator<Item = &str> {
		self.columns.keys().map(String::as_str)
	}
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Row {
	fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
		Self {
			columns: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
		}
	}
}
