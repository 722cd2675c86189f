// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::{
	collections::{HashMap, VecDeque},
	sync::{
		Arc,
		atomic::{AtomicU64, Ordering},
	},
};

use cdcflow_type::{Error, Result, Row, SequenceNumber, TableId, Timestamp};
use parking_lot::RwLock;
use tracing::{debug, trace};

use super::{CdcStorage, TableMarks};
use crate::record::{ChangeRecord, Operation, TableDef};

struct TableLog {
	def: TableDef,
	epoch: u64,
	high: SequenceNumber,
	// contiguous: records[i].sequence == records[0].sequence + i
	records: VecDeque<ChangeRecord>,
}

impl TableLog {
	fn low(&self) -> SequenceNumber {
		self.records.front().map(|r| r.sequence).unwrap_or(self.high.next())
	}
}

/// In-memory change log storage.
///
/// Appends lock only the target table; the table map itself is write-locked
/// only to create or drop tables.
#[derive(Clone, Default)]
pub struct MemoryCdcStorage {
	tables: Arc<RwLock<HashMap<TableId, Arc<RwLock<TableLog>>>>>,
	next_epoch: Arc<AtomicU64>,
}

impl MemoryCdcStorage {
	pub fn new() -> Self {
		Self::default()
	}

	fn table(&self, table: &TableId) -> Result<Arc<RwLock<TableLog>>> {
		self.tables
			.read()
			.get(table)
			.cloned()
			.ok_or_else(|| Error::storage(format!("table '{}' does not exist", table)))
	}
}

impl CdcStorage for MemoryCdcStorage {
	fn create_table(&self, def: TableDef) -> Result<u64> {
		let mut tables = self.tables.write();
		if tables.contains_key(&def.id) {
			return Err(Error::storage(format!("table '{}' already exists", def.id)));
		}

		let epoch = self.next_epoch.fetch_add(1, Ordering::Relaxed) + 1;
		debug!(table = %def.id, epoch, "created change log");

		tables.insert(
			def.id.clone(),
			Arc::new(RwLock::new(TableLog {
				def,
				epoch,
				high: SequenceNumber::ZERO,
				records: VecDeque::new(),
			})),
		);
		Ok(epoch)
	}

	fn drop_table(&self, table: &TableId) -> Result<()> {
		match self.tables.write().remove(table) {
			Some(_) => {
				debug!(table = %table, "dropped change log");
				Ok(())
			}
			None => Err(Error::storage(format!("table '{}' does not exist", table))),
		}
	}

	fn definition(&self, table: &TableId) -> Result<TableDef> {
		Ok(self.table(table)?.read().def.clone())
	}

	fn tables(&self) -> Vec<TableId> {
		let mut tables: Vec<_> = self.tables.read().keys().cloned().collect();
		tables.sort();
		tables
	}

	fn append(
		&self,
		table: &TableId,
		operation: Operation,
		payload: Row,
		commit_time: Timestamp,
	) -> Result<SequenceNumber> {
		let log = self.table(table)?;
		let mut log = log.write();

		let sequence = log.high.next();
		let epoch = log.epoch;
		let row_key = log.def.row_key(&payload, sequence)?;

		trace!(table = %table, sequence = sequence.0, %operation, key = %row_key, "append");

		log.records.push_back(ChangeRecord {
			sequence,
			table: table.clone(),
			epoch,
			row_key,
			operation,
			payload,
			commit_time,
		});
		log.high = sequence;
		Ok(sequence)
	}

	fn range(
		&self,
		table: &TableId,
		from: SequenceNumber,
		to: SequenceNumber,
		limit: usize,
	) -> Result<Vec<ChangeRecord>> {
		let log = self.table(table)?;
		let log = log.read();

		let start = from.max(log.low());
		if start >= to || limit == 0 {
			return Ok(Vec::new());
		}

		let offset = (start.0 - log.low().0) as usize;
		Ok(log.records.iter().skip(offset).take_while(|r| r.sequence < to).take(limit).cloned().collect())
	}

	fn marks(&self, table: &TableId) -> Result<TableMarks> {
		let log = self.table(table)?;
		let log = log.read();
		Ok(TableMarks {
			epoch: log.epoch,
			high: log.high,
			low: log.low(),
		})
	}

	fn compact(&self, table: &TableId, through: SequenceNumber) -> Result<usize> {
		let log = self.table(table)?;
		let mut log = log.write();

		let mut removed = 0;
		while log.records.front().is_some_and(|r| r.sequence <= through) {
			log.records.pop_front();
			removed += 1;
		}

		if removed > 0 {
			debug!(table = %table, through = through.0, removed, "compacted change log");
		}
		Ok(removed)
	}
}
