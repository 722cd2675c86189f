// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Telecom sample tables and rows.

use cdcflow_cdc::{ChangeLog, Operation, TableDef};
use cdcflow_type::{Result, Row, SequenceNumber, TableId, Value};

pub const CALLS: &str = "calls";
pub const SUBSCRIBERS: &str = "subscribers";

/// `calls`, keyed by `call_id`.
pub fn calls_table() -> TableDef {
	TableDef::keyed(CALLS, "call_id")
}

/// `subscribers`, keyed by `msisdn`.
pub fn subscribers_table() -> TableDef {
	TableDef::keyed(SUBSCRIBERS, "msisdn")
}

pub fn create_calls(log: &ChangeLog) -> Result<TableId> {
	log.create_table(calls_table())?;
	Ok(TableId::new(CALLS))
}

pub fn create_subscribers(log: &ChangeLog) -> Result<TableId> {
	log.create_table(subscribers_table())?;
	Ok(TableId::new(SUBSCRIBERS))
}

/// A call detail record.
pub fn call(call_id: i64, caller: &str, callee: &str, duration_secs: i64) -> Row {
	Row::new()
		.with("call_id", call_id)
		.with("caller", caller)
		.with("callee", callee)
		.with("duration_secs", duration_secs)
}

pub fn subscriber(msisdn: &str, plan: &str, balance: f64) -> Row {
	Row::new().with("msisdn", msisdn).with("plan", plan).with("balance", balance)
}

/// Append `count` call inserts with consecutive call ids, starting after the
/// table's current high-water mark. Returns the last sequence written.
pub fn seed_calls(log: &ChangeLog, table: &TableId, count: usize) -> Result<SequenceNumber> {
	let mut last = log.high_water_mark(table)?;
	for _ in 0..count {
		let call_id = last.0 as i64 + 1;
		let callee = if call_id % 7 == 0 {
			"+1-900-555-0100"
		} else {
			"+1-555-0199"
		};
		last = log.append(table, Operation::Insert, call(call_id, "+1-555-0100", callee, 30 + call_id % 600))?;
	}
	Ok(last)
}

/// Calls to premium-rate numbers.
pub fn is_premium_call(row: &Row) -> bool {
	matches!(row.get("callee"), Some(Value::Utf8(callee)) if callee.starts_with("+1-900"))
}
