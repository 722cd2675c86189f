// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::{sync::Arc, thread};

use cdcflow_cdc::{ChangeLog, CursorRegistry, Operation, StartPosition};
use cdcflow_testing::telecom;
use cdcflow_type::{Clock, ConsumerId, Error, Result, SequenceNumber};

fn setup() -> Result<(CursorRegistry, cdcflow_type::TableId)> {
	let log = ChangeLog::memory(Clock::default());
	let calls = telecom::create_calls(&log)?;
	Ok((CursorRegistry::new(log), calls))
}

#[test]
fn test_consume_three_inserts_then_empty() -> Result<()> {
	let (registry, calls) = setup()?;
	telecom::seed_calls(registry.log(), &calls, 3)?;

	let cursor = registry.create_cursor("billing", &calls, StartPosition::Beginning)?;

	let records = registry.consume(cursor)?;
	let sequences: Vec<u64> = records.iter().map(|r| r.sequence.0).collect();
	assert_eq!(sequences, vec![1, 2, 3]);
	assert!(records.iter().all(|r| r.operation == Operation::Insert));
	assert_eq!(registry.cursor(cursor)?.last_consumed, SequenceNumber(3));

	assert!(registry.consume(cursor)?.is_empty());
	Ok(())
}

#[test]
fn test_peek_after_consume_is_empty() -> Result<()> {
	let (registry, calls) = setup()?;
	let cursor = registry.create_cursor("billing", &calls, StartPosition::Beginning)?;
	telecom::seed_calls(registry.log(), &calls, 2)?;

	registry.consume(cursor)?;
	assert!(registry.peek(cursor)?.is_empty()?);

	telecom::seed_calls(registry.log(), &calls, 1)?;
	let pending = registry.peek(cursor)?.to_vec()?;
	assert_eq!(pending.len(), 1);
	assert_eq!(pending[0].sequence, SequenceNumber(3));
	Ok(())
}

#[test]
fn test_peek_is_idempotent() -> Result<()> {
	let (registry, calls) = setup()?;
	telecom::seed_calls(registry.log(), &calls, 4)?;
	let cursor = registry.create_cursor("fraud", &calls, StartPosition::Beginning)?;

	let first = registry.peek(cursor)?.to_vec()?;
	let second = registry.peek(cursor)?.to_vec()?;
	assert_eq!(first, second);
	assert_eq!(registry.cursor(cursor)?.last_consumed, SequenceNumber::ZERO);
	Ok(())
}

#[test]
fn test_latest_cursor_skips_existing_records() -> Result<()> {
	let (registry, calls) = setup()?;
	telecom::seed_calls(registry.log(), &calls, 5)?;

	let cursor = registry.create_cursor("dashboard", &calls, StartPosition::Latest)?;
	assert!(registry.consume(cursor)?.is_empty());

	telecom::seed_calls(registry.log(), &calls, 1)?;
	assert_eq!(registry.consume(cursor)?.len(), 1);
	Ok(())
}

#[test]
fn test_concurrent_consume_is_rejected() -> Result<()> {
	let (registry, calls) = setup()?;
	telecom::seed_calls(registry.log(), &calls, 2)?;
	let cursor = registry.create_cursor("billing", &calls, StartPosition::Beginning)?;

	let guard = registry.begin_consume(cursor)?;
	let err = registry.consume(cursor).unwrap_err();
	assert_eq!(
		err,
		Error::ConcurrentConsume {
			cursor
		}
	);

	drop(guard);
	assert_eq!(registry.consume(cursor)?.len(), 2);
	Ok(())
}

#[test]
fn test_uncommitted_guard_leaves_cursor_in_place() -> Result<()> {
	let (registry, calls) = setup()?;
	telecom::seed_calls(registry.log(), &calls, 3)?;
	let cursor = registry.create_cursor("billing", &calls, StartPosition::Beginning)?;

	{
		let guard = registry.begin_consume(cursor)?;
		assert_eq!(guard.pending().len(), 3);
	}

	assert_eq!(registry.cursor(cursor)?.last_consumed, SequenceNumber::ZERO);
	assert_eq!(registry.peek(cursor)?.to_vec()?.len(), 3);
	Ok(())
}

#[test]
fn test_partial_commit() -> Result<()> {
	let (registry, calls) = setup()?;
	telecom::seed_calls(registry.log(), &calls, 5)?;
	let cursor = registry.create_cursor("billing", &calls, StartPosition::Beginning)?;

	let guard = registry.begin_consume(cursor)?;
	guard.commit_through(SequenceNumber(2))?;
	assert!(guard.commit_through(SequenceNumber(1)).is_err());
	assert!(guard.commit_through(SequenceNumber(6)).is_err());
	drop(guard);

	let remaining: Vec<u64> = registry.peek(cursor)?.to_vec()?.iter().map(|r| r.sequence.0).collect();
	assert_eq!(remaining, vec![3, 4, 5]);
	Ok(())
}

#[test]
fn test_only_one_of_many_threads_consumes_each_record() -> Result<()> {
	let (registry, calls) = setup()?;
	telecom::seed_calls(registry.log(), &calls, 50)?;
	let cursor = registry.create_cursor("billing", &calls, StartPosition::Beginning)?;

	let delivered = Arc::new(parking_lot::Mutex::new(Vec::new()));
	let handles: Vec<_> = (0..8)
		.map(|_| {
			let registry = registry.clone();
			let delivered = Arc::clone(&delivered);
			thread::spawn(move || {
				for _ in 0..20 {
					match registry.consume(cursor) {
						Ok(records) => delivered.lock().extend(records.into_iter().map(|r| r.sequence.0)),
						Err(Error::ConcurrentConsume {
							..
						}) => {}
						Err(err) => panic!("unexpected error: {err}"),
					}
				}
			})
		})
		.collect();

	for handle in handles {
		handle.join().unwrap();
	}

	let mut delivered = delivered.lock().clone();
	delivered.sort();
	assert_eq!(delivered, (1..=50).collect::<Vec<_>>());
	Ok(())
}

#[test]
fn test_fast_forward() -> Result<()> {
	let (registry, calls) = setup()?;
	telecom::seed_calls(registry.log(), &calls, 6)?;
	let cursor = registry.create_cursor("billing", &calls, StartPosition::Beginning)?;

	registry.fast_forward_to(cursor, SequenceNumber(4))?;
	assert_eq!(registry.peek(cursor)?.to_vec()?.len(), 2);

	assert!(matches!(
		registry.fast_forward_to(cursor, SequenceNumber(2)),
		Err(Error::InvalidOffset {
			..
		})
	));
	assert!(registry.fast_forward_to(cursor, SequenceNumber(7)).is_err());

	assert_eq!(registry.fast_forward(cursor)?, SequenceNumber(6));
	assert!(registry.peek(cursor)?.is_empty()?);
	Ok(())
}

#[test]
fn test_duplicate_cursor_for_consumer() -> Result<()> {
	let (registry, calls) = setup()?;
	let cursor = registry.create_cursor("billing", &calls, StartPosition::Beginning)?;

	assert!(matches!(
		registry.create_cursor("billing", &calls, StartPosition::Beginning),
		Err(Error::DuplicateCursor {
			..
		})
	));
	assert_eq!(registry.find(&ConsumerId::new("billing"), &calls), Some(cursor));

	registry.drop_cursor(cursor)?;
	assert!(registry.find(&ConsumerId::new("billing"), &calls).is_none());
	registry.create_cursor("billing", &calls, StartPosition::Beginning)?;
	Ok(())
}

#[test]
fn test_dropping_table_invalidates_cursors() -> Result<()> {
	let (registry, calls) = setup()?;
	telecom::seed_calls(registry.log(), &calls, 2)?;
	let billing = registry.create_cursor("billing", &calls, StartPosition::Beginning)?;
	let fraud = registry.create_cursor("fraud", &calls, StartPosition::Beginning)?;

	registry.log().drop_table(&calls)?;
	assert_eq!(registry.invalidate_table(&calls), 2);

	for cursor in [billing, fraud] {
		assert!(matches!(
			registry.consume(cursor),
			Err(Error::CursorInvalidated {
				..
			})
		));
	}
	Ok(())
}

#[test]
fn test_recreated_table_is_detected_lazily() -> Result<()> {
	let (registry, calls) = setup()?;
	let cursor = registry.create_cursor("billing", &calls, StartPosition::Beginning)?;

	registry.log().drop_table(&calls)?;
	telecom::create_calls(registry.log())?;
	telecom::seed_calls(registry.log(), &calls, 1)?;

	assert!(matches!(
		registry.peek(cursor),
		Err(Error::CursorInvalidated {
			..
		})
	));
	assert!(!registry.is_valid(cursor)?);

	// the consumer may subscribe to the new incarnation
	let fresh = registry.create_cursor("billing", &calls, StartPosition::Beginning)?;
	assert_eq!(registry.consume(fresh)?.len(), 1);
	Ok(())
}

#[test]
fn test_unknown_cursor() {
	let (registry, _) = setup().unwrap();
	assert!(matches!(
		registry.peek(cdcflow_type::CursorId(99)),
		Err(Error::UnknownCursor {
			..
		})
	));
}
