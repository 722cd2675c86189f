// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Error taxonomy shared by every cdcflow crate.
//!
//! Each variant carries a stable diagnostic code so hosts can match on
//! failures without parsing messages.

use std::time::Duration;

use crate::id::{ConsumerId, CursorId, SequenceNumber, TableId, TaskId};

/// Result type for cdcflow operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
	/// The underlying change log could not be read or written.
	#[error("storage error: {message}")]
	Storage {
		message: String,
	},

	/// Two consumers tried to consume the same cursor at once.
	#[error("cursor {cursor} is already being consumed")]
	ConcurrentConsume {
		cursor: CursorId,
	},

	#[error("task '{task}' is already registered")]
	DuplicateTask {
		task: TaskId,
	},

	#[error("task '{task}' is not registered")]
	UnknownTask {
		task: TaskId,
	},

	#[error("cursor {cursor} does not exist")]
	UnknownCursor {
		cursor: CursorId,
	},

	#[error("consumer '{consumer}' already has a cursor on table '{table}'")]
	DuplicateCursor {
		consumer: ConsumerId,
		table: TableId,
	},

	/// The cursor's source table was dropped or re-created.
	#[error("cursor {cursor} was invalidated because table '{table}' was dropped")]
	CursorInvalidated {
		cursor: CursorId,
		table: TableId,
	},

	#[error("cannot move cursor {cursor} to {target}: {reason}")]
	InvalidOffset {
		cursor: CursorId,
		target: SequenceNumber,
		reason: String,
	},

	/// Raised by a task action. Captured into the run, never propagated out of a tick.
	#[error("task action failed: {message}")]
	Action {
		message: String,
	},

	#[error("task '{task}' exceeded its deadline of {timeout:?}")]
	Timeout {
		task: TaskId,
		timeout: Duration,
	},

	#[error("dependency cycle detected: {}", format_cycle(cycle))]
	CycleDetected {
		cycle: Vec<TaskId>,
	},

	#[error("task '{task}' is listed before its upstream '{upstream}'")]
	InvalidBatchOrder {
		task: TaskId,
		upstream: TaskId,
	},

	#[error("invalid configuration: {message}")]
	Config {
		message: String,
	},
}

impl Error {
	pub fn storage(message: impl Into<String>) -> Self {
		Error::Storage {
			message: message.into(),
		}
	}

	pub fn action(message: impl Into<String>) -> Self {
		Error::Action {
			message: message.into(),
		}
	}

	pub fn config(message: impl Into<String>) -> Self {
		Error::Config {
			message: message.into(),
		}
	}

	/// Stable diagnostic code of this error.
	pub fn code(&self) -> &'static str {
		match self {
			Error::Storage {
				..
			} => "CDC_001",
			Error::ConcurrentConsume {
				..
			} => "CDC_002",
			Error::UnknownCursor {
				..
			} => "CDC_003",
			Error::DuplicateCursor {
				..
			} => "CDC_004",
			Error::CursorInvalidated {
				..
			} => "CDC_005",
			Error::InvalidOffset {
				..
			} => "CDC_006",
			Error::DuplicateTask {
				..
			} => "TASK_001",
			Error::UnknownTask {
				..
			} => "TASK_002",
			Error::Action {
				..
			} => "TASK_003",
			Error::Timeout {
				..
			} => "TASK_004",
			Error::CycleDetected {
				..
			} => "FLOW_001",
			Error::InvalidBatchOrder {
				..
			} => "FLOW_002",
			Error::Config {
				..
			} => "CONFIG_001",
		}
	}

	/// Whether this error is attributed to a task action rather than to the caller.
	pub fn is_action_failure(&self) -> bool {
		matches!(
			self,
			Error::Action {
				..
			} | Error::Timeout {
				..
			}
		)
	}
}

fn format_cycle(cycle: &[TaskId]) -> String {
	cycle.iter().map(TaskId::as_str).collect::<Vec<_>>().join(" -> ")
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_codes_are_distinct() {
		let errors = vec![
			Error::storage("x"),
			Error::ConcurrentConsume {
				cursor: CursorId(1),
			},
			Error::UnknownCursor {
				cursor: CursorId(1),
			},
			Error::DuplicateCursor {
				consumer: ConsumerId::new("c"),
				table: TableId::new("t"),
			},
			Error::CursorInvalidated {
				cursor: CursorId(1),
				table: TableId::new("t"),
			},
			Error::InvalidOffset {
				cursor: CursorId(1),
				target: SequenceNumber(3),
				reason: "behind".to_string(),
			},
			Error::DuplicateTask {
				task: TaskId::new("a"),
			},
			Error::UnknownTask {
				task: TaskId::new("a"),
			},
			Error::action("boom"),
			Error::Timeout {
				task: TaskId::new("a"),
				timeout: Duration::from_secs(1),
			},
			Error::CycleDetected {
				cycle: vec![],
			},
			Error::InvalidBatchOrder {
				task: TaskId::new("b"),
				upstream: TaskId::new("a"),
			},
			Error::config("x"),
		];

		let mut codes: Vec<_> = errors.iter().map(Error::code).collect();
		codes.sort();
		codes.dedup();
		assert_eq!(codes.len(), errors.len());
	}

	#[test]
	fn test_cycle_message() {
		let err = Error::CycleDetected {
			cycle: vec![TaskId::new("a"), TaskId::new("b"), TaskId::new("a")],
		};
		assert_eq!(err.to_string(), "dependency cycle detected: a -> b -> a");
	}

	#[test]
	fn test_action_failure_classification() {
		assert!(Error::action("boom").is_action_failure());
		assert!(!Error::storage("disk").is_action_failure());
	}
}
