// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::time::Duration;

use cdcflow_type::duration::millis_option;
use serde::{Deserialize, Serialize};

use crate::retry::RetryPolicy;

/// How due tasks of a single tick are executed.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ExecutionMode {
	/// One task after the other, in registration order.
	#[default]
	Sequential,
	/// In parallel on a dedicated thread pool.
	Concurrent {
		workers: usize,
	},
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
	pub execution: ExecutionMode,
	/// Maximum number of records handed to an action in one call
	pub batch_size: usize,
	/// Deadline for a whole execution; batches finishing past it are not committed
	#[serde(rename = "action_timeout_ms", with = "millis_option")]
	pub action_timeout: Option<Duration>,
	pub retry: RetryPolicy,
	/// Number of completed runs retained for [`runs`](crate::TaskScheduler::runs)
	pub history_limit: usize,
}

impl Default for SchedulerConfig {
	fn default() -> Self {
		Self {
			execution: ExecutionMode::Sequential,
			batch_size: 256,
			action_timeout: None,
			retry: RetryPolicy::NextTick,
			history_limit: 1024,
		}
	}
}

impl SchedulerConfig {
	pub fn concurrent(mut self, workers: usize) -> Self {
		self.execution = ExecutionMode::Concurrent {
			workers,
		};
		self
	}

	pub fn batch_size(mut self, batch_size: usize) -> Self {
		self.batch_size = batch_size;
		self
	}

	pub fn action_timeout(mut self, timeout: Duration) -> Self {
		self.action_timeout = Some(timeout);
		self
	}

	pub fn retry(mut self, retry: RetryPolicy) -> Self {
		self.retry = retry;
		self
	}

	pub fn history_limit(mut self, limit: usize) -> Self {
		self.history_limit = limit;
		self
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_partial_json_uses_defaults() {
		let config: SchedulerConfig =
			serde_json::from_str(r#"{"execution":{"mode":"concurrent","workers":4},"action_timeout_ms":2000}"#)
				.unwrap();

		assert_eq!(
			config.execution,
			ExecutionMode::Concurrent {
				workers: 4
			}
		);
		assert_eq!(config.action_timeout, Some(Duration::from_secs(2)));
		assert_eq!(config.batch_size, 256);
		assert_eq!(config.retry, RetryPolicy::NextTick);
	}

	#[test]
	fn test_builder_methods() {
		let config = SchedulerConfig::default().batch_size(10).history_limit(3).concurrent(2);
		assert_eq!(config.batch_size, 10);
		assert_eq!(config.history_limit, 3);
		assert!(matches!(config.execution, ExecutionMode::Concurrent { workers: 2 }));
	}
}
