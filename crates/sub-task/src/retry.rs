// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::time::Duration;

use cdcflow_type::duration::millis;
use serde::{Deserialize, Serialize};

/// When a failed task becomes due again.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum RetryPolicy {
	/// Retry at the task's regular next due time.
	#[default]
	NextTick,
	/// Retry after a constant delay.
	Fixed {
		#[serde(rename = "delay_ms", with = "millis")]
		delay: Duration,
	},
	/// Retry after `base * 2^(failures - 1)`, capped at `max`.
	Exponential {
		#[serde(rename = "base_ms", with = "millis")]
		base: Duration,
		#[serde(rename = "max_ms", with = "millis")]
		max: Duration,
	},
}

impl RetryPolicy {
	/// Delay before the next attempt after `failures` consecutive failures.
	///
	/// `None` means the task keeps its regular interval.
	pub fn delay(&self, failures: u32) -> Option<Duration> {
		if failures == 0 {
			return None;
		}

		match *self {
			RetryPolicy::NextTick => None,
			RetryPolicy::Fixed {
				delay,
			} => Some(delay),
			RetryPolicy::Exponential {
				base,
				max,
			} => {
				let factor = 1u32.checked_shl(failures - 1).unwrap_or(u32::MAX);
				Some(base.checked_mul(factor).unwrap_or(max).min(max))
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_next_tick_keeps_interval() {
		assert_eq!(RetryPolicy::NextTick.delay(3), None);
	}

	#[test]
	fn test_no_delay_without_failures() {
		let policy = RetryPolicy::Fixed {
			delay: Duration::from_secs(5),
		};
		assert_eq!(policy.delay(0), None);
		assert_eq!(policy.delay(1), Some(Duration::from_secs(5)));
		assert_eq!(policy.delay(9), Some(Duration::from_secs(5)));
	}

	#[test]
	fn test_exponential_doubles_until_capped() {
		let policy = RetryPolicy::Exponential {
			base: Duration::from_secs(1),
			max: Duration::from_secs(10),
		};
		let delays: Vec<_> = (1..=6).map(|n| policy.delay(n).unwrap().as_secs()).collect();
		assert_eq!(delays, vec![1, 2, 4, 8, 10, 10]);
	}

	#[test]
	fn test_exponential_survives_huge_failure_counts() {
		let policy = RetryPolicy::Exponential {
			base: Duration::from_secs(1),
			max: Duration::from_secs(300),
		};
		assert_eq!(policy.delay(u32::MAX), Some(Duration::from_secs(300)));
	}

	#[test]
	fn test_json_form() {
		let policy: RetryPolicy =
			serde_json::from_str(r#"{"policy":"exponential","base_ms":500,"max_ms":60000}"#).unwrap();
		assert_eq!(
			policy,
			RetryPolicy::Exponential {
				base: Duration::from_millis(500),
				max: Duration::from_secs(60),
			}
		);
	}
}
