// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Polling helpers for tests that observe a background scheduler thread.

use std::{
	thread::sleep,
	time::{Duration, Instant},
};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Poll `condition` every `poll_interval` until it holds.
///
/// # Panics
/// When `condition` is still false after `timeout`; the panic message ends with `message`.
pub fn wait_for_condition<F>(condition: F, timeout: Duration, poll_interval: Duration, message: &str)
where
	F: Fn() -> bool,
{
	let deadline = Instant::now() + timeout;
	loop {
		if condition() {
			return;
		}
		if Instant::now() >= deadline {
			panic!("condition not met within {:?}: {}", timeout, message);
		}
		sleep(poll_interval);
	}
}

/// [`wait_for_condition`] with [`DEFAULT_TIMEOUT`] and [`DEFAULT_POLL_INTERVAL`].
pub fn wait_for<F>(condition: F, message: &str)
where
	F: Fn() -> bool,
{
	wait_for_condition(condition, DEFAULT_TIMEOUT, DEFAULT_POLL_INTERVAL, message);
}
