// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::{
	fmt::{self, Display, Formatter},
	ops::{Add, Sub},
	sync::{
		Arc,
		atomic::{AtomicU64, Ordering},
	},
	time::{Duration, SystemTime, UNIX_EPOCH},
};

use serde::{Deserialize, Serialize};

/// Milliseconds since the Unix epoch.
#[repr(transparent)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(pub u64);

impl Timestamp {
	pub const ZERO: Timestamp = Timestamp(0);

	pub fn from_millis(millis: u64) -> Self {
		Self(millis)
	}

	pub fn from_secs(secs: u64) -> Self {
		Self(secs.saturating_mul(1000))
	}

	pub fn as_millis(&self) -> u64 {
		self.0
	}

	/// Time elapsed since `earlier`, zero if `earlier` is in the future.
	pub fn saturating_since(&self, earlier: Timestamp) -> Duration {
		Duration::from_millis(self.0.saturating_sub(earlier.0))
	}
}

impl Add<Duration> for Timestamp {
	type Output = Timestamp;

	fn add(self, rhs: Duration) -> Self::Output {
		let millis = u64::try_from(rhs.as_millis()).unwrap_or(u64::MAX);
		Timestamp(self.0.saturating_add(millis))
	}
}

impl Sub<Duration> for Timestamp {
	type Output = Timestamp;

	fn sub(self, rhs: Duration) -> Self::Output {
		let millis = u64::try_from(rhs.as_millis()).unwrap_or(u64::MAX);
		Timestamp(self.0.saturating_sub(millis))
	}
}

impl Display for Timestamp {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		write!(f, "{}ms", self.0)
	}
}

/// Source of wall-clock time for commit and run timestamps.
#[derive(Clone, Debug, Default)]
pub enum Clock {
	#[default]
	Real,
	Mock(MockClock),
}

impl Clock {
	pub fn now(&self) -> Timestamp {
		match self {
			Clock::Real => {
				let millis = SystemTime::now()
					.duration_since(UNIX_EPOCH)
					.map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
					.unwrap_or(0);
				Timestamp(millis)
			}
			Clock::Mock(mock) => mock.now(),
		}
	}

	pub fn now_millis(&self) -> u64 {
		self.now().0
	}
}

/// Manually driven clock for tests.
#[derive(Clone, Debug, Default)]
pub struct MockClock {
	millis: Arc<AtomicU64>,
}

impl MockClock {
	pub fn new(start: Timestamp) -> Self {
		Self {
			millis: Arc::new(AtomicU64::new(start.0)),
		}
	}

	pub fn now(&self) -> Timestamp {
		Timestamp(self.millis.load(Ordering::Acquire))
	}

	pub fn set(&self, at: Timestamp) {
		self.millis.store(at.0, Ordering::Release);
	}

	pub fn advance(&self, by: Duration) {
		let millis = u64::try_from(by.as_millis()).unwrap_or(u64::MAX);
		self.millis.fetch_add(millis, Ordering::AcqRel);
	}
}

impl From<MockClock> for Clock {
	fn from(value: MockClock) -> Self {
		Clock::Mock(value)
	}
}
