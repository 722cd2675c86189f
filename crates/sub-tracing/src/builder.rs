// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use cdcflow_type::{Error, Result};
use tracing::Level;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Output format of log lines.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum LogFormat {
	#[default]
	Compact,
	Pretty,
	/// One JSON object per event.
	Json,
}

/// Builder for the process-wide subscriber.
///
/// The filter defaults to `info`; `RUST_LOG` takes precedence unless
/// [`ignore_env`](TracingBuilder::ignore_env) is set.
#[derive(Debug, Clone)]
pub struct TracingBuilder {
	filter: String,
	format: LogFormat,
	use_env: bool,
	with_target: bool,
	with_thread_names: bool,
	with_ansi: bool,
}

impl Default for TracingBuilder {
	fn default() -> Self {
		Self::new()
	}
}

impl TracingBuilder {
	pub fn new() -> Self {
		Self {
			filter: "info".to_string(),
			format: LogFormat::Compact,
			use_env: true,
			with_target: true,
			with_thread_names: false,
			with_ansi: true,
		}
	}

	pub fn with_level(mut self, level: Level) -> Self {
		self.filter = level.to_string().to_lowercase();
		self
	}

	/// Filter directives, e.g. `"info,cdcflow_sub_task=trace"`.
	pub fn with_filter(mut self, directives: impl Into<String>) -> Self {
		self.filter = directives.into();
		self
	}

	pub fn with_format(mut self, format: LogFormat) -> Self {
		self.format = format;
		self
	}

	pub fn json(self) -> Self {
		self.with_format(LogFormat::Json)
	}

	pub fn ignore_env(mut self) -> Self {
		self.use_env = false;
		self
	}

	pub fn with_target(mut self, enabled: bool) -> Self {
		self.with_target = enabled;
		self
	}

	pub fn with_thread_names(mut self, enabled: bool) -> Self {
		self.with_thread_names = enabled;
		self
	}

	pub fn with_ansi(mut self, enabled: bool) -> Self {
		self.with_ansi = enabled;
		self
	}

	pub fn format(&self) -> LogFormat {
		self.format
	}

	/// The filter the subscriber will be installed with.
	pub fn env_filter(&self) -> Result<EnvFilter> {
		if self.use_env {
			if let Ok(filter) = EnvFilter::try_from_default_env() {
				return Ok(filter);
			}
		}
		EnvFilter::try_new(&self.filter)
			.map_err(|err| Error::config(format!("invalid log filter '{}': {}", self.filter, err)))
	}

	/// Install the subscriber globally. Fails if one is already installed.
	pub fn init(self) -> Result<()> {
		let filter = self.env_filter()?;
		let registry = tracing_subscriber::registry().with(filter);

		let installed = match self.format {
			LogFormat::Compact => registry
				.with(fmt::layer()
					.compact()
					.with_target(self.with_target)
					.with_thread_names(self.with_thread_names)
					.with_ansi(self.with_ansi))
				.try_init(),
			LogFormat::Pretty => registry
				.with(fmt::layer()
					.pretty()
					.with_target(self.with_target)
					.with_thread_names(self.with_thread_names)
					.with_ansi(self.with_ansi))
				.try_init(),
			LogFormat::Json => registry
				.with(fmt::layer()
					.json()
					.with_target(self.with_target)
					.with_thread_names(self.with_thread_names))
				.try_init(),
		};

		installed.map_err(|err| Error::config(format!("failed to install tracing subscriber: {}", err)))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_level_becomes_filter() {
		let builder = TracingBuilder::new().with_level(Level::DEBUG).ignore_env();
		assert_eq!(builder.env_filter().unwrap().to_string(), "debug");
	}

	#[test]
	fn test_invalid_filter_is_config_error() {
		let err = TracingBuilder::new().with_filter("cdcflow=loud").ignore_env().env_filter().unwrap_err();
		assert_eq!(err.code(), "CONFIG_001");
	}

	#[test]
	fn test_second_init_fails() {
		// whichever test installs first wins; the second attempt must report an error
		let _ = TracingBuilder::new().ignore_env().with_ansi(false).init();
		assert!(TracingBuilder::new().ignore_env().json().init().is_err());
	}
}
