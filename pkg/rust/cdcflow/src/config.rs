// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::{collections::HashSet, time::Duration};

use cdcflow_cdc::{StartPosition, TableDef};
use cdcflow_sub_task::SchedulerConfig;
use cdcflow_type::{Error, Result, duration::millis};
use serde::{Deserialize, Serialize};

use crate::defaults;

/// Declarative description of a pipeline: tables, tasks and their wiring.
///
/// ```json
/// {
///   "tick_interval_ms": 1000,
///   "tables": [{ "name": "calls" }],
///   "tasks": [{
///     "id": "rating",
///     "interval_ms": 60000,
///     "action": "rate_calls",
///     "sources": [{ "table": "calls" }]
///   }]
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
	#[serde(rename = "tick_interval_ms", with = "millis")]
	pub tick_interval: Duration,
	pub scheduler: SchedulerConfig,
	pub tables: Vec<TableConfig>,
	pub tasks: Vec<TaskConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableConfig {
	pub name: String,
	#[serde(default)]
	pub key_column: Option<String>,
}

impl TableConfig {
	pub fn definition(&self) -> TableDef {
		TableDef {
			id: self.name.as_str().into(),
			key_column: self.key_column.clone(),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskConfig {
	pub id: String,
	#[serde(rename = "interval_ms", with = "millis")]
	pub interval: Duration,
	/// Name under which the action was registered in an [`ActionRegistry`](crate::ActionRegistry).
	pub action: String,
	pub sources: Vec<SourceConfig>,
	#[serde(default)]
	pub depends_on: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
	pub table: String,
	/// Defaults to the task id.
	#[serde(default)]
	pub consumer: Option<String>,
	#[serde(default)]
	pub start: StartPosition,
}

impl SourceConfig {
	pub fn consumer_for<'a>(&'a self, task: &'a TaskConfig) -> &'a str {
		self.consumer.as_deref().unwrap_or(&task.id)
	}
}

impl Default for PipelineConfig {
	fn default() -> Self {
		Self {
			tick_interval: defaults::TICK_INTERVAL,
			scheduler: SchedulerConfig::default(),
			tables: Vec::new(),
			tasks: Vec::new(),
		}
	}
}

impl PipelineConfig {
	pub fn from_json(json: &str) -> Result<Self> {
		let config: Self = serde_json::from_str(json).map_err(|err| Error::config(err.to_string()))?;
		config.validate()?;
		Ok(config)
	}

	pub fn to_json(&self) -> Result<String> {
		serde_json::to_string_pretty(self).map_err(|err| Error::config(err.to_string()))
	}

	/// Checks the declaration is self-consistent. Actions are resolved later,
	/// against the registry handed to [`Pipeline::from_config`](crate::Pipeline::from_config).
	pub fn validate(&self) -> Result<()> {
		if self.tick_interval.is_zero() {
			return Err(Error::config("tick_interval_ms must be positive"));
		}

		let mut tables = HashSet::new();
		for table in &self.tables {
			if table.name.is_empty() {
				return Err(Error::config("table name must not be empty"));
			}
			if !tables.insert(table.name.as_str()) {
				return Err(Error::config(format!("table '{}' is declared twice", table.name)));
			}
		}

		let mut tasks = HashSet::new();
		for task in &self.tasks {
			if !tasks.insert(task.id.as_str()) {
				return Err(Error::config(format!("task '{}' is declared twice", task.id)));
			}
			if task.interval.is_zero() {
				return Err(Error::config(format!("task '{}' needs a positive interval_ms", task.id)));
			}
			if task.sources.is_empty() {
				return Err(Error::config(format!("task '{}' has no sources", task.id)));
			}
			for source in &task.sources {
				if !tables.contains(source.table.as_str()) {
					return Err(Error::config(format!(
						"task '{}' reads undeclared table '{}'",
						task.id, source.table
					)));
				}
			}
		}

		for task in &self.tasks {
			for upstream in &task.depends_on {
				if !tasks.contains(upstream.as_str()) {
					return Err(Error::config(format!(
						"task '{}' depends on undeclared task '{}'",
						task.id, upstream
					)));
				}
			}
		}

		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use cdcflow_sub_task::{ExecutionMode, RetryPolicy};

	use super::*;

	const RATING: &str = r#"{
		"tick_interval_ms": 250,
		"scheduler": {
			"execution": { "mode": "concurrent", "workers": 2 },
			"batch_size": 50,
			"retry": { "policy": "fixed", "delay_ms": 5000 }
		},
		"tables": [
			{ "name": "calls", "key_column": "call_id" },
			{ "name": "subscribers", "key_column": "msisdn" }
		],
		"tasks": [
			{
				"id": "rating",
				"interval_ms": 60000,
				"action": "rate_calls",
				"sources": [{ "table": "calls" }, { "table": "subscribers", "consumer": "rating-subs", "start": "latest" }]
			},
			{
				"id": "invoicing",
				"interval_ms": 3600000,
				"action": "invoice",
				"sources": [{ "table": "calls" }],
				"depends_on": ["rating"]
			}
		]
	}"#;

	#[test]
	fn test_parse_full_document() {
		let config = PipelineConfig::from_json(RATING).unwrap();

		assert_eq!(config.tick_interval, Duration::from_millis(250));
		assert_eq!(
			config.scheduler.execution,
			ExecutionMode::Concurrent {
				workers: 2
			}
		);
		assert_eq!(config.scheduler.batch_size, 50);
		assert_eq!(
			config.scheduler.retry,
			RetryPolicy::Fixed {
				delay: Duration::from_secs(5)
			}
		);

		assert_eq!(config.tables[0].definition(), TableDef::keyed("calls", "call_id"));

		let rating = &config.tasks[0];
		assert_eq!(rating.interval, Duration::from_secs(60));
		assert_eq!(rating.sources[0].consumer_for(rating), "rating");
		assert_eq!(rating.sources[0].start, StartPosition::Beginning);
		assert_eq!(rating.sources[1].consumer_for(rating), "rating-subs");
		assert_eq!(rating.sources[1].start, StartPosition::Latest);

		assert_eq!(config.tasks[1].depends_on, vec!["rating".to_string()]);
	}

	#[test]
	fn test_defaults() {
		let config = PipelineConfig::from_json("{}").unwrap();
		assert_eq!(config, PipelineConfig::default());
		assert_eq!(config.tick_interval, defaults::TICK_INTERVAL);
	}

	#[test]
	fn test_json_survives_serialization() {
		let config = PipelineConfig::from_json(RATING).unwrap();
		let json = config.to_json().unwrap();
		assert_eq!(PipelineConfig::from_json(&json).unwrap(), config);
	}

	#[test]
	fn test_malformed_json_is_config_error() {
		let err = PipelineConfig::from_json("{ not json").unwrap_err();
		assert!(matches!(err, Error::Config { .. }));
	}

	#[test]
	fn test_rejects_undeclared_table() {
		let json = r#"{
			"tables": [{ "name": "calls" }],
			"tasks": [{ "id": "t", "interval_ms": 10, "action": "a", "sources": [{ "table": "sms" }] }]
		}"#;
		let err = PipelineConfig::from_json(json).unwrap_err();
		assert!(err.to_string().contains("undeclared table 'sms'"));
	}

	#[test]
	fn test_rejects_undeclared_upstream() {
		let json = r#"{
			"tables": [{ "name": "calls" }],
			"tasks": [{
				"id": "t", "interval_ms": 10, "action": "a",
				"sources": [{ "table": "calls" }], "depends_on": ["ghost"]
			}]
		}"#;
		let err = PipelineConfig::from_json(json).unwrap_err();
		assert!(err.to_string().contains("undeclared task 'ghost'"));
	}

	#[test]
	fn test_rejects_duplicates_and_zero_intervals() {
		let tables = r#"{ "tables": [{ "name": "calls" }, { "name": "calls" }] }"#;
		assert!(PipelineConfig::from_json(tables).is_err());

		let interval = r#"{
			"tables": [{ "name": "calls" }],
			"tasks": [{ "id": "t", "interval_ms": 0, "action": "a", "sources": [{ "table": "calls" }] }]
		}"#;
		assert!(PipelineConfig::from_json(interval).is_err());

		assert!(PipelineConfig::from_json(r#"{ "tick_interval_ms": 0 }"#).is_err());
	}
}
