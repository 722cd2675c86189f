// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::time::Duration;

use cdcflow::{
	ActionRegistry, Pipeline, PipelineConfig,
	flow::TaskResult,
	task::ExecutionMode,
	types::{Error, TableId, TaskId, Timestamp},
};
use cdcflow_testing::{action::RecordingAction, telecom};

const BILLING: &str = r#"{
	"tick_interval_ms": 500,
	"scheduler": { "execution": { "mode": "concurrent", "workers": 2 }, "batch_size": 2 },
	"tables": [
		{ "name": "calls", "key_column": "call_id" },
		{ "name": "subscribers", "key_column": "msisdn" }
	],
	"tasks": [
		{
			"id": "rating",
			"interval_ms": 60000,
			"action": "rate",
			"sources": [{ "table": "calls" }, { "table": "subscribers" }]
		},
		{
			"id": "invoicing",
			"interval_ms": 60000,
			"action": "invoice",
			"sources": [{ "table": "calls", "start": "latest" }],
			"depends_on": ["rating"]
		}
	]
}"#;

#[test]
fn test_pipeline_from_json() {
	let rate = RecordingAction::new();
	let invoice = RecordingAction::new();
	let actions =
		ActionRegistry::new().with("rate", rate.clone()).unwrap().with("invoice", invoice.clone()).unwrap();

	let pipeline = Pipeline::from_json(BILLING, &actions).unwrap();
	assert_eq!(pipeline.tick_interval(), Duration::from_millis(500));
	assert_eq!(
		pipeline.scheduler().config().execution,
		ExecutionMode::Concurrent {
			workers: 2
		}
	);

	let calls = TableId::new(telecom::CALLS);
	let subscribers = TableId::new(telecom::SUBSCRIBERS);
	assert_eq!(pipeline.log().tables(), vec![calls.clone(), subscribers.clone()]);
	assert_eq!(pipeline.orchestrator().upstream(&TaskId::new("invoicing")), vec![TaskId::new("rating")]);
	assert_eq!(
		pipeline.orchestrator().execution_order().unwrap(),
		vec![TaskId::new("rating"), TaskId::new("invoicing")]
	);

	telecom::seed_calls(pipeline.log(), &calls, 3).unwrap();
	pipeline.insert(&subscribers, telecom::subscriber("+1-555-0100", "basic", 20.0)).unwrap();

	let report = pipeline.tick(Timestamp::from_secs(0));
	let rating = report.get(&TaskId::new("rating")).unwrap().run().unwrap();
	assert_eq!(rating.records_processed, 4);
	// batch_size 2: calls in two batches, subscribers in one
	assert_eq!(rate.batches(), 3);

	// invoicing starts at the end of the log as it was when provisioned, which was empty
	assert_eq!(invoice.sequences(), vec![1, 2, 3]);

	pipeline.insert(&calls, telecom::call(4, "+1-555-0100", "+1-555-0199", 60)).unwrap();
	let result = pipeline.run_all().unwrap();
	assert!(result.is_success());
	assert!(matches!(result.get(&TaskId::new("invoicing")), Some(TaskResult::Succeeded(_))));
	assert_eq!(invoice.sequences(), vec![1, 2, 3, 4]);
}

#[test]
fn test_unknown_action_creates_nothing() {
	let actions = ActionRegistry::new().with("rate", RecordingAction::new()).unwrap();
	let config = PipelineConfig::from_json(BILLING).unwrap();

	let pipeline = Pipeline::builder().with_config(&config).build().unwrap();
	let err = pipeline.provision(&config, &actions).unwrap_err();

	assert!(matches!(err, Error::Config { .. }));
	assert!(err.to_string().contains("'invoice'"));
	assert!(pipeline.log().tables().is_empty());
	assert!(pipeline.scheduler().tasks().is_empty());
}

#[test]
fn test_dependency_cycle_in_config_is_rejected() {
	let json = r#"{
		"tables": [{ "name": "calls" }],
		"tasks": [
			{ "id": "a", "interval_ms": 10, "action": "noop", "sources": [{ "table": "calls" }], "depends_on": ["b"] },
			{ "id": "b", "interval_ms": 10, "action": "noop", "sources": [{ "table": "calls" }], "depends_on": ["a"] }
		]
	}"#;
	let actions = ActionRegistry::new().with("noop", RecordingAction::new()).unwrap();

	let err = Pipeline::from_json(json, &actions).err().unwrap();
	assert!(matches!(err, Error::CycleDetected { .. }));

	let pipeline = Pipeline::memory().unwrap();
	let err = pipeline.provision(&PipelineConfig::from_json(json).unwrap(), &actions).unwrap_err();
	assert!(matches!(err, Error::CycleDetected { .. }));
	assert!(pipeline.log().tables().is_empty());
	assert!(pipeline.cursors().cursors().is_empty());
	assert!(pipeline.scheduler().tasks().is_empty());
}

#[test]
fn test_existing_table_creates_nothing() {
	let actions = ActionRegistry::new()
		.with("rate", RecordingAction::new())
		.unwrap()
		.with("invoice", RecordingAction::new())
		.unwrap();
	let config = PipelineConfig::from_json(BILLING).unwrap();

	let pipeline = Pipeline::memory().unwrap();
	let subscribers = telecom::create_subscribers(pipeline.log()).unwrap();
	let err = pipeline.provision(&config, &actions).unwrap_err();

	assert!(matches!(err, Error::Config { .. }));
	assert!(err.to_string().contains("'subscribers'"));
	assert_eq!(pipeline.log().tables(), vec![subscribers]);
	assert!(pipeline.scheduler().tasks().is_empty());
}
