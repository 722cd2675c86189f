// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::{sync::Arc, time::Duration};

use cdcflow::{
	Pipeline,
	cdc::{Operation, StartPosition},
	flow::TaskResult,
	task::{RunOutcome, TaskDefinition, TaskStatus},
	types::{Error, MockClock, SequenceNumber, TableId, TaskId, Timestamp},
};
use cdcflow_testing::{
	action::{FailingAction, RecordingAction},
	telecom,
	util::wait_for,
};

fn pipeline_with_calls() -> (Pipeline, TableId) {
	let pipeline = Pipeline::memory().unwrap();
	let calls = telecom::create_calls(pipeline.log()).unwrap();
	(pipeline, calls)
}

fn register(pipeline: &Pipeline, task: &str, table: &TableId, action: Arc<dyn cdcflow::task::TaskAction>) {
	let cursor = pipeline.create_cursor(task, table, StartPosition::Beginning).unwrap();
	pipeline.register(TaskDefinition::new(task, Duration::from_secs(60), action).with_source(cursor)).unwrap();
}

#[test]
fn test_tick_skips_empty_cursor_then_processes_new_record() {
	let (pipeline, calls) = pipeline_with_calls();
	let action = RecordingAction::new();
	register(&pipeline, "rating", &calls, Arc::new(action.clone()));

	let report = pipeline.tick(Timestamp::from_secs(0));
	assert_eq!(report.runs().count(), 0);
	assert!(pipeline.runs().is_empty());

	pipeline.insert(&calls, telecom::call(1, "+1-555-0100", "+1-555-0199", 42)).unwrap();

	let report = pipeline.tick(Timestamp::from_secs(60));
	let runs: Vec<_> = report.runs().collect();
	assert_eq!(runs.len(), 1);
	assert_eq!(runs[0].records_processed, 1);
	assert_eq!(action.sequences(), vec![1]);

	let health = pipeline.health_report();
	assert!(health.is_healthy());
	assert_eq!(health.get(&TaskId::new("rating")).unwrap().status, TaskStatus::Idle);
}

#[test]
fn test_tick_now_follows_pipeline_clock() {
	let clock = MockClock::new(Timestamp::from_secs(100));
	let pipeline = Pipeline::builder().with_clock(clock.clone()).build().unwrap();
	let calls = telecom::create_calls(pipeline.log()).unwrap();
	let action = RecordingAction::new();
	register(&pipeline, "rating", &calls, Arc::new(action.clone()));

	telecom::seed_calls(pipeline.log(), &calls, 2).unwrap();
	let report = pipeline.tick_now();
	assert_eq!(report.at(), Timestamp::from_secs(100));
	assert_eq!(action.len(), 2);

	pipeline.insert(&calls, telecom::call(3, "+1-555-0100", "+1-555-0199", 5)).unwrap();
	clock.advance(Duration::from_secs(30));
	assert_eq!(pipeline.tick_now().runs().count(), 0);

	clock.advance(Duration::from_secs(30));
	assert_eq!(pipeline.tick_now().runs().count(), 1);
	assert_eq!(action.sequences(), vec![1, 2, 3]);
}

#[test]
fn test_background_worker_processes_appends() {
	let pipeline = Pipeline::builder().with_tick_interval(Duration::from_millis(5)).build().unwrap();
	let calls = telecom::create_calls(pipeline.log()).unwrap();
	let action = RecordingAction::new();
	let cursor = pipeline.create_cursor("rating", &calls, StartPosition::Beginning).unwrap();
	pipeline
		.register(
			TaskDefinition::new("rating", Duration::from_millis(1), Arc::new(action.clone())).with_source(cursor),
		)
		.unwrap();

	pipeline.start().unwrap();
	assert!(pipeline.is_running());
	// a second start is a no-op
	pipeline.start().unwrap();

	telecom::seed_calls(pipeline.log(), &calls, 3).unwrap();
	wait_for(|| action.len() == 3, "background worker never processed the calls");

	pipeline.shutdown();
	assert!(!pipeline.is_running());

	pipeline.insert(&calls, telecom::call(4, "+1-555-0100", "+1-555-0199", 5)).unwrap();
	std::thread::sleep(Duration::from_millis(30));
	assert_eq!(action.len(), 3);
	assert_eq!(pipeline.cursor(cursor).unwrap().last_consumed, SequenceNumber(3));
}

#[test]
fn test_wake_ticks_before_the_interval() {
	let pipeline = Pipeline::builder().with_tick_interval(Duration::from_secs(3600)).build().unwrap();
	let calls = telecom::create_calls(pipeline.log()).unwrap();
	let action = RecordingAction::new();
	let cursor = pipeline.create_cursor("rating", &calls, StartPosition::Beginning).unwrap();
	pipeline
		.register(TaskDefinition::new("rating", Duration::from_millis(1), Arc::new(action.clone())).with_source(cursor))
		.unwrap();

	pipeline.start().unwrap();
	// the first tick runs immediately with nothing to do
	wait_for(|| pipeline.scheduler().next_due(&TaskId::new("rating")).unwrap().is_some(), "first tick never ran");

	pipeline.insert(&calls, telecom::call(1, "+1-555-0100", "+1-555-0199", 5)).unwrap();
	std::thread::sleep(Duration::from_millis(5));
	pipeline.wake();
	wait_for(|| action.len() == 1, "wake did not trigger a tick");
}

#[test]
fn test_drop_table_invalidates_cursors_and_fails_task() {
	let (pipeline, calls) = pipeline_with_calls();
	register(&pipeline, "rating", &calls, Arc::new(RecordingAction::new()));
	telecom::seed_calls(pipeline.log(), &calls, 1).unwrap();

	assert_eq!(pipeline.drop_table(&calls).unwrap(), 1);

	let task = TaskId::new("rating");
	let cursor = pipeline.cursors().find(&"rating".into(), &calls).unwrap();
	assert!(matches!(pipeline.peek(cursor), Err(Error::CursorInvalidated { .. })));

	// the task cannot tell whether it has pending work; the run is recorded as failed
	pipeline.tick(Timestamp::from_secs(0));
	let run = pipeline.scheduler().last_run(&task).unwrap().unwrap();
	assert!(matches!(
		run.outcome,
		RunOutcome::Failed {
			error: Error::CursorInvalidated { .. }
		}
	));
	assert!(!pipeline.health_report().is_healthy());

	assert!(pipeline.drop_table(&calls).is_err());
}

#[test]
fn test_compact_discards_records_every_consumer_has_seen() {
	let (pipeline, calls) = pipeline_with_calls();
	let subscribers = telecom::create_subscribers(pipeline.log()).unwrap();
	telecom::seed_calls(pipeline.log(), &calls, 5).unwrap();
	pipeline.insert(&subscribers, telecom::subscriber("+1-555-0100", "basic", 10.0)).unwrap();

	let fast = pipeline.create_cursor("rating", &calls, StartPosition::Beginning).unwrap();
	let slow = pipeline.create_cursor("fraud", &calls, StartPosition::Beginning).unwrap();
	assert_eq!(pipeline.consume(fast).unwrap().len(), 5);
	pipeline.cursors().fast_forward_to(slow, SequenceNumber(2)).unwrap();

	assert_eq!(pipeline.watermark(&calls), Some(SequenceNumber(2)));
	// subscribers has no cursor and is left alone
	assert_eq!(pipeline.compact().unwrap(), vec![(calls.clone(), 2)]);

	assert_eq!(pipeline.log().low_water_mark(&calls).unwrap(), SequenceNumber(3));
	assert_eq!(pipeline.log().low_water_mark(&subscribers).unwrap(), SequenceNumber(1));
	let pending: Vec<u64> = pipeline.consume(slow).unwrap().iter().map(|r| r.sequence.0).collect();
	assert_eq!(pending, vec![3, 4, 5]);
}

#[test]
fn test_run_batch_skips_dependents_of_failed_task() {
	let (pipeline, calls) = pipeline_with_calls();
	let invoicing = RecordingAction::new();
	register(&pipeline, "rating", &calls, Arc::new(FailingAction::always("rating engine offline")));
	register(&pipeline, "invoicing", &calls, Arc::new(invoicing.clone()));
	pipeline.depends_on(&TaskId::new("invoicing"), &TaskId::new("rating")).unwrap();
	telecom::seed_calls(pipeline.log(), &calls, 2).unwrap();

	let result = pipeline.run_all().unwrap();
	assert!(!result.is_success());
	assert!(matches!(result.get(&TaskId::new("rating")), Some(TaskResult::Failed(_))));
	assert_eq!(
		result.get(&TaskId::new("invoicing")),
		Some(&TaskResult::Skipped {
			upstream: TaskId::new("rating")
		})
	);
	assert!(invoicing.is_empty());
}

#[test]
fn test_append_helpers_record_operations() {
	let (pipeline, calls) = pipeline_with_calls();
	pipeline.insert(&calls, telecom::call(1, "+1-555-0100", "+1-555-0199", 5)).unwrap();
	pipeline.update(&calls, telecom::call(1, "+1-555-0100", "+1-555-0199", 7)).unwrap();
	pipeline.delete(&calls, telecom::call(1, "+1-555-0100", "+1-555-0199", 7)).unwrap();

	let operations: Vec<Operation> = pipeline
		.read_range(&calls, SequenceNumber(1), None)
		.unwrap()
		.to_vec()
		.unwrap()
		.into_iter()
		.map(|r| r.operation)
		.collect();
	assert_eq!(operations, vec![Operation::Insert, Operation::Update, Operation::Delete]);
}

#[test]
fn test_zero_tick_interval_is_rejected() {
	let err = Pipeline::builder().with_tick_interval(Duration::ZERO).build().err().unwrap();
	assert!(matches!(err, Error::Config { .. }));
}
