// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Embeddable change data capture pipelines.
//!
//! A [`Pipeline`] wires a [`ChangeLog`](cdc::ChangeLog), its
//! [`CursorRegistry`](cdc::CursorRegistry), a [`TaskScheduler`](task::TaskScheduler)
//! and an [`Orchestrator`](flow::Orchestrator) into one handle. Pipelines are
//! assembled with a [`PipelineBuilder`] or declared in a [`PipelineConfig`].

mod builder;
mod config;
mod pipeline;
mod registry;
pub mod sink;
mod worker;

pub use builder::PipelineBuilder;
pub use cdcflow_cdc as cdc;
pub use cdcflow_sub_flow as flow;
pub use cdcflow_sub_task as task;
pub use cdcflow_sub_tracing as logging;
pub use cdcflow_type as types;
pub use cdcflow_type::{Error, Result};
pub use config::{PipelineConfig, SourceConfig, TableConfig, TaskConfig};
pub use pipeline::Pipeline;
pub use registry::ActionRegistry;
pub use sink::{AppendTable, MaterializedView, Sink, SinkAction};

/// Default configuration values
pub mod defaults {
	use std::time::Duration;

	/// Interval between two ticks of a started pipeline
	pub const TICK_INTERVAL: Duration = Duration::from_secs(1);

	/// Name of the background scheduler thread
	pub const WORKER_THREAD_NAME: &str = "cdcflow-scheduler";
}
