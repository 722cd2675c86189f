// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Periodic execution of change-driven tasks.
//!
//! A [`TaskScheduler`] owns a set of [`TaskDefinition`]s. Each definition reads
//! one or more stream cursors and hands pending change records to its
//! [`TaskAction`]. On every [`tick`](TaskScheduler::tick) the scheduler runs the
//! tasks that are due and have pending changes, records a [`PipelineRun`] for
//! each execution, and only advances a cursor once the action has accepted the
//! corresponding batch.

mod cancel;
mod config;
mod execute;
mod health;
mod observer;
mod retry;
mod run;
mod scheduler;
mod task;

pub use cancel::CancellationToken;
pub use cdcflow_type::Result;
pub use config::{ExecutionMode, SchedulerConfig};
pub use execute::Execution;
pub use health::{HealthReport, TaskHealth};
pub use observer::{RunObserver, TracingObserver};
pub use retry::RetryPolicy;
pub use run::{PipelineRun, RunOutcome};
pub use scheduler::{TaskScheduler, TickReport};
pub use task::{ChangeBatch, ClosureAction, TaskAction, TaskContext, TaskDefinition, TaskStatus};
