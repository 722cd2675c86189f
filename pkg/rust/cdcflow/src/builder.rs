// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::{sync::Arc, time::Duration};

use cdcflow_cdc::{CdcStorage, ChangeLog, CursorRegistry, MemoryCdcStorage};
use cdcflow_sub_flow::Orchestrator;
use cdcflow_sub_task::{RunObserver, SchedulerConfig, TaskScheduler};
use cdcflow_sub_tracing::{TracingBuilder, TracingFactory};
use cdcflow_type::{Clock, Error, Result};
use tracing::{debug, warn};

use crate::{config::PipelineConfig, defaults, pipeline::Pipeline};

type StorageFactory = Box<dyn FnOnce(Clock) -> ChangeLog + Send>;

/// Assembles a [`Pipeline`].
pub struct PipelineBuilder {
	clock: Clock,
	storage: StorageFactory,
	page_size: Option<usize>,
	scheduler: SchedulerConfig,
	tick_interval: Duration,
	tracing: Option<TracingFactory>,
	observers: Vec<Arc<dyn RunObserver>>,
}

impl PipelineBuilder {
	pub fn new() -> Self {
		Self {
			clock: Clock::default(),
			storage: Box::new(|clock| ChangeLog::new(MemoryCdcStorage::new(), clock)),
			page_size: None,
			scheduler: SchedulerConfig::default(),
			tick_interval: defaults::TICK_INTERVAL,
			tracing: None,
			observers: Vec::new(),
		}
	}

	pub fn with_clock(mut self, clock: impl Into<Clock>) -> Self {
		self.clock = clock.into();
		self
	}

	/// Back the change log with `storage` instead of the in-memory default.
	pub fn with_storage<S: CdcStorage>(mut self, storage: S) -> Self {
		self.storage = Box::new(move |clock| ChangeLog::new(storage, clock));
		self
	}

	pub fn with_page_size(mut self, page_size: usize) -> Self {
		self.page_size = Some(page_size);
		self
	}

	pub fn with_scheduler<F>(mut self, configurator: F) -> Self
	where
		F: FnOnce(SchedulerConfig) -> SchedulerConfig,
	{
		self.scheduler = configurator(self.scheduler);
		self
	}

	pub fn with_tick_interval(mut self, interval: Duration) -> Self {
		self.tick_interval = interval;
		self
	}

	/// Take the tick interval and scheduler settings from `config`.
	pub fn with_config(mut self, config: &PipelineConfig) -> Self {
		self.tick_interval = config.tick_interval;
		self.scheduler = config.scheduler.clone();
		self
	}

	/// Install a global tracing subscriber when the pipeline is built.
	pub fn with_tracing<F>(mut self, configurator: F) -> Self
	where
		F: FnOnce(TracingBuilder) -> TracingBuilder + Send + 'static,
	{
		self.tracing = Some(TracingFactory::with_configurator(configurator));
		self
	}

	pub fn with_observer(mut self, observer: Arc<dyn RunObserver>) -> Self {
		self.observers.push(observer);
		self
	}

	/// Fails with a config error when the tick interval is zero.
	pub fn build(self) -> Result<Pipeline> {
		if self.tick_interval.is_zero() {
			return Err(Error::config("tick interval must be positive"));
		}

		if let Some(factory) = self.tracing {
			// only one global subscriber per process; a host may have installed its own
			if let Err(err) = factory.install() {
				warn!(%err, "tracing subscriber not installed");
			}
		}

		let mut log = (self.storage)(self.clock.clone());
		if let Some(page_size) = self.page_size {
			log = log.with_page_size(page_size);
		}

		let cursors = CursorRegistry::new(log.clone());
		let scheduler = TaskScheduler::new(cursors.clone(), self.scheduler)?;
		for observer in self.observers {
			scheduler.add_observer(observer);
		}

		debug!(tick_interval_ms = self.tick_interval.as_millis() as u64, "pipeline built");

		Ok(Pipeline::new(self.clock, log, cursors, Orchestrator::new(scheduler), self.tick_interval))
	}
}

impl Default for PipelineBuilder {
	fn default() -> Self {
		Self::new()
	}
}
