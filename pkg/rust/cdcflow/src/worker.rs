// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Background thread driving the scheduler's tick loop.

use std::{
	sync::{
		Arc,
		atomic::{AtomicBool, AtomicU64, Ordering},
	},
	thread::{self, JoinHandle},
	time::Duration,
};

use cdcflow_sub_task::TaskScheduler;
use cdcflow_type::{Clock, Error, Result};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded};
use tracing::{error, info, trace};

use crate::defaults;

enum Signal {
	Tick,
	Shutdown,
}

pub(crate) struct TickWorker {
	sender: Sender<Signal>,
	handle: Option<JoinHandle<()>>,
	running: Arc<AtomicBool>,
	ticks: Arc<AtomicU64>,
}

impl TickWorker {
	pub(crate) fn spawn(scheduler: TaskScheduler, clock: Clock, interval: Duration) -> Result<Self> {
		// one pending signal is enough; further ones would only repeat it
		let (sender, receiver) = bounded(1);
		let running = Arc::new(AtomicBool::new(true));
		let ticks = Arc::new(AtomicU64::new(0));

		let handle = {
			let running = Arc::clone(&running);
			let ticks = Arc::clone(&ticks);
			thread::Builder::new()
				.name(defaults::WORKER_THREAD_NAME.to_string())
				.spawn(move || {
					info!(interval_ms = interval.as_millis() as u64, "scheduler worker started");
					worker_loop(scheduler, clock, interval, receiver, &running, &ticks);
					running.store(false, Ordering::SeqCst);
					info!("scheduler worker stopped");
				})
				.map_err(|err| Error::config(format!("failed to spawn scheduler worker: {}", err)))?
		};

		Ok(Self {
			sender,
			handle: Some(handle),
			running,
			ticks,
		})
	}

	pub(crate) fn is_running(&self) -> bool {
		self.running.load(Ordering::SeqCst)
	}

	pub(crate) fn ticks(&self) -> u64 {
		self.ticks.load(Ordering::SeqCst)
	}

	/// Ask for a tick ahead of the interval. Never blocks.
	pub(crate) fn wake(&self) {
		let _ = self.sender.try_send(Signal::Tick);
	}

	pub(crate) fn shutdown(&mut self) {
		self.running.store(false, Ordering::SeqCst);
		let _ = self.sender.try_send(Signal::Shutdown);
		if let Some(handle) = self.handle.take() {
			if handle.join().is_err() {
				error!("scheduler worker panicked");
			}
		}
	}
}

impl Drop for TickWorker {
	fn drop(&mut self) {
		self.shutdown();
	}
}

fn worker_loop(
	scheduler: TaskScheduler,
	clock: Clock,
	interval: Duration,
	receiver: Receiver<Signal>,
	running: &AtomicBool,
	ticks: &AtomicU64,
) {
	while running.load(Ordering::SeqCst) {
		let report = scheduler.tick(clock.now());
		ticks.fetch_add(1, Ordering::SeqCst);
		trace!(at = report.at().0, executions = report.executions().len(), "tick");

		match receiver.recv_timeout(interval) {
			Ok(Signal::Tick) | Err(RecvTimeoutError::Timeout) => {}
			Ok(Signal::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
		}
	}
}
