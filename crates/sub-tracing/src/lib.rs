// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Installs a global `tracing` subscriber for processes embedding cdcflow.

mod builder;
mod factory;

pub use builder::{LogFormat, TracingBuilder};
pub use factory::{TracingConfigurator, TracingFactory};
