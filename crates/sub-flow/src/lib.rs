// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Composes scheduled tasks into dependency-ordered batches.

mod batch;
mod graph;
mod orchestrator;

pub use batch::{BatchResult, TaskResult};
pub use graph::DependencyGraph;
pub use orchestrator::Orchestrator;
