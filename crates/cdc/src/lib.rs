// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Change Data Capture primitives.
//!
//! - [`ChangeLog`]: per-table append-only log of row mutations
//! - [`CursorRegistry`]: per-consumer read offsets into the log
//! - [`compute_watermark`]: safe compaction point across a table's cursors

pub mod consume;
mod log;
mod record;
pub mod storage;

pub use consume::{ConsumeGuard, CursorRegistry, StartPosition, StreamCursor, compute_watermark};
pub use log::{ChangeIter, ChangeLog, ChangeRange};
pub use record::{ChangeRecord, Operation, TableDef};
pub use storage::{CdcStorage, MemoryCdcStorage, TableMarks};
