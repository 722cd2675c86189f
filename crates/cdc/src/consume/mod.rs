// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! CDC consumption module
//!
//! This module provides the consumer-side functionality for CDC:
//! - Stream cursors tracking each consumer's offset into a table's log
//! - Two-phase consumption through [`ConsumeGuard`]
//! - Watermark computation for retention coordination

mod cursor;
mod guard;
mod registry;
mod watermark;

pub use cursor::{StartPosition, StreamCursor};
pub use guard::ConsumeGuard;
pub use registry::CursorRegistry;
pub use watermark::compute_watermark;
