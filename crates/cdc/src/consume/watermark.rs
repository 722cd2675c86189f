// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use cdcflow_type::{SequenceNumber, TableId};

use super::registry::CursorRegistry;

/// Lowest `last_consumed` across the valid cursors reading `table`.
///
/// Every record at or below the watermark has been delivered to all of the
/// table's consumers and may be compacted. Returns `None` when the table has
/// no valid cursor, in which case nothing is safe to discard.
pub fn compute_watermark(registry: &CursorRegistry, table: &TableId) -> Option<SequenceNumber> {
	registry.cursors_for_table(table)
		.into_iter()
		.filter(|cursor| registry.is_valid(cursor.id).unwrap_or(false))
		.map(|cursor| cursor.last_consumed)
		.min()
}
