// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

pub mod clock;
pub mod duration;
pub mod error;
pub mod id;
pub mod value;

pub use clock::{Clock, MockClock, Timestamp};
pub use error::{Error, Result};
pub use id::{ConsumerId, CursorId, RowKey, RunId, SequenceNumber, TableId, TaskId};
pub use value::{OrderedF64, Row, Value};
