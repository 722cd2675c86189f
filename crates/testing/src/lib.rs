// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Fixtures shared by the cdcflow test suites.
//!
//! The sample data models a small telecom operator: call detail records,
//! subscribers with their plans, and the alerts raised from them.

pub mod action;
pub mod telecom;
pub mod util;
