// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::{collections::HashMap, fmt, sync::Arc};

use cdcflow_sub_task::TaskAction;
use cdcflow_type::{Error, Result};

/// Named task actions that a [`PipelineConfig`](crate::PipelineConfig) can refer to.
#[derive(Clone, Default)]
pub struct ActionRegistry {
	actions: HashMap<String, Arc<dyn TaskAction>>,
}

impl ActionRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with(mut self, name: impl Into<String>, action: impl TaskAction) -> Result<Self> {
		self.register(name, Arc::new(action))?;
		Ok(self)
	}

	pub fn register(&mut self, name: impl Into<String>, action: Arc<dyn TaskAction>) -> Result<()> {
		let name = name.into();
		if self.actions.contains_key(&name) {
			return Err(Error::config(format!("action '{}' is already registered", name)));
		}
		self.actions.insert(name, action);
		Ok(())
	}

	pub fn get(&self, name: &str) -> Result<Arc<dyn TaskAction>> {
		self.actions
			.get(name)
			.cloned()
			.ok_or_else(|| Error::config(format!("action '{}' is not registered", name)))
	}

	pub fn contains(&self, name: &str) -> bool {
		self.actions.contains_key(name)
	}

	pub fn len(&self) -> usize {
		self.actions.len()
	}

	pub fn is_empty(&self) -> bool {
		self.actions.is_empty()
	}
}

impl fmt::Debug for ActionRegistry {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let mut names: Vec<_> = self.actions.keys().collect();
		names.sort();
		f.debug_struct("ActionRegistry").field("actions", &names).finish()
	}
}

#[cfg(test)]
mod tests {
	use cdcflow_sub_task::{ChangeBatch, ClosureAction, TaskContext};

	use super::*;

	fn accept(_: &TaskContext, _: &ChangeBatch<'_>) -> Result<()> {
		Ok(())
	}

	fn noop(name: &'static str) -> impl TaskAction {
		ClosureAction::new(name, accept)
	}

	#[test]
	fn test_lookup() {
		let registry = ActionRegistry::new().with("rate_calls", noop("rate_calls")).unwrap();
		assert!(registry.contains("rate_calls"));
		assert_eq!(registry.get("rate_calls").unwrap().name(), "rate_calls");
	}

	#[test]
	fn test_unknown_action_is_config_error() {
		let err = ActionRegistry::new().get("missing").err().unwrap();
		assert!(matches!(err, Error::Config { .. }));
	}

	#[test]
	fn test_duplicate_name_rejected() {
		let err = ActionRegistry::new()
			.with("invoice", noop("invoice"))
			.unwrap()
			.with("invoice", noop("invoice"))
			.unwrap_err();
		assert!(err.to_string().contains("already registered"));
	}
}
