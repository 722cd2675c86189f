// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::collections::{HashMap, HashSet, VecDeque};

use cdcflow_type::{Error, Result, TaskId};
use petgraph::{
	Direction,
	stable_graph::{NodeIndex, StableDiGraph},
	visit::{EdgeRef, IntoEdgeReferences},
};

/// Directed acyclic graph of task dependencies. Edges point from an upstream
/// task to the task that depends on it.
///
/// Tie-breaking follows node insertion order, so every traversal is deterministic.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
	graph: StableDiGraph<TaskId, ()>,
	index: HashMap<TaskId, NodeIndex>,
	insertion_order: Vec<NodeIndex>,
}

impl DependencyGraph {
	pub fn new() -> Self {
		Self::default()
	}

	/// Adds a node; a no-op if the task is already present.
	pub fn add_task(&mut self, task: &TaskId) -> NodeIndex {
		if let Some(&idx) = self.index.get(task) {
			return idx;
		}
		let idx = self.graph.add_node(task.clone());
		self.index.insert(task.clone(), idx);
		self.insertion_order.push(idx);
		idx
	}

	/// Removes a task together with every edge touching it.
	pub fn remove_task(&mut self, task: &TaskId) -> bool {
		let Some(idx) = self.index.remove(task) else {
			return false;
		};
		self.graph.remove_node(idx);
		self.insertion_order.retain(|&i| i != idx);
		true
	}

	pub fn contains(&self, task: &TaskId) -> bool {
		self.index.contains_key(task)
	}

	pub fn edge_count(&self) -> usize {
		self.graph.edge_count()
	}

	/// Declare that `task` runs after `upstream`.
	///
	/// Fails with [`Error::CycleDetected`] if `upstream` already depends on `task`,
	/// directly or transitively. The graph is left unchanged in that case.
	pub fn add_dependency(&mut self, task: &TaskId, upstream: &TaskId) -> Result<()> {
		let to = self.add_task(task);
		let from = self.add_task(upstream);

		if let Some(mut path) = self.path(to, from) {
			path.push(task.clone());
			return Err(Error::CycleDetected {
				cycle: path,
			});
		}

		if self.graph.find_edge(from, to).is_none() {
			self.graph.add_edge(from, to, ());
		}
		Ok(())
	}

	/// Direct upstream tasks, in insertion order.
	pub fn upstream(&self, task: &TaskId) -> Vec<TaskId> {
		self.neighbors(task, Direction::Incoming)
	}

	/// Direct dependents, in insertion order.
	pub fn downstream(&self, task: &TaskId) -> Vec<TaskId> {
		self.neighbors(task, Direction::Outgoing)
	}

	/// Every task `task` depends on, directly or through other tasks.
	pub fn transitive_upstream(&self, task: &TaskId) -> HashSet<TaskId> {
		let mut result = HashSet::new();
		let Some(&start) = self.index.get(task) else {
			return result;
		};

		let mut queue = VecDeque::from([start]);
		while let Some(idx) = queue.pop_front() {
			for upstream in self.graph.neighbors_directed(idx, Direction::Incoming) {
				if let Some(id) = self.graph.node_weight(upstream) {
					if result.insert(id.clone()) {
						queue.push_back(upstream);
					}
				}
			}
		}
		result
	}

	/// Topological order of all nodes using Kahn's algorithm, ties broken by
	/// insertion order.
	pub fn toposort(&self) -> Result<Vec<TaskId>> {
		let mut in_degree: HashMap<NodeIndex, usize> = self.graph.node_indices().map(|idx| (idx, 0)).collect();
		for edge in self.graph.edge_references() {
			*in_degree.entry(edge.target()).or_insert(0) += 1;
		}

		let mut queue: VecDeque<NodeIndex> =
			self.insertion_order.iter().filter(|idx| in_degree.get(idx) == Some(&0)).copied().collect();
		let mut result = Vec::with_capacity(self.graph.node_count());

		while let Some(idx) = queue.pop_front() {
			if let Some(task) = self.graph.node_weight(idx) {
				result.push(task.clone());
			}

			let mut neighbors: Vec<NodeIndex> = self.graph.neighbors_directed(idx, Direction::Outgoing).collect();
			neighbors.sort_by_key(|n| self.position(*n));
			for neighbor in neighbors {
				if let Some(degree) = in_degree.get_mut(&neighbor) {
					*degree = degree.saturating_sub(1);
					if *degree == 0 {
						queue.push_back(neighbor);
					}
				}
			}
		}

		if result.len() != self.graph.node_count() {
			// unreachable through add_dependency, kept for graphs built elsewhere
			let stuck = self
				.insertion_order
				.iter()
				.filter(|idx| in_degree.get(idx).is_some_and(|d| *d > 0))
				.filter_map(|idx| self.graph.node_weight(*idx).cloned())
				.collect();
			return Err(Error::CycleDetected {
				cycle: stuck,
			});
		}
		Ok(result)
	}

	fn neighbors(&self, task: &TaskId, direction: Direction) -> Vec<TaskId> {
		let Some(&idx) = self.index.get(task) else {
			return Vec::new();
		};
		let mut neighbors: Vec<NodeIndex> = self.graph.neighbors_directed(idx, direction).collect();
		neighbors.sort_by_key(|n| self.position(*n));
		neighbors.into_iter().filter_map(|n| self.graph.node_weight(n).cloned()).collect()
	}

	fn position(&self, idx: NodeIndex) -> usize {
		self.insertion_order.iter().position(|&i| i == idx).unwrap_or(usize::MAX)
	}

	/// Shortest path of task ids from `from` to `to` along dependency edges.
	fn path(&self, from: NodeIndex, to: NodeIndex) -> Option<Vec<TaskId>> {
		let mut previous: HashMap<NodeIndex, NodeIndex> = HashMap::new();
		let mut queue = VecDeque::from([from]);
		let mut seen = HashSet::from([from]);

		while let Some(idx) = queue.pop_front() {
			if idx == to {
				let mut path = vec![idx];
				let mut current = idx;
				while let Some(&prev) = previous.get(&current) {
					path.push(prev);
					current = prev;
				}
				path.reverse();
				return path.into_iter().map(|i| self.graph.node_weight(i).cloned()).collect();
			}
			for next in self.graph.neighbors_directed(idx, Direction::Outgoing) {
				if seen.insert(next) {
					previous.insert(next, idx);
					queue.push_back(next);
				}
			}
		}
		None
	}
}
