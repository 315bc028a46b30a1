// src/resolver/graph.rs

//! Dependency graph for build ordering
//!
//! Nodes live in an arena and are addressed by [`NodeId`], the order in
//! which they were first added. Edges point from a package to the packages
//! it depends on.
//!
//! # Example
//!
//! ```ignore
//! let mut graph = BuildGraph::new();
//! let x = graph.add_node("x");
//! let y = graph.add_node("y");
//! graph.add_edge(x, y); // x depends on y
//!
//! let order = graph.topological_order().unwrap();
//! // order: [y, x]
//! ```

use crate::error::{Error, Result};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

/// Index of a node in the arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    White,
    Gray,
    Black,
}

/// Directed dependency graph over package names
#[derive(Debug, Default)]
pub struct BuildGraph {
    names: Vec<String>,
    index: HashMap<String, NodeId>,
    /// Outgoing edges: what each node depends on
    dependencies: Vec<Vec<NodeId>>,
    /// Incoming edges: what depends on each node
    dependents: Vec<Vec<NodeId>>,
}

impl BuildGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node, or return the existing one with that name
    pub fn add_node(&mut self, name: &str) -> NodeId {
        if let Some(&id) = self.index.get(name) {
            return id;
        }

        let id = NodeId(self.names.len());
        self.names.push(name.to_string());
        self.index.insert(name.to_string(), id);
        self.dependencies.push(Vec::new());
        self.dependents.push(Vec::new());
        id
    }

    /// Record that `from` depends on `to`
    ///
    /// Duplicate edges are ignored. Self edges are kept so that they are
    /// reported as cycles.
    pub fn add_edge(&mut self, from: NodeId, to: NodeId) {
        if self.dependencies[from.0].contains(&to) {
            return;
        }
        self.dependencies[from.0].push(to);
        self.dependents[to.0].push(from);
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<NodeId> {
        self.index.get(name).copied()
    }

    pub fn name(&self, id: NodeId) -> &str {
        &self.names[id.0]
    }

    pub fn dependencies(&self, id: NodeId) -> &[NodeId] {
        &self.dependencies[id.0]
    }

    pub fn dependents(&self, id: NodeId) -> &[NodeId] {
        &self.dependents[id.0]
    }

    /// Find one dependency cycle
    ///
    /// The returned names start and end with the same member, following
    /// dependency edges: `a -> b -> a`.
    pub fn find_cycle(&self) -> Option<Vec<String>> {
        let mut color = vec![Color::White; self.len()];
        let mut stack = Vec::new();

        for start in 0..self.len() {
            if color[start] == Color::White
                && let Some(cycle) = self.find_cycle_dfs(NodeId(start), &mut color, &mut stack)
            {
                return Some(cycle);
            }
        }
        None
    }

    fn find_cycle_dfs(
        &self,
        node: NodeId,
        color: &mut [Color],
        stack: &mut Vec<NodeId>,
    ) -> Option<Vec<String>> {
        color[node.0] = Color::Gray;
        stack.push(node);

        for &dep in &self.dependencies[node.0] {
            match color[dep.0] {
                Color::Gray => {
                    let start = stack.iter().position(|&n| n == dep).unwrap_or(0);
                    let mut cycle: Vec<String> = stack[start..]
                        .iter()
                        .map(|&n| self.names[n.0].clone())
                        .collect();
                    cycle.push(self.names[dep.0].clone());
                    return Some(cycle);
                }
                Color::White => {
                    if let Some(cycle) = self.find_cycle_dfs(dep, color, stack) {
                        return Some(cycle);
                    }
                }
                Color::Black => {}
            }
        }

        stack.pop();
        color[node.0] = Color::Black;
        None
    }

    /// Dependencies-first order, stable by first-seen index
    ///
    /// Whenever several nodes are ready, the one added earliest comes first,
    /// so the order is deterministic and respects request order where
    /// dependencies allow it.
    pub fn topological_order(&self) -> Result<Vec<NodeId>> {
        if let Some(cycle) = self.find_cycle() {
            return Err(Error::DependencyCycle(cycle));
        }

        let mut pending: Vec<usize> = self.dependencies.iter().map(Vec::len).collect();
        let mut ready: BinaryHeap<Reverse<NodeId>> = pending
            .iter()
            .enumerate()
            .filter(|(_, count)| **count == 0)
            .map(|(i, _)| Reverse(NodeId(i)))
            .collect();

        let mut order = Vec::with_capacity(self.len());
        while let Some(Reverse(node)) = ready.pop() {
            order.push(node);
            for &dependent in &self.dependents[node.0] {
                pending[dependent.0] -= 1;
                if pending[dependent.0] == 0 {
                    ready.push(Reverse(dependent));
                }
            }
        }

        Ok(order)
    }
}
