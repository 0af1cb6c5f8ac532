//! Resource dependency graph
//!
//! Every reference inside a resource's properties and every `depends-on`
//! entry adds an edge. The graph is rejected when an edge points at an
//! undeclared resource or when the edges form a cycle.

use crate::error::ConfigurationError;
use plinth_core::ResourceDescriptor;
use std::collections::{BTreeSet, HashMap};

/// Validated DAG over resource descriptors
#[derive(Debug, Clone, Default)]
pub struct ResourceGraph {
    /// Descriptors in declaration order
    nodes: Vec<ResourceDescriptor>,
    index: HashMap<String, usize>,
    /// node -> nodes it depends on
    dependencies: Vec<BTreeSet<usize>>,
    /// node -> nodes depending on it
    dependents: Vec<BTreeSet<usize>>,
    /// Topological order, dependencies first
    order: Vec<usize>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    OnStack,
    Done,
}

impl ResourceGraph {
    /// Build and validate a graph from descriptors in declaration order
    pub fn build(descriptors: Vec<ResourceDescriptor>) -> Result<Self, ConfigurationError> {
        let mut index = HashMap::with_capacity(descriptors.len());
        for (i, descriptor) in descriptors.iter().enumerate() {
            if index.insert(descriptor.name.clone(), i).is_some() {
                return Err(ConfigurationError::DuplicateResource(descriptor.name.clone()));
            }
        }

        let mut dependencies = vec![BTreeSet::new(); descriptors.len()];
        let mut dependents = vec![BTreeSet::new(); descriptors.len()];
        for (i, descriptor) in descriptors.iter().enumerate() {
            for target in descriptor.dependency_names() {
                if target == descriptor.name {
                    return Err(ConfigurationError::Cycle(vec![
                        target.to_string(),
                        target.to_string(),
                    ]));
                }
                let j = *index
                    .get(target)
                    .ok_or_else(|| ConfigurationError::UnknownReference {
                        from: descriptor.name.clone(),
                        to: target.to_string(),
                    })?;
                dependencies[i].insert(j);
                dependents[j].insert(i);
            }
        }

        let mut graph = Self {
            nodes: descriptors,
            index,
            dependencies,
            dependents,
            order: Vec::new(),
        };
        graph.check_cycles()?;
        graph.order = graph.kahn_order();
        Ok(graph)
    }

    /// Graph with no resources
    pub fn empty() -> Self {
        Self::default()
    }

    fn check_cycles(&self) -> Result<(), ConfigurationError> {
        let mut marks = vec![Mark::Unvisited; self.nodes.len()];
        let mut stack = Vec::new();
        for start in 0..self.nodes.len() {
            if marks[start] == Mark::Unvisited {
                self.visit(start, &mut marks, &mut stack)?;
            }
        }
        Ok(())
    }

    fn visit(
        &self,
        node: usize,
        marks: &mut [Mark],
        stack: &mut Vec<usize>,
    ) -> Result<(), ConfigurationError> {
        marks[node] = Mark::OnStack;
        stack.push(node);

        for &dep in &self.dependencies[node] {
            match marks[dep] {
                Mark::OnStack => {
                    let from = stack.iter().position(|&n| n == dep).unwrap_or(0);
                    let mut path: Vec<String> = stack[from..]
                        .iter()
                        .map(|&n| self.nodes[n].name.clone())
                        .collect();
                    path.push(self.nodes[dep].name.clone());
                    return Err(ConfigurationError::Cycle(path));
                }
                Mark::Unvisited => self.visit(dep, marks, stack)?,
                Mark::Done => {}
            }
        }

        stack.pop();
        marks[node] = Mark::Done;
        Ok(())
    }

    /// Kahn's algorithm; among ready nodes the earliest declared goes first
    fn kahn_order(&self) -> Vec<usize> {
        let mut in_degree: Vec<usize> = self.dependencies.iter().map(BTreeSet::len).collect();
        let mut ready: BTreeSet<usize> = in_degree
            .iter()
            .enumerate()
            .filter(|(_, d)| **d == 0)
            .map(|(i, _)| i)
            .collect();

        let mut order = Vec::with_capacity(self.nodes.len());
        while let Some(node) = ready.pop_first() {
            order.push(node);
            for &dependent in &self.dependents[node] {
                in_degree[dependent] -= 1;
                if in_degree[dependent] == 0 {
                    ready.insert(dependent);
                }
            }
        }
        order
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&ResourceDescriptor> {
        self.index.get(name).map(|&i| &self.nodes[i])
    }

    /// Descriptors in declaration order
    pub fn descriptors(&self) -> impl Iterator<Item = &ResourceDescriptor> {
        self.nodes.iter()
    }

    /// Descriptors with every dependency before its dependents
    pub fn topological_order(&self) -> impl Iterator<Item = &ResourceDescriptor> {
        self.order.iter().map(|&i| &self.nodes[i])
    }

    /// Direct dependencies of a node
    pub fn dependencies_of(&self, name: &str) -> Vec<&str> {
        self.neighbours(name, &self.dependencies)
    }

    /// Nodes depending directly on a node
    pub fn dependents_of(&self, name: &str) -> Vec<&str> {
        self.neighbours(name, &self.dependents)
    }

    /// Every node reachable through dependent edges, in topological order
    pub fn transitive_dependents_of(&self, name: &str) -> Vec<&str> {
        let Some(&start) = self.index.get(name) else {
            return Vec::new();
        };

        let mut seen = BTreeSet::new();
        let mut pending = vec![start];
        while let Some(node) = pending.pop() {
            for &dependent in &self.dependents[node] {
                if seen.insert(dependent) {
                    pending.push(dependent);
                }
            }
        }

        self.order
            .iter()
            .filter(|i| seen.contains(*i))
            .map(|&i| self.nodes[i].name.as_str())
            .collect()
    }

    fn neighbours<'a>(&'a self, name: &str, edges: &[BTreeSet<usize>]) -> Vec<&'a str> {
        self.index
            .get(name)
            .map(|&i| {
                edges[i]
                    .iter()
                    .map(|&j| self.nodes[j].name.as_str())
                    .collect()
            })
            .unwrap_or_default()
    }
}
