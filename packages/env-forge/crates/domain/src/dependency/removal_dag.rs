use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum GraphError {
    #[error("Circular dependency detected: {0}")]
    Cycle(String),
}

/// Orders removals so that dependents are torn down before the apps they
/// depend on. Built fresh per removal from the flat dependency lists.
pub struct RemovalDag {
    graph: DiGraph<String, ()>,
    // Map app name to NodeIndex for quick lookups
    node_map: HashMap<String, NodeIndex>,
}

impl RemovalDag {
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            node_map: HashMap::new(),
        }
    }

    pub fn add_app(&mut self, name: impl Into<String>) -> NodeIndex {
        let name = name.into();
        if let Some(&idx) = self.node_map.get(&name) {
            idx
        } else {
            let idx = self.graph.add_node(name.clone());
            self.node_map.insert(name, idx);
            idx
        }
    }

    /// `app` depends on `depends_on`, so `app` must be removed first.
    /// Edge: app -> depends_on.
    pub fn add_dependency(&mut self, app: &str, depends_on: &str) {
        let app_idx = self.add_app(app);
        let dep_idx = self.add_app(depends_on);

        // Avoid duplicate edges
        if self.graph.find_edge(app_idx, dep_idx).is_none() {
            self.graph.add_edge(app_idx, dep_idx, ());
        }
    }

    /// Removal order: every app precedes everything it depends on.
    pub fn removal_order(&self) -> Result<Vec<String>, GraphError> {
        match toposort(&self.graph, None) {
            Ok(nodes) => Ok(nodes.iter().map(|&idx| self.graph[idx].clone()).collect()),
            Err(cycle) => {
                let node_weight = &self.graph[cycle.node_id()];
                Err(GraphError::Cycle(node_weight.clone()))
            }
        }
    }
}

impl Default for RemovalDag {
    fn default() -> Self {
        Self::new()
    }
}
