//! Dependency graph of resource nodes and the concurrent walker
//!
//! The graph has one synthetic root plus one node per resource. Edges run
//! from a dependency to its dependent, built from declared `depends_on`
//! entries and, for apply runs, from implicit references found in the
//! attributes. Destroy runs reverse the edges so dependents go first.
//!
//! Walking keeps an in-degree counter per node. A node is handed to the
//! worker pool once every predecessor completed; a failed or skipped
//! predecessor marks it blocked instead, and the block propagates through
//! the rest of its subtree without touching independent branches.

use crate::context::{Message, OperationType, Phase, RunContext};
use crate::error::{Error, Result, Status};
use crate::node::ResourceNode;
use crate::reference::referenced_keys;
use crate::resource::{Action, ResourceKey};
use crate::types::{ExecuteOptions, RunSummary};
use petgraph::Direction::{Incoming, Outgoing};
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc;

#[derive(Debug)]
enum GraphNode {
    Root,
    Resource(ResourceNode),
}

/// Directed acyclic graph of resource nodes
#[derive(Debug)]
pub struct Graph {
    operation: OperationType,
    dag: DiGraph<GraphNode, ()>,
    root: NodeIndex,
    index: HashMap<ResourceKey, NodeIndex>,
}

impl Graph {
    /// Build the graph for `operation` from planned nodes.
    ///
    /// Fails on duplicate keys, cycles, and dependencies outside the plan
    /// declared by a resource being created or updated. Implicit references
    /// to resources outside the plan add no edge; they resolve against the
    /// context index as it stands.
    pub fn build(
        operation: OperationType,
        nodes: impl IntoIterator<Item = ResourceNode>,
    ) -> Result<Self> {
        let mut dag = DiGraph::new();
        let root = dag.add_node(GraphNode::Root);
        let mut index = HashMap::new();

        for node in nodes {
            let key = node.key().clone();
            if index.contains_key(&key) {
                return Err(Error::DuplicateResource(key));
            }
            let idx = dag.add_node(GraphNode::Resource(node));
            index.insert(key, idx);
        }

        let mut graph = Self {
            operation,
            dag,
            root,
            index,
        };
        graph.link_dependencies()?;
        graph.link_root();

        if let Err(cycle) = toposort(&graph.dag, None) {
            let key = graph
                .key_of(cycle.node_id())
                .cloned()
                .unwrap_or_else(|| ResourceKey::from("<root>"));
            return Err(Error::Cycle(key));
        }

        log::debug!(
            "built {} graph with {} nodes and {} edges",
            operation,
            graph.len(),
            graph.dag.edge_count()
        );
        Ok(graph)
    }

    fn link_dependencies(&mut self) -> Result<()> {
        let mut edges = Vec::new();

        for (key, &idx) in &self.index {
            let Some(node) = self.node(idx) else {
                continue;
            };

            for dependency in &node.resource().depends_on {
                let Some(&dep_idx) = self.index.get(dependency) else {
                    if node.action().is_apply() {
                        return Err(Error::MissingDependency {
                            resource: key.clone(),
                            dependency: dependency.clone(),
                        });
                    }
                    log::debug!("{key}: dependency {dependency} is not part of the plan, ignoring");
                    continue;
                };
                edges.push((key, dep_idx, idx));
            }

            if self.operation == OperationType::Apply && node.action().is_apply() {
                for dependency in referenced_keys(&node.resource().attributes) {
                    if let Some(&dep_idx) = self.index.get(&dependency) {
                        log::trace!("{key} references {dependency}, adding edge");
                        edges.push((key, dep_idx, idx));
                    }
                }
            }
        }

        let mut resolved = Vec::with_capacity(edges.len());
        for (key, dep_idx, idx) in edges {
            if dep_idx == idx {
                return Err(Error::Cycle(key.clone()));
            }
            resolved.push(self.orient(dep_idx, idx));
        }
        for (from, to) in resolved {
            self.dag.update_edge(from, to, ());
        }
        Ok(())
    }

    /// Direction of the edge between a dependency and its dependent
    fn orient(&self, dependency: NodeIndex, dependent: NodeIndex) -> (NodeIndex, NodeIndex) {
        let deleting = |idx| self.node(idx).map(ResourceNode::action) == Some(Action::Delete);
        if self.operation == OperationType::Destroy || (deleting(dependency) && deleting(dependent)) {
            (dependent, dependency)
        } else {
            (dependency, dependent)
        }
    }

    fn link_root(&mut self) {
        let entries: Vec<_> = self
            .index
            .values()
            .copied()
            .filter(|&idx| self.dag.neighbors_directed(idx, Incoming).next().is_none())
            .collect();
        for idx in entries {
            self.dag.add_edge(self.root, idx, ());
        }
    }

    pub fn operation(&self) -> OperationType {
        self.operation
    }

    /// Number of resource nodes (the root is not counted)
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&ResourceNode> {
        self.index.get(key).and_then(|&idx| self.node(idx))
    }

    /// Keys that must complete before `key` may start, sorted
    pub fn dependencies(&self, key: &str) -> Vec<ResourceKey> {
        let Some(&idx) = self.index.get(key) else {
            return Vec::new();
        };
        let mut keys: Vec<_> = self
            .dag
            .neighbors_directed(idx, Incoming)
            .filter_map(|pred| self.key_of(pred).cloned())
            .collect();
        keys.sort();
        keys
    }

    /// One valid serial order of the resource nodes
    pub fn execution_order(&self) -> Vec<ResourceKey> {
        toposort(&self.dag, None)
            .map(|order| {
                order
                    .into_iter()
                    .filter_map(|idx| self.key_of(idx).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Walk the graph, executing every eligible node on a bounded pool.
    ///
    /// Returns once every node has executed, failed or been skipped. The
    /// summary lists each failing or skipped node with its status; an
    /// empty failure list means the run fully succeeded.
    pub fn walk(&self, ctx: &RunContext, options: &ExecuteOptions) -> Result<RunSummary> {
        let jobs = options.jobs.max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(jobs)
            .thread_name(|i| format!("converge-worker-{i}"))
            .build()?;
        log::info!(
            "{} {} resources with {} workers",
            self.operation,
            self.len(),
            jobs
        );

        let mut waiting: HashMap<NodeIndex, usize> = self
            .dag
            .node_indices()
            .map(|idx| (idx, self.dag.neighbors_directed(idx, Incoming).count()))
            .collect();
        let mut blocked: HashMap<NodeIndex, ResourceKey> = HashMap::new();
        let mut summary = RunSummary::default();
        let (done_tx, done_rx) = mpsc::channel::<(NodeIndex, std::result::Result<(), Status>)>();

        pool.in_place_scope(|scope| {
            let mut completed = vec![(self.root, true)];
            let mut in_flight = 0usize;

            loop {
                while let Some((idx, succeeded)) = completed.pop() {
                    for next in self.dag.neighbors_directed(idx, Outgoing) {
                        if !succeeded && let Some(key) = self.key_of(idx) {
                            blocked.entry(next).or_insert_with(|| key.clone());
                        }

                        let Some(count) = waiting.get_mut(&next) else {
                            continue;
                        };
                        *count -= 1;
                        if *count > 0 {
                            continue;
                        }
                        let Some(node) = self.node(next) else {
                            continue;
                        };

                        let skip = if ctx.is_cancelled() {
                            Some(Status::cancelled())
                        } else {
                            blocked.get(&next).map(Status::dependency_failed)
                        };
                        if let Some(status) = skip {
                            log::warn!("skipping {}: {}", node.key(), status.message);
                            ctx.emit(
                                Message::new(node.key().clone(), Phase::Skipped)
                                    .with_status(status.clone()),
                            );
                            summary.add_failure(node.key().clone(), status);
                            completed.push((next, false));
                            continue;
                        }

                        in_flight += 1;
                        let done_tx = done_tx.clone();
                        scope.spawn(move |_| {
                            let result = run_node(node, ctx);
                            let _ = done_tx.send((next, result));
                        });
                    }
                }

                if in_flight == 0 {
                    break;
                }
                let Ok((idx, result)) = done_rx.recv() else {
                    break;
                };
                in_flight -= 1;

                if let Some(node) = self.node(idx) {
                    match &result {
                        Ok(()) => summary.add_success(ctx.operation(), node.action()),
                        Err(status) => summary.add_failure(node.key().clone(), status.clone()),
                    }
                }
                completed.push((idx, result.is_ok()));
            }
        });

        if summary.is_success() {
            log::info!("{} finished: {} changes", self.operation, summary.total_changes());
        } else {
            log::warn!(
                "{} finished with {} failed and {} skipped nodes",
                self.operation,
                summary.failed,
                summary.skipped
            );
        }
        Ok(summary)
    }

    fn node(&self, idx: NodeIndex) -> Option<&ResourceNode> {
        match self.dag.node_weight(idx) {
            Some(GraphNode::Resource(node)) => Some(node),
            _ => None,
        }
    }

    fn key_of(&self, idx: NodeIndex) -> Option<&ResourceKey> {
        self.node(idx).map(ResourceNode::key)
    }
}

/// Execute one node on a worker
fn run_node(node: &ResourceNode, ctx: &RunContext) -> std::result::Result<(), Status> {
    if ctx.is_cancelled() {
        let status = Status::cancelled();
        ctx.emit(Message::new(node.key().clone(), Phase::Skipped).with_status(status.clone()));
        return Err(status);
    }

    panic::catch_unwind(AssertUnwindSafe(|| node.execute(ctx))).unwrap_or_else(|_| {
        log::error!("worker panicked while executing {}", node.key());
        let status = Status::backend(format!("panicked while executing {}", node.key()));
        ctx.emit(Message::new(node.key().clone(), Phase::Failed).with_status(status.clone()));
        Err(status)
    })
}
