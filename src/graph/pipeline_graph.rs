// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Pipeline assembly and build-time validation.
//!
//! A [`PipelineGraph`] is mutable: nodes are added, ports connected and
//! edges removed freely. [`PipelineGraph::build`] checks the whole graph
//! (ordering, required inputs, per-node configuration), initializes every
//! process, and hands back an immutable [`BuiltPipeline`] for a scheduler.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::consts::DEFAULT_EDGE_CAPACITY;
use crate::config::ConfigMap;
use crate::errors::GraphError;
use crate::graph::validation::{find_cycle, topological_order};
use crate::graph::{dot, Edge, EdgeId, InputBinding, Node, NodeId, PortDirection, PortRef};
use crate::observability::messages::graph::{
    DependencyAdded, EdgeConnected, EdgeRemoved, NodeAdded, NodeInitializationFailed, PipelineBuilt,
};
use crate::observability::messages::StructuredLog;
use crate::resources::ResourcePool;
use crate::traits::Process;

/// Mutable pipeline under construction.
///
/// # Examples
/// ```
/// use framegraph::config::ConfigMap;
/// use framegraph::graph::PipelineGraph;
/// use framegraph::processes::{Collector, VecSource};
///
/// let (collector, collected) = Collector::<i64>::new();
///
/// let mut graph = PipelineGraph::new();
/// let source = graph.add_node("numbers", VecSource::new(vec![1_i64, 2, 3]), ConfigMap::new()).unwrap();
/// let sink = graph.add_node("sink", collector, ConfigMap::new()).unwrap();
/// graph.connect(source.port("out"), sink.port("in"), 2).unwrap();
///
/// let order = graph.topological_order().unwrap().to_vec();
/// assert_eq!(order, vec![source, sink]);
///
/// let built = graph.build().unwrap();
/// assert_eq!(built.node_count(), 2);
/// # drop(collected);
/// ```
pub struct PipelineGraph {
    nodes: Vec<Node>,
    edges: BTreeMap<EdgeId, Edge>,
    next_edge: usize,
    default_capacity: usize,
    /// Optional execution dependencies: `(before, after)` pairs that only
    /// constrain order.
    ordering: Vec<(NodeId, NodeId)>,
    order_cache: Option<Vec<NodeId>>,
}

impl Default for PipelineGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineGraph {
    pub fn new() -> Self {
        Self::with_default_capacity(DEFAULT_EDGE_CAPACITY)
    }

    /// Capacity used by [`PipelineGraph::connect_default`].
    pub fn with_default_capacity(capacity: usize) -> Self {
        Self {
            nodes: Vec::new(),
            edges: BTreeMap::new(),
            next_edge: 0,
            default_capacity: capacity,
            ordering: Vec::new(),
            order_cache: None,
        }
    }

    /// Add a named process instance. Names are unique within a pipeline.
    pub fn add_node<P>(&mut self, name: &str, process: P, config: ConfigMap) -> Result<NodeId, GraphError>
    where
        P: Process + 'static,
    {
        if self.node_id(name).is_some() {
            return Err(GraphError::DuplicateNodeName(name.to_string()));
        }
        let id = NodeId(self.nodes.len());
        let node = Node::new(id, name.to_string(), Box::new(process), config);
        NodeAdded {
            name,
            kind: node.kind(),
            inputs: node.ports().inputs().len(),
            outputs: node.ports().outputs().len(),
        }
        .log();
        self.nodes.push(node);
        self.order_cache = None;
        Ok(id)
    }

    pub fn node_id(&self, name: &str) -> Option<NodeId> {
        self.nodes.iter().find(|n| n.name == name).map(|n| n.id)
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge(&self, id: EdgeId) -> Option<&Edge> {
        self.edges.get(&id)
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Connect an output port to an input port through a bounded edge.
    ///
    /// Connecting an output that already feeds an edge adds another consumer
    /// cursor to that same edge (fan-out); the capacity must then match.
    pub fn connect(&mut self, from: PortRef, to: PortRef, capacity: usize) -> Result<EdgeId, GraphError> {
        self.attach(from, to, capacity, false)
    }

    /// [`PipelineGraph::connect`] with the graph's default capacity.
    pub fn connect_default(&mut self, from: PortRef, to: PortRef) -> Result<EdgeId, GraphError> {
        self.attach(from, to, self.default_capacity, false)
    }

    /// Connect through a deferred edge: the consumer sees values published
    /// in earlier steps, the edge never blocks its producer, and it is left
    /// out of scheduling order. Closes feedback loops without deadlock.
    pub fn connect_deferred(
        &mut self,
        from: PortRef,
        to: PortRef,
        capacity: usize,
    ) -> Result<EdgeId, GraphError> {
        self.attach(from, to, capacity, true)
    }

    fn lookup(&self, id: NodeId) -> Result<&Node, GraphError> {
        self.nodes
            .get(id.0)
            .ok_or_else(|| GraphError::UnknownNode(id.to_string()))
    }

    fn attach(
        &mut self,
        from: PortRef,
        to: PortRef,
        capacity: usize,
        deferred: bool,
    ) -> Result<EdgeId, GraphError> {
        let producer = self.lookup(from.node)?;
        let output_index = producer.ports.output_index(&from.port).ok_or_else(|| {
            GraphError::UnknownPort {
                node: producer.name.clone(),
                port: from.port.clone(),
                direction: PortDirection::Output,
            }
        })?;
        let output_type = producer.ports.outputs()[output_index].port_type;
        let producer_name = producer.name.clone();

        let consumer = self.lookup(to.node)?;
        let input_index = consumer.ports.input_index(&to.port).ok_or_else(|| {
            GraphError::UnknownPort {
                node: consumer.name.clone(),
                port: to.port.clone(),
                direction: PortDirection::Input,
            }
        })?;
        let input_type = consumer.ports.inputs()[input_index].port_type;

        if output_type != input_type {
            return Err(GraphError::PortTypeMismatch {
                from: format!("{}.{}", producer_name, from.port),
                to: format!("{}.{}", consumer.name, to.port),
                output_type: output_type.name(),
                input_type: input_type.name(),
            });
        }
        if consumer.inputs[input_index].is_some() {
            return Err(GraphError::InputAlreadyConnected {
                node: consumer.name.clone(),
                port: to.port.clone(),
            });
        }
        if capacity == 0 {
            return Err(GraphError::InvalidCapacity { capacity });
        }
        let consumer_name = consumer.name.clone();

        let edge_id = match self.nodes[from.node.0].outputs[output_index] {
            Some(existing) => {
                let edge = self
                    .edges
                    .get(&existing)
                    .ok_or(GraphError::UnknownEdge(existing))?;
                if edge.capacity() != capacity || edge.is_deferred() != deferred {
                    return Err(GraphError::FanOutMismatch {
                        node: producer_name,
                        port: from.port,
                        reason: format!(
                            "existing edge has capacity {} (deferred: {}), requested {} (deferred: {})",
                            edge.capacity(),
                            edge.is_deferred(),
                            capacity,
                            deferred
                        ),
                    });
                }
                existing
            }
            None => {
                let id = EdgeId(self.next_edge);
                let edge = Edge::new(id, from.clone(), output_type, capacity, deferred)?;
                self.next_edge += 1;
                self.edges.insert(id, edge);
                self.nodes[from.node.0].outputs[output_index] = Some(id);
                id
            }
        };

        let cursor = self
            .edges
            .get_mut(&edge_id)
            .ok_or(GraphError::UnknownEdge(edge_id))?
            .add_consumer(to.clone());
        self.nodes[to.node.0].inputs[input_index] = Some(InputBinding {
            edge: edge_id,
            cursor,
            deferred,
        });
        self.order_cache = None;

        EdgeConnected {
            from: &format!("{}.{}", producer_name, from.port),
            to: &format!("{}.{}", consumer_name, to.port),
            capacity,
            deferred,
        }
        .log();
        Ok(edge_id)
    }

    /// `after` steps only once `before` has completed a successful step for
    /// it, and is ordered after `before`. No data moves; the dependency is a
    /// trigger edge with the graph's default capacity, so a slow `after`
    /// holds back `before` like any consumer. All of `before`'s dependents
    /// share one trigger edge.
    pub fn add_execution_dependency(&mut self, before: NodeId, after: NodeId) -> Result<EdgeId, GraphError> {
        let (before_name, after_name) = self.dependency_names(before, after)?;

        let edge_id = match self.nodes[before.0].trigger {
            Some(existing) => {
                if self.nodes[after.0].after.iter().any(|b| b.edge == existing) {
                    return Ok(existing);
                }
                existing
            }
            None => {
                let id = EdgeId(self.next_edge);
                let edge = Edge::trigger(id, before, self.default_capacity)?;
                self.next_edge += 1;
                self.edges.insert(id, edge);
                self.nodes[before.0].trigger = Some(id);
                id
            }
        };

        let cursor = self
            .edges
            .get_mut(&edge_id)
            .ok_or(GraphError::UnknownEdge(edge_id))?
            .add_consumer(PortRef {
                node: after,
                port: String::new(),
            });
        self.nodes[after.0].after.push(InputBinding {
            edge: edge_id,
            cursor,
            deferred: false,
        });
        self.order_cache = None;

        DependencyAdded {
            before: &before_name,
            after: &after_name,
            optional: false,
        }
        .log();
        Ok(edge_id)
    }

    /// Order `after` behind `before` without gating it: `after` still steps
    /// whenever its own inputs allow, even if `before` did not step, failed
    /// or retired. Only the sync scheduler's order is affected.
    pub fn add_optional_execution_dependency(&mut self, before: NodeId, after: NodeId) -> Result<(), GraphError> {
        let (before_name, after_name) = self.dependency_names(before, after)?;
        if !self.ordering.contains(&(before, after)) {
            self.ordering.push((before, after));
            self.order_cache = None;
        }

        DependencyAdded {
            before: &before_name,
            after: &after_name,
            optional: true,
        }
        .log();
        Ok(())
    }

    fn dependency_names(&self, before: NodeId, after: NodeId) -> Result<(String, String), GraphError> {
        let before_name = self.lookup(before)?.name.clone();
        let after_name = self.lookup(after)?.name.clone();
        if before == after {
            return Err(GraphError::Cycle {
                path: vec![before_name.clone(), before_name],
            });
        }
        Ok((before_name, after_name))
    }

    /// Remove an edge and every consumer attached to it.
    pub fn disconnect(&mut self, edge: EdgeId) -> Result<(), GraphError> {
        let removed = self.edges.remove(&edge).ok_or(GraphError::UnknownEdge(edge))?;

        let source = removed.source();
        if let Some(node) = self.nodes.get_mut(source.node.0) {
            for slot in node.outputs.iter_mut().filter(|slot| **slot == Some(edge)) {
                *slot = None;
            }
            if node.trigger == Some(edge) {
                node.trigger = None;
            }
        }
        for target in removed.consumers() {
            if let Some(node) = self.nodes.get_mut(target.node.0) {
                for slot in node.inputs.iter_mut() {
                    if slot.map(|b| b.edge) == Some(edge) {
                        *slot = None;
                    }
                }
                node.after.retain(|binding| binding.edge != edge);
            }
        }
        self.order_cache = None;

        EdgeRemoved {
            edge: edge.0,
            consumers: removed.consumers().len(),
        }
        .log();
        Ok(())
    }

    fn adjacency(&self, include_deferred: bool) -> Vec<Vec<usize>> {
        build_adjacency(self.nodes.len(), &self.edges, &self.ordering, include_deferred)
    }

    fn names_of(&self, path: Vec<usize>) -> Vec<String> {
        path.into_iter()
            .map(|index| self.nodes[index].name.clone())
            .collect()
    }

    fn compute_order(&self) -> Result<Vec<NodeId>, GraphError> {
        topological_order(&self.adjacency(false))
            .map(|order| order.into_iter().map(NodeId).collect())
            .map_err(|cycle| GraphError::Cycle {
                path: self.names_of(cycle),
            })
    }

    /// Scheduling order over non-deferred edges and execution dependencies.
    /// Cached until the graph
    /// changes; independent nodes keep insertion order.
    pub fn topological_order(&mut self) -> Result<&[NodeId], GraphError> {
        if self.order_cache.is_none() {
            self.order_cache = Some(self.compute_order()?);
        }
        Ok(self.order_cache.as_deref().unwrap_or(&[]))
    }

    /// Graphviz rendering of the current graph.
    pub fn to_dot(&self) -> String {
        dot::render(&self.nodes, &self.edges, &self.ordering)
    }

    /// Validate and initialize the pipeline.
    ///
    /// # Errors
    /// * [`GraphError::Cycle`] - a cycle of non-deferred edges
    /// * [`GraphError::DisconnectedPort`] - a required input is unbound
    /// * [`GraphError::Configuration`] - a node's config failed its schema
    ///   or its `initialize()`; nodes initialized before it are finalized
    pub fn build(mut self) -> Result<BuiltPipeline, GraphError> {
        let order = match self.order_cache.take() {
            Some(order) => order,
            None => self.compute_order()?,
        };

        for node in &self.nodes {
            for (index, spec) in node.ports.inputs().iter().enumerate() {
                if spec.required && node.inputs[index].is_none() {
                    return Err(GraphError::DisconnectedPort {
                        node: node.name.clone(),
                        port: spec.name.clone(),
                    });
                }
            }
        }

        let feedback_cycle = find_cycle(&self.adjacency(true))
            .map(|path| path.into_iter().map(NodeId).collect::<Vec<_>>());

        for (position, id) in order.iter().enumerate() {
            if let Err(source) = self.nodes[id.0].initialize() {
                let node = self.nodes[id.0].name.clone();
                NodeInitializationFailed {
                    node: &node,
                    error: &source,
                }
                .log();
                for earlier in &order[..position] {
                    if let Some(process) = self.nodes[earlier.0].process.as_mut() {
                        process.finalize();
                    }
                }
                return Err(GraphError::Configuration { node, source });
            }
        }

        PipelineBuilt {
            nodes: self.nodes.len(),
            edges: self.edges.len(),
            feedback: feedback_cycle.is_some(),
        }
        .log();

        Ok(BuiltPipeline {
            nodes: self.nodes,
            edges: self.edges,
            order,
            ordering: self.ordering,
            feedback_cycle,
            resources: Arc::new(ResourcePool::new()),
        })
    }
}

fn build_adjacency(
    node_count: usize,
    edges: &BTreeMap<EdgeId, Edge>,
    ordering: &[(NodeId, NodeId)],
    include_deferred: bool,
) -> Vec<Vec<usize>> {
    let mut adjacency = vec![Vec::new(); node_count];
    for edge in edges.values() {
        if edge.is_deferred() && !include_deferred {
            continue;
        }
        for consumer in edge.consumers() {
            adjacency[edge.source().node.0].push(consumer.node.0);
        }
    }
    for (before, after) in ordering {
        adjacency[before.0].push(after.0);
    }
    adjacency
}

/// `root` and every node reachable from it over any edge or ordering
/// constraint, in breadth-first order.
pub(crate) fn downstream_of(
    root: NodeId,
    node_count: usize,
    edges: &BTreeMap<EdgeId, Edge>,
    ordering: &[(NodeId, NodeId)],
) -> Vec<NodeId> {
    let adjacency = build_adjacency(node_count, edges, ordering, true);
    let mut seen = vec![false; node_count];
    let mut found = Vec::new();
    let mut queue = std::collections::VecDeque::from([root.0]);
    while let Some(index) = queue.pop_front() {
        if index >= node_count || seen[index] {
            continue;
        }
        seen[index] = true;
        found.push(NodeId(index));
        queue.extend(adjacency[index].iter().copied());
    }
    found
}

/// A validated, initialized pipeline ready to hand to a scheduler.
pub struct BuiltPipeline {
    pub(crate) nodes: Vec<Node>,
    pub(crate) edges: BTreeMap<EdgeId, Edge>,
    pub(crate) order: Vec<NodeId>,
    pub(crate) ordering: Vec<(NodeId, NodeId)>,
    pub(crate) feedback_cycle: Option<Vec<NodeId>>,
    pub(crate) resources: Arc<ResourcePool>,
}

impl BuiltPipeline {
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn node_id(&self, name: &str) -> Option<NodeId> {
        self.nodes.iter().find(|n| n.name == name).map(|n| n.id)
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    /// Scheduling order fixed at build time.
    pub fn order(&self) -> &[NodeId] {
        &self.order
    }

    /// A cycle that exists only through deferred edges, if any.
    pub fn feedback_cycle(&self) -> Option<&[NodeId]> {
        self.feedback_cycle.as_deref()
    }

    /// The pool processes will share; seed it before starting if needed.
    pub fn resources(&self) -> &Arc<ResourcePool> {
        &self.resources
    }

    pub fn to_dot(&self) -> String {
        dot::render(&self.nodes, &self.edges, &self.ordering)
    }

    pub(crate) fn cycle_names(&self, path: &[NodeId]) -> Vec<String> {
        path.iter()
            .filter_map(|id| self.nodes.get(id.0))
            .map(|n| n.name.clone())
            .collect()
    }
}
