//! Reference mass-balance engine.
//!
//! Each timestep routes water downstream in topological order:
//! - inputs supply `max_flow`
//! - links pass at most `max_flow`
//! - storages accumulate inflow, release at most `max_release` and spill above `max_volume`
//! - outputs take at most `max_flow` and fail the step below `min_flow`
//!
//! A node's outflow is split equally between its downstream nodes.

use petgraph::Direction;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use tracing::{debug, trace};
use wn_core::{NodeId, Timestepper};
use wn_model::{ModelDef, NodeKind, validate_model};

use crate::engine::{Engine, EngineFactory};
use crate::error::{EngineError, EngineResult};
use crate::results::NodeResult;

const FLOW_TOLERANCE: f64 = 1e-9;

struct BalanceNode {
    id: NodeId,
    kind: NodeKind,
    downstream: Vec<usize>,
}

pub struct BalanceEngine {
    timestepper: Timestepper,
    nodes: Vec<BalanceNode>,
    order: Vec<usize>,
    flows: Vec<f64>,
    volumes: Vec<f64>,
    current: Option<usize>,
}

impl BalanceEngine {
    pub fn new(model: &ModelDef, timestepper: Timestepper) -> EngineResult<Self> {
        validate_model(model)?;

        let mut graph: DiGraph<usize, ()> = DiGraph::new();
        let indices: Vec<NodeIndex> = (0..model.nodes.len()).map(|i| graph.add_node(i)).collect();
        let position = |name: &str| model.nodes.iter().position(|n| n.name == name);
        for edge in &model.edges {
            // validate_model guarantees both ends exist
            if let (Some(from), Some(to)) = (position(edge.from()), position(edge.to())) {
                graph.add_edge(indices[from], indices[to], ());
            }
        }

        let order = toposort(&graph, None)
            .map_err(|cycle| EngineError::Cycle {
                node: model.nodes[graph[cycle.node_id()]].name.clone(),
            })?
            .into_iter()
            .map(|idx| graph[idx])
            .collect();

        let nodes: Vec<BalanceNode> = model
            .nodes
            .iter()
            .enumerate()
            .map(|(i, def)| {
                let mut downstream: Vec<usize> = graph
                    .neighbors_directed(indices[i], Direction::Outgoing)
                    .map(|idx| graph[idx])
                    .collect();
                downstream.sort_unstable();
                BalanceNode {
                    id: NodeId::new(def.name.as_str()),
                    kind: def.kind.clone(),
                    downstream,
                }
            })
            .collect();

        let volumes = nodes
            .iter()
            .map(|n| match n.kind {
                NodeKind::Storage { initial_volume, .. } => initial_volume,
                _ => 0.0,
            })
            .collect();

        debug!(
            nodes = nodes.len(),
            timesteps = timestepper.len(),
            "balance engine constructed"
        );

        Ok(Self {
            flows: vec![0.0; nodes.len()],
            volumes,
            nodes,
            order,
            timestepper,
            current: None,
        })
    }
}

impl Engine for BalanceEngine {
    fn timestepper(&self) -> &Timestepper {
        &self.timestepper
    }

    fn current_index(&self) -> Option<usize> {
        self.current
    }

    fn step(&mut self) -> EngineResult<()> {
        let next = self.current.map_or(0, |i| i + 1);
        let timestamp =
            self.timestepper
                .timestamp_at(next)
                .ok_or_else(|| EngineError::Finished {
                    end: self.timestepper.end(),
                })?;
        let dt = self.timestepper.timestep_days() as f64;

        // Work on copies so a failed step leaves the previous timestep intact.
        let mut inflow = vec![0.0_f64; self.nodes.len()];
        let mut flows = vec![0.0_f64; self.nodes.len()];
        let mut volumes = self.volumes.clone();

        for &i in &self.order {
            let node = &self.nodes[i];
            let outflow = match node.kind {
                NodeKind::Input { max_flow } => max_flow,
                NodeKind::Link { max_flow } => {
                    max_flow.map_or(inflow[i], |cap: f64| inflow[i].min(cap))
                }
                NodeKind::Storage {
                    max_volume,
                    max_release,
                    ..
                } => {
                    let available = volumes[i] + inflow[i] * dt;
                    let release = if node.downstream.is_empty() {
                        0.0
                    } else {
                        (max_release * dt).min(available)
                    };
                    volumes[i] = (available - release).min(max_volume);
                    release / dt
                }
                NodeKind::Output { max_flow, min_flow } => {
                    let delivered = inflow[i].min(max_flow);
                    if delivered + FLOW_TOLERANCE < min_flow {
                        return Err(EngineError::Infeasible {
                            timestamp,
                            node: node.id.to_string(),
                            delivered,
                            required: min_flow,
                        });
                    }
                    delivered
                }
            };
            flows[i] = outflow;

            if !node.downstream.is_empty() {
                let share = outflow / node.downstream.len() as f64;
                for &target in &node.downstream {
                    inflow[target] += share;
                }
            }
        }

        trace!(%timestamp, index = next, "balance step");
        self.flows = flows;
        self.volumes = volumes;
        self.current = Some(next);
        Ok(())
    }

    fn node_ids(&self) -> Vec<NodeId> {
        self.nodes.iter().map(|n| n.id.clone()).collect()
    }

    fn results_for(&self, node: &NodeId) -> Option<NodeResult> {
        self.current?;
        let i = self.nodes.iter().position(|n| &n.id == node)?;
        let volume = match self.nodes[i].kind {
            NodeKind::Storage { .. } => Some(self.volumes[i]),
            _ => None,
        };
        Some(NodeResult {
            node: node.clone(),
            flow: self.flows[i],
            volume,
        })
    }
}

/// Builds a [`BalanceEngine`] for each run session.
#[derive(Debug, Clone, Copy, Default)]
pub struct BalanceEngineFactory;

impl EngineFactory for BalanceEngineFactory {
    type Engine = BalanceEngine;

    fn construct(
        &self,
        model: &ModelDef,
        timestepper: &Timestepper,
    ) -> EngineResult<Self::Engine> {
        BalanceEngine::new(model, timestepper.clone())
    }
}
