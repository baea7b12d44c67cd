//! Per-timestep results.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use wn_core::NodeId;

use crate::engine::Engine;

/// Values of one node for one timestep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeResult {
    pub node: NodeId,
    /// Flow through the node (volume per day).
    pub flow: f64,
    /// Stored volume at the end of the timestep, for storage nodes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<f64>,
}

/// Tooltip text shown on the schematic.
impl fmt::Display for NodeResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Flow: {:.3}", self.flow)?;
        if let Some(volume) = self.volume {
            write!(f, "\nVolume: {:.3}", volume)?;
        }
        Ok(())
    }
}

/// Immutable results of one completed timestep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepSnapshot {
    pub timestamp: NaiveDate,
    pub index: usize,
    pub nodes: Vec<NodeResult>,
}

impl StepSnapshot {
    /// Read the results of the engine's last completed timestep.
    pub fn capture<E: Engine + ?Sized>(engine: &E) -> Option<Self> {
        let index = engine.current_index()?;
        let timestamp = engine.current_timestamp()?;
        let nodes = engine
            .node_ids()
            .iter()
            .filter_map(|id| engine.results_for(id))
            .collect();
        Some(Self {
            timestamp,
            index,
            nodes,
        })
    }

    pub fn get(&self, node: &str) -> Option<&NodeResult> {
        self.nodes.iter().find(|r| r.node.as_str() == node)
    }
}
