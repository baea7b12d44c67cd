//! Model schema definitions.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use wn_core::{CoreResult, NodeId, Timestepper};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelDef {
    #[serde(default)]
    pub metadata: MetadataDef,
    pub timestepper: TimestepperDef,
    #[serde(default)]
    pub nodes: Vec<NodeDef>,
    #[serde(default)]
    pub edges: Vec<EdgeDef>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MetadataDef {
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimestepperDef {
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// Timestep length in days.
    #[serde(default = "default_timestep")]
    pub timestep: u32,
}

fn default_timestep() -> u32 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NodeDef {
    pub name: String,
    #[serde(flatten)]
    pub kind: NodeKind,
}

/// Node behaviour. Flows are volumes per day.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeKind {
    Input {
        max_flow: f64,
    },
    Link {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_flow: Option<f64>,
    },
    Storage {
        max_volume: f64,
        initial_volume: f64,
        max_release: f64,
    },
    Output {
        max_flow: f64,
        #[serde(default)]
        min_flow: f64,
    },
}

impl NodeKind {
    pub fn label(&self) -> &'static str {
        match self {
            NodeKind::Input { .. } => "input",
            NodeKind::Link { .. } => "link",
            NodeKind::Storage { .. } => "storage",
            NodeKind::Output { .. } => "output",
        }
    }
}

/// Directed connection `[from, to]`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EdgeDef(pub String, pub String);

impl EdgeDef {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self(from.into(), to.into())
    }

    pub fn from(&self) -> &str {
        &self.0
    }

    pub fn to(&self) -> &str {
        &self.1
    }
}

impl ModelDef {
    /// Timestepper declared in the model file.
    pub fn timestepper(&self) -> CoreResult<Timestepper> {
        Timestepper::new(
            self.timestepper.start,
            self.timestepper.end,
            self.timestepper.timestep,
        )
    }

    pub fn node(&self, name: &str) -> Option<&NodeDef> {
        self.nodes.iter().find(|n| n.name == name)
    }

    pub fn node_ids(&self) -> Vec<NodeId> {
        self.nodes.iter().map(|n| NodeId::new(n.name.as_str())).collect()
    }

    pub fn downstream<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.edges
            .iter()
            .filter(move |e| e.from() == name)
            .map(|e| e.to())
    }

    pub fn upstream<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.edges
            .iter()
            .filter(move |e| e.to() == name)
            .map(|e| e.from())
    }
}
