//! Structural model validation.

use std::collections::HashSet;

use chrono::NaiveDate;
use thiserror::Error;

use crate::schema::{ModelDef, NodeKind};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Timestep must be at least one day")]
    InvalidTimestep,

    #[error("The start date ({start}) must be before the end date ({end})")]
    InvalidDates { start: NaiveDate, end: NaiveDate },

    #[error("Node name must not be empty")]
    EmptyNodeName,

    #[error("Duplicate node name: {name}")]
    DuplicateNode { name: String },

    #[error("Edge {from} -> {to} references unknown node {missing}")]
    UnknownEdgeNode {
        from: String,
        to: String,
        missing: String,
    },

    #[error("Edge {name} -> {name} connects a node to itself")]
    SelfLoop { name: String },

    #[error("Node {name} ({kind}) cannot have {direction} edges")]
    InvalidConnection {
        name: String,
        kind: &'static str,
        direction: &'static str,
    },

    #[error("Node {name}: {what} must be finite and non-negative")]
    InvalidValue { name: String, what: &'static str },

    #[error("Node {name}: initial volume exceeds maximum volume")]
    InitialVolumeTooLarge { name: String },

    #[error("Node {name}: min_flow exceeds max_flow")]
    MinFlowTooLarge { name: String },
}

fn check_value(name: &str, what: &'static str, value: f64) -> Result<(), ValidationError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ValidationError::InvalidValue {
            name: name.to_string(),
            what,
        })
    }
}

pub fn validate_model(model: &ModelDef) -> Result<(), ValidationError> {
    let ts = &model.timestepper;
    if ts.timestep == 0 {
        return Err(ValidationError::InvalidTimestep);
    }
    if ts.start >= ts.end {
        return Err(ValidationError::InvalidDates {
            start: ts.start,
            end: ts.end,
        });
    }

    let mut names = HashSet::new();
    for node in &model.nodes {
        if node.name.trim().is_empty() {
            return Err(ValidationError::EmptyNodeName);
        }
        if !names.insert(node.name.as_str()) {
            return Err(ValidationError::DuplicateNode {
                name: node.name.clone(),
            });
        }

        match &node.kind {
            NodeKind::Input { max_flow } => check_value(&node.name, "max_flow", *max_flow)?,
            NodeKind::Link { max_flow } => {
                if let Some(max_flow) = max_flow {
                    check_value(&node.name, "max_flow", *max_flow)?;
                }
            }
            NodeKind::Storage {
                max_volume,
                initial_volume,
                max_release,
            } => {
                check_value(&node.name, "max_volume", *max_volume)?;
                check_value(&node.name, "initial_volume", *initial_volume)?;
                check_value(&node.name, "max_release", *max_release)?;
                if initial_volume > max_volume {
                    return Err(ValidationError::InitialVolumeTooLarge {
                        name: node.name.clone(),
                    });
                }
            }
            NodeKind::Output { max_flow, min_flow } => {
                check_value(&node.name, "max_flow", *max_flow)?;
                check_value(&node.name, "min_flow", *min_flow)?;
                if min_flow > max_flow {
                    return Err(ValidationError::MinFlowTooLarge {
                        name: node.name.clone(),
                    });
                }
            }
        }
    }

    for edge in &model.edges {
        for end in [edge.from(), edge.to()] {
            if !names.contains(end) {
                return Err(ValidationError::UnknownEdgeNode {
                    from: edge.from().to_string(),
                    to: edge.to().to_string(),
                    missing: end.to_string(),
                });
            }
        }
        if edge.from() == edge.to() {
            return Err(ValidationError::SelfLoop {
                name: edge.from().to_string(),
            });
        }
    }

    for node in &model.nodes {
        let invalid = match node.kind {
            NodeKind::Input { .. } => model.upstream(&node.name).next().map(|_| "incoming"),
            NodeKind::Output { .. } => model.downstream(&node.name).next().map(|_| "outgoing"),
            _ => None,
        };
        if let Some(direction) = invalid {
            return Err(ValidationError::InvalidConnection {
                name: node.name.clone(),
                kind: node.kind.label(),
                direction,
            });
        }
    }

    Ok(())
}
