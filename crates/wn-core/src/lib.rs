//! wn-core: stable foundation for waternet.
//!
//! Contains:
//! - schedule (timestepper: start/end dates and fixed daily timesteps)
//! - ids (node identifiers shared by the model, engine and schematic)
//! - error (shared error types)

pub mod error;
pub mod ids;
pub mod schedule;

// Re-exports: nice ergonomics for downstream crates
pub use chrono::NaiveDate;
pub use error::{CoreError, CoreResult};
pub use ids::NodeId;
pub use schedule::Timestepper;
