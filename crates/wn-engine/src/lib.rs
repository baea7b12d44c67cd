//! Simulation engine boundary for waternet networks.
//!
//! Provides:
//! - `Engine` / `EngineFactory`: the opaque stepped engine the run worker drives
//! - Per-timestep result snapshots handed from the worker to the interactive side
//! - `BalanceEngine`: a reference mass-balance engine routing water downstream

pub mod balance;
pub mod engine;
pub mod error;
pub mod results;

pub use balance::{BalanceEngine, BalanceEngineFactory};
pub use engine::{Engine, EngineFactory};
pub use error::{EngineError, EngineResult};
pub use results::{NodeResult, StepSnapshot};
