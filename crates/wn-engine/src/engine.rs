//! Engine traits for pluggable stepped simulators.

use chrono::NaiveDate;
use wn_core::{NodeId, Timestepper};
use wn_model::ModelDef;

use crate::error::EngineResult;
use crate::results::NodeResult;

/// A simulation advanced one discrete timestep at a time.
///
/// An engine is created before its first timestep (`current_index() == None`);
/// each successful `step()` moves it to the next timestamp of its timestepper.
/// Engines must stop exactly on timestep boundaries.
pub trait Engine: Send {
    fn timestepper(&self) -> &Timestepper;

    /// Index of the last completed timestep.
    fn current_index(&self) -> Option<usize>;

    /// Advance exactly one timestep.
    fn step(&mut self) -> EngineResult<()>;

    fn node_ids(&self) -> Vec<NodeId>;

    /// Results of the last completed timestep for `node`.
    fn results_for(&self, node: &NodeId) -> Option<NodeResult>;

    fn current_timestamp(&self) -> Option<NaiveDate> {
        self.current_index()
            .and_then(|i| self.timestepper().timestamp_at(i))
    }

    /// Timestamp the next call to `step()` lands on.
    fn next_timestamp(&self) -> Option<NaiveDate> {
        let next = self.current_index().map_or(0, |i| i + 1);
        self.timestepper().timestamp_at(next)
    }

    fn is_at_end(&self) -> bool {
        self.current_index()
            .is_some_and(|i| i >= self.timestepper().last_index())
    }
}

/// Builds engines from a model definition and a run schedule.
pub trait EngineFactory: Send + Sync + 'static {
    type Engine: Engine + 'static;

    fn construct(&self, model: &ModelDef, timestepper: &Timestepper)
    -> EngineResult<Self::Engine>;
}
