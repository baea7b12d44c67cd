//! Run state and the control enablement derived from it.

use chrono::NaiveDate;

use crate::events::RunMode;

/// Controller state as seen by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running(RunMode),
    Paused,
}

impl RunState {
    pub fn is_idle(&self) -> bool {
        matches!(self, RunState::Idle)
    }

    pub fn is_running(&self) -> bool {
        matches!(self, RunState::Running(_))
    }

    pub fn is_paused(&self) -> bool {
        matches!(self, RunState::Paused)
    }
}

/// Everything enablement depends on besides the state itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlInputs {
    /// Stop was requested and `Finished` has not arrived yet.
    pub stopping: bool,
    /// Last completed timestep of the open session.
    pub current: Option<NaiveDate>,
    /// Last timestep of the schedule.
    pub end: NaiveDate,
    /// Date in the run-to input.
    pub run_to: NaiveDate,
}

/// Which controls the host should enable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlEnablement {
    pub step: bool,
    pub run: bool,
    pub run_to: bool,
    pub pause: bool,
    pub stop: bool,
    pub inspector: bool,
    pub schedule_inputs: bool,
}

impl ControlEnablement {
    /// Controls of an idle editor.
    pub const IDLE: Self = Self {
        step: true,
        run: true,
        run_to: true,
        pause: false,
        stop: false,
        inspector: false,
        schedule_inputs: true,
    };

    pub fn derive(state: RunState, inputs: &ControlInputs) -> Self {
        match state {
            RunState::Idle => Self::IDLE,
            RunState::Running(mode) => Self {
                step: false,
                run: false,
                run_to: false,
                pause: !inputs.stopping && !matches!(mode, RunMode::Step),
                stop: !inputs.stopping,
                inspector: false,
                schedule_inputs: false,
            },
            RunState::Paused => {
                let can_advance = !inputs.stopping;
                // paused before the first timestep: nothing has been stepped yet
                let before = |date: NaiveDate| inputs.current.is_none_or(|c| c < date);
                Self {
                    step: can_advance && before(inputs.end),
                    run: can_advance && before(inputs.end),
                    run_to: can_advance && before(inputs.run_to),
                    pause: false,
                    stop: !inputs.stopping,
                    inspector: !inputs.stopping && inputs.current.is_some(),
                    schedule_inputs: false,
                }
            }
        }
    }
}
