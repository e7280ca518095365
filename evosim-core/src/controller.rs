use log::debug;
use serde::{Deserialize, Serialize};

use crate::engine::Engine;
use crate::snapshot::{TrainingResult, WorldSnapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunState {
    Running,
    Paused,
}

impl RunState {
    pub fn flipped(self) -> Self {
        match self {
            RunState::Running => RunState::Paused,
            RunState::Paused => RunState::Running,
        }
    }
}

impl Default for RunState {
    fn default() -> Self {
        RunState::Paused
    }
}

/// Where the engine currently lives.
enum EngineSlot<E> {
    Resident(E),
    /// Handed to a batch-train worker; the snapshot taken at hand-off is kept for drawing.
    OnLoan(WorldSnapshot),
}

/// Owns the engine and the run/pause state, and gates single-step advancement.
pub struct Controller<E: Engine> {
    slot: EngineSlot<E>,
    run_state: RunState,
}

impl<E: Engine> Controller<E> {
    pub fn new(engine: E, run_state: RunState) -> Self {
        Self {
            slot: EngineSlot::Resident(engine),
            run_state,
        }
    }

    pub fn toggle(&mut self) -> RunState {
        self.run_state = self.run_state.flipped();
        debug!("Run state is now {:?}", self.run_state);
        self.run_state
    }

    pub fn running(&self) -> bool {
        self.run_state == RunState::Running
    }

    pub fn run_state(&self) -> RunState {
        self.run_state
    }

    /// Advances the engine by one tick when running and the engine is not
    /// away on a training batch. Otherwise does nothing.
    pub fn step(&mut self) -> Option<TrainingResult> {
        if !self.running() {
            return None;
        }
        match &mut self.slot {
            EngineSlot::Resident(engine) => engine.step(),
            EngineSlot::OnLoan(_) => None,
        }
    }

    /// Current snapshot, or the one parked when the engine was lent out.
    pub fn world(&self) -> WorldSnapshot {
        match &self.slot {
            EngineSlot::Resident(engine) => engine.world(),
            EngineSlot::OnLoan(parked) => parked.clone(),
        }
    }

    pub fn engine_resident(&self) -> bool {
        matches!(self.slot, EngineSlot::Resident(_))
    }

    /// Takes the engine out, leaving its current snapshot behind.
    pub(crate) fn lend_engine(&mut self) -> Option<E> {
        let parked = match &self.slot {
            EngineSlot::Resident(engine) => engine.world(),
            EngineSlot::OnLoan(_) => return None,
        };
        match std::mem::replace(&mut self.slot, EngineSlot::OnLoan(parked)) {
            EngineSlot::Resident(engine) => Some(engine),
            EngineSlot::OnLoan(_) => None,
        }
    }

    pub(crate) fn return_engine(&mut self, engine: E) {
        self.slot = EngineSlot::Resident(engine);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::CountingEngine;

    #[test]
    fn toggle_parity() {
        let mut controller = Controller::new(CountingEngine::default(), RunState::Paused);
        for n in 1..=6 {
            controller.toggle();
            assert_eq!(controller.running(), n % 2 == 1, "after {} toggles", n);
        }
    }

    #[test]
    fn paused_step_leaves_world_unchanged() {
        let mut controller = Controller::new(CountingEngine::default(), RunState::Paused);
        let before = controller.world();
        for _ in 0..10 {
            controller.step();
        }
        assert_eq!(controller.world(), before);
    }

    #[test]
    fn running_step_advances_engine() {
        let mut controller = Controller::new(CountingEngine::default(), RunState::Running);
        let before = controller.world();
        controller.step();
        assert_ne!(controller.world(), before);
    }

    #[test]
    fn step_while_engine_on_loan_is_ignored() {
        let mut controller = Controller::new(CountingEngine::default(), RunState::Running);
        let before = controller.world();
        let mut engine = controller.lend_engine().unwrap();
        assert!(controller.lend_engine().is_none());

        controller.step();
        assert_eq!(controller.world(), before);

        engine.step();
        controller.return_engine(engine);
        assert_ne!(controller.world(), before);
    }

    #[test]
    fn generation_result_is_handed_back() {
        let engine = CountingEngine {
            generation_length: 2,
            ..CountingEngine::default()
        };
        let mut controller = Controller::new(engine, RunState::Running);
        assert!(controller.step().is_none());
        assert!(controller.step().is_some());
    }
}
