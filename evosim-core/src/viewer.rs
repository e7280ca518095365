use std::time::Duration;

use crossbeam_channel::Receiver;
use log::{debug, warn};

use crate::command::OperatorCommand;
use crate::controller::{Controller, RunState};
use crate::engine::Engine;
use crate::render::{render, Canvas, CanvasGeometry};
use crate::snapshot::{TrainingResult, WorldSnapshot};
use crate::training::{
    TrainError, TrainingOptions, TrainingOrchestrator, TrainingOutcome, TrainingState,
};

/// What happened during one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameTick {
    /// The engine advanced one tick.
    pub stepped: bool,
    /// A generation closed during that tick.
    pub generation: Option<TrainingResult>,
    /// A training batch left the `Training` state this frame.
    pub training: Option<TrainingOutcome>,
}

/// The control-and-render core: controller, orchestrator and canvas geometry.
pub struct Viewer<E: Engine> {
    controller: Controller<E>,
    orchestrator: TrainingOrchestrator<E>,
    geometry: CanvasGeometry,
}

impl<E: Engine> Viewer<E> {
    pub fn new(
        engine: E,
        geometry: CanvasGeometry,
        run_state: RunState,
        options: TrainingOptions,
    ) -> Self {
        Self {
            controller: Controller::new(engine, run_state),
            orchestrator: TrainingOrchestrator::new(options),
            geometry,
        }
    }

    pub fn toggle(&mut self) -> RunState {
        self.controller.toggle()
    }

    pub fn running(&self) -> bool {
        self.controller.running()
    }

    pub fn run_state(&self) -> RunState {
        self.controller.run_state()
    }

    pub fn training_state(&self) -> TrainingState {
        self.orchestrator.state()
    }

    pub fn latest_result(&self) -> Option<TrainingResult> {
        self.orchestrator.latest_result()
    }

    pub fn geometry(&self) -> &CanvasGeometry {
        &self.geometry
    }

    pub fn world(&self) -> WorldSnapshot {
        self.controller.world()
    }

    pub fn train(&mut self, steps: u32) -> Result<(), TrainError> {
        self.orchestrator.train(&mut self.controller, steps)
    }

    pub fn train_raw(&mut self, steps: Option<f64>) -> Result<(), TrainError> {
        self.orchestrator.train_raw(&mut self.controller, steps)
    }

    pub fn subscribe_training(&mut self) -> Receiver<TrainingState> {
        self.orchestrator.subscribe_state()
    }

    pub fn subscribe_results(&mut self) -> Receiver<Option<TrainingResult>> {
        self.orchestrator.subscribe_results()
    }

    /// Blocks up to `limit` for an in-flight batch to finish.
    pub fn wait_for_training(&mut self, limit: Duration) -> Option<TrainingOutcome> {
        self.orchestrator.wait(&mut self.controller, limit)
    }

    /// Applies an operator request. Rejected training requests are logged
    /// and returned; they leave all state untouched.
    pub fn apply(&mut self, command: OperatorCommand) -> Result<(), TrainError> {
        debug!("Operator command: {:?}", command);
        match command {
            OperatorCommand::Toggle => {
                self.toggle();
                Ok(())
            }
            OperatorCommand::Train { steps } => self.train_raw(steps).map_err(|e| {
                warn!("Training request rejected: {}", e);
                e
            }),
        }
    }

    /// Completion check, then one step when running, then a full redraw.
    pub fn frame<C: Canvas + ?Sized>(&mut self, canvas: &mut C) -> FrameTick {
        let training = self.orchestrator.poll(&mut self.controller);

        let stepped = self.controller.running()
            && self.controller.engine_resident()
            && !self.orchestrator.is_training();
        let generation = if stepped { self.controller.step() } else { None };
        if let Some(result) = generation {
            self.orchestrator.publish_generation(result);
        }

        render(&self.controller.world(), &self.geometry, canvas);

        FrameTick {
            stepped,
            generation,
            training,
        }
    }
}
