//! The contract between the viewer and whatever runs the simulation.

use thiserror::Error;

use crate::snapshot::{TrainingResult, WorldSnapshot};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("engine has no population to evaluate")]
    EmptyPopulation,

    #[error("engine failure: {0}")]
    Internal(String),
}

/// Simulation engine driven by the viewer.
///
/// `Send + 'static` because batch training moves the engine onto a worker
/// thread for the duration of the batch.
pub trait Engine: Send + 'static {
    /// Current state. Must have no side effects.
    fn world(&self) -> WorldSnapshot;

    /// Advances one tick. Returns statistics when the tick closed a generation.
    fn step(&mut self) -> Option<TrainingResult>;

    /// Runs `steps` ticks in one go and summarizes them. May block for a long time.
    fn train(&mut self, steps: u32) -> Result<TrainingResult, EngineError>;
}

impl<E: Engine + ?Sized> Engine for Box<E> {
    fn world(&self) -> WorldSnapshot {
        (**self).world()
    }

    fn step(&mut self) -> Option<TrainingResult> {
        (**self).step()
    }

    fn train(&mut self, steps: u32) -> Result<TrainingResult, EngineError> {
        (**self).train(steps)
    }
}
