//! Deterministic engines for unit tests.

use crossbeam_channel::Receiver;

use crate::engine::{Engine, EngineError};
use crate::snapshot::{AnimalView, FoodView, TrainingResult, WorldSnapshot};

/// Moves one animal a fixed distance per tick so every step is observable.
#[derive(Debug, Clone)]
pub struct CountingEngine {
    pub ticks: u64,
    /// Ticks per generation; `0` never closes a generation.
    pub generation_length: u64,
}

impl Default for CountingEngine {
    fn default() -> Self {
        Self {
            ticks: 0,
            generation_length: 0,
        }
    }
}

impl CountingEngine {
    fn summary(&self) -> TrainingResult {
        let t = self.ticks as f32;
        TrainingResult {
            min: t,
            max: t * 3.0,
            avg: t * 2.0,
        }
    }
}

impl Engine for CountingEngine {
    fn world(&self) -> WorldSnapshot {
        let x = (self.ticks % 100) as f32 / 100.0;
        WorldSnapshot::new(
            vec![AnimalView {
                x,
                y: 0.5,
                rotation: 0.0,
            }],
            vec![FoodView { x: 0.25, y: 0.75 }],
        )
    }

    fn step(&mut self) -> Option<TrainingResult> {
        self.ticks += 1;
        if self.generation_length > 0 && self.ticks % self.generation_length == 0 {
            Some(self.summary())
        } else {
            None
        }
    }

    fn train(&mut self, steps: u32) -> Result<TrainingResult, EngineError> {
        self.ticks += u64::from(steps);
        Ok(self.summary())
    }
}

/// Blocks inside `train` until the test sends on (or drops) the gate.
pub struct GatedEngine {
    pub inner: CountingEngine,
    pub gate: Receiver<Result<(), EngineError>>,
}

impl Engine for GatedEngine {
    fn world(&self) -> WorldSnapshot {
        self.inner.world()
    }

    fn step(&mut self) -> Option<TrainingResult> {
        self.inner.step()
    }

    fn train(&mut self, steps: u32) -> Result<TrainingResult, EngineError> {
        match self.gate.recv() {
            Ok(Ok(())) => self.inner.train(steps),
            Ok(Err(err)) => Err(err),
            Err(_) => Err(EngineError::Internal("gate closed".to_string())),
        }
    }
}
