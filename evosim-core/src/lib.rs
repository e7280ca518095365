//! Control-and-render core for an evolving animal/food simulation.
//!
//! The engine is opaque and reached through [`Engine`]. This crate decides
//! when it advances, keeps continuous stepping and batch training apart, and
//! turns each snapshot into canvas operations.

pub mod command;
pub mod controller;
pub mod engine;
pub mod recorder;
pub mod render;
pub mod scheduler;
pub mod snapshot;
pub mod training;
pub mod viewer;
pub mod watch;

#[cfg(test)]
mod test_support;

pub use command::{CommandError, OperatorCommand};
pub use controller::{Controller, RunState};
pub use engine::{Engine, EngineError};
pub use recorder::{DrawCommand, FrameRecorder};
pub use render::{render, Canvas, CanvasGeometry, Color, Point};
pub use scheduler::{AnimationScheduler, CancellationToken, FrameHook, FrameReport};
pub use snapshot::{AnimalView, FoodView, TrainingResult, WorldSnapshot};
pub use training::{
    StepBounds, TrainError, TrainingFailure, TrainingOptions, TrainingOrchestrator,
    TrainingOutcome, TrainingState,
};
pub use viewer::{FrameTick, Viewer};
pub use watch::Watch;
