//! Batch training off the frame loop.
//!
//! A batch takes the engine away from the [`Controller`] and runs it on a
//! worker thread. While the engine is away the controller cannot step it,
//! and a second batch cannot start, so the two modes of progress never
//! overlap. The outcome travels back over a channel and is picked up by
//! [`TrainingOrchestrator::poll`], which the scheduler calls once per frame.

use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, TryRecvError};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::controller::Controller;
use crate::engine::{Engine, EngineError};
use crate::snapshot::TrainingResult;
use crate::watch::Watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrainingState {
    Idle,
    Training,
}

impl Default for TrainingState {
    fn default() -> Self {
        TrainingState::Idle
    }
}

/// Accepted batch sizes, inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepBounds {
    pub min: u32,
    pub max: u32,
}

impl Default for StepBounds {
    fn default() -> Self {
        Self {
            min: 1_000,
            max: 100_000,
        }
    }
}

impl StepBounds {
    /// Zero is refused even when `min` is zero.
    pub fn check(&self, steps: u32) -> Result<u32, TrainError> {
        if steps == 0 {
            return Err(TrainError::InvalidSteps(0.0));
        }
        if steps < self.min || steps > self.max {
            return Err(TrainError::OutOfRange {
                steps: f64::from(steps),
                min: self.min,
                max: self.max,
            });
        }
        Ok(steps)
    }

    /// Validates an untyped request: present, finite, a positive integer, in range.
    pub fn check_raw(&self, steps: Option<f64>) -> Result<u32, TrainError> {
        let steps = steps.ok_or(TrainError::MissingSteps)?;
        if !steps.is_finite() || steps <= 0.0 || steps.fract() != 0.0 {
            return Err(TrainError::InvalidSteps(steps));
        }
        if steps < f64::from(self.min) || steps > f64::from(self.max) {
            return Err(TrainError::OutOfRange {
                steps,
                min: self.min,
                max: self.max,
            });
        }
        Ok(steps as u32)
    }
}

/// Why a train request was refused. A refused request changes nothing.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TrainError {
    #[error("training request has no step count")]
    MissingSteps,

    #[error("step count must be a finite positive integer, got {0}")]
    InvalidSteps(f64),

    #[error("step count {steps} outside accepted range {min}..={max}")]
    OutOfRange { steps: f64, min: u32, max: u32 },

    #[error("a training batch is already in progress")]
    AlreadyTraining,

    #[error("engine is not available")]
    EngineUnavailable,

    #[error("failed to start training worker: {0}")]
    Spawn(String),
}

/// Why an accepted batch produced no result.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TrainingFailure {
    #[error("engine failed: {0}")]
    Engine(#[from] EngineError),

    #[error("training batch did not finish within {0:?}")]
    TimedOut(Duration),

    #[error("training worker exited without returning the engine")]
    WorkerLost,
}

pub type TrainingOutcome = Result<TrainingResult, TrainingFailure>;

type Handoff<E> = (E, Result<TrainingResult, EngineError>);

struct Batch<E> {
    steps: u32,
    started: Instant,
    done: Receiver<Handoff<E>>,
}

#[derive(Debug, Clone, Default)]
pub struct TrainingOptions {
    pub bounds: StepBounds,
    /// Give up on a batch after this long. `None` waits forever.
    pub timeout: Option<Duration>,
    /// Toggle back to running once a batch completes, if training paused it.
    pub resume_after_training: bool,
}

pub struct TrainingOrchestrator<E: Engine> {
    state: Watch<TrainingState>,
    results: Watch<Option<TrainingResult>>,
    options: TrainingOptions,
    in_flight: Option<Batch<E>>,
    // A timed-out batch still holds the engine; it is reclaimed if the worker ever finishes.
    stranded: Option<Receiver<Handoff<E>>>,
    paused_for_batch: bool,
}

impl<E: Engine> TrainingOrchestrator<E> {
    pub fn new(options: TrainingOptions) -> Self {
        Self {
            state: Watch::new(TrainingState::Idle),
            results: Watch::new(None),
            options,
            in_flight: None,
            stranded: None,
            paused_for_batch: false,
        }
    }

    pub fn state(&self) -> TrainingState {
        *self.state.get()
    }

    pub fn is_training(&self) -> bool {
        self.state() == TrainingState::Training
    }

    pub fn latest_result(&self) -> Option<TrainingResult> {
        *self.results.get()
    }

    pub fn bounds(&self) -> StepBounds {
        self.options.bounds
    }

    pub fn subscribe_state(&mut self) -> Receiver<TrainingState> {
        self.state.subscribe()
    }

    pub fn subscribe_results(&mut self) -> Receiver<Option<TrainingResult>> {
        self.results.subscribe()
    }

    /// Publishes statistics from a generation closed during continuous stepping.
    pub fn publish_generation(&mut self, result: TrainingResult) {
        self.results.publish(Some(result));
    }

    /// Same as [`train`](Self::train) for an untyped step count.
    pub fn train_raw(
        &mut self,
        controller: &mut Controller<E>,
        steps: Option<f64>,
    ) -> Result<(), TrainError> {
        if self.is_training() {
            return Err(TrainError::AlreadyTraining);
        }
        let steps = self.options.bounds.check_raw(steps)?;
        self.train(controller, steps)
    }

    /// Starts a batch of `steps` ticks.
    ///
    /// On success the controller is paused and the state is `Training`
    /// before this returns; the batch itself runs on a worker thread.
    pub fn train(&mut self, controller: &mut Controller<E>, steps: u32) -> Result<(), TrainError> {
        if self.is_training() {
            return Err(TrainError::AlreadyTraining);
        }
        self.options.bounds.check(steps)?;
        self.reclaim_stranded(controller);
        if !controller.engine_resident() {
            return Err(TrainError::EngineUnavailable);
        }

        let (job_tx, job_rx) = bounded::<E>(1);
        let (done_tx, done_rx) = bounded::<Handoff<E>>(1);
        thread::Builder::new()
            .name("evosim-train".to_string())
            .spawn(move || {
                if let Ok(mut engine) = job_rx.recv() {
                    let outcome = engine.train(steps);
                    let _ = done_tx.send((engine, outcome));
                }
            })
            .map_err(|e| TrainError::Spawn(e.to_string()))?;

        self.paused_for_batch = controller.running();
        if self.paused_for_batch {
            controller.toggle();
        }
        self.state.publish(TrainingState::Training);

        let engine = match controller.lend_engine() {
            Some(engine) => engine,
            None => {
                self.roll_back(controller);
                return Err(TrainError::EngineUnavailable);
            }
        };
        if let Err(returned) = job_tx.send(engine) {
            controller.return_engine(returned.into_inner());
            self.roll_back(controller);
            return Err(TrainError::Spawn(
                "worker exited before receiving the engine".to_string(),
            ));
        }

        info!("Training batch of {} steps started", steps);
        self.in_flight = Some(Batch {
            steps,
            started: Instant::now(),
            done: done_rx,
        });
        Ok(())
    }

    /// Non-blocking check for a finished batch. Returns the outcome once, when
    /// the batch leaves the `Training` state.
    pub fn poll(&mut self, controller: &mut Controller<E>) -> Option<TrainingOutcome> {
        self.reclaim_stranded(controller);

        let batch = self.in_flight.as_ref()?;
        let polled = batch.done.try_recv();
        let overdue = self
            .options
            .timeout
            .filter(|limit| batch.started.elapsed() >= *limit);

        match polled {
            Ok((engine, outcome)) => Some(self.finish(controller, engine, outcome)),
            Err(TryRecvError::Disconnected) => Some(self.lose_worker()),
            Err(TryRecvError::Empty) => overdue.map(|limit| self.abandon(limit)),
        }
    }

    /// Blocks up to `limit` for the in-flight batch. Returns `None` when no
    /// batch is in flight or it is still running after `limit`.
    pub fn wait(
        &mut self,
        controller: &mut Controller<E>,
        limit: Duration,
    ) -> Option<TrainingOutcome> {
        let batch = self.in_flight.as_ref()?;
        match batch.done.recv_timeout(limit) {
            Ok((engine, outcome)) => Some(self.finish(controller, engine, outcome)),
            Err(RecvTimeoutError::Disconnected) => Some(self.lose_worker()),
            Err(RecvTimeoutError::Timeout) => self.poll(controller),
        }
    }

    fn finish(
        &mut self,
        controller: &mut Controller<E>,
        engine: E,
        outcome: Result<TrainingResult, EngineError>,
    ) -> TrainingOutcome {
        let batch = self.in_flight.take();
        controller.return_engine(engine);

        let outcome = outcome.map_err(TrainingFailure::from);
        match &outcome {
            Ok(result) => {
                if let Some(batch) = &batch {
                    info!(
                        "Training batch of {} steps finished in {:?}: \
                         min={:.2} max={:.2} avg={:.2}",
                        batch.steps,
                        batch.started.elapsed(),
                        result.min,
                        result.max,
                        result.avg
                    );
                }
                self.results.publish(Some(*result));
            }
            Err(failure) => warn!("Training batch failed: {}", failure),
        }
        self.state.publish(TrainingState::Idle);

        if self.options.resume_after_training && self.paused_for_batch && !controller.running() {
            controller.toggle();
        }
        self.paused_for_batch = false;
        outcome
    }

    /// Undoes the pause and state flip of a batch that never started.
    fn roll_back(&mut self, controller: &mut Controller<E>) {
        if self.paused_for_batch && !controller.running() {
            controller.toggle();
        }
        self.paused_for_batch = false;
        self.state.publish(TrainingState::Idle);
    }

    fn abandon(&mut self, limit: Duration) -> TrainingOutcome {
        if let Some(batch) = self.in_flight.take() {
            warn!(
                "Training batch of {} steps exceeded {:?}; engine stays with the worker",
                batch.steps, limit
            );
            self.stranded = Some(batch.done);
        }
        self.paused_for_batch = false;
        self.state.publish(TrainingState::Idle);
        Err(TrainingFailure::TimedOut(limit))
    }

    fn lose_worker(&mut self) -> TrainingOutcome {
        self.in_flight = None;
        self.paused_for_batch = false;
        error!("Training worker exited without returning the engine");
        self.state.publish(TrainingState::Idle);
        Err(TrainingFailure::WorkerLost)
    }

    fn reclaim_stranded(&mut self, controller: &mut Controller<E>) {
        let Some(done) = &self.stranded else {
            return;
        };
        match done.try_recv() {
            Ok((engine, _late)) => {
                info!("Late training batch finished; engine reclaimed");
                controller.return_engine(engine);
                self.stranded = None;
            }
            Err(TryRecvError::Empty) => {}
            Err(TryRecvError::Disconnected) => {
                error!("Timed-out training worker exited without returning the engine");
                self.stranded = None;
            }
        }
    }
}
