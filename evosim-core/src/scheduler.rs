use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::engine::Engine;
use crate::render::Canvas;
use crate::viewer::{FrameTick, Viewer};

/// Shared stop flag for a scheduler loop. Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FrameReport {
    pub frame: u64,
    /// Time spent stepping and drawing, excluding pacing.
    pub elapsed: Duration,
    pub tick: FrameTick,
}

/// Host callbacks around each frame.
pub trait FrameHook<E: Engine, C: Canvas> {
    /// Runs before the frame; the place to apply queued operator input.
    fn before_frame(&mut self, _viewer: &mut Viewer<E>) {}

    /// Runs after the frame has been drawn into `canvas`.
    fn after_frame(&mut self, _viewer: &mut Viewer<E>, _canvas: &mut C, _report: &FrameReport) {}
}

impl<E: Engine, C: Canvas> FrameHook<E, C> for () {}

/// Drives the step/render cycle at a fixed cadence until cancelled.
pub struct AnimationScheduler {
    frame_duration: Duration,
    token: CancellationToken,
    frame_limit: Option<u64>,
    frames: u64,
}

impl AnimationScheduler {
    pub fn new(framerate: u32) -> Self {
        Self {
            frame_duration: Duration::from_secs_f64(1.0 / f64::from(framerate.max(1))),
            token: CancellationToken::new(),
            frame_limit: None,
            frames: 0,
        }
    }

    /// Stops the loop on its own after `limit` frames.
    pub fn with_frame_limit(mut self, limit: u64) -> Self {
        self.frame_limit = Some(limit);
        self
    }

    pub fn with_token(mut self, token: CancellationToken) -> Self {
        self.token = token;
        self
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn frame_duration(&self) -> Duration {
        self.frame_duration
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Runs a single frame without pacing.
    pub fn execute_once<E, C, H>(
        &mut self,
        viewer: &mut Viewer<E>,
        canvas: &mut C,
        hook: &mut H,
    ) -> FrameReport
    where
        E: Engine,
        C: Canvas,
        H: FrameHook<E, C>,
    {
        let start = Instant::now();
        hook.before_frame(viewer);
        let tick = viewer.frame(canvas);
        let report = FrameReport {
            frame: self.frames,
            elapsed: start.elapsed(),
            tick,
        };
        self.frames += 1;
        hook.after_frame(viewer, canvas, &report);
        report
    }

    fn should_stop(&self) -> bool {
        self.token.is_cancelled() || self.frame_limit.map_or(false, |limit| self.frames >= limit)
    }

    /// Runs frames back to back, sleeping out the rest of each frame budget.
    /// Returns once the token is cancelled or the frame limit is reached.
    pub fn run<E, C, H>(&mut self, viewer: &mut Viewer<E>, canvas: &mut C, hook: &mut H)
    where
        E: Engine,
        C: Canvas,
        H: FrameHook<E, C>,
    {
        info!("Animation loop started at {:?} per frame", self.frame_duration);

        while !self.should_stop() {
            let frame_start = Instant::now();
            self.execute_once(viewer, canvas, hook);

            let elapsed = frame_start.elapsed();
            if elapsed < self.frame_duration {
                spin_sleep::sleep(self.frame_duration - elapsed);
            } else if self.frame_duration >= Duration::from_millis(4) {
                warn!(
                    "Frame {} exceeded budget: {:?} > {:?}",
                    self.frames, elapsed, self.frame_duration
                );
            }
        }

        debug!("Animation loop stopped after {} frames", self.frames);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::OperatorCommand;
    use crate::controller::RunState;
    use crate::recorder::FrameRecorder;
    use crate::render::CanvasGeometry;
    use crate::test_support::CountingEngine;
    use crate::training::TrainingOptions;

    fn viewer(run_state: RunState) -> Viewer<CountingEngine> {
        Viewer::new(
            CountingEngine::default(),
            CanvasGeometry::new(100.0, 100.0, 1.0),
            run_state,
            TrainingOptions::default(),
        )
    }

    /// Cancels after a fixed number of frames and toggles on a chosen frame.
    struct Script {
        cancel_after: u64,
        toggle_at: Option<u64>,
        token: CancellationToken,
        reports: Vec<FrameReport>,
    }

    impl FrameHook<CountingEngine, FrameRecorder> for Script {
        fn before_frame(&mut self, viewer: &mut Viewer<CountingEngine>) {
            if self.toggle_at == Some(self.reports.len() as u64) {
                viewer.apply(OperatorCommand::Toggle).unwrap();
            }
        }

        fn after_frame(
            &mut self,
            _viewer: &mut Viewer<CountingEngine>,
            canvas: &mut FrameRecorder,
            report: &FrameReport,
        ) {
            assert!(!canvas.commands().is_empty(), "every frame draws");
            self.reports.push(report.clone());
            if self.reports.len() as u64 >= self.cancel_after {
                self.token.cancel();
            }
        }
    }

    #[test]
    fn cancelled_token_stops_before_next_frame() {
        let mut scheduler = AnimationScheduler::new(1000);
        let mut script = Script {
            cancel_after: 3,
            toggle_at: None,
            token: scheduler.token(),
            reports: Vec::new(),
        };
        scheduler.run(&mut viewer(RunState::Running), &mut FrameRecorder::new(), &mut script);

        assert_eq!(scheduler.frames(), 3);
        let numbers: Vec<_> = script.reports.iter().map(|r| r.frame).collect();
        assert_eq!(numbers, vec![0, 1, 2]);
    }

    #[test]
    fn loop_keeps_running_while_paused_and_resumes_on_toggle() {
        let mut scheduler = AnimationScheduler::new(1000);
        let mut script = Script {
            cancel_after: 5,
            toggle_at: Some(2),
            token: scheduler.token(),
            reports: Vec::new(),
        };
        scheduler.run(&mut viewer(RunState::Paused), &mut FrameRecorder::new(), &mut script);

        let stepped: Vec<_> = script.reports.iter().map(|r| r.tick.stepped).collect();
        assert_eq!(stepped, vec![false, false, true, true, true]);
    }

    #[test]
    fn frame_limit_stops_the_loop() {
        let mut scheduler = AnimationScheduler::new(1000).with_frame_limit(4);
        scheduler.run(&mut viewer(RunState::Running), &mut FrameRecorder::new(), &mut ());
        assert_eq!(scheduler.frames(), 4);
    }

    #[test]
    fn token_cancelled_up_front_runs_nothing() {
        let token = CancellationToken::new();
        token.cancel();
        let mut scheduler = AnimationScheduler::new(60).with_token(token);
        scheduler.run(&mut viewer(RunState::Running), &mut FrameRecorder::new(), &mut ());
        assert_eq!(scheduler.frames(), 0);
    }

    #[test]
    fn frame_duration_follows_framerate() {
        assert_eq!(AnimationScheduler::new(50).frame_duration(), Duration::from_millis(20));
    }
}
