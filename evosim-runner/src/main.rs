use clap::Parser;
use crossbeam_channel::{Receiver, Sender as CommandSender};
use evosim_config::{
    load_config, Config, ConfigError, SenderType, SerializerType, TrainingSettings,
};
use evosim_core::{
    AnimationScheduler, CancellationToken, CanvasGeometry, FrameHook, FrameRecorder, FrameReport,
    OperatorCommand, RunState, StepBounds, TrainingOptions, TrainingResult, TrainingState, Viewer,
};
use evosim_simulation::{WanderEngine, WanderSettings};
use evosim_transport::{
    BinarySerializer, FileSender, Frame, JsonSerializer, Sender, Serializer, StdioSender,
    TransportError,
};
use hdrhistogram::Histogram;
use log::{debug, error, info, warn};
use thiserror::Error;

#[cfg(feature = "websocket")]
use evosim_transport::WebSocketSender;

use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use std::process;
use std::thread;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the simulation configuration file
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    /// Stop after this many frames instead of running until Ctrl+C
    #[arg(short, long)]
    frames: Option<u64>,
}

#[derive(Error, Debug)]
enum RunnerError {
    #[error("Failed to load config: {0}")]
    Config(#[from] ConfigError),

    #[error("Transport setup failed: {0}")]
    Transport(#[from] TransportError),

    #[error("Failed to install Ctrl+C handler: {0}")]
    Signal(#[from] ctrlc::Error),

    #[error("Failed to start input thread: {0}")]
    Io(#[from] io::Error),

    #[error("Frame statistics unavailable: {0}")]
    Histogram(#[from] hdrhistogram::CreationError),

    #[cfg(not(feature = "websocket"))]
    #[error("{0}")]
    Unsupported(String),
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    if let Err(e) = run(&args) {
        error!("{}", e);
        process::exit(1);
    }
}

fn run(args: &Args) -> Result<(), RunnerError> {
    let config = load_config(&args.config)?;
    info!("Using configuration from {}", args.config.display());

    let engine = WanderEngine::new(&WanderSettings {
        animals: config.engine.animals,
        foods: config.engine.foods,
        generation_length: config.engine.generation_length,
        seed: config.engine.seed,
    });
    let geometry = CanvasGeometry::new(
        config.canvas.width,
        config.canvas.height,
        config.canvas.device_pixel_ratio,
    );
    let run_state = if config.start_running { RunState::Running } else { RunState::Paused };
    let mut viewer = Viewer::new(engine, geometry, run_state, training_options(&config.training));

    let (command_tx, command_rx) = crossbeam_channel::unbounded();
    let serializer = create_serializer(&config);
    let sender = create_sender(&config, command_tx)?;

    let mut relay = Relay {
        serializer,
        sender,
        commands: command_rx,
        training: viewer.subscribe_training(),
        results: viewer.subscribe_results(),
        frame_times: Histogram::new_with_bounds(1, 60_000_000, 3)?,
    };

    let token = CancellationToken::new();
    let handler_token = token.clone();
    ctrlc::set_handler(move || handler_token.cancel())?;

    let mut scheduler = AnimationScheduler::new(config.framerate).with_token(token);
    if let Some(frames) = args.frames {
        scheduler = scheduler.with_frame_limit(frames);
    }

    info!(
        "Running at {} FPS on a {}x{} canvas ({:?})",
        config.framerate, geometry.width, geometry.height, run_state
    );
    scheduler.run(&mut viewer, &mut FrameRecorder::new(), &mut relay);

    relay.finish();
    Ok(())
}

fn training_options(settings: &TrainingSettings) -> TrainingOptions {
    TrainingOptions {
        bounds: StepBounds {
            min: settings.min_steps,
            max: settings.max_steps,
        },
        // Validation refuses unrepresentable timeouts; treat any that slip through as none.
        timeout: settings
            .timeout_secs
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok()),
        resume_after_training: settings.resume_after_training,
    }
}

fn create_serializer(config: &Config) -> Box<dyn Serializer> {
    match config.transport.serializer.serializer_type {
        SerializerType::Json => Box::new(JsonSerializer),
        SerializerType::Binary => Box::new(BinarySerializer),
    }
}

/// Builds the configured sender. Senders that cannot carry operator input
/// get a stdin reader feeding `commands` instead.
fn create_sender(
    config: &Config,
    commands: CommandSender<OperatorCommand>,
) -> Result<Box<dyn Sender>, RunnerError> {
    let sender_config = &config.transport.sender;
    match sender_config.sender_type {
        SenderType::Stdio => {
            spawn_stdin_reader(commands)?;
            info!("Sending frames to standard output");
            Ok(Box::new(StdioSender::new()))
        }
        SenderType::File => {
            spawn_stdin_reader(commands)?;
            let options = sender_config.get_file_options();
            Ok(Box::new(FileSender::new(Path::new(&options.output_path))?))
        }
        SenderType::WebSocket => {
            #[cfg(feature = "websocket")]
            {
                let options = sender_config.get_websocket_options();
                let mut sender = WebSocketSender::new(&options.host, options.port, commands)?;
                sender.start()?;
                Ok(Box::new(sender))
            }
            #[cfg(not(feature = "websocket"))]
            {
                drop(commands);
                Err(RunnerError::Unsupported(
                    "WebSocket sender configured but websocket feature is not enabled".to_string(),
                ))
            }
        }
    }
}

/// Reads operator commands, one per line, until stdin closes.
fn spawn_stdin_reader(commands: CommandSender<OperatorCommand>) -> io::Result<()> {
    thread::Builder::new().name("evosim-stdin".to_string()).spawn(move || {
        for line in io::stdin().lock().lines() {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    warn!("Stopped reading operator input: {}", e);
                    break;
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            match line.parse::<OperatorCommand>() {
                Ok(command) => {
                    if commands.send(command).is_err() {
                        break;
                    }
                }
                Err(e) => warn!("Ignoring operator input {:?}: {}", line, e),
            }
        }
        debug!("Operator input closed");
    })?;
    Ok(())
}

/// Applies queued operator input, ships each recorded frame and keeps
/// frame-time statistics.
struct Relay {
    serializer: Box<dyn Serializer>,
    sender: Box<dyn Sender>,
    commands: Receiver<OperatorCommand>,
    training: Receiver<TrainingState>,
    results: Receiver<Option<TrainingResult>>,
    frame_times: Histogram<u64>,
}

impl Relay {
    fn log_notifications(&self) {
        for state in self.training.try_iter() {
            info!("Training state: {:?}", state);
        }
        for result in self.results.try_iter().flatten() {
            info!(
                "Fitness: min {:.2}, max {:.2}, avg {:.2}",
                result.min, result.max, result.avg
            );
        }
    }

    fn finish(&mut self) {
        if let Err(e) = self.sender.flush() {
            error!("Error flushing frames: {}", e);
        }
        if self.frame_times.is_empty() {
            return;
        }
        info!(
            "{} frames; frame time p50 {}us, p99 {}us, max {}us",
            self.frame_times.len(),
            self.frame_times.value_at_quantile(0.5),
            self.frame_times.value_at_quantile(0.99),
            self.frame_times.max()
        );
    }
}

impl FrameHook<WanderEngine, FrameRecorder> for Relay {
    fn before_frame(&mut self, viewer: &mut Viewer<WanderEngine>) {
        for command in self.commands.try_iter() {
            // Rejections are logged by the viewer.
            let _ = viewer.apply(command);
        }
    }

    fn after_frame(
        &mut self,
        viewer: &mut Viewer<WanderEngine>,
        canvas: &mut FrameRecorder,
        report: &FrameReport,
    ) {
        self.log_notifications();

        let geometry = viewer.geometry();
        let frame = Frame {
            frame: report.frame,
            width: geometry.width,
            height: geometry.height,
            running: viewer.running(),
            training: viewer.training_state(),
            result: viewer.latest_result(),
            commands: canvas.take(),
        };

        match self.serializer.serialize(&frame) {
            Ok(data) => {
                if let Err(e) = self.sender.send(data.as_bytes()) {
                    error!("Error sending frame {}: {}", report.frame, e);
                }
            }
            Err(e) => error!("Error serializing frame {}: {}", report.frame, e),
        }

        self.frame_times
            .saturating_record(u64::try_from(report.elapsed.as_micros()).unwrap_or(u64::MAX));
    }
}
