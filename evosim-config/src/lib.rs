use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

// --- Error Type ---
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Validation(String),
}

// --- Enums for Choices ---
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SerializerType {
    Json,
    Binary,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SenderType {
    Stdio,
    File,
    WebSocket,
}

// --- Configuration Sections ---

/// Logical canvas size and the device pixel ratio of the display.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct CanvasSettings {
    #[serde(default = "default_canvas_side")]
    pub width: f32,
    #[serde(default = "default_canvas_side")]
    pub height: f32,
    #[serde(default = "default_device_pixel_ratio")]
    pub device_pixel_ratio: f32,
}

fn default_canvas_side() -> f32 { 800.0 }
fn default_device_pixel_ratio() -> f32 { 1.0 }

impl Default for CanvasSettings {
    fn default() -> Self {
        Self {
            width: default_canvas_side(),
            height: default_canvas_side(),
            device_pixel_ratio: default_device_pixel_ratio(),
        }
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct EngineSettings {
    #[serde(default = "default_animals")]
    pub animals: usize,
    #[serde(default = "default_foods")]
    pub foods: usize,
    #[serde(default = "default_generation_length")]
    pub generation_length: u64,
    /// Fixed RNG seed for reproducible runs.
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_animals() -> usize { 40 }
fn default_foods() -> usize { 60 }
fn default_generation_length() -> u64 { 2500 }

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            animals: default_animals(),
            foods: default_foods(),
            generation_length: default_generation_length(),
            seed: None,
        }
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct TrainingSettings {
    #[serde(default = "default_min_steps")]
    pub min_steps: u32,
    #[serde(default = "default_max_steps")]
    pub max_steps: u32,
    /// Abandon a batch after this many seconds. Absent means wait forever.
    #[serde(default)]
    pub timeout_secs: Option<f64>,
    #[serde(default)]
    pub resume_after_training: bool,
}

fn default_min_steps() -> u32 { 1_000 }
fn default_max_steps() -> u32 { 100_000 }

impl Default for TrainingSettings {
    fn default() -> Self {
        Self {
            min_steps: default_min_steps(),
            max_steps: default_max_steps(),
            timeout_secs: None,
            resume_after_training: false,
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct SerializerConfig {
    #[serde(rename = "type")]
    pub serializer_type: SerializerType,
}

#[derive(Deserialize, Debug, Clone)]
pub struct SenderConfig {
    #[serde(rename = "type")]
    pub sender_type: SenderType,
    pub options: Option<serde_json::Value>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct TransportConfig {
    pub serializer: SerializerConfig,
    pub sender: SenderConfig,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            serializer: SerializerConfig { serializer_type: SerializerType::Json },
            sender: SenderConfig { sender_type: SenderType::Stdio, options: None },
        }
    }
}

// --- Top-Level Config Struct ---

#[derive(Deserialize, Debug, Clone)]
pub struct Config {
    #[serde(default = "default_framerate")]
    pub framerate: u32,
    /// Whether continuous stepping is on when the view attaches.
    #[serde(default = "default_start_running")]
    pub start_running: bool,
    #[serde(default)]
    pub canvas: CanvasSettings,
    #[serde(default)]
    pub engine: EngineSettings,
    #[serde(default)]
    pub training: TrainingSettings,
    #[serde(default)]
    pub transport: TransportConfig,
}

fn default_framerate() -> u32 { 60 }
fn default_start_running() -> bool { true }

impl Default for Config {
    fn default() -> Self {
        Self {
            framerate: default_framerate(),
            start_running: default_start_running(),
            canvas: CanvasSettings::default(),
            engine: EngineSettings::default(),
            training: TrainingSettings::default(),
            transport: TransportConfig::default(),
        }
    }
}

// --- Sender Options ---
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct WebSocketOptions {
    #[serde(default = "default_ws_host")]
    pub host: String,
    #[serde(default = "default_ws_port")]
    pub port: u16,
}

fn default_ws_host() -> String { "127.0.0.1".to_string() }
fn default_ws_port() -> u16 { 8080 }

impl Default for WebSocketOptions {
    fn default() -> Self {
        Self {
            host: default_ws_host(),
            port: default_ws_port(),
        }
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct FileOptions {
    #[serde(default = "default_output_path")]
    pub output_path: String,
}

fn default_output_path() -> String { "frames.jsonl".to_string() }

impl Default for FileOptions {
    fn default() -> Self {
        Self { output_path: default_output_path() }
    }
}

// Helper methods for extracting options
impl SenderConfig {
    pub fn get_websocket_options(&self) -> WebSocketOptions {
        self.options
            .as_ref()
            .and_then(|value| serde_json::from_value(value.clone()).ok())
            .unwrap_or_default()
    }

    pub fn get_file_options(&self) -> FileOptions {
        self.options
            .as_ref()
            .and_then(|value| serde_json::from_value(value.clone()).ok())
            .unwrap_or_default()
    }
}

// --- Loading Function ---

pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config: Config = serde_json::from_str(&content)?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.framerate == 0 {
        return Err(ConfigError::Validation("Framerate cannot be zero.".to_string()));
    }

    let canvas = &config.canvas;
    let sides_valid = [canvas.width, canvas.height]
        .iter()
        .all(|side| side.is_finite() && *side > 0.0);
    if !sides_valid {
        return Err(ConfigError::Validation(
            "Canvas dimensions must be finite positive numbers.".to_string(),
        ));
    }
    if !canvas.device_pixel_ratio.is_finite() || canvas.device_pixel_ratio <= 0.0 {
        return Err(ConfigError::Validation(
            "Device pixel ratio must be a positive number.".to_string(),
        ));
    }

    if config.engine.animals == 0 {
        return Err(ConfigError::Validation("At least one animal is required.".to_string()));
    }
    if config.engine.generation_length == 0 {
        return Err(ConfigError::Validation(
            "Generation length must be greater than 0.".to_string(),
        ));
    }

    let training = &config.training;
    if training.min_steps == 0 || training.min_steps > training.max_steps {
        return Err(ConfigError::Validation(format!(
            "Training step range {}..={} is empty or starts at zero.",
            training.min_steps, training.max_steps
        )));
    }
    if let Some(timeout) = training.timeout_secs {
        // Anything Duration cannot hold is refused here rather than at startup.
        if timeout <= 0.0 || Duration::try_from_secs_f64(timeout).is_err() {
            return Err(ConfigError::Validation(
                "Training timeout must be a positive, representable number of seconds."
                    .to_string(),
            ));
        }
    }

    Ok(())
}
