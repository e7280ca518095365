//! Ships recorded frames to a remote canvas.
//!
//! A [`Frame`] is serialized to one text line by a [`Serializer`] and handed
//! to a [`Sender`]. Binary frames are base64 encoded so every sender stays
//! line oriented.

use evosim_core::{DrawCommand, TrainingResult, TrainingState};
use serde::Serialize;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use thiserror::Error;

#[cfg(feature = "websocket")]
mod websocket;
#[cfg(feature = "websocket")]
pub use websocket::WebSocketSender;

// --- Error Type ---
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Binary serialization error: {0}")]
    Binary(#[from] bincode::Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("WebSocket error: {0}")]
    WebSocket(String),
}

/// One rendered frame plus the control state a remote UI needs to show.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Frame {
    pub frame: u64,
    pub width: f32,
    pub height: f32,
    pub running: bool,
    pub training: TrainingState,
    pub result: Option<TrainingResult>,
    pub commands: Vec<DrawCommand>,
}

// --- Traits ---
/// Turns a frame into one line of text.
pub trait Serializer: Send + Sync {
    fn serialize(&self, frame: &Frame) -> Result<String, TransportError>;
}

/// Sends serialized frames to a destination.
pub trait Sender {
    fn send(&mut self, data: &[u8]) -> Result<(), TransportError>;

    fn flush(&mut self) -> Result<(), TransportError> {
        Ok(())
    }
}

// --- Serializers ---

pub struct JsonSerializer;

impl Serializer for JsonSerializer {
    fn serialize(&self, frame: &Frame) -> Result<String, TransportError> {
        Ok(serde_json::to_string(frame)?)
    }
}

/// bincode, then base64.
pub struct BinarySerializer;

impl Serializer for BinarySerializer {
    fn serialize(&self, frame: &Frame) -> Result<String, TransportError> {
        let buffer = bincode::serialize(frame)?;
        Ok(base64::encode(&buffer))
    }
}

// --- Senders ---

/// Writes one frame per line to standard output.
pub struct StdioSender {
    stdout: io::Stdout,
}

impl StdioSender {
    pub fn new() -> Self {
        StdioSender { stdout: io::stdout() }
    }
}

impl Default for StdioSender {
    fn default() -> Self {
        Self::new()
    }
}

impl Sender for StdioSender {
    fn send(&mut self, data: &[u8]) -> Result<(), TransportError> {
        let mut out = self.stdout.lock();
        out.write_all(data)?;
        out.write_all(b"\n")?;
        out.flush()?; // Ensure it's written immediately
        Ok(())
    }
}

/// Appends one frame per line to a file.
pub struct FileSender {
    writer: BufWriter<File>,
}

impl FileSender {
    /// Creates or truncates `path`.
    pub fn new(path: &Path) -> Result<Self, TransportError> {
        let file = File::create(path)?;
        log::info!("Writing frames to {}", path.display());
        Ok(Self { writer: BufWriter::new(file) })
    }
}

impl Sender for FileSender {
    fn send(&mut self, data: &[u8]) -> Result<(), TransportError> {
        self.writer.write_all(data)?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), TransportError> {
        self.writer.flush()?;
        Ok(())
    }
}

impl Drop for FileSender {
    fn drop(&mut self) {
        if let Err(e) = self.writer.flush() {
            log::error!("Failed to flush frame file: {}", e);
        }
    }
}
