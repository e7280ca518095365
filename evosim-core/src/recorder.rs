use serde::{Deserialize, Serialize};

use crate::render::{Canvas, Color, Point};

/// One canvas operation, as recorded for a remote surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum DrawCommand {
    ClearRect {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
    },
    FillCircle {
        center: Point,
        radius: f32,
        color: Color,
    },
    FillPath {
        points: Vec<Point>,
        color: Color,
    },
}

/// Canvas that keeps the operations of a frame instead of rasterizing them.
#[derive(Debug, Clone, Default)]
pub struct FrameRecorder {
    commands: Vec<DrawCommand>,
}

impl FrameRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    /// Hands out the recorded frame and starts an empty one.
    pub fn take(&mut self) -> Vec<DrawCommand> {
        std::mem::take(&mut self.commands)
    }
}

impl Canvas for FrameRecorder {
    fn clear_rect(&mut self, x: f32, y: f32, width: f32, height: f32) {
        // Everything before a full clear is invisible.
        self.commands.clear();
        self.commands.push(DrawCommand::ClearRect { x, y, width, height });
    }

    fn fill_circle(&mut self, center: Point, radius: f32, color: Color) {
        self.commands.push(DrawCommand::FillCircle { center, radius, color });
    }

    fn fill_polygon(&mut self, points: &[Point], color: Color) {
        self.commands.push(DrawCommand::FillPath {
            points: points.to_vec(),
            color,
        });
    }
}
