//! Snapshot to canvas drawing.
//!
//! All geometry is in backing-store pixels: logical canvas size multiplied
//! by the device pixel ratio.

use std::f32::consts::PI;

use serde::{Deserialize, Serialize};

use crate::snapshot::{AnimalView, FoodView, WorldSnapshot};

/// Food diameter as a fraction of canvas width.
pub const FOOD_DIAMETER: f32 = 0.01;
/// Animal base radius as a fraction of canvas width.
pub const ANIMAL_SIZE: f32 = 0.01;
/// How far the nose vertex sits beyond the base radius.
pub const NOSE_MULTIPLIER: f32 = 1.5;
/// Angle between the heading and each base vertex.
pub const BASE_ANGLE: f32 = 2.0 / 3.0 * PI;

pub const FOOD_COLOR: Color = Color::rgb(0, 255, 128);
pub const ANIMAL_COLOR: Color = Color::rgb(255, 255, 255);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point) -> f32 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    fn offset(&self, angle: f32, length: f32) -> Point {
        Point::new(self.x + angle.cos() * length, self.y + angle.sin() * length)
    }
}

/// Pixel dimensions of one canvas attachment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CanvasGeometry {
    /// Backing-store width in device pixels.
    pub width: f32,
    /// Backing-store height in device pixels.
    pub height: f32,
    pub logical_width: f32,
    pub logical_height: f32,
}

impl CanvasGeometry {
    /// Scales the logical (CSS) size by the device pixel ratio. A missing or
    /// non-positive ratio counts as `1.0`.
    pub fn new(logical_width: f32, logical_height: f32, device_pixel_ratio: f32) -> Self {
        let scale = if device_pixel_ratio.is_finite() && device_pixel_ratio > 0.0 {
            device_pixel_ratio
        } else {
            1.0
        };
        Self {
            width: logical_width * scale,
            height: logical_height * scale,
            logical_width,
            logical_height,
        }
    }

    fn project(&self, x: f32, y: f32) -> Option<Point> {
        Some(Point::new(unit(x)? * self.width, unit(y)? * self.height))
    }
}

/// Clamps into `[0, 1]`; non-finite values are dropped.
fn unit(value: f32) -> Option<f32> {
    value.is_finite().then(|| value.clamp(0.0, 1.0))
}

/// The drawing operations the render pipeline needs from a 2D surface.
pub trait Canvas {
    fn clear_rect(&mut self, x: f32, y: f32, width: f32, height: f32);

    fn fill_circle(&mut self, center: Point, radius: f32, color: Color);

    /// Fills the closed path through `points`.
    fn fill_polygon(&mut self, points: &[Point], color: Color);
}

/// Nose, left base and right base of an animal's heading triangle.
pub fn animal_triangle(animal: &AnimalView, geometry: &CanvasGeometry) -> Option<[Point; 3]> {
    if !animal.rotation.is_finite() {
        return None;
    }
    let position = geometry.project(animal.x, animal.y)?;
    let size = ANIMAL_SIZE * geometry.width;
    let rotation = animal.rotation;

    Some([
        position.offset(rotation, size * NOSE_MULTIPLIER),
        position.offset(rotation + BASE_ANGLE, size),
        position.offset(rotation - BASE_ANGLE, size),
    ])
}

/// Center and radius of a food marker.
pub fn food_circle(food: &FoodView, geometry: &CanvasGeometry) -> Option<(Point, f32)> {
    let center = geometry.project(food.x, food.y)?;
    Some((center, FOOD_DIAMETER / 2.0 * geometry.width))
}

/// Draws one frame: clear, every food, then every animal.
pub fn render<C: Canvas + ?Sized>(
    world: &WorldSnapshot,
    geometry: &CanvasGeometry,
    canvas: &mut C,
) {
    canvas.clear_rect(0.0, 0.0, geometry.width, geometry.height);

    for food in &world.foods {
        if let Some((center, radius)) = food_circle(food, geometry) {
            canvas.fill_circle(center, radius, FOOD_COLOR);
        }
    }

    for animal in &world.animals {
        if let Some([nose, left, right]) = animal_triangle(animal, geometry) {
            canvas.fill_polygon(&[nose, left, right, nose], ANIMAL_COLOR);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recorder::{DrawCommand, FrameRecorder};

    const EPS: f32 = 1e-4;

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < EPS
    }

    #[test]
    fn animal_nose_and_base_on_square_canvas() {
        let geometry = CanvasGeometry::new(200.0, 200.0, 1.0);
        let animal = AnimalView {
            x: 0.5,
            y: 0.5,
            rotation: 0.0,
        };
        let [nose, left, right] = animal_triangle(&animal, &geometry).unwrap();
        let center = Point::new(100.0, 100.0);

        assert!(close(nose.x, 103.0) && close(nose.y, 100.0), "{:?}", nose);
        assert!(close(left.distance(&center), 2.0));
        assert!(close(right.distance(&center), 2.0));
        // cos(±120°) = -0.5, sin(±120°) = ±√3/2
        assert!(close(left.x, 99.0) && close(left.y, 100.0 + 3f32.sqrt()));
        assert!(close(right.x, 99.0) && close(right.y, 100.0 - 3f32.sqrt()));
    }

    #[test]
    fn food_circle_position_and_radius() {
        let geometry = CanvasGeometry::new(300.0, 300.0, 1.0);
        let (center, radius) = food_circle(&FoodView { x: 0.2, y: 0.8 }, &geometry).unwrap();
        assert!(close(center.x, 60.0) && close(center.y, 240.0));
        assert!(close(radius, 1.5));
    }

    #[test]
    fn device_pixel_ratio_scales_backing_store() {
        let geometry = CanvasGeometry::new(400.0, 300.0, 2.0);
        assert_eq!((geometry.width, geometry.height), (800.0, 600.0));
        assert_eq!((geometry.logical_width, geometry.logical_height), (400.0, 300.0));
        assert_eq!(CanvasGeometry::new(400.0, 300.0, f32::NAN).width, 400.0);
    }

    #[test]
    fn frame_order_is_clear_food_animals() {
        let geometry = CanvasGeometry::new(100.0, 100.0, 1.0);
        let world = WorldSnapshot::new(
            vec![
                AnimalView { x: 0.1, y: 0.1, rotation: 0.0 },
                AnimalView { x: 0.9, y: 0.9, rotation: 1.0 },
            ],
            vec![FoodView { x: 0.5, y: 0.5 }],
        );
        let mut recorder = FrameRecorder::new();
        render(&world, &geometry, &mut recorder);
        let commands = recorder.commands();

        assert_eq!(commands.len(), 4);
        assert!(matches!(
            commands[0],
            DrawCommand::ClearRect { width, height, .. } if width == 100.0 && height == 100.0
        ));
        assert!(matches!(
            commands[1],
            DrawCommand::FillCircle { color, .. } if color == FOOD_COLOR
        ));
        match &commands[2] {
            DrawCommand::FillPath { points, color } => {
                assert_eq!(*color, ANIMAL_COLOR);
                assert_eq!(points.len(), 4);
                assert_eq!(points.first(), points.last(), "path is closed");
                assert!(close(points[0].x, 10.0 + 1.5));
            }
            other => panic!("expected animal path, got {:?}", other),
        }
        assert!(matches!(commands[3], DrawCommand::FillPath { .. }));
    }

    #[test]
    fn render_is_deterministic() {
        let geometry = CanvasGeometry::new(640.0, 480.0, 1.5);
        let world = WorldSnapshot::new(
            vec![AnimalView { x: 0.3, y: 0.6, rotation: 2.5 }],
            vec![FoodView { x: 0.7, y: 0.2 }],
        );
        let mut first = FrameRecorder::new();
        let mut second = FrameRecorder::new();
        render(&world, &geometry, &mut first);
        render(&world, &geometry, &mut second);
        assert_eq!(first.commands(), second.commands());
    }

    #[test]
    fn out_of_range_coordinates_are_clamped_and_non_finite_skipped() {
        let geometry = CanvasGeometry::new(100.0, 100.0, 1.0);
        let world = WorldSnapshot::new(
            vec![
                AnimalView { x: f32::NAN, y: 0.5, rotation: 0.0 },
                AnimalView { x: 0.5, y: 0.5, rotation: f32::INFINITY },
            ],
            vec![FoodView { x: 1.5, y: -0.25 }],
        );
        let mut recorder = FrameRecorder::new();
        render(&world, &geometry, &mut recorder);
        let commands = recorder.commands();

        assert_eq!(commands.len(), 2, "clear plus the clamped food only");
        match &commands[1] {
            DrawCommand::FillCircle { center, .. } => {
                assert_eq!(*center, Point::new(100.0, 0.0));
            }
            other => panic!("expected food circle, got {:?}", other),
        }
    }
}
