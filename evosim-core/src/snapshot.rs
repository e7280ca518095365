use serde::{Deserialize, Serialize};

/// An animal as seen by the viewer: position in viewport fractions and heading in radians.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnimalView {
    pub x: f32,
    pub y: f32,
    pub rotation: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FoodView {
    pub x: f32,
    pub y: f32,
}

/// Read-only picture of the engine at one instant.
///
/// Coordinates are expected in `[0, 1]` but the engine owns that guarantee;
/// consumers must not rely on it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorldSnapshot {
    pub animals: Vec<AnimalView>,
    pub foods: Vec<FoodView>,
}

impl WorldSnapshot {
    pub fn new(animals: Vec<AnimalView>, foods: Vec<FoodView>) -> Self {
        Self { animals, foods }
    }

    pub fn is_empty(&self) -> bool {
        self.animals.is_empty() && self.foods.is_empty()
    }
}

/// Fitness summary over one batch of generations.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrainingResult {
    pub min: f32,
    pub max: f32,
    pub avg: f32,
}

impl TrainingResult {
    /// Summarizes a set of fitness values. Returns `None` for an empty set.
    pub fn from_fitness<I>(values: I) -> Option<Self>
    where
        I: IntoIterator<Item = f32>,
    {
        let mut count = 0usize;
        let mut sum = 0.0f32;
        let mut min = f32::INFINITY;
        let mut max = f32::NEG_INFINITY;

        for value in values {
            count += 1;
            sum += value;
            min = min.min(value);
            max = max.max(value);
        }

        if count == 0 {
            return None;
        }

        Some(Self {
            min,
            max,
            avg: sum / count as f32,
        })
    }
}
