//! A small stand-in engine: animals wander the unit square and eat food.
//!
//! There is no learning here. Generations are scored by how much each
//! animal ate, then the population is scattered again.

use std::f32::consts::TAU;

use evosim_core::{AnimalView, Engine, EngineError, FoodView, TrainingResult, WorldSnapshot};
use glam::Vec2;
use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Distance travelled per tick, in world units.
const SPEED: f32 = 0.002;
/// Largest heading change per tick, in radians.
const TURN_JITTER: f32 = 0.1;
/// An animal eats food closer than this.
const EAT_RADIUS: f32 = 0.01;

#[derive(Debug, Clone)]
pub struct WanderSettings {
    pub animals: usize,
    pub foods: usize,
    pub generation_length: u64,
    pub seed: Option<u64>,
}

impl Default for WanderSettings {
    fn default() -> Self {
        Self {
            animals: 40,
            foods: 60,
            generation_length: 2500,
            seed: None,
        }
    }
}

#[derive(Debug, Clone)]
struct Animal {
    position: Vec2,
    rotation: f32,
    satiation: u32,
}

#[derive(Debug, Clone)]
struct Food {
    position: Vec2,
}

pub struct WanderEngine {
    rng: StdRng,
    animals: Vec<Animal>,
    foods: Vec<Food>,
    generation_length: u64,
    age: u64,
    generation: u64,
}

impl WanderEngine {
    pub fn new(settings: &WanderSettings) -> Self {
        let mut rng = match settings.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let animals = (0..settings.animals).map(|_| random_animal(&mut rng)).collect();
        let foods = (0..settings.foods)
            .map(|_| Food { position: random_position(&mut rng) })
            .collect();

        Self {
            rng,
            animals,
            foods,
            generation_length: settings.generation_length.max(1),
            age: 0,
            generation: 0,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    fn statistics(&self) -> Option<TrainingResult> {
        TrainingResult::from_fitness(self.animals.iter().map(|a| a.satiation as f32))
    }

    fn move_animals(&mut self) {
        for animal in &mut self.animals {
            let turn = self.rng.gen_range(-TURN_JITTER..TURN_JITTER);
            animal.rotation = (animal.rotation + turn).rem_euclid(TAU);
            let next = animal.position + Vec2::from_angle(animal.rotation) * SPEED;
            // Wrap around the unit square
            animal.position = Vec2::new(next.x.rem_euclid(1.0), next.y.rem_euclid(1.0));
        }
    }

    fn feed_animals(&mut self) {
        for animal in &mut self.animals {
            for food in &mut self.foods {
                if animal.position.distance(food.position) <= EAT_RADIUS {
                    animal.satiation += 1;
                    food.position = random_position(&mut self.rng);
                }
            }
        }
    }

    fn end_generation(&mut self) -> Option<TrainingResult> {
        let stats = self.statistics();
        for animal in &mut self.animals {
            *animal = random_animal(&mut self.rng);
        }
        for food in &mut self.foods {
            food.position = random_position(&mut self.rng);
        }
        self.age = 0;
        self.generation += 1;
        debug!("Generation {} finished: {:?}", self.generation, stats);
        stats
    }
}

fn random_position(rng: &mut StdRng) -> Vec2 {
    Vec2::new(rng.gen(), rng.gen())
}

fn random_animal(rng: &mut StdRng) -> Animal {
    Animal {
        position: random_position(rng),
        rotation: rng.gen_range(0.0..TAU),
        satiation: 0,
    }
}

impl Engine for WanderEngine {
    fn world(&self) -> WorldSnapshot {
        WorldSnapshot::new(
            self.animals
                .iter()
                .map(|a| AnimalView {
                    x: a.position.x,
                    y: a.position.y,
                    rotation: a.rotation,
                })
                .collect(),
            self.foods
                .iter()
                .map(|f| FoodView {
                    x: f.position.x,
                    y: f.position.y,
                })
                .collect(),
        )
    }

    fn step(&mut self) -> Option<TrainingResult> {
        self.move_animals();
        self.feed_animals();
        self.age += 1;

        if self.age >= self.generation_length {
            self.end_generation()
        } else {
            None
        }
    }

    /// Summarizes the last generation closed during the batch, or the
    /// generation still in progress when none closed.
    fn train(&mut self, steps: u32) -> Result<TrainingResult, EngineError> {
        if self.animals.is_empty() {
            return Err(EngineError::EmptyPopulation);
        }

        let mut last = None;
        for _ in 0..steps {
            if let Some(result) = self.step() {
                last = Some(result);
            }
        }

        last.or_else(|| self.statistics()).ok_or(EngineError::EmptyPopulation)
    }
}
