//! Tunable round constants.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

/// Everything a round needs that is not level data.
#[derive(Resource, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoundConfig {
    /// World positions of the reserve slots. Slot 0 is where shots leave
    /// from and is the origin of every aim ray.
    pub reserve_positions: Vec<Vec2>,
    /// Ray casts per trajectory, bounces included.
    pub max_bounces: usize,
    pub ray_range: f32,
    /// Largest allowed angle between the aim and straight up, in degrees.
    pub max_aim_angle_deg: f32,
    /// How far a bounce origin is pulled back from the hit point.
    pub bounce_nudge: f32,
    /// Shot travel speed in world units per second.
    pub shot_speed: f32,
    /// Travel speed of bubbles moving along a spawner lane.
    pub cascade_speed: f32,
    /// Distance a fresh lane bubble travels before the next lane cell is
    /// processed.
    pub cascade_spawn_distance: f32,
    /// Delay before a chained explosion goes off, in seconds.
    pub explosion_delay: f32,
    pub scroll_duration: f32,
    /// Bubbles kept loaded in the shooter.
    pub reserve_len: usize,
    /// Fixed RNG seed for reproducible bubble picks.
    pub seed: Option<u64>,
}

impl Default for RoundConfig {
    fn default() -> Self {
        Self {
            reserve_positions: vec![
                Vec2::new(0.0, -6.0),
                Vec2::new(1.0, -7.7),
                Vec2::new(-1.0, -7.7),
            ],
            max_bounces: 5,
            ray_range: 20.0,
            max_aim_angle_deg: 80.0,
            bounce_nudge: 0.01,
            shot_speed: 100.0,
            cascade_speed: 10.0,
            cascade_spawn_distance: 1.0,
            explosion_delay: 0.04,
            scroll_duration: 1.0,
            reserve_len: 2,
            seed: None,
        }
    }
}

impl RoundConfig {
    /// World position of a reserve slot. Slots past the configured list sit
    /// on the last one.
    pub fn reserve_position(&self, slot: usize) -> Vec2 {
        self.reserve_positions
            .get(slot)
            .or(self.reserve_positions.last())
            .copied()
            .unwrap_or_default()
    }

    /// Origin of every aim ray.
    pub fn shot_origin(&self) -> Vec2 {
        self.reserve_position(0)
    }
}
