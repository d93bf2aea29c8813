//! The aim held between pointer-down and pointer-up.
//!
//! Every drag sample re-resolves the trajectory from the shot origin toward
//! the pointer and refreshes the preview: the bounce path and the shadow of
//! the cells the loaded bubble would cover on landing.

use bevy::prelude::*;

use super::{
    data::GameData,
    hex::HexCoord,
    trajectory::{self, Trajectory},
    world::RoundWorld,
};

/// Geometry shown while aiming.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ShotPreview {
    /// Ray polyline from the shot origin.
    pub path: Vec<Vec2>,
    /// Landing cell followed by the cells its explosion would reach.
    pub shadow: Vec<HexCoord>,
}

/// Cells covered by bubble `def_id` landing on `landing`.
///
/// A bubble without an explosion, or with an unknown one, covers only its
/// landing cell.
pub fn shadow_footprint(data: &GameData, def_id: u32, landing: HexCoord) -> Vec<HexCoord> {
    let mut cells = vec![landing];
    let shape = data
        .bubble(def_id)
        .and_then(|def| def.explosion.as_deref())
        .and_then(|name| data.explosion(name));
    if let Some(shape) = shape {
        for cell in shape.cells_around(landing) {
            if !cells.contains(&cell) {
                cells.push(cell);
            }
        }
    }
    cells
}

/// Current aim of the shooter.
#[derive(Debug, Clone, Default)]
pub struct AimState {
    trajectory: Trajectory,
    preview: Option<ShotPreview>,
}

impl AimState {
    pub fn preview(&self) -> Option<&ShotPreview> {
        self.preview.as_ref()
    }

    pub fn landing(&self) -> Option<HexCoord> {
        self.trajectory.landing
    }

    /// Re-aim toward `pointer`. Aims steeper than the allowed cone are
    /// ignored and the previous preview stays up.
    pub fn aim_at(&mut self, world: &RoundWorld, pointer: Vec2) {
        let origin = world.config.shot_origin();
        let Some(trajectory) = trajectory::resolve(
            world.colliders.as_ref(),
            &world.scene(),
            &world.config,
            origin,
            pointer - origin,
        ) else {
            return;
        };

        let loaded = world
            .reserve
            .front()
            .and_then(|id| world.grid.bubble(id))
            .map(|b| b.def_id());
        let shadow = match (trajectory.landing, loaded) {
            (Some(landing), Some(def_id)) => shadow_footprint(&world.data, def_id, landing),
            (Some(landing), None) => vec![landing],
            (None, _) => Vec::new(),
        };

        self.preview = Some(ShotPreview {
            path: trajectory.path.clone(),
            shadow,
        });
        self.trajectory = trajectory;
    }

    /// Hand out the aimed shot, leaving the state cleared. `None` when the
    /// aim would miss.
    pub fn take_shot(&mut self) -> Option<(HexCoord, Vec<Vec2>)> {
        let trajectory = std::mem::take(&mut self.trajectory);
        self.preview = None;
        trajectory.landing.map(|landing| (landing, trajectory.path))
    }

    pub fn clear(&mut self) {
        self.trajectory = Trajectory::default();
        self.preview = None;
    }
}
