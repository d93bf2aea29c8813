//! The simulation core of the hex bubble shooter.
//!
//! This module contains all the gameplay logic including:
//! - Hexagonal lattice (odd-r offset coordinates) and the node/bubble graph
//! - Flood-fill queries for matches, support and spawner lanes
//! - Aim resolution against walls and bubbles
//! - Cooperative tasks that resolve a shot stage by stage
//! - Boss-round bookkeeping and the round state machine

pub mod bubble;
pub mod cluster;
pub mod collision;
pub mod config;
pub mod data;
pub mod grid;
pub mod hex;
pub mod input;
pub mod presentation;
pub mod resolve;
pub mod round;
pub mod shooter;
pub mod spawner;
pub mod state;
pub mod task;
pub mod trajectory;
pub mod world;

use bevy::prelude::*;

pub(super) fn plugin(app: &mut App) {
    app.init_resource::<config::RoundConfig>();

    app.add_plugins(round::plugin);
}
