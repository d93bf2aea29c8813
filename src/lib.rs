//! Simulation core for a hex-grid boss-raid bubble shooter.
//!
//! Build a [`Round`] from loaded [`GameData`], feed it pointer input and
//! tick it once per frame. Adding [`plugin`] to a Bevy app ticks the round
//! held in the [`ActiveRound`] resource and sends [`RoundFinished`] when it
//! ends.

pub mod game;

use bevy::prelude::*;

pub use game::{
    config::RoundConfig,
    data::{DataError, GameData},
    round::{ActiveRound, Round, RoundFinished, RoundPhase, RoundSystems},
    state::{RoundOutcome, RoundTally},
    world::Collaborators,
};

pub fn plugin(app: &mut App) {
    app.add_plugins(game::plugin);
}
