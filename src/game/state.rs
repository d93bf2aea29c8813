//! Boss-round bookkeeping: objective health, shots fired, win and loss.

use bevy::prelude::*;

use super::data::SagaBossSystem;

/// How a finished round ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoundOutcome {
    Won,
    Lost,
}

/// Health and shot counters of a boss round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundTally {
    pub max_hp: u32,
    pub hp: u32,
    pub shots: u32,
    pub shot_limit: u32,
}

impl RoundTally {
    pub fn new(max_hp: u32, shot_limit: u32) -> Self {
        Self {
            max_hp,
            hp: max_hp,
            shots: 0,
            shot_limit,
        }
    }

    pub fn from_boss(boss: &SagaBossSystem) -> Self {
        Self::new(boss.boss_hp, boss.limit_shot)
    }

    /// Health never drops below zero.
    pub fn take_damage(&mut self, amount: u32) {
        self.hp = self.hp.saturating_sub(amount);
    }

    pub fn add_shots(&mut self, count: u32) {
        self.shots = self.shots.saturating_add(count);
    }

    pub fn is_cleared(&self) -> bool {
        self.hp == 0
    }

    pub fn is_out_of_shots(&self) -> bool {
        self.shots >= self.shot_limit
    }

    pub fn shots_left(&self) -> u32 {
        self.shot_limit.saturating_sub(self.shots)
    }

    /// Fraction of health left, for gauges.
    pub fn hp_fraction(&self) -> f32 {
        if self.max_hp == 0 {
            return 0.0;
        }
        self.hp as f32 / self.max_hp as f32
    }

    /// Terminal result, if any. Clearing the boss wins even when the last
    /// shot also used up the limit.
    pub fn outcome(&self) -> Option<RoundOutcome> {
        if self.is_cleared() {
            Some(RoundOutcome::Won)
        } else if self.is_out_of_shots() {
            Some(RoundOutcome::Lost)
        } else {
            None
        }
    }
}

/// Receives round progress, typically to drive HUD and result screens.
pub trait RoundResponder: Send + Sync {
    fn on_shot_fired(&mut self, _count: u32, _tally: &RoundTally) {}

    fn on_damage(&mut self, _amount: u32, _tally: &RoundTally) {}

    /// Called once per resolved shot, after the counters are final.
    fn on_result_ready(&mut self, _tally: &RoundTally) {}
}

/// Responder that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoResponder;

impl RoundResponder for NoResponder {}

/// Responder that logs what it is told and keeps the latest values.
#[derive(Debug, Default, Clone)]
pub struct LoggingResponder {
    pub damage_events: Vec<u32>,
    pub shots_reported: u32,
    pub results: Vec<Option<RoundOutcome>>,
}

impl RoundResponder for LoggingResponder {
    fn on_shot_fired(&mut self, count: u32, tally: &RoundTally) {
        self.shots_reported += count;
        info!("Shots: {}/{}", tally.shots, tally.shot_limit);
    }

    fn on_damage(&mut self, amount: u32, tally: &RoundTally) {
        self.damage_events.push(amount);
        info!("Boss took {} damage, {} hp left", amount, tally.hp);
    }

    fn on_result_ready(&mut self, tally: &RoundTally) {
        let outcome = tally.outcome();
        match outcome {
            Some(RoundOutcome::Won) => info!("Round won with {} shots left", tally.shots_left()),
            Some(RoundOutcome::Lost) => info!("Round lost, boss at {} hp", tally.hp),
            None => {}
        }
        self.results.push(outcome);
    }
}
