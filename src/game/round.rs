//! One boss round: aiming, firing, resolving and the win/loss check.
//!
//! A [`Round`] is a small state machine over [`RoundPhase`]. Aiming only
//! reads the board; firing hands the shot to a [`ShotRoutine`] on the task
//! scheduler, and the round stays in `Resolving` until that task and
//! everything it started has finished.

use std::sync::Arc;

use bevy::prelude::*;

use super::{
    config::RoundConfig,
    data::{DataError, GameData},
    grid::HexGrid,
    input::PointerInput,
    resolve::ShotRoutine,
    shooter::{AimState, ShotPreview},
    spawner::RefillLanes,
    state::{RoundOutcome, RoundTally},
    task::{Scheduler, TaskId},
    world::{Collaborators, RoundWorld},
};

pub(super) fn plugin(app: &mut App) {
    app.add_message::<RoundFinished>();

    app.add_systems(Update, tick_active_round.in_set(RoundSystems));
}

/// System set for the system that advances the active round.
#[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub struct RoundSystems;

/// The round currently being played, if any.
#[derive(Resource)]
pub struct ActiveRound(pub Round);

/// Message sent once when the active round ends with a result.
#[derive(Message, Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundFinished {
    pub outcome: RoundOutcome,
    pub shots: u32,
}

fn tick_active_round(
    time: Res<Time>,
    round: Option<ResMut<ActiveRound>>,
    mut finished: MessageWriter<RoundFinished>,
) {
    let Some(mut round) = round else {
        return;
    };
    let round = &mut round.0;
    if round.current_round_state() == RoundPhase::RoundEnded {
        return;
    }

    round.per_frame_tick(time.delta_secs());

    if let Some(outcome) = round.outcome() {
        finished.write(RoundFinished {
            outcome,
            shots: round.tally().map_or(0, |t| t.shots),
        });
    }
}

/// Where a round is in its turn cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RoundPhase {
    /// Waiting for the player to press.
    #[default]
    Idle,
    /// Pointer held down, the aim follows it.
    Aiming,
    /// A shot is being resolved; input is ignored.
    Resolving,
    /// The round has a result or was torn down.
    RoundEnded,
}

/// A playable round and its task scheduler.
pub struct Round {
    world: RoundWorld,
    tasks: Scheduler<RoundWorld>,
    phase: RoundPhase,
    input: Box<dyn PointerInput>,
    aim: AimState,
    shot: Option<TaskId>,
    outcome: Option<RoundOutcome>,
}

impl Round {
    /// Set up mode `mode_id`: build its board, put out spawner bubbles and
    /// boss objects, load the shooter and start the first lane refill.
    pub fn new(
        data: Arc<GameData>,
        mode_id: u32,
        config: RoundConfig,
        parts: Collaborators,
        input: impl PointerInput + 'static,
    ) -> Result<Self, DataError> {
        let mode = data.mode(mode_id).ok_or(DataError::UnknownMode(mode_id))?;
        let mut world = RoundWorld::new(config, data.clone(), mode, parts)?;

        world.populate();
        world.refill_reserve();

        let mut tasks = Scheduler::new();
        // Aiming stays blocked until the first refill has run.
        world.loading_spawners = true;
        tasks.spawn("refill", RefillLanes::default());

        info!("Round started for mode {}", mode_id);

        Ok(Self {
            world,
            tasks,
            phase: RoundPhase::Idle,
            input: Box::new(input),
            aim: AimState::default(),
            shot: None,
            outcome: None,
        })
    }

    /// Advance the round by `dt` seconds: animations, input, then tasks.
    pub fn per_frame_tick(&mut self, dt: f32) {
        self.world.frame_dt = dt;
        self.world.tweener.tick(dt);
        self.poll_input();
        self.tasks.tick(&mut self.world, dt);
        self.check_shot();
    }

    fn poll_input(&mut self) {
        self.input.begin_frame();
        if let Some(pos) = self.input.touch_down()
            && !self.input.is_pointer_over_ui()
        {
            self.pointer_down(pos);
        }
        if let Some(pos) = self.input.dragging() {
            self.pointer_drag(pos);
        }
        if let Some(pos) = self.input.touch_up() {
            self.pointer_up(pos);
        }
    }

    fn can_aim(&self) -> bool {
        self.phase == RoundPhase::Idle
            && !self.world.is_loading_spawners()
            && !self.world.reserve.is_empty()
    }

    /// Start aiming at `pos`. Ignored unless the round is idle and no lane
    /// is loading.
    pub fn pointer_down(&mut self, pos: Vec2) -> bool {
        if !self.can_aim() {
            return false;
        }
        self.phase = RoundPhase::Aiming;
        self.aim.aim_at(&self.world, pos);
        true
    }

    /// Follow the pointer while aiming.
    pub fn pointer_drag(&mut self, pos: Vec2) -> bool {
        if self.phase != RoundPhase::Aiming {
            return false;
        }
        self.aim.aim_at(&self.world, pos);
        true
    }

    /// Release at `pos`: re-aim one last time and fire.
    pub fn pointer_up(&mut self, pos: Vec2) -> bool {
        if self.phase != RoundPhase::Aiming {
            return false;
        }
        self.aim.aim_at(&self.world, pos);
        self.fire_if_aiming()
    }

    /// Fire the current aim. An aim without a landing cell cancels the shot
    /// and keeps the reserve as it was.
    pub fn fire_if_aiming(&mut self) -> bool {
        if self.phase != RoundPhase::Aiming || self.world.is_loading_spawners() {
            return false;
        }
        let Some((landing, path)) = self.aim.take_shot() else {
            debug!("Shot cancelled, aim has no landing cell");
            self.phase = RoundPhase::Idle;
            return false;
        };

        self.shot = Some(self.tasks.spawn("shot", ShotRoutine::new(landing, path)));
        self.phase = RoundPhase::Resolving;
        true
    }

    fn check_shot(&mut self) {
        if self.phase != RoundPhase::Resolving {
            return;
        }
        let Some(shot) = self.shot else {
            return;
        };
        if self.tasks.is_running(shot) {
            return;
        }
        self.shot = None;

        match self.world.tally.as_ref().and_then(RoundTally::outcome) {
            Some(outcome) => {
                info!("Round ended: {:?}", outcome);
                self.outcome = Some(outcome);
                self.phase = RoundPhase::RoundEnded;
            }
            None => self.phase = RoundPhase::Idle,
        }
    }

    pub fn current_round_state(&self) -> RoundPhase {
        self.phase
    }

    /// Path and shadow to draw while aiming.
    pub fn preview(&self) -> Option<&ShotPreview> {
        match self.phase {
            RoundPhase::Aiming => self.aim.preview(),
            _ => None,
        }
    }

    pub fn outcome(&self) -> Option<RoundOutcome> {
        self.outcome
    }

    pub fn tally(&self) -> Option<&RoundTally> {
        self.world.tally.as_ref()
    }

    pub fn grid(&self) -> &HexGrid {
        &self.world.grid
    }

    pub fn world(&self) -> &RoundWorld {
        &self.world
    }

    /// Stop every task and give back every pooled object. The round cannot
    /// be played afterwards.
    pub fn teardown(&mut self) {
        self.tasks.stop_all(&mut self.world);
        self.world.release_all();
        self.aim.clear();
        self.shot = None;
        self.phase = RoundPhase::RoundEnded;
        info!("Round torn down");
    }
}
