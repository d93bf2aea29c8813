//! Shot resolution: flight, matches, mines, chained explosions and drops.
//!
//! A shot is one [`ShotRoutine`] that runs its stages in order and joins the
//! tasks each stage starts before moving on.

use bevy::prelude::*;

use super::{
    bubble::BubbleId,
    cluster::{adjacent_mines, floating_nodes, match_cluster},
    hex::HexCoord,
    presentation::{Exit, TweenHandle},
    spawner::RefillLanes,
    task::{Routine, Scheduler, Step, TaskId},
    world::{RoundWorld, SettleScroll},
};

/// Drop every bubble that lost its support. Dropped bubbles deal no damage.
pub fn drop_floating(world: &mut RoundWorld) -> usize {
    let floating = floating_nodes(&world.grid);
    for &coord in &floating {
        if let Some(id) = world.grid.node(coord).and_then(|n| n.bubble()) {
            world.release_bubble(id, Exit::DropOut);
        }
    }
    if !floating.is_empty() {
        info!("Dropped {} floating bubbles", floating.len());
    }
    floating.len()
}

enum PopStage {
    Start,
    /// Waiting out the explosion delay.
    Fuse { coord: HexCoord, cells: Vec<HexCoord> },
    /// Popping the explosion's cells one after another.
    Chain { cells: Vec<HexCoord>, next: usize },
}

/// Pops one bubble: effect, damage, then either a chained explosion or a
/// fade-out.
pub struct PopBubble {
    bubble: BubbleId,
    stage: PopStage,
}

impl PopBubble {
    pub fn new(bubble: BubbleId) -> Self {
        Self {
            bubble,
            stage: PopStage::Start,
        }
    }

    fn start(&mut self, cx: &mut RoundWorld) -> Step {
        let Some(bubble) = cx.grid.bubble(self.bubble) else {
            return Step::Done;
        };
        let (Some(coord), def_id) = (bubble.node(), bubble.def_id()) else {
            return Step::Done;
        };
        if !cx.popping.insert(self.bubble) {
            return Step::Done;
        }

        let Some(def) = cx.data.bubble(def_id).cloned() else {
            warn!("Popping bubble with unknown definition {}", def_id);
            cx.release_bubble(self.bubble, Exit::FadeOut);
            return Step::Done;
        };

        if let Some(effect) = &def.pop_effect {
            cx.show_effect(effect, coord);
        }
        if def.damage > 0 {
            cx.deal_damage(def.damage);
        }

        let shape = def.explosion.as_deref().and_then(|name| {
            let shape = cx.data.explosion(name);
            if shape.is_none() {
                warn!("Unknown explosion shape `{}`, bubble just fades", name);
            }
            shape
        });
        match shape {
            Some(shape) => {
                let cells = shape.cells_around(coord).collect();
                self.stage = PopStage::Fuse { coord, cells };
                Step::seconds(cx.config.explosion_delay)
            }
            None => {
                cx.release_bubble(self.bubble, Exit::FadeOut);
                Step::Done
            }
        }
    }
}

impl Routine<RoundWorld> for PopBubble {
    fn resume(&mut self, cx: &mut RoundWorld, tasks: &mut Scheduler<RoundWorld>) -> Step {
        if let PopStage::Start = self.stage {
            return self.start(cx);
        }
        loop {
            match &mut self.stage {
                PopStage::Start => return Step::Done,
                PopStage::Fuse { coord, cells } => {
                    debug!("Explosion at {}", coord);
                    let cells = std::mem::take(cells);
                    cx.release_bubble(self.bubble, Exit::Instant);
                    self.stage = PopStage::Chain { cells, next: 0 };
                }
                PopStage::Chain { cells, next } => {
                    let Some(&cell) = cells.get(*next) else {
                        return Step::Done;
                    };
                    *next += 1;
                    let target = cx
                        .grid
                        .bubble_at(cell)
                        .map(|b| b.id())
                        .filter(|id| !cx.popping.contains(id));
                    if let Some(target) = target {
                        let child = tasks.spawn("pop", PopBubble::new(target));
                        return Step::join(vec![child]);
                    }
                }
            }
        }
    }
}

/// Pops a matched cluster one bubble at a time.
pub struct PopSequence {
    cells: Vec<HexCoord>,
    next: usize,
}

impl PopSequence {
    pub fn new(cells: Vec<HexCoord>) -> Self {
        Self { cells, next: 0 }
    }
}

impl Routine<RoundWorld> for PopSequence {
    fn resume(&mut self, cx: &mut RoundWorld, tasks: &mut Scheduler<RoundWorld>) -> Step {
        while let Some(&cell) = self.cells.get(self.next) {
            self.next += 1;
            // Cells already cleared by an explosion are skipped.
            if let Some(id) = cx.grid.bubble_at(cell).map(|b| b.id()) {
                let child = tasks.spawn("pop", PopBubble::new(id));
                return Step::join(vec![child]);
            }
        }
        Step::Done
    }
}

/// Sets off every adjacent mine at once and waits for all of them.
pub struct MineBurst {
    cells: Vec<HexCoord>,
    started: bool,
}

impl MineBurst {
    pub fn new(cells: Vec<HexCoord>) -> Self {
        Self {
            cells,
            started: false,
        }
    }
}

impl Routine<RoundWorld> for MineBurst {
    fn resume(&mut self, cx: &mut RoundWorld, tasks: &mut Scheduler<RoundWorld>) -> Step {
        if self.started {
            return Step::Done;
        }
        self.started = true;
        let mines: Vec<BubbleId> = self
            .cells
            .iter()
            .filter_map(|&cell| cx.grid.bubble_at(cell).map(|b| b.id()))
            .collect();
        let pops: Vec<TaskId> = mines
            .into_iter()
            .map(|id| tasks.spawn("mine", PopBubble::new(id)))
            .collect();
        Step::join(pops)
    }
}

enum ShotStage {
    Launch,
    Flight,
    Pops,
    Refill,
    Scroll,
    Finish,
}

/// The full resolution of one fired shot.
pub struct ShotRoutine {
    landing: HexCoord,
    path: Vec<Vec2>,
    stage: ShotStage,
    tween: Option<TweenHandle>,
}

impl ShotRoutine {
    pub fn new(landing: HexCoord, path: Vec<Vec2>) -> Self {
        Self {
            landing,
            path,
            stage: ShotStage::Launch,
            tween: None,
        }
    }

    fn launch(&mut self, cx: &mut RoundWorld) -> Step {
        let Some(bubble) = cx.reserve.pop_front() else {
            warn!("Fired with an empty reserve");
            self.stage = ShotStage::Scroll;
            return Step::next_frame();
        };

        // The bubble ends exactly on its cell.
        let landing_pos = cx.cell_to_world(self.landing);
        match self.path.last_mut() {
            Some(last) => *last = landing_pos,
            None => self.path.push(landing_pos),
        }

        if !cx.grid.set_bubble(self.landing, bubble) {
            warn!("Landing cell {} is taken, shot returned to the reserve", self.landing);
            cx.reserve.push_front(bubble);
            return Step::Done;
        }
        info!("Shot fired at {}", self.landing);
        self.tween = cx.move_bubble(bubble, &self.path, cx.config.shot_speed);
        self.stage = ShotStage::Flight;
        Step::next_frame()
    }

    fn land(&mut self, cx: &mut RoundWorld, tasks: &mut Scheduler<RoundWorld>) -> Step {
        let mut pops = Vec::new();
        if let Some(cluster) = match_cluster(&cx.grid, &cx.data, self.landing) {
            info!("Matched {} bubbles at {}", cluster.len(), self.landing);
            pops.push(tasks.spawn("match", PopSequence::new(cluster)));
        }
        let mines = adjacent_mines(&cx.grid, &cx.data, self.landing);
        if !mines.is_empty() {
            info!("Landing set off {} mines", mines.len());
            pops.push(tasks.spawn("mines", MineBurst::new(mines)));
        }

        if pops.is_empty() {
            self.stage = ShotStage::Scroll;
            return Step::next_frame();
        }
        self.stage = ShotStage::Pops;
        Step::join(pops)
    }
}

impl Routine<RoundWorld> for ShotRoutine {
    fn resume(&mut self, cx: &mut RoundWorld, tasks: &mut Scheduler<RoundWorld>) -> Step {
        match self.stage {
            ShotStage::Launch => self.launch(cx),
            ShotStage::Flight => {
                if cx.is_moving(self.tween) {
                    return Step::next_frame();
                }
                self.tween = None;
                self.land(cx, tasks)
            }
            ShotStage::Pops => {
                drop_floating(cx);
                self.stage = ShotStage::Refill;
                Step::join(vec![tasks.spawn("refill", RefillLanes::default())])
            }
            ShotStage::Refill | ShotStage::Scroll => {
                self.stage = ShotStage::Finish;
                Step::join(vec![tasks.spawn("scroll", SettleScroll::default())])
            }
            ShotStage::Finish => {
                cx.clear_effects();
                cx.refill_reserve();
                if let Some(tally) = cx.tally.as_mut() {
                    tally.add_shots(1);
                    cx.responder.on_shot_fired(1, tally);
                    cx.responder.on_result_ready(tally);
                }
                Step::Done
            }
        }
    }

    fn on_stop(&mut self, cx: &mut RoundWorld) {
        if let Some(tween) = self.tween.take() {
            cx.tweener.kill(tween);
        }
    }
}
