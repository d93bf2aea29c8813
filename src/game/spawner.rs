//! Spawner lanes: after a shot every lane is pushed full again.
//!
//! A lane is walked from its far end back toward the spawner. Each lane cell
//! pulls in the nearest bubble still sitting behind it, or a fresh one from
//! the spawner when the rest of the lane is empty. Each move gets a head
//! start before the next cell is handled, so a lane refills as a staggered
//! stream.

use std::collections::HashSet;

use bevy::prelude::*;

use super::{
    cluster::{lane_order, lane_segment},
    grid::CellKind,
    hex::HexCoord,
    presentation::{TweenHandle, path_length},
    task::{Routine, Scheduler, Step, TaskId},
    world::RoundWorld,
};

/// Refills every spawner lane at once and waits for all of them.
#[derive(Debug, Default)]
pub struct RefillLanes {
    lanes: Option<Vec<TaskId>>,
}

impl Routine<RoundWorld> for RefillLanes {
    fn resume(&mut self, cx: &mut RoundWorld, tasks: &mut Scheduler<RoundWorld>) -> Step {
        if self.lanes.is_some() {
            cx.loading_spawners = false;
            return Step::Done;
        }

        cx.loading_spawners = true;
        let spawners: Vec<HexCoord> = cx
            .grid
            .nodes()
            .filter(|n| n.kind() == CellKind::Spawner)
            .map(|n| n.coord())
            .collect();
        let lanes: Vec<TaskId> = spawners
            .into_iter()
            .map(|spawner| tasks.spawn("lane", LaneRefill::new(spawner)))
            .collect();
        self.lanes = Some(lanes.clone());
        Step::join(lanes)
    }

    fn on_stop(&mut self, cx: &mut RoundWorld) {
        cx.loading_spawners = false;
    }
}

/// A move the lane waits on before handling its next cell.
#[derive(Debug, Clone, Copy)]
struct LaneMove {
    tween: TweenHandle,
    length: f32,
    head_start: f32,
}

/// What filling one lane cell produced.
#[derive(Debug)]
enum LaneFill {
    /// A bubble is moving in.
    Moving(LaneMove),
    /// The cell was handled with nothing to wait on.
    Settled,
    /// No bubble could be produced, the lane stops here.
    Exhausted,
}

/// Refills the lane fed by one spawner.
#[derive(Debug)]
pub struct LaneRefill {
    spawner: HexCoord,
    /// Lane cells, far end first. Filled in on the first resume.
    order: Option<Vec<HexCoord>>,
    next: usize,
    filled: HashSet<HexCoord>,
    waiting: Option<LaneMove>,
}

impl LaneRefill {
    pub fn new(spawner: HexCoord) -> Self {
        Self {
            spawner,
            order: None,
            next: 0,
            filled: HashSet::new(),
            waiting: None,
        }
    }

    /// Bring a bubble onto `cell`.
    fn fill(&mut self, cx: &mut RoundWorld, cell: HexCoord) -> LaneFill {
        let mut segment = lane_segment(&cx.grid, cell, &self.filled);
        self.filled.insert(cell);

        let front = segment.iter().position(|&c| !cx.grid.is_vacant(c));
        let (bubble, head_start) = match front {
            Some(index) => {
                segment.truncate(index + 1);
                let Some(id) = cx.grid.bubble_at(segment[index]).map(|b| b.id()) else {
                    return LaneFill::Settled;
                };
                (id, 0.0)
            }
            None => {
                let Some(def_id) = cx.pools.random_appear_id(&mut cx.rng) else {
                    warn!("Mode has no appear bubbles, lane at {} stays empty", self.spawner);
                    return LaneFill::Exhausted;
                };
                segment.push(self.spawner);
                let position = cx.cell_to_world(self.spawner);
                (cx.spawn_bubble(def_id, position), cx.config.cascade_spawn_distance)
            }
        };

        segment.reverse();
        let path: Vec<Vec2> = segment.iter().map(|&c| cx.cell_to_world(c)).collect();
        let tween = cx.move_bubble(bubble, &path, cx.config.cascade_speed);
        cx.grid.set_bubble(cell, bubble);

        match tween {
            Some(tween) => LaneFill::Moving(LaneMove {
                tween,
                length: path_length(&path),
                head_start,
            }),
            None => LaneFill::Settled,
        }
    }

    fn still_waiting(cx: &RoundWorld, wait: &LaneMove) -> bool {
        cx.is_moving(Some(wait.tween))
            && cx.tweener.elapsed_fraction(wait.tween) * wait.length < wait.head_start
    }
}

impl Routine<RoundWorld> for LaneRefill {
    fn resume(&mut self, cx: &mut RoundWorld, _tasks: &mut Scheduler<RoundWorld>) -> Step {
        if let Some(wait) = &self.waiting {
            if Self::still_waiting(cx, wait) {
                return Step::next_frame();
            }
            self.waiting = None;
        }

        let order = match &self.order {
            Some(order) => order.clone(),
            None => {
                let mut order = lane_order(&cx.grid, self.spawner);
                order.reverse();
                self.order = Some(order.clone());
                order
            }
        };

        while let Some(&cell) = order.get(self.next) {
            self.next += 1;
            if cx.grid.node(cell).is_none_or(|n| n.kind() != CellKind::Playable) {
                continue;
            }

            match self.fill(cx, cell) {
                LaneFill::Exhausted => return Step::Done,
                LaneFill::Moving(wait) if Self::still_waiting(cx, &wait) => {
                    self.waiting = Some(wait);
                    return Step::next_frame();
                }
                LaneFill::Moving(_) | LaneFill::Settled => {}
            }
        }

        debug!("Lane at {} refilled", self.spawner);
        Step::Done
    }

    fn on_stop(&mut self, cx: &mut RoundWorld) {
        if let Some(wait) = self.waiting.take() {
            cx.tweener.kill(wait.tween);
        }
    }
}
