//! The shared state every round task works on.
//!
//! [`RoundWorld`] owns the board, the collaborators and the counters. Tasks
//! receive it by `&mut` from the scheduler, so there is exactly one writer
//! at any time.

use std::{collections::HashSet, sync::Arc};

use bevy::{
    math::curve::{Curve, EaseFunction},
    prelude::*,
};
use rand::{SeedableRng, rngs::StdRng};

use super::{
    bubble::{BubbleId, ReserveQueue},
    collision::{CollisionWorld, GridColliders, SceneView},
    config::RoundConfig,
    data::{DataError, GameData, ModeCore, ModeDef, SagaBossSystem, SagaBubble, SagaWorld},
    grid::{CellKind, HexGrid},
    hex::{HexCoord, HexLayout},
    presentation::{Exit, HeadlessPool, LinearTweener, ObjectHandle, ObjectPool, TweenHandle, Tweener},
    state::{NoResponder, RoundResponder, RoundTally},
    task::{Routine, Scheduler, Step},
};

/// Board, collaborators and counters of one round.
pub struct RoundWorld {
    pub config: RoundConfig,
    pub data: Arc<GameData>,
    pub pools: SagaBubble,
    pub boss: Option<SagaBossSystem>,
    pub layout: HexLayout,
    pub grid: HexGrid,
    pub reserve: ReserveQueue,
    /// `None` when the mode has no boss objective; such a round never ends.
    pub tally: Option<RoundTally>,
    /// World offset of the board.
    pub scroll: Vec2,
    /// Length of the tick being processed.
    pub frame_dt: f32,
    pub pool: Box<dyn ObjectPool>,
    pub tweener: Box<dyn Tweener>,
    pub colliders: Box<dyn CollisionWorld>,
    pub responder: Box<dyn RoundResponder>,
    pub(super) rng: StdRng,
    /// Bubbles whose pop has started; a bubble pops at most once.
    pub(super) popping: HashSet<BubbleId>,
    pub(super) loading_spawners: bool,
    pub(super) boss_objects: Vec<(ObjectHandle, HexCoord)>,
    /// Backdrop prefab from the world feature, empty for none.
    pub(super) map_prefab: String,
    /// Backdrop object, placed at the scroll offset.
    pub(super) map_object: Option<ObjectHandle>,
    /// Pop effects shown during the current shot.
    pub(super) effects: Vec<ObjectHandle>,
}

/// The external services a round is wired to.
pub struct Collaborators {
    pub pool: Box<dyn ObjectPool>,
    pub tweener: Box<dyn Tweener>,
    /// Built from the level's walls when not supplied.
    pub colliders: Option<Box<dyn CollisionWorld>>,
    pub responder: Box<dyn RoundResponder>,
}

impl Default for Collaborators {
    fn default() -> Self {
        Self {
            pool: Box::new(HeadlessPool::new()),
            tweener: Box::new(LinearTweener::new()),
            colliders: None,
            responder: Box::new(NoResponder),
        }
    }
}

impl Collaborators {
    pub fn with_pool(mut self, pool: impl ObjectPool + 'static) -> Self {
        self.pool = Box::new(pool);
        self
    }

    pub fn with_tweener(mut self, tweener: impl Tweener + 'static) -> Self {
        self.tweener = Box::new(tweener);
        self
    }

    pub fn with_colliders(mut self, colliders: impl CollisionWorld + 'static) -> Self {
        self.colliders = Some(Box::new(colliders));
        self
    }

    pub fn with_responder(mut self, responder: impl RoundResponder + 'static) -> Self {
        self.responder = Box::new(responder);
        self
    }
}

impl RoundWorld {
    /// Build the board of `mode` from its level layout.
    ///
    /// Fails only when the mode cannot be played at all: no bubble pools, no
    /// world feature, or a layout that does not exist. A missing boss
    /// feature is logged and leaves the round without an objective.
    pub fn new(
        config: RoundConfig,
        data: Arc<GameData>,
        mode: &ModeDef,
        parts: Collaborators,
    ) -> Result<Self, DataError> {
        let pools = mode
            .feature::<SagaBubble>()
            .cloned()
            .ok_or(DataError::MissingFeature {
                mode: mode.id,
                feature: "SagaBubble",
            })?;
        let world = mode.feature::<SagaWorld>().ok_or(DataError::MissingFeature {
            mode: mode.id,
            feature: "SagaWorld",
        })?;
        let level = data
            .layout(&world.layout)
            .ok_or_else(|| DataError::UnknownLayout(world.layout.clone()))?;

        match mode.core {
            ModeCore::PlayBoss => debug!("Mode {} runs the boss core", mode.id),
        }

        let boss = mode.feature::<SagaBossSystem>().cloned();
        if boss.is_none() {
            warn!("Mode {} has no boss system, the round will not end", mode.id);
        }

        let mut grid = HexGrid::new();
        for cell in &level.cells {
            grid.insert_cell(cell.coord, cell.kind, cell.group);
        }

        let colliders = parts
            .colliders
            .unwrap_or_else(|| Box::new(GridColliders::new(level.walls, level.layout.cell_width * 0.5)));
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        info!(
            "Built level `{}` with {} cells for mode {}",
            world.layout,
            grid.len(),
            mode.id
        );

        Ok(Self {
            layout: level.layout,
            tally: boss.as_ref().map(RoundTally::from_boss),
            boss,
            pools,
            grid,
            config,
            data: data.clone(),
            reserve: ReserveQueue::new(),
            scroll: Vec2::ZERO,
            frame_dt: 0.0,
            pool: parts.pool,
            tweener: parts.tweener,
            colliders,
            responder: parts.responder,
            rng,
            popping: HashSet::new(),
            loading_spawners: false,
            boss_objects: Vec::new(),
            map_prefab: world.map_prefab.clone(),
            map_object: None,
            effects: Vec::new(),
        })
    }

    /// Put up the map backdrop, the permanent bubble on every spawner and a
    /// boss object on every objective cell.
    pub(super) fn populate(&mut self) {
        if !self.map_prefab.is_empty() {
            self.map_object = self.pool.acquire(&self.map_prefab);
            match self.map_object {
                Some(object) => self.pool.place(object, self.scroll),
                None => warn!("No pooled object for map prefab `{}`", self.map_prefab),
            }
        }

        let spawners: Vec<_> = self
            .grid
            .nodes()
            .filter(|n| n.kind() == CellKind::Spawner)
            .map(|n| n.coord())
            .collect();
        for coord in spawners {
            let position = self.cell_to_world(coord);
            let id = self.spawn_bubble(self.pools.spawner_bubble_id, position);
            self.grid.set_bubble(coord, id);
        }

        let Some(prefab) = self.boss.as_ref().map(|b| b.boss_prefab.clone()) else {
            return;
        };
        let objectives: Vec<_> = self
            .grid
            .nodes()
            .filter(|n| n.kind() == CellKind::Objective)
            .map(|n| n.coord())
            .collect();
        for coord in objectives {
            let position = self.cell_to_world(coord);
            match self.pool.acquire(&prefab) {
                Some(object) => {
                    self.pool.place(object, position);
                    self.boss_objects.push((object, coord));
                }
                None => warn!("No pooled object for boss prefab `{}`", prefab),
            }
        }
    }

    /// Release every pooled object the round still holds.
    pub(super) fn release_all(&mut self) {
        for mut bubble in self.grid.drain() {
            if let Some(object) = bubble.take_object() {
                self.pool.release(object, Exit::Instant);
            }
        }
        for (object, _) in self.boss_objects.drain(..) {
            self.pool.release(object, Exit::Instant);
        }
        if let Some(object) = self.map_object.take() {
            self.pool.release(object, Exit::Instant);
        }
        self.clear_effects();
        self.reserve.clear();
        self.popping.clear();
        self.loading_spawners = false;
    }

    pub fn scene(&self) -> SceneView<'_> {
        SceneView {
            grid: &self.grid,
            layout: &self.layout,
            scroll: self.scroll,
        }
    }

    /// World position of a cell including the scroll offset.
    pub fn cell_to_world(&self, coord: HexCoord) -> Vec2 {
        self.layout.to_world(coord) + self.scroll
    }

    pub fn is_loading_spawners(&self) -> bool {
        self.loading_spawners
    }

    /// Create an unplaced bubble with a visual object at `position`.
    ///
    /// The bubble exists even if its object cannot be acquired.
    pub fn spawn_bubble(&mut self, def_id: u32, position: Vec2) -> BubbleId {
        let id = self.grid.create_bubble(def_id);

        let Some(def) = self.data.bubble(def_id) else {
            warn!("Spawned bubble {:?} with unknown definition {}", id, def_id);
            return id;
        };
        let object = self.pool.acquire(&def.prefab);
        match object {
            Some(object) => self.pool.place(object, position),
            None => warn!("No pooled object for prefab `{}`", def.prefab),
        }
        if let Some(bubble) = self.grid.bubble_mut(id) {
            bubble.set_object(object);
        }
        id
    }

    /// Destroy a bubble and hand its object back to the pool.
    pub fn release_bubble(&mut self, id: BubbleId, exit: Exit) {
        self.popping.remove(&id);
        let Some(mut bubble) = self.grid.remove_bubble(id) else {
            return;
        };
        if let Some(object) = bubble.take_object() {
            self.pool.release(object, exit);
        }
    }

    /// Start moving a bubble's object along `path`. `None` when there is no
    /// object to move, which callers treat as an already finished move.
    pub fn move_bubble(&mut self, id: BubbleId, path: &[Vec2], speed: f32) -> Option<TweenHandle> {
        let object = self.grid.bubble(id)?.object()?;
        Some(self.tweener.move_along(object, path, speed))
    }

    /// Whether a move started with [`move_bubble`](Self::move_bubble) is
    /// still under way.
    pub fn is_moving(&self, tween: Option<TweenHandle>) -> bool {
        tween.is_some_and(|t| self.tweener.is_active(t) && self.tweener.is_playing(t))
    }

    /// Show a pooled effect at a cell.
    pub fn show_effect(&mut self, kind: &str, coord: HexCoord) {
        let position = self.cell_to_world(coord);
        match self.pool.acquire(kind) {
            Some(object) => {
                self.pool.place(object, position);
                self.effects.push(object);
            }
            None => warn!("No pooled object for effect `{}`", kind),
        }
    }

    pub fn clear_effects(&mut self) {
        for object in self.effects.drain(..) {
            self.pool.release(object, Exit::Instant);
        }
    }

    /// Apply objective damage and report it.
    pub fn deal_damage(&mut self, amount: u32) {
        let Some(tally) = self.tally.as_mut() else {
            return;
        };
        tally.take_damage(amount);
        self.responder.on_damage(amount, tally);
    }

    /// Load the shooter back up to the configured count and lay the reserve
    /// out on its slots.
    pub fn refill_reserve(&mut self) {
        while self.reserve.len() < self.config.reserve_len {
            let Some(def_id) = self.pools.random_shot_id(&mut self.rng) else {
                warn!("Mode has no shot bubbles, reserve stays at {}", self.reserve.len());
                break;
            };
            let position = self.config.reserve_position(self.reserve.len());
            let id = self.spawn_bubble(def_id, position);
            self.reserve.push_back(id);
        }

        let slots: Vec<_> = self.reserve.iter().collect();
        for (slot, id) in slots {
            if let Some(object) = self.grid.bubble(id).and_then(|b| b.object()) {
                self.pool.place(object, self.config.reserve_position(slot));
            }
        }
    }

    /// Scroll offset that keeps the lowest occupied row from hanging below
    /// the board's origin line.
    pub fn scroll_target(&self) -> Option<f32> {
        let lowest = self.grid.lowest_occupied_row()?;
        Some((-(lowest as f32) * self.layout.row_height).max(0.0))
    }

    /// Move the board and everything resting on it.
    pub fn set_scroll(&mut self, y: f32) {
        self.scroll.y = y;

        let mut placed: Vec<_> = self
            .grid
            .occupied()
            .filter_map(|(node, bubble)| bubble.object().map(|o| (o, node.coord())))
            .collect();
        placed.extend(self.boss_objects.iter().copied());
        for (object, coord) in placed {
            let position = self.cell_to_world(coord);
            self.pool.place(object, position);
        }
        if let Some(object) = self.map_object {
            self.pool.place(object, self.scroll);
        }
    }
}

/// Eases the board to its scroll target.
#[derive(Debug, Default)]
pub struct SettleScroll {
    /// (from, to, elapsed) once started.
    motion: Option<(f32, f32, f32)>,
}

impl Routine<RoundWorld> for SettleScroll {
    fn resume(&mut self, cx: &mut RoundWorld, _tasks: &mut Scheduler<RoundWorld>) -> Step {
        if self.motion.is_none() {
            let Some(target) = cx.scroll_target() else {
                return Step::Done;
            };
            if target == cx.scroll.y {
                return Step::Done;
            }
            debug!("Scrolling board from {} to {}", cx.scroll.y, target);
            self.motion = Some((cx.scroll.y, target, 0.0));
            return Step::next_frame();
        }
        let Some((from, to, elapsed)) = self.motion.as_mut() else {
            return Step::Done;
        };

        *elapsed += cx.frame_dt;
        let duration = cx.config.scroll_duration;
        let t = if duration > 0.0 {
            (*elapsed / duration).min(1.0)
        } else {
            1.0
        };
        let y = if t >= 1.0 {
            *to
        } else {
            *from + (*to - *from) * EaseFunction::QuadraticOut.sample_clamped(t)
        };
        cx.set_scroll(y);

        if t >= 1.0 {
            Step::Done
        } else {
            Step::next_frame()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::data::{BubbleDef, CellDef, Feature, LevelLayout, ModeCore};

    fn flat_level() -> LevelLayout {
        LevelLayout {
            cells: vec![CellDef {
                coord: HexCoord::new(0, 0),
                kind: CellKind::Ceiling,
                group: 0,
            }],
            ..default()
        }
    }

    fn data() -> Arc<GameData> {
        let mut data = GameData::default();
        data.insert_bubble(BubbleDef::plain(1));
        data.insert_layout("flat", flat_level());
        Arc::new(data)
    }

    fn mode(features: Vec<Feature>) -> ModeDef {
        ModeDef {
            id: 3,
            core: ModeCore::PlayBoss,
            features,
        }
    }

    fn pools() -> Feature {
        Feature::Bubble(SagaBubble {
            shot_bubble_ids: vec![1],
            appear_bubble_ids: vec![1],
            spawner_bubble_id: 1,
        })
    }

    fn flat_world() -> Feature {
        Feature::World(SagaWorld {
            layout: "flat".into(),
            map_prefab: String::new(),
        })
    }

    fn world() -> RoundWorld {
        let config = RoundConfig {
            seed: Some(1),
            ..default()
        };
        RoundWorld::new(config, data(), &mode(vec![pools(), flat_world()]), Collaborators::default())
            .unwrap()
    }

    #[test]
    fn unplayable_modes_are_rejected() {
        let no_pools = RoundWorld::new(
            RoundConfig::default(),
            data(),
            &mode(vec![flat_world()]),
            Collaborators::default(),
        );
        assert!(matches!(
            no_pools,
            Err(DataError::MissingFeature {
                feature: "SagaBubble",
                ..
            })
        ));

        let bad_layout = RoundWorld::new(
            RoundConfig::default(),
            data(),
            &mode(vec![
                pools(),
                Feature::World(SagaWorld {
                    layout: "nowhere".into(),
                    map_prefab: String::new(),
                }),
            ]),
            Collaborators::default(),
        );
        assert!(matches!(bad_layout, Err(DataError::UnknownLayout(name)) if name == "nowhere"));
    }

    #[test]
    fn bossless_mode_has_no_tally() {
        let world = world();
        assert!(world.tally.is_none());
        assert_eq!(world.grid.len(), 1);
    }

    #[test]
    fn reserve_refills_with_unplaced_bubbles() {
        let mut world = world();
        world.refill_reserve();
        assert_eq!(world.reserve.len(), 2);
        for (_, id) in world.reserve.iter() {
            let bubble = world.grid.bubble(id).unwrap();
            assert!(!bubble.is_placed());
            assert!(bubble.object().is_some());
        }

        world.reserve.pop_front();
        world.refill_reserve();
        assert_eq!(world.reserve.len(), 2);
        assert_eq!(world.pool.active_count(), 3);
    }

    #[test]
    fn scroll_lifts_rows_below_the_origin() {
        let mut world = world();
        assert_eq!(world.scroll_target(), None);

        let id = world.spawn_bubble(1, Vec2::ZERO);
        world.grid.set_bubble(HexCoord::new(0, -2), id);
        let target = world.scroll_target().unwrap();
        assert!((target - 2.0 * world.layout.row_height).abs() < 1e-5);

        let mut tasks = Scheduler::new();
        tasks.spawn("scroll", SettleScroll::default());
        world.frame_dt = 0.25;
        // The first tick only picks the target.
        for _ in 0..2 {
            tasks.tick(&mut world, 0.25);
        }
        let quarter = 1.0 - 0.75 * 0.75;
        assert!((world.scroll.y - target * quarter).abs() < 1e-4);

        for _ in 0..4 {
            tasks.tick(&mut world, 0.25);
        }
        assert!(tasks.is_empty());
        assert_eq!(world.scroll.y, target);
        assert_eq!(world.cell_to_world(HexCoord::new(0, -2)).y, 0.0);
    }

    #[test]
    fn map_backdrop_lives_as_long_as_the_round() {
        let mut data = GameData::default();
        data.insert_bubble(BubbleDef::plain(1));
        data.insert_layout("flat", flat_level());
        data.insert_mode(mode(vec![
            pools(),
            Feature::World(SagaWorld {
                layout: "flat".into(),
                map_prefab: "map".into(),
            }),
        ]));
        let data = Arc::new(data);
        let mode = data.mode(3).unwrap();

        let mut world =
            RoundWorld::new(RoundConfig::default(), data.clone(), mode, Collaborators::default())
                .unwrap();
        assert_eq!(world.map_object, None);

        world.populate();
        assert!(world.map_object.is_some());
        assert_eq!(world.pool.active_count(), 1);

        world.release_all();
        assert_eq!(world.map_object, None);
        assert_eq!(world.pool.active_count(), 0);
    }
}
