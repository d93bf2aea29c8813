//! Static game data: bubble definitions, explosion shapes, level layouts and
//! mode definitions.
//!
//! Everything here is immutable once loaded. Data is read from JSON; mode
//! features are resolved by type name through a [`FeatureRegistry`] that is
//! populated explicitly, so new feature kinds are added by registering a
//! constructor rather than by name lookup at runtime.

use std::collections::{BTreeSet, HashMap};

use bevy::prelude::*;
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{
    collision::Walls,
    grid::CellKind,
    hex::{HexCoord, HexLayout},
};

/// Default number of connected same-class bubbles needed to pop.
const DEFAULT_MIN_MATCH_COUNT: usize = 3;

/// Data-integrity errors. Only a broken document is fatal to loading; every
/// other variant is logged and the affected entry treated as absent.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("failed to parse game data: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("unknown bubble id {0}")]
    UnknownBubble(u32),
    #[error("unknown explosion shape `{0}`")]
    UnknownExplosion(String),
    #[error("unknown level layout `{0}`")]
    UnknownLayout(String),
    #[error("unknown mode id {0}")]
    UnknownMode(u32),
    #[error("unknown mode core `{0}`")]
    UnknownCore(String),
    #[error("unknown feature type `{0}`")]
    UnknownFeature(String),
    #[error("mode {mode} has no `{feature}` feature")]
    MissingFeature { mode: u32, feature: &'static str },
    #[error("feature entry has no `type` key")]
    UntypedFeature,
    #[error("malformed `{kind}` feature: {source}")]
    MalformedFeature {
        kind: String,
        source: serde_json::Error,
    },
}

fn default_min_match_count() -> usize {
    DEFAULT_MIN_MATCH_COUNT
}

/// Immutable definition of a bubble type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BubbleDef {
    pub id: u32,
    /// Pool key for the bubble's visual object.
    #[serde(default)]
    pub prefab: String,
    /// Bubble ids this bubble forms a match with.
    #[serde(default)]
    pub match_ids: BTreeSet<u32>,
    /// Smallest connected component that pops when this bubble is placed.
    #[serde(default = "default_min_match_count")]
    pub min_match_count: usize,
    /// Mines pop when a bubble lands next to them.
    #[serde(default)]
    pub is_mine: bool,
    /// Name of the chained-explosion shape triggered when this bubble pops.
    #[serde(default)]
    pub explosion: Option<String>,
    /// Pool key of the effect shown where this bubble pops.
    #[serde(default)]
    pub pop_effect: Option<String>,
    /// Damage dealt to the objective when this bubble pops.
    #[serde(default)]
    pub damage: u32,
}

impl BubbleDef {
    /// Plain matchable bubble with the given id, matching only itself.
    pub fn plain(id: u32) -> Self {
        Self {
            id,
            prefab: format!("bubble_{id}"),
            match_ids: BTreeSet::from([id]),
            min_match_count: DEFAULT_MIN_MATCH_COUNT,
            is_mine: false,
            explosion: None,
            pop_effect: None,
            damage: 0,
        }
    }

    /// Whether a placed `other` joins this bubble's match.
    pub fn matches(&self, other: &BubbleDef) -> bool {
        self.match_ids.contains(&other.id)
    }
}

/// Relative footprint of a chained explosion.
///
/// Offsets are authored for an even anchor row; anchoring on an odd row
/// mirrors them with the neighbor-table rule.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExplosionShape {
    pub even: Vec<HexCoord>,
}

impl ExplosionShape {
    /// Absolute cells covered when the explosion is centered on `anchor`.
    pub fn cells_around(&self, anchor: HexCoord) -> impl Iterator<Item = HexCoord> + '_ {
        self.even
            .iter()
            .map(move |offset| anchor + offset.mirrored_for(anchor))
    }
}

/// One authored cell of a level layout.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CellDef {
    pub coord: HexCoord,
    pub kind: CellKind,
    #[serde(default)]
    pub group: i32,
}

/// Static layout of a level: geometry, walls and authored cells.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LevelLayout {
    #[serde(default)]
    pub layout: HexLayout,
    #[serde(default)]
    pub walls: Walls,
    pub cells: Vec<CellDef>,
}

/// Bubble pools of a mode.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SagaBubble {
    pub shot_bubble_ids: Vec<u32>,
    pub appear_bubble_ids: Vec<u32>,
    pub spawner_bubble_id: u32,
}

impl SagaBubble {
    /// Pick the next bubble to load into the shooter.
    pub fn random_shot_id(&self, rng: &mut impl Rng) -> Option<u32> {
        pick(&self.shot_bubble_ids, rng)
    }

    /// Pick the bubble a spawner pushes into its lane.
    pub fn random_appear_id(&self, rng: &mut impl Rng) -> Option<u32> {
        pick(&self.appear_bubble_ids, rng)
    }
}

fn pick(ids: &[u32], rng: &mut impl Rng) -> Option<u32> {
    if ids.is_empty() {
        return None;
    }
    Some(ids[rng.random_range(0..ids.len())])
}

/// Which layout a mode plays on.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SagaWorld {
    pub layout: String,
    #[serde(default)]
    pub map_prefab: String,
}

/// Boss objective settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SagaBossSystem {
    #[serde(default)]
    pub boss_prefab: String,
    pub boss_hp: u32,
    pub limit_shot: u32,
}

/// A resolved mode feature.
#[derive(Debug, Clone, PartialEq)]
pub enum Feature {
    Bubble(SagaBubble),
    World(SagaWorld),
    BossSystem(SagaBossSystem),
}

/// Typed access into a mode's feature list.
pub trait FeatureKind: Sized {
    fn from_feature(feature: &Feature) -> Option<&Self>;
}

impl FeatureKind for SagaBubble {
    fn from_feature(feature: &Feature) -> Option<&Self> {
        match feature {
            Feature::Bubble(v) => Some(v),
            _ => None,
        }
    }
}

impl FeatureKind for SagaWorld {
    fn from_feature(feature: &Feature) -> Option<&Self> {
        match feature {
            Feature::World(v) => Some(v),
            _ => None,
        }
    }
}

impl FeatureKind for SagaBossSystem {
    fn from_feature(feature: &Feature) -> Option<&Self> {
        match feature {
            Feature::BossSystem(v) => Some(v),
            _ => None,
        }
    }
}

/// Builds a [`Feature`] from its JSON body.
pub type FeatureCtor = fn(serde_json::Value) -> Result<Feature, serde_json::Error>;

/// Closed mapping from feature type names to constructors.
#[derive(Debug, Clone, Default)]
pub struct FeatureRegistry {
    ctors: HashMap<&'static str, FeatureCtor>,
}

impl FeatureRegistry {
    /// Registry with the built-in saga features.
    pub fn builtin() -> Self {
        let mut registry = Self::default();
        registry.register("SagaBubble", |v| serde_json::from_value(v).map(Feature::Bubble));
        registry.register("SagaWorld", |v| serde_json::from_value(v).map(Feature::World));
        registry.register("SagaBossSystem", |v| {
            serde_json::from_value(v).map(Feature::BossSystem)
        });
        registry
    }

    pub fn register(&mut self, kind: &'static str, ctor: FeatureCtor) {
        self.ctors.insert(kind, ctor);
    }

    /// Resolve one raw `{ "type": ..., ... }` entry.
    pub fn build(&self, raw: serde_json::Value) -> Result<Feature, DataError> {
        let kind = raw
            .get("type")
            .and_then(|v| v.as_str())
            .ok_or(DataError::UntypedFeature)?
            .to_owned();
        let ctor = self
            .ctors
            .get(kind.as_str())
            .ok_or_else(|| DataError::UnknownFeature(kind.clone()))?;
        ctor(raw).map_err(|source| DataError::MalformedFeature { kind, source })
    }
}

/// The simulation core a mode runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeCore {
    PlayBoss,
}

impl ModeCore {
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "PlayBoss" | "PlayBossModeCore" => Some(Self::PlayBoss),
            _ => None,
        }
    }
}

/// A playable mode: its core plus the features it was configured with.
#[derive(Debug, Clone, PartialEq)]
pub struct ModeDef {
    pub id: u32,
    pub core: ModeCore,
    pub features: Vec<Feature>,
}

impl ModeDef {
    /// First feature of type `T`, if the mode has one.
    pub fn feature<T: FeatureKind>(&self) -> Option<&T> {
        self.features.iter().find_map(T::from_feature)
    }
}

#[derive(Deserialize)]
struct RawModeDef {
    id: u32,
    core: String,
    #[serde(default)]
    features: Vec<serde_json::Value>,
}

#[derive(Deserialize)]
struct RawGameData {
    #[serde(default)]
    bubbles: Vec<BubbleDef>,
    #[serde(default)]
    explosions: HashMap<String, ExplosionShape>,
    #[serde(default)]
    layouts: HashMap<String, LevelLayout>,
    #[serde(default)]
    modes: Vec<RawModeDef>,
}

/// All static definitions, looked up by id or name.
#[derive(Resource, Debug, Clone, Default)]
pub struct GameData {
    bubbles: HashMap<u32, BubbleDef>,
    explosions: HashMap<String, ExplosionShape>,
    layouts: HashMap<String, LevelLayout>,
    modes: HashMap<u32, ModeDef>,
}

impl GameData {
    /// Load from JSON with the built-in feature registry.
    pub fn from_json(json: &str) -> Result<Self, DataError> {
        Self::from_json_with(&FeatureRegistry::builtin(), json)
    }

    /// Load from JSON, resolving features through `registry`.
    ///
    /// Modes with an unknown core and features that fail to resolve are
    /// logged and left out; only an unparseable document is an error.
    pub fn from_json_with(registry: &FeatureRegistry, json: &str) -> Result<Self, DataError> {
        let raw: RawGameData = serde_json::from_str(json)?;

        let mut data = Self {
            bubbles: raw.bubbles.into_iter().map(|b| (b.id, b)).collect(),
            explosions: raw.explosions,
            layouts: raw.layouts,
            modes: HashMap::new(),
        };

        for mode in raw.modes {
            let Some(core) = ModeCore::from_key(&mode.core) else {
                warn!("Skipping mode {}: {}", mode.id, DataError::UnknownCore(mode.core));
                continue;
            };

            let mut features = Vec::new();
            for raw_feature in mode.features {
                match registry.build(raw_feature) {
                    Ok(feature) => features.push(feature),
                    Err(e) => warn!("Mode {}: dropping feature: {}", mode.id, e),
                }
            }

            data.modes.insert(
                mode.id,
                ModeDef {
                    id: mode.id,
                    core,
                    features,
                },
            );
        }

        info!(
            "Loaded {} bubbles, {} explosions, {} layouts, {} modes",
            data.bubbles.len(),
            data.explosions.len(),
            data.layouts.len(),
            data.modes.len()
        );

        Ok(data)
    }

    pub fn bubble(&self, id: u32) -> Option<&BubbleDef> {
        self.bubbles.get(&id)
    }

    pub fn explosion(&self, name: &str) -> Option<&ExplosionShape> {
        self.explosions.get(name)
    }

    pub fn layout(&self, name: &str) -> Option<&LevelLayout> {
        self.layouts.get(name)
    }

    pub fn mode(&self, id: u32) -> Option<&ModeDef> {
        self.modes.get(&id)
    }

    pub fn insert_bubble(&mut self, def: BubbleDef) {
        self.bubbles.insert(def.id, def);
    }

    pub fn insert_explosion(&mut self, name: impl Into<String>, shape: ExplosionShape) {
        self.explosions.insert(name.into(), shape);
    }

    pub fn insert_layout(&mut self, name: impl Into<String>, layout: LevelLayout) {
        self.layouts.insert(name.into(), layout);
    }

    pub fn insert_mode(&mut self, mode: ModeDef) {
        self.modes.insert(mode.id, mode);
    }

    /// Collect every dangling reference between definitions.
    ///
    /// Each problem is logged; none of them stops the data from being used.
    pub fn verify(&self) -> Vec<DataError> {
        let mut problems = Vec::new();

        for bubble in self.bubbles.values() {
            if let Some(name) = &bubble.explosion
                && !self.explosions.contains_key(name)
            {
                problems.push(DataError::UnknownExplosion(name.clone()));
            }
        }

        for mode in self.modes.values() {
            if let Some(pools) = mode.feature::<SagaBubble>() {
                let ids = pools
                    .shot_bubble_ids
                    .iter()
                    .chain(&pools.appear_bubble_ids)
                    .chain(std::iter::once(&pools.spawner_bubble_id));
                for &id in ids {
                    if !self.bubbles.contains_key(&id) {
                        problems.push(DataError::UnknownBubble(id));
                    }
                }
            }
            if let Some(world) = mode.feature::<SagaWorld>()
                && !self.layouts.contains_key(&world.layout)
            {
                problems.push(DataError::UnknownLayout(world.layout.clone()));
            }
        }

        for problem in &problems {
            warn!("Game data: {}", problem);
        }

        problems
    }
}
