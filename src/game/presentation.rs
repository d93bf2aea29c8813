//! Seams to the visual layer: pooled objects and path tweens.
//!
//! The simulation never renders. It asks an [`ObjectPool`] for visual
//! objects and a [`Tweener`] to move them, and only ever reads back whether
//! a tween is still running and how far along it is. [`HeadlessPool`] and
//! [`LinearTweener`] are complete stand-ins for servers and tests.

use std::collections::{HashMap, HashSet};

use bevy::prelude::*;

/// Handle to a pooled visual object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectHandle(pub u64);

/// Handle to a running tween.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TweenHandle(pub u64);

/// How a released object leaves the screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    /// Hide immediately.
    Instant,
    /// Popped: fade out in place.
    FadeOut,
    /// Lost support: fall off the board.
    DropOut,
}

/// Object lifecycle pool.
pub trait ObjectPool: Send + Sync {
    /// Take an object of the given prefab kind. `None` when the kind cannot
    /// be resolved; callers treat that as "nothing to show".
    fn acquire(&mut self, kind: &str) -> Option<ObjectHandle>;

    fn place(&mut self, object: ObjectHandle, position: Vec2);

    fn release(&mut self, object: ObjectHandle, exit: Exit);

    /// Objects currently handed out.
    fn active_count(&self) -> usize;
}

/// Animated interpolation along a polyline.
pub trait Tweener: Send + Sync {
    /// Start moving `object` through `path` at `speed` units per second.
    fn move_along(&mut self, object: ObjectHandle, path: &[Vec2], speed: f32) -> TweenHandle;

    /// False once the tween completed or was killed.
    fn is_active(&self, tween: TweenHandle) -> bool;

    fn is_playing(&self, tween: TweenHandle) -> bool;

    /// Progress in `[0, 1]`.
    fn elapsed_fraction(&self, tween: TweenHandle) -> f32;

    fn kill(&mut self, tween: TweenHandle);

    /// Advance time. Tweeners driven by an engine can ignore this.
    fn tick(&mut self, _dt: f32) {}
}

/// Total length of a polyline.
pub fn path_length(path: &[Vec2]) -> f32 {
    path.windows(2).map(|w| w[0].distance(w[1])).sum()
}

#[derive(Debug, Clone)]
struct PooledObject {
    kind: String,
    position: Vec2,
}

/// Pool that only does bookkeeping.
///
/// Released objects go back on a per-kind free list and are handed out again
/// before new handles are minted.
#[derive(Debug, Default)]
pub struct HeadlessPool {
    next: u64,
    live: HashMap<ObjectHandle, PooledObject>,
    free: HashMap<String, Vec<ObjectHandle>>,
    /// When set, acquiring any other kind fails.
    known_kinds: Option<HashSet<String>>,
}

impl HeadlessPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pool that only resolves the listed kinds.
    pub fn with_kinds<I, S>(kinds: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            known_kinds: Some(kinds.into_iter().map(Into::into).collect()),
            ..Self::default()
        }
    }

    pub fn position(&self, object: ObjectHandle) -> Option<Vec2> {
        self.live.get(&object).map(|o| o.position)
    }

    pub fn kind(&self, object: ObjectHandle) -> Option<&str> {
        self.live.get(&object).map(|o| o.kind.as_str())
    }
}

impl ObjectPool for HeadlessPool {
    fn acquire(&mut self, kind: &str) -> Option<ObjectHandle> {
        if let Some(known) = &self.known_kinds
            && !known.contains(kind)
        {
            return None;
        }

        let handle = match self.free.get_mut(kind).and_then(Vec::pop) {
            Some(handle) => handle,
            None => {
                self.next += 1;
                ObjectHandle(self.next)
            }
        };
        self.live.insert(
            handle,
            PooledObject {
                kind: kind.to_owned(),
                position: Vec2::ZERO,
            },
        );
        Some(handle)
    }

    fn place(&mut self, object: ObjectHandle, position: Vec2) {
        if let Some(o) = self.live.get_mut(&object) {
            o.position = position;
        }
    }

    fn release(&mut self, object: ObjectHandle, _exit: Exit) {
        if let Some(o) = self.live.remove(&object) {
            self.free.entry(o.kind).or_default().push(object);
        }
    }

    fn active_count(&self) -> usize {
        self.live.len()
    }
}

#[derive(Debug, Clone)]
struct PathTween {
    path: Vec<Vec2>,
    total: f32,
    speed: f32,
    travelled: f32,
    done: bool,
}

impl PathTween {
    fn position(&self) -> Vec2 {
        let mut remaining = self.travelled;
        for w in self.path.windows(2) {
            let len = w[0].distance(w[1]);
            if remaining <= len {
                return w[0].lerp(w[1], if len > 0.0 { remaining / len } else { 1.0 });
            }
            remaining -= len;
        }
        self.path.last().copied().unwrap_or_default()
    }
}

/// Constant-speed tweens advanced by [`Tweener::tick`].
#[derive(Debug, Default)]
pub struct LinearTweener {
    next: u64,
    tweens: HashMap<TweenHandle, PathTween>,
}

impl LinearTweener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current interpolated position of a tween.
    pub fn position(&self, tween: TweenHandle) -> Option<Vec2> {
        self.tweens.get(&tween).map(PathTween::position)
    }
}

impl Tweener for LinearTweener {
    fn move_along(&mut self, _object: ObjectHandle, path: &[Vec2], speed: f32) -> TweenHandle {
        self.next += 1;
        let handle = TweenHandle(self.next);
        let total = path_length(path);
        self.tweens.insert(
            handle,
            PathTween {
                path: path.to_vec(),
                total,
                speed: speed.max(f32::EPSILON),
                travelled: 0.0,
                done: total <= 0.0,
            },
        );
        handle
    }

    fn is_active(&self, tween: TweenHandle) -> bool {
        self.tweens.get(&tween).is_some_and(|t| !t.done)
    }

    fn is_playing(&self, tween: TweenHandle) -> bool {
        self.is_active(tween)
    }

    fn elapsed_fraction(&self, tween: TweenHandle) -> f32 {
        match self.tweens.get(&tween) {
            Some(t) if t.total > 0.0 => (t.travelled / t.total).min(1.0),
            _ => 1.0,
        }
    }

    fn kill(&mut self, tween: TweenHandle) {
        self.tweens.remove(&tween);
    }

    fn tick(&mut self, dt: f32) {
        // Tweens finished on the previous tick have been observed by now.
        self.tweens.retain(|_, t| !t.done);
        for tween in self.tweens.values_mut() {
            tween.travelled = (tween.travelled + tween.speed * dt).min(tween.total);
            tween.done = tween.travelled >= tween.total;
        }
    }
}
