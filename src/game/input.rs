//! Pointer input seen by a round: down, drag and up at world positions.

use std::collections::VecDeque;

use bevy::prelude::*;

/// Source of pointer samples for the current frame.
///
/// Each method reports the world position of that kind of sample if one
/// happened this frame.
pub trait PointerInput: Send + Sync {
    /// Called once per tick before any sample is read.
    fn begin_frame(&mut self) {}

    fn touch_down(&mut self) -> Option<Vec2>;

    fn dragging(&mut self) -> Option<Vec2>;

    fn touch_up(&mut self) -> Option<Vec2>;

    /// Whether the pointer is over UI that should swallow the press.
    fn is_pointer_over_ui(&self) -> bool {
        false
    }
}

/// Input source that never reports anything. Rounds driven entirely through
/// the pointer methods on [`Round`](super::round::Round) use this.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoInput;

impl PointerInput for NoInput {
    fn touch_down(&mut self) -> Option<Vec2> {
        None
    }

    fn dragging(&mut self) -> Option<Vec2> {
        None
    }

    fn touch_up(&mut self) -> Option<Vec2> {
        None
    }
}

/// A single pointer sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerEvent {
    Down(Vec2),
    Drag(Vec2),
    Up(Vec2),
}

/// Input fed by the host one frame at a time.
///
/// Each frame consumes at most one queued event; the pointer methods report
/// it only if it is of their kind.
#[derive(Debug, Default, Clone)]
pub struct QueuedPointer {
    pending: VecDeque<PointerEvent>,
    current: Option<PointerEvent>,
    over_ui: bool,
}

impl QueuedPointer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: PointerEvent) {
        self.pending.push_back(event);
    }

    pub fn set_over_ui(&mut self, over_ui: bool) {
        self.over_ui = over_ui;
    }

    /// True once every queued event has been consumed.
    pub fn is_idle(&self) -> bool {
        self.pending.is_empty()
    }
}

impl PointerInput for QueuedPointer {
    fn begin_frame(&mut self) {
        self.current = self.pending.pop_front();
    }

    fn touch_down(&mut self) -> Option<Vec2> {
        match self.current {
            Some(PointerEvent::Down(pos)) => Some(pos),
            _ => None,
        }
    }

    fn dragging(&mut self) -> Option<Vec2> {
        match self.current {
            Some(PointerEvent::Drag(pos)) => Some(pos),
            _ => None,
        }
    }

    fn touch_up(&mut self) -> Option<Vec2> {
        match self.current {
            Some(PointerEvent::Up(pos)) => Some(pos),
            _ => None,
        }
    }

    fn is_pointer_over_ui(&self) -> bool {
        self.over_ui
    }
}
