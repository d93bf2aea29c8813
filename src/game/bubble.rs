//! Bubbles - the placeable, matchable units.
//!
//! A bubble is a handle to a static [`BubbleDef`](super::data::BubbleDef)
//! plus where it currently sits. Ownership is tracked from both sides by
//! [`HexGrid`](super::grid::HexGrid); only the grid changes `node`.

use std::collections::VecDeque;

use super::{hex::HexCoord, presentation::ObjectHandle};

/// Stable identity of a live bubble.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BubbleId(pub(super) u64);

/// A live bubble.
#[derive(Debug, Clone)]
pub struct Bubble {
    id: BubbleId,
    def_id: u32,
    /// The node holding this bubble, `None` while reserved or in flight.
    pub(super) node: Option<HexCoord>,
    /// Pooled visual object, if one could be acquired.
    object: Option<ObjectHandle>,
}

impl Bubble {
    pub(super) fn new(id: BubbleId, def_id: u32) -> Self {
        Self {
            id,
            def_id,
            node: None,
            object: None,
        }
    }

    pub fn id(&self) -> BubbleId {
        self.id
    }

    pub fn def_id(&self) -> u32 {
        self.def_id
    }

    pub fn node(&self) -> Option<HexCoord> {
        self.node
    }

    pub fn is_placed(&self) -> bool {
        self.node.is_some()
    }

    pub fn object(&self) -> Option<ObjectHandle> {
        self.object
    }

    pub fn set_object(&mut self, object: Option<ObjectHandle>) {
        self.object = object;
    }

    pub fn take_object(&mut self) -> Option<ObjectHandle> {
        self.object.take()
    }
}

/// Loaded bubbles waiting to be fired, front first.
#[derive(Debug, Default, Clone)]
pub struct ReserveQueue {
    slots: VecDeque<BubbleId>,
}

impl ReserveQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// The bubble that will be fired next.
    pub fn front(&self) -> Option<BubbleId> {
        self.slots.front().copied()
    }

    pub fn pop_front(&mut self) -> Option<BubbleId> {
        self.slots.pop_front()
    }

    /// Put a bubble back in the firing slot.
    pub fn push_front(&mut self, bubble: BubbleId) {
        self.slots.push_front(bubble);
    }

    pub fn push_back(&mut self, bubble: BubbleId) {
        self.slots.push_back(bubble);
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Bubbles with their slot index.
    pub fn iter(&self) -> impl Iterator<Item = (usize, BubbleId)> + '_ {
        self.slots.iter().copied().enumerate()
    }

    pub fn clear(&mut self) {
        self.slots.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserve_fires_in_load_order() {
        let mut reserve = ReserveQueue::new();
        reserve.push_back(BubbleId(1));
        reserve.push_back(BubbleId(2));

        assert_eq!(reserve.front(), Some(BubbleId(1)));
        assert_eq!(reserve.pop_front(), Some(BubbleId(1)));
        assert_eq!(reserve.iter().collect::<Vec<_>>(), vec![(0, BubbleId(2))]);
    }
}
