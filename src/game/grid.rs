//! The hexagonal lattice: nodes, their adjacency, and which bubble each holds.
//!
//! Nodes live in an arena keyed by coordinate. Neighbor "references" are
//! coordinates into that arena, recorded in the order they were attached, so
//! the graph has no ownership cycles and traversal order is reproducible.

use std::collections::HashMap;

use bevy::prelude::*;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::{
    bubble::{Bubble, BubbleId},
    hex::HexCoord,
};

/// Group id of nodes created on demand outside any authored region.
pub const NO_GROUP: i32 = -1;

/// What a lattice cell is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CellKind {
    /// Ordinary cell a bubble can occupy.
    #[default]
    Playable,
    /// Feeds new bubbles into its group's lane.
    Spawner,
    /// Boss target cell.
    Objective,
    /// Fixed anchor that holds bubbles up.
    Ceiling,
}

/// One lattice cell.
#[derive(Debug, Clone)]
pub struct Node {
    coord: HexCoord,
    kind: CellKind,
    group: i32,
    neighbors: Vec<HexCoord>,
    bubble: Option<BubbleId>,
}

impl Node {
    fn new(coord: HexCoord, kind: CellKind, group: i32) -> Self {
        Self {
            coord,
            kind,
            group,
            neighbors: Vec::with_capacity(6),
            bubble: None,
        }
    }

    pub fn coord(&self) -> HexCoord {
        self.coord
    }

    pub fn kind(&self) -> CellKind {
        self.kind
    }

    pub fn group(&self) -> i32 {
        self.group
    }

    /// Attached neighbors, in attachment order.
    pub fn neighbors(&self) -> &[HexCoord] {
        &self.neighbors
    }

    pub fn bubble(&self) -> Option<BubbleId> {
        self.bubble
    }

    pub fn is_empty(&self) -> bool {
        self.bubble.is_none()
    }

    /// Ceilings and spawners hold the bubbles connected to them.
    pub fn is_anchor(&self) -> bool {
        matches!(self.kind, CellKind::Ceiling | CellKind::Spawner)
    }
}

/// The node graph plus every live bubble.
#[derive(Debug, Default)]
pub struct HexGrid {
    /// Insertion-ordered so whole-grid scans are deterministic.
    nodes: IndexMap<HexCoord, Node>,
    bubbles: HashMap<BubbleId, Bubble>,
    next_bubble: u64,
}

impl HexGrid {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an authored cell. A coordinate that already exists keeps its
    /// original definition.
    pub fn insert_cell(&mut self, coord: HexCoord, kind: CellKind, group: i32) -> &Node {
        if self.nodes.contains_key(&coord) {
            warn!("Duplicate cell {} in layout, keeping the first", coord);
        } else {
            self.nodes.insert(coord, Node::new(coord, kind, group));
            self.attach_neighbors(coord);
        }
        &self.nodes[&coord]
    }

    /// Existing node at `coord`, or a fresh playable one wired to every
    /// existing neighbor.
    pub fn get_or_create(&mut self, coord: HexCoord) -> &Node {
        if !self.nodes.contains_key(&coord) {
            debug!("Growing grid with node {}", coord);
            self.nodes.insert(coord, Node::new(coord, CellKind::Playable, NO_GROUP));
            self.attach_neighbors(coord);
        }
        &self.nodes[&coord]
    }

    fn attach_neighbors(&mut self, coord: HexCoord) {
        for neighbor in coord.neighbors() {
            if !self.nodes.contains_key(&neighbor) {
                continue;
            }
            // Register both directions
            if let Some(node) = self.nodes.get_mut(&coord)
                && !node.neighbors.contains(&neighbor)
            {
                node.neighbors.push(neighbor);
            }
            if let Some(node) = self.nodes.get_mut(&neighbor)
                && !node.neighbors.contains(&coord)
            {
                node.neighbors.push(coord);
            }
        }
    }

    pub fn node(&self, coord: HexCoord) -> Option<&Node> {
        self.nodes.get(&coord)
    }

    pub fn contains(&self, coord: HexCoord) -> bool {
        self.nodes.contains_key(&coord)
    }

    /// All nodes in creation order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// True when there is no node at `coord` or it holds no bubble.
    pub fn is_vacant(&self, coord: HexCoord) -> bool {
        self.nodes.get(&coord).is_none_or(Node::is_empty)
    }

    /// Create an unplaced bubble of the given definition.
    pub fn create_bubble(&mut self, def_id: u32) -> BubbleId {
        self.next_bubble += 1;
        let id = BubbleId(self.next_bubble);
        self.bubbles.insert(id, Bubble::new(id, def_id));
        id
    }

    pub fn bubble(&self, id: BubbleId) -> Option<&Bubble> {
        self.bubbles.get(&id)
    }

    pub fn bubble_mut(&mut self, id: BubbleId) -> Option<&mut Bubble> {
        self.bubbles.get_mut(&id)
    }

    pub fn bubble_at(&self, coord: HexCoord) -> Option<&Bubble> {
        self.nodes
            .get(&coord)
            .and_then(|n| n.bubble)
            .and_then(|id| self.bubbles.get(&id))
    }

    pub fn bubble_count(&self) -> usize {
        self.bubbles.len()
    }

    /// Move `bubble` onto the node at `coord`, creating the node if needed.
    ///
    /// The bubble is detached from its previous node first. Returns `false`
    /// and changes nothing when the bubble is unknown or the target already
    /// holds a different bubble.
    pub fn set_bubble(&mut self, coord: HexCoord, bubble: BubbleId) -> bool {
        if !self.bubbles.contains_key(&bubble) {
            warn!("Cannot place unknown bubble {:?} at {}", bubble, coord);
            return false;
        }
        if let Some(occupant) = self.bubble_at(coord).map(|b| b.id())
            && occupant != bubble
        {
            warn!("Cannot place {:?} at {}, held by {:?}", bubble, coord, occupant);
            return false;
        }

        self.detach(bubble);
        self.get_or_create(coord);
        if let Some(node) = self.nodes.get_mut(&coord) {
            node.bubble = Some(bubble);
        }

        if let Some(b) = self.bubbles.get_mut(&bubble) {
            b.node = Some(coord);
        }
        true
    }

    /// Empty the node at `coord`. The bubble stays alive but unplaced.
    pub fn clear(&mut self, coord: HexCoord) -> Option<BubbleId> {
        let id = self.nodes.get_mut(&coord)?.bubble.take()?;
        if let Some(b) = self.bubbles.get_mut(&id) {
            b.node = None;
        }
        Some(id)
    }

    /// Take `bubble` off whatever node holds it.
    pub fn detach(&mut self, bubble: BubbleId) {
        let Some(b) = self.bubbles.get_mut(&bubble) else {
            return;
        };
        if let Some(coord) = b.node.take()
            && let Some(node) = self.nodes.get_mut(&coord)
            && node.bubble == Some(bubble)
        {
            node.bubble = None;
        }
    }

    /// Detach and destroy a bubble. Returns it so the caller can release its
    /// visual object.
    pub fn remove_bubble(&mut self, bubble: BubbleId) -> Option<Bubble> {
        self.detach(bubble);
        self.bubbles.remove(&bubble)
    }

    /// Every occupied node with its bubble, in node creation order.
    pub fn occupied(&self) -> impl Iterator<Item = (&Node, &Bubble)> {
        self.nodes.values().filter_map(|node| {
            node.bubble
                .and_then(|id| self.bubbles.get(&id))
                .map(|bubble| (node, bubble))
        })
    }

    /// Lowest row (smallest row index) holding a bubble.
    pub fn lowest_occupied_row(&self) -> Option<i32> {
        self.occupied().map(|(node, _)| node.coord.row).min()
    }

    /// Remove every node and bubble, returning the bubbles for release.
    pub fn drain(&mut self) -> Vec<Bubble> {
        self.nodes.clear();
        let mut bubbles: Vec<Bubble> = self.bubbles.drain().map(|(_, b)| b).collect();
        bubbles.sort_by_key(Bubble::id);
        bubbles
    }
}
