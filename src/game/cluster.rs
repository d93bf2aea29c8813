//! Connected-component queries over the node graph.
//!
//! Every query is the same depth-first search with a different node filter:
//! match detection, support from the anchors, and spawner lane ordering.

use std::collections::HashSet;

use bevy::prelude::*;

use super::{
    data::GameData,
    grid::{CellKind, HexGrid, Node},
    hex::HexCoord,
};

/// Depth-first search from `start` over attached neighbors.
///
/// `start` is always part of the result. A neighbor is entered only when it
/// is not yet in the result and `accept` returns true for it; rejected nodes
/// are not crossed. Nodes come back in first-visit order, following each
/// node's neighbor attachment order.
pub fn connected_nodes(
    grid: &HexGrid,
    start: HexCoord,
    mut accept: impl FnMut(&Node) -> bool,
) -> Vec<HexCoord> {
    let Some(start_node) = grid.node(start) else {
        return Vec::new();
    };

    let mut order = vec![start];
    let mut seen = HashSet::from([start]);
    // (node, index of the next neighbor to look at)
    let mut stack: Vec<(&Node, usize)> = vec![(start_node, 0)];

    while let Some(top) = stack.last_mut() {
        let (node, next) = *top;
        top.1 += 1;
        let Some(&coord) = node.neighbors().get(next) else {
            stack.pop();
            continue;
        };

        if seen.contains(&coord) {
            continue;
        }
        let Some(neighbor) = grid.node(coord) else {
            continue;
        };
        if !accept(neighbor) {
            continue;
        }

        seen.insert(coord);
        order.push(coord);
        stack.push((neighbor, 0));
    }

    order
}

/// The match component around a freshly placed bubble, if it is big enough
/// to pop.
///
/// Members are occupied nodes whose bubble is in the placed bubble's match
/// set; the threshold is the placed bubble's own `min_match_count`.
pub fn match_cluster(grid: &HexGrid, data: &GameData, start: HexCoord) -> Option<Vec<HexCoord>> {
    let placed = grid.bubble_at(start)?;
    let Some(def) = data.bubble(placed.def_id()) else {
        warn!("Placed bubble has unknown definition {}", placed.def_id());
        return None;
    };

    let cluster = connected_nodes(grid, start, |node| {
        node.bubble()
            .and_then(|id| grid.bubble(id))
            .and_then(|b| data.bubble(b.def_id()))
            .is_some_and(|other| def.matches(other))
    });

    (cluster.len() >= def.min_match_count).then_some(cluster)
}

/// Occupied neighbors of `coord` holding a mine, in neighbor order.
pub fn adjacent_mines(grid: &HexGrid, data: &GameData, coord: HexCoord) -> Vec<HexCoord> {
    let Some(node) = grid.node(coord) else {
        return Vec::new();
    };
    node.neighbors()
        .iter()
        .copied()
        .filter(|&n| {
            grid.bubble_at(n)
                .and_then(|b| data.bubble(b.def_id()))
                .is_some_and(|def| def.is_mine)
        })
        .collect()
}

/// Every node held up by an anchor through a chain of occupied nodes,
/// anchors included.
pub fn supported_nodes(grid: &HexGrid) -> HashSet<HexCoord> {
    let mut supported = HashSet::new();
    for anchor in grid.nodes().filter(|n| n.is_anchor()) {
        let reached = connected_nodes(grid, anchor.coord(), |node| {
            !node.is_empty() && !supported.contains(&node.coord())
        });
        supported.extend(reached);
    }
    supported
}

/// Occupied nodes that lost their connection to every anchor, in node
/// creation order.
pub fn floating_nodes(grid: &HexGrid) -> Vec<HexCoord> {
    let supported = supported_nodes(grid);
    grid.occupied()
        .map(|(node, _)| node.coord())
        .filter(|coord| !supported.contains(coord))
        .collect()
}

/// All nodes of a spawner's group reachable from it, in first-visit order.
/// Reversed, the lane is walked from its far end back to the spawner.
pub fn lane_order(grid: &HexGrid, spawner: HexCoord) -> Vec<HexCoord> {
    let Some(group) = grid.node(spawner).map(Node::group) else {
        return Vec::new();
    };
    connected_nodes(grid, spawner, |node| node.group() == group)
}

/// Playable same-group nodes reachable from `node` without entering a lane
/// node that was already filled this pass.
pub fn lane_segment(grid: &HexGrid, node: HexCoord, filled: &HashSet<HexCoord>) -> Vec<HexCoord> {
    let Some(group) = grid.node(node).map(Node::group) else {
        return Vec::new();
    };
    connected_nodes(grid, node, |n| {
        n.kind() == CellKind::Playable && n.group() == group && !filled.contains(&n.coord())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::data::BubbleDef;

    fn data() -> GameData {
        let mut data = GameData::default();
        data.insert_bubble(BubbleDef::plain(1));
        data.insert_bubble(BubbleDef::plain(2));
        data.insert_bubble(BubbleDef {
            is_mine: true,
            ..BubbleDef::plain(7)
        });
        data
    }

    fn place(grid: &mut HexGrid, coord: HexCoord, def_id: u32) {
        let id = grid.create_bubble(def_id);
        grid.set_bubble(coord, id);
    }

    fn row(grid: &mut HexGrid, row: i32, cols: std::ops::Range<i32>, kind: CellKind) {
        for col in cols {
            grid.insert_cell(HexCoord::new(col, row), kind, 0);
        }
    }

    #[test]
    fn start_is_always_first() {
        let mut grid = HexGrid::new();
        row(&mut grid, 0, 0..3, CellKind::Playable);
        let found = connected_nodes(&grid, HexCoord::new(1, 0), |_| false);
        assert_eq!(found, vec![HexCoord::new(1, 0)]);
        assert!(connected_nodes(&grid, HexCoord::new(9, 9), |_| true).is_empty());
    }

    #[test]
    fn rejected_nodes_are_not_crossed() {
        let mut grid = HexGrid::new();
        row(&mut grid, 0, 0..5, CellKind::Playable);
        let wall = HexCoord::new(2, 0);
        let found = connected_nodes(&grid, HexCoord::new(0, 0), |n| n.coord() != wall);
        assert_eq!(found, vec![HexCoord::new(0, 0), HexCoord::new(1, 0)]);
    }

    #[test]
    fn traversal_is_depth_first() {
        let mut grid = HexGrid::new();
        // (0,0) gets (1,0) attached before (-1,1).
        grid.insert_cell(HexCoord::new(0, 0), CellKind::Playable, 0);
        grid.insert_cell(HexCoord::new(1, 0), CellKind::Playable, 0);
        grid.insert_cell(HexCoord::new(2, 0), CellKind::Playable, 0);
        grid.insert_cell(HexCoord::new(-1, 1), CellKind::Playable, 0);

        let found = connected_nodes(&grid, HexCoord::new(0, 0), |_| true);
        assert_eq!(
            found,
            vec![
                HexCoord::new(0, 0),
                HexCoord::new(1, 0),
                HexCoord::new(2, 0),
                HexCoord::new(-1, 1),
            ]
        );
    }

    #[test]
    fn match_threshold_is_inclusive() {
        let data = data();
        let mut grid = HexGrid::new();
        row(&mut grid, 0, 0..5, CellKind::Playable);
        place(&mut grid, HexCoord::new(0, 0), 1);
        place(&mut grid, HexCoord::new(1, 0), 1);
        place(&mut grid, HexCoord::new(3, 0), 2);

        assert_eq!(match_cluster(&grid, &data, HexCoord::new(1, 0)), None);

        place(&mut grid, HexCoord::new(2, 0), 1);
        let cluster = match_cluster(&grid, &data, HexCoord::new(2, 0)).unwrap();
        assert_eq!(cluster.len(), 3);
        assert!(!cluster.contains(&HexCoord::new(3, 0)));
    }

    #[test]
    fn match_set_belongs_to_the_placed_bubble() {
        let mut data = data();
        data.insert_bubble(BubbleDef {
            match_ids: [1, 5].into(),
            ..BubbleDef::plain(5)
        });
        let mut grid = HexGrid::new();
        row(&mut grid, 0, 0..4, CellKind::Playable);
        place(&mut grid, HexCoord::new(0, 0), 1);
        place(&mut grid, HexCoord::new(1, 0), 1);
        place(&mut grid, HexCoord::new(2, 0), 5);
        // No definition, never joins.
        place(&mut grid, HexCoord::new(3, 0), 40);

        let cluster = match_cluster(&grid, &data, HexCoord::new(2, 0)).unwrap();
        assert_eq!(cluster.len(), 3);
        // Red only matches red, so the wildcard does not count for it.
        assert_eq!(match_cluster(&grid, &data, HexCoord::new(1, 0)), None);
    }

    #[test]
    fn empty_start_never_matches() {
        let data = data();
        let mut grid = HexGrid::new();
        row(&mut grid, 0, 0..3, CellKind::Playable);
        assert_eq!(match_cluster(&grid, &data, HexCoord::new(0, 0)), None);
    }

    #[test]
    fn mines_are_found_among_occupied_neighbors() {
        let data = data();
        let mut grid = HexGrid::new();
        row(&mut grid, 0, 0..4, CellKind::Playable);
        place(&mut grid, HexCoord::new(0, 0), 7);
        place(&mut grid, HexCoord::new(1, 0), 1);
        place(&mut grid, HexCoord::new(2, 0), 7);
        place(&mut grid, HexCoord::new(3, 0), 7);

        assert_eq!(
            adjacent_mines(&grid, &data, HexCoord::new(1, 0)),
            vec![HexCoord::new(0, 0), HexCoord::new(2, 0)]
        );
    }

    #[test]
    fn bubbles_cut_off_from_anchors_float() {
        let mut grid = HexGrid::new();
        row(&mut grid, 0, 0..4, CellKind::Ceiling);
        row(&mut grid, -1, 0..4, CellKind::Playable);
        row(&mut grid, -2, 0..4, CellKind::Playable);

        // Hanging straight off the ceiling.
        place(&mut grid, HexCoord::new(0, -1), 1);
        // Only connected through an empty node.
        place(&mut grid, HexCoord::new(3, -2), 2);

        let floating = floating_nodes(&grid);
        assert_eq!(floating, vec![HexCoord::new(3, -2)]);
        assert!(supported_nodes(&grid).contains(&HexCoord::new(0, -1)));
    }

    #[test]
    fn spawners_anchor_their_lane() {
        let mut grid = HexGrid::new();
        grid.insert_cell(HexCoord::new(0, 0), CellKind::Spawner, 1);
        grid.insert_cell(HexCoord::new(0, -1), CellKind::Playable, 1);
        place(&mut grid, HexCoord::new(0, 0), 9);
        place(&mut grid, HexCoord::new(0, -1), 1);

        assert!(floating_nodes(&grid).is_empty());
    }

    #[test]
    fn lane_segment_stops_at_filled_and_foreign_nodes() {
        let mut grid = HexGrid::new();
        grid.insert_cell(HexCoord::new(0, 0), CellKind::Spawner, 1);
        for col in 1..4 {
            grid.insert_cell(HexCoord::new(col, 0), CellKind::Playable, 1);
        }
        grid.insert_cell(HexCoord::new(4, 0), CellKind::Playable, 2);

        let order = lane_order(&grid, HexCoord::new(0, 0));
        assert_eq!(order.len(), 4);
        assert_eq!(order.last(), Some(&HexCoord::new(3, 0)));

        let filled = HashSet::from([HexCoord::new(3, 0)]);
        let segment = lane_segment(&grid, HexCoord::new(2, 0), &filled);
        assert_eq!(segment, vec![HexCoord::new(2, 0), HexCoord::new(1, 0)]);
    }
}
