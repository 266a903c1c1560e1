//! Grid pathfinding shared by the AI and move-resolution helpers.
//!
//! `Pathfinder` runs A* over 4- or 8-connected cells. Before searching it
//! tries a straight line between the endpoints and returns it when every
//! cell on the line is passable; the line is always a shortest path on an
//! unobstructed grid, so the shortcut never changes the answer's cost.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::f64::consts::SQRT_2;

use serde::{Deserialize, Serialize};

use crate::level::{Level, Pos};

/// Neighbourhood used when expanding a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Connectivity {
    Four,
    #[default]
    Eight,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Heuristic {
    Manhattan,
    Euclidean,
    Chebyshev,
    /// Exact distance on an 8-connected grid with √2 diagonals.
    #[default]
    Octile,
}

impl Heuristic {
    pub fn estimate(self, a: Pos, b: Pos) -> f64 {
        let dx = (a.0 - b.0).abs() as f64;
        let dy = (a.1 - b.1).abs() as f64;
        match self {
            Heuristic::Manhattan => dx + dy,
            Heuristic::Euclidean => (dx * dx + dy * dy).sqrt(),
            Heuristic::Chebyshev => dx.max(dy),
            Heuristic::Octile => dx.max(dy) + (SQRT_2 - 1.0) * dx.min(dy),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathfindingConfig {
    pub connectivity: Connectivity,
    pub heuristic: Heuristic,
    /// Node expansions before the search gives up and reports no path.
    pub max_iterations: usize,
    pub line_of_sight_shortcut: bool,
}

impl Default for PathfindingConfig {
    fn default() -> Self {
        Self {
            connectivity: Connectivity::Eight,
            heuristic: Heuristic::Octile,
            max_iterations: 10_000,
            line_of_sight_shortcut: true,
        }
    }
}

/// Terrain queries the search needs.
pub trait Walkable {
    fn in_bounds(&self, x: i32, y: i32) -> bool;
    fn is_walkable(&self, x: i32, y: i32) -> bool;
}

impl Walkable for Level {
    fn in_bounds(&self, x: i32, y: i32) -> bool {
        Level::in_bounds(self, x, y)
    }

    fn is_walkable(&self, x: i32, y: i32) -> bool {
        Level::is_walkable(self, x, y)
    }
}

const CARDINALS: [Pos; 4] = [(0, -1), (1, 0), (0, 1), (-1, 0)];
const DIAGONALS: [Pos; 4] = [(1, -1), (1, 1), (-1, 1), (-1, -1)];

/// Offsets in the fixed expansion order for a connectivity.
pub fn neighbor_offsets(connectivity: Connectivity) -> Vec<Pos> {
    match connectivity {
        Connectivity::Four => CARDINALS.to_vec(),
        Connectivity::Eight => CARDINALS.iter().chain(DIAGONALS.iter()).copied().collect(),
    }
}

#[derive(Debug, Clone, Copy)]
struct OpenNode {
    f: f64,
    sequence: u64,
    pos: Pos,
}

// BinaryHeap is a max-heap: invert so the lowest f pops first, then the
// earliest pushed among equal f.
impl Ord for OpenNode {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .f
            .total_cmp(&self.f)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

impl PartialOrd for OpenNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for OpenNode {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for OpenNode {}

#[derive(Debug, Clone, Default)]
pub struct Pathfinder {
    pub config: PathfindingConfig,
}

impl Pathfinder {
    pub fn new(config: PathfindingConfig) -> Self {
        Self { config }
    }

    /// Path from `start` to `goal`, excluding `start` and including `goal`.
    pub fn find_path<W: Walkable + ?Sized>(&self, grid: &W, start: Pos, goal: Pos) -> Option<Vec<Pos>> {
        self.find_path_avoiding(grid, start, goal, |_| false)
    }

    /// Like [`find_path`](Self::find_path), treating cells for which
    /// `blocked` returns true as impassable. The goal is exempt so callers
    /// can path onto an occupied target.
    pub fn find_path_avoiding<W, F>(&self, grid: &W, start: Pos, goal: Pos, blocked: F) -> Option<Vec<Pos>>
    where
        W: Walkable + ?Sized,
        F: Fn(Pos) -> bool,
    {
        if start == goal {
            return Some(Vec::new());
        }
        if !grid.in_bounds(goal.0, goal.1) || !grid.is_walkable(goal.0, goal.1) {
            return None;
        }

        let passable = |p: Pos| {
            grid.in_bounds(p.0, p.1) && grid.is_walkable(p.0, p.1) && (p == goal || !blocked(p))
        };

        if self.config.line_of_sight_shortcut {
            let line = match self.config.connectivity {
                Connectivity::Eight => bresenham_line(start, goal),
                Connectivity::Four => four_connected_line(start, goal),
            };
            if line.iter().skip(1).all(|&p| passable(p)) {
                return Some(line.into_iter().skip(1).collect());
            }
        }

        self.astar(start, goal, passable)
    }

    fn astar<F: Fn(Pos) -> bool>(&self, start: Pos, goal: Pos, passable: F) -> Option<Vec<Pos>> {
        let heuristic = self.config.heuristic;
        let offsets = neighbor_offsets(self.config.connectivity);

        let mut open = BinaryHeap::new();
        let mut g_score: HashMap<Pos, f64> = HashMap::new();
        let mut came_from: HashMap<Pos, Pos> = HashMap::new();
        let mut closed: HashSet<Pos> = HashSet::new();
        let mut sequence = 0u64;
        let mut iterations = 0usize;

        g_score.insert(start, 0.0);
        open.push(OpenNode {
            f: heuristic.estimate(start, goal),
            sequence,
            pos: start,
        });

        while let Some(node) = open.pop() {
            if node.pos == goal {
                return Some(reconstruct(&came_from, start, goal));
            }
            if !closed.insert(node.pos) {
                continue;
            }

            iterations += 1;
            if iterations > self.config.max_iterations {
                tracing::debug!(
                    ?start,
                    ?goal,
                    max = self.config.max_iterations,
                    "path search exhausted its iteration budget"
                );
                return None;
            }

            let current_g = g_score.get(&node.pos).copied().unwrap_or(f64::INFINITY);
            for &(dx, dy) in &offsets {
                let next = (node.pos.0 + dx, node.pos.1 + dy);
                if closed.contains(&next) || !passable(next) {
                    continue;
                }
                let step = if dx != 0 && dy != 0 { SQRT_2 } else { 1.0 };
                let tentative = current_g + step;
                let known = g_score.get(&next).copied().unwrap_or(f64::INFINITY);
                if tentative + 1e-9 < known {
                    g_score.insert(next, tentative);
                    came_from.insert(next, node.pos);
                    sequence += 1;
                    open.push(OpenNode {
                        f: tentative + heuristic.estimate(next, goal),
                        sequence,
                        pos: next,
                    });
                }
            }
        }

        None
    }
}

fn reconstruct(came_from: &HashMap<Pos, Pos>, start: Pos, goal: Pos) -> Vec<Pos> {
    let mut path = vec![goal];
    let mut current = goal;
    while let Some(&prev) = came_from.get(&current) {
        if prev == start {
            break;
        }
        path.push(prev);
        current = prev;
    }
    path.reverse();
    path
}

/// Bresenham line between two cells, both endpoints included.
pub fn bresenham_line(from: Pos, to: Pos) -> Vec<Pos> {
    let (x1, y1) = from;
    let (x2, y2) = to;
    let dx = (x2 - x1).abs();
    let dy = -(y2 - y1).abs();
    let sx = if x1 < x2 { 1 } else { -1 };
    let sy = if y1 < y2 { 1 } else { -1 };
    let mut err = dx + dy;
    let (mut x, mut y) = from;
    let mut points = vec![from];

    while (x, y) != to {
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x += sx;
        }
        if e2 <= dx {
            err += dx;
            y += sy;
        }
        points.push((x, y));
    }
    points
}

/// Bresenham variant whose consecutive cells share an edge.
pub fn four_connected_line(from: Pos, to: Pos) -> Vec<Pos> {
    let (x1, y1) = from;
    let (x2, y2) = to;
    let dx = (x2 - x1).abs();
    let dy = -(y2 - y1).abs();
    let sx = if x1 < x2 { 1 } else { -1 };
    let sy = if y1 < y2 { 1 } else { -1 };
    let mut err = dx + dy;
    let (mut x, mut y) = from;
    let mut points = vec![from];

    while (x, y) != to {
        let e2 = 2 * err;
        let mut moved_x = false;
        if e2 >= dy {
            err += dy;
            x += sx;
            moved_x = true;
        }
        if e2 <= dx {
            if moved_x {
                points.push((x, y));
            }
            err += dx;
            y += sy;
        }
        points.push((x, y));
    }
    points
}

pub fn chebyshev(a: Pos, b: Pos) -> i32 {
    (a.0 - b.0).abs().max((a.1 - b.1).abs())
}

pub fn manhattan(a: Pos, b: Pos) -> i32 {
    (a.0 - b.0).abs() + (a.1 - b.1).abs()
}

pub fn distance_squared(a: Pos, b: Pos) -> i32 {
    let dx = a.0 - b.0;
    let dy = a.1 - b.1;
    dx * dx + dy * dy
}

/// Total movement cost of a path that starts next to `start`.
pub fn path_cost(start: Pos, path: &[Pos]) -> f64 {
    let mut previous = start;
    let mut cost = 0.0;
    for &p in path {
        cost += if p.0 != previous.0 && p.1 != previous.1 { SQRT_2 } else { 1.0 };
        previous = p;
    }
    cost
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    struct TestGrid {
        width: i32,
        height: i32,
        walls: HashSet<Pos>,
    }

    impl TestGrid {
        fn open(width: i32, height: i32) -> Self {
            Self {
                width,
                height,
                walls: HashSet::new(),
            }
        }
    }

    impl Walkable for TestGrid {
        fn in_bounds(&self, x: i32, y: i32) -> bool {
            x >= 0 && y >= 0 && x < self.width && y < self.height
        }

        fn is_walkable(&self, x: i32, y: i32) -> bool {
            !self.walls.contains(&(x, y))
        }
    }

    fn four() -> Pathfinder {
        Pathfinder::new(PathfindingConfig {
            connectivity: Connectivity::Four,
            heuristic: Heuristic::Manhattan,
            ..Default::default()
        })
    }

    #[test]
    fn diagonal_path_on_open_grid() {
        let grid = TestGrid::open(10, 10);
        let path = Pathfinder::default().find_path(&grid, (0, 0), (5, 5)).unwrap();
        assert_eq!(path.len(), 5);
        assert_eq!(path.last(), Some(&(5, 5)));
    }

    #[test]
    fn four_connected_path_on_open_grid() {
        let grid = TestGrid::open(10, 10);
        let path = four().find_path(&grid, (0, 0), (5, 5)).unwrap();
        assert_eq!(path.len(), 10);
        let mut prev = (0, 0);
        for p in path {
            assert_eq!(manhattan(prev, p), 1);
            prev = p;
        }
    }

    #[test]
    fn shortcut_disabled_gives_same_length() {
        let grid = TestGrid::open(10, 10);
        for connectivity in [Connectivity::Four, Connectivity::Eight] {
            let with = Pathfinder::new(PathfindingConfig {
                connectivity,
                ..Default::default()
            });
            let without = Pathfinder::new(PathfindingConfig {
                connectivity,
                line_of_sight_shortcut: false,
                ..Default::default()
            });
            let a = with.find_path(&grid, (1, 2), (8, 5)).unwrap();
            let b = without.find_path(&grid, (1, 2), (8, 5)).unwrap();
            assert_eq!(a.len(), b.len());
            assert!((path_cost((1, 2), &a) - path_cost((1, 2), &b)).abs() < 1e-9);
        }
    }

    #[test]
    fn detours_around_wall() {
        let mut grid = TestGrid::open(7, 7);
        for y in 0..6 {
            grid.walls.insert((3, y));
        }
        let path = Pathfinder::default().find_path(&grid, (0, 0), (6, 0)).unwrap();
        assert!(path.contains(&(3, 6)));
        assert_eq!(path.last(), Some(&(6, 0)));
    }

    #[test]
    fn unreachable_goal_returns_none() {
        let mut grid = TestGrid::open(5, 5);
        for y in 0..5 {
            grid.walls.insert((2, y));
        }
        assert!(Pathfinder::default().find_path(&grid, (0, 0), (4, 4)).is_none());
        assert!(Pathfinder::default().find_path(&grid, (0, 0), (2, 2)).is_none());
    }

    #[test]
    fn iteration_budget_reports_no_path() {
        let mut grid = TestGrid::open(30, 30);
        for y in 0..29 {
            grid.walls.insert((15, y));
        }
        let tight = Pathfinder::new(PathfindingConfig {
            max_iterations: 5,
            ..Default::default()
        });
        assert!(tight.find_path(&grid, (0, 0), (29, 0)).is_none());
        assert!(Pathfinder::default().find_path(&grid, (0, 0), (29, 0)).is_some());
    }

    #[test]
    fn goal_is_exempt_from_blocking_predicate() {
        let grid = TestGrid::open(5, 5);
        let path = Pathfinder::default()
            .find_path_avoiding(&grid, (0, 0), (2, 0), |p| p == (2, 0) || p == (1, 0))
            .unwrap();
        assert_eq!(path.last(), Some(&(2, 0)));
        assert!(!path.contains(&(1, 0)));
    }

    #[test]
    fn search_is_deterministic() {
        let mut grid = TestGrid::open(12, 12);
        for x in 2..10 {
            grid.walls.insert((x, 5));
        }
        let pf = Pathfinder::default();
        let a = pf.find_path(&grid, (5, 1), (5, 10));
        let b = pf.find_path(&grid, (5, 1), (5, 10));
        assert_eq!(a, b);
    }

    proptest! {
        #[test]
        fn found_paths_are_connected_and_walkable(
            walls in proptest::collection::hash_set((0i32..12, 0i32..12), 0..40),
            gx in 0i32..12,
            gy in 0i32..12,
        ) {
            let mut grid = TestGrid::open(12, 12);
            grid.walls = walls;
            grid.walls.remove(&(0, 0));
            let pf = Pathfinder::default();
            if let Some(path) = pf.find_path(&grid, (0, 0), (gx, gy)) {
                let mut prev = (0, 0);
                for p in &path {
                    prop_assert_eq!(chebyshev(prev, *p), 1);
                    prop_assert!(grid.is_walkable(p.0, p.1));
                    prev = *p;
                }
                prop_assert!(path.len() as i32 >= chebyshev((0, 0), (gx, gy)));
            }
        }
    }
}
