use crate::geom::{angle_diff_abs, axis_vec_diff, is_orthogonal};
use crate::params::GridGraphParams;
use checkerboard_calib_core::{Corner, GridCoords};
use kiddo::{KdTree, SquaredEuclidean};
use nalgebra::Vector2;
use std::collections::VecDeque;
use std::f32::consts::{FRAC_PI_2, FRAC_PI_4};

/// Step direction along the board axes `u` (Right/Left) and `v` (Down/Up).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NeighborDirection {
    Right,
    Left,
    Up,
    Down,
}

impl NeighborDirection {
    pub fn opposite(self) -> Self {
        match self {
            Self::Right => Self::Left,
            Self::Left => Self::Right,
            Self::Up => Self::Down,
            Self::Down => Self::Up,
        }
    }

    fn step(self) -> (i32, i32) {
        match self {
            Self::Right => (1, 0),
            Self::Left => (-1, 0),
            Self::Up => (0, -1),
            Self::Down => (0, 1),
        }
    }

    fn slot(self) -> usize {
        match self {
            Self::Right => 0,
            Self::Left => 1,
            Self::Up => 2,
            Self::Down => 3,
        }
    }
}

#[derive(Clone, Debug)]
pub struct NodeNeighbor {
    pub direction: NeighborDirection,
    pub index: usize,
    pub distance: f32,
    pub score: f32,
}

fn classify_direction(edge: &Vector2<f32>, board_axis: f32) -> NeighborDirection {
    let u = Vector2::new(board_axis.cos(), board_axis.sin());
    let v = Vector2::new(-u.y, u.x);
    let du = edge.dot(&u);
    let dv = edge.dot(&v);
    if du.abs() >= dv.abs() {
        if du >= 0.0 {
            NeighborDirection::Right
        } else {
            NeighborDirection::Left
        }
    } else if dv >= 0.0 {
        NeighborDirection::Down
    } else {
        NeighborDirection::Up
    }
}

/// Scores the edge `corner -> neighbor`; `None` when it cannot be a grid edge.
///
/// Adjacent X-junctions have swapped bright diagonals, sit within the
/// spacing window and are joined by an edge roughly 45° off both diagonals.
/// Lower scores are better.
fn is_good_neighbor(
    corner: &Corner,
    neighbor: &Corner,
    neighbor_index: usize,
    params: &GridGraphParams,
    board_axis: f32,
) -> Option<NodeNeighbor> {
    let tol = params.orientation_tolerance_deg.to_radians();
    if !is_orthogonal(corner.orientation, neighbor.orientation, tol) {
        return None;
    }

    let edge = neighbor.position - corner.position;
    let distance = edge.norm();
    if !(params.min_spacing_pix..=params.max_spacing_pix).contains(&distance) {
        return None;
    }

    let heading = edge.y.atan2(edge.x);
    let off_grid = |orientation: f32| (axis_vec_diff(orientation, heading) - FRAC_PI_4).abs();
    let (a, b) = (off_grid(corner.orientation), off_grid(neighbor.orientation));
    if a.max(b) > tol {
        return None;
    }
    let skew = (angle_diff_abs(corner.orientation, neighbor.orientation) - FRAC_PI_2).abs();

    Some(NodeNeighbor {
        direction: classify_direction(&edge, board_axis),
        index: neighbor_index,
        distance,
        score: a + b + skew,
    })
}

/// Keep at most one neighbor per direction: the nearest candidate, with
/// the orientation score as a tie-breaker.
fn select_neighbors(candidates: Vec<NodeNeighbor>) -> Vec<NodeNeighbor> {
    let mut best: [Option<NodeNeighbor>; 4] = [None, None, None, None];

    for candidate in candidates {
        let slot = &mut best[candidate.direction.slot()];
        let replace = match slot {
            None => true,
            Some(current) => {
                candidate.distance < current.distance
                    || (candidate.distance == current.distance && candidate.score < current.score)
            }
        };
        if replace {
            *slot = Some(candidate);
        }
    }

    best.into_iter().flatten().collect()
}

/// 4-connected neighbourhood graph over raw corners.
pub struct GridGraph {
    pub neighbors: Vec<Vec<NodeNeighbor>>, // For each node, list of neighbors
}

impl GridGraph {
    /// Build the graph; only mutual edges (A is B's Right and B is A's
    /// Left, and so on) are kept.
    pub fn new(corners: &[Corner], params: &GridGraphParams, board_axis: f32) -> Self {
        if corners.is_empty() {
            return Self {
                neighbors: Vec::new(),
            };
        }

        let coords = corners
            .iter()
            .map(|c| [c.position.x, c.position.y])
            .collect::<Vec<_>>();
        let tree: KdTree<f32, 2> = (&coords).into();

        let mut neighbors = Vec::with_capacity(corners.len());
        for (i, corner) in corners.iter().enumerate() {
            let query_point = [corner.position.x, corner.position.y];
            let results = tree.nearest_n::<SquaredEuclidean>(&query_point, params.k_neighbors + 1);

            let candidates = results
                .into_iter()
                .map(|nn| nn.item as usize)
                .filter(|&j| j != i)
                .filter_map(|j| is_good_neighbor(corner, &corners[j], j, params, board_axis))
                .collect();
            neighbors.push(select_neighbors(candidates));
        }

        let mutual: Vec<Vec<NodeNeighbor>> = neighbors
            .iter()
            .enumerate()
            .map(|(i, list)| {
                list.iter()
                    .filter(|n| {
                        neighbors[n.index]
                            .iter()
                            .any(|back| back.index == i && back.direction == n.direction.opposite())
                    })
                    .cloned()
                    .collect()
            })
            .collect();

        Self { neighbors: mutual }
    }

    pub fn len(&self) -> usize {
        self.neighbors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.neighbors.is_empty()
    }

    /// Connected components, each listed from its lowest node index.
    pub fn connected_components(&self) -> Vec<Vec<usize>> {
        let mut visited = vec![false; self.neighbors.len()];
        let mut components = Vec::new();

        for start in 0..self.neighbors.len() {
            if visited[start] {
                continue;
            }

            let mut component = Vec::new();
            let mut stack = vec![start];
            while let Some(node) = stack.pop() {
                if visited[node] {
                    continue;
                }
                visited[node] = true;
                component.push(node);

                for neighbor in &self.neighbors[node] {
                    if !visited[neighbor.index] {
                        stack.push(neighbor.index);
                    }
                }
            }
            components.push(component);
        }

        components
    }

    /// BFS over a component, assigning integer grid coordinates relative to
    /// its first node. Returns `None` when two nodes land on the same cell
    /// or one node is reached with two different coordinates.
    pub fn assign_grid_coordinates(&self, component: &[usize]) -> Option<Vec<(usize, GridCoords)>> {
        let start = *component.first()?;
        let mut assigned: Vec<Option<GridCoords>> = vec![None; self.neighbors.len()];
        let mut occupied = std::collections::HashSet::new();
        let mut out = Vec::with_capacity(component.len());
        let mut queue = VecDeque::new();

        assigned[start] = Some(GridCoords { i: 0, j: 0 });
        occupied.insert((0, 0));
        queue.push_back(start);

        while let Some(node) = queue.pop_front() {
            let here = assigned[node]?;
            out.push((node, here));

            for neighbor in &self.neighbors[node] {
                let (di, dj) = neighbor.direction.step();
                let next = GridCoords {
                    i: here.i + di,
                    j: here.j + dj,
                };
                match assigned[neighbor.index] {
                    Some(existing) if existing != next => return None,
                    Some(_) => {}
                    None => {
                        if !occupied.insert((next.i, next.j)) {
                            return None;
                        }
                        assigned[neighbor.index] = Some(next);
                        queue.push_back(neighbor.index);
                    }
                }
            }
        }

        Some(out)
    }
}
