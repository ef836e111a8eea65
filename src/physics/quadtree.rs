use eframe::egui::{Vec2, vec2};

const LEAF_CAPACITY: usize = 8;
const MAX_DEPTH: usize = 12;

#[derive(Clone, Copy, Debug)]
pub(super) struct Square {
    pub(super) center: Vec2,
    pub(super) half_extent: f32,
}

impl Square {
    fn enclosing(points: &[Vec2]) -> Option<Self> {
        let mut min = vec2(f32::INFINITY, f32::INFINITY);
        let mut max = vec2(f32::NEG_INFINITY, f32::NEG_INFINITY);
        for point in points {
            min = min.min(*point);
            max = max.max(*point);
        }
        if !(min.is_finite() && max.is_finite()) {
            return None;
        }

        let span = (max - min).max_elem().max(1.0);
        Some(Self {
            center: (min + max) * 0.5,
            half_extent: span * 0.5 + 1.0,
        })
    }

    fn contains(self, point: Vec2) -> bool {
        let offset = (point - self.center).abs();
        offset.x <= self.half_extent && offset.y <= self.half_extent
    }

    fn quadrant(self, point: Vec2) -> usize {
        usize::from(point.x >= self.center.x) | (usize::from(point.y >= self.center.y) << 1)
    }

    fn child(self, quadrant: usize) -> Self {
        let quarter = self.half_extent * 0.5;
        let sign_x = if quadrant & 1 == 0 { -1.0 } else { 1.0 };
        let sign_y = if quadrant & 2 == 0 { -1.0 } else { 1.0 };
        Self {
            center: self.center + vec2(sign_x * quarter, sign_y * quarter),
            half_extent: quarter,
        }
    }
}

#[derive(Debug)]
pub(super) struct Cell {
    pub(super) square: Square,
    pub(super) center_of_mass: Vec2,
    pub(super) count: usize,
    pub(super) members: Vec<usize>,
    pub(super) children: [Option<usize>; 4],
}

impl Cell {
    fn is_leaf(&self) -> bool {
        self.children.iter().all(Option::is_none)
    }
}

/// Flat quadtree over node positions; cell 0 is the root.
#[derive(Debug, Default)]
pub(super) struct QuadTree {
    cells: Vec<Cell>,
}

impl QuadTree {
    pub(super) fn build(positions: &[Vec2]) -> Option<Self> {
        let square = Square::enclosing(positions)?;
        let mut tree = Self {
            cells: Vec::with_capacity(positions.len() / LEAF_CAPACITY * 2 + 1),
        };
        tree.insert_cell(square, (0..positions.len()).collect(), positions, 0);
        Some(tree)
    }

    fn insert_cell(
        &mut self,
        square: Square,
        members: Vec<usize>,
        positions: &[Vec2],
        depth: usize,
    ) -> usize {
        let count = members.len();
        let center_of_mass = if count > 0 {
            members
                .iter()
                .fold(Vec2::ZERO, |sum, &index| sum + positions[index])
                / count as f32
        } else {
            square.center
        };

        let cell_index = self.cells.len();
        self.cells.push(Cell {
            square,
            center_of_mass,
            count,
            members: Vec::new(),
            children: [None; 4],
        });

        if depth >= MAX_DEPTH || count <= LEAF_CAPACITY {
            self.cells[cell_index].members = members;
            return cell_index;
        }

        let mut buckets: [Vec<usize>; 4] = Default::default();
        for index in members.iter().copied() {
            buckets[square.quadrant(positions[index])].push(index);
        }
        if buckets.iter().filter(|bucket| !bucket.is_empty()).count() <= 1 {
            self.cells[cell_index].members = members;
            return cell_index;
        }

        for (quadrant, bucket) in buckets.into_iter().enumerate() {
            if bucket.is_empty() {
                continue;
            }
            let child = self.insert_cell(square.child(quadrant), bucket, positions, depth + 1);
            self.cells[cell_index].children[quadrant] = Some(child);
        }
        cell_index
    }

    /// Sum of `law(delta, weight)` acting on `positions[index]`, replacing distant
    /// cells by their centre of mass when `side / distance < theta`.
    pub(super) fn accumulate(
        &self,
        index: usize,
        positions: &[Vec2],
        theta: f32,
        law: impl Fn(Vec2, f32) -> Vec2,
    ) -> Vec2 {
        let point = positions[index];
        let mut total = Vec2::ZERO;
        let mut stack = vec![0usize];

        while let Some(cell_index) = stack.pop() {
            let Some(cell) = self.cells.get(cell_index) else {
                continue;
            };
            if cell.count == 0 {
                continue;
            }

            if cell.is_leaf() {
                for &other in &cell.members {
                    if other != index {
                        total += law(point - positions[other], 1.0);
                    }
                }
                continue;
            }

            let delta = point - cell.center_of_mass;
            let distance = delta.length();
            let far_enough = !cell.square.contains(point)
                && distance > 0.0
                && (cell.square.half_extent * 2.0 / distance) < theta;
            if far_enough {
                total += law(delta, cell.count as f32);
            } else {
                stack.extend(cell.children.iter().flatten().copied());
            }
        }
        total
    }

    #[cfg(test)]
    pub(super) fn len(&self) -> usize {
        self.cells.len()
    }
}
