use std::collections::{HashMap, HashSet};

use crate::geometry::BBox;

/// Occupancy oracle: tracks every footprint accepted on one image.
///
/// One instance belongs to one rendered image. Features that share it must
/// be placed one after another in draw order.
pub trait Detector {
    /// True when `bbox` overlaps something already placed.
    fn collides(&self, bbox: &BBox) -> bool;

    /// Mark `bbox` as occupied.
    fn insert(&mut self, bbox: BBox);
}

/// Uniform-grid occupancy index. Boxes are bucketed by every cell they
/// touch, so a query only inspects boxes sharing a cell with it.
#[derive(Debug, Clone)]
pub struct CollisionGrid {
    cell: f64,
    boxes: Vec<BBox>,
    /// Maps grid cell (ix, iy) to indices into `boxes`.
    cells: HashMap<(i32, i32), Vec<usize>>,
}

impl Default for CollisionGrid {
    fn default() -> Self {
        Self::new(64.0)
    }
}

impl CollisionGrid {
    pub fn new(cell: f64) -> Self {
        Self {
            cell: cell.max(4.0),
            boxes: Vec::new(),
            cells: HashMap::new(),
        }
    }

    fn cell_range(&self, bbox: &BBox) -> (i32, i32, i32, i32) {
        (
            (bbox.minx / self.cell).floor() as i32,
            (bbox.miny / self.cell).floor() as i32,
            (bbox.maxx / self.cell).floor() as i32,
            (bbox.maxy / self.cell).floor() as i32,
        )
    }

    /// Forget every placement, e.g. before rendering the next image.
    pub fn clear(&mut self) {
        self.boxes.clear();
        self.cells.clear();
    }

    pub fn len(&self) -> usize {
        self.boxes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }

    pub fn boxes(&self) -> &[BBox] {
        &self.boxes
    }

    /// Every stored box overlapping `bbox`, each reported once.
    pub fn overlapping<'a>(&'a self, bbox: &'a BBox) -> impl Iterator<Item = &'a BBox> + 'a {
        let (x0, y0, x1, y1) = self.cell_range(bbox);
        let mut seen = HashSet::new();
        (x0..=x1)
            .flat_map(move |ix| (y0..=y1).map(move |iy| (ix, iy)))
            .flat_map(move |key| {
                self.cells
                    .get(&key)
                    .map(|v| v.as_slice())
                    .unwrap_or(&[])
                    .iter()
                    .copied()
            })
            .filter(move |idx| seen.insert(*idx))
            .map(move |idx| &self.boxes[idx])
            .filter(move |other| other.intersects(bbox))
    }
}

impl Detector for CollisionGrid {
    fn collides(&self, bbox: &BBox) -> bool {
        let (x0, y0, x1, y1) = self.cell_range(bbox);
        for ix in x0..=x1 {
            for iy in y0..=y1 {
                let Some(bucket) = self.cells.get(&(ix, iy)) else {
                    continue;
                };
                if bucket.iter().any(|&idx| self.boxes[idx].intersects(bbox)) {
                    return true;
                }
            }
        }
        false
    }

    fn insert(&mut self, bbox: BBox) {
        let idx = self.boxes.len();
        let (x0, y0, x1, y1) = self.cell_range(&bbox);
        self.boxes.push(bbox);
        for ix in x0..=x1 {
            for iy in y0..=y1 {
                self.cells.entry((ix, iy)).or_default().push(idx);
            }
        }
    }
}
