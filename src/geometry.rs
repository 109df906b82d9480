use serde::Serialize;

pub type Point = (f64, f64);

/// Axis-aligned box in whatever space its coordinates come from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BBox {
    pub minx: f64,
    pub miny: f64,
    pub maxx: f64,
    pub maxy: f64,
}

impl BBox {
    pub fn new(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self {
            minx: x0.min(x1),
            miny: y0.min(y1),
            maxx: x0.max(x1),
            maxy: y0.max(y1),
        }
    }

    pub fn from_center(center: Point, width: f64, height: f64) -> Self {
        let hw = width.abs() / 2.0;
        let hh = height.abs() / 2.0;
        Self::new(center.0 - hw, center.1 - hh, center.0 + hw, center.1 + hh)
    }

    /// Smallest box holding every point, `None` when `points` is empty.
    pub fn hull(points: &[Point]) -> Option<Self> {
        let (first, rest) = points.split_first()?;
        let mut bbox = Self::new(first.0, first.1, first.0, first.1);
        for p in rest {
            bbox.expand_to_include(*p);
        }
        Some(bbox)
    }

    pub fn width(&self) -> f64 {
        self.maxx - self.minx
    }

    pub fn height(&self) -> f64 {
        self.maxy - self.miny
    }

    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    pub fn center(&self) -> Point {
        ((self.minx + self.maxx) / 2.0, (self.miny + self.maxy) / 2.0)
    }

    /// True when the interiors overlap. Shared edges do not count.
    pub fn intersects(&self, other: &BBox) -> bool {
        self.minx < other.maxx
            && other.minx < self.maxx
            && self.miny < other.maxy
            && other.miny < self.maxy
    }

    pub fn overlap_area(&self, other: &BBox) -> f64 {
        let w = (self.maxx.min(other.maxx) - self.minx.max(other.minx)).max(0.0);
        let h = (self.maxy.min(other.maxy) - self.miny.max(other.miny)).max(0.0);
        w * h
    }

    pub fn contains_point(&self, p: Point) -> bool {
        p.0 >= self.minx && p.0 <= self.maxx && p.1 >= self.miny && p.1 <= self.maxy
    }

    pub fn contains(&self, other: &BBox) -> bool {
        other.minx >= self.minx
            && other.maxx <= self.maxx
            && other.miny >= self.miny
            && other.maxy <= self.maxy
    }

    pub fn expand_to_include(&mut self, p: Point) {
        self.minx = self.minx.min(p.0);
        self.miny = self.miny.min(p.1);
        self.maxx = self.maxx.max(p.0);
        self.maxy = self.maxy.max(p.1);
    }

    pub fn union(&self, other: &BBox) -> BBox {
        BBox {
            minx: self.minx.min(other.minx),
            miny: self.miny.min(other.miny),
            maxx: self.maxx.max(other.maxx),
            maxy: self.maxy.max(other.maxy),
        }
    }

    /// Same size, moved so its center sits on `center`.
    pub fn re_center(&self, center: Point) -> BBox {
        BBox::from_center(center, self.width(), self.height())
    }

    pub fn inflate(&self, pad: f64) -> BBox {
        BBox::new(
            self.minx - pad,
            self.miny - pad,
            self.maxx + pad,
            self.maxy + pad,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GeometryKind {
    Point,
    LineString,
    Polygon,
}

/// One geometry of a feature, in map coordinates. Polygons hold their
/// exterior ring only.
#[derive(Debug, Clone, PartialEq)]
pub struct Geometry {
    pub kind: GeometryKind,
    pub coords: Vec<Point>,
}

impl Geometry {
    pub fn point(x: f64, y: f64) -> Self {
        Self {
            kind: GeometryKind::Point,
            coords: vec![(x, y)],
        }
    }

    pub fn line(coords: Vec<Point>) -> Self {
        Self {
            kind: GeometryKind::LineString,
            coords,
        }
    }

    pub fn polygon(ring: Vec<Point>) -> Self {
        Self {
            kind: GeometryKind::Polygon,
            coords: ring,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.coords.is_empty()
    }

    pub fn envelope(&self) -> Option<BBox> {
        BBox::hull(&self.coords)
    }
}

/// A map feature: the label text plus every geometry it should be placed on.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub id: u64,
    pub label: String,
    pub geometries: Vec<Geometry>,
}

impl Feature {
    pub fn new(id: u64, label: impl Into<String>, geometries: Vec<Geometry>) -> Self {
        Self {
            id,
            label: label.into(),
            geometries,
        }
    }
}

pub fn distance(a: Point, b: Point) -> f64 {
    (b.0 - a.0).hypot(b.1 - a.1)
}

pub fn polyline_length(points: &[Point]) -> f64 {
    points.windows(2).map(|w| distance(w[0], w[1])).sum()
}

/// Point `s` units of arc length along the polyline, clamped to its ends,
/// together with the index of the segment it lies on.
pub fn point_at_length(points: &[Point], s: f64) -> Option<(Point, usize)> {
    let first = *points.first()?;
    if points.len() == 1 || s <= 0.0 {
        return Some((first, 0));
    }
    let mut walked = 0.0;
    for (idx, seg) in points.windows(2).enumerate() {
        let len = distance(seg[0], seg[1]);
        if walked + len >= s && len > 0.0 {
            let t = (s - walked) / len;
            let p = (
                seg[0].0 + (seg[1].0 - seg[0].0) * t,
                seg[0].1 + (seg[1].1 - seg[0].1) * t,
            );
            return Some((p, idx));
        }
        walked += len;
    }
    let last = *points.last()?;
    Some((last, points.len().saturating_sub(2)))
}

/// Direction of segment `idx` in radians, `None` for a degenerate segment.
pub fn segment_angle(points: &[Point], idx: usize) -> Option<f64> {
    let a = *points.get(idx)?;
    let b = *points.get(idx + 1)?;
    let (dx, dy) = (b.0 - a.0, b.1 - a.1);
    if dx.abs() < f64::EPSILON && dy.abs() < f64::EPSILON {
        return None;
    }
    Some(dy.atan2(dx))
}

fn ring_area_and_centroid(ring: &[Point]) -> Option<(f64, Point)> {
    if ring.len() < 3 {
        return None;
    }
    let mut area2 = 0.0;
    let mut cx = 0.0;
    let mut cy = 0.0;
    for i in 0..ring.len() {
        let a = ring[i];
        let b = ring[(i + 1) % ring.len()];
        let cross = a.0 * b.1 - b.0 * a.1;
        area2 += cross;
        cx += (a.0 + b.0) * cross;
        cy += (a.1 + b.1) * cross;
    }
    if area2.abs() < 1e-12 {
        return None;
    }
    Some((area2 / 2.0, (cx / (3.0 * area2), cy / (3.0 * area2))))
}

/// Representative point of a geometry: the point itself, the midpoint by
/// length of a line, or the area centroid of a polygon.
pub fn centroid(geom: &Geometry) -> Option<Point> {
    match geom.kind {
        GeometryKind::Point => geom.coords.first().copied(),
        GeometryKind::LineString => {
            let half = polyline_length(&geom.coords) / 2.0;
            point_at_length(&geom.coords, half).map(|(p, _)| p)
        }
        GeometryKind::Polygon => match ring_area_and_centroid(&geom.coords) {
            Some((_, c)) => Some(c),
            None => geom.envelope().map(|b| b.center()),
        },
    }
}

pub fn point_in_polygon(p: Point, ring: &[Point]) -> bool {
    let mut inside = false;
    let n = ring.len();
    if n < 3 {
        return false;
    }
    let mut j = n - 1;
    for i in 0..n {
        let (xi, yi) = ring[i];
        let (xj, yj) = ring[j];
        if (yi > p.1) != (yj > p.1) && p.0 < (xj - xi) * (p.1 - yi) / (yj - yi) + xi {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// Like [`centroid`], but polygons get a point that lies inside the ring:
/// the centroid when it is inside, otherwise the middle of the widest
/// horizontal span through the centroid's y.
pub fn interior_position(geom: &Geometry) -> Option<Point> {
    let c = centroid(geom)?;
    if geom.kind != GeometryKind::Polygon || point_in_polygon(c, &geom.coords) {
        return Some(c);
    }
    let ring = &geom.coords;
    let y = c.1;
    let mut xs: Vec<f64> = Vec::new();
    for i in 0..ring.len() {
        let a = ring[i];
        let b = ring[(i + 1) % ring.len()];
        if (a.1 > y) != (b.1 > y) {
            xs.push(a.0 + (y - a.1) * (b.0 - a.0) / (b.1 - a.1));
        }
    }
    xs.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    xs.chunks_exact(2)
        .max_by(|a, b| {
            (a[1] - a[0])
                .partial_cmp(&(b[1] - b[0]))
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .map(|span| ((span[0] + span[1]) / 2.0, y))
        .or(Some(c))
}
