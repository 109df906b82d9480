use serde::Serialize;

use crate::error::{PlacementError, Result};
use crate::geometry::{BBox, Point};

/// Maps feature (map) coordinates to screen pixels.
///
/// Called once per candidate position on the placement hot path, so
/// implementations should be cheap. Failures propagate out of `advance()`.
pub trait CoordTransform {
    fn forward(&self, p: Point) -> Result<Point>;

    fn forward_box(&self, bbox: &BBox) -> Result<BBox> {
        let a = self.forward((bbox.minx, bbox.miny))?;
        let b = self.forward((bbox.maxx, bbox.maxy))?;
        Ok(BBox::new(a.0, a.1, b.0, b.1))
    }
}

/// Input that is already in screen space.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityTransform;

impl CoordTransform for IdentityTransform {
    fn forward(&self, p: Point) -> Result<Point> {
        Ok(p)
    }
}

/// Linear map from a map-space extent onto a `width` x `height` image,
/// with y growing downwards on screen.
#[derive(Debug, Clone, Copy)]
pub struct ViewTransform {
    extent: BBox,
    sx: f64,
    sy: f64,
    offset: Point,
}

impl ViewTransform {
    pub fn new(extent: BBox, width: u32, height: u32) -> Result<Self> {
        if extent.width() <= 0.0 || extent.height() <= 0.0 {
            return Err(PlacementError::Transform(format!(
                "degenerate map extent {extent:?}"
            )));
        }
        Ok(Self {
            extent,
            sx: f64::from(width) / extent.width(),
            sy: f64::from(height) / extent.height(),
            offset: (0.0, 0.0),
        })
    }

    /// Pixel offset added after scaling, for rendering into a buffered tile.
    pub fn with_offset(mut self, offset: Point) -> Self {
        self.offset = offset;
        self
    }

    pub fn scale(&self) -> (f64, f64) {
        (self.sx, self.sy)
    }
}

impl CoordTransform for ViewTransform {
    fn forward(&self, p: Point) -> Result<Point> {
        if !p.0.is_finite() || !p.1.is_finite() {
            return Err(PlacementError::Transform(format!(
                "non-finite coordinate ({}, {})",
                p.0, p.1
            )));
        }
        Ok((
            (p.0 - self.extent.minx) * self.sx - self.offset.0,
            (self.extent.maxy - p.1) * self.sy - self.offset.1,
        ))
    }
}

/// 2D affine matrix `[sx shy shx sy tx ty]`, applied as
/// `x' = sx*x + shx*y + tx`, `y' = shy*x + sy*y + ty`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Affine {
    pub sx: f64,
    pub shy: f64,
    pub shx: f64,
    pub sy: f64,
    pub tx: f64,
    pub ty: f64,
}

impl Default for Affine {
    fn default() -> Self {
        Self::identity()
    }
}

impl Affine {
    pub fn identity() -> Self {
        Self {
            sx: 1.0,
            shy: 0.0,
            shx: 0.0,
            sy: 1.0,
            tx: 0.0,
            ty: 0.0,
        }
    }

    pub fn scaling(s: f64) -> Self {
        Self {
            sx: s,
            sy: s,
            ..Self::identity()
        }
    }

    pub fn translation(tx: f64, ty: f64) -> Self {
        Self {
            tx,
            ty,
            ..Self::identity()
        }
    }

    pub fn rotation(radians: f64) -> Self {
        let (sin, cos) = radians.sin_cos();
        Self {
            sx: cos,
            shy: sin,
            shx: -sin,
            sy: cos,
            tx: 0.0,
            ty: 0.0,
        }
    }

    /// `self` followed by `next`.
    pub fn then(&self, next: &Affine) -> Affine {
        Affine {
            sx: self.sx * next.sx + self.shy * next.shx,
            shy: self.sx * next.shy + self.shy * next.sy,
            shx: self.shx * next.sx + self.sy * next.shx,
            sy: self.shx * next.shy + self.sy * next.sy,
            tx: self.tx * next.sx + self.ty * next.shx + next.tx,
            ty: self.tx * next.shy + self.ty * next.sy + next.ty,
        }
    }

    pub fn apply(&self, p: Point) -> Point {
        (
            self.sx * p.0 + self.shx * p.1 + self.tx,
            self.shy * p.0 + self.sy * p.1 + self.ty,
        )
    }

    /// Axis-aligned hull of a transformed box.
    pub fn apply_box(&self, bbox: &BBox) -> BBox {
        let corners = [
            self.apply((bbox.minx, bbox.miny)),
            self.apply((bbox.maxx, bbox.miny)),
            self.apply((bbox.maxx, bbox.maxy)),
            self.apply((bbox.minx, bbox.maxy)),
        ];
        let mut out = BBox::new(corners[0].0, corners[0].1, corners[0].0, corners[0].1);
        for c in &corners[1..] {
            out.expand_to_include(*c);
        }
        out
    }
}
