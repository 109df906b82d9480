//! Label placement for one feature at a time.
//!
//! [`TextPlacer`] walks a feature's geometries and yields collision-free
//! text placements; [`ShieldPlacer`] couples an icon to every placement
//! and only accepts the pair when both footprints are clear.

mod candidates;
mod detector;
mod queue;
mod shield;
mod text_placer;

pub use candidates::{
    GlyphPlacement, Position, TextPath, line_candidate, line_positions, point_candidate,
};
pub use detector::{CollisionGrid, Detector};
pub use queue::{Handle, WorkQueue};
pub use shield::{MarkerCompanion, MarkerPlacement, ShieldPlacer};
pub use text_placer::{Coupling, PlacerState, TextPlacer};

use serde::Serialize;

use crate::geometry::{BBox, Point};
use crate::transform::CoordTransform;

/// Which strategy produced a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Strategy {
    Point,
    Line,
}

/// A text candidate that already passed the cheap checks, handed to the
/// [`Companion`] before the occupancy query.
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'c> {
    pub path: &'c TextPath,
    /// Reference point the text was displaced from.
    pub reference: Point,
    pub strategy: Strategy,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Verdict<O> {
    Reject,
    /// Accept if `extra` is clear too; `output` is kept with the placement.
    Accept { extra: Vec<BBox>, output: O },
}

/// Acceptance hook run on every candidate. It may veto the candidate or
/// add footprint that has to clear the occupancy oracle together with
/// the text.
pub trait Companion {
    type Output: Clone + std::fmt::Debug;

    fn attach(&self, candidate: &Candidate<'_>) -> Verdict<Self::Output>;
}

/// Plain text: no extra footprint.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCompanion;

impl Companion for NoCompanion {
    type Output = ();

    fn attach(&self, _candidate: &Candidate<'_>) -> Verdict<()> {
        Verdict::Accept {
            extra: Vec::new(),
            output: (),
        }
    }
}

/// An accepted placement.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Placement<O> {
    pub path: TextPath,
    /// Index into the feature's geometries.
    pub geometry: usize,
    pub strategy: Strategy,
    pub companion: O,
}

/// Borrowed collaborators for placing labels on one image.
pub struct RenderContext<'a, T, D> {
    pub transform: &'a T,
    pub detector: &'a mut D,
    /// Visible map extent, in map coordinates.
    pub query_extent: BBox,
    pub width: u32,
    pub height: u32,
    pub scale_factor: f64,
}

impl<'a, T: CoordTransform, D: Detector> RenderContext<'a, T, D> {
    pub fn new(transform: &'a T, detector: &'a mut D, query_extent: BBox, width: u32, height: u32) -> Self {
        Self {
            transform,
            detector,
            query_extent,
            width,
            height,
            scale_factor: 1.0,
        }
    }

    pub fn with_scale_factor(mut self, scale_factor: f64) -> Self {
        self.scale_factor = scale_factor;
        self
    }

    pub fn image_box(&self) -> BBox {
        BBox::new(0.0, 0.0, f64::from(self.width), f64::from(self.height))
    }
}
