use log::{debug, trace};

use super::candidates::{self, Position};
use super::queue::{Handle, WorkQueue};
use super::{
    Candidate, Companion, Detector, NoCompanion, Placement, RenderContext, Strategy, TextPath,
    Verdict,
};
use crate::config::{LabelPlacement, PlacementConfig, TextStyle};
use crate::error::{PlacementError, Result};
use crate::geometry::{self, BBox, Feature, Geometry, GeometryKind, Point};
use crate::text::{FontManager, Glyph, ProcessedText};
use crate::transform::CoordTransform;

// Orientations closer to zero than this (degrees) are treated as unrotated.
const ANGLE_SNAP_DEGREES: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlacerState {
    Uninitialized,
    HasPlacement,
    Exhausted,
}

/// How a companion changes the geometry walk.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Coupling {
    /// Turn line geometries into a run of point placements along the path.
    pub points_on_line: bool,
    /// Pixel shift applied to every point-placement reference point.
    pub reference_shift: Point,
}

#[derive(Debug, Clone)]
enum Task {
    /// Screen-space reference point.
    Point { geometry: usize, anchor: Point },
    /// Map-space path; its positions are generated once it is reached.
    Line { geometry: usize, coords: Vec<Point> },
}

// The line under the cursor and the positions it has left to offer.
struct ActiveLine {
    handle: Handle,
    path: Vec<Point>,
    positions: WorkQueue<Position>,
}

/// Placement state machine for one feature's label.
///
/// Built once per feature; every `advance()` yields the next collision-free
/// placement until the work queue drains. Accepted footprints are inserted
/// into the detector immediately, so later candidates (from this or any
/// later feature) cannot overlap them.
pub struct TextPlacer<'a, T, D, C = NoCompanion>
where
    T: CoordTransform,
    D: Detector,
    C: Companion,
{
    config: &'a PlacementConfig,
    transform: &'a T,
    detector: &'a mut D,
    companion: C,
    coupling: Coupling,
    text: ProcessedText,
    line_glyphs: Vec<Glyph>,
    offsets: Vec<Point>,
    line_spacing: Option<f64>,
    angle: f64,
    max_char_delta: f64,
    screen_extent: BBox,
    image_box: BBox,
    queue: WorkQueue<Task>,
    cursor: Option<Handle>,
    active_line: Option<ActiveLine>,
    placements: Vec<Placement<C::Output>>,
    state: PlacerState,
}

impl<'a, T, D> TextPlacer<'a, T, D, NoCompanion>
where
    T: CoordTransform,
    D: Detector,
{
    pub fn new<F: FontManager>(
        feature: &Feature,
        style: &TextStyle,
        config: &'a PlacementConfig,
        ctx: RenderContext<'a, T, D>,
        fonts: &mut F,
    ) -> Result<Self> {
        Self::with_companion(
            feature,
            style,
            config,
            ctx,
            fonts,
            NoCompanion,
            Coupling::default(),
        )
    }
}

impl<'a, T, D, C> TextPlacer<'a, T, D, C>
where
    T: CoordTransform,
    D: Detector,
    C: Companion,
{
    pub fn with_companion<F: FontManager>(
        feature: &Feature,
        style: &TextStyle,
        config: &'a PlacementConfig,
        ctx: RenderContext<'a, T, D>,
        fonts: &mut F,
        companion: C,
        coupling: Coupling,
    ) -> Result<Self> {
        if config.offsets.is_empty() {
            return Err(PlacementError::InvalidConfig(
                "offset list must not be empty".to_string(),
            ));
        }
        if let Some(spacing) = config.line_spacing
            && !(spacing > 0.0)
        {
            return Err(PlacementError::InvalidConfig(format!(
                "line spacing must be positive, got {spacing}"
            )));
        }
        if !(ctx.scale_factor > 0.0) {
            return Err(PlacementError::InvalidConfig(format!(
                "scale factor must be positive, got {}",
                ctx.scale_factor
            )));
        }
        let scale = ctx.scale_factor;
        let text = ProcessedText::process(&feature.label, style, scale, fonts)?;
        let line_glyphs = text.single_line();
        let screen_extent = ctx.transform.forward_box(&ctx.query_extent)?;
        let image_box = ctx.image_box();
        let angle = if config.orientation.abs() < ANGLE_SNAP_DEGREES {
            0.0
        } else {
            config.orientation.to_radians()
        };

        let mut placer = Self {
            config,
            transform: ctx.transform,
            detector: ctx.detector,
            companion,
            coupling,
            text,
            line_glyphs,
            offsets: config
                .offsets
                .iter()
                .map(|(dx, dy)| (dx * scale, dy * scale))
                .collect(),
            line_spacing: config.line_spacing.map(|s| s * scale),
            angle,
            max_char_delta: config.max_char_angle_delta.to_radians(),
            screen_extent,
            image_box,
            queue: WorkQueue::new(),
            cursor: None,
            active_line: None,
            placements: Vec::new(),
            state: PlacerState::Uninitialized,
        };
        // An empty label has nothing to place; the queue stays empty.
        let geometries = if placer.text.is_empty() {
            Vec::new()
        } else {
            placer.initialize_geometries(feature)?
        };
        placer.initialize_tasks(&geometries)?;
        placer.cursor = placer.queue.front();
        debug!(
            feature = feature.id,
            geometries = geometries.len(),
            tasks = placer.queue.len();
            "Initialized label placement"
        );
        Ok(placer)
    }

    /// Geometries worth labelling, with their index in the feature.
    fn initialize_geometries<'f>(&self, feature: &'f Feature) -> Result<Vec<(usize, &'f Geometry)>> {
        let mut kept = Vec::new();
        let mut has_polygon = false;
        for (idx, geom) in feature.geometries.iter().enumerate() {
            if geom.is_empty() {
                continue;
            }
            if geom.kind == GeometryKind::Polygon {
                has_polygon = true;
                if self.config.minimum_path_length > 0.0
                    && let Some(envelope) = geom.envelope()
                {
                    let screen = self.transform.forward_box(&envelope)?;
                    if screen.width() < self.config.minimum_path_length {
                        continue;
                    }
                }
            }
            kept.push((idx, geom));
        }
        if has_polygon && self.config.largest_bbox_only && kept.len() > 1 {
            let area = |g: &Geometry| g.envelope().map(|b| b.area()).unwrap_or(0.0);
            let largest = kept
                .iter()
                .copied()
                .reduce(|best, next| if area(next.1) > area(best.1) { next } else { best });
            kept = largest.into_iter().collect();
        }
        Ok(kept)
    }

    fn initialize_tasks(&mut self, geometries: &[(usize, &Geometry)]) -> Result<()> {
        for &(idx, geom) in geometries {
            let follows_path =
                self.config.placement == LabelPlacement::Line && geom.kind != GeometryKind::Point;
            if follows_path {
                let mut coords = geom.coords.clone();
                if geom.kind == GeometryKind::Polygon
                    && let (Some(first), Some(last)) =
                        (coords.first().copied(), coords.last().copied())
                    && first != last
                {
                    coords.push(first);
                }
                if self.coupling.points_on_line {
                    let path = self.to_screen(&coords)?;
                    for position in candidates::line_positions(&path, self.line_spacing) {
                        self.queue.push_back(Task::Point {
                            geometry: idx,
                            anchor: position.point,
                        });
                    }
                } else {
                    self.queue.push_back(Task::Line {
                        geometry: idx,
                        coords,
                    });
                }
                continue;
            }

            let anchors = match self.config.placement {
                LabelPlacement::Vertex => geom.coords.clone(),
                LabelPlacement::Interior => geometry::interior_position(geom).into_iter().collect(),
                LabelPlacement::Point | LabelPlacement::Line => {
                    geometry::centroid(geom).into_iter().collect()
                }
            };
            for anchor in anchors {
                let anchor = self.transform.forward(anchor)?;
                self.queue.push_back(Task::Point {
                    geometry: idx,
                    anchor,
                });
            }
        }
        Ok(())
    }

    fn to_screen(&self, coords: &[Point]) -> Result<Vec<Point>> {
        coords.iter().map(|p| self.transform.forward(*p)).collect()
    }

    /// Find the next placement. `Ok(false)` once every geometry has been
    /// consumed; it stays `Ok(false)` on every later call.
    pub fn advance(&mut self) -> Result<bool> {
        self.placements.clear();
        while let Some(handle) = self.cursor {
            let placed = match self.queue.get(handle) {
                Some(Task::Point { geometry, anchor }) => {
                    let (geometry, anchor) = (*geometry, *anchor);
                    self.next_point_placement(handle, geometry, anchor)
                }
                Some(Task::Line { geometry, .. }) => {
                    let geometry = *geometry;
                    self.next_line_placement(handle, geometry)?
                }
                None => {
                    self.cursor = self.queue.front();
                    false
                }
            };
            if placed {
                self.state = PlacerState::HasPlacement;
                return Ok(true);
            }
        }
        self.active_line = None;
        self.state = PlacerState::Exhausted;
        Ok(false)
    }

    fn next_point_placement(&mut self, handle: Handle, geometry: usize, anchor: Point) -> bool {
        let shift = self.coupling.reference_shift;
        let reference = (anchor.0 + shift.0, anchor.1 + shift.1);
        let mut accepted = false;
        for idx in 0..self.offsets.len() {
            let path = candidates::point_candidate(&self.text, reference, self.offsets[idx], self.angle);
            if self.config.clip && !self.screen_extent.contains_point(path.anchor) {
                trace!(geometry, offset = idx; "Label point outside query extent");
                continue;
            }
            if self.try_accept(path, reference, Strategy::Point, geometry) {
                accepted = true;
                break;
            }
        }
        self.cursor = self.queue.remove_and_next(handle);
        if accepted && !self.config.place_every_point {
            self.drop_remaining_points(geometry);
        }
        accepted
    }

    fn next_line_placement(&mut self, handle: Handle, geometry: usize) -> Result<bool> {
        let mut line = match self.active_line.take() {
            Some(line) if line.handle == handle => line,
            _ => self.open_line(handle)?,
        };
        while let Some(position) = line.positions.pop_front() {
            if self.config.clip && !self.screen_extent.contains_point(position.point) {
                trace!(geometry, arc = position.arc; "Line position outside query extent");
                continue;
            }
            let Some(path) = candidates::line_candidate(
                &self.line_glyphs,
                self.text.line_advance,
                &line.path,
                position.arc,
                self.max_char_delta,
            ) else {
                trace!(geometry, arc = position.arc; "Text does not fit the line here");
                continue;
            };
            if self.try_accept(path, position.point, Strategy::Line, geometry) {
                self.active_line = Some(line);
                return Ok(true);
            }
        }
        self.cursor = self.queue.remove_and_next(handle);
        Ok(false)
    }

    fn open_line(&self, handle: Handle) -> Result<ActiveLine> {
        let coords: &[Point] = match self.queue.get(handle) {
            Some(Task::Line { coords, .. }) => coords,
            _ => &[],
        };
        let path = self.to_screen(coords)?;
        let positions = candidates::line_positions(&path, self.line_spacing)
            .into_iter()
            .collect();
        Ok(ActiveLine {
            handle,
            path,
            positions,
        })
    }

    fn try_accept(
        &mut self,
        path: TextPath,
        reference: Point,
        strategy: Strategy,
        geometry: usize,
    ) -> bool {
        let verdict = self.companion.attach(&Candidate {
            path: &path,
            reference,
            strategy,
        });
        let Verdict::Accept { extra, output } = verdict else {
            trace!(geometry; "Candidate vetoed by companion");
            return false;
        };
        if self.config.avoid_edges
            && !path
                .boxes
                .iter()
                .chain(extra.iter())
                .all(|b| self.image_box.contains(b))
        {
            trace!(geometry; "Candidate crosses the image edge");
            return false;
        }
        if !self.config.allow_overlap
            && path
                .boxes
                .iter()
                .chain(extra.iter())
                .any(|b| self.detector.collides(b))
        {
            trace!(geometry, x = path.anchor.0, y = path.anchor.1; "Candidate collides");
            return false;
        }
        for bbox in path.boxes.iter().chain(extra.iter()) {
            self.detector.insert(*bbox);
        }
        self.placements.push(Placement {
            path,
            geometry,
            strategy,
            companion: output,
        });
        true
    }

    // Remaining point tasks of `geometry` are dropped without being tried.
    fn drop_remaining_points(&mut self, geometry: usize) {
        let mut next = self.cursor;
        while let Some(handle) = next {
            next = self.queue.next(handle);
            let sibling = matches!(
                self.queue.get(handle),
                Some(Task::Point { geometry: g, .. }) if *g == geometry
            );
            if sibling {
                self.queue.remove(handle);
                if self.cursor == Some(handle) {
                    self.cursor = next;
                }
            }
        }
    }

    /// Placements found by the last successful `advance()`. Empty before the
    /// first call and after exhaustion.
    pub fn current_placements(&self) -> &[Placement<C::Output>] {
        &self.placements
    }

    pub fn state(&self) -> PlacerState {
        self.state
    }

    /// Geometries or points still waiting in the work queue.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn text(&self) -> &ProcessedText {
        &self.text
    }

    pub fn companion(&self) -> &C {
        &self.companion
    }

    pub fn screen_extent(&self) -> BBox {
        self.screen_extent
    }
}
