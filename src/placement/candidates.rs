// Candidate generation: turns an anchor point or a position on a path into
// a laid-out glyph path plus the boxes it would occupy. Nothing here looks
// at the occupancy oracle.

use std::f64::consts::{FRAC_PI_2, PI, TAU};

use serde::Serialize;

use crate::geometry::{self, BBox, Point};
use crate::text::{Glyph, ProcessedText};
use crate::transform::Affine;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GlyphPlacement {
    pub ch: char,
    /// Center of the glyph cell.
    pub pos: Point,
    /// Radians, screen space.
    pub angle: f64,
    pub advance: f64,
}

/// A fully laid-out candidate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextPath {
    /// Label point: reference point plus displacement for point placement,
    /// the path position for line placement.
    pub anchor: Point,
    /// Center of the laid-out text.
    pub center: Point,
    pub angle: f64,
    pub glyphs: Vec<GlyphPlacement>,
    /// Footprint tested against the occupancy oracle.
    pub boxes: Vec<BBox>,
    pub envelope: BBox,
}

/// One position along a line, with its arc length from the path start.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub point: Point,
    pub arc: f64,
}

// Start of the text block along one axis for a displacement on that axis.
fn aligned_start(displacement: f64, extent: f64) -> f64 {
    if displacement > 0.0 {
        displacement
    } else if displacement < 0.0 {
        displacement - extent
    } else {
        -extent / 2.0
    }
}

/// Lay out `text` around `reference` shifted by `offset`, rotated by `angle`
/// radians about the reference point. Alignment follows the sign of each
/// displacement component.
pub fn point_candidate(
    text: &ProcessedText,
    reference: Point,
    offset: Point,
    angle: f64,
) -> TextPath {
    let x0 = aligned_start(offset.0, text.width);
    let y0 = aligned_start(offset.1, text.height);
    let block = BBox::new(x0, y0, x0 + text.width, y0 + text.height);
    let to_screen = Affine::rotation(angle).then(&Affine::translation(reference.0, reference.1));

    let mut glyphs = Vec::new();
    for (row, line) in text.lines.iter().enumerate() {
        let cy = y0 + (row as f64 + 0.5) * text.line_advance;
        let mut x = x0 + (text.width - line.width) / 2.0;
        for glyph in &line.glyphs {
            glyphs.push(GlyphPlacement {
                ch: glyph.ch,
                pos: to_screen.apply((x + glyph.advance / 2.0, cy)),
                angle,
                advance: glyph.advance,
            });
            x += glyph.advance;
        }
    }

    let envelope = to_screen.apply_box(&block);
    TextPath {
        anchor: (reference.0 + offset.0, reference.1 + offset.1),
        center: to_screen.apply(block.center()),
        angle,
        glyphs,
        boxes: vec![envelope],
        envelope,
    }
}

/// Candidate positions along a screen-space path: its vertices, or points
/// every `spacing` pixels of arc length starting at the path start. A
/// spacing that is not positive falls back to the vertices.
pub fn line_positions(path: &[Point], spacing: Option<f64>) -> Vec<Position> {
    match spacing.filter(|step| *step > 0.0) {
        None => {
            let mut arc = 0.0;
            let mut out = Vec::with_capacity(path.len());
            for (idx, point) in path.iter().enumerate() {
                if idx > 0 {
                    arc += geometry::distance(path[idx - 1], *point);
                }
                out.push(Position { point: *point, arc });
            }
            out
        }
        Some(step) => {
            let length = geometry::polyline_length(path);
            let mut out = Vec::new();
            let mut arc = 0.0;
            while arc <= length {
                if let Some((point, _)) = geometry::point_at_length(path, arc) {
                    out.push(Position { point, arc });
                }
                arc += step;
            }
            out
        }
    }
}

fn wrap_angle(delta: f64) -> f64 {
    (delta + PI).rem_euclid(TAU) - PI
}

fn angle_at(path: &[Point], seg: usize) -> f64 {
    // Degenerate segments borrow the direction of the nearest real one.
    (seg..path.len().saturating_sub(1))
        .chain((0..seg).rev())
        .find_map(|idx| geometry::segment_angle(path, idx))
        .unwrap_or(0.0)
}

/// Lay `glyphs` along `path` centered on arc length `arc`, sliding the text
/// back onto the path when it would run past an end.
///
/// Returns `None` when the text is longer than the path or bends by more
/// than `max_delta` radians between neighbouring glyphs. Text whose run
/// would read right-to-left is laid along the reversed path instead.
pub fn line_candidate(
    glyphs: &[Glyph],
    line_height: f64,
    path: &[Point],
    arc: f64,
    max_delta: f64,
) -> Option<TextPath> {
    let length = geometry::polyline_length(path);
    let width: f64 = glyphs.iter().map(|g| g.advance).sum();
    if path.len() < 2 || width > length {
        return None;
    }
    let anchor = geometry::point_at_length(path, arc)?.0;
    let start = (arc - width / 2.0).clamp(0.0, length - width);

    let from = geometry::point_at_length(path, start)?.0;
    let to = geometry::point_at_length(path, start + width)?.0;
    let leftwards = is_upside_down((to.1 - from.1).atan2(to.0 - from.0));
    let reversed: Vec<Point>;
    let (path, start) = if leftwards {
        reversed = path.iter().rev().copied().collect();
        (reversed.as_slice(), length - start - width)
    } else {
        (path, start)
    };

    let mut placed = Vec::with_capacity(glyphs.len());
    let mut boxes = Vec::with_capacity(glyphs.len());
    let mut prev_angle: Option<f64> = None;
    let mut cursor = start;
    for glyph in glyphs {
        let (pos, seg) = geometry::point_at_length(path, cursor + glyph.advance / 2.0)?;
        let angle = angle_at(path, seg);
        if let Some(prev) = prev_angle
            && wrap_angle(angle - prev).abs() > max_delta
        {
            return None;
        }
        prev_angle = Some(angle);
        let cell = BBox::from_center((0.0, 0.0), glyph.advance, line_height);
        let to_screen = Affine::rotation(angle).then(&Affine::translation(pos.0, pos.1));
        boxes.push(to_screen.apply_box(&cell));
        placed.push(GlyphPlacement {
            ch: glyph.ch,
            pos,
            angle,
            advance: glyph.advance,
        });
        cursor += glyph.advance;
    }

    let (center, center_seg) = geometry::point_at_length(path, start + width / 2.0)?;
    let envelope = boxes
        .iter()
        .skip(1)
        .fold(boxes.first().copied(), |acc, b| acc.map(|a| a.union(b)))
        .unwrap_or_else(|| BBox::from_center(center, 0.0, 0.0));
    Some(TextPath {
        anchor,
        center,
        angle: angle_at(path, center_seg),
        glyphs: placed,
        boxes,
        envelope,
    })
}

/// True when an angle in radians points into the left half-plane.
pub fn is_upside_down(angle: f64) -> bool {
    wrap_angle(angle).abs() > FRAC_PI_2
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TextStyle;
    use crate::text::MetricFontManager;
    use float_cmp::approx_eq;

    fn text(label: &str) -> ProcessedText {
        ProcessedText::process(label, &TextStyle::default(), 1.0, &mut MetricFontManager).unwrap()
    }

    fn unit_glyphs(n: usize, advance: f64) -> Vec<Glyph> {
        (0..n).map(|_| Glyph { ch: 'x', advance }).collect()
    }

    #[test]
    fn zero_offset_centers_text_on_reference() {
        let t = text("ab");
        let path = point_candidate(&t, (10.0, 10.0), (0.0, 0.0), 0.0);
        assert_eq!(path.anchor, (10.0, 10.0));
        assert!(approx_eq!(f64, path.center.0, 10.0, epsilon = 1e-9));
        assert!(approx_eq!(f64, path.center.1, 10.0, epsilon = 1e-9));
        assert_eq!(path.boxes.len(), 1);
        assert!(approx_eq!(f64, path.envelope.width(), t.width, epsilon = 1e-9));
    }

    #[test]
    fn positive_offset_aligns_text_after_anchor() {
        let t = text("ab");
        let path = point_candidate(&t, (10.0, 10.0), (5.0, 0.0), 0.0);
        assert_eq!(path.anchor, (15.0, 10.0));
        assert!(approx_eq!(f64, path.envelope.minx, 15.0, epsilon = 1e-9));
        let up = point_candidate(&t, (10.0, 10.0), (0.0, -3.0), 0.0);
        assert!(approx_eq!(f64, up.envelope.maxy, 7.0, epsilon = 1e-9));
    }

    #[test]
    fn rotated_point_text_grows_envelope() {
        let t = text("long label");
        let flat = point_candidate(&t, (0.0, 0.0), (0.0, 0.0), 0.0);
        let tilted = point_candidate(&t, (0.0, 0.0), (0.0, 0.0), 0.5);
        assert!(tilted.envelope.height() > flat.envelope.height());
    }

    #[test]
    fn vertex_positions_carry_arc_length() {
        let positions = line_positions(&[(0.0, 0.0), (10.0, 0.0), (10.0, 5.0)], None);
        let arcs: Vec<f64> = positions.iter().map(|p| p.arc).collect();
        assert_eq!(arcs, vec![0.0, 10.0, 15.0]);
    }

    #[test]
    fn spaced_positions_cover_path() {
        let positions = line_positions(&[(0.0, 0.0), (100.0, 0.0)], Some(25.0));
        let xs: Vec<f64> = positions.iter().map(|p| p.point.0).collect();
        assert_eq!(xs, vec![0.0, 25.0, 50.0, 75.0, 100.0]);
    }

    #[test]
    fn non_positive_spacing_uses_vertices() {
        let path = [(0.0, 0.0), (50.0, 0.0), (100.0, 0.0)];
        for spacing in [Some(0.0), Some(-10.0), Some(f64::NAN)] {
            let positions = line_positions(&path, spacing);
            assert_eq!(positions, line_positions(&path, None));
        }
    }

    #[test]
    fn text_longer_than_path_is_rejected() {
        let glyphs = unit_glyphs(5, 10.0);
        assert!(line_candidate(&glyphs, 12.0, &[(0.0, 0.0), (20.0, 0.0)], 10.0, 1.0).is_none());
    }

    #[test]
    fn straight_line_layout_has_one_box_per_glyph() {
        let glyphs = unit_glyphs(4, 5.0);
        let path = line_candidate(&glyphs, 10.0, &[(0.0, 0.0), (100.0, 0.0)], 50.0, 0.4).unwrap();
        assert_eq!(path.boxes.len(), 4);
        assert!(approx_eq!(f64, path.envelope.minx, 40.0, epsilon = 1e-9));
        assert!(approx_eq!(f64, path.envelope.maxx, 60.0, epsilon = 1e-9));
        assert!(approx_eq!(f64, path.angle, 0.0, epsilon = 1e-9));
    }

    #[test]
    fn text_near_end_slides_back_onto_path() {
        let glyphs = unit_glyphs(4, 5.0);
        let path = line_candidate(&glyphs, 10.0, &[(0.0, 0.0), (100.0, 0.0)], 100.0, 0.4).unwrap();
        assert!(approx_eq!(f64, path.envelope.maxx, 100.0, epsilon = 1e-9));
        assert_eq!(path.anchor, (100.0, 0.0));
    }

    #[test]
    fn sharp_bend_is_rejected() {
        let glyphs = unit_glyphs(4, 5.0);
        let bent = [(0.0, 0.0), (10.0, 0.0), (10.0, 10.0)];
        assert!(line_candidate(&glyphs, 10.0, &bent, 10.0, 0.3).is_none());
        assert!(line_candidate(&glyphs, 10.0, &bent, 10.0, 2.0).is_some());
    }

    #[test]
    fn leftward_path_is_read_upright() {
        let glyphs = unit_glyphs(2, 5.0);
        let path = line_candidate(&glyphs, 10.0, &[(100.0, 0.0), (0.0, 0.0)], 50.0, 0.4).unwrap();
        assert!(!is_upside_down(path.angle));
        assert!(path.glyphs[0].pos.0 < path.glyphs[1].pos.0);
    }
}
