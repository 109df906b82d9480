use log::debug;
use serde::Serialize;

use super::text_placer::{Coupling, PlacerState, TextPlacer};
use super::{Candidate, Companion, Detector, Placement, RenderContext, Strategy, Verdict};
use crate::config::{PlacementConfig, ShieldConfig, TextStyle};
use crate::error::Result;
use crate::geometry::{BBox, Feature, Point};
use crate::marker::{MarkerCache, MarkerInfo};
use crate::text::FontManager;
use crate::transform::{Affine, CoordTransform};

/// Where the marker of one shield ends up.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MarkerPlacement {
    pub center: Point,
    /// Screen-space footprint that was tested with the text.
    pub extent: BBox,
    /// Top-left corner of `extent`.
    pub position: Point,
    /// Marker space to screen space, including the final translation.
    pub transform: Affine,
}

/// Adds a marker footprint to every text candidate.
#[derive(Debug, Clone)]
pub struct MarkerCompanion {
    extent: BBox,
    width: f64,
    height: f64,
    transform: Affine,
    unlock_image: bool,
}

impl MarkerCompanion {
    /// `scale` already includes the map scale factor. `rotation` is in degrees.
    pub fn new(info: MarkerInfo, scale: f64, rotation: f64, unlock_image: bool) -> Self {
        let transform = Affine::scaling(scale).then(&Affine::rotation(rotation.to_radians()));
        let local = BBox::from_center((0.0, 0.0), info.width, info.height);
        Self {
            extent: transform.apply_box(&local),
            width: info.width,
            height: info.height,
            transform,
            unlock_image,
        }
    }

    /// Transformed marker hull, centered on the origin.
    pub fn extent(&self) -> BBox {
        self.extent
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn height(&self) -> f64 {
        self.height
    }

    pub fn transform(&self) -> Affine {
        self.transform
    }
}

impl Companion for MarkerCompanion {
    type Output = MarkerPlacement;

    fn attach(&self, candidate: &Candidate<'_>) -> Verdict<MarkerPlacement> {
        let center = match candidate.strategy {
            Strategy::Point if self.unlock_image => candidate.reference,
            _ => candidate.path.center,
        };
        let extent = self.extent.re_center(center);
        Verdict::Accept {
            extra: vec![extent],
            output: MarkerPlacement {
                center,
                extent,
                position: (extent.minx, extent.miny),
                transform: self.transform.then(&Affine::translation(center.0, center.1)),
            },
        }
    }
}

/// Text placement with a marker that must fit alongside every label.
///
/// Reuses the [`TextPlacer`] walk; a candidate is accepted only when the
/// text and the marker are clear together.
pub struct ShieldPlacer<'a, T, D>
where
    T: CoordTransform,
    D: Detector,
{
    inner: TextPlacer<'a, T, D, MarkerCompanion>,
}

impl<'a, T, D> ShieldPlacer<'a, T, D>
where
    T: CoordTransform,
    D: Detector,
{
    /// Fails when the marker cannot be resolved; no placement is tried then.
    pub fn new<F: FontManager, M: MarkerCache>(
        feature: &Feature,
        style: &TextStyle,
        config: &'a PlacementConfig,
        shield: &ShieldConfig,
        ctx: RenderContext<'a, T, D>,
        fonts: &mut F,
        markers: &mut M,
    ) -> Result<Self> {
        let info = markers.find(&shield.marker)?;
        let scale = ctx.scale_factor;
        debug!(
            marker = shield.marker.as_str(),
            width = info.width,
            height = info.height;
            "Resolved shield marker"
        );
        let companion = MarkerCompanion::new(
            info,
            scale * shield.marker_scale,
            shield.marker_rotation,
            shield.unlock_image,
        );
        let coupling = Coupling {
            points_on_line: shield.points_on_line,
            reference_shift: (
                shield.shield_displacement.0 * scale,
                shield.shield_displacement.1 * scale,
            ),
        };
        let inner =
            TextPlacer::with_companion(feature, style, config, ctx, fonts, companion, coupling)?;
        Ok(Self { inner })
    }

    pub fn advance(&mut self) -> Result<bool> {
        self.inner.advance()
    }

    pub fn current_placements(&self) -> &[Placement<MarkerPlacement>] {
        self.inner.current_placements()
    }

    pub fn state(&self) -> PlacerState {
        self.inner.state()
    }

    pub fn marker_extent(&self) -> BBox {
        self.inner.companion().extent()
    }

    pub fn marker_width(&self) -> f64 {
        self.inner.companion().width()
    }

    pub fn marker_height(&self) -> f64 {
        self.inner.companion().height()
    }

    pub fn image_transform(&self) -> Affine {
        self.inner.companion().transform()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LabelPlacement;
    use crate::error::PlacementError;
    use crate::geometry::Geometry;
    use crate::marker::MarkerStore;
    use crate::placement::CollisionGrid;
    use crate::text::MetricFontManager;
    use crate::transform::IdentityTransform;
    use float_cmp::approx_eq;

    fn markers() -> MarkerStore {
        let mut store = MarkerStore::new();
        store.register("pin", 40.0, 40.0);
        store.register("bar", 20.0, 10.0);
        store
    }

    fn shield(marker: &str) -> ShieldConfig {
        ShieldConfig {
            marker: marker.to_string(),
            ..ShieldConfig::default()
        }
    }

    fn ctx<'a>(
        t: &'a IdentityTransform,
        grid: &'a mut CollisionGrid,
    ) -> RenderContext<'a, IdentityTransform, CollisionGrid> {
        RenderContext::new(t, grid, BBox::new(0.0, 0.0, 1000.0, 1000.0), 1000, 1000)
    }

    #[test]
    fn missing_marker_fails_construction() {
        let feature = Feature::new(1, "A1", vec![Geometry::point(100.0, 100.0)]);
        let config = PlacementConfig::default();
        let t = IdentityTransform;
        let mut grid = CollisionGrid::default();
        let result = ShieldPlacer::new(
            &feature,
            &TextStyle::default(),
            &config,
            &shield("nope"),
            ctx(&t, &mut grid),
            &mut MetricFontManager,
            &mut markers(),
        );
        assert!(matches!(result, Err(PlacementError::MarkerNotFound(_))));
    }

    #[test]
    fn marker_is_centered_on_text_and_occupies_space() {
        let feature = Feature::new(1, "ab", vec![Geometry::point(100.0, 100.0)]);
        let config = PlacementConfig::default();
        let t = IdentityTransform;
        let mut grid = CollisionGrid::default();
        let mut placer = ShieldPlacer::new(
            &feature,
            &TextStyle::default(),
            &config,
            &shield("pin"),
            ctx(&t, &mut grid),
            &mut MetricFontManager,
            &mut markers(),
        )
        .unwrap();
        assert!(placer.advance().unwrap());
        let marker = placer.current_placements()[0].companion;
        assert!(approx_eq!(f64, marker.center.0, 100.0, epsilon = 1e-9));
        assert!(approx_eq!(f64, marker.center.1, 100.0, epsilon = 1e-9));
        assert!(approx_eq!(f64, marker.position.0, 80.0, epsilon = 1e-9));
        assert!(approx_eq!(f64, marker.transform.tx, 100.0, epsilon = 1e-9));
        drop(placer);
        // Text box plus marker box.
        assert_eq!(grid.len(), 2);
    }

    #[test]
    fn marker_collision_rejects_text_that_would_fit() {
        let feature = Feature::new(1, "ab", vec![Geometry::point(100.0, 100.0)]);
        let config = PlacementConfig {
            offsets: vec![(0.0, 0.0), (0.0, 30.0)],
            ..PlacementConfig::default()
        };
        let t = IdentityTransform;
        let mut grid = CollisionGrid::default();
        grid.insert(BBox::new(81.0, 81.0, 85.0, 85.0));
        let mut placer = ShieldPlacer::new(
            &feature,
            &TextStyle::default(),
            &config,
            &shield("pin"),
            ctx(&t, &mut grid),
            &mut MetricFontManager,
            &mut markers(),
        )
        .unwrap();
        assert!(placer.advance().unwrap());
        assert_eq!(placer.current_placements()[0].path.anchor, (100.0, 130.0));
    }

    #[test]
    fn unlocked_marker_stays_on_reference_point() {
        let feature = Feature::new(1, "ab", vec![Geometry::point(100.0, 100.0)]);
        let config = PlacementConfig {
            offsets: vec![(0.0, 30.0)],
            ..PlacementConfig::default()
        };
        let shield = ShieldConfig {
            unlock_image: true,
            shield_displacement: (5.0, 0.0),
            ..shield("pin")
        };
        let t = IdentityTransform;
        let mut grid = CollisionGrid::default();
        let mut placer = ShieldPlacer::new(
            &feature,
            &TextStyle::default(),
            &config,
            &shield,
            ctx(&t, &mut grid),
            &mut MetricFontManager,
            &mut markers(),
        )
        .unwrap();
        assert!(placer.advance().unwrap());
        let placement = &placer.current_placements()[0];
        assert_eq!(placement.companion.center, (105.0, 100.0));
        assert_eq!(placement.path.anchor, (105.0, 130.0));
    }

    #[test]
    fn points_on_line_repeats_shields_along_the_path() {
        let feature = Feature::new(
            1,
            "A1",
            vec![Geometry::line(vec![(100.0, 100.0), (300.0, 100.0), (500.0, 100.0)])],
        );
        let config = PlacementConfig {
            placement: LabelPlacement::Line,
            ..PlacementConfig::default()
        };
        let t = IdentityTransform;
        let mut grid = CollisionGrid::default();
        let mut placer = ShieldPlacer::new(
            &feature,
            &TextStyle::default(),
            &config,
            &shield("pin"),
            ctx(&t, &mut grid),
            &mut MetricFontManager,
            &mut markers(),
        )
        .unwrap();
        let mut centers = Vec::new();
        while placer.advance().unwrap() {
            let placement = &placer.current_placements()[0];
            assert_eq!(placement.strategy, Strategy::Point);
            centers.push(placement.companion.center);
        }
        assert_eq!(centers.len(), 3);
        assert!(approx_eq!(f64, centers[1].0, 300.0, epsilon = 1e-9));
    }

    #[test]
    fn rotation_and_scale_shape_the_marker_extent() {
        let feature = Feature::new(1, "x", vec![Geometry::point(100.0, 100.0)]);
        let config = PlacementConfig::default();
        let shield = ShieldConfig {
            marker_rotation: 90.0,
            ..shield("bar")
        };
        let t = IdentityTransform;
        let mut grid = CollisionGrid::default();
        let placer = ShieldPlacer::new(
            &feature,
            &TextStyle::default(),
            &config,
            &shield,
            ctx(&t, &mut grid).with_scale_factor(2.0),
            &mut MetricFontManager,
            &mut markers(),
        )
        .unwrap();
        assert_eq!(placer.marker_width(), 20.0);
        assert_eq!(placer.marker_height(), 10.0);
        let extent = placer.marker_extent();
        assert!(approx_eq!(f64, extent.width(), 20.0, epsilon = 1e-9));
        assert!(approx_eq!(f64, extent.height(), 40.0, epsilon = 1e-9));
        assert!(approx_eq!(f64, placer.image_transform().sx, 0.0, epsilon = 1e-9));
    }
}
