//! Collision-aware label placement for map tiles.
//!
//! Each feature gets a [`placement::TextPlacer`] (or a
//! [`placement::ShieldPlacer`] when an icon travels with the text). Calling
//! `advance()` yields accepted placements one at a time; every accepted
//! footprint is recorded in the shared [`placement::Detector`] so later
//! features on the same image cannot overlap it.

#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod error;
pub mod geometry;
pub mod harness;
pub mod marker;
pub mod placement;
pub mod placement_dump;
pub mod text;
pub mod text_metrics;
pub mod transform;

#[cfg(feature = "cli")]
pub use cli::run;
pub use config::{Config, LabelPlacement, PlacementConfig, ShieldConfig, TextStyle, load_config};
pub use error::{PlacementError, Result};
pub use geometry::{BBox, Feature, Geometry, GeometryKind, Point};
pub use marker::{MarkerCache, MarkerInfo, MarkerStore};
pub use placement::{
    CollisionGrid, Detector, Placement, PlacerState, RenderContext, ShieldPlacer, TextPlacer,
};
pub use text::{FontManager, MetricFontManager, SystemFontManager};
pub use transform::{CoordTransform, IdentityTransform, ViewTransform};
