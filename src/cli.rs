use crate::config::{Config, LabelPlacement, PlacementConfig, ShieldConfig, load_config};
use crate::geometry::{BBox, Feature, Geometry};
use crate::harness::{self, Params, TestCase, param};
use crate::marker::MarkerStore;
use crate::placement::{CollisionGrid, RenderContext, ShieldPlacer, TextPlacer};
use crate::placement_dump::{LabelDump, PlacementDump, write_placement_dump};
use crate::text::{FontManager, MetricFontManager, SystemFontManager};
use crate::transform::ViewTransform;
use anyhow::{Result, bail};
use clap::Parser;
use log::{debug, info, warn};
use std::path::PathBuf;
use std::str::FromStr;

/// Side of the square map the generated features live in, in map units.
const MAP_SIZE: f64 = 1000.0;
const BUILTIN_MARKER: &str = "shield";
const LABELS: &[&str] = &[
    "Main St",
    "Harbour Road",
    "Elm",
    "Rue de la Paix",
    "Kings Way",
    "A1",
    "Old Mill Lane",
    "Bahnhofstraße",
    "M25",
    "Avenida Paulista",
];

#[derive(Parser, Debug)]
#[command(
    name = "label-bench",
    version,
    about = "Times label placement over generated map features"
)]
pub struct Args {
    /// Threads running the case concurrently (0 runs it inline)
    #[arg(short = 't', long, default_value_t = 0)]
    pub threads: usize,

    /// Placement passes per run
    #[arg(short = 'i', long, default_value_t = 100)]
    pub iterations: usize,

    /// Config file (JSON or JSON5)
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Log level (off, error, warn, info, debug, trace)
    #[arg(long, default_value = "warn")]
    pub log_level: String,

    /// Case parameters as `--key value` pairs after `--`: features, mode, fonts, dump
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub params: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Point,
    Line,
    Shield,
}

impl Mode {
    fn as_str(self) -> &'static str {
        match self {
            Mode::Point => "point",
            Mode::Line => "line",
            Mode::Shield => "shield",
        }
    }
}

impl FromStr for Mode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "point" => Ok(Mode::Point),
            "line" => Ok(Mode::Line),
            "shield" => Ok(Mode::Shield),
            other => bail!("unknown mode {other:?} (expected point, line or shield)"),
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn run(args: &Args) -> Result<i32> {
    let config = load_config(args.config.as_deref())?;
    let params = harness::collect_params(&args.params);
    let case = PlacementCase::from_params(config, &params, args.threads, args.iterations)?;
    info!(
        mode = case.mode.as_str(),
        features = case.features.len(),
        threads = args.threads,
        iterations = args.iterations;
        "Running placement benchmark"
    );
    let name = format!("placement_{}", case.mode);
    Ok(harness::run_case(&case, &name))
}

/// Places a generated feature set on one image per pass.
pub struct PlacementCase {
    config: Config,
    placement: PlacementConfig,
    shield: ShieldConfig,
    markers: MarkerStore,
    features: Vec<Feature>,
    mode: Mode,
    system_fonts: bool,
    dump: Option<PathBuf>,
    threads: usize,
    iterations: usize,
}

impl PlacementCase {
    pub fn from_params(
        config: Config,
        params: &Params,
        threads: usize,
        iterations: usize,
    ) -> Result<Self> {
        let count: usize = param(params, "features", 500)?;
        let mode: Mode = param(params, "mode", Mode::Point)?;
        let fonts: String = param(params, "fonts", "metric".to_string())?;
        let system_fonts = match fonts.as_str() {
            "metric" => false,
            "system" => true,
            other => bail!("unknown font source {other:?} (expected metric or system)"),
        };
        let dump = params.get("dump").map(PathBuf::from);
        Ok(Self::new(config, mode, count, threads, iterations)
            .with_system_fonts(system_fonts)
            .with_dump(dump))
    }

    pub fn new(config: Config, mode: Mode, count: usize, threads: usize, iterations: usize) -> Self {
        let mut placement = config.placement.clone();
        match mode {
            Mode::Line => placement.placement = LabelPlacement::Line,
            Mode::Point if placement.placement == LabelPlacement::Line => {
                placement.placement = LabelPlacement::Point
            }
            _ => {}
        }
        let mut markers = MarkerStore::new();
        markers.register(BUILTIN_MARKER, 24.0, 16.0);
        let shield = config.shield.clone().unwrap_or_else(|| ShieldConfig {
            marker: BUILTIN_MARKER.to_string(),
            ..ShieldConfig::default()
        });
        Self {
            features: generate_features(count, mode),
            config,
            placement,
            shield,
            markers,
            mode,
            system_fonts: false,
            dump: None,
            threads,
            iterations,
        }
    }

    pub fn with_system_fonts(mut self, system_fonts: bool) -> Self {
        self.system_fonts = system_fonts;
        self
    }

    pub fn with_dump(mut self, dump: Option<PathBuf>) -> Self {
        self.dump = dump;
        self
    }

    /// One full pass: every feature placed on a fresh image.
    pub fn place(&self) -> Result<PlacementDump> {
        if self.system_fonts {
            self.place_with(&mut SystemFontManager)
        } else {
            self.place_with(&mut MetricFontManager)
        }
    }

    fn place_with<F: FontManager>(&self, fonts: &mut F) -> Result<PlacementDump> {
        let render = &self.config.render;
        let extent = BBox::new(0.0, 0.0, MAP_SIZE, MAP_SIZE);
        let transform = ViewTransform::new(extent, render.width, render.height)?;
        let mut grid = CollisionGrid::default();
        let mut markers = self.markers.clone();
        let mut labels = Vec::new();

        for feature in &self.features {
            let ctx = RenderContext::new(&transform, &mut grid, extent, render.width, render.height)
                .with_scale_factor(render.scale_factor);
            match self.mode {
                Mode::Shield => {
                    let mut placer = ShieldPlacer::new(
                        feature,
                        &self.config.text,
                        &self.placement,
                        &self.shield,
                        ctx,
                        fonts,
                        &mut markers,
                    )?;
                    while placer.advance()? {
                        for placement in placer.current_placements() {
                            labels.push(
                                LabelDump::from_placement(feature, placement)
                                    .with_marker(placement.companion.extent),
                            );
                        }
                    }
                }
                Mode::Point | Mode::Line => {
                    let mut placer =
                        TextPlacer::new(feature, &self.config.text, &self.placement, ctx, fonts)?;
                    while placer.advance()? {
                        for placement in placer.current_placements() {
                            labels.push(LabelDump::from_placement(feature, placement));
                        }
                    }
                }
            }
        }

        Ok(PlacementDump {
            mode: self.mode.to_string(),
            width: render.width,
            height: render.height,
            labels,
        })
    }
}

impl TestCase for PlacementCase {
    fn validate(&self) -> Result<bool> {
        let dump = self.place()?;
        debug!(labels = dump.labels.len(); "Validation pass placed labels");
        if let Some(path) = &self.dump {
            write_placement_dump(path, &dump)?;
            info!(path:? = path; "Wrote placement dump");
        }
        if self.placement.allow_overlap {
            return Ok(true);
        }
        let overlaps = dump.overlaps();
        for (a, b) in &overlaps {
            warn!(
                first = dump.labels[*a].feature,
                second = dump.labels[*b].feature;
                "Accepted labels overlap"
            );
        }
        Ok(overlaps.is_empty())
    }

    fn run(&self) -> Result<()> {
        for _ in 0..self.iterations {
            let dump = self.place()?;
            std::hint::black_box(dump.labels.len());
        }
        Ok(())
    }

    fn threads(&self) -> usize {
        self.threads
    }

    fn iterations(&self) -> usize {
        self.iterations
    }
}

/// Deterministic features scattered over the map. Point mode yields point
/// geometries; line and shield modes yield gently bent three-vertex lines.
pub fn generate_features(count: usize, mode: Mode) -> Vec<Feature> {
    (0..count)
        .map(|i| {
            let x = ((i * 137) % 1000) as f64 * MAP_SIZE / 1000.0;
            let y = ((i * 251 + 89) % 1000) as f64 * MAP_SIZE / 1000.0;
            let geometry = match mode {
                Mode::Point => Geometry::point(x, y),
                Mode::Line | Mode::Shield => {
                    let bend = ((i % 7) as f64 - 3.0) * 12.0;
                    Geometry::line(vec![(x, y), (x + 200.0, y + bend), (x + 400.0, y)])
                }
            };
            Feature::new(i as u64, LABELS[i % LABELS.len()], vec![geometry])
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn args_accept_trailing_case_params() {
        let args = Args::parse_from([
            "label-bench",
            "--threads",
            "2",
            "--",
            "--features",
            "50",
            "--mode",
            "line",
        ]);
        assert_eq!(args.threads, 2);
        let params = harness::collect_params(&args.params);
        assert_eq!(params["features"], "50");
        assert_eq!(params["mode"], "line");
    }

    #[test]
    fn unknown_mode_is_rejected() {
        assert!("polygon".parse::<Mode>().is_err());
        assert_eq!("Shield".parse::<Mode>().unwrap(), Mode::Shield);
    }

    #[test]
    fn features_are_deterministic() {
        let a = generate_features(20, Mode::Line);
        let b = generate_features(20, Mode::Line);
        assert_eq!(a, b);
        assert_eq!(a[3].geometries[0].coords.len(), 3);
    }

    #[test]
    fn every_mode_validates() {
        for mode in [Mode::Point, Mode::Line, Mode::Shield] {
            let case = PlacementCase::new(Config::default(), mode, 200, 0, 1);
            assert!(case.validate().unwrap(), "{mode} placements overlap");
            assert!(!case.place().unwrap().labels.is_empty());
        }
    }

    #[test]
    fn dump_param_writes_json() {
        let dir = std::env::temp_dir().join(format!("label-bench-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("dump.json");
        let case = PlacementCase::new(Config::default(), Mode::Shield, 20, 0, 1)
            .with_dump(Some(path.clone()));
        assert!(case.validate().unwrap());
        let raw = std::fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["mode"], "shield");
        std::fs::remove_dir_all(&dir).ok();
    }
}
