use crate::geometry::{BBox, Feature};
use crate::placement::{Placement, Strategy};
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

#[derive(Debug, Serialize)]
pub struct PlacementDump {
    pub mode: String,
    pub width: u32,
    pub height: u32,
    pub labels: Vec<LabelDump>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LabelDump {
    pub feature: u64,
    pub geometry: usize,
    pub strategy: Strategy,
    pub text: String,
    pub anchor: [f64; 2],
    pub center: [f64; 2],
    pub angle: f64,
    pub envelope: BBox,
    pub boxes: Vec<BBox>,
    pub marker: Option<BBox>,
}

impl LabelDump {
    pub fn from_placement<O>(feature: &Feature, placement: &Placement<O>) -> Self {
        let path = &placement.path;
        Self {
            feature: feature.id,
            geometry: placement.geometry,
            strategy: placement.strategy,
            text: path.glyphs.iter().map(|g| g.ch).collect(),
            anchor: [path.anchor.0, path.anchor.1],
            center: [path.center.0, path.center.1],
            angle: path.angle,
            envelope: path.envelope,
            boxes: path.boxes.clone(),
            marker: None,
        }
    }

    pub fn with_marker(mut self, extent: BBox) -> Self {
        self.marker = Some(extent);
        self
    }

    /// Every box this label occupies, marker included.
    pub fn footprint(&self) -> impl Iterator<Item = &BBox> {
        self.boxes.iter().chain(self.marker.iter())
    }
}

impl PlacementDump {
    /// Pairs of label indices whose footprints overlap. Boxes of the same
    /// label are never compared with each other.
    pub fn overlaps(&self) -> Vec<(usize, usize)> {
        let mut found = Vec::new();
        for (i, a) in self.labels.iter().enumerate() {
            for (j, b) in self.labels.iter().enumerate().skip(i + 1) {
                if a.footprint().any(|x| b.footprint().any(|y| x.intersects(y))) {
                    found.push((i, j));
                }
            }
        }
        found
    }
}

pub fn write_placement_dump(path: &Path, dump: &PlacementDump) -> anyhow::Result<()> {
    let file = File::create(path)?;
    let writer = BufWriter::new(file);
    serde_json::to_writer_pretty(writer, dump)?;
    Ok(())
}
