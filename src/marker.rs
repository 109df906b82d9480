use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{PlacementError, Result};

/// Intrinsic size of a marker image, in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarkerInfo {
    pub width: f64,
    pub height: f64,
}

/// Resolves marker identifiers to their dimensions.
pub trait MarkerCache {
    fn find(&mut self, id: &str) -> Result<MarkerInfo>;
}

/// Marker cache backed by explicitly registered sizes and, with the `svg`
/// feature, SVG files resolved relative to a base directory.
#[derive(Debug, Clone, Default)]
pub struct MarkerStore {
    base_dir: Option<PathBuf>,
    markers: HashMap<String, MarkerInfo>,
}

impl MarkerStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: Some(base_dir.into()),
            markers: HashMap::new(),
        }
    }

    pub fn register(&mut self, id: impl Into<String>, width: f64, height: f64) {
        self.markers.insert(id.into(), MarkerInfo { width, height });
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    pub fn base_dir(&self) -> Option<&Path> {
        self.base_dir.as_deref()
    }

    #[cfg(feature = "svg")]
    fn resolve_path(&self, id: &str) -> PathBuf {
        match &self.base_dir {
            Some(dir) => dir.join(id),
            None => PathBuf::from(id),
        }
    }

    #[cfg(feature = "svg")]
    fn load_svg(&self, id: &str) -> Result<MarkerInfo> {
        let path = self.resolve_path(id);
        let data = std::fs::read(&path).map_err(|err| {
            if err.kind() == std::io::ErrorKind::NotFound {
                PlacementError::MarkerNotFound(id.to_string())
            } else {
                PlacementError::MarkerLoad {
                    id: id.to_string(),
                    reason: err.to_string(),
                }
            }
        })?;
        let tree = usvg::Tree::from_data(&data, &usvg::Options::default()).map_err(|err| {
            PlacementError::MarkerLoad {
                id: id.to_string(),
                reason: err.to_string(),
            }
        })?;
        let size = tree.size();
        Ok(MarkerInfo {
            width: f64::from(size.width()),
            height: f64::from(size.height()),
        })
    }
}

impl MarkerCache for MarkerStore {
    fn find(&mut self, id: &str) -> Result<MarkerInfo> {
        if let Some(info) = self.markers.get(id) {
            return Ok(*info);
        }
        if id.is_empty() {
            return Err(PlacementError::MarkerNotFound(id.to_string()));
        }
        #[cfg(feature = "svg")]
        if id.ends_with(".svg") {
            let info = self.load_svg(id)?;
            log::debug!(marker = id, width = info.width, height = info.height; "Loaded SVG marker");
            self.markers.insert(id.to_string(), info);
            return Ok(info);
        }
        Err(PlacementError::MarkerNotFound(id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registered_marker_is_found() {
        let mut store = MarkerStore::new();
        store.register("shield-a", 20.0, 12.0);
        let info = store.find("shield-a").unwrap();
        assert_eq!(info, MarkerInfo { width: 20.0, height: 12.0 });
    }

    #[test]
    fn unknown_marker_is_an_error() {
        let mut store = MarkerStore::new();
        assert!(matches!(
            store.find("nope"),
            Err(PlacementError::MarkerNotFound(id)) if id == "nope"
        ));
    }

    #[cfg(feature = "svg")]
    #[test]
    fn svg_marker_size_is_read_and_cached() {
        let dir = std::env::temp_dir().join(format!("tile-labels-markers-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("pin.svg"),
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="16" height="24"><rect width="16" height="24"/></svg>"#,
        )
        .unwrap();
        let mut store = MarkerStore::with_base_dir(&dir);
        let info = store.find("pin.svg").unwrap();
        assert_eq!(info, MarkerInfo { width: 16.0, height: 24.0 });
        assert_eq!(store.len(), 1);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[cfg(feature = "svg")]
    #[test]
    fn missing_svg_file_is_not_found() {
        let mut store = MarkerStore::with_base_dir(std::env::temp_dir());
        assert!(matches!(
            store.find("definitely-missing-marker.svg"),
            Err(PlacementError::MarkerNotFound(_))
        ));
    }
}
