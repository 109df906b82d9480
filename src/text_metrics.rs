use fontdb::{Database, Family, Query, Stretch, Style, Weight};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::Mutex;
use ttf_parser::Face;

static GLYPH_METRICS: Lazy<Mutex<GlyphMetrics>> = Lazy::new(|| Mutex::new(GlyphMetrics::new()));

/// Horizontal advance of every char in `text`, in pixels at `font_size`.
///
/// Entries are `None` for chars the resolved face has no glyph for. The
/// outer `None` means no face could be resolved for `font_family`.
pub fn glyph_advances(text: &str, font_size: f64, font_family: &str) -> Option<Vec<Option<f64>>> {
    if font_size <= 0.0 {
        return None;
    }
    let mut guard = GLYPH_METRICS.lock().ok()?;
    guard.advances(text, font_size, font_family)
}

struct GlyphMetrics {
    db: Database,
    loaded_system_fonts: bool,
    faces: HashMap<String, Option<LoadedFace>>,
}

impl GlyphMetrics {
    fn new() -> Self {
        Self {
            db: Database::new(),
            loaded_system_fonts: false,
            faces: HashMap::new(),
        }
    }

    fn advances(&mut self, text: &str, font_size: f64, font_family: &str) -> Option<Vec<Option<f64>>> {
        let key = normalize_family_key(font_family);
        if !self.faces.contains_key(&key) {
            let face = self.load_face(font_family);
            if face.is_none() {
                log::debug!(family = key.as_str(); "No system font face resolved");
            }
            self.faces.insert(key.clone(), face);
        }
        let face = self.faces.get_mut(&key)?.as_mut()?;
        face.advances(text, font_size)
    }

    fn load_face(&mut self, font_family: &str) -> Option<LoadedFace> {
        let names: Vec<String> = font_family
            .split(',')
            .map(|part| part.trim().trim_matches('"').trim_matches('\'').to_string())
            .filter(|name| !name.is_empty())
            .collect();
        let mut families: Vec<Family<'_>> = names
            .iter()
            .map(|name| match name.to_ascii_lowercase().as_str() {
                "serif" => Family::Serif,
                "sans-serif" | "system-ui" => Family::SansSerif,
                "monospace" => Family::Monospace,
                _ => Family::Name(name.as_str()),
            })
            .collect();
        if families.is_empty() {
            families.push(Family::SansSerif);
        }

        if !self.loaded_system_fonts {
            self.db.load_system_fonts();
            self.loaded_system_fonts = true;
        }

        let query = Query {
            families: &families,
            weight: Weight::NORMAL,
            stretch: Stretch::Normal,
            style: Style::Normal,
        };
        let id = self.db.query(&query)?;
        let mut loaded = None;
        self.db.with_face_data(id, |data, index| {
            if let Ok(face) = Face::parse(data, index) {
                loaded = Some(LoadedFace {
                    data: data.to_vec(),
                    index,
                    units_per_em: face.units_per_em().max(1),
                    advance_cache: HashMap::new(),
                });
            }
        });
        loaded
    }
}

struct LoadedFace {
    data: Vec<u8>,
    index: u32,
    units_per_em: u16,
    // Advance in font units, `None` when the face lacks the glyph.
    advance_cache: HashMap<char, Option<u16>>,
}

impl LoadedFace {
    fn advances(&mut self, text: &str, font_size: f64) -> Option<Vec<Option<f64>>> {
        let scale = font_size / f64::from(self.units_per_em);
        let mut out = Vec::with_capacity(text.len());
        let mut face: Option<Face<'_>> = None;
        for ch in text.chars() {
            let units = match self.advance_cache.get(&ch) {
                Some(cached) => *cached,
                None => {
                    if face.is_none() {
                        face = Some(Face::parse(&self.data, self.index).ok()?);
                    }
                    let parsed = face.as_ref()?;
                    let units = parsed
                        .glyph_index(ch)
                        .and_then(|glyph| parsed.glyph_hor_advance(glyph));
                    self.advance_cache.insert(ch, units);
                    units
                }
            };
            out.push(units.map(|u| f64::from(u) * scale));
        }
        Some(out)
    }
}

fn normalize_family_key(font_family: &str) -> String {
    let trimmed = font_family.trim();
    if trimmed.is_empty() {
        "sans-serif".to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_size_has_no_advances() {
        assert!(glyph_advances("abc", 0.0, "sans-serif").is_none());
    }

    #[test]
    fn resolved_face_yields_one_entry_per_char() {
        // Hosts without any system font resolve nothing; that is fine.
        if let Some(advances) = glyph_advances("héllo", 12.0, "sans-serif") {
            assert_eq!(advances.len(), 5);
        }
    }

    #[test]
    fn empty_family_normalizes_to_sans() {
        assert_eq!(normalize_family_key("  "), "sans-serif");
    }
}
