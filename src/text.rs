use crate::config::TextStyle;
use crate::error::{PlacementError, Result};
use crate::text_metrics;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Glyph {
    pub ch: char,
    pub advance: f64,
}

/// Output of one shaping call: a glyph per input char, in order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GlyphRun {
    pub glyphs: Vec<Glyph>,
}

/// Shapes label strings into glyph advances.
///
/// Placement is generic over this trait so hot paths resolve calls
/// statically.
pub trait FontManager {
    fn shape(&mut self, text: &str, font_family: &str, size: f64) -> Result<GlyphRun>;
}

// Rough width of each char as a fraction of the font size.
fn char_width_factor(ch: char) -> f64 {
    match ch {
        ' ' => 0.30,
        'i' | 'j' | 'l' | 'I' | '!' | '|' | '.' | ',' | ':' | ';' | '\'' => 0.26,
        'f' | 't' | 'r' | '(' | ')' | '[' | ']' | '-' => 0.36,
        'm' | 'w' | 'M' | 'W' | '@' | '%' => 0.88,
        'A'..='Z' => 0.66,
        '0'..='9' => 0.60,
        c if c.is_ascii() => 0.56,
        // CJK and other wide scripts.
        c if c > '\u{2E80}' => 1.0,
        _ => 0.60,
    }
}

/// Shaping from a fixed width table; never touches system fonts.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricFontManager;

impl FontManager for MetricFontManager {
    fn shape(&mut self, text: &str, _font_family: &str, size: f64) -> Result<GlyphRun> {
        if !(size > 0.0) {
            return Err(PlacementError::Shaping(format!("invalid font size {size}")));
        }
        Ok(GlyphRun {
            glyphs: text
                .chars()
                .map(|ch| Glyph {
                    ch,
                    advance: char_width_factor(ch) * size,
                })
                .collect(),
        })
    }
}

/// Shaping from installed system fonts, falling back to the width table
/// for glyphs the resolved face lacks.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemFontManager;

impl FontManager for SystemFontManager {
    fn shape(&mut self, text: &str, font_family: &str, size: f64) -> Result<GlyphRun> {
        let Some(advances) = text_metrics::glyph_advances(text, size, font_family) else {
            return MetricFontManager.shape(text, font_family, size);
        };
        Ok(GlyphRun {
            glyphs: text
                .chars()
                .zip(advances)
                .map(|(ch, advance)| Glyph {
                    ch,
                    advance: advance.unwrap_or_else(|| char_width_factor(ch) * size),
                })
                .collect(),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShapedLine {
    pub glyphs: Vec<Glyph>,
    pub width: f64,
}

impl ShapedLine {
    fn from_glyphs(glyphs: Vec<Glyph>) -> Self {
        let width = glyphs.iter().map(|g| g.advance).sum();
        Self { glyphs, width }
    }

    pub fn text(&self) -> String {
        self.glyphs.iter().map(|g| g.ch).collect()
    }
}

/// A label shaped once per state machine and reused for every candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedText {
    pub lines: Vec<ShapedLine>,
    pub font_size: f64,
    /// Distance between baselines, in pixels.
    pub line_advance: f64,
    pub width: f64,
    pub height: f64,
}

impl ProcessedText {
    pub fn process<F: FontManager>(
        label: &str,
        style: &TextStyle,
        scale_factor: f64,
        fonts: &mut F,
    ) -> Result<Self> {
        let font_size = style.size * scale_factor;
        let normalized = split_lines(label).join("\n");
        let run = fonts.shape(&normalized, &style.font_family, font_size)?;
        let spacing = style.character_spacing * scale_factor;
        let max_width = style.wrap_width.map(|w| w * scale_factor);

        let mut lines = Vec::new();
        for raw in run.glyphs.split(|g| g.ch == '\n') {
            let glyphs: Vec<Glyph> = raw
                .iter()
                .map(|g| Glyph {
                    ch: g.ch,
                    advance: g.advance + spacing,
                })
                .collect();
            match max_width {
                Some(max) => lines.extend(wrap_line(glyphs, max)),
                None => lines.push(ShapedLine::from_glyphs(glyphs)),
            }
        }
        if lines.is_empty() {
            lines.push(ShapedLine::from_glyphs(Vec::new()));
        }

        let line_advance = font_size * style.line_height;
        let width = lines.iter().map(|l| l.width).fold(0.0, f64::max);
        let height = lines.len() as f64 * line_advance;
        Ok(Self {
            lines,
            font_size,
            line_advance,
            width,
            height,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.lines.iter().all(|l| l.glyphs.is_empty())
    }

    /// All glyphs on one line, joined by a space; used for text on paths.
    pub fn single_line(&self) -> Vec<Glyph> {
        let space = self
            .lines
            .iter()
            .flat_map(|l| l.glyphs.iter())
            .find(|g| g.ch == ' ')
            .map(|g| g.advance)
            .unwrap_or(self.font_size * 0.3);
        let mut out = Vec::new();
        for (idx, line) in self.lines.iter().enumerate() {
            if idx > 0 && !line.glyphs.is_empty() {
                out.push(Glyph {
                    ch: ' ',
                    advance: space,
                });
            }
            out.extend(line.glyphs.iter().copied());
        }
        out
    }
}

fn split_lines(text: &str) -> Vec<String> {
    text.replace("\\n", "\n")
        .split('\n')
        .map(|line| line.trim().to_string())
        .collect()
}

fn wrap_line(glyphs: Vec<Glyph>, max_width: f64) -> Vec<ShapedLine> {
    let total: f64 = glyphs.iter().map(|g| g.advance).sum();
    if total <= max_width {
        return vec![ShapedLine::from_glyphs(glyphs)];
    }

    let mut lines = Vec::new();
    let mut current: Vec<Glyph> = Vec::new();
    let mut current_width = 0.0;
    for word in glyphs.split(|g| g.ch == ' ').filter(|w| !w.is_empty()) {
        let word_width: f64 = word.iter().map(|g| g.advance).sum();
        let space = glyphs
            .iter()
            .find(|g| g.ch == ' ')
            .map(|g| g.advance)
            .unwrap_or(0.0);
        let candidate_width = if current.is_empty() {
            word_width
        } else {
            current_width + space + word_width
        };
        if candidate_width > max_width && !current.is_empty() {
            lines.push(ShapedLine::from_glyphs(std::mem::take(&mut current)));
            current.extend_from_slice(word);
            current_width = word_width;
        } else {
            if !current.is_empty() {
                current.push(Glyph { ch: ' ', advance: space });
            }
            current.extend_from_slice(word);
            current_width = candidate_width;
        }
    }
    if !current.is_empty() {
        lines.push(ShapedLine::from_glyphs(current));
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    fn style() -> TextStyle {
        TextStyle {
            size: 10.0,
            ..TextStyle::default()
        }
    }

    #[test]
    fn metric_widths_scale_with_size() {
        let mut fonts = MetricFontManager;
        let a = fonts.shape("Hello", "sans", 10.0).unwrap();
        let b = fonts.shape("Hello", "sans", 20.0).unwrap();
        let wa: f64 = a.glyphs.iter().map(|g| g.advance).sum();
        let wb: f64 = b.glyphs.iter().map(|g| g.advance).sum();
        assert!((wb - 2.0 * wa).abs() < 1e-9);
    }

    #[test]
    fn metric_rejects_zero_size() {
        assert!(MetricFontManager.shape("a", "sans", 0.0).is_err());
    }

    #[test]
    fn process_splits_escaped_newlines() {
        let text = ProcessedText::process("Main St\\nNorth", &style(), 1.0, &mut MetricFontManager)
            .unwrap();
        assert_eq!(text.lines.len(), 2);
        assert_eq!(text.lines[0].text(), "Main St");
        assert_eq!(text.lines[1].text(), "North");
        assert!((text.height - 2.0 * 12.0).abs() < 1e-9);
    }

    #[test]
    fn process_wraps_long_labels() {
        let mut s = style();
        s.wrap_width = Some(40.0);
        let text = ProcessedText::process(
            "a rather long street name here",
            &s,
            1.0,
            &mut MetricFontManager,
        )
        .unwrap();
        assert!(text.lines.len() > 1, "expected wrapping, got {:?}", text.lines);
        assert!(text.lines.iter().all(|l| !l.text().starts_with(' ')));
    }

    #[test]
    fn scale_factor_grows_text() {
        let one = ProcessedText::process("Park", &style(), 1.0, &mut MetricFontManager).unwrap();
        let two = ProcessedText::process("Park", &style(), 2.0, &mut MetricFontManager).unwrap();
        assert!((two.width - 2.0 * one.width).abs() < 1e-9);
        assert_eq!(two.font_size, 20.0);
    }

    #[test]
    fn empty_label_still_has_a_line() {
        let text = ProcessedText::process("", &style(), 1.0, &mut MetricFontManager).unwrap();
        assert_eq!(text.lines.len(), 1);
        assert!(text.is_empty());
    }

    #[test]
    fn single_line_joins_with_space() {
        let text =
            ProcessedText::process("A\\nB", &style(), 1.0, &mut MetricFontManager).unwrap();
        let joined: String = text.single_line().iter().map(|g| g.ch).collect();
        assert_eq!(joined, "A B");
    }
}
