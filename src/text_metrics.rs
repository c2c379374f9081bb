use fontdb::{Database, Family, Query, Stretch, Style, Weight};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::Mutex;
use ttf_parser::Face;

static TEXT_MEASURER: Lazy<Mutex<TextMeasurer>> = Lazy::new(|| Mutex::new(TextMeasurer::new()));

/// Vertical extents of a font at a given size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FontExtents {
    pub ascent: f32,
    pub descent: f32,
    pub line_gap: f32,
}

impl FontExtents {
    pub fn height(&self) -> f32 {
        self.ascent + self.descent + self.line_gap
    }
}

pub fn font_extents(font_family: &str, font_size: f32) -> Option<FontExtents> {
    if font_size <= 0.0 {
        return None;
    }
    let mut guard = TEXT_MEASURER.lock().ok()?;
    let metrics = guard.metrics(font_family)?;
    let scale = font_size / metrics.units_per_em as f32;
    Some(FontExtents {
        ascent: metrics.ascender as f32 * scale,
        descent: -(metrics.descender as f32) * scale,
        line_gap: metrics.line_gap as f32 * scale,
    })
}

pub fn measure_text_width(text: &str, font_size: f32, font_family: &str) -> Option<f32> {
    if text.is_empty() || font_size <= 0.0 {
        return Some(0.0);
    }
    let mut guard = TEXT_MEASURER.lock().ok()?;
    let metrics = guard.metrics(font_family)?;
    Some(metrics.measure_width(text, font_size))
}

struct TextMeasurer {
    db: Database,
    loaded_system_fonts: bool,
    cache: HashMap<String, Option<FontMetrics>>,
}

impl TextMeasurer {
    fn new() -> Self {
        Self {
            db: Database::new(),
            loaded_system_fonts: false,
            cache: HashMap::new(),
        }
    }

    fn metrics(&mut self, font_family: &str) -> Option<&FontMetrics> {
        let key = normalize_family_key(font_family);
        if !self.cache.contains_key(&key) {
            let loaded = self.load(font_family);
            if loaded.is_none() {
                tracing::debug!(family = %key, "no system font matched; using fallback metrics");
            }
            self.cache.insert(key.clone(), loaded);
        }
        self.cache.get(&key).and_then(|metrics| metrics.as_ref())
    }

    fn load(&mut self, font_family: &str) -> Option<FontMetrics> {
        let mut names: Vec<String> = Vec::new();
        let mut generics: Vec<Option<Family<'static>>> = Vec::new();
        for part in font_family.split(',') {
            let raw = part.trim().trim_matches('"').trim_matches('\'');
            if raw.is_empty() {
                continue;
            }
            let generic = match raw.to_ascii_lowercase().as_str() {
                "serif" => Some(Family::Serif),
                "sans-serif" | "system-ui" | "-apple-system" | "ui-sans-serif" => {
                    Some(Family::SansSerif)
                }
                "monospace" | "ui-monospace" => Some(Family::Monospace),
                "cursive" => Some(Family::Cursive),
                "fantasy" => Some(Family::Fantasy),
                _ => None,
            };
            if generic.is_none() {
                names.push(raw.to_string());
            }
            generics.push(generic);
        }

        let mut families: Vec<Family<'_>> = Vec::with_capacity(generics.len() + 1);
        let mut named = names.iter();
        for generic in generics {
            match generic {
                Some(family) => families.push(family),
                None => {
                    if let Some(name) = named.next() {
                        families.push(Family::Name(name.as_str()));
                    }
                }
            }
        }
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
        self.db
            .with_face_data(id, |data, index| {
                Face::parse(data, index).ok().map(|face| FontMetrics::from_face(&face))
            })
            .flatten()
    }
}

struct FontMetrics {
    units_per_em: u16,
    ascender: i16,
    descender: i16,
    line_gap: i16,
    ascii_advances: [u16; 128],
    average_advance: f32,
}

impl FontMetrics {
    fn from_face(face: &Face<'_>) -> Self {
        let mut ascii_advances = [0u16; 128];
        for byte in 0u8..=127 {
            if let Some(glyph_id) = face.glyph_index(byte as char) {
                ascii_advances[byte as usize] = face.glyph_hor_advance(glyph_id).unwrap_or(0);
            }
        }
        let letters = ascii_advances[b'a' as usize..=b'z' as usize]
            .iter()
            .chain(&ascii_advances[b'A' as usize..=b'Z' as usize])
            .filter(|&&advance| advance > 0)
            .map(|&advance| advance as f32);
        let (sum, count) = letters.fold((0.0, 0usize), |(sum, count), advance| {
            (sum + advance, count + 1)
        });
        Self {
            units_per_em: face.units_per_em().max(1),
            ascender: face.ascender(),
            descender: face.descender(),
            line_gap: face.line_gap(),
            ascii_advances,
            average_advance: if count > 0 { sum / count as f32 } else { 0.0 },
        }
    }

    fn measure_width(&self, text: &str, font_size: f32) -> f32 {
        let scale = font_size / self.units_per_em as f32;
        let fallback = if self.average_advance > 0.0 {
            self.average_advance * scale
        } else {
            font_size * 0.56
        };
        text.chars()
            .filter(|ch| *ch != '\n')
            .map(|ch| match self.ascii_advances.get(ch as usize) {
                Some(&advance) if advance > 0 => advance as f32 * scale,
                _ => fallback,
            })
            .sum::<f32>()
            .max(0.0)
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
