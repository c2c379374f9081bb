use crate::style::TextStyle;
use crate::text_metrics;

/// Bars are this much wider than the height of their label text.
const BAR_WIDTH_FONT_SCALE: f32 = 1.15;

/// Used when no system font matches the requested family.
const FALLBACK_LINE_HEIGHT: f32 = 1.2;

pub fn font_height(font_family: &str, font_size: f32) -> f32 {
    text_metrics::font_extents(font_family, font_size)
        .map(|extents| extents.height())
        .filter(|height| *height > 0.0)
        .unwrap_or(font_size * FALLBACK_LINE_HEIGHT)
}

/// Default stock bar width for labels drawn with `style`.
pub fn default_bar_width(style: &TextStyle) -> f32 {
    font_height(&style.font_family, style.font_size) * BAR_WIDTH_FONT_SCALE
}

pub fn text_width(text: &str, font_size: f32, font_family: &str) -> f32 {
    text_metrics::measure_text_width(text, font_size, font_family)
        .unwrap_or_else(|| fallback_text_width(text, font_size))
}

fn fallback_text_width(text: &str, font_size: f32) -> f32 {
    text.chars().count() as f32 * font_size * 0.56
}
