use std::collections::BTreeMap;

use crate::canvas::{Axis, Canvas, clip_lines, clip_polygon};
use crate::error::{SankeyError, SankeyResult};
use crate::layout::{Point, Rect};
use crate::style::{Color, FlowStyle, LineStyle};

/// Chooses the fill and border of flows by group name.
///
/// `defaults` carries the diagram's own color and line style so resolvers
/// can fall back to them for the parts they do not override.
pub trait GroupStyleResolver {
    fn resolve(&self, group: &str, defaults: &FlowStyle) -> SankeyResult<FlowStyle>;
}

/// Draws every group with the diagram defaults.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultStyle;

impl GroupStyleResolver for DefaultStyle {
    fn resolve(&self, _group: &str, defaults: &FlowStyle) -> SankeyResult<FlowStyle> {
        Ok(defaults.clone())
    }
}

impl<F> GroupStyleResolver for F
where
    F: Fn(&str, &FlowStyle) -> SankeyResult<FlowStyle>,
{
    fn resolve(&self, group: &str, defaults: &FlowStyle) -> SankeyResult<FlowStyle> {
        self(group, defaults)
    }
}

#[derive(Debug, Clone, PartialEq)]
struct PaletteEntry {
    color: Color,
    line: Option<LineStyle>,
}

/// Fixed styles for a known set of groups. Any other group is an error.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupPalette {
    entries: BTreeMap<String, PaletteEntry>,
}

impl GroupPalette {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `group`; a `None` line keeps the diagram's border style.
    pub fn insert(&mut self, group: impl Into<String>, color: Color, line: Option<LineStyle>) {
        self.entries
            .insert(group.into(), PaletteEntry { color, line });
    }

    pub fn with(mut self, group: impl Into<String>, color: Color) -> Self {
        self.insert(group, color, None);
        self
    }
}

impl GroupStyleResolver for GroupPalette {
    fn resolve(&self, group: &str, defaults: &FlowStyle) -> SankeyResult<FlowStyle> {
        let entry = self
            .entries
            .get(group)
            .ok_or_else(|| SankeyError::unknown_group(group))?;
        Ok(FlowStyle {
            color: entry.color,
            line: entry.line.clone().unwrap_or_else(|| defaults.line.clone()),
        })
    }
}

/// Legend swatch of one flow group: a filled box with the flow's top and
/// bottom borders.
#[derive(Debug, Clone, PartialEq)]
pub struct Thumbnail {
    pub style: FlowStyle,
}

impl Thumbnail {
    pub fn new(style: FlowStyle) -> Self {
        Self { style }
    }

    pub fn draw(&self, canvas: &mut dyn Canvas, area: Rect) {
        let (lo, hi) = (area.min.y, area.max.y);
        let fill = [
            Point::new(area.min.x, area.min.y),
            Point::new(area.min.x, area.max.y),
            Point::new(area.max.x, area.max.y),
            Point::new(area.max.x, area.min.y),
        ];
        let poly = clip_polygon(&fill, Axis::Y, lo, hi);
        canvas.fill_polygon(self.style.color, &poly);

        for y in [area.max.y, area.min.y] {
            let border = vec![Point::new(area.min.x, y), Point::new(area.max.x, y)];
            let outline = clip_lines(&[border], Axis::Y, lo, hi);
            canvas.stroke_lines(&self.style.line, &outline);
        }
    }
}
