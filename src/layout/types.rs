use serde::Serialize;

use crate::style::{Color, LineStyle};

/// Point on the drawing surface.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned rectangle with `min <= max` on both axes.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Rect {
    pub min: Point,
    pub max: Point,
}

impl Rect {
    pub fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self {
            min: Point::new(x0.min(x1), y0.min(y1)),
            max: Point::new(x0.max(x1), y0.max(y1)),
        }
    }

    pub fn width(&self) -> f32 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f32 {
        self.max.y - self.min.y
    }

    pub fn center(&self) -> Point {
        Point::new(
            (self.min.x + self.max.x) / 2.0,
            (self.min.y + self.max.y) / 2.0,
        )
    }
}

/// Key a flow uses to refer to a stock.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct StockKey {
    pub category: i32,
    pub label: String,
}

impl StockKey {
    pub fn new(category: i32, label: impl Into<String>) -> Self {
        Self {
            category,
            label: label.into(),
        }
    }
}

/// Bounding box of the diagram in data space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DataRange {
    pub category_min: f64,
    pub category_max: f64,
    pub value_min: f64,
    pub value_max: f64,
}

impl DataRange {
    pub const EMPTY: DataRange = DataRange {
        category_min: f64::INFINITY,
        category_max: f64::NEG_INFINITY,
        value_min: f64::INFINITY,
        value_max: f64::NEG_INFINITY,
    };

    pub fn is_empty(&self) -> bool {
        self.category_min > self.category_max || self.value_min > self.value_max
    }
}

/// Anchor of a stock bar in data space plus its horizontal half-extent on
/// screen, for hosts that need to keep bars inside the plot area.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GlyphBox {
    pub category: f64,
    pub value: f64,
    pub half_width: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlowBand {
    pub index: usize,
    pub group: String,
    pub source: StockKey,
    pub receptor: StockKey,
    pub value: f64,
    /// Lower edge, source to receptor.
    pub low: Vec<Point>,
    /// Upper edge, receptor back to source.
    pub high: Vec<Point>,
    pub color: Color,
    pub line: LineStyle,
}

impl FlowBand {
    /// Closed outline of the band.
    pub fn polygon(&self) -> Vec<Point> {
        let mut points = Vec::with_capacity(self.low.len() + self.high.len());
        points.extend_from_slice(&self.low);
        points.extend_from_slice(&self.high);
        points
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StockRect {
    pub key: StockKey,
    pub order: usize,
    pub source_value: f64,
    pub receptor_value: f64,
    pub min: f64,
    pub max: f64,
    /// Screen location of the category column centre.
    pub category_x: f32,
    pub rect: Rect,
    pub label_at: Point,
    pub bottom_edge: Vec<Point>,
    /// Top edge, extended down the side whose total is smaller.
    pub top_edge: Vec<Point>,
}

/// Screen geometry of one render pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SankeyLayout {
    pub bar_width: f32,
    pub flows: Vec<FlowBand>,
    pub stocks: Vec<StockRect>,
}
