//! Capabilities the diagram draws through.
//!
//! A host supplies a [`Canvas`] (the drawing target) and [`Transforms`]
//! (data space to canvas space). Clipping is provided in terms of
//! [`Canvas::bounds`] and may be overridden by surfaces that clip natively.

use crate::layout::{Point, Rect};
use crate::style::{Color, LineStyle, TextStyle};

pub trait Canvas {
    fn bounds(&self) -> Rect;

    fn fill_polygon(&mut self, color: Color, points: &[Point]);

    fn stroke_lines(&mut self, style: &LineStyle, lines: &[Vec<Point>]);

    fn fill_text(&mut self, style: &TextStyle, at: Point, text: &str);

    fn contains_x(&self, x: f32) -> bool {
        let bounds = self.bounds();
        x >= bounds.min.x && x <= bounds.max.x
    }

    fn clip_polygon_x(&self, points: &[Point]) -> Vec<Point> {
        let bounds = self.bounds();
        clip_polygon(points, Axis::X, bounds.min.x, bounds.max.x)
    }

    fn clip_polygon_y(&self, points: &[Point]) -> Vec<Point> {
        let bounds = self.bounds();
        clip_polygon(points, Axis::Y, bounds.min.y, bounds.max.y)
    }

    fn clip_lines_x(&self, lines: &[Vec<Point>]) -> Vec<Vec<Point>> {
        let bounds = self.bounds();
        clip_lines(lines, Axis::X, bounds.min.x, bounds.max.x)
    }

    fn clip_lines_y(&self, lines: &[Vec<Point>]) -> Vec<Vec<Point>> {
        let bounds = self.bounds();
        clip_lines(lines, Axis::Y, bounds.min.y, bounds.max.y)
    }
}

/// Maps category positions and stacked values onto the canvas.
pub trait Transforms {
    fn category(&self, category: f64) -> f32;
    fn value(&self, value: f64) -> f32;
}

impl<C, V> Transforms for (C, V)
where
    C: Fn(f64) -> f32,
    V: Fn(f64) -> f32,
{
    fn category(&self, category: f64) -> f32 {
        (self.0)(category)
    }

    fn value(&self, value: f64) -> f32 {
        (self.1)(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
}

fn coord(point: Point, axis: Axis) -> f32 {
    match axis {
        Axis::X => point.x,
        Axis::Y => point.y,
    }
}

fn crossing(a: Point, b: Point, axis: Axis, bound: f32) -> Point {
    let t = (bound - coord(a, axis)) / (coord(b, axis) - coord(a, axis));
    let point = Point::new(a.x + (b.x - a.x) * t, a.y + (b.y - a.y) * t);
    // pin the clipped coordinate so rounding never leaves it outside
    match axis {
        Axis::X => Point::new(bound, point.y),
        Axis::Y => Point::new(point.x, bound),
    }
}

/// Sutherland–Hodgman clip of a closed polygon to `lo..=hi` on one axis.
pub fn clip_polygon(points: &[Point], axis: Axis, lo: f32, hi: f32) -> Vec<Point> {
    let lower = clip_polygon_edge(points, axis, lo, true);
    clip_polygon_edge(&lower, axis, hi, false)
}

fn clip_polygon_edge(points: &[Point], axis: Axis, bound: f32, keep_above: bool) -> Vec<Point> {
    let inside = |p: Point| {
        if keep_above {
            coord(p, axis) >= bound
        } else {
            coord(p, axis) <= bound
        }
    };
    let mut out = Vec::with_capacity(points.len() + 2);
    let Some(&last) = points.last() else {
        return out;
    };
    let mut prev = last;
    for &current in points {
        match (inside(prev), inside(current)) {
            (true, true) => out.push(current),
            (true, false) => out.push(crossing(prev, current, axis, bound)),
            (false, true) => {
                out.push(crossing(prev, current, axis, bound));
                out.push(current);
            }
            (false, false) => {}
        }
        prev = current;
    }
    out
}

/// Clips open polylines to `lo..=hi` on one axis. A polyline that leaves and
/// re-enters the range is split in two.
pub fn clip_lines(lines: &[Vec<Point>], axis: Axis, lo: f32, hi: f32) -> Vec<Vec<Point>> {
    let mut out = Vec::new();
    for line in lines {
        if line.len() == 1 {
            let c = coord(line[0], axis);
            if c >= lo && c <= hi {
                out.push(line.clone());
            }
            continue;
        }
        let mut current: Vec<Point> = Vec::new();
        for pair in line.windows(2) {
            let Some((start, end)) = clip_segment(pair[0], pair[1], axis, lo, hi) else {
                if !current.is_empty() {
                    out.push(std::mem::take(&mut current));
                }
                continue;
            };
            if current.last() != Some(&start) {
                if !current.is_empty() {
                    out.push(std::mem::take(&mut current));
                }
                current.push(start);
            }
            current.push(end);
            if end != pair[1] {
                out.push(std::mem::take(&mut current));
            }
        }
        if !current.is_empty() {
            out.push(current);
        }
    }
    out
}

fn clip_segment(a: Point, b: Point, axis: Axis, lo: f32, hi: f32) -> Option<(Point, Point)> {
    let (ca, cb) = (coord(a, axis), coord(b, axis));
    if (ca < lo && cb < lo) || (ca > hi && cb > hi) {
        return None;
    }
    let start = if ca < lo {
        crossing(a, b, axis, lo)
    } else if ca > hi {
        crossing(a, b, axis, hi)
    } else {
        a
    };
    let end = if cb < lo {
        crossing(a, b, axis, lo)
    } else if cb > hi {
        crossing(a, b, axis, hi)
    } else {
        b
    };
    Some((start, end))
}
