use serde::{Deserialize, Serialize};

use super::Point;

/// Shape parameters of the flow curves.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CurveConfig {
    /// Number of points sampled along each curve.
    pub points: usize,
    /// Fraction of the stock bar width used to point each curve end
    /// horizontally.
    pub direction_offset_frac: f32,
}

impl Default for CurveConfig {
    fn default() -> Self {
        Self {
            points: 20,
            direction_offset_frac: 0.1,
        }
    }
}

/// Natural cubic spline through strictly increasing knots.
#[derive(Debug, Clone)]
pub struct Spline {
    xs: Vec<f64>,
    ys: Vec<f64>,
    /// Second derivative at each knot.
    m: Vec<f64>,
}

impl Spline {
    /// Returns `None` unless there are at least two knots, `xs` and `ys` have
    /// the same length and `xs` is strictly increasing.
    pub fn new(xs: &[f64], ys: &[f64]) -> Option<Self> {
        let n = xs.len();
        if n < 2 || ys.len() != n {
            return None;
        }
        if xs.windows(2).any(|w| !(w[1] > w[0])) {
            return None;
        }

        let h: Vec<f64> = xs.windows(2).map(|w| w[1] - w[0]).collect();
        let mut m = vec![0.0; n];
        if n > 2 {
            // Thomas algorithm over the interior knots; m[0] = m[n-1] = 0.
            let interior = n - 2;
            let mut diag = vec![0.0; interior];
            let mut upper = vec![0.0; interior];
            let mut rhs = vec![0.0; interior];
            for k in 0..interior {
                let i = k + 1;
                diag[k] = 2.0 * (h[i - 1] + h[i]);
                upper[k] = h[i];
                rhs[k] = 6.0 * ((ys[i + 1] - ys[i]) / h[i] - (ys[i] - ys[i - 1]) / h[i - 1]);
            }
            for k in 1..interior {
                let lower = h[k];
                let w = lower / diag[k - 1];
                diag[k] -= w * upper[k - 1];
                rhs[k] -= w * rhs[k - 1];
            }
            let mut solved = vec![0.0; interior];
            solved[interior - 1] = rhs[interior - 1] / diag[interior - 1];
            for k in (0..interior - 1).rev() {
                solved[k] = (rhs[k] - upper[k] * solved[k + 1]) / diag[k];
            }
            m[1..n - 1].copy_from_slice(&solved);
        }

        Some(Self {
            xs: xs.to_vec(),
            ys: ys.to_vec(),
            m,
        })
    }

    /// Value at `x`; outside the knots the end pieces are extended.
    pub fn evaluate(&self, x: f64) -> f64 {
        let last = self.xs.len() - 2;
        let i = self
            .xs
            .partition_point(|&knot| knot <= x)
            .saturating_sub(1)
            .min(last);
        let (x0, x1) = (self.xs[i], self.xs[i + 1]);
        let (y0, y1) = (self.ys[i], self.ys[i + 1]);
        let (m0, m1) = (self.m[i], self.m[i + 1]);
        let h = x1 - x0;
        let a = x1 - x;
        let b = x - x0;
        m0 * a * a * a / (6.0 * h)
            + m1 * b * b * b / (6.0 * h)
            + (y0 / h - m0 * h / 6.0) * a
            + (y1 / h - m1 * h / 6.0) * b
    }
}

/// S-shaped curve from `begin` to `end`, nearly level at both ends.
///
/// Four knots are used: both endpoints, plus one on each side pushed
/// `bar_width * direction_offset_frac` toward the other end at the same
/// height as its endpoint. The spline is sampled at `config.points` evenly
/// spaced x positions from `begin.x` to `end.x` inclusive. When the ends are
/// too close for the offsets to fit, the curve degrades to a straight line.
pub fn sankey_curve(begin: Point, end: Point, bar_width: f32, config: &CurveConfig) -> Vec<Point> {
    let n = config.points.max(2);
    let (bx, by) = (begin.x as f64, begin.y as f64);
    let (ex, ey) = (end.x as f64, end.y as f64);
    let span = ex - bx;
    let offset = (bar_width * config.direction_offset_frac) as f64;

    let spline = if span > 0.0 {
        Spline::new(&[bx, bx + offset, ex - offset, ex], &[by, by, ey, ey])
    } else if span < 0.0 {
        Spline::new(&[ex, ex + offset, bx - offset, bx], &[ey, ey, by, by])
    } else {
        None
    };

    (0..n)
        .map(|i| {
            let t = i as f64 / (n - 1) as f64;
            let x = if i == n - 1 { ex } else { bx + span * t };
            let y = match &spline {
                Some(spline) => spline.evaluate(x),
                None => by + (ey - by) * t,
            };
            Point::new(x as f32, y as f32)
        })
        .collect()
}
